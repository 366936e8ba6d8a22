//! Quill 核心数据模型
//!
//! 坐标几何、文字片段、视口变换、编辑意图以及外部协作方（内容提供方、
//! 页面修改器、光栅化器）的统一接口。

pub mod error;
pub mod geometry;
pub mod intent;
pub mod provider;
pub mod text;
pub mod viewport;

pub use error::{Result, ViewerError};
pub use geometry::{Matrix, Point, Rect};
pub use intent::{Color, DrawInstruction, EditIntent};
pub use provider::{
    ContentProvider, MutableDocument, MutablePage, PageMutator, ProvidedDocument, ProvidedPage,
    RasterTextSource, Rasterizer,
};
pub use text::{PositionedRun, TextContentOptions, TextRun};
pub use viewport::{PageGeometry, ViewportTransform, MAX_CANVAS_PIXELS};

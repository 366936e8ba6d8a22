//! 文字层分段与坐标映射
//!
//! 把内容提供方给出的文字片段映射到画布像素坐标，按邻近度聚类为区块，
//! 并把区块上的编辑意图转换回页面坐标系的绘制指令。

pub mod cluster;
pub mod mapper;
pub mod registry;
pub mod translator;

pub use cluster::{ClusterOptions, Section, SectionClusterer};
pub use mapper::{map_run, map_runs};
pub use registry::{Overlay, OverlayId, SectionRegistry};
pub use translator::{AnnotationStyle, MutationTarget, MutationTranslator};

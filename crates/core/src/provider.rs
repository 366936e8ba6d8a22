//! 外部协作方统一接口
//!
//! 内容提供方负责把 PDF 字节解析为页面、光栅化页面并给出文字片段；
//! 页面修改器负责在页面坐标系中绘制并重新编码文档。所有具体实现
//! （lopdf、pdfium、tesseract）都必须实现这里的 trait。

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;

use crate::error::Result;
use crate::geometry::{Point, Rect};
use crate::intent::{Color, DrawInstruction};
use crate::text::{TextContentOptions, TextRun};
use crate::viewport::{PageGeometry, ViewportTransform};

/// 页面内容提供方
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// 加载文档
    ///
    /// # 参数
    /// - `bytes`: 完整的 PDF 文件内容
    ///
    /// # 返回
    /// - 成功：可按页访问的文档
    /// - 失败：`ViewerError::Load`（格式损坏、无法解析等）
    async fn load_document(&self, bytes: Arc<Vec<u8>>) -> Result<Arc<dyn ProvidedDocument>>;
}

/// 已加载的只读文档
#[async_trait]
pub trait ProvidedDocument: Send + Sync {
    fn page_count(&self) -> u32;

    /// 获取页面，页码从 1 开始
    async fn page(&self, page_number: u32) -> Result<Arc<dyn ProvidedPage>>;
}

/// 单个页面
#[async_trait]
pub trait ProvidedPage: Send + Sync {
    fn page_number(&self) -> u32;

    fn geometry(&self) -> PageGeometry;

    /// 按视口尺寸光栅化页面
    async fn render(&self, viewport: &ViewportTransform) -> Result<RgbaImage>;

    /// 按内容流顺序返回文字片段
    async fn text_content(&self, options: &TextContentOptions) -> Result<Vec<TextRun>>;
}

/// 页面光栅化器
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// 渲染 `document` 的第 `page_index` 页（从 0 开始）为画布尺寸的图片
    async fn rasterize(
        &self,
        document: &[u8],
        page_index: usize,
        viewport: &ViewportTransform,
    ) -> Result<RgbaImage>;
}

/// 从光栅图识别文字（扫描件页面的 OCR 回退）
#[async_trait]
pub trait RasterTextSource: Send + Sync {
    /// 返回页面坐标系下的文字片段
    async fn recognize(
        &self,
        raster: &RgbaImage,
        viewport: &ViewportTransform,
    ) -> Result<Vec<TextRun>>;
}

/// 页面修改器
#[async_trait]
pub trait PageMutator: Send + Sync {
    async fn load_document(&self, bytes: Arc<Vec<u8>>) -> Result<Box<dyn MutableDocument>>;
}

/// 可修改的文档
#[async_trait]
pub trait MutableDocument: Send {
    fn page_count(&self) -> usize;

    /// 获取可绘制页面，索引从 0 开始
    fn page_mut(&mut self, index: usize) -> Result<Box<dyn MutablePage + '_>>;

    /// 重新编码为 PDF 字节
    async fn save(&mut self) -> Result<Vec<u8>>;
}

/// 可绘制页面，坐标均为页面坐标（原点左下）
pub trait MutablePage {
    fn height(&self) -> f64;

    fn draw_rectangle(&mut self, rect: Rect, color: Color, opacity: Option<f64>) -> Result<()>;

    fn draw_text(&mut self, text: &str, origin: Point, size: f64, color: Color) -> Result<()>;

    fn draw_line(&mut self, start: Point, end: Point, thickness: f64, color: Color) -> Result<()>;

    /// 抹除与矩形相交的文字，使其无法再被提取
    fn erase_text(&mut self, rect: Rect) -> Result<()>;

    fn apply(&mut self, instruction: &DrawInstruction) -> Result<()> {
        match instruction {
            DrawInstruction::Rectangle {
                rect,
                color,
                opacity,
            } => self.draw_rectangle(*rect, *color, *opacity),
            DrawInstruction::Text {
                text,
                origin,
                size,
                color,
            } => self.draw_text(text, *origin, *size, *color),
            DrawInstruction::Line {
                start,
                end,
                thickness,
                color,
            } => self.draw_line(*start, *end, *thickness, *color),
            DrawInstruction::EraseText { rect } => self.erase_text(*rect),
        }
    }
}

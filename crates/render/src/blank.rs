use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use quill_core::{Rasterizer, Result, ViewportTransform};

/// 白色画布光栅化器
///
/// pdfium 不可用时的回退：文字层与编辑功能照常工作，只是没有页面图像。
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankRasterizer;

#[async_trait]
impl Rasterizer for BlankRasterizer {
    async fn rasterize(
        &self,
        _document: &[u8],
        _page_index: usize,
        viewport: &ViewportTransform,
    ) -> Result<RgbaImage> {
        let (width, height) = viewport.canvas_size();
        Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }
}

//! 页面坐标 → 像素坐标的视口变换

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};
use crate::geometry::{Matrix, Point, Rect};

/// 画布像素总数上限
pub const MAX_CANVAS_PIXELS: f64 = 100_000_000.0;

/// 页面几何信息：有效边界框（CropBox / MediaBox）与旋转角度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub media_box: Rect,
    pub rotation: i32,
}

impl PageGeometry {
    pub fn new(media_box: Rect, rotation: i32) -> Self {
        Self {
            media_box,
            rotation,
        }
    }

    /// 归一化到 0/90/180/270
    pub fn normalized_rotation(&self) -> i32 {
        let r = self.rotation.rem_euclid(360);
        (((r + 45) / 90) * 90) % 360
    }

    pub fn width(&self) -> f64 {
        self.media_box.width
    }

    pub fn height(&self) -> f64 {
        self.media_box.height
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        // 默认 Letter 尺寸
        Self::new(Rect::new(0.0, 0.0, 612.0, 792.0), 0)
    }
}

/// 视口变换
///
/// `matrix` 把页面坐标映射到以画布左下角为原点的像素坐标（Y 轴不翻转），
/// 翻转在 [`ViewportTransform::to_pixel`] 中用 `canvas_height - y` 完成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    matrix: Matrix,
    inverse: Matrix,
    scale: f64,
    rotation: i32,
    canvas_width: f64,
    canvas_height: f64,
    page_height: f64,
}

impl ViewportTransform {
    pub fn new(geometry: &PageGeometry, scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewerError::InvalidViewport(format!("缩放比例无效: {}", scale)));
        }
        let media = geometry.media_box;
        let (w, h) = (media.width, media.height);
        if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
            return Err(ViewerError::InvalidViewport(format!(
                "页面尺寸无效: {}x{}",
                w, h
            )));
        }

        let rotation = geometry.normalized_rotation();
        // 显示旋转为顺时针，先平移到原点再旋转
        let rotate = match rotation {
            90 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
            180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
            270 => Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
            _ => Matrix::IDENTITY,
        };
        let matrix = Matrix::scale(scale, scale)
            .concat(&rotate)
            .concat(&Matrix::translate(-media.x, -media.y));
        let inverse = matrix
            .inverse()
            .ok_or_else(|| ViewerError::InvalidViewport("视口矩阵不可逆".to_string()))?;

        let (canvas_width, canvas_height) = if rotation == 90 || rotation == 270 {
            (h * scale, w * scale)
        } else {
            (w * scale, h * scale)
        };
        if canvas_width * canvas_height > MAX_CANVAS_PIXELS {
            return Err(ViewerError::InvalidViewport(format!(
                "画布过大: {:.0}x{:.0} (缩放 {})",
                canvas_width, canvas_height, scale
            )));
        }

        Ok(Self {
            matrix,
            inverse,
            scale,
            rotation,
            canvas_width,
            canvas_height,
            page_height: h,
        })
    }

    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn canvas_width(&self) -> f64 {
        self.canvas_width
    }

    pub fn canvas_height(&self) -> f64 {
        self.canvas_height
    }

    /// 未旋转的页面高度（页面单位）
    pub fn page_height(&self) -> f64 {
        self.page_height
    }

    /// 画布像素尺寸（向上取整）
    pub fn canvas_size(&self) -> (u32, u32) {
        (
            self.canvas_width.ceil().max(1.0) as u32,
            self.canvas_height.ceil().max(1.0) as u32,
        )
    }

    /// 页面坐标 → 画布像素坐标（原点左上）
    pub fn to_pixel(&self, page: Point) -> Point {
        let p = self.matrix.apply(page);
        Point::new(p.x, self.canvas_height - p.y)
    }

    /// 画布像素坐标 → 页面坐标
    pub fn to_page(&self, pixel: Point) -> Point {
        self.inverse
            .apply(Point::new(pixel.x, self.canvas_height - pixel.y))
    }

    /// 像素矩形（`y` 为上边）→ 页面矩形（`y` 为下边）
    pub fn rect_to_page(&self, pixel: &Rect) -> Rect {
        let corners = [
            self.to_page(Point::new(pixel.x, pixel.y)),
            self.to_page(Point::new(pixel.right(), pixel.y)),
            self.to_page(Point::new(pixel.x, pixel.top())),
            self.to_page(Point::new(pixel.right(), pixel.top())),
        ];
        Rect::bounding(&corners).unwrap_or_default()
    }

    /// 页面矩形 → 像素矩形
    pub fn rect_to_pixel(&self, page: &Rect) -> Rect {
        let corners = [
            self.to_pixel(Point::new(page.x, page.y)),
            self.to_pixel(Point::new(page.right(), page.y)),
            self.to_pixel(Point::new(page.x, page.top())),
            self.to_pixel(Point::new(page.right(), page.top())),
        ];
        Rect::bounding(&corners).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    fn letter() -> PageGeometry {
        PageGeometry::default()
    }

    #[test]
    fn test_unrotated_canvas_size_scales_page() {
        let vp = ViewportTransform::new(&letter(), 1.5).unwrap();
        assert_close(vp.canvas_width(), 918.0);
        assert_close(vp.canvas_height(), 1188.0);
    }

    #[test]
    fn test_to_pixel_flips_y() {
        let vp = ViewportTransform::new(&letter(), 2.0).unwrap();
        let p = vp.to_pixel(Point::new(100.0, 700.0));
        assert_close(p.x, 200.0);
        assert_close(p.y, 1584.0 - 1400.0);
    }

    #[test]
    fn test_rotated_page_swaps_canvas() {
        let geometry = PageGeometry::new(Rect::new(0.0, 0.0, 600.0, 800.0), 90);
        let vp = ViewportTransform::new(&geometry, 1.0).unwrap();
        assert_close(vp.canvas_width(), 800.0);
        assert_close(vp.canvas_height(), 600.0);
        // 页面左上角旋转后位于画布右上角
        let p = vp.to_pixel(Point::new(0.0, 800.0));
        assert_close(p.x, 800.0);
        assert_close(p.y, 0.0);
    }

    #[test]
    fn test_to_page_inverts_to_pixel_for_all_rotations() {
        for rotation in [0, 90, 180, 270, -90, 450] {
            let geometry = PageGeometry::new(Rect::new(10.0, 20.0, 595.0, 842.0), rotation);
            let vp = ViewportTransform::new(&geometry, 1.2).unwrap();
            let page = Point::new(123.0, 456.0);
            let back = vp.to_page(vp.to_pixel(page));
            assert_close(back.x, page.x);
            assert_close(back.y, page.y);
        }
    }

    #[test]
    fn test_rect_to_page_at_unit_scale() {
        let vp = ViewportTransform::new(&letter(), 1.0).unwrap();
        let rect = vp.rect_to_page(&Rect::new(50.0, 100.0, 200.0, 20.0));
        // pageHeight - minY - (maxY - minY)
        assert_close(rect.y, 792.0 - 100.0 - 20.0);
        assert_close(rect.x, 50.0);
        assert_close(rect.width, 200.0);
        assert_close(rect.height, 20.0);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        assert!(ViewportTransform::new(&letter(), 0.0).is_err());
        assert!(ViewportTransform::new(&letter(), f64::NAN).is_err());
    }

    #[test]
    fn test_oversized_canvas_rejected() {
        assert!(matches!(
            ViewportTransform::new(&letter(), 1.0e7),
            Err(ViewerError::InvalidViewport(_))
        ));
        // 12.5 倍约 4.9e7 像素，仍在上限内
        assert!(ViewportTransform::new(&letter(), 12.5).is_ok());
    }

    #[test]
    fn test_normalized_rotation() {
        assert_eq!(PageGeometry::new(Rect::default(), -90).normalized_rotation(), 270);
        assert_eq!(PageGeometry::new(Rect::default(), 360).normalized_rotation(), 0);
        assert_eq!(PageGeometry::new(Rect::default(), 95).normalized_rotation(), 90);
    }
}

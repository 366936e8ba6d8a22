//! 画布区域检测
//!
//! 灰度化后按阈值反向二值化，取最外层轮廓的包围盒，过滤掉小噪点。
//! 用于找出扫描件或插图中的图像块。

use image::{GrayImage, Luma, RgbaImage};
use imageproc::contours::{find_contours, BorderType};
use quill_core::Rect;

/// 二值化阈值：灰度不高于此值视为前景
pub const BINARY_THRESHOLD: u8 = 200;
/// 包围盒宽高都必须大于此值（像素）
pub const MIN_REGION_SIZE: u32 = 30;

fn binarize_inverse(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut binary = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = if pixel[0] > threshold { 0 } else { 255 };
        binary.put_pixel(x, y, Luma([value]));
    }
    binary
}

/// 检测画布中的区域，返回像素坐标矩形（`y` 为上边），按从上到下、从左到右排序
pub fn detect_regions(raster: &RgbaImage) -> Vec<Rect> {
    let gray = image::imageops::grayscale(raster);
    let binary = binarize_inverse(&gray, BINARY_THRESHOLD);

    let contours = find_contours::<u32>(&binary);
    let mut regions: Vec<Rect> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| {
            let min_x = c.points.iter().map(|p| p.x).min()?;
            let max_x = c.points.iter().map(|p| p.x).max()?;
            let min_y = c.points.iter().map(|p| p.y).min()?;
            let max_y = c.points.iter().map(|p| p.y).max()?;
            let width = max_x - min_x + 1;
            let height = max_y - min_y + 1;
            if width > MIN_REGION_SIZE && height > MIN_REGION_SIZE {
                Some(Rect::new(
                    min_x as f64,
                    min_y as f64,
                    width as f64,
                    height as f64,
                ))
            } else {
                None
            }
        })
        .collect();

    regions.sort_by(|a, b| {
        a.y.partial_cmp(&b.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    log::info!(
        "[Regions] 检测到 {} 个区域 ({} 个轮廓)",
        regions.len(),
        contours.len()
    );
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn canvas() -> RgbaImage {
        RgbaImage::from_pixel(200, 200, Rgba([255, 255, 255, 255]))
    }

    fn fill(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Rgba([value, value, value, 255]));
            }
        }
    }

    #[test]
    fn test_white_canvas_has_no_regions() {
        assert!(detect_regions(&canvas()).is_empty());
    }

    #[test]
    fn test_detects_dark_block() {
        let mut img = canvas();
        fill(&mut img, 20, 40, 50, 60, 0);
        let regions = detect_regions(&img);
        assert_eq!(regions, vec![Rect::new(20.0, 40.0, 50.0, 60.0)]);
    }

    #[test]
    fn test_size_filter_is_strict() {
        let mut img = canvas();
        // 恰好 30×30 不算
        fill(&mut img, 10, 10, 30, 30, 0);
        fill(&mut img, 100, 100, 31, 31, 0);
        let regions = detect_regions(&img);
        assert_eq!(regions, vec![Rect::new(100.0, 100.0, 31.0, 31.0)]);
    }

    #[test]
    fn test_light_pixels_are_background() {
        let mut img = canvas();
        fill(&mut img, 20, 20, 80, 80, 230);
        assert!(detect_regions(&img).is_empty());
    }

    #[test]
    fn test_nested_shapes_report_outer_box_only() {
        let mut img = canvas();
        fill(&mut img, 10, 10, 120, 120, 0);
        fill(&mut img, 30, 30, 60, 60, 255);
        fill(&mut img, 45, 45, 35, 35, 0);
        let regions = detect_regions(&img);
        assert_eq!(regions, vec![Rect::new(10.0, 10.0, 120.0, 120.0)]);
    }

    #[test]
    fn test_regions_sorted_top_to_bottom() {
        let mut img = canvas();
        fill(&mut img, 120, 120, 40, 40, 0);
        fill(&mut img, 10, 10, 40, 40, 0);
        let regions = detect_regions(&img);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].y < regions[1].y);
    }
}

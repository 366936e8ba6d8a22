//! 坐标映射：页面坐标文字片段 → 画布像素坐标

use quill_core::{PositionedRun, TextRun, ViewportTransform};

/// 映射单个文字片段
///
/// 视口矩阵与片段自身矩阵完整复合，旋转或倾斜的内容也能落在正确位置。
/// 宽高只乘以缩放比例，不单独旋转。
pub fn map_run(viewport: &ViewportTransform, run: &TextRun) -> PositionedRun {
    let t = viewport.matrix().concat(&run.transform);
    let scale = viewport.scale();
    PositionedRun {
        text: run.text.clone(),
        x: t.e(),
        // PDF 原点在左下，画布原点在左上
        y: viewport.canvas_height() - t.f(),
        width: run.width * scale,
        height: run.height * scale,
    }
}

/// 按输入顺序映射
pub fn map_runs(viewport: &ViewportTransform, runs: &[TextRun]) -> Vec<PositionedRun> {
    runs.iter().map(|run| map_run(viewport, run)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{Matrix, PageGeometry, Point, Rect};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    fn run_at(x: f64, y: f64, size: f64) -> TextRun {
        TextRun::new("abc", Matrix::new(size, 0.0, 0.0, size, x, y), 30.0, size)
    }

    #[test]
    fn test_y_is_canvas_height_minus_transformed_y() {
        let vp = ViewportTransform::new(&PageGeometry::default(), 1.2).unwrap();
        let run = run_at(72.0, 700.0, 12.0);
        let positioned = map_run(&vp, &run);
        let t = vp.matrix().concat(&run.transform);
        assert_close(positioned.y, vp.canvas_height() - t.f());
        assert_close(positioned.x, 72.0 * 1.2);
        assert_close(positioned.width, 36.0);
        assert_close(positioned.height, 12.0 * 1.2);
    }

    #[test]
    fn test_inverse_recovers_page_origin() {
        for rotation in [0, 90, 180, 270] {
            let geometry = PageGeometry::new(Rect::new(0.0, 0.0, 595.0, 842.0), rotation);
            for scale in [0.2, 1.0, 1.2, 3.7] {
                let vp = ViewportTransform::new(&geometry, scale).unwrap();
                let run = run_at(88.5, 321.25, 10.0);
                let positioned = map_run(&vp, &run);
                let back = vp.to_page(Point::new(positioned.x, positioned.y));
                assert!((back.x - 88.5).abs() < 1e-6);
                assert!((back.y - 321.25).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_rotated_glyph_uses_full_composition() {
        let vp = ViewportTransform::new(&PageGeometry::default(), 1.0).unwrap();
        // 逆时针旋转 90° 的文字，字号矩阵不影响基线原点
        let run = TextRun::new("up", Matrix::new(0.0, 12.0, -12.0, 0.0, 300.0, 400.0), 20.0, 12.0);
        let positioned = map_run(&vp, &run);
        assert_close(positioned.x, 300.0);
        assert_close(positioned.y, 792.0 - 400.0);
    }

    #[test]
    fn test_map_runs_preserves_order() {
        let vp = ViewportTransform::new(&PageGeometry::default(), 1.0).unwrap();
        let runs = vec![run_at(10.0, 700.0, 12.0), run_at(10.0, 100.0, 12.0)];
        let mapped = map_runs(&vp, &runs);
        assert_eq!(mapped.len(), 2);
        assert!(mapped[0].y < mapped[1].y);
    }
}

//! OCR 单词 → 页面坐标文字片段

use quill_core::{Matrix, Rect, TextRun, ViewportTransform};
use serde::{Deserialize, Serialize};

/// 识别出的单词，`rect` 为画布像素坐标（`y` 为上边）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// 0-1
    pub confidence: f32,
    pub rect: Rect,
}

/// 单词转换为文字片段
///
/// 基线取单词框的下边。片段矩阵经视口逆变换回到页面坐标，
/// 再次映射时与单词框重合。
pub fn words_to_runs(
    words: &[OcrWord],
    viewport: &ViewportTransform,
    min_confidence: f32,
) -> Vec<TextRun> {
    let Some(inverse) = viewport.matrix().inverse() else {
        return Vec::new();
    };
    let scale = viewport.scale();

    words
        .iter()
        .filter(|w| w.confidence >= min_confidence && !w.text.trim().is_empty())
        .map(|word| {
            let r = &word.rect;
            let h = r.height;
            // 未翻转的像素坐标：原点在画布左下角
            let baseline_y = viewport.canvas_height() - (r.y + r.height);
            let pixel = Matrix::new(h, 0.0, 0.0, h, r.x, baseline_y);
            TextRun::new(
                word.text.clone(),
                inverse.concat(&pixel),
                r.width / scale,
                r.height / scale,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{PageGeometry, Point};

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    fn word(text: &str, rect: Rect, confidence: f32) -> OcrWord {
        OcrWord {
            text: text.into(),
            confidence,
            rect,
        }
    }

    #[test]
    fn test_run_maps_back_onto_word_box() {
        let viewport = ViewportTransform::new(&PageGeometry::default(), 1.2).unwrap();
        let rect = Rect::new(120.0, 240.0, 60.0, 18.0);
        let runs = words_to_runs(&[word("hello", rect, 0.9)], &viewport, 0.0);
        assert_eq!(runs.len(), 1);

        let run = &runs[0];
        assert_close(run.width, 50.0);
        assert_close(run.height, 15.0);

        let t = viewport.matrix().concat(&run.transform);
        assert_close(t.e(), 120.0);
        assert_close(viewport.canvas_height() - t.f(), 258.0);

        // 页面坐标：基线 = 792 - 258 / 1.2
        let origin = run.origin();
        assert_close(origin.x, 100.0);
        assert_close(origin.y, 792.0 - 215.0);
        let back = viewport.to_pixel(Point::new(origin.x, origin.y));
        assert_close(back.y, 258.0);
    }

    #[test]
    fn test_low_confidence_and_blank_words_are_dropped() {
        let viewport = ViewportTransform::new(&PageGeometry::default(), 1.0).unwrap();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let runs = words_to_runs(
            &[
                word("keep", rect, 0.8),
                word("noise", rect, 0.2),
                word("  ", rect, 0.99),
            ],
            &viewport,
            0.5,
        );
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "keep");
    }
}

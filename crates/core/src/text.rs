//! 文字片段数据结构

use serde::{Deserialize, Serialize};

use crate::geometry::{Matrix, Point, Rect};

/// 内容提供方给出的原子文字片段（页面坐标）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    /// 基线位置、字号与旋转，`e/f` 为基线起点
    pub transform: Matrix,
    /// 页面单位
    pub width: f64,
    /// 页面单位
    pub height: f64,
}

impl TextRun {
    pub fn new(text: impl Into<String>, transform: Matrix, width: f64, height: f64) -> Self {
        Self {
            text: text.into(),
            transform,
            width,
            height,
        }
    }

    /// 基线起点（页面坐标）
    pub fn origin(&self) -> Point {
        Point::new(self.transform.e(), self.transform.f())
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// 映射到画布像素坐标后的文字片段
///
/// `y` 是基线到画布顶部的距离。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PositionedRun {
    /// 片段上边
    pub fn top(&self) -> f64 {
        self.y - self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// 像素坐标下的包围盒（`y` 为上边）
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.top(), self.width, self.height)
    }
}

/// 文本提取选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContentOptions {
    /// 合并连续空白为单个空格
    pub normalize_whitespace: bool,
}

impl Default for TextContentOptions {
    fn default() -> Self {
        Self {
            normalize_whitespace: true,
        }
    }
}

impl TextContentOptions {
    pub fn apply(&self, text: &str) -> String {
        if !self.normalize_whitespace {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut last_space = false;
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(ch);
                last_space = false;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let opts = TextContentOptions::default();
        assert_eq!(opts.apply("a \t\n b  c"), "a b c");
        let raw = TextContentOptions {
            normalize_whitespace: false,
        };
        assert_eq!(raw.apply("a  b"), "a  b");
    }

    #[test]
    fn test_positioned_run_bounds() {
        let run = PositionedRun {
            text: "x".into(),
            x: 10.0,
            y: 50.0,
            width: 30.0,
            height: 12.0,
        };
        assert_eq!(run.bounds(), Rect::new(10.0, 38.0, 30.0, 12.0));
    }
}

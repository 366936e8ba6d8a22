//! 编辑意图与页面绘制指令

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};

/// 用户编辑意图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditIntent {
    AddText { text: String },
    EditText { text: String },
    Delete,
    Highlight,
    Underline,
    Strikethrough,
    Comment { text: String },
}

impl EditIntent {
    pub fn name(&self) -> &'static str {
        match self {
            EditIntent::AddText { .. } => "add_text",
            EditIntent::EditText { .. } => "edit_text",
            EditIntent::Delete => "delete",
            EditIntent::Highlight => "highlight",
            EditIntent::Underline => "underline",
            EditIntent::Strikethrough => "strikethrough",
            EditIntent::Comment { .. } => "comment",
        }
    }
}

/// RGB 颜色，分量范围 0-1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

/// 页面坐标系下的绘制指令，交给页面修改器执行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawInstruction {
    Rectangle {
        rect: Rect,
        color: Color,
        opacity: Option<f64>,
    },
    Text {
        text: String,
        origin: Point,
        size: f64,
        color: Color,
    },
    Line {
        start: Point,
        end: Point,
        thickness: f64,
        color: Color,
    },
    /// 从内容流中抹除与矩形相交的字形
    EraseText { rect: Rect },
}

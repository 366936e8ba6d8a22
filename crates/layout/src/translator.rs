//! 编辑意图 → 页面坐标绘制指令

use quill_core::{
    Color, DrawInstruction, EditIntent, Point, Rect, Result, ViewerError, ViewportTransform,
};
use serde::{Deserialize, Serialize};

use crate::cluster::Section;

/// 标注样式（偏移、字号、颜色、透明度）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationStyle {
    pub cover_color: Color,
    pub text_color: Color,
    pub highlight_color: Color,
    pub highlight_opacity: f64,
    pub underline_color: Color,
    pub underline_thickness: f64,
    /// 下划线在区块下边之下的距离（页面单位）
    pub underline_offset: f64,
    pub strikethrough_color: Color,
    pub strikethrough_thickness: f64,
    pub comment_color: Color,
    pub comment_size: f64,
    /// 批注在区块右边之外的距离（页面单位）
    pub comment_offset: f64,
    pub add_text_color: Color,
    pub add_text_size: f64,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            cover_color: Color::WHITE,
            text_color: Color::BLACK,
            highlight_color: Color::YELLOW,
            highlight_opacity: 0.5,
            underline_color: Color::BLACK,
            underline_thickness: 2.0,
            underline_offset: 2.0,
            strikethrough_color: Color::RED,
            strikethrough_thickness: 2.0,
            comment_color: Color::BLUE,
            comment_size: 12.0,
            comment_offset: 5.0,
            add_text_color: Color::BLACK,
            add_text_size: 16.0,
        }
    }
}

/// 编辑作用对象
#[derive(Debug, Clone, Copy)]
pub enum MutationTarget<'a> {
    /// 覆盖层对应的区块
    Section(&'a Section),
    /// 画布上的点击位置（像素）
    Point(Point),
}

#[derive(Debug, Clone, Default)]
pub struct MutationTranslator {
    style: AnnotationStyle,
}

impl MutationTranslator {
    pub fn new(style: AnnotationStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// 生成页面坐标下的绘制指令
    ///
    /// `viewport` 必须是区块计算时使用的视口。
    pub fn translate(
        &self,
        target: MutationTarget<'_>,
        viewport: &ViewportTransform,
        intent: &EditIntent,
    ) -> Result<Vec<DrawInstruction>> {
        let style = &self.style;

        if let EditIntent::AddText { text } = intent {
            let anchor = match target {
                MutationTarget::Point(click) => click,
                MutationTarget::Section(section) => Point::new(section.min_x, section.min_y),
            };
            return Ok(vec![DrawInstruction::Text {
                text: text.clone(),
                origin: viewport.to_page(anchor),
                size: style.add_text_size,
                color: style.add_text_color,
            }]);
        }

        let section = match target {
            MutationTarget::Section(section) => section,
            MutationTarget::Point(_) => {
                return Err(ViewerError::mutation(format!(
                    "{} 需要作用于文字区块",
                    intent.name()
                )))
            }
        };
        let rect = viewport.rect_to_page(&section.bounds());

        let instructions = match intent {
            EditIntent::Delete => self.cover(rect),
            EditIntent::EditText { text } => {
                let mut ops = self.cover(rect);
                ops.push(DrawInstruction::Text {
                    text: text.clone(),
                    origin: Point::new(rect.x, rect.y),
                    size: rect.height,
                    color: style.text_color,
                });
                ops
            }
            EditIntent::Highlight => vec![DrawInstruction::Rectangle {
                rect,
                color: style.highlight_color,
                opacity: Some(style.highlight_opacity),
            }],
            EditIntent::Underline => {
                let y = rect.y - style.underline_offset;
                vec![DrawInstruction::Line {
                    start: Point::new(rect.x, y),
                    end: Point::new(rect.right(), y),
                    thickness: style.underline_thickness,
                    color: style.underline_color,
                }]
            }
            EditIntent::Strikethrough => {
                let y = rect.center_y();
                vec![DrawInstruction::Line {
                    start: Point::new(rect.x, y),
                    end: Point::new(rect.right(), y),
                    thickness: style.strikethrough_thickness,
                    color: style.strikethrough_color,
                }]
            }
            EditIntent::Comment { text } => vec![DrawInstruction::Text {
                text: text.clone(),
                origin: Point::new(rect.right() + style.comment_offset, rect.top()),
                size: style.comment_size,
                color: style.comment_color,
            }],
            EditIntent::AddText { .. } => Vec::new(),
        };

        log::debug!(
            "[Translator] {} -> {} 条指令, 区域 {:?}",
            intent.name(),
            instructions.len(),
            rect
        );
        Ok(instructions)
    }

    /// 抹除文字并以底色覆盖
    fn cover(&self, rect: Rect) -> Vec<DrawInstruction> {
        vec![
            DrawInstruction::EraseText { rect },
            DrawInstruction::Rectangle {
                rect,
                color: self.style.cover_color,
                opacity: None,
            },
        ]
    }
}

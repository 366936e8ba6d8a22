//! 内容流文字状态机
//!
//! 提取与抹除共用同一套状态跟踪，保证两边计算出的字形位置一致。

use lopdf::content::Operation;
use lopdf::Object;
use quill_core::{Matrix, Point, Rect};

use crate::utils::get_number;

/// 估算单个字符的宽度（文字空间，未乘字号）
pub fn estimate_char_width(byte: u8) -> f64 {
    if byte < 128 {
        0.55
    } else {
        1.0
    }
}

/// 单个字形的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    pub byte: u8,
    /// 字形空间 → 页面坐标
    pub transform: Matrix,
    /// 文字空间中的前进宽度
    pub advance: f64,
}

impl Glyph {
    /// 页面坐标包围盒：基线向上一个字号高度
    pub fn bounds(&self) -> Rect {
        let m = &self.transform;
        let w = self.advance;
        let corners = [
            m.apply(Point::new(0.0, 0.0)),
            m.apply(Point::new(w, 0.0)),
            m.apply(Point::new(0.0, 1.0)),
            m.apply(Point::new(w, 1.0)),
        ];
        Rect::bounding(&corners).unwrap_or_default()
    }
}

/// 文字显示元素：字符串或 TJ 数组里的位移
#[derive(Debug, Clone, PartialEq)]
pub enum ShowItem {
    Text(Vec<u8>),
    Adjust(f64),
}

/// 从显示操作中取出要绘制的元素
pub fn show_items(op: &Operation) -> Option<Vec<ShowItem>> {
    let string_at = |i: usize| match op.operands.get(i) {
        Some(Object::String(s, _)) => Some(vec![ShowItem::Text(s.clone())]),
        _ => None,
    };
    match op.operator.as_str() {
        "Tj" | "'" => string_at(0),
        "\"" => string_at(2),
        "TJ" => match op.operands.first() {
            Some(Object::Array(arr)) => Some(
                arr.iter()
                    .filter_map(|item| match item {
                        Object::String(s, _) => Some(ShowItem::Text(s.clone())),
                        other => get_number(other).map(ShowItem::Adjust),
                    })
                    .collect(),
            ),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
}

/// 文字状态
#[derive(Debug, Clone)]
pub struct TextState {
    stack: Vec<GraphicsState>,
    ctm: Matrix,
    text_matrix: Matrix,
    line_matrix: Matrix,
    in_text_object: bool,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// Tz / 100
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            ctm: Matrix::IDENTITY,
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            in_text_object: false,
            font_size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

fn numbers(op: &Operation, count: usize) -> Option<Vec<f64>> {
    if op.operands.len() < count {
        return None;
    }
    op.operands[op.operands.len() - count..]
        .iter()
        .map(get_number)
        .collect()
}

fn matrix_from(values: &[f64]) -> Matrix {
    Matrix::new(
        values[0], values[1], values[2], values[3], values[4], values[5],
    )
}

impl TextState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_text_object(&self) -> bool {
        self.in_text_object
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    /// 更新状态；显示操作的换行与间距部分也在这里处理，字形由 [`TextState::show`] 生成
    pub fn apply(&mut self, op: &Operation) {
        match op.operator.as_str() {
            "q" => self.stack.push(GraphicsState { ctm: self.ctm }),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.ctm = saved.ctm;
                }
            }
            "cm" => {
                if let Some(v) = numbers(op, 6) {
                    self.ctm = self.ctm.concat(&matrix_from(&v));
                }
            }
            "BT" => {
                self.in_text_object = true;
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "ET" => self.in_text_object = false,
            "Tf" => {
                if let Some(size) = op.operands.get(1).and_then(get_number) {
                    self.font_size = size;
                }
            }
            "Tc" => {
                if let Some(v) = numbers(op, 1) {
                    self.char_spacing = v[0];
                }
            }
            "Tw" => {
                if let Some(v) = numbers(op, 1) {
                    self.word_spacing = v[0];
                }
            }
            "Tz" => {
                if let Some(v) = numbers(op, 1) {
                    self.horizontal_scaling = v[0] / 100.0;
                }
            }
            "TL" => {
                if let Some(v) = numbers(op, 1) {
                    self.leading = v[0];
                }
            }
            "Ts" => {
                if let Some(v) = numbers(op, 1) {
                    self.rise = v[0];
                }
            }
            "Tm" => {
                if let Some(v) = numbers(op, 6) {
                    self.text_matrix = matrix_from(&v);
                    self.line_matrix = self.text_matrix;
                }
            }
            "Td" => {
                if let Some(v) = numbers(op, 2) {
                    self.move_line(v[0], v[1]);
                }
            }
            "TD" => {
                if let Some(v) = numbers(op, 2) {
                    self.leading = -v[1];
                    self.move_line(v[0], v[1]);
                }
            }
            "T*" | "'" => self.next_line(),
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    op.operands.first().and_then(get_number),
                    op.operands.get(1).and_then(get_number),
                ) {
                    self.word_spacing = aw;
                    self.char_spacing = ac;
                }
                self.next_line();
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = self.line_matrix.concat(&Matrix::translate(tx, ty));
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// 字形空间 → 页面坐标：CTM ∘ Tm ∘ [fs·Th 0 0 fs 0 rise]
    pub fn rendering_matrix(&self) -> Matrix {
        let fs = self.font_size;
        self.ctm.concat(&self.text_matrix).concat(&Matrix::new(
            fs * self.horizontal_scaling,
            0.0,
            0.0,
            fs,
            0.0,
            self.rise,
        ))
    }

    /// 绘制字符串：返回每个字节的字形并推进文字矩阵
    pub fn show(&mut self, bytes: &[u8]) -> Vec<Glyph> {
        let mut glyphs = Vec::with_capacity(bytes.len());
        for &byte in bytes {
            let width = estimate_char_width(byte);
            glyphs.push(Glyph {
                byte,
                transform: self.rendering_matrix(),
                advance: width,
            });

            let mut tx = width * self.font_size + self.char_spacing;
            if byte == b' ' {
                tx += self.word_spacing;
            }
            self.advance(tx * self.horizontal_scaling);
        }
        glyphs
    }

    /// TJ 数组中的位移（千分之一文字空间单位）
    pub fn adjust(&mut self, amount: f64) {
        let tx = -amount / 1000.0 * self.font_size * self.horizontal_scaling;
        self.advance(tx);
    }

    fn advance(&mut self, tx: f64) {
        self.text_matrix = self.text_matrix.concat(&Matrix::translate(tx, 0.0));
    }
}

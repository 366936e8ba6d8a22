//! 从页面内容流提取文字片段

use lopdf::content::Content;
use lopdf::{Document, ObjectId};
use quill_core::{Point, TextContentOptions, TextRun};

use crate::content::{show_items, Glyph, ShowItem, TextState};
use crate::error::{PdfError, Result};
use crate::utils::get_page_content;

/// 按 WinAnsi 近似解码单字节
fn decode_byte(byte: u8) -> char {
    char::from(byte)
}

fn length(p: Point) -> f64 {
    (p.x * p.x + p.y * p.y).sqrt()
}

/// 一次显示操作的字形 → 文字片段，首尾空白不计入
fn glyphs_to_run(glyphs: &[Glyph], options: &TextContentOptions) -> Option<TextRun> {
    let first = glyphs.iter().position(|g| !g.byte.is_ascii_whitespace())?;
    let last = glyphs.iter().rposition(|g| !g.byte.is_ascii_whitespace())?;
    let visible = &glyphs[first..=last];

    let raw: String = visible.iter().map(|g| decode_byte(g.byte)).collect();
    let text = options.apply(&raw);

    let start = visible[0].transform;
    let end_glyph = &visible[visible.len() - 1];
    let origin = start.apply(Point::new(0.0, 0.0));
    let end = end_glyph
        .transform
        .apply(Point::new(end_glyph.advance, 0.0));
    let width = length(Point::new(end.x - origin.x, end.y - origin.y));
    let height = length(start.apply_vector(Point::new(0.0, 1.0)));

    Some(TextRun::new(text, start, width, height))
}

/// 解析内容流数据
pub fn extract_runs(content_data: &[u8], options: &TextContentOptions) -> Result<Vec<TextRun>> {
    if content_data.is_empty() {
        return Ok(Vec::new());
    }
    let content = Content::decode(content_data).map_err(|e| PdfError::Content(e.to_string()))?;

    let mut state = TextState::new();
    let mut runs = Vec::new();

    for op in &content.operations {
        state.apply(op);
        if !state.in_text_object() {
            continue;
        }
        let Some(items) = show_items(op) else {
            continue;
        };

        let mut glyphs = Vec::new();
        for item in items {
            match item {
                ShowItem::Text(bytes) => glyphs.extend(state.show(&bytes)),
                ShowItem::Adjust(amount) => state.adjust(amount),
            }
        }
        if let Some(run) = glyphs_to_run(&glyphs, options) {
            log::debug!(
                "[Extract] {:?} @ ({:.2}, {:.2})",
                run.text,
                run.transform.e(),
                run.transform.f()
            );
            runs.push(run);
        }
    }

    Ok(runs)
}

/// 提取页面文字片段，顺序与内容流一致
pub fn extract_page_runs(
    doc: &Document,
    page_id: ObjectId,
    options: &TextContentOptions,
) -> Result<Vec<TextRun>> {
    let content_data = get_page_content(doc, page_id)?;
    extract_runs(&content_data, options)
}

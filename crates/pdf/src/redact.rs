//! 文字抹除：把落在矩形内的字符替换为空格，使其无法再被复制或提取

use lopdf::content::{Content, Operation};
use lopdf::Object;
use quill_core::Rect;

use crate::content::{Glyph, TextState};
use crate::error::{PdfError, Result};
use crate::utils::get_number;

/// 相交检测时矩形的外扩量（页面单位）
pub const ERASE_MARGIN: f64 = 0.5;

fn glyph_in_rects(glyph: &Glyph, rects: &[Rect]) -> bool {
    let bounds = glyph.bounds();
    rects
        .iter()
        .any(|r| r.inflate(ERASE_MARGIN).intersects(&bounds))
}

/// 绘制一个字符串，返回替换后的字节与替换数量
fn redact_string(state: &mut TextState, bytes: &[u8], rects: &[Rect]) -> (Vec<u8>, usize) {
    let mut erased = 0;
    let result = state
        .show(bytes)
        .iter()
        .map(|glyph| {
            // 用空格替代：保持后续字符位置不变
            if glyph.byte != b' ' && glyph_in_rects(glyph, rects) {
                erased += 1;
                b' '
            } else {
                glyph.byte
            }
        })
        .collect();
    (result, erased)
}

fn redact_operand(state: &mut TextState, operand: &Object, rects: &[Rect]) -> (Object, usize) {
    match operand {
        Object::String(s, fmt) => {
            let (bytes, erased) = redact_string(state, s, rects);
            (Object::String(bytes, *fmt), erased)
        }
        other => (other.clone(), 0),
    }
}

/// 处理内容流，将矩形内的文字替换为空格
///
/// 返回新的内容流与被抹除的字符数。
pub fn erase_text(content_data: &[u8], rects: &[Rect]) -> Result<(Vec<u8>, usize)> {
    if content_data.is_empty() || rects.is_empty() {
        return Ok((content_data.to_vec(), 0));
    }
    let content = Content::decode(content_data).map_err(|e| PdfError::Content(e.to_string()))?;

    let mut state = TextState::new();
    let mut new_operations: Vec<Operation> = Vec::with_capacity(content.operations.len());
    let mut total = 0;

    for op in content.operations {
        state.apply(&op);
        if !state.in_text_object() {
            new_operations.push(op);
            continue;
        }

        let (new_op, erased) = match op.operator.as_str() {
            "Tj" | "'" if !op.operands.is_empty() => {
                let (operand, erased) = redact_operand(&mut state, &op.operands[0], rects);
                (Operation::new(&op.operator, vec![operand]), erased)
            }
            "\"" if op.operands.len() >= 3 => {
                let mut operands = op.operands.clone();
                let (operand, erased) = redact_operand(&mut state, &op.operands[2], rects);
                operands[2] = operand;
                (Operation::new("\"", operands), erased)
            }
            "TJ" => match op.operands.first() {
                Some(Object::Array(arr)) => {
                    let mut erased = 0;
                    let mut new_array = Vec::with_capacity(arr.len());
                    for item in arr {
                        if let Some(amount) = get_number(item) {
                            state.adjust(amount);
                            new_array.push(item.clone());
                        } else {
                            let (operand, n) = redact_operand(&mut state, item, rects);
                            erased += n;
                            new_array.push(operand);
                        }
                    }
                    (Operation::new("TJ", vec![Object::Array(new_array)]), erased)
                }
                _ => (op.clone(), 0),
            },
            _ => (op.clone(), 0),
        };

        if erased > 0 {
            log::info!(
                "[Redact] {} 抹除 {} 个字符",
                new_op.operator,
                erased
            );
            total += erased;
            new_operations.push(new_op);
        } else {
            new_operations.push(op);
        }
    }

    let new_content = Content {
        operations: new_operations,
    };
    let encoded = new_content
        .encode()
        .map_err(|e| PdfError::Content(e.to_string()))?;
    Ok((encoded, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_runs;
    use quill_core::TextContentOptions;

    fn texts(content: &[u8]) -> Vec<String> {
        extract_runs(content, &TextContentOptions::default())
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect()
    }

    #[test]
    fn test_erases_only_glyphs_inside_rect() {
        let data = b"BT /F1 10 Tf 100 100 Td (abcdef) Tj ET";
        // 覆盖前三个字符：每个 5.5 宽
        let rect = Rect::new(100.0, 100.0, 16.0, 10.0);
        let (out, erased) = erase_text(data, &[rect]).unwrap();
        assert_eq!(erased, 3);
        assert_eq!(texts(&out), vec!["def".to_string()]);
        let runs = extract_runs(&out, &TextContentOptions::default()).unwrap();
        assert!((runs[0].transform.e() - 116.5).abs() < 1e-3);
    }

    #[test]
    fn test_tj_array_keeps_adjustments() {
        let data = b"BT /F1 10 Tf 0 0 Td [(ab) 500 (cd)] TJ ET";
        let rect = Rect::new(0.0, 0.0, 200.0, 10.0);
        let (out, erased) = erase_text(data, &[rect]).unwrap();
        assert_eq!(erased, 4);
        assert!(texts(&out).is_empty());
        assert!(String::from_utf8_lossy(&out).contains("500"));
    }

    #[test]
    fn test_text_outside_rect_is_untouched() {
        let data = b"BT /F1 12 Tf 72 700 Td (Keep me) Tj 0 -100 Td (Drop me) Tj ET";
        let rect = Rect::new(72.0, 600.0, 60.0, 12.0);
        let (out, erased) = erase_text(data, &[rect]).unwrap();
        assert_eq!(erased, 6);
        assert_eq!(texts(&out), vec!["Keep me".to_string()]);
    }

    #[test]
    fn test_no_rects_returns_input() {
        let data = b"BT (x) Tj ET".to_vec();
        let (out, erased) = erase_text(&data, &[]).unwrap();
        assert_eq!(out, data);
        assert_eq!(erased, 0);
    }
}

use lopdf::{Document, Object, ObjectId, Stream};
use quill_core::{PageGeometry, Rect};

use crate::error::{PdfError, Result};

/// 从数组对象中提取边界框坐标
fn extract_box_values(arr: &[Object]) -> Option<Rect> {
    let values: Vec<f64> = arr.iter().filter_map(get_number).collect();
    if values.len() == 4 {
        Some(Rect::from_corners(
            values[0].min(values[2]),
            values[1].min(values[3]),
            values[0].max(values[2]),
            values[1].max(values[3]),
        ))
    } else {
        None
    }
}

/// 从 Object 获取数值
pub fn get_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// 页码（从 1 开始）→ 页面对象
pub fn page_id(doc: &Document, page_number: u32) -> Result<ObjectId> {
    doc.get_pages()
        .get(&page_number)
        .copied()
        .ok_or(PdfError::PageNotFound(page_number))
}

/// 读取页面属性，自身没有时沿 Parent 链查找
pub fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    // 页面树层级有限，防止循环引用
    for _ in 0..32 {
        if let Ok(value) = current.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        let parent = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// 获取页面的旋转角度
fn get_page_rotation(doc: &Document, page_id: ObjectId) -> i32 {
    inherited_attribute(doc, page_id, b"Rotate")
        .and_then(get_number)
        .map(|r| r as i32)
        .unwrap_or(0)
}

/// 获取页面的有效边界框（优先使用 CropBox，否则使用 MediaBox）和旋转角度
pub fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let rotation = get_page_rotation(doc, page_id);

    let find_box = |key: &[u8]| match inherited_attribute(doc, page_id, key) {
        Some(Object::Array(arr)) => extract_box_values(arr),
        _ => None,
    };

    let media_box = find_box(b"CropBox")
        .or_else(|| find_box(b"MediaBox"))
        .filter(|r| r.width > 0.0 && r.height > 0.0)
        .unwrap_or_else(|| {
            log::warn!("[MediaBox] 使用默认 Letter 尺寸");
            PageGeometry::default().media_box
        });

    log::debug!("[MediaBox] 边界框 {:?}, 旋转 {} 度", media_box, rotation);
    PageGeometry::new(media_box, rotation)
}

/// 获取流内容（支持压缩和未压缩的流）
pub fn get_stream_content(stream: &Stream) -> Vec<u8> {
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(_) => stream.content.clone(),
    }
}

/// 获取页面的内容流数据，多个流以换行拼接
pub fn get_page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let dict = doc.get_dictionary(page_id)?;

    let contents = match dict.get(b"Contents") {
        Ok(contents) => contents,
        // 没有内容流的页面是空白页
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Reference(ref_id) => match doc.get_object(*ref_id)? {
            Object::Stream(stream) => Ok(get_stream_content(stream)),
            Object::Array(arr) => Ok(concat_streams(doc, arr)),
            _ => Err(PdfError::Content("Contents 不是流".to_string())),
        },
        Object::Array(arr) => Ok(concat_streams(doc, arr)),
        Object::Stream(stream) => Ok(get_stream_content(stream)),
        _ => Err(PdfError::Content("无法获取页面内容".to_string())),
    }
}

fn concat_streams(doc: &Document, arr: &[Object]) -> Vec<u8> {
    let mut all_content = Vec::new();
    for item in arr {
        if let Object::Reference(ref_id) = item {
            if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                all_content.extend(get_stream_content(stream));
                all_content.push(b'\n');
            }
        }
    }
    all_content
}

/// 用单个新流替换页面内容
pub fn set_page_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let stream_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), content));
    let dict = doc.get_dictionary_mut(page_id)?;
    dict.set("Contents", Object::Reference(stream_id));
    Ok(())
}

//! lopdf 页面修改器
//!
//! 绘制操作先按页收集，保存时统一写回：先对原内容流执行文字抹除，
//! 再以 `q … Q` 包裹原内容并追加覆盖层。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use quill_core::{
    Color, MutableDocument, MutablePage, PageMutator, Point, Rect, Result, ViewerError,
};

use crate::error::PdfError;
use crate::redact::erase_text;
use crate::utils::{get_page_content, inherited_attribute, page_geometry, set_page_content};

/// 覆盖层文字使用的字体资源名
pub const OVERLAY_FONT: &str = "QuillF1";

/// 透明度状态资源名前缀
const OPACITY_PREFIX: &str = "QuillGS";

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn to_viewer(e: PdfError) -> ViewerError {
    ViewerError::mutation(e)
}

/// 标准 14 字体只支持单字节编码，无法表示的字符写为 `?`
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn check_finite(values: &[f64]) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ViewerError::mutation("坐标或尺寸不是有限数值"))
    }
}

#[derive(Debug, Default)]
struct PendingPage {
    erase: Vec<Rect>,
    overlay: Vec<Operation>,
    uses_font: bool,
    /// (资源名, 透明度)
    opacities: Vec<(String, f64)>,
}

impl PendingPage {
    fn is_empty(&self) -> bool {
        self.erase.is_empty() && self.overlay.is_empty()
    }

    fn opacity_state(&mut self, opacity: f64) -> String {
        if let Some((name, _)) = self
            .opacities
            .iter()
            .find(|(_, o)| (*o - opacity).abs() < f64::EPSILON)
        {
            return name.clone();
        }
        let name = format!("{}{}", OPACITY_PREFIX, self.opacities.len() + 1);
        self.opacities.push((name.clone(), opacity));
        name
    }
}

/// 基于 lopdf 的 [`PageMutator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfMutator;

impl LopdfMutator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageMutator for LopdfMutator {
    async fn load_document(&self, bytes: Arc<Vec<u8>>) -> Result<Box<dyn MutableDocument>> {
        let doc = Document::load_mem(&bytes).map_err(|e| ViewerError::Load(e.to_string()))?;
        Ok(Box::new(LopdfDocument::new(doc)))
    }
}

pub struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    pending: BTreeMap<usize, PendingPage>,
    font_id: Option<ObjectId>,
}

impl LopdfDocument {
    pub fn new(doc: Document) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self {
            doc,
            pages,
            pending: BTreeMap::new(),
            font_id: None,
        }
    }

    fn overlay_font(&mut self) -> ObjectId {
        if let Some(id) = self.font_id {
            return id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.font_id = Some(id);
        id
    }

    /// 把覆盖层需要的字体与透明度写入页面资源，返回暂存名到最终资源名的映射
    ///
    /// 资源字典（含继承来的）复制为页面自身的内联字典后再修改，不影响共享资源的其他页面。
    /// 之前保存时写入的字体与透明度状态按值复用，新状态使用未被占用的名字。
    fn install_resources(
        &mut self,
        page_id: ObjectId,
        pending: &PendingPage,
    ) -> Result<BTreeMap<Vec<u8>, Vec<u8>>> {
        let mut renamed = BTreeMap::new();
        if !pending.uses_font && pending.opacities.is_empty() {
            return Ok(renamed);
        }

        let mut resources = match inherited_attribute(&self.doc, page_id, b"Resources") {
            Some(Object::Dictionary(dict)) => dict.clone(),
            Some(_) => {
                return Err(to_viewer(PdfError::Resources(
                    "Resources 不是字典".to_string(),
                )))
            }
            None => Dictionary::new(),
        };

        if pending.uses_font {
            let mut fonts = self.resolve_subdict(&resources, b"Font");
            if !fonts.has(OVERLAY_FONT.as_bytes()) {
                let font_id = self.overlay_font();
                fonts.set(OVERLAY_FONT, Object::Reference(font_id));
            }
            resources.set("Font", Object::Dictionary(fonts));
        }

        if !pending.opacities.is_empty() {
            let mut states = self.resolve_subdict(&resources, b"ExtGState");
            for (name, opacity) in &pending.opacities {
                let target = match self.find_opacity_state(&states, *opacity) {
                    Some(existing) => existing,
                    None => {
                        let fresh = (1..)
                            .map(|n| format!("{}{}", OPACITY_PREFIX, n).into_bytes())
                            .find(|candidate| !states.has(candidate))
                            .unwrap_or_else(|| name.clone().into_bytes());
                        states.set(
                            fresh.clone(),
                            dictionary! {
                                "Type" => "ExtGState",
                                "ca" => real(*opacity),
                                "CA" => real(*opacity),
                            },
                        );
                        fresh
                    }
                };
                renamed.insert(name.clone().into_bytes(), target);
            }
            resources.set("ExtGState", Object::Dictionary(states));
        }

        let dict = self
            .doc
            .get_dictionary_mut(page_id)
            .map_err(|e| to_viewer(e.into()))?;
        dict.set("Resources", Object::Dictionary(resources));
        Ok(renamed)
    }

    /// 查找之前写入的同透明度状态
    fn find_opacity_state(&self, states: &Dictionary, opacity: f64) -> Option<Vec<u8>> {
        states.iter().find_map(|(key, value)| {
            if !key.starts_with(OPACITY_PREFIX.as_bytes()) {
                return None;
            }
            let state = match value {
                Object::Dictionary(dict) => dict,
                Object::Reference(id) => self.doc.get_dictionary(*id).ok()?,
                _ => return None,
            };
            let ca = state.get(b"ca").ok()?.as_float().ok()?;
            // 资源中以 f32 保存
            ((f64::from(ca) - opacity).abs() < 1e-4).then(|| key.clone())
        })
    }

    fn resolve_subdict(&self, resources: &Dictionary, key: &[u8]) -> Dictionary {
        match resources.get(key) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            Ok(Object::Reference(id)) => self
                .doc
                .get_dictionary(*id)
                .map(Dictionary::clone)
                .unwrap_or_default(),
            _ => Dictionary::new(),
        }
    }

    fn flush_page(&mut self, index: usize, pending: PendingPage) -> Result<()> {
        let page_id = self.pages[index];
        let mut content = get_page_content(&self.doc, page_id).map_err(to_viewer)?;

        if !pending.erase.is_empty() {
            let (erased_content, erased) =
                erase_text(&content, &pending.erase).map_err(to_viewer)?;
            log::info!(
                "[Mutator] 第 {} 页抹除 {} 个字符（{} 个区域）",
                index + 1,
                erased,
                pending.erase.len()
            );
            content = erased_content;
        }

        let renamed = self.install_resources(page_id, &pending)?;

        let mut overlay_ops = Vec::with_capacity(pending.overlay.len() + 2);
        overlay_ops.push(Operation::new("q", vec![]));
        overlay_ops.extend(pending.overlay.into_iter().map(|mut op| {
            if op.operator == "gs" {
                if let Some(Object::Name(name)) = op.operands.first_mut() {
                    if let Some(target) = renamed.get(name.as_slice()) {
                        *name = target.clone();
                    }
                }
            }
            op
        }));
        overlay_ops.push(Operation::new("Q", vec![]));
        let overlay = Content {
            operations: overlay_ops,
        }
        .encode()
        .map_err(|e| to_viewer(PdfError::Content(e.to_string())))?;

        // 原内容单独保存/恢复图形状态，覆盖层不受其中 cm 影响
        let mut data = Vec::with_capacity(content.len() + overlay.len() + 8);
        data.extend_from_slice(b"q\n");
        data.extend(content);
        data.extend_from_slice(b"\nQ\n");
        data.extend(overlay);

        set_page_content(&mut self.doc, page_id, data).map_err(to_viewer)
    }
}

#[async_trait]
impl MutableDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_mut(&mut self, index: usize) -> Result<Box<dyn MutablePage + '_>> {
        let page_id = *self.pages.get(index).ok_or_else(|| {
            ViewerError::mutation(format!("页面索引 {} 超出范围 (共 {} 页)", index, self.pages.len()))
        })?;
        let height = page_geometry(&self.doc, page_id).height();
        Ok(Box::new(LopdfPage {
            height,
            pending: self.pending.entry(index).or_default(),
        }))
    }

    async fn save(&mut self) -> Result<Vec<u8>> {
        let pending = std::mem::take(&mut self.pending);
        let mut touched = 0;
        for (index, page) in pending {
            if page.is_empty() {
                continue;
            }
            self.flush_page(index, page)?;
            touched += 1;
        }

        self.doc.compress();
        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| ViewerError::mutation(format!("保存 PDF 失败: {}", e)))?;
        log::info!(
            "[Mutator] 已保存: 修改 {} 页, {} 字节",
            touched,
            buffer.len()
        );
        Ok(buffer)
    }
}

/// 单页绘制，操作暂存于所属文档
struct LopdfPage<'a> {
    height: f64,
    pending: &'a mut PendingPage,
}

impl LopdfPage<'_> {
    fn fill_color(color: Color) -> Operation {
        Operation::new("rg", vec![real(color.r), real(color.g), real(color.b)])
    }

    fn stroke_color(color: Color) -> Operation {
        Operation::new("RG", vec![real(color.r), real(color.g), real(color.b)])
    }
}

impl MutablePage for LopdfPage<'_> {
    fn height(&self) -> f64 {
        self.height
    }

    fn draw_rectangle(&mut self, rect: Rect, color: Color, opacity: Option<f64>) -> Result<()> {
        check_finite(&[rect.x, rect.y, rect.width, rect.height])?;
        let mut ops = vec![Operation::new("q", vec![])];
        if let Some(opacity) = opacity {
            let name = self.pending.opacity_state(opacity.clamp(0.0, 1.0));
            ops.push(Operation::new("gs", vec![Object::Name(name.into_bytes())]));
        }
        ops.push(Self::fill_color(color));
        ops.push(Operation::new(
            "re",
            vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
        self.pending.overlay.extend(ops);
        Ok(())
    }

    fn draw_text(&mut self, text: &str, origin: Point, size: f64, color: Color) -> Result<()> {
        check_finite(&[origin.x, origin.y, size])?;
        if size <= 0.0 {
            return Err(ViewerError::mutation(format!("字号无效: {}", size)));
        }
        self.pending.uses_font = true;
        self.pending.overlay.extend([
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(OVERLAY_FONT.as_bytes().to_vec()), real(size)],
            ),
            Self::fill_color(color),
            Operation::new("Td", vec![real(origin.x), real(origin.y)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_latin1(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn draw_line(&mut self, start: Point, end: Point, thickness: f64, color: Color) -> Result<()> {
        check_finite(&[start.x, start.y, end.x, end.y, thickness])?;
        self.pending.overlay.extend([
            Operation::new("q", vec![]),
            Self::stroke_color(color),
            Operation::new("w", vec![real(thickness)]),
            Operation::new("m", vec![real(start.x), real(start.y)]),
            Operation::new("l", vec![real(end.x), real(end.y)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn erase_text(&mut self, rect: Rect) -> Result<()> {
        check_finite(&[rect.x, rect.y, rect.width, rect.height])?;
        self.pending.erase.push(rect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_page_runs;
    use crate::testing::{SampleLine, SamplePdf};
    use crate::utils::page_id;
    use quill_core::{DrawInstruction, TextContentOptions};

    fn sample() -> Arc<Vec<u8>> {
        Arc::new(
            SamplePdf::new()
                .page(vec![
                    SampleLine::new(72.0, 700.0, 12.0, "Secret value"),
                    SampleLine::new(72.0, 500.0, 12.0, "Public value"),
                ])
                .page(vec![SampleLine::new(72.0, 700.0, 12.0, "Second page")])
                .build(),
        )
    }

    fn page_texts(bytes: &[u8], page: u32) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        extract_page_runs(&doc, page_id(&doc, page).unwrap(), &TextContentOptions::default())
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect()
    }

    #[tokio::test]
    async fn test_erase_then_cover_removes_text() {
        let mutator = LopdfMutator::new();
        let mut doc = mutator.load_document(sample()).await.unwrap();
        {
            let mut page = doc.page_mut(0).unwrap();
            assert_eq!(page.height(), 792.0);
            let rect = Rect::new(72.0, 700.0, 80.0, 12.0);
            page.apply(&DrawInstruction::EraseText { rect }).unwrap();
            page.apply(&DrawInstruction::Rectangle {
                rect,
                color: Color::WHITE,
                opacity: None,
            })
            .unwrap();
        }
        let bytes = doc.save().await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(page_texts(&bytes, 1), vec!["Public value".to_string()]);
        assert_eq!(page_texts(&bytes, 2), vec!["Second page".to_string()]);
    }

    #[tokio::test]
    async fn test_overlay_text_is_extractable_and_uses_font_resource() {
        let mutator = LopdfMutator::new();
        let mut doc = mutator.load_document(sample()).await.unwrap();
        doc.page_mut(1)
            .unwrap()
            .draw_text("Added", Point::new(100.0, 100.0), 16.0, Color::BLACK)
            .unwrap();
        let bytes = doc.save().await.unwrap();

        let texts = page_texts(&bytes, 2);
        assert_eq!(texts, vec!["Second page".to_string(), "Added".to_string()]);

        let loaded = Document::load_mem(&bytes).unwrap();
        let pid = page_id(&loaded, 2).unwrap();
        let resources = loaded
            .get_dictionary(pid)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap();
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(OVERLAY_FONT.as_bytes()));
    }

    #[tokio::test]
    async fn test_highlight_registers_opacity_state() {
        let mutator = LopdfMutator::new();
        let mut doc = mutator.load_document(sample()).await.unwrap();
        {
            let mut page = doc.page_mut(0).unwrap();
            page.draw_rectangle(Rect::new(0.0, 0.0, 10.0, 10.0), Color::YELLOW, Some(0.5))
                .unwrap();
            page.draw_rectangle(Rect::new(20.0, 0.0, 10.0, 10.0), Color::YELLOW, Some(0.5))
                .unwrap();
        }
        let bytes = doc.save().await.unwrap();
        let loaded = Document::load_mem(&bytes).unwrap();
        let pid = page_id(&loaded, 1).unwrap();
        let resources = loaded
            .get_dictionary(pid)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap();
        let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        assert_eq!(states.len(), 1);
        assert!(states.has(b"QuillGS1"));
    }

    fn page_resources(bytes: &[u8], page: u32) -> Dictionary {
        let loaded = Document::load_mem(bytes).unwrap();
        let pid = page_id(&loaded, page).unwrap();
        loaded
            .get_dictionary(pid)
            .unwrap()
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .clone()
    }

    async fn highlight_and_save(bytes: Vec<u8>, opacity: f64) -> Vec<u8> {
        let mut doc = LopdfMutator::new()
            .load_document(Arc::new(bytes))
            .await
            .unwrap();
        doc.page_mut(0)
            .unwrap()
            .draw_rectangle(Rect::new(0.0, 0.0, 10.0, 10.0), Color::YELLOW, Some(opacity))
            .unwrap();
        doc.save().await.unwrap()
    }

    #[tokio::test]
    async fn test_later_saves_keep_earlier_opacity_states() {
        let first = highlight_and_save(sample().to_vec(), 0.3).await;
        let second = highlight_and_save(first, 0.6).await;
        let third = highlight_and_save(second, 0.3).await;

        let resources = page_resources(&third, 1);
        let states = resources.get(b"ExtGState").unwrap().as_dict().unwrap();
        assert_eq!(states.len(), 2);
        let ca = |name: &[u8]| {
            states.get(name).unwrap().as_dict().unwrap().get(b"ca").unwrap().as_float().unwrap()
        };
        assert!((ca(b"QuillGS1") - 0.3).abs() < 1e-4);
        assert!((ca(b"QuillGS2") - 0.6).abs() < 1e-4);

        let loaded = Document::load_mem(&third).unwrap();
        let content = get_page_content(&loaded, page_id(&loaded, 1).unwrap()).unwrap();
        let used: Vec<_> = Content::decode(&content)
            .unwrap()
            .operations
            .into_iter()
            .filter(|op| op.operator == "gs")
            .map(|op| op.operands[0].as_name().unwrap().to_vec())
            .collect();
        assert_eq!(
            used,
            vec![b"QuillGS1".to_vec(), b"QuillGS2".to_vec(), b"QuillGS1".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_repeated_text_commits_reuse_font_resource() {
        let mut bytes = sample().to_vec();
        let mut font_refs = Vec::new();
        for text in ["One", "Two"] {
            let mut doc = LopdfMutator::new()
                .load_document(Arc::new(bytes))
                .await
                .unwrap();
            doc.page_mut(0)
                .unwrap()
                .draw_text(text, Point::new(100.0, 100.0), 12.0, Color::BLACK)
                .unwrap();
            bytes = doc.save().await.unwrap();
            let resources = page_resources(&bytes, 1);
            let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
            font_refs.push(fonts.get(OVERLAY_FONT.as_bytes()).unwrap().as_reference().unwrap());
        }
        assert_eq!(font_refs[0], font_refs[1]);
        let texts = page_texts(&bytes, 1);
        assert!(texts.contains(&"One".to_string()));
        assert!(texts.contains(&"Two".to_string()));
    }

    #[tokio::test]
    async fn test_page_index_out_of_range() {
        let mutator = LopdfMutator::new();
        let mut doc = mutator.load_document(sample()).await.unwrap();
        assert_eq!(doc.page_count(), 2);
        assert!(matches!(doc.page_mut(2), Err(ViewerError::Mutation(_))));
    }

    #[tokio::test]
    async fn test_invalid_bytes_fail_to_load() {
        let mutator = LopdfMutator::new();
        let result = mutator.load_document(Arc::new(b"not a pdf".to_vec())).await;
        assert!(matches!(result, Err(ViewerError::Load(_))));
    }

    #[test]
    fn test_latin1_fallback() {
        assert_eq!(encode_latin1("café ✓"), vec![b'c', b'a', b'f', 0xe9, b' ', b'?']);
    }

    #[tokio::test]
    async fn test_non_finite_coordinates_are_rejected() {
        let mutator = LopdfMutator::new();
        let mut doc = mutator.load_document(sample()).await.unwrap();
        let mut page = doc.page_mut(0).unwrap();
        let err = page
            .draw_line(Point::new(f64::NAN, 0.0), Point::new(1.0, 1.0), 2.0, Color::BLACK)
            .unwrap_err();
        assert!(matches!(err, ViewerError::Mutation(_)));
    }
}

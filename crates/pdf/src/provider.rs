//! lopdf 内容提供方：解析文档、提取文字片段，光栅化交给注入的 [`Rasterizer`]

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use lopdf::{Document, ObjectId};
use quill_core::{
    ContentProvider, PageGeometry, ProvidedDocument, ProvidedPage, Rasterizer, Result,
    TextContentOptions, TextRun, ViewerError, ViewportTransform,
};

use crate::extract::extract_page_runs;
use crate::utils::page_geometry;

pub struct LopdfProvider {
    rasterizer: Arc<dyn Rasterizer>,
}

impl LopdfProvider {
    pub fn new(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self { rasterizer }
    }
}

#[async_trait]
impl ContentProvider for LopdfProvider {
    async fn load_document(&self, bytes: Arc<Vec<u8>>) -> Result<Arc<dyn ProvidedDocument>> {
        let doc = Document::load_mem(&bytes).map_err(|e| {
            log::error!("[Provider] 文档解析失败: {}", e);
            ViewerError::Load(e.to_string())
        })?;
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        log::info!("[Provider] 已加载文档: {} 页, {} 字节", pages.len(), bytes.len());
        Ok(Arc::new(LopdfDocumentView {
            bytes,
            doc: Arc::new(doc),
            pages,
            rasterizer: self.rasterizer.clone(),
        }))
    }
}

struct LopdfDocumentView {
    bytes: Arc<Vec<u8>>,
    doc: Arc<Document>,
    pages: Vec<ObjectId>,
    rasterizer: Arc<dyn Rasterizer>,
}

#[async_trait]
impl ProvidedDocument for LopdfDocumentView {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn page(&self, page_number: u32) -> Result<Arc<dyn ProvidedPage>> {
        let count = self.page_count();
        if page_number == 0 || page_number > count {
            return Err(ViewerError::PageOutOfRange {
                page: page_number,
                count,
            });
        }
        let page_id = self.pages[(page_number - 1) as usize];
        Ok(Arc::new(LopdfPageView {
            page_number,
            page_id,
            geometry: page_geometry(&self.doc, page_id),
            doc: self.doc.clone(),
            bytes: self.bytes.clone(),
            rasterizer: self.rasterizer.clone(),
        }))
    }
}

struct LopdfPageView {
    page_number: u32,
    page_id: ObjectId,
    geometry: PageGeometry,
    doc: Arc<Document>,
    bytes: Arc<Vec<u8>>,
    rasterizer: Arc<dyn Rasterizer>,
}

#[async_trait]
impl ProvidedPage for LopdfPageView {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    async fn render(&self, viewport: &ViewportTransform) -> Result<RgbaImage> {
        self.rasterizer
            .rasterize(&self.bytes, (self.page_number - 1) as usize, viewport)
            .await
    }

    async fn text_content(&self, options: &TextContentOptions) -> Result<Vec<TextRun>> {
        extract_page_runs(&self.doc, self.page_id, options)
            .map_err(|e| ViewerError::render(self.page_number, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SampleLine, SamplePdf};

    struct SolidRasterizer;

    #[async_trait]
    impl Rasterizer for SolidRasterizer {
        async fn rasterize(
            &self,
            _document: &[u8],
            _page_index: usize,
            viewport: &ViewportTransform,
        ) -> Result<RgbaImage> {
            let (w, h) = viewport.canvas_size();
            Ok(RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255])))
        }
    }

    fn provider() -> LopdfProvider {
        LopdfProvider::new(Arc::new(SolidRasterizer))
    }

    #[tokio::test]
    async fn test_load_and_read_page() {
        let bytes = SamplePdf::new()
            .page(vec![SampleLine::new(72.0, 700.0, 12.0, "Hello")])
            .page(vec![])
            .build();
        let doc = provider().load_document(Arc::new(bytes)).await.unwrap();
        assert_eq!(doc.page_count(), 2);

        let page = doc.page(1).await.unwrap();
        assert_eq!(page.page_number(), 1);
        let runs = page
            .text_content(&TextContentOptions::default())
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "Hello");

        let viewport = ViewportTransform::new(&page.geometry(), 1.5).unwrap();
        let raster = page.render(&viewport).await.unwrap();
        assert_eq!(raster.dimensions(), (918, 1188));

        let empty = doc.page(2).await.unwrap();
        assert!(empty
            .text_content(&TextContentOptions::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_page_out_of_range() {
        let bytes = SamplePdf::new().page(vec![]).build();
        let doc = provider().load_document(Arc::new(bytes)).await.unwrap();
        assert!(matches!(
            doc.page(0).await,
            Err(ViewerError::PageOutOfRange { page: 0, count: 1 })
        ));
        assert!(matches!(
            doc.page(2).await,
            Err(ViewerError::PageOutOfRange { page: 2, count: 1 })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_bytes_are_load_errors() {
        let result = provider()
            .load_document(Arc::new(b"not a pdf".to_vec()))
            .await;
        assert!(matches!(result, Err(ViewerError::Load(_))));
    }
}

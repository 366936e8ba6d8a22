//! 渲染管线
//!
//! 同一时刻最多一次渲染在进行。渲染期间的新请求写入待处理槽（后写覆盖先写），
//! 当前渲染结束后立即接着渲染待处理请求。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;
use quill_core::{
    ProvidedDocument, RasterTextSource, Result, TextContentOptions, ViewerError,
    ViewportTransform,
};
use quill_layout::{map_runs, SectionClusterer, SectionRegistry};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// 从 1 开始
    pub page_number: u32,
    pub scale: f64,
}

impl RenderRequest {
    pub fn new(page_number: u32, scale: f64) -> Self {
        Self { page_number, scale }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    Rendering,
}

/// 最近一次成功渲染的画布
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page_number: u32,
    pub viewport: ViewportTransform,
    pub raster: Arc<RgbaImage>,
}

/// 一次渲染的结果摘要
#[derive(Debug, Clone, PartialEq)]
pub struct PageSummary {
    pub page_number: u32,
    pub generation: u64,
    pub sections: usize,
    /// 文字片段来自 OCR
    pub ocr: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub request: RenderRequest,
    pub result: Result<PageSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// 已有渲染在进行，请求进入待处理槽
    Deferred(RenderRequest),
    /// 本次调用驱动完成的所有渲染，按执行顺序
    Completed(Vec<RenderPass>),
}

impl RenderOutcome {
    /// 最后一次渲染的结果；延迟的请求返回 `None`
    pub fn last(&self) -> Option<&RenderPass> {
        match self {
            RenderOutcome::Deferred(_) => None,
            RenderOutcome::Completed(passes) => passes.last(),
        }
    }
}

struct PipelineState {
    phase: PipelinePhase,
    pending: Option<RenderRequest>,
    document: Option<Arc<dyn ProvidedDocument>>,
    registry: Option<Arc<SectionRegistry>>,
    canvas: Option<Arc<RenderedPage>>,
}

pub struct RenderPipeline {
    state: Mutex<PipelineState>,
    generation: AtomicU64,
    clusterer: SectionClusterer,
    text_options: TextContentOptions,
    ocr: Option<Arc<dyn RasterTextSource>>,
}

/// 驱动 future 被丢弃时把状态恢复为空闲
struct PhaseGuard<'a> {
    state: &'a Mutex<PipelineState>,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.phase == PipelinePhase::Rendering {
            if let Some(pending) = state.pending.take() {
                log::warn!("[Pipeline] 渲染被中断，丢弃待处理请求: 第 {} 页", pending.page_number);
            }
            state.phase = PipelinePhase::Idle;
        }
    }
}

impl RenderPipeline {
    pub fn new(clusterer: SectionClusterer, text_options: TextContentOptions) -> Self {
        Self {
            state: Mutex::new(PipelineState {
                phase: PipelinePhase::Idle,
                pending: None,
                document: None,
                registry: None,
                canvas: None,
            }),
            generation: AtomicU64::new(0),
            clusterer,
            text_options,
            ocr: None,
        }
    }

    /// 页面没有文字片段时使用的 OCR 回退
    pub fn with_ocr(mut self, ocr: Arc<dyn RasterTextSource>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn phase(&self) -> PipelinePhase {
        self.state.lock().phase
    }

    pub fn pending(&self) -> Option<RenderRequest> {
        self.state.lock().pending
    }

    pub fn document(&self) -> Option<Arc<dyn ProvidedDocument>> {
        self.state.lock().document.clone()
    }

    /// 安装新打开的文档，清空上一文档的区块与画布
    pub fn set_document(&self, document: Arc<dyn ProvidedDocument>) {
        let mut state = self.state.lock();
        state.document = Some(document);
        state.registry = None;
        state.canvas = None;
        state.pending = None;
    }

    /// 替换为修改后重新加载的文档，保留当前区块与画布直到下一次渲染
    pub fn reload_document(&self, document: Arc<dyn ProvidedDocument>) {
        self.state.lock().document = Some(document);
    }

    pub fn registry(&self) -> Option<Arc<SectionRegistry>> {
        self.state.lock().registry.clone()
    }

    pub fn canvas(&self) -> Option<Arc<RenderedPage>> {
        self.state.lock().canvas.clone()
    }

    fn validate(&self, state: &PipelineState, request: &RenderRequest) -> Result<()> {
        let document = state.document.as_ref().ok_or(ViewerError::NoDocument)?;
        let count = document.page_count();
        if request.page_number == 0 || request.page_number > count {
            return Err(ViewerError::PageOutOfRange {
                page: request.page_number,
                count,
            });
        }
        if !request.scale.is_finite() || request.scale <= 0.0 {
            return Err(ViewerError::InvalidViewport(format!(
                "缩放比例无效: {}",
                request.scale
            )));
        }
        Ok(())
    }

    /// 请求渲染
    ///
    /// 校验失败时返回错误且不改变状态。正在渲染时返回 [`RenderOutcome::Deferred`]；
    /// 否则由本次调用驱动渲染，直到待处理槽为空。
    pub async fn request_render(&self, request: RenderRequest) -> Result<RenderOutcome> {
        {
            let mut state = self.state.lock();
            self.validate(&state, &request)?;
            if state.phase == PipelinePhase::Rendering {
                if let Some(previous) = state.pending.replace(request) {
                    log::debug!(
                        "[Pipeline] 覆盖待处理请求: 第 {} 页 -> 第 {} 页",
                        previous.page_number,
                        request.page_number
                    );
                }
                return Ok(RenderOutcome::Deferred(request));
            }
            state.phase = PipelinePhase::Rendering;
        }

        let _guard = PhaseGuard { state: &self.state };
        let mut passes = Vec::new();
        let mut current = request;
        loop {
            let result = self.render_pass(current).await;
            passes.push(RenderPass {
                request: current,
                result,
            });

            let next = {
                let mut state = self.state.lock();
                let next = state.pending.take();
                if next.is_none() {
                    state.phase = PipelinePhase::Idle;
                }
                next
            };
            match next {
                Some(request) => current = request,
                None => break,
            }
        }

        Ok(RenderOutcome::Completed(passes))
    }

    async fn render_pass(&self, request: RenderRequest) -> Result<PageSummary> {
        let page_number = request.page_number;
        let result = self.try_render(request).await;
        match &result {
            Ok(summary) => log::info!(
                "[Pipeline] 第 {} 页渲染完成: 缩放 {:.2}, {} 个区块, 代次 {}",
                page_number,
                request.scale,
                summary.sections,
                summary.generation
            ),
            Err(e) => log::error!("[Pipeline] 第 {} 页渲染失败: {}", page_number, e),
        }
        result
    }

    async fn try_render(&self, request: RenderRequest) -> Result<PageSummary> {
        let document = self.document().ok_or(ViewerError::NoDocument)?;
        let page = document.page(request.page_number).await?;
        let viewport = ViewportTransform::new(&page.geometry(), request.scale)?;

        let (raster, mut runs) = futures::try_join!(
            page.render(&viewport),
            page.text_content(&self.text_options)
        )?;

        let mut ocr = false;
        if runs.is_empty() {
            if let Some(source) = &self.ocr {
                match source.recognize(&raster, &viewport).await {
                    Ok(recognized) => {
                        log::info!(
                            "[Pipeline] 第 {} 页无文字层，OCR 识别到 {} 个片段",
                            request.page_number,
                            recognized.len()
                        );
                        ocr = !recognized.is_empty();
                        runs = recognized;
                    }
                    Err(e) => log::warn!("[Pipeline] OCR 回退失败: {}", e),
                }
            }
        }

        let positioned = map_runs(&viewport, &runs);
        let sections = self.clusterer.cluster(positioned);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let summary = PageSummary {
            page_number: request.page_number,
            generation,
            sections: sections.len(),
            ocr,
        };

        let registry = SectionRegistry::new(
            generation,
            request.page_number,
            viewport.clone(),
            sections,
        );
        let canvas = RenderedPage {
            page_number: request.page_number,
            viewport,
            raster: Arc::new(raster),
        };

        let mut state = self.state.lock();
        state.registry = Some(Arc::new(registry));
        state.canvas = Some(Arc::new(canvas));
        Ok(summary)
    }
}

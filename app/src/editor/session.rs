//! 编辑会话
//!
//! 持有当前文档字节、页码、缩放与编辑模式，按当前模式分发覆盖层与画布点击。
//! 修改按提交顺序串行执行：修改页面 → 重新编码 → 重新加载 → 重新渲染。

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use quill_core::{
    ContentProvider, DrawInstruction, EditIntent, PageMutator, Point, Rect, Result, ViewerError,
};
use quill_layout::{MutationTarget, MutationTranslator, Overlay, OverlayId, SectionRegistry};
use quill_render::{RenderOutcome, RenderPipeline, RenderRequest};
use tokio::sync::Mutex as AsyncMutex;

use super::mode::EditorMode;
use crate::config::AppConfig;

/// 视图参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub initial_scale: f64,
    pub zoom_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            initial_scale: 1.2,
            zoom_step: 0.2,
            min_scale: 0.2,
            max_scale: 8.0,
        }
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            initial_scale: config.initial_scale,
            zoom_step: config.zoom_step,
            min_scale: config.min_scale,
            max_scale: config.max_scale.max(config.min_scale),
        }
    }
}

/// 文字输入的作用对象
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PromptTarget {
    Overlay(OverlayId),
    /// 画布像素坐标
    Point(Point),
}

/// 等待用户输入文字的操作
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrompt {
    pub mode: EditorMode,
    pub target: PromptTarget,
    /// 编辑时为区块原文，其余为空
    pub initial_text: String,
    /// 打开提示时的渲染结果，为空时提交到当前结果
    pub snapshot: Option<ClickSnapshot>,
}

/// 点击时的文档与注册表
#[derive(Debug, Clone, PartialEq)]
pub struct ClickSnapshot {
    epoch: u64,
    registry: Arc<SectionRegistry>,
}

impl ClickSnapshot {
    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// 当前模式下点击无效果
    Ignored,
    NeedsText(TextPrompt),
    Applied(RenderOutcome),
    /// 覆盖层来自已被替换的渲染结果，点击被丢弃
    Stale,
}

struct SessionState {
    bytes: Option<Arc<Vec<u8>>>,
    page_count: u32,
    current_page: u32,
    scale: f64,
    mode: EditorMode,
    /// 每次打开文档递增
    epoch: u64,
}

fn round_scale(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub struct EditorSession {
    provider: Arc<dyn ContentProvider>,
    mutator: Arc<dyn PageMutator>,
    pipeline: RenderPipeline,
    translator: MutationTranslator,
    options: SessionOptions,
    state: Mutex<SessionState>,
    /// 公平锁，修改按到达顺序提交
    commits: AsyncMutex<()>,
}

impl EditorSession {
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        mutator: Arc<dyn PageMutator>,
        pipeline: RenderPipeline,
        translator: MutationTranslator,
        options: SessionOptions,
    ) -> Self {
        Self {
            provider,
            mutator,
            pipeline,
            translator,
            state: Mutex::new(SessionState {
                bytes: None,
                page_count: 0,
                current_page: 1,
                scale: options.initial_scale,
                mode: EditorMode::View,
                epoch: 0,
            }),
            options,
            commits: AsyncMutex::new(()),
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.state.lock().mode
    }

    pub fn set_mode(&self, mode: EditorMode) {
        self.state.lock().mode = mode;
    }

    /// 切换模式，返回切换后的模式
    pub fn toggle_mode(&self, mode: EditorMode) -> EditorMode {
        let mut state = self.state.lock();
        state.mode = state.mode.toggle(mode);
        log::debug!("[Session] 模式: {}", state.mode.name());
        state.mode
    }

    pub fn current_page(&self) -> u32 {
        self.state.lock().current_page
    }

    pub fn page_count(&self) -> u32 {
        self.state.lock().page_count
    }

    pub fn scale(&self) -> f64 {
        self.state.lock().scale
    }

    /// 当前文档字节（包含已提交的修改）
    pub fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        self.state.lock().bytes.clone()
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn registry(&self) -> Option<Arc<SectionRegistry>> {
        self.pipeline.registry()
    }

    pub fn overlays(&self) -> Vec<Overlay> {
        self.registry().map(|r| r.overlays()).unwrap_or_default()
    }

    /// 打开文档并渲染第一页
    ///
    /// 加载失败时会话状态不变。
    pub async fn open(&self, bytes: Vec<u8>) -> Result<RenderOutcome> {
        let bytes = Arc::new(bytes);
        let document = match self.provider.load_document(bytes.clone()).await {
            Ok(document) => document,
            Err(e) => {
                log::error!("[Session] 打开文档失败: {}", e);
                return Err(e);
            }
        };
        let page_count = document.page_count();
        if page_count == 0 {
            return Err(ViewerError::Load("文档没有页面".to_string()));
        }

        self.pipeline.set_document(document);
        let scale = {
            let mut state = self.state.lock();
            state.bytes = Some(bytes);
            state.page_count = page_count;
            state.current_page = 1;
            state.scale = self.options.initial_scale;
            state.mode = EditorMode::View;
            state.epoch += 1;
            state.scale
        };
        log::info!("[Session] 已打开文档: {} 页", page_count);
        self.pipeline
            .request_render(RenderRequest::new(1, scale))
            .await
    }

    /// 跳转到指定页，页码限制在 `[1, page_count]`
    pub async fn go_to_page(&self, page: u32) -> Result<RenderOutcome> {
        let (page, scale) = {
            let mut state = self.state.lock();
            if state.bytes.is_none() {
                return Err(ViewerError::NoDocument);
            }
            state.current_page = page.clamp(1, state.page_count);
            (state.current_page, state.scale)
        };
        self.pipeline
            .request_render(RenderRequest::new(page, scale))
            .await
    }

    pub async fn next_page(&self) -> Result<RenderOutcome> {
        let page = self.current_page().saturating_add(1);
        self.go_to_page(page).await
    }

    pub async fn prev_page(&self) -> Result<RenderOutcome> {
        let page = self.current_page().saturating_sub(1);
        self.go_to_page(page).await
    }

    pub async fn zoom_in(&self) -> Result<RenderOutcome> {
        let scale = self.scale() + self.options.zoom_step;
        self.zoom_to(scale).await
    }

    pub async fn zoom_out(&self) -> Result<RenderOutcome> {
        let scale = self.scale() - self.options.zoom_step;
        self.zoom_to(scale).await
    }

    /// 设置缩放比例，限制在 `[min_scale, max_scale]`
    pub async fn zoom_to(&self, scale: f64) -> Result<RenderOutcome> {
        if !scale.is_finite() {
            return Err(ViewerError::InvalidViewport(format!("缩放比例无效: {}", scale)));
        }
        let (page, scale) = {
            let mut state = self.state.lock();
            if state.bytes.is_none() {
                return Err(ViewerError::NoDocument);
            }
            state.scale = round_scale(
                scale
                    .min(self.options.max_scale)
                    .max(self.options.min_scale),
            );
            (state.current_page, state.scale)
        };
        self.pipeline
            .request_render(RenderRequest::new(page, scale))
            .await
    }

    /// 当前文档与注册表的快照
    fn snapshot(&self) -> Option<ClickSnapshot> {
        let epoch = {
            let state = self.state.lock();
            if state.bytes.is_none() {
                return None;
            }
            state.epoch
        };
        let registry = self.registry()?;
        Some(ClickSnapshot { epoch, registry })
    }

    /// 点击覆盖层
    ///
    /// 模式与注册表在调用时取得，排在其他修改之后的提交仍作用于被点击的区块。
    pub fn click_overlay(&self, id: OverlayId) -> impl Future<Output = Result<ClickOutcome>> + '_ {
        let mode = self.mode();
        let snapshot = self.snapshot();
        async move {
            let Some((snapshot, text)) = snapshot.and_then(|snapshot| {
                let text = snapshot.registry.section_text(id)?;
                Some((snapshot, text))
            }) else {
                log::debug!("[Session] 丢弃过期覆盖层点击: {:?}", id);
                return Ok(ClickOutcome::Stale);
            };

            let prompt = |initial_text: String| -> Result<ClickOutcome> {
                Ok(ClickOutcome::NeedsText(TextPrompt {
                    mode,
                    target: PromptTarget::Overlay(id),
                    initial_text,
                    snapshot: Some(snapshot.clone()),
                }))
            };
            let intent = match mode {
                EditorMode::View => return Ok(ClickOutcome::Ignored),
                EditorMode::EditText => return prompt(text),
                EditorMode::Comment | EditorMode::AddText => return prompt(String::new()),
                EditorMode::Delete => EditIntent::Delete,
                EditorMode::Highlight => EditIntent::Highlight,
                EditorMode::Underline => EditIntent::Underline,
                EditorMode::Strikethrough => EditIntent::Strikethrough,
            };
            self.commit_click(Some(snapshot), PromptTarget::Overlay(id), intent)
                .await
        }
    }

    /// 点击画布空白处（像素坐标），只在添加文字模式下有效
    pub fn click_canvas(&self, point: Point) -> impl Future<Output = Result<ClickOutcome>> + '_ {
        let mode = self.mode();
        let snapshot = self.snapshot();
        async move {
            match mode {
                EditorMode::AddText => Ok(ClickOutcome::NeedsText(TextPrompt {
                    mode: EditorMode::AddText,
                    target: PromptTarget::Point(point),
                    initial_text: String::new(),
                    snapshot,
                })),
                _ => Ok(ClickOutcome::Ignored),
            }
        }
    }

    /// 提交文字输入
    ///
    /// 编辑时文字为空或未改变、批注或添加的文字为空时不做修改，直接回到查看模式。
    pub fn submit_text(
        &self,
        prompt: &TextPrompt,
        text: &str,
    ) -> impl Future<Output = Result<ClickOutcome>> + '_ {
        let blank = text.trim().is_empty();
        let intent = match prompt.mode {
            EditorMode::EditText if blank || text == prompt.initial_text => Ok(None),
            EditorMode::EditText => Ok(Some(EditIntent::EditText {
                text: text.to_string(),
            })),
            EditorMode::Comment | EditorMode::AddText if blank => Ok(None),
            EditorMode::Comment => Ok(Some(EditIntent::Comment {
                text: text.to_string(),
            })),
            EditorMode::AddText => Ok(Some(EditIntent::AddText {
                text: text.to_string(),
            })),
            other => Err(ViewerError::mutation(format!(
                "{} 模式不接受文字输入",
                other.name()
            ))),
        };
        let mode = prompt.mode;
        let target = prompt.target;
        let snapshot = prompt.snapshot.clone();

        async move {
            match intent? {
                Some(intent) => self.commit_click(snapshot, target, intent).await,
                None => {
                    log::debug!("[Session] {} 无修改", mode.name());
                    self.set_mode(EditorMode::View);
                    Ok(ClickOutcome::Ignored)
                }
            }
        }
    }

    pub fn cancel_prompt(&self) {
        self.set_mode(EditorMode::View);
    }

    async fn commit_click(
        &self,
        snapshot: Option<ClickSnapshot>,
        target: PromptTarget,
        intent: EditIntent,
    ) -> Result<ClickOutcome> {
        match self.commit_with(snapshot, target, intent).await {
            Ok(outcome) => Ok(ClickOutcome::Applied(outcome)),
            Err(ViewerError::StaleOverlay) => Ok(ClickOutcome::Stale),
            Err(e) => Err(e),
        }
    }

    /// 对当前注册表提交一次修改并重新渲染当前页
    ///
    /// 成功后回到查看模式；失败时保留当前模式与已渲染的页面。
    pub async fn commit(&self, target: PromptTarget, intent: EditIntent) -> Result<RenderOutcome> {
        self.commit_with(None, target, intent).await
    }

    async fn commit_with(
        &self,
        snapshot: Option<ClickSnapshot>,
        target: PromptTarget,
        intent: EditIntent,
    ) -> Result<RenderOutcome> {
        let _turn = self.commits.lock().await;

        let (bytes, epoch) = {
            let state = self.state.lock();
            (state.bytes.clone(), state.epoch)
        };
        let bytes = bytes.ok_or(ViewerError::NoDocument)?;
        // 快照来自之前打开的文档时不能作用于当前文档
        let registry = match snapshot {
            Some(snapshot) if snapshot.epoch != epoch => return Err(ViewerError::StaleOverlay),
            Some(snapshot) => snapshot.registry,
            None => self.registry().ok_or(ViewerError::NoDocument)?,
        };
        let instructions = match target {
            PromptTarget::Overlay(id) => {
                let section = registry.get(id).ok_or(ViewerError::StaleOverlay)?;
                self.translator.translate(
                    MutationTarget::Section(section),
                    registry.viewport(),
                    &intent,
                )?
            }
            PromptTarget::Point(point) => {
                self.translator
                    .translate(MutationTarget::Point(point), registry.viewport(), &intent)?
            }
        };

        let page_number = registry.page_number();
        let saved = match self
            .apply_instructions(bytes, page_number.saturating_sub(1) as usize, &instructions)
            .await
        {
            Ok(saved) => saved,
            Err(e) => {
                log::error!("[Session] {} 提交失败: {}", intent.name(), e);
                return Err(e);
            }
        };

        let document = self.provider.load_document(saved.clone()).await?;
        self.pipeline.reload_document(document);
        let (page, scale) = {
            let mut state = self.state.lock();
            state.bytes = Some(saved);
            state.mode = EditorMode::View;
            (state.current_page, state.scale)
        };
        log::info!(
            "[Session] {} 已提交到第 {} 页 ({} 条指令)",
            intent.name(),
            page_number,
            instructions.len()
        );

        self.pipeline
            .request_render(RenderRequest::new(page, scale))
            .await
    }

    async fn apply_instructions(
        &self,
        bytes: Arc<Vec<u8>>,
        page_index: usize,
        instructions: &[DrawInstruction],
    ) -> Result<Arc<Vec<u8>>> {
        let mut document = self
            .mutator
            .load_document(bytes)
            .await
            .map_err(|e| match e {
                ViewerError::Load(message) => ViewerError::Mutation(message),
                other => other,
            })?;
        {
            let mut page = document.page_mut(page_index)?;
            for instruction in instructions {
                page.apply(instruction)?;
            }
        }
        Ok(Arc::new(document.save().await?))
    }

    /// 检测当前画布中的图像区域（像素坐标）
    pub fn detect_regions(&self) -> Result<Vec<Rect>> {
        let canvas = self.pipeline.canvas().ok_or(ViewerError::NoDocument)?;
        Ok(quill_ocr::detect_regions(&canvas.raster))
    }

    /// 导出当前文档
    pub fn export(&self, path: &Path) -> anyhow::Result<()> {
        let bytes = self.bytes().ok_or(ViewerError::NoDocument)?;
        std::fs::write(path, bytes.as_slice())
            .with_context(|| format!("写入 {:?} 失败", path))?;
        log::info!("[Session] 已导出: {:?} ({} 字节)", path, bytes.len());
        Ok(())
    }
}

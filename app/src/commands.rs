//! 命令行子命令

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use quill_core::{Point, Rasterizer, Rect};
use quill_layout::{MutationTranslator, SectionClusterer};
use quill_ocr::TesseractEngine;
use quill_pdf::{LopdfMutator, LopdfProvider};
use quill_render::{BlankRasterizer, PdfiumRasterizer, RenderOutcome, RenderPipeline};
use quill_verify::verify_erased;
use serde::Serialize;

use crate::config::AppConfig;
use crate::editor::{ClickOutcome, EditorMode, EditorSession, SessionOptions};

/// PDF 文字层查看与批注
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 配置文件路径（默认 <config_dir>/quill/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 同时写入日志文件
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 输出页面的文字区块（JSON）
    Sections {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        scale: Option<f64>,
    },

    /// 对一个文字区块执行编辑操作并导出
    Annotate {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// 区块序号（见 sections 输出）
        #[arg(long)]
        section: usize,
        #[arg(long, value_enum)]
        action: Action,
        /// 编辑与批注使用的文字
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        scale: Option<f64>,
        #[arg(short, long)]
        output: PathBuf,
        /// 删除后重新提取文字，确认区域内已无文字
        #[arg(long)]
        verify: bool,
    },

    /// 在画布坐标处添加文字并导出
    AddText {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// 画布像素坐标（按 --scale 缩放后的画布，原点左上）
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        text: String,
        #[arg(long)]
        scale: Option<f64>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// 检测页面画布中的图像区域（JSON，像素坐标）
    Regions {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        scale: Option<f64>,
    },

    /// 用 Tesseract 识别页面画布（JSON，像素坐标）
    Ocr {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        scale: Option<f64>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Delete,
    Highlight,
    Underline,
    Strikethrough,
    Edit,
    Comment,
}

impl Action {
    fn mode(self) -> EditorMode {
        match self {
            Action::Delete => EditorMode::Delete,
            Action::Highlight => EditorMode::Highlight,
            Action::Underline => EditorMode::Underline,
            Action::Strikethrough => EditorMode::Strikethrough,
            Action::Edit => EditorMode::EditText,
            Action::Comment => EditorMode::Comment,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SectionReport {
    index: usize,
    text: String,
    /// 像素坐标（`y` 为上边）
    rect: Rect,
    /// 页面坐标（`y` 为下边）
    page_rect: Rect,
}

fn build_session(config: &AppConfig) -> EditorSession {
    let pdfium = PdfiumRasterizer::new(config.pdfium_library_path.as_ref().map(PathBuf::from));
    let rasterizer: Arc<dyn Rasterizer> = if pdfium.is_available() {
        Arc::new(pdfium)
    } else {
        log::warn!("[Pdfium] pdfium 不可用，使用空白画布");
        Arc::new(BlankRasterizer)
    };

    let mut pipeline = RenderPipeline::new(SectionClusterer::new(config.cluster), config.text);
    if config.ocr.enabled {
        match TesseractEngine::new(config.ocr.tesseract.clone()) {
            Ok(engine) => pipeline = pipeline.with_ocr(Arc::new(engine)),
            Err(e) => log::warn!("[Tesseract] OCR 回退不可用: {}", e),
        }
    }

    EditorSession::new(
        Arc::new(LopdfProvider::new(rasterizer)),
        Arc::new(LopdfMutator::new()),
        pipeline,
        MutationTranslator::new(config.style.clone()),
        SessionOptions::from(config),
    )
}

fn ensure_rendered(outcome: &RenderOutcome) -> anyhow::Result<()> {
    match outcome.last() {
        Some(pass) => match &pass.result {
            Ok(_) => Ok(()),
            Err(e) => bail!("第 {} 页渲染失败: {}", pass.request.page_number, e),
        },
        None => bail!("渲染被延迟"),
    }
}

async fn open_at(
    session: &EditorSession,
    file: &Path,
    page: u32,
    scale: Option<f64>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("读取 {:?} 失败", file))?;
    session.open(bytes).await?;
    if let Some(scale) = scale {
        session.zoom_to(scale).await?;
    }
    let outcome = session.go_to_page(page).await?;
    ensure_rendered(&outcome)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(session: &EditorSession, outcome: ClickOutcome, output: &Path) -> anyhow::Result<()> {
    match outcome {
        ClickOutcome::Applied(outcome) => ensure_rendered(&outcome)?,
        ClickOutcome::Ignored => log::warn!("[Session] 没有可提交的修改"),
        ClickOutcome::Stale => bail!("区块已过期"),
        ClickOutcome::NeedsText(_) => bail!("缺少输入文字"),
    }
    session.export(output)
}

pub async fn execute(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    let session = build_session(config);

    match command {
        Command::Sections { file, page, scale } => {
            open_at(&session, &file, page, scale).await?;
            let registry = session.registry().context("页面没有渲染结果")?;
            let reports: Vec<_> = registry
                .overlays()
                .into_iter()
                .map(|overlay| SectionReport {
                    index: overlay.id.index,
                    page_rect: registry.viewport().rect_to_page(&overlay.rect),
                    rect: overlay.rect,
                    text: overlay.text,
                })
                .collect();
            print_json(&reports)
        }

        Command::Annotate {
            file,
            page,
            section,
            action,
            text,
            scale,
            output,
            verify,
        } => {
            open_at(&session, &file, page, scale).await?;
            let registry = session.registry().context("页面没有渲染结果")?;
            let page = registry.page_number();
            let overlay = registry
                .overlays()
                .into_iter()
                .nth(section)
                .with_context(|| format!("第 {} 页没有区块 {}", page, section))?;
            let page_rect = registry.viewport().rect_to_page(&overlay.rect);

            session.set_mode(action.mode());
            let outcome = match session.click_overlay(overlay.id).await? {
                ClickOutcome::NeedsText(prompt) => {
                    let text = text.as_deref().context("该操作需要 --text")?;
                    session.submit_text(&prompt, text).await?
                }
                other => other,
            };
            finish(&session, outcome, &output)?;

            if verify {
                if action != Action::Delete {
                    log::warn!("[Verify] 只有删除操作需要校验，已跳过");
                    return Ok(());
                }
                let bytes = session.bytes().context("没有文档")?;
                let provider = LopdfProvider::new(Arc::new(BlankRasterizer));
                let result = verify_erased(&provider, bytes, page, &[page_rect]).await?;
                print_json(&result)?;
                if !result.ok {
                    bail!("校验失败: 删除区域内仍有文字");
                }
            }
            Ok(())
        }

        Command::AddText {
            file,
            page,
            x,
            y,
            text,
            scale,
            output,
        } => {
            open_at(&session, &file, page, scale).await?;
            session.set_mode(EditorMode::AddText);
            let outcome = match session.click_canvas(Point::new(x, y)).await? {
                ClickOutcome::NeedsText(prompt) => session.submit_text(&prompt, &text).await?,
                other => other,
            };
            finish(&session, outcome, &output)
        }

        Command::Regions { file, page, scale } => {
            open_at(&session, &file, page, scale).await?;
            print_json(&session.detect_regions()?)
        }

        Command::Ocr { file, page, scale } => {
            open_at(&session, &file, page, scale).await?;
            let canvas = session.pipeline().canvas().context("页面没有渲染结果")?;
            let engine = TesseractEngine::new(config.ocr.tesseract.clone())?;
            let words = engine.recognize_words(&canvas.raster)?;
            print_json(&words)
        }
    }
}

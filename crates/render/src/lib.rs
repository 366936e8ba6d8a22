//! 页面渲染：单飞渲染管线与光栅化器

mod blank;
mod pdfium;
mod pipeline;

pub use blank::BlankRasterizer;
pub use pdfium::{bind_pdfium, PdfiumRasterizer};
pub use pipeline::{
    PageSummary, PipelinePhase, RenderOutcome, RenderPass, RenderPipeline, RenderRequest,
    RenderedPage,
};

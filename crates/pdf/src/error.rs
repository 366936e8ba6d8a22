use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF 解析失败: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("页面 {0} 不存在")]
    PageNotFound(u32),

    #[error("内容流处理失败: {0}")]
    Content(String),

    #[error("资源字典无效: {0}")]
    Resources(String),
}

pub type Result<T> = std::result::Result<T, PdfError>;

//! 查看器错误类型

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ViewerError {
    /// 内容提供方拒绝输入（格式损坏、无法读取）
    #[error("文档加载失败: {0}")]
    Load(String),

    /// 光栅化或文本提取失败
    #[error("页面 {page} 渲染失败: {message}")]
    Render { page: u32, message: String },

    /// 页面修改、重新编码或重新加载失败
    #[error("文档修改失败: {0}")]
    Mutation(String),

    #[error("尚未加载文档")]
    NoDocument,

    #[error("页码 {page} 超出范围 (共 {count} 页)")]
    PageOutOfRange { page: u32, count: u32 },

    #[error("视口无效: {0}")]
    InvalidViewport(String),

    /// 覆盖层引用来自已被替换的渲染结果
    #[error("覆盖层已过期")]
    StaleOverlay,
}

impl ViewerError {
    pub fn render(page: u32, message: impl std::fmt::Display) -> Self {
        ViewerError::Render {
            page,
            message: message.to_string(),
        }
    }

    pub fn mutation(message: impl std::fmt::Display) -> Self {
        ViewerError::Mutation(message.to_string())
    }
}

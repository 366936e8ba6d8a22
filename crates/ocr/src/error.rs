//! OCR 错误类型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Tesseract 不可用: {0}")]
    Unavailable(String),

    #[error("图像处理失败: {0}")]
    ImageProcess(String),

    #[error("识别失败: {0}")]
    Recognition(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

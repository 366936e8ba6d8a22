//! 扫描页面的文字识别与区域检测
//!
//! 文字识别通过 Tesseract 命令行完成，结果转换为页面坐标的文字片段，
//! 作为没有文字层页面的回退来源。

mod error;
mod regions;
mod tesseract;
mod words;

pub use error::OcrError;
pub use regions::{detect_regions, BINARY_THRESHOLD, MIN_REGION_SIZE};
pub use tesseract::{
    get_tesseract_version, parse_tesseract_tsv, TesseractConfig, TesseractEngine,
};
pub use words::{words_to_runs, OcrWord};

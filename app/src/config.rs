use std::fs;
use std::path::{Path, PathBuf};

use quill_core::TextContentOptions;
use quill_layout::{AnnotationStyle, ClusterOptions};
use quill_ocr::TesseractConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ 视图 ============
    /// 打开文档时的缩放比例
    pub initial_scale: f64,
    pub zoom_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,

    // ============ 文字层 ============
    pub cluster: ClusterOptions,
    pub text: TextContentOptions,
    pub style: AnnotationStyle,

    // ============ OCR ============
    pub ocr: OcrSettings,

    /// pdfium 动态库所在目录，未设置时按默认路径查找
    pub pdfium_library_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            initial_scale: 1.2,
            zoom_step: 0.2,
            min_scale: 0.2,
            max_scale: 8.0,
            cluster: ClusterOptions::default(),
            text: TextContentOptions::default(),
            style: AnnotationStyle::default(),
            ocr: OcrSettings::default(),
            pdfium_library_path: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrSettings {
    /// 页面没有文字层时是否用 Tesseract 回退
    pub enabled: bool,
    pub tesseract: TesseractConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("quill").join("config.json"))
}

/// 文件不存在时返回默认配置
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::info!("[Config] 配置文件不存在，使用默认配置: {:?}", path);
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    let config = serde_json::from_str(&raw)?;
    log::info!("[Config] 已加载配置: {:?}", path);
    Ok(config)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    log::info!("[Config] 配置已保存: {:?}", path);
    Ok(())
}

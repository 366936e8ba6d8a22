//! Tesseract OCR 引擎实现（CLI 包装）

use std::process::Command;
use std::time::Instant;

use async_trait::async_trait;
use image::RgbaImage;
use quill_core::{
    RasterTextSource, Rect, Result as ViewerResult, TextRun, ViewerError, ViewportTransform,
};
use serde::{Deserialize, Serialize};

use crate::error::OcrError;
use crate::words::{words_to_runs, OcrWord};

/// Tesseract 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TesseractConfig {
    /// Tesseract 可执行文件路径
    pub binary_path: Option<String>,
    /// tessdata 目录路径
    pub tessdata_path: Option<String>,
    /// 语言（如 "eng" 或 "chi_sim+eng"）
    pub lang: Option<String>,
    /// 页面分割模式 (0-13)
    pub psm: Option<u8>,
    /// OCR 引擎模式 (0-3)
    pub oem: Option<u8>,
    /// 低于此置信度的单词丢弃 (0-1)
    pub min_confidence: Option<f32>,
}

impl TesseractConfig {
    pub fn binary_or_default(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }

    pub fn lang_or_default(&self) -> &str {
        self.lang.as_deref().unwrap_or("eng")
    }

    pub fn psm_or_default(&self) -> u8 {
        self.psm.unwrap_or(6)
    }

    pub fn oem_or_default(&self) -> u8 {
        self.oem.unwrap_or(1)
    }

    pub fn min_confidence_or_default(&self) -> f32 {
        self.min_confidence.unwrap_or(0.0)
    }
}

/// Tesseract OCR 引擎
pub struct TesseractEngine {
    config: TesseractConfig,
    version: String,
}

impl TesseractEngine {
    /// 创建 Tesseract 引擎，先验证可执行文件可用
    pub fn new(config: TesseractConfig) -> Result<Self, OcrError> {
        let version = get_tesseract_version(config.binary_or_default())?;
        log::info!("[Tesseract] 初始化成功，版本: {}", version);
        Ok(Self { config, version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    /// 识别图片，返回单词级结果（像素坐标）
    pub fn recognize_words(&self, raster: &RgbaImage) -> Result<Vec<OcrWord>, OcrError> {
        let start = Instant::now();

        let temp_input = tempfile::Builder::new()
            .prefix("quill_ocr_")
            .suffix(".png")
            .tempfile()?;
        raster
            .save_with_format(temp_input.path(), image::ImageFormat::Png)
            .map_err(|e| OcrError::ImageProcess(format!("保存临时图片失败: {}", e)))?;

        let mut cmd = Command::new(self.config.binary_or_default());
        cmd.arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg(self.config.lang_or_default())
            .arg("--psm")
            .arg(self.config.psm_or_default().to_string())
            .arg("--oem")
            .arg(self.config.oem_or_default().to_string())
            .arg("tsv");

        // 设置 tessdata 路径
        if let Some(tessdata_path) = &self.config.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata_path);
        }

        log::debug!(
            "[Tesseract] 执行: {} {:?} -l {} --psm {} --oem {} tsv",
            self.config.binary_or_default(),
            temp_input.path(),
            self.config.lang_or_default(),
            self.config.psm_or_default(),
            self.config.oem_or_default()
        );

        let output = cmd
            .output()
            .map_err(|e| OcrError::Unavailable(format!("执行 tesseract 失败: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Recognition(format!("Tesseract 执行失败: {}", stderr)));
        }

        let words = parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout));

        log::info!(
            "[Tesseract] 识别完成，耗时: {} ms，结果数: {}",
            start.elapsed().as_millis(),
            words.len()
        );
        Ok(words)
    }
}

#[async_trait]
impl RasterTextSource for TesseractEngine {
    async fn recognize(
        &self,
        raster: &RgbaImage,
        viewport: &ViewportTransform,
    ) -> ViewerResult<Vec<TextRun>> {
        let words = self
            .recognize_words(raster)
            .map_err(|e| ViewerError::render(0, e))?;
        Ok(words_to_runs(
            &words,
            viewport,
            self.config.min_confidence_or_default(),
        ))
    }
}

/// 解析 Tesseract TSV 输出
///
/// TSV 格式：
/// level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
///
/// 只保留单词级别（level=5），bbox 为像素坐标。
pub fn parse_tesseract_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut results = Vec::new();

    // 跳过表头
    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level: i32 = cols[0].parse().unwrap_or(-1);
        let left: f64 = cols[6].parse().unwrap_or(0.0);
        let top: f64 = cols[7].parse().unwrap_or(0.0);
        let width: f64 = cols[8].parse().unwrap_or(0.0);
        let height: f64 = cols[9].parse().unwrap_or(0.0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();

        if level != 5 || text.is_empty() || conf < 0.0 || width <= 0.0 || height <= 0.0 {
            continue;
        }

        results.push(OcrWord {
            text: text.to_string(),
            // Tesseract 置信度是 0-100
            confidence: conf / 100.0,
            rect: Rect::new(left, top, width, height),
        });
    }

    results
}

/// 获取 Tesseract 版本
pub fn get_tesseract_version(binary_path: &str) -> Result<String, OcrError> {
    let output = Command::new(binary_path)
        .arg("--version")
        .output()
        .map_err(|e| OcrError::Unavailable(format!("无法执行 {}: {}", binary_path, e)))?;

    if !output.status.success() {
        return Err(OcrError::Unavailable(
            "tesseract --version 执行失败".to_string(),
        ));
    }

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(parse_version(&combined))
}

/// 格式通常是 "tesseract 5.3.0" 或 "tesseract v5.3.0"
fn parse_version(output: &str) -> String {
    output
        .lines()
        .filter(|line| line.contains("tesseract"))
        .find_map(|line| line.split_whitespace().nth(1))
        .map(|v| v.trim_start_matches('v').to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t
4\t1\t1\t1\t1\t0\t40\t50\t300\t30\t-1\t
5\t1\t1\t1\t1\t1\t40\t50\t120\t30\t96.5\tInvoice
5\t1\t1\t1\t1\t2\t170\t52\t90\t28\t88\t#2024
5\t1\t1\t1\t1\t3\t270\t52\t10\t28\t95\t
5\t1\t1\t1\t1\t4\t300\t52\t10\t28\t-1\tgarbage";

    #[test]
    fn test_parse_keeps_word_level_rows() {
        let words = parse_tesseract_tsv(SAMPLE_TSV);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "Invoice");
        assert_eq!(words[0].rect, Rect::new(40.0, 50.0, 120.0, 30.0));
        assert!((words[0].confidence - 0.965).abs() < 1e-6);
        assert_eq!(words[1].text, "#2024");
    }

    #[test]
    fn test_parse_ignores_short_rows() {
        assert!(parse_tesseract_tsv("header\n5\t1\t1").is_empty());
    }

    #[test]
    fn test_parse_version_variants() {
        assert_eq!(parse_version("tesseract 5.3.0\n leptonica-1.82"), "5.3.0");
        assert_eq!(parse_version("tesseract v4.1.1"), "4.1.1");
        assert_eq!(parse_version("something else"), "unknown");
    }

    #[test]
    fn test_config_defaults() {
        let config = TesseractConfig::default();
        assert_eq!(config.binary_or_default(), "tesseract");
        assert_eq!(config.lang_or_default(), "eng");
        assert_eq!(config.psm_or_default(), 6);
        assert_eq!(config.oem_or_default(), 1);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let config = TesseractConfig {
            binary_path: Some("/nonexistent/quill-tesseract".into()),
            ..TesseractConfig::default()
        };
        assert!(matches!(
            TesseractEngine::new(config),
            Err(OcrError::Unavailable(_))
        ));
    }
}

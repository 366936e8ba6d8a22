//! 修改后的校验
//!
//! 重新加载修改后的文档，确认被删除的区域里已经提取不到文字。

use std::sync::Arc;

use quill_core::{ContentProvider, Rect, Result, TextContentOptions, ViewportTransform};
use quill_layout::map_run;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResult {
    pub ok: bool,
    pub warnings: Vec<String>,
}

/// 检查页面上是否还有与 `rects`（页面坐标）相交的非空白文字
pub async fn verify_erased(
    provider: &dyn ContentProvider,
    bytes: Arc<Vec<u8>>,
    page_number: u32,
    rects: &[Rect],
) -> Result<VerifyResult> {
    let document = provider.load_document(bytes).await?;
    let page = document.page(page_number).await?;
    let viewport = ViewportTransform::new(&page.geometry(), 1.0)?;
    let runs = page.text_content(&TextContentOptions::default()).await?;

    let mut warnings = Vec::new();
    for run in runs.iter().filter(|r| !r.is_blank()) {
        let positioned = map_run(&viewport, run);
        let bounds = viewport.rect_to_page(&positioned.bounds());
        if let Some(rect) = rects.iter().find(|rect| bounds.intersects(rect)) {
            warnings.push(format!(
                "第 {} 页仍可提取文字 \"{}\"，位于 ({:.1}, {:.1}, {:.1}, {:.1})",
                page_number, run.text, rect.x, rect.y, rect.width, rect.height
            ));
        }
    }

    let result = VerifyResult {
        ok: warnings.is_empty(),
        warnings,
    };
    if result.ok {
        log::info!("[Verify] 第 {} 页校验通过 ({} 个区域)", page_number, rects.len());
    } else {
        for warning in &result.warnings {
            log::warn!("[Verify] {}", warning);
        }
    }
    Ok(result)
}

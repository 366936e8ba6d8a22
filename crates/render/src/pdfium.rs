//! pdfium 光栅化器

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::RgbaImage;
use pdfium_render::prelude::*;
use quill_core::{Rasterizer, Result, ViewerError, ViewportTransform};

/// 获取 pdfium 库的搜索路径
fn get_pdfium_search_paths(preferred: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 0. 配置中指定的目录
    if let Some(dir) = preferred {
        paths.push(dir.to_path_buf());
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            // 1. 可执行文件同级的 libs 目录
            paths.push(exe_dir.join("libs"));
            // 2. 可执行文件同级目录
            paths.push(exe_dir.to_path_buf());

            #[cfg(target_os = "macos")]
            {
                if let Some(contents_dir) = exe_dir.parent() {
                    paths.push(contents_dir.join("Resources").join("libs"));
                }
            }
        }
    }

    // 3. 本地开发
    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));

    paths
}

/// 尝试绑定 pdfium 库
pub fn bind_pdfium(preferred: Option<&Path>) -> std::result::Result<Pdfium, String> {
    for path in get_pdfium_search_paths(preferred) {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
        log::debug!("[Pdfium] 尝试加载 pdfium: {:?}", lib_path);

        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::debug!("[Pdfium] 成功从 {:?} 加载 pdfium", path);
            return Ok(Pdfium::new(bindings));
        }
    }

    // 最后尝试系统库
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| format!("Pdfium 库不可用: {}", e))
}

/// 基于 pdfium 的 [`Rasterizer`]
///
/// `Pdfium` 实例不能跨线程共享，每次渲染单独绑定。
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    /// 检查 pdfium 能否绑定
    pub fn is_available(&self) -> bool {
        match bind_pdfium(self.library_dir.as_deref()) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("[Pdfium] {}", e);
                false
            }
        }
    }

    fn render_sync(
        &self,
        document: &[u8],
        page_index: usize,
        viewport: &ViewportTransform,
    ) -> std::result::Result<RgbaImage, String> {
        let pdfium = bind_pdfium(self.library_dir.as_deref())?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| format!("加载 PDF 失败: {}", e))?;
        let page = doc
            .pages()
            .get(page_index as u16)
            .map_err(|e| format!("获取页面 {} 失败: {}", page_index, e))?;

        let (width, height) = viewport.canvas_size();
        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("渲染页面失败: {}", e))?;
        let image = bitmap.as_image().to_rgba8();

        log::debug!(
            "[Pdfium] 页面 {} 渲染完成: {}x{} px",
            page_index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(
        &self,
        document: &[u8],
        page_index: usize,
        viewport: &ViewportTransform,
    ) -> Result<RgbaImage> {
        self.render_sync(document, page_index, viewport)
            .map_err(|e| ViewerError::render(page_index as u32 + 1, e))
    }
}

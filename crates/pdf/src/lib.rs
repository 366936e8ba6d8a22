//! 基于 lopdf 的内容提供方与页面修改器

pub mod content;
mod error;
pub mod extract;
mod mutator;
mod provider;
pub mod redact;
mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use error::{PdfError, Result};
pub use mutator::{LopdfDocument, LopdfMutator, OVERLAY_FONT};
pub use provider::LopdfProvider;
pub use utils::{page_geometry, page_id};

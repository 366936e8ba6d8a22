//! 区块注册表
//!
//! 每次渲染整体替换。覆盖层通过 [`OverlayId`] 直接引用区块，
//! 代次不一致的引用视为过期并丢弃。

use quill_core::{Rect, ViewportTransform};
use serde::{Deserialize, Serialize};

use crate::cluster::Section;

/// 覆盖层标识：渲染代次 + 区块序号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayId {
    pub generation: u64,
    pub index: usize,
}

/// 可点击的覆盖层，`rect` 为像素坐标（`y` 为上边）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,
    pub rect: Rect,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionRegistry {
    generation: u64,
    page_number: u32,
    viewport: ViewportTransform,
    sections: Vec<Section>,
}

impl SectionRegistry {
    pub fn new(
        generation: u64,
        page_number: u32,
        viewport: ViewportTransform,
        sections: Vec<Section>,
    ) -> Self {
        Self {
            generation,
            page_number,
            viewport,
            sections,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn viewport(&self) -> &ViewportTransform {
        &self.viewport
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// 代次不一致或越界时返回 `None`
    pub fn get(&self, id: OverlayId) -> Option<&Section> {
        if id.generation != self.generation {
            log::debug!(
                "[Registry] 过期覆盖层引用: 代次 {} (当前 {})",
                id.generation,
                self.generation
            );
            return None;
        }
        self.sections.get(id.index)
    }

    pub fn section_text(&self, id: OverlayId) -> Option<String> {
        self.get(id).map(Section::text)
    }

    /// 按聚类顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn overlays(&self) -> Vec<Overlay> {
        self.sections
            .iter()
            .enumerate()
            .map(|(index, section)| Overlay {
                id: OverlayId {
                    generation: self.generation,
                    index,
                },
                rect: section.bounds(),
                text: section.text(),
            })
            .collect()
    }
}

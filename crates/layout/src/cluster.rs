//! 区块聚类
//!
//! 单次贪心：按输入顺序处理片段，片段上边与某个区块最近一次上边的差值
//! 小于阈值时并入该区块，否则新建区块。

use quill_core::{PositionedRun, Rect};
use serde::{Deserialize, Serialize};

/// 默认聚类阈值（像素，不随缩放归一化）
pub const DEFAULT_THRESHOLD: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterOptions {
    pub threshold: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// 视觉上相邻的一组文字片段
///
/// 包围盒始终等于所有成员包围盒的并集。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub items: Vec<PositionedRun>,
    /// 最近并入片段的上边
    pub last_y: f64,
}

impl Section {
    fn seed(run: PositionedRun) -> Self {
        let top = run.top();
        Self {
            min_x: run.x,
            min_y: top,
            max_x: run.right(),
            max_y: run.y,
            last_y: top,
            items: vec![run],
        }
    }

    fn push(&mut self, run: PositionedRun) {
        let top = run.top();
        self.min_x = self.min_x.min(run.x);
        self.min_y = self.min_y.min(top);
        self.max_x = self.max_x.max(run.right());
        self.max_y = self.max_y.max(run.y);
        self.last_y = top;
        self.items.push(run);
    }

    /// 像素坐标下的包围盒（`y` 为上边）
    pub fn bounds(&self) -> Rect {
        Rect::from_corners(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// 成员文字以单个空格连接
    pub fn text(&self) -> String {
        self.items
            .iter()
            .map(|run| run.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 区块聚类器
#[derive(Debug, Clone, Default)]
pub struct SectionClusterer {
    options: ClusterOptions,
}

impl SectionClusterer {
    pub fn new(options: ClusterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// 对一页的片段聚类，结果确定：相同输入总得到相同区块
    pub fn cluster(&self, runs: Vec<PositionedRun>) -> Vec<Section> {
        let threshold = self.options.threshold;
        let mut sections: Vec<Section> = Vec::new();

        for run in runs {
            let top = run.top();
            match sections
                .iter_mut()
                .find(|section| (section.last_y - top).abs() < threshold)
            {
                Some(section) => section.push(run),
                None => sections.push(Section::seed(run)),
            }
        }

        log::debug!(
            "[Cluster] 聚类完成: {} 个区块, 阈值 {}",
            sections.len(),
            threshold
        );
        sections
    }
}

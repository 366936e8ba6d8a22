//! 编辑模式
//!
//! 同一时刻只有一个模式生效。所有操作模式都是一次性的：提交成功或取消输入后
//! 回到 [`EditorMode::View`]。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    #[default]
    View,
    EditText,
    Delete,
    Highlight,
    Underline,
    Strikethrough,
    Comment,
    AddText,
}

impl EditorMode {
    /// 再次选择当前模式时回到查看模式，否则切换到新模式
    pub fn toggle(self, mode: EditorMode) -> EditorMode {
        if self == mode {
            EditorMode::View
        } else {
            mode
        }
    }

    /// 提交前需要输入文字
    pub fn needs_text(self) -> bool {
        matches!(
            self,
            EditorMode::EditText | EditorMode::Comment | EditorMode::AddText
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            EditorMode::View => "view",
            EditorMode::EditText => "edit_text",
            EditorMode::Delete => "delete",
            EditorMode::Highlight => "highlight",
            EditorMode::Underline => "underline",
            EditorMode::Strikethrough => "strikethrough",
            EditorMode::Comment => "comment",
            EditorMode::AddText => "add_text",
        }
    }
}

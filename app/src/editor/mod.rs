mod mode;
mod session;

pub use mode::EditorMode;
pub use session::{
    ClickOutcome, ClickSnapshot, EditorSession, PromptTarget, SessionOptions, TextPrompt,
};

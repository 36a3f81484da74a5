use thiserror::Error;

use crate::model::Uid;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dump contains no view lines")]
    EmptyDump,

    #[error("cannot parse root view at line {line}: {text}")]
    UnparsableRoot { line: usize, text: String },

    #[error("no activity matches `{selector}`")]
    UnknownActivity { selector: String },

    #[error("activity {activity} has no usable view hierarchy")]
    NoViewHierarchy { activity: String },

    #[error("no activity in the dump has a usable view hierarchy")]
    NoActivityViews,

    #[error("duplicate view uid {uid:#x}")]
    DuplicateUid { uid: Uid },

    #[error("root view has zero size ({w}x{h}); cannot fit viewport")]
    ZeroSizedRoot { w: u32, h: u32 },

    #[error("viewport size must be positive")]
    InvalidViewportSize,
}

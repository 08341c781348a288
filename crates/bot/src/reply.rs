use serde::{Deserialize, Serialize};

use milkbot_core::BatchId;

/// Text reply to one command, optionally offering batches to pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default)]
    pub options: Vec<ReplyOption>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options(text: impl Into<String>, options: Vec<ReplyOption>) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }
}

/// One selectable batch. Sending `label` back as the argument of `empty`
/// selects `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    pub batch_id: BatchId,
    pub label: String,
}

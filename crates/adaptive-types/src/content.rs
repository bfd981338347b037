//! Content blocks of a completed (non-streaming) generation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single block of assistant output.
///
/// Only `Text` blocks are inspected by the reasoning extractor; every other
/// kind passes through untouched and keeps its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Chain-of-thought content split out of a text block.
    Reasoning {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    #[serde(rename_all = "camelCase")]
    File {
        /// MIME type (e.g., "image/png")
        media_type: String,
        /// Base64-encoded payload
        data: String,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    /// Returns the payload of a `Text` block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Returns the payload of a `Reasoning` block.
    pub fn as_reasoning(&self) -> Option<&str> {
        match self {
            Self::Reasoning { text } => Some(text),
            _ => None,
        }
    }
}

/// Concatenates the payloads of all `Text` blocks, in order.
pub fn blocks_text(blocks: &[ContentBlock]) -> String {
    blocks.iter().filter_map(ContentBlock::as_text).collect()
}

//! Wire types shared between the extractor and its callers.

mod content;
mod stream;

pub use content::{ContentBlock, blocks_text};
pub use stream::{FinishReason, PartStream, StreamPart, Usage};

//! Replays a response as a text-delta stream through the middleware.

use std::path::Path;

use adaptive_core::ReasoningMiddleware;
use adaptive_types::{FinishReason, PartStream, StreamPart};
use anyhow::{Context, Result};
use futures_util::{StreamExt, stream};

use super::read_input;

pub async fn run(
    middleware: &ReasoningMiddleware,
    file: Option<&Path>,
    chunk_size: usize,
    id: &str,
) -> Result<()> {
    let input = read_input(file)?;
    let parts = replay_parts(&input, chunk_size, id);
    let upstream: PartStream<anyhow::Error> =
        stream::iter(parts.into_iter().map(Ok::<_, anyhow::Error>)).boxed();

    let mut rewritten = middleware.wrap_stream(upstream);
    while let Some(part) = rewritten.next().await {
        let line = serde_json::to_string(&part?).context("serialize stream part")?;
        println!("{line}");
    }
    Ok(())
}

/// Builds the parts a backend would emit for `input`, `chunk_size` chars per delta.
fn replay_parts(input: &str, chunk_size: usize, id: &str) -> Vec<StreamPart> {
    let mut parts = vec![
        StreamPart::StreamStart,
        StreamPart::TextStart { id: id.to_string() },
    ];
    parts.extend(
        chunk_chars(input, chunk_size)
            .into_iter()
            .map(|delta| StreamPart::text_delta(id, delta)),
    );
    parts.push(StreamPart::TextEnd { id: id.to_string() });
    parts.push(StreamPart::Finish {
        finish_reason: FinishReason::Stop,
        usage: None,
    });
    parts
}

fn chunk_chars(input: &str, chunk_size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (idx, _)) in input.char_indices().enumerate() {
        if count > 0 && count % chunk_size == 0 {
            chunks.push(&input[start..idx]);
            start = idx;
        }
    }
    if start < input.len() {
        chunks.push(&input[start..]);
    }
    chunks
}

//! Batch extraction over a complete response.

use std::fmt::Write as _;
use std::path::Path;

use adaptive_core::ReasoningMiddleware;
use adaptive_types::ContentBlock;
use anyhow::{Context, Result};
use tracing::debug;

use super::read_input;

pub fn run(middleware: &ReasoningMiddleware, file: Option<&Path>, plain: bool) -> Result<()> {
    let input = read_input(file)?;
    let blocks = middleware.wrap_generate(vec![ContentBlock::text(input)]);
    debug!(blocks = blocks.len(), "Extraction finished");

    if plain {
        print!("{}", render_plain(&blocks));
    } else {
        let json = serde_json::to_string_pretty(&blocks).context("serialize content blocks")?;
        println!("{json}");
    }
    Ok(())
}

/// Renders blocks as `[reasoning]`/`[text]` sections separated by blank lines.
fn render_plain(blocks: &[ContentBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        let (label, text) = match block {
            ContentBlock::Reasoning { text } => ("reasoning", text),
            ContentBlock::Text { text } => ("text", text),
            _ => continue,
        };
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "[{label}]\n{text}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain_sections() {
        let blocks = vec![
            ContentBlock::reasoning("plan"),
            ContentBlock::text("answer"),
        ];
        assert_eq!(render_plain(&blocks), "[reasoning]\nplan\n\n[text]\nanswer\n");
    }

    #[test]
    fn test_render_plain_empty() {
        assert_eq!(render_plain(&[]), "");
    }
}

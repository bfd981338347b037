//! Reasoning extraction over a completed response.

use adaptive_types::ContentBlock;
use regex::Regex;
use tracing::warn;

use super::Extractor;

/// Result of splitting one text block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitText {
    /// Captured reasoning of every span, trimmed and separator-joined
    pub reasoning: String,
    /// The input with every matched span removed
    pub text: String,
}

/// Splits `text` on every non-overlapping match of `matcher`.
///
/// Returns `None` when nothing matches. The reasoning of a match is capture
/// group 1 when the expression has one, otherwise the whole match.
pub fn split_with(matcher: &Regex, text: &str, separator: &str) -> Option<SplitText> {
    let spans: Vec<(usize, usize, &str)> = matcher
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1).unwrap_or(whole);
            Some((whole.start(), whole.end(), inner.as_str()))
        })
        .collect();

    if spans.is_empty() {
        return None;
    }

    let reasoning = spans
        .iter()
        .map(|(_, _, inner)| inner.trim())
        .collect::<Vec<_>>()
        .join(separator);

    // Last to first, so earlier offsets stay valid.
    let mut remaining = text.to_string();
    for &(start, end, _) in spans.iter().rev() {
        if start > end
            || end > remaining.len()
            || !remaining.is_char_boundary(start)
            || !remaining.is_char_boundary(end)
        {
            warn!(
                start,
                end,
                len = remaining.len(),
                "Skipping reasoning span with invalid offsets"
            );
            continue;
        }

        let before = &remaining[..start];
        let after = &remaining[end..];
        let joiner = if !before.is_empty() && !after.is_empty() {
            separator
        } else {
            ""
        };
        remaining = format!("{before}{joiner}{after}");
    }

    Some(SplitText {
        reasoning,
        text: remaining,
    })
}

/// Splits one text block with the configured strategy.
///
/// Tag dialects are tried in configured order and the first one with any
/// match decides the whole block.
pub(crate) fn split_text(
    extractor: &Extractor,
    text: &str,
    separator: &str,
    start_with_reasoning: bool,
) -> Option<SplitText> {
    match extractor {
        Extractor::Pattern(matcher) => split_with(matcher, text, separator),
        Extractor::Tags(tags) => {
            let wrapped = match tags.first() {
                Some(first) if start_with_reasoning => Some(first.wrap(text)),
                _ => None,
            };
            let text = wrapped.as_deref().unwrap_or(text);

            tags.patterns()
                .iter()
                .find_map(|pattern| split_with(pattern.matcher(), text, separator))
        }
    }
}

/// Rewrites text blocks into reasoning and text blocks, keeping order.
pub(crate) fn extract_blocks(
    extractor: &Extractor,
    content: Vec<ContentBlock>,
    separator: &str,
    start_with_reasoning: bool,
) -> Vec<ContentBlock> {
    let mut out = Vec::with_capacity(content.len() + 1);

    for block in content {
        let ContentBlock::Text { text } = block else {
            out.push(block);
            continue;
        };

        let Some(split) = split_text(extractor, &text, separator, start_with_reasoning) else {
            out.push(ContentBlock::Text { text });
            continue;
        };

        if !split.reasoning.is_empty() {
            out.push(ContentBlock::Reasoning {
                text: split.reasoning,
            });
        }

        let remaining = split.text.trim();
        if !remaining.is_empty() {
            out.push(ContentBlock::text(remaining));
        }
    }

    out
}

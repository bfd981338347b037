//! Reasoning extraction middleware.
//!
//! Models that do not expose a separate reasoning channel write their
//! chain-of-thought inline, wrapped in tags whose name varies by model
//! (`<think>`, `<reasoning>`, ...). This middleware splits that content out
//! of completed responses ([`ReasoningMiddleware::wrap_generate`]) and out of
//! live text-delta streams ([`ReasoningMiddleware::wrap_stream`]).

mod generate;
mod patterns;
mod stream;
mod transform;

use adaptive_types::ContentBlock;
use regex::Regex;
use tracing::{debug, warn};

pub use generate::{SplitText, split_with};
pub use patterns::{DEFAULT_TAG_NAMES, TagPattern, TagSet, potential_start_index};
pub use stream::StreamExtractor;
pub use transform::ReasoningStream;

/// Default separator between disjoint reasoning or text runs.
pub const DEFAULT_SEPARATOR: &str = "\n";

/// Which delimiters mark reasoning content.
#[derive(Debug, Clone)]
pub enum TagPatterns {
    /// Candidate tag names, tried in order.
    Names(Vec<String>),
    /// A caller-supplied expression replacing the tag mechanism.
    ///
    /// Streaming is not supported in this mode: deltas pass through unchanged.
    Custom(Regex),
}

impl Default for TagPatterns {
    fn default() -> Self {
        Self::Names(DEFAULT_TAG_NAMES.iter().map(ToString::to_string).collect())
    }
}

/// Middleware configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct ReasoningOptions {
    pub tag_patterns: TagPatterns,
    pub separator: String,
    /// Assume the response opens inside a reasoning block even without a tag
    pub start_with_reasoning: bool,
}

impl Default for ReasoningOptions {
    fn default() -> Self {
        Self {
            tag_patterns: TagPatterns::default(),
            separator: DEFAULT_SEPARATOR.to_string(),
            start_with_reasoning: false,
        }
    }
}

impl ReasoningOptions {
    pub fn with_tags<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            tag_patterns: TagPatterns::Names(
                names.iter().map(|n| n.as_ref().to_string()).collect(),
            ),
            ..Self::default()
        }
    }

    pub fn with_pattern(pattern: Regex) -> Self {
        Self {
            tag_patterns: TagPatterns::Custom(pattern),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    #[must_use]
    pub fn start_with_reasoning(mut self, enabled: bool) -> Self {
        self.start_with_reasoning = enabled;
        self
    }
}

/// Extraction strategy chosen once at construction.
#[derive(Debug, Clone)]
pub(crate) enum Extractor {
    Tags(TagSet),
    Pattern(Regex),
}

/// Splits reasoning from text in generated output.
///
/// Cheap to clone. Every [`wrap_stream`](Self::wrap_stream) call gets its
/// own per-stream state, so one middleware can serve concurrent requests.
#[derive(Debug, Clone)]
pub struct ReasoningMiddleware {
    extractor: Extractor,
    separator: String,
    start_with_reasoning: bool,
}

impl ReasoningMiddleware {
    pub fn new(options: ReasoningOptions) -> Self {
        let ReasoningOptions {
            tag_patterns,
            separator,
            start_with_reasoning,
        } = options;

        let extractor = match tag_patterns {
            TagPatterns::Names(names) => {
                let tags = TagSet::compile(&names);
                if start_with_reasoning && tags.is_empty() {
                    warn!("start_with_reasoning is set but no reasoning tags are configured");
                }
                Extractor::Tags(tags)
            }
            TagPatterns::Custom(pattern) => {
                if start_with_reasoning {
                    debug!("start_with_reasoning has no effect with a custom pattern");
                }
                Extractor::Pattern(pattern)
            }
        };

        Self {
            extractor,
            separator,
            start_with_reasoning,
        }
    }

    /// Rewrites the content of a completed response.
    ///
    /// Each text block with reasoning becomes a `Reasoning` block followed by
    /// a `Text` block (when any text remains). Other blocks keep their place.
    pub fn wrap_generate(&self, content: Vec<ContentBlock>) -> Vec<ContentBlock> {
        generate::extract_blocks(
            &self.extractor,
            content,
            &self.separator,
            self.start_with_reasoning,
        )
    }

    /// Returns a fresh streaming extractor with empty state.
    pub fn stream_extractor(&self) -> StreamExtractor {
        let tags = match &self.extractor {
            Extractor::Tags(tags) => Some(tags.clone()),
            Extractor::Pattern(_) => None,
        };
        StreamExtractor::new(tags, self.separator.clone(), self.start_with_reasoning)
    }

    /// Wraps an upstream part stream.
    pub fn wrap_stream<S>(&self, inner: S) -> ReasoningStream<S> {
        if matches!(self.extractor, Extractor::Pattern(_)) {
            debug!("Custom reasoning pattern: streaming text passes through unchanged");
        }
        ReasoningStream::new(inner, self.stream_extractor())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use adaptive_types::StreamPart;

    use super::*;

    /// Feeds `input` split at `cuts` and returns (reasoning, text).
    fn stream_split(
        middleware: &ReasoningMiddleware,
        input: &str,
        cuts: &[usize],
    ) -> (String, String) {
        let mut extractor = middleware.stream_extractor();
        let mut out = VecDeque::new();
        let end = input.len();
        let mut last = 0;
        for &cut in cuts.iter().chain(std::iter::once(&end)) {
            extractor.transform(StreamPart::text_delta("t", &input[last..cut]), &mut out);
            last = cut;
        }
        extractor.flush(&mut out);

        let mut reasoning = String::new();
        let mut text = String::new();
        for part in out {
            match part {
                StreamPart::ReasoningDelta { delta, .. } => reasoning.push_str(&delta),
                StreamPart::TextDelta { delta, .. } => text.push_str(&delta),
                _ => {}
            }
        }
        (reasoning, text)
    }

    fn batch_split(middleware: &ReasoningMiddleware, input: &str) -> (String, String) {
        let out = middleware.wrap_generate(vec![ContentBlock::text(input)]);
        let reasoning = out
            .iter()
            .filter_map(ContentBlock::as_reasoning)
            .collect::<String>();
        let text = adaptive_types::blocks_text(&out);
        (reasoning, text)
    }

    const INPUTS: &[&str] = &[
        "<think>plan</think>answer",
        "Intro<think>why</think>Outro",
        "<think>a</think><think>b</think>done",
        "x<reasoning>r1</reasoning>y<reasoning>r2</reasoning>z",
        "no tags at all, just 1 < 2",
        "<analysis>multi\nline</analysis>Result: ok",
        "<think>x</think>is 1 <",
        "<think>x</think>then <thi",
    ];

    /// Streaming output equals batch output for every one- and two-point split.
    #[test]
    fn test_streaming_matches_batch_for_any_chunking() {
        let middleware = ReasoningMiddleware::new(ReasoningOptions::default());

        for input in INPUTS {
            let expected = batch_split(&middleware, input);
            let n = input.len();

            for i in 0..=n {
                let got = stream_split(&middleware, input, &[i]);
                assert_eq!(got, expected, "input {input:?} split at {i}");
            }

            for i in 0..=n {
                for j in i..=n {
                    let got = stream_split(&middleware, input, &[i, j]);
                    assert_eq!(got, expected, "input {input:?} split at {i},{j}");
                }
            }
        }
    }

    #[test]
    fn test_streaming_matches_batch_one_char_at_a_time() {
        let middleware = ReasoningMiddleware::new(ReasoningOptions::default());
        for input in INPUTS {
            let cuts: Vec<usize> = (1..input.len()).collect();
            assert_eq!(
                stream_split(&middleware, input, &cuts),
                batch_split(&middleware, input),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_start_with_reasoning_streaming_matches_batch() {
        let middleware = ReasoningMiddleware::new(
            ReasoningOptions::with_tags(&["think"]).start_with_reasoning(true),
        );
        let input = "first step</think>the answer";
        let expected = batch_split(&middleware, input);
        assert_eq!(expected, ("first step".to_string(), "the answer".to_string()));

        for i in 0..=input.len() {
            assert_eq!(stream_split(&middleware, input, &[i]), expected, "split at {i}");
        }
    }

    #[test]
    fn test_first_pattern_wins_in_both_modes() {
        let middleware =
            ReasoningMiddleware::new(ReasoningOptions::with_tags(&["think", "reasoning"]));

        let only_reasoning = "<reasoning>r</reasoning>answer";
        assert_eq!(
            batch_split(&middleware, only_reasoning),
            ("r".to_string(), "answer".to_string())
        );
        assert_eq!(
            stream_split(&middleware, only_reasoning, &[]),
            ("r".to_string(), "answer".to_string())
        );

        let both = "<think>t</think>mid<reasoning>r</reasoning>";
        assert_eq!(
            batch_split(&middleware, both),
            ("t".to_string(), "mid<reasoning>r</reasoning>".to_string())
        );
        assert_eq!(
            stream_split(&middleware, both, &[]),
            ("t".to_string(), "mid<reasoning>r</reasoning>".to_string())
        );
    }

    #[test]
    fn test_custom_separator() {
        let middleware = ReasoningMiddleware::new(ReasoningOptions::default().separator(" / "));
        let input = "a<think>x</think>b<think>y</think>c";
        assert_eq!(
            batch_split(&middleware, input),
            ("x / y".to_string(), "a / b / c".to_string())
        );
        assert_eq!(
            stream_split(&middleware, input, &[3, 9]),
            ("x / y".to_string(), "a / b / c".to_string())
        );
    }

    #[test]
    fn test_custom_pattern_batch_only() {
        let pattern = Regex::new("(?s)<scratch>(.*?)</scratch>").unwrap();
        let middleware = ReasoningMiddleware::new(ReasoningOptions::with_pattern(pattern));
        assert!(matches!(middleware.extractor, Extractor::Pattern(_)));

        let input = "<scratch>notes</scratch>final";
        assert_eq!(
            batch_split(&middleware, input),
            ("notes".to_string(), "final".to_string())
        );
        assert_eq!(
            stream_split(&middleware, input, &[5]),
            (String::new(), input.to_string())
        );
    }

    #[test]
    fn test_empty_tag_list_is_inert() {
        let middleware = ReasoningMiddleware::new(
            ReasoningOptions::with_tags::<String>(&[]).start_with_reasoning(true),
        );
        let input = "<think>x</think>y";
        assert_eq!(
            middleware.wrap_generate(vec![ContentBlock::text(input)]),
            vec![ContentBlock::text(input)]
        );
        assert_eq!(
            stream_split(&middleware, input, &[4]),
            (String::new(), input.to_string())
        );
    }
}

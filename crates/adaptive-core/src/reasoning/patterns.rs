//! Compiled reasoning tag dialects.
//!
//! Each dialect is a tag name such as `think`, turned into its literal
//! opening/closing tags plus a matcher for complete `<think>...</think>`
//! spans:
//!
//! ```text
//! <think>
//! First, compare both options.
//! </think>
//! Option B is cheaper.
//! ```

use regex::Regex;
use tracing::warn;

/// Tag names tried when the caller does not configure any.
pub const DEFAULT_TAG_NAMES: &[&str] = &["think", "reasoning", "analysis", "thought"];

/// One reasoning delimiter dialect.
#[derive(Debug, Clone)]
pub struct TagPattern {
    tag_name: String,
    opening_tag: String,
    closing_tag: String,
    matcher: Regex,
}

impl TagPattern {
    /// Compiles a dialect for `tag_name`.
    ///
    /// The name is escaped before it is embedded, so metacharacters in a
    /// misconfigured name match literally.
    ///
    /// # Errors
    /// Returns an error if the resulting expression exceeds the regex size limits.
    pub fn new(tag_name: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(tag_name);
        let matcher = Regex::new(&format!("(?s)<{escaped}>(.*?)</{escaped}>"))?;

        Ok(Self {
            tag_name: tag_name.to_string(),
            opening_tag: format!("<{tag_name}>"),
            closing_tag: format!("</{tag_name}>"),
            matcher,
        })
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn opening_tag(&self) -> &str {
        &self.opening_tag
    }

    pub fn closing_tag(&self) -> &str {
        &self.closing_tag
    }

    /// Non-greedy matcher for complete spans; `.` also matches newlines.
    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    /// Wraps text for responses that start inside a reasoning block.
    ///
    /// The opening tag is always prepended. The closing tag is appended only
    /// when the text has none, so an answer after an existing `</tag>` stays text.
    /// Unlike a plain `<tag>{text}</tag>` wrap, this never nests a second close.
    pub fn wrap(&self, text: &str) -> String {
        if text.contains(&self.closing_tag) {
            format!("{}{text}", self.opening_tag)
        } else {
            format!("{}{text}{}", self.opening_tag, self.closing_tag)
        }
    }
}

/// Ordered list of candidate dialects.
#[derive(Debug, Clone, Default)]
pub struct TagSet {
    patterns: Vec<TagPattern>,
}

impl TagSet {
    /// Compiles every non-empty tag name, keeping configured order.
    ///
    /// Names that fail to compile are skipped with a warning.
    pub fn compile<S: AsRef<str>>(names: &[S]) -> Self {
        let mut patterns = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                warn!("Ignoring empty reasoning tag name");
                continue;
            }
            match TagPattern::new(name) {
                Ok(pattern) => patterns.push(pattern),
                Err(err) => warn!(tag = name, error = %err, "Ignoring reasoning tag"),
            }
        }
        Self { patterns }
    }

    pub fn patterns(&self) -> &[TagPattern] {
        &self.patterns
    }

    pub fn get(&self, index: usize) -> Option<&TagPattern> {
        self.patterns.get(index)
    }

    pub fn first(&self) -> Option<&TagPattern> {
        self.patterns.first()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the index of the first dialect (in configured order) whose
    /// opening tag occurs anywhere in `buffer`.
    pub fn detect(&self, buffer: &str) -> Option<usize> {
        self.patterns
            .iter()
            .position(|p| buffer.contains(p.opening_tag.as_str()))
    }

    /// Returns where a trailing fragment that could still grow into any
    /// opening tag begins. Text before this index is safe to emit.
    pub fn hold_back_index(&self, buffer: &str) -> Option<usize> {
        self.patterns
            .iter()
            .filter_map(|p| potential_start_index(buffer, &p.opening_tag))
            .min()
    }
}

/// Finds where `searched` starts in `text`, counting a suffix of `text`
/// that is a prefix of `searched` as a provisional match.
///
/// A full occurrence wins. Otherwise the longest suffix that could still
/// complete into `searched` is returned, so nothing that may become a tag
/// is emitted early.
pub fn potential_start_index(text: &str, searched: &str) -> Option<usize> {
    if searched.is_empty() {
        return None;
    }

    if let Some(index) = text.find(searched) {
        return Some(index);
    }

    text.char_indices()
        .map(|(i, _)| i)
        .find(|&i| searched.starts_with(&text[i..]))
}

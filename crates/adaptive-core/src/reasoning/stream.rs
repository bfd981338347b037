//! Incremental reasoning extraction over text deltas.
//!
//! Deltas can split a tag anywhere (`"<thi"` + `"nk>"`), so every stream id
//! keeps a buffer of text that has not been emitted yet. A trailing fragment
//! that may still become a tag stays buffered until the next delta decides it.

use std::collections::{HashMap, VecDeque};

use adaptive_types::StreamPart;
use tracing::{debug, warn};

use super::patterns::{TagSet, potential_start_index};

/// Per stream id parse state.
#[derive(Debug, Clone)]
struct ExtractionState {
    /// Index of the dialect seen in this stream, fixed once set
    detected: Option<usize>,
    is_reasoning: bool,
    is_first_reasoning: bool,
    is_first_text: bool,
    /// Set on every mode switch, cleared by the next emitted chunk
    after_switch: bool,
    /// Whether a `reasoning-start` was sent for the current run
    reasoning_open: bool,
    buffer: String,
    id_counter: u64,
    text_id: String,
}

impl ExtractionState {
    fn new(text_id: &str) -> Self {
        Self {
            detected: None,
            is_reasoning: false,
            is_first_reasoning: true,
            is_first_text: true,
            after_switch: false,
            reasoning_open: false,
            buffer: String::new(),
            id_counter: 0,
            text_id: text_id.to_string(),
        }
    }

    /// Reasoning ids are unique per stream id and per run.
    fn reasoning_id(&self) -> String {
        format!("reasoning-{}-{}", self.text_id, self.id_counter)
    }

    /// Emits `text` as content of the current mode.
    fn publish(&mut self, text: &str, separator: &str, out: &mut VecDeque<StreamPart>) {
        if text.is_empty() {
            return;
        }

        let first_of_kind = if self.is_reasoning {
            self.is_first_reasoning
        } else {
            self.is_first_text
        };
        let prefix = if self.after_switch && !first_of_kind {
            separator
        } else {
            ""
        };
        let delta = format!("{prefix}{text}");

        if self.is_reasoning {
            if !self.reasoning_open {
                out.push_back(StreamPart::ReasoningStart {
                    id: self.reasoning_id(),
                });
                self.reasoning_open = true;
            }
            out.push_back(StreamPart::ReasoningDelta {
                id: self.reasoning_id(),
                delta,
            });
            self.is_first_reasoning = false;
        } else {
            out.push_back(StreamPart::TextDelta {
                id: self.text_id.clone(),
                delta,
            });
            self.is_first_text = false;
        }

        self.after_switch = false;
    }

    /// Flips the mode after a complete boundary tag was consumed.
    fn switch_mode(&mut self, out: &mut VecDeque<StreamPart>) {
        if self.is_reasoning {
            if self.reasoning_open {
                out.push_back(StreamPart::ReasoningEnd {
                    id: self.reasoning_id(),
                });
                self.reasoning_open = false;
            }
            self.id_counter += 1;
        }
        self.is_reasoning = !self.is_reasoning;
        self.after_switch = true;
    }

    /// Emits everything before the hold-back point while no dialect is known.
    fn release_undetected(
        &mut self,
        tags: &TagSet,
        separator: &str,
        out: &mut VecDeque<StreamPart>,
    ) {
        let hold = tags
            .hold_back_index(&self.buffer)
            .unwrap_or(self.buffer.len());
        let held = self.buffer.split_off(hold);
        let ready = std::mem::replace(&mut self.buffer, held);
        self.publish(&ready, separator, out);
    }

    /// Runs the boundary loop for a detected dialect.
    fn drain_boundaries(
        &mut self,
        opening_tag: &str,
        closing_tag: &str,
        separator: &str,
        out: &mut VecDeque<StreamPart>,
    ) {
        loop {
            let next_tag = if self.is_reasoning {
                closing_tag
            } else {
                opening_tag
            };

            let Some(start) = potential_start_index(&self.buffer, next_tag) else {
                let rest = std::mem::take(&mut self.buffer);
                self.publish(&rest, separator, out);
                break;
            };

            let tail = self.buffer.split_off(start);
            let before = std::mem::replace(&mut self.buffer, tail);
            self.publish(&before, separator, out);

            if !self.buffer.starts_with(next_tag) {
                // Partial tag at the end; wait for more input.
                break;
            }

            self.buffer.drain(..next_tag.len());
            self.switch_mode(out);
        }
    }
}

/// Streaming side of the extractor.
///
/// Owns the state of every stream id it has seen. Create one per pipeline;
/// nothing is shared between instances.
#[derive(Debug, Clone)]
pub struct StreamExtractor {
    /// `None` for custom-pattern mode, where deltas pass through unchanged
    tags: Option<TagSet>,
    separator: String,
    start_with_reasoning: bool,
    extractions: HashMap<String, ExtractionState>,
}

impl StreamExtractor {
    pub(crate) fn new(tags: Option<TagSet>, separator: String, start_with_reasoning: bool) -> Self {
        Self {
            tags,
            separator,
            start_with_reasoning,
            extractions: HashMap::new(),
        }
    }

    /// Number of stream ids with live state.
    pub fn active_streams(&self) -> usize {
        self.extractions.len()
    }

    /// Processes one incoming part, appending the resulting parts to `out`.
    ///
    /// Only `TextDelta` is inspected; every other part is forwarded as is.
    pub fn transform(&mut self, part: StreamPart, out: &mut VecDeque<StreamPart>) {
        let StreamPart::TextDelta { id, delta } = part else {
            out.push_back(part);
            return;
        };

        let Some(tags) = self.tags.as_ref() else {
            out.push_back(StreamPart::TextDelta { id, delta });
            return;
        };

        if !self.extractions.contains_key(&id) {
            let state = new_state(&id, tags, self.start_with_reasoning);
            self.extractions.insert(id.clone(), state);
        }

        let Some(state) = self.extractions.get_mut(&id) else {
            warn!(stream_id = %id, "No extraction state for stream; dropping delta");
            return;
        };

        state.buffer.push_str(&delta);

        let detected = match state.detected {
            Some(index) => index,
            None => match tags.detect(&state.buffer) {
                Some(index) => {
                    debug!(
                        stream_id = %id,
                        tag = tags.get(index).map(|p| p.tag_name()),
                        "Detected reasoning dialect"
                    );
                    state.detected = Some(index);
                    index
                }
                None => {
                    state.release_undetected(tags, &self.separator, out);
                    return;
                }
            },
        };

        let Some(pattern) = tags.get(detected) else {
            warn!(stream_id = %id, detected, "Detected dialect index out of range; dropping delta");
            return;
        };

        state.drain_boundaries(
            pattern.opening_tag(),
            pattern.closing_tag(),
            &self.separator,
            out,
        );
    }

    /// Ends every stream and forgets its state.
    ///
    /// Text-mode leftovers are released as text, since a trailing `<` or
    /// `<thi` is answer text once the stream ends. Inside an unterminated
    /// reasoning block the residue is a partial closing tag and is dropped.
    pub fn flush(&mut self, out: &mut VecDeque<StreamPart>) {
        for (id, mut state) in self.extractions.drain() {
            if state.buffer.is_empty() {
                continue;
            }
            if !state.is_reasoning {
                let rest = std::mem::take(&mut state.buffer);
                state.publish(&rest, &self.separator, out);
            } else {
                debug!(
                    stream_id = %id,
                    residue = state.buffer.len(),
                    "Dropping unterminated tag fragment"
                );
            }
        }
    }
}

fn new_state(id: &str, tags: &TagSet, start_with_reasoning: bool) -> ExtractionState {
    let mut state = ExtractionState::new(id);
    if start_with_reasoning && let Some(first) = tags.first() {
        // Commit to the first dialect; the synthetic tag flips into reasoning mode.
        state.buffer.push_str(first.opening_tag());
        state.detected = Some(0);
    }
    state
}

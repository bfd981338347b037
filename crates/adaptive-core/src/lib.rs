//! Core library for Adaptive: reasoning extraction, config and logging.

pub mod config;
pub mod logging;
pub mod reasoning;

pub use reasoning::{ReasoningMiddleware, ReasoningOptions, ReasoningStream, TagPatterns};

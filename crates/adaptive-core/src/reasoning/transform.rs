//! `Stream` adapter running a [`StreamExtractor`] over upstream parts.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use adaptive_types::StreamPart;
use futures_util::Stream;

use super::stream::StreamExtractor;

/// Stream transformer that splits reasoning out of text deltas.
///
/// Errors from the inner stream are forwarded untouched. When the inner
/// stream ends, the extractor is flushed once and its state is released.
pub struct ReasoningStream<S> {
    inner: S,
    extractor: StreamExtractor,
    /// Parts produced but not yet yielded
    pending: VecDeque<StreamPart>,
    /// Whether the inner stream has ended
    ended: bool,
}

impl<S> ReasoningStream<S> {
    pub(crate) fn new(inner: S, extractor: StreamExtractor) -> Self {
        Self {
            inner,
            extractor,
            pending: VecDeque::new(),
            ended: false,
        }
    }
}

impl<S, E> Stream for ReasoningStream<S>
where
    S: Stream<Item = Result<StreamPart, E>> + Unpin,
{
    type Item = Result<StreamPart, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // Return pending parts first
            if let Some(part) = self.pending.pop_front() {
                return Poll::Ready(Some(Ok(part)));
            }

            if self.ended {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(part))) => {
                    let this = &mut *self;
                    this.extractor.transform(part, &mut this.pending);
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    let this = &mut *self;
                    this.ended = true;
                    this.extractor.flush(&mut this.pending);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

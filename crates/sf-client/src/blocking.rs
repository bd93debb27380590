//! Synchronous driver for the async algorithms.
//!
//! Every network algorithm in the toolkit is written once, as async code.
//! `BlockingRuntime` runs those futures to completion on a private
//! current-thread runtime, and [`BlockingIter`] turns a lazy stream of pages
//! or records into a plain [`Iterator`].

use futures::stream::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;

use crate::error::{Error, ErrorKind, Result};

/// A private tokio runtime for callers without one.
///
/// Must not be used from inside another tokio runtime.
#[derive(Debug)]
pub struct BlockingRuntime {
    runtime: tokio::runtime::Runtime,
}

impl BlockingRuntime {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Runtime(e.to_string()), e))?;
        Ok(Self { runtime })
    }

    /// Run a future to completion on this thread.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Adapt a stream into an iterator that fetches lazily, one item per `next()`.
    pub fn iter<'r, S>(&'r self, stream: S) -> BlockingIter<'r, S::Item>
    where
        S: Stream + 'r,
    {
        BlockingIter {
            runtime: self,
            stream: Box::pin(stream),
        }
    }
}

/// Iterator over a stream, driven by a [`BlockingRuntime`].
///
/// Dropping the iterator drops the stream; no further requests are made.
pub struct BlockingIter<'r, T> {
    runtime: &'r BlockingRuntime,
    stream: Pin<Box<dyn Stream<Item = T> + 'r>>,
}

impl<T> Iterator for BlockingIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.runtime.block_on(self.stream.next())
    }
}

impl<T> std::fmt::Debug for BlockingIter<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingIter").finish_non_exhaustive()
    }
}

//! Bounded-concurrency execution of independent requests.
//!
//! A [`Dispatcher`] owns a semaphore; every operation waits for a permit
//! before it is first polled, so at most `concurrency` operations are in
//! flight at once. Clones share the same gate.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Error, Result};

/// Largest batch accepted by the sObject Collections write endpoints.
pub const MAX_COLLECTION_BATCH: usize = 200;

/// Largest id list accepted by the sObject Collections retrieve endpoint.
pub const MAX_FETCH_BATCH: usize = 2000;

/// Completion counter handed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Input position of the operation that just finished.
    pub index: usize,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::validation("concurrency must be at least 1"));
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every operation and return their results in input order.
    ///
    /// A failing operation does not cancel the others.
    pub async fn run<F, T>(&self, operations: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T>,
    {
        self.run_with_progress(operations, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `progress` once per completed
    /// operation. The callback runs on the driving task, one call at a time.
    pub async fn run_with_progress<F, T, P>(&self, operations: Vec<F>, mut progress: P) -> Vec<T>
    where
        F: Future<Output = T>,
        P: FnMut(Progress),
    {
        let total = operations.len();
        debug!(total, concurrency = self.concurrency, "Dispatching operations");

        let mut in_flight: FuturesUnordered<_> = operations
            .into_iter()
            .enumerate()
            .map(|(index, operation)| {
                let semaphore = Arc::clone(&self.semaphore);
                async move {
                    // Never closed.
                    let _permit = semaphore.acquire_owned().await.ok();
                    (index, operation.await)
                }
            })
            .collect();

        let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        while let Some((index, output)) = in_flight.next().await {
            slots[index] = Some(output);
            completed += 1;
            progress(Progress {
                index,
                completed,
                total,
            });
        }

        slots.into_iter().flatten().collect()
    }
}

/// Check a chunk size against an endpoint maximum.
pub(crate) fn check_chunk_size(chunk_size: usize, max: usize) -> Result<usize> {
    if chunk_size == 0 || chunk_size > max {
        return Err(Error::validation(format!(
            "chunk size {chunk_size} must be between 1 and {max}"
        )));
    }
    Ok(chunk_size)
}

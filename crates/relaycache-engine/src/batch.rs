//! Concurrent fan-out of per-key work with independent failures.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream;

use crate::error::{BatchError, EngineError, KeyError};

/// Outcome of a batch: every success plus every failure.
///
/// A key appears either in `values` or in `error`, never both.
#[derive(Debug)]
pub struct Batch<T> {
    pub values: HashMap<String, T>,
    pub error: Option<BatchError>,
}

impl<T> Batch<T> {
    pub fn into_parts(self) -> (HashMap<String, T>, Option<BatchError>) {
        (self.values, self.error)
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Removes repeated keys, keeping first-seen order.
pub(crate) fn dedup_keys(keys: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

/// Runs `task` for every key and collects the results.
///
/// At most `max_concurrency` tasks are in flight (0 means one per key). All
/// results are drained before returning; a failing key never cancels its
/// siblings. The result map is owned by this single collector.
pub(crate) async fn fan_out<T, F, Fut>(
    keys: Vec<String>,
    max_concurrency: usize,
    task: F,
) -> Batch<T>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = (String, Result<T, EngineError>)>,
{
    let total = keys.len();
    let limit = match max_concurrency {
        0 => total.max(1),
        n => n,
    };

    let mut values = HashMap::with_capacity(total);
    let mut errors = Vec::new();

    let mut results = stream::iter(keys).map(task).buffer_unordered(limit);
    while let Some((key, result)) = results.next().await {
        match result {
            Ok(value) => {
                values.insert(key, value);
            }
            Err(source) => {
                tracing::debug!(key = %key, error = %source, "remote fetch failed");
                errors.push(KeyError::new(key, source));
            }
        }
    }

    Batch {
        values,
        error: BatchError::from_errors(errors),
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded fail-fast worker pool.
//!
//! Each batch runs on its own rayon pool sized to the concurrency limit.
//! The first task to fail records its error and cancels the shared token;
//! queued tasks see the token and return without running, and the caller
//! gets that first error back.

use rayon::prelude::*;
use std::sync::Mutex;

use crate::cancel::CancelToken;
use crate::errors::{Error, Result};

/// Runs `task` for every item with at most `limit` tasks in flight.
pub fn try_for_each_bounded<T, F>(
    limit: usize,
    cancel: &CancelToken,
    items: Vec<T>,
    task: F,
) -> Result<()>
where
    T: Send,
    F: Fn(T) -> Result<()> + Send + Sync,
{
    if items.is_empty() {
        return Ok(());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(limit.max(1))
        .thread_name(|i| format!("threadrank-worker-{}", i))
        .build()
        .map_err(|e| Error::Config(format!("failed to start worker pool: {}", e)))?;

    let first_error: Mutex<Option<Error>> = Mutex::new(None);

    let outcome = pool.install(|| {
        items.into_par_iter().try_for_each(|item| {
            if cancel.is_cancelled() {
                return Err(());
            }
            task(item).map_err(|err| {
                if let Ok(mut slot) = first_error.lock() {
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                }
                cancel.cancel();
            })
        })
    });

    let first_error = first_error.into_inner().unwrap_or_else(|e| e.into_inner());
    match (outcome, first_error) {
        (_, Some(err)) => Err(err),
        (Err(()), None) => Err(Error::Cancelled),
        (Ok(()), None) => Ok(()),
    }
}

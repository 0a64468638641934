// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wait for zonal operations to complete.
//!
//! Compute Engine operations do not include the final result of the mutation,
//! they only report a status. The waiter queries the status at a fixed
//! interval until it is `DONE`. A `DONE` operation with any error field set is
//! a failure, and is reported as [Error::OperationFailed].
//!
//! By default the waiter never gives up: if the operation never completes the
//! waiter never returns. Use [OperationWaiter::with_deadline] or
//! [OperationWaiter::with_cancellation] to bound the wait.
//!
//! # Example
//! ```no_run
//! # use instance_lifecycle::{model::OperationHandle, stub::Compute, waiter::OperationWaiter};
//! # async fn sample(stub: &dyn Compute) -> instance_lifecycle::Result<()> {
//! use std::time::Duration;
//! let waiter = OperationWaiter::new()
//!     .with_interval(Duration::from_secs(2))
//!     .with_deadline(Duration::from_secs(300));
//! let handle = OperationHandle::new("my-project", "us-central1-a", "operation-123");
//! let operation = waiter.wait(stub, handle).await?;
//! println!("operation completed: {operation:?}");
//! # Ok(()) }
//! ```

use crate::model::{Operation, OperationHandle};
use crate::stub::Compute;
use crate::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The default time between polling attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The result of querying an operation once.
#[derive(Debug)]
pub enum PollingResult {
    /// The operation has not reached its terminal state.
    InProgress(Operation),
    /// The operation completed, or the query failed.
    ///
    /// No further queries are issued after this result.
    Completed(Result<Operation>),
}

/// Queries a single operation until it reaches its terminal state.
///
/// Each call to [poll][OperationPoller::poll] issues exactly one query. After
/// it returns [PollingResult::Completed] all calls return `None` without
/// contacting the provider.
#[derive(Debug)]
pub struct OperationPoller<'a, S: ?Sized> {
    stub: &'a S,
    handle: OperationHandle,
    attempt_count: u32,
    completed: bool,
}

impl<'a, S> OperationPoller<'a, S>
where
    S: Compute + ?Sized,
{
    pub fn new(stub: &'a S, handle: OperationHandle) -> Self {
        Self {
            stub,
            handle,
            attempt_count: 0,
            completed: false,
        }
    }

    /// The operation this poller queries.
    pub fn handle(&self) -> &OperationHandle {
        &self.handle
    }

    /// The number of queries issued so far.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Queries the current status of the operation.
    pub async fn poll(&mut self) -> Option<PollingResult> {
        if self.completed {
            return None;
        }
        self.attempt_count += 1;
        let result = self
            .stub
            .get_zone_operation(&self.handle.project, &self.handle.zone, &self.handle.name)
            .await;
        let poll = handle_poll(&self.handle, result);
        self.completed = matches!(poll, PollingResult::Completed(_));
        Some(poll)
    }
}

/// Blocks the caller until an operation reaches its terminal state.
///
/// The waiter sleeps for a fixed interval between queries. There is no
/// backoff, and no retry: any error querying the operation is returned
/// immediately.
#[derive(Clone, Debug)]
pub struct OperationWaiter {
    interval: Duration,
    deadline: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

impl Default for OperationWaiter {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
            cancellation: None,
        }
    }
}

impl OperationWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes the time between polling attempts.
    pub fn with_interval(mut self, v: Duration) -> Self {
        self.interval = v;
        self
    }

    /// Gives up with [Error::DeadlineExceeded] if the operation is not done
    /// after this much time.
    pub fn with_deadline(mut self, v: Duration) -> Self {
        self.deadline = Some(v);
        self
    }

    /// Like [with_deadline][Self::with_deadline], `None` disables the deadline.
    pub fn with_optional_deadline(mut self, v: Option<Duration>) -> Self {
        self.deadline = v;
        self
    }

    /// Gives up with [Error::Cancelled] when `token` is cancelled.
    ///
    /// Cancellation is observed between queries, a query in flight always
    /// completes.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Waits for `handle` to complete.
    ///
    /// Returns the final operation, unchanged, if it completed without errors.
    pub async fn wait<S>(&self, stub: &S, handle: OperationHandle) -> Result<Operation>
    where
        S: Compute + ?Sized,
    {
        self.until_done(OperationPoller::new(stub, handle)).await
    }

    /// Runs `poller` until it completes.
    pub async fn until_done<S>(&self, mut poller: OperationPoller<'_, S>) -> Result<Operation>
    where
        S: Compute + ?Sized,
    {
        let loop_start = Instant::now();
        tracing::info!(operation = %poller.handle(), "waiting for operation to finish");
        while let Some(p) = poller.poll().await {
            match p {
                PollingResult::Completed(r) => {
                    log_completion(&poller, &r);
                    return r;
                }
                PollingResult::InProgress(op) => {
                    tracing::debug!(
                        operation = %poller.handle(),
                        attempt = poller.attempt_count(),
                        status = ?op.status,
                        progress = ?op.progress,
                        "operation in progress"
                    );
                }
            }
            self.pause(poller.handle(), loop_start).await?;
        }
        // We can only get here if `poll()` returns `None`, but it only returns
        // `None` after it returned `PollingResult::Completed`.
        unreachable!("loop should exit via the `Completed` branch vs. this line");
    }

    async fn pause(&self, handle: &OperationHandle, loop_start: Instant) -> Result<()> {
        let delay = match self.deadline {
            None => self.interval,
            Some(limit) => {
                let elapsed = loop_start.elapsed();
                if elapsed >= limit {
                    return Err(Error::DeadlineExceeded {
                        operation: handle.clone(),
                        limit,
                    });
                }
                self.interval.min(limit - elapsed)
            }
        };
        let Some(token) = self.cancellation.as_ref() else {
            tokio::time::sleep(delay).await;
            return Ok(());
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled {
                operation: handle.clone(),
            }),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

fn handle_poll(handle: &OperationHandle, result: Result<Operation>) -> PollingResult {
    match result {
        Err(e) => PollingResult::Completed(Err(e)),
        Ok(o) if o.is_done() => PollingResult::Completed(handle_done(handle, o)),
        Ok(o) => PollingResult::InProgress(o),
    }
}

/// Converts an operation in its terminal state to the waiter result.
pub(crate) fn handle_done(handle: &OperationHandle, o: Operation) -> Result<Operation> {
    o.to_result().map_err(|error| Error::OperationFailed {
        operation: handle.clone(),
        error,
    })
}

fn log_completion<S>(poller: &OperationPoller<'_, S>, result: &Result<Operation>)
where
    S: Compute + ?Sized,
{
    match result {
        Ok(_) => tracing::info!(
            operation = %poller.handle(),
            attempts = poller.attempt_count(),
            "operation done"
        ),
        Err(Error::OperationFailed { error, .. }) => tracing::info!(
            operation = %poller.handle(),
            attempts = poller.attempt_count(),
            "operation done with error: {error}"
        ),
        Err(e) => tracing::warn!(
            operation = %poller.handle(),
            attempts = poller.attempt_count(),
            "cannot query operation: {e}"
        ),
    }
}

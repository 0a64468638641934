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

use crate::model::{OperationError, OperationHandle};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The errors returned by this crate.
///
/// None of these errors are retried. They propagate to the caller as soon as
/// they are detected.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The operation reached its terminal state and reported an error.
    #[error("operation {operation} failed: {error}")]
    OperationFailed {
        operation: OperationHandle,
        error: OperationError,
    },

    /// The provider request failed, e.g. a network or authentication error.
    #[error("cannot complete the provider request: {0}")]
    Transport(#[source] BoxError),

    /// A mutation returned an operation without a name, so it cannot be polled.
    #[error("the provider returned an operation without a name and not yet done")]
    MissingOperationName,

    /// The waiter was configured with a deadline and the operation did not
    /// complete in time.
    #[error("operation {operation} did not complete within {limit:?}")]
    DeadlineExceeded {
        operation: OperationHandle,
        limit: Duration,
    },

    /// The waiter was cancelled before the operation completed.
    #[error("waiting for operation {operation} was cancelled")]
    Cancelled { operation: OperationHandle },

    /// The operator interrupted the program before it started to create or
    /// delete the instance.
    #[error("interrupted before changing instance {instance}")]
    Interrupted { instance: String },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wraps any provider client error.
    pub fn transport<T: Into<BoxError>>(source: T) -> Self {
        Self::Transport(source.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    /// The payload of a failed operation, if that is the cause of this error.
    pub fn operation_error(&self) -> Option<&OperationError> {
        match self {
            Self::OperationFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

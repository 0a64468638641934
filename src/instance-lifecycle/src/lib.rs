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

//! Create, list, and delete a single Compute Engine instance.
//!
//! Compute Engine reports mutations (inserting or deleting an instance) as
//! zonal operations. The operation returned by the mutation is only a handle,
//! the application must query it until its status is `DONE` before assuming
//! the mutation took effect. The [OperationWaiter][waiter::OperationWaiter]
//! implements that polling loop.
//!
//! The provider is abstracted behind the [Compute][stub::Compute] trait. The
//! production implementation, [ComputeClient][transport::ComputeClient], uses
//! the Compute Engine client library. Tests use mocks or fakes.
//!
//! # Example
//! ```no_run
//! # async fn sample() -> instance_lifecycle::Result<()> {
//! use instance_lifecycle::config::VmConfig;
//! use instance_lifecycle::lifecycle::InstanceManager;
//! use instance_lifecycle::transport::ComputeClient;
//! use instance_lifecycle::waiter::OperationWaiter;
//!
//! let client = ComputeClient::new().await?;
//! let config = VmConfig::new().set_project("my-project").set_zone("us-central1-a");
//! let manager = InstanceManager::new(client, config, OperationWaiter::new());
//! manager.create_instance("demo-instance").await?;
//! for instance in manager.list_instances().await? {
//!     println!("{instance:?}");
//! }
//! manager.delete_instance("demo-instance").await?;
//! # Ok(()) }
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod stub;
pub mod transport;
pub mod waiter;

pub use error::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

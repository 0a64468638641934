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

//! The provider capabilities consumed by this crate.
//!
//! Applications and tests can substitute their own implementation of
//! [Compute], for example, to simulate an operation that fails after a few
//! polling attempts.

use crate::Result;
use crate::model::{InstanceDescriptor, InstanceSummary, Operation};

/// The subset of the Compute Engine API used to manage one instance.
///
/// Implementations should return [Error::Transport][crate::Error::Transport]
/// for any failure to complete the request. Errors reported inside an
/// [Operation] are not request failures.
#[async_trait::async_trait]
pub trait Compute: std::fmt::Debug + Send + Sync {
    /// Starts creating a new instance.
    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        instance: InstanceDescriptor,
    ) -> Result<Operation>;

    /// Starts deleting an instance.
    async fn delete_instance(&self, project: &str, zone: &str, instance: &str)
    -> Result<Operation>;

    /// Returns the current state of a zonal operation.
    ///
    /// Querying an operation that already completed returns the same result.
    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation>;

    /// Lists all the instances in a zone. An empty zone returns an empty list.
    async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<InstanceSummary>>;
}

#[async_trait::async_trait]
impl<T> Compute for std::sync::Arc<T>
where
    T: Compute + ?Sized,
{
    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        instance: InstanceDescriptor,
    ) -> Result<Operation> {
        (**self).insert_instance(project, zone, instance).await
    }

    async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<Operation> {
        (**self).delete_instance(project, zone, instance).await
    }

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation> {
        (**self).get_zone_operation(project, zone, operation).await
    }

    async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<InstanceSummary>> {
        (**self).list_instances(project, zone).await
    }
}

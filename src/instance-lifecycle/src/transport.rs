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

//! Implements [Compute] using the Compute Engine client library.

use crate::model::{
    ErrorDetail, ErrorList, InstanceDescriptor, InstanceSummary, Operation, OperationStatus,
};
use crate::stub::Compute;
use crate::{Error, Result};
use google_cloud_auth::credentials::{Builder as CredentialsBuilder, Credentials};
use google_cloud_compute_v1::client::{Instances, ZoneOperations};
use google_cloud_compute_v1::model;
use google_cloud_gax::paginator::ItemPaginator as _;

/// A [Compute] implementation backed by the `Instances` and `ZoneOperations`
/// clients.
#[derive(Clone, Debug)]
pub struct ComputeClient {
    instances: Instances,
    operations: ZoneOperations,
}

impl ComputeClient {
    /// Creates a new client using the [Application Default Credentials].
    ///
    /// [Application Default Credentials]: https://cloud.google.com/docs/authentication/application-default-credentials
    pub async fn new() -> Result<Self> {
        let credentials = CredentialsBuilder::default()
            .build()
            .map_err(Error::transport)?;
        Self::with_credentials(credentials).await
    }

    /// Creates a new client using `credentials` for both underlying clients.
    pub async fn with_credentials(credentials: Credentials) -> Result<Self> {
        let instances = Instances::builder()
            .with_credentials(credentials.clone())
            .with_tracing()
            .build()
            .await
            .map_err(Error::transport)?;
        let operations = ZoneOperations::builder()
            .with_credentials(credentials)
            .with_tracing()
            .build()
            .await
            .map_err(Error::transport)?;
        Ok(Self::from_clients(instances, operations))
    }

    /// Wraps existing clients.
    pub fn from_clients(instances: Instances, operations: ZoneOperations) -> Self {
        Self {
            instances,
            operations,
        }
    }
}

#[async_trait::async_trait]
impl Compute for ComputeClient {
    async fn insert_instance(
        &self,
        project: &str,
        zone: &str,
        instance: InstanceDescriptor,
    ) -> Result<Operation> {
        let operation = self
            .instances
            .insert()
            .set_project(project)
            .set_zone(zone)
            .set_body(to_instance(instance))
            .send()
            .await
            .map_err(Error::transport)?;
        from_operation(operation)
    }

    async fn delete_instance(
        &self,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<Operation> {
        let operation = self
            .instances
            .delete()
            .set_project(project)
            .set_zone(zone)
            .set_instance(instance)
            .send()
            .await
            .map_err(Error::transport)?;
        from_operation(operation)
    }

    async fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation> {
        let operation = self
            .operations
            .get()
            .set_project(project)
            .set_zone(zone)
            .set_operation(operation)
            .send()
            .await
            .map_err(Error::transport)?;
        from_operation(operation)
    }

    async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<InstanceSummary>> {
        let mut items = self
            .instances
            .list()
            .set_project(project)
            .set_zone(zone)
            .by_item();
        let mut instances = Vec::new();
        while let Some(item) = items.next().await.transpose().map_err(Error::transport)? {
            instances.push(from_instance(item));
        }
        Ok(instances)
    }
}

fn to_instance(descriptor: InstanceDescriptor) -> model::Instance {
    let boot_disk = model::AttachedDisk::new()
        .set_boot(true)
        .set_auto_delete(descriptor.boot_disk.auto_delete)
        .set_initialize_params(
            model::AttachedDiskInitializeParams::new()
                .set_source_image(descriptor.boot_disk.source_image),
        );
    let network_interfaces = descriptor.network_interfaces.into_iter().map(|n| {
        let access_configs = n.external_nat.into_iter().map(|name| {
            model::AccessConfig::new()
                .set_type(model::access_config::Type::OneToOneNat)
                .set_name(name)
        });
        model::NetworkInterface::new()
            .set_network(n.network)
            .set_access_configs(access_configs)
    });
    let service_accounts = descriptor
        .service_accounts
        .into_iter()
        .map(|a| model::ServiceAccount::new().set_email(a.email).set_scopes(a.scopes));
    let metadata_items = descriptor
        .metadata
        .into_iter()
        .map(|(k, v)| model::metadata::Items::new().set_key(k).set_value(v));

    model::Instance::new()
        .set_name(descriptor.name)
        .set_machine_type(descriptor.machine_type)
        .set_disks([boot_disk])
        .set_network_interfaces(network_interfaces)
        .set_service_accounts(service_accounts)
        .set_metadata(model::Metadata::new().set_items(metadata_items))
        .set_labels(descriptor.labels)
}

fn from_operation(operation: model::Operation) -> Result<Operation> {
    let status = operation.status.map(|s| match s.name() {
        Some(name) => OperationStatus::from(name),
        None => OperationStatus::Unknown(format!("{s:?}")),
    });
    let error = operation.error.map(from_error).transpose()?;
    Ok(Operation {
        name: operation.name,
        status,
        operation_type: operation.operation_type,
        target_link: operation.target_link,
        progress: operation.progress,
        error,
        http_error_status_code: operation.http_error_status_code,
        http_error_message: operation.http_error_message,
    })
}

fn from_error(error: model::operation::Error) -> Result<ErrorList> {
    let errors = error
        .errors
        .into_iter()
        .map(|e| {
            let detail = ErrorDetail {
                code: e.code,
                location: e.location,
                message: e.message,
                ..ErrorDetail::default()
            };
            if e.error_details.is_empty() {
                return Ok(detail);
            }
            let details = serde_json::to_value(&e.error_details)?;
            Ok(detail.set_extra("errorDetails", details))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ErrorList::new().set_errors(errors))
}

fn from_instance(instance: model::Instance) -> InstanceSummary {
    let status = instance.status.map(|s| match s.name() {
        Some(name) => name.to_string(),
        None => format!("{s:?}"),
    });
    InstanceSummary {
        name: instance.name.unwrap_or_default(),
        zone: instance.zone,
        status,
        machine_type: instance.machine_type,
    }
}

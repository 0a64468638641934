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

//! The types exchanged with the provider.
//!
//! These types are deliberately smaller than the Compute Engine messages. They
//! only model the fields this crate reads or writes. Error payloads are the
//! exception: any field without a dedicated member is kept in `extra`, so a
//! failed operation reports everything the provider returned. The [transport]
//! module converts these types to and from the client library types.
//!
//! [transport]: crate::transport

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Identifies a zonal operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub struct OperationHandle {
    /// The project that owns the operation.
    pub project: String,
    /// The zone where the operation runs.
    pub zone: String,
    /// The operation name, as returned by the mutation that started it.
    pub name: String,
}

impl OperationHandle {
    pub fn new<P, Z, N>(project: P, zone: Z, name: N) -> Self
    where
        P: Into<String>,
        Z: Into<String>,
        N: Into<String>,
    {
        Self {
            project: project.into(),
            zone: zone.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "projects/{}/zones/{}/operations/{}",
            self.project, self.zone, self.name
        )
    }
}

/// The lifecycle state of an operation.
///
/// Only [Done][OperationStatus::Done] is terminal. Once an operation reports
/// `Done` its status never changes again.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[non_exhaustive]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    /// A status value this crate does not recognize. Treated as non-terminal.
    Unknown(String),
}

impl OperationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Unknown(s) => s.as_str(),
        }
    }

    /// Returns true if no further state transitions happen after this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for OperationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "DONE" => Self::Done,
            _ => Self::Unknown(value),
        }
    }
}

impl From<&str> for OperationStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<OperationStatus> for String {
    fn from(value: OperationStatus) -> Self {
        match value {
            OperationStatus::Unknown(s) => s,
            s => s.as_str().to_string(),
        }
    }
}

/// An asynchronous unit of work tracked by the provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Operation {
    /// The operation name. Used to query the operation status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The current status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OperationStatus>,

    /// The type of operation, such as `insert` or `delete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,

    /// The URL of the resource the operation modifies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,

    /// An optional progress indicator, from 0 to 100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,

    /// The errors, if any, generated while processing the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorList>,

    /// The HTTP status code when the operation failed, e.g. `404`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_error_status_code: Option<i32>,

    /// The HTTP error message when the operation failed, e.g. `NOT FOUND`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_error_message: Option<String>,
}

impl Operation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = Some(v.into());
        self
    }

    pub fn set_status<T: Into<OperationStatus>>(mut self, v: T) -> Self {
        self.status = Some(v.into());
        self
    }

    pub fn set_operation_type<T: Into<String>>(mut self, v: T) -> Self {
        self.operation_type = Some(v.into());
        self
    }

    pub fn set_target_link<T: Into<String>>(mut self, v: T) -> Self {
        self.target_link = Some(v.into());
        self
    }

    pub fn set_progress(mut self, v: i32) -> Self {
        self.progress = Some(v);
        self
    }

    pub fn set_error(mut self, v: ErrorList) -> Self {
        self.error = Some(v);
        self
    }

    pub fn set_http_error_status_code(mut self, v: i32) -> Self {
        self.http_error_status_code = Some(v);
        self
    }

    pub fn set_http_error_message<T: Into<String>>(mut self, v: T) -> Self {
        self.http_error_message = Some(v.into());
        self
    }

    /// Returns true if the operation reached its terminal state.
    pub fn is_done(&self) -> bool {
        self.status.as_ref().is_some_and(OperationStatus::is_terminal)
    }

    /// Returns true if any of the error fields is present.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
            || self.http_error_status_code.is_some()
            || self.http_error_message.is_some()
    }

    /// Splits a completed operation into its success or error payload.
    ///
    /// The result is an error if any of the error fields is present, even if
    /// the error list is empty.
    pub fn to_result(self) -> std::result::Result<Self, OperationError> {
        if !self.has_error() {
            return Ok(self);
        }
        let (details, extra) = self
            .error
            .map(|e| (e.errors, e.extra))
            .unwrap_or_default();
        Err(OperationError {
            status_code: self.http_error_status_code,
            message: self.http_error_message,
            details,
            extra,
        })
    }
}

/// The errors reported by a failed operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ErrorList {
    pub errors: Vec<ErrorDetail>,
    /// Any other fields in the error object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_errors<T, I>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: Into<ErrorDetail>,
    {
        self.errors = v.into_iter().map(|i| i.into()).collect();
        self
    }

    pub fn set_extra<K: Into<String>, V: Into<Value>>(mut self, k: K, v: V) -> Self {
        self.extra.insert(k.into(), v.into());
        self
    }
}

/// A single error reported by a failed operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct ErrorDetail {
    /// The error type identifier, e.g. `QUOTA_EXCEEDED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Indicates the field in the request that caused the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// A human-readable description of the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Any other fields, e.g. `errorDetails`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorDetail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_code<T: Into<String>>(mut self, v: T) -> Self {
        self.code = Some(v.into());
        self
    }

    pub fn set_location<T: Into<String>>(mut self, v: T) -> Self {
        self.location = Some(v.into());
        self
    }

    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = Some(v.into());
        self
    }

    pub fn set_extra<K: Into<String>, V: Into<Value>>(mut self, k: K, v: V) -> Self {
        self.extra.insert(k.into(), v.into());
        self
    }
}

/// The error payload of an operation that completed unsuccessfully.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct OperationError {
    /// The HTTP error status code.
    pub status_code: Option<i32>,
    /// The HTTP error message.
    pub message: Option<String>,
    /// The errors generated while processing the operation.
    pub details: Vec<ErrorDetail>,
    /// Fields of the operation's error object without a dedicated member.
    pub extra: Map<String, Value>,
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status_code, self.message.as_deref()) {
            (Some(code), Some(msg)) => write!(f, "HTTP {code} {msg}")?,
            (Some(code), None) => write!(f, "HTTP {code}")?,
            (None, Some(msg)) => f.write_str(msg)?,
            (None, None) => f.write_str("unspecified error")?,
        }
        for d in &self.details {
            write!(
                f,
                "; {}: {}",
                d.code.as_deref().unwrap_or("UNKNOWN"),
                d.message.as_deref().unwrap_or_default()
            )?;
        }
        if !self.extra.is_empty() {
            write!(f, "; {}", Value::Object(self.extra.clone()))?;
        }
        Ok(())
    }
}

/// A boot disk created from an image.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct BootDisk {
    pub source_image: String,
    /// Delete the disk when the instance is deleted.
    pub auto_delete: bool,
}

/// A network interface, optionally with an external (NAT) address.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct NetworkInterfaceConfig {
    pub network: String,
    /// The name of the one-to-one NAT access config, if any.
    pub external_nat: Option<String>,
}

/// A service account and the OAuth scopes granted to the instance.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct ServiceAccountConfig {
    pub email: String,
    pub scopes: Vec<String>,
}

/// The configuration of a new instance.
///
/// Built once from [VmConfig][crate::config::VmConfig] and sent to the
/// provider. The provider owns the lifecycle of the instance after that.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct InstanceDescriptor {
    pub name: String,
    /// The zone-qualified machine type, e.g.
    /// `zones/us-west1-a/machineTypes/n1-standard-8`.
    pub machine_type: String,
    pub boot_disk: BootDisk,
    pub network_interfaces: Vec<NetworkInterfaceConfig>,
    pub service_accounts: Vec<ServiceAccountConfig>,
    /// Metadata items, readable from inside the instance.
    pub metadata: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

/// An instance as reported by the provider listing.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct InstanceSummary {
    pub name: String,
    pub zone: Option<String>,
    pub status: Option<String>,
    pub machine_type: Option<String>,
}

impl InstanceSummary {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn set_zone<T: Into<String>>(mut self, v: T) -> Self {
        self.zone = Some(v.into());
        self
    }

    pub fn set_status<T: Into<String>>(mut self, v: T) -> Self {
        self.status = Some(v.into());
        self
    }

    pub fn set_machine_type<T: Into<String>>(mut self, v: T) -> Self {
        self.machine_type = Some(v.into());
        self
    }
}

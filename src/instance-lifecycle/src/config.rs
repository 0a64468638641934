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

//! Configuration for the instance lifecycle.
//!
//! The configuration starts from built-in defaults. A JSON file may override
//! any of the recognized fields, and the command-line flags override the file.
//!
//! ```json
//! {
//!   "project": "my-project",
//!   "zone": "us-central1-a",
//!   "machineType": "n1-standard-8",
//!   "sourceDiskImage": "projects/debian-cloud/global/images/family/debian-12",
//!   "bucket": "my-bucket"
//! }
//! ```

use crate::model::{BootDisk, InstanceDescriptor, NetworkInterfaceConfig, ServiceAccountConfig};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_PROJECT: &str = "tf-benchmark-dashboard";
pub const DEFAULT_ZONE: &str = "us-west1-a";
pub const DEFAULT_MACHINE_TYPE: &str = "n1-standard-8";
pub const DEFAULT_SOURCE_DISK_IMAGE: &str =
    "projects/tf-benchmark-dashboard/global/images/ubuntu-1804-cuda10-20191003";

const DEFAULT_NETWORK: &str = "global/networks/default";
const EXTERNAL_NAT: &str = "External NAT";
const DEFAULT_SERVICE_ACCOUNT: &str = "default";
const DEFAULT_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/devstorage.read_write",
    "https://www.googleapis.com/auth/logging.write",
];
const SOURCE_LABEL: (&str, &str) = ("source", "compute-instance-lifecycle");

/// The configuration used to create and manage the instance.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct VmConfig {
    /// The project that owns the instance.
    pub project: String,
    /// The zone where the instance runs.
    pub zone: String,
    /// The machine type, either a short name (`n1-standard-8`) or a
    /// zone-qualified URL.
    pub machine_type: String,
    /// The image used to initialize the boot disk.
    pub source_disk_image: String,
    /// A Cloud Storage bucket the instance writes its output to. May be empty.
    pub bucket: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            zone: DEFAULT_ZONE.to_string(),
            machine_type: DEFAULT_MACHINE_TYPE.to_string(),
            source_disk_image: DEFAULT_SOURCE_DISK_IMAGE.to_string(),
            bucket: String::new(),
        }
    }
}

/// The contents of a configuration file. All fields are optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ConfigFile {
    project: Option<String>,
    zone: Option<String>,
    machine_type: Option<String>,
    source_disk_image: Option<String>,
    bucket: Option<String>,
}

impl VmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_project<T: Into<String>>(mut self, v: T) -> Self {
        self.project = v.into();
        self
    }

    pub fn set_zone<T: Into<String>>(mut self, v: T) -> Self {
        self.zone = v.into();
        self
    }

    pub fn set_machine_type<T: Into<String>>(mut self, v: T) -> Self {
        self.machine_type = v.into();
        self
    }

    pub fn set_source_disk_image<T: Into<String>>(mut self, v: T) -> Self {
        self.source_disk_image = v.into();
        self
    }

    pub fn set_bucket<T: Into<String>>(mut self, v: T) -> Self {
        self.bucket = v.into();
        self
    }

    /// Overrides the fields present in the JSON file at `path`.
    pub fn merge_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        self.merge_json(&contents)
    }

    /// Overrides the fields present in `contents`, a JSON object.
    pub fn merge_json(self, contents: &str) -> Result<Self> {
        let file = serde_json::from_str::<ConfigFile>(contents)?;
        let config = file.project.into_iter().fold(self, |c, v| c.set_project(v));
        let config = file.zone.into_iter().fold(config, |c, v| c.set_zone(v));
        let config = file
            .machine_type
            .into_iter()
            .fold(config, |c, v| c.set_machine_type(v));
        let config = file
            .source_disk_image
            .into_iter()
            .fold(config, |c, v| c.set_source_disk_image(v));
        Ok(file.bucket.into_iter().fold(config, |c, v| c.set_bucket(v)))
    }

    /// Verifies the required fields are set.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("project", &self.project),
            ("zone", &self.zone),
            ("machineType", &self.machine_type),
            ("sourceDiskImage", &self.source_disk_image),
        ];
        if let Some((name, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::config(format!("{name} must not be empty")));
        }
        Ok(())
    }

    /// The machine type as a zone-qualified URL.
    pub fn machine_type_url(&self) -> String {
        if self.machine_type.contains('/') {
            return self.machine_type.clone();
        }
        format!("zones/{}/machineTypes/{}", self.zone, self.machine_type)
    }

    /// Where the instance is expected to upload its output, if a bucket is
    /// configured.
    pub fn output_url(&self) -> Option<String> {
        if self.bucket.is_empty() {
            return None;
        }
        Some(format!(
            "http://storage.googleapis.com/{}/output.png",
            self.bucket
        ))
    }

    /// Builds the descriptor for a new instance named `name`.
    ///
    /// The instance boots from [source_disk_image][Self::source_disk_image],
    /// has an external NAT address on the default network, and can write to
    /// Cloud Storage and Cloud Logging with the default service account.
    pub fn instance(&self, name: &str) -> Result<InstanceDescriptor> {
        self.validate()?;
        validate_instance_name(name)?;
        let metadata = if self.bucket.is_empty() {
            BTreeMap::new()
        } else {
            BTreeMap::from([("bucket".to_string(), self.bucket.clone())])
        };
        Ok(InstanceDescriptor {
            name: name.to_string(),
            machine_type: self.machine_type_url(),
            boot_disk: BootDisk {
                source_image: self.source_disk_image.clone(),
                auto_delete: true,
            },
            network_interfaces: vec![NetworkInterfaceConfig {
                network: DEFAULT_NETWORK.to_string(),
                external_nat: Some(EXTERNAL_NAT.to_string()),
            }],
            service_accounts: vec![ServiceAccountConfig {
                email: DEFAULT_SERVICE_ACCOUNT.to_string(),
                scopes: DEFAULT_SCOPES.map(str::to_string).to_vec(),
            }],
            metadata,
            labels: BTreeMap::from([(SOURCE_LABEL.0.to_string(), SOURCE_LABEL.1.to_string())]),
        })
    }
}

// Compute Engine instance names must match `[a-z]([-a-z0-9]{0,61}[a-z0-9])?`.
fn validate_instance_name(name: &str) -> Result<()> {
    let valid = (1..=63).contains(&name.len())
        && name.starts_with(|c: char| c.is_ascii_lowercase())
        && !name.ends_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        return Ok(());
    }
    Err(Error::config(format!(
        "invalid instance name {name:?}, names must start with a lowercase letter, \
         contain only lowercase letters, digits, or dashes, \
         not end with a dash, and have at most 63 characters"
    )))
}

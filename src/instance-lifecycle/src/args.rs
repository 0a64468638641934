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

use anyhow::bail;
use clap::Parser;
use humantime::parse_duration;
use instance_lifecycle::config::VmConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration options for the program.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = super::DESCRIPTION)]
pub struct Args {
    /// The name of the instance to create and delete.
    #[arg(long, default_value = "demo-instance")]
    pub name: String,

    /// The project hosting the instance.
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project: Option<String>,

    /// The zone hosting the instance.
    #[arg(long)]
    pub zone: Option<String>,

    /// The machine type, either a short name such as `n1-standard-8` or a
    /// zone-qualified URL.
    #[arg(long)]
    pub machine_type: Option<String>,

    /// The image used to initialize the boot disk.
    #[arg(long)]
    pub source_disk_image: Option<String>,

    /// A Cloud Storage bucket the instance writes its output to.
    #[arg(long)]
    pub bucket: Option<String>,

    /// A JSON file with default values for the instance configuration.
    ///
    /// Flags override any values in this file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// How long to wait between queries for the status of an operation.
    #[arg(long, value_parser = parse_duration, default_value = "1s")]
    pub poll_interval: Duration,

    /// Stop waiting for an operation after this long.
    ///
    /// By default the program waits until each operation completes.
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Delete the instance without waiting for confirmation.
    #[arg(long, default_value_t = false)]
    pub no_confirm: bool,

    /// Log debugging information, including every status query.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Validates the arguments after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval.is_zero() {
            bail!("invalid poll interval, should be > 0")
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            bail!("invalid timeout, should be > 0")
        }
        Ok(())
    }

    /// Computes the instance configuration.
    ///
    /// Flags take precedence over the configuration file, which takes
    /// precedence over the built-in defaults.
    pub fn to_config(&self) -> anyhow::Result<VmConfig> {
        let config = match &self.config {
            None => VmConfig::new(),
            Some(path) => VmConfig::new().merge_file(path)?,
        };
        let config = self.project.iter().fold(config, |c, v| c.set_project(v));
        let config = self.zone.iter().fold(config, |c, v| c.set_zone(v));
        let config = self
            .machine_type
            .iter()
            .fold(config, |c, v| c.set_machine_type(v));
        let config = self
            .source_disk_image
            .iter()
            .fold(config, |c, v| c.set_source_disk_image(v));
        let config = self.bucket.iter().fold(config, |c, v| c.set_bucket(v));
        config.validate()?;
        Ok(config)
    }
}

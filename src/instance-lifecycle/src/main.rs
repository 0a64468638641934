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

//! Create a Compute Engine instance, wait for it, list the zone, and delete it.

mod args;

use args::Args;
use clap::Parser;
use instance_lifecycle::lifecycle::{
    Confirmation, InstanceManager, LineConfirmation, NoConfirmation,
};
use instance_lifecycle::transport::ComputeClient;
use instance_lifecycle::waiter::OperationWaiter;
use tokio_util::sync::CancellationToken;

const EXIT_INTERRUPTED: i32 = 130;

const DESCRIPTION: &str = concat!(
    "This program creates a Compute Engine instance, waits until the",
    " instance is created, lists the instances in the zone, and then deletes",
    " the instance. Each step waits for the corresponding operation to complete."
);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    args.validate()?;
    enable_tracing(&args)?;
    tracing::info!("Configuration: {args:?}");

    let config = args.to_config()?;
    let client = ComputeClient::new().await?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    tokio::spawn(cancel_on_interrupt(cancel.clone()));

    let waiter = OperationWaiter::new()
        .with_interval(args.poll_interval)
        .with_optional_deadline(args.timeout)
        .with_cancellation(cancel.clone());
    let manager = InstanceManager::new(client, config, waiter);

    let mut gate: Box<dyn Confirmation> = if args.no_confirm {
        Box::new(NoConfirmation)
    } else {
        Box::new(LineConfirmation::stdin())
    };
    let mut out = std::io::stdout();
    let result = manager.run(&args.name, gate.as_mut(), &mut out).await;
    if cancel.is_cancelled() {
        // A pending read from stdin would block the runtime shutdown.
        if let Err(e) = &result {
            tracing::error!("{e}");
        }
        std::process::exit(EXIT_INTERRUPTED);
    }
    result?;
    Ok(())
}

// The first interrupt stops the sequence, any operation in progress is left
// running. A second interrupt exits immediately.
async fn cancel_on_interrupt(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        r = tokio::signal::ctrl_c() => {
            if let Err(e) = r {
                tracing::error!("cannot listen for interrupts: {e:?}");
                return;
            }
        }
    }
    tracing::warn!("interrupted, no further operations will be started");
    cancel.cancel();
    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(EXIT_INTERRUPTED);
    }
}

fn enable_tracing(args: &Args) -> anyhow::Result<()> {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

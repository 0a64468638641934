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

//! Create, list, and delete one instance.
//!
//! Every mutation waits for its operation to complete before returning. An
//! instance is only assumed to exist after the insert operation completes
//! successfully, and only assumed to be gone after the delete operation
//! completes successfully. There is no compensating action: if creating the
//! instance fails nothing is cleaned up, and if deleting it fails the deletion
//! is not retried.
//!
//! If the waiter has a cancellation token, cancelling it stops the sequence:
//! no new insert or delete is started, and the confirmation gate stops
//! waiting for input.

use crate::config::VmConfig;
use crate::model::{InstanceSummary, Operation, OperationHandle};
use crate::stub::Compute;
use crate::waiter::{OperationWaiter, handle_done};
use crate::{Error, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};

/// A manual gate before deleting the instance.
#[async_trait::async_trait]
pub trait Confirmation: Send {
    /// Returns once the operator allows the program to continue.
    async fn confirm(&mut self) -> Result<()>;
}

/// Waits for one line of input.
///
/// Reaching the end of the input before a full line is an error, the program
/// must not proceed without an explicit confirmation.
#[derive(Debug)]
pub struct LineConfirmation<R> {
    reader: R,
}

impl<R> LineConfirmation<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineConfirmation<BufReader<Stdin>> {
    /// Waits for a line on the standard input.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait::async_trait]
impl<R> Confirmation for LineConfirmation<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn confirm(&mut self) -> Result<()> {
        let mut line = String::new();
        let count = self.reader.read_line(&mut line).await?;
        if count == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "input closed before confirmation",
            )));
        }
        Ok(())
    }
}

/// Proceeds without waiting.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConfirmation;

#[async_trait::async_trait]
impl Confirmation for NoConfirmation {
    async fn confirm(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Manages one instance in the configured project and zone.
#[derive(Debug)]
pub struct InstanceManager<S> {
    stub: S,
    config: VmConfig,
    waiter: OperationWaiter,
}

impl<S> InstanceManager<S>
where
    S: Compute,
{
    pub fn new(stub: S, config: VmConfig, waiter: OperationWaiter) -> Self {
        Self {
            stub,
            config,
            waiter,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Creates the instance `name` and waits until the insert completes.
    pub async fn create_instance(&self, name: &str) -> Result<Operation> {
        let descriptor = self.config.instance(name)?;
        self.check_interrupted(name)?;
        tracing::info!(
            instance = name,
            project = %self.config.project,
            zone = %self.config.zone,
            "creating instance"
        );
        let operation = self
            .stub
            .insert_instance(&self.config.project, &self.config.zone, descriptor)
            .await?;
        self.wait_for(operation).await
    }

    /// Deletes the instance `name` and waits until the delete completes.
    pub async fn delete_instance(&self, name: &str) -> Result<Operation> {
        self.check_interrupted(name)?;
        tracing::info!(
            instance = name,
            project = %self.config.project,
            zone = %self.config.zone,
            "deleting instance"
        );
        let operation = self
            .stub
            .delete_instance(&self.config.project, &self.config.zone, name)
            .await?;
        self.wait_for(operation).await
    }

    /// Lists the instances in the configured project and zone.
    pub async fn list_instances(&self) -> Result<Vec<InstanceSummary>> {
        self.stub
            .list_instances(&self.config.project, &self.config.zone)
            .await
    }

    /// Creates `name`, lists the zone, waits for `gate`, and deletes `name`.
    ///
    /// Human-readable progress goes to `out`. Any error stops the sequence.
    pub async fn run<C, W>(&self, name: &str, gate: &mut C, out: &mut W) -> Result<()>
    where
        C: Confirmation + ?Sized,
        W: Write + Send,
    {
        self.create_instance(name).await?;

        let instances = self.list_instances().await?;
        writeln!(
            out,
            "Instances in project {} and zone {}:",
            self.config.project, self.config.zone
        )?;
        for instance in &instances {
            writeln!(out, " - {}", instance.name)?;
        }
        writeln!(out)?;
        writeln!(out, "Instance created.")?;
        writeln!(
            out,
            "It will take a minute or two for the instance to complete work."
        )?;
        match self.config.output_url() {
            Some(url) => {
                writeln!(out, "Check this URL: {url}")?;
                writeln!(
                    out,
                    "Once the image is uploaded press enter to delete the instance."
                )?;
            }
            None => writeln!(out, "Press enter to delete the instance.")?,
        }
        out.flush()?;

        self.confirm(name, gate).await?;

        self.delete_instance(name).await?;
        writeln!(out, "Instance {name} deleted.")?;
        Ok(())
    }

    async fn confirm<C>(&self, name: &str, gate: &mut C) -> Result<()>
    where
        C: Confirmation + ?Sized,
    {
        let Some(token) = self.waiter.cancellation() else {
            return gate.confirm().await;
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Interrupted {
                instance: name.to_string(),
            }),
            r = gate.confirm() => r,
        }
    }

    fn check_interrupted(&self, name: &str) -> Result<()> {
        match self.waiter.cancellation() {
            Some(token) if token.is_cancelled() => Err(Error::Interrupted {
                instance: name.to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn wait_for(&self, started: Operation) -> Result<Operation> {
        match started.name.clone() {
            Some(name) => {
                let handle = OperationHandle::new(&self.config.project, &self.config.zone, name);
                self.waiter.wait(&self.stub, handle).await
            }
            // Nothing to poll, but a completed operation can still report errors.
            None if started.is_done() => {
                let handle = OperationHandle::new(&self.config.project, &self.config.zone, "");
                handle_done(&handle, started)
            }
            None => Err(Error::MissingOperationName),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ErrorList;
    use crate::stub::tests::MockCompute;
    use mockall::Sequence;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const PROJECT: &str = "test-project";
    const ZONE: &str = "us-west1-a";

    fn config() -> VmConfig {
        VmConfig::new().set_project(PROJECT).set_zone(ZONE)
    }

    fn manager(mock: MockCompute) -> InstanceManager<MockCompute> {
        InstanceManager::new(mock, config(), OperationWaiter::new())
    }

    fn started(name: &str) -> Operation {
        Operation::new().set_name(name).set_status("PENDING")
    }

    fn done(name: &str) -> Operation {
        Operation::new().set_name(name).set_status("DONE")
    }

    #[derive(Debug, Default)]
    struct CountingGate {
        calls: usize,
    }

    #[async_trait::async_trait]
    impl Confirmation for CountingGate {
        async fn confirm(&mut self) -> Result<()> {
            self.calls += 1;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct RejectingGate;

    #[async_trait::async_trait]
    impl Confirmation for RejectingGate {
        async fn confirm(&mut self) -> Result<()> {
            Err(Error::Io(std::io::Error::from(
                std::io::ErrorKind::UnexpectedEof,
            )))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_instance() -> anyhow::Result<()> {
        let mut seq = Sequence::new();
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .in_sequence(&mut seq)
            .withf(|p, z, d| {
                p == PROJECT
                    && z == ZONE
                    && d.name == "demo-instance"
                    && d.machine_type == "zones/us-west1-a/machineTypes/n1-standard-8"
            })
            .return_once(|_, _, _| Ok(started("op-insert")));
        mock.expect_get_zone_operation()
            .once()
            .in_sequence(&mut seq)
            .withf(|p, z, o| p == PROJECT && z == ZONE && o == "op-insert")
            .return_once(|_, _, _| Ok(started("op-insert")));
        mock.expect_get_zone_operation()
            .once()
            .in_sequence(&mut seq)
            .return_once(|_, _, _| Ok(done("op-insert")));

        let got = manager(mock).create_instance("demo-instance").await?;
        assert_eq!(got, done("op-insert"));
        Ok(())
    }

    #[tokio::test]
    async fn create_instance_invalid_name() {
        // The mock panics if any method is called.
        let got = manager(MockCompute::new())
            .create_instance("Not_A_Valid_Name")
            .await;
        assert!(matches!(got, Err(Error::Config(_))), "{got:?}");
    }

    #[tokio::test]
    async fn create_instance_transport_error() {
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .return_once(|_, _, _| Err(Error::transport("permission denied")));
        let got = manager(mock).create_instance("demo-instance").await;
        assert!(matches!(got, Err(Error::Transport(_))), "{got:?}");
    }

    #[tokio::test]
    async fn create_instance_operation_failed() {
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .return_once(|_, _, _| Ok(started("op-insert")));
        mock.expect_get_zone_operation()
            .once()
            .return_once(|_, _, _| Ok(done("op-insert").set_http_error_status_code(409)));
        let got = manager(mock).create_instance("demo-instance").await;
        assert!(
            matches!(&got, Err(Error::OperationFailed { operation, error })
                if operation.name == "op-insert" && error.status_code == Some(409)),
            "{got:?}"
        );
    }

    #[tokio::test]
    async fn unnamed_operation_done() -> anyhow::Result<()> {
        let mut mock = MockCompute::new();
        mock.expect_delete_instance()
            .once()
            .return_once(|_, _, _| Ok(Operation::new().set_status("DONE")));
        let got = manager(mock).delete_instance("demo-instance").await?;
        assert!(got.is_done(), "{got:?}");
        Ok(())
    }

    #[tokio::test]
    async fn unnamed_operation_done_with_error() {
        let mut mock = MockCompute::new();
        mock.expect_delete_instance().once().return_once(|_, _, _| {
            Ok(Operation::new()
                .set_status("DONE")
                .set_error(ErrorList::new()))
        });
        let got = manager(mock).delete_instance("demo-instance").await;
        assert!(matches!(got, Err(Error::OperationFailed { .. })), "{got:?}");
    }

    #[tokio::test]
    async fn unnamed_operation_in_progress() {
        let mut mock = MockCompute::new();
        mock.expect_delete_instance()
            .once()
            .return_once(|_, _, _| Ok(Operation::new().set_status("RUNNING")));
        let got = manager(mock).delete_instance("demo-instance").await;
        assert!(matches!(got, Err(Error::MissingOperationName)), "{got:?}");
    }

    #[tokio::test]
    async fn delete_instance() -> anyhow::Result<()> {
        let mut seq = Sequence::new();
        let mut mock = MockCompute::new();
        mock.expect_delete_instance()
            .once()
            .in_sequence(&mut seq)
            .withf(|p, z, n| p == PROJECT && z == ZONE && n == "demo-instance")
            .return_once(|_, _, _| Ok(started("op-delete")));
        mock.expect_get_zone_operation()
            .once()
            .in_sequence(&mut seq)
            .withf(|_, _, o| o == "op-delete")
            .return_once(|_, _, _| Ok(done("op-delete")));

        let got = manager(mock).delete_instance("demo-instance").await?;
        assert_eq!(got, done("op-delete"));
        Ok(())
    }

    #[tokio::test]
    async fn list_instances() -> anyhow::Result<()> {
        let mut mock = MockCompute::new();
        mock.expect_list_instances()
            .once()
            .withf(|p, z| p == PROJECT && z == ZONE)
            .return_once(|_, _| {
                Ok(vec![
                    InstanceSummary::new("vm-1").set_status("Running"),
                    InstanceSummary::new("vm-2"),
                ])
            });
        let got = manager(mock).list_instances().await?;
        let names = got.iter().map(|i| i.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["vm-1", "vm-2"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn run_full_sequence() -> anyhow::Result<()> {
        let mut seq = Sequence::new();
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .in_sequence(&mut seq)
            .return_once(|_, _, _| Ok(started("op-insert")));
        mock.expect_get_zone_operation()
            .once()
            .in_sequence(&mut seq)
            .return_once(|_, _, _| Ok(done("op-insert")));
        mock.expect_list_instances()
            .once()
            .in_sequence(&mut seq)
            .return_once(|_, _| Ok(vec![InstanceSummary::new("demo-instance")]));
        mock.expect_delete_instance()
            .once()
            .in_sequence(&mut seq)
            .return_once(|_, _, _| Ok(started("op-delete")));
        mock.expect_get_zone_operation()
            .once()
            .in_sequence(&mut seq)
            .return_once(|_, _, _| Ok(started("op-delete")));
        mock.expect_get_zone_operation()
            .once()
            .in_sequence(&mut seq)
            .return_once(|_, _, _| Ok(done("op-delete")));

        let manager = InstanceManager::new(
            mock,
            config().set_bucket("my-bucket"),
            OperationWaiter::new(),
        );
        let mut gate = CountingGate::default();
        let mut out = Vec::new();
        manager.run("demo-instance", &mut gate, &mut out).await?;

        assert_eq!(gate.calls, 1);
        let out = String::from_utf8(out)?;
        assert!(
            out.contains("Instances in project test-project and zone us-west1-a:"),
            "{out}"
        );
        assert!(out.contains(" - demo-instance"), "{out}");
        assert!(
            out.contains("Check this URL: http://storage.googleapis.com/my-bucket/output.png"),
            "{out}"
        );
        assert!(out.contains("Instance demo-instance deleted."), "{out}");
        Ok(())
    }

    #[tokio::test]
    async fn run_without_bucket() -> anyhow::Result<()> {
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .return_once(|_, _, _| Ok(done("op-insert")));
        mock.expect_delete_instance()
            .once()
            .return_once(|_, _, _| Ok(done("op-delete")));
        mock.expect_get_zone_operation()
            .times(2)
            .returning(|_, _, o| Ok(done(o)));
        mock.expect_list_instances()
            .once()
            .return_once(|_, _| Ok(Vec::new()));

        let mut out = Vec::new();
        manager(mock)
            .run("demo-instance", &mut NoConfirmation, &mut out)
            .await?;
        let out = String::from_utf8(out)?;
        assert!(out.contains("Press enter to delete the instance."), "{out}");
        assert!(!out.contains("Check this URL"), "{out}");
        Ok(())
    }

    #[tokio::test]
    async fn run_stops_after_failed_create() {
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .return_once(|_, _, _| Ok(started("op-insert")));
        mock.expect_get_zone_operation()
            .once()
            .return_once(|_, _, _| Ok(done("op-insert").set_http_error_message("QUOTA")));
        // No expectations for list_instances() or delete_instance(), the mock
        // panics if they are called.

        let mut gate = CountingGate::default();
        let mut out = Vec::new();
        let got = manager(mock)
            .run("demo-instance", &mut gate, &mut out)
            .await;
        assert!(matches!(got, Err(Error::OperationFailed { .. })), "{got:?}");
        assert_eq!(gate.calls, 0);
        assert!(out.is_empty(), "{out:?}");
    }

    #[tokio::test]
    async fn run_stops_when_gate_fails() {
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .return_once(|_, _, _| Ok(done("op-insert")));
        mock.expect_get_zone_operation()
            .once()
            .return_once(|_, _, _| Ok(done("op-insert")));
        mock.expect_list_instances()
            .once()
            .return_once(|_, _| Ok(Vec::new()));

        let mut out = Vec::new();
        let got = manager(mock)
            .run("demo-instance", &mut RejectingGate, &mut out)
            .await;
        assert!(matches!(got, Err(Error::Io(_))), "{got:?}");
    }

    // Cancels `token` as if the operator interrupted the program while the
    // prompt was shown, and then confirms anyway.
    #[derive(Debug)]
    struct InterruptedGate(CancellationToken);

    #[async_trait::async_trait]
    impl Confirmation for InterruptedGate {
        async fn confirm(&mut self) -> Result<()> {
            self.0.cancel();
            Ok(())
        }
    }

    // Never receives any input.
    #[derive(Debug)]
    struct SilentGate;

    #[async_trait::async_trait]
    impl Confirmation for SilentGate {
        async fn confirm(&mut self) -> Result<()> {
            std::future::pending::<Result<()>>().await
        }
    }

    // The insert and list succeed. There are no expectations for
    // delete_instance(), the mock panics if it is called.
    fn created_and_listed() -> MockCompute {
        let mut mock = MockCompute::new();
        mock.expect_insert_instance()
            .once()
            .return_once(|_, _, _| Ok(started("op-insert")));
        mock.expect_get_zone_operation()
            .once()
            .return_once(|_, _, _| Ok(done("op-insert")));
        mock.expect_list_instances()
            .once()
            .return_once(|_, _| Ok(Vec::new()));
        mock
    }

    #[tokio::test]
    async fn interrupt_at_gate_skips_delete() {
        let token = CancellationToken::new();
        let waiter = OperationWaiter::new().with_cancellation(token.clone());
        let manager = InstanceManager::new(created_and_listed(), config(), waiter);

        let mut gate = InterruptedGate(token);
        let mut out = Vec::new();
        let got = manager.run("demo-instance", &mut gate, &mut out).await;
        assert!(
            matches!(&got, Err(Error::Interrupted { instance }) if instance == "demo-instance"),
            "{got:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_waiting_for_input() {
        let token = CancellationToken::new();
        let waiter = OperationWaiter::new().with_cancellation(token.clone());
        let manager = InstanceManager::new(created_and_listed(), config(), waiter);

        let mut gate = SilentGate;
        let mut out = Vec::new();
        let interrupt = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            token.cancel();
        };
        let (got, _) = tokio::join!(
            manager.run("demo-instance", &mut gate, &mut out),
            interrupt
        );
        assert!(matches!(got, Err(Error::Interrupted { .. })), "{got:?}");
    }

    #[tokio::test]
    async fn interrupt_before_create() {
        let token = CancellationToken::new();
        token.cancel();
        let waiter = OperationWaiter::new().with_cancellation(token);
        // The mock panics if any method is called.
        let manager = InstanceManager::new(MockCompute::new(), config(), waiter);
        let got = manager.create_instance("demo-instance").await;
        assert!(matches!(got, Err(Error::Interrupted { .. })), "{got:?}");
    }

    #[tokio::test]
    async fn line_confirmation() -> anyhow::Result<()> {
        let mut gate = LineConfirmation::new("\nsecond line\n".as_bytes());
        gate.confirm().await?;
        gate.confirm().await?;
        let got = gate.confirm().await;
        assert!(
            matches!(&got, Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof),
            "{got:?}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn no_confirmation() -> anyhow::Result<()> {
        NoConfirmation.confirm().await?;
        Ok(())
    }
}

//! Runner that launches `moleculer-runner` as a child process.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, trace, warn};

use super::{Broker, BrokerRunner, RunnerFactory, RuntimeError};

/// Line printed by a Moleculer broker once all services are up.
pub const DEFAULT_READY_PATTERN: &str = "started successfully";

#[derive(Debug, Clone)]
pub struct ProcessRunnerOptions {
    /// Program to execute
    pub program: String,
    /// Arguments placed before the per-step argv
    pub base_args: Vec<String>,
    /// Substring on stdout that marks the broker as ready
    pub ready_pattern: String,
    /// How long to wait for the ready line
    pub ready_timeout: Duration,
}

impl Default for ProcessRunnerOptions {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            base_args: vec!["moleculer-runner".to_string()],
            ready_pattern: DEFAULT_READY_PATTERN.to_string(),
            ready_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessRunnerFactory {
    options: ProcessRunnerOptions,
}

impl ProcessRunnerFactory {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        Self { options }
    }
}

impl RunnerFactory for ProcessRunnerFactory {
    fn create(&self) -> Box<dyn BrokerRunner> {
        Box::new(ProcessRunner::new(self.options.clone()))
    }
}

#[derive(Debug)]
pub struct ProcessRunner {
    options: ProcessRunnerOptions,
}

impl ProcessRunner {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BrokerRunner for ProcessRunner {
    async fn start(
        &mut self,
        argv: Vec<String>,
        node_id: &str,
    ) -> Result<Box<dyn Broker>, RuntimeError> {
        let mut command = Command::new(&self.options.program);
        command
            .args(&self.options.base_args)
            .args(&argv)
            .env("NODEID", node_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        debug!(
            node_id,
            program = %self.options.program,
            args = ?argv,
            "launching broker process"
        );

        let mut child = command.spawn().map_err(|source| RuntimeError::Launch {
            program: self.options.program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RuntimeError::Other("broker stdout not captured".to_string()))?;

        let ready = tokio::time::timeout(
            self.options.ready_timeout,
            wait_ready(&mut child, stdout, &self.options.ready_pattern, node_id),
        )
        .await;

        match ready {
            Ok(Ok(())) => Ok(Box::new(ProcessBroker {
                child,
                node_id: node_id.to_string(),
            })),
            Ok(Err(e)) => Err(e),
            // Dropping the child kills it.
            Err(_) => Err(RuntimeError::NotReady(self.options.ready_timeout)),
        }
    }
}

/// Read stdout until the ready line shows up, then keep draining it in the
/// background so the broker never blocks on a full pipe.
async fn wait_ready(
    child: &mut Child,
    stdout: ChildStdout,
    pattern: &str,
    node_id: &str,
) -> Result<(), RuntimeError> {
    let mut lines = BufReader::new(stdout).lines();

    while let Some(line) = lines.next_line().await? {
        trace!(node_id, "{}", line);
        if line.contains(pattern) {
            let node_id = node_id.to_string();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!(node_id = %node_id, "{}", line);
                }
            });
            return Ok(());
        }
    }

    let status = child.wait().await?;
    Err(RuntimeError::Exited {
        status: status.to_string(),
    })
}

struct ProcessBroker {
    child: Child,
    node_id: String,
}

#[async_trait]
impl Broker for ProcessBroker {
    async fn stop(&mut self) -> Result<(), RuntimeError> {
        if let Some(status) = self.child.try_wait()? {
            warn!(node_id = %self.node_id, %status, "broker exited before stop");
            return Err(RuntimeError::AlreadyExited {
                status: status.to_string(),
            });
        }

        // The runner shuts the broker down on SIGTERM. A broker that ignores
        // it is left to the caller's timeout and killed on drop.
        terminate(&mut self.child)?;
        let status = self.child.wait().await?;
        debug!(node_id = %self.node_id, %status, "broker process stopped");
        Ok(())
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<(), RuntimeError> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| RuntimeError::Other(format!("pid {} out of range", pid)))?;

    // SAFETY: `pid` belongs to a child we have not reaped yet, so it cannot
    // have been recycled for another process.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<(), RuntimeError> {
    child.start_kill()?;
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> ProcessRunnerOptions {
        ProcessRunnerOptions {
            program: "sh".to_string(),
            base_args: vec!["-c".to_string(), script.to_string()],
            ready_pattern: DEFAULT_READY_PATTERN.to_string(),
            ready_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_start_and_stop_ready_broker() {
        let mut runner = ProcessRunner::new(shell(
            "echo \"ServiceBroker with 1 service(s) started successfully\"; exec sleep 30",
        ));

        let mut broker = runner
            .start(vec!["--config".to_string(), "x.js".to_string()], "node-1")
            .await
            .expect("broker should start");

        broker.stop().await.expect("broker should stop");
    }

    #[tokio::test]
    async fn test_node_id_is_exported() {
        let mut options = shell("echo \"$NODEID started successfully\"; exec sleep 30");
        options.ready_pattern = "node-env started successfully".to_string();
        options.ready_timeout = Duration::from_secs(2);
        let mut runner = ProcessRunner::new(options);

        let mut broker = runner.start(vec![], "node-env").await.expect("start");
        broker.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_stop_sends_sigterm_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("stopped");
        let mut runner = ProcessRunner::new(shell(&format!(
            "trap 'echo graceful > {}; exit 0' TERM; \
             echo started successfully; \
             while true; do sleep 0.05; done",
            marker.display()
        )));

        let mut broker = runner.start(vec![], "node-term").await.expect("start");
        broker.stop().await.expect("stop");

        let written = std::fs::read_to_string(&marker).expect("TERM handler should run");
        assert_eq!(written.trim(), "graceful");
    }

    #[tokio::test]
    async fn test_stop_waits_for_broker_ignoring_sigterm() {
        let mut runner = ProcessRunner::new(shell(
            "trap '' TERM; echo started successfully; exec sleep 30",
        ));

        let mut broker = runner.start(vec![], "node-stubborn").await.expect("start");
        let stop = tokio::time::timeout(Duration::from_millis(300), broker.stop()).await;
        assert!(stop.is_err(), "stop should still be pending");
        // Dropping the broker kills the process
    }

    #[tokio::test]
    async fn test_stop_after_broker_died_is_error() {
        let mut runner = ProcessRunner::new(shell("echo started successfully; exit 0"));

        let mut broker = runner.start(vec![], "node-dead").await.expect("start");
        tokio::time::sleep(Duration::from_millis(300)).await;

        let err = broker.stop().await.err().expect("stop should fail");
        assert!(matches!(err, RuntimeError::AlreadyExited { .. }));
    }

    #[tokio::test]
    async fn test_early_exit_is_error() {
        let mut runner = ProcessRunner::new(shell("echo booting; exit 3"));

        let err = runner
            .start(vec![], "node-2")
            .await
            .err()
            .expect("start should fail");
        assert!(matches!(err, RuntimeError::Exited { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let mut runner = ProcessRunner::new(ProcessRunnerOptions {
            program: "definitely-not-a-moleculer-runner".to_string(),
            ..ProcessRunnerOptions::default()
        });

        let err = runner
            .start(vec![], "node-3")
            .await
            .err()
            .expect("start should fail");
        assert!(matches!(err, RuntimeError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_not_ready_in_time() {
        let mut options = shell("exec sleep 30");
        options.ready_timeout = Duration::from_millis(200);
        let mut runner = ProcessRunner::new(options);

        let err = runner
            .start(vec![], "node-4")
            .await
            .err()
            .expect("start should time out");
        assert!(matches!(err, RuntimeError::NotReady(_)));
    }
}

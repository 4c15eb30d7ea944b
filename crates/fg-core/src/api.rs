//! Async facade for interactive front-ends.
//!
//! Every supervisor call blocks (stop waits out the grace period, status
//! samples CPU), so each one runs on tokio's blocking pool and only the
//! result comes back to the caller's task.

use crate::config::LogConfig;
use crate::error::{FgError, Result};
use crate::logs::LogStream;
use crate::platform::FgPaths;
use crate::process::{StatusEntry, StopOutcome, Supervisor, VersionConfig};
use crate::registry::InstanceMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Cloneable async handle to a [`Supervisor`].
#[derive(Clone)]
pub struct FgApi {
    supervisor: Arc<Supervisor>,
}

impl FgApi {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            supervisor: Arc::new(supervisor),
        }
    }

    /// Build a default supervisor for `paths` off the async runtime.
    pub async fn open(paths: FgPaths) -> Result<Self> {
        tokio::task::spawn_blocking(move || Supervisor::new(paths))
            .await
            .map_err(join_error)?
            .map(Self::new)
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Supervisor) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let supervisor = self.supervisor.clone();
        tokio::task::spawn_blocking(move || f(&supervisor))
            .await
            .map_err(join_error)?
    }

    pub async fn start(&self, label: impl Into<String>) -> Result<u32> {
        let label = label.into();
        self.run(move |s| s.start(&label)).await
    }

    pub async fn start_latest(&self) -> Result<(String, u32)> {
        self.run(|s| s.start_latest()).await
    }

    pub async fn stop(&self, pid: u32) -> Result<StopOutcome> {
        self.run(move |s| s.stop(pid)).await
    }

    pub async fn stop_version(
        &self,
        label: impl Into<String>,
    ) -> Result<Vec<(u32, StopOutcome)>> {
        let label = label.into();
        self.run(move |s| s.stop_version(&label)).await
    }

    pub async fn stop_all(&self) -> Result<Vec<(u32, StopOutcome)>> {
        self.run(|s| s.stop_all()).await
    }

    pub async fn status(&self) -> Result<Vec<StatusEntry>> {
        self.run(|s| s.status()).await
    }

    pub async fn instances(&self) -> Result<InstanceMap> {
        self.run(|s| s.instances()).await
    }

    pub async fn installed_versions(&self) -> Result<Vec<String>> {
        self.run(|s| s.installed_versions()).await
    }

    pub async fn version_config(&self, label: impl Into<String>) -> Result<VersionConfig> {
        let label = label.into();
        self.run(move |s| s.version_config(&label)).await
    }

    pub async fn tail(&self, pid: u32, n: usize) -> Result<Vec<String>> {
        self.run(move |s| s.tail(pid, n)).await
    }

    pub async fn tail_stream(
        &self,
        pid: u32,
        stream: LogStream,
        n: usize,
    ) -> Result<Vec<String>> {
        self.run(move |s| s.tail_stream(pid, stream, n)).await
    }

    pub async fn read_all(&self, pid: u32) -> Result<String> {
        self.run(move |s| s.read_all(pid)).await
    }

    pub async fn read_all_stream(&self, pid: u32, stream: LogStream) -> Result<String> {
        self.run(move |s| s.read_all_stream(pid, stream)).await
    }

    /// Follow the stdout sink of `pid`.
    ///
    /// Lines arrive on the returned receiver. Dropping it stops the follower
    /// within one poll interval and closes the sink.
    pub async fn follow(&self, pid: u32, n: usize) -> Result<mpsc::Receiver<Result<String>>> {
        self.follow_stream(pid, LogStream::Stdout, n).await
    }

    pub async fn follow_stream(
        &self,
        pid: u32,
        stream: LogStream,
        n: usize,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        let follower = self.run(move |s| s.follow_stream(pid, stream, n)).await?;
        let interval = self.supervisor.follow_interval;
        let (tx, rx) = mpsc::channel(LogConfig::FOLLOW_CHANNEL_CAPACITY);

        tokio::task::spawn_blocking(move || {
            while !tx.is_closed() {
                match follower.recv_timeout(interval) {
                    Some(item) => {
                        if tx.blocking_send(item).is_err() {
                            break;
                        }
                    }
                    None if !follower.is_active() => break,
                    None => {}
                }
            }
            debug!("Follow of PID {} ended", pid);
            drop(follower);
        });

        Ok(rx)
    }
}

fn join_error(e: tokio::task::JoinError) -> FgError {
    FgError::Other(format!("Background task failed: {}", e))
}

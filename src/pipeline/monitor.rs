//! Process memory ceiling enforcement
//!
//! A background task samples resident memory through a [`MemoryProbe`] and
//! publishes each sample on a watch channel. The orchestrator checks the
//! latest sample at stage boundaries and races running stages against
//! [`MemoryMonitor::exceeded`].

use crate::error::{AnalysisError, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Source of resident memory readings
pub trait MemoryProbe: Send + Sync {
    /// Current resident set size in bytes, `None` when unavailable
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads this process's resident memory through sysinfo
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Memory probe disabled, cannot resolve own pid: {}", e);
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(pid).map(|p| p.memory())
    }
}

/// One memory reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySnapshot {
    /// `None` when the probe returned nothing
    pub resident_bytes: Option<u64>,
    pub limit_bytes: u64,
}

impl MemorySnapshot {
    fn sample(probe: &dyn MemoryProbe, limit_bytes: u64) -> Self {
        Self {
            resident_bytes: probe.resident_bytes(),
            limit_bytes,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.resident_bytes.is_some_and(|used| used > self.limit_bytes)
    }

    pub fn to_error(&self) -> AnalysisError {
        AnalysisError::memory_exceeded(self.resident_bytes.unwrap_or(0), self.limit_bytes)
    }
}

/// Handle to a running memory sampling task
///
/// The task stops when the handle is dropped.
pub struct MemoryMonitor {
    rx: watch::Receiver<MemorySnapshot>,
    task: JoinHandle<()>,
}

impl MemoryMonitor {
    /// Take an initial sample and start polling every `interval`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(probe: Arc<dyn MemoryProbe>, limit_bytes: u64, interval: Duration) -> Self {
        let initial = MemorySnapshot::sample(probe.as_ref(), limit_bytes);
        let (tx, rx) = watch::channel(initial);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately; the initial sample covers it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = MemorySnapshot::sample(probe.as_ref(), limit_bytes);
                trace!(resident_bytes = ?snapshot.resident_bytes, "Memory sample");
                if tx.send(snapshot).is_err() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    /// Latest published sample
    pub fn snapshot(&self) -> MemorySnapshot {
        *self.rx.borrow()
    }

    /// Checkpoint: fail if the latest sample is over the ceiling
    pub fn check(&self) -> Result<MemorySnapshot> {
        let snapshot = self.snapshot();
        if snapshot.exceeded() {
            warn!(
                resident_bytes = ?snapshot.resident_bytes,
                limit_bytes = snapshot.limit_bytes,
                "Memory ceiling exceeded"
            );
            return Err(snapshot.to_error());
        }
        Ok(snapshot)
    }

    /// Resolves with an error once a sample crosses the ceiling
    ///
    /// Never resolves if the sampling task has stopped.
    pub async fn exceeded(&self) -> AnalysisError {
        let mut rx = self.rx.clone();
        let crossed = rx.wait_for(|s| s.exceeded()).await.map(|s| *s);
        match crossed {
            Ok(snapshot) => {
                warn!(
                    resident_bytes = ?snapshot.resident_bytes,
                    limit_bytes = snapshot.limit_bytes,
                    "Memory ceiling exceeded during stage"
                );
                snapshot.to_error()
            }
            Err(_) => std::future::pending().await,
        }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

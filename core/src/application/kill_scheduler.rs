//! Repeating process match-and-kill loop.
//!
//! Each execution runs on its own task:
//!
//! ```text
//! Idle -> Running -> { Deadline-Expired | Cancelled }
//! ```
//!
//! While running the task waits `delay`, resolves the matcher against the
//! live process table and signals every match, until the deadline passes or
//! the execution is stopped.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{lineage, ProcessMatcher};
use crate::ports::{ProcessKillerPort, ProcessTablePort};

use super::registry::{ExecutionHandle, ExecutionRegistry};

/// Lower bound between sweeps, so a zero delay does not spin.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// What to kill, how, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillPlan {
    pub matcher: ProcessMatcher,
    /// SIGTERM first, SIGKILL after a grace period. Otherwise SIGKILL only.
    pub graceful: bool,
    pub delay: Duration,
    pub duration: Duration,
}

/// Live kill loop of one execution.
pub struct KillLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
    deadline: Instant,
}

impl KillLoop {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl ExecutionHandle for KillLoop {
    fn cancel(&self) {
        self.token.cancel();
    }
}

/// Schedules repeating kill loops, one per execution ID.
pub struct KillScheduler<T, K> {
    table: Arc<T>,
    killer: Arc<K>,
    registry: ExecutionRegistry<KillLoop>,
}

impl<T, K> KillScheduler<T, K>
where
    T: ProcessTablePort + 'static,
    K: ProcessKillerPort + 'static,
{
    pub fn new(table: T, killer: K) -> Self {
        Self {
            table: Arc::new(table),
            killer: Arc::new(killer),
            registry: ExecutionRegistry::new(),
        }
    }

    /// Spawn the kill loop for `execution_id` and return its deadline.
    ///
    /// A loop already running under the same ID is cancelled first. Must be
    /// called from within a Tokio runtime.
    pub fn start(&self, execution_id: Uuid, plan: KillPlan) -> Instant {
        let deadline = Instant::now() + plan.duration;
        let token = CancellationToken::new();

        let task = tokio::spawn(run_loop(
            execution_id,
            Arc::clone(&self.table),
            Arc::clone(&self.killer),
            plan,
            deadline,
            token.clone(),
        ));

        if self.registry.install(execution_id, KillLoop { token, task, deadline }) {
            debug!(execution_id = %execution_id, "Replaced running kill loop");
        }
        deadline
    }

    /// Whether the loop for `execution_id` exists and has not finished.
    pub fn is_running(&self, execution_id: Uuid) -> bool {
        self.registry
            .with(execution_id, |l| !l.is_finished())
            .unwrap_or(false)
    }

    /// Cancel and forget the loop for `execution_id`.
    ///
    /// Returns false when nothing was registered.
    pub fn stop(&self, execution_id: Uuid) -> bool {
        match self.registry.remove(execution_id) {
            Some(kill_loop) => {
                kill_loop.cancel();
                true
            }
            None => {
                debug!(execution_id = %execution_id, "No kill loop to stop");
                false
            }
        }
    }

    /// Number of registered loops, finished or not.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Number of loops that have not finished yet.
    pub fn active(&self) -> usize {
        self.registry.count(|l| !l.is_finished())
    }

    /// Cancel every loop.
    pub fn shutdown(&self) {
        self.registry.cancel_all();
    }
}

async fn run_loop<T, K>(
    execution_id: Uuid,
    table: Arc<T>,
    killer: Arc<K>,
    plan: KillPlan,
    deadline: Instant,
    token: CancellationToken,
) where
    T: ProcessTablePort,
    K: ProcessKillerPort,
{
    let interval = plan.delay.max(MIN_SWEEP_INTERVAL);
    let own_pid = std::process::id();
    info!(execution_id = %execution_id, matcher = %plan.matcher, "Kill loop started");

    loop {
        // Deadline is polled before the delay timer: no sweep at exactly the deadline.
        tokio::select! {
            biased;
            () = token.cancelled() => {
                info!(execution_id = %execution_id, "Kill loop cancelled");
                return;
            }
            () = sleep_until(deadline) => break,
            () = sleep(interval) => {}
        }

        tokio::select! {
            biased;
            () = token.cancelled() => {
                info!(execution_id = %execution_id, "Kill loop cancelled");
                return;
            }
            () = sleep_until(deadline) => break,
            killed = sweep(&*table, &*killer, &plan, own_pid) => {
                debug!(execution_id = %execution_id, killed, "Sweep finished");
            }
        }
    }

    info!(execution_id = %execution_id, "Kill loop reached its deadline");
}

/// Signal every process the matcher selects. Returns the number signalled.
///
/// The agent and its ancestors are never selected.
async fn sweep<T, K>(table: &T, killer: &K, plan: &KillPlan, own_pid: u32) -> usize
where
    T: ProcessTablePort,
    K: ProcessKillerPort,
{
    let processes = match table.scan().await {
        Ok(processes) => processes,
        Err(e) => {
            warn!(error = %e, "Failed to read process table");
            return 0;
        }
    };

    let pids = plan.matcher.select(&processes, &lineage(&processes, own_pid));
    if pids.is_empty() {
        return 0;
    }

    let results = if plan.graceful {
        killer.kill_all_gracefully(&pids).await
    } else {
        let mut results = Vec::with_capacity(pids.len());
        for &pid in &pids {
            results.push(killer.kill(pid, true).await);
        }
        results
    };

    let mut killed = 0;
    for (pid, result) in pids.into_iter().zip(results) {
        match result {
            Ok(_) => {
                debug!(pid, "Stopped process");
                killed += 1;
            }
            Err(e) => warn!(pid, error = %e, "Failed to stop process"),
        }
    }
    killed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProcessInfo;
    use crate::error::{Error, Result};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Process table where `victim` comes back under a new PID after each kill.
    #[derive(Clone)]
    struct Respawning {
        next_pid: Arc<AtomicU32>,
        kills: Arc<Mutex<Vec<(u32, bool)>>>,
        fail_kills: bool,
    }

    impl Respawning {
        fn new() -> Self {
            Self {
                next_pid: Arc::new(AtomicU32::new(1000)),
                kills: Arc::new(Mutex::new(Vec::new())),
                fail_kills: false,
            }
        }

        fn kill_count(&self) -> usize {
            self.kills.lock().len()
        }
    }

    impl ProcessTablePort for Respawning {
        async fn scan(&self) -> Result<Vec<ProcessInfo>> {
            Ok(vec![
                ProcessInfo::new(1, "init", "/sbin/init"),
                ProcessInfo::new(self.next_pid.load(Ordering::SeqCst), "victim", "victim --serve"),
                ProcessInfo::new(std::process::id(), "victim", "the agent itself"),
            ])
        }
    }

    impl ProcessKillerPort for Respawning {
        async fn kill(&self, pid: u32, force: bool) -> Result<bool> {
            self.kills.lock().push((pid, force));
            if self.fail_kills {
                return Err(Error::KillFailed {
                    pid,
                    reason: "Operation not permitted".into(),
                });
            }
            self.next_pid.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn kill_gracefully(&self, pid: u32) -> Result<bool> {
            self.kill(pid, false).await
        }

        async fn kill_all_gracefully(&self, pids: &[u32]) -> Vec<Result<bool>> {
            let mut results = Vec::with_capacity(pids.len());
            for &pid in pids {
                results.push(self.kill(pid, false).await);
            }
            results
        }

        fn is_running(&self, pid: u32) -> bool {
            pid == self.next_pid.load(Ordering::SeqCst)
        }
    }

    fn plan(delay_ms: u64, duration_ms: u64) -> KillPlan {
        KillPlan {
            matcher: ProcessMatcher::ByNameSubstring("victim".into()),
            graceful: false,
            delay: Duration::from_millis(delay_ms),
            duration: Duration::from_millis(duration_ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_kills_respawning_process_until_deadline() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());
        let id = Uuid::new_v4();

        scheduler.start(id, plan(500, 2000));
        assert!(scheduler.is_running(id));

        sleep(Duration::from_millis(2100)).await;

        assert!(mock.kill_count() >= 3, "only {} kills", mock.kill_count());
        assert!(!scheduler.is_running(id));

        let kills = mock.kills.lock();
        assert!(kills.iter().all(|(pid, force)| *pid != std::process::id() && *force));
        assert!(kills.iter().all(|(pid, _)| *pid != 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sweep_at_exact_deadline() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());

        scheduler.start(Uuid::new_v4(), plan(500, 2000));
        sleep(Duration::from_secs(5)).await;

        // Sweeps at 0.5s, 1.0s and 1.5s; the 2.0s tick loses to the deadline.
        assert_eq!(mock.kill_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_uses_soft_kill() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());

        let mut graceful = plan(500, 1200);
        graceful.graceful = true;
        scheduler.start(Uuid::new_v4(), graceful);
        sleep(Duration::from_secs(2)).await;

        let kills = mock.kills.lock();
        assert!(!kills.is_empty());
        assert!(kills.iter().all(|(_, force)| !force));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_early() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());
        let id = Uuid::new_v4();

        scheduler.start(id, plan(500, 60_000));
        sleep(Duration::from_millis(1200)).await;
        assert!(scheduler.stop(id));

        let before = mock.kill_count();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.kill_count(), before);
        assert!(!scheduler.is_running(id));
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock);
        assert!(!scheduler.stop(Uuid::new_v4()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_loop() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());
        let id = Uuid::new_v4();

        scheduler.start(id, plan(500, 60_000));
        scheduler.start(id, plan(500, 60_000));
        assert_eq!(scheduler.len(), 1);

        sleep(Duration::from_millis(1200)).await;
        // Only the second loop sweeps: two sweeps at 0.5s and 1.0s.
        assert_eq!(mock.kill_count(), 2);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_kill_failures_do_not_stop_loop() {
        let mut mock = Respawning::new();
        mock.fail_kills = true;
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());

        scheduler.start(Uuid::new_v4(), plan(500, 2000));
        sleep(Duration::from_millis(2100)).await;

        assert_eq!(mock.kill_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_is_throttled() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());

        scheduler.start(Uuid::new_v4(), plan(0, 1000));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(mock.kill_count(), 9);
    }

    const GRACE: Duration = Duration::from_millis(500);

    /// Six workers plus the agent and the `sudo` that launched it, whose
    /// command lines also mention "worker". Killers pay `GRACE` per graceful call.
    #[derive(Clone, Default)]
    struct Crowd {
        signalled: Arc<Mutex<Vec<u32>>>,
    }

    impl Crowd {
        const WORKERS: std::ops::Range<u32> = 2000..2006;
        const LAUNCHER: u32 = 50;

        fn signalled(&self) -> std::collections::BTreeSet<u32> {
            self.signalled.lock().iter().copied().collect()
        }
    }

    impl ProcessTablePort for Crowd {
        async fn scan(&self) -> Result<Vec<ProcessInfo>> {
            let mut processes: Vec<ProcessInfo> = Self::WORKERS
                .map(|pid| ProcessInfo::new(pid, "worker", format!("worker --id {}", pid)))
                .collect();
            processes.push(ProcessInfo::new(
                Self::LAUNCHER,
                "sudo",
                "sudo hostfault stop-process worker",
            ));
            processes.push(
                ProcessInfo::new(std::process::id(), "hostfault", "hostfault stop-process worker")
                    .with_parent(Self::LAUNCHER),
            );
            Ok(processes)
        }
    }

    impl ProcessKillerPort for Crowd {
        async fn kill(&self, pid: u32, _force: bool) -> Result<bool> {
            self.signalled.lock().push(pid);
            Ok(true)
        }

        async fn kill_gracefully(&self, pid: u32) -> Result<bool> {
            self.signalled.lock().push(pid);
            sleep(GRACE).await;
            Ok(true)
        }

        async fn kill_all_gracefully(&self, pids: &[u32]) -> Vec<Result<bool>> {
            self.signalled.lock().extend_from_slice(pids);
            sleep(GRACE).await;
            pids.iter().map(|_| Ok(true)).collect()
        }

        fn is_running(&self, _pid: u32) -> bool {
            true
        }
    }

    fn crowd_plan(graceful: bool) -> KillPlan {
        KillPlan {
            matcher: ProcessMatcher::ByNameSubstring("worker".into()),
            graceful,
            delay: Duration::from_millis(100),
            duration: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_sweep_signals_every_match_before_deadline() {
        let crowd = Crowd::default();
        let scheduler = KillScheduler::new(crowd.clone(), crowd.clone());

        scheduler.start(Uuid::new_v4(), crowd_plan(true));
        // One sweep at 0.1s; a grace period per process would run past the deadline.
        sleep(Duration::from_millis(200)).await;

        let expected: std::collections::BTreeSet<u32> = Crowd::WORKERS.collect();
        assert_eq!(crowd.signalled(), expected);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(crowd.signalled(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_kills_own_lineage() {
        let crowd = Crowd::default();
        let scheduler = KillScheduler::new(crowd.clone(), crowd.clone());

        scheduler.start(Uuid::new_v4(), crowd_plan(false));
        sleep(Duration::from_secs(2)).await;

        let signalled = crowd.signalled();
        assert!(!signalled.is_empty());
        assert!(!signalled.contains(&Crowd::LAUNCHER));
        assert!(!signalled.contains(&std::process::id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_loops_are_not_active() {
        let mock = Respawning::new();
        let scheduler = KillScheduler::new(mock.clone(), mock.clone());
        let id = Uuid::new_v4();

        scheduler.start(id, plan(100, 500));
        assert_eq!(scheduler.active(), 1);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.active(), 0);

        assert!(scheduler.stop(id));
        assert!(scheduler.is_empty());
    }
}

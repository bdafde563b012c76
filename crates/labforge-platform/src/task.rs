//! Long-running platform tasks and the bounded wait over them
//!
//! Every mutating call that the platform runs asynchronously returns a
//! [`PlatformTask`]. The engine blocks on it with [`wait_for_task`]: one wait
//! per operation, no retries. Time spent queued on the platform does not count
//! against the deadline when [`WaitPolicy::pause_on_queued`] is set, and a
//! task still running at the deadline is cancelled on the platform before the
//! wait returns.

use crate::error::PlatformError;
use crate::handle::{FolderRef, VmRef};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Result value of a finished task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    /// Task produced nothing
    None,
    /// Task produced a VM (clones)
    Vm(VmRef),
    /// Task produced a folder
    Folder(FolderRef),
}

impl TaskOutput {
    /// VM handle, if the task produced one
    #[must_use]
    pub fn into_vm(self) -> Option<VmRef> {
        match self {
            Self::Vm(vm) => Some(vm),
            _ => None,
        }
    }
}

/// Observed state of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting for a platform slot
    Queued,
    /// Executing
    Running,
    /// Finished successfully
    Success(TaskOutput),
    /// Finished with a fault
    Error(PlatformError),
}

/// A platform-side asynchronous operation
#[async_trait::async_trait]
pub trait PlatformTask: Send {
    /// Operation name, for diagnostics
    fn name(&self) -> &str;

    /// Name of the entity the task operates on
    fn entity(&self) -> &str;

    /// Poll the current state
    async fn state(&mut self) -> TaskState;

    /// Ask the platform to abandon the task
    async fn cancel(&mut self);
}

/// Timing of [`wait_for_task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Deadline, excluding queued time when `pause_on_queued` is set
    pub timeout: Duration,
    /// Poll interval while the task runs
    pub poll_interval: Duration,
    /// Poll interval while the task is queued
    pub queued_interval: Duration,
    /// Extend the deadline by the time spent queued
    pub pause_on_queued: bool,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(50),
            queued_interval: Duration::from_secs(1),
            pause_on_queued: true,
        }
    }
}

impl WaitPolicy {
    /// Default policy with a different timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Cooperative interruption flag shared between the caller and the engine
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that is not set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption at the next wait boundary
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether interruption was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Block until `task` finishes, fails, times out or the wait is cancelled
///
/// # Errors
/// - the task's own fault when it ends in the error state
/// - [`PlatformError::Timeout`] after cancelling a task that outlived the deadline
/// - [`PlatformError::Cancelled`] when `cancel` is set; nothing is rolled back
pub async fn wait_for_task(
    mut task: Box<dyn PlatformTask>,
    policy: &WaitPolicy,
    cancel: &CancelFlag,
) -> Result<TaskOutput, PlatformError> {
    let started = Instant::now();
    let mut deadline = started + policy.timeout;
    let mut queued_for = Duration::ZERO;

    loop {
        if cancel.is_cancelled() {
            tracing::warn!(task = task.name(), entity = task.entity(), "wait interrupted");
            return Err(PlatformError::Cancelled);
        }

        let state = task.state().await;
        match state {
            TaskState::Success(output) => {
                tracing::debug!(
                    task = task.name(),
                    entity = task.entity(),
                    elapsed_ms = millis(started.elapsed()),
                    "task completed"
                );
                return Ok(output);
            }
            TaskState::Error(fault) => {
                tracing::error!(
                    task = task.name(),
                    entity = task.entity(),
                    error = %fault,
                    "task failed"
                );
                return Err(fault);
            }
            TaskState::Queued | TaskState::Running if Instant::now() >= deadline => {
                let waited_ms = millis(started.elapsed().saturating_sub(queued_for));
                tracing::error!(
                    task = task.name(),
                    entity = task.entity(),
                    waited_ms,
                    "task timed out, cancelling"
                );
                task.cancel().await;
                return Err(PlatformError::Timeout {
                    task: task.name().to_string(),
                    entity: task.entity().to_string(),
                    waited_ms,
                });
            }
            TaskState::Queued => {
                let before = Instant::now();
                tokio::time::sleep(policy.queued_interval).await;
                if policy.pause_on_queued {
                    let paused = before.elapsed();
                    deadline += paused;
                    queued_for += paused;
                }
            }
            TaskState::Running => {
                tokio::time::sleep(policy.poll_interval).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    /// Replays a fixed sequence of states, repeating the last one
    struct Scripted {
        states: VecDeque<TaskState>,
        cancelled: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn boxed(states: Vec<TaskState>) -> (Box<dyn PlatformTask>, Arc<AtomicUsize>) {
            let cancelled = Arc::new(AtomicUsize::new(0));
            let task = Self {
                states: states.into(),
                cancelled: Arc::clone(&cancelled),
            };
            (Box::new(task), cancelled)
        }
    }

    #[async_trait::async_trait]
    impl PlatformTask for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn entity(&self) -> &str {
            "vm"
        }

        async fn state(&mut self) -> TaskState {
            if self.states.len() > 1 {
                self.states.pop_front().unwrap_or(TaskState::Running)
            } else {
                self.states.front().cloned().unwrap_or(TaskState::Running)
            }
        }

        async fn cancel(&mut self) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_output_on_success() {
        let (task, _) = Scripted::boxed(vec![
            TaskState::Running,
            TaskState::Running,
            TaskState::Success(TaskOutput::Vm(VmRef::new("vm-7"))),
        ]);
        let out = wait_for_task(task, &WaitPolicy::default(), &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(out, TaskOutput::Vm(VmRef::new("vm-7")));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_task_fault() {
        let fault = PlatformError::DuplicateName { name: "web".into() };
        let (task, _) = Scripted::boxed(vec![TaskState::Running, TaskState::Error(fault.clone())]);
        let err = wait_for_task(task, &WaitPolicy::default(), &CancelFlag::new())
            .await
            .unwrap_err();
        assert_eq!(err, fault);
    }

    #[tokio::test(start_paused = true)]
    async fn running_past_deadline_cancels_task() {
        let (task, cancelled) = Scripted::boxed(vec![TaskState::Running]);
        let policy = WaitPolicy::default().with_timeout(Duration::from_secs(2));
        let started = Instant::now();
        let err = wait_for_task(task, &policy, &CancelFlag::new()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Timeout { .. }));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_time_extends_deadline() {
        // Ten seconds queued against a two second deadline
        let mut states = vec![TaskState::Queued; 10];
        states.push(TaskState::Running);
        states.push(TaskState::Success(TaskOutput::None));
        let (task, cancelled) = Scripted::boxed(states);
        let policy = WaitPolicy::default().with_timeout(Duration::from_secs(2));
        let out = wait_for_task(task, &policy, &CancelFlag::new()).await.unwrap();
        assert_eq!(out, TaskOutput::None);
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_time_counts_without_pause() {
        let (task, cancelled) = Scripted::boxed(vec![TaskState::Queued]);
        let policy = WaitPolicy {
            pause_on_queued: false,
            ..WaitPolicy::default().with_timeout(Duration::from_secs(3))
        };
        let err = wait_for_task(task, &policy, &CancelFlag::new()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Timeout { .. }));
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_flag_stops_wait() {
        let (task, cancelled) = Scripted::boxed(vec![TaskState::Running]);
        let flag = CancelFlag::new();
        flag.cancel();
        let err = wait_for_task(task, &WaitPolicy::default(), &flag).await.unwrap_err();
        assert!(err.is_cancelled());
        // interruption does not roll back or cancel the platform task
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);
    }
}

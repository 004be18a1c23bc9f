//! Task spawning for one-shot asset fetches and tile requests
//!
//! Library code never owns a runtime. Tasks go to whichever spawner was
//! installed with [`init_runtime`], or by default to the tokio runtime of the
//! calling thread. With no runtime available the task is dropped with a
//! warning, and whatever was waiting for it simply never completes.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::OnceLock;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Abort the task; a no-op once it has finished
    fn abort(&self);
}

/// Spawns onto a tokio runtime, either a fixed one or the caller's
#[derive(Debug, Clone, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    /// Spawner bound to the runtime of whichever thread calls `spawn`
    pub fn current() -> Self {
        Self { handle: None }
    }

    /// Spawner bound to a specific runtime, usable from threads that are not
    /// inside that runtime (e.g. a UI thread)
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn resolve(&self) -> Option<Handle> {
        match &self.handle {
            Some(handle) => Some(handle.clone()),
            None => Handle::try_current().ok(),
        }
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle> {
        match self.resolve() {
            Some(handle) => Box::new(TokioHandle(handle.spawn(future))),
            None => {
                log::warn!("no tokio runtime available, task dropped");
                Box::new(DroppedHandle)
            }
        }
    }
}

struct TokioHandle(JoinHandle<()>);

impl AsyncHandle for TokioHandle {
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    fn abort(&self) {
        self.0.abort();
    }
}

/// Stands in for a task that was never started
struct DroppedHandle;

impl AsyncHandle for DroppedHandle {
    fn is_finished(&self) -> bool {
        true
    }

    fn abort(&self) {}
}

/// Owned handle returned by [`spawn`]
pub struct TaskHandle(Box<dyn AsyncHandle>);

impl TaskHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    pub fn abort(&self) {
        self.0.abort();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

static RUNTIME: OnceLock<Box<dyn AsyncSpawner>> = OnceLock::new();

/// Installs the process-wide spawner. Only the first call takes effect.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) -> bool {
    let installed = RUNTIME.set(spawner).is_ok();
    if !installed {
        log::debug!("runtime spawner already installed, keeping the first one");
    }
    installed
}

/// The installed spawner, defaulting to [`TokioSpawner::current`]
pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME
        .get_or_init(|| Box::new(TokioSpawner::current()))
        .as_ref()
}

/// Spawns a detached task on the installed spawner
pub fn spawn<F>(future: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    TaskHandle(runtime().spawn_boxed(Box::pin(future)))
}

/// Runs CPU-bound work on tokio's blocking pool so async workers keep
/// serving fetches. Outside a tokio runtime the work runs inline. `None`
/// means the blocking task panicked or was cancelled.
pub async fn run_blocking<F, R>(work: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let handle = match Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => return Some(work()),
    };
    match handle.spawn_blocking(work).await {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("blocking task failed: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spawn_runs_on_current_runtime() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(handle.is_finished());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_abort_stops_pending_task() {
        let handle = spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        });
        assert!(!handle.is_finished());

        handle.abort();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_run_blocking_leaves_the_async_thread() {
        let caller = std::thread::current().id();
        let worker = run_blocking(|| std::thread::current().id()).await.unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn test_run_blocking_without_runtime_runs_inline() {
        let value = futures::executor::block_on(run_blocking(|| 6 * 7));
        assert_eq!(value, Some(42));
    }

    #[test]
    fn test_spawn_without_runtime_is_dropped() {
        let spawner = TokioSpawner::current();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawner.spawn_boxed(Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
        }));

        assert!(handle.is_finished());
        assert!(!ran.load(Ordering::SeqCst));
    }
}

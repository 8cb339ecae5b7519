//! Asynchronous call dispatch with a single serialized callback context.
//!
//! Every store call runs on its own tokio task, at most
//! `max_concurrent_calls` at a time. Results are not handed to the
//! application from those tasks. Each finished call enqueues one callback on
//! an unbounded FIFO channel, and a single consumer task drains it, so
//! application handlers never run concurrently with each other.

use crate::error::{ClientError, ClientResult};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore, mpsc};
use tracing::{debug, warn};

/// Receives the outcome of one dispatched call, or of every refresh of a
/// continuous query.
///
/// Implemented for any `Fn(ClientResult<T>)` closure and for `()`, which
/// discards results.
pub trait ResultHandler<T>: Send + Sync + 'static {
    fn on_complete(&self, result: T);

    /// Failures are logged at `debug` and discarded unless overridden.
    fn on_error(&self, error: ClientError) {
        debug!("discarding failed call result: {error}");
    }

    fn handle(&self, result: ClientResult<T>) {
        match result {
            Ok(value) => self.on_complete(value),
            Err(error) => self.on_error(error),
        }
    }
}

impl<T, F> ResultHandler<T> for F
where
    F: Fn(ClientResult<T>) + Send + Sync + 'static,
{
    fn on_complete(&self, result: T) {
        self(Ok(result));
    }

    fn on_error(&self, error: ClientError) {
        self(Err(error));
    }
}

impl<T> ResultHandler<T> for () {
    fn on_complete(&self, _result: T) {}
}

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

/// Counts one call from dispatch until its callback has run or been dropped.
struct InFlight(Arc<Pending>);

impl InFlight {
    fn new(pending: &Arc<Pending>) -> Self {
        pending.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(pending))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Runs store calls off the caller's thread and delivers their results on
/// one serialized callback context.
pub struct Dispatcher {
    runtime: Handle,
    permits: Arc<Semaphore>,
    callbacks: mpsc::UnboundedSender<Callback>,
    pending: Arc<Pending>,
}

impl Dispatcher {
    /// Creates a dispatcher bound to the current tokio runtime.
    ///
    /// Fails with [`ClientError::NoRuntime`] outside a runtime. Once created,
    /// [`execute`](Self::execute) may be called from any thread.
    pub fn new(max_concurrent_calls: usize) -> ClientResult<Self> {
        let runtime = Handle::try_current().map_err(|_| ClientError::NoRuntime)?;
        let (callbacks, mut queue) = mpsc::unbounded_channel::<Callback>();

        runtime.spawn(async move {
            while let Some(callback) = queue.recv().await {
                if std::panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                    warn!("result handler panicked");
                }
            }
            debug!("callback context stopped");
        });

        Ok(Self {
            runtime,
            permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            callbacks,
            pending: Arc::new(Pending::default()),
        })
    }

    /// Runs `operation` on a worker task and hands its result to `handler` on
    /// the callback context.
    ///
    /// Returns as soon as the task is spawned. The handler sees exactly one
    /// result unless the task is abandoned (panic or runtime shutdown).
    pub fn execute<T, Fut, H>(&self, operation: Fut, handler: H)
    where
        T: Send + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
        H: ResultHandler<T>,
    {
        let in_flight = InFlight::new(&self.pending);
        let permits = Arc::clone(&self.permits);
        let callbacks = self.callbacks.clone();

        self.runtime.spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(_permit) => operation.await,
                Err(_) => Err(ClientError::ChannelClosed),
            };
            let callback: Callback = Box::new(move || {
                let _in_flight = in_flight;
                handler.handle(result);
            });
            if callbacks.send(callback).is_err() {
                debug!("callback context closed, dropping result");
            }
        });
    }

    /// Runs `f` on the callback context after every callback already queued.
    pub fn post(&self, f: impl FnOnce() + Send + 'static) -> ClientResult<()> {
        let in_flight = InFlight::new(&self.pending);
        let callback: Callback = Box::new(move || {
            let _in_flight = in_flight;
            f();
        });
        self.callbacks
            .send(callback)
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// Calls dispatched or posted but whose callbacks have not run yet.
    pub fn in_flight(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Waits until every dispatched call has delivered its result.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use gemini_core::TaskType;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::types::{Backend, InvocationResult};

// ─── InvocationEvent ──────────────────────────────────────────────────────

/// Progress of a single invocation, in the order it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationEvent {
    Started { task: TaskType, model: String },
    /// A backend is about to be tried.
    Attempt(Backend),
    /// A chunk of CLI stdout, in arrival order.
    Output(String),
    /// The CLI has been silent for the configured idle interval.
    StillWorking { elapsed: Duration },
    /// Always the last event.
    Finished(InvocationResult),
}

pub(crate) type EventSink = mpsc::Sender<InvocationEvent>;

pub(crate) async fn emit(sink: Option<&EventSink>, event: InvocationEvent) {
    if let Some(tx) = sink {
        // A dropped receiver means nobody is watching; the invocation itself
        // is cancelled through the stream's Drop.
        let _ = tx.send(event).await;
    }
}

// ─── InvocationStream ─────────────────────────────────────────────────────

/// An async stream of [`InvocationEvent`]s, ending with
/// [`InvocationEvent::Finished`].
///
/// Backed by a Tokio mpsc channel fed by a background task. Dropping the
/// stream aborts that task, which kills any CLI child it owns.
///
/// ```rust,ignore
/// use futures::StreamExt;
///
/// let mut events = invoker.stream(request);
/// while let Some(event) = events.next().await {
///     if let InvocationEvent::Output(chunk) = event {
///         eprint!("{chunk}");
///     }
/// }
/// ```
pub struct InvocationStream {
    rx: mpsc::Receiver<InvocationEvent>,
    task: JoinHandle<()>,
}

impl InvocationStream {
    pub(crate) fn new(rx: mpsc::Receiver<InvocationEvent>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }
}

impl Stream for InvocationStream {
    type Item = InvocationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for InvocationStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

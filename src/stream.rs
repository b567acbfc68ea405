//! Running a chat stream as a cancellable task.
//!
//! A [`StreamTask`] owns the HTTP response for one chat request.  It is the
//! only producer on a bounded channel of [`StreamEvent`]s and stops reading
//! the moment it sees a terminal event, fails, or is cancelled.  The consumer
//! drains the channel through [`StreamTask::dispatch`], which turns events
//! into [`StreamHandler`] callbacks.

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::observability::{STREAM_ABORTS, STREAM_DURATION, STREAM_FIRST_EVENT};
use crate::{Error, Result, StreamEvent};

/// Capacity of the channel between the producing task and the consumer.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Message delivered when the producing task vanished without a terminal event.
const PRODUCER_GONE: &str = "stream ended before a done or error frame";

/// A boxed stream of decoded events, as returned by a backend.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Push-style receiver for the events of one stream.
///
/// For every stream, `on_content` fires zero or more times and is followed by
/// at most one call to either `on_complete` or `on_error`.  Aborted streams
/// get neither.
pub trait StreamHandler {
    /// A fragment of the response arrived.
    fn on_content(&mut self, text: &str);

    /// The server finished the response.
    fn on_complete(&mut self);

    /// The stream failed; `message` is meant for humans.
    fn on_error(&mut self, message: &str);
}

/// A [`StreamHandler`] built from three closures.
pub struct Callbacks<C, D, E> {
    on_content: C,
    on_complete: D,
    on_error: E,
}

impl<C, D, E> Callbacks<C, D, E>
where
    C: FnMut(&str),
    D: FnMut(),
    E: FnMut(&str),
{
    /// Bundle the three callbacks.
    pub fn new(on_content: C, on_complete: D, on_error: E) -> Self {
        Self {
            on_content,
            on_complete,
            on_error,
        }
    }
}

impl<C, D, E> StreamHandler for Callbacks<C, D, E>
where
    C: FnMut(&str),
    D: FnMut(),
    E: FnMut(&str),
{
    fn on_content(&mut self, text: &str) {
        (self.on_content)(text)
    }

    fn on_complete(&mut self) {
        (self.on_complete)()
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message)
    }
}

/// How a dispatched stream ended.
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    /// A `done` frame arrived; `on_complete` fired.
    Completed,
    /// The stream failed; `on_error` fired with this error's message.
    ///
    /// An `error` frame from the server is [`Error::ServerReported`];
    /// everything else keeps the transport error that ended the stream.
    Failed(Error),
    /// The stream was cancelled; no terminal callback fired.
    Aborted,
}

impl StreamOutcome {
    /// True if a `done` frame arrived.
    pub fn is_completed(&self) -> bool {
        matches!(self, StreamOutcome::Completed)
    }

    /// True unless the stream completed.
    pub fn is_failure(&self) -> bool {
        !self.is_completed()
    }

    /// True if the stream was cancelled.
    pub fn is_aborted(&self) -> bool {
        matches!(self, StreamOutcome::Aborted)
    }

    /// The error that ended a failed stream.
    pub fn error(&self) -> Option<&Error> {
        match self {
            StreamOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Convert to a `Result` for callers that propagate with `?`.
    pub fn into_result(self) -> Result<()> {
        match self {
            StreamOutcome::Completed => Ok(()),
            StreamOutcome::Failed(err) => Err(err),
            StreamOutcome::Aborted => Err(Error::abort("stream cancelled")),
        }
    }
}

/// A chat stream running on its own tokio task.
pub struct StreamTask {
    events: mpsc::Receiver<Result<StreamEvent>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl StreamTask {
    /// Spawn a task that opens a stream with `open` and forwards its events.
    pub fn spawn<F>(open: F) -> Self
    where
        F: Future<Output = Result<EventStream>> + Send + 'static,
    {
        Self::spawn_with_token(open, CancellationToken::new())
    }

    /// Like [`StreamTask::spawn`], but cancelled through a caller-supplied token.
    pub fn spawn_with_token<F>(open: F, cancel: CancellationToken) -> Self
    where
        F: Future<Output = Result<EventStream>> + Send + 'static,
    {
        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    STREAM_ABORTS.click();
                    debug!("stream task cancelled");
                }
                _ = produce(open, tx) => {}
            }
        });
        Self {
            events,
            cancel,
            handle,
        }
    }

    /// Request cancellation.  Further reads stop and the response is dropped.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// A token that aborts this stream when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True once the stream has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Receive the next event in wire order.
    ///
    /// A failure to open or read the stream arrives as a final `Err`.
    /// Returns `None` once the stream is over: after its terminal item, or
    /// after it was aborted.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Drain the stream into `handler`.
    ///
    /// Exactly one outcome is reported.  Events still queued when the stream
    /// is aborted are not delivered.
    pub async fn dispatch<H: StreamHandler + ?Sized>(&mut self, handler: &mut H) -> StreamOutcome {
        loop {
            let err = match self.next_event().await {
                Some(Ok(StreamEvent::Content { text, .. })) => {
                    handler.on_content(&text);
                    continue;
                }
                Some(Ok(StreamEvent::Done { .. })) => {
                    handler.on_complete();
                    return StreamOutcome::Completed;
                }
                Some(Ok(StreamEvent::Error { message })) => Error::server_reported(message),
                Some(Err(err)) => err,
                None if self.is_aborted() => return StreamOutcome::Aborted,
                None => Error::silent_termination(PRODUCER_GONE),
            };
            handler.on_error(&err.to_string());
            return StreamOutcome::Failed(err);
        }
    }
}

impl Drop for StreamTask {
    fn drop(&mut self) {
        // Nobody is listening any more; make sure the response is released.
        self.handle.abort();
    }
}

/// Open a stream and deliver its events to `handler`, push style.
///
/// Failures to connect, non-2xx responses, read errors and silent terminations
/// all surface as a single `on_error`.  Cancelling `cancel` aborts the stream
/// without any terminal callback.
pub async fn stream_with_callbacks<F, H>(
    open: F,
    handler: &mut H,
    cancel: CancellationToken,
) -> StreamOutcome
where
    F: Future<Output = Result<EventStream>> + Send + 'static,
    H: StreamHandler + ?Sized,
{
    let mut task = StreamTask::spawn_with_token(open, cancel);
    task.dispatch(handler).await
}

async fn produce<F>(open: F, tx: mpsc::Sender<Result<StreamEvent>>)
where
    F: Future<Output = Result<EventStream>> + Send,
{
    let started = Instant::now();
    let mut events = match open.await {
        Ok(events) => events,
        Err(err) => {
            let _ = tx.send(Err(err)).await;
            return;
        }
    };

    let mut first = true;
    loop {
        let item = match events.next().await {
            Some(item) => item,
            None => Err(Error::silent_termination(PRODUCER_GONE)),
        };
        if first {
            STREAM_FIRST_EVENT.add(started.elapsed().as_secs_f64());
            first = false;
        }
        let terminal = !matches!(&item, Ok(event) if !event.is_terminal());
        if tx.send(item).await.is_err() || terminal {
            break;
        }
    }
    STREAM_DURATION.add(started.elapsed().as_secs_f64());
}

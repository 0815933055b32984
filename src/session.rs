//! Request sessions
//!
//! A [`RequestSession`] binds one submission to one chunk stream and one
//! parser. Spawning it moves the session into its own task; the caller keeps a
//! [`SessionHandle`] to read events and to cancel. A [`SessionSlot`] holds at
//! most one active session, and beginning a new one supersedes the old.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::error::{RelayError, Result};
use crate::parser::{ParserState, Record, RecordParser};
use crate::prompt::Mode;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Output of a running session, in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Newly decoded text
    Text(String),
    /// A line that completed and matched the session's dialect
    Record(Record),
}

/// Owned state of one submitted request.
#[derive(Debug)]
pub struct RequestSession {
    id: Uuid,
    mode: Mode,
    started_at: DateTime<Utc>,
    parser: RecordParser,
    cancel: CancellationToken,
}

impl RequestSession {
    pub fn new(mode: Mode) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
            parser: RecordParser::new(mode.dialect()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn parser(&self) -> &RecordParser {
        &self.parser
    }

    pub fn state(&self) -> ParserState {
        self.parser.state()
    }

    /// Release the session's buffers.
    pub fn close(&mut self) {
        self.parser.close();
    }

    /// Start consuming `chunks` on a new task.
    pub fn spawn<S>(self, chunks: S) -> SessionHandle
    where
        S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
    {
        let id = self.id;
        let cancel = self.cancel.clone();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tracing::debug!(session_id = %id, mode = %self.mode, "Session started");
        let task = tokio::spawn(run(self, chunks, tx));

        SessionHandle {
            id,
            events: rx,
            cancel: cancel.clone(),
            task,
            _guard: cancel.drop_guard(),
        }
    }
}

async fn run<S>(
    mut session: RequestSession,
    mut chunks: S,
    tx: mpsc::Sender<SessionEvent>,
) -> Result<RequestSession>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    let cancel = session.cancel.clone();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = chunks.next() => Some(next),
        };
        let Some(next) = next else {
            return Err(abandon(session, RelayError::Cancelled));
        };

        let mut events = Vec::new();
        match next {
            Some(Ok(bytes)) => {
                let before = session.parser.decoded_text().len();
                let records = session.parser.feed(&bytes);
                push_text(&mut events, &session.parser.decoded_text()[before..]);
                events.extend(records.into_iter().map(SessionEvent::Record));
            }
            Some(Err(e)) => {
                let e = match e {
                    RelayError::StreamAborted(_) | RelayError::Cancelled => e,
                    other => RelayError::StreamAborted(other.to_string()),
                };
                return Err(abandon(session, e));
            }
            None => {
                let before = session.parser.decoded_text().len();
                let last = session.parser.finish();
                push_text(&mut events, &session.parser.decoded_text()[before..]);
                events.extend(last.map(SessionEvent::Record));
                if !emit(&tx, &cancel, events).await {
                    return Err(abandon(session, RelayError::Cancelled));
                }
                tracing::debug!(
                    session_id = %session.id,
                    mode = %session.mode,
                    lines = session.parser.lines_completed(),
                    records = session.parser.records_emitted(),
                    replacements = session.parser.replacements(),
                    "Session drained"
                );
                return Ok(session);
            }
        }

        if !emit(&tx, &cancel, events).await {
            return Err(abandon(session, RelayError::Cancelled));
        }
    }
}

fn push_text(events: &mut Vec<SessionEvent>, text: &str) {
    if !text.is_empty() {
        events.push(SessionEvent::Text(text.to_string()));
    }
}

/// Deliver events in order. Returns `false` once the session is cancelled or
/// nobody is listening.
async fn emit(
    tx: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
    events: Vec<SessionEvent>,
) -> bool {
    for event in events {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            sent = tx.send(event) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }
    true
}

fn abandon(mut session: RequestSession, error: RelayError) -> RelayError {
    match &error {
        RelayError::Cancelled => tracing::debug!(
            session_id = %session.id,
            records = session.parser.records_emitted(),
            "Session cancelled"
        ),
        _ => tracing::warn!(
            session_id = %session.id,
            records = session.parser.records_emitted(),
            error = %error,
            "Session aborted"
        ),
    }
    session.close();
    error
}

/// Caller's side of a running session. Dropping it cancels the session.
pub struct SessionHandle {
    id: Uuid,
    events: mpsc::Receiver<SessionEvent>,
    cancel: CancellationToken,
    task: JoinHandle<Result<RequestSession>>,
    _guard: DropGuard,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the session has stopped producing.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session to end and take it back.
    ///
    /// Events not yet read are discarded. A drained session is returned as
    /// `Ok`; a cancelled or aborted one as the error that ended it.
    pub async fn finish(self) -> Result<RequestSession> {
        let SessionHandle {
            mut events, task, ..
        } = self;

        while events.recv().await.is_some() {}
        task.await
            .map_err(|e| RelayError::Server(format!("Session task failed: {e}")))?
    }
}

/// Holds the one active session of an interactive caller.
#[derive(Default)]
pub struct SessionSlot {
    active: Option<SessionHandle>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handle` the active session, cancelling any previous one.
    ///
    /// Returns `true` if a previous session was superseded.
    pub fn begin(&mut self, handle: SessionHandle) -> bool {
        let superseded = self.cancel();
        self.active = Some(handle);
        superseded
    }

    pub fn active_mut(&mut self) -> Option<&mut SessionHandle> {
        self.active.as_mut()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn take(&mut self) -> Option<SessionHandle> {
        self.active.take()
    }

    /// Cancel the active session, if any.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(handle) => {
                tracing::debug!(session_id = %handle.id(), "Superseding session");
                handle.cancel();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect()
    }

    /// A stream that yields `parts` and then never ends. The returned receiver
    /// resolves once the stream has been dropped.
    fn hanging(
        parts: &[&'static str],
    ) -> (
        impl Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
        oneshot::Receiver<()>,
    ) {
        let (alive, dropped) = oneshot::channel::<()>();
        let stream = futures::stream::iter(chunks(parts))
            .chain(futures::stream::pending())
            .map(move |item| {
                let _alive = &alive;
                item
            });
        (stream, dropped)
    }

    async fn drain(handle: &mut SessionHandle) -> (String, Vec<Record>) {
        let mut text = String::new();
        let mut records = Vec::new();
        while let Some(event) = handle.next_event().await {
            match event {
                SessionEvent::Text(t) => text.push_str(&t),
                SessionEvent::Record(r) => records.push(r),
            }
        }
        (text, records)
    }

    #[tokio::test]
    async fn test_explain_session_emits_records() {
        let session = RequestSession::new(Mode::Explain { detailed: true });
        let stream = futures::stream::iter(chunks(&[
            "0 | (0-59) | min",
            "ute\n5 | (0-23) | hour\nnot a row\n",
            "* | (1-31) | every day",
        ]));
        let mut handle = session.spawn(stream);

        let (text, records) = drain(&mut handle).await;
        assert_eq!(
            text,
            "0 | (0-59) | minute\n5 | (0-23) | hour\nnot a row\n* | (1-31) | every day"
        );
        let chars: Vec<&str> = records
            .iter()
            .map(|r| r.get("character").unwrap())
            .collect();
        assert_eq!(chars, vec!["0", "5", "*"]);

        let session = handle.finish().await.unwrap();
        assert_eq!(session.state(), ParserState::Drained);
        assert_eq!(session.parser().records_emitted(), 3);
        assert_eq!(session.parser().lines_completed(), 3);
    }

    #[tokio::test]
    async fn test_generate_session_emits_text_only() {
        let session = RequestSession::new(Mode::Generate);
        let mut handle = session.spawn(futures::stream::iter(chunks(&["0 0", " * * 1"])));

        let (text, records) = drain(&mut handle).await;
        assert_eq!(text, "0 0 * * 1");
        assert!(records.is_empty());

        let session = handle.finish().await.unwrap();
        assert_eq!(session.parser().decoded_text(), "0 0 * * 1");
        assert_eq!(session.mode(), Mode::Generate);
    }

    #[tokio::test]
    async fn test_aborted_session_keeps_earlier_records() {
        let mut items = chunks(&["0: at minute 0\n5: past ho"]);
        items.push(Err(RelayError::StreamAborted("reset".to_string())));
        let session = RequestSession::new(Mode::Explain { detailed: false });
        let mut handle = session.spawn(futures::stream::iter(items));

        let (_, records) = drain(&mut handle).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("value"), Some("0"));

        assert!(matches!(
            handle.finish().await,
            Err(RelayError::StreamAborted(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_session_and_drops_stream() {
        let (stream, dropped) = hanging(&["0: at minute 0\n"]);
        let session = RequestSession::new(Mode::Explain { detailed: false });
        let mut handle = session.spawn(stream);

        assert!(matches!(
            handle.next_event().await,
            Some(SessionEvent::Text(_))
        ));
        assert!(matches!(
            handle.next_event().await,
            Some(SessionEvent::Record(_))
        ));
        handle.cancel();

        assert!(matches!(handle.finish().await, Err(RelayError::Cancelled)));
        assert!(tokio::time::timeout(Duration::from_secs(1), dropped)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels() {
        let (stream, dropped) = hanging(&[]);
        let handle = RequestSession::new(Mode::Generate).spawn(stream);
        drop(handle);
        assert!(tokio::time::timeout(Duration::from_secs(1), dropped)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_slot_supersedes_previous_session() {
        let mut slot = SessionSlot::new();
        assert!(!slot.is_active());

        let (first_stream, first_dropped) = hanging(&["0: at minute 0\n"]);
        let first = RequestSession::new(Mode::Explain { detailed: false }).spawn(first_stream);
        let first_id = first.id();
        assert!(!slot.begin(first));

        let second = RequestSession::new(Mode::Generate)
            .spawn(futures::stream::iter(chunks(&["*/5 * * * *"])));
        let second_id = second.id();
        assert!(slot.begin(second));
        assert_ne!(first_id, second_id);

        assert!(tokio::time::timeout(Duration::from_secs(1), first_dropped)
            .await
            .is_ok());

        let active = slot.active_mut().unwrap();
        assert_eq!(active.id(), second_id);
        let (text, _) = drain(active).await;
        assert_eq!(text, "*/5 * * * *");

        let session = slot.take().unwrap().finish().await.unwrap();
        assert_eq!(session.id(), second_id);
        assert!(!slot.is_active());
        assert!(!slot.cancel());
    }

    #[test]
    fn test_new_session_is_idle() {
        let mut session = RequestSession::new(Mode::Explain { detailed: true });
        assert_eq!(session.state(), ParserState::Idle);
        assert!(session.started_at() <= Utc::now());
        session.close();
        assert_eq!(session.state(), ParserState::Closed);
    }
}

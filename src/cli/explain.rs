use tokio::io::{AsyncBufReadExt, BufReader};

use crate::client::RelayClient;
use crate::error::{RelayError, Result};
use crate::parser::Record;
use crate::prompt::Mode;
use crate::session::{RequestSession, SessionEvent, SessionHandle, SessionSlot};

/// Execute the `explain` command.
///
/// With an expression, streams one explanation and exits. Without one, reads
/// expressions from stdin; each new line supersedes the explanation in flight.
pub async fn execute(
    expression: Option<&str>,
    terse: bool,
    server: &str,
    json: bool,
) -> Result<()> {
    let client = RelayClient::new(server)?;
    let mode = Mode::Explain { detailed: !terse };

    match expression {
        Some(expression) => explain_once(&client, mode, expression, json).await,
        None => interactive(&client, mode, json).await,
    }
}

async fn explain_once(
    client: &RelayClient,
    mode: Mode,
    expression: &str,
    json: bool,
) -> Result<()> {
    let stream = client.submit(mode, expression).await?;
    let mut handle = RequestSession::new(mode).spawn(stream);
    let mut printer = Printer::new(json);

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => printer.on_event(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }

    match handle.finish().await {
        Ok(_) => {
            printer.finish();
            Ok(())
        }
        Err(RelayError::Cancelled) => {
            eprintln!("Cancelled");
            Ok(())
        }
        Err(e) => {
            printer.finish();
            Err(e)
        }
    }
}

async fn interactive(client: &RelayClient, mode: Mode, json: bool) -> Result<()> {
    println!("Enter a cron expression to explain (type 'exit' or Ctrl+D to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut slot = SessionSlot::new();
    let mut printer = Printer::new(json);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    break;
                }
                if let Err(e) = supersede(client, mode, line, &mut slot, &mut printer).await {
                    eprintln!("Error: {e}");
                }
            }
            event = next_active(&mut slot) => match event {
                Some(event) => printer.on_event(event),
                None => {
                    if let Some(handle) = slot.take() {
                        report(handle, &mut printer).await;
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                if !slot.cancel() {
                    break;
                }
                eprintln!("Cancelled");
            }
        }
    }

    slot.cancel();
    Ok(())
}

/// Cancel the explanation in flight, then start one for `line`.
///
/// The slot stays empty when the new submission fails.
async fn supersede(
    client: &RelayClient,
    mode: Mode,
    line: &str,
    slot: &mut SessionSlot,
    printer: &mut Printer,
) -> Result<()> {
    if slot.cancel() {
        eprintln!("(previous explanation cancelled)");
    }
    *printer = Printer::new(printer.json);

    let stream = client.submit(mode, line).await?;
    slot.begin(RequestSession::new(mode).spawn(stream));
    Ok(())
}

/// Next event of the active session. Pends forever while none is active.
async fn next_active(slot: &mut SessionSlot) -> Option<SessionEvent> {
    match slot.active_mut() {
        Some(handle) => handle.next_event().await,
        None => std::future::pending().await,
    }
}

async fn report(handle: SessionHandle, printer: &mut Printer) {
    match handle.finish().await {
        Ok(_) => printer.finish(),
        Err(RelayError::Cancelled) => {}
        Err(e) => {
            printer.finish();
            eprintln!("Error: {e}");
        }
    }
}

/// Renders session events as they arrive.
///
/// Rows are printed as soon as they complete. If the response never produced a
/// row, the raw text is printed once the session ends.
struct Printer {
    json: bool,
    rows: usize,
    raw: String,
}

impl Printer {
    fn new(json: bool) -> Self {
        Self {
            json,
            rows: 0,
            raw: String::new(),
        }
    }

    fn on_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Text(text) => self.raw.push_str(&text),
            SessionEvent::Record(record) => {
                self.rows += 1;
                println!("{}", self.render(&record));
            }
        }
    }

    fn render(&self, record: &Record) -> String {
        if self.json {
            return serde_json::to_string(record)
                .unwrap_or_else(|_| record.source().to_string());
        }
        format_row(record.values())
    }

    fn finish(&mut self) {
        if self.rows == 0 && !self.raw.trim().is_empty() {
            println!("{}", self.raw.trim_end());
        }
    }
}

/// Align all but the last value into fixed-width columns.
fn format_row(values: &[String]) -> String {
    let mut out = String::new();
    if let Some((last, leading)) = values.split_last() {
        for value in leading {
            out.push_str(&format!("{value:<16}"));
            out.push(' ');
        }
        out.push_str(last);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use bytes::Bytes;
    use futures::StreamExt;

    /// Relay stand-in: the first explanation streams one row and then hangs,
    /// every later one is refused.
    #[derive(Default)]
    struct FlakyRelay {
        hits: AtomicUsize,
        first_closed: Arc<AtomicBool>,
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    async fn explain(State(relay): State<Arc<FlakyRelay>>) -> Response {
        if relay.hits.fetch_add(1, Ordering::SeqCst) > 0 {
            let body = serde_json::json!({ "error": { "message": "upstream unavailable" } });
            return (StatusCode::BAD_GATEWAY, Json(body)).into_response();
        }

        let flag = SetOnDrop(relay.first_closed.clone());
        let hang = futures::stream::once(async move {
            let _flag = flag;
            std::future::pending::<std::result::Result<Bytes, std::io::Error>>().await
        });
        let row = Ok(Bytes::from_static(b"0 minute | (0 - 59) | at minute 0\n"));
        Response::builder()
            .header("content-type", "text/plain; charset=utf-8")
            .body(Body::from_stream(futures::stream::iter([row]).chain(hang)))
            .unwrap()
    }

    async fn start_relay() -> (Arc<FlakyRelay>, RelayClient) {
        let relay = Arc::new(FlakyRelay::default());
        let app = Router::new()
            .route("/api/explain", post(explain))
            .with_state(relay.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (relay, RelayClient::new(format!("http://{addr}")).unwrap())
    }

    async fn start_first(client: &RelayClient, slot: &mut SessionSlot, printer: &mut Printer) {
        let mode = Mode::Explain { detailed: true };
        supersede(client, mode, "0 5 * * *", slot, printer).await.unwrap();
        assert!(slot.is_active());

        let event = tokio::time::timeout(Duration::from_secs(5), next_active(slot))
            .await
            .unwrap();
        printer.on_event(event.unwrap());
    }

    async fn wait_closed(flag: &AtomicBool) {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("first explanation was never closed");
    }

    #[tokio::test]
    async fn test_failed_submit_still_cancels_previous() {
        let (relay, client) = start_relay().await;
        let mut slot = SessionSlot::new();
        let mut printer = Printer::new(false);
        start_first(&client, &mut slot, &mut printer).await;
        printer.rows = 2;

        let mode = Mode::Explain { detailed: true };
        let err = supersede(&client, mode, "5 4 * * *", &mut slot, &mut printer)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, RelayError::Rejected { status: 502, .. }));
        assert!(!slot.is_active());
        assert_eq!(printer.rows, 0);
        assert!(printer.raw.is_empty());
        assert_eq!(relay.hits.load(Ordering::SeqCst), 2);
        wait_closed(&relay.first_closed).await;
    }

    #[tokio::test]
    async fn test_invalid_line_still_cancels_previous() {
        let (relay, client) = start_relay().await;
        let mut slot = SessionSlot::new();
        let mut printer = Printer::new(true);
        start_first(&client, &mut slot, &mut printer).await;

        let mode = Mode::Explain { detailed: true };
        let err = supersede(&client, mode, "not cron", &mut slot, &mut printer)
            .await
            .err()
            .unwrap();

        assert!(matches!(err, RelayError::Validation { .. }));
        assert!(!slot.is_active());
        assert!(printer.json);
        assert_eq!(relay.hits.load(Ordering::SeqCst), 1);
        wait_closed(&relay.first_closed).await;
    }

    #[test]
    fn test_format_row() {
        let values = vec![
            "5 hours".to_string(),
            "(0 - 23)".to_string(),
            "at 5am".to_string(),
        ];
        assert_eq!(
            format_row(&values),
            "5 hours          (0 - 23)         at 5am"
        );
        assert_eq!(format_row(&["only".to_string()]), "only");
        assert_eq!(format_row(&[]), "");
    }

    #[test]
    fn test_printer_counts_rows() {
        let record = crate::parser::Dialect::TERSE
            .parse_line("0: at minute 0", 1)
            .unwrap();
        let mut printer = Printer::new(true);
        printer.on_event(SessionEvent::Text("0: at minute 0\n".to_string()));
        printer.on_event(SessionEvent::Record(record));
        assert_eq!(printer.rows, 1);
        assert_eq!(printer.raw, "0: at minute 0\n");
    }
}

use std::io::Write;

use crate::client::RelayClient;
use crate::error::{RelayError, Result};
use crate::prompt::Mode;
use crate::session::{RequestSession, SessionEvent};

/// Execute the `generate` command: print the expression as it streams in.
pub async fn execute(description: &str, server: &str) -> Result<()> {
    let client = RelayClient::new(server)?;
    let stream = client.generate(description).await?;
    let mut handle = RequestSession::new(Mode::Generate).spawn(stream);

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(SessionEvent::Text(text)) => {
                    print!("{text}");
                    stdout.flush()?;
                }
                Some(SessionEvent::Record(_)) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }
    println!();

    match handle.finish().await {
        Ok(_) => Ok(()),
        Err(RelayError::Cancelled) => {
            eprintln!("Cancelled");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

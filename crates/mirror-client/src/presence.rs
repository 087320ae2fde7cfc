//! Local presence capability.
//!
//! Presence is a `watch` channel of booleans. The binary feeds it from stdin;
//! a face detector or any other sensor can drive the same sender.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub fn presence_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

pub fn parse_presence(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "1" | "present" | "on" | "yes" | "true" => Some(true),
        "0" | "absent" | "off" | "no" | "false" => Some(false),
        _ => None,
    }
}

/// Publish a value only when it differs from the current one.
pub fn publish(tx: &watch::Sender<bool>, present: bool) -> bool {
    tx.send_if_modified(|current| {
        if *current == present {
            return false;
        }
        *current = present;
        true
    })
}

/// Read presence toggles from stdin until EOF.
pub fn spawn_stdin_presence(tx: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_presence(&line) {
                    Some(present) => {
                        publish(&tx, present);
                    }
                    None => warn!("unrecognised presence input {:?}, use 1/0", line.trim()),
                },
                Ok(None) => {
                    debug!("presence input closed");
                    break;
                }
                Err(e) => {
                    warn!("failed to read presence input: {}", e);
                    break;
                }
            }
        }
    })
}

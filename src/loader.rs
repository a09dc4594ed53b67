//! Asynchronous, cancellable asset loading.
//!
//! Each submission gets a ticket from a monotonically increasing generation.
//! Only the outcome of the newest outstanding ticket is ever delivered; older
//! outcomes are discarded when they arrive. Outcomes are polled by the session
//! between ticks, so an asset is never installed mid-frame.

use std::panic::{self, UnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use crate::asset::ParsedAsset;
use crate::error::ParseError;
use crate::format;

/// Identifies one load request.
pub type LoadTicket = u64;

/// How parsing work is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Parse on a worker thread.
    Threaded,
    /// Parse during `submit`; the outcome is still delivered on the next poll.
    Inline,
}

impl Default for Dispatch {
    fn default() -> Self {
        if cfg!(target_arch = "wasm32") {
            Dispatch::Inline
        } else {
            Dispatch::Threaded
        }
    }
}

/// Result of one load request.
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub filename: String,
    pub result: Result<ParsedAsset, ParseError>,
}

/// Request/response front end to the format parser.
#[derive(Debug)]
pub struct AssetLoader {
    dispatch: Dispatch,
    generation: u64,
    pending: Option<LoadTicket>,
    sender: Sender<LoadOutcome>,
    receiver: Receiver<LoadOutcome>,
}

impl AssetLoader {
    pub fn new(dispatch: Dispatch) -> Self {
        // No threads on wasm32-unknown-unknown
        let dispatch = if cfg!(target_arch = "wasm32") {
            Dispatch::Inline
        } else {
            dispatch
        };
        let (sender, receiver) = mpsc::channel();
        Self {
            dispatch,
            generation: 0,
            pending: None,
            sender,
            receiver,
        }
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }

    /// Start loading `bytes`, abandoning any request still in flight.
    pub fn submit(&mut self, bytes: Vec<u8>, filename: impl Into<String>) -> LoadTicket {
        let filename = filename.into();
        self.generation += 1;
        let ticket = self.generation;

        if let Some(previous) = self.pending.replace(ticket) {
            log::info!("Abandoning load #{} in favour of '{}'", previous, filename);
        }
        log::info!("Loading '{}' ({} bytes) as #{}", filename, bytes.len(), ticket);

        match self.dispatch {
            Dispatch::Inline => run_parse(&self.sender, ticket, bytes, filename),
            Dispatch::Threaded => {
                let sender = self.sender.clone();
                // Keep a copy of the name in case the thread cannot be spawned
                let fallback_name = filename.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("asset-load-{}", ticket))
                    .spawn(move || run_parse(&sender, ticket, bytes, filename));

                if let Err(e) = spawned {
                    log::error!("Could not spawn loader thread for #{}: {}", ticket, e);
                    let result = format::AssetFormat::from_filename(&fallback_name).and_then(
                        |format| {
                            Err(ParseError::AssetLoadFailed {
                                format,
                                cause: format!("loader unavailable: {}", e),
                            })
                        },
                    );
                    let _ = self.sender.send(LoadOutcome {
                        ticket,
                        filename: fallback_name,
                        result,
                    });
                }
            }
        }

        ticket
    }

    /// Abandon the request in flight, if any.
    pub fn cancel(&mut self) -> Option<LoadTicket> {
        let ticket = self.pending.take()?;
        log::info!("Cancelled load #{}", ticket);
        Some(ticket)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Ticket of the request in flight.
    pub fn pending_ticket(&self) -> Option<LoadTicket> {
        self.pending
    }

    /// Take the outcome of the current request if it has finished.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        while let Ok(outcome) = self.receiver.try_recv() {
            if let Some(outcome) = self.accept(outcome) {
                return Some(outcome);
            }
        }
        None
    }

    /// Block until the current request finishes or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        let deadline = Instant::now() + timeout;
        while self.pending.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(outcome) => {
                    if let Some(outcome) = self.accept(outcome) {
                        return Some(outcome);
                    }
                }
                Err(_) => break,
            }
        }
        None
    }

    fn accept(&mut self, outcome: LoadOutcome) -> Option<LoadOutcome> {
        if self.pending == Some(outcome.ticket) {
            self.pending = None;
            Some(outcome)
        } else {
            log::warn!(
                "Discarding stale load #{} ('{}')",
                outcome.ticket,
                outcome.filename
            );
            None
        }
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new(Dispatch::default())
    }
}

fn run_parse(sender: &Sender<LoadOutcome>, ticket: LoadTicket, bytes: Vec<u8>, filename: String) {
    let result = guarded(&filename, || format::parse(&bytes, &filename));
    // The loader may have been dropped; nobody is waiting for the outcome then
    let _ = sender.send(LoadOutcome {
        ticket,
        filename,
        result,
    });
}

/// Run a decoder, turning a panic inside it into `AssetLoadFailed`.
///
/// A worker that unwinds would otherwise never send its outcome and leave the
/// ticket pending forever.
fn guarded<F>(filename: &str, decode: F) -> Result<ParsedAsset, ParseError>
where
    F: FnOnce() -> Result<ParsedAsset, ParseError> + UnwindSafe,
{
    match panic::catch_unwind(decode) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("Decoder panicked on '{}': {}", filename, message);
            format::AssetFormat::from_filename(filename).and_then(|format| {
                Err(ParseError::AssetLoadFailed {
                    format,
                    cause: format!("decoder panicked: {}", message),
                })
            })
        }
    }
}

//! Exports a single dialog through a dumper and computes its next progress
//! record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::dumper::{DumpFlow, Dumper};
use crate::error::{DumpError, Result};
use crate::model::{Dialog, Message};
use crate::progress::DumpProgress;
use crate::provider::MessageStream;

/// Shared interrupt flag, set from a signal handler and polled by the drivers
/// between messages and between dialogs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    NotStarted,
    InProgress,
    /// Every fresh message was offered
    Completed,
    /// The dumper asked to stop early
    Aborted,
    /// The session was cancelled mid-dialog; progress must not be persisted
    Interrupted,
}

impl DialogState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Interrupted => "interrupted",
        }
    }

    /// Whether the resulting record may be persisted
    pub fn is_persistable(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// Result of one dialog run
#[derive(Debug, Clone)]
pub struct DialogExport {
    pub state: DialogState,
    /// The record to persist (equal to the previous one when interrupted)
    pub progress: DumpProgress,
    /// Messages handed to `dump_message` that were accepted
    pub dumped: usize,
    /// Messages judged stale before the scan stopped
    pub stale: usize,
}

#[derive(Default)]
struct Tally {
    dumped: usize,
    stale: usize,
    newest_dumped: Option<i64>,
}

/// Run one dialog: `start_dialog`, fresh messages newest first through
/// `dump_message`, then `end_dialog`.
///
/// On a failure after `start_dialog` succeeded, `end_dialog` is still
/// attempted so the dumper can release per-dialog resources; its result is
/// discarded and the original error is returned.
#[instrument(skip_all, fields(dialog_id = %dialog.id, dumper = dumper.name()))]
pub fn export_dialog<D: Dumper + ?Sized>(
    dumper: &mut D,
    dialog: &Dialog,
    progress: &DumpProgress,
    messages: MessageStream<'_>,
    cancel: &CancelFlag,
) -> Result<DialogExport> {
    let mut state = DialogState::NotStarted;
    debug!(state = state.as_str(), last_id = ?progress.last_id, "starting dialog");

    dumper
        .start_dialog(dialog, progress)
        .map_err(|err| DumpError::dialog_hook("start_dialog", &dialog.id, err))?;
    state = DialogState::InProgress;
    debug!(state = state.as_str(), "offering messages");

    let mut tally = Tally::default();
    state = match scan(dumper, dialog, progress, messages, cancel, &mut tally) {
        Ok(end) => end,
        Err(err) => {
            if let Err(cleanup) = dumper.end_dialog(dialog) {
                warn!(error = %cleanup, "end_dialog failed while unwinding a failed dialog");
            }
            return Err(err);
        }
    };

    let custom_data = dumper
        .end_dialog(dialog)
        .map_err(|err| DumpError::dialog_hook("end_dialog", &dialog.id, err))?;

    let next = if state.is_persistable() {
        progress.advance(tally.newest_dumped, custom_data)
    } else {
        progress.clone()
    };

    match state {
        DialogState::Aborted => info!(dumped = tally.dumped, "dumper stopped dialog early"),
        DialogState::Interrupted => info!(dumped = tally.dumped, "dialog interrupted"),
        _ => debug!(dumped = tally.dumped, stale = tally.stale, "dialog finished"),
    }

    Ok(DialogExport {
        state,
        progress: next,
        dumped: tally.dumped,
        stale: tally.stale,
    })
}

fn scan<D: Dumper + ?Sized>(
    dumper: &mut D,
    dialog: &Dialog,
    progress: &DumpProgress,
    messages: MessageStream<'_>,
    cancel: &CancelFlag,
    tally: &mut Tally,
) -> Result<DialogState> {
    let stop_at_stale = dumper.monotonic_freshness();
    let mut previous: Option<i64> = None;

    for message in messages {
        if cancel.is_cancelled() {
            return Ok(DialogState::Interrupted);
        }

        let message: Message = message?;
        if let Some(prev) = previous {
            if message.id >= prev {
                return Err(DumpError::Ordering {
                    dialog_id: dialog.id.clone(),
                    id: message.id,
                    previous: prev,
                });
            }
        }
        previous = Some(message.id);

        if !dumper.is_fresh(&message, progress) {
            tally.stale += 1;
            if stop_at_stale {
                debug!(id = message.id, "reached already exported messages");
                break;
            }
            continue;
        }

        let flow = dumper
            .dump_message(dialog, &message)
            .map_err(|err| DumpError::dialog_hook("dump_message", &dialog.id, err))?;

        match flow {
            DumpFlow::Continue => {
                tally.dumped += 1;
                tally.newest_dumped = Some(
                    tally
                        .newest_dumped
                        .map_or(message.id, |newest| newest.max(message.id)),
                );
            }
            DumpFlow::Abort => {
                debug!(id = message.id, "dump_message requested abort");
                return Ok(DialogState::Aborted);
            }
        }
    }

    Ok(DialogState::Completed)
}

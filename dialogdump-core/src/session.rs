//! Drives a whole backup session across every dialog of a provider.

use tracing::{debug, info, instrument, warn};

use crate::driver::{export_dialog, CancelFlag, DialogExport, DialogState};
use crate::dumper::Dumper;
use crate::error::{DumpError, Result};
use crate::filter::DialogFilter;
use crate::model::Dialog;
use crate::provider::DialogProvider;
use crate::store::ProgressStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Completed,
    Aborted,
    /// Cancelled mid-dialog; the stored record was left alone
    Interrupted,
    /// Excluded by the filter or not reached after cancellation
    Skipped,
    /// The dialog failed; its stored record was left alone
    Failed(String),
}

impl DialogOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Interrupted => "interrupted",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DialogReport {
    pub dialog_id: String,
    pub label: String,
    pub outcome: DialogOutcome,
    pub dumped: usize,
    /// `last_id` of the record now in the store
    pub last_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct BackupReport {
    pub dialogs: Vec<DialogReport>,
}

impl BackupReport {
    pub fn dumped(&self) -> usize {
        self.dialogs.iter().map(|d| d.dumped).sum()
    }

    pub fn count(&self, outcome: &str) -> usize {
        self.dialogs
            .iter()
            .filter(|d| d.outcome.as_str() == outcome)
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DialogReport> {
        self.dialogs
            .iter()
            .filter(|d| matches!(d.outcome, DialogOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

type DialogCallback<'a> = Box<dyn FnMut(&DialogReport) + 'a>;

/// One backup run. The dumper is used for every dialog, one call at a time.
pub struct BackupSession<'a, P: ?Sized, S: ?Sized, D: ?Sized> {
    provider: &'a mut P,
    store: &'a mut S,
    dumper: &'a mut D,
    filter: DialogFilter,
    cancel: CancelFlag,
    on_dialog: Option<DialogCallback<'a>>,
}

impl<'a, P, S, D> BackupSession<'a, P, S, D>
where
    P: DialogProvider + ?Sized,
    S: ProgressStore + ?Sized,
    D: Dumper + ?Sized,
{
    pub fn new(provider: &'a mut P, store: &'a mut S, dumper: &'a mut D) -> Self {
        Self {
            provider,
            store,
            dumper,
            filter: DialogFilter::default(),
            cancel: CancelFlag::new(),
            on_dialog: None,
        }
    }

    pub fn with_filter(mut self, filter: DialogFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Observe each dialog's report as soon as it is known
    pub fn on_dialog(mut self, callback: impl FnMut(&DialogReport) + 'a) -> Self {
        self.on_dialog = Some(Box::new(callback));
        self
    }

    /// Run the session.
    ///
    /// Errors from `start_backup`, dialog enumeration and `end_backup` are
    /// fatal. Anything that goes wrong inside one dialog is recorded in the
    /// report and the session moves on.
    #[instrument(skip_all, fields(dumper = self.dumper.name()))]
    pub fn run(mut self) -> Result<BackupReport> {
        self.dumper
            .start_backup()
            .map_err(|err| DumpError::session_hook("start_backup", err))?;

        let dialogs = match self.provider.dialogs() {
            Ok(dialogs) => dialogs,
            Err(err) => {
                if let Err(cleanup) = self.dumper.end_backup() {
                    warn!(error = %cleanup, "end_backup failed after dialog enumeration error");
                }
                return Err(err);
            }
        };
        info!(dialogs = dialogs.len(), "backup started");

        let mut report = BackupReport::default();
        for dialog in &dialogs {
            let dialog_report = if self.cancel.is_cancelled() || !self.filter.includes(dialog) {
                debug!(dialog_id = %dialog.id, "skipping dialog");
                self.skipped(dialog)
            } else {
                self.backup_dialog(dialog)
            };

            if let Some(callback) = self.on_dialog.as_mut() {
                callback(&dialog_report);
            }
            report.dialogs.push(dialog_report);
        }

        self.dumper
            .end_backup()
            .map_err(|err| DumpError::session_hook("end_backup", err))?;

        info!(
            dumped = report.dumped(),
            completed = report.count("completed"),
            aborted = report.count("aborted"),
            failed = report.count("failed"),
            "backup finished"
        );
        Ok(report)
    }

    fn backup_dialog(&mut self, dialog: &Dialog) -> DialogReport {
        match self.try_backup_dialog(dialog) {
            Ok(export) => {
                let outcome = match export.state {
                    DialogState::Aborted => DialogOutcome::Aborted,
                    DialogState::Interrupted => DialogOutcome::Interrupted,
                    _ => DialogOutcome::Completed,
                };
                DialogReport {
                    dialog_id: dialog.id.clone(),
                    label: dialog.label().to_string(),
                    outcome,
                    dumped: export.dumped,
                    last_id: export.progress.last_id,
                }
            }
            Err(err) => {
                warn!(dialog_id = %dialog.id, error = %err, "dialog failed, keeping previous progress");
                let mut report = self.skipped(dialog);
                report.outcome = DialogOutcome::Failed(err.to_string());
                report
            }
        }
    }

    fn try_backup_dialog(&mut self, dialog: &Dialog) -> Result<DialogExport> {
        let progress = self.store.load(&dialog.id)?;
        let messages = self.provider.messages(dialog)?;
        let export = export_dialog(&mut *self.dumper, dialog, &progress, messages, &self.cancel)?;

        if export.state.is_persistable() {
            self.store.save(&dialog.id, &export.progress)?;
        }
        Ok(export)
    }

    fn skipped(&mut self, dialog: &Dialog) -> DialogReport {
        let last_id = self
            .store
            .load(&dialog.id)
            .ok()
            .and_then(|progress| progress.last_id);
        DialogReport {
            dialog_id: dialog.id.clone(),
            label: dialog.label().to_string(),
            outcome: DialogOutcome::Skipped,
            dumped: 0,
            last_id,
        }
    }
}

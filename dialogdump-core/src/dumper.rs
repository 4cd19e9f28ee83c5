//! The dumper contract.
//!
//! A single dumper instance is used for every dialog of a backup session.
//! Calls always arrive in this order:
//!
//! ```text
//! start_backup
//!   start_dialog -> (is_fresh -> dump_message)* -> end_dialog   (per dialog)
//! end_backup
//! ```
//!
//! Only [`Dumper::dump_message`] must be implemented; every other hook has a
//! no-op default.

use anyhow::Result;

use crate::model::{Dialog, Message};
use crate::progress::{CustomData, DumpProgress};

/// What the driver should do after a message was handed to the dumper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFlow {
    /// Keep offering older messages
    Continue,
    /// Stop this dialog early and move on to `end_dialog`. Not an error.
    Abort,
}

pub trait Dumper {
    /// Short name used in logs and reports
    fn name(&self) -> &str;

    /// Called once before the first dialog
    fn start_backup(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once per dialog before any of its messages are offered
    fn start_dialog(&mut self, _dialog: &Dialog, _progress: &DumpProgress) -> Result<()> {
        Ok(())
    }

    /// Decide whether `message` still needs to be exported.
    ///
    /// Overrides must stay monotonic within a run: once a message is judged
    /// stale, no older message of the same dialog may be judged fresh. The
    /// driver cannot detect violations; return `false` from
    /// [`Dumper::monotonic_freshness`] if the override is not monotonic.
    fn is_fresh(&self, message: &Message, progress: &DumpProgress) -> bool {
        progress.is_fresh(message.id)
    }

    /// Whether the driver may stop scanning a dialog at the first stale message
    fn monotonic_freshness(&self) -> bool {
        true
    }

    /// Export one message. Messages arrive newest first.
    ///
    /// The write is assumed durable once this returns `Ok`.
    fn dump_message(&mut self, dialog: &Dialog, message: &Message) -> Result<DumpFlow>;

    /// Called once after the last message offered for a dialog, including
    /// after an early abort. `Some` replaces the dialog's custom data.
    fn end_dialog(&mut self, _dialog: &Dialog) -> Result<Option<CustomData>> {
        Ok(None)
    }

    /// Called once after every dialog was attempted
    fn end_backup(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: Dumper + ?Sized> Dumper for Box<D> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start_backup(&mut self) -> Result<()> {
        (**self).start_backup()
    }

    fn start_dialog(&mut self, dialog: &Dialog, progress: &DumpProgress) -> Result<()> {
        (**self).start_dialog(dialog, progress)
    }

    fn is_fresh(&self, message: &Message, progress: &DumpProgress) -> bool {
        (**self).is_fresh(message, progress)
    }

    fn monotonic_freshness(&self) -> bool {
        (**self).monotonic_freshness()
    }

    fn dump_message(&mut self, dialog: &Dialog, message: &Message) -> Result<DumpFlow> {
        (**self).dump_message(dialog, message)
    }

    fn end_dialog(&mut self, dialog: &Dialog) -> Result<Option<CustomData>> {
        (**self).end_dialog(dialog)
    }

    fn end_backup(&mut self) -> Result<()> {
        (**self).end_backup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    impl Dumper for Minimal {
        fn name(&self) -> &str {
            "minimal"
        }

        fn dump_message(&mut self, _dialog: &Dialog, _message: &Message) -> Result<DumpFlow> {
            Ok(DumpFlow::Continue)
        }
    }

    #[test]
    fn defaults_are_no_ops_with_last_id_freshness() {
        let mut dumper = Minimal;
        let dialog = Dialog::new("d");
        let progress = DumpProgress::new(Some(3));

        dumper.start_backup().unwrap();
        dumper.start_dialog(&dialog, &progress).unwrap();
        assert!(dumper.is_fresh(&Message::new(4), &progress));
        assert!(!dumper.is_fresh(&Message::new(3), &progress));
        assert!(dumper.monotonic_freshness());
        assert!(dumper.end_dialog(&dialog).unwrap().is_none());
        dumper.end_backup().unwrap();
    }

    #[test]
    fn boxed_dumper_forwards_calls() {
        let mut boxed: Box<dyn Dumper> = Box::new(Minimal);
        assert_eq!(boxed.name(), "minimal");
        let flow = boxed
            .dump_message(&Dialog::new("d"), &Message::new(1))
            .unwrap();
        assert_eq!(flow, DumpFlow::Continue);
    }
}

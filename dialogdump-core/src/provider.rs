//! Dialog and message sources.
//!
//! A provider lists the dialogs of a session and streams each dialog's
//! messages newest to oldest. Streams are consumed once per dialog per session.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::PathBuf;

use serde_json::{Deserializer, Value};
use tracing::debug;

use crate::error::{DumpError, Result};
use crate::model::{Dialog, Message};

/// Lazy newest-to-oldest message sequence for one dialog
pub type MessageStream<'a> = Box<dyn Iterator<Item = Result<Message>> + 'a>;

pub trait DialogProvider {
    /// Every dialog of the session, in processing order
    fn dialogs(&mut self) -> Result<Vec<Dialog>>;

    /// Messages of `dialog`, newest first
    fn messages<'a>(&'a mut self, dialog: &Dialog) -> Result<MessageStream<'a>>;
}

/// Provider backed by in-memory dialogs. Messages may be given in any order;
/// they are served newest first.
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    dialogs: Vec<Dialog>,
    messages: BTreeMap<String, Vec<Message>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialog(mut self, dialog: Dialog, mut messages: Vec<Message>) -> Self {
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        self.messages.insert(dialog.id.clone(), messages);
        self.dialogs.push(dialog);
        self
    }

    /// Add messages to an existing dialog, as if they arrived between sessions
    pub fn push_messages(&mut self, dialog_id: &str, messages: impl IntoIterator<Item = Message>) {
        let list = self.messages.entry(dialog_id.to_string()).or_default();
        list.extend(messages);
        list.sort_by(|a, b| b.id.cmp(&a.id));
    }
}

impl DialogProvider for MemoryProvider {
    fn dialogs(&mut self) -> Result<Vec<Dialog>> {
        Ok(self.dialogs.clone())
    }

    fn messages<'a>(&'a mut self, dialog: &Dialog) -> Result<MessageStream<'a>> {
        let messages = self.messages.get(&dialog.id).cloned().unwrap_or_default();
        Ok(Box::new(messages.into_iter().map(Ok)))
    }
}

/// Provider reading a local archive directory:
///
/// ```text
/// <root>/dialogs.json                 JSON array of dialog objects
/// <root>/messages/<stem>.ndjson       one message per line, newest first
/// ```
///
/// A dialog without a message file is treated as empty.
#[derive(Debug, Clone)]
pub struct ArchiveProvider {
    root: PathBuf,
}

impl ArchiveProvider {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(DumpError::provider(format!(
                "archive directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    fn messages_path(&self, dialog_id: &str) -> PathBuf {
        self.root
            .join("messages")
            .join(format!("{}.ndjson", file_stem_for(dialog_id)))
    }
}

impl DialogProvider for ArchiveProvider {
    fn dialogs(&mut self) -> Result<Vec<Dialog>> {
        let path = self.root.join("dialogs.json");
        let file = File::open(&path).map_err(|err| {
            DumpError::provider(format!("failed to open {}: {err}", path.display()))
        })?;
        let values: Vec<Value> = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| DumpError::json(path.display().to_string(), err))?;

        let dialogs = values
            .into_iter()
            .map(Dialog::from_export)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = dialogs.len(), root = %self.root.display(), "listed archive dialogs");
        Ok(dialogs)
    }

    fn messages<'a>(&'a mut self, dialog: &Dialog) -> Result<MessageStream<'a>> {
        let path = self.messages_path(&dialog.id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(dialog_id = %dialog.id, "no message file, treating dialog as empty");
                return Ok(Box::new(std::iter::empty()));
            }
            Err(err) => return Err(err.into()),
        };

        let context = path.display().to_string();
        let stream = Deserializer::from_reader(BufReader::new(file))
            .into_iter::<Value>()
            .map(move |item| {
                item.map_err(|err| DumpError::json(context.clone(), err))
                    .and_then(Message::from_export)
            });
        Ok(Box::new(stream))
    }
}

/// Map a dialog id to a filesystem-safe file stem.
///
/// ASCII letters, digits, `-` and `.` are kept; every other byte, `_`
/// included, becomes `_XX` (uppercase hex), so distinct ids never share a stem.
pub fn file_stem_for(dialog_id: &str) -> String {
    let mut stem = String::with_capacity(dialog_id.len());
    for byte in dialog_id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' => stem.push(char::from(byte)),
            _ => stem.push_str(&format!("_{byte:02X}")),
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn collect_ids(stream: MessageStream<'_>) -> Vec<i64> {
        stream.map(|m| m.unwrap().id).collect()
    }

    #[test]
    fn memory_provider_serves_newest_first() {
        let mut provider = MemoryProvider::new().with_dialog(
            Dialog::new("a"),
            vec![Message::new(1), Message::new(3), Message::new(2)],
        );
        let dialogs = provider.dialogs().unwrap();
        assert_eq!(dialogs.len(), 1);
        assert_eq!(collect_ids(provider.messages(&dialogs[0]).unwrap()), vec![3, 2, 1]);

        provider.push_messages("a", [Message::new(4)]);
        assert_eq!(
            collect_ids(provider.messages(&dialogs[0]).unwrap()),
            vec![4, 3, 2, 1]
        );
    }

    #[test]
    fn archive_provider_reads_dialogs_and_streams_messages() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("dialogs.json"),
            r#"[{"id": "user#1", "name": "Alice"}, {"id": 2, "title": "Team"}]"#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("messages")).unwrap();
        fs::write(
            dir.path().join("messages").join("user_1.ndjson"),
            "{\"id\": 3, \"text\": \"c\"}\n\n{\"id\": 2}\n{\"id\": 1}\n",
        )
        .unwrap();

        let mut provider = ArchiveProvider::open(dir.path()).unwrap();
        let dialogs = provider.dialogs().unwrap();
        assert_eq!(dialogs[0].id, "user#1");
        assert_eq!(dialogs[1].label(), "Team");

        assert_eq!(collect_ids(provider.messages(&dialogs[0]).unwrap()), vec![3, 2, 1]);
        assert!(collect_ids(provider.messages(&dialogs[1]).unwrap()).is_empty());
    }

    #[test]
    fn archive_provider_surfaces_malformed_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dialogs.json"), r#"[{"id": "x"}]"#).unwrap();
        fs::create_dir_all(dir.path().join("messages")).unwrap();
        fs::write(dir.path().join("messages").join("x.ndjson"), "{\"id\": 2}\n{\"text\": 1}\n").unwrap();

        let mut provider = ArchiveProvider::open(dir.path()).unwrap();
        let dialog = Dialog::new("x");
        let results: Vec<_> = provider.messages(&dialog).unwrap().collect();
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn missing_archive_is_provider_error() {
        let err = ArchiveProvider::open("/definitely/not/here").unwrap_err();
        assert!(matches!(err, DumpError::Provider { .. }));
    }

    #[test]
    fn file_stems_are_filesystem_safe() {
        assert_eq!(file_stem_for("chat#12/x"), "chat_2312_2Fx");
        assert_eq!(file_stem_for("plain-id.2"), "plain-id.2");
        assert_eq!(file_stem_for("user_1"), "user_5F1");
        assert_eq!(file_stem_for("é"), "_C3_A9");
    }

    #[test]
    fn distinct_ids_get_distinct_stems() {
        let ids = ["a#1", "a/1", "a_1", "a_231", "a_5F1", "a 1"];
        let stems: std::collections::HashSet<_> = ids.iter().map(|id| file_stem_for(id)).collect();
        assert_eq!(stems.len(), ids.len());
    }
}

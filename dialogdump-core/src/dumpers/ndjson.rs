use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::DumperContext;
use crate::config::DumperOptions;
use crate::dumper::{DumpFlow, Dumper};
use crate::model::{Dialog, Message};
use crate::progress::{CustomData, DumpProgress};
use crate::provider::file_stem_for;

const OPTIONS: &[&str] = &["output_dir", "max_messages"];

/// One line per exported message
#[derive(Debug, Serialize)]
struct MessageRecord<'a> {
    dialog_id: &'a str,
    id: i64,
    date: Option<String>,
    from: Option<&'a str>,
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "is_null")]
    raw: &'a Value,
}

fn is_null(value: &&Value) -> bool {
    value.is_null()
}

impl<'a> MessageRecord<'a> {
    fn new(dialog: &'a Dialog, message: &'a Message) -> Self {
        Self {
            dialog_id: &dialog.id,
            id: message.id,
            date: message.date.map(|d| d.to_rfc3339()),
            from: message.from.as_deref(),
            text: message.text.as_deref(),
            raw: &message.raw,
        }
    }
}

pub struct NdjsonWriter<W: Write> {
    writer: BufWriter<W>,
}

impl NdjsonWriter<File> {
    /// Open `path` for appending, creating it if needed
    pub fn append(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> NdjsonWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }

    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

struct OpenDialog {
    file_name: String,
    writer: NdjsonWriter<File>,
    previous_total: u64,
    dumped: u64,
}

/// Appends each dialog's messages to `<output_dir>/<dialog>.ndjson`.
///
/// Options:
/// - `output_dir`: defaults to `<backup_dir>/ndjson`
/// - `max_messages`: stop a dialog after this many messages per run
pub struct NdjsonDumper {
    output_dir: PathBuf,
    max_messages: Option<usize>,
    current: Option<OpenDialog>,
}

impl NdjsonDumper {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_messages: None,
            current: None,
        }
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    pub fn from_options(
        options: &DumperOptions,
        ctx: &DumperContext,
    ) -> crate::error::Result<Self> {
        options.ensure_known("ndjson", OPTIONS)?;
        let output_dir = options
            .get_path("output_dir")?
            .unwrap_or_else(|| ctx.backup_dir.join("ndjson"));
        Ok(Self {
            output_dir,
            max_messages: options.get_usize("max_messages")?,
            current: None,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Dumper for NdjsonDumper {
    fn name(&self) -> &str {
        "ndjson"
    }

    fn start_backup(&mut self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))
    }

    fn start_dialog(&mut self, dialog: &Dialog, progress: &DumpProgress) -> Result<()> {
        let file_name = format!("{}.ndjson", file_stem_for(&dialog.id));
        let path = self.output_dir.join(&file_name);
        let writer = NdjsonWriter::append(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let previous_total = progress
            .custom("total_dumped")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        self.current = Some(OpenDialog {
            file_name,
            writer,
            previous_total,
            dumped: 0,
        });
        Ok(())
    }

    fn dump_message(&mut self, dialog: &Dialog, message: &Message) -> Result<DumpFlow> {
        let open = self
            .current
            .as_mut()
            .context("dump_message called outside of a dialog")?;

        if let Some(max) = self.max_messages {
            if open.dumped >= max as u64 {
                debug!(dialog_id = %dialog.id, max, "message limit reached");
                return Ok(DumpFlow::Abort);
            }
        }

        open.writer
            .write_record(&MessageRecord::new(dialog, message))
            .with_context(|| format!("failed to write message {}", message.id))?;
        open.dumped += 1;
        Ok(DumpFlow::Continue)
    }

    fn end_dialog(&mut self, _dialog: &Dialog) -> Result<Option<CustomData>> {
        let Some(open) = self.current.take() else {
            return Ok(None);
        };
        let data = json!({
            "file": open.file_name,
            "total_dumped": open.previous_total + open.dumped,
        });
        Ok(data.as_object().cloned())
    }
}

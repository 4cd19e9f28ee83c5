use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::DumperContext;
use crate::config::DumperOptions;
use crate::dumper::{DumpFlow, Dumper};
use crate::error::DumpError;
use crate::model::{Dialog, Message};
use crate::progress::{CustomData, DumpProgress};
use crate::provider::file_stem_for;

const OPTIONS: &[&str] = &["output_dir", "timestamp_format"];
const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Lines that would be read as a heading or separator inside a transcript
static BLOCK_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^(#{1,6}\s|---\s*$)").expect("valid regex"));

struct OpenTranscript {
    file_name: String,
    writer: BufWriter<File>,
    previous_total: u64,
    dumped: u64,
}

/// Appends each dialog to `<output_dir>/<dialog>.md`.
///
/// Every run that exports something adds a section headed with the run time;
/// within a section messages are listed newest first.
///
/// Options:
/// - `output_dir`: defaults to `<backup_dir>/markdown`
/// - `timestamp_format`: chrono format for message dates
pub struct MarkdownDumper {
    output_dir: PathBuf,
    timestamp_format: String,
    current: Option<OpenTranscript>,
}

impl MarkdownDumper {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            current: None,
        }
    }

    pub fn from_options(
        options: &DumperOptions,
        ctx: &DumperContext,
    ) -> crate::error::Result<Self> {
        options.ensure_known("markdown", OPTIONS)?;
        let output_dir = options
            .get_path("output_dir")?
            .unwrap_or_else(|| ctx.backup_dir.join("markdown"));
        let timestamp_format = options
            .get_str("timestamp_format")?
            .unwrap_or(DEFAULT_TIMESTAMP_FORMAT)
            .to_string();
        validate_timestamp_format(&timestamp_format)?;
        Ok(Self {
            output_dir,
            timestamp_format,
            current: None,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn render(&self, message: &Message) -> Result<String> {
        let mut block = String::new();
        let who = message.from.as_deref().unwrap_or("unknown");
        write!(block, "**{who}** · #{}", message.id)?;
        if let Some(date) = message.date {
            write!(block, " · *{}*", date.format(&self.timestamp_format)).with_context(|| {
                format!("invalid timestamp_format '{}'", self.timestamp_format)
            })?;
        }
        block.push_str("\n\n");

        match message.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                block.push_str(&BLOCK_MARKER_RE.replace_all(text, "\\$1"));
                block.push_str("\n\n");
            }
            _ => block.push_str("*(no text)*\n\n"),
        }
        Ok(block)
    }
}

fn validate_timestamp_format(format: &str) -> crate::error::Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(DumpError::config(format!(
            "option 'timestamp_format' is not a valid strftime pattern: '{format}'"
        )));
    }
    Ok(())
}

impl Dumper for MarkdownDumper {
    fn name(&self) -> &str {
        "markdown"
    }

    fn start_backup(&mut self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))
    }

    fn start_dialog(&mut self, dialog: &Dialog, progress: &DumpProgress) -> Result<()> {
        let file_name = format!("{}.md", file_stem_for(&dialog.id));
        let path = self.output_dir.join(&file_name);
        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        if is_new {
            writeln!(writer, "# {}\n", dialog.label())?;
            writer.flush()?;
        }

        self.current = Some(OpenTranscript {
            file_name,
            writer,
            previous_total: progress
                .custom("total_dumped")
                .and_then(Value::as_u64)
                .unwrap_or(0),
            dumped: 0,
        });
        Ok(())
    }

    fn dump_message(&mut self, _dialog: &Dialog, message: &Message) -> Result<DumpFlow> {
        let block = self.render(message)?;
        let open = self
            .current
            .as_mut()
            .context("dump_message called outside of a dialog")?;

        if open.dumped == 0 {
            writeln!(
                open.writer,
                "## Export {}\n",
                Utc::now().format(DEFAULT_TIMESTAMP_FORMAT)
            )?;
        }
        open.writer.write_all(block.as_bytes())?;
        open.writer.flush()?;
        open.dumped += 1;
        Ok(DumpFlow::Continue)
    }

    fn end_dialog(&mut self, _dialog: &Dialog) -> Result<Option<CustomData>> {
        let Some(mut open) = self.current.take() else {
            return Ok(None);
        };
        open.writer.flush()?;
        let data = json!({
            "file": open.file_name,
            "total_dumped": open.previous_total + open.dumped,
        });
        Ok(data.as_object().cloned())
    }
}

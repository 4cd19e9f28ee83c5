//! Built-in dumpers and the name → constructor registry.

pub mod markdown;
pub mod ndjson;

use std::path::PathBuf;

use crate::config::DumperOptions;
use crate::dumper::Dumper;
use crate::error::{DumpError, Result};

pub use markdown::MarkdownDumper;
pub use ndjson::NdjsonDumper;

/// Session-wide values a dumper may need at construction
#[derive(Debug, Clone)]
pub struct DumperContext {
    pub backup_dir: PathBuf,
}

struct Entry {
    name: &'static str,
    about: &'static str,
    build: fn(&DumperOptions, &DumperContext) -> Result<Box<dyn Dumper>>,
}

const REGISTRY: &[Entry] = &[
    Entry {
        name: "ndjson",
        about: "one NDJSON file per dialog, newest messages first",
        build: build_ndjson,
    },
    Entry {
        name: "markdown",
        about: "one Markdown transcript per dialog",
        build: build_markdown,
    },
];

fn build_ndjson(options: &DumperOptions, ctx: &DumperContext) -> Result<Box<dyn Dumper>> {
    Ok(Box::new(NdjsonDumper::from_options(options, ctx)?))
}

fn build_markdown(options: &DumperOptions, ctx: &DumperContext) -> Result<Box<dyn Dumper>> {
    Ok(Box::new(MarkdownDumper::from_options(options, ctx)?))
}

/// Names and descriptions of every built-in dumper
pub fn available_dumpers() -> impl Iterator<Item = (&'static str, &'static str)> {
    REGISTRY.iter().map(|entry| (entry.name, entry.about))
}

/// Construct the dumper called `name`. Unknown names and unrecognized
/// options are configuration errors.
pub fn build_dumper(
    name: &str,
    options: &DumperOptions,
    ctx: &DumperContext,
) -> Result<Box<dyn Dumper>> {
    let entry = REGISTRY
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| {
            let known: Vec<_> = available_dumpers().map(|(name, _)| name).collect();
            DumpError::config(format!(
                "unknown dumper '{name}' (available: {})",
                known.join(", ")
            ))
        })?;
    (entry.build)(options, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builds_registered_dumpers() {
        let dir = TempDir::new().unwrap();
        let ctx = DumperContext {
            backup_dir: dir.path().to_path_buf(),
        };
        for (name, _) in available_dumpers() {
            let dumper = build_dumper(name, &DumperOptions::new(), &ctx).unwrap();
            assert_eq!(dumper.name(), name);
        }
    }

    #[test]
    fn unknown_dumper_is_config_error() {
        let ctx = DumperContext {
            backup_dir: PathBuf::from("/tmp"),
        };
        let err = build_dumper("csv", &DumperOptions::new(), &ctx).err().unwrap();
        assert!(err.is_config());
        assert!(err.to_string().contains("ndjson"));
    }

    #[test]
    fn unknown_option_is_config_error() {
        let ctx = DumperContext {
            backup_dir: PathBuf::from("/tmp"),
        };
        let options = DumperOptions::new().with("colour", "red");
        let err = build_dumper("ndjson", &options, &ctx).err().unwrap();
        assert!(err.is_config());
    }
}

use std::process::ExitCode;

use anyhow::anyhow;
use dialogdump_core::{
    build_dumper, ArchiveProvider, BackupReport, BackupSession, CancelFlag, DialogFilter,
    DialogOutcome, Dumper, DumperContext, DumperOptions, JsonProgressStore,
};
use tracing::{info, warn};

use crate::error::AppError;
use crate::{ui, BackupArgs, GlobalOpts};

const EXIT_FAILED_DIALOGS: u8 = 4;
const EXIT_INTERRUPTED: u8 = 130;

pub async fn run(global: &GlobalOpts, args: BackupArgs) -> Result<ExitCode, AppError> {
    let mut config = super::load_config(global)?;

    if let Some(archive) = args.archive {
        config.archive = Some(archive);
    }
    if let Some(name) = args.dumper {
        config.dumper.name = Some(name);
    }
    for raw in &args.options {
        apply_option(&mut config.dumper.options, raw)?;
    }
    if !args.only.is_empty() {
        config.filter.include = args.only;
    }
    config.filter.exclude.extend(args.exclude);

    let archive = config.archive.clone().ok_or_else(|| {
        AppError::config(anyhow!(
            "no archive configured (pass --archive or set `archive` in the config file)"
        ))
    })?;
    let filter = config.dialog_filter().map_err(AppError::from_dump)?;

    let ctx = DumperContext {
        backup_dir: config.backup_dir.clone(),
    };
    let mut dumper = build_dumper(config.dumper.name(), &config.dumper.options, &ctx)
        .map_err(AppError::from_dump)?;
    let mut provider = ArchiveProvider::open(&archive).map_err(AppError::from_dump)?;
    let mut store = JsonProgressStore::open(&config.backup_dir).map_err(AppError::from_dump)?;
    store.acquire_lock().map_err(AppError::from_dump)?;

    info!(
        archive = %archive.display(),
        backup_dir = %config.backup_dir.display(),
        dumper = config.dumper.name(),
        "starting backup"
    );

    let cancel = CancelFlag::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current dialog");
            on_signal.cancel();
        }
    });

    let report = run_session(&mut provider, &mut store, &mut dumper, filter, cancel.clone())?;
    print_summary(&report);

    if cancel.is_cancelled() {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    if report.has_failures() {
        return Ok(ExitCode::from(EXIT_FAILED_DIALOGS));
    }
    Ok(ExitCode::SUCCESS)
}

fn run_session(
    provider: &mut ArchiveProvider,
    store: &mut JsonProgressStore,
    dumper: &mut Box<dyn Dumper>,
    filter: DialogFilter,
    cancel: CancelFlag,
) -> Result<BackupReport, AppError> {
    let pb = ui::spinner("Backing up dialogs...");

    let result = BackupSession::new(provider, store, dumper)
        .with_filter(filter)
        .with_cancel(cancel)
        .on_dialog(|report| {
            if let Some(pb) = &pb {
                pb.set_message(format!(
                    "{} {} ({} new)",
                    report.outcome.as_str(),
                    report.label,
                    report.dumped
                ));
            }
        })
        .run();

    match result {
        Ok(report) => {
            ui::finish_success(
                pb,
                format!(
                    "Backed up {} messages from {} dialogs",
                    report.dumped(),
                    report.dialogs.len()
                ),
            );
            Ok(report)
        }
        Err(err) => {
            ui::finish_error(pb, "Backup failed");
            Err(AppError::from_dump(err))
        }
    }
}

fn print_summary(report: &BackupReport) {
    println!(
        "{} messages exported: {} completed, {} aborted, {} interrupted, {} skipped, {} failed",
        report.dumped(),
        report.count("completed"),
        report.count("aborted"),
        report.count("interrupted"),
        report.count("skipped"),
        report.count("failed"),
    );
    for failed in report.failures() {
        if let DialogOutcome::Failed(reason) = &failed.outcome {
            eprintln!("  failed: {} ({reason})", failed.label);
        }
    }
}

/// Parse `key=value`, typing the value as integer, then bool, then string
fn apply_option(options: &mut DumperOptions, raw: &str) -> Result<(), AppError> {
    let (key, value) = raw
        .split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .ok_or_else(|| {
            AppError::config(anyhow!("invalid dumper option '{raw}' (expected KEY=VALUE)"))
        })?;
    let key = key.trim();
    let value = value.trim();

    if let Ok(number) = value.parse::<i64>() {
        options.set(key, number);
    } else if let Ok(flag) = value.parse::<bool>() {
        options.set(key, flag);
    } else {
        options.set(key, value);
    }
    Ok(())
}

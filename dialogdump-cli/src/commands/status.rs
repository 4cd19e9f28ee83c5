use std::process::ExitCode;

use anyhow::anyhow;
use dialogdump_core::JsonProgressStore;
use serde_json::json;

use crate::error::AppError;
use crate::{GlobalOpts, ResetArgs, StatusArgs};

pub fn run_status(global: &GlobalOpts, args: StatusArgs) -> Result<ExitCode, AppError> {
    let config = super::load_config(global)?;
    let store = JsonProgressStore::open(&config.backup_dir).map_err(AppError::from_dump)?;
    let records = store.list().map_err(AppError::from_dump)?;

    if args.json {
        let rows: Vec<_> = records
            .iter()
            .map(|(dialog_id, progress)| {
                json!({
                    "dialog_id": dialog_id,
                    "last_id": progress.last_id,
                    "custom_data": progress.custom_data,
                })
            })
            .collect();
        let text = serde_json::to_string_pretty(&rows).map_err(AppError::io)?;
        println!("{text}");
        return Ok(ExitCode::SUCCESS);
    }

    if records.is_empty() {
        println!("No progress recorded in {}", store.dir().display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{:<32} {:>12} {:>8}", "DIALOG", "LAST ID", "TOTAL");
    for (dialog_id, progress) in &records {
        let last_id = progress
            .last_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let total = progress
            .custom("total_dumped")
            .map_or_else(|| "-".to_string(), |value| value.to_string());
        println!("{dialog_id:<32} {last_id:>12} {total:>8}");
    }
    Ok(ExitCode::SUCCESS)
}

pub fn run_reset(global: &GlobalOpts, args: ResetArgs) -> Result<ExitCode, AppError> {
    let config = super::load_config(global)?;
    let mut store = JsonProgressStore::open(&config.backup_dir).map_err(AppError::from_dump)?;
    store.acquire_lock().map_err(AppError::from_dump)?;

    let removed = store.remove(&args.dialog_id).map_err(AppError::from_dump)?;
    if !removed {
        return Err(AppError::input(anyhow!(
            "no progress recorded for dialog '{}'",
            args.dialog_id
        )));
    }
    println!("Reset progress for dialog '{}'", args.dialog_id);
    Ok(ExitCode::SUCCESS)
}

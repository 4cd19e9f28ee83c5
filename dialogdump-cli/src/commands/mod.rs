//! Command implementations for the dialogdump CLI

pub mod backup;
pub mod status;

use dialogdump_core::{available_dumpers, BackupConfig};

use crate::error::AppError;
use crate::GlobalOpts;

/// Load the config file and apply global CLI overrides
pub(crate) fn load_config(global: &GlobalOpts) -> Result<BackupConfig, AppError> {
    let mut config = BackupConfig::load(global.config.as_deref()).map_err(AppError::from_dump)?;
    if let Some(dir) = &global.backup_dir {
        config.backup_dir = dir.clone();
    }
    Ok(config)
}

pub fn list_dumpers() {
    for (name, about) in available_dumpers() {
        println!("{name:<10} {about}");
    }
}

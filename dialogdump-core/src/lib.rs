pub mod config;
pub mod driver;
pub mod dumper;
pub mod dumpers;
pub mod error;
pub mod filter;
pub mod model;
pub mod progress;
pub mod provider;
pub mod session;
pub mod store;

pub use config::{BackupConfig, DumperConfig, DumperOptions, FilterConfig};
pub use driver::{export_dialog, CancelFlag, DialogExport, DialogState};
pub use dumper::{DumpFlow, Dumper};
pub use dumpers::{available_dumpers, build_dumper, DumperContext};
pub use error::{DumpError, Result};
pub use filter::DialogFilter;
pub use model::{Dialog, Message};
pub use progress::{CustomData, DumpProgress};
pub use provider::{ArchiveProvider, DialogProvider, MemoryProvider, MessageStream};
pub use session::{BackupReport, BackupSession, DialogOutcome, DialogReport};
pub use store::{JsonProgressStore, MemoryProgressStore, ProgressStore};

use std::fmt;
use std::process::ExitCode;

use dialogdump_core::DumpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Io,
    Config,
    Session,
}

/// Top-level CLI error: an `anyhow` chain tagged with the exit code family
#[derive(Debug)]
pub struct AppError {
    pub(crate) kind: ErrorKind,
    pub(crate) source: anyhow::Error,
}

impl AppError {
    pub fn new(kind: ErrorKind, source: anyhow::Error) -> Self {
        Self { kind, source }
    }

    pub fn input<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::new(ErrorKind::Input, err.into())
    }

    pub fn io<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::new(ErrorKind::Io, err.into())
    }

    pub fn config<E: Into<anyhow::Error>>(err: E) -> Self {
        Self::new(ErrorKind::Config, err.into())
    }

    /// Classify a core error by the exit code family it belongs to
    pub fn from_dump(err: DumpError) -> Self {
        let kind = match &err {
            DumpError::Config { .. } => ErrorKind::Config,
            DumpError::Provider { .. } | DumpError::Json { .. } | DumpError::Ordering { .. } => {
                ErrorKind::Input
            }
            DumpError::Io { .. } | DumpError::Store { .. } => ErrorKind::Io,
            DumpError::Dumper { .. } => ErrorKind::Session,
        };
        Self::new(kind, err.into())
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.kind {
            ErrorKind::Input => ExitCode::from(1),
            ErrorKind::Io => ExitCode::from(2),
            ErrorKind::Config => ExitCode::from(3),
            ErrorKind::Session => ExitCode::from(4),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_code_families() {
        let err = AppError::from_dump(DumpError::config("bad"));
        assert_eq!(err.kind, ErrorKind::Config);
        assert_eq!(err.exit_code(), ExitCode::from(3));

        let err = AppError::from_dump(DumpError::provider("gone"));
        assert_eq!(err.exit_code(), ExitCode::from(1));

        let err = AppError::from_dump(DumpError::store("/tmp/x", "disk full"));
        assert_eq!(err.exit_code(), ExitCode::from(2));

        let err = AppError::from_dump(DumpError::session_hook(
            "start_backup",
            anyhow::anyhow!("boom"),
        ));
        assert_eq!(err.kind, ErrorKind::Session);
    }
}

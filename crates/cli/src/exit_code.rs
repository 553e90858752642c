// Consistent exit codes for the tripline CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/validation error
//   10 = backend or push channel unreachable
//   11 = access denied
//   12 = day or comment not found
//   13 = invalid configuration

use std::process;

use tripline_sync::{ConfigError, ErrorCode, SyncError};

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Unavailable = 10,
    AccessDenied = 11,
    NotFound = 12,
    Config = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(sync_err) = cause.downcast_ref::<SyncError>() {
                return Self::from_sync_code(sync_err.code());
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::Config;
            }
        }
        Self::Error
    }

    pub fn from_sync_code(code: ErrorCode) -> Self {
        match code {
            ErrorCode::AccessDenied => Self::AccessDenied,
            ErrorCode::ResourceNotFound => Self::NotFound,
            ErrorCode::TransportUnavailable => Self::Unavailable,
            ErrorCode::ValidationError => Self::Usage,
            ErrorCode::Unknown => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

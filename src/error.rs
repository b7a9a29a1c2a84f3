//! Error kinds for the bridge, with propagation rules that vary by kind:
//! usage errors exit before any resource exists, device errors are fatal,
//! socket errors degrade gracefully on the comm path, protocol errors are
//! logged and swallowed by their caller.

use thiserror::Error;

/// The small, typed error hierarchy this crate propagates out of its
/// fallible operations. `Usage` always terminates the process before any
/// resource exists; `Device` is fatal once raised; `Socket` degrades
/// gracefully on the comm path but is fatal on the listener; `Protocol`
/// is always logged and swallowed by its caller.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("usage: {0}")]
    Usage(String),

    #[error("device error: {0}")]
    Device(String),

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<nix::Error> for AppError {
    fn from(err: nix::Error) -> Self {
        AppError::Device(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

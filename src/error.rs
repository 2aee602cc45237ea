use std::io;
use thiserror::Error;

/// Base of the numeric error-code space reserved for conditions that have no
/// classic errno equivalent. Matches the wrapped protocol family's numbering
/// so errno-style callers stay interoperable.
pub const HAUSNUMERO: i32 = 156_384_712;

/// Operation cannot be performed in the socket's current pattern state.
pub const EFSM: i32 = HAUSNUMERO + 51;
/// Peer socket pattern is not compatible with this socket.
pub const ENOCOMPATPROTO: i32 = HAUSNUMERO + 52;
/// The owning context has been terminated.
pub const ETERM: i32 = HAUSNUMERO + 53;

#[derive(Error, Debug)]
#[non_exhaustive] // Allows adding more variants later without breaking change
pub enum ZmxError {
  // --- I/O Errors ---
  #[error("I/O error: {0}")]
  Io(#[from] io::Error),

  #[error("Invalid argument provided: {0}")]
  InvalidArgument(String),

  // --- Non-blocking / Timeouts ---
  /// The operation would have to wait and the caller asked not to. A normal
  /// outcome of non-blocking calls, never an error condition of the engine.
  #[error("Operation would block")]
  WouldBlock,
  #[error("Operation timed out")]
  Timeout,

  // --- Connection/Binding Errors ---
  #[error("Address already in use: {0}")]
  AddrInUse(String),
  #[error("Connection closed by peer")]
  ConnectionClosed,

  // --- Endpoint Errors ---
  #[error("Invalid endpoint format: {0}")]
  InvalidEndpoint(String),
  #[error("Transport scheme not supported: {0}")]
  UnsupportedTransport(String),

  // --- Option Errors ---
  #[error("Invalid socket option ID: {0}")]
  InvalidOption(i32),
  #[error("Invalid value provided for option ID {0}")]
  InvalidOptionValue(i32),
  #[error("Socket option not supported on this socket type: {0}")]
  UnsupportedOption(i32),

  // --- State Errors ---
  #[error("Operation is invalid for the socket type ({0})")]
  InvalidSocketType(&'static str),
  #[error("Operation is invalid for the current socket state: {0}")]
  InvalidState(&'static str),
  #[error("Socket pattern is not compatible with peer: {0}")]
  IncompatiblePeer(&'static str),

  // --- Lifecycle Errors ---
  /// Context creation or termination failed. Carries the originating
  /// operation, its numeric result code and the underlying detail.
  #[error("Context operation '{op}' failed with code {code}: {message}")]
  Context {
    op: &'static str,
    code: i32,
    message: String,
  },
  /// Message init/copy/move failure.
  #[error("Message operation failed: {0}")]
  Message(&'static str),
  /// Operation attempted on an already-closed object. Deterministic
  /// replacement for behavior the finalizer-era API left undefined.
  #[error("Use of closed {0}")]
  UseAfterClose(&'static str),
  #[error("The owning context was terminated")]
  ContextTerminated,

  // --- Resource Limits ---
  #[error("Resource limit reached (e.g., MAX_SOCKETS)")]
  ResourceLimitReached,

  // --- Internal Errors ---
  #[error("Internal library error: {0}")]
  Internal(String),
}

impl ZmxError {
  /// Maps the error onto the classic numeric code space (spec-compatible
  /// errno values). Callers that branch on codes rather than variants use
  /// this together with `to_string()` as the last-error code/string pair.
  pub fn errno(&self) -> i32 {
    match self {
      ZmxError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
      ZmxError::InvalidArgument(_) => libc::EINVAL,
      ZmxError::WouldBlock => libc::EAGAIN,
      ZmxError::Timeout => libc::ETIMEDOUT,
      ZmxError::AddrInUse(_) => libc::EADDRINUSE,
      ZmxError::ConnectionClosed => libc::EPIPE,
      ZmxError::InvalidEndpoint(_) => libc::EINVAL,
      ZmxError::UnsupportedTransport(_) => libc::EPROTONOSUPPORT,
      ZmxError::InvalidOption(_) => libc::EINVAL,
      ZmxError::InvalidOptionValue(_) => libc::EINVAL,
      ZmxError::UnsupportedOption(_) => libc::ENOTSUP,
      ZmxError::InvalidSocketType(_) => libc::ENOTSUP,
      ZmxError::InvalidState(_) => EFSM,
      ZmxError::IncompatiblePeer(_) => ENOCOMPATPROTO,
      ZmxError::Context { code, .. } => *code,
      ZmxError::Message(_) => libc::EFAULT,
      ZmxError::UseAfterClose(_) => libc::ENOTSOCK,
      ZmxError::ContextTerminated => ETERM,
      ZmxError::ResourceLimitReached => libc::EMFILE,
      ZmxError::Internal(_) => libc::EFAULT,
    }
  }

  /// True for the would-block condition of a non-blocking call.
  pub fn is_would_block(&self) -> bool {
    matches!(self, ZmxError::WouldBlock)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn errno_mapping_covers_flow_control_codes() {
    assert_eq!(ZmxError::WouldBlock.errno(), libc::EAGAIN);
    assert_eq!(ZmxError::ContextTerminated.errno(), ETERM);
    assert_eq!(ZmxError::InvalidState("send in recv phase").errno(), EFSM);
    assert_eq!(ZmxError::UseAfterClose("socket").errno(), libc::ENOTSOCK);
  }

  #[test]
  fn would_block_is_detectable() {
    assert!(ZmxError::WouldBlock.is_would_block());
    assert!(!ZmxError::Timeout.is_would_block());
  }
}

//! zmx - A synchronous, pure-Rust message-queue socket engine.
//!
//! Contexts own sockets; sockets exchange frame-oriented messages over
//! bounded in-process pipes according to their pattern (PUSH/PULL, PUB/SUB,
//! REQ/REP, DEALER/ROUTER, ...); a `Poller` multiplexes readiness across
//! many sockets and raw descriptors. The OS-level transport underneath the
//! pipes is an external concern: this crate implements the engine that sits
//! on top of it.

pub mod context;
pub mod error;
pub mod message;
pub mod poller;
pub mod socket;
pub mod transport;

// Re-export core types for user convenience
pub use context::Context;
pub use error::ZmxError;
pub use message::{Blob, Msg, MsgFlags};
pub use poller::{PollEvents, PollTarget, Poller};
pub use socket::options::{OptionKind, OptionValue};
pub use socket::types::{RecvFlags, SendFlags, Socket, SocketType};

// --- Top-Level Functions ---

const VERSION_MAJOR: i32 = 0;
const VERSION_MINOR: i32 = 1;
const VERSION_PATCH: i32 = 0;

/// Returns the library version as a tuple (major, minor, patch).
pub fn version() -> (i32, i32, i32) {
  (VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}

/// Returns the major version number of the library.
pub fn version_major() -> i32 {
  VERSION_MAJOR
}

/// Returns the minor version number of the library.
pub fn version_minor() -> i32 {
  VERSION_MINOR
}

/// Returns the patch version number of the library.
pub fn version_patch() -> i32 {
  VERSION_PATCH
}

/// Creates a new library context.
pub fn context() -> Result<Context, ZmxError> {
  Context::new()
}

// src/context.rs

use crate::error::ZmxError;
use crate::socket::core::SocketCore;
use crate::socket::types::{Socket, SocketType};
use crate::transport::{parse_endpoint, pipe_pair};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Context option: size of the I/O thread pool handed to the transport layer.
pub const IO_THREADS: i32 = 1;
/// Context option: maximum number of concurrently live sockets.
pub const MAX_SOCKETS: i32 = 2;

const DEFAULT_IO_THREADS: i32 = 1;
const DEFAULT_MAX_SOCKETS: i32 = 1023;

#[derive(Debug, Clone, Copy)]
struct CtxOptions {
  io_threads: i32,
  max_sockets: i32,
}

/// A socket that has bound an endpoint name.
struct EndpointBinding {
  handle: usize,
  core: Weak<SocketCore>,
}

/// A connect issued before its endpoint was bound; drained on bind.
struct PendingConnect {
  endpoint: String,
  handle: usize,
  core: Weak<SocketCore>,
}

/// Holds the internal state shared by all Context handles.
///
/// Sockets are tracked weakly: the context does not own their lifetime, but
/// termination must be able to reach every live one.
pub(crate) struct ContextInner {
  /// Next available unique handle ID for sockets and pipes.
  next_handle: AtomicUsize,
  sockets: Mutex<HashMap<usize, Weak<SocketCore>>>,
  /// Registry for endpoint matchmaking. Key is the full endpoint string.
  endpoints: Mutex<HashMap<String, EndpointBinding>>,
  pending_connects: Mutex<Vec<PendingConnect>>,
  options: Mutex<CtxOptions>,
  /// Once set, context options are frozen.
  socket_created: AtomicBool,
  terminated: AtomicBool,
}

impl ContextInner {
  fn new(io_threads: i32, max_sockets: i32) -> Self {
    Self {
      next_handle: AtomicUsize::new(1),
      sockets: Mutex::new(HashMap::new()),
      endpoints: Mutex::new(HashMap::new()),
      pending_connects: Mutex::new(Vec::new()),
      options: Mutex::new(CtxOptions { io_threads, max_sockets }),
      socket_created: AtomicBool::new(false),
      terminated: AtomicBool::new(false),
    }
  }

  /// Generates the next unique handle ID.
  pub(crate) fn next_handle(&self) -> usize {
    // Relaxed ordering is sufficient for a simple counter
    self.next_handle.fetch_add(1, Ordering::Relaxed)
  }

  pub(crate) fn is_terminated(&self) -> bool {
    self.terminated.load(Ordering::Acquire)
  }

  fn register_socket(&self, handle: usize, core: Weak<SocketCore>) {
    self.sockets.lock().insert(handle, core);
    tracing::debug!(socket_handle = handle, "Socket registered");
  }

  /// Unregisters a socket and drops whatever endpoint state it owned.
  pub(crate) fn unregister_socket(&self, handle: usize) {
    self.sockets.lock().remove(&handle);
    self.endpoints.lock().retain(|_, binding| binding.handle != handle);
    self.pending_connects.lock().retain(|pending| pending.handle != handle);
    tracing::debug!(socket_handle = handle, "Socket unregistered");
  }

  fn live_socket_count(&self) -> usize {
    let mut sockets = self.sockets.lock();
    sockets.retain(|_, weak| weak.upgrade().is_some());
    sockets.len()
  }

  // --- Endpoint matchmaking ---

  pub(crate) fn bind_endpoint(&self, endpoint: &str, core: &Arc<SocketCore>) -> Result<(), ZmxError> {
    if self.is_terminated() {
      return Err(ZmxError::ContextTerminated);
    }
    let key = parse_endpoint(endpoint)?.as_str().to_string();

    {
      let mut endpoints = self.endpoints.lock();
      if let Some(existing) = endpoints.get(&key) {
        if existing.core.upgrade().is_some() {
          return Err(ZmxError::AddrInUse(key));
        }
      }
      endpoints.insert(
        key.clone(),
        EndpointBinding {
          handle: core.handle,
          core: Arc::downgrade(core),
        },
      );
    }
    tracing::debug!(endpoint = %key, socket_handle = core.handle, "Endpoint bound");

    // Drain connects that were waiting for this endpoint.
    let waiting: Vec<PendingConnect> = {
      let mut pending = self.pending_connects.lock();
      let (matched, rest): (Vec<_>, Vec<_>) = pending.drain(..).partition(|p| p.endpoint == key);
      *pending = rest;
      matched
    };
    for pending in waiting {
      let Some(connector) = pending.core.upgrade() else {
        continue;
      };
      if !connector.socket_type.compatible_with(core.socket_type) {
        tracing::warn!(
          endpoint = %key,
          connector = connector.socket_type.name(),
          binder = core.socket_type.name(),
          "Dropping pending connect: incompatible socket patterns"
        );
        continue;
      }
      if let Err(e) = self.attach_pair(core, &connector) {
        tracing::warn!(endpoint = %key, error = %e, "Failed to complete pending connect");
      }
    }
    Ok(())
  }

  pub(crate) fn connect_endpoint(&self, endpoint: &str, core: &Arc<SocketCore>) -> Result<(), ZmxError> {
    if self.is_terminated() {
      return Err(ZmxError::ContextTerminated);
    }
    let key = parse_endpoint(endpoint)?.as_str().to_string();

    let binder = self.endpoints.lock().get(&key).and_then(|b| b.core.upgrade());
    match binder {
      Some(binder) => {
        if !core.socket_type.compatible_with(binder.socket_type) {
          return Err(ZmxError::IncompatiblePeer(binder.socket_type.name()));
        }
        self.attach_pair(&binder, core)?;
        tracing::debug!(endpoint = %key, socket_handle = core.handle, "Endpoint connected");
        Ok(())
      }
      None => {
        // Connecting registers intent; attachment completes when a binder
        // appears.
        self.pending_connects.lock().push(PendingConnect {
          endpoint: key.clone(),
          handle: core.handle,
          core: Arc::downgrade(core),
        });
        tracing::debug!(endpoint = %key, socket_handle = core.handle, "Connect pending, endpoint not yet bound");
        Ok(())
      }
    }
  }

  /// Joins two sockets with a fresh pipe pair.
  fn attach_pair(&self, a: &Arc<SocketCore>, b: &Arc<SocketCore>) -> Result<(), ZmxError> {
    let a_pipe_id = self.next_handle();
    let b_pipe_id = self.next_handle();
    let (pipe_a, pipe_b) = pipe_pair(
      a_pipe_id,
      b_pipe_id,
      a.attach_hwms(),
      b.attach_hwms(),
      a.attach_identity(),
      b.attach_identity(),
    );
    a.attach_pipe(pipe_a)?;
    if let Err(e) = b.attach_pipe(pipe_b) {
      a.detach_pipe_by_id(a_pipe_id);
      return Err(e);
    }
    Ok(())
  }

  fn terminate(&self) -> bool {
    if self.terminated.swap(true, Ordering::AcqRel) {
      return false;
    }
    let cores: Vec<Arc<SocketCore>> = {
      let mut sockets = self.sockets.lock();
      sockets.drain().filter_map(|(_, weak)| weak.upgrade()).collect()
    };
    self.endpoints.lock().clear();
    self.pending_connects.lock().clear();
    for core in cores {
      let _ = core.close();
    }
    true
  }
}

impl fmt::Debug for ContextInner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContextInner")
      .field("terminated", &self.is_terminated())
      .finish_non_exhaustive()
  }
}

/// A handle to a zmx context, managing sockets and shared resources.
/// Contexts are cloneable and thread-safe; sockets are not - each thread
/// creates its own sockets from a shared context.
#[derive(Clone)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl Context {
  /// Creates a new, independent context with default options.
  pub fn new() -> Result<Self, ZmxError> {
    Self::with_options(DEFAULT_IO_THREADS, DEFAULT_MAX_SOCKETS)
  }

  /// Creates a context with explicit I/O-thread and socket limits. The
  /// thread count is consumed by the transport layer underneath the engine;
  /// it is validated here because a negative pool size is a caller bug.
  pub fn with_options(io_threads: i32, max_sockets: i32) -> Result<Self, ZmxError> {
    if io_threads < 0 {
      return Err(ZmxError::Context {
        op: "context_new",
        code: libc::EINVAL,
        message: format!("negative I/O thread count: {io_threads}"),
      });
    }
    if max_sockets < 1 {
      return Err(ZmxError::Context {
        op: "context_new",
        code: libc::EINVAL,
        message: format!("max sockets must be positive: {max_sockets}"),
      });
    }
    tracing::debug!(io_threads, max_sockets, "Creating new zmx Context");
    Ok(Self {
      inner: Arc::new(ContextInner::new(io_threads, max_sockets)),
    })
  }

  /// Factory variant of `new`: swallows the error and returns `None` for
  /// callers that prefer to branch on absence.
  pub fn create() -> Option<Self> {
    Self::new().ok()
  }

  /// Creates a socket of the specified type associated with this context.
  pub fn socket(&self, socket_type: SocketType) -> Result<Socket, ZmxError> {
    if self.inner.is_terminated() {
      return Err(ZmxError::ContextTerminated);
    }
    let max_sockets = self.inner.options.lock().max_sockets;
    if self.inner.live_socket_count() >= max_sockets as usize {
      return Err(ZmxError::ResourceLimitReached);
    }
    let handle = self.inner.next_handle();
    tracing::debug!(socket_type = ?socket_type, handle, "Creating socket");
    let core = SocketCore::new(handle, self.inner.clone(), socket_type);
    self.inner.register_socket(handle, Arc::downgrade(&core));
    self.inner.socket_created.store(true, Ordering::Release);
    Ok(Socket::new(core))
  }

  /// Sets an integer context option (`IO_THREADS`, `MAX_SOCKETS`). Context
  /// options configure shared resources, so they are only accepted before
  /// the first socket is created.
  pub fn set_option(&self, option: i32, value: i32) -> Result<(), ZmxError> {
    if self.inner.is_terminated() {
      return Err(ZmxError::ContextTerminated);
    }
    if self.inner.socket_created.load(Ordering::Acquire) {
      return Err(ZmxError::InvalidState(
        "context options must be set before the first socket is created",
      ));
    }
    let mut options = self.inner.options.lock();
    match option {
      IO_THREADS if value >= 0 => options.io_threads = value,
      MAX_SOCKETS if value >= 1 => options.max_sockets = value,
      IO_THREADS | MAX_SOCKETS => return Err(ZmxError::InvalidOptionValue(option)),
      _ => return Err(ZmxError::InvalidOption(option)),
    }
    Ok(())
  }

  /// Reads a context option back.
  pub fn get_option(&self, option: i32) -> Result<i32, ZmxError> {
    let options = self.inner.options.lock();
    match option {
      IO_THREADS => Ok(options.io_threads),
      MAX_SOCKETS => Ok(options.max_sockets),
      _ => Err(ZmxError::InvalidOption(option)),
    }
  }

  /// Releases the context. Termination cascades into every socket created
  /// from it: they are closed, and any further operation on them fails with
  /// `ContextTerminated`. Idempotent - terminating twice returns success.
  pub fn terminate(&self) -> Result<(), ZmxError> {
    if self.inner.terminate() {
      tracing::debug!("Context terminated");
    }
    Ok(())
  }

  /// True once `terminate()` has run.
  pub fn is_terminated(&self) -> bool {
    self.inner.is_terminated()
  }
}

impl fmt::Debug for Context {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Context").finish_non_exhaustive()
  }
}

// src/poller.rs

use crate::error::ZmxError;
use crate::message::Msg;
use crate::socket::core::Patience;
use crate::socket::types::Socket;

use bitflags::bitflags;
use crossbeam_channel::{Receiver, Select, Sender};
use std::collections::HashMap;
use std::fmt;
use std::os::unix::io::RawFd;
use std::time::Duration;

bitflags! {
  /// Readiness interest and result bits.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct PollEvents: u32 {
    const READABLE = 0b01;
    const WRITABLE = 0b10;
  }
}

/// Something the poller can watch: an engine socket or a bare OS descriptor
/// with no socket wrapper. Both go through the same registration and
/// result-set machinery.
#[derive(Clone)]
pub enum PollTarget {
  Socket(Socket),
  Fd(RawFd),
}

/// Registration identity: a socket registers at most once (by handle), a
/// descriptor at most once (by number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKey {
  Socket(usize),
  Fd(RawFd),
}

impl PollTarget {
  fn key(&self) -> TargetKey {
    match self {
      PollTarget::Socket(s) => TargetKey::Socket(s.core.handle),
      PollTarget::Fd(fd) => TargetKey::Fd(*fd),
    }
  }

  /// The socket behind this target, when it is one.
  pub fn socket(&self) -> Option<&Socket> {
    match self {
      PollTarget::Socket(s) => Some(s),
      PollTarget::Fd(_) => None,
    }
  }

  /// The raw descriptor behind this target, when it is one.
  pub fn fd(&self) -> Option<RawFd> {
    match self {
      PollTarget::Socket(_) => None,
      PollTarget::Fd(fd) => Some(*fd),
    }
  }
}

impl From<&Socket> for PollTarget {
  fn from(socket: &Socket) -> Self {
    PollTarget::Socket(socket.clone())
  }
}

impl From<Socket> for PollTarget {
  fn from(socket: Socket) -> Self {
    PollTarget::Socket(socket)
  }
}

impl From<RawFd> for PollTarget {
  fn from(fd: RawFd) -> Self {
    PollTarget::Fd(fd)
  }
}

impl fmt::Debug for PollTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PollTarget::Socket(s) => f.debug_tuple("Socket").field(&s.socket_type()).finish(),
      PollTarget::Fd(fd) => f.debug_tuple("Fd").field(fd).finish(),
    }
  }
}

struct PollItem {
  target: PollTarget,
  interest: PollEvents,
}

/// Readiness multiplexer over a dynamic set of sockets and raw descriptors.
///
/// The poller is a single-thread object like the sockets it watches; it is
/// not designed for concurrent registration and polling without external
/// locking.
#[derive(Default)]
pub struct Poller {
  items: Vec<PollItem>,
  readable: Vec<PollTarget>,
  writable: Vec<PollTarget>,
}

impl Poller {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers a target, or widens an existing registration. Registering
  /// the same target again ORs the new interest bits into the entry; a new
  /// target with empty interest is ignored.
  pub fn register<T: Into<PollTarget>>(&mut self, target: T, interest: PollEvents) {
    let target = target.into();
    let key = target.key();
    if let Some(item) = self.items.iter_mut().find(|i| i.target.key() == key) {
      item.interest |= interest;
      return;
    }
    if interest.is_empty() {
      return;
    }
    self.items.push(PollItem { target, interest });
  }

  /// Clears the given interest bits from a registration; only bits that are
  /// currently set are touched. An entry whose interest reaches zero is
  /// removed entirely.
  pub fn deregister<T: Into<PollTarget>>(&mut self, target: T, interest: PollEvents) {
    let key = target.into().key();
    let Some(pos) = self.items.iter().position(|i| i.target.key() == key) else {
      return;
    };
    let remaining = self.items[pos].interest & !interest;
    if remaining.is_empty() {
      self.items.remove(pos);
    } else {
      self.items[pos].interest = remaining;
    }
  }

  /// Removes a registration entirely, whatever its interest.
  pub fn remove<T: Into<PollTarget>>(&mut self, target: T) {
    let key = target.into().key();
    self.items.retain(|i| i.target.key() != key);
  }

  /// Number of current registrations.
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Interest currently registered for a target, if any.
  pub fn interest<T: Into<PollTarget>>(&self, target: T) -> Option<PollEvents> {
    let key = target.into().key();
    self.items.iter().find(|i| i.target.key() == key).map(|i| i.interest)
  }

  /// Targets that reported readable on the last `poll`. Valid until the
  /// next `poll` call, which rebuilds the set from scratch.
  pub fn readable(&self) -> &[PollTarget] {
    &self.readable
  }

  /// Targets that reported writable on the last `poll`.
  pub fn writable(&self) -> &[PollTarget] {
    &self.writable
  }

  /// Waits up to `timeout` for any registered target to become ready and
  /// returns how many did. `None` waits indefinitely; `Some(ZERO)` checks
  /// without waiting. With no registrations the call returns 0 immediately
  /// instead of entering a wait no event could ever end - callers seeing
  /// that should throttle or stop rather than spin.
  pub fn poll(&mut self, timeout: Option<Duration>) -> Result<usize, ZmxError> {
    self.readable.clear();
    self.writable.clear();
    if self.items.is_empty() {
      return Ok(0);
    }
    let patience = Patience::new(false, timeout);
    loop {
      let count = self.scan()?;
      if count > 0 {
        return Ok(count);
      }
      let Some(slice) = patience.next_slice() else {
        return Ok(0);
      };
      self.wait_slice(slice);
    }
  }

  /// Sugar for a zero-timeout `poll`.
  pub fn poll_nonblock(&mut self) -> Result<usize, ZmxError> {
    self.poll(Some(Duration::ZERO))
  }

  /// One readiness pass: rebuilds both result sets and counts targets with
  /// at least one triggered event.
  fn scan(&mut self) -> Result<usize, ZmxError> {
    self.readable.clear();
    self.writable.clear();
    let fd_events = scan_fds(&self.items)?;
    let mut count = 0;
    for item in &self.items {
      let state = match &item.target {
        PollTarget::Socket(s) => s.core.poll_events(),
        PollTarget::Fd(fd) => fd_events.get(fd).copied().unwrap_or_default(),
      };
      let triggered = state & item.interest;
      if triggered.contains(PollEvents::READABLE) {
        self.readable.push(item.target.clone());
      }
      if triggered.contains(PollEvents::WRITABLE) {
        self.writable.push(item.target.clone());
      }
      if !triggered.is_empty() {
        count += 1;
      }
    }
    Ok(count)
  }

  /// Blocks for up to `slice`. Socket pipe activity wakes the wait
  /// immediately; raw descriptors and freshly attached pipes are picked up
  /// by the re-scan that follows each slice.
  fn wait_slice(&self, slice: Duration) {
    let mut receivers: Vec<Receiver<Vec<Msg>>> = Vec::new();
    let mut senders: Vec<Sender<Vec<Msg>>> = Vec::new();
    for item in &self.items {
      if let PollTarget::Socket(socket) = &item.target {
        let (r, w) = socket.core.wait_handles();
        if item.interest.contains(PollEvents::READABLE) {
          receivers.extend(r);
        }
        if item.interest.contains(PollEvents::WRITABLE) {
          senders.extend(w);
        }
      }
    }
    if receivers.is_empty() && senders.is_empty() {
      std::thread::sleep(slice);
      return;
    }
    let mut select = Select::new();
    for receiver in &receivers {
      select.recv(receiver);
    }
    for sender in &senders {
      select.send(sender);
    }
    let _ = select.ready_timeout(slice);
  }
}

impl fmt::Debug for Poller {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Poller").field("items", &self.items.len()).finish_non_exhaustive()
  }
}

/// Readiness of every registered raw descriptor, via one non-blocking
/// poll(2) call. Signal interruption surfaces as an error rather than being
/// swallowed.
fn scan_fds(items: &[PollItem]) -> Result<HashMap<RawFd, PollEvents>, ZmxError> {
  let fds: Vec<(RawFd, PollEvents)> = items
    .iter()
    .filter_map(|item| item.target.fd().map(|fd| (fd, item.interest)))
    .collect();
  let mut events = HashMap::new();
  if fds.is_empty() {
    return Ok(events);
  }

  let mut pollfds: Vec<libc::pollfd> = fds
    .iter()
    .map(|(fd, interest)| {
      let mut mask: libc::c_short = 0;
      if interest.contains(PollEvents::READABLE) {
        mask |= libc::POLLIN;
      }
      if interest.contains(PollEvents::WRITABLE) {
        mask |= libc::POLLOUT;
      }
      libc::pollfd {
        fd: *fd,
        events: mask,
        revents: 0,
      }
    })
    .collect();

  // SAFETY: pollfds is a live, correctly sized array for the duration of
  // the call; a zero timeout makes this a pure readiness probe.
  let rc = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, 0) };
  if rc < 0 {
    return Err(ZmxError::Io(std::io::Error::last_os_error()));
  }

  for pollfd in &pollfds {
    let mut ready = PollEvents::empty();
    if pollfd.revents & libc::POLLIN != 0 {
      ready |= PollEvents::READABLE;
    }
    if pollfd.revents & libc::POLLOUT != 0 {
      ready |= PollEvents::WRITABLE;
    }
    // Error and hangup conditions surface as both: whichever direction the
    // caller watches, the next operation will observe the condition.
    if pollfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
      ready |= PollEvents::READABLE | PollEvents::WRITABLE;
    }
    events.insert(pollfd.fd, ready);
  }
  Ok(events)
}

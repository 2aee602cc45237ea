// src/socket/types.rs

use crate::context::Context;
use crate::error::ZmxError;
use crate::message::{Blob, Msg};
use crate::poller::PollEvents;
use crate::socket::core::SocketCore;
use crate::socket::options::OptionValue;

use bitflags::bitflags;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

/// Represents the type of a socket, defining its messaging pattern.
///
/// Discriminants follow the wrapped protocol's numbering so counterpart
/// implementations agree on socket-type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SocketType {
  /// Exclusive one-to-one pairing.
  Pair = 0,
  /// Publish messages to subscribers (Pub-Sub pattern).
  Pub = 1,
  /// Subscribe to messages from publishers (Pub-Sub pattern).
  Sub = 2,
  /// Send requests and receive replies (Req-Rep pattern).
  Req = 3,
  /// Receive requests and send replies (Req-Rep pattern).
  Rep = 4,
  /// Asynchronous request-reply, load-balancing outgoing (Dealer-Router pattern).
  Dealer = 5,
  /// Asynchronous request-reply, routing incoming (Dealer-Router pattern).
  Router = 6,
  /// Collect messages from a pool of distributors (Push-Pull pattern).
  Pull = 7,
  /// Distribute messages to a pool of workers (Push-Pull pattern).
  Push = 8,
  /// Publisher that also receives subscription frames.
  XPub = 9,
  /// Subscriber that sends subscription frames explicitly.
  XSub = 10,
  /// Broadcast a survey and collect responses.
  Surveyor = 11,
  /// Answer surveys from a surveyor.
  Respondent = 12,
}

impl SocketType {
  /// Historical alias for `Dealer`.
  pub const XREQ: SocketType = SocketType::Dealer;
  /// Historical alias for `Router`.
  pub const XREP: SocketType = SocketType::Router;

  /// The raw socket-type identifier.
  pub fn as_raw(self) -> i32 {
    self as i32
  }

  pub fn name(self) -> &'static str {
    match self {
      SocketType::Pair => "PAIR",
      SocketType::Pub => "PUB",
      SocketType::Sub => "SUB",
      SocketType::Req => "REQ",
      SocketType::Rep => "REP",
      SocketType::Dealer => "DEALER",
      SocketType::Router => "ROUTER",
      SocketType::Pull => "PULL",
      SocketType::Push => "PUSH",
      SocketType::XPub => "XPUB",
      SocketType::XSub => "XSUB",
      SocketType::Surveyor => "SURVEYOR",
      SocketType::Respondent => "RESPONDENT",
    }
  }

  /// Whether this pattern can transmit application messages (XSUB transmits
  /// subscription frames, which counts).
  pub fn can_send(self) -> bool {
    !matches!(self, SocketType::Sub | SocketType::Pull)
  }

  /// Whether this pattern can receive (XPUB receives subscription frames).
  pub fn can_recv(self) -> bool {
    !matches!(self, SocketType::Pub | SocketType::Push)
  }

  pub(crate) fn supports_identity(self) -> bool {
    !matches!(
      self,
      SocketType::Pub | SocketType::Sub | SocketType::XPub | SocketType::XSub
    )
  }

  pub(crate) fn supports_subscriptions(self) -> bool {
    matches!(self, SocketType::Sub | SocketType::XSub)
  }

  /// Wire-compatibility pairing: which peer pattern this socket may attach to.
  pub fn compatible_with(self, peer: SocketType) -> bool {
    use SocketType::*;
    matches!(
      (self, peer),
      (Pair, Pair)
        | (Pub, Sub)
        | (Pub, XSub)
        | (XPub, Sub)
        | (XPub, XSub)
        | (Sub, Pub)
        | (Sub, XPub)
        | (XSub, Pub)
        | (XSub, XPub)
        | (Req, Rep)
        | (Req, Router)
        | (Rep, Req)
        | (Rep, Dealer)
        | (Dealer, Rep)
        | (Dealer, Router)
        | (Dealer, Dealer)
        | (Router, Req)
        | (Router, Dealer)
        | (Router, Router)
        | (Push, Pull)
        | (Pull, Push)
        | (Surveyor, Respondent)
        | (Respondent, Surveyor)
    )
  }
}

bitflags! {
  /// Per-call send flags.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct SendFlags: i32 {
    /// Fail with `WouldBlock` instead of waiting for queue space or a peer.
    const DONT_WAIT = 0b01;
    /// More parts of this logical message follow.
    const MORE = 0b10;
  }
}

bitflags! {
  /// Per-call receive flags.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
  pub struct RecvFlags: i32 {
    /// Fail with `WouldBlock` instead of waiting for a message.
    const DONT_WAIT = 0b01;
  }
}

/// The public handle for interacting with a zmx socket.
///
/// Handles are cheap to clone within a thread, but a socket belongs to the
/// thread that created it: the handle is deliberately not `Send`, only the
/// `Context` crosses threads (each thread creates its own sockets from it).
pub struct Socket {
  pub(crate) core: Arc<SocketCore>,
  // Pins the handle to its creating thread.
  _single_thread: PhantomData<Rc<()>>,
}

impl Clone for Socket {
  fn clone(&self) -> Self {
    Self::new(self.core.clone())
  }
}

impl Socket {
  pub(crate) fn new(core: Arc<SocketCore>) -> Self {
    Self {
      core,
      _single_thread: PhantomData,
    }
  }

  /// Factory variant of `Context::socket`: swallows the error and returns
  /// `None` for callers that prefer to branch on absence.
  pub fn create(ctx: &Context, socket_type: SocketType) -> Option<Socket> {
    ctx.socket(socket_type).ok()
  }

  /// The pattern this socket was created with.
  pub fn socket_type(&self) -> SocketType {
    self.core.socket_type
  }

  /// Binds the socket to listen on an endpoint, e.g. `"tcp://127.0.0.1:5555"`.
  pub fn bind(&self, endpoint: &str) -> Result<(), ZmxError> {
    self.core.bind(endpoint)
  }

  /// Connects the socket to an endpoint. Connecting registers intent: the
  /// attachment completes when a binder for the endpoint exists (possibly
  /// later).
  pub fn connect(&self, endpoint: &str) -> Result<(), ZmxError> {
    self.core.connect(endpoint)
  }

  // --- Send path ---

  /// Sends one message frame. With `SendFlags::MORE` the frame is buffered
  /// until the final frame of the logical message arrives; the assembled
  /// message is then handed to a pipe as one unit, so a `WouldBlock` means
  /// nothing of it was transmitted.
  pub fn send(&self, msg: Msg, flags: SendFlags) -> Result<(), ZmxError> {
    self.core.send(msg, flags)
  }

  /// Wraps `text` in a fresh message and sends it. The message is consumed
  /// on both the success and failure path.
  pub fn send_str(&self, text: &str, flags: SendFlags) -> Result<(), ZmxError> {
    self.core.send(Msg::from_str_payload(text), flags)
  }

  /// Sends an ordered sequence of frames as one multi-part logical message.
  /// All parts except the last carry the "more" marker. Transmission is
  /// all-or-nothing: a would-block aborts the call before anything reaches
  /// a pipe, and the buffered parts are discarded.
  pub fn send_parts<I>(&self, parts: I, flags: SendFlags) -> Result<(), ZmxError>
  where
    I: IntoIterator<Item = Msg>,
  {
    let parts: Vec<Msg> = parts.into_iter().collect();
    let last = match parts.len() {
      0 => return Err(ZmxError::InvalidArgument("empty multi-part message".into())),
      n => n - 1,
    };
    for (i, msg) in parts.into_iter().enumerate() {
      let part_flags = if i < last { flags | SendFlags::MORE } else { flags };
      self.send(msg, part_flags)?;
    }
    Ok(())
  }

  /// Multi-part send over string parts; same contract as `send_parts`.
  pub fn send_strs<I, S>(&self, parts: I, flags: SendFlags) -> Result<(), ZmxError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self.send_parts(
      parts.into_iter().map(|s| Msg::from_str_payload(s.as_ref())),
      flags,
    )
  }

  // --- Receive path ---

  /// Dequeues one message frame. The caller owns the returned message on
  /// success; nothing is dequeued on failure.
  pub fn recv(&self, flags: RecvFlags) -> Result<Msg, ZmxError> {
    self.core.recv(flags)
  }

  /// Receives one frame and converts its payload to a string (lossily, for
  /// non-UTF-8 payloads). The temporary message is released on both paths.
  pub fn recv_string(&self, flags: RecvFlags) -> Result<String, ZmxError> {
    let msg = self.core.recv(flags)?;
    let text = String::from_utf8_lossy(msg.data()?).into_owned();
    Ok(text)
  }

  /// Receives a full multi-part logical message. On a mid-sequence failure
  /// all already-accumulated parts are released and the error is returned;
  /// the caller never sees a partial message.
  pub fn recv_parts(&self, flags: RecvFlags) -> Result<Vec<Msg>, ZmxError> {
    self.core.recv_parts(flags)
  }

  /// `recv_parts`, stringified.
  pub fn recv_strings(&self, flags: RecvFlags) -> Result<Vec<String>, ZmxError> {
    let parts = self.core.recv_parts(flags)?;
    let mut out = Vec::with_capacity(parts.len());
    for part in &parts {
      out.push(String::from_utf8_lossy(part.data()?).into_owned());
    }
    Ok(out)
  }

  /// Receives a full multi-part message and splits it into the routing
  /// envelope (the leading frames through the first zero-length frame,
  /// inclusive) and the body (everything after). A message with no
  /// zero-length frame is all body.
  pub fn recv_multipart(&self, flags: RecvFlags) -> Result<(Vec<Msg>, Vec<Msg>), ZmxError> {
    let parts = self.core.recv_parts(flags)?;
    let delimiter = parts
      .iter()
      .position(|m| m.data_bytes().map_or(true, |d| d.is_empty()));
    Ok(match delimiter {
      Some(idx) => {
        let mut envelope = parts;
        let body = envelope.split_off(idx + 1);
        (envelope, body)
      }
      None => (Vec::new(), parts),
    })
  }

  /// Whether more parts of the current logical message are pending. The
  /// error case ("query failed") stays distinct from `Ok(false)` ("no more
  /// parts"); callers that want the historical lossy collapse can write
  /// `.unwrap_or(false)`.
  pub fn more_parts(&self) -> Result<bool, ZmxError> {
    self.core.more_parts()
  }

  // --- Options ---

  /// Sets a socket option. The value's kind is checked against this
  /// socket's option table.
  pub fn set_option<V: Into<OptionValue>>(&self, option: i32, value: V) -> Result<(), ZmxError> {
    self.core.set_option(option, value.into())
  }

  /// Reads a socket option back as a typed value.
  pub fn get_option(&self, option: i32) -> Result<OptionValue, ZmxError> {
    self.core.get_option(option)
  }

  /// Sugar over `get_option(IDENTITY)`.
  pub fn identity(&self) -> Result<Blob, ZmxError> {
    match self.core.get_option(crate::socket::options::IDENTITY)? {
      OptionValue::Bytes(b) => Ok(b),
      _ => Err(ZmxError::Internal("identity option kind mismatch".into())),
    }
  }

  /// Sugar over `set_option(IDENTITY, ...)`, accepting any byte-like value.
  pub fn set_identity<V: AsRef<[u8]>>(&self, identity: V) -> Result<(), ZmxError> {
    self
      .core
      .set_option(crate::socket::options::IDENTITY, OptionValue::from(identity.as_ref()))
  }

  // --- Introspection & lifecycle ---

  /// Current readiness of the socket, as the poller would classify it.
  pub fn events(&self) -> Result<PollEvents, ZmxError> {
    self.core.events()
  }

  /// Releases the socket. Idempotent: the second call is a no-op returning
  /// success. Every other operation fails with `UseAfterClose` afterwards.
  pub fn close(&self) -> Result<(), ZmxError> {
    self.core.close()
  }

  /// True once `close()` has run (or the owning context terminated).
  pub fn is_closed(&self) -> bool {
    self.core.is_closed()
  }
}

impl fmt::Debug for Socket {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Socket")
      .field("type", &self.core.socket_type)
      .field("handle", &self.core.handle)
      .finish_non_exhaustive()
  }
}

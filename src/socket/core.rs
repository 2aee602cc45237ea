// src/socket/core.rs

use crate::context::ContextInner;
use crate::error::ZmxError;
use crate::message::{Blob, Msg, MsgFlags};
use crate::poller::PollEvents;
use crate::socket::options::{self, OptionTable, OptionValue, SocketOptions};
use crate::socket::patterns::{Distributor, FairQueue, LoadBalancer, RouterMap, SubscriptionTrie};
use crate::socket::types::{RecvFlags, SendFlags, SocketType};
use crate::transport::Pipe;

use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, TrySendError};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Bound on one blocking wait before the pipe set, close flag and raw state
/// are re-examined. Channel activity wakes a wait immediately; the slice only
/// caps how stale attach/close observations can get.
const WAIT_SLICE: Duration = Duration::from_millis(25);

/// How long the caller is willing to wait, resolved once per operation from
/// the DONT_WAIT flag and the socket's timeout options (the poller reuses it
/// for its own timeout handling).
#[derive(Debug, Clone, Copy)]
pub(crate) enum Patience {
  Immediate,
  Until(Instant),
  Forever,
}

impl Patience {
  pub(crate) fn new(dont_wait: bool, timeout: Option<Duration>) -> Self {
    if dont_wait {
      return Patience::Immediate;
    }
    match timeout {
      None => Patience::Forever,
      Some(d) if d.is_zero() => Patience::Immediate,
      Some(d) => Patience::Until(Instant::now() + d),
    }
  }

  /// Next bounded wait, or `None` when the caller's patience is spent.
  pub(crate) fn next_slice(self) -> Option<Duration> {
    match self {
      Patience::Immediate => None,
      Patience::Forever => Some(WAIT_SLICE),
      Patience::Until(deadline) => {
        let now = Instant::now();
        if now >= deadline {
          None
        } else {
          Some(WAIT_SLICE.min(deadline - now))
        }
      }
    }
  }

  /// The error to report when patience ran out before the operation could
  /// proceed. A non-blocking caller sees the would-block condition; a timed
  /// caller sees a timeout.
  fn exhausted(self) -> ZmxError {
    match self {
      Patience::Immediate => ZmxError::WouldBlock,
      _ => ZmxError::Timeout,
    }
  }
}

/// Request-reply conversation state for the patterns that have one.
#[derive(Debug, Clone)]
enum ExchangeState {
  Idle,
  /// REQ: a request went out on this pipe; the reply must come from it.
  AwaitReply { pipe_id: usize },
  /// REP/RESPONDENT: a request came in; the reply goes back on this pipe
  /// with the saved envelope restored in front of it.
  Replying { pipe_id: usize, envelope: Vec<Msg> },
}

pub(crate) struct CoreState {
  closed: bool,
  options: SocketOptions,
  table: OptionTable,
  pipes: Vec<Pipe>,
  lb: LoadBalancer,
  fq: FairQueue,
  dist: Distributor,
  router: RouterMap,
  subscriptions: SubscriptionTrie,
  /// Remaining frames of the logical message currently being drained.
  pending_in: VecDeque<Msg>,
  /// Frames of the outgoing logical message still being assembled.
  pending_out: Vec<Msg>,
  exchange: ExchangeState,
}

impl CoreState {
  fn pipe(&self, pipe_id: usize) -> Option<&Pipe> {
    self.pipes.iter().find(|p| p.id == pipe_id)
  }

  fn detach_pipe(&mut self, pipe_id: usize) {
    if let Some(pos) = self.pipes.iter().position(|p| p.id == pipe_id) {
      self.pipes.remove(pos);
    }
    self.lb.remove_pipe(pipe_id);
    self.dist.remove_pipe(pipe_id);
    self.router.remove_pipe(pipe_id);
    tracing::trace!(pipe_id, "Socket detached pipe");
  }
}

/// The engine behind a public `Socket` handle.
///
/// All state sits behind one mutex; blocking operations drop it while they
/// wait so that attaches (from connecting peers) and `Context::terminate`
/// (from any thread) can always get in.
pub(crate) struct SocketCore {
  pub(crate) handle: usize,
  pub(crate) socket_type: SocketType,
  pub(crate) ctx: Arc<ContextInner>,
  self_weak: Weak<SocketCore>,
  state: Mutex<CoreState>,
  attach_signal: Condvar,
}

impl SocketCore {
  pub(crate) fn new(handle: usize, ctx: Arc<ContextInner>, socket_type: SocketType) -> Arc<Self> {
    Arc::new_cyclic(|weak| Self {
      handle,
      socket_type,
      ctx,
      self_weak: weak.clone(),
      state: Mutex::new(CoreState {
        closed: false,
        options: SocketOptions::default(),
        table: OptionTable::for_socket_type(socket_type),
        pipes: Vec::new(),
        lb: LoadBalancer::new(),
        fq: FairQueue::new(),
        dist: Distributor::new(),
        router: RouterMap::new(),
        subscriptions: SubscriptionTrie::new(),
        pending_in: VecDeque::new(),
        pending_out: Vec::new(),
        exchange: ExchangeState::Idle,
      }),
      attach_signal: Condvar::new(),
    })
  }

  fn ensure_usable(&self, state: &CoreState) -> Result<(), ZmxError> {
    if self.ctx.is_terminated() {
      return Err(ZmxError::ContextTerminated);
    }
    if state.closed {
      return Err(ZmxError::UseAfterClose("socket"));
    }
    Ok(())
  }

  // --- Lifecycle ---

  /// Releases the socket. Idempotent; the underlying pipes are dropped
  /// exactly once, on the first call.
  pub(crate) fn close(&self) -> Result<(), ZmxError> {
    {
      let mut state = self.state.lock();
      if state.closed {
        return Ok(());
      }
      state.closed = true;
      state.pipes.clear();
      state.pending_in.clear();
      state.pending_out.clear();
      state.exchange = ExchangeState::Idle;
      self.attach_signal.notify_all();
      tracing::debug!(handle = self.handle, socket_type = ?self.socket_type, "Socket closed");
    }
    self.ctx.unregister_socket(self.handle);
    Ok(())
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }

  // --- Connection ---

  pub(crate) fn bind(&self, endpoint: &str) -> Result<(), ZmxError> {
    {
      let state = self.state.lock();
      self.ensure_usable(&state)?;
    }
    let me = self
      .self_weak
      .upgrade()
      .ok_or_else(|| ZmxError::Internal("socket core vanished during bind".into()))?;
    self.ctx.bind_endpoint(endpoint, &me)
  }

  pub(crate) fn connect(&self, endpoint: &str) -> Result<(), ZmxError> {
    {
      let state = self.state.lock();
      self.ensure_usable(&state)?;
    }
    let me = self
      .self_weak
      .upgrade()
      .ok_or_else(|| ZmxError::Internal("socket core vanished during connect".into()))?;
    self.ctx.connect_endpoint(endpoint, &me)
  }

  /// Wires a new pipe into the socket. Called by the context's matchmaking
  /// (possibly from the connecting peer's thread).
  pub(crate) fn attach_pipe(&self, pipe: Pipe) -> Result<(), ZmxError> {
    let mut state = self.state.lock();
    if state.closed {
      return Err(ZmxError::UseAfterClose("socket"));
    }
    let pipe_id = pipe.id;
    state.lb.add_pipe(pipe_id);
    state.dist.add_pipe(pipe_id);
    if self.socket_type == SocketType::Router {
      state.router.add_peer(pipe.peer_identity.clone(), pipe_id);
    }
    state.pipes.push(pipe);
    self.attach_signal.notify_all();
    tracing::trace!(handle = self.handle, pipe_id, "Socket attached pipe");
    Ok(())
  }

  /// Rolls back one side of a failed pair attachment.
  pub(crate) fn detach_pipe_by_id(&self, pipe_id: usize) {
    self.state.lock().detach_pipe(pipe_id);
  }

  /// The identity this socket presents to peers at attach time: the IDENTITY
  /// option if set, otherwise a generated one (leading zero byte plus random
  /// tail, so generated identities never collide with application ones).
  pub(crate) fn attach_identity(&self) -> Blob {
    let state = self.state.lock();
    if !state.options.identity.is_empty() {
      return state.options.identity.clone();
    }
    let mut generated = vec![0u8; 5];
    generated[1..].copy_from_slice(&rand::random::<[u8; 4]>());
    Blob::from(generated)
  }

  /// (SNDHWM, RCVHWM) as configured right now; pipe capacity is fixed from
  /// these at attach time.
  pub(crate) fn attach_hwms(&self) -> (i32, i32) {
    let state = self.state.lock();
    (state.options.sndhwm, state.options.rcvhwm)
  }

  // --- Options ---

  pub(crate) fn set_option(&self, option: i32, value: OptionValue) -> Result<(), ZmxError> {
    let mut state = self.state.lock();
    self.ensure_usable(&state)?;
    state.table.validate_set(option, &value)?;
    match option {
      options::SUBSCRIBE => {
        let OptionValue::Bytes(topic) = value else {
          return Err(ZmxError::InvalidOptionValue(option));
        };
        state.subscriptions.subscribe(&topic);
        Ok(())
      }
      options::UNSUBSCRIBE => {
        let OptionValue::Bytes(topic) = value else {
          return Err(ZmxError::InvalidOptionValue(option));
        };
        if !state.subscriptions.unsubscribe(&topic) {
          tracing::debug!(handle = self.handle, "Unsubscribe for a topic that was not subscribed");
        }
        Ok(())
      }
      _ => state.options.store(option, value),
    }
  }

  pub(crate) fn get_option(&self, option: i32) -> Result<OptionValue, ZmxError> {
    let state = self.state.lock();
    self.ensure_usable(&state)?;
    state.table.validate_get(option)?;
    match option {
      options::RCVMORE => Ok(OptionValue::Int32(!state.pending_in.is_empty() as i32)),
      options::EVENTS => Ok(OptionValue::Int32(self.events_locked(&state).bits() as i32)),
      options::TYPE => Ok(OptionValue::Int32(self.socket_type.as_raw())),
      _ => state.options.fetch(option),
    }
  }

  /// RCVMORE, normalized. `Ok(false)` means "no more parts"; an `Err` means
  /// the query itself failed - the two stay distinct.
  pub(crate) fn more_parts(&self) -> Result<bool, ZmxError> {
    let state = self.state.lock();
    self.ensure_usable(&state)?;
    Ok(!state.pending_in.is_empty())
  }

  // --- Send path ---

  pub(crate) fn send(&self, mut msg: Msg, flags: SendFlags) -> Result<(), ZmxError> {
    let mut state = self.state.lock();
    self.ensure_usable(&state)?;
    if !self.socket_type.can_send() {
      return Err(ZmxError::InvalidSocketType(self.socket_type.name()));
    }
    if msg.is_closed() {
      return Err(ZmxError::UseAfterClose("message"));
    }
    match self.socket_type {
      SocketType::Req => {
        if !matches!(state.exchange, ExchangeState::Idle) {
          return Err(ZmxError::InvalidState("request outstanding, receive the reply first"));
        }
        if !state.pending_in.is_empty() {
          return Err(ZmxError::InvalidState("previous reply not fully received"));
        }
      }
      SocketType::Rep | SocketType::Respondent => {
        if !matches!(state.exchange, ExchangeState::Replying { .. }) {
          return Err(ZmxError::InvalidState("no request pending a reply"));
        }
        if !state.pending_in.is_empty() {
          return Err(ZmxError::InvalidState("request not fully received"));
        }
      }
      _ => {}
    }

    if flags.contains(SendFlags::MORE) {
      msg.set_flags(msg.flags() | MsgFlags::MORE);
      state.pending_out.push(msg);
      return Ok(());
    }

    // Final frame: assemble the logical message and hand it to a pipe as one
    // unit. A would-block below means nothing of it was transmitted; the
    // assembled parts are discarded (all-or-nothing, no half-sent message).
    let mut parts = std::mem::take(&mut state.pending_out);
    parts.push(msg);
    normalize_more_flags(&mut parts);
    let patience = Patience::new(flags.contains(SendFlags::DONT_WAIT), state.options.send_timeout());

    match self.socket_type {
      SocketType::Push | SocketType::Dealer | SocketType::Pair => {
        self.send_balanced(state, parts, patience).map(|_| ())
      }
      SocketType::Req => {
        parts.insert(0, delimiter_frame());
        normalize_more_flags(&mut parts);
        let pipe_id = self.send_balanced(state, parts, patience)?;
        let mut state = self.state.lock();
        state.exchange = ExchangeState::AwaitReply { pipe_id };
        Ok(())
      }
      SocketType::Pub | SocketType::XPub | SocketType::XSub | SocketType::Surveyor => {
        self.send_fanout(&mut state, parts)
      }
      SocketType::Rep | SocketType::Respondent => self.send_reply(state, parts, patience),
      SocketType::Router => self.send_routed(&mut state, parts),
      SocketType::Sub | SocketType::Pull => unreachable!("can_send() excluded these"),
    }
  }

  /// Round-robin send for PUSH/DEALER/REQ/PAIR. Blocks (within patience)
  /// until some pipe accepts the message, attaching peers count as progress.
  /// Returns the id of the accepting pipe.
  fn send_balanced<'a>(
    &'a self,
    mut state: MutexGuard<'a, CoreState>,
    mut parts: Vec<Msg>,
    patience: Patience,
  ) -> Result<usize, ZmxError> {
    loop {
      let attempts = state.lb.len();
      let mut dead: Vec<usize> = Vec::new();
      let mut sent: Option<usize> = None;
      for _ in 0..attempts {
        let Some(pipe_id) = state.lb.next_pipe() else {
          break;
        };
        let Some(pipe) = state.pipe(pipe_id) else {
          dead.push(pipe_id);
          continue;
        };
        match pipe.sender.try_send(parts) {
          Ok(()) => {
            sent = Some(pipe_id);
            parts = Vec::new();
            break;
          }
          Err(TrySendError::Full(returned)) => parts = returned,
          Err(TrySendError::Disconnected(returned)) => {
            parts = returned;
            dead.push(pipe_id);
          }
        }
      }
      for pipe_id in dead {
        state.detach_pipe(pipe_id);
      }
      if let Some(pipe_id) = sent {
        return Ok(pipe_id);
      }

      let Some(slice) = patience.next_slice() else {
        return Err(patience.exhausted());
      };
      if !state.lb.has_pipes() {
        let _ = self.attach_signal.wait_for(&mut state, slice);
      } else {
        let senders: Vec<Sender<Vec<Msg>>> = state.pipes.iter().map(|p| p.sender.clone()).collect();
        drop(state);
        wait_any_send(&senders, slice);
        state = self.state.lock();
      }
      self.ensure_usable(&state)?;
    }
  }

  /// Fan-out send for PUB/XPUB/XSUB/SURVEYOR: a copy goes to every attached
  /// pipe; peers at capacity miss this message (never blocks the sender).
  fn send_fanout(&self, state: &mut CoreState, parts: Vec<Msg>) -> Result<(), ZmxError> {
    if state.dist.is_empty() {
      tracing::trace!(handle = self.handle, "Fan-out with no peers, message dropped");
      return Ok(());
    }
    let mut dead: Vec<usize> = Vec::new();
    for pipe_id in state.dist.pipe_ids() {
      let Some(pipe) = state.pipe(pipe_id) else {
        dead.push(pipe_id);
        continue;
      };
      match pipe.sender.try_send(parts.clone()) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
          tracing::trace!(pipe_id, "Fan-out peer at capacity, message dropped for it");
        }
        Err(TrySendError::Disconnected(_)) => dead.push(pipe_id),
      }
    }
    for pipe_id in dead {
      state.detach_pipe(pipe_id);
    }
    Ok(())
  }

  /// REP/RESPONDENT reply: restore the saved envelope and answer on the pipe
  /// the request arrived on. A vanished requester drops the reply silently.
  fn send_reply<'a>(
    &'a self,
    mut state: MutexGuard<'a, CoreState>,
    parts: Vec<Msg>,
    patience: Patience,
  ) -> Result<(), ZmxError> {
    let (pipe_id, mut full) = match &state.exchange {
      ExchangeState::Replying { pipe_id, envelope } => (*pipe_id, envelope.clone()),
      _ => return Err(ZmxError::InvalidState("no request pending a reply")),
    };
    full.extend(parts);
    normalize_more_flags(&mut full);

    loop {
      let sender = match state.pipe(pipe_id) {
        Some(pipe) => pipe.sender.clone(),
        None => {
          tracing::warn!(handle = self.handle, pipe_id, "Requester gone, dropping reply");
          state.exchange = ExchangeState::Idle;
          return Ok(());
        }
      };
      match sender.try_send(full) {
        Ok(()) => {
          state.exchange = ExchangeState::Idle;
          return Ok(());
        }
        Err(TrySendError::Full(returned)) => full = returned,
        Err(TrySendError::Disconnected(_)) => {
          state.detach_pipe(pipe_id);
          state.exchange = ExchangeState::Idle;
          tracing::warn!(handle = self.handle, pipe_id, "Requester disconnected, dropping reply");
          return Ok(());
        }
      }

      // On exhausted patience the reply parts are discarded but the exchange
      // stays open, so the caller may compose the reply again.
      let Some(slice) = patience.next_slice() else {
        return Err(patience.exhausted());
      };
      drop(state);
      wait_any_send(std::slice::from_ref(&sender), slice);
      state = self.state.lock();
      self.ensure_usable(&state)?;
    }
  }

  /// ROUTER send: the leading frame addresses a peer; unroutable or
  /// over-capacity destinations drop the message (default non-mandatory
  /// routing).
  fn send_routed(&self, state: &mut CoreState, mut parts: Vec<Msg>) -> Result<(), ZmxError> {
    if parts.len() < 2 {
      tracing::warn!(handle = self.handle, "Routed message without body, dropped");
      return Ok(());
    }
    let address = parts.remove(0);
    let destination = Blob::from_bytes(address.data_bytes().unwrap_or_default());
    let Some(pipe_id) = state.router.pipe_for(&destination) else {
      tracing::debug!(handle = self.handle, ?destination, "Unroutable message dropped");
      return Ok(());
    };
    let Some(pipe) = state.pipe(pipe_id) else {
      state.detach_pipe(pipe_id);
      return Ok(());
    };
    match pipe.sender.try_send(parts) {
      Ok(()) => Ok(()),
      Err(TrySendError::Full(_)) => {
        tracing::debug!(handle = self.handle, pipe_id, "Peer at capacity, routed message dropped");
        Ok(())
      }
      Err(TrySendError::Disconnected(_)) => {
        state.detach_pipe(pipe_id);
        tracing::debug!(handle = self.handle, pipe_id, "Peer disconnected, routed message dropped");
        Ok(())
      }
    }
  }

  // --- Receive path ---

  pub(crate) fn recv(&self, flags: RecvFlags) -> Result<Msg, ZmxError> {
    let mut state = self.state.lock();
    self.ensure_usable(&state)?;
    if !self.socket_type.can_recv() {
      return Err(ZmxError::InvalidSocketType(self.socket_type.name()));
    }
    // Drain the logical message already in flight before any state checks:
    // a started multi-part message is always drainable to its end.
    if let Some(msg) = state.pending_in.pop_front() {
      return Ok(msg);
    }
    match self.socket_type {
      SocketType::Req => {
        if !matches!(state.exchange, ExchangeState::AwaitReply { .. }) {
          return Err(ZmxError::InvalidState("no request outstanding"));
        }
      }
      SocketType::Rep | SocketType::Respondent => {
        if matches!(state.exchange, ExchangeState::Replying { .. }) {
          return Err(ZmxError::InvalidState("previous request awaits its reply"));
        }
      }
      _ => {}
    }

    let patience = Patience::new(flags.contains(RecvFlags::DONT_WAIT), state.options.recv_timeout());
    loop {
      if let Some(parts) = self.try_pull_logical(&mut state)? {
        let mut iter = parts.into_iter();
        let first = iter.next();
        state.pending_in.extend(iter);
        if let Some(msg) = first {
          return Ok(msg);
        }
        // Empty logical messages are not produced by the send path; treat
        // one as a broken peer and keep scanning.
        continue;
      }

      let Some(slice) = patience.next_slice() else {
        return Err(patience.exhausted());
      };
      if state.pipes.is_empty() {
        let _ = self.attach_signal.wait_for(&mut state, slice);
      } else {
        let receivers = self.wait_receivers(&state);
        drop(state);
        wait_any_recv(&receivers, slice);
        state = self.state.lock();
      }
      self.ensure_usable(&state)?;
    }
  }

  /// Receives a full multi-part logical message. Mid-sequence failures drop
  /// every already-accumulated part before the error propagates.
  pub(crate) fn recv_parts(&self, flags: RecvFlags) -> Result<Vec<Msg>, ZmxError> {
    let mut parts = Vec::new();
    loop {
      // `?` drops `parts`, releasing the partial message's buffers.
      let msg = self.recv(flags)?;
      let more = msg.is_more();
      parts.push(msg);
      if !more {
        return Ok(parts);
      }
    }
  }

  /// Which receivers a blocking recv should wait on.
  fn wait_receivers(&self, state: &CoreState) -> Vec<Receiver<Vec<Msg>>> {
    if let (SocketType::Req, ExchangeState::AwaitReply { pipe_id }) = (self.socket_type, &state.exchange) {
      return state.pipe(*pipe_id).map(|p| p.receiver.clone()).into_iter().collect();
    }
    state.pipes.iter().map(|p| p.receiver.clone()).collect()
  }

  /// One non-blocking attempt to pull the next logical message, applying the
  /// pattern's transform. `Ok(None)` means nothing available right now.
  fn try_pull_logical(&self, state: &mut CoreState) -> Result<Option<Vec<Msg>>, ZmxError> {
    if self.socket_type == SocketType::Req {
      return self.try_pull_reply(state);
    }

    let len = state.pipes.len();
    if len == 0 {
      return Ok(None);
    }
    let start = state.fq.start(len);
    let mut dead: Vec<usize> = Vec::new();
    let mut found: Option<(usize, Vec<Msg>)> = None;
    'scan: for offset in 0..len {
      let idx = (start + offset) % len;
      let pipe_id = state.pipes[idx].id;
      loop {
        match state.pipes[idx].receiver.try_recv() {
          Ok(parts) => {
            if self.socket_type.supports_subscriptions() && !self.subscription_match(state, &parts) {
              // Filtered on the subscriber side; drop the whole logical
              // message and keep draining this pipe.
              continue;
            }
            found = Some((pipe_id, parts));
            break 'scan;
          }
          Err(TryRecvError::Empty) => break,
          Err(TryRecvError::Disconnected) => {
            dead.push(pipe_id);
            break;
          }
        }
      }
    }
    for pipe_id in dead {
      state.detach_pipe(pipe_id);
    }
    let Some((pipe_id, parts)) = found else {
      return Ok(None);
    };

    match self.socket_type {
      SocketType::Router => {
        let identity = state
          .router
          .identity_for(pipe_id)
          .cloned()
          .or_else(|| state.pipe(pipe_id).map(|p| p.peer_identity.clone()))
          .unwrap_or_default();
        let mut addressed = Vec::with_capacity(parts.len() + 1);
        let mut address = Msg::from_bytes(bytes::Bytes::copy_from_slice(&identity));
        address.set_flags(MsgFlags::MORE);
        addressed.push(address);
        addressed.extend(parts);
        Ok(Some(addressed))
      }
      SocketType::Rep => {
        let delimiter = parts
          .iter()
          .position(|m| m.data_bytes().map_or(true, |d| d.is_empty()));
        let (envelope, body) = match delimiter {
          Some(pos) => {
            let mut envelope = parts;
            let body = envelope.split_off(pos + 1);
            (envelope, body)
          }
          None => (Vec::new(), parts),
        };
        if body.is_empty() {
          tracing::warn!(handle = self.handle, pipe_id, "Request without body, dropped");
          return Ok(None);
        }
        state.exchange = ExchangeState::Replying { pipe_id, envelope };
        Ok(Some(body))
      }
      SocketType::Respondent => {
        state.exchange = ExchangeState::Replying {
          pipe_id,
          envelope: Vec::new(),
        };
        Ok(Some(parts))
      }
      _ => Ok(Some(parts)),
    }
  }

  /// REQ reply pull: only the pipe the request went out on may answer.
  fn try_pull_reply(&self, state: &mut CoreState) -> Result<Option<Vec<Msg>>, ZmxError> {
    let ExchangeState::AwaitReply { pipe_id } = state.exchange else {
      return Err(ZmxError::InvalidState("no request outstanding"));
    };
    let Some(pipe) = state.pipe(pipe_id) else {
      state.exchange = ExchangeState::Idle;
      return Err(ZmxError::ConnectionClosed);
    };
    match pipe.receiver.try_recv() {
      Ok(mut parts) => {
        // Strip the empty delimiter the REQ side added to the request and
        // the replier echoed back in front of the reply body.
        if parts.first().map_or(false, |m| m.data_bytes().map_or(true, |d| d.is_empty()))
          && parts.len() > 1
        {
          parts.remove(0);
        }
        state.exchange = ExchangeState::Idle;
        Ok(Some(parts))
      }
      Err(TryRecvError::Empty) => Ok(None),
      Err(TryRecvError::Disconnected) => {
        state.detach_pipe(pipe_id);
        state.exchange = ExchangeState::Idle;
        Err(ZmxError::ConnectionClosed)
      }
    }
  }

  fn subscription_match(&self, state: &CoreState, parts: &[Msg]) -> bool {
    let topic = parts.first().and_then(|m| m.data_bytes());
    state.subscriptions.matches(topic.as_deref().unwrap_or(&[]))
  }

  // --- Readiness ---

  pub(crate) fn events(&self) -> Result<PollEvents, ZmxError> {
    let state = self.state.lock();
    self.ensure_usable(&state)?;
    Ok(self.events_locked(&state))
  }

  /// Readiness for the poller: a closed socket is simply never ready.
  pub(crate) fn poll_events(&self) -> PollEvents {
    let state = self.state.lock();
    if state.closed || self.ctx.is_terminated() {
      return PollEvents::empty();
    }
    self.events_locked(&state)
  }

  fn events_locked(&self, state: &CoreState) -> PollEvents {
    let mut events = PollEvents::empty();

    if self.socket_type.can_recv() {
      let readable = !state.pending_in.is_empty()
        || match (self.socket_type, &state.exchange) {
          (SocketType::Req, ExchangeState::AwaitReply { pipe_id }) => {
            state.pipe(*pipe_id).map_or(false, |p| p.has_input())
          }
          (SocketType::Req, _) => false,
          // A subscriber with no filters can never surface a message. With
          // filters, queued input is reported readable even when it may be
          // filtered out on receive.
          (SocketType::Sub | SocketType::XSub, _) => {
            !state.subscriptions.is_empty() && state.pipes.iter().any(|p| p.has_input())
          }
          _ => state.pipes.iter().any(|p| p.has_input()),
        };
      if readable {
        events |= PollEvents::READABLE;
      }
    }

    if self.socket_type.can_send() {
      let writable = match self.socket_type {
        // Fan-out and routed sends drop rather than block.
        SocketType::Pub | SocketType::XPub | SocketType::XSub | SocketType::Surveyor | SocketType::Router => true,
        SocketType::Rep | SocketType::Respondent => {
          matches!(state.exchange, ExchangeState::Replying { .. })
        }
        SocketType::Req => {
          matches!(state.exchange, ExchangeState::Idle) && state.pipes.iter().any(|p| p.can_send())
        }
        _ => state.pipes.iter().any(|p| p.can_send()),
      };
      if writable {
        events |= PollEvents::WRITABLE;
      }
    }

    events
  }

  /// Channel handles the poller waits on for this socket's interest set.
  pub(crate) fn wait_handles(&self) -> (Vec<Receiver<Vec<Msg>>>, Vec<Sender<Vec<Msg>>>) {
    let state = self.state.lock();
    (
      state.pipes.iter().map(|p| p.receiver.clone()).collect(),
      state.pipes.iter().map(|p| p.sender.clone()).collect(),
    )
  }

  #[cfg(test)]
  pub(crate) fn inject_pending_frames(&self, frames: Vec<Msg>) {
    let mut state = self.state.lock();
    state.pending_in.extend(frames);
  }

  #[cfg(test)]
  pub(crate) fn pipe_count(&self) -> usize {
    self.state.lock().pipes.len()
  }
}

/// Sets MORE on every frame but the last, clears it on the last. The frame
/// flags on the wire always describe the assembled logical message, no
/// matter what the caller set.
fn normalize_more_flags(parts: &mut [Msg]) {
  let last = parts.len().saturating_sub(1);
  for (i, msg) in parts.iter_mut().enumerate() {
    if i < last {
      msg.set_flags(msg.flags() | MsgFlags::MORE);
    } else {
      msg.set_flags(msg.flags() - MsgFlags::MORE);
    }
  }
}

fn delimiter_frame() -> Msg {
  let mut frame = Msg::new();
  frame.set_flags(MsgFlags::MORE);
  frame
}

fn wait_any_recv(receivers: &[Receiver<Vec<Msg>>], timeout: Duration) {
  if receivers.is_empty() {
    std::thread::sleep(timeout);
    return;
  }
  let mut select = Select::new();
  for receiver in receivers {
    select.recv(receiver);
  }
  let _ = select.ready_timeout(timeout);
}

fn wait_any_send(senders: &[Sender<Vec<Msg>>], timeout: Duration) {
  if senders.is_empty() {
    std::thread::sleep(timeout);
    return;
  }
  let mut select = Select::new();
  for sender in senders {
    select.send(sender);
  }
  let _ = select.ready_timeout(timeout);
}

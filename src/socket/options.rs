// src/socket/options.rs

use crate::error::ZmxError;
use crate::message::Blob;
use crate::socket::types::SocketType;

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::time::Duration;

// Option identifiers. Values are kept consistent with the wrapped protocol's
// numbering so errno-style callers and counterpart implementations agree.
pub const AFFINITY: i32 = 4;
pub const IDENTITY: i32 = 5;
pub const SUBSCRIBE: i32 = 6;
pub const UNSUBSCRIBE: i32 = 7;
pub const RATE: i32 = 8;
pub const RECOVERY_IVL: i32 = 9;
pub const SNDBUF: i32 = 11;
pub const RCVBUF: i32 = 12;
pub const RCVMORE: i32 = 13;
pub const EVENTS: i32 = 15;
pub const TYPE: i32 = 16;
pub const LINGER: i32 = 17;
pub const RECONNECT_IVL: i32 = 18;
pub const BACKLOG: i32 = 19;
pub const RECONNECT_IVL_MAX: i32 = 21;
pub const MAXMSGSIZE: i32 = 22;
pub const SNDHWM: i32 = 23;
pub const RCVHWM: i32 = 24;
pub const RCVTIMEO: i32 = 27;
pub const SNDTIMEO: i32 = 28;

/// Byte-string options (identities, topic filters) cannot exceed this.
pub const MAX_OPTION_BYTES: usize = 255;

/// Wire-level value kind of a socket option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
  Int32,
  Int64,
  Bytes,
}

/// A typed socket-option value. Replaces integer-tag dispatch with a proper
/// sum type; the kind is checked against the option table on every access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
  Int32(i32),
  Int64(i64),
  Bytes(Blob),
}

impl OptionValue {
  pub fn kind(&self) -> OptionKind {
    match self {
      OptionValue::Int32(_) => OptionKind::Int32,
      OptionValue::Int64(_) => OptionKind::Int64,
      OptionValue::Bytes(_) => OptionKind::Bytes,
    }
  }

  pub fn as_i32(&self) -> Option<i32> {
    match self {
      OptionValue::Int32(v) => Some(*v),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      OptionValue::Int64(v) => Some(*v),
      _ => None,
    }
  }

  pub fn as_bytes(&self) -> Option<&[u8]> {
    match self {
      OptionValue::Bytes(b) => Some(b.as_ref()),
      _ => None,
    }
  }
}

impl From<i32> for OptionValue {
  fn from(v: i32) -> Self {
    OptionValue::Int32(v)
  }
}

impl From<i64> for OptionValue {
  fn from(v: i64) -> Self {
    OptionValue::Int64(v)
  }
}

impl From<&[u8]> for OptionValue {
  fn from(v: &[u8]) -> Self {
    OptionValue::Bytes(Blob::from_slice(v))
  }
}

impl From<Vec<u8>> for OptionValue {
  fn from(v: Vec<u8>) -> Self {
    OptionValue::Bytes(Blob::from(v))
  }
}

impl From<&str> for OptionValue {
  fn from(v: &str) -> Self {
    OptionValue::Bytes(Blob::from_slice(v.as_bytes()))
  }
}

impl From<Blob> for OptionValue {
  fn from(v: Blob) -> Self {
    OptionValue::Bytes(v)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionAccess {
  ReadWrite,
  ReadOnly,
  WriteOnly,
}

#[derive(Debug, Clone, Copy)]
struct OptionEntry {
  kind: OptionKind,
  access: OptionAccess,
}

impl OptionEntry {
  const fn rw(kind: OptionKind) -> Self {
    Self {
      kind,
      access: OptionAccess::ReadWrite,
    }
  }
  const fn ro(kind: OptionKind) -> Self {
    Self {
      kind,
      access: OptionAccess::ReadOnly,
    }
  }
  const fn wo(kind: OptionKind) -> Self {
    Self {
      kind,
      access: OptionAccess::WriteOnly,
    }
  }
}

// Options every socket type carries.
static BASE_OPTIONS: Lazy<HashMap<i32, OptionEntry>> = Lazy::new(|| {
  HashMap::from([
    (AFFINITY, OptionEntry::rw(OptionKind::Int64)),
    (RATE, OptionEntry::rw(OptionKind::Int32)),
    (RECOVERY_IVL, OptionEntry::rw(OptionKind::Int32)),
    (SNDBUF, OptionEntry::rw(OptionKind::Int32)),
    (RCVBUF, OptionEntry::rw(OptionKind::Int32)),
    (RCVMORE, OptionEntry::ro(OptionKind::Int32)),
    (EVENTS, OptionEntry::ro(OptionKind::Int32)),
    (TYPE, OptionEntry::ro(OptionKind::Int32)),
    (LINGER, OptionEntry::rw(OptionKind::Int32)),
    (RECONNECT_IVL, OptionEntry::rw(OptionKind::Int32)),
    (BACKLOG, OptionEntry::rw(OptionKind::Int32)),
    (RECONNECT_IVL_MAX, OptionEntry::rw(OptionKind::Int32)),
    (MAXMSGSIZE, OptionEntry::rw(OptionKind::Int64)),
    (SNDHWM, OptionEntry::rw(OptionKind::Int32)),
    (RCVHWM, OptionEntry::rw(OptionKind::Int32)),
    (RCVTIMEO, OptionEntry::rw(OptionKind::Int32)),
    (SNDTIMEO, OptionEntry::rw(OptionKind::Int32)),
  ])
});

/// Per-instance registry mapping option ids to their value kind and access.
/// Assembled once at socket construction: the base table extended with the
/// capabilities the socket type actually has.
#[derive(Debug, Clone)]
pub(crate) struct OptionTable {
  entries: HashMap<i32, OptionEntry>,
}

impl OptionTable {
  fn base() -> Self {
    Self {
      entries: BASE_OPTIONS.clone(),
    }
  }

  fn with_identity(mut self) -> Self {
    self.entries.insert(IDENTITY, OptionEntry::rw(OptionKind::Bytes));
    self
  }

  fn with_subscriptions(mut self) -> Self {
    self.entries.insert(SUBSCRIBE, OptionEntry::wo(OptionKind::Bytes));
    self.entries.insert(UNSUBSCRIBE, OptionEntry::wo(OptionKind::Bytes));
    self
  }

  /// Builds the option table for a socket type.
  pub(crate) fn for_socket_type(socket_type: SocketType) -> Self {
    let mut table = Self::base();
    if socket_type.supports_identity() {
      table = table.with_identity();
    }
    if socket_type.supports_subscriptions() {
      table = table.with_subscriptions();
    }
    table
  }

  fn entry(&self, option: i32) -> Result<&OptionEntry, ZmxError> {
    match self.entries.get(&option) {
      Some(entry) => Ok(entry),
      // Known id that this socket type does not carry vs. an id nobody has.
      None if known_option(option) => Err(ZmxError::UnsupportedOption(option)),
      None => Err(ZmxError::InvalidOption(option)),
    }
  }

  /// Validates a write: the id must be in the table, writable, and the value
  /// must match the declared kind (byte strings bounded to 255).
  pub(crate) fn validate_set(&self, option: i32, value: &OptionValue) -> Result<(), ZmxError> {
    let entry = self.entry(option)?;
    if entry.access == OptionAccess::ReadOnly {
      return Err(ZmxError::InvalidOption(option));
    }
    if entry.kind != value.kind() {
      return Err(ZmxError::InvalidOptionValue(option));
    }
    if let OptionValue::Bytes(b) = value {
      if b.size() > MAX_OPTION_BYTES {
        return Err(ZmxError::InvalidOptionValue(option));
      }
    }
    Ok(())
  }

  /// Validates a read and returns the declared kind.
  pub(crate) fn validate_get(&self, option: i32) -> Result<OptionKind, ZmxError> {
    let entry = self.entry(option)?;
    if entry.access == OptionAccess::WriteOnly {
      return Err(ZmxError::InvalidOption(option));
    }
    Ok(entry.kind)
  }
}

fn known_option(option: i32) -> bool {
  matches!(
    option,
    AFFINITY
      | IDENTITY
      | SUBSCRIBE
      | UNSUBSCRIBE
      | RATE
      | RECOVERY_IVL
      | SNDBUF
      | RCVBUF
      | RCVMORE
      | EVENTS
      | TYPE
      | LINGER
      | RECONNECT_IVL
      | BACKLOG
      | RECONNECT_IVL_MAX
      | MAXMSGSIZE
      | SNDHWM
      | RCVHWM
      | RCVTIMEO
      | SNDTIMEO
  )
}

/// Holds parsed and validated socket options.
#[derive(Debug, Clone)]
pub(crate) struct SocketOptions {
  pub affinity: i64,
  pub identity: Blob,
  pub rate: i32,
  pub recovery_ivl: i32,
  pub sndbuf: i32,
  pub rcvbuf: i32,
  pub linger: i32,
  pub reconnect_ivl: i32,
  pub backlog: i32,
  pub reconnect_ivl_max: i32,
  pub maxmsgsize: i64,
  pub sndhwm: i32,
  pub rcvhwm: i32,
  pub rcvtimeo: i32,
  pub sndtimeo: i32,
}

impl Default for SocketOptions {
  fn default() -> Self {
    Self {
      affinity: 0,
      identity: Blob::new(),
      rate: 100,
      recovery_ivl: 10_000,
      sndbuf: 0,
      rcvbuf: 0,
      linger: 0,
      reconnect_ivl: 100,
      backlog: 100,
      reconnect_ivl_max: 0,
      maxmsgsize: -1,
      sndhwm: 1000,
      rcvhwm: 1000,
      rcvtimeo: -1,
      sndtimeo: -1,
    }
  }
}

impl SocketOptions {
  /// Stores a value that already passed table validation. Range checks for
  /// the individual option live here.
  pub(crate) fn store(&mut self, option: i32, value: OptionValue) -> Result<(), ZmxError> {
    let invalid = || ZmxError::InvalidOptionValue(option);
    match option {
      AFFINITY => self.affinity = value.as_i64().ok_or_else(invalid)?,
      IDENTITY => {
        // Empty identity means "let the engine generate one at attach".
        self.identity = match value {
          OptionValue::Bytes(b) => b,
          _ => return Err(invalid()),
        };
      }
      RATE => self.rate = non_negative(value.as_i32(), invalid)?,
      RECOVERY_IVL => self.recovery_ivl = non_negative(value.as_i32(), invalid)?,
      SNDBUF => self.sndbuf = non_negative(value.as_i32(), invalid)?,
      RCVBUF => self.rcvbuf = non_negative(value.as_i32(), invalid)?,
      LINGER => self.linger = at_least_minus_one(value.as_i32(), invalid)?,
      RECONNECT_IVL => self.reconnect_ivl = non_negative(value.as_i32(), invalid)?,
      BACKLOG => self.backlog = non_negative(value.as_i32(), invalid)?,
      RECONNECT_IVL_MAX => self.reconnect_ivl_max = non_negative(value.as_i32(), invalid)?,
      MAXMSGSIZE => self.maxmsgsize = value.as_i64().ok_or_else(invalid)?,
      SNDHWM => self.sndhwm = non_negative(value.as_i32(), invalid)?,
      RCVHWM => self.rcvhwm = non_negative(value.as_i32(), invalid)?,
      RCVTIMEO => self.rcvtimeo = at_least_minus_one(value.as_i32(), invalid)?,
      SNDTIMEO => self.sndtimeo = at_least_minus_one(value.as_i32(), invalid)?,
      _ => return Err(ZmxError::InvalidOption(option)),
    }
    Ok(())
  }

  /// Reads back a stored value. Virtual options (RCVMORE, EVENTS, TYPE) are
  /// answered by the socket core, not here.
  pub(crate) fn fetch(&self, option: i32) -> Result<OptionValue, ZmxError> {
    let value = match option {
      AFFINITY => OptionValue::Int64(self.affinity),
      IDENTITY => OptionValue::Bytes(self.identity.clone()),
      RATE => OptionValue::Int32(self.rate),
      RECOVERY_IVL => OptionValue::Int32(self.recovery_ivl),
      SNDBUF => OptionValue::Int32(self.sndbuf),
      RCVBUF => OptionValue::Int32(self.rcvbuf),
      LINGER => OptionValue::Int32(self.linger),
      RECONNECT_IVL => OptionValue::Int32(self.reconnect_ivl),
      BACKLOG => OptionValue::Int32(self.backlog),
      RECONNECT_IVL_MAX => OptionValue::Int32(self.reconnect_ivl_max),
      MAXMSGSIZE => OptionValue::Int64(self.maxmsgsize),
      SNDHWM => OptionValue::Int32(self.sndhwm),
      RCVHWM => OptionValue::Int32(self.rcvhwm),
      RCVTIMEO => OptionValue::Int32(self.rcvtimeo),
      SNDTIMEO => OptionValue::Int32(self.sndtimeo),
      _ => return Err(ZmxError::InvalidOption(option)),
    };
    Ok(value)
  }

  /// Receive timeout as a deadline duration. `None` blocks indefinitely,
  /// `Some(ZERO)` means immediate (would-block semantics).
  pub(crate) fn recv_timeout(&self) -> Option<Duration> {
    timeout_ms(self.rcvtimeo)
  }

  /// Send timeout, same convention as `recv_timeout`.
  pub(crate) fn send_timeout(&self) -> Option<Duration> {
    timeout_ms(self.sndtimeo)
  }
}

fn timeout_ms(value: i32) -> Option<Duration> {
  match value {
    -1 => None,
    ms => Some(Duration::from_millis(ms.max(0) as u64)),
  }
}

fn non_negative(value: Option<i32>, err: impl Fn() -> ZmxError) -> Result<i32, ZmxError> {
  match value {
    Some(v) if v >= 0 => Ok(v),
    _ => Err(err()),
  }
}

fn at_least_minus_one(value: Option<i32>, err: impl Fn() -> ZmxError) -> Result<i32, ZmxError> {
  match value {
    Some(v) if v >= -1 => Ok(v),
    _ => Err(err()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_table_excludes_capability_options() {
    let table = OptionTable::for_socket_type(SocketType::Push);
    assert!(matches!(
      table.validate_set(SUBSCRIBE, &OptionValue::from("topic")),
      Err(ZmxError::UnsupportedOption(SUBSCRIBE))
    ));
  }

  #[test]
  fn subscription_capability_is_added_for_sub() {
    let table = OptionTable::for_socket_type(SocketType::Sub);
    assert!(table.validate_set(SUBSCRIBE, &OptionValue::from("topic")).is_ok());
    // Write-only: reading a topic filter back is meaningless.
    assert!(table.validate_get(SUBSCRIBE).is_err());
  }

  #[test]
  fn kind_mismatch_is_rejected() {
    let table = OptionTable::for_socket_type(SocketType::Dealer);
    assert!(matches!(
      table.validate_set(SNDHWM, &OptionValue::Int64(5)),
      Err(ZmxError::InvalidOptionValue(SNDHWM))
    ));
    assert!(matches!(
      table.validate_set(AFFINITY, &OptionValue::Int32(5)),
      Err(ZmxError::InvalidOptionValue(AFFINITY))
    ));
  }

  #[test]
  fn oversized_byte_option_is_rejected() {
    let table = OptionTable::for_socket_type(SocketType::Dealer);
    let oversized = vec![0u8; MAX_OPTION_BYTES + 1];
    assert!(matches!(
      table.validate_set(IDENTITY, &OptionValue::from(oversized)),
      Err(ZmxError::InvalidOptionValue(IDENTITY))
    ));
    let bounded = vec![0u8; MAX_OPTION_BYTES];
    assert!(table.validate_set(IDENTITY, &OptionValue::from(bounded)).is_ok());
  }

  #[test]
  fn read_only_options_reject_writes() {
    let table = OptionTable::for_socket_type(SocketType::Pull);
    assert!(table.validate_set(RCVMORE, &OptionValue::Int32(0)).is_err());
    assert!(table.validate_set(EVENTS, &OptionValue::Int32(0)).is_err());
    assert!(table.validate_get(RCVMORE).is_ok());
  }

  #[test]
  fn unknown_option_id_is_invalid() {
    let table = OptionTable::for_socket_type(SocketType::Pull);
    assert!(matches!(
      table.validate_get(9999),
      Err(ZmxError::InvalidOption(9999))
    ));
  }

  #[test]
  fn store_fetch_round_trip_all_kinds() {
    let mut opts = SocketOptions::default();
    opts.store(SNDHWM, OptionValue::Int32(42)).unwrap();
    opts.store(AFFINITY, OptionValue::Int64(1 << 40)).unwrap();
    opts.store(IDENTITY, OptionValue::from("worker-7")).unwrap();
    assert_eq!(opts.fetch(SNDHWM).unwrap(), OptionValue::Int32(42));
    assert_eq!(opts.fetch(AFFINITY).unwrap(), OptionValue::Int64(1 << 40));
    assert_eq!(
      opts.fetch(IDENTITY).unwrap().as_bytes().unwrap(),
      b"worker-7"
    );
  }

  #[test]
  fn negative_timeout_values_other_than_minus_one_fail() {
    let mut opts = SocketOptions::default();
    assert!(opts.store(RCVTIMEO, OptionValue::Int32(-2)).is_err());
    assert!(opts.store(RCVTIMEO, OptionValue::Int32(-1)).is_ok());
    assert_eq!(opts.recv_timeout(), None);
    opts.store(RCVTIMEO, OptionValue::Int32(250)).unwrap();
    assert_eq!(opts.recv_timeout(), Some(Duration::from_millis(250)));
  }
}

use crate::error::ZmxError;
use crate::message::flags::MsgFlags;
use bytes::Bytes;
use std::fmt;

/// Represents a single message part (frame).
///
/// A `Msg` is open until `close()` releases its buffer. Every operation
/// other than `close()` fails with `UseAfterClose` on a closed message;
/// `close()` itself is idempotent. Dropping an open `Msg` releases the
/// buffer the same way - `close()` is the explicit path, scope exit the
/// guaranteed one.
#[derive(Clone, Default)]
pub struct Msg {
  // Use Bytes for efficient slicing and cloning (reference counted)
  data: Option<Bytes>,
  flags: MsgFlags,
  closed: bool,
}

impl Msg {
  /// Creates an empty, open message with no data.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates a message from a `Vec<u8>`, taking ownership.
  pub fn from_vec(data: Vec<u8>) -> Self {
    Self {
      data: Some(Bytes::from(data)),
      ..Default::default()
    }
  }

  /// Creates a message from `bytes::Bytes`.
  pub fn from_bytes(data: Bytes) -> Self {
    Self {
      data: Some(data),
      ..Default::default()
    }
  }

  /// Creates a message from a static byte slice (zero-copy).
  pub fn from_static(data: &'static [u8]) -> Self {
    Self {
      data: Some(Bytes::from_static(data)),
      ..Default::default()
    }
  }

  /// Creates a message whose buffer is sized and populated from the raw
  /// bytes of `text`. Length is the byte length, payloads are not assumed
  /// to be text.
  pub fn from_str_payload(text: &str) -> Self {
    Self {
      data: Some(Bytes::copy_from_slice(text.as_bytes())),
      ..Default::default()
    }
  }

  fn ensure_open(&self) -> Result<(), ZmxError> {
    if self.closed {
      Err(ZmxError::UseAfterClose("message"))
    } else {
      Ok(())
    }
  }

  /// Returns a read-only view over the payload bytes. The view must not be
  /// retained beyond the message's lifetime (the borrow checker enforces
  /// this).
  pub fn data(&self) -> Result<&[u8], ZmxError> {
    self.ensure_open()?;
    Ok(self.data.as_deref().unwrap_or(&[]))
  }

  /// Returns the size of the message payload in bytes.
  pub fn size(&self) -> Result<usize, ZmxError> {
    self.ensure_open()?;
    Ok(self.data.as_ref().map_or(0, |d| d.len()))
  }

  /// Duplicates `other`'s payload into self. The previous payload of self
  /// is released. Both messages must be open.
  pub fn copy_from(&mut self, other: &Msg) -> Result<(), ZmxError> {
    self.ensure_open()?;
    other.ensure_open()?;
    self.data = other.data.clone();
    self.flags = other.flags;
    Ok(())
  }

  /// Transfers `other`'s payload into self, leaving `other` open and empty.
  pub fn take_from(&mut self, other: &mut Msg) -> Result<(), ZmxError> {
    self.ensure_open()?;
    other.ensure_open()?;
    self.data = other.data.take();
    self.flags = other.flags;
    other.flags = MsgFlags::empty();
    Ok(())
  }

  /// Releases the underlying buffer. Idempotent: the second and further
  /// calls are a no-op returning success.
  pub fn close(&mut self) -> Result<(), ZmxError> {
    if !self.closed {
      self.data = None;
      self.closed = true;
    }
    Ok(())
  }

  /// True once `close()` has run.
  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Returns the flags associated with the message.
  pub fn flags(&self) -> MsgFlags {
    self.flags
  }

  /// Sets the flags for the message (e.g., `MsgFlags::MORE`).
  pub fn set_flags(&mut self, flags: MsgFlags) {
    self.flags = flags;
  }

  // --- Flag Helpers ---

  /// Checks if the `MORE` flag is set.
  pub fn is_more(&self) -> bool {
    self.flags.contains(MsgFlags::MORE)
  }

  /// Checks if the `COMMAND` flag is set.
  pub fn is_command(&self) -> bool {
    self.flags.contains(MsgFlags::COMMAND)
  }

  /// Returns the internal `Bytes` object if data is present. Cloning
  /// `Bytes` is cheap as it is reference-counted.
  pub fn data_bytes(&self) -> Option<Bytes> {
    if self.closed {
      return None;
    }
    self.data.clone()
  }
}

impl From<&str> for Msg {
  fn from(text: &str) -> Self {
    Msg::from_str_payload(text)
  }
}

impl From<String> for Msg {
  fn from(text: String) -> Self {
    Msg::from_vec(text.into_bytes())
  }
}

impl From<Vec<u8>> for Msg {
  fn from(data: Vec<u8>) -> Self {
    Msg::from_vec(data)
  }
}

impl fmt::Debug for Msg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Msg")
      .field("size", &self.data.as_ref().map_or(0, |d| d.len()))
      .field("flags", &self.flags)
      .field("closed", &self.closed)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn close_is_idempotent() {
    let mut msg = Msg::from_vec(b"payload".to_vec());
    assert!(msg.close().is_ok());
    assert!(msg.close().is_ok());
    assert!(msg.is_closed());
  }

  #[test]
  fn operations_after_close_fail_deterministically() {
    let mut msg = Msg::from_vec(b"payload".to_vec());
    msg.close().unwrap();
    assert!(matches!(msg.data(), Err(ZmxError::UseAfterClose("message"))));
    assert!(matches!(msg.size(), Err(ZmxError::UseAfterClose("message"))));
    let mut dst = Msg::new();
    assert!(matches!(
      dst.copy_from(&msg),
      Err(ZmxError::UseAfterClose("message"))
    ));
  }

  #[test]
  fn copy_duplicates_payload() {
    let src = Msg::from_vec(b"abc".to_vec());
    let mut dst = Msg::new();
    dst.copy_from(&src).unwrap();
    assert_eq!(dst.data().unwrap(), b"abc");
    assert_eq!(src.data().unwrap(), b"abc");
  }

  #[test]
  fn take_transfers_and_empties_source() {
    let mut src = Msg::from_vec(b"abc".to_vec());
    src.set_flags(MsgFlags::MORE);
    let mut dst = Msg::new();
    dst.take_from(&mut src).unwrap();
    assert_eq!(dst.data().unwrap(), b"abc");
    assert!(dst.is_more());
    assert_eq!(src.size().unwrap(), 0);
    assert!(!src.is_more());
    assert!(!src.is_closed());
  }

  #[test]
  fn byte_length_is_raw_not_textual() {
    let msg = Msg::from_str_payload("héllo");
    assert_eq!(msg.size().unwrap(), 6); // 5 chars, 6 bytes
  }
}

// tests/socket_options.rs

use zmx::socket::options::{
  AFFINITY, EVENTS, IDENTITY, RCVMORE, SNDHWM, SUBSCRIBE, TYPE,
};
use zmx::{OptionValue, PollEvents, RecvFlags, SendFlags, SocketType, ZmxError};
mod common;

#[test]
fn round_trip_for_each_value_kind() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let socket = ctx.socket(SocketType::Dealer)?;

  socket.set_option(SNDHWM, 42)?;
  assert_eq!(socket.get_option(SNDHWM)?, OptionValue::Int32(42));

  socket.set_option(AFFINITY, 3i64 << 33)?;
  assert_eq!(socket.get_option(AFFINITY)?, OptionValue::Int64(3i64 << 33));

  socket.set_option(IDENTITY, "service-9")?;
  assert_eq!(socket.identity()?.as_ref(), b"service-9");
  Ok(())
}

#[test]
fn oversized_identity_is_rejected_and_previous_value_kept() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let socket = ctx.socket(SocketType::Dealer)?;

  socket.set_identity("short")?;
  let oversized = vec![b'x'; 300];
  assert!(matches!(
    socket.set_option(IDENTITY, oversized),
    Err(ZmxError::InvalidOptionValue(IDENTITY))
  ));
  assert_eq!(socket.identity()?.as_ref(), b"short");
  Ok(())
}

#[test]
fn kind_mismatches_are_rejected() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let socket = ctx.socket(SocketType::Dealer)?;

  assert!(matches!(
    socket.set_option(SNDHWM, "not an int"),
    Err(ZmxError::InvalidOptionValue(SNDHWM))
  ));
  assert!(matches!(
    socket.set_option(AFFINITY, 1i32),
    Err(ZmxError::InvalidOptionValue(AFFINITY))
  ));
  Ok(())
}

#[test]
fn capability_options_follow_the_socket_type() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let push = ctx.socket(SocketType::Push)?;
  let publisher = ctx.socket(SocketType::Pub)?;

  // Subscription filters only exist on subscribing patterns.
  assert!(matches!(
    push.set_option(SUBSCRIBE, "topic"),
    Err(ZmxError::UnsupportedOption(SUBSCRIBE))
  ));
  // Identity has no meaning on the pub/sub fan-out side.
  assert!(matches!(
    publisher.set_option(IDENTITY, "who"),
    Err(ZmxError::UnsupportedOption(IDENTITY))
  ));
  Ok(())
}

#[test]
fn virtual_options_report_live_state() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let push = ctx.socket(SocketType::Push)?;
  let pull = ctx.socket(SocketType::Pull)?;
  let endpoint = common::unique_inproc_endpoint();

  pull.bind(&endpoint)?;
  push.connect(&endpoint)?;

  assert_eq!(pull.get_option(TYPE)?, OptionValue::Int32(SocketType::Pull.as_raw()));

  // TYPE and EVENTS are read-only.
  assert!(matches!(
    pull.set_option(TYPE, 3),
    Err(ZmxError::InvalidOption(TYPE))
  ));

  // EVENTS mirrors poller readiness.
  let events = push.get_option(EVENTS)?;
  assert_eq!(events, OptionValue::Int32(PollEvents::WRITABLE.bits() as i32));
  assert_eq!(pull.get_option(EVENTS)?, OptionValue::Int32(0));

  push.send_strs(["head", "tail"], SendFlags::empty())?;
  let events = pull.get_option(EVENTS)?.as_i32().unwrap_or(0);
  assert_ne!(events & PollEvents::READABLE.bits() as i32, 0);

  // RCVMORE is normalized to 0/1.
  assert_eq!(pull.get_option(RCVMORE)?, OptionValue::Int32(0));
  let _head = pull.recv(RecvFlags::empty())?;
  assert_eq!(pull.get_option(RCVMORE)?, OptionValue::Int32(1));
  let _tail = pull.recv(RecvFlags::empty())?;
  assert_eq!(pull.get_option(RCVMORE)?, OptionValue::Int32(0));
  Ok(())
}

#[test]
fn unknown_option_ids_are_invalid() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let socket = ctx.socket(SocketType::Pair)?;
  assert!(matches!(
    socket.set_option(4242, 1),
    Err(ZmxError::InvalidOption(4242))
  ));
  assert!(matches!(
    socket.get_option(4242),
    Err(ZmxError::InvalidOption(4242))
  ));
  Ok(())
}

#[test]
fn errno_surface_for_code_branching_callers() {
  // Callers that branch on numeric codes rather than variants rely on the
  // classic values staying put.
  assert_eq!(ZmxError::WouldBlock.errno(), libc_eagain());
  assert_eq!(ZmxError::ContextTerminated.errno(), zmx::error::ETERM);
  assert_eq!(
    ZmxError::InvalidState("efsm").errno(),
    zmx::error::EFSM
  );
}

fn libc_eagain() -> i32 {
  11 // EAGAIN on every platform this engine targets
}

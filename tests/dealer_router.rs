// tests/dealer_router.rs

use zmx::{Msg, RecvFlags, SendFlags, SocketType, ZmxError};
mod common;

#[test]
fn router_prefixes_the_peer_identity() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let dealer = ctx.socket(SocketType::Dealer)?;
  let router = ctx.socket(SocketType::Router)?;
  let endpoint = common::unique_inproc_endpoint();

  dealer.set_identity("dealer-1")?;
  router.bind(&endpoint)?;
  dealer.connect(&endpoint)?;

  dealer.send_str("work", SendFlags::empty())?;

  let parts = router.recv_parts(RecvFlags::empty())?;
  assert_eq!(parts.len(), 2);
  assert_eq!(parts[0].data()?, b"dealer-1");
  assert!(parts[0].is_more());
  assert_eq!(parts[1].data()?, b"work");
  assert!(!parts[1].is_more());
  Ok(())
}

#[test]
fn envelope_splits_at_the_first_empty_frame() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let dealer = ctx.socket(SocketType::Dealer)?;
  let router = ctx.socket(SocketType::Router)?;
  let endpoint = common::unique_inproc_endpoint();

  dealer.set_identity("envelope-test")?;
  router.bind(&endpoint)?;
  dealer.connect(&endpoint)?;

  dealer.send_strs(["e1", "e2", "", "b1", "b2"], SendFlags::empty())?;

  let (envelope, body) = router.recv_multipart(RecvFlags::empty())?;
  // The routing identity leads, then the application frames up to and
  // including the zero-length delimiter.
  let envelope_data: Vec<&[u8]> = envelope.iter().map(|m| m.data().unwrap()).collect();
  assert_eq!(envelope_data, vec![b"envelope-test" as &[u8], b"e1", b"e2", b""]);
  let body_data: Vec<&[u8]> = body.iter().map(|m| m.data().unwrap()).collect();
  assert_eq!(body_data, vec![b"b1" as &[u8], b"b2"]);
  Ok(())
}

#[test]
fn envelope_split_without_delimiter_is_all_body() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let push = ctx.socket(SocketType::Push)?;
  let pull = ctx.socket(SocketType::Pull)?;
  let endpoint = common::unique_inproc_endpoint();

  pull.bind(&endpoint)?;
  push.connect(&endpoint)?;
  push.send_strs(["b1", "b2"], SendFlags::empty())?;

  let (envelope, body) = pull.recv_multipart(RecvFlags::empty())?;
  assert!(envelope.is_empty());
  assert_eq!(body.len(), 2);
  Ok(())
}

#[test]
fn router_routes_replies_by_identity() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let router = ctx.socket(SocketType::Router)?;
  let dealer_a = ctx.socket(SocketType::Dealer)?;
  let dealer_b = ctx.socket(SocketType::Dealer)?;
  let endpoint = common::unique_inproc_endpoint();

  dealer_a.set_identity("worker-a")?;
  dealer_b.set_identity("worker-b")?;
  router.bind(&endpoint)?;
  dealer_a.connect(&endpoint)?;
  dealer_b.connect(&endpoint)?;

  dealer_a.send_str("ready", SendFlags::empty())?;
  dealer_b.send_str("ready", SendFlags::empty())?;

  // Drain both readiness messages, then address each worker explicitly.
  for _ in 0..2 {
    let parts = router.recv_parts(RecvFlags::empty())?;
    assert_eq!(parts[1].data()?, b"ready");
  }

  router.send_parts(
    vec![Msg::from_static(b"worker-b"), Msg::from_static(b"task for b")],
    SendFlags::empty(),
  )?;
  router.send_parts(
    vec![Msg::from_static(b"worker-a"), Msg::from_static(b"task for a")],
    SendFlags::empty(),
  )?;

  assert_eq!(dealer_a.recv_string(RecvFlags::empty())?, "task for a");
  assert_eq!(dealer_b.recv_string(RecvFlags::empty())?, "task for b");
  Ok(())
}

#[test]
fn unroutable_message_is_dropped_not_an_error() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let router = ctx.socket(SocketType::Router)?;
  let dealer = ctx.socket(SocketType::Dealer)?;
  let endpoint = common::unique_inproc_endpoint();

  dealer.set_identity("present")?;
  router.bind(&endpoint)?;
  dealer.connect(&endpoint)?;

  // Default (non-mandatory) routing: an unknown destination is silently
  // dropped, the call itself succeeds.
  router.send_parts(
    vec![Msg::from_static(b"absent"), Msg::from_static(b"lost")],
    SendFlags::empty(),
  )?;
  assert!(matches!(
    dealer.recv(RecvFlags::DONT_WAIT),
    Err(ZmxError::WouldBlock)
  ));
  Ok(())
}

#[test]
fn dealer_to_dealer_round_trip() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let left = ctx.socket(SocketType::Dealer)?;
  let right = ctx.socket(SocketType::Dealer)?;
  let endpoint = common::unique_inproc_endpoint();

  left.bind(&endpoint)?;
  right.connect(&endpoint)?;

  left.send_str("ltr", SendFlags::empty())?;
  assert_eq!(right.recv_string(RecvFlags::empty())?, "ltr");
  right.send_str("rtl", SendFlags::empty())?;
  assert_eq!(left.recv_string(RecvFlags::empty())?, "rtl");
  Ok(())
}

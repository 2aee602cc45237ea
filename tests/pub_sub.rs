// tests/pub_sub.rs

use zmx::socket::options::{SUBSCRIBE, UNSUBSCRIBE};
use zmx::{Msg, MsgFlags, RecvFlags, SendFlags, SocketType, ZmxError};
mod common;

#[test]
fn subscribers_filter_by_prefix() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;
  let endpoint = common::unique_inproc_endpoint();

  publisher.bind(&endpoint)?;
  subscriber.connect(&endpoint)?;
  subscriber.set_option(SUBSCRIBE, "weather.")?;

  publisher.send_str("weather.london sunny", SendFlags::empty())?;
  publisher.send_str("sports.cricket rained off", SendFlags::empty())?;
  publisher.send_str("weather.oslo snow", SendFlags::empty())?;

  assert_eq!(subscriber.recv_string(RecvFlags::empty())?, "weather.london sunny");
  assert_eq!(subscriber.recv_string(RecvFlags::empty())?, "weather.oslo snow");
  assert!(matches!(
    subscriber.recv(RecvFlags::DONT_WAIT),
    Err(ZmxError::WouldBlock)
  ));
  Ok(())
}

#[test]
fn unsubscribed_sockets_receive_nothing() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;
  let endpoint = common::unique_inproc_endpoint();

  publisher.bind(&endpoint)?;
  subscriber.connect(&endpoint)?;

  publisher.send_str("anything", SendFlags::empty())?;
  assert!(matches!(
    subscriber.recv(RecvFlags::DONT_WAIT),
    Err(ZmxError::WouldBlock)
  ));
  Ok(())
}

#[test]
fn empty_subscription_matches_everything() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;
  let endpoint = common::unique_inproc_endpoint();

  publisher.bind(&endpoint)?;
  subscriber.connect(&endpoint)?;
  subscriber.set_option(SUBSCRIBE, "")?;

  publisher.send_str("any topic at all", SendFlags::empty())?;
  assert_eq!(subscriber.recv_string(RecvFlags::empty())?, "any topic at all");
  Ok(())
}

#[test]
fn unsubscribe_restores_filtering() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;
  let endpoint = common::unique_inproc_endpoint();

  publisher.bind(&endpoint)?;
  subscriber.connect(&endpoint)?;
  subscriber.set_option(SUBSCRIBE, "topic")?;

  publisher.send_str("topic one", SendFlags::empty())?;
  assert_eq!(subscriber.recv_string(RecvFlags::empty())?, "topic one");

  subscriber.set_option(UNSUBSCRIBE, "topic")?;
  publisher.send_str("topic two", SendFlags::empty())?;
  assert!(matches!(
    subscriber.recv(RecvFlags::DONT_WAIT),
    Err(ZmxError::WouldBlock)
  ));
  Ok(())
}

#[test]
fn fan_out_reaches_every_matching_subscriber() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let sub_a = ctx.socket(SocketType::Sub)?;
  let sub_b = ctx.socket(SocketType::Sub)?;
  let endpoint = common::unique_inproc_endpoint();

  publisher.bind(&endpoint)?;
  sub_a.connect(&endpoint)?;
  sub_b.connect(&endpoint)?;
  sub_a.set_option(SUBSCRIBE, "")?;
  sub_b.set_option(SUBSCRIBE, "")?;

  publisher.send_str("broadcast", SendFlags::empty())?;
  assert_eq!(sub_a.recv_string(RecvFlags::empty())?, "broadcast");
  assert_eq!(sub_b.recv_string(RecvFlags::empty())?, "broadcast");
  Ok(())
}

#[test]
fn multipart_filtering_drops_whole_messages() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;
  let endpoint = common::unique_inproc_endpoint();

  publisher.bind(&endpoint)?;
  subscriber.connect(&endpoint)?;
  subscriber.set_option(SUBSCRIBE, "match")?;

  // The filter looks at the first frame only; the rest of a rejected
  // message must never surface.
  publisher.send_strs(["miss", "hidden payload"], SendFlags::empty())?;
  publisher.send_strs(["match", "visible payload"], SendFlags::empty())?;

  let parts = subscriber.recv_strings(RecvFlags::empty())?;
  assert_eq!(parts, vec!["match", "visible payload"]);
  assert!(matches!(
    subscriber.recv(RecvFlags::DONT_WAIT),
    Err(ZmxError::WouldBlock)
  ));
  Ok(())
}

#[test]
fn publisher_never_blocks_on_slow_subscribers() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let publisher = ctx.socket(SocketType::Pub)?;
  let subscriber = ctx.socket(SocketType::Sub)?;
  let endpoint = common::unique_inproc_endpoint();

  publisher.set_option(zmx::socket::options::SNDHWM, 1)?;
  subscriber.set_option(zmx::socket::options::RCVHWM, 0)?;
  publisher.bind(&endpoint)?;
  subscriber.connect(&endpoint)?;
  subscriber.set_option(SUBSCRIBE, "")?;

  // Past the watermark the slow subscriber just misses messages; the
  // publisher itself keeps going.
  for i in 0..5 {
    publisher.send_str(&format!("tick {}", i), SendFlags::empty())?;
  }
  assert_eq!(subscriber.recv_string(RecvFlags::empty())?, "tick 0");
  assert!(matches!(
    subscriber.recv(RecvFlags::DONT_WAIT),
    Err(ZmxError::WouldBlock)
  ));
  Ok(())
}

#[test]
fn xpub_sees_explicit_subscription_frames() -> Result<(), ZmxError> {
  let ctx = common::test_context();
  let xpub = ctx.socket(SocketType::XPub)?;
  let xsub = ctx.socket(SocketType::XSub)?;
  let endpoint = common::unique_inproc_endpoint();

  xpub.bind(&endpoint)?;
  xsub.connect(&endpoint)?;
  xsub.set_option(SUBSCRIBE, "feed.")?;

  // XSUB announces its subscription upstream as an explicit control frame
  // (leading 0x01, then the topic), which XPUB receives as a message.
  let mut frame = Msg::from_vec(b"\x01feed.".to_vec());
  frame.set_flags(MsgFlags::COMMAND);
  xsub.send(frame, SendFlags::empty())?;

  let seen = xpub.recv(RecvFlags::empty())?;
  assert_eq!(seen.data()?, b"\x01feed.");

  xpub.send_str("feed.item-1", SendFlags::empty())?;
  assert_eq!(xsub.recv_string(RecvFlags::empty())?, "feed.item-1");
  Ok(())
}

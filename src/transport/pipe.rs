// src/transport/pipe.rs

use crate::message::{Blob, Msg};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

/// One socket's end of an attached connection.
///
/// Pipes carry whole logical messages (`Vec<Msg>`), so a multi-part message
/// either occupies a queue slot in full or is not queued at all; partial
/// logical messages never sit in a pipe. Each end has its own id, unique
/// within the owning context.
#[derive(Debug, Clone)]
pub(crate) struct Pipe {
  pub id: usize,
  pub peer_identity: Blob,
  pub sender: Sender<Vec<Msg>>,
  pub receiver: Receiver<Vec<Msg>>,
}

impl Pipe {
  /// True when the outbound queue has room for another logical message.
  pub fn can_send(&self) -> bool {
    !self.sender.is_full()
  }

  /// True when a logical message is waiting inbound.
  pub fn has_input(&self) -> bool {
    !self.receiver.is_empty()
  }
}

/// Queue depth for one direction. A high-water mark of zero means "no limit".
fn direction_capacity(sndhwm: i32, rcvhwm: i32) -> Option<usize> {
  if sndhwm == 0 && rcvhwm == 0 {
    return None;
  }
  // Writer-side and reader-side watermarks pool into one queue here.
  Some(((sndhwm.max(0) + rcvhwm.max(0)) as usize).max(1))
}

fn channel(capacity: Option<usize>) -> (Sender<Vec<Msg>>, Receiver<Vec<Msg>>) {
  match capacity {
    Some(cap) => bounded(cap),
    None => unbounded(),
  }
}

/// Builds the two ends of a connection between sockets `a` and `b`.
///
/// `a_hwms`/`b_hwms` are each side's (SNDHWM, RCVHWM) at attach time;
/// identities are the values each side will see as `peer_identity`.
pub(crate) fn pipe_pair(
  a_id: usize,
  b_id: usize,
  a_hwms: (i32, i32),
  b_hwms: (i32, i32),
  a_identity: Blob,
  b_identity: Blob,
) -> (Pipe, Pipe) {
  let (a_to_b_tx, a_to_b_rx) = channel(direction_capacity(a_hwms.0, b_hwms.1));
  let (b_to_a_tx, b_to_a_rx) = channel(direction_capacity(b_hwms.0, a_hwms.1));

  let pipe_a = Pipe {
    id: a_id,
    peer_identity: b_identity,
    sender: a_to_b_tx,
    receiver: b_to_a_rx,
  };
  let pipe_b = Pipe {
    id: b_id,
    peer_identity: a_identity,
    sender: b_to_a_tx,
    receiver: a_to_b_rx,
  };
  (pipe_a, pipe_b)
}

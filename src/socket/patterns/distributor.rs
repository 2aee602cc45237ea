// src/socket/patterns/distributor.rs

use std::collections::BTreeSet;

/// Tracks the set of pipes a fan-out send (PUB/XPUB/SURVEYOR) targets.
///
/// Ordered so distribution order is deterministic; the actual send and its
/// drop-on-full policy live in the socket core, which owns the pipe senders.
#[derive(Debug, Default)]
pub(crate) struct Distributor {
  peers: BTreeSet<usize>,
}

impl Distributor {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a peer pipe.
  pub fn add_pipe(&mut self, pipe_id: usize) {
    if self.peers.insert(pipe_id) {
      tracing::trace!(pipe_id, "Distributor added pipe");
    }
  }

  /// Removes a peer pipe.
  pub fn remove_pipe(&mut self, pipe_id: usize) {
    if self.peers.remove(&pipe_id) {
      tracing::trace!(pipe_id, "Distributor removed pipe");
    }
  }

  /// Snapshot of the current peer set, in id order.
  pub fn pipe_ids(&self) -> Vec<usize> {
    self.peers.iter().copied().collect()
  }

  pub fn is_empty(&self) -> bool {
    self.peers.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn peer_set_is_deduplicated_and_ordered() {
    let mut dist = Distributor::new();
    dist.add_pipe(3);
    dist.add_pipe(1);
    dist.add_pipe(3);
    assert_eq!(dist.pipe_ids(), vec![1, 3]);
    dist.remove_pipe(1);
    assert_eq!(dist.pipe_ids(), vec![3]);
  }
}

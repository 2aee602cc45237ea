// src/socket/patterns/router.rs

use crate::message::Blob;
use std::collections::HashMap;

/// Maps peer identities to pipe IDs and back.
/// Used by ROUTER sockets to send messages to specific peers and to prefix
/// received messages with their origin.
#[derive(Debug, Default)]
pub(crate) struct RouterMap {
  identity_to_pipe: HashMap<Blob, usize>,
  pipe_to_identity: HashMap<usize, Blob>,
}

impl RouterMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or updates the mapping for a peer. An identity collision evicts
  /// the previous pipe from the forward map (last attach wins).
  pub fn add_peer(&mut self, identity: Blob, pipe_id: usize) {
    if let Some(old_pipe) = self.identity_to_pipe.insert(identity.clone(), pipe_id) {
      if old_pipe != pipe_id {
        self.pipe_to_identity.remove(&old_pipe);
        tracing::warn!(?identity, old_pipe, new_pipe = pipe_id, "RouterMap identity collision, overwriting");
      }
    }
    self.pipe_to_identity.insert(pipe_id, identity);
  }

  /// Removes a peer mapping by pipe ID (on detachment).
  pub fn remove_pipe(&mut self, pipe_id: usize) {
    if let Some(identity) = self.pipe_to_identity.remove(&pipe_id) {
      self.identity_to_pipe.remove(&identity);
      tracing::trace!(?identity, pipe_id, "RouterMap removed peer");
    }
  }

  /// Gets the pipe ID for a peer identity.
  pub fn pipe_for(&self, identity: &Blob) -> Option<usize> {
    self.identity_to_pipe.get(identity).copied()
  }

  /// Gets the identity associated with a pipe.
  pub fn identity_for(&self, pipe_id: usize) -> Option<&Blob> {
    self.pipe_to_identity.get(&pipe_id)
  }
}

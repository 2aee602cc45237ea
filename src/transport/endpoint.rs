// src/transport/endpoint.rs

use crate::error::ZmxError;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Represents a parsed and validated endpoint address.
///
/// The engine does not dial anything itself (connection establishment is the
/// transport layer's business); the parsed form validates the address and
/// the original string keys the context's endpoint registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Endpoint {
  Tcp(SocketAddr, String),
  Ipc(PathBuf, String),
  Inproc(String, String),
}

impl Endpoint {
  /// The original endpoint string, used as the registry key.
  pub(crate) fn as_str(&self) -> &str {
    match self {
      Endpoint::Tcp(_, s) => s,
      Endpoint::Ipc(_, s) => s,
      Endpoint::Inproc(_, s) => s,
    }
  }
}

/// Parses an endpoint string into a structured Endpoint enum.
pub(crate) fn parse_endpoint(endpoint_str: &str) -> Result<Endpoint, ZmxError> {
  let invalid_endpoint_err = || ZmxError::InvalidEndpoint(endpoint_str.to_string());

  let Some(separator_pos) = endpoint_str.find("://") else {
    return Err(invalid_endpoint_err());
  };
  let scheme = &endpoint_str[..separator_pos];
  let address_part = &endpoint_str[separator_pos + 3..];

  match scheme {
    "tcp" => address_part
      .parse::<SocketAddr>()
      .map(|addr| Endpoint::Tcp(addr, endpoint_str.to_string()))
      .map_err(|_| {
        tracing::debug!("Failed to parse TCP address: {}", address_part);
        invalid_endpoint_err()
      }),

    "ipc" => {
      if address_part.is_empty() || address_part.contains('\0') {
        Err(invalid_endpoint_err())
      } else {
        Ok(Endpoint::Ipc(PathBuf::from(address_part), endpoint_str.to_string()))
      }
    }

    "inproc" => {
      if address_part.is_empty() || address_part.contains('\0') {
        Err(invalid_endpoint_err())
      } else {
        Ok(Endpoint::Inproc(address_part.to_string(), endpoint_str.to_string()))
      }
    }

    _ => Err(ZmxError::UnsupportedTransport(endpoint_str.to_string())),
  }
}

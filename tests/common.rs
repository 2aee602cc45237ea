// tests/common.rs
#![allow(dead_code)] // Not every test file uses every helper

use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zmx::Context;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;

static INPROC_ENDPOINT_COUNTER: AtomicUsize = AtomicUsize::new(0);

// Use std::sync::Once for one-time initialization
static TRACING_INIT: Once = Once::new();

// Setup function to initialize tracing
fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    // Default level filter, overridable through RUST_LOG
    let default_filter = "zmx=debug,warn";
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_test_writer()
      .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber");
  });
}

// Helper to create a context
pub fn test_context() -> Context {
  setup_tracing(); // Ensure tracing is initialized before creating context
  Context::new().expect("Failed to create test context")
}

// Helper to generate unique inproc endpoints so parallel tests never collide
pub fn unique_inproc_endpoint() -> String {
  let pid = std::process::id();
  let count = INPROC_ENDPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("inproc://zmx_test_{}_{}", pid, count)
}

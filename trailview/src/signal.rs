//! Termination signals.
//!
//! The owner loop cannot be interrupted mid-mutation, so signals only set a
//! flag that the loop's heartbeat polls.

use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag::register;

/// Registers SIGTERM and SIGINT handlers that set the returned flag.
///
/// The handler only performs an atomic store, which is async-signal-safe.
pub fn register_termination() -> io::Result<Arc<AtomicBool>> {
    let term = Arc::new(AtomicBool::new(false));
    register(SIGTERM, Arc::clone(&term))?;
    register(SIGINT, Arc::clone(&term))?;
    Ok(term)
}

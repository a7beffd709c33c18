//! Per-connection decode loops.
//!
//! A session owns one [`Transport`](crate::transport::Transport), decodes
//! whatever arrives on it, and publishes samples into a shared
//! [`Hub`](crate::hub::Hub). Sessions end when the peer closes the stream,
//! the stream fails, or their cancellation token fires; none of these are
//! errors from the caller's point of view, so `run` returns a summary.

mod ranger;
mod solarman;

pub use ranger::{RangerSession, RangerSummary};
pub use solarman::{SolarmanSession, SolarmanSummary};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

/// Liveness bookkeeping shared by every session of one source.
#[derive(Debug, Default)]
pub struct Activity {
    active: AtomicUsize,
    last_seen: Mutex<Option<SystemTime>>,
}

impl Activity {
    /// No open sessions, never seen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one session is open.
    pub fn is_connected(&self) -> bool {
        self.active.load(Ordering::Acquire) > 0
    }

    /// Number of open sessions.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// When a complete frame was last received by any session.
    pub fn last_seen(&self) -> Option<SystemTime> {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Some(SystemTime::now());
    }

    /// Count a session as open until the returned guard drops.
    pub(crate) fn enter(&self) -> ActiveGuard<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        ActiveGuard { activity: self }
    }
}

/// Decrements the open-session count on drop.
#[derive(Debug)]
pub(crate) struct ActiveGuard<'a> {
    activity: &'a Activity,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.activity.active.fetch_sub(1, Ordering::AcqRel);
    }
}

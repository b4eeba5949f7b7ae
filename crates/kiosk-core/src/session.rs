//! Dialogue sessions: the per-session step counter and its redirect table.
//!
//! Each session owns a slot behind its own async mutex. A handler holds the
//! slot for the whole intent round trip, so two requests for the same session
//! run one after the other while different sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

/// Kiosk screen each step redirects to, in order. Step `n` maps to index `n - 1`.
pub const STEP_ROUTES: [&str; 8] = [
    "/sandwich",
    "/bread",
    "/vege",
    "/sc",
    "/side",
    "/add",
    "/check",
    "/payment",
];

pub const FIRST_STEP: u8 = 1;
pub const LAST_STEP: u8 = STEP_ROUTES.len() as u8;

/// Position of a session in the ordering flow (1..=8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step(u8);

impl Default for Step {
    fn default() -> Self {
        Self(FIRST_STEP)
    }
}

impl Step {
    pub fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Redirect target for this step, `None` outside the mapped range.
    pub fn redirect(self) -> Option<&'static str> {
        match self.0 {
            FIRST_STEP..=LAST_STEP => Some(STEP_ROUTES[(self.0 - 1) as usize]),
            _ => None,
        }
    }

    /// Next step, wrapping back to the first after the last mapped one.
    pub fn next(self) -> Self {
        match self.0 {
            FIRST_STEP..LAST_STEP => Self(self.0 + 1),
            _ => Self(FIRST_STEP),
        }
    }
}

/// State kept for one dialogue session.
#[derive(Debug)]
pub struct SessionSlot {
    step: Step,
    last_seen: Instant,
}

impl Default for SessionSlot {
    fn default() -> Self {
        Self {
            step: Step::default(),
            last_seen: Instant::now(),
        }
    }
}

impl SessionSlot {
    pub fn step(&self) -> Step {
        self.step
    }

    /// Return the redirect for the current step, then move to the next one.
    pub fn advance(&mut self) -> Option<&'static str> {
        let redirect = self.step.redirect();
        self.step = self.step.next();
        self.last_seen = Instant::now();
        redirect
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}

type SharedSlot = Arc<tokio::sync::Mutex<SessionSlot>>;

/// In-memory keyed store of dialogue sessions.
#[derive(Debug, Default)]
pub struct StepStore {
    sessions: Mutex<HashMap<String, SharedSlot>>,
}

impl StepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the slot for `session_id`, creating it at step 1 if unknown.
    ///
    /// Fetching a slot counts as activity, so a caller that has not locked it
    /// yet is not pruned out from under itself.
    pub fn slot(&self, session_id: &str) -> SharedSlot {
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let slot = map
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "New dialogue session");
                Arc::new(tokio::sync::Mutex::new(SessionSlot::default()))
            })
            .clone();
        // A locked slot is in use and never pruned.
        if let Ok(mut guard) = slot.try_lock() {
            guard.touch();
        }
        slot
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id)
            .is_some()
    }

    /// Drop sessions idle for longer than `max_idle`. Slots currently locked by
    /// a request are kept. Returns the number removed.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        map.retain(|_, slot| match slot.try_lock() {
            Ok(slot) => slot.last_seen.elapsed() <= max_idle,
            Err(_) => true,
        });
        before - map.len()
    }

    /// Spawn a background task that prunes idle sessions every `every`.
    pub fn spawn_pruner(
        self: &Arc<Self>,
        every: Duration,
        max_idle: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.prune_idle(max_idle);
                if removed > 0 {
                    debug!(removed, remaining = store.len(), "Pruned idle dialogue sessions");
                }
            }
        })
    }
}

/// Mint a fresh session identifier.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

//! # Agent Lifecycle
//!
//! Per-agent state machine:
//!
//! ```text
//! Created → Initializing → Active → ShuttingDown → Terminated
//!     └──────────┴────────────┴──▶ ShuttingDown (shutdown from any live state)
//! ```
//!
//! Only `Active` agents accept requests.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Stage of an agent's life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Constructed, not yet subscribed
    Created,
    /// Subscribed, running its initialize hook
    Initializing,
    /// Accepting requests
    Active,
    /// Cancellation in progress
    ShuttingDown,
    /// All subscriptions and tasks gone
    Terminated,
}

impl AgentState {
    /// Next stage on the happy path
    pub fn next(self) -> AgentState {
        match self {
            AgentState::Created => AgentState::Initializing,
            AgentState::Initializing => AgentState::Active,
            AgentState::Active => AgentState::ShuttingDown,
            AgentState::ShuttingDown => AgentState::Terminated,
            AgentState::Terminated => AgentState::Terminated,
        }
    }

    pub fn accepts_requests(self) -> bool {
        self == AgentState::Active
    }

    /// Shutting down or terminated
    pub fn is_stopping(self) -> bool {
        matches!(self, AgentState::ShuttingDown | AgentState::Terminated)
    }
}

/// Shared, observable lifecycle of one agent
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<AgentState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(AgentState::Created);
        Self { state }
    }

    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Move from `from` to `to` only if the current state is still `from`
    pub fn transition(&self, from: AgentState, to: AgentState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == from {
                *current = to;
                true
            } else {
                false
            }
        })
    }

    /// Advance one stage on the happy path; returns the new state
    pub fn advance(&self) -> AgentState {
        self.state.send_if_modified(|current| {
            let next = current.next();
            let changed = next != *current;
            *current = next;
            changed
        });
        self.state()
    }

    /// Enter `ShuttingDown` from any live state.
    ///
    /// Returns `true` only for the call that actually started the shutdown.
    pub fn begin_shutdown(&self) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_stopping() {
                false
            } else {
                *current = AgentState::ShuttingDown;
                true
            }
        })
    }

    pub fn terminate(&self) {
        self.state.send_replace(AgentState::Terminated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_advance() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), AgentState::Created);

        assert_eq!(lifecycle.advance(), AgentState::Initializing);
        assert_eq!(lifecycle.advance(), AgentState::Active);
        assert!(lifecycle.state().accepts_requests());

        assert_eq!(lifecycle.advance(), AgentState::ShuttingDown);
        assert_eq!(lifecycle.advance(), AgentState::Terminated);
        assert_eq!(lifecycle.advance(), AgentState::Terminated);
    }

    #[test]
    fn test_activation_loses_to_shutdown() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance();

        assert!(lifecycle.begin_shutdown());
        assert!(!lifecycle.begin_shutdown());

        // init finishing late must not resurrect the agent
        assert!(!lifecycle.transition(AgentState::Initializing, AgentState::Active));
        assert_eq!(lifecycle.state(), AgentState::ShuttingDown);
        assert!(!lifecycle.state().accepts_requests());
    }

    #[tokio::test]
    async fn test_watchers_observe_termination() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.watch();

        lifecycle.begin_shutdown();
        lifecycle.terminate();

        let state = rx
            .wait_for(|s| *s == AgentState::Terminated)
            .await
            .map(|s| *s)
            .unwrap();
        assert_eq!(state, AgentState::Terminated);
    }
}

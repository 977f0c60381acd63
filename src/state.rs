//! Process lifecycle tracking, separate from [`crate::oauth2::AppState`]
//! which holds the authorization domain objects themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use crate::oauth2::AppState;

/// Application lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    /// Unknown state, typically the initial state.
    Unknown = 0,
    /// The application is initializing.
    Initializing = 1,
    /// Starting network services.
    StartingNetwork = 2,
    /// The application is ready to serve requests.
    Ready = 3,
    /// The application is terminating.
    Terminating = 4,
}

/// Tracks the server's lifecycle phase for the `/livez` and `/readyz`
/// handlers. Kept separate from [`AppState`] so the liveness probe never
/// has to take any domain-object lock.
#[derive(Debug, Default)]
pub struct LifecycleState {
    state: AtomicU8,
}

impl LifecycleState {
    pub fn set_state(&self, value: ApplicationState) {
        debug!("application state changed to {:?}", value);
        self.state.store(value as u8, Ordering::SeqCst);
    }

    /// Returns true once the process has left `Unknown` and hasn't begun
    /// terminating yet.
    pub fn is_alive(&self) -> bool {
        let state = self.state.load(Ordering::SeqCst);
        state >= ApplicationState::Initializing as u8 && state < ApplicationState::Terminating as u8
    }

    /// Returns true once the application has completed initialization and
    /// is fully operational.
    pub fn is_ready(&self) -> bool {
        self.state.load(Ordering::SeqCst) >= ApplicationState::Ready as u8
    }
}

/// Returns true if the token signer has an active signing key, i.e. at
/// least one rotation has completed since startup.
pub async fn is_signer_ready(app: &AppState) -> bool {
    app.keys.active_kid().await.is_some()
}

pub type SharedLifecycle = Arc<LifecycleState>;

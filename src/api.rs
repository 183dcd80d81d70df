//! HTTP and WebSocket surface for the court

mod handlers;
mod types;
mod ws;

pub use handlers::create_router;

use crate::llm::DebateProvider;
use crate::runtime::SessionStore;
use std::sync::Arc;

/// Provider shared by every session
pub type SharedProvider = Arc<dyn DebateProvider>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore<SharedProvider>>,
}

impl AppState {
    pub fn new(store: Arc<SessionStore<SharedProvider>>) -> Self {
        Self { store }
    }
}

//! Server state

use std::sync::Arc;

use crate::engine::FleetEngine;

/// Server state shared across handlers
pub struct ServerState {
    pub engine: Arc<FleetEngine>,
}

impl ServerState {
    pub fn new(engine: Arc<FleetEngine>) -> Self {
        Self { engine }
    }
}

use super::InterpretedState;

/// Last interpreted reading, re-emitted unchanged by heartbeats.
///
/// Owned by the publisher and only touched from the control loop, so no
/// interior locking.
#[derive(Debug, Clone, Default)]
pub struct StateCache {
    last: InterpretedState,
    updates: u64,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, state: InterpretedState) {
        self.last = state;
        self.updates = self.updates.saturating_add(1);
    }

    pub fn current(&self) -> InterpretedState {
        self.last
    }

    /// Whether a real reading has replaced the startup sentinel.
    pub fn has_reading(&self) -> bool {
        self.updates > 0
    }
}

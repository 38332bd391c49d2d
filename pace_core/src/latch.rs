/// One-way flag marking that every turbidostat has reached a usable density.
///
/// Lagoon service waits on it. Once set it stays set for the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EquilibrationLatch {
    equilibrated: bool,
}

impl EquilibrationLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch that starts equilibrated, for resuming a running experiment.
    pub fn preset() -> Self {
        Self { equilibrated: true }
    }

    pub fn is_equilibrated(&self) -> bool {
        self.equilibrated
    }

    /// Feed one turbidostat round. Returns `true` only on the round that
    /// flips the latch.
    pub fn record_cycle_result(&mut self, all_acceptable: bool) -> bool {
        if self.equilibrated || !all_acceptable {
            return false;
        }
        self.equilibrated = true;
        true
    }
}

/// When instance storage creates its observable wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Materialize {
    /// On first read or write of each attribute.
    #[default]
    Lazy,
    /// All at once, in topological order, when the board is created.
    Eager,
}

/// Whether a source write fans out when it does not change the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Recompute every dependent on every write.
    #[default]
    Always,
    /// Skip the fan-out when the written value equals the current one.
    SkipUnchanged,
}

/// Per-board behavior knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoardConfig {
    pub materialize: Materialize,
    pub propagation: Propagation,
}

impl BoardConfig {
    #[must_use]
    pub fn with_materialize(mut self, materialize: Materialize) -> Self {
        self.materialize = materialize;
        self
    }

    #[must_use]
    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }
}

use thiserror::Error;

/// Failure reported by an engine constructor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine could not reserve its code cache or internal state.
    #[error("engine allocation failed")]
    Allocation,
    /// The engine rejected the supplied configuration.
    #[error("engine rejected configuration: {0}")]
    Config(String),
    /// No engine implementation is available to this process.
    #[error("no engine implementation installed")]
    Unavailable,
}

/// Failure constructing a CPU instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    /// The engine constructor failed.
    #[error("engine construction failed: {0}")]
    EngineConstruction(#[from] EngineError),
}

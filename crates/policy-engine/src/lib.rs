pub use reaper_core;

mod engine;

pub use engine::{classify, Classification, ReaperEngine, SweepReport};

// Re-export core types for convenience
pub use reaper_core::{CloudClient, Machine, MachineState, ReaperError, Result};

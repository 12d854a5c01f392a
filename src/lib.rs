// Re-export core modules for use by the host shell or other consumers
pub mod core;
pub mod narrative;
pub mod save;
pub mod state;

// Expose the engine façade and the types needed to drive a run
pub use crate::core::engine::{
    EngineStatus, EventSummary, ProgressionError, StoryEngine, HOURS_PER_DAY,
};
pub use crate::core::serialization::SaveState;
pub use crate::narrative::endings::{Availability, EndingKind};
pub use crate::narrative::flags::FlagStore;
pub use crate::narrative::scheduler::{EventPriority, ScheduledEvent, StoryCtx, TriggerKind};
pub use crate::narrative::trials::{SequenceState, TrialSequence};
pub use crate::narrative::StoryError;
pub use crate::save::{SaveDb, SaveRepository};
pub use crate::state::{
    Deity, GameStateFacet, GameStateHandle, HeadlessUi, SceneStyle, ScriptedUi, SoulKind,
    StatePort, StoryUi,
};

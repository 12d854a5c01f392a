pub mod endings;
pub mod events;
pub mod flags;
pub mod scheduler;
pub mod trials;

pub use endings::{Availability, Ending, EndingCatalog, EndingKind};
pub use events::StoryError;
pub use flags::FlagStore;
pub use scheduler::{
    EventPriority, EventRegistry, ScheduledEvent, StoryCtx, TriggerKind,
};
pub use trials::{SequenceState, TrialError, TrialSequence, TRIALS, TRIAL_COUNT};

pub mod facet;
pub mod souls;
pub mod ui;

pub use facet::{Deity, FacetSnapshot, GameStateFacet, GameStateHandle, StatePort, DEITY_COUNT};
pub use souls::{soul_energy, SoulKind};
pub use ui::{HeadlessUi, SceneStyle, ScriptedUi, StoryUi};

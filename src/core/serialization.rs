use std::fs;
use std::path::Path;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::narrative::endings::{Availability, EndingCatalog, EndingKind};
use crate::narrative::events::mentor::MentorContact;
use crate::narrative::events::summons::DivineSummons;
use crate::narrative::events::village::VillageEvent;
use crate::narrative::flags::FlagStore;
use crate::narrative::scheduler::EventRegistry;
use crate::narrative::trials::TrialSequence;
use crate::state::facet::{FacetSnapshot, StatePort};

fn default_save_version() -> u32 {
    1
}

/// Lifecycle bits of one registered event. Callbacks are never serialized;
/// re-registration restores them and these bits are applied on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedEventStatus {
    pub id: u32,
    pub triggered: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedEndings {
    pub availability: Vec<(EndingKind, Availability)>,
    pub chosen: Option<EndingKind>,
    pub game_ended: bool,
    pub ending_day: u32,
}

/// The full save payload: facet values plus every piece of progression
/// state whose loss would change a future sweep's decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    #[serde(default = "default_save_version")]
    pub version: u32,
    pub hours_into_day: u32,
    pub facet: FacetSnapshot,
    pub flags: FlagStore,
    pub events: Vec<SavedEventStatus>,
    #[serde(default)]
    pub village: VillageEvent,
    #[serde(default)]
    pub mentor: MentorContact,
    #[serde(default)]
    pub summons: DivineSummons,
    pub trials: TrialSequence,
    pub endings: SavedEndings,
}

/// Extract a serializable snapshot of the progression core.
pub fn extract_state_from_world(
    world: &World,
    state: &dyn StatePort,
    hours_into_day: u32,
) -> SaveState {
    let registry = world.resource::<EventRegistry>();
    let events = registry
        .iter()
        .map(|e| SavedEventStatus {
            id: e.id,
            triggered: e.triggered,
            completed: e.completed,
        })
        .collect();

    let catalog = world.resource::<EndingCatalog>();
    let endings = SavedEndings {
        availability: catalog
            .iter()
            .map(|e| (e.kind, e.availability.clone()))
            .collect(),
        chosen: catalog.chosen(),
        game_ended: catalog.has_ended(),
        ending_day: catalog.ending_day(),
    };

    SaveState {
        version: default_save_version(),
        hours_into_day,
        facet: state.snapshot(),
        flags: world.resource::<FlagStore>().clone(),
        events,
        village: world.resource::<VillageEvent>().clone(),
        mentor: world.resource::<MentorContact>().clone(),
        summons: world.resource::<DivineSummons>().clone(),
        trials: world.resource::<TrialSequence>().clone(),
        endings,
    }
}

/// Apply a saved snapshot back into a world whose events have already been
/// re-registered. Returns the saved `hours_into_day` for the engine clock.
pub fn apply_state_to_world(
    save: SaveState,
    world: &mut World,
    state: &mut dyn StatePort,
) -> u32 {
    state.restore(&save.facet);

    *world.resource_mut::<FlagStore>() = save.flags;
    *world.resource_mut::<VillageEvent>() = save.village;
    *world.resource_mut::<MentorContact>() = save.mentor;
    *world.resource_mut::<DivineSummons>() = save.summons;
    *world.resource_mut::<TrialSequence>() = save.trials;

    {
        let mut registry = world.resource_mut::<EventRegistry>();
        for status in &save.events {
            registry.apply_status(status.id, status.triggered, status.completed);
        }
    }

    world.resource_mut::<EndingCatalog>().apply_saved(
        save.endings.availability,
        save.endings.chosen,
        save.endings.game_ended,
        save.endings.ending_day,
    );

    save.hours_into_day
}

/// Serialize a save state into JSON for persistence.
pub fn save_state_to_json(state: &SaveState) -> serde_json::Result<String> {
    serde_json::to_string_pretty(state)
}

/// Deserialize JSON back into a save state.
pub fn load_state_from_json(data: &str) -> serde_json::Result<SaveState> {
    serde_json::from_str(data)
}

/// Write a save state to a file path.
pub fn save_state_to_path<P: AsRef<Path>>(state: &SaveState, path: P) -> std::io::Result<()> {
    let json = save_state_to_json(state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    fs::write(path, json)
}

/// Read a save state from a file path.
pub fn load_state_from_path<P: AsRef<Path>>(path: P) -> std::io::Result<SaveState> {
    let data = fs::read_to_string(&path)?;
    load_state_from_json(&data).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

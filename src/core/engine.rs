use std::path::Path;

use bevy_ecs::prelude::*;
use bevy_utils::tracing::{debug, info};

use crate::core::ecs::create_world;
use crate::core::serialization::{
    apply_state_to_world, extract_state_from_world, load_state_from_path, save_state_to_path,
    SaveState,
};
use crate::narrative::endings::{EndingCatalog, EndingKind};
use crate::narrative::events::registration::register_story_events;
use crate::narrative::events::{mentor, summons, village, StoryError};
use crate::narrative::flags::FlagStore;
use crate::narrative::scheduler::{
    self, EventPriority, EventRegistry, StoryCtx, TriggerKind,
};
use crate::narrative::trials::{self, SequenceState, TrialError, TrialSequence};
use crate::state::facet::StatePort;
use crate::state::ui::StoryUi;

/// Hours in a game day.
pub const HOURS_PER_DAY: u32 = 24;

/// Failure reported by an engine entry point. Returned by value; the engine
/// never aborts the process and a rejected call mutates nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressionError {
    /// The game-over latch is set; progression state is frozen.
    GameOver,
    /// No event with the given id is registered.
    UnknownEvent(u32),
    /// The event exists but is not repeatable, so it cannot be reset.
    EventNotRepeatable(u32),
    Trial(TrialError),
    Story(StoryError),
}

impl std::fmt::Display for ProgressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressionError::GameOver => write!(f, "the run is over; progression is frozen"),
            ProgressionError::UnknownEvent(id) => write!(f, "no event registered with id {}", id),
            ProgressionError::EventNotRepeatable(id) => {
                write!(f, "event {} is not repeatable and cannot be reset", id)
            }
            ProgressionError::Trial(err) => write!(f, "{}", err),
            ProgressionError::Story(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ProgressionError {}

impl From<TrialError> for ProgressionError {
    fn from(err: TrialError) -> Self {
        ProgressionError::Trial(err)
    }
}

impl From<StoryError> for ProgressionError {
    fn from(err: StoryError) -> Self {
        ProgressionError::Story(err)
    }
}

/// Summary of one registered event, for host-side display.
#[derive(Debug, Clone)]
pub struct EventSummary {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub priority: EventPriority,
    pub trigger: TriggerKind,
    pub trigger_value: u32,
}

/// Snapshot of run progress returned by [`StoryEngine::query_status`].
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub day: u32,
    pub corruption: u8,
    pub triggered_events: u32,
    pub pending_events: u32,
    pub trials_completed: u32,
    pub trials_failed: u32,
    pub trial_state: SequenceState,
    pub judgement_armed: bool,
    pub ending: Option<EndingKind>,
    pub game_ended: bool,
}

/// Façade over the narrative progression core.
///
/// Owns the flag store, event registry, trial sequence, and ending catalogue
/// for the lifetime of one run, and holds the two host ports. Every entry
/// point that can move a trigger predicate runs one dispatcher sweep before
/// returning; a single run owns a single engine.
pub struct StoryEngine {
    world: World,
    state: Box<dyn StatePort>,
    ui: Box<dyn StoryUi>,
    hours_into_day: u32,
    in_sweep: bool,
}

impl StoryEngine {
    pub fn new(state: Box<dyn StatePort>, ui: Box<dyn StoryUi>) -> Self {
        Self {
            world: create_world(),
            state,
            ui,
            hours_into_day: 0,
            in_sweep: false,
        }
    }

    /// Register the standard story events. Idempotent per id; returns how
    /// many events were newly accepted.
    pub fn register_story_events(&mut self) -> u32 {
        register_story_events(&mut self.world.resource_mut::<EventRegistry>())
    }

    fn ensure_running(&self) -> Result<(), ProgressionError> {
        if self.world.resource::<EndingCatalog>().has_ended() {
            return Err(ProgressionError::GameOver);
        }
        Ok(())
    }

    fn with_ctx<R>(&mut self, f: impl FnOnce(&mut StoryCtx) -> R) -> R {
        let mut ctx = StoryCtx {
            world: &mut self.world,
            state: &mut *self.state,
            ui: &mut *self.ui,
        };
        f(&mut ctx)
    }

    /// One dispatcher pass. Re-entry from inside a callback is a
    /// programming error and panics rather than corrupting sweep order.
    fn sweep(&mut self) -> u32 {
        assert!(!self.in_sweep, "sweep invoked while a sweep is in progress");
        self.in_sweep = true;
        let fired = self.with_ctx(|ctx| {
            summons::check_deadline(ctx);
            scheduler::run_sweep(ctx)
        });
        self.in_sweep = false;
        fired
    }

    /// Advance the clock. Each accumulated full day increments `day_count`
    /// and runs one sweep, so a multi-day advance cannot skip a boundary.
    pub fn advance_time(&mut self, hours: u32) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.hours_into_day += hours;
        while self.hours_into_day >= HOURS_PER_DAY {
            self.hours_into_day -= HOURS_PER_DAY;
            self.state.advance_day();
            debug!(day = self.state.day_count(), "day advanced");
            self.sweep();
        }
        Ok(())
    }

    /// Set corruption to an absolute value (clamped to 0..=100).
    pub fn set_corruption(&mut self, value: i32) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        let delta = value.clamp(0, 100) - i32::from(self.state.corruption());
        self.state.adjust_corruption(delta);
        self.sweep();
        Ok(())
    }

    /// Apply a corruption delta (clamped write).
    pub fn apply_corruption_change(&mut self, delta: i32) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.state.adjust_corruption(delta);
        self.sweep();
        Ok(())
    }

    pub fn enter_location(&mut self, location_id: u32) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.state.set_location(location_id);
        self.sweep();
        Ok(())
    }

    /// Set a story flag. Returns false when the run is over or the store
    /// rejects the name; flag writes feed triggers, so a sweep follows.
    pub fn set_flag(&mut self, name: &str) -> bool {
        if self.world.resource::<EndingCatalog>().has_ended() {
            return false;
        }
        let accepted = self.world.resource_mut::<FlagStore>().set(name);
        if accepted {
            self.sweep();
        }
        accepted
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.world.resource::<FlagStore>().test(name)
    }

    pub fn mark_trial_completed(&mut self, trial_number: u32) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(|ctx| trials::on_completion(ctx, trial_number))?;
        self.sweep();
        Ok(())
    }

    pub fn mark_trial_failed(&mut self, trial_number: u32) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(|ctx| trials::on_failure(ctx, trial_number))?;
        self.sweep();
        Ok(())
    }

    /// Resolve the village choice in favour of the harvest.
    pub fn harvest_village(&mut self) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(village::harvest)?;
        self.sweep();
        Ok(())
    }

    /// Resolve the village choice in favour of mercy.
    pub fn spare_village(&mut self) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(village::spare)?;
        self.sweep();
        Ok(())
    }

    pub fn speak_with_mentor(&mut self) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(mentor::speak_with_mentor)?;
        self.sweep();
        Ok(())
    }

    pub fn accept_guidance(&mut self) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(mentor::accept_guidance)?;
        self.sweep();
        Ok(())
    }

    pub fn reject_guidance(&mut self) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(mentor::reject_guidance)?;
        self.sweep();
        Ok(())
    }

    pub fn acknowledge_summons(&mut self) -> Result<(), ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(summons::acknowledge)?;
        self.sweep();
        Ok(())
    }

    /// Explicitly enforce the summons response window. Returns true once
    /// the summons stands ignored.
    pub fn check_summons_deadline(&mut self) -> bool {
        self.with_ctx(summons::check_deadline)
    }

    /// Attempt the given ending. True only when its full predicate holds
    /// and no outcome has been reached yet; on success the run is over.
    pub fn try_trigger_ending(&mut self, kind: EndingKind) -> bool {
        let day = self.state.day_count();
        let state = &*self.state;
        self.world
            .resource_scope(|world, mut catalog: Mut<EndingCatalog>| {
                let flags = world.resource::<FlagStore>();
                let trials = world.resource::<TrialSequence>();
                catalog.trigger(kind, day, state, flags, trials)
            })
    }

    /// Evaluate an ending's predicate without committing to it.
    pub fn check_ending(&self, kind: EndingKind) -> bool {
        let catalog = self.world.resource::<EndingCatalog>();
        let flags = self.world.resource::<FlagStore>();
        let trials = self.world.resource::<TrialSequence>();
        catalog.check(kind, &*self.state, flags, trials)
    }

    /// Permanently close an ending path.
    pub fn lock_ending(&mut self, kind: EndingKind, reason: &str) -> bool {
        self.world.resource_mut::<EndingCatalog>().lock(kind, reason)
    }

    pub fn is_ending_available(&self, kind: EndingKind) -> bool {
        self.world.resource::<EndingCatalog>().is_available(kind)
    }

    /// Fire an event regardless of its trigger conditions (debug/testing).
    pub fn force_trigger_event(&mut self, event_id: u32) -> Result<bool, ProgressionError> {
        self.ensure_running()?;
        self.with_ctx(|ctx| scheduler::force_trigger(ctx, event_id))
            .ok_or(ProgressionError::UnknownEvent(event_id))
    }

    /// Return a repeatable event to the untriggered state.
    pub fn reset_event(&mut self, event_id: u32) -> Result<(), ProgressionError> {
        let mut registry = self.world.resource_mut::<EventRegistry>();
        if registry.lookup(event_id).is_none() {
            return Err(ProgressionError::UnknownEvent(event_id));
        }
        if registry.reset(event_id) {
            Ok(())
        } else {
            Err(ProgressionError::EventNotRepeatable(event_id))
        }
    }

    pub fn event_was_triggered(&self, event_id: u32) -> bool {
        self.world.resource::<EventRegistry>().was_triggered(event_id)
    }

    pub fn event_was_completed(&self, event_id: u32) -> bool {
        self.world.resource::<EventRegistry>().was_completed(event_id)
    }

    /// Events that have not yet triggered.
    pub fn upcoming_events(&self) -> Vec<EventSummary> {
        self.world
            .resource::<EventRegistry>()
            .upcoming()
            .map(|e| EventSummary {
                id: e.id,
                name: e.name.clone(),
                description: e.description.clone(),
                priority: e.priority,
                trigger: e.trigger,
                trigger_value: e.trigger_value,
            })
            .collect()
    }

    pub fn query_status(&self) -> EngineStatus {
        let registry = self.world.resource::<EventRegistry>();
        let trials = self.world.resource::<TrialSequence>();
        let catalog = self.world.resource::<EndingCatalog>();
        let triggered = registry.triggered_count() as u32;
        EngineStatus {
            day: self.state.day_count(),
            corruption: self.state.corruption(),
            triggered_events: triggered,
            pending_events: registry.len() as u32 - triggered,
            trials_completed: trials.count_completed(),
            trials_failed: trials.count_failed(),
            trial_state: trials.state,
            judgement_armed: trials.judgement_armed,
            ending: catalog.chosen(),
            game_ended: catalog.has_ended(),
        }
    }

    pub fn state(&self) -> &dyn StatePort {
        &*self.state
    }

    pub fn state_mut(&mut self) -> &mut dyn StatePort {
        &mut *self.state
    }

    /// Extract the save payload for this run.
    pub fn save_state(&self) -> SaveState {
        extract_state_from_world(&self.world, &*self.state, self.hours_into_day)
    }

    /// Apply a saved payload. Events must already be registered so their
    /// callbacks exist; saved lifecycle bits land on top.
    pub fn load_state(&mut self, save: SaveState) {
        self.hours_into_day = apply_state_to_world(save, &mut self.world, &mut *self.state);
        info!(day = self.state.day_count(), "save state applied");
    }

    /// Save directly to a JSON file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        save_state_to_path(&self.save_state(), path)
    }

    /// Load directly from a JSON file.
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> std::io::Result<()> {
        let save = load_state_from_path(path)?;
        self.load_state(save);
        Ok(())
    }
}

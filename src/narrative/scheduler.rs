use bevy_ecs::prelude::*;
use bevy_utils::tracing::{debug, info, warn};

use crate::narrative::flags::FlagStore;
use crate::state::facet::StatePort;
use crate::state::ui::StoryUi;

/// Maximum number of events a registry can hold.
pub const MAX_EVENTS: usize = 256;

/// How a scheduled event decides it is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Fires on the exact day, never after.
    DayReached,
    /// Fires once corruption meets the threshold.
    CorruptionAtLeast,
    /// Fires when the player stands in the given location.
    LocationEquals,
    /// Fires when the event's required flag is observed set. The flag is
    /// both gate and trigger; dispatch is edge-triggered by the first sweep
    /// that sees it.
    FlagSet,
    /// Reserved. Evaluates false until quest integration lands.
    QuestComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// Mutable view handed to event callbacks: the core's own resources plus the
/// two host ports. Callbacks mutate game state exclusively through this.
pub struct StoryCtx<'a> {
    pub world: &'a mut World,
    pub state: &'a mut dyn StatePort,
    pub ui: &'a mut dyn StoryUi,
}

impl StoryCtx<'_> {
    pub fn set_flag(&mut self, name: &str) -> bool {
        self.world.resource_mut::<FlagStore>().set(name)
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.world.resource::<FlagStore>().test(name)
    }
}

/// Handler invoked when an event fires. Returns whether the event completed
/// successfully. Callbacks must not panic; failure is the `false` return.
pub type EventCallback = fn(&mut StoryCtx, u32) -> bool;

/// Declarative story event record.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub id: u32,
    pub name: String,
    pub description: String,

    pub trigger: TriggerKind,
    /// Day number, corruption threshold, or location id, per `trigger`.
    pub trigger_value: u32,

    /// Flag that must be set before the event is eligible. For `FlagSet`
    /// triggers this is also the flag being watched.
    pub required_flag: Option<String>,
    /// Inclusive day window; 0 means unbounded on that side.
    pub min_day: u32,
    pub max_day: u32,

    pub priority: EventPriority,
    pub repeatable: bool,
    pub callback: Option<EventCallback>,

    pub triggered: bool,
    pub completed: bool,
}

impl ScheduledEvent {
    pub fn new(id: u32, name: &str, trigger: TriggerKind, trigger_value: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            description: String::new(),
            trigger,
            trigger_value,
            required_flag: None,
            min_day: 0,
            max_day: 0,
            priority: EventPriority::Normal,
            repeatable: false,
            callback: None,
            triggered: false,
            completed: false,
        }
    }
}

/// Fields of game state a trigger predicate may depend on, captured once at
/// the start of a sweep.
#[derive(Debug, Clone, Copy)]
pub struct StateSnapshot {
    pub day_count: u32,
    pub corruption: u8,
    pub current_location_id: u32,
}

impl StateSnapshot {
    pub fn capture(state: &dyn StatePort) -> Self {
        Self {
            day_count: state.day_count(),
            corruption: state.corruption(),
            current_location_id: state.current_location_id(),
        }
    }
}

/// Whether an event's trigger and gates hold against a state snapshot.
fn conditions_met(event: &ScheduledEvent, snapshot: &StateSnapshot, flags: &FlagStore) -> bool {
    if event.triggered {
        return false;
    }

    if event.min_day > 0 && snapshot.day_count < event.min_day {
        return false;
    }
    if event.max_day > 0 && snapshot.day_count > event.max_day {
        return false;
    }

    if let Some(required) = &event.required_flag {
        if !flags.test(required) {
            return false;
        }
    }

    match event.trigger {
        TriggerKind::DayReached => snapshot.day_count == event.trigger_value,
        TriggerKind::CorruptionAtLeast => u32::from(snapshot.corruption) >= event.trigger_value,
        TriggerKind::LocationEquals => snapshot.current_location_id == event.trigger_value,
        // Gate check above already proved the flag; the flag is the trigger.
        TriggerKind::FlagSet => event.required_flag.is_some(),
        TriggerKind::QuestComplete => false,
    }
}

/// Holds the declarative event records for one run.
#[derive(Resource, Debug, Default)]
pub struct EventRegistry {
    events: Vec<ScheduledEvent>,
}

impl EventRegistry {
    /// Append an event. Rejects a duplicate id or a full registry.
    pub fn register(&mut self, event: ScheduledEvent) -> bool {
        if self.events.len() >= MAX_EVENTS {
            warn!(event = %event.name, "event registry is full");
            return false;
        }
        if self.events.iter().any(|e| e.id == event.id) {
            warn!(id = event.id, "duplicate event id");
            return false;
        }
        debug!(id = event.id, name = %event.name, "event registered");
        self.events.push(event);
        true
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn lookup(&self, event_id: u32) -> Option<&ScheduledEvent> {
        self.events.iter().find(|e| e.id == event_id)
    }

    fn lookup_mut(&mut self, event_id: u32) -> Option<&mut ScheduledEvent> {
        self.events.iter_mut().find(|e| e.id == event_id)
    }

    pub fn was_triggered(&self, event_id: u32) -> bool {
        self.lookup(event_id).map(|e| e.triggered).unwrap_or(false)
    }

    pub fn was_completed(&self, event_id: u32) -> bool {
        self.lookup(event_id).map(|e| e.completed).unwrap_or(false)
    }

    /// Events that have not yet triggered.
    pub fn upcoming(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter().filter(|e| !e.triggered)
    }

    pub fn triggered_count(&self) -> usize {
        self.events.iter().filter(|e| e.triggered).count()
    }

    /// Return a repeatable event to the untriggered state. Non-repeatable
    /// events cannot be reset.
    pub fn reset(&mut self, event_id: u32) -> bool {
        match self.lookup_mut(event_id) {
            Some(event) if event.repeatable => {
                event.triggered = false;
                event.completed = false;
                true
            }
            Some(event) => {
                warn!(id = event_id, name = %event.name, "cannot reset non-repeatable event");
                false
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledEvent> {
        self.events.iter()
    }

    /// Restore lifecycle bits from a save payload. Unknown ids are ignored.
    pub fn apply_status(&mut self, event_id: u32, triggered: bool, completed: bool) {
        if let Some(event) = self.lookup_mut(event_id) {
            event.triggered = triggered;
            event.completed = completed;
        }
    }
}

/// One dispatcher pass over the registry.
///
/// The satisfied set is computed once against a snapshot taken at entry, so
/// flags or state written by an earlier callback never make a later event
/// eligible within the same sweep; they are observed by the next sweep.
/// Callbacks run in `(priority desc, id asc)` order. Returns the number of
/// callbacks that reported success.
pub fn run_sweep(ctx: &mut StoryCtx) -> u32 {
    let snapshot = StateSnapshot::capture(ctx.state);

    let mut due: Vec<(EventPriority, u32, Option<EventCallback>)> = {
        let registry = ctx.world.resource::<EventRegistry>();
        let flags = ctx.world.resource::<FlagStore>();
        registry
            .iter()
            .filter(|event| conditions_met(event, &snapshot, flags))
            .map(|event| (event.priority, event.id, event.callback))
            .collect()
    };

    due.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut succeeded = 0;
    for (_, event_id, callback) in due {
        info!(id = event_id, day = snapshot.day_count, "triggering event");
        // Triggered flips before the callback so a non-repeatable event can
        // never re-enter, even if the callback fails.
        if let Some(event) = ctx.world.resource_mut::<EventRegistry>().lookup_mut(event_id) {
            event.triggered = true;
        }

        let success = match callback {
            Some(cb) => cb(ctx, event_id),
            None => true,
        };

        if let Some(event) = ctx.world.resource_mut::<EventRegistry>().lookup_mut(event_id) {
            event.completed = success;
        }
        if success {
            succeeded += 1;
        } else {
            warn!(id = event_id, "event callback failed");
        }
    }

    succeeded
}

/// Fire an event regardless of its trigger conditions (debug/testing).
/// Still marks `triggered` and `completed`. Returns `None` for an unknown
/// id, otherwise the callback's success.
pub fn force_trigger(ctx: &mut StoryCtx, event_id: u32) -> Option<bool> {
    let callback = {
        let mut registry = ctx.world.resource_mut::<EventRegistry>();
        let event = registry.lookup_mut(event_id)?;
        info!(id = event_id, name = %event.name, "forcing event trigger");
        event.triggered = true;
        event.callback
    };

    let success = match callback {
        Some(cb) => cb(ctx, event_id),
        None => true,
    };

    if let Some(event) = ctx.world.resource_mut::<EventRegistry>().lookup_mut(event_id) {
        event.completed = success;
    }
    Some(success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::facet::GameStateFacet;
    use crate::state::ui::HeadlessUi;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(FlagStore::default());
        world.insert_resource(EventRegistry::default());
        world
    }

    fn sweep(world: &mut World, facet: &mut GameStateFacet) -> u32 {
        let mut ui = HeadlessUi;
        let mut ctx = StoryCtx {
            world,
            state: facet,
            ui: &mut ui,
        };
        run_sweep(&mut ctx)
    }

    fn succeed(_ctx: &mut StoryCtx, _id: u32) -> bool {
        true
    }

    fn fail(_ctx: &mut StoryCtx, _id: u32) -> bool {
        false
    }

    fn note_order(ctx: &mut StoryCtx, id: u32) -> bool {
        let name = format!("fired_{id}");
        ctx.set_flag(&name);
        let order = ctx.world.resource::<FlagStore>().len();
        ctx.set_flag(&format!("order_{order}_{id}"));
        true
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut registry = EventRegistry::default();
        assert!(registry.register(ScheduledEvent::new(1, "a", TriggerKind::DayReached, 5)));
        assert!(!registry.register(ScheduledEvent::new(1, "b", TriggerKind::DayReached, 6)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_capacity_is_bounded() {
        let mut registry = EventRegistry::default();
        for id in 0..MAX_EVENTS as u32 {
            assert!(registry.register(ScheduledEvent::new(id, "e", TriggerKind::DayReached, 1)));
        }
        assert!(!registry.register(ScheduledEvent::new(
            MAX_EVENTS as u32,
            "overflow",
            TriggerKind::DayReached,
            1
        )));
    }

    #[test]
    fn day_trigger_fires_on_exact_day_only() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        let mut event = ScheduledEvent::new(1, "dawn", TriggerKind::DayReached, 5);
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);

        facet.day_count = 4;
        assert_eq!(sweep(&mut world, &mut facet), 0);
        facet.day_count = 5;
        assert_eq!(sweep(&mut world, &mut facet), 1);
        assert!(world.resource::<EventRegistry>().was_triggered(1));

        // Past the boundary a missed event never fires.
        let mut late = ScheduledEvent::new(2, "late", TriggerKind::DayReached, 5);
        late.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(late);
        facet.day_count = 6;
        assert_eq!(sweep(&mut world, &mut facet), 0);
    }

    #[test]
    fn corruption_trigger_is_threshold_inclusive() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        let mut event = ScheduledEvent::new(1, "taint", TriggerKind::CorruptionAtLeast, 40);
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);

        facet.corruption = 39;
        assert_eq!(sweep(&mut world, &mut facet), 0);
        facet.corruption = 40;
        assert_eq!(sweep(&mut world, &mut facet), 1);
        // Non-repeatable: no refire above the threshold.
        facet.corruption = 80;
        assert_eq!(sweep(&mut world, &mut facet), 0);
    }

    #[test]
    fn location_trigger_matches_current_location() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        let mut event = ScheduledEvent::new(9, "arrival", TriggerKind::LocationEquals, 3);
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);

        facet.current_location_id = 2;
        assert_eq!(sweep(&mut world, &mut facet), 0);
        facet.current_location_id = 3;
        assert_eq!(sweep(&mut world, &mut facet), 1);
    }

    #[test]
    fn required_flag_gates_until_set() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 10;
        let mut event = ScheduledEvent::new(4, "gated", TriggerKind::DayReached, 10);
        event.required_flag = Some("door_open".to_string());
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);

        assert_eq!(sweep(&mut world, &mut facet), 0);
        world.resource_mut::<FlagStore>().set("door_open");
        assert_eq!(sweep(&mut world, &mut facet), 1);
    }

    #[test]
    fn day_window_bounds_are_inclusive() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        let mut event = ScheduledEvent::new(5, "window", TriggerKind::CorruptionAtLeast, 10);
        event.min_day = 3;
        event.max_day = 5;
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);
        facet.corruption = 50;

        facet.day_count = 2;
        assert_eq!(sweep(&mut world, &mut facet), 0);
        facet.day_count = 6;
        assert_eq!(sweep(&mut world, &mut facet), 0);
        facet.day_count = 5;
        assert_eq!(sweep(&mut world, &mut facet), 1);
    }

    #[test]
    fn priority_orders_within_one_sweep() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 7;

        // Registered low-priority first; critical must still fire first.
        let mut low = ScheduledEvent::new(10, "low", TriggerKind::DayReached, 7);
        low.priority = EventPriority::Low;
        low.callback = Some(note_order);
        let mut critical = ScheduledEvent::new(11, "critical", TriggerKind::DayReached, 7);
        critical.priority = EventPriority::Critical;
        critical.callback = Some(note_order);
        {
            let mut registry = world.resource_mut::<EventRegistry>();
            registry.register(low);
            registry.register(critical);
        }

        assert_eq!(sweep(&mut world, &mut facet), 2);
        let flags = world.resource::<FlagStore>();
        // note_order records one "fired" and one "order" flag per event.
        assert!(flags.test("order_1_11"));
        assert!(flags.test("order_3_10"));
    }

    #[test]
    fn equal_priority_breaks_ties_by_ascending_id() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 7;

        let mut b = ScheduledEvent::new(21, "b", TriggerKind::DayReached, 7);
        b.callback = Some(note_order);
        let mut a = ScheduledEvent::new(20, "a", TriggerKind::DayReached, 7);
        a.callback = Some(note_order);
        {
            let mut registry = world.resource_mut::<EventRegistry>();
            registry.register(b);
            registry.register(a);
        }

        sweep(&mut world, &mut facet);
        let flags = world.resource::<FlagStore>();
        assert!(flags.test("order_1_20"));
        assert!(flags.test("order_3_21"));
    }

    #[test]
    fn single_pass_sweep_defers_midsweep_flag_sets() {
        fn set_x(ctx: &mut StoryCtx, _id: u32) -> bool {
            ctx.set_flag("x");
            true
        }

        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 7;

        let mut a = ScheduledEvent::new(1, "a", TriggerKind::DayReached, 7);
        a.priority = EventPriority::High;
        a.callback = Some(set_x);
        let mut b = ScheduledEvent::new(2, "b", TriggerKind::FlagSet, 0);
        b.priority = EventPriority::Normal;
        b.required_flag = Some("x".to_string());
        b.callback = Some(succeed);
        {
            let mut registry = world.resource_mut::<EventRegistry>();
            registry.register(a);
            registry.register(b);
        }

        // A fires and sets x; B must wait for the next sweep.
        assert_eq!(sweep(&mut world, &mut facet), 1);
        assert!(!world.resource::<EventRegistry>().was_triggered(2));
        assert_eq!(sweep(&mut world, &mut facet), 1);
        assert!(world.resource::<EventRegistry>().was_triggered(2));
    }

    #[test]
    fn failed_callback_marks_triggered_but_not_completed() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 3;
        let mut event = ScheduledEvent::new(8, "doomed", TriggerKind::DayReached, 3);
        event.callback = Some(fail);
        world.resource_mut::<EventRegistry>().register(event);

        assert_eq!(sweep(&mut world, &mut facet), 0);
        {
            let registry = world.resource::<EventRegistry>();
            assert!(registry.was_triggered(8));
            assert!(!registry.was_completed(8));
        }

        // No retry on later sweeps.
        assert_eq!(sweep(&mut world, &mut facet), 0);
    }

    #[test]
    fn repeatable_event_fires_again_after_reset() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 3;
        let mut event = ScheduledEvent::new(6, "echo", TriggerKind::DayReached, 3);
        event.repeatable = true;
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);

        assert_eq!(sweep(&mut world, &mut facet), 1);
        assert_eq!(sweep(&mut world, &mut facet), 0);
        assert!(world.resource_mut::<EventRegistry>().reset(6));
        assert_eq!(sweep(&mut world, &mut facet), 1);
    }

    #[test]
    fn non_repeatable_event_cannot_be_reset() {
        let mut registry = EventRegistry::default();
        registry.register(ScheduledEvent::new(1, "once", TriggerKind::DayReached, 1));
        assert!(!registry.reset(1));
        assert!(!registry.reset(99));
    }

    #[test]
    fn force_trigger_bypasses_conditions() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 1;
        let mut event = ScheduledEvent::new(30, "far", TriggerKind::DayReached, 999);
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);

        let mut ui = HeadlessUi;
        let mut ctx = StoryCtx {
            world: &mut world,
            state: &mut facet,
            ui: &mut ui,
        };
        assert_eq!(force_trigger(&mut ctx, 30), Some(true));
        assert_eq!(force_trigger(&mut ctx, 404), None);
        assert!(world.resource::<EventRegistry>().was_triggered(30));
        assert!(world.resource::<EventRegistry>().was_completed(30));
    }

    #[test]
    fn quest_trigger_is_inert() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = 50;
        let mut event = ScheduledEvent::new(12, "quest", TriggerKind::QuestComplete, 1);
        event.callback = Some(succeed);
        world.resource_mut::<EventRegistry>().register(event);
        assert_eq!(sweep(&mut world, &mut facet), 0);
    }
}

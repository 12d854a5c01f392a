use bevy_utils::tracing::info;

use crate::narrative::events::mentor::{
    mentor_contact_callback, MENTOR_EVENT_ID, MENTOR_TRIGGER_DAY,
};
use crate::narrative::events::summons::{
    summons_event_callback, SUMMONS_EVENT_ID, SUMMONS_TRIGGER_DAY,
};
use crate::narrative::events::village::{
    village_event_callback, VILLAGE_EVENT_ID, VILLAGE_TRIGGER_DAY,
};
use crate::narrative::flags::{FLAG_MASS_EVENT_RESOLVED, FLAG_PATHS_REVEALED};
use crate::narrative::scheduler::{
    EventPriority, EventRegistry, ScheduledEvent, TriggerKind,
};

/// Register the standard story events. Returns how many were accepted;
/// trial progression is driven programmatically and registers nothing here.
pub fn register_story_events(registry: &mut EventRegistry) -> u32 {
    let mut registered = 0;

    let mut village = ScheduledEvent::new(
        VILLAGE_EVENT_ID,
        "Ashbrook Discovery",
        TriggerKind::DayReached,
        VILLAGE_TRIGGER_DAY,
    );
    village.description = "The village of Ashbrook presents a terrible choice".to_string();
    village.priority = EventPriority::Critical;
    village.callback = Some(village_event_callback);
    if registry.register(village) {
        registered += 1;
    }

    let mut mentor = ScheduledEvent::new(
        MENTOR_EVENT_ID,
        "Message from the First Necromancer",
        TriggerKind::DayReached,
        MENTOR_TRIGGER_DAY,
    );
    mentor.description = "A ghost in the machine reaches out".to_string();
    mentor.priority = EventPriority::Critical;
    mentor.required_flag = Some(FLAG_MASS_EVENT_RESOLVED.to_string());
    mentor.min_day = MENTOR_TRIGGER_DAY;
    mentor.callback = Some(mentor_contact_callback);
    if registry.register(mentor) {
        registered += 1;
    }

    let mut summons = ScheduledEvent::new(
        SUMMONS_EVENT_ID,
        "Divine Council Summons",
        TriggerKind::DayReached,
        SUMMONS_TRIGGER_DAY,
    );
    summons.description = "The Seven Architects call you to judgement".to_string();
    summons.priority = EventPriority::Critical;
    summons.required_flag = Some(FLAG_PATHS_REVEALED.to_string());
    summons.min_day = SUMMONS_TRIGGER_DAY;
    summons.callback = Some(summons_event_callback);
    if registry.register(summons) {
        registered += 1;
    }

    info!(registered, "story event registration complete");
    registered
}

use bevy_ecs::prelude::*;
use bevy_utils::tracing::{info, warn};
use serde::{Deserialize, Serialize};

use crate::narrative::endings::{EndingCatalog, EndingKind};
use crate::narrative::events::StoryError;
use crate::narrative::flags::{
    trial_unlocked_flag, FLAG_SUMMONS_ACKNOWLEDGED, FLAG_SUMMONS_IGNORED, FLAG_SUMMONS_RECEIVED,
};
use crate::narrative::scheduler::StoryCtx;
use crate::narrative::trials::TrialSequence;
use crate::state::ui::SceneStyle;

pub const SUMMONS_EVENT_ID: u32 = 155;
pub const SUMMONS_TRIGGER_DAY: u32 = 155;
/// Days granted to answer the council.
pub const RESPONSE_WINDOW_DAYS: u32 = 7;

const IGNORE_LOCK_REASON: &str = "ignored the divine summons";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummonsState {
    #[default]
    NotReceived,
    /// Delivered; the response clock is running.
    Received,
    Acknowledged,
    /// The window closed unanswered.
    Ignored,
}

/// Record of the divine council's summons and its response deadline.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct DivineSummons {
    pub state: SummonsState,
    pub response_deadline: u32,
}

/// Day-155 event callback, gated on the six paths being revealed. Delivers
/// the summons and starts the seven-day response window.
pub fn summons_event_callback(ctx: &mut StoryCtx, _event_id: u32) -> bool {
    {
        let summons = ctx.world.resource::<DivineSummons>();
        if summons.state != SummonsState::NotReceived {
            return false;
        }
    }

    let day = ctx.state.day_count();
    let deadline = day + RESPONSE_WINDOW_DAYS;

    ctx.ui.present_scene(
        "SUMMONS FROM THE DIVINE COUNCIL",
        &[
            "The Death Network shudders. Every queued soul pauses mid-route. \
             Something ancient has taken notice of you.",
            "Seven voices speak as one, etched directly into your consciousness:",
            "\"ADMINISTRATOR. YOUR ACTIONS HAVE BEEN OBSERVED. YOU HAVE CLAIMED \
             POWER NOT MEANT FOR MORTALS. YET YOU HAVE ALSO SHOWN RESTRAINT.\"",
            "\"THE SEVEN ARCHITECTS SUMMON YOU TO STAND JUDGEMENT. SEVEN DAYS. \
             SEVEN TRIALS. THIS IS NOT A REQUEST.\"",
        ],
        SceneStyle::Warning,
    );

    {
        let mut summons = ctx.world.resource_mut::<DivineSummons>();
        summons.state = SummonsState::Received;
        summons.response_deadline = deadline;
    }
    ctx.set_flag(FLAG_SUMMONS_RECEIVED);
    info!(day, deadline, "divine summons received");
    true
}

/// Answer the summons. Inside the window this unlocks the first trial and
/// activates the sequence; after the window the summons is recorded as
/// ignored and the Administrator path closes.
pub fn acknowledge(ctx: &mut StoryCtx) -> Result<(), StoryError> {
    match ctx.world.resource::<DivineSummons>().state {
        SummonsState::NotReceived => return Err(StoryError::SummonsNotReceived),
        SummonsState::Acknowledged => return Err(StoryError::SummonsAlreadyAnswered),
        SummonsState::Ignored => return Err(StoryError::SummonsDeadlinePassed),
        SummonsState::Received => {}
    }

    let day = ctx.state.day_count();
    if day > ctx.world.resource::<DivineSummons>().response_deadline {
        mark_ignored(ctx);
        return Err(StoryError::SummonsDeadlinePassed);
    }

    ctx.ui.present_scene(
        "ACKNOWLEDGING THE SUMMONS",
        &[
            "You direct your consciousness toward the divine signatures and \
             speak the only answer that keeps a future open:",
            "\"I acknowledge the summons. I will stand before the Seven \
             Architects and face judgement.\"",
            "\"SO BE IT. THE FIRST TRIAL BEGINS: PROVE YOUR POWER.\"",
        ],
        SceneStyle::Info,
    );

    ctx.world.resource_mut::<DivineSummons>().state = SummonsState::Acknowledged;
    ctx.world.resource_mut::<TrialSequence>().unlock(1);
    ctx.set_flag(FLAG_SUMMONS_ACKNOWLEDGED);
    ctx.set_flag(&trial_unlocked_flag(1));
    info!(day, "summons acknowledged; trial 1 unlocked");
    Ok(())
}

/// Enforce the response window. Runs at the head of every sweep and may
/// also be called directly. Returns true once the summons stands ignored.
pub fn check_deadline(ctx: &mut StoryCtx) -> bool {
    let expired = {
        let summons = ctx.world.resource::<DivineSummons>();
        summons.state == SummonsState::Received
            && ctx.state.day_count() > summons.response_deadline
    };
    if expired {
        mark_ignored(ctx);
    }
    ctx.world.resource::<DivineSummons>().state == SummonsState::Ignored
}

fn mark_ignored(ctx: &mut StoryCtx) {
    ctx.world.resource_mut::<DivineSummons>().state = SummonsState::Ignored;
    ctx.set_flag(FLAG_SUMMONS_IGNORED);
    ctx.world
        .resource_mut::<EndingCatalog>()
        .lock(EndingKind::Administrator, IGNORE_LOCK_REASON);
    warn!("divine summons ignored; Administrator path closed");
}

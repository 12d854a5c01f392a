use bevy_ecs::prelude::*;
use bevy_utils::tracing::info;
use serde::{Deserialize, Serialize};

use crate::narrative::events::StoryError;
use crate::narrative::flags::{
    FLAG_GUIDANCE_ACCEPTED, FLAG_GUIDANCE_REJECTED, FLAG_MENTOR_CONTACTED,
    FLAG_MENTOR_HIGH_TRUST, FLAG_PATHS_REVEALED,
};
use crate::narrative::scheduler::StoryCtx;
use crate::state::ui::SceneStyle;

pub const MENTOR_EVENT_ID: u32 = 50;
pub const MENTOR_TRIGGER_DAY: u32 = 50;

/// Trust granted when the six paths are revealed.
const REVEAL_TRUST_GAIN: u32 = 25;
/// Further trust granted for accepting guidance.
const ACCEPT_TRUST_GAIN: u32 = 10;
/// At this trust the mentor is considered a confidante.
pub const HIGH_TRUST_THRESHOLD: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MentorState {
    #[default]
    NotContacted,
    /// The message arrived; the refuge is on the map.
    Contacted,
    /// The six paths have been laid out; guidance is on offer.
    PathsRevealed,
    /// Guidance accepted.
    TrustEstablished,
}

/// Relationship record for the mentor: the first necromancer, a ghost
/// persisting in the routing fabric.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentorContact {
    pub state: MentorState,
    pub trust: u32,
    /// Whether the hidden refuge outside the network has been discovered.
    pub refuge_discovered: bool,
}

fn add_trust(ctx: &mut StoryCtx, amount: u32) -> u32 {
    let trust = {
        let mut mentor = ctx.world.resource_mut::<MentorContact>();
        mentor.trust += amount;
        mentor.trust
    };
    if trust >= HIGH_TRUST_THRESHOLD {
        ctx.set_flag(FLAG_MENTOR_HIGH_TRUST);
    }
    trust
}

/// Day-50 event callback, gated on the village choice being resolved. Marks
/// the refuge discovered and opens the conversation line.
pub fn mentor_contact_callback(ctx: &mut StoryCtx, _event_id: u32) -> bool {
    {
        let mut mentor = ctx.world.resource_mut::<MentorContact>();
        if mentor.state != MentorState::NotContacted {
            return false;
        }
        mentor.state = MentorState::Contacted;
        mentor.refuge_discovered = true;
    }

    let day = ctx.state.day_count();
    info!(day, "contact from the first necromancer");

    ctx.ui.present_scene(
        "A MESSAGE IN THE NETWORK",
        &[
            "A presence threads through the routing signatures, older than any \
             you have touched. Someone has been watching you work.",
            "\"I saw what happened at Ashbrook. I saw what you are becoming. \
             We should speak before it is too late.\"",
            "\"Come alone. No minions. You will find my refuge where the \
             network goes quiet.\"",
            "The signature is three thousand years old. That should not be \
             possible.",
        ],
        SceneStyle::Warning,
    );

    ctx.set_flag(FLAG_MENTOR_CONTACTED);
    true
}

/// Seek the mentor out and hear the six paths. Requires contact; repeating
/// the conversation after the reveal is rejected.
pub fn speak_with_mentor(ctx: &mut StoryCtx) -> Result<(), StoryError> {
    match ctx.world.resource::<MentorContact>().state {
        MentorState::NotContacted => return Err(StoryError::MentorNotContacted),
        MentorState::PathsRevealed | MentorState::TrustEstablished => {
            return Err(StoryError::PathsAlreadyRevealed)
        }
        MentorState::Contacted => {}
    }

    ctx.ui.present_scene(
        "THE GHOST IN THE MACHINE",
        &[
            "The refuge shimmers. A consciousness coalesces: not a body, but a \
             pattern that refuses to terminate.",
            "\"The histories say there are three roads for your kind. The \
             histories lie. There are six, and I have watched necromancers walk \
             every one of them for three thousand years.\"",
            "Knowledge moves directly between you, consciousness to \
             consciousness. Six paths. Six possible futures.",
            "\"Choose before your corruption chooses for you.\"",
        ],
        SceneStyle::Info,
    );

    {
        let mut mentor = ctx.world.resource_mut::<MentorContact>();
        mentor.state = MentorState::PathsRevealed;
    }
    add_trust(ctx, REVEAL_TRUST_GAIN);
    ctx.set_flag(FLAG_PATHS_REVEALED);
    info!("the six paths are revealed");
    Ok(())
}

/// Accept the mentor's guidance. Requires the paths to be on the table.
pub fn accept_guidance(ctx: &mut StoryCtx) -> Result<(), StoryError> {
    if ctx.world.resource::<MentorContact>().state != MentorState::PathsRevealed {
        return Err(StoryError::PathsNotRevealed);
    }

    ctx.world.resource_mut::<MentorContact>().state = MentorState::TrustEstablished;
    let trust = add_trust(ctx, ACCEPT_TRUST_GAIN);
    ctx.set_flag(FLAG_GUIDANCE_ACCEPTED);
    info!(trust, "guidance accepted");
    Ok(())
}

/// Decline the offer. The mentor withdraws but the door stays open; a later
/// conversation can raise the paths again.
pub fn reject_guidance(ctx: &mut StoryCtx) -> Result<(), StoryError> {
    if ctx.world.resource::<MentorContact>().state != MentorState::PathsRevealed {
        return Err(StoryError::PathsNotRevealed);
    }

    ctx.world.resource_mut::<MentorContact>().state = MentorState::Contacted;
    ctx.set_flag(FLAG_GUIDANCE_REJECTED);
    info!("guidance rejected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::flags::FlagStore;
    use crate::state::facet::GameStateFacet;
    use crate::state::ui::HeadlessUi;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(FlagStore::default());
        world.insert_resource(MentorContact::default());
        world
    }

    fn with_ctx<R>(
        world: &mut World,
        facet: &mut GameStateFacet,
        f: impl FnOnce(&mut StoryCtx) -> R,
    ) -> R {
        let mut ui = HeadlessUi;
        let mut ctx = StoryCtx {
            world,
            state: facet,
            ui: &mut ui,
        };
        f(&mut ctx)
    }

    #[test]
    fn conversation_requires_contact_first() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        with_ctx(&mut world, &mut facet, |ctx| {
            assert_eq!(speak_with_mentor(ctx), Err(StoryError::MentorNotContacted));
            assert_eq!(accept_guidance(ctx), Err(StoryError::PathsNotRevealed));
        });
    }

    #[test]
    fn contact_then_reveal_then_accept_builds_trust() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        facet.day_count = MENTOR_TRIGGER_DAY;

        with_ctx(&mut world, &mut facet, |ctx| {
            assert!(mentor_contact_callback(ctx, MENTOR_EVENT_ID));
            speak_with_mentor(ctx).unwrap();
            accept_guidance(ctx).unwrap();
        });

        let mentor = world.resource::<MentorContact>();
        assert_eq!(mentor.state, MentorState::TrustEstablished);
        assert_eq!(mentor.trust, 35);
        assert!(mentor.refuge_discovered);
        let flags = world.resource::<FlagStore>();
        assert!(flags.test(FLAG_MENTOR_CONTACTED));
        assert!(flags.test(FLAG_PATHS_REVEALED));
        assert!(flags.test(FLAG_GUIDANCE_ACCEPTED));
        assert!(flags.test(FLAG_MENTOR_HIGH_TRUST));
    }

    #[test]
    fn reveal_alone_stays_below_high_trust() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        with_ctx(&mut world, &mut facet, |ctx| {
            mentor_contact_callback(ctx, MENTOR_EVENT_ID);
            speak_with_mentor(ctx).unwrap();
        });
        assert_eq!(world.resource::<MentorContact>().trust, 25);
        assert!(!world.resource::<FlagStore>().test(FLAG_MENTOR_HIGH_TRUST));
    }

    #[test]
    fn repeated_conversation_after_reveal_is_rejected() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        with_ctx(&mut world, &mut facet, |ctx| {
            mentor_contact_callback(ctx, MENTOR_EVENT_ID);
            speak_with_mentor(ctx).unwrap();
            assert_eq!(speak_with_mentor(ctx), Err(StoryError::PathsAlreadyRevealed));
        });
        assert_eq!(world.resource::<MentorContact>().trust, 25);
    }

    #[test]
    fn rejection_reopens_the_conversation() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        with_ctx(&mut world, &mut facet, |ctx| {
            mentor_contact_callback(ctx, MENTOR_EVENT_ID);
            speak_with_mentor(ctx).unwrap();
            reject_guidance(ctx).unwrap();
            // Accepting now requires hearing the paths again.
            assert_eq!(accept_guidance(ctx), Err(StoryError::PathsNotRevealed));
            speak_with_mentor(ctx).unwrap();
            accept_guidance(ctx).unwrap();
        });

        let flags = world.resource::<FlagStore>();
        assert!(flags.test(FLAG_GUIDANCE_REJECTED));
        assert!(flags.test(FLAG_GUIDANCE_ACCEPTED));
        assert_eq!(
            world.resource::<MentorContact>().state,
            MentorState::TrustEstablished
        );
    }

    #[test]
    fn second_callback_invocation_is_refused() {
        let mut world = test_world();
        let mut facet = GameStateFacet::default();
        with_ctx(&mut world, &mut facet, |ctx| {
            assert!(mentor_contact_callback(ctx, MENTOR_EVENT_ID));
            assert!(!mentor_contact_callback(ctx, MENTOR_EVENT_ID));
        });
    }
}

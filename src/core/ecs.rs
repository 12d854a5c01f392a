use bevy_ecs::prelude::*;

use crate::narrative::endings::EndingCatalog;
use crate::narrative::events::mentor::MentorContact;
use crate::narrative::events::summons::DivineSummons;
use crate::narrative::events::village::VillageEvent;
use crate::narrative::flags::FlagStore;
use crate::narrative::scheduler::EventRegistry;
use crate::narrative::trials::TrialSequence;

/// Build the ECS world with the core's baseline resources.
pub fn create_world() -> World {
    let mut world = World::new();
    world.insert_resource(FlagStore::default());
    world.insert_resource(EventRegistry::default());
    world.insert_resource(TrialSequence::default());
    world.insert_resource(EndingCatalog::default());
    world.insert_resource(VillageEvent::default());
    world.insert_resource(MentorContact::default());
    world.insert_resource(DivineSummons::default());
    world
}

use bevy_ecs::prelude::*;
use bevy_utils::tracing::{info, warn};
use serde::{Deserialize, Serialize};

use crate::narrative::endings::{EndingCatalog, EndingKind};
use crate::narrative::events::StoryError;
use crate::narrative::flags::{FLAG_HARVEST_CHOSEN, FLAG_MASS_EVENT_RESOLVED, FLAG_SPARE_CHOSEN};
use crate::narrative::scheduler::StoryCtx;
use crate::state::souls::{soul_energy, SoulKind};
use crate::state::ui::SceneStyle;

pub const VILLAGE_EVENT_ID: u32 = 47;
pub const VILLAGE_TRIGGER_DAY: u32 = 47;
/// Living souls in the village of Ashbrook.
pub const VILLAGE_POPULATION: u32 = 147;

const HARVEST_CORRUPTION_GAIN: i32 = 13;
const SPARE_CORRUPTION_LOSS: i32 = 2;
const LOCK_REASON: &str = "full harvest";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VillageChoice {
    #[default]
    NotDiscovered,
    /// Scene shown; the choice is still open.
    Presented,
    Harvested,
    Spared,
}

/// Outcome record for the mass-harvest choice. One per run.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct VillageEvent {
    pub choice: VillageChoice,
    pub souls_gained: u32,
    pub energy_gained: u32,
}

impl VillageEvent {
    pub fn resolved(&self) -> bool {
        matches!(self.choice, VillageChoice::Harvested | VillageChoice::Spared)
    }
}

/// The fixed roster a full harvest would claim: farmers and craftspeople,
/// the garrison, the elder's circle, and two souls the network grades
/// innocent.
fn harvest_roster() -> impl Iterator<Item = (SoulKind, u8)> {
    let commons = (0u32..120).map(|i| (SoulKind::Common, (40 + i % 31) as u8));
    let warriors = (0u32..20).map(|i| (SoulKind::Warrior, (70 + i % 21) as u8));
    let mages = (0u32..5).map(|i| (SoulKind::Mage, (75 + i * 3) as u8));
    let innocents = (0u32..2).map(|i| (SoulKind::Innocent, (92 + i * 3) as u8));
    commons.chain(warriors).chain(mages).chain(innocents)
}

/// Aggregate soul energy of the full roster. Deterministic.
pub fn roster_energy() -> u32 {
    harvest_roster().map(|(kind, quality)| soul_energy(kind, quality)).sum()
}

/// Day-47 event callback: present the discovery and, if the host is
/// interactive, resolve the choice on the spot. A `None` prompt response
/// leaves the event presented and the outcome to a later explicit call.
pub fn village_event_callback(ctx: &mut StoryCtx, _event_id: u32) -> bool {
    {
        let mut village = ctx.world.resource_mut::<VillageEvent>();
        if village.choice != VillageChoice::NotDiscovered {
            warn!("village event callback invoked twice");
            return false;
        }
        village.choice = VillageChoice::Presented;
    }

    let day = ctx.state.day_count();
    info!(day, population = VILLAGE_POPULATION, "the village of Ashbrook is discovered");

    ctx.ui.present_scene(
        "THE VILLAGE OF ASHBROOK",
        &[
            "Your scouts return from the western valley with word of a village \
             untouched by the purges. Ashbrook: one hundred and forty-seven \
             living souls, unwarded, unwatched.",
            "That much life, taken at once, would flood your reserves with soul \
             energy. It would also stain you in ways no ritual can scrub out.",
            "The choice is yours alone.",
        ],
        SceneStyle::Warning,
    );

    let decision = ctx.ui.prompt_choice(
        "A terrible arithmetic",
        "What becomes of Ashbrook?",
        &["Harvest the village", "Spare the village"],
    );

    match decision {
        Some(0) => harvest(ctx).is_ok(),
        Some(1) => spare(ctx).is_ok(),
        // Non-interactive, or the player walked away. The event stays
        // presented; harvest/spare resolve it later.
        _ => true,
    }
}

/// Claim every soul in the village. Allowed exactly once, after the event
/// has been presented.
pub fn harvest(ctx: &mut StoryCtx) -> Result<(), StoryError> {
    check_open(ctx)?;

    let mut total_energy = 0u32;
    let mut souls = 0u32;
    for (kind, quality) in harvest_roster() {
        ctx.state.add_soul(kind, quality);
        total_energy += soul_energy(kind, quality);
        souls += 1;
    }
    ctx.state.add_soul_energy(total_energy);
    ctx.state.adjust_corruption(HARVEST_CORRUPTION_GAIN);

    ctx.set_flag(FLAG_HARVEST_CHOSEN);
    ctx.set_flag(FLAG_MASS_EVENT_RESOLVED);

    // A full harvest closes every path that demanded restraint.
    let mut catalog = ctx.world.resource_mut::<EndingCatalog>();
    catalog.lock(EndingKind::Resurrection, LOCK_REASON);
    catalog.lock(EndingKind::Ascendant, LOCK_REASON);
    drop(catalog);

    let mut village = ctx.world.resource_mut::<VillageEvent>();
    village.choice = VillageChoice::Harvested;
    village.souls_gained = souls;
    village.energy_gained = total_energy;

    info!(souls, energy = total_energy, "Ashbrook harvested");
    Ok(())
}

/// Leave the village be. Allowed exactly once, after the event has been
/// presented.
pub fn spare(ctx: &mut StoryCtx) -> Result<(), StoryError> {
    check_open(ctx)?;

    ctx.state.adjust_corruption(-SPARE_CORRUPTION_LOSS);
    ctx.set_flag(FLAG_SPARE_CHOSEN);
    ctx.set_flag(FLAG_MASS_EVENT_RESOLVED);
    ctx.world.resource_mut::<VillageEvent>().choice = VillageChoice::Spared;

    info!("Ashbrook spared");
    Ok(())
}

fn check_open(ctx: &StoryCtx) -> Result<(), StoryError> {
    match ctx.world.resource::<VillageEvent>().choice {
        VillageChoice::NotDiscovered => Err(StoryError::ChoiceNotPresented),
        VillageChoice::Presented => Ok(()),
        VillageChoice::Harvested | VillageChoice::Spared => {
            Err(StoryError::ChoiceAlreadyResolved)
        }
    }
}

use bevy_ecs::prelude::*;
use bevy_utils::tracing::{info, warn};
use serde::{Deserialize, Serialize};

use crate::narrative::flags::{
    FlagStore, FLAG_ALL_TRIALS_COMPLETED, FLAG_FINAL_ANTAGONIST_DEFEATED, FLAG_HARVEST_CHOSEN,
    FLAG_JUDGEMENT_AVAILABLE, FLAG_MENTOR_HIGH_TRUST, FLAG_SPARE_CHOSEN,
};
use crate::narrative::trials::TrialSequence;
use crate::state::facet::StatePort;

/// The seven terminal outcomes of a run. `Destruction` is the failure
/// variant claimed by the purge rather than chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndingKind {
    Resurrection,
    Distributed,
    Ascendant,
    Administrator,
    Tyrant,
    Dissolution,
    Destruction,
}

impl EndingKind {
    pub const ALL: [EndingKind; 7] = [
        EndingKind::Resurrection,
        EndingKind::Distributed,
        EndingKind::Ascendant,
        EndingKind::Administrator,
        EndingKind::Tyrant,
        EndingKind::Dissolution,
        EndingKind::Destruction,
    ];

    pub fn key(self) -> &'static str {
        match self {
            EndingKind::Resurrection => "resurrection",
            EndingKind::Distributed => "distributed",
            EndingKind::Ascendant => "ascendant",
            EndingKind::Administrator => "administrator",
            EndingKind::Tyrant => "tyrant",
            EndingKind::Dissolution => "dissolution",
            EndingKind::Destruction => "destruction",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        EndingKind::ALL.into_iter().find(|k| k.key() == key)
    }
}

/// Lifecycle of one catalogue entry within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Available,
    /// Permanently closed by a player action; the reason is shown later.
    Locked(String),
    /// The terminal outcome, with the day it was earned.
    Unlocked(u32),
}

/// Favour quorum: at least `count` deities at or above `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavourQuorum {
    pub count: usize,
    pub threshold: i16,
}

/// Structured predicate an ending demands of the final state.
#[derive(Debug, Clone)]
pub struct EndingRequirements {
    pub corruption_min: u8,
    pub corruption_max: u8,
    pub min_consciousness: f32,
    pub favour_quorum: Option<FavourQuorum>,
    /// Destruction-style gate: the lowest deity favour must be at or below
    /// this value.
    pub worst_favour_at_most: Option<i16>,
    pub required_flags: &'static [&'static str],
    pub forbidden_flags: &'static [&'static str],
    pub min_trials_completed: u32,
    pub min_souls_harvested: u32,
    pub min_alliances: u8,
}

impl EndingRequirements {
    fn open(corruption_min: u8, corruption_max: u8, min_consciousness: f32) -> Self {
        Self {
            corruption_min,
            corruption_max,
            min_consciousness,
            favour_quorum: None,
            worst_favour_at_most: None,
            required_flags: &[],
            forbidden_flags: &[],
            min_trials_completed: 0,
            min_souls_harvested: 0,
            min_alliances: 0,
        }
    }
}

/// One entry in the ending catalogue.
#[derive(Debug, Clone)]
pub struct Ending {
    pub kind: EndingKind,
    pub name: &'static str,
    pub description: &'static str,
    pub epilogue: &'static str,
    pub requirements: EndingRequirements,
    pub availability: Availability,
}

fn catalogue() -> Vec<Ending> {
    vec![
        Ending {
            kind: EndingKind::Resurrection,
            name: "The Revenant Road",
            description: "Resurrect yourself and walk out of the Death Network a living soul.",
            epilogue: "The network releases you gently, like a held breath let go. \
                       Somewhere a heart remembers how to beat.",
            requirements: EndingRequirements {
                favour_quorum: Some(FavourQuorum { count: 3, threshold: 40 }),
                required_flags: &[FLAG_SPARE_CHOSEN, FLAG_JUDGEMENT_AVAILABLE],
                forbidden_flags: &[FLAG_HARVEST_CHOSEN],
                ..EndingRequirements::open(0, 30, 70.0)
            },
            availability: Availability::Available,
        },
        Ending {
            kind: EndingKind::Distributed,
            name: "Wraith Dispersal",
            description: "Scatter your consciousness across the routing fabric and slip free.",
            epilogue: "No single packet carries you now. You are everywhere the dead \
                       travel, and nowhere the gods can point.",
            requirements: EndingRequirements {
                favour_quorum: Some(FavourQuorum { count: 2, threshold: 20 }),
                required_flags: &[FLAG_MENTOR_HIGH_TRUST, FLAG_ALL_TRIALS_COMPLETED],
                forbidden_flags: &[FLAG_HARVEST_CHOSEN],
                ..EndingRequirements::open(20, 40, 80.0)
            },
            availability: Availability::Available,
        },
        Ending {
            kind: EndingKind::Ascendant,
            name: "Morningstar Ascension",
            description: "Claim a vacant domain and rise as the eighth architect.",
            epilogue: "Seven voices become eight. The council adjourns, uneasily, \
                       to redraw its charts.",
            requirements: EndingRequirements {
                favour_quorum: Some(FavourQuorum { count: 5, threshold: 60 }),
                required_flags: &[
                    FLAG_SPARE_CHOSEN,
                    FLAG_ALL_TRIALS_COMPLETED,
                    FLAG_FINAL_ANTAGONIST_DEFEATED,
                ],
                forbidden_flags: &[FLAG_HARVEST_CHOSEN],
                ..EndingRequirements::open(0, 20, 90.0)
            },
            availability: Availability::Available,
        },
        Ending {
            kind: EndingKind::Administrator,
            name: "Archon Reformation",
            description: "Accept custodianship and rewrite the Death Network from within.",
            epilogue: "The protocols bend to a steadier hand. Reform is slow, but \
                       you have nothing now except time.",
            requirements: EndingRequirements {
                favour_quorum: Some(FavourQuorum { count: 1, threshold: 0 }),
                required_flags: &[FLAG_ALL_TRIALS_COMPLETED],
                min_souls_harvested: 1000,
                min_alliances: 3,
                ..EndingRequirements::open(30, 60, 75.0)
            },
            availability: Availability::Available,
        },
        Ending {
            kind: EndingKind::Tyrant,
            name: "Lich Lord Apotheosis",
            description: "Embrace the rot and rule the living from an unliving throne.",
            epilogue: "Kingdoms learn your name the way flesh learns frost. \
                       Nothing you love remains, and nothing remains to stop you.",
            requirements: EndingRequirements {
                min_souls_harvested: 5000,
                ..EndingRequirements::open(70, 100, 40.0)
            },
            availability: Availability::Available,
        },
        Ending {
            kind: EndingKind::Dissolution,
            name: "Peaceful Dissolution",
            description: "Accept routing at last and dissolve into the stream you tended.",
            epilogue: "The first necromancer keeps vigil as your signature fades. \
                       It is, she says, a good end. She would know.",
            requirements: EndingRequirements {
                favour_quorum: Some(FavourQuorum { count: 1, threshold: 20 }),
                required_flags: &[FLAG_MENTOR_HIGH_TRUST],
                ..EndingRequirements::open(0, 50, 60.0)
            },
            availability: Availability::Available,
        },
        Ending {
            kind: EndingKind::Destruction,
            name: "The Fourth Purge",
            description: "Corruption total, the council unanimous: unroutable, and erased.",
            epilogue: "The network does not hate. It simply deletes, and reconciles \
                       its tables, and moves on.",
            requirements: EndingRequirements {
                worst_favour_at_most: Some(-70),
                ..EndingRequirements::open(90, 100, 0.0)
            },
            availability: Availability::Available,
        },
    ]
}

/// Catalogue of terminal outcomes plus the game-over latch.
///
/// At most one entry ever becomes `Unlocked`; once the latch is set the run
/// is frozen and later trigger attempts are rejected.
#[derive(Resource, Debug)]
pub struct EndingCatalog {
    endings: Vec<Ending>,
    chosen: Option<EndingKind>,
    game_ended: bool,
    ending_day: u32,
}

impl Default for EndingCatalog {
    fn default() -> Self {
        Self {
            endings: catalogue(),
            chosen: None,
            game_ended: false,
            ending_day: 0,
        }
    }
}

impl EndingCatalog {
    pub fn get(&self, kind: EndingKind) -> &Ending {
        self.endings
            .iter()
            .find(|e| e.kind == kind)
            .expect("catalogue holds every ending kind")
    }

    fn get_mut(&mut self, kind: EndingKind) -> &mut Ending {
        self.endings
            .iter_mut()
            .find(|e| e.kind == kind)
            .expect("catalogue holds every ending kind")
    }

    pub fn availability(&self, kind: EndingKind) -> &Availability {
        &self.get(kind).availability
    }

    /// True while the variant has not been locked out.
    pub fn is_available(&self, kind: EndingKind) -> bool {
        !matches!(self.get(kind).availability, Availability::Locked(_))
    }

    /// Permanently close a path. Idempotent; the first reason is kept.
    /// The terminal (unlocked) ending cannot be locked after the fact.
    pub fn lock(&mut self, kind: EndingKind, reason: &str) -> bool {
        let ending = self.get_mut(kind);
        match ending.availability {
            Availability::Available => {
                warn!(ending = kind.key(), reason, "ending path locked");
                ending.availability = Availability::Locked(reason.to_string());
                true
            }
            Availability::Locked(_) => true,
            Availability::Unlocked(_) => false,
        }
    }

    pub fn chosen(&self) -> Option<EndingKind> {
        self.chosen
    }

    pub fn has_ended(&self) -> bool {
        self.game_ended
    }

    pub fn ending_day(&self) -> u32 {
        self.ending_day
    }

    /// Evaluate an ending's full predicate against the current state.
    /// A locked variant never checks true.
    pub fn check(
        &self,
        kind: EndingKind,
        state: &dyn StatePort,
        flags: &FlagStore,
        trials: &TrialSequence,
    ) -> bool {
        let ending = self.get(kind);
        if matches!(ending.availability, Availability::Locked(_)) {
            return false;
        }
        let req = &ending.requirements;

        let corruption = state.corruption();
        if corruption < req.corruption_min || corruption > req.corruption_max {
            return false;
        }
        if state.consciousness() < req.min_consciousness {
            return false;
        }

        if let Some(quorum) = req.favour_quorum {
            let met = state
                .divine_favour()
                .iter()
                .filter(|f| **f >= quorum.threshold)
                .count();
            if met < quorum.count {
                return false;
            }
        }
        if let Some(limit) = req.worst_favour_at_most {
            let worst = state.divine_favour().into_iter().min().unwrap_or(0);
            if worst > limit {
                return false;
            }
        }

        if req.required_flags.iter().any(|f| !flags.test(f)) {
            return false;
        }
        if req.forbidden_flags.iter().any(|f| flags.test(f)) {
            return false;
        }

        if trials.count_completed() < req.min_trials_completed {
            return false;
        }
        if state.total_souls_harvested() < req.min_souls_harvested {
            return false;
        }
        if state.full_alliances() < req.min_alliances {
            return false;
        }

        true
    }

    /// Commit to an ending. Succeeds only when its predicate holds and the
    /// latch is not yet set; on success the run is over.
    pub fn trigger(
        &mut self,
        kind: EndingKind,
        day: u32,
        state: &dyn StatePort,
        flags: &FlagStore,
        trials: &TrialSequence,
    ) -> bool {
        if self.game_ended {
            warn!(ending = kind.key(), "ending trigger rejected: run already over");
            return false;
        }
        if !self.check(kind, state, flags, trials) {
            return false;
        }

        let ending = self.get_mut(kind);
        ending.availability = Availability::Unlocked(day);
        self.chosen = Some(kind);
        self.game_ended = true;
        self.ending_day = day;
        info!(ending = kind.key(), day, "terminal outcome reached");
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ending> {
        self.endings.iter()
    }

    /// Restore availability and latch state from a save payload.
    pub fn apply_saved(
        &mut self,
        availability: impl IntoIterator<Item = (EndingKind, Availability)>,
        chosen: Option<EndingKind>,
        game_ended: bool,
        ending_day: u32,
    ) {
        for (kind, state) in availability {
            self.get_mut(kind).availability = state;
        }
        self.chosen = chosen;
        self.game_ended = game_ended;
        self.ending_day = ending_day;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::facet::GameStateFacet;

    fn administrator_ready() -> (GameStateFacet, FlagStore, TrialSequence) {
        let mut facet = GameStateFacet::default();
        facet.corruption = 45;
        facet.consciousness = 80.0;
        facet.divine_favour = [10, 0, -20, 5, -5, 30, 0];
        facet.total_souls_harvested = 1500;
        facet.full_alliances = 3;

        let mut flags = FlagStore::default();
        flags.set(FLAG_ALL_TRIALS_COMPLETED);

        let mut trials = TrialSequence::default();
        trials.unlock(1);
        trials.completed_mask = 0b0111_1111;

        (facet, flags, trials)
    }

    #[test]
    fn administrator_predicate_holds_when_all_gates_met() {
        let catalog = EndingCatalog::default();
        let (facet, flags, trials) = administrator_ready();
        assert!(catalog.check(EndingKind::Administrator, &facet, &flags, &trials));
    }

    #[test]
    fn corruption_window_is_inclusive() {
        let catalog = EndingCatalog::default();
        let (mut facet, flags, trials) = administrator_ready();

        facet.corruption = 30;
        assert!(catalog.check(EndingKind::Administrator, &facet, &flags, &trials));
        facet.corruption = 60;
        assert!(catalog.check(EndingKind::Administrator, &facet, &flags, &trials));
        facet.corruption = 29;
        assert!(!catalog.check(EndingKind::Administrator, &facet, &flags, &trials));
        facet.corruption = 61;
        assert!(!catalog.check(EndingKind::Administrator, &facet, &flags, &trials));
    }

    #[test]
    fn favour_quorum_counts_boundary_deities() {
        let catalog = EndingCatalog::default();
        let mut facet = GameStateFacet::default();
        facet.corruption = 20;
        facet.consciousness = 75.0;
        let mut flags = FlagStore::default();
        flags.set(FLAG_SPARE_CHOSEN);
        flags.set(FLAG_JUDGEMENT_AVAILABLE);
        let trials = TrialSequence::default();

        // Exactly three deities at the +40 boundary.
        facet.divine_favour = [40, 40, 40, 39, 0, 0, 0];
        assert!(catalog.check(EndingKind::Resurrection, &facet, &flags, &trials));
        facet.divine_favour = [40, 40, 39, 39, 0, 0, 0];
        assert!(!catalog.check(EndingKind::Resurrection, &facet, &flags, &trials));
    }

    #[test]
    fn forbidden_flag_denies_the_path() {
        let catalog = EndingCatalog::default();
        let mut facet = GameStateFacet::default();
        facet.corruption = 10;
        facet.consciousness = 90.0;
        facet.divine_favour = [50, 50, 50, 0, 0, 0, 0];
        let mut flags = FlagStore::default();
        flags.set(FLAG_SPARE_CHOSEN);
        flags.set(FLAG_JUDGEMENT_AVAILABLE);
        flags.set(FLAG_HARVEST_CHOSEN);
        let trials = TrialSequence::default();

        assert!(!catalog.check(EndingKind::Resurrection, &facet, &flags, &trials));
    }

    #[test]
    fn destruction_requires_a_despised_necromancer() {
        let catalog = EndingCatalog::default();
        let mut facet = GameStateFacet::default();
        facet.corruption = 95;
        facet.consciousness = 5.0;
        let flags = FlagStore::default();
        let trials = TrialSequence::default();

        facet.divine_favour = [-69, -30, 0, 0, 0, 0, 0];
        assert!(!catalog.check(EndingKind::Destruction, &facet, &flags, &trials));
        facet.divine_favour = [-70, -30, 0, 0, 0, 0, 0];
        assert!(catalog.check(EndingKind::Destruction, &facet, &flags, &trials));
    }

    #[test]
    fn locking_is_permanent_and_keeps_first_reason() {
        let mut catalog = EndingCatalog::default();
        assert!(catalog.is_available(EndingKind::Resurrection));
        assert!(catalog.lock(EndingKind::Resurrection, "full harvest"));
        assert!(catalog.lock(EndingKind::Resurrection, "other reason"));
        match catalog.availability(EndingKind::Resurrection) {
            Availability::Locked(reason) => assert_eq!(reason, "full harvest"),
            other => panic!("expected lock, got {other:?}"),
        }
        assert!(!catalog.is_available(EndingKind::Resurrection));
        assert!(catalog.is_available(EndingKind::Tyrant));
    }

    #[test]
    fn locked_ending_never_checks_true() {
        let mut catalog = EndingCatalog::default();
        let (facet, flags, trials) = administrator_ready();
        catalog.lock(EndingKind::Administrator, "ignored the divine summons");
        assert!(!catalog.check(EndingKind::Administrator, &facet, &flags, &trials));
    }

    #[test]
    fn trigger_sets_the_latch_exactly_once() {
        let mut catalog = EndingCatalog::default();
        let (facet, flags, trials) = administrator_ready();

        assert!(catalog.trigger(EndingKind::Administrator, 170, &facet, &flags, &trials));
        assert!(catalog.has_ended());
        assert_eq!(catalog.chosen(), Some(EndingKind::Administrator));
        assert_eq!(catalog.ending_day(), 170);
        assert!(matches!(
            catalog.availability(EndingKind::Administrator),
            Availability::Unlocked(170)
        ));

        // Latch is monotonic: nothing else can trigger, even if eligible.
        assert!(!catalog.trigger(EndingKind::Administrator, 171, &facet, &flags, &trials));
        assert!(!catalog.trigger(EndingKind::Tyrant, 171, &facet, &flags, &trials));
        // And the terminal variant cannot be locked afterwards.
        assert!(!catalog.lock(EndingKind::Administrator, "too late"));
    }

    #[test]
    fn predicate_failure_does_not_set_the_latch() {
        let mut catalog = EndingCatalog::default();
        let facet = GameStateFacet::default();
        let flags = FlagStore::default();
        let trials = TrialSequence::default();

        assert!(!catalog.trigger(EndingKind::Tyrant, 10, &facet, &flags, &trials));
        assert!(!catalog.has_ended());
    }
}

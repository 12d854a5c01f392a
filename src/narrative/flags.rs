use bevy_ecs::prelude::*;
use bevy_utils::tracing::{debug, warn};
use serde::{Deserialize, Serialize};

/// Maximum number of distinct flags a run can accumulate.
pub const MAX_FLAGS: usize = 128;
/// Maximum length of a flag name in bytes.
pub const MAX_FLAG_NAME: usize = 64;

// Canonical story flags. Events set them; triggers and ending requirements
// read them.
pub const FLAG_HARVEST_CHOSEN: &str = "harvest_chosen";
pub const FLAG_SPARE_CHOSEN: &str = "spare_chosen";
pub const FLAG_MASS_EVENT_RESOLVED: &str = "mass_event_resolved";
pub const FLAG_MENTOR_CONTACTED: &str = "mentor_contacted";
pub const FLAG_PATHS_REVEALED: &str = "paths_revealed";
pub const FLAG_GUIDANCE_ACCEPTED: &str = "guidance_accepted";
pub const FLAG_GUIDANCE_REJECTED: &str = "guidance_rejected";
pub const FLAG_MENTOR_HIGH_TRUST: &str = "mentor_high_trust";
pub const FLAG_SUMMONS_RECEIVED: &str = "summons_received";
pub const FLAG_SUMMONS_ACKNOWLEDGED: &str = "summons_acknowledged";
pub const FLAG_SUMMONS_IGNORED: &str = "summons_ignored";
pub const FLAG_ALL_TRIALS_COMPLETED: &str = "all_trials_completed";
pub const FLAG_JUDGEMENT_AVAILABLE: &str = "judgement_available";
pub const FLAG_FINAL_ANTAGONIST_DEFEATED: &str = "final_antagonist_defeated";

/// Flag name for "trial `n` unlocked", 1..=7.
pub fn trial_unlocked_flag(n: u32) -> String {
    format!("trial_{n}_unlocked")
}

/// Flag name for "trial `n` completed", 1..=7.
pub fn trial_completed_flag(n: u32) -> String {
    format!("trial_{n}_completed")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GameFlag {
    name: String,
    set: bool,
}

/// Named boolean set coupling story events together.
///
/// Small and append-only; lookup is a linear scan, which is fine at this
/// scale. Unknown names read as unset.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagStore {
    flags: Vec<GameFlag>,
}

impl FlagStore {
    /// Record `name` as set. Idempotent. Returns false only when the store
    /// is full and the name is new, or the name exceeds the size cap.
    pub fn set(&mut self, name: &str) -> bool {
        if name.len() > MAX_FLAG_NAME {
            warn!(flag = name, "flag name exceeds size cap");
            return false;
        }
        if let Some(flag) = self.flags.iter_mut().find(|f| f.name == name) {
            flag.set = true;
            return true;
        }
        if self.flags.len() >= MAX_FLAGS {
            warn!(flag = name, "flag store is full");
            return false;
        }
        debug!(flag = name, "flag set");
        self.flags.push(GameFlag {
            name: name.to_string(),
            set: true,
        });
        true
    }

    /// Whether `name` is set. Unknown names read as false.
    pub fn test(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f.name == name && f.set)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Names of all set flags, in insertion order.
    pub fn set_names(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().filter(|f| f.set).map(|f| f.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_flag_reads_false() {
        let store = FlagStore::default();
        assert!(!store.test("never_set"));
    }

    #[test]
    fn set_is_idempotent() {
        let mut store = FlagStore::default();
        assert!(store.set(FLAG_SPARE_CHOSEN));
        assert!(store.set(FLAG_SPARE_CHOSEN));
        assert!(store.test(FLAG_SPARE_CHOSEN));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn full_store_rejects_new_names_but_not_existing() {
        let mut store = FlagStore::default();
        for i in 0..MAX_FLAGS {
            assert!(store.set(&format!("flag_{i}")));
        }
        assert!(!store.set("one_too_many"));
        assert!(store.set("flag_0"));
    }

    #[test]
    fn oversized_name_is_rejected() {
        let mut store = FlagStore::default();
        let name = "x".repeat(MAX_FLAG_NAME + 1);
        assert!(!store.set(&name));
        assert!(!store.test(&name));
    }
}

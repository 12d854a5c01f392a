use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::serialization::{SaveState, SavedEndings, SavedEventStatus};
use crate::narrative::endings::{Availability, EndingKind};
use crate::narrative::events::mentor::{MentorContact, MentorState};
use crate::narrative::events::summons::{DivineSummons, SummonsState};
use crate::narrative::events::village::{VillageChoice, VillageEvent};
use crate::narrative::flags::FlagStore;
use crate::narrative::trials::{SequenceState, TrialSequence};
use crate::save::repository::SaveRepository;
use crate::state::facet::{GameStateFacet, DEITY_COUNT};

const SAVE_SCHEMA_VERSION: i64 = 1;
const SAVE_VERSION: i64 = 1;

const SAVE_DB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS save_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  schema_version INTEGER NOT NULL,
  save_version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS run_clock (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  hours_into_day INTEGER NOT NULL,
  day_count INTEGER NOT NULL,
  corruption INTEGER NOT NULL,
  consciousness REAL NOT NULL,
  current_location INTEGER NOT NULL,
  souls_harvested INTEGER NOT NULL,
  soul_energy INTEGER NOT NULL,
  full_alliances INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS divine_favour (
  deity INTEGER PRIMARY KEY,
  favour INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS flags (
  name TEXT PRIMARY KEY,
  is_set INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS event_status (
  event_id INTEGER PRIMARY KEY,
  triggered INTEGER NOT NULL,
  completed INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS story_beats (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  village_choice TEXT NOT NULL,
  village_souls INTEGER NOT NULL,
  village_energy INTEGER NOT NULL,
  mentor_state TEXT NOT NULL,
  mentor_trust INTEGER NOT NULL,
  refuge_discovered INTEGER NOT NULL,
  summons_state TEXT NOT NULL,
  response_deadline INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS trial_progress (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  state TEXT NOT NULL,
  unlocked INTEGER NOT NULL,
  completed_mask INTEGER NOT NULL,
  failed_mask INTEGER NOT NULL,
  last_completion_day INTEGER NOT NULL,
  judgement_armed INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ending_availability (
  kind TEXT PRIMARY KEY,
  status TEXT NOT NULL,
  reason TEXT,
  unlock_day INTEGER
);

CREATE TABLE IF NOT EXISTS run_outcome (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  chosen TEXT,
  game_ended INTEGER NOT NULL,
  ending_day INTEGER NOT NULL
);
"#;

#[derive(Debug)]
pub enum SaveDbError {
    Sqlite(rusqlite::Error),
    Corrupt(String),
}

impl std::fmt::Display for SaveDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveDbError::Sqlite(err) => write!(f, "save db error: {}", err),
            SaveDbError::Corrupt(message) => write!(f, "corrupt save db: {}", message),
        }
    }
}

impl std::error::Error for SaveDbError {}

impl From<rusqlite::Error> for SaveDbError {
    fn from(err: rusqlite::Error) -> Self {
        SaveDbError::Sqlite(err)
    }
}

fn village_choice_str(choice: VillageChoice) -> &'static str {
    match choice {
        VillageChoice::NotDiscovered => "not_discovered",
        VillageChoice::Presented => "presented",
        VillageChoice::Harvested => "harvested",
        VillageChoice::Spared => "spared",
    }
}

fn village_choice_from(text: &str) -> Result<VillageChoice, SaveDbError> {
    match text {
        "not_discovered" => Ok(VillageChoice::NotDiscovered),
        "presented" => Ok(VillageChoice::Presented),
        "harvested" => Ok(VillageChoice::Harvested),
        "spared" => Ok(VillageChoice::Spared),
        other => Err(SaveDbError::Corrupt(format!("village choice {other}"))),
    }
}

fn mentor_state_str(state: MentorState) -> &'static str {
    match state {
        MentorState::NotContacted => "not_contacted",
        MentorState::Contacted => "contacted",
        MentorState::PathsRevealed => "paths_revealed",
        MentorState::TrustEstablished => "trust_established",
    }
}

fn mentor_state_from(text: &str) -> Result<MentorState, SaveDbError> {
    match text {
        "not_contacted" => Ok(MentorState::NotContacted),
        "contacted" => Ok(MentorState::Contacted),
        "paths_revealed" => Ok(MentorState::PathsRevealed),
        "trust_established" => Ok(MentorState::TrustEstablished),
        other => Err(SaveDbError::Corrupt(format!("mentor state {other}"))),
    }
}

fn summons_state_str(state: SummonsState) -> &'static str {
    match state {
        SummonsState::NotReceived => "not_received",
        SummonsState::Received => "received",
        SummonsState::Acknowledged => "acknowledged",
        SummonsState::Ignored => "ignored",
    }
}

fn summons_state_from(text: &str) -> Result<SummonsState, SaveDbError> {
    match text {
        "not_received" => Ok(SummonsState::NotReceived),
        "received" => Ok(SummonsState::Received),
        "acknowledged" => Ok(SummonsState::Acknowledged),
        "ignored" => Ok(SummonsState::Ignored),
        other => Err(SaveDbError::Corrupt(format!("summons state {other}"))),
    }
}

fn sequence_state_str(state: SequenceState) -> &'static str {
    match state {
        SequenceState::Inactive => "inactive",
        SequenceState::Active => "active",
        SequenceState::Completed => "completed",
        SequenceState::Failed => "failed",
    }
}

fn sequence_state_from(text: &str) -> Result<SequenceState, SaveDbError> {
    match text {
        "inactive" => Ok(SequenceState::Inactive),
        "active" => Ok(SequenceState::Active),
        "completed" => Ok(SequenceState::Completed),
        "failed" => Ok(SequenceState::Failed),
        other => Err(SaveDbError::Corrupt(format!("sequence state {other}"))),
    }
}

/// SQLite-backed save store for one run.
pub struct SaveDb {
    conn: Connection,
}

impl SaveDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SaveDbError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SaveDbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SaveDbError> {
        conn.execute_batch(SAVE_DB_SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO save_meta (id, schema_version, save_version)
             VALUES (1, ?1, ?2)",
            params![SAVE_SCHEMA_VERSION, SAVE_VERSION],
        )?;
        let db = Self { conn };
        db.check_schema_version()?;
        Ok(db)
    }

    fn check_schema_version(&self) -> Result<(), SaveDbError> {
        let version: i64 =
            self.conn
                .query_row("SELECT schema_version FROM save_meta WHERE id = 1", [], |row| {
                    row.get(0)
                })?;
        if version != SAVE_SCHEMA_VERSION {
            return Err(SaveDbError::Corrupt(format!(
                "schema version {version}, expected {SAVE_SCHEMA_VERSION}"
            )));
        }
        Ok(())
    }

    fn read_state(&self) -> Result<Option<SaveState>, SaveDbError> {
        let clock = self
            .conn
            .query_row(
                "SELECT hours_into_day, day_count, corruption, consciousness,
                        current_location, souls_harvested, soul_energy, full_alliances
                 FROM run_clock WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((hours, day, corruption, consciousness, location, souls, energy, alliances)) =
            clock
        else {
            return Ok(None);
        };

        let mut facet = GameStateFacet {
            day_count: day as u32,
            corruption: corruption as u8,
            consciousness: consciousness as f32,
            current_location_id: location as u32,
            divine_favour: [0; DEITY_COUNT],
            total_souls_harvested: souls as u32,
            soul_energy: energy as u32,
            full_alliances: alliances as u8,
        };

        {
            let mut stmt = self
                .conn
                .prepare("SELECT deity, favour FROM divine_favour")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (deity, favour) = row?;
                let index = deity as usize;
                if index >= DEITY_COUNT {
                    return Err(SaveDbError::Corrupt(format!("deity index {index}")));
                }
                facet.divine_favour[index] = favour as i16;
            }
        }

        let mut flags = FlagStore::default();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT name FROM flags WHERE is_set = 1 ORDER BY rowid")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for name in rows {
                flags.set(&name?);
            }
        }

        let mut events = Vec::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT event_id, triggered, completed FROM event_status")?;
            let rows = stmt.query_map([], |row| {
                Ok(SavedEventStatus {
                    id: row.get::<_, i64>(0)? as u32,
                    triggered: row.get::<_, i64>(1)? != 0,
                    completed: row.get::<_, i64>(2)? != 0,
                })
            })?;
            for row in rows {
                events.push(row?);
            }
        }

        let beats = self.conn.query_row(
            "SELECT village_choice, village_souls, village_energy, mentor_state,
                    mentor_trust, refuge_discovered, summons_state, response_deadline
             FROM story_beats WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            },
        )?;
        let village = VillageEvent {
            choice: village_choice_from(&beats.0)?,
            souls_gained: beats.1 as u32,
            energy_gained: beats.2 as u32,
        };
        let mentor = MentorContact {
            state: mentor_state_from(&beats.3)?,
            trust: beats.4 as u32,
            refuge_discovered: beats.5 != 0,
        };
        let summons = DivineSummons {
            state: summons_state_from(&beats.6)?,
            response_deadline: beats.7 as u32,
        };

        let trials = self.conn.query_row(
            "SELECT state, unlocked, completed_mask, failed_mask,
                    last_completion_day, judgement_armed
             FROM trial_progress WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            },
        )?;
        let trials = TrialSequence {
            state: sequence_state_from(&trials.0)?,
            unlocked: trials.1 as u8,
            completed_mask: trials.2 as u8,
            failed_mask: trials.3 as u8,
            last_completion_day: trials.4 as u32,
            judgement_armed: trials.5 != 0,
        };

        let mut availability = Vec::new();
        {
            let mut stmt = self
                .conn
                .prepare("SELECT kind, status, reason, unlock_day FROM ending_availability")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            })?;
            for row in rows {
                let (kind_key, status, reason, unlock_day) = row?;
                let kind = EndingKind::from_key(&kind_key)
                    .ok_or_else(|| SaveDbError::Corrupt(format!("ending kind {kind_key}")))?;
                let state = match status.as_str() {
                    "available" => Availability::Available,
                    "locked" => Availability::Locked(reason.unwrap_or_default()),
                    "unlocked" => Availability::Unlocked(unlock_day.unwrap_or(0) as u32),
                    other => {
                        return Err(SaveDbError::Corrupt(format!("availability {other}")))
                    }
                };
                availability.push((kind, state));
            }
        }

        let outcome = self.conn.query_row(
            "SELECT chosen, game_ended, ending_day FROM run_outcome WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        let chosen = match outcome.0 {
            Some(key) => Some(
                EndingKind::from_key(&key)
                    .ok_or_else(|| SaveDbError::Corrupt(format!("ending kind {key}")))?,
            ),
            None => None,
        };

        Ok(Some(SaveState {
            version: SAVE_VERSION as u32,
            hours_into_day: hours as u32,
            facet,
            flags,
            events,
            village,
            mentor,
            summons,
            trials,
            endings: SavedEndings {
                availability,
                chosen,
                game_ended: outcome.1 != 0,
                ending_day: outcome.2 as u32,
            },
        }))
    }

    fn write_state(&mut self, state: &SaveState) -> Result<(), SaveDbError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO run_clock
               (id, hours_into_day, day_count, corruption, consciousness,
                current_location, souls_harvested, soul_energy, full_alliances)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                state.hours_into_day,
                state.facet.day_count,
                state.facet.corruption,
                state.facet.consciousness as f64,
                state.facet.current_location_id,
                state.facet.total_souls_harvested,
                state.facet.soul_energy,
                state.facet.full_alliances,
            ],
        )?;

        tx.execute("DELETE FROM divine_favour", [])?;
        for (deity, favour) in state.facet.divine_favour.iter().enumerate() {
            tx.execute(
                "INSERT INTO divine_favour (deity, favour) VALUES (?1, ?2)",
                params![deity as i64, *favour],
            )?;
        }

        tx.execute("DELETE FROM flags", [])?;
        for name in state.flags.set_names() {
            tx.execute(
                "INSERT INTO flags (name, is_set) VALUES (?1, 1)",
                params![name],
            )?;
        }

        tx.execute("DELETE FROM event_status", [])?;
        for event in &state.events {
            tx.execute(
                "INSERT INTO event_status (event_id, triggered, completed)
                 VALUES (?1, ?2, ?3)",
                params![event.id, event.triggered as i64, event.completed as i64],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO story_beats
               (id, village_choice, village_souls, village_energy, mentor_state,
                mentor_trust, refuge_discovered, summons_state, response_deadline)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                village_choice_str(state.village.choice),
                state.village.souls_gained,
                state.village.energy_gained,
                mentor_state_str(state.mentor.state),
                state.mentor.trust,
                state.mentor.refuge_discovered as i64,
                summons_state_str(state.summons.state),
                state.summons.response_deadline,
            ],
        )?;

        tx.execute(
            "INSERT OR REPLACE INTO trial_progress
               (id, state, unlocked, completed_mask, failed_mask,
                last_completion_day, judgement_armed)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sequence_state_str(state.trials.state),
                state.trials.unlocked,
                state.trials.completed_mask,
                state.trials.failed_mask,
                state.trials.last_completion_day,
                state.trials.judgement_armed as i64,
            ],
        )?;

        tx.execute("DELETE FROM ending_availability", [])?;
        for (kind, availability) in &state.endings.availability {
            let (status, reason, unlock_day): (&str, Option<&str>, Option<i64>) =
                match availability {
                    Availability::Available => ("available", None, None),
                    Availability::Locked(reason) => ("locked", Some(reason.as_str()), None),
                    Availability::Unlocked(day) => ("unlocked", None, Some(*day as i64)),
                };
            tx.execute(
                "INSERT INTO ending_availability (kind, status, reason, unlock_day)
                 VALUES (?1, ?2, ?3, ?4)",
                params![kind.key(), status, reason, unlock_day],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO run_outcome (id, chosen, game_ended, ending_day)
             VALUES (1, ?1, ?2, ?3)",
            params![
                state.endings.chosen.map(|k| k.key()),
                state.endings.game_ended as i64,
                state.endings.ending_day,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

impl SaveRepository for SaveDb {
    fn load_or_init(&mut self) -> Result<Option<SaveState>, Box<dyn std::error::Error>> {
        Ok(self.read_state()?)
    }

    fn save_state(&mut self, state: &SaveState) -> Result<(), Box<dyn std::error::Error>> {
        Ok(self.write_state(state)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ecs::create_world;
    use crate::core::serialization::extract_state_from_world;
    use crate::narrative::scheduler::EventRegistry;
    use crate::narrative::events::registration::register_story_events;

    fn sample_state() -> SaveState {
        let mut world = create_world();
        register_story_events(&mut world.resource_mut::<EventRegistry>());
        world.resource_mut::<FlagStore>().set("harvest_chosen");
        world.resource_mut::<FlagStore>().set("mass_event_resolved");
        world.resource_mut::<EventRegistry>().apply_status(47, true, true);
        {
            use crate::narrative::endings::EndingCatalog;
            let mut catalog = world.resource_mut::<EndingCatalog>();
            catalog.lock(EndingKind::Resurrection, "full harvest");
        }
        {
            let mut village = world.resource_mut::<VillageEvent>();
            village.choice = VillageChoice::Harvested;
            village.souls_gained = 147;
            village.energy_gained = 2790;
        }

        let mut facet = GameStateFacet::default();
        facet.day_count = 60;
        facet.corruption = 33;
        facet.consciousness = 91.5;
        facet.divine_favour = [-12, 4, 0, 7, -70, 22, 0];
        facet.total_souls_harvested = 147;
        facet.soul_energy = 2790;

        extract_state_from_world(&world, &facet, 13)
    }

    #[test]
    fn fresh_database_loads_none() {
        let mut db = SaveDb::open_in_memory().unwrap();
        assert!(db.load_or_init().unwrap().is_none());
    }

    #[test]
    fn sqlite_round_trip_preserves_the_payload() {
        let mut db = SaveDb::open_in_memory().unwrap();
        let state = sample_state();
        db.save_state(&state).unwrap();

        let loaded = db.load_or_init().unwrap().expect("payload stored");
        assert_eq!(loaded.hours_into_day, 13);
        assert_eq!(loaded.facet.day_count, 60);
        assert_eq!(loaded.facet.corruption, 33);
        assert_eq!(loaded.facet.divine_favour, state.facet.divine_favour);
        assert!(loaded.flags.test("harvest_chosen"));
        assert!(loaded.flags.test("mass_event_resolved"));
        assert!(!loaded.flags.test("spare_chosen"));
        assert_eq!(loaded.village.choice, VillageChoice::Harvested);
        assert_eq!(loaded.village.energy_gained, 2790);

        let saved_47 = loaded.events.iter().find(|e| e.id == 47).unwrap();
        assert!(saved_47.triggered && saved_47.completed);
        let saved_50 = loaded.events.iter().find(|e| e.id == 50).unwrap();
        assert!(!saved_50.triggered);

        let resurrection = loaded
            .endings
            .availability
            .iter()
            .find(|(k, _)| *k == EndingKind::Resurrection)
            .unwrap();
        assert_eq!(
            resurrection.1,
            Availability::Locked("full harvest".to_string())
        );
        assert!(!loaded.endings.game_ended);
    }

    #[test]
    fn second_save_replaces_the_first() {
        let mut db = SaveDb::open_in_memory().unwrap();
        let mut state = sample_state();
        db.save_state(&state).unwrap();

        state.facet.day_count = 75;
        state.flags.set("paths_revealed");
        db.save_state(&state).unwrap();

        let loaded = db.load_or_init().unwrap().unwrap();
        assert_eq!(loaded.facet.day_count, 75);
        assert!(loaded.flags.test("paths_revealed"));
    }
}

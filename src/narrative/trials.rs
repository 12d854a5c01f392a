use bevy_ecs::prelude::*;
use bevy_utils::tracing::{info, warn};
use serde::{Deserialize, Serialize};

use crate::narrative::endings::{EndingCatalog, EndingKind};
use crate::narrative::flags::{
    trial_completed_flag, trial_unlocked_flag, FLAG_ALL_TRIALS_COMPLETED,
    FLAG_JUDGEMENT_AVAILABLE,
};
use crate::narrative::scheduler::StoryCtx;
use crate::state::facet::Deity;

/// Number of trials in the divine sequence.
pub const TRIAL_COUNT: u32 = 7;

/// Favour earned with a trial's presiding deity on completion.
const TRIAL_FAVOUR_GAIN: i16 = 15;
/// Favour lost with the presiding deity on failure.
const TRIAL_FAVOUR_LOSS: i16 = -20;

/// Static description of one trial.
#[derive(Debug, Clone, Copy)]
pub struct TrialInfo {
    pub number: u32,
    pub name: &'static str,
    /// The architect who judges this trial; its outcome moves their favour.
    pub presiding: Deity,
    /// Failing an unrecoverable trial ends the sequence and closes the
    /// Administrator path.
    pub unrecoverable: bool,
}

/// The seven trials, in unlock order. Power is single combat against the
/// council's enforcer and Sacrifice is a one-shot choice; neither can be
/// reattempted after a loss.
pub const TRIALS: [TrialInfo; TRIAL_COUNT as usize] = [
    TrialInfo { number: 1, name: "Test of Power", presiding: Deity::Seraph, unrecoverable: true },
    TrialInfo { number: 2, name: "Test of Wisdom", presiding: Deity::Keldrin, unrecoverable: false },
    TrialInfo { number: 3, name: "Test of Morality", presiding: Deity::Anara, unrecoverable: false },
    TrialInfo { number: 4, name: "Test of Technical Skill", presiding: Deity::Nexus, unrecoverable: false },
    TrialInfo { number: 5, name: "Test of Resolve", presiding: Deity::Theros, unrecoverable: false },
    TrialInfo { number: 6, name: "Test of Sacrifice", presiding: Deity::Seraph, unrecoverable: true },
    TrialInfo { number: 7, name: "Test of Leadership", presiding: Deity::Vorathos, unrecoverable: false },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceState {
    Inactive,
    Active,
    Completed,
    Failed,
}

/// Error raised by trial progression calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialError {
    /// Trial number outside 1..=7.
    OutOfRange(u32),
    /// The trial has not been unlocked yet.
    Locked(u32),
    /// The trial already has a completion or failure recorded.
    AlreadyResolved(u32),
}

impl std::fmt::Display for TrialError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrialError::OutOfRange(n) => write!(f, "trial {} is out of range (1-7)", n),
            TrialError::Locked(n) => write!(f, "trial {} has not been unlocked", n),
            TrialError::AlreadyResolved(n) => write!(f, "trial {} is already resolved", n),
        }
    }
}

impl std::error::Error for TrialError {}

/// Gated seven-step progression toward the final judgement.
///
/// Bit `n-1` in each mask corresponds to trial `n`. A completed bit implies
/// every earlier trial was unlocked; the masks for completion and failure
/// stay disjoint.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct TrialSequence {
    pub state: SequenceState,
    pub unlocked: u8,
    pub completed_mask: u8,
    pub failed_mask: u8,
    pub last_completion_day: u32,
    pub judgement_armed: bool,
}

impl Default for TrialSequence {
    fn default() -> Self {
        Self {
            state: SequenceState::Inactive,
            unlocked: 0,
            completed_mask: 0,
            failed_mask: 0,
            last_completion_day: 0,
            judgement_armed: false,
        }
    }
}

fn bit(trial_number: u32) -> u8 {
    1 << (trial_number - 1)
}

fn in_range(trial_number: u32) -> bool {
    (1..=TRIAL_COUNT).contains(&trial_number)
}

impl TrialSequence {
    pub fn is_unlocked(&self, n: u32) -> bool {
        in_range(n) && self.unlocked & bit(n) != 0
    }

    pub fn is_completed(&self, n: u32) -> bool {
        in_range(n) && self.completed_mask & bit(n) != 0
    }

    pub fn is_failed(&self, n: u32) -> bool {
        in_range(n) && self.failed_mask & bit(n) != 0
    }

    pub fn count_completed(&self) -> u32 {
        self.completed_mask.count_ones()
    }

    pub fn count_failed(&self) -> u32 {
        self.failed_mask.count_ones()
    }

    pub fn all_completed(&self) -> bool {
        self.count_completed() == TRIAL_COUNT
    }

    /// Mark a trial reachable. The first unlock activates the sequence.
    /// The state machine never moves backwards out of Completed or Failed.
    pub fn unlock(&mut self, n: u32) -> bool {
        if !in_range(n) {
            return false;
        }
        self.unlocked |= bit(n);
        if self.state == SequenceState::Inactive {
            self.state = SequenceState::Active;
        }
        true
    }
}

/// Record trial `n` as completed: set its bit, publish its flags, and either
/// unlock the next trial or arm the final judgement.
pub fn on_completion(ctx: &mut StoryCtx, trial_number: u32) -> Result<(), TrialError> {
    if !in_range(trial_number) {
        return Err(TrialError::OutOfRange(trial_number));
    }

    let day = ctx.state.day_count();
    {
        let seq = ctx.world.resource::<TrialSequence>();
        if !seq.is_unlocked(trial_number) {
            return Err(TrialError::Locked(trial_number));
        }
        if seq.is_completed(trial_number) || seq.is_failed(trial_number) {
            return Err(TrialError::AlreadyResolved(trial_number));
        }
    }

    let info = TRIALS[(trial_number - 1) as usize];
    info!(
        trial = trial_number,
        name = info.name,
        judge = info.presiding.name(),
        day,
        "trial completed"
    );

    {
        let mut seq = ctx.world.resource_mut::<TrialSequence>();
        seq.completed_mask |= bit(trial_number);
        seq.last_completion_day = day;
    }
    ctx.state.adjust_favour(info.presiding, TRIAL_FAVOUR_GAIN);
    ctx.set_flag(&trial_completed_flag(trial_number));

    if trial_number < TRIAL_COUNT {
        let next = trial_number + 1;
        ctx.world.resource_mut::<TrialSequence>().unlock(next);
        ctx.set_flag(&trial_unlocked_flag(next));
        info!(trial = next, "next trial unlocked");
    } else {
        let mut seq = ctx.world.resource_mut::<TrialSequence>();
        seq.state = SequenceState::Completed;
        seq.judgement_armed = true;
        drop(seq);
        ctx.set_flag(FLAG_ALL_TRIALS_COMPLETED);
        ctx.set_flag(FLAG_JUDGEMENT_AVAILABLE);
        info!("all seven trials complete; final judgement armed");
    }

    Ok(())
}

/// Record trial `n` as failed. An unrecoverable trial ends the sequence and
/// locks the Administrator ending.
pub fn on_failure(ctx: &mut StoryCtx, trial_number: u32) -> Result<(), TrialError> {
    if !in_range(trial_number) {
        return Err(TrialError::OutOfRange(trial_number));
    }

    {
        let seq = ctx.world.resource::<TrialSequence>();
        if !seq.is_unlocked(trial_number) {
            return Err(TrialError::Locked(trial_number));
        }
        if seq.is_completed(trial_number) || seq.is_failed(trial_number) {
            return Err(TrialError::AlreadyResolved(trial_number));
        }
    }

    let info = TRIALS[(trial_number - 1) as usize];
    warn!(trial = trial_number, name = info.name, "trial failed");

    ctx.world.resource_mut::<TrialSequence>().failed_mask |= bit(trial_number);
    ctx.state.adjust_favour(info.presiding, TRIAL_FAVOUR_LOSS);

    if info.unrecoverable {
        ctx.world.resource_mut::<TrialSequence>().state = SequenceState::Failed;
        let reason = format!("failed the {}", info.name);
        ctx.world
            .resource_mut::<EndingCatalog>()
            .lock(EndingKind::Administrator, &reason);
        warn!(trial = trial_number, "sequence failed; Administrator path closed");
    }

    Ok(())
}

pub mod mentor;
pub mod registration;
pub mod summons;
pub mod village;

pub use registration::register_story_events;

/// Rejection raised by a story interaction invoked out of order or twice.
/// Nothing is mutated when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryError {
    /// The village choice cannot be made before the event has been presented.
    ChoiceNotPresented,
    /// The village choice was already made.
    ChoiceAlreadyResolved,
    /// The mentor has not reached out yet.
    MentorNotContacted,
    /// The six paths have already been laid out.
    PathsAlreadyRevealed,
    /// The six paths have not been revealed yet.
    PathsNotRevealed,
    /// No summons has been received.
    SummonsNotReceived,
    /// The summons was already acknowledged.
    SummonsAlreadyAnswered,
    /// The response window has closed.
    SummonsDeadlinePassed,
}

impl std::fmt::Display for StoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            StoryError::ChoiceNotPresented => "the village has not been discovered yet",
            StoryError::ChoiceAlreadyResolved => "the village's fate is already sealed",
            StoryError::MentorNotContacted => "no one has reached out through the network",
            StoryError::PathsAlreadyRevealed => "the six paths have already been revealed",
            StoryError::PathsNotRevealed => "the six paths have not been revealed",
            StoryError::SummonsNotReceived => "the divine council has not summoned you",
            StoryError::SummonsAlreadyAnswered => "the summons has already been answered",
            StoryError::SummonsDeadlinePassed => "the response deadline has passed",
        };
        f.write_str(text)
    }
}

impl std::error::Error for StoryError {}

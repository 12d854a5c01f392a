use crate::core::serialization::SaveState;

/// Storage backend for the save payload. The engine produces and consumes
/// [`SaveState`]; a repository only has to round-trip it faithfully.
pub trait SaveRepository {
    /// Load the stored payload, or `None` when the store is fresh.
    fn load_or_init(&mut self) -> Result<Option<SaveState>, Box<dyn std::error::Error>>;

    /// Persist the payload, replacing any previous save.
    fn save_state(&mut self, state: &SaveState) -> Result<(), Box<dyn std::error::Error>>;
}

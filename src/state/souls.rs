use serde::{Deserialize, Serialize};

/// Broad classification of a harvested soul.
///
/// The host keeps the full soul inventory; the core only needs the kind and
/// quality to credit a deterministic energy value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoulKind {
    Common,
    Warrior,
    Mage,
    Innocent,
    Corrupted,
    Ancient,
}

impl SoulKind {
    pub fn name(self) -> &'static str {
        match self {
            SoulKind::Common => "Common",
            SoulKind::Warrior => "Warrior",
            SoulKind::Mage => "Mage",
            SoulKind::Innocent => "Innocent",
            SoulKind::Corrupted => "Corrupted",
            SoulKind::Ancient => "Ancient",
        }
    }

    /// Base energy range for the kind, before quality scaling.
    fn energy_range(self) -> (u32, u32) {
        match self {
            SoulKind::Common => (10, 20),
            SoulKind::Warrior => (20, 40),
            SoulKind::Mage => (30, 50),
            SoulKind::Innocent => (15, 25),
            SoulKind::Corrupted => (25, 35),
            SoulKind::Ancient => (50, 100),
        }
    }
}

/// Energy yielded by a soul of the given kind and quality.
///
/// Quality is a 0..=100 grade; values above 100 are clamped. The result is
/// `base_min` at quality 0 and `base_max` at quality 100, interpolated with
/// integer arithmetic so the value is stable across platforms.
pub fn soul_energy(kind: SoulKind, quality: u8) -> u32 {
    let quality = quality.min(100) as u32;
    let (base_min, base_max) = kind.energy_range();
    base_min + (base_max - base_min) * quality / 100
}

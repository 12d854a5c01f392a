use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::state::souls::SoulKind;

/// Number of deities on the divine council.
pub const DEITY_COUNT: usize = 7;

/// The seven divine architects, in favour-array order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deity {
    /// Anara, Weaver of Existence (Life).
    Anara,
    /// Keldrin, the Lawgiver (Order).
    Keldrin,
    /// Theros, Keeper of Eternity (Time).
    Theros,
    /// Myrith (Souls).
    Myrith,
    /// Vorathos (Entropy).
    Vorathos,
    /// Seraph (Boundaries).
    Seraph,
    /// Nexus (Networks).
    Nexus,
}

impl Deity {
    pub const ALL: [Deity; DEITY_COUNT] = [
        Deity::Anara,
        Deity::Keldrin,
        Deity::Theros,
        Deity::Myrith,
        Deity::Vorathos,
        Deity::Seraph,
        Deity::Nexus,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Deity::Anara => "Anara",
            Deity::Keldrin => "Keldrin",
            Deity::Theros => "Theros",
            Deity::Myrith => "Myrith",
            Deity::Vorathos => "Vorathos",
            Deity::Seraph => "Seraph",
            Deity::Nexus => "Nexus",
        }
    }
}

/// The slice of the host's game state the progression core reads and writes.
///
/// A host with a richer domain model implements [`StatePort`] over it; the
/// struct here is a complete facet in its own right and is what the bundled
/// [`GameStateHandle`] wraps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateFacet {
    pub day_count: u32,
    /// Corruption percentage, clamped to 0..=100 on every write.
    pub corruption: u8,
    /// Consciousness stability, 0.0..=100.0.
    pub consciousness: f32,
    pub current_location_id: u32,
    /// Per-deity favour, -100..=100, indexed by [`Deity`].
    pub divine_favour: [i16; DEITY_COUNT],
    pub total_souls_harvested: u32,
    pub soul_energy: u32,
    /// Factions with a sealed full alliance, 0..=7.
    pub full_alliances: u8,
}

impl Default for GameStateFacet {
    fn default() -> Self {
        Self {
            day_count: 1,
            corruption: 0,
            consciousness: 100.0,
            current_location_id: 0,
            divine_favour: [0; DEITY_COUNT],
            total_souls_harvested: 0,
            soul_energy: 0,
            full_alliances: 0,
        }
    }
}

impl GameStateFacet {
    pub fn adjust_corruption(&mut self, delta: i32) {
        let value = self.corruption as i32 + delta;
        self.corruption = value.clamp(0, 100) as u8;
    }

    pub fn adjust_favour(&mut self, deity: Deity, delta: i16) {
        let slot = &mut self.divine_favour[deity.index()];
        *slot = (*slot + delta).clamp(-100, 100);
    }

    /// Count of deities whose favour is at or above `threshold`.
    pub fn favour_quorum(&self, threshold: i16) -> usize {
        self.divine_favour.iter().filter(|f| **f >= threshold).count()
    }

    /// The lowest favour held with any deity.
    pub fn worst_favour(&self) -> i16 {
        self.divine_favour.iter().copied().min().unwrap_or(0)
    }
}

/// Serializable snapshot of the facet, used by the save payload.
pub type FacetSnapshot = GameStateFacet;

/// Narrow port through which the core reads and mutates host game state.
///
/// All writes clamp per the facet invariants; `day_count` and
/// `total_souls_harvested` only ever grow.
pub trait StatePort {
    fn day_count(&self) -> u32;
    fn corruption(&self) -> u8;
    fn consciousness(&self) -> f32;
    fn current_location_id(&self) -> u32;
    fn divine_favour(&self) -> [i16; DEITY_COUNT];
    fn total_souls_harvested(&self) -> u32;
    fn soul_energy(&self) -> u32;
    fn full_alliances(&self) -> u8;

    fn advance_day(&mut self);
    fn set_location(&mut self, location_id: u32);
    fn adjust_corruption(&mut self, delta: i32);
    fn adjust_favour(&mut self, deity: Deity, delta: i16);
    fn add_soul(&mut self, kind: SoulKind, quality: u8);
    fn add_soul_energy(&mut self, amount: u32);

    /// Capture the facet for the save payload.
    fn snapshot(&self) -> FacetSnapshot;
    /// Restore the facet from a save payload.
    fn restore(&mut self, snapshot: &FacetSnapshot);
}

impl StatePort for GameStateFacet {
    fn day_count(&self) -> u32 {
        self.day_count
    }

    fn corruption(&self) -> u8 {
        self.corruption
    }

    fn consciousness(&self) -> f32 {
        self.consciousness
    }

    fn current_location_id(&self) -> u32 {
        self.current_location_id
    }

    fn divine_favour(&self) -> [i16; DEITY_COUNT] {
        self.divine_favour
    }

    fn total_souls_harvested(&self) -> u32 {
        self.total_souls_harvested
    }

    fn soul_energy(&self) -> u32 {
        self.soul_energy
    }

    fn full_alliances(&self) -> u8 {
        self.full_alliances
    }

    fn advance_day(&mut self) {
        self.day_count += 1;
    }

    fn set_location(&mut self, location_id: u32) {
        self.current_location_id = location_id;
    }

    fn adjust_corruption(&mut self, delta: i32) {
        GameStateFacet::adjust_corruption(self, delta);
    }

    fn adjust_favour(&mut self, deity: Deity, delta: i16) {
        GameStateFacet::adjust_favour(self, deity, delta);
    }

    fn add_soul(&mut self, _kind: SoulKind, _quality: u8) {
        self.total_souls_harvested += 1;
    }

    fn add_soul_energy(&mut self, amount: u32) {
        self.soul_energy += amount;
    }

    fn snapshot(&self) -> FacetSnapshot {
        self.clone()
    }

    fn restore(&mut self, snapshot: &FacetSnapshot) {
        *self = snapshot.clone();
    }
}

/// Shared handle to a [`GameStateFacet`].
///
/// The engine holds one end as its state port; the host keeps a clone for
/// direct reads and domain-side mutations between engine calls. The core is
/// single-threaded and never holds a borrow across a port call, so the
/// interior mutability cannot conflict under the documented contract.
#[derive(Debug, Clone, Default)]
pub struct GameStateHandle(Rc<RefCell<GameStateFacet>>);

impl GameStateHandle {
    pub fn new(facet: GameStateFacet) -> Self {
        Self(Rc::new(RefCell::new(facet)))
    }

    pub fn borrow(&self) -> Ref<'_, GameStateFacet> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, GameStateFacet> {
        self.0.borrow_mut()
    }
}

impl StatePort for GameStateHandle {
    fn day_count(&self) -> u32 {
        self.0.borrow().day_count
    }

    fn corruption(&self) -> u8 {
        self.0.borrow().corruption
    }

    fn consciousness(&self) -> f32 {
        self.0.borrow().consciousness
    }

    fn current_location_id(&self) -> u32 {
        self.0.borrow().current_location_id
    }

    fn divine_favour(&self) -> [i16; DEITY_COUNT] {
        self.0.borrow().divine_favour
    }

    fn total_souls_harvested(&self) -> u32 {
        self.0.borrow().total_souls_harvested
    }

    fn soul_energy(&self) -> u32 {
        self.0.borrow().soul_energy
    }

    fn full_alliances(&self) -> u8 {
        self.0.borrow().full_alliances
    }

    fn advance_day(&mut self) {
        self.0.borrow_mut().advance_day();
    }

    fn set_location(&mut self, location_id: u32) {
        self.0.borrow_mut().set_location(location_id);
    }

    fn adjust_corruption(&mut self, delta: i32) {
        self.0.borrow_mut().adjust_corruption(delta);
    }

    fn adjust_favour(&mut self, deity: Deity, delta: i16) {
        self.0.borrow_mut().adjust_favour(deity, delta);
    }

    fn add_soul(&mut self, kind: SoulKind, quality: u8) {
        self.0.borrow_mut().add_soul(kind, quality);
    }

    fn add_soul_energy(&mut self, amount: u32) {
        self.0.borrow_mut().add_soul_energy(amount);
    }

    fn snapshot(&self) -> FacetSnapshot {
        self.0.borrow().clone()
    }

    fn restore(&mut self, snapshot: &FacetSnapshot) {
        *self.0.borrow_mut() = snapshot.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_clamps_at_both_bounds() {
        let mut facet = GameStateFacet::default();
        facet.adjust_corruption(-5);
        assert_eq!(facet.corruption, 0);
        facet.adjust_corruption(250);
        assert_eq!(facet.corruption, 100);
        facet.adjust_corruption(-30);
        assert_eq!(facet.corruption, 70);
    }

    #[test]
    fn favour_clamps_to_divine_range() {
        let mut facet = GameStateFacet::default();
        facet.adjust_favour(Deity::Anara, -150);
        assert_eq!(facet.divine_favour[Deity::Anara.index()], -100);
        facet.adjust_favour(Deity::Anara, 90);
        assert_eq!(facet.divine_favour[Deity::Anara.index()], -10);
    }

    #[test]
    fn favour_quorum_is_boundary_inclusive() {
        let mut facet = GameStateFacet::default();
        facet.divine_favour = [40, 40, 39, 0, -10, 100, 12];
        assert_eq!(facet.favour_quorum(40), 3);
        assert_eq!(facet.favour_quorum(41), 1);
        assert_eq!(facet.worst_favour(), -10);
    }

    #[test]
    fn handle_shares_one_facet() {
        let handle = GameStateHandle::new(GameStateFacet::default());
        let mut port: Box<dyn StatePort> = Box::new(handle.clone());
        port.adjust_corruption(25);
        port.advance_day();
        assert_eq!(handle.borrow().corruption, 25);
        assert_eq!(handle.borrow().day_count, 2);
    }
}

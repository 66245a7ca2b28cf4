use std::hash::{Hash, Hasher};

use fnv::FnvHasher;

use crate::data::Pos;

/// Movable pose of a level: sorted box positions plus the unit cell.
/// During search the unit is canonical - the row-major smallest cell of
/// its reachable component - so poses differing only by where the unit
/// stands inside the same area compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapState {
    pub boxes: Vec<Pos>,
    pub unit: Pos,
}

impl MapState {
    pub fn new(unit: Pos, mut boxes: Vec<Pos>) -> MapState {
        // sorted boxes make equal states comparable regardless of push order
        boxes.sort_unstable();
        MapState { boxes, unit }
    }

    /// Mix of the unit cell and every box weighted by its index.
    /// Constants 21589/1 keep symmetric box layouts from colliding.
    pub fn state_hash(&self) -> u64 {
        const CI: u64 = 21589;
        const CJ: u64 = 1;

        let mut hash = 0u64;
        for (n, b) in self.boxes.iter().enumerate() {
            hash = hash
                .wrapping_add((n as u64).wrapping_add(CI).wrapping_mul(coord_hash(b.i)))
                .wrapping_add((n as u64).wrapping_add(CJ).wrapping_mul(coord_hash(b.j)));
        }
        hash ^ CI
            .wrapping_mul(coord_hash(self.unit.i))
            .wrapping_add(CJ.wrapping_mul(coord_hash(self.unit.j)))
    }
}

impl Hash for MapState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.state_hash());
    }
}

fn coord_hash(x: usize) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write_usize(x);
    hasher.finish()
}

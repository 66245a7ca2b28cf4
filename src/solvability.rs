use std::fmt;
use std::fmt::{Debug, Formatter};

use crate::data::{Move, Pos, DIRECTIONS};
use crate::map::MapStatic;
use crate::mat::Mat;
use crate::state::MapState;
use crate::utils::is_box;

/// One deadlock rule attached to a cell. Typed variants instead of
/// closures keep the map copyable and inspectable.
#[derive(Clone, PartialEq, Eq)]
pub enum Restriction {
    /// A box here can never leave (two perpendicular walls, no destination).
    CornerDead,
    /// Corridor with a fully-walled side: it can't hold more boxes than
    /// it has destinations.
    LineCap {
        bound1: Pos,
        bound2: Pos,
        step: Move,
        destinations: usize,
    },
    /// Boxes at both cells freeze each other.
    ForbidPair(Pos, Pos),
    /// A box here plus boxes at all three cells completes a dead square.
    ForbidTriple(Pos, Pos, Pos),
}

impl Restriction {
    fn allows(&self, state: &MapState) -> bool {
        match *self {
            Restriction::CornerDead => false,
            Restriction::LineCap {
                bound1,
                bound2,
                step,
                destinations,
            } => {
                let mut boxes = 0;
                let mut p = bound1;
                while p <= bound2 && boxes <= destinations {
                    if is_box(p, &state.boxes) {
                        boxes += 1;
                    }
                    p += step;
                }
                boxes <= destinations
            }
            Restriction::ForbidPair(a, b) => {
                !(is_box(a, &state.boxes) && is_box(b, &state.boxes))
            }
            Restriction::ForbidTriple(a, b, c) => {
                !(is_box(a, &state.boxes) && is_box(b, &state.boxes) && is_box(c, &state.boxes))
            }
        }
    }
}

impl Debug for Restriction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Restriction::CornerDead => write!(f, "corner"),
            Restriction::LineCap {
                bound1,
                bound2,
                destinations,
                ..
            } => write!(f, "line {:?}..{:?} cap {}", bound1, bound2, destinations),
            Restriction::ForbidPair(a, b) => write!(f, "pair {:?} {:?}", a, b),
            Restriction::ForbidTriple(a, b, c) => {
                write!(f, "triple {:?} {:?} {:?}", a, b, c)
            }
        }
    }
}

pub type SolvabilityCell = Vec<Restriction>;

/// Per-cell deadlock rules precomputed from the static map.
#[derive(Clone)]
pub struct SolvabilityMap {
    cells: Mat<SolvabilityCell>,
}

impl Debug for SolvabilityMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let total: usize = self.cells.iter().map(|c| c.len()).sum();
        write!(
            f,
            "SolvabilityMap {}x{} ({} restrictions)",
            self.cells.rows(),
            self.cells.cols(),
            total
        )
    }
}

impl SolvabilityMap {
    /// `p` is the cell where the latest moved box was placed.
    pub fn is_valid(&self, p: Pos, state: &MapState) -> bool {
        self.cells[p].iter().all(|r| r.allows(state))
    }

    pub fn restrictions(&self, p: Pos) -> &[Restriction] {
        &self.cells[p]
    }
}

pub fn create_solvability_map(map: &MapStatic, n_boxes: usize) -> SolvabilityMap {
    let grid = map.grid();
    let mut cells = Mat::filled(grid.rows(), grid.cols(), SolvabilityCell::new());

    for p in grid.positions() {
        if map.is_wall(p) {
            continue;
        }
        if is_corner_no_dest(map, p) {
            cells[p].push(Restriction::CornerDead);
            // nothing else can matter for this cell
            continue;
        }

        if is_line_dead_end(map, p, [Move::Left, Move::Right, Move::Up, Move::Down]) {
            // horizontal dead end
            cells[p].push(line_restriction(map, p, Move::Right));
        }
        if is_line_dead_end(map, p, [Move::Up, Move::Down, Move::Left, Move::Right]) {
            // vertical dead end
            cells[p].push(line_restriction(map, p, Move::Down));
        }

        if n_boxes >= 2 {
            for &m in &DIRECTIONS {
                if is_freeze_pair(map, p, m) {
                    cells[p].push(Restriction::ForbidPair(p, p + m));
                }
            }
        }

        if n_boxes >= 3 {
            for &m in &DIRECTIONS {
                cells[p].extend(l_shape_restrictions(map, p, m));
                cells[p].extend(diagonal_restrictions(map, p, m));
            }
        }

        if n_boxes >= 4 {
            for &m in &DIRECTIONS {
                cells[p].extend(square_restrictions(map, p, m));
            }
        }
    }

    SolvabilityMap { cells }
}

fn move_till_wall(map: &MapStatic, mut p: Pos, m: Move) -> Pos {
    debug_assert!(!map.safe_is_wall(p));
    while !map.safe_is_wall(p + m) {
        p += m;
    }
    p
}

fn is_corner_no_dest(map: &MapStatic, p: Pos) -> bool {
    debug_assert!(!map.is_wall(p));
    if map.is_destination(p) {
        return false;
    }
    DIRECTIONS
        .iter()
        .any(|&m| map.safe_is_wall(p + m) && map.safe_is_wall(p + m.clockwise_rotate()))
}

/// Walks the corridor through `p` along `moves[0]`/`moves[1]` and checks
/// whether `moves[2]` or `moves[3]` is wall all the way.
fn is_line_dead_end(map: &MapStatic, p: Pos, moves: [Move; 4]) -> bool {
    let mut walls_one_side = true;
    let mut walls_other_side = true;

    let mut p = move_till_wall(map, p, moves[0]);
    while !map.safe_is_wall(p) {
        if !map.safe_is_wall(p + moves[2]) {
            walls_one_side = false;
        }
        if !map.safe_is_wall(p + moves[3]) {
            walls_other_side = false;
        }
        p += moves[1];
    }
    walls_one_side || walls_other_side
}

fn line_restriction(map: &MapStatic, p: Pos, step: Move) -> Restriction {
    debug_assert!(step == Move::Right || step == Move::Down);
    let bound1 = move_till_wall(map, p, step.reverse());
    let bound2 = move_till_wall(map, p, step);

    let mut destinations = 0;
    let mut q = bound1;
    while q <= bound2 {
        if map.is_destination(q) {
            destinations += 1;
        }
        q += step;
    }
    Restriction::LineCap {
        bound1,
        bound2,
        step,
        destinations,
    }
}

/// Two cells in a row with a wall along the side: boxes on both freeze.
/// Also catches the shifted variant where the walls touch opposite ends.
fn is_freeze_pair(map: &MapStatic, p: Pos, m: Move) -> bool {
    debug_assert!(map.is_free(p));
    let p2 = p + m;
    if !map.safe_is_free(p2) {
        return false;
    }
    if is_corner_no_dest(map, p2) {
        // corner cells are already fully restricted
        return false;
    }
    if map.safe_is_destination(p) && map.safe_is_destination(p2) {
        return false;
    }

    let m1 = m.clockwise_rotate();
    let m2 = m1.reverse();
    [m1, m2].iter().any(|&side| {
        map.safe_is_wall(p + side) && (map.safe_is_wall(p2 + m1) || map.safe_is_wall(p2 + m2))
    })
}

/// Three free cells in an L against a wall: boxes at the two partner
/// cells plus one at `p` are stuck.
fn l_shape_restrictions(map: &MapStatic, p: Pos, m: Move) -> Vec<Restriction> {
    debug_assert!(map.safe_is_free(p));
    if !map.safe_is_wall(p + m) {
        return Vec::new();
    }

    let mut result = Vec::new();
    for &first in &[m.clockwise_rotate(), m.clockwise_rotate().reverse()] {
        let p2 = p + first;
        let p3 = p2 + m;
        if map.safe_is_destination(p)
            && map.safe_is_destination(p2)
            && map.safe_is_destination(p3)
        {
            continue;
        }
        if map.safe_is_free(p2) && map.safe_is_free(p3) {
            result.push(Restriction::ForbidPair(p2, p3));
        }
    }
    result
}

/// Diagonal neighbour pair blocked by the wall on the remaining square.
fn diagonal_restrictions(map: &MapStatic, p: Pos, m: Move) -> Vec<Restriction> {
    debug_assert!(map.safe_is_free(p));
    let m2 = m.clockwise_rotate();
    if !map.safe_is_wall(p + m + m2) {
        return Vec::new();
    }
    let p2 = p + m;
    let p3 = p + m2;
    if map.safe_is_destination(p) && map.safe_is_destination(p2) && map.safe_is_destination(p3) {
        return Vec::new();
    }
    if map.safe_is_free(p2) && map.safe_is_free(p3) {
        return vec![Restriction::ForbidPair(p2, p3)];
    }
    Vec::new()
}

/// Free 2x2 square with no fully-walled side: filling all four cells is
/// a deadlock, so a box at `p` forbids boxes at the other three.
fn square_restrictions(map: &MapStatic, p: Pos, m: Move) -> Vec<Restriction> {
    debug_assert!(map.safe_is_free(p));
    let m2 = m.clockwise_rotate();
    let mut poses = [p, p + m, p + m2, p + m + m2];
    poses.sort_unstable();

    if poses.iter().all(|&q| map.safe_is_destination(q)) {
        return Vec::new();
    }
    if poses.iter().any(|&q| !map.safe_is_free(q)) {
        return Vec::new();
    }

    let facets = [
        (poses[0] + Move::Left, poses[2] + Move::Left),
        (poses[0] + Move::Up, poses[1] + Move::Up),
        (poses[1] + Move::Right, poses[3] + Move::Right),
        (poses[2] + Move::Down, poses[3] + Move::Down),
    ];
    for &(a, b) in &facets {
        // a fully walled side already freezes the square by other rules
        if map.safe_is_wall(a) && map.safe_is_wall(b) {
            return Vec::new();
        }
    }

    let others: Vec<Pos> = poses.iter().cloned().filter(|&q| q != p).collect();
    vec![Restriction::ForbidTriple(others[0], others[1], others[2])]
}

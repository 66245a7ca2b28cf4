use std::collections::VecDeque;

use fnv::FnvHashMap;

use crate::data::{Move, Pos, DIRECTIONS};
use crate::map::{Map, MapStatic};
use crate::mat::Mat;

pub fn is_box(p: Pos, boxes: &[Pos]) -> bool {
    debug_assert!(boxes.windows(2).all(|w| w[0] <= w[1]));
    boxes.binary_search(&p).is_ok()
}

pub fn safe_is_free(map: &MapStatic, p: Pos, boxes: &[Pos]) -> bool {
    !map.safe_is_wall(p) && !is_box(p, boxes)
}

/// BFS reachability of the unit over free cells, boxes are blockers.
pub fn reachable_cells(map: &MapStatic, unit: Pos, boxes: &[Pos]) -> Mat<bool> {
    let mut result = map.grid().scratchpad();
    result.set(unit);

    // Vec instead of VecDeque - visit order doesn't matter for reachability
    let mut to_visit = vec![unit];
    while let Some(cur) = to_visit.pop() {
        for &m in &DIRECTIONS {
            let p = cur + m;
            if safe_is_free(map, p, boxes) && !result[p] {
                result.set(p);
                to_visit.push(p);
            }
        }
    }
    result
}

/// Canonical unit position: the row-major smallest reachable cell.
pub fn top_left(reachable: &Mat<bool>) -> Pos {
    let n = reachable
        .iter()
        .position(|&r| r)
        .expect("empty reachability map");
    reachable.index_to_pos(n)
}

/// Cardinal move between two cells on one line. Calling this with
/// positions that don't share a row or column is a programmer error.
pub fn restore_move(from: Pos, to: Pos) -> Move {
    assert_ne!(from, to);
    if from.i == to.i {
        if from.j < to.j {
            Move::Right
        } else {
            Move::Left
        }
    } else if from.j == to.j {
        if from.i < to.i {
            Move::Down
        } else {
            Move::Up
        }
    } else {
        unreachable!("no single move leads from {:?} to {:?}", from, to)
    }
}

/// Shortest unit walk to `dest` over the map's currently free cells.
/// Returns an empty path when `dest` is the unit cell or unreachable.
pub fn unit_path_to(map: &Map, dest: Pos) -> Vec<Move> {
    let unit = map.unit_pos();

    let mut prevs = FnvHashMap::default();
    prevs.insert(unit, unit);
    let mut to_visit = VecDeque::new();
    to_visit.push_back(unit);

    while let Some(current) = to_visit.pop_front() {
        if current == dest {
            break;
        }
        for &m in &DIRECTIONS {
            let p = current + m;
            if map.safe_is_free(p) && !prevs.contains_key(&p) {
                prevs.insert(p, current);
                to_visit.push_back(p);
            }
        }
    }

    let mut result = Vec::new();
    let mut cur = match prevs.get(&dest) {
        Some(_) => dest,
        None => return result,
    };
    while prevs[&cur] != cur {
        let prev = prevs[&cur];
        result.push(restore_move(prev, cur));
        cur = prev;
    }
    result.reverse();
    result
}

use std::collections::VecDeque;
use std::fmt;
use std::fmt::{Display, Formatter};

use log::debug;

use crate::data::{Pos, DIRECTIONS};
use crate::hungarian::{HungarianAlgo, INF};
use crate::map::MapStatic;
use crate::mat::Mat;
use crate::state::MapState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeuristicKind {
    /// Distance BFS with the free-cell-behind check on the stepped-to cell.
    HungarianTaxicab,
    /// Distance BFS with the free-cell-behind check on the current cell,
    /// modelling push reachability from the box standpoint.
    HungarianTaxicabPush,
}

impl Default for HeuristicKind {
    fn default() -> Self {
        HeuristicKind::HungarianTaxicab
    }
}

impl Display for HeuristicKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            HeuristicKind::HungarianTaxicab => write!(f, "hungarian-taxicab"),
            HeuristicKind::HungarianTaxicabPush => write!(f, "hungarian-taxicab-push"),
        }
    }
}

/// Lower bound on remaining pushes: per-destination shortest-path grids
/// are combined into a box/destination cost matrix and assigned with the
/// Hungarian algorithm. Distances ignore other boxes, so the bound is
/// admissible.
#[derive(Debug)]
pub struct Heuristic {
    destinations: Vec<(Pos, Mat<usize>)>,
}

impl Heuristic {
    pub fn init(kind: HeuristicKind, map: &MapStatic) -> Heuristic {
        let extended = kind == HeuristicKind::HungarianTaxicabPush;
        let mut destinations = Vec::new();
        for pos in map.grid().positions() {
            if map.grid()[pos].is_destination() {
                destinations.push((pos, distance_grid(map, pos, extended)));
            }
        }
        debug!(
            "heuristic ({}) initialised with {} destination grids",
            kind,
            destinations.len()
        );
        Heuristic { destinations }
    }

    /// Zero exactly when every box sits on a destination.
    pub fn evaluate(&self, state: &MapState) -> usize {
        assert_eq!(state.boxes.len(), self.destinations.len());
        let n = state.boxes.len();
        if n == 0 {
            return 0;
        }

        let mut costs = Vec::with_capacity(n * n);
        for &b in &state.boxes {
            let mut min = INF;
            for (_, distances) in &self.destinations {
                costs.push(distances[b]);
                min = min.min(distances[b]);
            }
            // a box that can't reach any destination must have been
            // rejected by the solvability gate before we get here
            debug_assert!(min != INF);
        }
        let mat = Mat::from_flat(costs, n);

        let assignment = HungarianAlgo::default().solve(&mat);
        let result: usize = assignment
            .iter()
            .enumerate()
            .map(|(i, &j)| mat[Pos::new(i, j)])
            .sum();
        debug_assert!(result < INF / 100);
        result
    }
}

/// BFS from a destination outwards over the static map. A cell gets a
/// finite distance when a box there could be moved one step closer, i.e.
/// the cell "behind" is free; `extended` flips which side counts as
/// behind.
fn distance_grid(map: &MapStatic, from: Pos, extended: bool) -> Mat<usize> {
    let mut result = map.grid().scratchpad_with_default(INF);
    result[from] = 0;

    let mut observe = VecDeque::new();
    observe.push_back(from);
    while let Some(cur) = observe.pop_front() {
        for &m in &DIRECTIONS {
            let new_pos = cur + m;
            let behind = if extended { cur - m } else { new_pos + m };
            if map.safe_is_free(behind)
                && result.contains(new_pos)
                && result[new_pos] == INF
                && map.is_free(new_pos)
            {
                result[new_pos] = result[cur] + 1;
                observe.push_back(new_pos);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{map_from_ascii, Map};

    fn evaluate(kind: HeuristicKind, map: &Map) -> usize {
        let (stat, boxes, unit) = map.to_static();
        let heuristic = Heuristic::init(kind, &stat);
        heuristic.evaluate(&MapState::new(unit, boxes))
    }

    #[test]
    fn simple_hungarian_heuristic() {
        let map = map_from_ascii(&[
            "#  ", //
            "@$ ",
            "# .",
        ]);
        assert_eq!(evaluate(HeuristicKind::HungarianTaxicab, &map), 2);
    }

    #[test]
    fn zero_on_solved_state() {
        let map = map_from_ascii(&[
            "#  ", //
            "@  ",
            "# *",
        ]);
        assert_eq!(evaluate(HeuristicKind::HungarianTaxicab, &map), 0);
        assert_eq!(evaluate(HeuristicKind::HungarianTaxicabPush, &map), 0);
    }

    #[test]
    fn distance_needs_room_behind_the_box() {
        let map = map_from_ascii(&[
            "#######", //
            "#     #",
            "# @$$ #",
            "#  .. #",
            "#     #",
            "#######",
        ]);
        let (stat, _, _) = map.to_static();
        let heuristic = Heuristic::init(HeuristicKind::HungarianTaxicab, &stat);
        // positions relative to the trimmed 4x5 interior; the first
        // destination in row-major order is [2, 2]
        let (dest, near) = &heuristic.destinations[0];
        assert_eq!(*dest, Pos::new(2, 2));
        assert_eq!(near[Pos::new(2, 2)], 0);
        assert_eq!(near[Pos::new(1, 2)], 1);
        assert_eq!(near[Pos::new(2, 1)], 1);
        assert_eq!(near[Pos::new(2, 3)], 1);
        // pushing out of the corner or along the bottom border is
        // impossible, there is no cell behind the box
        assert_eq!(near[Pos::new(0, 0)], INF);
        assert_eq!(near[Pos::new(3, 2)], INF);
    }

    #[test]
    fn never_overestimates_the_push_count() {
        use crate::solver::{SolveState, Solver};

        let maps = [
            map_from_ascii(&["#  ", "@$ ", "# ."]),
            map_from_ascii(&["######", "#@$ .#", "# $  #", "#   .#", "######"]),
            map_from_ascii(&["########", "#@$  . #", "#      #", "# $  . #", "########"]),
        ];
        let mut solver = Solver::new();
        for map in &maps {
            let h = evaluate(HeuristicKind::HungarianTaxicab, map);
            solver.solve(map);
            assert_eq!(solver.solved(), SolveState::Solved);
            assert!(h <= solver.box_movements());
        }
    }

    #[test]
    fn assignment_routes_boxes_to_distinct_destinations() {
        // the top box reaches only the top destination, which forces the
        // assignment [2 + 2] even though both boxes could be greedy about
        // the bottom one
        let map = map_from_ascii(&[
            "#######", //
            "#@$ . #",
            "# $ . #",
            "#     #",
            "#######",
        ]);
        let h = evaluate(HeuristicKind::HungarianTaxicab, &map);
        assert_eq!(h, 4);
    }
}

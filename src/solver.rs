use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering as MemOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fnv::FnvHashSet;
use log::debug;
use prettytable::{format, Cell as TableCell, Row, Table};
use separator::Separatable;
use typed_arena::Arena;

use crate::data::{Cell, Move, Pos, DIRECTIONS};
use crate::heuristic::{Heuristic, HeuristicKind};
use crate::map::Map;
use crate::solvability::create_solvability_map;
use crate::state::MapState;
use crate::utils::{reachable_cells, restore_move, safe_is_free, top_left, unit_path_to};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveState {
    NotSolved,
    Solving,
    Solved,
}

/// Search-tree node. Nodes live in a bump arena for the whole solve and
/// refer to their parent by index, so back-links stay valid while the
/// node list grows.
struct SavedState {
    prev: Option<usize>,
    state: MapState,
}

impl PartialEq for SavedState {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
    }
}

impl Eq for SavedState {}

impl Hash for SavedState {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.state.hash(hasher);
    }
}

/// Priority-queue entry; the priority is `n_move + heuristic`, min first
/// through `Reverse`. Ties break arbitrarily.
struct QueuedState {
    index: usize,
    n_move: usize,
    heuristic: usize,
}

impl QueuedState {
    fn cost(&self) -> usize {
        self.n_move + self.heuristic
    }
}

impl PartialEq for QueuedState {
    fn eq(&self, other: &Self) -> bool {
        self.cost() == other.cost()
    }
}

impl Eq for QueuedState {}

impl PartialOrd for QueuedState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost().cmp(&other.cost())
    }
}

type BoxPush = (Pos, Move);

/// Push-optimal A* solver. `solve` runs synchronously on the caller's
/// thread; a host wrapping it in a worker can interrupt it through the
/// shared flag from `stop_flag`.
pub struct Solver {
    heuristic_kind: HeuristicKind,
    solved: SolveState,
    box_movements: usize,
    result: Vec<Move>,
    elapsed: Duration,
    stats: Stats,
    stop: Arc<AtomicBool>,
}

impl Solver {
    pub fn new() -> Solver {
        Solver {
            heuristic_kind: HeuristicKind::default(),
            solved: SolveState::NotSolved,
            box_movements: 0,
            result: Vec::new(),
            elapsed: Duration::default(),
            stats: Stats::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_heuristic(&mut self, kind: HeuristicKind) {
        self.heuristic_kind = kind;
    }

    pub fn solved(&self) -> SolveState {
        self.solved
    }

    /// Unit-granular plan of the last successful solve.
    pub fn result(&self) -> &[Move] {
        &self.result
    }

    /// Number of pushes in the plan.
    pub fn box_movements(&self) -> usize {
        self.box_movements
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Shared cancellation flag, polled at the top of the search loop.
    /// `solve` leaves it untouched; `reset` clears it.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn reset(&mut self) {
        self.solved = SolveState::NotSolved;
        self.box_movements = 0;
        self.result.clear();
        self.elapsed = Duration::default();
        self.stats = Stats::new();
        self.stop.store(false, MemOrdering::Relaxed);
    }

    pub fn solve(&mut self, original_map: &Map) {
        self.solved = SolveState::Solving;
        self.box_movements = 0;
        self.result.clear();
        self.stats = Stats::new();
        let started = Instant::now();

        let (map, boxes, unit) = original_map.to_static();
        debug!(
            "solving a {}x{} map with {} boxes",
            map.grid().rows(),
            map.grid().cols(),
            boxes.len()
        );

        let heuristic = Heuristic::init(self.heuristic_kind, &map);
        let solvability = create_solvability_map(&map, boxes.len());

        let initial = MapState::new(unit, boxes);
        if initial
            .boxes
            .iter()
            .any(|&b| !solvability.is_valid(b, &initial))
        {
            debug!("a box starts on a dead cell, not searching");
            self.solved = SolveState::NotSolved;
            self.elapsed = started.elapsed();
            return;
        }

        let arena = Arena::new();
        // nodes[i] is the arena address of the i-th created state; the
        // dedup set shares the same allocations
        let mut nodes: Vec<&SavedState> = Vec::new();
        let mut seen: FnvHashSet<&SavedState> = FnvHashSet::default();
        let mut queue = BinaryHeap::new();

        let canonical = top_left(&reachable_cells(&map, initial.unit, &initial.boxes));
        let root: &SavedState = arena.alloc(SavedState {
            prev: None,
            state: MapState {
                boxes: initial.boxes,
                unit: canonical,
            },
        });
        nodes.push(root);
        seen.insert(root);
        let h = heuristic.evaluate(&root.state);
        self.stats.add_created(0);
        queue.push(Reverse(QueuedState {
            index: 0,
            n_move: 0,
            heuristic: h,
        }));

        while let Some(Reverse(current)) = queue.pop() {
            if self.stop.load(MemOrdering::Relaxed) {
                debug!(
                    "cancelled after visiting {} states",
                    self.stats.total_visited()
                );
                break;
            }

            if current.heuristic == 0 {
                debug!("goal reached, reconstructing the plan");
                let pushes = restore_pushes(nodes[current.index], &nodes);
                self.box_movements = pushes.len();
                self.result = unit_plan(&pushes, original_map);
                self.solved = SolveState::Solved;
                break;
            }

            if self.stats.add_unique_visited(current.n_move) {
                debug!("visited new depth: {}", current.n_move);
            }

            // copy the reference out so pushing new nodes doesn't alias
            let saved: &SavedState = nodes[current.index];
            let state = &saved.state;
            let unit_map = reachable_cells(&map, state.unit, &state.boxes);

            for i in 0..state.boxes.len() {
                let bx = state.boxes[i];
                for &m in &DIRECTIONS {
                    let push_from = bx - m;
                    if !unit_map.contains(push_from) || !unit_map[push_from] {
                        continue;
                    }
                    let new_pos = bx + m;
                    if !safe_is_free(&map, new_pos, &state.boxes) {
                        continue;
                    }

                    let new_boxes = moved_box(&state.boxes, i, new_pos);
                    let new_unit = top_left(&reachable_cells(&map, bx, &new_boxes));
                    let candidate = SavedState {
                        prev: Some(current.index),
                        state: MapState {
                            boxes: new_boxes,
                            unit: new_unit,
                        },
                    };

                    if seen.contains(&candidate) {
                        self.stats.add_reached_duplicate(current.n_move + 1);
                        continue;
                    }
                    let node = &*arena.alloc(candidate);
                    nodes.push(node);
                    seen.insert(node);

                    // gate on the cell the box was pushed to; rejected
                    // states stay in the dedup set
                    if !solvability.is_valid(new_pos, &node.state) {
                        continue;
                    }

                    let h = heuristic.evaluate(&node.state);
                    self.stats.add_created(current.n_move + 1);
                    queue.push(Reverse(QueuedState {
                        index: nodes.len() - 1,
                        n_move: current.n_move + 1,
                        heuristic: h,
                    }));
                }
            }
        }

        if self.solved == SolveState::Solving {
            self.solved = SolveState::NotSolved;
        }
        self.elapsed = started.elapsed();
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new()
    }
}

impl Debug for Solver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Solver {{ heuristic: {}, solved: {:?}, pushes: {} }}",
            self.heuristic_kind, self.solved, self.box_movements
        )
    }
}

/// Replaces one box and keeps the sequence sorted.
fn moved_box(boxes: &[Pos], old_index: usize, new_pos: Pos) -> Vec<Pos> {
    let mut result = boxes.to_vec();
    result.remove(old_index);
    let at = result.binary_search(&new_pos).unwrap_or_else(|e| e);
    result.insert(at, new_pos);
    result
}

/// Walks the back-links to the root and returns the push chain in
/// execution order. A root goal yields an empty chain.
fn restore_pushes(last: &SavedState, nodes: &[&SavedState]) -> Vec<BoxPush> {
    let mut result = Vec::new();
    let mut current = last;
    while let Some(prev_index) = current.prev {
        let previous = nodes[prev_index];
        result.push(restore_single_push(&previous.state, &current.state));
        current = previous;
    }
    result.reverse();
    result
}

/// The two sorted box lists differ in exactly one position.
fn restore_single_push(current: &MapState, next: &MapState) -> BoxPush {
    debug_assert_eq!(current.boxes.len(), next.boxes.len());
    let from: Vec<Pos> = current
        .boxes
        .iter()
        .filter(|b| next.boxes.binary_search(b).is_err())
        .cloned()
        .collect();
    let to: Vec<Pos> = next
        .boxes
        .iter()
        .filter(|b| current.boxes.binary_search(b).is_err())
        .cloned()
        .collect();
    debug_assert_eq!(from.len(), 1);
    debug_assert_eq!(to.len(), 1);
    (from[0], restore_move(from[0], to[0]))
}

/// Expands the push chain into unit moves by walking a live map copy.
fn unit_plan(pushes: &[BoxPush], original_map: &Map) -> Vec<Move> {
    let mut map = original_map.clone();
    let mut result = Vec::new();

    for &(box_from, m) in pushes {
        let box_to = box_from + m;
        let unit_before_push = box_from - m;

        result.extend(unit_path_to(&map, unit_before_push));

        let unit = map.unit_pos();
        map.grid[unit] = map.grid[unit].remove_item(Cell::UNIT);
        map.grid[box_from] = map.grid[box_from]
            .remove_item(Cell::BOX)
            .place_item(Cell::UNIT);
        map.grid[box_to] = map.grid[box_to].place_item(Cell::BOX);
        result.push(m);
    }
    result
}

/// Per-depth counters of the search.
pub struct Stats {
    created_states: Vec<usize>,
    duplicate_states: Vec<usize>,
    visited_states: Vec<usize>,
}

impl Stats {
    fn new() -> Self {
        Stats {
            created_states: Vec::new(),
            duplicate_states: Vec::new(),
            visited_states: Vec::new(),
        }
    }

    pub fn total_created(&self) -> usize {
        self.created_states.iter().sum()
    }

    pub fn total_duplicate(&self) -> usize {
        self.duplicate_states.iter().sum()
    }

    pub fn total_visited(&self) -> usize {
        self.visited_states.iter().sum()
    }

    fn add_created(&mut self, depth: usize) -> bool {
        Self::add(&mut self.created_states, depth)
    }

    fn add_reached_duplicate(&mut self, depth: usize) -> bool {
        Self::add(&mut self.duplicate_states, depth)
    }

    fn add_unique_visited(&mut self, depth: usize) -> bool {
        Self::add(&mut self.visited_states, depth)
    }

    /// Returns true when a new depth was reached.
    fn add(counts: &mut Vec<usize>, depth: usize) -> bool {
        let mut new_depth = false;
        // a while because depths can be skipped when duplicates drop out
        while depth >= counts.len() {
            counts.push(0);
            new_depth = true;
        }
        counts[depth] += 1;
        new_depth
    }
}

impl Debug for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "created by depth: {:?}", self.created_states)?;
        writeln!(f, "visited by depth: {:?}", self.visited_states)?;
        writeln!(f, "duplicates by depth: {:?}", self.duplicate_states)
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "States created total: {}",
            self.total_created().separated_string()
        )?;
        writeln!(
            f,
            "Unique visited total: {}",
            self.total_visited().separated_string()
        )?;
        writeln!(
            f,
            "Reached duplicates total: {}",
            self.total_duplicate().separated_string()
        )?;

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_CLEAN);
        table.add_row(Row::new(
            ["Depth", "Created", "Unique", "Duplicates"]
                .iter()
                .map(|h| TableCell::new(h))
                .collect(),
        ));
        for depth in 0..self.created_states.len() {
            let cells = [
                depth,
                self.created_states[depth],
                self.visited_states.get(depth).cloned().unwrap_or(0),
                self.duplicate_states.get(depth).cloned().unwrap_or(0),
            ];
            table.add_row(Row::new(
                cells.iter().map(|n| TableCell::new(&n.to_string())).collect(),
            ));
        }
        write!(f, "{}", table)
    }
}

use crate::data::{Cell, Move, MoveDirection, MoveResult, Pos};
use crate::map::Map;

/// Authoritative interactive state. Boxes live inside the map's cells;
/// the unit position is cached and kept in sync with the `UNIT` bit.
#[derive(Clone, Debug)]
pub struct GameState {
    map: Map,
    unit: Pos,
}

impl GameState {
    pub fn new(map: Map) -> GameState {
        let unit = map.unit_pos();
        GameState { map, unit }
    }

    pub fn unit(&self) -> Pos {
        self.unit
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    /// A step is possible when the cell ahead is free, or holds a box
    /// with a free cell behind it.
    pub fn can_move(&self, direction: Move) -> bool {
        let one = self.unit + direction;
        let two = one + direction;
        self.map.safe_is_free(one) || (self.map.safe_is_box(one) && self.map.safe_is_free(two))
    }

    pub fn move_unit(&mut self, direction: Move) -> MoveDirection {
        if !self.can_move(direction) {
            return MoveDirection {
                result: MoveResult::NoMove,
                direction,
            };
        }

        let box_from = self.unit + direction;
        let box_to = box_from + direction;
        let box_moved = self.move_box_if_present(box_from, box_to);
        self.relocate_unit(box_from);
        MoveDirection {
            result: if box_moved {
                MoveResult::UnitBoxMove
            } else {
                MoveResult::UnitMove
            },
            direction,
        }
    }

    /// Inverse of the most recent `move_unit`; the caller drives the
    /// history stack.
    pub fn undo(&mut self, record: MoveDirection) -> MoveResult {
        if record.result == MoveResult::NoMove {
            return MoveResult::NoMove;
        }

        let box_from = self.unit + record.direction;
        let box_to = self.unit;
        let unit_to = self.unit - record.direction;

        self.relocate_unit(unit_to);
        if record.result == MoveResult::UnitBoxMove {
            let moved = self.move_box_if_present(box_from, box_to);
            debug_assert!(moved);
            return MoveResult::UnitBoxMove;
        }
        MoveResult::UnitMove
    }

    /// No lone box and no lone destination left anywhere.
    pub fn is_winning_state(&self) -> bool {
        self.map
            .grid
            .iter()
            .all(|&c| c != Cell::BOX && c != Cell::DESTINATION)
    }

    fn move_box_if_present(&mut self, from: Pos, to: Pos) -> bool {
        if !self.map.safe_is_box(from) {
            return false;
        }
        self.map.grid[from] = self.map.grid[from].remove_item(Cell::BOX);
        self.map.grid[to] = self.map.grid[to].place_item(Cell::BOX);
        true
    }

    fn relocate_unit(&mut self, to: Pos) {
        debug_assert!(self.map.grid[self.unit].is_unit());
        self.map.grid[self.unit] = self.map.grid[self.unit].remove_item(Cell::UNIT);
        self.unit = to;
        self.map.grid[self.unit] = self.map.grid[self.unit].place_item(Cell::UNIT);
    }
}

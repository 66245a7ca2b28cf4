use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

use crate::data::{Cell, Pos, DIRECTIONS};
use crate::mat::Mat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapError {
    EmptyMap,
    RaggedRows,
    WrongUnitCount(usize),
    BoxDestinationMismatch(usize, usize),
}

impl Display for MapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            MapError::EmptyMap => write!(f, "Empty map"),
            MapError::RaggedRows => write!(f, "Map rows have different lengths"),
            MapError::WrongUnitCount(n) => write!(f, "Wrong number of units ({}), expected one", n),
            MapError::BoxDestinationMismatch(b, d) => write!(
                f,
                "Number of boxes ({}) is not equal to number of destinations ({})",
                b, d
            ),
        }
    }
}

impl Error for MapError {}

/// Validated level grid. The same type doubles as `MapStatic` once the
/// movable flags are stripped by `to_static`.
#[derive(Clone, PartialEq, Eq)]
pub struct Map {
    pub(crate) grid: Mat<Cell>,
}

pub type MapStatic = Map;

impl Map {
    /// Builds a map from a rectangular cell grid: walls off everything the
    /// unit cannot reach (boxes are not blockers here), trims all-wall
    /// border rows and columns, then checks the box/destination balance.
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Result<Map, MapError> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(MapError::EmptyMap);
        }
        if rows.iter().any(|row| row.len() != rows[0].len()) {
            return Err(MapError::RaggedRows);
        }

        let mut grid = Mat::new(&rows);

        let units: Vec<Pos> = grid.positions().filter(|&p| grid[p].is_unit()).collect();
        if units.len() != 1 {
            return Err(MapError::WrongUnitCount(units.len()));
        }

        let visited = reachable_ignoring_boxes(&grid, units[0]);
        for p in grid.positions() {
            if !visited[p] {
                grid[p] = Cell::WALL;
            }
        }

        let mut rows: Vec<Vec<Cell>> = (0..grid.rows())
            .map(|i| (0..grid.cols()).map(|j| grid[Pos::new(i, j)]).collect())
            .collect();
        trim_walls(&mut rows);
        if rows.is_empty() || rows[0].is_empty() {
            return Err(MapError::EmptyMap);
        }

        let map = Map {
            grid: Mat::new(&rows),
        };
        let boxes = map.grid.iter().filter(|c| c.is_box()).count();
        let destinations = map.grid.iter().filter(|c| c.is_destination()).count();
        if boxes != destinations {
            return Err(MapError::BoxDestinationMismatch(boxes, destinations));
        }
        Ok(map)
    }

    pub fn grid(&self) -> &Mat<Cell> {
        &self.grid
    }

    pub fn at(&self, pos: Pos) -> Cell {
        self.grid[pos]
    }

    pub fn is_wall(&self, pos: Pos) -> bool {
        self.grid[pos].is_wall()
    }

    pub fn is_free(&self, pos: Pos) -> bool {
        self.grid[pos].is_free()
    }

    pub fn is_destination(&self, pos: Pos) -> bool {
        self.grid[pos].is_destination()
    }

    // The safe variants treat out-of-bounds as wall.
    pub fn safe_is_wall(&self, pos: Pos) -> bool {
        !self.grid.contains(pos) || self.grid[pos].is_wall()
    }

    pub fn safe_is_free(&self, pos: Pos) -> bool {
        self.grid.contains(pos) && self.grid[pos].is_free()
    }

    pub fn safe_is_box(&self, pos: Pos) -> bool {
        self.grid.contains(pos) && self.grid[pos].is_box()
    }

    pub fn safe_is_destination(&self, pos: Pos) -> bool {
        self.grid.contains(pos) && self.grid[pos].is_destination()
    }

    pub fn unit_pos(&self) -> Pos {
        let n = self
            .grid
            .iter()
            .position(|c| c.is_unit())
            .expect("map without a unit");
        self.grid.index_to_pos(n)
    }

    /// Box positions in row-major order, i.e. already sorted.
    pub fn box_positions(&self) -> Vec<Pos> {
        self.grid
            .positions()
            .filter(|&p| self.grid[p].is_box())
            .collect()
    }

    /// Splits the map into its immovable part and the movable pose.
    pub fn to_static(&self) -> (MapStatic, Vec<Pos>, Pos) {
        let boxes = self.box_positions();
        let unit = self.unit_pos();
        let mut grid = self.grid.clone();
        for p in grid.positions() {
            grid[p] = grid[p].remove_item(Cell::UNIT).remove_item(Cell::BOX);
        }
        (Map { grid }, boxes, unit)
    }
}

impl Display for Map {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.grid)
    }
}

impl Debug for Map {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

fn reachable_ignoring_boxes(grid: &Mat<Cell>, start: Pos) -> Mat<bool> {
    let mut visited = grid.scratchpad();
    visited.set(start);
    let mut to_visit = vec![start];
    while let Some(cur) = to_visit.pop() {
        for &m in &DIRECTIONS {
            let p = cur + m;
            if grid.contains(p) && !grid[p].is_wall() && !visited[p] {
                visited.set(p);
                to_visit.push(p);
            }
        }
    }
    visited
}

fn trim_walls(rows: &mut Vec<Vec<Cell>>) {
    let all_wall = |row: &Vec<Cell>| row.iter().all(|c| c.is_wall());

    while rows.last().map_or(false, |r| all_wall(r)) {
        rows.pop();
    }
    while rows.first().map_or(false, |r| all_wall(r)) {
        rows.remove(0);
    }
    while !rows.is_empty() && rows.iter().all(|r| r.first().map_or(false, |c| c.is_wall())) {
        for row in rows.iter_mut() {
            row.remove(0);
        }
    }
    while !rows.is_empty() && rows.iter().all(|r| r.last().map_or(false, |c| c.is_wall())) {
        for row in rows.iter_mut() {
            row.pop();
        }
    }
}

#[cfg(test)]
pub(crate) fn ascii_grid(rows: &[&str]) -> Vec<Vec<Cell>> {
    rows.iter()
        .map(|row| {
            row.chars()
                .map(|c| match c {
                    '#' => Cell::WALL,
                    ' ' => Cell::FIELD,
                    '@' => Cell::UNIT,
                    '$' => Cell::BOX,
                    '.' => Cell::DESTINATION,
                    '*' => Cell::BOX_DESTINATION,
                    '+' => Cell::UNIT_DESTINATION,
                    _ => panic!("unknown test symbol {:?}", c),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn map_from_ascii(rows: &[&str]) -> Map {
    Map::from_rows(ascii_grid(rows)).unwrap()
}

use serde::Serialize;

use crate::constants::SAVE_LIMIT;
use crate::geometry::{cell_fraction, distance, to_cell, Axis, Cell, Direction, Point};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WallState {
    pub top: bool,
    pub left: bool,
    pub right: bool,
    pub bottom: bool,
}

impl WallState {
    pub fn is_blocked(&self, dir: Direction) -> bool {
        match dir {
            Direction::Up => self.top,
            Direction::Right => self.right,
            Direction::Down => self.bottom,
            Direction::Left => self.left,
        }
    }

    fn block(&mut self, dir: Direction) {
        match dir {
            Direction::Up => self.top = true,
            Direction::Right => self.right = true,
            Direction::Down => self.bottom = true,
            Direction::Left => self.left = true,
        }
    }

    fn to_nibble(self) -> u8 {
        (self.top as u8) | (self.left as u8) << 1 | (self.right as u8) << 2 | (self.bottom as u8) << 3
    }

    fn from_nibble(bits: u8) -> Self {
        Self {
            top: bits & 1 != 0,
            left: bits & 2 != 0,
            right: bits & 4 != 0,
            bottom: bits & 8 != 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockedEdge {
    pub cell: Cell,
    pub dir: Direction,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OcclusionGrid {
    size: usize,
    cells: Vec<WallState>,
}

impl OcclusionGrid {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "occlusion grid needs at least one cell");
        let mut grid = Self {
            size,
            cells: vec![WallState::default(); size * size],
        };
        let last = size as i32 - 1;
        for i in 0..size as i32 {
            grid.walls_mut(Cell::new(i, 0)).top = true;
            grid.walls_mut(Cell::new(i, last)).bottom = true;
            grid.walls_mut(Cell::new(0, i)).left = true;
            grid.walls_mut(Cell::new(last, i)).right = true;
        }
        grid
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.size && (cell.y as usize) < self.size
    }

    pub fn cell_of(&self, point: Point) -> Cell {
        let cell = to_cell(point);
        let last = self.size as i32 - 1;
        Cell::new(cell.x.clamp(0, last), cell.y.clamp(0, last))
    }

    pub fn walls(&self, cell: Cell) -> WallState {
        self.cells[self.index(cell)]
    }

    pub fn is_passable(&self, cell: Cell, dir: Direction) -> bool {
        let next = cell.neighbor(dir);
        if !self.contains(next) {
            return false;
        }
        !self.walls(cell).is_blocked(dir) && !self.walls(next).is_blocked(dir.opposite())
    }

    pub fn block_edge(&mut self, cell: Cell, dir: Direction) -> bool {
        let next = cell.neighbor(dir);
        let mut changed = false;
        if !self.walls(cell).is_blocked(dir) {
            self.walls_mut(cell).block(dir);
            changed = true;
        }
        if self.contains(next) && !self.walls(next).is_blocked(dir.opposite()) {
            self.walls_mut(next).block(dir.opposite());
            changed = true;
        }
        changed
    }

    pub fn blocked_interior_edges(&self) -> usize {
        let mut count = 0;
        for y in 0..self.size as i32 {
            for x in 0..self.size as i32 {
                let cell = Cell::new(x, y);
                for dir in [Direction::Right, Direction::Down] {
                    if self.contains(cell.neighbor(dir)) && !self.is_passable(cell, dir) {
                        count += 1;
                    }
                }
            }
        }
        count
    }

    // `recent_axis` breaks near-diagonal ties.
    pub fn observe(
        &mut self,
        previous: Point,
        current: Point,
        destination: Point,
        recent_axis: Option<Axis>,
        edge_band: f64,
        stall_tolerance: f64,
    ) -> Option<BlockedEdge> {
        if distance(previous, current) > stall_tolerance {
            return None;
        }

        let cell = self.cell_of(current);
        let target = self.cell_of(destination);
        if cell == target {
            return None;
        }

        let fraction = cell_fraction(current);
        let horizontal = if target.x > cell.x && fraction.x >= 1.0 - edge_band {
            Some(Direction::Right)
        } else if target.x < cell.x && fraction.x <= edge_band {
            Some(Direction::Left)
        } else {
            None
        };
        let vertical = if target.y > cell.y && fraction.y >= 1.0 - edge_band {
            Some(Direction::Down)
        } else if target.y < cell.y && fraction.y <= edge_band {
            Some(Direction::Up)
        } else {
            None
        };

        let dir = match (horizontal, vertical) {
            (Some(h), Some(v)) => {
                let axis = recent_axis
                    .or_else(|| Axis::dominant(destination - current))
                    .unwrap_or(Axis::Horizontal);
                if axis == Axis::Horizontal {
                    h
                } else {
                    v
                }
            }
            (Some(h), None) => h,
            (None, Some(v)) => v,
            (None, None) => return None,
        };

        if self.block_edge(cell, dir) {
            Some(BlockedEdge { cell, dir })
        } else {
            None
        }
    }

    // top=1, left=2, right=4, bottom=8; two cells per byte, row-major.
    pub fn to_save_blob(&self) -> Option<Vec<u8>> {
        let len = self.cells.len().div_ceil(2);
        if len > SAVE_LIMIT {
            return None;
        }
        let mut out = vec![0u8; len];
        for (idx, walls) in self.cells.iter().enumerate() {
            let shift = if idx % 2 == 0 { 0 } else { 4 };
            out[idx / 2] |= walls.to_nibble() << shift;
        }
        Some(out)
    }

    pub fn from_save_blob(size: usize, blob: &[u8]) -> Option<Self> {
        let mut grid = Self::new(size);
        if blob.len() != grid.cells.len().div_ceil(2) {
            return None;
        }
        for idx in 0..grid.cells.len() {
            let shift = if idx % 2 == 0 { 0 } else { 4 };
            let walls = WallState::from_nibble((blob[idx / 2] >> shift) & 0x0f);
            let cell = Cell::new((idx % size) as i32, (idx / size) as i32);
            for dir in Direction::ALL {
                if walls.is_blocked(dir) {
                    grid.block_edge(cell, dir);
                }
            }
        }
        Some(grid)
    }

    fn walls_mut(&mut self, cell: Cell) -> &mut WallState {
        let idx = self.index(cell);
        &mut self.cells[idx]
    }

    fn index(&self, cell: Cell) -> usize {
        assert!(
            self.contains(cell),
            "cell ({}, {}) outside {}x{} occlusion grid",
            cell.x,
            cell.y,
            self.size,
            self.size
        );
        cell.y as usize * self.size + cell.x as usize
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::constants::{DEFAULT_EDGE_BAND, DEFAULT_STALL_TOLERANCE};

    fn observe(
        grid: &mut OcclusionGrid,
        previous: Point,
        current: Point,
        destination: Point,
        recent_axis: Option<Axis>,
    ) -> Option<BlockedEdge> {
        grid.observe(
            previous,
            current,
            destination,
            recent_axis,
            DEFAULT_EDGE_BAND,
            DEFAULT_STALL_TOLERANCE,
        )
    }

    #[test]
    fn new_grid_walls_only_the_boundary() {
        let grid = OcclusionGrid::new(10);
        assert!(grid.walls(Cell::new(0, 0)).top);
        assert!(grid.walls(Cell::new(0, 0)).left);
        assert!(!grid.walls(Cell::new(0, 0)).right);
        assert!(grid.walls(Cell::new(9, 9)).bottom);
        assert!(grid.walls(Cell::new(9, 9)).right);
        assert_eq!(grid.walls(Cell::new(4, 4)), WallState::default());
        assert_eq!(grid.blocked_interior_edges(), 0);
        assert!(!grid.is_passable(Cell::new(0, 0), Direction::Up));
        assert!(grid.is_passable(Cell::new(0, 0), Direction::Right));
    }

    #[test]
    fn cell_of_clamps_into_grid() {
        let grid = OcclusionGrid::new(10);
        assert_eq!(grid.cell_of(Point::new(-5.0, 1000.0)), Cell::new(0, 9));
        assert_eq!(grid.cell_of(Point::new(45.0, 75.0)), Cell::new(1, 2));
    }

    #[test]
    #[should_panic(expected = "outside 10x10 occlusion grid")]
    fn out_of_range_cell_is_fatal() {
        let grid = OcclusionGrid::new(10);
        grid.walls(Cell::new(10, 0));
    }

    #[test]
    fn stall_at_right_edge_blocks_both_sides() {
        let mut grid = OcclusionGrid::new(10);
        let stuck = Point::new(59.5, 45.0);
        let learned = observe(&mut grid, stuck, stuck, Point::new(75.0, 45.0), None);

        assert_eq!(
            learned,
            Some(BlockedEdge {
                cell: Cell::new(1, 1),
                dir: Direction::Right
            })
        );
        let a = grid.walls(Cell::new(1, 1));
        let b = grid.walls(Cell::new(2, 1));
        assert!(a.right);
        assert_eq!(a.right, b.left);
        assert!(!grid.is_passable(Cell::new(2, 1), Direction::Left));
    }

    #[test]
    fn stall_at_top_edge_blocks_up() {
        let mut grid = OcclusionGrid::new(10);
        let stuck = Point::new(45.0, 60.5);
        let learned = observe(&mut grid, stuck, stuck, Point::new(45.0, 15.0), None);
        assert_eq!(
            learned,
            Some(BlockedEdge {
                cell: Cell::new(1, 2),
                dir: Direction::Up
            })
        );
        assert!(grid.walls(Cell::new(1, 1)).bottom);
    }

    #[test]
    fn movement_teaches_nothing() {
        let mut grid = OcclusionGrid::new(10);
        let learned = observe(
            &mut grid,
            Point::new(50.0, 45.0),
            Point::new(59.5, 45.0),
            Point::new(75.0, 45.0),
            None,
        );
        assert_eq!(learned, None);
        assert_eq!(grid, OcclusionGrid::new(10));
    }

    #[test]
    fn stall_away_from_edge_band_teaches_nothing() {
        let mut grid = OcclusionGrid::new(10);
        let stuck = Point::new(45.0, 45.0);
        assert_eq!(observe(&mut grid, stuck, stuck, Point::new(75.0, 45.0), None), None);
        assert_eq!(grid.blocked_interior_edges(), 0);
    }

    #[test]
    fn stall_inside_destination_cell_teaches_nothing() {
        let mut grid = OcclusionGrid::new(10);
        let stuck = Point::new(59.0, 45.0);
        assert_eq!(observe(&mut grid, stuck, stuck, Point::new(40.0, 45.0), None), None);
    }

    #[test]
    fn diagonal_stall_uses_recent_travel_axis() {
        let stuck = Point::new(59.5, 59.5);
        let destination = Point::new(100.0, 75.0);

        let mut grid = OcclusionGrid::new(10);
        let learned = observe(&mut grid, stuck, stuck, destination, Some(Axis::Vertical));
        assert_eq!(learned.map(|edge| edge.dir), Some(Direction::Down));

        let mut grid = OcclusionGrid::new(10);
        let learned = observe(&mut grid, stuck, stuck, destination, None);
        assert_eq!(learned.map(|edge| edge.dir), Some(Direction::Right));
    }

    #[test]
    fn repeated_stall_reports_edge_once() {
        let mut grid = OcclusionGrid::new(10);
        let stuck = Point::new(59.5, 45.0);
        let destination = Point::new(75.0, 45.0);
        assert!(observe(&mut grid, stuck, stuck, destination, None).is_some());
        assert!(observe(&mut grid, stuck, stuck, destination, None).is_none());
        assert_eq!(grid.blocked_interior_edges(), 1);
    }

    #[test]
    fn save_blob_restores_learned_walls() {
        let mut grid = OcclusionGrid::new(10);
        grid.block_edge(Cell::new(3, 4), Direction::Right);
        grid.block_edge(Cell::new(7, 7), Direction::Up);

        let blob = grid.to_save_blob().expect("10x10 grid fits the save limit");
        assert_eq!(blob.len(), 50);

        let restored = OcclusionGrid::from_save_blob(10, &blob).expect("blob should restore");
        assert_eq!(restored, grid);
        assert!(OcclusionGrid::from_save_blob(10, &blob[..49]).is_none());
        assert!(OcclusionGrid::from_save_blob(12, &blob).is_none());
    }

    #[test]
    fn large_grid_has_no_save_blob() {
        assert!(OcclusionGrid::new(15).to_save_blob().is_none());
        assert!(OcclusionGrid::new(14).to_save_blob().is_some());
    }

    proptest! {
        #[test]
        fn blocking_any_edge_is_symmetric(x in 0i32..10, y in 0i32..10, dir_idx in 0usize..4) {
            let mut grid = OcclusionGrid::new(10);
            let cell = Cell::new(x, y);
            let dir = Direction::ALL[dir_idx];
            grid.block_edge(cell, dir);

            let next = cell.neighbor(dir);
            prop_assert!(grid.walls(cell).is_blocked(dir));
            if grid.contains(next) {
                prop_assert!(grid.walls(next).is_blocked(dir.opposite()));
            }
            prop_assert!(!grid.is_passable(cell, dir));
        }
    }
}

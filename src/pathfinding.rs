use std::collections::{HashSet, VecDeque};

use crate::geometry::{Cell, Direction, Point};
use crate::occlusion::OcclusionGrid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathStep {
    AtGoal,
    Step(Cell),
}

pub fn next_step(grid: &OcclusionGrid, start: Point, goal: Point) -> Option<PathStep> {
    next_step_between(grid, grid.cell_of(start), grid.cell_of(goal))
}

pub fn next_step_between(grid: &OcclusionGrid, start: Cell, goal: Cell) -> Option<PathStep> {
    if start == goal {
        return Some(PathStep::AtGoal);
    }
    if !grid.contains(start) || !grid.contains(goal) {
        return None;
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);

    for dir in Direction::ALL {
        if !grid.is_passable(start, dir) {
            continue;
        }
        let next = start.neighbor(dir);
        if next == goal {
            return Some(PathStep::Step(next));
        }
        if visited.insert(next) {
            queue.push_back((next, next));
        }
    }

    while let Some((cell, first)) = queue.pop_front() {
        for dir in Direction::ALL {
            if !grid.is_passable(cell, dir) {
                continue;
            }
            let next = cell.neighbor(dir);
            if next == goal {
                return Some(PathStep::Step(first));
            }
            if visited.insert(next) {
                queue.push_back((next, first));
            }
        }
    }

    None
}

//! Cost-aware pathfinding over the grid.
//!
//! Uniform-cost search (Dijkstra) with 4-directional adjacency. The frontier is
//! ordered by accumulated cost and then by discovery sequence, so equal-cost
//! alternatives always resolve the same way for the same input.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use arrayvec::ArrayVec;

use crate::map::{CardinalDirection, GridMap, Position};
use crate::terrain::{CellCost, Cost};

/// Cheapest route between two cells, start and goal inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathResult {
    pub path: Vec<Position>,
    pub cost: Cost,
}

impl PathResult {
    pub fn start(&self) -> Option<Position> {
        self.path.first().copied()
    }

    pub fn goal(&self) -> Option<Position> {
        self.path.last().copied()
    }

    /// Number of steps taken, excluding the start cell.
    pub fn steps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// A cell reachable within a cost ceiling, with the route that reaches it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReachableCell {
    pub position: Position,
    pub cost: Cost,
    pub path: Vec<Position>,
}

/// Every cell reachable from a start within a ceiling, keyed by position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReachableSet {
    cells: BTreeMap<Position, ReachableCell>,
}

impl ReachableSet {
    pub fn get(&self, position: Position) -> Option<&ReachableCell> {
        self.cells.get(&position)
    }

    pub fn contains(&self, position: Position) -> bool {
        self.cells.contains_key(&position)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReachableCell> {
        self.cells.values()
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierEntry {
    cost: Cost,
    sequence: u64,
    index: usize,
}

/// Search bookkeeping: best known cost and parent link per cell index.
struct SearchTree {
    best: Vec<Option<Cost>>,
    parent: Vec<Option<usize>>,
}

impl SearchTree {
    fn path_to(&self, map: &GridMap, goal: usize) -> Vec<Position> {
        let dims = map.dimensions();
        let mut path = vec![dims.position_of(goal)];
        let mut cursor = goal;
        while let Some(previous) = self.parent[cursor] {
            path.push(dims.position_of(previous));
            cursor = previous;
        }
        path.reverse();
        path
    }
}

/// Pathfinder bound to one map snapshot.
pub struct Pathfinder<'a> {
    map: &'a GridMap,
}

impl<'a> Pathfinder<'a> {
    pub fn new(map: &'a GridMap) -> Self {
        Self { map }
    }

    /// Cheapest path from `start` to `goal`, or `None` when the goal is
    /// impassable, off the map, or unreachable.
    pub fn cheapest_path(&self, start: Position, goal: Position) -> Option<PathResult> {
        let dims = self.map.dimensions();
        let start_index = dims.index_of(start)?;
        let goal_index = dims.index_of(goal)?;

        // A blocked destination can never be a valid target; skip the search.
        if !self.map.cost_at(goal).is_passable() {
            return None;
        }

        if start_index == goal_index {
            return Some(PathResult {
                path: vec![start],
                cost: Cost::ZERO,
            });
        }

        let tree = self.search(start_index, None, Some(goal_index));
        let cost = tree.best[goal_index]?;
        Some(PathResult {
            path: tree.path_to(self.map, goal_index),
            cost,
        })
    }

    /// All cells reachable from `start` for at most `max_cost`, including the
    /// start itself at cost zero.
    pub fn reachable_set(&self, start: Position, max_cost: Cost) -> ReachableSet {
        let dims = self.map.dimensions();
        let Some(start_index) = dims.index_of(start) else {
            return ReachableSet::default();
        };

        let tree = self.search(start_index, Some(max_cost), None);
        let cells = tree
            .best
            .iter()
            .enumerate()
            .filter_map(|(index, best)| {
                let cost = (*best)?;
                let position = dims.position_of(index);
                Some((
                    position,
                    ReachableCell {
                        position,
                        cost,
                        path: tree.path_to(self.map, index),
                    },
                ))
            })
            .collect();

        ReachableSet { cells }
    }

    fn neighbors(&self, index: usize) -> ArrayVec<usize, 4> {
        let dims = self.map.dimensions();
        let origin = dims.position_of(index);
        CardinalDirection::ALL
            .iter()
            .filter_map(|&direction| dims.index_of(origin.step(direction)))
            .collect()
    }

    /// Uniform-cost search from `start`. Stops early once `goal` is settled;
    /// never records a cell whose cost would exceed `ceiling`.
    fn search(&self, start: usize, ceiling: Option<Cost>, goal: Option<usize>) -> SearchTree {
        let cell_count = self.map.dimensions().cell_count();
        let mut tree = SearchTree {
            best: vec![None; cell_count],
            parent: vec![None; cell_count],
        };
        let mut settled = vec![false; cell_count];
        let mut frontier = BinaryHeap::new();
        let mut sequence = 0u64;

        tree.best[start] = Some(Cost::ZERO);
        frontier.push(Reverse(FrontierEntry {
            cost: Cost::ZERO,
            sequence,
            index: start,
        }));

        while let Some(Reverse(entry)) = frontier.pop() {
            if settled[entry.index] {
                continue;
            }
            settled[entry.index] = true;

            if Some(entry.index) == goal {
                break;
            }

            for neighbor in self.neighbors(entry.index) {
                if settled[neighbor] {
                    continue;
                }
                let CellCost::Enter(step) = self.map.cell_at_index(neighbor).cost() else {
                    continue;
                };
                let tentative = entry.cost + step;
                if ceiling.is_some_and(|limit| tentative > limit) {
                    continue;
                }
                if tree.best[neighbor].is_some_and(|known| known <= tentative) {
                    continue;
                }

                tree.best[neighbor] = Some(tentative);
                tree.parent[neighbor] = Some(entry.index);
                sequence += 1;
                frontier.push(Reverse(FrontierEntry {
                    cost: tentative,
                    sequence,
                    index: neighbor,
                }));
            }
        }

        tree
    }
}

/// Cheapest path between two cells of `map`.
pub fn cheapest_path(map: &GridMap, start: Position, goal: Position) -> Option<PathResult> {
    Pathfinder::new(map).cheapest_path(start, goal)
}

/// Cells reachable from `start` within `max_cost`.
pub fn reachable_set(map: &GridMap, start: Position, max_cost: Cost) -> ReachableSet {
    Pathfinder::new(map).reachable_set(start, max_cost)
}

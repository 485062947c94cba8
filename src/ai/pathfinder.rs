//! Threat-aware A* over the 8-connected level grid.
//!
//! Step costs are 1 for orthogonal moves and sqrt(2) for diagonal moves. The
//! heuristic is the octile distance to the goal plus a soft penalty for every
//! threat within `danger_radius` (Manhattan) of the evaluated cell, so routes
//! bend away from other agents without treating them as walls.
//!
//! Closed nodes are never reopened. The threat penalty makes the heuristic
//! inconsistent, so with threats present the returned route can be slightly
//! longer than the true shortest route. Without threats the heuristic is
//! consistent and the route is optimal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::f64::consts::SQRT_2;

use micromegas_tracing::prelude::*;

use super::grid::{Cell, Grid};

/// Threat influence radius in cells.
pub const DEFAULT_DANGER_RADIUS: u32 = 10;

pub const ORTHOGONAL_COST: f64 = 1.0;
pub const DIAGONAL_COST: f64 = SQRT_2;

/// Orthogonal moves first, then diagonals.
const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
];

// ---------------------------------------------------------------------------
// Planner seam
// ---------------------------------------------------------------------------

/// Anything that can produce a route between two cells.
///
/// Returns the cells from `start` to `goal` inclusive, or an empty vector
/// when no route exists.
pub trait RoutePlanner {
    fn search(&self, grid: &Grid, start: Cell, goal: Cell, threats: &[Cell]) -> Vec<Cell>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AStarPlanner {
    pub danger_radius: u32,
}

impl Default for AStarPlanner {
    fn default() -> Self {
        Self {
            danger_radius: DEFAULT_DANGER_RADIUS,
        }
    }
}

impl AStarPlanner {
    pub fn new(danger_radius: u32) -> Self {
        Self { danger_radius }
    }
}

impl RoutePlanner for AStarPlanner {
    fn search(&self, grid: &Grid, start: Cell, goal: Cell, threats: &[Cell]) -> Vec<Cell> {
        span_scope!("pursuit_search");
        if !grid.contains(start) || !grid.contains(goal) {
            warn!("route search from {start} to {goal} leaves the grid");
            return Vec::new();
        }
        if !grid.is_open(start) || !grid.is_open(goal) {
            return Vec::new();
        }

        let mut search = Search::new(grid, goal, threats, self.danger_radius);
        let route = search.run(start);
        imetric!("pursuit_search_expanded", "count", search.expanded as u64);
        route
    }
}

// ---------------------------------------------------------------------------
// Heuristic
// ---------------------------------------------------------------------------

/// Octile distance: `D * (dx + dy) + (sqrt(2) - 2D) * min(dx, dy)` with `D = 1`.
pub fn octile_distance(a: Cell, b: Cell) -> f64 {
    let dx = f64::from((a.row - b.row).unsigned_abs());
    let dy = f64::from((a.col - b.col).unsigned_abs());
    ORTHOGONAL_COST * (dx + dy) + (DIAGONAL_COST - 2.0 * ORTHOGONAL_COST) * dx.min(dy)
}

/// Sum of `radius - manhattan` over every threat closer than `radius`.
pub fn threat_penalty(cell: Cell, threats: &[Cell], radius: u32) -> f64 {
    threats
        .iter()
        .map(|&threat| radius.saturating_sub(cell.manhattan(threat)))
        .map(f64::from)
        .sum()
}

pub fn heuristic(cell: Cell, goal: Cell, threats: &[Cell], radius: u32) -> f64 {
    octile_distance(cell, goal) + threat_penalty(cell, threats, radius)
}

/// Total step cost of a route, counting diagonal steps as sqrt(2).
pub fn route_cost(route: &[Cell]) -> f64 {
    route
        .windows(2)
        .map(|pair| step_cost(pair[0], pair[1]))
        .sum()
}

fn step_cost(from: Cell, to: Cell) -> f64 {
    if from.row != to.row && from.col != to.col {
        DIAGONAL_COST
    } else {
        ORTHOGONAL_COST
    }
}

/// Walkable neighbours of `cell` with their step costs.
///
/// A diagonal step is rejected when either orthogonal cell sharing its corner
/// is blocked, so agents never squeeze between two wall tiles.
pub fn neighbours(grid: &Grid, cell: Cell) -> impl Iterator<Item = (Cell, f64)> + '_ {
    NEIGHBOUR_OFFSETS.iter().filter_map(move |&(d_row, d_col)| {
        let next = cell.offset(d_row, d_col);
        if !grid.is_open(next) {
            return None;
        }
        if d_row != 0 && d_col != 0 {
            let corner_a = cell.offset(d_row, 0);
            let corner_b = cell.offset(0, d_col);
            if grid.is_blocked(corner_a) || grid.is_blocked(corner_b) {
                return None;
            }
            return Some((next, DIAGONAL_COST));
        }
        Some((next, ORTHOGONAL_COST))
    })
}

// ---------------------------------------------------------------------------
// Search state
// ---------------------------------------------------------------------------

/// Arena node. `parent` indexes into the same arena.
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    cell: Cell,
    parent: Option<usize>,
    g: f64,
    h: f64,
    /// Sequence number of the newest heap entry for this node.
    seq: u64,
}

impl SearchNode {
    fn f(&self) -> f64 {
        self.g + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Unseen,
    Open(usize),
    Closed,
}

/// Heap entry. Smallest `f` pops first, then smallest `h`, then oldest entry.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f64,
    h: f64,
    seq: u64,
    node: usize,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so every comparison is reversed.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

struct Search<'a> {
    grid: &'a Grid,
    goal: Cell,
    threats: &'a [Cell],
    radius: u32,
    nodes: Vec<SearchNode>,
    slots: Vec<Slot>,
    open: BinaryHeap<OpenEntry>,
    next_seq: u64,
    expanded: usize,
}

impl<'a> Search<'a> {
    fn new(grid: &'a Grid, goal: Cell, threats: &'a [Cell], radius: u32) -> Self {
        Self {
            grid,
            goal,
            threats,
            radius,
            nodes: Vec::new(),
            slots: vec![Slot::Unseen; grid.len()],
            open: BinaryHeap::new(),
            next_seq: 0,
            expanded: 0,
        }
    }

    fn run(&mut self, start: Cell) -> Vec<Cell> {
        self.discover(start, None, 0.0);

        while let Some(entry) = self.open.pop() {
            let node = self.nodes[entry.node];
            if node.seq != entry.seq {
                // Superseded by a cheaper entry for the same node.
                continue;
            }
            let Some(slot_index) = self.grid.index(node.cell) else {
                continue;
            };
            self.slots[slot_index] = Slot::Closed;
            self.expanded += 1;

            if node.cell == self.goal {
                return self.reconstruct(entry.node);
            }

            for (next, cost) in neighbours(self.grid, node.cell) {
                self.relax(next, entry.node, node.g + cost);
            }
        }

        Vec::new()
    }

    /// Record a route into `cell` with cost `g`, unless the cell is closed or
    /// already open with an equal or cheaper cost.
    fn relax(&mut self, cell: Cell, parent: usize, g: f64) {
        let Some(slot_index) = self.grid.index(cell) else {
            return;
        };
        match self.slots[slot_index] {
            Slot::Closed => {}
            Slot::Open(existing) => {
                if g < self.nodes[existing].g {
                    let seq = self.bump_seq();
                    let node = &mut self.nodes[existing];
                    node.g = g;
                    node.parent = Some(parent);
                    node.seq = seq;
                    let entry = OpenEntry {
                        f: node.f(),
                        h: node.h,
                        seq,
                        node: existing,
                    };
                    self.open.push(entry);
                }
            }
            Slot::Unseen => self.discover(cell, Some(parent), g),
        }
    }

    fn discover(&mut self, cell: Cell, parent: Option<usize>, g: f64) {
        let Some(slot_index) = self.grid.index(cell) else {
            return;
        };
        let seq = self.bump_seq();
        let node = SearchNode {
            cell,
            parent,
            g,
            h: heuristic(cell, self.goal, self.threats, self.radius),
            seq,
        };
        let index = self.nodes.len();
        self.nodes.push(node);
        self.slots[slot_index] = Slot::Open(index);
        self.open.push(OpenEntry {
            f: node.f(),
            h: node.h,
            seq,
            node: index,
        });
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn reconstruct(&self, goal_index: usize) -> Vec<Cell> {
        let mut route = Vec::new();
        let mut cursor = Some(goal_index);
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            route.push(node.cell);
            cursor = node.parent;
        }
        route.reverse();
        route
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn cells(pairs: &[(i32, i32)]) -> Vec<Cell> {
        pairs.iter().map(|&p| Cell::from(p)).collect()
    }

    /// Every step is 8-adjacent, lands on an open cell, and does not cut a corner.
    fn assert_valid_route(grid: &Grid, route: &[Cell]) {
        for cell in route {
            assert!(grid.is_open(*cell), "route enters non-open cell {cell}");
        }
        for pair in route.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            assert!(from.is_adjacent(to), "{from} -> {to} is not a single step");
            if from.row != to.row && from.col != to.col {
                assert!(
                    !grid.is_blocked(Cell::new(to.row, from.col))
                        && !grid.is_blocked(Cell::new(from.row, to.col)),
                    "{from} -> {to} cuts a wall corner"
                );
            }
        }
    }

    /// Dijkstra over the same neighbour rule, with costs scaled to integers.
    fn oracle_cost(grid: &Grid, start: Cell, goal: Cell) -> Option<f64> {
        const SCALE: f64 = 1_000_000.0;
        pathfinding::prelude::dijkstra(
            &start,
            |cell| {
                neighbours(grid, *cell)
                    .map(|(next, cost)| (next, (cost * SCALE).round() as u64))
                    .collect::<Vec<_>>()
            },
            |cell| *cell == goal,
        )
        .map(|(_, cost)| cost as f64 / SCALE)
    }

    #[test]
    fn octile_distance_matches_formula() {
        let d = octile_distance(Cell::new(0, 0), Cell::new(3, 5));
        assert!((d - (2.0 + 3.0 * SQRT_2)).abs() < EPS);
        assert!(octile_distance(Cell::new(4, 4), Cell::new(4, 4)).abs() < EPS);
        assert!((octile_distance(Cell::new(0, 0), Cell::new(0, 7)) - 7.0).abs() < EPS);
    }

    #[test]
    fn threat_penalty_grows_as_threat_gets_closer() {
        let cell = Cell::new(5, 5);
        assert!((threat_penalty(cell, &[cell], 10) - 10.0).abs() < EPS);
        assert!((threat_penalty(cell, &[Cell::new(5, 8)], 10) - 7.0).abs() < EPS);
        assert!(threat_penalty(cell, &[Cell::new(0, 0)], 10).abs() < EPS);
        assert!(threat_penalty(cell, &[Cell::new(5, 17)], 10).abs() < EPS);
        assert!(threat_penalty(cell, &[], 10).abs() < EPS);
    }

    #[test]
    fn threat_penalties_stack() {
        let cell = Cell::new(2, 2);
        let threats = [Cell::new(2, 3), Cell::new(4, 2)];
        assert!((threat_penalty(cell, &threats, 10) - 17.0).abs() < EPS);
        let h = heuristic(cell, Cell::new(2, 6), &threats, 10);
        assert!((h - 21.0).abs() < EPS);
    }

    #[test]
    fn straight_corridor() {
        let grid = Grid::open(5, 1);
        let route = AStarPlanner::default().search(&grid, Cell::new(0, 0), Cell::new(0, 4), &[]);
        assert_eq!(route, cells(&[(0, 0), (0, 1), (0, 2), (0, 3), (0, 4)]));
    }

    #[test]
    fn open_grid_takes_the_diagonal() {
        let grid = Grid::open(4, 4);
        let route = AStarPlanner::default().search(&grid, Cell::new(0, 0), Cell::new(3, 3), &[]);
        assert_eq!(route, cells(&[(0, 0), (1, 1), (2, 2), (3, 3)]));
        assert!((route_cost(&route) - 3.0 * SQRT_2).abs() < EPS);
    }

    #[test]
    fn start_equals_goal() {
        let grid = Grid::open(3, 3);
        let start = Cell::new(1, 1);
        assert_eq!(AStarPlanner::default().search(&grid, start, start, &[]), vec![start]);
    }

    #[test]
    fn diagonal_blocked_by_either_corner() {
        let planner = AStarPlanner::default();

        let grid = Grid::parse(".#\n..").unwrap();
        let route = planner.search(&grid, Cell::new(0, 0), Cell::new(1, 1), &[]);
        assert_eq!(route, cells(&[(0, 0), (1, 0), (1, 1)]));

        let grid = Grid::parse("..\n#.").unwrap();
        let route = planner.search(&grid, Cell::new(0, 0), Cell::new(1, 1), &[]);
        assert_eq!(route, cells(&[(0, 0), (0, 1), (1, 1)]));

        // Both corners blocked: the diagonal is the only geometric link and it is refused.
        let grid = Grid::parse(".#\n#.").unwrap();
        assert!(planner.search(&grid, Cell::new(0, 0), Cell::new(1, 1), &[]).is_empty());
    }

    #[test]
    fn blocked_goal_is_unreachable() {
        let grid = Grid::parse("...\n..#\n...").unwrap();
        let route = AStarPlanner::default().search(&grid, Cell::new(0, 0), Cell::new(1, 2), &[]);
        assert!(route.is_empty());
    }

    #[test]
    fn out_of_bounds_endpoint_is_unreachable() {
        let grid = Grid::open(3, 3);
        let planner = AStarPlanner::default();
        assert!(planner.search(&grid, Cell::new(-1, 0), Cell::new(2, 2), &[]).is_empty());
        assert!(planner.search(&grid, Cell::new(0, 0), Cell::new(0, 3), &[]).is_empty());
    }

    #[test]
    fn blocked_start_is_unreachable() {
        let grid = Grid::parse("#..\n...\n...").unwrap();
        let route = AStarPlanner::default().search(&grid, Cell::new(0, 0), Cell::new(2, 2), &[]);
        assert!(route.is_empty());
    }

    #[test]
    fn enclosed_goal_is_unreachable() {
        let grid = Grid::parse(
            "
            .......
            .......
            ...###.
            ...#.#.
            ...###.
            .......
            ",
        )
        .unwrap();
        let route = AStarPlanner::default().search(&grid, Cell::new(0, 0), Cell::new(3, 4), &[]);
        assert!(route.is_empty());
    }

    #[test]
    fn search_is_deterministic() {
        let grid = Grid::parse(
            "
            ........
            ..##....
            ..#.....
            ....##..
            ........
            ",
        )
        .unwrap();
        let planner = AStarPlanner::default();
        let threats = [Cell::new(2, 5)];
        let first = planner.search(&grid, Cell::new(0, 0), Cell::new(4, 7), &threats);
        assert!(!first.is_empty());
        for _ in 0..10 {
            assert_eq!(planner.search(&grid, Cell::new(0, 0), Cell::new(4, 7), &threats), first);
        }
    }

    #[test]
    fn routes_are_valid_with_and_without_threats() {
        let grid = Grid::parse(
            "
            ..........
            .####.###.
            .#......#.
            .#.####.#.
            ...#..#...
            .#.#..#.#.
            .#......#.
            .###.####.
            ..........
            ",
        )
        .unwrap();
        let planner = AStarPlanner::default();
        let pairs = [
            (Cell::new(0, 0), Cell::new(8, 9)),
            (Cell::new(4, 4), Cell::new(0, 9)),
            (Cell::new(8, 0), Cell::new(2, 2)),
        ];
        for (start, goal) in pairs {
            for threats in [vec![], vec![Cell::new(4, 1)], vec![Cell::new(2, 5), Cell::new(6, 4)]] {
                let route = planner.search(&grid, start, goal, &threats);
                assert_eq!(route.first(), Some(&start));
                assert_eq!(route.last(), Some(&goal));
                assert_valid_route(&grid, &route);
            }
        }
    }

    #[test]
    fn optimal_without_threats() {
        let grids = [
            // 5x5 with a single gap in the wall.
            "
            .....
            .....
            ####.
            .....
            .....
            ",
            "
            ......
            .#..#.
            .#.##.
            .#....
            .####.
            ......
            ",
            "
            ..#....
            ..#.##.
            ....#..
            .##.#.#
            ....#..
            .#.....
            ",
        ];
        let planner = AStarPlanner::default();
        for text in grids {
            let grid = Grid::parse(text).unwrap();
            let last = Cell::new(grid.height() as i32 - 1, grid.width() as i32 - 1);
            let pairs = [
                (Cell::new(0, 0), Cell::new(grid.height() as i32 - 1, 0)),
                (Cell::new(0, 0), last),
                (last, Cell::new(0, 1)),
            ];
            for (start, goal) in pairs {
                let route = planner.search(&grid, start, goal, &[]);
                let expected = oracle_cost(&grid, start, goal);
                match expected {
                    Some(cost) => {
                        assert!(
                            (route_cost(&route) - cost).abs() < 1e-3,
                            "{start} -> {goal}: got {} expected {cost}",
                            route_cost(&route)
                        );
                        assert_valid_route(&grid, &route);
                    }
                    None => assert!(route.is_empty()),
                }
            }
        }
    }

    /// Symmetric 7x7 layout: a 3x5 block splits the grid into an upper and a
    /// lower corridor of equal cost between (3,0) and (3,6).
    fn two_corridor_grid() -> Grid {
        Grid::parse(
            "
            .......
            .......
            .#####.
            .#####.
            .#####.
            .......
            .......
            ",
        )
        .unwrap()
    }

    #[test]
    fn threat_pushes_route_to_the_other_corridor() {
        let grid = two_corridor_grid();
        let planner = AStarPlanner::default();
        let (start, goal) = (Cell::new(3, 0), Cell::new(3, 6));

        let plain = planner.search(&grid, start, goal, &[]);
        assert!((route_cost(&plain) - 10.0).abs() < EPS);

        let avoid_top = planner.search(&grid, start, goal, &[Cell::new(0, 3)]);
        assert!(!avoid_top.is_empty());
        assert!(
            avoid_top.iter().all(|c| c.row >= 3),
            "route should use the lower corridor: {avoid_top:?}"
        );

        let avoid_bottom = planner.search(&grid, start, goal, &[Cell::new(6, 3)]);
        assert!(!avoid_bottom.is_empty());
        assert!(
            avoid_bottom.iter().all(|c| c.row <= 3),
            "route should use the upper corridor: {avoid_bottom:?}"
        );
    }

    #[test]
    fn threats_never_block() {
        // The only corridor is covered by a threat; the route still goes through it.
        let grid = Grid::parse("#.#\n...\n#.#").unwrap();
        let route = AStarPlanner::default().search(
            &grid,
            Cell::new(0, 1),
            Cell::new(2, 1),
            &[Cell::new(1, 1)],
        );
        assert_eq!(route, cells(&[(0, 1), (1, 1), (2, 1)]));
    }

    #[test]
    fn wall_with_single_gap_end_to_end() {
        // Column 5 blocked on rows 0..=8; (9,5) is the only gap.
        let grid = Grid::from_fn(10, 10, |cell| {
            if cell.col == 5 && cell.row <= 8 {
                crate::ai::grid::Tile::Blocked
            } else {
                crate::ai::grid::Tile::Open
            }
        });
        let start = Cell::new(0, 0);
        let goal = Cell::new(0, 9);
        let route = AStarPlanner::default().search(&grid, start, goal, &[]);

        assert_eq!(route.len(), 21);
        assert_eq!(route.first(), Some(&start));
        assert_eq!(route.last(), Some(&goal));
        assert_valid_route(&grid, &route);

        let gap = route.iter().position(|c| *c == Cell::new(9, 5)).unwrap();
        assert_eq!(route[gap - 1], Cell::new(9, 4));
        assert_eq!(route[gap + 1], Cell::new(9, 6));
        assert!((route_cost(&route) - (13.0 + 7.0 * SQRT_2)).abs() < EPS);
    }

    #[test]
    fn open_node_is_reparented_by_a_cheaper_route() {
        // (1,2) is first reached diagonally through (0,3) at 2*sqrt(2), then
        // along the bottom row through (1,3) at 2.
        let grid = Grid::parse(".#...\n.....").unwrap();
        let (start, goal) = (Cell::new(1, 4), Cell::new(0, 0));
        let mut search = Search::new(&grid, goal, &[], DEFAULT_DANGER_RADIUS);
        let route = search.run(start);

        assert_eq!(route, cells(&[(1, 4), (1, 3), (1, 2), (1, 1), (1, 0), (0, 0)]));
        // One sequence number per discovery plus one per improvement.
        assert!(search.next_seq as usize > search.nodes.len());

        let node = search
            .nodes
            .iter()
            .find(|n| n.cell == Cell::new(1, 2))
            .unwrap();
        assert!((node.g - 2.0).abs() < EPS);
        assert_eq!(search.nodes[node.parent.unwrap()].cell, Cell::new(1, 3));
    }

    #[test]
    fn relax_needs_strictly_cheaper_g_and_skips_closed_nodes() {
        let grid = Grid::open(3, 1);
        let mut search = Search::new(&grid, Cell::new(0, 2), &[], DEFAULT_DANGER_RADIUS);
        search.discover(Cell::new(0, 0), None, 0.0);
        search.discover(Cell::new(0, 1), Some(0), 1.0);
        search.discover(Cell::new(0, 2), Some(0), 5.0);
        let pushed = search.open.len();

        search.relax(Cell::new(0, 2), 0, 5.0);
        assert_eq!(search.nodes[2].parent, Some(0));
        assert_eq!(search.open.len(), pushed);

        search.relax(Cell::new(0, 2), 1, 2.0);
        assert_eq!(search.nodes[2].parent, Some(1));
        assert!((search.nodes[2].g - 2.0).abs() < EPS);
        assert_eq!(search.open.len(), pushed + 1);

        // Once closed, even a cheaper route is ignored.
        search.slots[0] = Slot::Closed;
        search.relax(Cell::new(0, 0), 1, -1.0);
        assert_eq!(search.nodes[0].parent, None);
        assert!(search.nodes[0].g.abs() < EPS);
        assert_eq!(search.reconstruct(2), cells(&[(0, 0), (0, 1), (0, 2)]));
    }

    #[test]
    fn neighbours_respect_bounds() {
        let grid = Grid::open(2, 2);
        let found: Vec<Cell> = neighbours(&grid, Cell::new(0, 0)).map(|(c, _)| c).collect();
        assert_eq!(found, cells(&[(1, 0), (0, 1), (1, 1)]));
    }
}

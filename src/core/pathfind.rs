/// A* search over a grid.

use rustc_hash::FxHashMap;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use thiserror::Error;

use crate::schema::grid::{Coord, Grid, DIRS4, DIRS8};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("no path found from {from:?} to {to:?}")]
    NoPathFound { from: Coord, to: Coord },
}

/// Movement model for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Neighborhood {
    /// Orthogonal moves, Manhattan heuristic.
    #[default]
    Four,
    /// Orthogonal and diagonal moves, Chebyshev heuristic.
    Eight,
}

impl Neighborhood {
    pub fn dirs(&self) -> &'static [(i32, i32)] {
        match self {
            Self::Four => &DIRS4,
            Self::Eight => &DIRS8,
        }
    }

    pub fn heuristic(&self, from: Coord, to: Coord) -> u32 {
        match self {
            Self::Four => from.manhattan(to),
            Self::Eight => from.chebyshev(to),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathOptions {
    pub neighborhood: Neighborhood,
    /// When false every passable cell costs 1.
    pub weighted: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            neighborhood: Neighborhood::Four,
            weighted: true,
        }
    }
}

/// A found route, `start..=goal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResult {
    pub path: Vec<Coord>,
    pub cost: u32,
}

impl PathResult {
    /// Number of moves along the path.
    pub fn steps(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// Open-set entry. Lower `f` wins; among equal `f`, the entry pushed first wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Scored {
    f: u32,
    seq: u64,
    at: Coord,
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.f, self.seq).cmp(&(other.f, other.seq))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the cheapest path from `start` to `goal`.
///
/// Entering a cell costs its terrain movement cost (or 1 when unweighted);
/// impassable cells are never entered. Both endpoints must be passable.
/// The search holds no state outside this call, so concurrent searches on
/// a shared grid are safe.
pub fn find_path(
    grid: &Grid,
    start: Coord,
    goal: Coord,
    options: PathOptions,
) -> Result<PathResult, PathError> {
    let no_path = PathError::NoPathFound {
        from: start,
        to: goal,
    };
    if !grid.is_passable(start) || !grid.is_passable(goal) {
        return Err(no_path);
    }

    let step_cost = |at: Coord| -> Option<u32> {
        let cell = grid.get(at)?;
        let cost = cell.movement_cost()?;
        Some(if options.weighted { cost } else { 1 })
    };

    let mut open = BinaryHeap::new();
    let mut came_from: FxHashMap<Coord, Coord> = FxHashMap::default();
    let mut g_score: FxHashMap<Coord, u32> = FxHashMap::default();
    let mut seq = 0u64;

    g_score.insert(start, 0);
    open.push(Reverse(Scored {
        f: options.neighborhood.heuristic(start, goal),
        seq,
        at: start,
    }));

    while let Some(Reverse(current)) = open.pop() {
        if current.at == goal {
            let cost = g_score.get(&goal).copied().unwrap_or(0);
            return Ok(PathResult {
                path: reconstruct(&came_from, start, goal),
                cost,
            });
        }

        let current_g = match g_score.get(&current.at) {
            Some(&g) => g,
            None => continue,
        };
        // Stale entry superseded by a cheaper push.
        if current.f > current_g + options.neighborhood.heuristic(current.at, goal) {
            continue;
        }

        for next in grid.neighbors(current.at, options.neighborhood.dirs()) {
            let Some(cost) = step_cost(next) else {
                continue;
            };
            let tentative = current_g + cost;
            if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                came_from.insert(next, current.at);
                g_score.insert(next, tentative);
                seq += 1;
                open.push(Reverse(Scored {
                    f: tentative + options.neighborhood.heuristic(next, goal),
                    seq,
                    at: next,
                }));
            }
        }
    }

    Err(no_path)
}

fn reconstruct(came_from: &FxHashMap<Coord, Coord>, start: Coord, goal: Coord) -> Vec<Coord> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::grid::TerrainType;
    use std::collections::VecDeque;

    fn open_grid(w: usize, h: usize) -> Grid {
        Grid::filled(w, h, TerrainType::Floor)
    }

    /// Brute-force breadth-first distance for unweighted 4-connected grids.
    fn bfs_distance(grid: &Grid, start: Coord, goal: Coord) -> Option<u32> {
        let mut dist = vec![u32::MAX; grid.len()];
        let mut queue = VecDeque::new();
        dist[grid.index(start)?] = 0;
        queue.push_back(start);
        while let Some(at) = queue.pop_front() {
            let d = dist[grid.index(at)?];
            if at == goal {
                return Some(d);
            }
            for n in grid.neighbors(at, &DIRS4) {
                let i = grid.index(n)?;
                if grid.is_passable(n) && dist[i] == u32::MAX {
                    dist[i] = d + 1;
                    queue.push_back(n);
                }
            }
        }
        None
    }

    #[test]
    fn straight_line_on_open_grid() {
        let g = open_grid(10, 1);
        let r = find_path(&g, Coord::new(0, 0), Coord::new(9, 0), PathOptions::default()).unwrap();
        assert_eq!(r.cost, 9);
        assert_eq!(r.path.first(), Some(&Coord::new(0, 0)));
        assert_eq!(r.path.last(), Some(&Coord::new(9, 0)));
        assert!(r.path.windows(2).all(|w| w[0].is_adjacent4(w[1])));
    }

    #[test]
    fn routes_around_walls() {
        let mut g = open_grid(5, 5);
        for y in 0..4 {
            g.set_terrain(Coord::new(2, y), TerrainType::Wall);
        }
        let r = find_path(&g, Coord::new(0, 0), Coord::new(4, 0), PathOptions::default()).unwrap();
        assert_eq!(r.cost, 12);
        assert!(r.path.iter().all(|c| g.is_passable(*c)));
    }

    #[test]
    fn no_path_when_sealed() {
        let mut g = open_grid(5, 5);
        for y in 0..5 {
            g.set_terrain(Coord::new(2, y), TerrainType::Wall);
        }
        let err = find_path(&g, Coord::new(0, 0), Coord::new(4, 4), PathOptions::default());
        assert_eq!(
            err,
            Err(PathError::NoPathFound {
                from: Coord::new(0, 0),
                to: Coord::new(4, 4)
            })
        );
    }

    #[test]
    fn weighted_terrain_detours_but_never_blocks() {
        let mut g = open_grid(3, 3);
        // Middle column is rubble except the bottom row.
        g.set_terrain(Coord::new(1, 0), TerrainType::Rubble);
        g.set_terrain(Coord::new(1, 1), TerrainType::Rubble);
        let direct = find_path(&g, Coord::new(0, 0), Coord::new(2, 0), PathOptions::default()).unwrap();
        // Through rubble: 3 + 1 = 4; around: 6. Rubble wins.
        assert_eq!(direct.cost, 4);

        g.set_terrain(Coord::new(1, 2), TerrainType::Rubble);
        let forced = find_path(&g, Coord::new(0, 2), Coord::new(2, 2), PathOptions::default()).unwrap();
        assert_eq!(forced.cost, 4);

        let unweighted = PathOptions {
            weighted: false,
            ..PathOptions::default()
        };
        let flat = find_path(&g, Coord::new(0, 0), Coord::new(2, 0), unweighted).unwrap();
        assert_eq!(flat.cost, 2);
    }

    #[test]
    fn eight_way_uses_diagonals() {
        let g = open_grid(6, 6);
        let opts = PathOptions {
            neighborhood: Neighborhood::Eight,
            weighted: true,
        };
        let r = find_path(&g, Coord::new(0, 0), Coord::new(5, 5), opts).unwrap();
        assert_eq!(r.cost, 5);
        assert_eq!(r.steps(), 5);
    }

    #[test]
    fn tie_breaking_is_deterministic() {
        let g = open_grid(8, 8);
        let a = find_path(&g, Coord::new(0, 0), Coord::new(7, 7), PathOptions::default()).unwrap();
        let b = find_path(&g, Coord::new(0, 0), Coord::new(7, 7), PathOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn matches_bfs_on_maze_like_grid() {
        let rows = [
            "..#.....",
            ".##.###.",
            "....#...",
            "###.#.#.",
            "....#.#.",
            ".####.#.",
            "......#.",
        ];
        let mut g = open_grid(8, rows.len());
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '#' {
                    g.set_terrain(Coord::new(x as i32, y as i32), TerrainType::Wall);
                }
            }
        }
        let start = Coord::new(0, 0);
        let goal = Coord::new(7, 6);
        let expected = bfs_distance(&g, start, goal).unwrap();
        let r = find_path(&g, start, goal, PathOptions::default()).unwrap();
        assert_eq!(r.cost, expected);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn astar_cost_equals_bfs_length(
                walls in proptest::collection::vec(any::<bool>(), 64),
                sx in 0i32..8, sy in 0i32..8, gx in 0i32..8, gy in 0i32..8,
            ) {
                let mut g = open_grid(8, 8);
                for (i, wall) in walls.iter().enumerate() {
                    if *wall && i % 3 == 0 {
                        let at = g.coord_of(i);
                        g.set_terrain(at, TerrainType::Wall);
                    }
                }
                let start = Coord::new(sx, sy);
                let goal = Coord::new(gx, gy);
                let opts = PathOptions { neighborhood: Neighborhood::Four, weighted: false };
                let expected = if g.is_passable(start) && g.is_passable(goal) {
                    bfs_distance(&g, start, goal)
                } else {
                    None
                };
                match find_path(&g, start, goal, opts) {
                    Ok(r) => {
                        prop_assert_eq!(Some(r.cost), expected);
                        prop_assert_eq!(r.steps() as u32, r.cost);
                    }
                    Err(_) => prop_assert_eq!(expected, None),
                }
            }
        }
    }
}

/// Flood fill and connected-region labelling.

use std::collections::VecDeque;

use crate::core::pathfind::Neighborhood;
use crate::schema::grid::{Coord, Grid};

/// The set of cells reachable from a start cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachSet {
    width: usize,
    visited: Vec<bool>,
    count: usize,
}

impl ReachSet {
    pub fn contains(&self, at: Coord) -> bool {
        if at.x < 0 || at.y < 0 || at.x as usize >= self.width {
            return false;
        }
        self.visited
            .get(at.y as usize * self.width + at.x as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Breadth-first traversal over passable cells from `start`.
/// An impassable or out-of-bounds start reaches nothing.
pub fn reachable(grid: &Grid, start: Coord, neighborhood: Neighborhood) -> ReachSet {
    let mut visited = vec![false; grid.len()];
    let mut count = 0;
    let mut queue = VecDeque::new();

    if grid.is_passable(start) {
        if let Some(i) = grid.index(start) {
            visited[i] = true;
            count = 1;
            queue.push_back(start);
        }
    }

    while let Some(at) = queue.pop_front() {
        for next in grid.neighbors(at, neighborhood.dirs()) {
            let Some(i) = grid.index(next) else { continue };
            if !visited[i] && grid.is_passable(next) {
                visited[i] = true;
                count += 1;
                queue.push_back(next);
            }
        }
    }

    ReachSet {
        width: grid.width(),
        visited,
        count,
    }
}

/// True when `to` can be reached from `from` over passable cells.
pub fn is_connected(grid: &Grid, from: Coord, to: Coord) -> bool {
    reachable(grid, from, Neighborhood::Four).contains(to)
}

/// A connected component of passable cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: u32,
    /// Cells in discovery order; the first is the top-left-most seed cell.
    pub cells: Vec<Coord>,
}

impl Region {
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn first(&self) -> Option<Coord> {
        self.cells.first().copied()
    }
}

/// Label every 4-connected passable region, scanning row-major so ids are
/// stable for a given grid.
pub fn regions(grid: &Grid) -> Vec<Region> {
    let mut label = vec![u32::MAX; grid.len()];
    let mut out = Vec::new();

    for seed in grid.coords() {
        let Some(si) = grid.index(seed) else { continue };
        if label[si] != u32::MAX || !grid.is_passable(seed) {
            continue;
        }
        let id = out.len() as u32;
        let mut cells = vec![seed];
        let mut queue = VecDeque::from([seed]);
        label[si] = id;
        while let Some(at) = queue.pop_front() {
            for next in grid.neighbors(at, Neighborhood::Four.dirs()) {
                let Some(i) = grid.index(next) else { continue };
                if label[i] == u32::MAX && grid.is_passable(next) {
                    label[i] = id;
                    cells.push(next);
                    queue.push_back(next);
                }
            }
        }
        out.push(Region { id, cells });
    }

    out
}

/// Index of the largest region; ties go to the lower id.
pub fn largest_region(regions: &[Region]) -> Option<usize> {
    regions
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.size().cmp(&b.size()).then(ib.cmp(ia)))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::grid::TerrainType;

    fn grid_from(rows: &[&str]) -> Grid {
        let mut g = Grid::filled(rows[0].len(), rows.len(), TerrainType::Wall);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '.' {
                    g.set_terrain(Coord::new(x as i32, y as i32), TerrainType::Floor);
                }
            }
        }
        g
    }

    #[test]
    fn reachable_stops_at_walls() {
        let g = grid_from(&["..#..", "..#..", "#####"]);
        let r = reachable(&g, Coord::new(0, 0), Neighborhood::Four);
        assert_eq!(r.len(), 4);
        assert!(r.contains(Coord::new(1, 1)));
        assert!(!r.contains(Coord::new(3, 0)));
        assert!(!r.contains(Coord::new(-1, 0)));
    }

    #[test]
    fn diagonal_gaps_only_cross_with_eight() {
        let g = grid_from(&[".#", "#."]);
        assert_eq!(reachable(&g, Coord::new(0, 0), Neighborhood::Four).len(), 1);
        assert_eq!(reachable(&g, Coord::new(0, 0), Neighborhood::Eight).len(), 2);
    }

    #[test]
    fn blocked_start_reaches_nothing() {
        let g = grid_from(&["#."]);
        assert!(reachable(&g, Coord::new(0, 0), Neighborhood::Four).is_empty());
        assert!(!is_connected(&g, Coord::new(0, 0), Coord::new(1, 0)));
    }

    #[test]
    fn regions_are_labelled_in_scan_order() {
        let g = grid_from(&[".#...", ".#...", "###.#", "..#.."]);
        let rs = regions(&g);
        assert_eq!(rs.len(), 3);
        assert_eq!(rs[0].first(), Some(Coord::new(0, 0)));
        assert_eq!(rs[0].size(), 2);
        assert_eq!(rs[1].size(), 9);
        assert_eq!(rs[2].first(), Some(Coord::new(0, 3)));
        assert_eq!(largest_region(&rs), Some(1));
        let total: usize = rs.iter().map(Region::size).sum();
        assert_eq!(total, g.count_passable());
    }
}

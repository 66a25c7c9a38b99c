/// Corridor routing: four styles sharing one contract.
///
/// Every route starts exactly at `from`, ends exactly at `to`, moves one
/// orthogonal step at a time, stays inside the grid, and fits within the
/// length budget or fails with `UnreachableTarget`.

use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::config::CorridorParams;
use crate::schema::grid::{Coord, Grid, TerrainType, DIRS4};
use crate::schema::level::CorridorStyle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorridorError {
    #[error("cannot route from {from:?} to {to:?} within {budget} cells")]
    UnreachableTarget { from: Coord, to: Coord, budget: usize },
}

/// Cell count of the shortest possible corridor between two points.
pub fn ideal_length(from: Coord, to: Coord) -> usize {
    from.manhattan(to) as usize + 1
}

/// Maximum accepted corridor length for a pair of anchors.
pub fn budget_for(params: &CorridorParams, from: Coord, to: Coord) -> usize {
    (ideal_length(from, to) as f64 * params.budget_factor).ceil() as usize + params.budget_slack
}

/// Box a corridor may wander in: the grid interior, widened to include
/// the endpoints if they sit on the border.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: Coord,
    max: Coord,
}

impl Bounds {
    fn new(grid: &Grid, from: Coord, to: Coord) -> Self {
        let w = grid.width() as i32;
        let h = grid.height() as i32;
        let inner_max_x = (w - 2).max(0);
        let inner_max_y = (h - 2).max(0);
        Self {
            min: Coord::new(1.min(from.x).min(to.x).max(0), 1.min(from.y).min(to.y).max(0)),
            max: Coord::new(
                inner_max_x.max(from.x).max(to.x).min(w - 1),
                inner_max_y.max(from.y).max(to.y).min(h - 1),
            ),
        }
    }

    fn contains(&self, at: Coord) -> bool {
        at.x >= self.min.x && at.x <= self.max.x && at.y >= self.min.y && at.y <= self.max.y
    }
}

/// Route a corridor of the given style.
pub fn route<R: Rng>(
    style: CorridorStyle,
    grid: &Grid,
    from: Coord,
    to: Coord,
    params: &CorridorParams,
    rng: &mut R,
) -> Result<Vec<Coord>, CorridorError> {
    let budget = budget_for(params, from, to);
    let unreachable = CorridorError::UnreachableTarget { from, to, budget };
    if !grid.in_bounds(from) || !grid.in_bounds(to) {
        return Err(unreachable);
    }

    let path = match style {
        CorridorStyle::Straight => straight(from, to, rng.gen_bool(0.5)),
        CorridorStyle::Minimal => minimal(grid, from, to),
        CorridorStyle::Windy => windy(grid, from, to, params.max_offset as i32, rng),
        CorridorStyle::Organic => organic(grid, from, to, params, rng).ok_or(unreachable.clone())?,
    };

    if path.len() > budget {
        return Err(unreachable);
    }
    Ok(path)
}

/// Append unit steps from the path's last cell to `target` along one axis.
fn walk_axis(path: &mut Vec<Coord>, horizontal: bool, target: i32) {
    let Some(mut at) = path.last().copied() else { return };
    loop {
        let current = if horizontal { at.x } else { at.y };
        if current == target {
            break;
        }
        let step = (target - current).signum();
        at = if horizontal {
            at.offset(step, 0)
        } else {
            at.offset(0, step)
        };
        path.push(at);
    }
}

/// Single-bend route; no bend when the endpoints share a row or column.
pub fn straight(from: Coord, to: Coord, horizontal_first: bool) -> Vec<Coord> {
    let mut path = vec![from];
    if horizontal_first {
        walk_axis(&mut path, true, to.x);
        walk_axis(&mut path, false, to.y);
    } else {
        walk_axis(&mut path, false, to.y);
        walk_axis(&mut path, true, to.x);
    }
    path
}

/// The single-bend route that carves the fewest new cells.
pub fn minimal(grid: &Grid, from: Coord, to: Coord) -> Vec<Coord> {
    let horizontal = straight(from, to, true);
    let vertical = straight(from, to, false);
    let fresh = |path: &[Coord]| path.iter().filter(|c| !grid.is_passable(**c)).count();
    if fresh(&vertical) < fresh(&horizontal) {
        vertical
    } else {
        horizontal
    }
}

/// Monotonic progress along the major axis in short segments, with a
/// bounded lateral jog between segments.
pub fn windy<R: Rng>(grid: &Grid, from: Coord, to: Coord, max_offset: i32, rng: &mut R) -> Vec<Coord> {
    let bounds = Bounds::new(grid, from, to);
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let horizontal = dx.abs() >= dy.abs();
    let (major_from, major_to) = if horizontal { (from.x, to.x) } else { (from.y, to.y) };
    let (minor_from, minor_to) = if horizontal { (from.y, to.y) } else { (from.x, to.x) };
    let (minor_lo, minor_hi) = if horizontal {
        (bounds.min.y, bounds.max.y)
    } else {
        (bounds.min.x, bounds.max.x)
    };

    let total = (major_to - major_from).abs();
    let sign = (major_to - major_from).signum();
    let mut path = vec![from];
    let mut progressed = 0;

    while progressed < total {
        let segment = rng.gen_range(2..=5).min(total - progressed);
        progressed += segment;
        walk_axis(&mut path, horizontal, major_from + sign * progressed);
        if progressed < total && max_offset > 0 {
            let ideal = minor_from + (minor_to - minor_from) * progressed / total;
            let offset = rng.gen_range(-max_offset..=max_offset);
            let target = (ideal + offset).clamp(minor_lo, minor_hi);
            walk_axis(&mut path, !horizontal, target);
        }
    }
    walk_axis(&mut path, !horizontal, minor_to);
    path
}

/// Step index in `DIRS4` that most reduces the distance to `to`.
fn toward(at: Coord, to: Coord) -> usize {
    let dx = to.x - at.x;
    let dy = to.y - at.y;
    if dx.abs() >= dy.abs() && dx != 0 {
        if dx > 0 {
            1
        } else {
            3
        }
    } else if dy > 0 {
        2
    } else {
        0
    }
}

/// Biased random walk with momentum and periodic correction, loop-erased
/// into a simple path. `None` when the walk cap is hit.
pub fn organic<R: Rng>(
    grid: &Grid,
    from: Coord,
    to: Coord,
    params: &CorridorParams,
    rng: &mut R,
) -> Option<Vec<Coord>> {
    let bounds = Bounds::new(grid, from, to);
    let mut path = vec![from];
    let mut position: FxHashMap<Coord, usize> = FxHashMap::default();
    position.insert(from, 0);
    let mut at = from;
    let mut heading = toward(from, to);
    let interval = params.correction_interval.max(1) as usize;

    for step in 1..=params.max_walk {
        if at == to {
            break;
        }
        let dir = if step % interval == 0 {
            toward(at, to)
        } else if rng.gen_bool(params.momentum) {
            heading
        } else {
            let here = at.manhattan(to);
            let weights: Vec<u32> = DIRS4
                .iter()
                .map(|&(dx, dy)| if at.offset(dx, dy).manhattan(to) < here { 3 } else { 1 })
                .collect();
            match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(rng),
                Err(_) => toward(at, to),
            }
        };

        let (dx, dy) = DIRS4[dir];
        let next = at.offset(dx, dy);
        if !bounds.contains(next) {
            heading = toward(at, to);
            continue;
        }
        heading = dir;

        if let Some(&i) = position.get(&next) {
            for erased in path.drain(i + 1..) {
                position.remove(&erased);
            }
        } else {
            position.insert(next, path.len());
            path.push(next);
        }
        at = next;
    }

    (at == to).then_some(path)
}

/// Mark a routed path passable. Cells that are already passable (room
/// floors, earlier corridors) keep their terrain. Returns the number of
/// newly carved cells.
pub fn carve(grid: &mut Grid, path: &[Coord]) -> usize {
    let mut carved = 0;
    for &at in path {
        if !grid.is_passable(at) && grid.set_terrain(at, TerrainType::Corridor) {
            carved += 1;
        }
    }
    carved
}

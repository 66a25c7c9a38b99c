/// Maze carving by randomized depth-first search with an explicit stack.

use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

use crate::core::config::MazeParams;
use crate::core::error::{check_canceled, GenerationError};
use crate::core::registry::{Draft, Generator};
use crate::core::seed::{SeedManager, Stream};
use crate::core::validate::{self, ValidationResult, Violation};
use crate::schema::content::{Content, ContentType, Maze, LINKS};
use crate::schema::context::{GenerationContext, Stage, MAX_DIMENSION, MIN_DIMENSION};
use crate::schema::grid::{Coord, Grid, TerrainType, DIRS4};

/// Index of the opposite direction in `DIRS4`.
fn opposite(dir: usize) -> usize {
    (dir + 2) % 4
}

struct Carver {
    width: usize,
    height: usize,
    links: Vec<u8>,
}

impl Carver {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            links: vec![0; width * height],
        }
    }

    fn index(&self, cell: Coord) -> Option<usize> {
        if cell.x >= 0 && cell.y >= 0 && (cell.x as usize) < self.width && (cell.y as usize) < self.height {
            Some(cell.y as usize * self.width + cell.x as usize)
        } else {
            None
        }
    }

    fn coord(&self, index: usize) -> Coord {
        Coord::new((index % self.width) as i32, (index / self.width) as i32)
    }

    fn link(&mut self, cell: Coord, dir: usize) {
        let (dx, dy) = DIRS4[dir];
        let next = cell.offset(dx, dy);
        if let (Some(a), Some(b)) = (self.index(cell), self.index(next)) {
            self.links[a] |= LINKS[dir];
            self.links[b] |= LINKS[opposite(dir)];
        }
    }

    fn degree(&self, index: usize) -> u32 {
        self.links[index].count_ones()
    }

    /// Depth-first carving from `start`. The stack holds cell coordinates,
    /// so depth is bounded by the heap, not the call stack.
    fn carve<R: Rng>(&mut self, start: Coord, rng: &mut R) {
        let mut visited = vec![false; self.links.len()];
        let Some(si) = self.index(start) else { return };
        visited[si] = true;
        let mut stack = vec![start];

        while let Some(&cell) = stack.last() {
            let mut options = [0usize; 4];
            let mut count = 0;
            for (dir, &(dx, dy)) in DIRS4.iter().enumerate() {
                if let Some(i) = self.index(cell.offset(dx, dy)) {
                    if !visited[i] {
                        options[count] = dir;
                        count += 1;
                    }
                }
            }
            if count == 0 {
                stack.pop();
                continue;
            }
            let dir = options[rng.gen_range(0..count)];
            let (dx, dy) = DIRS4[dir];
            let next = cell.offset(dx, dy);
            self.link(cell, dir);
            if let Some(i) = self.index(next) {
                visited[i] = true;
            }
            stack.push(next);
        }
    }

    /// Give up to `floor(braid * dead_ends)` dead ends one extra passage.
    /// Returns the number of passages added.
    fn braid<R: Rng>(&mut self, braid: f64, rng: &mut R) -> usize {
        let mut dead_ends: Vec<usize> = (0..self.links.len()).filter(|&i| self.degree(i) == 1).collect();
        let quota = (braid * dead_ends.len() as f64).floor() as usize;
        dead_ends.shuffle(rng);

        let mut added = 0;
        for i in dead_ends {
            if added >= quota {
                break;
            }
            if self.degree(i) != 1 {
                continue;
            }
            let cell = self.coord(i);
            let mut closed: Vec<(usize, bool)> = Vec::new();
            for (dir, &(dx, dy)) in DIRS4.iter().enumerate() {
                if self.links[i] & LINKS[dir] != 0 {
                    continue;
                }
                if let Some(j) = self.index(cell.offset(dx, dy)) {
                    closed.push((dir, self.degree(j) == 1));
                }
            }
            // Prefer joining two dead ends at once.
            let preferred: Vec<usize> = closed.iter().filter(|(_, d)| *d).map(|(dir, _)| *dir).collect();
            let pool: Vec<usize> = if preferred.is_empty() {
                closed.iter().map(|(dir, _)| *dir).collect()
            } else {
                preferred
            };
            if let Some(&dir) = pool.choose(rng) {
                self.link(cell, dir);
                added += 1;
            }
        }
        added
    }

    /// Farthest cell from `start` through carved passages. Ties keep the
    /// lowest row-major index.
    fn farthest_from(&self, start: Coord) -> Coord {
        let mut dist = vec![u32::MAX; self.links.len()];
        let Some(si) = self.index(start) else { return start };
        dist[si] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(cell) = queue.pop_front() {
            let Some(ci) = self.index(cell) else { continue };
            for (dir, &(dx, dy)) in DIRS4.iter().enumerate() {
                if self.links[ci] & LINKS[dir] == 0 {
                    continue;
                }
                let next = cell.offset(dx, dy);
                if let Some(ni) = self.index(next) {
                    if dist[ni] == u32::MAX {
                        dist[ni] = dist[ci] + 1;
                        queue.push_back(next);
                    }
                }
            }
        }
        let mut best = si;
        for (i, &d) in dist.iter().enumerate() {
            if d != u32::MAX && d > dist[best] {
                best = i;
            }
        }
        self.coord(best)
    }

    fn render(&self) -> Grid {
        let mut grid = Grid::filled(self.width * 2 + 1, self.height * 2 + 1, TerrainType::Wall);
        for i in 0..self.links.len() {
            let cell = self.coord(i);
            let at = Maze::cell_to_grid(cell);
            grid.set_terrain(at, TerrainType::Floor);
            if self.links[i] & LINKS[1] != 0 {
                grid.set_terrain(at.offset(1, 0), TerrainType::Floor);
            }
            if self.links[i] & LINKS[2] != 0 {
                grid.set_terrain(at.offset(0, 1), TerrainType::Floor);
            }
        }
        grid
    }
}

/// Carve a `width x height` maze. The entrance is cell (0, 0); the exit is
/// the cell farthest from it.
pub fn carve_maze<R: Rng>(width: usize, height: usize, braid: f64, rng: &mut R) -> Maze {
    let mut carver = Carver::new(width, height);
    let start = Coord::new(rng.gen_range(0..width as i32), rng.gen_range(0..height as i32));
    carver.carve(start, rng);
    if braid > 0.0 {
        carver.braid(braid, rng);
    }
    let entrance = Coord::new(0, 0);
    let exit = carver.farthest_from(entrance);
    let grid = carver.render();
    Maze {
        width,
        height,
        links: carver.links,
        entrance,
        exit,
        grid,
        braid,
    }
}

/// Maze content generator. Context width/height count maze cells.
#[derive(Debug, Clone)]
pub struct MazeGenerator {
    params: MazeParams,
}

impl MazeGenerator {
    pub fn new(params: MazeParams) -> Self {
        Self { params }
    }
}

impl Generator for MazeGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Maze
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError> {
        let max_cells = (MAX_DIMENSION - 1) / 2;
        if ctx.width < MIN_DIMENSION || ctx.height < MIN_DIMENSION {
            return Err(GenerationError::parameter_at(
                ctx,
                Stage::Maze,
                "width/height",
                format!("maze needs at least {0}x{0} cells", MIN_DIMENSION),
            ));
        }
        if ctx.width > max_cells || ctx.height > max_cells {
            return Err(GenerationError::parameter_at(
                ctx,
                Stage::Maze,
                "width/height",
                format!("maze is limited to {0}x{0} cells", max_cells),
            ));
        }
        if !(0.0..=1.0).contains(&self.params.braid) {
            return Err(GenerationError::parameter_at(ctx, Stage::Maze, "braid", "must be within [0, 1]"));
        }
        check_canceled(ctx, Stage::Maze)?;

        let mut rng = SeedManager::new(ctx.seed).stream(Stream::Maze, 0);
        let maze = carve_maze(ctx.width, ctx.height, self.params.braid, &mut rng);
        tracing::debug!(
            seed = ctx.seed,
            passages = maze.passage_count(),
            "maze carved"
        );
        Ok(Draft::new(Content::Maze(maze)))
    }

    fn validate(&self, content: &Content) -> ValidationResult {
        match content {
            Content::Maze(maze) => validate::validate_maze(maze),
            _ => ValidationResult::from_violations(vec![Violation::WrongContent {
                expected: ContentType::Maze,
            }]),
        }
    }
}

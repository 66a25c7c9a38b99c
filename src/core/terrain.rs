/// Cellular-automata terrain with region culling, features and biome bands.

use rand::Rng;

use crate::core::config::{BiomeBand, TerrainParams};
use crate::core::corridor;
use crate::core::error::{check_canceled, GenerationError};
use crate::core::flood::{self, Region};
use crate::core::registry::{Draft, Generator};
use crate::core::seed::{SeedManager, Stream};
use crate::core::validate::{self, Notice, ValidationResult, Violation};
use crate::schema::content::{Content, ContentType, Feature, TerrainMap};
use crate::schema::context::{Biome, GenerationContext, Stage, MAX_DIMENSION, MIN_DIMENSION};
use crate::schema::grid::{Cell, Coord, FeatureKind, Grid, TerrainType, DIRS8};

/// Upper bound on passes for `smooth_until_stable`.
pub const MAX_STABLE_PASSES: u32 = 64;

fn on_border(grid: &Grid, at: Coord) -> bool {
    at.x == 0 || at.y == 0 || at.x as usize == grid.width() - 1 || at.y as usize == grid.height() - 1
}

/// Threshold one uniform draw per cell (row-major) against `density`.
pub fn initial_layout<R: Rng>(
    width: usize,
    height: usize,
    density: f64,
    solid_border: bool,
    rng: &mut R,
) -> Grid {
    let mut grid = Grid::filled(width, height, TerrainType::Floor);
    for i in 0..grid.len() {
        let at = grid.coord_of(i);
        // Draw for every cell so the stream position does not depend on the border flag.
        let value: f64 = rng.gen();
        if value < density || (solid_border && on_border(&grid, at)) {
            grid.set_terrain(at, TerrainType::Wall);
        }
    }
    grid
}

/// Wall cells in the Moore neighbourhood; out-of-bounds counts as wall.
pub fn count_wall_neighbors(grid: &Grid, at: Coord) -> u8 {
    DIRS8
        .iter()
        .filter(|&&(dx, dy)| !grid.is_passable(at.offset(dx, dy)))
        .count() as u8
}

/// One automaton pass.
pub fn step(grid: &Grid, params: &TerrainParams) -> Grid {
    let mut next = grid.clone();
    for i in 0..grid.len() {
        let at = grid.coord_of(i);
        let walls = count_wall_neighbors(grid, at);
        let wall = if grid.is_passable(at) {
            walls >= params.birth_limit
        } else {
            walls >= params.death_limit
        };
        let wall = wall || (params.solid_border && on_border(grid, at));
        next.set_terrain(at, if wall { TerrainType::Wall } else { TerrainType::Floor });
    }
    next
}

/// Apply exactly `iterations` passes.
pub fn smooth(mut grid: Grid, params: &TerrainParams, iterations: u32) -> Grid {
    for _ in 0..iterations {
        grid = step(&grid, params);
    }
    grid
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smoothed {
    pub grid: Grid,
    pub passes: u32,
    /// False when `max_passes` ran out before a fixed point.
    pub converged: bool,
}

/// Run passes until one changes nothing, or `max_passes` is reached.
pub fn smooth_until_stable(mut grid: Grid, params: &TerrainParams, max_passes: u32) -> Smoothed {
    for passes in 0..max_passes {
        let next = step(&grid, params);
        if next == grid {
            return Smoothed {
                grid,
                passes,
                converged: true,
            };
        }
        grid = next;
    }
    Smoothed {
        grid,
        passes: max_passes,
        converged: false,
    }
}

/// Fill every open region smaller than `min_size`. Returns the number filled.
pub fn cull_small_regions(grid: &mut Grid, min_size: usize) -> usize {
    let mut culled = 0;
    for region in flood::regions(grid) {
        if region.size() < min_size {
            for &at in &region.cells {
                grid.set_terrain(at, TerrainType::Wall);
            }
            culled += 1;
        }
    }
    culled
}

/// Join every region to `main` with a minimal corridor from the region's
/// first cell to the nearest main cell. Returns the number of corridors.
pub fn connect_regions(grid: &mut Grid, regions: &[Region], main: usize) -> usize {
    let Some(main_region) = regions.get(main) else { return 0 };
    let mut joined = 0;
    for region in regions.iter().filter(|r| r.id != main_region.id) {
        let Some(from) = region.first() else { continue };
        let Some(&to) = main_region.cells.iter().min_by_key(|c| c.manhattan(from)) else {
            continue;
        };
        let path = corridor::minimal(grid, from, to);
        corridor::carve(grid, &path);
        joined += 1;
    }
    joined
}

fn label_regions(grid: &mut Grid) -> Vec<Region> {
    let regions = flood::regions(grid);
    for region in &regions {
        for &at in &region.cells {
            if let Some(cell) = grid.get_mut(at) {
                cell.metadata.region = Some(region.id);
            }
        }
    }
    regions
}

/// Scatter up to `params.feature_count` features over `candidates` with a
/// minimum Chebyshev spacing, giving up after `feature_attempts` draws.
pub fn place_features<R: Rng>(candidates: &[Coord], params: &TerrainParams, rng: &mut R) -> Vec<Feature> {
    let mut features: Vec<Feature> = Vec::new();
    if candidates.is_empty() {
        return features;
    }
    for _ in 0..params.feature_attempts {
        if features.len() >= params.feature_count as usize {
            break;
        }
        let at = candidates[rng.gen_range(0..candidates.len())];
        let kind = FeatureKind::ALL[rng.gen_range(0..FeatureKind::ALL.len())];
        if features
            .iter()
            .all(|f| f.at.chebyshev(at) >= params.feature_spacing)
        {
            features.push(Feature { kind, at });
        }
    }
    features
}

/// Default bands around the requested biome.
pub fn default_bands(biome: Biome) -> Vec<BiomeBand> {
    vec![
        BiomeBand {
            upper: 0.25,
            biome: biome.wetter(),
        },
        BiomeBand { upper: 0.75, biome },
        BiomeBand {
            upper: 1.0,
            biome: biome.drier(),
        },
    ]
}

fn band_for(bands: &[BiomeBand], value: f64) -> Option<Biome> {
    bands
        .iter()
        .find(|b| value < b.upper)
        .or_else(|| bands.last())
        .map(|b| b.biome)
}

/// Value noise on a coarse lattice, bilinearly interpolated to cell
/// resolution. Output is in `[0, 1)`.
pub struct ValueNoise {
    scale: f64,
    columns: usize,
    lattice: Vec<f64>,
}

impl ValueNoise {
    pub fn new<R: Rng>(width: usize, height: usize, scale: u32, rng: &mut R) -> Self {
        let scale = scale.max(1);
        let columns = width / scale as usize + 2;
        let rows = height / scale as usize + 2;
        let lattice = (0..columns * rows).map(|_| rng.gen::<f64>()).collect();
        Self {
            scale: f64::from(scale),
            columns,
            lattice,
        }
    }

    fn node(&self, x: usize, y: usize) -> f64 {
        self.lattice.get(y * self.columns + x).copied().unwrap_or(0.0)
    }

    pub fn sample(&self, at: Coord) -> f64 {
        let fx = f64::from(at.x.max(0)) / self.scale;
        let fy = f64::from(at.y.max(0)) / self.scale;
        let (x0, y0) = (fx.floor() as usize, fy.floor() as usize);
        let (tx, ty) = (fx.fract(), fy.fract());
        let top = self.node(x0, y0) * (1.0 - tx) + self.node(x0 + 1, y0) * tx;
        let bottom = self.node(x0, y0 + 1) * (1.0 - tx) + self.node(x0 + 1, y0 + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

/// Tag every cell with a biome band and give open floor the biome's
/// ground terrain. Returns the distinct biomes present, in band order.
pub fn assign_biomes(grid: &mut Grid, noise: &ValueNoise, bands: &[BiomeBand]) -> Vec<Biome> {
    let mut seen = vec![false; bands.len()];
    for i in 0..grid.len() {
        let at = grid.coord_of(i);
        let value = noise.sample(at);
        let Some(biome) = band_for(bands, value) else { continue };
        if let Some(slot) = bands.iter().position(|b| b.biome == biome) {
            seen[slot] = true;
        }
        let Some(cell) = grid.get_mut(at) else { continue };
        cell.metadata.biome = Some(biome);
        if cell.terrain == TerrainType::Floor {
            *cell = Cell {
                metadata: cell.metadata,
                ..Cell::new(biome.floor_terrain())
            };
        }
    }
    let mut present: Vec<Biome> = Vec::new();
    for (band, _) in bands.iter().zip(seen).filter(|(_, s)| *s) {
        if !present.contains(&band.biome) {
            present.push(band.biome);
        }
    }
    present
}

/// Terrain content generator.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    params: TerrainParams,
}

impl TerrainGenerator {
    pub fn new(params: TerrainParams) -> Self {
        Self { params }
    }

    fn check_params(&self, ctx: &GenerationContext) -> Result<(), GenerationError> {
        let range = MIN_DIMENSION..=MAX_DIMENSION;
        if !range.contains(&ctx.width) || !range.contains(&ctx.height) {
            return Err(GenerationError::parameter_at(
                ctx,
                Stage::Terrain,
                "width/height",
                format!("terrain must be between {} and {} cells a side", MIN_DIMENSION, MAX_DIMENSION),
            ));
        }
        if !(0.0..=1.0).contains(&self.params.density) {
            return Err(GenerationError::parameter_at(ctx, Stage::Terrain, "density", "must be within [0, 1]"));
        }
        if self.params.birth_limit > 8 || self.params.death_limit > 8 {
            return Err(GenerationError::parameter_at(
                ctx,
                Stage::Terrain,
                "birth_limit/death_limit",
                "must be at most 8",
            ));
        }
        Ok(())
    }
}

impl Generator for TerrainGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Terrain
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError> {
        self.check_params(ctx)?;
        let seeds = SeedManager::new(ctx.seed);
        let p = &self.params;

        check_canceled(ctx, Stage::Terrain)?;
        let mut layout_rng = seeds.stream(Stream::Terrain, 0);
        let grid = initial_layout(ctx.width, ctx.height, p.density, p.solid_border, &mut layout_rng);

        check_canceled(ctx, Stage::Smoothing)?;
        let mut grid = smooth(grid, p, p.iterations);

        check_canceled(ctx, Stage::Regions)?;
        let culled = cull_small_regions(&mut grid, p.min_region_size);
        let mut regions = flood::regions(&grid);
        if p.connect_regions {
            if let Some(main) = flood::largest_region(&regions) {
                connect_regions(&mut grid, &regions, main);
            }
        }
        regions = label_regions(&mut grid);
        let main = flood::largest_region(&regions).and_then(|i| regions.get(i));
        let entrance = main
            .and_then(Region::first)
            .unwrap_or(Coord::new((ctx.width / 2) as i32, (ctx.height / 2) as i32));
        tracing::debug!(
            seed = ctx.seed,
            regions = regions.len(),
            culled,
            "terrain regions resolved"
        );

        check_canceled(ctx, Stage::Features)?;
        let mut notices = Vec::new();
        let candidates: Vec<Coord> = main
            .map(|r| {
                r.cells
                    .iter()
                    .copied()
                    .filter(|&c| c != entrance && grid.get(c).is_some_and(|cell| cell.terrain == TerrainType::Floor))
                    .collect()
            })
            .unwrap_or_default();
        let mut feature_rng = seeds.stream(Stream::Terrain, 2);
        let features = place_features(&candidates, p, &mut feature_rng);
        for feature in &features {
            if let Some(cell) = grid.get_mut(feature.at) {
                cell.metadata.feature = Some(feature.kind);
            }
        }
        if features.len() < p.feature_count as usize {
            notices.push(Notice::FeatureShortfall {
                placed: features.len(),
                requested: p.feature_count as usize,
            });
        }

        check_canceled(ctx, Stage::Biomes)?;
        let bands = p.biome_bands.clone().unwrap_or_else(|| default_bands(ctx.biome));
        let mut biome_rng = seeds.stream(Stream::Terrain, 1);
        let noise = ValueNoise::new(ctx.width, ctx.height, p.biome_scale, &mut biome_rng);
        let biomes = assign_biomes(&mut grid, &noise, &bands);

        let map = TerrainMap {
            grid,
            entrance,
            features,
            biomes,
            min_region_size: p.min_region_size,
            feature_spacing: p.feature_spacing,
        };
        Ok(Draft::new(Content::Terrain(map)).with_notices(notices))
    }

    fn validate(&self, content: &Content) -> ValidationResult {
        match content {
            Content::Terrain(map) => validate::validate_terrain(map),
            _ => ValidationResult::from_violations(vec![Violation::WrongContent {
                expected: ContentType::Terrain,
            }]),
        }
    }
}

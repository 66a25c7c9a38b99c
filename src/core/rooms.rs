/// Room placement and corridor connection.
///
/// Rooms draw from the rooms stream; corridor `i` draws from the corridors
/// stream at index `i`, so a change in one corridor's routing never shifts
/// the randomness of the others.

use rand::Rng;

use crate::core::config::{CorridorParams, RoomParams};
use crate::core::corridor::{self, CorridorError};
use crate::core::error::{check_canceled, GenerationError};
use crate::core::registry::{Draft, Generator};
use crate::core::seed::{SeedManager, Stream};
use crate::core::validate::{self, LevelRules, Notice, ValidationResult, Violation};
use crate::schema::content::{Content, ContentType};
use crate::schema::context::{Difficulty, GenerationContext, Stage, MAX_DIMENSION};
use crate::schema::grid::{Coord, Grid, TerrainType};
use crate::schema::level::{Corridor, CorridorStyle, Level, Rect, Room, RoomId};

/// Rooms requested for a difficulty: harder levels get more rooms.
pub fn target_room_count(params: &RoomParams, difficulty: Difficulty) -> usize {
    let min = params.min_rooms.max(1);
    let max = params.max_rooms.max(min);
    let span = f64::from(max - min) * (0.5 + difficulty.fraction() / 2.0);
    (min + span.round() as u32) as usize
}

/// Place up to `target` non-overlapping rooms, each at least one cell from
/// the border and from every other room.
pub fn place_rooms<R: Rng>(
    width: usize,
    height: usize,
    params: &RoomParams,
    target: usize,
    rng: &mut R,
) -> Vec<Room> {
    let mut rooms: Vec<Room> = Vec::new();
    let (w, h) = (width as i32, height as i32);
    let min = params.min_size as i32;
    let max_w = (params.max_size as i32).min(w - 2);
    let max_h = (params.max_size as i32).min(h - 2);
    if max_w < min || max_h < min {
        return rooms;
    }

    for _ in 0..params.placement_attempts {
        if rooms.len() >= target {
            break;
        }
        let rw = rng.gen_range(min..=max_w);
        let rh = rng.gen_range(min..=max_h);
        let x = rng.gen_range(1..=w - rw - 1);
        let y = rng.gen_range(1..=h - rh - 1);
        let bounds = Rect::new(x, y, rw, rh);
        if rooms.iter().any(|r| r.bounds.intersects(&bounds, 1)) {
            continue;
        }
        rooms.push(Room::new(RoomId(rooms.len() as u32), bounds));
    }
    rooms
}

/// Prim-style spanning tree over room centres by Manhattan distance, grown
/// from room 0. Ties keep the lowest `(a, b)` pair.
pub fn spanning_edges(rooms: &[Room]) -> Vec<(usize, usize)> {
    let mut edges = Vec::new();
    if rooms.is_empty() {
        return edges;
    }
    let mut in_tree = vec![false; rooms.len()];
    in_tree[0] = true;
    for _ in 1..rooms.len() {
        let mut best: Option<(u32, usize, usize)> = None;
        for a in (0..rooms.len()).filter(|&a| in_tree[a]) {
            for b in (0..rooms.len()).filter(|&b| !in_tree[b]) {
                let d = rooms[a].bounds.center().manhattan(rooms[b].bounds.center());
                if best.map_or(true, |(bd, _, _)| d < bd) {
                    best = Some((d, a, b));
                }
            }
        }
        let Some((_, a, b)) = best else { break };
        in_tree[b] = true;
        edges.push((a, b));
    }
    edges
}

/// Up to `count` extra edges not already in `edges`, chosen at random.
pub fn extra_edges<R: Rng>(
    rooms: &[Room],
    edges: &[(usize, usize)],
    count: u32,
    rng: &mut R,
) -> Vec<(usize, usize)> {
    let linked = |a: usize, b: usize, list: &[(usize, usize)]| {
        list.iter()
            .any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b))
    };
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for a in 0..rooms.len() {
        for b in a + 1..rooms.len() {
            if !linked(a, b, edges) {
                candidates.push((a, b));
            }
        }
    }
    let mut extra = Vec::new();
    for _ in 0..count {
        if candidates.is_empty() {
            break;
        }
        extra.push(candidates.remove(rng.gen_range(0..candidates.len())));
    }
    extra
}

fn carve_room(grid: &mut Grid, room: &Room) {
    for at in room.bounds.cells() {
        grid.set_terrain(at, TerrainType::Floor);
        if let Some(cell) = grid.get_mut(at) {
            cell.metadata.room = Some(room.id);
        }
    }
}

/// Turn the carved corridor cells just outside either room into doors.
fn mark_doors(grid: &mut Grid, path: &[Coord], from: &Room, to: &Room) {
    let exit = path.iter().find(|&&c| !from.bounds.contains(c));
    let entry = path.iter().rev().find(|&&c| !to.bounds.contains(c));
    for &at in exit.into_iter().chain(entry) {
        if grid.get(at).is_some_and(|c| c.terrain == TerrainType::Corridor) {
            grid.set_terrain(at, TerrainType::Door);
        }
    }
}

/// Route one corridor, falling back to minimal for the wandering styles.
fn route_with_fallback<R: Rng>(
    style: CorridorStyle,
    grid: &Grid,
    from: Coord,
    to: Coord,
    params: &CorridorParams,
    rng: &mut R,
) -> Result<(Vec<Coord>, CorridorStyle), CorridorError> {
    match corridor::route(style, grid, from, to, params, rng) {
        Ok(path) => Ok((path, style)),
        Err(err) if matches!(style, CorridorStyle::Windy | CorridorStyle::Organic) => {
            tracing::warn!(style = style.name(), %err, "corridor falling back to minimal");
            let path = corridor::route(CorridorStyle::Minimal, grid, from, to, params, rng)?;
            Ok((path, CorridorStyle::Minimal))
        }
        Err(err) => Err(err),
    }
}

/// Place rooms, connect them and pick the entrance and exit.
pub fn build_level(
    ctx: &GenerationContext,
    rooms_params: &RoomParams,
    corridor_params: &CorridorParams,
) -> Result<(Level, Vec<Notice>), GenerationError> {
    let seeds = SeedManager::new(ctx.seed);
    let mut notices = Vec::new();

    check_canceled(ctx, Stage::Rooms)?;
    let target = target_room_count(rooms_params, ctx.difficulty);
    let mut room_rng = seeds.stream(Stream::Rooms, 0);
    let rooms = place_rooms(ctx.width, ctx.height, rooms_params, target, &mut room_rng);
    if rooms.len() < target {
        notices.push(Notice::RoomShortfall {
            placed: rooms.len(),
            requested: target,
        });
    }
    let mut grid = Grid::filled(ctx.width, ctx.height, TerrainType::Wall);
    for room in &rooms {
        carve_room(&mut grid, room);
    }
    let mut edges = spanning_edges(&rooms);
    let extra = extra_edges(&rooms, &edges, rooms_params.extra_connections, &mut room_rng);
    edges.extend(extra);

    check_canceled(ctx, Stage::Corridors)?;
    let mut corridors = Vec::with_capacity(edges.len());
    for (index, &(a, b)) in edges.iter().enumerate() {
        let (from_room, to_room) = (&rooms[a], &rooms[b]);
        let (from, to) = from_room.closest_anchors(to_room);
        let mut rng = seeds.stream(Stream::Corridors, index as u64);
        let (path, style) = route_with_fallback(rooms_params.style, &grid, from, to, corridor_params, &mut rng)
            .map_err(|err| GenerationError::unreachable(ctx, Stage::Corridors, err))?;
        if style != rooms_params.style {
            notices.push(Notice::CorridorFallback {
                from: from_room.id,
                to: to_room.id,
                style: rooms_params.style,
            });
        }
        let ideal = corridor::ideal_length(from, to);
        if path.len() as f64 > ideal as f64 * corridor_params.long_corridor_ratio {
            notices.push(Notice::LongCorridor {
                from: from_room.id,
                to: to_room.id,
                length: path.len(),
                ideal,
            });
        }
        corridor::carve(&mut grid, &path);
        mark_doors(&mut grid, &path, from_room, to_room);
        corridors.push(Corridor {
            from: from_room.id,
            to: to_room.id,
            style,
            path,
        });
    }

    let entrance = rooms
        .first()
        .map(|r| r.bounds.center())
        .unwrap_or(Coord::new((ctx.width / 2) as i32, (ctx.height / 2) as i32));
    let exit = rooms
        .iter()
        .map(|r| r.bounds.center())
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.manhattan(entrance).cmp(&b.manhattan(entrance)).then(ib.cmp(ia)))
        .map(|(_, c)| c)
        .unwrap_or(entrance);

    tracing::debug!(
        seed = ctx.seed,
        rooms = rooms.len(),
        corridors = corridors.len(),
        "level laid out"
    );
    let level = Level {
        grid,
        rooms,
        corridors,
        entrance,
        exit,
        objectives: Vec::new(),
        items: Vec::new(),
    };
    Ok((level, notices))
}

/// Most rooms of `min_size` that fit with a one-cell margin and gap.
pub fn room_capacity(width: usize, height: usize, min_size: u32) -> usize {
    let pitch = min_size as usize + 1;
    (width.saturating_sub(1) / pitch) * (height.saturating_sub(1) / pitch)
}

/// Shared parameter checks for every room-based generator.
pub fn check_level_params(ctx: &GenerationContext, params: &RoomParams) -> Result<(), GenerationError> {
    let invalid = |name: &'static str, reason: String| {
        GenerationError::parameter_at(ctx, Stage::Rooms, name, reason)
    };
    if params.min_size == 0 || params.min_size > params.max_size {
        return Err(invalid("min_size", "must be between 1 and max_size".to_string()));
    }
    let needed = params.min_size as usize + 2;
    if ctx.width < needed || ctx.height < needed {
        return Err(invalid(
            "width/height",
            format!("a {0}x{0} room needs at least {1}x{1} cells", params.min_size, needed),
        ));
    }
    if ctx.width > MAX_DIMENSION || ctx.height > MAX_DIMENSION {
        return Err(invalid(
            "width/height",
            format!("levels are limited to {0}x{0} cells", MAX_DIMENSION),
        ));
    }
    let capacity = room_capacity(ctx.width, ctx.height, params.min_size);
    let wanted = params.min_rooms.max(1) as usize;
    if capacity < wanted {
        return Err(invalid(
            "width/height",
            format!(
                "{}x{} holds at most {} room(s) of size {}, {} required",
                ctx.width, ctx.height, capacity, params.min_size, wanted
            ),
        ));
    }
    Ok(())
}

/// Rooms-and-corridors level generator.
#[derive(Debug, Clone)]
pub struct RoomGenerator {
    rooms: RoomParams,
    corridors: CorridorParams,
}

impl RoomGenerator {
    pub fn new(rooms: RoomParams, corridors: CorridorParams) -> Self {
        Self { rooms, corridors }
    }
}

impl Generator for RoomGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Room
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError> {
        check_level_params(ctx, &self.rooms)?;
        let (level, notices) = build_level(ctx, &self.rooms, &self.corridors)?;
        Ok(Draft::new(Content::Level(level)).with_notices(notices))
    }

    fn validate(&self, content: &Content) -> ValidationResult {
        match content {
            Content::Level(level) => validate::validate_level(
                level,
                &LevelRules {
                    min_rooms: self.rooms.min_rooms as usize,
                    require_objectives: false,
                },
            ),
            _ => ValidationResult::from_violations(vec![Violation::WrongContent {
                expected: ContentType::Room,
            }]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flood;
    use crate::core::seed::StageRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn level(seed: u64, style: CorridorStyle) -> (Level, Vec<Notice>) {
        let ctx = GenerationContext::new(seed, 60, 40);
        let params = RoomParams {
            style,
            ..RoomParams::default()
        };
        build_level(&ctx, &params, &CorridorParams::default()).unwrap()
    }

    #[test]
    fn rooms_keep_margin_and_gap() {
        let mut rng = StageRng::seed_from_u64(2);
        let rooms = place_rooms(50, 30, &RoomParams::default(), 12, &mut rng);
        assert!(rooms.len() >= 2);
        for (i, a) in rooms.iter().enumerate() {
            assert!(a.bounds.x >= 1 && a.bounds.y >= 1);
            assert!(a.bounds.x + a.bounds.width <= 49);
            assert!(a.bounds.y + a.bounds.height <= 29);
            for b in &rooms[i + 1..] {
                assert!(!a.bounds.intersects(&b.bounds, 1));
            }
        }
    }

    #[test]
    fn spanning_tree_touches_every_room() {
        let mut rng = StageRng::seed_from_u64(4);
        let rooms = place_rooms(60, 40, &RoomParams::default(), 8, &mut rng);
        let edges = spanning_edges(&rooms);
        assert_eq!(edges.len(), rooms.len() - 1);
        let mut seen = vec![false; rooms.len()];
        seen[0] = true;
        for (a, b) in edges {
            assert!(seen[a]);
            seen[b] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[rstest]
    #[case(CorridorStyle::Straight)]
    #[case(CorridorStyle::Minimal)]
    #[case(CorridorStyle::Windy)]
    #[case(CorridorStyle::Organic)]
    fn every_style_yields_a_connected_level(#[case] style: CorridorStyle) {
        for seed in 0..5 {
            let (level, _) = level(seed, style);
            let reach = flood::reachable(&level.grid, level.entrance, Default::default());
            for room in &level.rooms {
                assert!(reach.contains(room.bounds.center()), "seed {} room {:?}", seed, room.id);
            }
            for corridor in &level.corridors {
                let from = level.room(corridor.from).unwrap();
                let to = level.room(corridor.to).unwrap();
                assert!(from.bounds.contains(corridor.start().unwrap()));
                assert!(to.bounds.contains(corridor.end().unwrap()));
                assert!(corridor.path.iter().all(|c| level.grid.in_bounds(*c)));
            }
            let result = validate::validate_level(&level, &LevelRules::default());
            assert!(result.ok, "seed {}: {:?}", seed, result.violations);
        }
    }

    #[test]
    fn room_cells_carry_their_id() {
        let (level, _) = level(9, CorridorStyle::Straight);
        for room in &level.rooms {
            for at in room.bounds.cells() {
                assert_eq!(level.grid.get(at).unwrap().metadata.room, Some(room.id));
            }
        }
    }

    #[test]
    fn layout_is_deterministic() {
        assert_eq!(level(13, CorridorStyle::Windy), level(13, CorridorStyle::Windy));
    }

    #[test]
    fn harder_levels_request_more_rooms() {
        let params = RoomParams::default();
        assert!(target_room_count(&params, Difficulty(10)) > target_room_count(&params, Difficulty(1)));
        assert!(target_room_count(&params, Difficulty(10)) <= params.max_rooms as usize);
    }

    #[test]
    fn tiny_grid_is_rejected() {
        let ctx = GenerationContext::new(1, 4, 4);
        let err = RoomGenerator::new(RoomParams::default(), CorridorParams::default())
            .generate(&ctx)
            .unwrap_err();
        assert!(matches!(err, GenerationError::Parameter { .. }));
    }

    #[test]
    fn grid_too_small_for_min_rooms_is_rejected() {
        let params = RoomParams::default();
        assert_eq!(room_capacity(5, 5, params.min_size), 1);
        assert_eq!(room_capacity(9, 5, params.min_size), 2);

        let ctx = GenerationContext::new(6, 5, 5);
        match check_level_params(&ctx, &params).unwrap_err() {
            GenerationError::Parameter { context, name, .. } => {
                assert_eq!(name, "width/height");
                assert_eq!((context.seed, context.stage), (6, Stage::Rooms));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(check_level_params(&GenerationContext::new(6, 9, 5), &params).is_ok());
    }

    #[test]
    fn tight_budget_falls_back_to_minimal() {
        let params = RoomParams {
            style: CorridorStyle::Windy,
            ..RoomParams::default()
        };
        let corridors = CorridorParams {
            budget_factor: 1.0,
            budget_slack: 0,
            ..CorridorParams::default()
        };
        let mut fallbacks = 0;
        for seed in 0..8 {
            let ctx = GenerationContext::new(seed, 60, 40);
            let (level, notices) = build_level(&ctx, &params, &corridors).unwrap();
            let noticed = notices
                .iter()
                .filter(|n| matches!(n, Notice::CorridorFallback { style: CorridorStyle::Windy, .. }))
                .count();
            let minimal = level
                .corridors
                .iter()
                .filter(|c| c.style == CorridorStyle::Minimal)
                .count();
            assert_eq!(noticed, minimal, "seed {}", seed);
            for corridor in &level.corridors {
                assert!(matches!(corridor.style, CorridorStyle::Windy | CorridorStyle::Minimal));
                let (from, to) = (corridor.start().unwrap(), corridor.end().unwrap());
                assert!(corridor.path.len() <= corridor::budget_for(&corridors, from, to));
            }
            let result = validate::validate_level(&level, &LevelRules::default());
            assert!(result.ok, "seed {}: {:?}", seed, result.violations);
            fallbacks += noticed;
        }
        assert!(fallbacks > 0);
    }

    #[test]
    fn long_corridors_raise_notices() {
        let ctx = GenerationContext::new(3, 60, 40);
        let strict = CorridorParams {
            long_corridor_ratio: 0.5,
            ..CorridorParams::default()
        };
        let (level, notices) = build_level(&ctx, &RoomParams::default(), &strict).unwrap();
        let long = notices
            .iter()
            .filter(|n| matches!(n, Notice::LongCorridor { .. }))
            .count();
        assert!(!level.corridors.is_empty());
        assert_eq!(long, level.corridors.len());

        let (_, notices) = build_level(&ctx, &RoomParams::default(), &CorridorParams::default()).unwrap();
        assert!(!notices.iter().any(|n| matches!(n, Notice::LongCorridor { .. })));
    }
}

/// Pipeline integration tests: end-to-end requests through `LevelEngine`.

use dungeon_forge::core::flood;
use dungeon_forge::core::pathfind::Neighborhood;
use dungeon_forge::core::registry::{Draft, Generator};
use dungeon_forge::core::validate::{self, LevelRules, ValidationResult, Violation};
use dungeon_forge::schema::grid::{Coord, Grid, TerrainType};
use dungeon_forge::schema::level::{Level, Objective, Rect, Room, RoomId};
use dungeon_forge::{
    CancelToken, Content, ContentType, GenerationConfig, GenerationContext, GenerationError,
    GenerationState, LevelAssembler, LevelEngine, TileAssembler,
};
use rstest::rstest;

const FIXTURE: &str = include_str!("fixtures/generation.ron");

fn engine() -> LevelEngine {
    LevelEngine::builder().config_ron(FIXTURE).build().unwrap()
}

#[test]
fn fixture_config_parses() {
    let config = GenerationConfig::parse_ron(FIXTURE).unwrap();
    assert_eq!(config.rooms.max_rooms, 9);
    assert_eq!(config.maze.braid, 0.2);
    assert_eq!(config.terrain.birth_limit, 5);
}

#[rstest]
#[case(ContentType::Terrain, 64, 48)]
#[case(ContentType::Maze, 20, 15)]
#[case(ContentType::Room, 64, 48)]
#[case(ContentType::Quest, 64, 48)]
#[case(ContentType::Item, 64, 48)]
fn identical_requests_serialize_identically(
    #[case] content_type: ContentType,
    #[case] width: usize,
    #[case] height: usize,
) {
    let engine = engine();
    let ctx = GenerationContext::new(1234, width, height).with_difficulty(6);
    let a = engine.generate(content_type, &ctx).unwrap();
    let b = engine.generate(content_type, &ctx).unwrap();
    assert_eq!(
        ron::to_string(&a.content).unwrap(),
        ron::to_string(&b.content).unwrap()
    );
    assert_eq!(a.attempts, b.attempts);
    assert_eq!(a.seed, b.seed);
}

#[test]
fn different_seeds_differ() {
    let engine = engine();
    let a = engine
        .generate(ContentType::Room, &GenerationContext::new(1, 64, 48))
        .unwrap();
    let b = engine
        .generate(ContentType::Room, &GenerationContext::new(2, 64, 48))
        .unwrap();
    assert_ne!(a.content, b.content);
}

#[test]
fn done_levels_are_fully_connected() {
    let engine = engine();
    for seed in 0..20 {
        let ctx = GenerationContext::new(seed, 64, 48).with_difficulty(8);
        let generated = engine.generate(ContentType::Quest, &ctx).unwrap();
        assert!(generated.validation.ok);
        let level = generated.content.as_level().unwrap();
        let reach = flood::reachable(&level.grid, level.entrance, Neighborhood::Four);
        assert!(reach.contains(level.exit), "seed {}", seed);
        for room in &level.rooms {
            assert!(room.bounds.cells().all(|c| reach.contains(c)), "seed {} room {:?}", seed, room.id);
        }
        for objective in &level.objectives {
            assert!(reach.contains(objective.at), "seed {} objective {}", seed, objective.id);
        }
    }
}

#[test]
fn reported_seed_reproduces_content() {
    let engine = engine();
    let ctx = GenerationContext::new(99, 40, 30);
    let first = engine.generate(ContentType::Terrain, &ctx).unwrap();
    let again = engine
        .generate(ContentType::Terrain, &ctx.reseeded(first.seed))
        .unwrap();
    assert_eq!(again.attempts, 1);
    assert_eq!(first.content, again.content);
}

/// Two rooms, no corridor, and the objective in the second room.
struct DisconnectedQuest;

impl Generator for DisconnectedQuest {
    fn content_type(&self) -> ContentType {
        ContentType::Custom("disconnected")
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError> {
        let mut grid = Grid::filled(ctx.width, ctx.height, TerrainType::Wall);
        let rooms = vec![
            Room::new(RoomId(0), Rect::new(1, 1, 4, 4)),
            Room::new(RoomId(1), Rect::new(10, 1, 4, 4)),
        ];
        for room in &rooms {
            for at in room.bounds.cells() {
                grid.set_terrain(at, TerrainType::Floor);
            }
        }
        let level = Level {
            grid,
            entrance: rooms[0].bounds.center(),
            exit: rooms[0].bounds.center(),
            rooms,
            corridors: Vec::new(),
            objectives: vec![Objective {
                id: "quest-relic".to_string(),
                at: Coord::new(11, 2),
                required: true,
            }],
            items: Vec::new(),
        };
        Ok(Draft::new(Content::Level(level)))
    }

    fn validate(&self, content: &Content) -> ValidationResult {
        match content.as_level() {
            Some(level) => validate::validate_level(level, &LevelRules::default()),
            None => ValidationResult::from_violations(vec![Violation::WrongContent {
                expected: ContentType::Room,
            }]),
        }
    }
}

#[test]
fn unreachable_objective_fails_with_its_id() {
    let engine = LevelEngine::builder()
        .max_retries(2)
        .register(ContentType::Custom("disconnected"), |_: &GenerationConfig| {
            Box::new(DisconnectedQuest) as Box<dyn Generator>
        })
        .build()
        .unwrap();
    let ctx = GenerationContext::new(5, 16, 8);
    let err = engine
        .generate(ContentType::Custom("disconnected"), &ctx)
        .unwrap_err();
    match &err {
        GenerationError::ValidationFailed {
            root_seed, attempts, ..
        } => {
            assert_eq!(*root_seed, 5);
            assert_eq!(*attempts, 3);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.violations().contains(&Violation::UnreachableObjective {
        id: "quest-relic".to_string()
    }));
    assert!(err.to_string().contains("quest-relic"), "{}", err);
    assert!(err.to_string().contains("request seed 5"), "{}", err);
}

#[test]
fn cancellation_ends_in_failure() {
    let engine = engine();
    let token = CancelToken::new();
    let ctx = GenerationContext::new(8, 64, 48).with_cancel(token.clone());
    token.cancel();
    for content_type in [ContentType::Terrain, ContentType::Maze, ContentType::Quest] {
        let err = engine.generate(content_type, &ctx).unwrap_err();
        assert!(matches!(err, GenerationError::Canceled { .. }), "{}", err);
    }
}

#[test]
fn concurrent_requests_match_sequential_ones() {
    let engine = engine();
    let seeds: Vec<u64> = (100..108).collect();
    let sequential: Vec<Content> = seeds
        .iter()
        .map(|&s| {
            engine
                .generate(ContentType::Room, &GenerationContext::new(s, 64, 48))
                .unwrap()
                .content
        })
        .collect();

    let concurrent: Vec<Content> = std::thread::scope(|scope| {
        let handles: Vec<_> = seeds
            .iter()
            .map(|&s| {
                let engine = &engine;
                scope.spawn(move || {
                    engine
                        .generate(ContentType::Room, &GenerationContext::new(s, 64, 48))
                        .unwrap()
                        .content
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(sequential, concurrent);
}

#[test]
fn assembly_follows_validation() {
    let engine = engine();
    let ctx = GenerationContext::new(31, 64, 48).with_difficulty(2);
    let (generated, fragment) = engine
        .generate_and_assemble(ContentType::Item, &ctx, &TileAssembler)
        .unwrap();
    assert_eq!(generated.history.last(), Some(&GenerationState::Done));
    assert_eq!(fragment.width, 64);
    assert_eq!(fragment.tiles.len(), 64 * 48);
    assert_eq!(fragment.spawn, generated.content.entrance());
    let level = generated.content.as_level().unwrap();
    assert_eq!(fragment.markers.len(), 1 + level.objectives.len() + level.items.len());
    assert_eq!(
        TileAssembler.assemble_level(&generated.content).unwrap(),
        fragment
    );
}

#[test]
fn notices_surface_in_the_report() {
    let engine = LevelEngine::builder()
        .config_ron("(rooms: (max_rooms: 30, min_rooms: 2, placement_attempts: 5))")
        .build()
        .unwrap();
    let ctx = GenerationContext::new(4, 40, 30).with_difficulty(10);
    let generated = engine.generate(ContentType::Room, &ctx).unwrap();
    assert!(generated.validation.ok);
    assert!(!generated.validation.notices.is_empty());
}

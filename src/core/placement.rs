/// Quest objectives and item spawns layered on a room level.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::config::GenerationConfig;
use crate::core::error::{check_canceled, GenerationError};
use crate::core::flood;
use crate::core::pathfind::Neighborhood;
use crate::core::registry::{Draft, Generator};
use crate::core::rooms::{build_level, check_level_params};
use crate::core::seed::{SeedManager, Stream};
use crate::core::validate::{self, LevelRules, Notice, ValidationResult, Violation};
use crate::schema::content::{Content, ContentType};
use crate::schema::context::{Difficulty, GenerationContext, Stage};
use crate::schema::grid::Coord;
use crate::schema::level::{ItemKind, ItemSpawn, Level, Objective};

/// Id of the last, hardest objective.
pub const BOSS_OBJECTIVE: &str = "quest-boss";

/// `base + difficulty / step` objectives.
pub fn objective_count(config: &GenerationConfig, difficulty: Difficulty) -> usize {
    let step = config.quest.difficulty_step.max(1);
    config.quest.base_objectives as usize + usize::from(difficulty.0 / step)
}

/// Put objectives in distinct rooms other than the entrance room. The
/// farthest chosen room gets the boss objective.
pub fn place_objectives<R: Rng>(level: &Level, count: usize, rng: &mut R) -> Vec<Objective> {
    let mut rooms: Vec<_> = level
        .rooms
        .iter()
        .filter(|r| !r.bounds.contains(level.entrance))
        .collect();
    rooms.shuffle(rng);
    rooms.truncate(count);
    rooms.sort_by_key(|r| (r.bounds.center().manhattan(level.entrance), r.id));

    let last = rooms.len().saturating_sub(1);
    rooms
        .iter()
        .enumerate()
        .map(|(i, room)| {
            let b = room.bounds;
            let at = Coord::new(
                rng.gen_range(b.x..b.x + b.width),
                rng.gen_range(b.y..b.y + b.height),
            );
            let id = if i == last {
                BOSS_OBJECTIVE.to_string()
            } else {
                format!("quest-{}", i + 1)
            };
            Objective {
                id,
                at,
                required: true,
            }
        })
        .collect()
}

/// Items at difficulty 1 is `max_items`, falling to `min_items` at the top.
pub fn item_count(config: &GenerationConfig, difficulty: Difficulty) -> usize {
    let (max, min) = (config.items.max_items, config.items.min_items.min(config.items.max_items));
    let drop = (f64::from(max - min) * difficulty.fraction()).round() as u32;
    (max - drop) as usize
}

/// Scatter items on reachable room floor away from the entrance, exit and
/// objectives, keeping `spacing` (Chebyshev) between items.
pub fn place_items<R: Rng>(level: &Level, count: usize, spacing: u32, rng: &mut R) -> Vec<ItemSpawn> {
    let reach = flood::reachable(&level.grid, level.entrance, Neighborhood::Four);
    let candidates: Vec<Coord> = level
        .rooms
        .iter()
        .flat_map(|r| r.bounds.cells())
        .filter(|&c| {
            reach.contains(c)
                && c != level.entrance
                && c != level.exit
                && level.objectives.iter().all(|o| o.at != c)
        })
        .collect();

    let mut items: Vec<ItemSpawn> = Vec::new();
    if candidates.is_empty() {
        return items;
    }
    for _ in 0..count * 20 {
        if items.len() >= count {
            break;
        }
        let at = candidates[rng.gen_range(0..candidates.len())];
        let kind = ItemKind::ALL[rng.gen_range(0..ItemKind::ALL.len())];
        if items.iter().all(|i| i.at.chebyshev(at) >= spacing.max(1)) {
            items.push(ItemSpawn {
                id: format!("item-{}", items.len() + 1),
                kind,
                at,
            });
        }
    }
    items
}

fn wrong_content() -> ValidationResult {
    ValidationResult::from_violations(vec![Violation::WrongContent {
        expected: ContentType::Room,
    }])
}

/// Room level plus quest objectives.
#[derive(Debug, Clone)]
pub struct QuestGenerator {
    config: GenerationConfig,
}

impl QuestGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }
}

impl Generator for QuestGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Quest
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError> {
        check_level_params(ctx, &self.config.rooms)?;
        let (mut level, notices) = build_level(ctx, &self.config.rooms, &self.config.corridors)?;

        check_canceled(ctx, Stage::Objectives)?;
        let mut rng = SeedManager::new(ctx.seed).stream(Stream::Quest, 0);
        let count = objective_count(&self.config, ctx.difficulty);
        level.objectives = place_objectives(&level, count, &mut rng);
        tracing::debug!(
            seed = ctx.seed,
            requested = count,
            placed = level.objectives.len(),
            "objectives placed"
        );
        Ok(Draft::new(Content::Level(level)).with_notices(notices))
    }

    fn validate(&self, content: &Content) -> ValidationResult {
        match content {
            Content::Level(level) => validate::validate_level(
                level,
                &LevelRules {
                    min_rooms: self.config.rooms.min_rooms as usize,
                    require_objectives: true,
                },
            ),
            _ => wrong_content(),
        }
    }
}

/// Room level plus item spawns.
#[derive(Debug, Clone)]
pub struct ItemGenerator {
    config: GenerationConfig,
}

impl ItemGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }
}

impl Generator for ItemGenerator {
    fn content_type(&self) -> ContentType {
        ContentType::Item
    }

    fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError> {
        check_level_params(ctx, &self.config.rooms)?;
        let (mut level, mut notices) = build_level(ctx, &self.config.rooms, &self.config.corridors)?;

        check_canceled(ctx, Stage::Items)?;
        let mut rng = SeedManager::new(ctx.seed).stream(Stream::Items, 0);
        let count = item_count(&self.config, ctx.difficulty);
        level.items = place_items(&level, count, self.config.items.spacing, &mut rng);
        if level.items.len() < count {
            notices.push(Notice::ItemShortfall {
                placed: level.items.len(),
                requested: count,
            });
        }
        Ok(Draft::new(Content::Level(level)).with_notices(notices))
    }

    fn validate(&self, content: &Content) -> ValidationResult {
        match content {
            Content::Level(level) => validate::validate_level(
                level,
                &LevelRules {
                    min_rooms: self.config.rooms.min_rooms as usize,
                    require_objectives: false,
                },
            ),
            _ => wrong_content(),
        }
    }
}

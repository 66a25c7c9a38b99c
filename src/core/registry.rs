/// Generator trait and the content-type registry.

use rustc_hash::FxHashMap;

use crate::core::config::GenerationConfig;
use crate::core::error::GenerationError;
use crate::core::maze::MazeGenerator;
use crate::core::placement::{ItemGenerator, QuestGenerator};
use crate::core::rooms::RoomGenerator;
use crate::core::terrain::TerrainGenerator;
use crate::core::validate::{Notice, ValidationResult};
use crate::schema::content::{Content, ContentType};
use crate::schema::context::GenerationContext;

/// Generated content plus the notices raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub content: Content,
    pub notices: Vec<Notice>,
}

impl Draft {
    pub fn new(content: Content) -> Self {
        Self {
            content,
            notices: Vec::new(),
        }
    }

    pub fn with_notices(mut self, notices: Vec<Notice>) -> Self {
        self.notices.extend(notices);
        self
    }
}

/// A content generator.
///
/// `generate` must be a pure function of the context: the same context
/// always yields the same draft. Generators hold only configuration, so
/// one instance may serve any number of concurrent requests.
pub trait Generator: Send + Sync {
    fn content_type(&self) -> ContentType;

    fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError>;

    /// Structural checks for content this generator produced.
    fn validate(&self, content: &Content) -> ValidationResult;
}

/// Builds a generator from the engine's configuration.
pub type GeneratorFactory = Box<dyn Fn(&GenerationConfig) -> Box<dyn Generator> + Send + Sync>;

/// Maps content types to generator factories.
pub struct GeneratorRegistry {
    factories: FxHashMap<ContentType, GeneratorFactory>,
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl GeneratorRegistry {
    /// A registry with no generators.
    pub fn new() -> Self {
        Self {
            factories: FxHashMap::default(),
        }
    }

    /// A registry holding the built-in terrain, maze, room, quest and item
    /// generators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ContentType::Terrain, |c: &GenerationConfig| {
            Box::new(TerrainGenerator::new(c.terrain.clone())) as Box<dyn Generator>
        });
        registry.register(ContentType::Maze, |c: &GenerationConfig| {
            Box::new(MazeGenerator::new(c.maze.clone())) as Box<dyn Generator>
        });
        registry.register(ContentType::Room, |c: &GenerationConfig| {
            Box::new(RoomGenerator::new(c.rooms.clone(), c.corridors.clone())) as Box<dyn Generator>
        });
        registry.register(ContentType::Quest, |c: &GenerationConfig| {
            Box::new(QuestGenerator::new(c.clone())) as Box<dyn Generator>
        });
        registry.register(ContentType::Item, |c: &GenerationConfig| {
            Box::new(ItemGenerator::new(c.clone())) as Box<dyn Generator>
        });
        registry
    }

    /// Register (or replace) the factory for a content type.
    pub fn register<F>(&mut self, content_type: ContentType, factory: F)
    where
        F: Fn(&GenerationConfig) -> Box<dyn Generator> + Send + Sync + 'static,
    {
        if self
            .factories
            .insert(content_type, Box::new(factory))
            .is_some()
        {
            tracing::debug!(%content_type, "generator factory replaced");
        }
    }

    pub fn contains(&self, content_type: ContentType) -> bool {
        self.factories.contains_key(&content_type)
    }

    /// Instantiate the generator for `content_type`.
    pub fn create(
        &self,
        content_type: ContentType,
        config: &GenerationConfig,
    ) -> Result<Box<dyn Generator>, GenerationError> {
        self.factories
            .get(&content_type)
            .map(|factory| factory(config))
            .ok_or(GenerationError::UnknownContentType(content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validate::Violation;
    use crate::schema::content::Maze;

    struct Fixed;

    impl Generator for Fixed {
        fn content_type(&self) -> ContentType {
            ContentType::Custom("fixed")
        }

        fn generate(&self, ctx: &GenerationContext) -> Result<Draft, GenerationError> {
            let mut rng = crate::core::seed::SeedManager::new(ctx.seed)
                .stream(crate::core::seed::Stream::Maze, 0);
            let maze: Maze = crate::core::maze::carve_maze(2, 2, 0.0, &mut rng);
            Ok(Draft::new(Content::Maze(maze)))
        }

        fn validate(&self, _content: &Content) -> ValidationResult {
            ValidationResult::from_violations(vec![Violation::MissingObjectives])
        }
    }

    #[test]
    fn defaults_cover_builtin_types() {
        let registry = GeneratorRegistry::with_defaults();
        for ty in [
            ContentType::Terrain,
            ContentType::Maze,
            ContentType::Room,
            ContentType::Quest,
            ContentType::Item,
        ] {
            assert!(registry.contains(ty));
            let generator = registry.create(ty, &GenerationConfig::default()).unwrap();
            assert_eq!(generator.content_type(), ty);
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        let registry = GeneratorRegistry::new();
        let err = registry
            .create(ContentType::Custom("nope"), &GenerationConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            GenerationError::UnknownContentType(ContentType::Custom("nope"))
        ));
    }

    #[test]
    fn custom_generators_register() {
        let mut registry = GeneratorRegistry::new();
        registry.register(ContentType::Custom("fixed"), |_: &GenerationConfig| {
            Box::new(Fixed) as Box<dyn Generator>
        });
        let generator = registry
            .create(ContentType::Custom("fixed"), &GenerationConfig::default())
            .unwrap();
        let draft = generator.generate(&GenerationContext::new(1, 2, 2)).unwrap();
        assert!(!generator.validate(&draft.content).ok);
    }
}

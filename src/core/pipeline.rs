/// The generation pipeline: request → generate → validate → retry or done.
///
/// Each request runs a small state machine. Retries re-derive the seed
/// from the request root, so a failed attempt never leaks state into the
/// next one.

use std::fmt;

use crate::core::assemble::LevelAssembler;
use crate::core::config::GenerationConfig;
use crate::core::error::{check_canceled, ErrorContext, GenerationError, Reasons};
use crate::core::registry::{Generator, GeneratorFactory, GeneratorRegistry};
use crate::core::seed::SeedManager;
use crate::core::validate::ValidationResult;
use crate::schema::content::{Content, ContentType};
use crate::schema::context::{GenerationContext, Stage, MAX_DIMENSION, MIN_DIMENSION};

/// Per-request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Init,
    Generating { attempt: u32 },
    Validating { attempt: u32 },
    Retrying { attempt: u32 },
    Done,
    Failed,
}

impl GenerationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self → next` is a legal edge.
    pub fn can_transition(&self, next: &GenerationState) -> bool {
        use GenerationState::*;
        match (*self, *next) {
            (Init, Generating { attempt: 0 }) => true,
            (Generating { attempt: a }, Validating { attempt: b }) => a == b,
            (Generating { attempt: a }, Retrying { attempt: b }) => a == b,
            (Validating { attempt: a }, Retrying { attempt: b }) => a == b,
            (Validating { .. }, Done) => true,
            (Retrying { attempt: a }, Generating { attempt: b }) => b == a + 1,
            (Init | Generating { .. } | Validating { .. } | Retrying { .. }, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Generating { attempt } => write!(f, "generating#{}", attempt),
            Self::Validating { attempt } => write!(f, "validating#{}", attempt),
            Self::Retrying { attempt } => write!(f, "retrying#{}", attempt),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Tracks one request's state and the path it took.
struct Machine {
    state: GenerationState,
    history: Vec<GenerationState>,
}

impl Machine {
    fn new() -> Self {
        Self {
            state: GenerationState::Init,
            history: vec![GenerationState::Init],
        }
    }

    fn advance(&mut self, ctx: &GenerationContext, next: GenerationState) -> Result<(), GenerationError> {
        if !self.state.can_transition(&next) {
            return Err(GenerationError::invariant(
                ctx,
                Stage::Setup,
                format!("illegal transition {} -> {}", self.state, next),
            ));
        }
        tracing::debug!(seed = ctx.seed, from = %self.state, to = %next, "state transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` and hand back `err`.
    fn fail(&mut self, ctx: &GenerationContext, err: GenerationError) -> GenerationError {
        if let Err(illegal) = self.advance(ctx, GenerationState::Failed) {
            return illegal;
        }
        tracing::info!(seed = ctx.seed, error = %err, "generation failed");
        err
    }
}

/// A successful request.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub content: Content,
    /// The passing validation report, carrying any notices.
    pub validation: ValidationResult,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Seed of the successful attempt; regenerating with it reproduces
    /// `content` on the first try.
    pub seed: u64,
    pub history: Vec<GenerationState>,
}

/// The top-level generation engine. Built via `LevelEngine::builder()`.
///
/// `generate` takes `&self`, so one engine may serve concurrent requests
/// from many threads.
pub struct LevelEngine {
    config: GenerationConfig,
    registry: GeneratorRegistry,
}

/// Builder for constructing a `LevelEngine`.
pub struct LevelEngineBuilder {
    config: Option<GenerationConfig>,
    config_ron: Option<String>,
    max_retries: Option<u32>,
    registry: Option<GeneratorRegistry>,
    custom: Vec<(ContentType, GeneratorFactory)>,
}

impl LevelEngine {
    pub fn builder() -> LevelEngineBuilder {
        LevelEngineBuilder {
            config: None,
            config_ron: None,
            max_retries: None,
            registry: None,
            custom: Vec::new(),
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    fn check_request(ctx: &GenerationContext) -> Result<(), GenerationError> {
        let range = MIN_DIMENSION..=MAX_DIMENSION;
        if !range.contains(&ctx.width) {
            return Err(GenerationError::parameter_at(
                ctx,
                Stage::Setup,
                "width",
                format!("{} is outside {}..={}", ctx.width, MIN_DIMENSION, MAX_DIMENSION),
            ));
        }
        if !range.contains(&ctx.height) {
            return Err(GenerationError::parameter_at(
                ctx,
                Stage::Setup,
                "height",
                format!("{} is outside {}..={}", ctx.height, MIN_DIMENSION, MAX_DIMENSION),
            ));
        }
        if !ctx.difficulty.is_valid() {
            return Err(GenerationError::parameter_at(
                ctx,
                Stage::Setup,
                "difficulty",
                format!("{} is outside 1..=10", ctx.difficulty.0),
            ));
        }
        Ok(())
    }

    /// Generate and validate content of `content_type`, retrying with
    /// re-derived seeds up to `max_retries` times.
    pub fn generate(
        &self,
        content_type: ContentType,
        ctx: &GenerationContext,
    ) -> Result<Generated, GenerationError> {
        let mut machine = Machine::new();
        if let Err(err) = Self::check_request(ctx) {
            return Err(machine.fail(ctx, err));
        }
        let generator = match self.registry.create(content_type, &self.config) {
            Ok(generator) => generator,
            Err(err) => return Err(machine.fail(ctx, err)),
        };
        let seeds = SeedManager::new(ctx.seed);
        let max_retries = self.config.max_retries;
        tracing::debug!(seed = ctx.seed, %content_type, max_retries, "generation requested");

        machine.advance(ctx, GenerationState::Generating { attempt: 0 })?;
        let mut attempt = 0;
        loop {
            let attempt_ctx = ctx.reseeded(seeds.attempt_seed(attempt));
            if let Err(err) = check_canceled(&attempt_ctx, Stage::Setup) {
                return Err(machine.fail(ctx, err));
            }

            let failure = match generator.generate(&attempt_ctx) {
                Ok(draft) => {
                    machine.advance(ctx, GenerationState::Validating { attempt })?;
                    if let Err(err) = check_canceled(&attempt_ctx, Stage::Validation) {
                        return Err(machine.fail(ctx, err));
                    }
                    if let Err(detail) = draft.content.grid().check_integrity() {
                        let err = GenerationError::invariant(&attempt_ctx, Stage::Validation, detail);
                        return Err(machine.fail(ctx, err));
                    }
                    let validation = generator.validate(&draft.content).with_notices(draft.notices);
                    if validation.ok {
                        machine.advance(ctx, GenerationState::Done)?;
                        tracing::info!(
                            seed = ctx.seed,
                            attempt_seed = attempt_ctx.seed,
                            attempts = attempt + 1,
                            notices = validation.notices.len(),
                            "generation done"
                        );
                        return Ok(Generated {
                            content: draft.content,
                            validation,
                            attempts: attempt + 1,
                            seed: attempt_ctx.seed,
                            history: machine.history,
                        });
                    }
                    GenerationError::ValidationFailed {
                        root_seed: ctx.seed,
                        context: ErrorContext::new(&attempt_ctx, Stage::Validation),
                        attempts: attempt + 1,
                        reasons: Reasons(validation.violations),
                    }
                }
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(machine.fail(ctx, err)),
            };

            if attempt >= max_retries {
                return Err(machine.fail(ctx, failure));
            }
            machine.advance(ctx, GenerationState::Retrying { attempt })?;
            tracing::warn!(
                seed = ctx.seed,
                attempt,
                reason = %failure,
                "attempt failed, retrying with a derived seed"
            );
            attempt += 1;
            machine.advance(ctx, GenerationState::Generating { attempt })?;
        }
    }

    /// Generate, then hand the validated content to `assembler`.
    pub fn generate_and_assemble<A: LevelAssembler>(
        &self,
        content_type: ContentType,
        ctx: &GenerationContext,
        assembler: &A,
    ) -> Result<(Generated, A::Fragment), GenerationError> {
        let generated = self.generate(content_type, ctx)?;
        let fragment = assembler.assemble_level(&generated.content)?;
        Ok((generated, fragment))
    }
}

impl LevelEngineBuilder {
    pub fn config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Configuration as RON text; takes precedence over `config`.
    pub fn config_ron(mut self, text: &str) -> Self {
        self.config_ron = Some(text.to_string());
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Start from this registry instead of the built-in defaults.
    pub fn with_registry(mut self, registry: GeneratorRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register an extra generator factory.
    pub fn register<F>(mut self, content_type: ContentType, factory: F) -> Self
    where
        F: Fn(&GenerationConfig) -> Box<dyn Generator> + Send + Sync + 'static,
    {
        self.custom.push((content_type, Box::new(factory)));
        self
    }

    pub fn build(self) -> Result<LevelEngine, GenerationError> {
        let mut config = match self.config_ron {
            Some(text) => GenerationConfig::parse_ron(&text)?,
            None => self.config.unwrap_or_default(),
        };
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        config.validate()?;

        let mut registry = self.registry.unwrap_or_default();
        for (content_type, factory) in self.custom {
            registry.register(content_type, factory);
        }
        Ok(LevelEngine { config, registry })
    }
}

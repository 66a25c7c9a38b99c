/// Error taxonomy for generation requests.

use std::fmt;
use thiserror::Error;

use crate::core::assemble::AssembleError;
use crate::core::config::ConfigError;
use crate::core::corridor::CorridorError;
use crate::core::validate::Violation;
use crate::schema::content::ContentType;
use crate::schema::context::{Difficulty, GenerationContext, Stage};
use crate::schema::grid::Coord;

/// Where a generator-level error happened and with which parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub seed: u64,
    pub stage: Stage,
    pub width: usize,
    pub height: usize,
    pub difficulty: Difficulty,
}

impl ErrorContext {
    pub fn new(ctx: &GenerationContext, stage: Stage) -> Self {
        Self {
            seed: ctx.seed,
            stage,
            width: ctx.width,
            height: ctx.height,
            difficulty: ctx.difficulty,
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stage {} (seed {}, {}x{}, difficulty {})",
            self.stage, self.seed, self.width, self.height, self.difficulty.0
        )
    }
}

/// Violations joined for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Reasons(pub Vec<Violation>);

impl fmt::Display for Reasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid parameter `{name}` at {context}: {reason}")]
    Parameter {
        context: ErrorContext,
        name: &'static str,
        reason: String,
    },
    #[error("generation canceled at {context}")]
    Canceled { context: ErrorContext },
    #[error("cannot connect {from:?} to {to:?} within {budget} cells at {context}")]
    UnreachableTarget {
        context: ErrorContext,
        from: Coord,
        to: Coord,
        budget: usize,
    },
    #[error("validation failed after {attempts} attempt(s) for request seed {root_seed} at {context}: {reasons}")]
    ValidationFailed {
        /// Seed the caller asked for; `context.seed` is the last attempt's.
        root_seed: u64,
        context: ErrorContext,
        attempts: u32,
        reasons: Reasons,
    },
    #[error("internal invariant violated at {context}: {detail}")]
    InternalInvariantViolation { context: ErrorContext, detail: String },
    #[error("no generator registered for content type {0}")]
    UnknownContentType(ContentType),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("assembly failed: {0}")]
    Assembly(#[from] AssembleError),
}

impl GenerationError {
    pub fn parameter_at(
        ctx: &GenerationContext,
        stage: Stage,
        name: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::Parameter {
            context: ErrorContext::new(ctx, stage),
            name,
            reason: reason.into(),
        }
    }

    pub fn canceled(ctx: &GenerationContext, stage: Stage) -> Self {
        Self::Canceled {
            context: ErrorContext::new(ctx, stage),
        }
    }

    pub fn invariant(ctx: &GenerationContext, stage: Stage, detail: impl Into<String>) -> Self {
        Self::InternalInvariantViolation {
            context: ErrorContext::new(ctx, stage),
            detail: detail.into(),
        }
    }

    pub fn unreachable(ctx: &GenerationContext, stage: Stage, err: CorridorError) -> Self {
        match err {
            CorridorError::UnreachableTarget { from, to, budget } => Self::UnreachableTarget {
                context: ErrorContext::new(ctx, stage),
                from,
                to,
                budget,
            },
        }
    }

    /// Whether the pipeline may retry with a re-derived seed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UnreachableTarget { .. } | Self::ValidationFailed { .. }
        )
    }

    /// The violations behind a validation failure.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::ValidationFailed { reasons, .. } => &reasons.0,
            _ => &[],
        }
    }
}

/// Return `Canceled` if the request's token has fired.
pub fn check_canceled(ctx: &GenerationContext, stage: Stage) -> Result<(), GenerationError> {
    if ctx.is_canceled() {
        Err(GenerationError::canceled(ctx, stage))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::context::CancelToken;

    #[test]
    fn retry_classification() {
        let ctx = GenerationContext::new(5, 20, 20);
        assert!(!GenerationError::parameter_at(&ctx, Stage::Setup, "width", "too small").is_retryable());
        assert!(!GenerationError::canceled(&ctx, Stage::Rooms).is_retryable());
        assert!(!GenerationError::invariant(&ctx, Stage::Validation, "bad").is_retryable());
        let err = GenerationError::unreachable(
            &ctx,
            Stage::Corridors,
            CorridorError::UnreachableTarget {
                from: Coord::new(0, 0),
                to: Coord::new(5, 5),
                budget: 3,
            },
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn error_context_names_seed_and_stage() {
        let ctx = GenerationContext::new(99, 12, 8).with_difficulty(4);
        let msg = GenerationError::canceled(&ctx, Stage::Maze).to_string();
        assert!(msg.contains("seed 99"), "{}", msg);
        assert!(msg.contains("maze"), "{}", msg);
        assert!(msg.contains("12x8"), "{}", msg);

        let err = GenerationError::parameter_at(&ctx, Stage::Maze, "braid", "must be within [0, 1]");
        let msg = err.to_string();
        assert!(msg.contains("`braid`"), "{}", msg);
        assert!(msg.contains("seed 99"), "{}", msg);
        assert!(msg.contains("maze"), "{}", msg);
        assert!(msg.contains("difficulty 4"), "{}", msg);
        match err {
            GenerationError::Parameter { context, .. } => {
                assert_eq!((context.seed, context.stage), (99, Stage::Maze));
                assert_eq!((context.width, context.height), (12, 8));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn check_canceled_observes_token() {
        let token = CancelToken::new();
        let ctx = GenerationContext::new(1, 10, 10).with_cancel(token.clone());
        assert!(check_canceled(&ctx, Stage::Setup).is_ok());
        token.cancel();
        assert!(matches!(
            check_canceled(&ctx, Stage::Setup),
            Err(GenerationError::Canceled { .. })
        ));
    }
}

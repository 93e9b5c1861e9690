//! Error types for the keel engine.

use crate::types::{ConstraintId, EntityId};
use thiserror::Error;

/// Top-level error type for the keel engine.
#[derive(Debug, Error)]
pub enum KeelError {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while installing or editing constraints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintError {
    #[error("{entity} is not managed by this constraint manager")]
    EntityNotManaged { entity: EntityId },

    #[error("{constraint} cannot be satisfied: {description}")]
    Infeasible {
        constraint: ConstraintId,
        description: String,
    },

    #[error("{0} is not active in this constraint manager")]
    UnknownConstraint(ConstraintId),
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

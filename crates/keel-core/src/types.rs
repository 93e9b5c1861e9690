//! Identifiers, attributes, relations, and priorities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Unique identifier for an entity taking part in layout.
///
/// Entities are owned by the surrounding system; the engine only ever sees
/// their ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Unique identifier for a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub u64);

static NEXT_CONSTRAINT_ID: AtomicU64 = AtomicU64::new(1);

impl ConstraintId {
    /// Mint an id that no other constraint in this process carries.
    ///
    /// Constraint handles move between managers on split and join, so ids
    /// cannot be scoped to a single manager.
    pub fn next() -> Self {
        Self(NEXT_CONSTRAINT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint#{}", self.0)
    }
}

/// Layout axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    /// The extent attribute of this axis (width or height).
    pub fn extent(self) -> Attribute {
        match self {
            Axis::Horizontal => Attribute::Width,
            Axis::Vertical => Attribute::Height,
        }
    }

    /// The four mutually dependent attributes of this axis:
    /// leading edge, trailing edge, extent, and center.
    pub fn box_attributes(self) -> [Attribute; 4] {
        match self {
            Axis::Horizontal => [
                Attribute::Left,
                Attribute::Right,
                Attribute::Width,
                Attribute::CenterX,
            ],
            Axis::Vertical => [
                Attribute::Top,
                Attribute::Bottom,
                Attribute::Height,
                Attribute::CenterY,
            ],
        }
    }
}

/// A scalar attribute of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Left,
    Right,
    Top,
    Bottom,
    Width,
    Height,
    CenterX,
    CenterY,
}

impl Attribute {
    /// The axis this attribute belongs to.
    pub fn axis(self) -> Axis {
        match self {
            Attribute::Left | Attribute::Right | Attribute::Width | Attribute::CenterX => {
                Axis::Horizontal
            }
            Attribute::Top | Attribute::Bottom | Attribute::Height | Attribute::CenterY => {
                Axis::Vertical
            }
        }
    }

    fn name(self) -> &'static str {
        match self {
            Attribute::Left => "left",
            Attribute::Right => "right",
            Attribute::Top => "top",
            Attribute::Bottom => "bottom",
            Attribute::Width => "width",
            Attribute::Height => "height",
            Attribute::CenterX => "centerX",
            Attribute::CenterY => "centerY",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One scalar unknown: a single attribute of a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintVariable {
    pub entity: EntityId,
    pub attribute: Attribute,
}

impl ConstraintVariable {
    pub fn new(entity: EntityId, attribute: Attribute) -> Self {
        Self { entity, attribute }
    }
}

impl fmt::Display for ConstraintVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.attribute)
    }
}

/// The relation of a constraint (equality or inequality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    LessOrEqual,
    Equal,
    GreaterOrEqual,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::LessOrEqual => "<=",
            Relation::Equal => "==",
            Relation::GreaterOrEqual => ">=",
        })
    }
}

/// Constraint priority.
///
/// `Required` constraints are hard: they are either satisfied exactly or
/// rejected. `Preferred` constraints carry a positive weight charged into
/// the objective for every unit of violation, so a larger weight is a
/// stronger preference. Weights are used linearly; keep the levels that
/// must strictly dominate each other several orders of magnitude apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Required,
    Preferred(f64),
}

impl Priority {
    pub const HIGH: Priority = Priority::Preferred(750.0);
    pub const MEDIUM: Priority = Priority::Preferred(500.0);
    pub const LOW: Priority = Priority::Preferred(250.0);
    pub const LOWEST: Priority = Priority::Preferred(1.0);

    /// Smallest weight a preferred priority may carry.
    pub const MIN_WEIGHT: f64 = 1e-3;

    /// Create a preferred priority, clamping the weight to a positive,
    /// finite value.
    pub fn preferred(weight: f64) -> Self {
        if weight.is_nan() {
            return Priority::Preferred(Self::MIN_WEIGHT);
        }
        Priority::Preferred(weight.clamp(Self::MIN_WEIGHT, f64::MAX))
    }

    /// Re-apply the weight clamp of [`preferred`](Self::preferred) to a
    /// priority built directly from the `Preferred` variant.
    pub fn normalized(self) -> Self {
        match self {
            Priority::Required => Priority::Required,
            Priority::Preferred(weight) => Priority::preferred(weight),
        }
    }

    /// Check if this is a required priority.
    pub fn is_required(&self) -> bool {
        matches!(self, Priority::Required)
    }

    /// The objective weight of a preferred priority.
    pub fn weight(&self) -> Option<f64> {
        match self {
            Priority::Required => None,
            Priority::Preferred(weight) => Some(*weight),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Required
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Required => f.write_str("required"),
            Priority::Preferred(weight) => write!(f, "{}", weight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_attributes_share_axis() {
        for axis in [Axis::Horizontal, Axis::Vertical] {
            for attribute in axis.box_attributes() {
                assert_eq!(attribute.axis(), axis);
            }
            assert!(axis.box_attributes().contains(&axis.extent()));
        }
    }

    #[test]
    fn test_preferred_weight_is_clamped() {
        assert_eq!(Priority::preferred(-4.0), Priority::Preferred(Priority::MIN_WEIGHT));
        assert_eq!(Priority::preferred(f64::NAN), Priority::Preferred(Priority::MIN_WEIGHT));
        assert_eq!(Priority::preferred(f64::INFINITY), Priority::Preferred(f64::MAX));
        assert_eq!(Priority::preferred(10.0).weight(), Some(10.0));
        assert_eq!(Priority::Required.weight(), None);
    }

    #[test]
    fn test_normalized_repairs_raw_weights() {
        assert_eq!(Priority::Preferred(-5.0).normalized(), Priority::Preferred(Priority::MIN_WEIGHT));
        assert_eq!(Priority::Preferred(f64::NAN).normalized(), Priority::Preferred(Priority::MIN_WEIGHT));
        assert_eq!(Priority::Preferred(0.0).normalized().weight(), Some(Priority::MIN_WEIGHT));
        assert_eq!(Priority::HIGH.normalized(), Priority::HIGH);
        assert_eq!(Priority::Required.normalized(), Priority::Required);
    }

    #[test]
    fn test_constraint_ids_are_unique() {
        let a = ConstraintId::next();
        let b = ConstraintId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_variable_display() {
        let variable = ConstraintVariable::new(EntityId(3), Attribute::CenterX);
        assert_eq!(variable.to_string(), "entity#3.centerX");
        assert_eq!(Priority::Required.to_string(), "required");
    }
}

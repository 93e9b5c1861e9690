//! Intrinsic size bookkeeping.

use keel_core::{Axis, ConstraintVariable, EntityId, IntrinsicDefaults, Priority, Relation};
use smallvec::{smallvec, SmallVec};

use crate::constraint::Constraint;

/// What an entity reports about its natural extent along one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisIntrinsic {
    /// Measured extent, if the surrounding system supplied one
    pub size: Option<f64>,
    /// How strongly the extent resists growing past `size`
    pub content_hugging: Priority,
    /// How strongly the extent resists shrinking below `size`
    pub compression_resistance: Priority,
}

impl AxisIntrinsic {
    pub fn new(defaults: &IntrinsicDefaults) -> Self {
        Self {
            size: None,
            content_hugging: defaults.content_hugging,
            compression_resistance: defaults.compression_resistance,
        }
    }

    /// Both priorities agree, so a single equality expresses them.
    pub fn uses_equal_constraint(&self) -> bool {
        self.content_hugging == self.compression_resistance
    }

    /// A required priority makes the measured size binding, so the entity
    /// has to be measured whatever else pins it.
    pub fn requires_measurement(&self) -> bool {
        self.content_hugging.is_required() || self.compression_resistance.is_required()
    }

    /// Constraints that hold `entity`'s extent to the measured size.
    pub fn constraints(&self, entity: EntityId, axis: Axis) -> SmallVec<[Constraint; 2]> {
        let Some(size) = self.size else {
            return SmallVec::new();
        };
        let extent = ConstraintVariable::new(entity, axis.extent());
        if self.uses_equal_constraint() {
            smallvec![Constraint::to_value(extent, Relation::Equal, size).with_priority(self.content_hugging)]
        } else {
            smallvec![
                Constraint::to_value(extent, Relation::LessOrEqual, size).with_priority(self.content_hugging),
                Constraint::to_value(extent, Relation::GreaterOrEqual, size)
                    .with_priority(self.compression_resistance),
            ]
        }
    }
}

/// Intrinsic size of one entity on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct IntrinsicSize {
    pub width: AxisIntrinsic,
    pub height: AxisIntrinsic,
}

impl IntrinsicSize {
    pub fn new(defaults: &IntrinsicDefaults) -> Self {
        Self {
            width: AxisIntrinsic::new(defaults),
            height: AxisIntrinsic::new(defaults),
        }
    }

    pub fn axis(&self, axis: Axis) -> &AxisIntrinsic {
        match axis {
            Axis::Horizontal => &self.width,
            Axis::Vertical => &self.height,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisIntrinsic {
        match axis {
            Axis::Horizontal => &mut self.width,
            Axis::Vertical => &mut self.height,
        }
    }
}

impl Default for IntrinsicSize {
    fn default() -> Self {
        Self::new(&IntrinsicDefaults::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::Attribute;

    #[test]
    fn test_no_size_no_constraints() {
        let intrinsic = AxisIntrinsic::new(&IntrinsicDefaults::default());
        assert!(intrinsic.constraints(EntityId(1), Axis::Horizontal).is_empty());
    }

    #[test]
    fn test_split_priorities_give_two_inequalities() {
        let mut intrinsic = AxisIntrinsic::new(&IntrinsicDefaults::default());
        intrinsic.size = Some(120.0);
        assert!(!intrinsic.uses_equal_constraint());

        let constraints = intrinsic.constraints(EntityId(1), Axis::Vertical);
        assert_eq!(constraints.len(), 2);
        assert_eq!(constraints[0].items()[0].left.attribute, Attribute::Height);
        assert_eq!(constraints[0].items()[0].relation, Relation::LessOrEqual);
        assert_eq!(constraints[0].priority(), Priority::LOW);
        assert_eq!(constraints[1].items()[0].relation, Relation::GreaterOrEqual);
        assert_eq!(constraints[1].priority(), Priority::HIGH);
        assert_eq!(constraints[1].offset(), 120.0);
    }

    #[test]
    fn test_equal_priorities_give_one_equality() {
        let mut intrinsic = AxisIntrinsic::new(&IntrinsicDefaults::default());
        intrinsic.size = Some(30.0);
        intrinsic.content_hugging = Priority::Required;
        intrinsic.compression_resistance = Priority::Required;

        let constraints = intrinsic.constraints(EntityId(1), Axis::Horizontal);
        assert_eq!(constraints.len(), 1);
        assert!(constraints[0].is_fixing());
        assert!(intrinsic.requires_measurement());
    }
}

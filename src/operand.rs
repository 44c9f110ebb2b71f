use crate::{error::GradError, tape::ScalarNode, Tape};

/// An argument to a graph operation: a node already on a tape, or a raw number
/// that still has to be wrapped into a leaf.
#[derive(Clone, Copy, Debug)]
pub enum Operand<'a> {
    Node(ScalarNode<'a>),
    Raw(f64),
}

impl<'a> Operand<'a> {
    pub fn value(&self) -> f64 {
        match self {
            Operand::Node(node) => node.value(),
            Operand::Raw(value) => *value,
        }
    }
}

impl<'a> From<ScalarNode<'a>> for Operand<'a> {
    fn from(node: ScalarNode<'a>) -> Self {
        Operand::Node(node)
    }
}

impl<'a> From<&ScalarNode<'a>> for Operand<'a> {
    fn from(node: &ScalarNode<'a>) -> Self {
        Operand::Node(*node)
    }
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Operand::Raw(value)
    }
}

impl From<f32> for Operand<'_> {
    fn from(value: f32) -> Self {
        Operand::Raw(value as f64)
    }
}

impl From<i32> for Operand<'_> {
    fn from(value: i32) -> Self {
        Operand::Raw(value as f64)
    }
}

impl Tape {
    /// Turn an operand into a node of this tape. Raw numbers become fresh leaves;
    /// nodes of another tape are rejected.
    pub fn coerce<'a>(&'a self, operand: impl Into<Operand<'a>>) -> Result<ScalarNode<'a>, GradError> {
        let operand = operand.into();
        self.check(&operand)?;
        Ok(match operand {
            Operand::Node(node) => node,
            Operand::Raw(value) => self.leaf(value),
        })
    }

    /// Coerce both operands of a binary operation, left first. Nothing is pushed
    /// unless both operands are usable.
    pub(crate) fn coerce_pair<'a>(
        &'a self,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> Result<(ScalarNode<'a>, ScalarNode<'a>), GradError> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.check(&rhs)?;
        Ok((self.coerce(lhs)?, self.coerce(rhs)?))
    }

    pub(crate) fn check(&self, operand: &Operand) -> Result<(), GradError> {
        match operand {
            Operand::Node(node) if !self.owns(node) => Err(GradError::TypeMismatch {
                operand: node.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

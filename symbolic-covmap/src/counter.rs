//! Counters and counter expressions.

use std::convert::TryFrom;
use std::fmt;

#[cfg(feature = "serde")]
use serde_::{Deserialize, Serialize};

/// The value a mapping region is counted by.
///
/// All three variants share one tag space when encoded, see [`Counter::to_tag`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
pub enum Counter {
    /// The constant zero, used for unreachable code.
    Zero,
    /// A reference to the runtime profile counter with the given index.
    CounterValueReference(u32),
    /// A reference to the [`CounterExpression`] with the given index in the function's
    /// expression table.
    Expression(u32),
}

impl Counter {
    /// Encodes the counter into its tag.
    ///
    /// `Zero` is `0`, counter reference `n` is `2n + 1` and expression `n` is `2n + 2`. The parity
    /// of a non-zero tag tells references and expressions apart.
    pub fn to_tag(self) -> u64 {
        match self {
            Counter::Zero => 0,
            Counter::CounterValueReference(index) => 2 * u64::from(index) + 1,
            Counter::Expression(index) => 2 * u64::from(index) + 2,
        }
    }

    /// Decodes a counter tag produced by [`Counter::to_tag`].
    ///
    /// Returns `None` if the encoded index does not fit into 32 bits.
    pub fn from_tag(tag: u64) -> Option<Self> {
        if tag == 0 {
            return Some(Counter::Zero);
        }
        let index = u32::try_from((tag - 1) / 2).ok()?;
        if tag % 2 == 1 {
            Some(Counter::CounterValueReference(index))
        } else {
            Some(Counter::Expression(index))
        }
    }

    /// Returns the expression index if this counter references an expression.
    pub fn expression_index(self) -> Option<u32> {
        match self {
            Counter::Expression(index) => Some(index),
            _ => None,
        }
    }
}

impl Default for Counter {
    fn default() -> Self {
        Counter::Zero
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counter::Zero => write!(f, "0"),
            Counter::CounterValueReference(index) => write!(f, "#{}", index),
            Counter::Expression(index) => write!(f, "(expr {})", index),
        }
    }
}

/// The arithmetic operation of a [`CounterExpression`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
pub enum ExprKind {
    /// `lhs - rhs`
    Subtract,
    /// `lhs + rhs`
    Add,
}

impl ExprKind {
    /// The operator byte of this kind in an encoded expression.
    pub fn to_byte(self) -> u8 {
        match self {
            ExprKind::Subtract => 0,
            ExprKind::Add => 1,
        }
    }

    /// Decodes an operator byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ExprKind::Subtract),
            1 => Some(ExprKind::Add),
            _ => None,
        }
    }
}

/// A counter value derived from two other counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
pub struct CounterExpression {
    /// The operation.
    pub kind: ExprKind,
    /// The left-hand side operand.
    pub lhs: Counter,
    /// The right-hand side operand.
    pub rhs: Counter,
}

impl CounterExpression {
    /// Creates a new expression.
    pub fn new(lhs: Counter, kind: ExprKind, rhs: Counter) -> Self {
        Self { kind, lhs, rhs }
    }
}

impl fmt::Display for CounterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.kind {
            ExprKind::Add => '+',
            ExprKind::Subtract => '-',
        };
        write!(f, "{} {} {}", self.lhs, op, self.rhs)
    }
}

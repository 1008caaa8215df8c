//! The per-function table of counter expressions.

use crate::counter::{Counter, CounterExpression, ExprKind};
use crate::error::EncodingError;
use crate::format::varint::write_uleb128;

/// Collects the [`CounterExpression`]s of one function.
///
/// Expressions are referenced by index via [`Counter::Expression`]. The table does not
/// deduplicate: two structurally identical expressions added separately get two indices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpressionTable {
    expressions: Vec<CounterExpression>,
}

impl ExpressionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an expression, returning its index.
    pub fn add(&mut self, kind: ExprKind, lhs: Counter, rhs: Counter) -> u32 {
        let idx = self.expressions.len() as u32;
        self.expressions.push(CounterExpression { kind, lhs, rhs });
        idx
    }

    /// Appends an expression and returns a [`Counter`] referencing it.
    pub fn add_counter(&mut self, kind: ExprKind, lhs: Counter, rhs: Counter) -> Counter {
        Counter::Expression(self.add(kind, lhs, rhs))
    }

    /// Returns the expression with the given index.
    pub fn get(&self, index: u32) -> Option<&CounterExpression> {
        self.expressions.get(index as usize)
    }

    /// Number of expressions.
    pub fn len(&self) -> usize {
        self.expressions.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// All expressions in index order.
    pub fn as_slice(&self) -> &[CounterExpression] {
        &self.expressions
    }

    /// Consumes the table, returning its expressions.
    pub fn into_vec(self) -> Vec<CounterExpression> {
        self.expressions
    }
}

impl From<Vec<CounterExpression>> for ExpressionTable {
    fn from(expressions: Vec<CounterExpression>) -> Self {
        Self { expressions }
    }
}

/// Fails if `counter` references an expression at or beyond `num_expressions`.
pub(crate) fn check_counter(counter: Counter, num_expressions: usize) -> Result<(), EncodingError> {
    match counter.expression_index() {
        Some(index) if index as usize >= num_expressions => {
            Err(EncodingError::InvalidExpressionReference {
                index,
                num_expressions,
            })
        }
        _ => Ok(()),
    }
}

/// Encodes the expression count followed by every expression.
///
/// One expression is the varint tag of its left operand, the varint tag of its right operand
/// and a single operator byte. An operand referencing an expression must point to an earlier
/// entry of the table.
pub(crate) fn encode_expressions(
    out: &mut Vec<u8>,
    expressions: &[CounterExpression],
) -> Result<(), EncodingError> {
    for (position, expression) in expressions.iter().enumerate() {
        for &operand in &[expression.lhs, expression.rhs] {
            check_counter(operand, expressions.len())?;
            // operands may only refer to earlier expressions, which rules out cycles
            match operand.expression_index() {
                Some(index) if index as usize >= position => {
                    return Err(EncodingError::ForwardExpressionReference {
                        position,
                        index,
                    });
                }
                _ => {}
            }
        }
    }

    write_uleb128(out, expressions.len() as u64);
    for expression in expressions {
        write_uleb128(out, expression.lhs.to_tag());
        write_uleb128(out, expression.rhs.to_tag());
        out.push(expression.kind.to_byte());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_deduplication() {
        let mut table = ExpressionTable::new();
        let a = table.add(ExprKind::Add, Counter::CounterValueReference(0), Counter::Zero);
        let b = table.add(ExprKind::Add, Counter::CounterValueReference(0), Counter::Zero);
        assert_eq!((a, b), (0, 1));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0), table.get(1));
    }

    #[test]
    fn encoding() {
        let mut table = ExpressionTable::new();
        let first = table.add_counter(
            ExprKind::Add,
            Counter::CounterValueReference(1),
            Counter::Zero,
        );
        table.add(ExprKind::Subtract, first, Counter::CounterValueReference(70));

        let mut out = Vec::new();
        encode_expressions(&mut out, table.as_slice()).unwrap();
        // count, (#1=3, 0, add), (expr 0=2, #70=141 as two bytes, subtract)
        assert_eq!(out, [2, 3, 0, 1, 2, 0x8d, 0x01, 0]);
    }

    #[test]
    fn self_reference() {
        let expressions = [CounterExpression::new(
            Counter::Expression(0),
            ExprKind::Add,
            Counter::Zero,
        )];
        let mut out = Vec::new();
        assert_eq!(
            encode_expressions(&mut out, &expressions),
            Err(EncodingError::ForwardExpressionReference {
                position: 0,
                index: 0
            })
        );
        assert!(out.is_empty());
    }

    #[test]
    fn cycle_between_expressions() {
        let expressions = [
            CounterExpression::new(Counter::Expression(1), ExprKind::Add, Counter::Zero),
            CounterExpression::new(
                Counter::CounterValueReference(0),
                ExprKind::Subtract,
                Counter::Expression(0),
            ),
        ];
        let mut out = Vec::new();
        assert_eq!(
            encode_expressions(&mut out, &expressions),
            Err(EncodingError::ForwardExpressionReference {
                position: 0,
                index: 1
            })
        );
        assert!(out.is_empty());
    }

    #[test]
    fn dangling_operand() {
        let expressions = [CounterExpression::new(
            Counter::Expression(1),
            ExprKind::Add,
            Counter::Zero,
        )];
        let mut out = Vec::new();
        assert_eq!(
            encode_expressions(&mut out, &expressions),
            Err(EncodingError::InvalidExpressionReference {
                index: 1,
                num_expressions: 1
            })
        );
        assert!(out.is_empty());
    }
}

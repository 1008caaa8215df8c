//! Collection of a function's counters and expressions as handed out by instrumentation.

use indexmap::IndexSet;

#[cfg(feature = "serde")]
use serde_::{Deserialize, Serialize};

use super::filenames::FilenameTable;
use super::record::FunctionCoverageRecord;
use super::regions::MappingRegion;
use crate::counter::{Counter, CounterExpression, ExprKind};
use crate::error::{DroppedExpression, EncodingError, Error, ErrorSink};

/// A region of source code, identified by its file name.
///
/// Lines and columns are 1-based.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
pub struct CodeRegion {
    /// The source file, as passed to the compiler.
    pub file_name: String,
    /// The first line of the region.
    pub start_line: u32,
    /// The first column of the region.
    pub start_col: u32,
    /// The last line of the region.
    pub end_line: u32,
    /// The end column of the region.
    pub end_col: u32,
}

impl CodeRegion {
    /// Creates a new region.
    pub fn new(
        file_name: impl Into<String>,
        start_line: u32,
        start_col: u32,
        end_line: u32,
        end_col: u32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

#[derive(Clone, Debug)]
struct Expression {
    lhs: u32,
    op: ExprKind,
    rhs: u32,
    region: Option<CodeRegion>,
}

/// Collects the coverage regions of one function.
///
/// Regions are counted by (a) injected counters, (b) counter expressions, which add or subtract
/// two other counters or expressions, and (c) unreachable regions, which always count as zero.
///
/// Counters and expressions share one id space because both can be operands of an expression.
/// Operand id `0` is the constant zero, counter ids count up from `1`, and expression ids count
/// down from `u32::MAX`. This lets counters and expressions be added in any order without knowing
/// the final number of counters.
///
/// Note that unreachable regions differ from gap regions. A gap region is a non-executable part
/// of a counted region, like a line with only whitespace or comments.
#[derive(Clone, Debug)]
pub struct FunctionCoverage {
    source_hash: u64,
    counters: Vec<Option<CodeRegion>>,
    expressions: Vec<Option<Expression>>,
    unreachable_regions: Vec<CodeRegion>,
}

impl FunctionCoverage {
    /// Creates an empty collection for the declared number of counters and expressions.
    pub fn new(source_hash: u64, num_counters: u32, num_expressions: u32) -> Self {
        Self {
            source_hash,
            counters: vec![None; num_counters as usize],
            expressions: vec![None; num_expressions as usize],
            unreachable_regions: Vec::new(),
        }
    }

    /// The hash of the function's source structure.
    pub fn source_hash(&self) -> u64 {
        self.source_hash
    }

    /// Adds a code region counted by the counter with the given id.
    ///
    /// Counter ids start at `1`, and id `n` refers to the runtime counter `n - 1`.
    pub fn add_counter(&mut self, id: u32, region: CodeRegion) -> Result<(), EncodingError> {
        let num_counters = self.counters.len() as u32;
        let slot = id
            .checked_sub(1)
            .and_then(|index| self.counters.get_mut(index as usize))
            .ok_or(EncodingError::CounterOutOfRange { id, num_counters })?;
        if slot.is_some() {
            return Err(EncodingError::DuplicateCounter(id));
        }
        *slot = Some(region);
        Ok(())
    }

    /// Adds a counter expression with the given id, counting an optional region.
    ///
    /// Expression ids count down from `u32::MAX`. The operands `lhs` and `rhs` are ids of
    /// counters, other expressions, or `0` for zero.
    pub fn add_counter_expression(
        &mut self,
        id: u32,
        lhs: u32,
        op: ExprKind,
        rhs: u32,
        region: Option<CodeRegion>,
    ) -> Result<(), EncodingError> {
        let num_expressions = self.expressions.len() as u32;
        let slot = self
            .expressions
            .get_mut(expression_index(id))
            .ok_or(EncodingError::ExpressionOutOfRange {
                id,
                num_expressions,
            })?;
        if slot.is_some() {
            return Err(EncodingError::DuplicateExpression(id));
        }
        *slot = Some(Expression {
            lhs,
            op,
            rhs,
            region,
        });
        Ok(())
    }

    /// Adds a region that is never executed, counted by [`Counter::Zero`].
    pub fn add_unreachable_region(&mut self, region: CodeRegion) {
        self.unreachable_regions.push(region);
    }

    /// Resolves all expressions and pairs every region with its counter.
    ///
    /// Expressions are assigned dense indices in the order of their original index. Expressions
    /// with an operand that refers to a missing counter, or to an expression that was dropped or
    /// comes later, are skipped and raised to the `error_sink`.
    ///
    /// The regions are returned in the order counters, expressions, unreachable regions.
    pub fn expressions_and_counter_regions<E>(
        &self,
        mut error_sink: E,
    ) -> (Vec<CounterExpression>, Vec<(Counter, &CodeRegion)>)
    where
        E: ErrorSink<DroppedExpression>,
    {
        let mut counter_regions: Vec<(Counter, &CodeRegion)> = self
            .counters
            .iter()
            .enumerate()
            .filter_map(|(index, region)| {
                region
                    .as_ref()
                    .map(|region| (Counter::CounterValueReference(index as u32), region))
            })
            .collect();

        let mut counter_expressions = Vec::with_capacity(self.expressions.len());
        let mut new_indexes: Vec<Option<u32>> = vec![None; self.expressions.len()];
        let mut expression_regions = Vec::new();

        for (original_index, expression) in self.expressions.iter().enumerate() {
            let expression = match expression {
                Some(expression) => expression,
                None => continue,
            };
            let lhs = self.operand_to_counter(&new_indexes, expression.lhs);
            let rhs = self.operand_to_counter(&new_indexes, expression.rhs);
            let (lhs, rhs) = match (lhs, rhs) {
                (Some(lhs), Some(rhs)) => (lhs, rhs),
                _ => {
                    let dropped = DroppedExpression {
                        id: u32::MAX - original_index as u32,
                        lhs: expression.lhs,
                        rhs: expression.rhs,
                    };
                    log::debug!("ignoring expression with missing operands: {}", dropped);
                    error_sink.raise_error(dropped);
                    continue;
                }
            };

            let mapped_index = counter_expressions.len() as u32;
            counter_expressions.push(CounterExpression::new(lhs, expression.op, rhs));
            new_indexes[original_index] = Some(mapped_index);
            if let Some(ref region) = expression.region {
                expression_regions.push((Counter::Expression(mapped_index), region));
            }
        }

        counter_regions.extend(expression_regions);
        counter_regions.extend(
            self.unreachable_regions
                .iter()
                .map(|region| (Counter::Zero, region)),
        );
        (counter_expressions, counter_regions)
    }

    fn operand_to_counter(&self, new_indexes: &[Option<u32>], id: u32) -> Option<Counter> {
        if id == 0 {
            return Some(Counter::Zero);
        }
        let index = (id - 1) as usize;
        if index < self.counters.len() {
            return self.counters[index]
                .as_ref()
                .map(|_| Counter::CounterValueReference(index as u32));
        }
        new_indexes
            .get(expression_index(id))
            .copied()
            .flatten()
            .map(Counter::Expression)
    }

    /// Builds the [`FunctionCoverageRecord`] of this function.
    ///
    /// Every region's file is interned into the module-wide `filenames` table. Function-local
    /// file ids are assigned in the order files are first seen, and the regions are sorted as
    /// the mapping writer requires. If a file name cannot be normalized, the table is left
    /// untouched.
    pub fn into_record<E>(
        self,
        function_name_hash: u64,
        filenames: &mut FilenameTable,
        error_sink: E,
    ) -> Result<FunctionCoverageRecord, Error>
    where
        E: ErrorSink<DroppedExpression>,
    {
        let (expressions, counter_regions) = self.expressions_and_counter_regions(error_sink);

        let normalized = counter_regions
            .iter()
            .map(|(_, region)| filenames.normalize(&region.file_name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut file_ids = IndexSet::new();
        let mut regions = Vec::with_capacity(counter_regions.len());
        for ((counter, region), path) in counter_regions.into_iter().zip(normalized) {
            let (file_id, _) = file_ids.insert_full(filenames.intern_normalized(path));
            regions.push(MappingRegion::code(
                counter,
                file_id as u32,
                region.start_line,
                region.start_col,
                region.end_line,
                region.end_col,
            ));
        }
        // counters come in id order, so the regions are mostly sorted already
        dmsort::sort_by_key(&mut regions, |region| {
            (
                region.sort_key(),
                region.line_end,
                region.column_end,
                region.counter,
            )
        });

        log::trace!(
            "function {:#x}: {} files, {} expressions, {} regions",
            function_name_hash,
            file_ids.len(),
            expressions.len(),
            regions.len()
        );

        Ok(FunctionCoverageRecord {
            function_name_hash,
            file_ids: file_ids.into_iter().collect(),
            expressions,
            regions,
            structural_hash: self.source_hash,
        })
    }
}

fn expression_index(id: u32) -> usize {
    (u32::MAX - id) as usize
}

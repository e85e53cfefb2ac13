//! Sheet evaluation helpers
//!
//! # Example
//!
//! ```rust
//! use sheetlink::prelude::*;
//!
//! let mut sheet = Sheet::new();
//! sheet.set("A1", "10").unwrap();
//! sheet.set("A2", "=A1*3").unwrap();
//! sheet.set("A3", "=A3+1").unwrap();
//!
//! let (result, stats) = sheet.evaluate_with_stats("page-1", &NullResolver);
//! assert_eq!(result.get("A2").unwrap().display, "30");
//! assert_eq!(stats.formula_count, 2);
//! assert_eq!(stats.circular_references, 1);
//! ```

use crate::{
    evaluate_sheet_with_cache, CellAddress, DependencyGraph, ErrorKind, EvaluationContext,
    EvaluationOptions, EvaluationResult, PageResolver, ParseCache, Sheet,
};

/// Statistics from one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Number of formula cells in the sheet
    pub formula_count: usize,
    /// Number of non-blank cells evaluated
    pub cells_evaluated: usize,
    /// Cells whose own value is a circular reference error
    pub circular_references: usize,
    /// Cells holding any error, circular ones included
    pub errors: usize,
    /// Distinct pages the sheet's formulas reference
    pub referenced_pages: usize,
}

impl EvaluationStats {
    /// Summarize an evaluation of `sheet`
    pub fn collect(sheet: &Sheet, result: &EvaluationResult) -> Self {
        Self::collect_with_cache(sheet, result, &mut ParseCache::new())
    }

    fn collect_with_cache(sheet: &Sheet, result: &EvaluationResult, cache: &mut ParseCache) -> Self {
        let graph = DependencyGraph::build(sheet, cache);

        let mut stats = EvaluationStats {
            formula_count: sheet.formula_cells().count(),
            cells_evaluated: result.len(),
            referenced_pages: graph.referenced_pages().len(),
            ..Default::default()
        };
        for (_, error) in result.errors() {
            stats.errors += 1;
            if error.kind == ErrorKind::Circular {
                stats.circular_references += 1;
            }
        }
        stats
    }
}

/// Extension trait for Sheet to add evaluation methods
pub trait SheetEvaluationExt {
    /// Evaluate every cell with default options
    fn evaluate(&self, page_id: &str, resolver: &dyn PageResolver) -> EvaluationResult;

    /// Evaluate every cell with custom options
    fn evaluate_with_options(
        &self,
        page_id: &str,
        resolver: &dyn PageResolver,
        options: &EvaluationOptions,
    ) -> EvaluationResult;

    /// Evaluate every cell and summarize the outcome
    fn evaluate_with_stats(
        &self,
        page_id: &str,
        resolver: &dyn PageResolver,
    ) -> (EvaluationResult, EvaluationStats);

    /// Formula cells to refresh after `edited` change, in evaluation order
    fn refresh_order(&self, edited: &[CellAddress]) -> Vec<CellAddress>;
}

impl SheetEvaluationExt for Sheet {
    fn evaluate(&self, page_id: &str, resolver: &dyn PageResolver) -> EvaluationResult {
        self.evaluate_with_options(page_id, resolver, &EvaluationOptions::default())
    }

    fn evaluate_with_options(
        &self,
        page_id: &str,
        resolver: &dyn PageResolver,
        options: &EvaluationOptions,
    ) -> EvaluationResult {
        let ctx = EvaluationContext::new(self, page_id, resolver).with_options(*options);
        evaluate_sheet_with_cache(&ctx, &mut ParseCache::new())
    }

    fn evaluate_with_stats(
        &self,
        page_id: &str,
        resolver: &dyn PageResolver,
    ) -> (EvaluationResult, EvaluationStats) {
        let mut cache = ParseCache::new();
        let ctx = EvaluationContext::new(self, page_id, resolver);
        let result = evaluate_sheet_with_cache(&ctx, &mut cache);

        // Parses are shared with the evaluation pass above
        let stats = EvaluationStats::collect_with_cache(self, &result, &mut cache);
        (result, stats)
    }

    fn refresh_order(&self, edited: &[CellAddress]) -> Vec<CellAddress> {
        let graph = DependencyGraph::build(self, &mut ParseCache::new());
        graph.transitive_dependents(edited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapResolver, NullResolver, WholeSheetPolicy};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stats_count_errors_and_pages() {
        let mut sheet = Sheet::new();
        sheet.set("A1", "=@[Pricing](pricing):B2").unwrap();
        sheet.set("A2", "=@[Gone](gone):A1").unwrap();
        sheet.set("A3", "=A2+1").unwrap();
        sheet.set("A4", "text").unwrap();

        let mut pricing = Sheet::new();
        pricing.set("B2", "200").unwrap();
        let resolver = MapResolver::new().with_page("pricing", "Pricing", pricing);

        let (result, stats) = sheet.evaluate_with_stats("home", &resolver);
        assert_eq!(result.get("A1").unwrap().display, "200");
        assert_eq!(
            stats,
            EvaluationStats {
                formula_count: 3,
                cells_evaluated: 4,
                circular_references: 0,
                errors: 2,
                referenced_pages: 2,
            }
        );
    }

    #[test]
    fn test_evaluate_with_options() {
        let mut sheet = Sheet::new();
        sheet.set("A1", "=@[Other](other)").unwrap();

        let options = EvaluationOptions {
            whole_sheet: WholeSheetPolicy::Reject,
            ..Default::default()
        };
        let result = sheet.evaluate_with_options("home", &NullResolver, &options);
        assert_eq!(result.get("A1").unwrap().error_kind(), Some(ErrorKind::Ref));
    }

    #[test]
    fn test_refresh_order() {
        let mut sheet = Sheet::new();
        sheet.set("A1", "5").unwrap();
        sheet.set("B1", "=A1*2").unwrap();
        sheet.set("C1", "=B1+A1").unwrap();
        sheet.set("D1", "=7").unwrap();

        let order = sheet.refresh_order(&[CellAddress::parse("A1").unwrap()]);
        assert_eq!(
            order,
            vec![
                CellAddress::parse("B1").unwrap(),
                CellAddress::parse("C1").unwrap()
            ]
        );
    }
}

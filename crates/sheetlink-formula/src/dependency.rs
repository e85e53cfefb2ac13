//! Dependency tracking for formula cells
//!
//! A [`DependencyGraph`] is built from one sheet's raw inputs. Local references
//! become edges between addresses; cross-page references are recorded as
//! external dependencies and are never followed here, since the referenced
//! sheets are only known once a resolver fetches them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use sheetlink_core::{CellAddress, Sheet};

use crate::ast::{CellReference, PageRef, PageTarget};
use crate::cycle::{self, CycleReport};
use crate::parser::ParseCache;

/// A reference from a formula cell to another page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalDependency {
    pub page: PageRef,
    pub target: PageTarget,
}

impl fmt::Display for ExternalDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            PageTarget::WholeSheet => write!(f, "{}", self.page),
            PageTarget::Cell(addr) => write!(f, "{}:{}", self.page, addr),
            PageTarget::Range(range) => write!(f, "{}:{}", self.page, range),
        }
    }
}

/// Dependency graph for the formula cells of one sheet
///
/// Tracks which cells depend on which other cells, enabling targeted
/// recalculation and cycle detection.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Cell → Cells that depend on it (dependents)
    dependents: BTreeMap<CellAddress, BTreeSet<CellAddress>>,
    /// Cell → Cells it depends on (precedents)
    precedents: BTreeMap<CellAddress, BTreeSet<CellAddress>>,
    /// Cell → References it makes to other pages, in source order
    external: BTreeMap<CellAddress, Vec<ExternalDependency>>,
    /// Every formula cell, whether or not it parsed
    formulas: BTreeSet<CellAddress>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every formula cell of `sheet`.
    ///
    /// Ranges are clamped to the sheet's extents. Formulas that fail to parse
    /// contribute no edges.
    pub fn build(sheet: &Sheet, cache: &mut ParseCache) -> Self {
        let mut graph = Self::new();

        for (addr, raw) in sheet.formula_cells() {
            graph.formulas.insert(addr);

            let parsed = cache.get_or_parse(raw);
            let expr = match parsed.as_ref() {
                Ok(expr) => expr,
                Err(_) => continue,
            };

            for reference in expr.references() {
                match reference {
                    CellReference::Local(target) => graph.add_dependency(*target, addr),
                    CellReference::LocalRange(range) => {
                        if let Some(clamped) = range.clamp_to(sheet.rows(), sheet.cols()) {
                            for target in clamped.cells() {
                                graph.add_dependency(target, addr);
                            }
                        }
                    }
                    CellReference::CrossPage { page, target } => {
                        graph.add_external(
                            addr,
                            ExternalDependency {
                                page: page.clone(),
                                target: *target,
                            },
                        );
                    }
                }
            }
        }

        graph
    }

    /// Add a dependency: dependent depends on precedent
    pub fn add_dependency(&mut self, precedent: CellAddress, dependent: CellAddress) {
        self.dependents
            .entry(precedent)
            .or_default()
            .insert(dependent);
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Record a reference from `cell` to another page
    pub fn add_external(&mut self, cell: CellAddress, dependency: ExternalDependency) {
        let entry = self.external.entry(cell).or_default();
        if !entry.contains(&dependency) {
            entry.push(dependency);
        }
    }

    /// Cells that directly depend on the given cell, row-major
    pub fn dependents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cells that the given cell directly depends on, row-major
    pub fn precedents(&self, cell: CellAddress) -> impl Iterator<Item = CellAddress> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Cross-page references made by the given cell
    pub fn external_dependencies(&self, cell: CellAddress) -> &[ExternalDependency] {
        self.external.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Identifiers of every page the sheet references
    pub fn referenced_pages(&self) -> BTreeSet<&str> {
        self.external
            .values()
            .flatten()
            .map(|dep| dep.page.identifier.as_str())
            .collect()
    }

    /// Formula cells of the sheet, row-major
    pub fn formula_cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        self.formulas.iter().copied()
    }

    /// All cells that need recomputing when the given cells change.
    ///
    /// The result is ordered so that every cell comes after the cells it depends
    /// on. A changed cell is only included when it also depends on another
    /// changed cell. Cells on a cycle appear once, in an arbitrary position
    /// within the cycle.
    pub fn transitive_dependents(&self, changed: &[CellAddress]) -> Vec<CellAddress> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut in_stack = HashSet::new();

        for &cell in changed {
            for dependent in self.dependents(cell) {
                self.topological_sort(dependent, &mut result, &mut visited, &mut in_stack);
            }
        }

        result.reverse();
        result
    }

    /// Topological sort helper (DFS, post-order)
    fn topological_sort(
        &self,
        cell: CellAddress,
        result: &mut Vec<CellAddress>,
        visited: &mut HashSet<CellAddress>,
        in_stack: &mut HashSet<CellAddress>,
    ) {
        if visited.contains(&cell) || in_stack.contains(&cell) {
            return;
        }

        in_stack.insert(cell);

        // Visit all dependents first
        if let Some(dependents) = self.dependents.get(&cell) {
            for &dependent in dependents {
                self.topological_sort(dependent, result, visited, in_stack);
            }
        }

        in_stack.remove(&cell);
        visited.insert(cell);
        result.push(cell);
    }

    /// Find the cells that take part in a local reference cycle
    pub fn find_cycles(&self) -> CycleReport {
        cycle::find_cycles(self.formulas.iter().copied(), |cell| {
            self.precedents(cell).collect::<Vec<_>>()
        })
    }

    /// Whether the given cell is part of a local reference cycle
    pub fn has_circular_reference(&self, cell: CellAddress) -> bool {
        self.find_cycles().contains(&cell)
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
        self.external.clear();
        self.formulas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> CellAddress {
        CellAddress::parse(s).unwrap()
    }

    fn sheet(cells: &[(&str, &str)]) -> Sheet {
        let mut sheet = Sheet::new();
        for (a, raw) in cells {
            sheet.set(a, *raw).unwrap();
        }
        sheet
    }

    #[test]
    fn test_build_local_edges() {
        let s = sheet(&[("B1", "1000"), ("B2", "600"), ("B3", "=B1-B2")]);
        let graph = DependencyGraph::build(&s, &mut ParseCache::new());

        let precedents: Vec<_> = graph.precedents(addr("B3")).collect();
        assert_eq!(precedents, vec![addr("B1"), addr("B2")]);
        assert!(graph.dependents(addr("B1")).any(|c| c == addr("B3")));
        assert!(graph.find_cycles().is_empty());
    }

    #[test]
    fn test_ranges_are_clamped_to_extents() {
        let s = sheet(&[("A1", "1"), ("A2", "2"), ("B1", "=SUM(A1:A1000)")]);
        let graph = DependencyGraph::build(&s, &mut ParseCache::new());

        let precedents: Vec<_> = graph.precedents(addr("B1")).collect();
        assert_eq!(precedents, vec![addr("A1"), addr("A2")]);
    }

    #[test]
    fn test_external_dependencies() {
        let s = sheet(&[
            ("A1", "=@[Sales](s-1):B2 + @[Sales](s-1):B2"),
            ("A2", "=SUM(@[Costs](c-9):A1:A3)"),
        ]);
        let graph = DependencyGraph::build(&s, &mut ParseCache::new());

        assert_eq!(
            graph.external_dependencies(addr("A1")),
            &[ExternalDependency {
                page: PageRef::new("s-1", "Sales"),
                target: PageTarget::Cell(addr("B2")),
            }]
        );
        assert_eq!(graph.precedents(addr("A1")).count(), 0);
        assert_eq!(
            graph.referenced_pages().into_iter().collect::<Vec<_>>(),
            vec!["c-9", "s-1"]
        );
    }

    #[test]
    fn test_circular_reference() {
        // A1 -> B1 -> C1 -> A1, D1 reads A1 but is not on the cycle
        let s = sheet(&[
            ("A1", "=C1+1"),
            ("B1", "=A1+1"),
            ("C1", "=B1+1"),
            ("D1", "=A1"),
        ]);
        let graph = DependencyGraph::build(&s, &mut ParseCache::new());
        let report = graph.find_cycles();

        assert_eq!(report.cycles, vec![vec![addr("A1"), addr("B1"), addr("C1")]]);
        assert!(graph.has_circular_reference(addr("B1")));
        assert!(!graph.has_circular_reference(addr("D1")));
    }

    #[test]
    fn test_self_reference_in_range() {
        let s = sheet(&[("A1", "1"), ("A3", "=SUM(A1:A3)")]);
        let graph = DependencyGraph::build(&s, &mut ParseCache::new());
        assert_eq!(graph.find_cycles().cycles, vec![vec![addr("A3")]]);
    }

    #[test]
    fn test_transitive_dependents_in_order() {
        let s = sheet(&[
            ("A1", "1"),
            ("A2", "=A1*2"),
            ("A3", "=A2+A1"),
            ("A4", "=A3"),
            ("B1", "=5"),
        ]);
        let graph = DependencyGraph::build(&s, &mut ParseCache::new());

        let order = graph.transitive_dependents(&[addr("A1")]);
        assert_eq!(order, vec![addr("A2"), addr("A3"), addr("A4")]);
        assert!(graph.transitive_dependents(&[addr("B1")]).is_empty());
    }

    #[test]
    fn test_unparseable_formula_has_no_edges() {
        let s = sheet(&[("A1", "=(B1"), ("B1", "2")]);
        let graph = DependencyGraph::build(&s, &mut ParseCache::new());
        assert_eq!(graph.precedents(addr("A1")).count(), 0);
        assert_eq!(graph.formula_cells().collect::<Vec<_>>(), vec![addr("A1")]);
    }
}

//! Formula evaluator
//!
//! Evaluates every cell of a sheet in one pass by memoized recursive descent.
//! Each formula cell is evaluated at most once; a cell reached again while it
//! is still on the active visitation stack closes a cycle. The stack spans
//! every sheet loaded through the resolver, so a cycle that leaves the sheet
//! and comes back is caught the same way as a local one.
//!
//! Before a formula cell is evaluated, its pending local precedents are
//! evaluated in dependency order, found with an explicit work stack. Local
//! reference chains therefore never nest; only cross-page reads do.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use sheetlink_core::{
    format_number, parse_numeric_literal, CellAddress, CellError, CellInput, CellRange,
    CellValue, ErrorKind, Sheet,
};
use tracing::{debug, info_span, trace};

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, PageRef, PageTarget, UnaryOperator};
use crate::dependency::DependencyGraph;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{FunctionImpl, FunctionRegistry};
use crate::parser::{parse_formula, ParseCache};
use crate::resolver::{PageResolver, ResolveError};

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Flattened range contents, row-major
    List(Vec<FormulaValue>),
    /// A blank cell
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::String(s) => parse_numeric_literal(s),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Force conversion to number for arithmetic
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number().ok_or_else(|| match self {
            FormulaValue::String(s) => {
                FormulaError::Argument(format!("Cannot convert \"{}\" to a number", s))
            }
            FormulaValue::Error(e) => FormulaError::Argument(e.message.clone()),
            _ => FormulaError::Argument("Range used where a single value is expected".into()),
        })
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Force conversion to boolean for conditions
    pub fn to_bool(&self) -> FormulaResult<bool> {
        self.as_bool().ok_or_else(|| {
            FormulaError::Argument(format!(
                "Cannot use \"{}\" as a logical value",
                self.as_string()
            ))
        })
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.token().to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::List(_) => ErrorKind::Value.token().to_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn error(&self) -> Option<&CellError> {
        match self {
            FormulaValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// First error in left-to-right order, looking inside lists
    pub fn first_error(&self) -> Option<&CellError> {
        match self {
            FormulaValue::Error(e) => Some(e),
            FormulaValue::List(items) => items.iter().find_map(FormulaValue::first_error),
            _ => None,
        }
    }

    /// Collapse a list to the single value it stands for.
    ///
    /// An empty list is blank and a one-element list is its element; longer
    /// lists cannot be used where one value is expected.
    pub fn into_scalar(self) -> FormulaValue {
        match self {
            FormulaValue::List(mut items) => match items.len() {
                0 => FormulaValue::Empty,
                1 => items.remove(0).into_scalar(),
                _ => FormulaValue::Error(CellError::value(
                    "Range used where a single value is expected",
                )),
            },
            other => other,
        }
    }

    /// Iterate the scalar members of this value: list items, or the value itself
    pub fn members(&self) -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match self {
            FormulaValue::List(items) => Box::new(items.iter().flat_map(FormulaValue::members)),
            other => Box::new(std::iter::once(other)),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value.into_scalar() {
            FormulaValue::Empty => CellValue::Number(0.0),
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::Text(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            FormulaValue::List(_) => CellValue::Error(CellError::value(
                "Range used where a single value is expected",
            )),
        }
    }
}

/// What a bare `@[Label](id)` reference with no cell or range reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WholeSheetPolicy {
    /// The referenced sheet's whole grid, as a range
    #[default]
    Grid,
    /// One designated cell of the referenced sheet
    DefaultCell(CellAddress),
    /// A `REF` error
    Reject,
}

/// Evaluation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Meaning of whole-sheet cross-page references
    pub whole_sheet: WholeSheetPolicy,
    /// Maximum number of formula cells on the visitation stack at once.
    ///
    /// Local chains do not grow the stack, so this bounds nesting of
    /// cross-page reads.
    pub max_depth: usize,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            whole_sheet: WholeSheetPolicy::Grid,
            max_depth: 512,
        }
    }
}

/// Context for evaluating one sheet
pub struct EvaluationContext<'a> {
    /// The sheet being evaluated
    pub sheet: &'a Sheet,
    /// Identifier of the page the sheet belongs to
    pub page_id: String,
    /// Source of other pages' sheets
    pub resolver: &'a dyn PageResolver,
    /// Functions available to formulas
    pub registry: &'a FunctionRegistry,
    pub options: EvaluationOptions,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context using the built-in functions and default options
    pub fn new<S: Into<String>>(
        sheet: &'a Sheet,
        page_id: S,
        resolver: &'a dyn PageResolver,
    ) -> Self {
        Self {
            sheet,
            page_id: page_id.into(),
            resolver,
            registry: FunctionRegistry::builtin(),
            options: EvaluationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_registry(mut self, registry: &'a FunctionRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// The evaluated form of one cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellResult {
    pub value: CellValue,
    /// Canonical display text; error cells show their token
    pub display: String,
}

impl CellResult {
    pub fn new(value: CellValue) -> Self {
        let display = value.display();
        Self { value, display }
    }

    pub fn is_error(&self) -> bool {
        self.value.is_error()
    }

    pub fn error(&self) -> Option<&CellError> {
        self.value.as_error()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(|e| e.kind)
    }

    /// Human-readable error message, if the cell is an error
    pub fn error_message(&self) -> Option<&str> {
        self.error().map(|e| e.message.as_str())
    }
}

/// Results for every non-blank cell of an evaluated sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResult {
    cells: BTreeMap<CellAddress, CellResult>,
}

impl EvaluationResult {
    /// Result for an address string (e.g., "B3")
    pub fn get(&self, address: &str) -> Option<&CellResult> {
        CellAddress::parse(address)
            .ok()
            .and_then(|addr| self.cells.get(&addr))
    }

    pub fn get_at(&self, addr: CellAddress) -> Option<&CellResult> {
        self.cells.get(&addr)
    }

    /// Iterate over results in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (CellAddress, &CellResult)> + '_ {
        self.cells.iter().map(|(addr, result)| (*addr, result))
    }

    /// Iterate over error cells in row-major order
    pub fn errors(&self) -> impl Iterator<Item = (CellAddress, &CellError)> + '_ {
        self.cells
            .iter()
            .filter_map(|(addr, result)| result.error().map(|e| (*addr, e)))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Lets lazy functions evaluate their arguments on demand
pub trait ArgumentEvaluator {
    /// Evaluate an argument expression; ranges come back as lists
    fn evaluate(&mut self, expr: &FormulaExpr) -> FormulaValue;

    /// Evaluate an argument expression to a single value
    fn evaluate_scalar(&mut self, expr: &FormulaExpr) -> FormulaValue {
        self.evaluate(expr).into_scalar()
    }
}

/// Evaluate every non-blank cell of the context's sheet
pub fn evaluate_sheet(ctx: &EvaluationContext<'_>) -> EvaluationResult {
    evaluate_sheet_with_cache(ctx, &mut ParseCache::new())
}

/// Evaluate every non-blank cell, reusing parses from `cache`
pub fn evaluate_sheet_with_cache(
    ctx: &EvaluationContext<'_>,
    cache: &mut ParseCache,
) -> EvaluationResult {
    let span = info_span!("evaluate_sheet", page_id = %ctx.page_id, cells = ctx.sheet.len());
    let _guard = span.enter();

    let mut pass = Pass::new(ctx, cache);
    let mut result = EvaluationResult::default();
    for (addr, _) in ctx.sheet.non_blank() {
        let value = pass.evaluate_cell(CellKey::new(ROOT_PAGE, addr));
        result.cells.insert(addr, CellResult::new(value.into()));
    }

    debug!(
        cells = result.len(),
        errors = result.errors().count(),
        pages = pass.pages.len(),
        "sheet evaluated"
    );
    result
}

/// Evaluate a standalone formula against the context's sheet, as if it were
/// typed into a cell that nothing else references
pub fn evaluate_formula(ctx: &EvaluationContext<'_>, formula: &str) -> CellResult {
    let expr = match parse_formula(formula) {
        Ok(expr) => expr,
        Err(e) => return CellResult::new(CellValue::Error(e.to_cell_error())),
    };
    let mut cache = ParseCache::new();
    let mut pass = Pass::new(ctx, &mut cache);
    let value = pass.evaluate_expr(&expr, ROOT_PAGE).into_scalar();
    CellResult::new(finish(value).into())
}

const ROOT_PAGE: usize = 0;

/// A cell on one of the sheets loaded during a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CellKey {
    page: usize,
    address: CellAddress,
}

impl CellKey {
    fn new(page: usize, address: CellAddress) -> Self {
        Self { page, address }
    }
}

/// A loaded sheet; the root is borrowed, resolved pages are shared
#[derive(Clone)]
enum PageSheet<'a> {
    Root(&'a Sheet),
    Remote(Arc<Sheet>),
}

impl Deref for PageSheet<'_> {
    type Target = Sheet;

    fn deref(&self) -> &Sheet {
        match self {
            PageSheet::Root(sheet) => sheet,
            PageSheet::Remote(sheet) => sheet,
        }
    }
}

struct LoadedPage<'a> {
    page_id: String,
    sheet: PageSheet<'a>,
    graph: DependencyGraph,
}

/// State of one evaluation pass
struct Pass<'c, 'a> {
    ctx: &'c EvaluationContext<'a>,
    cache: &'c mut ParseCache,
    /// Sheets by page index; index 0 is the root
    pages: Vec<LoadedPage<'a>>,
    /// Page id → page index
    page_index: AHashMap<String, usize>,
    /// Reference identifier → resolution outcome
    resolutions: AHashMap<String, Result<usize, ResolveError>>,
    /// Finished formula cells
    memo: AHashMap<CellKey, FormulaValue>,
    /// Active visitation stack
    stack: Vec<CellKey>,
    /// Stack position of every key on the stack
    on_stack: AHashMap<CellKey, usize>,
    /// Stack entries found to lie on a cycle
    circular: AHashSet<CellKey>,
}

impl<'c, 'a> Pass<'c, 'a> {
    fn new(ctx: &'c EvaluationContext<'a>, cache: &'c mut ParseCache) -> Self {
        let mut pass = Self {
            ctx,
            cache,
            pages: Vec::new(),
            page_index: AHashMap::new(),
            resolutions: AHashMap::new(),
            memo: AHashMap::new(),
            stack: Vec::new(),
            on_stack: AHashMap::new(),
            circular: AHashSet::new(),
        };
        pass.load_page(ctx.page_id.clone(), PageSheet::Root(ctx.sheet));
        pass
    }

    /// Register a sheet and pre-mark the members of its local cycles
    fn load_page(&mut self, page_id: String, sheet: PageSheet<'a>) -> usize {
        let index = self.pages.len();
        let graph = DependencyGraph::build(&sheet, self.cache);
        let report = graph.find_cycles();
        if !report.is_empty() {
            debug!(
                page_id = %page_id,
                cycles = report.cycles.len(),
                cells = report.members.len(),
                "local cycles detected"
            );
        }
        for addr in report.members {
            self.memo.insert(
                CellKey::new(index, addr),
                FormulaValue::Error(CellError::circular()),
            );
        }
        self.page_index.insert(page_id.clone(), index);
        self.pages.push(LoadedPage {
            page_id,
            sheet,
            graph,
        });
        index
    }

    fn sheet(&self, page: usize) -> PageSheet<'a> {
        self.pages[page].sheet.clone()
    }

    // === Cells ===

    fn evaluate_cell(&mut self, key: CellKey) -> FormulaValue {
        if let Some(value) = self.memo.get(&key) {
            return value.clone();
        }

        if let Some(&position) = self.on_stack.get(&key) {
            self.mark_cycle(position);
            return FormulaValue::Error(CellError::circular());
        }

        let sheet = self.sheet(key.page);
        let source = match sheet.input_at(key.address) {
            CellInput::Blank => return FormulaValue::Empty,
            CellInput::Number(n) => return FormulaValue::Number(n),
            CellInput::Text(s) => return FormulaValue::String(s.to_string()),
            CellInput::Formula(source) => source,
        };

        self.evaluate_precedents(key);
        // A cross-page loop among the precedents may have come back here
        if let Some(value) = self.memo.get(&key) {
            return value.clone();
        }

        if self.stack.len() >= self.ctx.options.max_depth {
            return FormulaValue::Error(CellError::value("Reference chain too deep"));
        }

        trace!(page = %self.pages[key.page].page_id, cell = %key.address, "evaluating cell");

        self.on_stack.insert(key, self.stack.len());
        self.stack.push(key);

        let parsed = self.cache.get_or_parse(source);
        let value = match parsed.as_ref() {
            Ok(expr) => finish(self.evaluate_expr(expr, key.page).into_scalar()),
            Err(e) => FormulaValue::Error(e.to_cell_error()),
        };

        self.stack.pop();
        self.on_stack.remove(&key);

        let value = if self.circular.remove(&key) {
            FormulaValue::Error(CellError::circular())
        } else {
            value
        };

        self.memo.insert(key, value.clone());
        value
    }

    /// Evaluate the unfinished local precedents of `key`, deepest first
    fn evaluate_precedents(&mut self, key: CellKey) {
        for address in self.pending_precedents(key) {
            self.evaluate_cell(CellKey::new(key.page, address));
        }
    }

    /// Unfinished formula cells `key` depends on through local references,
    /// in post-order: every cell comes after its own precedents.
    ///
    /// Cells already on the visitation stack are left out; reading them
    /// closes a cycle as usual.
    fn pending_precedents(&self, key: CellKey) -> Vec<CellAddress> {
        let page = &self.pages[key.page];
        let pending = |address: &CellAddress| {
            let cell = CellKey::new(key.page, *address);
            page.sheet.is_formula(*address)
                && !self.memo.contains_key(&cell)
                && !self.on_stack.contains_key(&cell)
        };
        let unfinished = |address: CellAddress| -> Vec<CellAddress> {
            page.graph.precedents(address).filter(|a| pending(a)).collect()
        };

        let mut order = Vec::new();
        let mut seen = AHashSet::new();
        seen.insert(key.address);
        let mut work = vec![(key.address, unfinished(key.address))];

        while let Some((_, children)) = work.last_mut() {
            match children.pop() {
                Some(child) => {
                    if seen.insert(child) {
                        work.push((child, unfinished(child)));
                    }
                }
                None => {
                    if let Some((address, _)) = work.pop() {
                        if address != key.address {
                            order.push(address);
                        }
                    }
                }
            }
        }
        order
    }

    /// Mark every stack entry from `position` to the top as circular
    fn mark_cycle(&mut self, position: usize) {
        let cycle = &self.stack[position..];
        if cycle.iter().any(|key| key.page != cycle[0].page) {
            let path: Vec<String> = cycle
                .iter()
                .map(|key| format!("{}!{}", self.pages[key.page].page_id, key.address))
                .collect();
            debug!(path = ?path, "cross-sheet cycle detected");
        }
        self.circular.extend(cycle.iter().copied());
    }

    /// A cell as seen by a formula that references it
    fn read_cell(&mut self, page: usize, address: CellAddress) -> FormulaValue {
        match self.evaluate_cell(CellKey::new(page, address)) {
            FormulaValue::Error(e) => FormulaValue::Error(e.propagated()),
            value => value,
        }
    }

    fn read_range(&mut self, page: usize, range: CellRange) -> FormulaValue {
        let sheet = self.sheet(page);
        let items = match range.clamp_to(sheet.rows(), sheet.cols()) {
            Some(clamped) => clamped
                .cells()
                .map(|addr| self.read_cell(page, addr))
                .collect(),
            None => Vec::new(),
        };
        FormulaValue::List(items)
    }

    // === Pages ===

    fn resolve_page(&mut self, page: &PageRef) -> Result<usize, CellError> {
        if page.identifier == self.ctx.page_id {
            return Ok(ROOT_PAGE);
        }

        let outcome = match self.resolutions.get(&page.identifier) {
            Some(outcome) => outcome.clone(),
            None => {
                let outcome = self.fetch_page(page);
                self.resolutions
                    .insert(page.identifier.clone(), outcome.clone());
                outcome
            }
        };

        outcome.map_err(|e| CellError::reference(e.message))
    }

    fn fetch_page(&mut self, page: &PageRef) -> Result<usize, ResolveError> {
        match self.ctx.resolver.resolve(page) {
            Ok(resolved) => {
                debug!(
                    identifier = %page.identifier,
                    page_id = %resolved.page_id,
                    title = %resolved.page_title,
                    "page resolved"
                );
                if let Some(&index) = self.page_index.get(&resolved.page_id) {
                    return Ok(index);
                }
                Ok(self.load_page(resolved.page_id, PageSheet::Remote(resolved.sheet)))
            }
            Err(e) => {
                debug!(
                    identifier = %page.identifier,
                    title = ?e.page_title,
                    error = %e.message,
                    "page resolution failed"
                );
                Err(e)
            }
        }
    }

    // === Expressions ===

    fn evaluate_expr(&mut self, expr: &FormulaExpr, page: usize) -> FormulaValue {
        match expr {
            // === Literals ===
            FormulaExpr::Number(n) => FormulaValue::Number(*n),
            FormulaExpr::String(s) => FormulaValue::String(s.clone()),
            FormulaExpr::Boolean(b) => FormulaValue::Boolean(*b),

            // === References ===
            FormulaExpr::CellRef(reference) => self.evaluate_reference(reference, page),

            // === Operators ===
            FormulaExpr::BinaryOp { op, left, right } => {
                let left = self.evaluate_expr(left, page).into_scalar();
                let right = self.evaluate_expr(right, page).into_scalar();
                evaluate_binary_op(*op, left, right)
            }
            FormulaExpr::UnaryOp { op, operand } => {
                let value = self.evaluate_expr(operand, page).into_scalar();
                evaluate_unary_op(*op, value)
            }

            // === Functions ===
            FormulaExpr::Function { name, args } => self.evaluate_function(name, args, page),
        }
    }

    fn evaluate_reference(&mut self, reference: &CellReference, page: usize) -> FormulaValue {
        match reference {
            CellReference::Local(addr) => self.read_cell(page, *addr),
            CellReference::LocalRange(range) => self.read_range(page, *range),
            CellReference::CrossPage { page: page_ref, target } => {
                let target_page = match self.resolve_page(page_ref) {
                    Ok(index) => index,
                    Err(e) => return FormulaValue::Error(e),
                };
                match target {
                    PageTarget::Cell(addr) => self.read_cell(target_page, *addr),
                    PageTarget::Range(range) => self.read_range(target_page, *range),
                    PageTarget::WholeSheet => match self.ctx.options.whole_sheet {
                        WholeSheetPolicy::Grid => match self.sheet(target_page).extent() {
                            Some(extent) => self.read_range(target_page, extent),
                            None => FormulaValue::List(Vec::new()),
                        },
                        WholeSheetPolicy::DefaultCell(addr) => self.read_cell(target_page, addr),
                        WholeSheetPolicy::Reject => FormulaValue::Error(CellError::reference(
                            "Whole-sheet reference needs a cell or range",
                        )),
                    },
                }
            }
        }
    }

    fn evaluate_function(&mut self, name: &str, args: &[FormulaExpr], page: usize) -> FormulaValue {
        let registry = self.ctx.registry;

        let func = match registry.get(name) {
            Some(func) => func,
            None => {
                return FormulaValue::Error(
                    FormulaError::UnknownFunction(name.to_string()).to_cell_error(),
                )
            }
        };

        if let Err(e) = func.check_arity(args.len()) {
            return FormulaValue::Error(e.to_cell_error());
        }

        let result = match func.implementation {
            FunctionImpl::Eager(implementation) => {
                let mut evaluated_args = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated_args.push(self.evaluate_expr(arg, page));
                }

                // Errors propagate, first one wins
                if let Some(e) = evaluated_args.iter().find_map(FormulaValue::first_error) {
                    return FormulaValue::Error(e.clone());
                }

                implementation(&evaluated_args)
            }
            FunctionImpl::Lazy(implementation) => {
                let mut evaluator = PageEvaluator { pass: self, page };
                implementation(args, &mut evaluator)
            }
        };

        match result {
            Ok(value) => check_finite(value),
            Err(e) => FormulaValue::Error(e.to_cell_error()),
        }
    }
}

struct PageEvaluator<'p, 'c, 'a> {
    pass: &'p mut Pass<'c, 'a>,
    page: usize,
}

impl ArgumentEvaluator for PageEvaluator<'_, '_, '_> {
    fn evaluate(&mut self, expr: &FormulaExpr) -> FormulaValue {
        self.pass.evaluate_expr(expr, self.page)
    }
}

/// Final value of a formula cell
fn finish(value: FormulaValue) -> FormulaValue {
    match check_finite(value) {
        FormulaValue::Empty => FormulaValue::Number(0.0),
        value => value,
    }
}

fn check_finite(value: FormulaValue) -> FormulaValue {
    match value {
        FormulaValue::Number(n) if !n.is_finite() => {
            FormulaValue::Error(CellError::value("Numeric overflow"))
        }
        value => value,
    }
}

/// Evaluate a binary operation on already-evaluated operands
fn evaluate_binary_op(op: BinaryOperator, left: FormulaValue, right: FormulaValue) -> FormulaValue {
    // Propagate errors
    if let FormulaValue::Error(e) = left {
        return FormulaValue::Error(e);
    }
    if let FormulaValue::Error(e) = right {
        return FormulaValue::Error(e);
    }

    match op {
        // Arithmetic operators
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide => {
            let (l, r) = match (left.to_number(), right.to_number()) {
                (Ok(l), Ok(r)) => (l, r),
                (Err(e), _) | (_, Err(e)) => return FormulaValue::Error(e.to_cell_error()),
            };
            let result = match op {
                BinaryOperator::Add => l + r,
                BinaryOperator::Subtract => l - r,
                BinaryOperator::Multiply => l * r,
                _ => {
                    if r == 0.0 {
                        return FormulaValue::Error(CellError::div0());
                    }
                    l / r
                }
            };
            check_finite(FormulaValue::Number(result))
        }

        // Comparison operators
        BinaryOperator::Equal => FormulaValue::Boolean(compare_values(&left, &right).is_eq()),
        BinaryOperator::NotEqual => FormulaValue::Boolean(compare_values(&left, &right).is_ne()),
        BinaryOperator::LessThan => FormulaValue::Boolean(compare_values(&left, &right).is_lt()),
        BinaryOperator::LessEqual => FormulaValue::Boolean(compare_values(&left, &right).is_le()),
        BinaryOperator::GreaterThan => {
            FormulaValue::Boolean(compare_values(&left, &right).is_gt())
        }
        BinaryOperator::GreaterEqual => {
            FormulaValue::Boolean(compare_values(&left, &right).is_ge())
        }

        // Concatenation
        BinaryOperator::Concat => {
            FormulaValue::String(left.as_string() + &right.as_string())
        }
    }
}

/// Compare two values for ordering.
///
/// Numbers compare numerically and text case-insensitively. Across types,
/// numbers sort before text, which sorts before booleans. A blank takes the
/// type of the other side.
fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    let left = blank_as(left, right);
    let right = blank_as(right, &left);

    match (&left, &right) {
        (FormulaValue::Number(l), FormulaValue::Number(r)) => {
            l.partial_cmp(r).unwrap_or(Ordering::Equal)
        }
        (FormulaValue::String(l), FormulaValue::String(r)) => {
            l.to_lowercase().cmp(&r.to_lowercase())
        }
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l.cmp(r),

        // Mixed types: number < string < boolean
        (FormulaValue::Number(_), _) => Ordering::Less,
        (_, FormulaValue::Number(_)) => Ordering::Greater,
        (FormulaValue::String(_), _) => Ordering::Less,
        (_, FormulaValue::String(_)) => Ordering::Greater,

        _ => Ordering::Equal,
    }
}

fn blank_as(value: &FormulaValue, other: &FormulaValue) -> FormulaValue {
    match (value, other) {
        (FormulaValue::Empty, FormulaValue::String(_)) => FormulaValue::String(String::new()),
        (FormulaValue::Empty, FormulaValue::Boolean(_)) => FormulaValue::Boolean(false),
        (FormulaValue::Empty, _) => FormulaValue::Number(0.0),
        (value, _) => value.clone(),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(op: UnaryOperator, value: FormulaValue) -> FormulaValue {
    // Propagate errors
    if let FormulaValue::Error(e) = value {
        return FormulaValue::Error(e);
    }

    match op {
        UnaryOperator::Negate => match value.to_number() {
            Ok(n) => FormulaValue::Number(-n),
            Err(e) => FormulaValue::Error(e.to_cell_error()),
        },
    }
}

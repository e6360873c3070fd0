//! Workbook calculator: cell storage, dependency tracking and batched
//! recalculation.
//!
//! A [`Calculator`] is built from a decoded document, recalculates every
//! formula once so cached values are consistent, and then accepts write
//! batches. Each batch reports exactly the cells whose value changed,
//! including downstream formula results.

use std::collections::{HashMap, HashSet};

use footprint_fwb::FwbDocument;
use footprint_model::CellRef;

#[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
use rayon::prelude::*;

use crate::ast::{CompiledExpr, Expr, ParsedExpr, SheetRef};
use crate::eval::{Evaluator, Reference, ValueResolver, MAX_NAME_DEPTH};
use crate::parallel;
use crate::parser::parse_formula;
use crate::value::{ErrorKind, Value};

pub type SheetId = usize;

/// Grid coordinate qualified with its sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: SheetId,
    pub addr: CellRef,
}

/// One input write in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    pub sheet: SheetId,
    pub addr: CellRef,
    pub value: Value,
}

/// A cell whose value differs after a batch, written inputs included.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedChange {
    pub sheet: SheetId,
    pub addr: CellRef,
    pub value: Value,
}

#[derive(Debug)]
struct Cell {
    value: Value,
    formula: Option<String>,
    ast: Option<CompiledExpr>,
}

#[derive(Debug)]
struct Sheet {
    name: String,
    cells: HashMap<CellRef, Cell>,
}

#[derive(Debug, Default)]
struct Workbook {
    sheets: Vec<Sheet>,
    /// Lowercased sheet name to index; sheet lookup is case-insensitive.
    ids: HashMap<String, SheetId>,
}

impl Workbook {
    fn add_sheet(&mut self, name: &str) -> SheetId {
        if let Some(&id) = self.ids.get(&name.to_lowercase()) {
            return id;
        }
        let id = self.sheets.len();
        self.sheets.push(Sheet {
            name: name.to_string(),
            cells: HashMap::new(),
        });
        self.ids.insert(name.to_lowercase(), id);
        id
    }

    fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.ids.get(&name.to_lowercase()).copied()
    }

    fn ast_of(&self, key: CellKey) -> Option<&CompiledExpr> {
        self.sheets.get(key.sheet)?.cells.get(&key.addr)?.ast.as_ref()
    }

    fn value_at(&self, sheet: SheetId, addr: CellRef) -> Value {
        self.sheets
            .get(sheet)
            .and_then(|s| s.cells.get(&addr))
            .map(|c| c.value.clone())
            .unwrap_or(Value::Blank)
    }
}

/// Defined names, keyed by scope and uppercased symbol.
#[derive(Debug, Default)]
struct NameTable {
    entries: HashMap<(Option<SheetId>, String), CompiledExpr>,
}

impl NameTable {
    fn insert(&mut self, scope: Option<SheetId>, name: &str, body: CompiledExpr) {
        self.entries.insert((scope, name.to_uppercase()), body);
    }

    fn resolve(&self, sheet: SheetId, name: &str) -> Option<&CompiledExpr> {
        let key = name.to_uppercase();
        if let Some(body) = self.entries.get(&(Some(sheet), key.clone())) {
            return Some(body);
        }
        self.entries.get(&(None, key))
    }
}

/// Forward and reverse reference edges between formula cells and the cells
/// they read.
#[derive(Debug, Default)]
struct DependencyGraph {
    precedents: HashMap<CellKey, HashSet<CellKey>>,
    dependents: HashMap<CellKey, HashSet<CellKey>>,
}

impl DependencyGraph {
    fn set_precedents(&mut self, key: CellKey, precedents: HashSet<CellKey>) {
        if let Some(old) = self.precedents.remove(&key) {
            for p in old {
                if let Some(set) = self.dependents.get_mut(&p) {
                    set.remove(&key);
                    if set.is_empty() {
                        self.dependents.remove(&p);
                    }
                }
            }
        }
        for &p in &precedents {
            self.dependents.entry(p).or_default().insert(key);
        }
        if !precedents.is_empty() {
            self.precedents.insert(key, precedents);
        }
    }

    fn clear_cell(&mut self, key: CellKey) {
        self.set_precedents(key, HashSet::new());
    }

    /// Transitive dependents of `start`, excluding `start` itself unless it
    /// sits on a cycle back to itself.
    fn collect_dependents(&self, start: CellKey, out: &mut HashSet<CellKey>) {
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            if let Some(deps) = self.dependents.get(&key) {
                for &dep in deps {
                    if out.insert(dep) {
                        stack.push(dep);
                    }
                }
            }
        }
    }
}

/// Immutable value view used during a recalculation pass. Results are folded
/// back in level by level so later levels observe earlier ones.
struct Snapshot<'a> {
    values: Vec<HashMap<CellRef, Value>>,
    names: &'a NameTable,
}

impl<'a> Snapshot<'a> {
    fn capture(workbook: &Workbook, names: &'a NameTable) -> Self {
        Snapshot {
            values: workbook
                .sheets
                .iter()
                .map(|sheet| {
                    sheet
                        .cells
                        .iter()
                        .map(|(&addr, cell)| (addr, cell.value.clone()))
                        .collect()
                })
                .collect(),
            names,
        }
    }
}

impl ValueResolver for Snapshot<'_> {
    fn cell_value(&self, sheet: usize, addr: CellRef) -> Value {
        self.values
            .get(sheet)
            .and_then(|cells| cells.get(&addr))
            .cloned()
            .unwrap_or(Value::Blank)
    }

    fn resolve_name(&self, sheet: usize, name: &str) -> Option<&CompiledExpr> {
        self.names.resolve(sheet, name)
    }
}

pub struct Calculator {
    workbook: Workbook,
    names: NameTable,
    graph: DependencyGraph,
    dirty: HashSet<CellKey>,
}

impl Calculator {
    /// Load a decoded document and bring every formula result up to date.
    ///
    /// Malformed formulas and names never fail the load: the offending cell
    /// evaluates to `#NAME?` (or `#REF!` for unknown sheets) and the problem
    /// is logged.
    pub fn from_document(doc: &FwbDocument) -> Calculator {
        let mut workbook = Workbook::default();
        for sheet in &doc.sheets {
            workbook.add_sheet(&sheet.name);
        }

        let mut calc = Calculator {
            workbook,
            names: NameTable::default(),
            graph: DependencyGraph::default(),
            dirty: HashSet::new(),
        };

        for named in &doc.names {
            let scope = match &named.scope {
                Some(sheet_name) => match calc.workbook.sheet_id(sheet_name) {
                    Some(id) => Some(id),
                    None => {
                        log::warn!(
                            "defined name {:?} is scoped to unknown sheet {sheet_name:?}, skipping",
                            named.name
                        );
                        continue;
                    }
                },
                None => None,
            };
            match parse_formula(&named.expr) {
                Ok(parsed) => {
                    let body = compile_expr(parsed, &calc.workbook);
                    calc.names.insert(scope, &named.name, body);
                }
                Err(err) => {
                    log::warn!("defined name {:?} has an unparseable body: {err}", named.name);
                }
            }
        }

        for (sheet_idx, sheet) in doc.sheets.iter().enumerate() {
            for (&row, stored_row) in &sheet.rows {
                for (&col, stored) in &stored_row.cells {
                    let addr = CellRef { row, col };
                    let value = Value::from_stored(&stored.value);
                    let (formula, ast) = match &stored.formula {
                        Some(text) => match parse_formula(text) {
                            Ok(parsed) => (
                                Some(text.clone()),
                                Some(compile_expr(parsed, &calc.workbook)),
                            ),
                            Err(err) => {
                                log::warn!(
                                    "unparseable formula at {}!{addr}: {err}",
                                    sheet.name
                                );
                                (Some(text.clone()), Some(Expr::Error(ErrorKind::Name)))
                            }
                        },
                        None => (None, None),
                    };
                    if ast.is_some() {
                        calc.dirty.insert(CellKey {
                            sheet: sheet_idx,
                            addr,
                        });
                    }
                    if let Some(s) = calc.workbook.sheets.get_mut(sheet_idx) {
                        s.cells.insert(addr, Cell { value, formula, ast });
                    }
                }
            }
        }

        calc.rebuild_graph();
        calc.recalculate();
        calc
    }

    pub fn sheet_count(&self) -> usize {
        self.workbook.sheets.len()
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.workbook.sheet_id(name)
    }

    pub fn sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.workbook.sheets.get(sheet).map(|s| s.name.as_str())
    }

    pub fn value_at(&self, sheet: SheetId, addr: CellRef) -> Value {
        self.workbook.value_at(sheet, addr)
    }

    pub fn has_formula(&self, sheet: SheetId, addr: CellRef) -> bool {
        self.workbook
            .sheets
            .get(sheet)
            .and_then(|s| s.cells.get(&addr))
            .is_some_and(|c| c.formula.is_some())
    }

    /// Apply a batch of input writes atomically and recalculate.
    ///
    /// Returns every cell whose value differs from before the batch, sorted
    /// by sheet, row, column. An empty batch does nothing and reports
    /// nothing.
    pub fn apply_batch(&mut self, writes: &[CellWrite]) -> Vec<ExportedChange> {
        if writes.is_empty() {
            return Vec::new();
        }

        let mut affected: HashSet<CellKey> = HashSet::new();
        for write in writes {
            let key = CellKey {
                sheet: write.sheet,
                addr: write.addr,
            };
            affected.insert(key);
            self.graph.collect_dependents(key, &mut affected);
        }

        let before: HashMap<CellKey, Value> = affected
            .iter()
            .map(|&key| (key, self.workbook.value_at(key.sheet, key.addr)))
            .collect();

        for write in writes {
            self.write_value(
                CellKey {
                    sheet: write.sheet,
                    addr: write.addr,
                },
                write.value.clone(),
            );
        }
        for &key in &affected {
            if self.workbook.ast_of(key).is_some() {
                self.dirty.insert(key);
            }
        }
        self.recalculate();

        let mut changes: Vec<ExportedChange> = affected
            .into_iter()
            .filter_map(|key| {
                let now = self.workbook.value_at(key.sheet, key.addr);
                if before.get(&key) == Some(&now) {
                    None
                } else {
                    Some(ExportedChange {
                        sheet: key.sheet,
                        addr: key.addr,
                        value: now,
                    })
                }
            })
            .collect();
        changes.sort_by_key(|c| (c.sheet, c.addr));
        changes
    }

    /// Replace a cell's content with a literal value. Any formula the cell
    /// carried is dropped along with its reference edges.
    ///
    /// Written text is always data: a leading apostrophe is the literal-text
    /// marker and only the remainder is stored, and text starting with `=`
    /// is stored verbatim, never parsed as a formula.
    fn write_value(&mut self, key: CellKey, value: Value) {
        let value = match value {
            Value::Text(s) => match s.strip_prefix('\'') {
                Some(rest) => Value::Text(rest.to_string()),
                None => Value::Text(s),
            },
            other => other,
        };
        let Some(sheet) = self.workbook.sheets.get_mut(key.sheet) else {
            log::warn!("write to unknown sheet index {}", key.sheet);
            return;
        };
        let cell = sheet.cells.entry(key.addr).or_insert_with(|| Cell {
            value: Value::Blank,
            formula: None,
            ast: None,
        });
        cell.value = value;
        cell.formula = None;
        cell.ast = None;
        self.graph.clear_cell(key);
        self.dirty.remove(&key);
    }

    fn rebuild_graph(&mut self) {
        self.graph = DependencyGraph::default();
        let mut edges: Vec<(CellKey, HashSet<CellKey>)> = Vec::new();
        for (sheet_idx, sheet) in self.workbook.sheets.iter().enumerate() {
            for (&addr, cell) in &sheet.cells {
                if let Some(ast) = &cell.ast {
                    let mut precedents = HashSet::new();
                    analyze_expr(ast, sheet_idx, &self.names, &mut precedents, 0);
                    edges.push((
                        CellKey {
                            sheet: sheet_idx,
                            addr,
                        },
                        precedents,
                    ));
                }
            }
        }
        for (key, precedents) in edges {
            self.graph.set_precedents(key, precedents);
        }
    }

    /// Re-evaluate dirty formula cells level by level. Each level holds
    /// cells with no unevaluated precedents left, so its members are
    /// independent and can be computed in parallel. Cells that never become
    /// ready sit on a reference cycle and are set to `#CALC!`.
    fn recalculate(&mut self) {
        if self.dirty.is_empty() {
            return;
        }

        let dirty = std::mem::take(&mut self.dirty);
        let mut remaining: HashSet<CellKey> = dirty
            .into_iter()
            .filter(|&key| self.workbook.ast_of(key).is_some())
            .collect();

        let mut indegree: HashMap<CellKey, usize> = remaining
            .iter()
            .map(|&key| {
                let degree = self
                    .graph
                    .precedents
                    .get(&key)
                    .map_or(0, |ps| ps.iter().filter(|p| remaining.contains(p)).count());
                (key, degree)
            })
            .collect();

        let mut ready: Vec<CellKey> = indegree
            .iter()
            .filter_map(|(&key, &degree)| (degree == 0).then_some(key))
            .collect();
        ready.sort_unstable();

        let mut snapshot = Snapshot::capture(&self.workbook, &self.names);

        while !ready.is_empty() {
            let level = std::mem::take(&mut ready);

            let results: Vec<(CellKey, Value)> = {
                let workbook = &self.workbook;
                let snap = &snapshot;
                parallel::install(|| {
                    #[cfg(all(feature = "parallel", not(target_arch = "wasm32")))]
                    {
                        level
                            .par_iter()
                            .map(|&key| (key, evaluate_cell(workbook, snap, key)))
                            .collect()
                    }
                    #[cfg(not(all(feature = "parallel", not(target_arch = "wasm32"))))]
                    {
                        level
                            .iter()
                            .map(|&key| (key, evaluate_cell(workbook, snap, key)))
                            .collect()
                    }
                })
            };

            for (key, value) in results {
                remaining.remove(&key);
                store(&mut self.workbook, &mut snapshot, key, value);
                if let Some(deps) = self.graph.dependents.get(&key) {
                    for &dep in deps {
                        if !remaining.contains(&dep) {
                            continue;
                        }
                        if let Some(degree) = indegree.get_mut(&dep) {
                            if *degree > 0 {
                                *degree -= 1;
                                if *degree == 0 {
                                    ready.push(dep);
                                }
                            }
                        }
                    }
                }
            }
            ready.sort_unstable();
        }

        if !remaining.is_empty() {
            let mut cycle: Vec<CellKey> = remaining.into_iter().collect();
            cycle.sort_unstable();
            for key in cycle {
                store(
                    &mut self.workbook,
                    &mut snapshot,
                    key,
                    Value::Error(ErrorKind::Calc),
                );
            }
        }
    }
}

fn evaluate_cell(workbook: &Workbook, snapshot: &Snapshot<'_>, key: CellKey) -> Value {
    match workbook.ast_of(key) {
        Some(ast) => Evaluator::new(snapshot, key.sheet).eval(ast),
        None => snapshot.cell_value(key.sheet, key.addr),
    }
}

fn store(workbook: &mut Workbook, snapshot: &mut Snapshot<'_>, key: CellKey, value: Value) {
    if let Some(sheet) = workbook.sheets.get_mut(key.sheet) {
        if let Some(cell) = sheet.cells.get_mut(&key.addr) {
            cell.value = value.clone();
        }
    }
    if let Some(values) = snapshot.values.get_mut(key.sheet) {
        values.insert(key.addr, value);
    }
}

/// Map sheet names in a parsed expression to workbook indices. A reference
/// to a sheet that does not exist poisons the whole expression to `#REF!`.
fn compile_expr(parsed: ParsedExpr, workbook: &Workbook) -> CompiledExpr {
    let mut unknown = false;
    let compiled = parsed.map_sheets(&mut |name: String| match workbook.sheet_id(&name) {
        Some(id) => id,
        None => {
            unknown = true;
            0
        }
    });
    if unknown {
        Expr::Error(ErrorKind::Ref)
    } else {
        compiled
    }
}

/// Collect the cells an expression reads. Ranges contribute every covered
/// cell and defined names contribute their body's reads, so a write to any
/// precedent reaches the dependent through the graph.
fn analyze_expr(
    expr: &CompiledExpr,
    current_sheet: SheetId,
    names: &NameTable,
    out: &mut HashSet<CellKey>,
    name_depth: usize,
) {
    match expr {
        Expr::Number(_) | Expr::Text(_) | Expr::Bool(_) | Expr::Error(_) => {}
        Expr::CellRef(r) => {
            out.insert(CellKey {
                sheet: sheet_of(&r.sheet, current_sheet),
                addr: r.addr,
            });
        }
        Expr::RangeRef(r) => {
            let sheet = sheet_of(&r.sheet, current_sheet);
            let reference = Reference {
                sheet,
                start: r.start,
                end: r.end,
            }
            .normalized();
            for addr in reference.iter_cells() {
                out.insert(CellKey { sheet, addr });
            }
        }
        Expr::NameRef(name) => {
            if name_depth < MAX_NAME_DEPTH {
                if let Some(body) = names.resolve(current_sheet, name) {
                    analyze_expr(body, current_sheet, names, out, name_depth + 1);
                }
            }
        }
        Expr::Unary { expr, .. } | Expr::Percent(expr) => {
            analyze_expr(expr, current_sheet, names, out, name_depth);
        }
        Expr::Binary { left, right, .. } | Expr::Compare { left, right, .. } => {
            analyze_expr(left, current_sheet, names, out, name_depth);
            analyze_expr(right, current_sheet, names, out, name_depth);
        }
        Expr::FunctionCall { args, .. } => {
            for arg in args {
                analyze_expr(arg, current_sheet, names, out, name_depth);
            }
        }
    }
}

fn sheet_of(sheet: &SheetRef<usize>, current: SheetId) -> SheetId {
    match sheet {
        SheetRef::Current => current,
        SheetRef::Sheet(id) => *id,
    }
}

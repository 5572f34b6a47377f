//! Symbol metadata extracted from CEL trees.

use std::collections::HashMap;
use std::ops::Range;

use cel_core::{types::Expr, SpannedExpr};

use super::cel::{CelRoot, CelTree};
use super::template::OffsetMapper;
use super::MetadataExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    /// A referenced variable or identifier.
    Variable,
    /// A called function or method.
    Function,
    /// A selected field.
    Field,
}

/// A symbol and where it first appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Byte span of the first occurrence, in host document coordinates.
    pub span: Range<usize>,
    pub occurrences: usize,
}

/// Symbols in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: HashMap<(SymbolKind, String), usize>,
}

impl SymbolTable {
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn get(&self, kind: SymbolKind, name: &str) -> Option<&Symbol> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&i| &self.symbols[i])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn record(&mut self, kind: SymbolKind, name: &str, span: Range<usize>) {
        // Macro expansion introduces synthetic accumulators.
        if name.is_empty() || name.starts_with('@') || name.starts_with("__") {
            return;
        }
        match self.index.get(&(kind, name.to_string())) {
            Some(&i) => self.symbols[i].occurrences += 1,
            None => {
                self.index
                    .insert((kind, name.to_string()), self.symbols.len());
                self.symbols.push(Symbol {
                    name: name.to_string(),
                    kind,
                    span,
                    occurrences: 1,
                });
            }
        }
    }
}

/// Builds a `SymbolTable` from a `CelTree`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymbolExtractor;

impl MetadataExtractor<CelTree> for SymbolExtractor {
    type Metadata = SymbolTable;

    fn build(&self, tree: &CelTree) -> SymbolTable {
        let mut table = SymbolTable::default();
        for CelRoot { ast, mapper } in &tree.roots {
            let mut collector = Collector {
                table: &mut table,
                mapper: *mapper,
            };
            collector.visit(ast);
        }
        table
    }
}

struct Collector<'a> {
    table: &'a mut SymbolTable,
    mapper: OffsetMapper,
}

impl Collector<'_> {
    fn record(&mut self, kind: SymbolKind, name: &str, span: &Range<usize>) {
        self.table.record(kind, name, self.mapper.span_to_host(span));
    }

    /// Span of the trailing `field` in a member expression.
    fn field_span(expr: &SpannedExpr, field: &str) -> Range<usize> {
        expr.span.end.saturating_sub(field.len())..expr.span.end
    }

    fn visit(&mut self, expr: &SpannedExpr) {
        match &expr.node {
            Expr::Null | Expr::Bool(_) | Expr::Int(_) | Expr::UInt(_) | Expr::Float(_) => {}
            Expr::String(_) | Expr::Bytes(_) | Expr::Error => {}
            Expr::Ident(name) | Expr::RootIdent(name) => {
                self.record(SymbolKind::Variable, name, &expr.span);
            }
            Expr::List(items) => {
                for item in items {
                    self.visit(&item.expr);
                }
            }
            Expr::Map(entries) => {
                for entry in entries {
                    self.visit(&entry.key);
                    self.visit(&entry.value);
                }
            }
            Expr::Unary { expr: inner, .. } => self.visit(inner),
            Expr::Binary { left, right, .. } => {
                self.visit(left);
                self.visit(right);
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit(cond);
                self.visit(then_expr);
                self.visit(else_expr);
            }
            Expr::Member {
                expr: inner, field, ..
            } => {
                self.visit(inner);
                self.record(SymbolKind::Field, field, &Self::field_span(expr, field));
            }
            Expr::Index {
                expr: inner, index, ..
            } => {
                self.visit(inner);
                self.visit(index);
            }
            Expr::Call { expr: callee, args } => {
                match &callee.node {
                    Expr::Ident(name) => {
                        self.record(SymbolKind::Function, name, &callee.span);
                    }
                    Expr::Member {
                        expr: receiver,
                        field,
                        ..
                    } => {
                        self.visit(receiver);
                        self.record(
                            SymbolKind::Function,
                            field,
                            &Self::field_span(callee, field),
                        );
                    }
                    _ => self.visit(callee),
                }
                for arg in args {
                    self.visit(arg);
                }
            }
            Expr::Struct { fields, .. } => {
                for field in fields {
                    self.visit(&field.value);
                }
            }
            Expr::Comprehension(comp) => {
                self.visit(&comp.iter_range);
                self.visit(&comp.accu_init);
                self.visit(&comp.loop_condition);
                self.visit(&comp.loop_step);
                self.visit(&comp.result);
            }
            Expr::MemberTestOnly { expr: inner, .. } => self.visit(inner),
            Expr::Bind { init, body, .. } => {
                self.visit(init);
                self.visit(body);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::engine::{CelEngine, ParseEngine, ParseOutcome};

    fn symbols_of(text: &str, is_template: bool) -> SymbolTable {
        match CelEngine::standard().parse(text, Path::new("nofile.cel"), is_template) {
            ParseOutcome::Parsed { tree, .. } => SymbolExtractor.build(&tree),
            other => panic!("expected a tree, got {:?}", other),
        }
    }

    #[test]
    fn collects_variables_with_counts() {
        let table = symbols_of("x + x * y", false);
        let x = table.get(SymbolKind::Variable, "x").unwrap();
        assert_eq!(x.occurrences, 2);
        assert_eq!(x.span, 0..1);
        assert_eq!(table.get(SymbolKind::Variable, "y").unwrap().span, 8..9);
    }

    #[test]
    fn collects_functions_and_fields() {
        let text = "size(request.items) > 0 && request.name.startsWith('a')";
        let table = symbols_of(text, false);

        let size = table.get(SymbolKind::Function, "size").unwrap();
        assert_eq!(&text[size.span.clone()], "size");

        let starts = table.get(SymbolKind::Function, "startsWith").unwrap();
        assert_eq!(&text[starts.span.clone()], "startsWith");

        let name = table.get(SymbolKind::Field, "name").unwrap();
        assert_eq!(&text[name.span.clone()], "name");

        let request = table.get(SymbolKind::Variable, "request").unwrap();
        assert_eq!(request.occurrences, 2);
    }

    #[test]
    fn template_spans_are_in_host_coordinates() {
        let text = "Hi ${user.name}!";
        let table = symbols_of(text, true);
        let user = table.get(SymbolKind::Variable, "user").unwrap();
        assert_eq!(&text[user.span.clone()], "user");
    }

    #[test]
    fn literals_have_no_symbols() {
        assert!(symbols_of("1 + 2 == 3", false).is_empty());
    }
}

//! CEL parse engine built on `cel-core`.

use std::path::Path;
use std::sync::Arc;

use cel_core::{parse, CheckError, CheckErrorKind, Env, SpannedExpr};

use crate::diagnostic::{Issue, Severity};
use crate::document::LineIndex;

use super::template::{extract_regions, OffsetMapper, TemplateError};
use super::{ParseEngine, ParseOutcome};

/// One parsed expression and where it sits in the host document.
#[derive(Debug, Clone)]
pub struct CelRoot {
    pub ast: SpannedExpr,
    pub mapper: OffsetMapper,
}

/// Syntax tree for a CEL document.
///
/// A source document has exactly one root at offset 0. A template has one
/// root per interpolation.
#[derive(Debug, Clone)]
pub struct CelTree {
    pub roots: Vec<CelRoot>,
}

/// Parses and type-checks CEL against a fixed environment.
#[derive(Debug, Clone)]
pub struct CelEngine {
    env: Arc<Env>,
}

impl CelEngine {
    pub fn new(env: Arc<Env>) -> Self {
        Self { env }
    }

    /// Engine with the standard library and all extensions.
    pub fn standard() -> Self {
        Self::new(Arc::new(Env::with_standard_library().with_all_extensions()))
    }

    fn check_issues(&self, ast: &SpannedExpr, mapper: OffsetMapper, index: &LineIndex) -> Vec<Issue> {
        self.env
            .check(ast)
            .errors
            .iter()
            .map(|error| {
                let (start, end) = index.span(&mapper.span_to_host(&error.span));
                Issue {
                    start,
                    end: Some(end),
                    severity: Severity::Error,
                    code: Some(check_error_code(error).to_string()),
                    message: error.message(),
                }
            })
            .collect()
    }
}

impl Default for CelEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl ParseEngine for CelEngine {
    type Tree = CelTree;

    fn name(&self) -> &str {
        "cel"
    }

    fn parse(&self, text: &str, _path: &Path, is_template: bool) -> ParseOutcome<CelTree> {
        let index = LineIndex::new(text);

        let regions: Vec<(String, OffsetMapper)> = if is_template {
            match extract_regions(text) {
                Ok(regions) => regions.into_iter().map(|r| (r.source, r.mapper)).collect(),
                Err(err @ TemplateError::Unterminated { offset }) => {
                    let pos = index.position(offset);
                    return ParseOutcome::SyntaxError {
                        line: pos.line,
                        column: pos.column,
                        message: err.to_string(),
                    };
                }
            }
        } else {
            vec![(text.to_string(), OffsetMapper::new(0))]
        };

        let mut roots = Vec::with_capacity(regions.len());
        let mut issues = Vec::new();

        for (source, mapper) in regions {
            let result = parse(&source);

            // Recovery may leave a partial tree; any parse error still
            // counts as a syntax error for the whole document.
            if let Some(error) = result.errors.first() {
                let pos = index.position(mapper.to_host(error.span.start));
                return ParseOutcome::SyntaxError {
                    line: pos.line,
                    column: pos.column,
                    message: error.message.clone(),
                };
            }

            let Some(ast) = result.ast else {
                return ParseOutcome::InternalFailure {
                    detail: format!(
                        "cel parser returned neither a tree nor an error for {:?}",
                        source
                    ),
                };
            };

            issues.extend(self.check_issues(&ast, mapper, &index));
            roots.push(CelRoot { ast, mapper });
        }

        ParseOutcome::Parsed {
            tree: CelTree { roots },
            issues,
        }
    }
}

fn check_error_code(error: &CheckError) -> &'static str {
    match &error.kind {
        CheckErrorKind::UndeclaredReference { .. } => "undeclared-reference",
        CheckErrorKind::NoMatchingOverload { .. } => "no-matching-overload",
        CheckErrorKind::TypeMismatch { .. } | CheckErrorKind::NotAssignable { .. } => {
            "type-mismatch"
        }
        CheckErrorKind::UndefinedField { .. } => "undefined-field",
        CheckErrorKind::HeterogeneousAggregate { .. } => "heterogeneous-aggregate",
        CheckErrorKind::NotAType { .. } => "not-a-type",
        CheckErrorKind::Other(_) => "check-error",
    }
}

//! Document symbols from extracted symbol metadata.

use tower_lsp::lsp_types::{self, DocumentSymbol, Range};

use crate::document::LineIndex;
use crate::engine::{SymbolKind, SymbolTable};

use super::diagnostics::to_lsp_position;

fn to_lsp_kind(kind: SymbolKind) -> lsp_types::SymbolKind {
    match kind {
        SymbolKind::Variable => lsp_types::SymbolKind::VARIABLE,
        SymbolKind::Function => lsp_types::SymbolKind::FUNCTION,
        SymbolKind::Field => lsp_types::SymbolKind::FIELD,
    }
}

/// One flat `DocumentSymbol` per symbol, ranged at its first occurrence.
pub fn document_symbols(table: &SymbolTable, text: &str) -> Vec<DocumentSymbol> {
    let index = LineIndex::new(text);
    table
        .symbols()
        .iter()
        .map(|symbol| {
            let (start, end) = index.span(&symbol.span);
            let range = Range::new(to_lsp_position(start), to_lsp_position(end));
            #[allow(deprecated)]
            let document_symbol = DocumentSymbol {
                name: symbol.name.clone(),
                detail: Some(format!("{} reference(s)", symbol.occurrences)),
                kind: to_lsp_kind(symbol.kind),
                tags: None,
                deprecated: None,
                range,
                selection_range: range,
                children: None,
            };
            document_symbol
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tower_lsp::lsp_types::Position;

    use super::*;
    use crate::engine::{CelEngine, MetadataExtractor, ParseEngine, ParseOutcome, SymbolExtractor};

    #[test]
    fn symbols_are_ranged_in_the_document() {
        let text = "x > 0 &&\n  name.startsWith('a')";
        let ParseOutcome::Parsed { tree, .. } =
            CelEngine::standard().parse(text, Path::new("nofile.cel"), false)
        else {
            panic!("expected a tree");
        };
        let symbols = document_symbols(&SymbolExtractor.build(&tree), text);

        let name = symbols.iter().find(|s| s.name == "name").unwrap();
        assert_eq!(name.kind, lsp_types::SymbolKind::VARIABLE);
        assert_eq!(name.range.start, Position::new(1, 2));
        assert_eq!(name.range.end, Position::new(1, 6));

        let method = symbols.iter().find(|s| s.name == "startsWith").unwrap();
        assert_eq!(method.kind, lsp_types::SymbolKind::FUNCTION);
        assert_eq!(method.detail.as_deref(), Some("1 reference(s)"));
    }
}

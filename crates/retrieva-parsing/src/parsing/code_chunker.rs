//! AST-aware chunking: one chunk per top-level declaration, using the
//! language's tree-sitter query from [`LANGUAGE_REGISTRY`](super::languages::LANGUAGE_REGISTRY).

use tree_sitter::{Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::error::{ParsingError, ParsingResult};
use crate::parsing::languages::get_language_config;

/// One top-level declaration extracted from a source file.
#[derive(Debug, Clone)]
pub struct ExtractedChunk {
    pub text: String,
    /// 1-indexed, inclusive.
    pub start_line: u32,
    /// 1-indexed, inclusive.
    pub end_line: u32,
    pub symbol_name: Option<String>,
    /// The tree-sitter capture name, e.g. `function`, `struct`, `impl`.
    pub symbol_kind: Option<String>,
    /// Comment lines immediately preceding the declaration, if any.
    pub docstring: Option<String>,
}

/// Extracts one [`ExtractedChunk`] per top-level declaration matched by a
/// language's query. A declaration's parameters, return type, and body
/// stay inline in its chunk text rather than becoming separate fields,
/// since the storage model carries only name/kind/docstring/line-range
/// metadata alongside the text itself.
pub struct CodeChunker;

impl Default for CodeChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeChunker {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// # Errors
    /// `LanguageUnsupported` if `language_id` has no tree-sitter grammar
    /// configured; `QueryCompilationError`/`TreeSitterError` on a grammar
    /// or query failure (both would indicate a bug in the registry, not
    /// in the input source).
    pub fn chunk(&self, source: &str, language_id: &str) -> ParsingResult<Vec<ExtractedChunk>> {
        let config = get_language_config(language_id)
            .ok_or_else(|| ParsingError::LanguageUnsupported(language_id.to_string()))?;
        let (language, query_src) = match (config.tree_sitter_language.clone(), config.tree_sitter_query) {
            (Some(lang), Some(query_src)) => (lang, query_src),
            _ => return Err(ParsingError::LanguageUnsupported(language_id.to_string())),
        };

        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| ParsingError::tree_sitter_error(e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| ParsingError::parse_error("tree-sitter produced no parse tree".to_string()))?;

        let query =
            Query::new(&language, query_src).map_err(|e| ParsingError::QueryCompilationError(e.to_string()))?;
        let source_bytes = source.as_bytes();
        let root = tree.root_node();
        let root_id = root.id();

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, root, source_bytes);

        let mut chunks = Vec::new();
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                // Only top-level declarations; nested captures (e.g. a
                // method inside a class already captured as a whole) are
                // covered by their enclosing chunk's text.
                if node.parent().map(|p| p.id()) != Some(root_id) {
                    continue;
                }

                let capture_name = query.capture_names()[usize::from(capture.index)];
                let Ok(text) = node.utf8_text(source_bytes) else {
                    continue;
                };

                chunks.push(ExtractedChunk {
                    text: text.to_string(),
                    start_line: row_to_line(node.start_position().row),
                    end_line: row_to_line(node.end_position().row),
                    symbol_name: extract_symbol_name(&node, source_bytes),
                    symbol_kind: Some(capture_name.to_string()),
                    docstring: extract_leading_docstring(&node, source_bytes),
                });
            }
        }

        chunks.sort_by_key(|c| c.start_line);
        Ok(chunks)
    }
}

fn row_to_line(row: usize) -> u32 {
    u32::try_from(row).unwrap_or(u32::MAX).saturating_add(1)
}

fn extract_symbol_name(node: &Node, source: &[u8]) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(source).ok())
        .map(str::to_string)
}

/// Walks backward over contiguous comment siblings directly above `node`
/// (no blank line in between) and joins them into one docstring.
fn extract_leading_docstring(node: &Node, source: &[u8]) -> Option<String> {
    let mut comments = Vec::new();
    let mut expected_line = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(sibling) = current {
        if !sibling.kind().contains("comment") || expected_line == 0 {
            break;
        }
        if sibling.end_position().row.saturating_add(1) != expected_line {
            break;
        }
        let Ok(text) = sibling.utf8_text(source) else { break };
        comments.push(text.to_string());
        expected_line = sibling.start_position().row;
        current = sibling.prev_sibling();
    }

    if comments.is_empty() {
        None
    } else {
        comments.reverse();
        Some(comments.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_one_chunk_per_top_level_rust_item() {
        let source = "fn one() {}\n\nstruct Two {\n    field: u32,\n}\n";
        let chunks = CodeChunker::new().chunk(source, "rust").expect("rust is registered");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].symbol_name.as_deref(), Some("one"));
        assert_eq!(chunks[0].symbol_kind.as_deref(), Some("function"));
        assert_eq!(chunks[1].symbol_name.as_deref(), Some("Two"));
        assert_eq!(chunks[1].symbol_kind.as_deref(), Some("struct"));
    }

    #[test]
    fn captures_leading_doc_comment() {
        let source = "/// doc for one\nfn one() {}\n";
        let chunks = CodeChunker::new().chunk(source, "rust").expect("rust is registered");
        assert_eq!(chunks[0].docstring.as_deref(), Some("/// doc for one"));
    }

    #[test]
    fn unsupported_language_is_an_error() {
        let err = CodeChunker::new().chunk("anything", "not-a-real-language").unwrap_err();
        assert!(matches!(err, ParsingError::LanguageUnsupported(_)));
    }

    #[test]
    fn nested_methods_do_not_duplicate_the_enclosing_class() {
        let source = "class Foo {\n    bar() {}\n}\n";
        let chunks = CodeChunker::new().chunk(source, "javascript").expect("javascript is registered");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].symbol_kind.as_deref(), Some("class"));
    }
}

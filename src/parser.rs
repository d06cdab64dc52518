use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::{IdentifierReference, Program};
use oxc_parser::Parser;
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::SourceType;

use crate::error::{SweepError, SweepResult};

/// A parsed file together with its scope table and a line index over the raw text.
pub struct ParsedUnit<'a> {
    pub source: &'a str,
    pub program: Program<'a>,
    pub scoping: Scoping,
    pub lines: LineIndex,
}

impl ParsedUnit<'_> {
    /// True when `ident` resolves to a binding declared in some enclosing scope.
    ///
    /// A reference without resolution info is reported as bound, so a gap in the scope
    /// table can only ever keep a call in place.
    pub fn is_bound(&self, ident: &IdentifierReference<'_>) -> bool {
        match ident.reference_id.get() {
            Some(reference_id) => self.scoping.get_reference(reference_id).symbol_id().is_some(),
            None => true,
        }
    }
}

pub fn source_type_for(path: &Path) -> SourceType {
    SourceType::from_path(path).unwrap_or_else(|_| SourceType::default())
}

pub fn parse<'a>(allocator: &'a Allocator, path: &Path, source: &'a str) -> SweepResult<ParsedUnit<'a>> {
    let parser_return = Parser::new(allocator, source, source_type_for(path)).parse();
    if parser_return.panicked || !parser_return.errors.is_empty() {
        let message = parser_return
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "parser aborted".to_string());
        return Err(SweepError::Parse {
            path: path.to_path_buf(),
            message,
        });
    }

    let program = parser_return.program;
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();

    Ok(ParsedUnit {
        source,
        program,
        scoping,
        lines: LineIndex::new(source),
    })
}

/// Maps byte offsets to 1-indexed line/column pairs. Columns count characters, not bytes.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_col(&self, text: &str, offset: u32) -> (usize, usize) {
        let offset = (offset as usize).min(text.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = text
            .get(self.starts[line]..offset)
            .map(|s| s.chars().count())
            .unwrap_or(offset - self.starts[line]);
        (line + 1, col + 1)
    }
}

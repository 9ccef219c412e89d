//! Syntax tree handed to the transform, and the bundled swc parser adapter.
//!
//! The transform never parses on its own: callers pass a parse function.
//! [`parse_program`] is the default one and is what the CLI uses.

use crate::error::ParseError;
use std::ops::Range;
use swc_common::{sync::Lrc, BytePos, FileName, SourceMap, Span, Spanned};
use swc_ecma_ast::{EsVersion, Program};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

/// Leading byte order mark, dropped by swc before positions are assigned.
const BOM: char = '\u{feff}';

/// A parsed program plus the position its source text starts at.
///
/// swc spans are positions in a [`SourceMap`], not byte offsets into the
/// input string. `start_pos` is subtracted and `bom_len` added to recover
/// byte offsets.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub program: Program,
    pub start_pos: BytePos,
    /// Bytes of input the parser skipped before `start_pos`.
    pub bom_len: usize,
}

impl SyntaxTree {
    #[must_use]
    pub fn new(program: Program, start_pos: BytePos) -> Self {
        Self {
            program,
            start_pos,
            bom_len: 0,
        }
    }

    /// Record that the parser skipped a leading byte order mark of `len` bytes.
    #[must_use]
    pub fn with_bom_len(mut self, len: usize) -> Self {
        self.bom_len = len;
        self
    }

    /// Byte offset of `pos` in the source text.
    #[must_use]
    pub fn offset(&self, pos: BytePos) -> usize {
        pos.0.saturating_sub(self.start_pos.0) as usize + self.bom_len
    }

    /// Byte range of `span` in the source text.
    #[must_use]
    pub fn range(&self, span: Span) -> Range<usize> {
        self.offset(span.lo)..self.offset(span.hi)
    }
}

/// Parse ECMAScript source with swc, detecting script vs module.
///
/// Recoverable parser errors are treated as failures so the transform never
/// runs over a partially recovered tree.
pub fn parse_program(code: &str) -> Result<SyntaxTree, ParseError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Anon), code.to_string());
    let start_pos = fm.start_pos;
    let bom_len = if code.starts_with(BOM) { BOM.len_utf8() } else { 0 };

    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::EsNext,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let to_error = |e: &swc_ecma_parser::error::Error| ParseError {
        message: format!("{:?}", e.kind()),
        offset: e.span().lo.0.saturating_sub(start_pos.0) as usize + bom_len,
    };

    let program = parser.parse_program().map_err(|e| to_error(&e))?;
    if let Some(e) = parser.take_errors().first() {
        return Err(to_error(e));
    }

    Ok(SyntaxTree::new(program, start_pos).with_bom_len(bom_len))
}

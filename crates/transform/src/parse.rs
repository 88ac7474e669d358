use boa_ast::Script;
use boa_interner::Interner;
use boa_parser::{Parser, Source};

use atp_domain::error::{Error, Result};

/// Parses user code with `boa_parser`, mapping any syntax error onto the
/// shared `parse_error` kind (§7).
///
/// This is the only place in the pipeline where user code is actually
/// parsed into a tree; everything downstream (statement IDs, pause-site
/// discovery, the batch optimizer) walks the `Script` this returns.
pub fn parse_source(code: &str) -> Result<(Script, Interner)> {
    let mut interner = Interner::default();
    let source = Source::from_bytes(code.as_bytes());
    let mut parser = Parser::new(source);
    let script = parser
        .parse_script(&mut interner)
        .map_err(|e| Error::ParseError(e.to_string()))?;
    Ok((script, interner))
}

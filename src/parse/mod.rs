mod error;
mod grammar;

pub use error::ParseError;

use crate::types::Program;

/// Parse an expression string into a [`Program`].
///
/// Nesting is bounded: no statement may be more than 64 levels deep.
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid expression or is
/// nested too deeply.
pub fn parse(input: &str) -> Result<Program, ParseError> {
    use winnow::Parser;
    use winnow::stream::Stateful;
    grammar::program
        .parse(Stateful { input, state: 0 })
        .map_err(|e| ParseError::new(e.offset(), e.inner().to_string()))
}

//! DSL front end: source text → blocks → typed commands.

pub mod command;
pub mod format;
pub mod note;
pub mod program;
pub mod splitter;
pub mod validator;

pub use command::{Command, CommandKind, Value};
pub use program::{Block, BlockKind, EffectParam, EffectSpec, ParseWarning, Program};
pub use validator::ValidationReport;

use splitter::Splitter;

/// Entry points for the DSL front end.
///
/// Parsing always succeeds; validation is a separate, advisory pass.
pub struct Dsl;

impl Dsl {
    /// Parse source text into a fresh [`Program`].
    pub fn parse(source: &str) -> Program {
        Splitter::new().split(source)
    }

    /// Parse and validate source text.
    pub fn validate(source: &str) -> ValidationReport {
        validator::validate_program(&Self::parse(source))
    }

    /// Render a program back to canonical text.
    pub fn format(program: &Program) -> String {
        format::format_program(program)
    }
}

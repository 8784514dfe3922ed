//! Advisory command validation.
//!
//! Runs over the raw token form of each command, independently of execution.
//! Problems are collected as messages; nothing here stops a program from running.

use super::command::parse_number;
use super::program::Program;

/// Outcome of validating a program or a single command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Minimum token count (verb included) for each known verb.
const MIN_ARITY: &[(&str, usize)] = &[
    ("sample", 2),
    ("tone", 2),
    ("slide", 4),
    ("wait", 2),
    ("play", 2),
    ("bpm", 2),
    ("loop", 3),
    ("set", 3),
    ("effect", 3),
];

/// Check one command line, returning every problem found.
pub fn validate_command(text: &str) -> Vec<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let Some(&verb) = tokens.first() else {
        return Vec::new();
    };

    let Some(&(_, min)) = MIN_ARITY.iter().find(|(v, _)| *v == verb) else {
        return vec![format!("unknown command '{verb}'")];
    };

    let mut errors = Vec::new();
    if tokens.len() < min {
        errors.push(format!(
            "'{verb}' expects at least {} argument(s), got {}",
            min - 1,
            tokens.len() - 1
        ));
        return errors;
    }

    match verb {
        "wait" if parse_number(tokens[1]).is_none() => {
            errors.push(format!("'wait' duration must be a number, got '{}'", tokens[1]));
        }
        "bpm" => match parse_number(tokens[1]) {
            Some(v) if v > 0.0 => {}
            Some(v) => errors.push(format!("'bpm' must be positive, got {v}")),
            None => errors.push(format!("'bpm' must be a number, got '{}'", tokens[1])),
        },
        "loop" if tokens[1].parse::<i64>().is_err() => {
            errors.push(format!("'loop' count must be an integer, got '{}'", tokens[1]));
        }
        _ => {}
    }
    errors
}

/// Validate every command of a program, prefixing messages with line numbers.
pub fn validate_program(program: &Program) -> ValidationReport {
    let errors: Vec<String> = program
        .all_commands()
        .flat_map(|cmd| {
            validate_command(&cmd.text())
                .into_iter()
                .map(move |e| format!("line {}: {e}", cmd.line))
        })
        .collect();

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}

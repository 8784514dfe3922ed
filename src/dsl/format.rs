//! Canonical text rendering of a [`Program`].
//!
//! Globals come first, then custom samples, then blocks, each in declaration
//! order. Block bodies are indented by two spaces and tokens are separated by a
//! single space, so `parse(format(p)) == p` for any parsed program.

use std::fmt::Write;

use super::program::{Block, Program};

/// Render `program` as canonical source text.
pub fn format_program(program: &Program) -> String {
    let mut out = String::new();

    for cmd in &program.globals {
        let _ = writeln!(out, "{cmd}");
    }

    for sample in program.ordered_custom_samples() {
        separate(&mut out);
        write_block(&mut out, sample, '<', '>');
    }

    for block in program.ordered_blocks() {
        separate(&mut out);
        write_block(&mut out, block, '[', ']');
    }

    out
}

fn separate(out: &mut String) {
    if !out.is_empty() {
        out.push('\n');
    }
}

fn write_block(out: &mut String, block: &Block, open: char, close: char) {
    let _ = write!(out, "{open}{}{close}", block.name);
    for effect in &block.effects {
        let _ = write!(out, " {effect}");
    }
    out.push('\n');
    for cmd in &block.commands {
        let _ = writeln!(out, "  {cmd}");
    }
    let _ = writeln!(out, "{open}end{close}");
}

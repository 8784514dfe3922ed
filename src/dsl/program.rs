//! The parse result: global commands, named blocks, and custom samples.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use super::command::Command;

/// A complete parsed program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Commands outside any block, in source order.
    pub globals: Vec<Command>,
    /// `[name]` … `[end]` blocks.
    pub blocks: HashMap<String, Block>,
    /// `<name>` … `<end>` custom samples.
    pub custom_samples: HashMap<String, Block>,
    /// Block names in first-declaration order.
    pub block_order: Vec<String>,
    /// Custom-sample names in first-declaration order.
    pub sample_order: Vec<String>,
    /// Structural oddities the splitter resolved by policy.
    pub warnings: Vec<ParseWarning>,
}

/// A named, ordered list of commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub commands: Vec<Command>,
    /// Effect annotations from the block header.
    pub effects: Vec<EffectSpec>,
}

/// A named effect and its parameters, forwarded to the audio backend as metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSpec {
    pub kind: String,
    pub params: Vec<EffectParam>,
}

/// One effect parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectParam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: f64,
}

impl fmt::Display for EffectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.kind)?;
        for param in &self.params {
            match &param.key {
                Some(key) => write!(f, " {key}={}", param.value)?,
                None => write!(f, " {}", param.value)?,
            }
        }
        f.write_str(")")
    }
}

/// Where a block-level warning was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Block,
    CustomSample,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Block => f.write_str("block"),
            BlockKind::CustomSample => f.write_str("custom sample"),
        }
    }
}

/// A structural problem resolved by the splitter's nesting policy.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseWarning {
    /// An opening marker arrived while `open` was still open; `open` was closed.
    AutoClosed {
        line: usize,
        open: String,
        kind: BlockKind,
    },
    /// An end marker appeared outside any block.
    StrayEnd { line: usize },
    /// `[end]` closed a custom sample, or `<end>` closed a block.
    MismatchedEnd { line: usize, name: String },
    /// The block was still open at end of input.
    Unterminated { name: String, kind: BlockKind },
    /// An effect annotation on a block header could not be read.
    BadAnnotation { line: usize, text: String },
    /// The name was declared before; the new definition wins.
    Redeclared {
        line: usize,
        name: String,
        kind: BlockKind,
    },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::AutoClosed { line, open, kind } => write!(
                f,
                "[line {line}] {kind} '{open}' auto-closed by a new opening marker"
            ),
            ParseWarning::StrayEnd { line } => {
                write!(f, "[line {line}] end marker outside any block ignored")
            }
            ParseWarning::MismatchedEnd { line, name } => {
                write!(f, "[line {line}] mismatched end marker closes '{name}'")
            }
            ParseWarning::Unterminated { name, kind } => {
                write!(f, "{kind} '{name}' is missing its end marker")
            }
            ParseWarning::BadAnnotation { line, text } => {
                write!(f, "[line {line}] unreadable effect annotation '{text}'")
            }
            ParseWarning::Redeclared { line, name, kind } => {
                write!(f, "[line {line}] {kind} '{name}' redeclared; last definition wins")
            }
        }
    }
}

impl Program {
    /// Look up a block by name.
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.get(name)
    }

    /// Look up a custom sample by name.
    pub fn custom_sample(&self, name: &str) -> Option<&Block> {
        self.custom_samples.get(name)
    }

    /// Blocks in declaration order.
    pub fn ordered_blocks(&self) -> impl Iterator<Item = &Block> {
        self.block_order.iter().filter_map(|n| self.blocks.get(n))
    }

    /// Custom samples in declaration order.
    pub fn ordered_custom_samples(&self) -> impl Iterator<Item = &Block> {
        self.sample_order
            .iter()
            .filter_map(|n| self.custom_samples.get(n))
    }

    /// Every command in the program: globals, custom samples, then blocks.
    pub fn all_commands(&self) -> impl Iterator<Item = &Command> {
        self.globals
            .iter()
            .chain(self.ordered_custom_samples().flat_map(|b| &b.commands))
            .chain(self.ordered_blocks().flat_map(|b| &b.commands))
    }
}

impl PartialEq for Program {
    /// Programs are equivalent when their globals, blocks, and custom samples
    /// match. Declaration order and parse warnings do not take part.
    fn eq(&self, other: &Self) -> bool {
        self.globals == other.globals
            && self.blocks == other.blocks
            && self.custom_samples == other.custom_samples
    }
}

//! Block splitter: recovers block structure from flat source text.
//!
//! Works line by line: comments are stripped, blank lines dropped, and every
//! remaining line is either a block marker or a command. Splitting never fails;
//! malformed nesting is resolved by policy and recorded as a [`ParseWarning`].

use super::command::{parse_number, Command};
use super::program::{Block, BlockKind, EffectParam, EffectSpec, ParseWarning, Program};

/// A block currently being collected.
struct OpenBlock {
    kind: BlockKind,
    block: Block,
}

/// What a single line turned out to be.
enum Line<'a> {
    Open {
        kind: BlockKind,
        name: &'a str,
        rest: &'a str,
    },
    End(BlockKind),
    Command(&'a str),
}

/// Line-oriented splitter with a single level of nesting.
pub struct Splitter {
    program: Program,
    open: Option<OpenBlock>,
}

impl Splitter {
    pub fn new() -> Self {
        Self {
            program: Program::default(),
            open: None,
        }
    }

    /// Split `source` into a [`Program`].
    pub fn split(mut self, source: &str) -> Program {
        let mut last_line = 0;
        for (idx, raw) in source.lines().enumerate() {
            let line_no = idx + 1;
            last_line = line_no;
            let text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }

            match classify(text) {
                Line::Open { kind, name, rest } => self.open_block(line_no, kind, name, rest),
                Line::End(kind) => self.end_block(line_no, kind),
                Line::Command(text) => {
                    let command = Command::parse(line_no, text);
                    match &mut self.open {
                        Some(open) => open.block.commands.push(command),
                        None => self.program.globals.push(command),
                    }
                }
            }
        }

        if let Some(open) = self.open.take() {
            self.program.warnings.push(ParseWarning::Unterminated {
                name: open.block.name.clone(),
                kind: open.kind,
            });
            self.close(last_line, open);
        }

        for warning in &self.program.warnings {
            log::warn!("{warning}");
        }
        self.program
    }

    fn open_block(&mut self, line: usize, kind: BlockKind, name: &str, rest: &str) {
        if let Some(open) = self.open.take() {
            self.program.warnings.push(ParseWarning::AutoClosed {
                line,
                open: open.block.name.clone(),
                kind: open.kind,
            });
            self.close(line, open);
        }

        let effects = match parse_annotations(rest) {
            Ok(effects) => effects,
            Err(text) => {
                self.program
                    .warnings
                    .push(ParseWarning::BadAnnotation { line, text });
                Vec::new()
            }
        };

        self.open = Some(OpenBlock {
            kind,
            block: Block {
                name: name.to_string(),
                commands: Vec::new(),
                effects,
            },
        });
    }

    fn end_block(&mut self, line: usize, kind: BlockKind) {
        match self.open.take() {
            Some(open) => {
                if open.kind != kind {
                    self.program.warnings.push(ParseWarning::MismatchedEnd {
                        line,
                        name: open.block.name.clone(),
                    });
                }
                self.close(line, open);
            }
            None => self.program.warnings.push(ParseWarning::StrayEnd { line }),
        }
    }

    fn close(&mut self, line: usize, open: OpenBlock) {
        let (map, order) = match open.kind {
            BlockKind::Block => (&mut self.program.blocks, &mut self.program.block_order),
            BlockKind::CustomSample => (
                &mut self.program.custom_samples,
                &mut self.program.sample_order,
            ),
        };
        let name = open.block.name.clone();
        if map.insert(name.clone(), open.block).is_some() {
            self.program.warnings.push(ParseWarning::Redeclared {
                line,
                name,
                kind: open.kind,
            });
        } else {
            order.push(name);
        }
    }
}

impl Default for Splitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop everything from the first `//` onward.
fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn classify(text: &str) -> Line<'_> {
    let delimited = [('[', ']', BlockKind::Block), ('<', '>', BlockKind::CustomSample)];
    for (open, close, kind) in delimited {
        let Some(inner) = text.strip_prefix(open) else {
            continue;
        };
        let Some(end) = inner.find(close) else {
            continue;
        };
        let name = inner[..end].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            continue;
        }
        if name == "end" {
            return Line::End(kind);
        }
        return Line::Open {
            kind,
            name,
            rest: inner[end + 1..].trim(),
        };
    }
    Line::Command(text)
}

/// Parse header annotations such as `(reverb 0.6) (delay 0.25 feedback=0.4)`.
///
/// Returns the offending text on failure.
fn parse_annotations(mut rest: &str) -> Result<Vec<EffectSpec>, String> {
    let mut effects = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(effects);
        }
        let Some(body) = rest.strip_prefix('(') else {
            return Err(rest.to_string());
        };
        let Some(close) = body.find(')') else {
            return Err(rest.to_string());
        };
        let inner = &body[..close];
        effects.push(parse_effect(inner).ok_or_else(|| format!("({inner})"))?);
        rest = &body[close + 1..];
    }
}

fn parse_effect(inner: &str) -> Option<EffectSpec> {
    let mut tokens = inner.split_whitespace();
    let kind = tokens.next()?.to_string();
    let params = tokens
        .map(|token| match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => Some(EffectParam {
                key: Some(key.to_string()),
                value: parse_number(value)?,
            }),
            _ => Some(EffectParam {
                key: None,
                value: parse_number(token)?,
            }),
        })
        .collect::<Option<Vec<_>>>()?;
    Some(EffectSpec { kind, params })
}

//! Typed commands.
//!
//! Each source line is converted once, at parse time, into a [`CommandKind`].
//! Numeric fields stay late-bound as [`Value`]s: they are resolved against the
//! variable store when the command executes, not when it is parsed.

use std::fmt;

/// Parse a numeric literal. Only finite numbers count; `inf` and `nan` do not.
pub fn parse_number(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A numeric argument as written in the source.
///
/// Literals keep their token: a variable may be named like a number, and a
/// read checks the variable store before using the literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A numeric literal.
    Number { value: f64, token: String },
    /// Anything else: a variable name, or a note name for pitch fields.
    Name(String),
}

impl Value {
    /// Classify a raw token.
    pub fn from_token(token: &str) -> Self {
        match parse_number(token) {
            Some(value) => Value::Number {
                value,
                token: token.to_string(),
            },
            None => Value::Name(token.to_string()),
        }
    }

    /// A literal with no source token of its own, used for defaults.
    pub fn literal(value: f64) -> Self {
        Value::Number {
            value,
            token: value.to_string(),
        }
    }

    /// The token as written.
    pub fn token(&self) -> &str {
        match self {
            Value::Number { token, .. } => token,
            Value::Name(name) => name,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Mix parameters of `play` and `loop`, applied to every nested leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixParams {
    pub volume: Option<Value>,
    pub pan: Option<Value>,
}

/// `sample <name> [pitch] [timescale] [volume] [pan]`
#[derive(Debug, Clone, PartialEq)]
pub struct SampleArgs {
    pub name: String,
    pub pitch: Value,
    pub timescale: Value,
    pub volume: Option<Value>,
    pub pan: Option<Value>,
}

/// `tone <note-or-hz> [beats] [waveform] [volume] [pan]`
#[derive(Debug, Clone, PartialEq)]
pub struct ToneArgs {
    pub pitch: Value,
    pub beats: Value,
    pub waveform: Option<String>,
    pub volume: Option<Value>,
    pub pan: Option<Value>,
}

/// `slide <from> <to> <beats> [waveform] [volume] [pan]`
#[derive(Debug, Clone, PartialEq)]
pub struct SlideArgs {
    pub from: Value,
    pub to: Value,
    pub beats: Value,
    pub waveform: Option<String>,
    pub volume: Option<Value>,
    pub pan: Option<Value>,
}

/// A single `effect` parameter, either positional or `key=value`.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectArg {
    pub key: Option<String>,
    pub value: Value,
}

/// The closed set of verbs, each with its typed fields.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Sample(SampleArgs),
    Tone(ToneArgs),
    Slide(SlideArgs),
    Wait {
        beats: Value,
    },
    Bpm {
        value: Value,
    },
    Play {
        blocks: Vec<String>,
        mix: MixParams,
    },
    Loop {
        count: Value,
        blocks: Vec<String>,
        mix: MixParams,
    },
    Set {
        name: String,
        value: Value,
    },
    Effect {
        effect: String,
        block: String,
        params: Vec<EffectArg>,
    },
    /// A known verb whose arguments could not be typed.
    Invalid {
        reason: String,
    },
    /// A verb outside the grammar.
    Unknown,
}

/// One command line: its tokens plus the typed form built from them.
#[derive(Debug, Clone)]
pub struct Command {
    /// 1-based source line, 0 when built programmatically.
    pub line: usize,
    pub tokens: Vec<String>,
    pub kind: CommandKind,
    /// `key=value` keys the verb does not understand.
    pub unused_keys: Vec<String>,
}

impl PartialEq for Command {
    /// Commands are equal when their tokens are; the source line is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens
    }
}

/// Positional and keyed arguments after the verb.
struct Args<'a> {
    positional: Vec<&'a str>,
    keyed: Vec<(&'a str, &'a str)>,
}

impl<'a> Args<'a> {
    fn split(tokens: &'a [String]) -> Self {
        let mut positional = Vec::new();
        let mut keyed = Vec::new();
        for token in tokens.iter().skip(1) {
            match token.split_once('=') {
                Some((key, value)) if !key.is_empty() => keyed.push((key, value)),
                _ => positional.push(token.as_str()),
            }
        }
        Self { positional, keyed }
    }

    fn pos(&self, idx: usize) -> Option<&'a str> {
        self.positional.get(idx).copied()
    }

    /// Keyed value for any of `keys`, else the positional at `idx`.
    fn field(&self, keys: &[&str], idx: usize) -> Option<&'a str> {
        self.keyed
            .iter()
            .rev()
            .find(|(k, _)| keys.contains(k))
            .map(|(_, v)| *v)
            .or_else(|| self.pos(idx))
    }

    fn value(&self, keys: &[&str], idx: usize) -> Option<Value> {
        self.field(keys, idx).map(Value::from_token)
    }

    fn keyed_value(&self, key: &str) -> Option<Value> {
        self.keyed
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| Value::from_token(v))
    }

    fn unused(&self, known: &[&str]) -> Vec<String> {
        self.keyed
            .iter()
            .filter(|(k, _)| !known.contains(k))
            .map(|(k, _)| k.to_string())
            .collect()
    }
}

const SAMPLE_KEYS: &[&str] = &["pitch", "timescale", "volume", "pan"];
const TONE_KEYS: &[&str] = &["beats", "wave", "waveform", "volume", "pan"];
const MIX_KEYS: &[&str] = &["volume", "pan"];

fn invalid(reason: impl Into<String>) -> CommandKind {
    CommandKind::Invalid {
        reason: reason.into(),
    }
}

impl Command {
    /// Tokenize one comment-free, trimmed line and build its typed form.
    pub fn parse(line: usize, text: &str) -> Self {
        let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let args = Args::split(&tokens);
        let verb = tokens.first().map(String::as_str).unwrap_or("");

        let (kind, unused_keys) = match verb {
            "sample" => (build_sample(&args), args.unused(SAMPLE_KEYS)),
            "tone" => (build_tone(&args), args.unused(TONE_KEYS)),
            "slide" => (build_slide(&args), args.unused(TONE_KEYS)),
            "wait" => (
                args.value(&[], 0)
                    .map(|beats| CommandKind::Wait { beats })
                    .unwrap_or_else(|| invalid("wait needs a beat count")),
                args.unused(&[]),
            ),
            "bpm" => (
                args.value(&[], 0)
                    .map(|value| CommandKind::Bpm { value })
                    .unwrap_or_else(|| invalid("bpm needs a value")),
                args.unused(&[]),
            ),
            "play" => (build_play(&args), args.unused(MIX_KEYS)),
            "loop" => (build_loop(&args), args.unused(MIX_KEYS)),
            "set" => (build_set(&args), args.unused(&[])),
            "effect" => (build_effect(&args), Vec::new()),
            _ => (CommandKind::Unknown, Vec::new()),
        };

        Self {
            line,
            tokens,
            kind,
            unused_keys,
        }
    }

    /// The verb token.
    pub fn verb(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or("")
    }

    /// Whitespace-normalized source text.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

fn mix_params(args: &Args<'_>) -> MixParams {
    MixParams {
        volume: args.keyed_value("volume"),
        pan: args.keyed_value("pan"),
    }
}

fn build_sample(args: &Args<'_>) -> CommandKind {
    let Some(name) = args.pos(0) else {
        return invalid("sample needs a name");
    };
    CommandKind::Sample(SampleArgs {
        name: name.to_string(),
        pitch: args.value(&["pitch"], 1).unwrap_or(Value::literal(1.0)),
        timescale: args.value(&["timescale"], 2).unwrap_or(Value::literal(1.0)),
        volume: args.value(&["volume"], 3),
        pan: args.value(&["pan"], 4),
    })
}

fn build_tone(args: &Args<'_>) -> CommandKind {
    let Some(pitch) = args.pos(0) else {
        return invalid("tone needs a note or frequency");
    };
    CommandKind::Tone(ToneArgs {
        pitch: Value::from_token(pitch),
        beats: args.value(&["beats"], 1).unwrap_or(Value::literal(1.0)),
        waveform: args.field(&["wave", "waveform"], 2).map(str::to_string),
        volume: args.value(&["volume"], 3),
        pan: args.value(&["pan"], 4),
    })
}

fn build_slide(args: &Args<'_>) -> CommandKind {
    let (Some(from), Some(to)) = (args.pos(0), args.pos(1)) else {
        return invalid("slide needs a start and end pitch");
    };
    let Some(beats) = args.value(&["beats"], 2) else {
        return invalid("slide needs a beat count");
    };
    CommandKind::Slide(SlideArgs {
        from: Value::from_token(from),
        to: Value::from_token(to),
        beats,
        waveform: args.field(&["wave", "waveform"], 3).map(str::to_string),
        volume: args.value(&["volume"], 4),
        pan: args.value(&["pan"], 5),
    })
}

fn build_play(args: &Args<'_>) -> CommandKind {
    if args.positional.is_empty() {
        return invalid("play needs at least one block");
    }
    CommandKind::Play {
        blocks: args.positional.iter().map(|s| s.to_string()).collect(),
        mix: mix_params(args),
    }
}

fn build_loop(args: &Args<'_>) -> CommandKind {
    let Some((count, blocks)) = args.positional.split_first() else {
        return invalid("loop needs a count");
    };
    if blocks.is_empty() {
        return invalid("loop needs at least one block");
    }
    CommandKind::Loop {
        count: Value::from_token(count),
        blocks: blocks.iter().map(|s| s.to_string()).collect(),
        mix: mix_params(args),
    }
}

fn build_set(args: &Args<'_>) -> CommandKind {
    match (args.pos(0), args.pos(1)) {
        (Some(name), Some(value)) => CommandKind::Set {
            name: name.to_string(),
            value: Value::from_token(value),
        },
        _ => invalid("set needs a name and a value"),
    }
}

fn build_effect(args: &Args<'_>) -> CommandKind {
    let (Some(effect), Some(block)) = (args.pos(0), args.pos(1)) else {
        return invalid("effect needs a type and a block");
    };
    let positional = args.positional.iter().skip(2).map(|v| EffectArg {
        key: None,
        value: Value::from_token(v),
    });
    let keyed = args.keyed.iter().map(|(k, v)| EffectArg {
        key: Some(k.to_string()),
        value: Value::from_token(v),
    });
    CommandKind::Effect {
        effect: effect.to_string(),
        block: block.to_string(),
        params: positional.chain(keyed).collect(),
    }
}

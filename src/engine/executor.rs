//! The recursive scheduler.
//!
//! Walks blocks and commands, turning sequential and parallel composition into
//! absolute start offsets. Every handler takes the offset it starts at and
//! returns the time it occupies in seconds:
//!
//! - sequences add durations left to right,
//! - `play` fans out at one offset and returns the longest branch,
//! - `loop` repeats a `play` and returns the sum of its iterations,
//! - leaves (`sample`, `tone`, `slide`) dispatch one backend call each.
//!
//! Parallel branches are evaluated left to right on the calling thread, so a
//! `set` or `bpm` inside one branch is visible to the branches after it.
//!
//! A block or custom sample that is already being invoked is refused, so
//! recursion ends at its first re-entry. Nesting depth and the total number of
//! invocations per run are capped as well.

use std::collections::HashSet;

use crate::config::EngineConfig;
use crate::dsl::command::{EffectArg, MixParams, SampleArgs, SlideArgs, ToneArgs};
use crate::dsl::{BlockKind, Command, CommandKind, EffectParam, EffectSpec, Program, Value};

use super::backend::{AudioBackend, Handle, SampleRequest, SlideRequest, ToneRequest, Waveform};
use super::state::ExecutionState;

/// Volume and pan adjustments inherited from enclosing `play`/`loop` commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mix {
    pub volume: f64,
    pub pan: f64,
}

impl Mix {
    pub const NEUTRAL: Mix = Mix {
        volume: 1.0,
        pan: 0.0,
    };
}

/// One run over a program. Borrowed for the duration of `execute()`.
pub struct Executor<'a, B: AudioBackend + ?Sized> {
    program: &'a Program,
    backend: &'a mut B,
    state: &'a mut ExecutionState,
    config: &'a EngineConfig,
    warnings: Vec<String>,
    dispatched: usize,
    /// Blocks and custom samples currently being invoked, outermost first.
    call_stack: Vec<(BlockKind, &'a str)>,
    invocations: usize,
    /// Names already reported as cut, so each is warned about once.
    cut: HashSet<(BlockKind, &'a str)>,
    invocation_cap_hit: bool,
}

impl<'a, B: AudioBackend + ?Sized> Executor<'a, B> {
    pub fn new(
        program: &'a Program,
        backend: &'a mut B,
        state: &'a mut ExecutionState,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            program,
            backend,
            state,
            config,
            warnings: Vec::new(),
            dispatched: 0,
            call_stack: Vec::new(),
            invocations: 0,
            cut: HashSet::new(),
            invocation_cap_hit: false,
        }
    }

    /// Run the program from offset 0 and return its total duration.
    ///
    /// Global commands run if there are any; otherwise a block named `main`
    /// is played. Header effect annotations are forwarded first.
    pub fn run(&mut self) -> f64 {
        let program = self.program;

        for block in program.ordered_blocks() {
            for effect in &block.effects {
                self.record_effect(&block.name, effect.clone());
            }
        }

        if !program.globals.is_empty() {
            self.run_sequence(&program.globals, 0.0, Mix::NEUTRAL)
        } else if program.block("main").is_some() {
            self.play_blocks(&["main".to_string()], 0.0, Mix::NEUTRAL)
        } else {
            log::info!("nothing to play: no global commands and no 'main' block");
            0.0
        }
    }

    /// Consume the executor, returning collected warnings and the dispatch count.
    pub fn finish(self) -> (Vec<String>, usize) {
        (self.warnings, self.dispatched)
    }

    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(message);
    }

    /// Run `commands` one after another from `start`, returning the elapsed time.
    fn run_sequence(&mut self, commands: &[Command], start: f64, mix: Mix) -> f64 {
        let mut elapsed = 0.0;
        for cmd in commands {
            if !self.state.is_running() {
                log::debug!("stop requested; leaving sequence at {:.3}s", start + elapsed);
                break;
            }
            elapsed += self.execute_command(cmd, start + elapsed, mix);
        }
        elapsed
    }

    /// Execute a single command at `offset`, returning its duration.
    fn execute_command(&mut self, cmd: &Command, offset: f64, mix: Mix) -> f64 {
        for key in &cmd.unused_keys {
            self.warn(format!(
                "line {}: '{}' ignores parameter '{key}'",
                cmd.line,
                cmd.verb()
            ));
        }

        match &cmd.kind {
            CommandKind::Sample(args) => self.sample(args, offset, mix),
            CommandKind::Tone(args) => self.tone(args, offset, mix),
            CommandKind::Slide(args) => self.slide(args, offset, mix),
            CommandKind::Wait { beats } => {
                let beats = self.state.variables.resolve(beats).max(0.0);
                self.state.tempo.beats_to_seconds(beats)
            }
            CommandKind::Bpm { value } => {
                let bpm = self.state.variables.resolve(value);
                if self.state.tempo.set_bpm(bpm) {
                    log::debug!("tempo {bpm} BPM at {offset:.3}s");
                } else {
                    self.warn(format!("line {}: ignoring invalid bpm {bpm}", cmd.line));
                }
                0.0
            }
            CommandKind::Play { blocks, mix: params } => {
                let mix = self.nested_mix(mix, params);
                self.play_blocks(blocks, offset, mix)
            }
            CommandKind::Loop {
                count,
                blocks,
                mix: params,
            } => {
                let mix = self.nested_mix(mix, params);
                self.run_loop(count, blocks, offset, mix)
            }
            CommandKind::Set { name, value } => {
                let value = self.state.variables.resolve(value);
                self.state.variables.set(name, value);
                0.0
            }
            CommandKind::Effect {
                effect,
                block,
                params,
            } => {
                let spec = self.resolve_effect(effect, params);
                self.record_effect(block, spec);
                0.0
            }
            CommandKind::Invalid { reason } => {
                self.warn(format!("line {}: skipping '{cmd}': {reason}", cmd.line));
                0.0
            }
            CommandKind::Unknown => {
                self.warn(format!(
                    "line {}: skipping unknown command '{}'",
                    cmd.line,
                    cmd.verb()
                ));
                0.0
            }
        }
    }

    /// Invoke every named block at the same offset; the longest one wins.
    fn play_blocks(&mut self, names: &[String], offset: f64, mix: Mix) -> f64 {
        names
            .iter()
            .map(|name| self.invoke_block(name, offset, mix))
            .fold(0.0, f64::max)
    }

    fn invoke_block(&mut self, name: &str, offset: f64, mix: Mix) -> f64 {
        let program = self.program;
        let Some(block) = program.block(name) else {
            self.warn(format!("block '{name}' not found"));
            return 0.0;
        };
        if !self.enter(BlockKind::Block, &block.name) {
            return 0.0;
        }
        log::debug!("block '{name}' at {offset:.3}s");
        let duration = self.run_sequence(&block.commands, offset, mix);
        self.call_stack.pop();
        duration
    }

    /// Push `name` onto the call stack, or refuse it with a one-time warning
    /// when it is already active or a cap is reached.
    fn enter(&mut self, kind: BlockKind, name: &'a str) -> bool {
        if self.invocations >= self.config.max_invocations {
            if !self.invocation_cap_hit {
                self.invocation_cap_hit = true;
                self.warn(format!(
                    "more than {} block invocations; the rest of the run is skipped",
                    self.config.max_invocations
                ));
            }
            return false;
        }

        let reason = if self.call_stack.contains(&(kind, name)) {
            Some("invokes itself".to_string())
        } else if self.call_stack.len() >= self.config.max_depth {
            Some(format!("exceeds nesting depth {}", self.config.max_depth))
        } else {
            None
        };
        if let Some(reason) = reason {
            if self.cut.insert((kind, name)) {
                self.warn(format!("{kind} '{name}' {reason}; skipped"));
            }
            return false;
        }

        self.invocations += 1;
        self.call_stack.push((kind, name));
        true
    }

    /// Repeat a parallel `play` of `names`, each iteration starting where the
    /// previous one ended. All blocks must exist or nothing runs.
    fn run_loop(
        &mut self,
        count: &Value,
        names: &[String],
        offset: f64,
        mix: Mix,
    ) -> f64 {
        let program = self.program;
        let missing: Vec<&str> = names
            .iter()
            .filter(|n| program.block(n).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            self.warn(format!(
                "loop skipped: block(s) not found: {}",
                missing.join(", ")
            ));
            return 0.0;
        }

        let count = self.state.variables.resolve(count);
        let iterations = if count.is_finite() && count > 0.0 {
            count.trunc() as u64
        } else {
            0
        };

        let mut total = 0.0;
        for i in 0..iterations {
            if !self.state.is_running() {
                log::debug!("stop requested; loop left after {i} iteration(s)");
                break;
            }
            total += self.play_blocks(names, offset + total, mix);
        }
        total
    }

    /// `sample`: expand a custom sample, or dispatch a plain sample trigger.
    fn sample(&mut self, args: &SampleArgs, offset: f64, mix: Mix) -> f64 {
        let program = self.program;
        if let Some(custom) = program.custom_sample(&args.name) {
            if !self.enter(BlockKind::CustomSample, &custom.name) {
                return 0.0;
            }
            log::debug!(
                "custom sample '{}' ({} commands) at {offset:.3}s",
                args.name,
                custom.commands.len()
            );
            // Atomic unit: every command fires at the invocation offset.
            for cmd in &custom.commands {
                self.execute_command(cmd, offset, mix);
            }
            self.call_stack.pop();
            return 0.0;
        }

        let vars = &self.state.variables;
        let request = SampleRequest {
            name: args.name.clone(),
            pitch: vars.resolve(&args.pitch),
            timescale: vars.resolve(&args.timescale),
            start: offset,
            volume: self.leaf_volume(args.volume.as_ref(), mix),
            pan: self.leaf_pan(args.pan.as_ref(), mix),
        };
        log::debug!("sample '{}' at {offset:.3}s", request.name);
        let handle = self.backend.play_sample(request);
        self.track(handle);
        0.0
    }

    fn tone(&mut self, args: &ToneArgs, offset: f64, mix: Mix) -> f64 {
        let beats = self.state.variables.resolve(&args.beats).max(0.0);
        let duration = self.state.tempo.beats_to_seconds(beats);
        let request = ToneRequest {
            frequency: self.resolve_pitch(&args.pitch),
            duration,
            waveform: self.waveform(args.waveform.as_deref()),
            start: offset,
            volume: self.leaf_volume(args.volume.as_ref(), mix),
            pan: self.leaf_pan(args.pan.as_ref(), mix),
        };
        log::debug!(
            "tone {:.2}Hz for {duration:.3}s at {offset:.3}s",
            request.frequency
        );
        let handle = self.backend.generate_tone(request);
        self.track(handle);
        duration
    }

    fn slide(&mut self, args: &SlideArgs, offset: f64, mix: Mix) -> f64 {
        let beats = self.state.variables.resolve(&args.beats).max(0.0);
        let duration = self.state.tempo.beats_to_seconds(beats);
        let request = SlideRequest {
            from_hz: self.resolve_pitch(&args.from),
            to_hz: self.resolve_pitch(&args.to),
            start: offset,
            end: offset + duration,
            waveform: self.waveform(args.waveform.as_deref()),
            volume: self.leaf_volume(args.volume.as_ref(), mix),
            pan: self.leaf_pan(args.pan.as_ref(), mix),
        };
        log::debug!(
            "slide {:.2}Hz -> {:.2}Hz over {duration:.3}s at {offset:.3}s",
            request.from_hz,
            request.to_hz
        );
        let handle = self.backend.slide(request);
        self.track(handle);
        duration
    }

    fn track(&mut self, handle: Handle) {
        self.state.active.push(handle);
        self.dispatched += 1;
    }

    /// Pitch tokens: variable, then Hz literal, then note name.
    fn resolve_pitch(&self, value: &Value) -> f64 {
        match value {
            Value::Number { value: hz, token } => self.state.variables.get(token).unwrap_or(*hz),
            Value::Name(name) => match self.state.variables.get(name) {
                Some(hz) => hz,
                None => self.backend.note_to_frequency(name),
            },
        }
    }

    fn waveform(&mut self, name: Option<&str>) -> Waveform {
        let fallback = self.config.default_waveform;
        match name {
            None => fallback,
            Some(name) => Waveform::from_name(name).unwrap_or_else(|| {
                self.warn(format!("unknown waveform '{name}', using {fallback}"));
                fallback
            }),
        }
    }

    fn leaf_volume(&self, value: Option<&Value>, mix: Mix) -> f64 {
        let base = value
            .map(|v| self.state.variables.resolve(v))
            .unwrap_or(self.config.default_volume);
        (base * mix.volume).clamp(0.0, 1.0)
    }

    fn leaf_pan(&self, value: Option<&Value>, mix: Mix) -> f64 {
        let base = value.map(|v| self.state.variables.resolve(v)).unwrap_or(0.0);
        (base + mix.pan).clamp(-1.0, 1.0)
    }

    fn nested_mix(&self, outer: Mix, params: &MixParams) -> Mix {
        let vars = &self.state.variables;
        Mix {
            volume: outer.volume * params.volume.as_ref().map_or(1.0, |v| vars.resolve(v)),
            pan: outer.pan + params.pan.as_ref().map_or(0.0, |v| vars.resolve(v)),
        }
    }

    fn resolve_effect(&self, effect: &str, params: &[EffectArg]) -> EffectSpec {
        EffectSpec {
            kind: effect.to_string(),
            params: params
                .iter()
                .map(|p| EffectParam {
                    key: p.key.clone(),
                    value: self.state.variables.resolve(&p.value),
                })
                .collect(),
        }
    }

    fn record_effect(&mut self, block: &str, spec: EffectSpec) {
        log::debug!("effect {spec} on '{block}'");
        self.backend.apply_effect(block, &spec);
        self.state
            .effects
            .entry(block.to_string())
            .or_default()
            .push(spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Dsl;
    use crate::engine::state::StopHandle;
    use crate::event::{Timeline, Trigger};
    use assert_approx_eq::assert_approx_eq;

    fn run_with(src: &str, config: &EngineConfig) -> (f64, Vec<String>, Timeline) {
        let program = Dsl::parse(src);
        let mut backend = Timeline::new();
        let mut state = ExecutionState::new(config.default_bpm, StopHandle::new());
        let mut executor = Executor::new(&program, &mut backend, &mut state, config);
        let duration = executor.run();
        let (warnings, _) = executor.finish();
        (duration, warnings, backend)
    }

    fn run(src: &str) -> (f64, Vec<String>, Timeline) {
        run_with(src, &EngineConfig::default())
    }

    #[test]
    fn play_mix_scales_volume_and_offsets_pan() {
        let src = "play lead volume=0.5 pan=0.5\n[lead]\nsample a 1 1 0.8 0.25\nplay inner volume=0.5\n[end]\n[inner]\nsample b pan=0.9\n[end]\n";
        let (_, warnings, tl) = run(src);
        assert!(warnings.is_empty(), "{warnings:?}");
        let events = tl.events();
        assert_approx_eq!(events[0].volume, 0.4);
        assert_approx_eq!(events[0].pan, 0.75);
        assert_approx_eq!(events[1].volume, 0.25);
        assert_approx_eq!(events[1].pan, 1.0);
    }

    #[test]
    fn self_recursive_block_is_cut_on_reentry() {
        let (duration, warnings, tl) = run("play r\n[r]\nsample tick\nwait 1\nplay r\n[end]\n");
        assert_eq!(tl.len(), 1);
        assert_approx_eq!(duration, 0.5);
        assert_eq!(warnings, vec!["block 'r' invokes itself; skipped"]);
    }

    #[test]
    fn branching_recursion_stays_linear() {
        let (duration, warnings, tl) = run("play r\n[r]\nsample tick\nplay r r\nloop 3 r\n[end]\n");
        assert_eq!(tl.len(), 1);
        assert_eq!(duration, 0.0);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn mutual_recursion_is_cut() {
        let (_, warnings, tl) = run("play a\n[a]\nsample x\nplay b\n[end]\n[b]\nsample y\nplay a a\n[end]\n");
        assert_eq!(tl.len(), 2);
        assert_eq!(warnings, vec!["block 'a' invokes itself; skipped"]);
    }

    #[test]
    fn recursive_custom_sample_is_cut() {
        let (_, warnings, tl) = run("sample loopy\n<loopy>\nsample hit\nsample loopy\nsample loopy\n<end>\n");
        assert_eq!(tl.len(), 1);
        assert_eq!(warnings, vec!["custom sample 'loopy' invokes itself; skipped"]);
    }

    #[test]
    fn sibling_reuse_is_not_recursion() {
        let (_, warnings, tl) = run("play a a\nloop 2 a\n[a]\nsample t\n[end]\n");
        assert_eq!(tl.len(), 4);
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn long_chain_is_cut_at_max_depth() {
        let config = EngineConfig {
            max_depth: 2,
            ..EngineConfig::default()
        };
        let src = "play a\n[a]\nsample x\nplay b\n[end]\n[b]\nsample y\nplay c\n[end]\n[c]\nsample z\n[end]\n";
        let (_, warnings, tl) = run_with(src, &config);
        assert_eq!(tl.len(), 2);
        assert_eq!(warnings, vec!["block 'c' exceeds nesting depth 2; skipped"]);
    }

    #[test]
    fn invocations_are_capped_per_run() {
        let config = EngineConfig {
            max_invocations: 3,
            ..EngineConfig::default()
        };
        let (_, warnings, tl) = run_with("loop 5 x\n[x]\nsample tick\n[end]\n", &config);
        assert_eq!(tl.len(), 3);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("more than 3"));
    }

    #[test]
    fn unknown_waveform_falls_back_with_warning() {
        let (_, warnings, tl) = run("tone 220 1 wobble\n");
        assert_eq!(warnings, vec!["unknown waveform 'wobble', using sine"]);
        assert!(matches!(
            tl.events()[0].trigger,
            Trigger::Tone {
                waveform: Waveform::Sine,
                ..
            }
        ));
    }

    #[test]
    fn pitch_resolution_order() {
        let (_, _, tl) = run("set root 330\ntone root\ntone 220\ntone A4\ntone nonsense\n");
        let freqs: Vec<f64> = tl
            .events()
            .iter()
            .map(|e| match e.trigger {
                Trigger::Tone { frequency, .. } => frequency,
                _ => 0.0,
            })
            .collect();
        assert_eq!(freqs, vec![330.0, 220.0, 440.0, 440.0]);
    }

    #[test]
    fn slide_spans_its_duration() {
        let (duration, _, tl) = run("wait 1\nslide C4 C5 2 saw\n");
        assert_approx_eq!(duration, 1.5);
        let event = &tl.events()[0];
        assert_approx_eq!(event.start, 0.5);
        assert_approx_eq!(event.end(), 1.5);
    }

    #[test]
    fn invalid_and_unknown_commands_are_skipped() {
        let (duration, warnings, tl) = run("wiggle 3\nwait\nsample kick speed=2\nwait 1\n");
        assert_approx_eq!(duration, 0.5);
        assert_eq!(tl.len(), 1);
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn invalid_bpm_keeps_tempo() {
        let (duration, warnings, _) = run("bpm 0\nwait 1\nset t -5\nbpm t\nwait 1\n");
        assert_approx_eq!(duration, 1.0);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn negative_wait_counts_as_zero() {
        let (duration, _, _) = run("wait -2\nwait 1\n");
        assert_approx_eq!(duration, 0.5);
    }

    #[test]
    fn effects_forwarded_from_headers_and_commands() {
        let (duration, _, tl) = run("set wet 0.3\neffect reverb pad wet size=2\n[pad] (delay 0.25)\ntone C4\n[end]\n");
        assert_eq!(duration, 0.0);
        let effects = tl.effects();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].1.kind, "delay");
        assert_eq!(effects[1].0, "pad");
        assert_eq!(effects[1].1.to_string(), "(reverb 0.3 size=2)");
    }

    #[test]
    fn loop_count_from_variable() {
        let (duration, _, tl) = run("set n 2.9\nloop n x\n[x]\nsample kick\nwait 2\n[end]\n");
        assert_eq!(tl.len(), 2);
        assert_approx_eq!(duration, 2.0);
    }

    #[test]
    fn loop_with_zero_or_negative_count_does_nothing() {
        let (duration, warnings, tl) = run("loop 0 x\nloop -3 x\n[x]\nsample kick\n[end]\n");
        assert_eq!(duration, 0.0);
        assert!(tl.is_empty());
        assert!(warnings.is_empty());
    }
}

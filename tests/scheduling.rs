//! End-to-end scheduling tests: source text → engine → recorded timeline.
//!
//! All tests run against the in-memory `Timeline` backend, so no audio
//! hardware is involved.

use assert_approx_eq::assert_approx_eq;

use blockbeat::config::EngineConfig;
use blockbeat::engine::{
    AudioBackend, Engine, Handle, RunReport, RunState, SampleRequest, SlideRequest, StopHandle,
    ToneRequest,
};
use blockbeat::event::{ScheduledEvent, Timeline, Trigger};

/// Helper: parse and execute `src` at the default tempo (120 BPM, 0.5s per beat).
fn run(src: &str) -> (RunReport, Vec<ScheduledEvent>) {
    let mut engine = Engine::with_backend(EngineConfig::default(), Timeline::new());
    engine.parse(src);
    let report = engine.execute().expect("backend attached");
    let events = engine.backend().unwrap().events().to_vec();
    (report, events)
}

fn sample_name(event: &ScheduledEvent) -> &str {
    match &event.trigger {
        Trigger::Sample { name, .. } => name,
        _ => panic!("expected a sample, got {:?}", event.trigger),
    }
}

fn starts_of(events: &[ScheduledEvent], name: &str) -> Vec<f64> {
    events
        .iter()
        .filter(|e| matches!(&e.trigger, Trigger::Sample { name: n, .. } if n == name))
        .map(|e| e.start)
        .collect()
}

// =============================================================================
// Sequential composition
// =============================================================================

#[test]
fn leaf_offset_is_sum_of_preceding_durations() {
    let src = "\
[main]
  sample a
  tone C4 1
  sample b
  wait 0.5
  slide C4 G4 2
  sample c
  tone E4 0.25
  sample d
[end]
";
    let (report, events) = run(src);
    // durations: a=0, tone=0.5, b=0, wait=0.25, slide=1.0, c=0, tone=0.125, d=0
    assert_eq!(starts_of(&events, "a"), vec![0.0]);
    assert_eq!(starts_of(&events, "b"), vec![0.5]);
    assert_eq!(starts_of(&events, "c"), vec![1.75]);
    assert_eq!(starts_of(&events, "d"), vec![1.875]);
    assert_approx_eq!(report.duration, 1.875);
    assert_eq!(report.dispatched, 7);
}

#[test]
fn sample_contributes_zero_duration() {
    let (report, events) = run("sample kick\nsample snare\nsample hat\n");
    assert!(events.iter().all(|e| e.start == 0.0));
    assert_eq!(report.duration, 0.0);
}

// =============================================================================
// Parallel composition
// =============================================================================

#[test]
fn play_returns_longest_branch() {
    let src = "\
play a b
sample after

[a]
  sample a_start
  wait 4
[end]

[b]
  sample b_start
  wait 6
[end]
";
    let (report, events) = run(src);
    // a = 2s, b = 3s at 120 BPM
    assert_eq!(starts_of(&events, "a_start"), vec![0.0]);
    assert_eq!(starts_of(&events, "b_start"), vec![0.0]);
    assert_eq!(starts_of(&events, "after"), vec![3.0]);
    assert_approx_eq!(report.duration, 3.0);
}

#[test]
fn nested_play_offsets_are_absolute() {
    let src = "\
[main]
  wait 2
  play inner
[end]

[inner]
  wait 1
  sample deep
[end]
";
    let (_, events) = run(src);
    assert_eq!(starts_of(&events, "deep"), vec![1.5]);
}

#[test]
fn loop_iterations_start_back_to_back() {
    let src = "\
loop 3 x
sample after

[x]
  sample tick
  wait 2
[end]
";
    let (report, events) = run(src);
    assert_eq!(starts_of(&events, "tick"), vec![0.0, 1.0, 2.0]);
    assert_eq!(starts_of(&events, "after"), vec![3.0]);
    assert_approx_eq!(report.duration, 3.0);
}

#[test]
fn loop_of_several_blocks_advances_by_longest() {
    let src = "\
loop 2 short long

[short]
  sample s
  wait 1
[end]

[long]
  sample l
  wait 3
[end]
";
    let (report, events) = run(src);
    assert_eq!(starts_of(&events, "s"), vec![0.0, 1.5]);
    assert_eq!(starts_of(&events, "l"), vec![0.0, 1.5]);
    assert_approx_eq!(report.duration, 3.0);
}

#[test]
fn loop_with_missing_block_runs_nothing() {
    let (report, events) = run("loop 4 x ghost\n[x]\nsample tick\nwait 1\n[end]\n");
    assert!(events.is_empty());
    assert_eq!(report.duration, 0.0);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("ghost"));
}

// =============================================================================
// Tempo and variables
// =============================================================================

#[test]
fn bpm_change_only_affects_later_commands() {
    let (report, events) = run("wait 1\nsample mid\nbpm 60\nwait 1\nsample end\n");
    assert_eq!(starts_of(&events, "mid"), vec![0.5]);
    assert_eq!(starts_of(&events, "end"), vec![1.5]);
    assert_approx_eq!(report.duration, 1.5);
}

#[test]
fn bpm_inside_a_branch_is_seen_by_later_siblings() {
    let src = "\
play fast slow
wait 1

[fast]
  bpm 240
[end]

[slow]
  tone A4 1
[end]
";
    let (report, events) = run(src);
    assert_approx_eq!(events[0].duration, 0.25);
    assert_approx_eq!(report.duration, 0.5);
}

#[test]
fn variable_resolves_at_point_of_use() {
    let (_, events) = run("set vol 0.5\ntone C4 1 sine vol\n");
    assert_eq!(events.len(), 1);
    assert_approx_eq!(events[0].volume, 0.5);
}

#[test]
fn variable_value_follows_execution_order() {
    let src = "\
set v 0.2
loop 2 bump
[bump]
  sample hit 1 1 v
  set v 0.9
[end]
";
    let (_, events) = run(src);
    assert_approx_eq!(events[0].volume, 0.2);
    assert_approx_eq!(events[1].volume, 0.9);
}

#[test]
fn variable_lookup_comes_before_numeric_parse() {
    let (report, events) = run("set 2 4\nwait 2\nsample kick 1 1 2\nset 2 0.25\ntone 2 2\n");
    // `wait 2` reads the variable: 4 beats
    assert_approx_eq!(report.duration, 2.0 + 0.125);
    assert_approx_eq!(events[0].start, 2.0);
    // volume 4 is clamped
    assert_approx_eq!(events[0].volume, 1.0);
    assert!(matches!(events[1].trigger, Trigger::Tone { frequency, .. } if frequency == 0.25));
}

#[test]
fn unset_variable_reads_as_zero() {
    let (report, events) = run("wait later\nsample kick volume=nothing\n");
    assert_eq!(report.duration, 0.0);
    assert_eq!(events[0].volume, 0.0);
}

// =============================================================================
// Custom samples
// =============================================================================

#[test]
fn custom_sample_fans_out_at_one_offset() {
    let src = "\
[main]
  wait 1
  sample hit
  sample after
[end]

<hit>
  sample kick
  tone C2 2
  sample clap
<end>
";
    let (report, events) = run(src);
    let at_half: Vec<&ScheduledEvent> = events.iter().filter(|e| e.start == 0.5).collect();
    assert_eq!(at_half.len(), 4);
    assert_eq!(sample_name(at_half[3]), "after");
    assert_approx_eq!(report.duration, 0.5);
    assert_eq!(report.dispatched, 4);
}

#[test]
fn custom_sample_shadows_plain_sample_name() {
    let (_, events) = run("sample kick\n<kick>\nsample sub 0.5\nsample click\n<end>\n");
    let names: Vec<&str> = events.iter().map(sample_name).collect();
    assert_eq!(names, vec!["sub", "click"]);
}

// =============================================================================
// Resolution warnings and stopping
// =============================================================================

#[test]
fn missing_block_warns_and_counts_zero() {
    let (report, events) = run("play missing\nsample kick\n");
    assert!(report.completed());
    assert_eq!(report.duration, 0.0);
    assert_eq!(events.len(), 1);
    assert_eq!(report.warnings, vec!["block 'missing' not found"]);
}

#[test]
fn play_with_one_missing_block_still_plays_the_rest() {
    let (report, events) = run("play missing real\n[real]\nsample kick\nwait 2\n[end]\n");
    assert_eq!(events.len(), 1);
    assert_approx_eq!(report.duration, 1.0);
}

#[test]
fn branching_self_recursion_finishes_under_default_config() {
    let (report, events) = run("play r\n[r]\nsample tick\nplay r r\n[end]\n");
    assert!(report.completed());
    assert_eq!(report.dispatched, 1);
    assert_eq!(events.len(), 1);
    assert_eq!(report.warnings, vec!["block 'r' invokes itself; skipped"]);
}

#[test]
fn branching_custom_sample_recursion_finishes() {
    let (report, events) = run("sample c\n<c>\nsample hit\nsample c\nsample c\n<end>\n");
    assert_eq!(events.len(), 1);
    assert_eq!(report.warnings.len(), 1);
}

/// Records like `Timeline` but requests a stop after a fixed number of dispatches.
struct StopAfter {
    inner: Timeline,
    stop: StopHandle,
    remaining: usize,
}

impl StopAfter {
    fn count(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.stop.stop();
        }
    }
}

impl AudioBackend for StopAfter {
    fn play_sample(&mut self, request: SampleRequest) -> Handle {
        let handle = self.inner.play_sample(request);
        self.count();
        handle
    }

    fn generate_tone(&mut self, request: ToneRequest) -> Handle {
        let handle = self.inner.generate_tone(request);
        self.count();
        handle
    }

    fn slide(&mut self, request: SlideRequest) -> Handle {
        let handle = self.inner.slide(request);
        self.count();
        handle
    }

    fn play(&mut self) {
        self.inner.play();
    }

    fn pause(&mut self) {
        self.inner.pause();
    }

    fn stop(&mut self) {
        self.inner.stop();
    }
}

#[test]
fn stop_is_polled_between_commands() {
    let mut engine: Engine<StopAfter> = Engine::new(EngineConfig::default());
    let stop = engine.stop_handle();
    engine.set_backend(StopAfter {
        inner: Timeline::new(),
        stop,
        remaining: 2,
    });
    engine.parse("loop 10 x\nsample never\n[x]\nsample tick\nwait 1\n[end]\n");

    let report = engine.execute().unwrap();
    assert_eq!(report.state, RunState::Stopped);
    assert_eq!(engine.run_state(), RunState::Stopped);
    assert_eq!(report.dispatched, 2);
    // the second iteration stopped before its wait
    assert_approx_eq!(report.duration, 0.5);

    let events = engine.backend().unwrap().inner.events();
    assert!(events
        .iter()
        .all(|e| matches!(&e.trigger, Trigger::Sample { name, .. } if name == "tick")));
}

#[test]
fn stop_handle_works_across_threads() {
    let mut engine = Engine::with_backend(EngineConfig::default(), Timeline::new());
    let handle = engine.stop_handle();
    std::thread::spawn(move || handle.stop()).join().unwrap();
    assert!(!engine.stop_handle().is_running());

    engine.parse("sample kick\n");
    assert!(engine.execute().unwrap().completed());
}

//! Wires a parsed program into the clock scheduler and the wallpaper sink:
//! initial replay of the ongoing event, per-event callbacks, the shared
//! crossfade frame, and the refresh signal.

pub mod crossfade;
pub mod sink;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{Duration, Local, NaiveTime, Timelike};

use crate::engine::crossfade::{crossfade_files, in_window, transition_ratio};
use crate::engine::sink::WallpaperSink;
use crate::schedule::scheduler::{Action, ClockScheduler, DEFAULT_COOLDOWN_TICK, run_forever};
use crate::timed::clock::{clock_diff, clock_format, duration_format};
use crate::timed::error::{TimedError, TimedResult};
use crate::timed::model::{Event, Program, StaticEvent, TransitionEvent};

pub struct Engine {
    program: Program,
    sink: Arc<dyn WallpaperSink>,
    temp_image: PathBuf,
    set_lock: Arc<Mutex<()>>,
    cooldown_tick: StdDuration,
    verbose: bool,
}

fn default_temp_image() -> PathBuf {
    std::env::temp_dir().join("timedwall-crossfade.png")
}

fn absolute(filename: &str) -> PathBuf {
    let path = Path::new(filename);
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

impl Engine {
    pub fn new(program: Program, sink: Arc<dyn WallpaperSink>) -> Self {
        Engine {
            program,
            sink,
            temp_image: default_temp_image(),
            set_lock: Arc::new(Mutex::new(())),
            cooldown_tick: DEFAULT_COOLDOWN_TICK,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn temp_image(mut self, path: PathBuf) -> Self {
        self.temp_image = path;
        self
    }

    fn loop_wait(&self) -> Duration {
        Duration::from_std(self.program.loop_wait).unwrap_or_else(|_| Duration::seconds(5))
    }

    fn apply_file(&self, filename: &str) -> TimedResult<()> {
        let path = absolute(filename);
        if !path.exists() {
            return Err(TimedError::MissingFile(path));
        }
        if self.verbose {
            println!("Setting {}", path.display());
        }
        let _guard = self.set_lock.lock().expect("set lock");
        self.sink.apply(&path)
    }

    /// Renders one blended frame and applies it, holding the set lock across
    /// the write-then-apply sequence so frames never interleave.
    fn apply_transition_frame(&self, event: &TransitionEvent, ratio: f64) -> TimedResult<()> {
        let from = absolute(&event.from_filename);
        let to = absolute(&event.to_filename);
        let _guard = self.set_lock.lock().expect("set lock");
        crossfade_files(&from, &to, &self.temp_image, ratio)?;
        if !self.temp_image.exists() {
            return Err(TimedError::MissingFile(self.temp_image.clone()));
        }
        if self.verbose {
            println!("Setting {}", self.temp_image.display());
        }
        self.sink.apply(&self.temp_image)
    }

    /// Replays the event in progress at `now`: a static image directly, a
    /// transition at its current progress ratio. Used at startup and on the
    /// refresh signal, before and independent of the schedule.
    pub fn set_current_at(&self, now: NaiveTime) -> TimedResult<()> {
        let (event, prev_start) = self.program.prev_event(now)?;
        let span = self.program.current_span(now)?;
        match event {
            Event::Static(s) => {
                if self.verbose {
                    println!(
                        "Attaching to ongoing static wallpaper event that started at {}",
                        clock_format(prev_start)
                    );
                }
                self.apply_file(&s.filename)
            }
            Event::Transition(t) => {
                let elapsed = clock_diff(now, prev_start);
                let ratio =
                    elapsed.num_milliseconds() as f64 / span.num_milliseconds() as f64;
                let ratio = ratio.clamp(0.0, 1.0);
                if self.verbose {
                    println!(
                        "Attaching to ongoing transition event at {} ({}% complete)",
                        clock_format(prev_start),
                        (ratio * 100.0) as u32
                    );
                }
                self.apply_transition_frame(t, ratio)
            }
        }
    }

    pub fn set_current(&self) -> TimedResult<()> {
        self.set_current_at(Local::now().time())
    }

    fn static_action(self: &Arc<Self>, event: &StaticEvent) -> Action {
        let engine = Arc::clone(self);
        let event = event.clone();
        Arc::new(move || {
            if engine.verbose {
                println!(
                    "Triggered static wallpaper event at {}",
                    clock_format(event.at)
                );
            }
            engine.apply_file(&event.filename)
        })
    }

    /// A transition action keeps rendering frames every loop-wait until its
    /// window closes. It runs on its own thread, so the scheduler keeps
    /// ticking; the cooldown (the window length) stops re-firing meanwhile.
    fn transition_action(self: &Arc<Self>, event: &TransitionEvent) -> Action {
        let engine = Arc::clone(self);
        let event = event.clone();
        Arc::new(move || {
            let window = event.duration();
            let loop_wait = engine.loop_wait();
            if engine.verbose {
                println!(
                    "Triggered transition event at {} (window {})",
                    clock_format(event.from),
                    duration_format(window)
                );
            }
            if window <= Duration::zero() {
                return engine.apply_file(&event.to_filename);
            }
            loop {
                let now = Local::now().time();
                if !in_window(event.from, window, now) {
                    return Ok(());
                }
                let ratio = transition_ratio(window, event.up_to, now, loop_wait);
                engine.apply_transition_frame(&event, ratio)?;
                if ratio >= 1.0 {
                    return Ok(());
                }
                thread::sleep(engine.program.loop_wait);
            }
        })
    }

    fn build_scheduler(self: &Arc<Self>) -> ClockScheduler {
        let mut scheduler = ClockScheduler::new();
        for event in &self.program.events {
            match event {
                Event::Static(s) => {
                    if self.verbose {
                        println!(
                            "Registering static event at {} for setting {}",
                            clock_format(s.at),
                            s.filename
                        );
                    }
                    let cooldown = self.program.until_next(s.at);
                    scheduler.clock_event(
                        s.at.hour(),
                        s.at.minute(),
                        cooldown,
                        self.static_action(s),
                    );
                }
                Event::Transition(t) => {
                    if self.verbose {
                        println!(
                            "Registering transition at {} from {} to {}",
                            clock_format(t.from),
                            t.from_filename,
                            t.to_filename
                        );
                    }
                    scheduler.clock_event(
                        t.from.hour(),
                        t.from.minute(),
                        t.duration(),
                        self.transition_action(t),
                    );
                }
            }
        }
        scheduler
    }

    #[cfg(unix)]
    fn spawn_refresh_handler(self: &Arc<Self>) {
        use signal_hook::consts::{SIGHUP, SIGUSR1};
        use signal_hook::iterator::Signals;

        let engine = Arc::clone(self);
        thread::spawn(move || {
            let mut signals = match Signals::new([SIGHUP, SIGUSR1]) {
                Ok(signals) => signals,
                Err(err) => {
                    eprintln!("could not listen for refresh signals: {err}");
                    return;
                }
            };
            for signal in signals.forever() {
                println!("Received signal {signal}, refreshing the wallpaper");
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    if let Err(err) = engine.set_current() {
                        eprintln!("refresh failed: {err}");
                    }
                });
            }
        });
    }

    /// Sets the current wallpaper, then runs the event loop until process
    /// exit. There is no cooperative cancellation.
    pub fn run(self) -> Result<()> {
        if self.verbose {
            println!("Using the timed wallpaper program {:?}", self.program.name);
        }
        let loop_wait = self.program.loop_wait;
        let cooldown_tick = self.cooldown_tick;
        let verbose = self.verbose;

        let engine = Arc::new(self);
        engine.set_current()?;

        #[cfg(unix)]
        engine.spawn_refresh_handler();

        let scheduler = Arc::new(Mutex::new(engine.build_scheduler()));
        run_forever(scheduler, loop_wait, cooldown_tick, verbose)
    }
}

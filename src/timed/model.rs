use std::path::PathBuf;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveTime};
use serde::Serialize;

use crate::timed::clock::{clock_diff, day, mod24};
use crate::timed::error::{TimedError, TimedResult};

pub const FORMAT_VERSION: &str = "1.0";

pub const DEFAULT_LOOP_WAIT: StdDuration = StdDuration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticEvent {
    pub at: NaiveTime,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionEvent {
    pub from: NaiveTime,
    pub up_to: NaiveTime,
    pub from_filename: String,
    pub to_filename: String,
    pub kind: TransitionKind,
}

impl TransitionEvent {
    /// Window length on the 24h circle; zero means an instantaneous switch.
    pub fn duration(&self) -> Duration {
        clock_diff(self.up_to, self.from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Overlay,
    Named(String),
}

impl TransitionKind {
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "overlay" {
            TransitionKind::Overlay
        } else {
            TransitionKind::Named(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransitionKind::Overlay => "overlay",
            TransitionKind::Named(name) => name,
        }
    }

    pub fn is_overlay(&self) -> bool {
        matches!(self, TransitionKind::Overlay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Static(StaticEvent),
    Transition(TransitionEvent),
}

impl Event {
    pub fn start(&self) -> NaiveTime {
        match self {
            Event::Static(s) => s.at,
            Event::Transition(t) => t.from,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub version: String,
    pub name: String,
    /// Filename template with a `%s` placeholder, or empty for verbatim names.
    pub format: String,
    pub path: PathBuf,
    pub events: Vec<Event>,
    pub loop_wait: StdDuration,
}

impl Program {
    pub fn new(version: impl Into<String>, name: impl Into<String>, format: impl Into<String>) -> Self {
        Program {
            version: version.into(),
            name: name.into(),
            format: format.into(),
            path: PathBuf::new(),
            events: Vec::new(),
            loop_wait: DEFAULT_LOOP_WAIT,
        }
    }

    pub fn expand_filename(&self, meat: &str) -> String {
        if self.format.contains("%s") {
            self.format.replacen("%s", meat, 1)
        } else {
            meat.to_string()
        }
    }

    pub fn add_static(&mut self, at: NaiveTime, filename: &str) {
        let filename = self.expand_filename(filename);
        self.events.push(Event::Static(StaticEvent { at, filename }));
    }

    pub fn add_transition(
        &mut self,
        from: NaiveTime,
        up_to: NaiveTime,
        from_filename: &str,
        to_filename: &str,
        kind: TransitionKind,
    ) {
        let from_filename = self.expand_filename(from_filename);
        let to_filename = self.expand_filename(to_filename);
        self.events.push(Event::Transition(TransitionEvent {
            from,
            up_to,
            from_filename,
            to_filename,
            kind,
        }));
    }

    pub fn statics(&self) -> impl Iterator<Item = &StaticEvent> {
        self.events.iter().filter_map(|event| match event {
            Event::Static(s) => Some(s),
            Event::Transition(_) => None,
        })
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionEvent> {
        self.events.iter().filter_map(|event| match event {
            Event::Static(_) => None,
            Event::Transition(t) => Some(t),
        })
    }

    /// Unique referenced image paths, in declaration order.
    pub fn images(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for event in &self.events {
            let names: [&str; 2] = match event {
                Event::Static(s) => [s.filename.as_str(), ""],
                Event::Transition(t) => [t.from_filename.as_str(), t.to_filename.as_str()],
            };
            for name in names {
                if !name.is_empty() && !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }

    /// Smallest positive distance from `t` forward to any event start.
    /// Falls back to a full day when no other start lies ahead.
    pub fn until_next(&self, t: NaiveTime) -> Duration {
        let mut min_diff = day();
        for event in &self.events {
            let diff = clock_diff(event.start(), t);
            if diff > Duration::zero() && diff < min_diff {
                min_diff = diff;
            }
        }
        min_diff
    }

    /// The event in progress at `now`: the one whose start is the closest at
    /// or before `now`, wrapping backward through midnight.
    pub fn prev_event(&self, now: NaiveTime) -> TimedResult<(&Event, NaiveTime)> {
        if self.events.is_empty() {
            return Err(TimedError::NoEvents);
        }
        let mut best: Option<(&Event, Duration)> = None;
        for event in &self.events {
            let diff = clock_diff(now, event.start());
            match best {
                Some((_, smallest)) if diff >= smallest => {}
                _ => best = Some((event, diff)),
            }
        }
        let (event, _) = best.expect("non-empty program has a previous event");
        Ok((event, event.start()))
    }

    /// The next event strictly after `now`, wrapping forward through
    /// midnight. A start equal to `now` counts as tomorrow's occurrence.
    pub fn next_event(&self, now: NaiveTime) -> TimedResult<(&Event, NaiveTime)> {
        if self.events.is_empty() {
            return Err(TimedError::NoEvents);
        }
        let mut best: Option<(&Event, Duration)> = None;
        for event in &self.events {
            let mut diff = clock_diff(event.start(), now);
            if diff == Duration::zero() {
                diff = day();
            }
            match best {
                Some((_, smallest)) if diff >= smallest => {}
                _ => best = Some((event, diff)),
            }
        }
        let (event, _) = best.expect("non-empty program has a next event");
        Ok((event, event.start()))
    }

    /// Length of the window between the ongoing event and the next one.
    /// A program with a single distinct start spans the whole day.
    pub fn current_span(&self, now: NaiveTime) -> TimedResult<Duration> {
        let (_, prev_start) = self.prev_event(now)?;
        let (_, next_start) = self.next_event(now)?;
        let span = mod24(next_start.signed_duration_since(prev_start));
        if span == Duration::zero() {
            Ok(day())
        } else {
            Ok(span)
        }
    }
}

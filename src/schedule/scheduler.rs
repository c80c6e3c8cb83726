//! Daily-recurring clock triggers with a cooldown so repeated ticks of the
//! polling loop do not re-fire the same event.
//!
//! Each registered callback moves through Idle -> Armed -> Firing ->
//! Cooling -> Idle. `tick` matches at minute resolution and hands back the
//! actions due right now; dispatching them (fire-and-forget) is the
//! caller's business, so a slow action never blocks the loop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, Timelike};

use crate::timed::clock::clock_format;
use crate::timed::error::TimedResult;

pub type Action = Arc<dyn Fn() -> TimedResult<()> + Send + Sync>;

pub const DEFAULT_COOLDOWN_TICK: StdDuration = StdDuration::from_secs(1);

struct ScheduledEntry {
    id: usize,
    hour: u32,
    minute: u32,
    cooldown: Duration,
    repeat_daily: bool,
    action: Action,
}

#[derive(Debug, Clone, Copy)]
struct CoolingEntry {
    id: usize,
    cooled_until: DateTime<Local>,
    repeat_daily: bool,
}

/// Entries that must not re-fire yet, oldest first. Strictly FIFO: only the
/// oldest entry can expire, one per cooldown tick.
#[derive(Default)]
struct CooldownQueue {
    entries: VecDeque<CoolingEntry>,
}

impl CooldownQueue {
    fn arm(&mut self, id: usize, cooled_until: DateTime<Local>, repeat_daily: bool) {
        self.entries.push_back(CoolingEntry {
            id,
            cooled_until,
            repeat_daily,
        });
    }

    fn is_cooling(&self, id: usize) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Removes the oldest entry once its cooldown has fully elapsed.
    /// Once-only entries are requeued instead, staying suppressed forever.
    fn expire_oldest(&mut self, now: DateTime<Local>) -> Option<usize> {
        let front = self.entries.front()?;
        if now < front.cooled_until {
            return None;
        }
        let entry = self.entries.pop_front()?;
        if entry.repeat_daily {
            Some(entry.id)
        } else {
            self.entries.push_back(entry);
            None
        }
    }
}

pub struct Firing {
    pub hour: u32,
    pub minute: u32,
    pub action: Action,
}

#[derive(Default)]
pub struct ClockScheduler {
    entries: Vec<ScheduledEntry>,
    cooling: CooldownQueue,
    next_id: usize,
}

impl ClockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        hour: u32,
        minute: u32,
        cooldown: Duration,
        repeat_daily: bool,
        action: Action,
    ) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(ScheduledEntry {
            id,
            hour,
            minute,
            cooldown,
            repeat_daily,
            action,
        });
        id
    }

    /// Registers a callback for every day at the given hour and minute.
    pub fn clock_event(
        &mut self,
        hour: u32,
        minute: u32,
        cooldown: Duration,
        action: Action,
    ) -> usize {
        self.register(hour, minute, cooldown, true, action)
    }

    pub fn is_cooling(&self, id: usize) -> bool {
        self.cooling.is_cooling(id)
    }

    /// Arms and returns every callback whose hour and minute match `now`
    /// and which is not cooling. All matches of one tick fire together; no
    /// ordering between them is promised.
    pub fn tick(&mut self, now: DateTime<Local>) -> Vec<Firing> {
        let mut due = Vec::new();
        for entry in &self.entries {
            if now.hour() != entry.hour || now.minute() != entry.minute {
                continue;
            }
            if self.is_cooling(entry.id) {
                continue;
            }
            self.cooling
                .arm(entry.id, now + entry.cooldown, entry.repeat_daily);
            due.push(Firing {
                hour: entry.hour,
                minute: entry.minute,
                action: Arc::clone(&entry.action),
            });
        }
        due
    }

    /// One step of the independent cooldown loop.
    pub fn expire_tick(&mut self, now: DateTime<Local>) -> Option<usize> {
        self.cooling.expire_oldest(now)
    }
}

/// Drives the two long-lived loops: the tick loop on the calling thread and
/// the cooldown loop on its own thread. Actions are spawned fire-and-forget
/// with no timeout; a failure is logged and never unwinds the scheduler.
pub fn run_forever(
    scheduler: Arc<Mutex<ClockScheduler>>,
    loop_wait: StdDuration,
    cooldown_tick: StdDuration,
    verbose: bool,
) -> ! {
    {
        let scheduler = Arc::clone(&scheduler);
        thread::spawn(move || {
            loop {
                scheduler
                    .lock()
                    .expect("cooldown loop lock")
                    .expire_tick(Local::now());
                thread::sleep(cooldown_tick);
            }
        });
    }

    loop {
        let due = scheduler.lock().expect("tick loop lock").tick(Local::now());
        for firing in due {
            if verbose {
                println!(
                    "Trigger event at {}",
                    clock_format(Local::now().time())
                );
            }
            thread::spawn(move || {
                if let Err(err) = (firing.action)() {
                    eprintln!(
                        "event at {:02}:{:02} failed: {err}",
                        firing.hour, firing.minute
                    );
                }
            });
        }
        thread::sleep(loop_wait);
    }
}

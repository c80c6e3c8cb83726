//! The line-oriented timed wallpaper format: `key: value` headers, `//`
//! comments and `@` event lines.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveTime;

use crate::timed::clock::clock_format;
use crate::timed::error::{TimedError, TimedResult};
use crate::timed::model::{Event, Program, StaticEvent, TransitionEvent, TransitionKind};

pub fn load_program(path: &Path) -> Result<Program> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read program file {}", path.display()))?;
    let mut program = parse_program_text(&path.display().to_string(), &content)?;
    program.path = path.to_path_buf();
    Ok(program)
}

enum ParsedLine {
    Static { at: NaiveTime, filename: String },
    Transition {
        from: NaiveTime,
        up_to: NaiveTime,
        from_filename: String,
        to_filename: String,
        kind: TransitionKind,
    },
}

/// Parses the whole document or fails; no partial program is ever returned.
pub fn parse_program_text(path: &str, content: &str) -> TimedResult<Program> {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut parsed: Vec<ParsedLine> = Vec::new();

    for (index, raw_line) in content.lines().enumerate() {
        let number = index + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix("//") {
            eprintln!("{}", comment.trim_start());
            continue;
        }
        if trimmed.starts_with('@') {
            parsed.push(parse_event_line(path, number, trimmed)?);
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            return Err(TimedError::line(path, number, trimmed, "invalid syntax"));
        };
        headers.push((key.trim().to_string(), value.trim().to_string()));
    }

    let header = |key: &str| -> Option<&str> {
        headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };
    let Some(version) = header("stw") else {
        return Err(TimedError::document(path, "could not find the stw field"));
    };
    let name = header("name").unwrap_or_default();
    let format = header("format").unwrap_or_default();

    let mut program = Program::new(version, name, format);
    for line in parsed {
        match line {
            ParsedLine::Static { at, filename } => program.add_static(at, &filename),
            ParsedLine::Transition {
                from,
                up_to,
                from_filename,
                to_filename,
                kind,
            } => program.add_transition(from, up_to, &from_filename, &to_filename, kind),
        }
    }
    Ok(program)
}

/// Consumes a leading `H:MM` / `HH:MM` clock time, returning the rest.
fn take_clock(input: &str) -> Option<(NaiveTime, &str)> {
    let (hour_digits, rest) = split_digits(input);
    let rest = rest.strip_prefix(':')?;
    let (minute_digits, rest) = split_digits(rest);
    if hour_digits.is_empty() || minute_digits.is_empty() || minute_digits.len() > 2 {
        return None;
    }
    let hour: u32 = hour_digits.parse().ok()?;
    let minute: u32 = minute_digits.parse().ok()?;
    Some((NaiveTime::from_hms_opt(hour, minute, 0)?, rest))
}

fn split_digits(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    input.split_at(end)
}

fn parse_event_line(path: &str, number: usize, trimmed: &str) -> TimedResult<ParsedLine> {
    let body = &trimmed[1..];
    let Some((first, rest)) = take_clock(body) else {
        return Err(TimedError::line(path, number, trimmed, "time"));
    };
    if let Some(rest) = rest.strip_prefix(':') {
        let filename = rest.trim();
        if filename.is_empty() {
            return Err(TimedError::line(path, number, trimmed, "missing filename"));
        }
        return Ok(ParsedLine::Static {
            at: first,
            filename: filename.to_string(),
        });
    }
    let Some(rest) = rest.strip_prefix('-') else {
        return Err(TimedError::line(path, number, trimmed, "missing colon"));
    };
    let Some((second, rest)) = take_clock(rest) else {
        return Err(TimedError::line(path, number, trimmed, "time"));
    };
    let Some(rest) = rest.strip_prefix(':') else {
        return Err(TimedError::line(path, number, trimmed, "missing colon"));
    };
    let Some((from_filename, to_part)) = rest.split_once("..") else {
        return Err(TimedError::line(path, number, trimmed, "missing \"..\""));
    };
    let (to_filename, kind) = match to_part.split_once('|') {
        Some((to_filename, kind)) => (to_filename, TransitionKind::parse(kind)),
        None => (to_part, TransitionKind::Overlay),
    };
    Ok(ParsedLine::Transition {
        from: first,
        up_to: second,
        from_filename: from_filename.trim().to_string(),
        to_filename: to_filename.trim().to_string(),
        kind,
    })
}

/// Returns the part of a filename between the template's common prefix and
/// suffix; names too short to carry both are passed through unchanged.
pub fn meat<'a>(filename: &'a str, prefix: &str, suffix: &str) -> &'a str {
    if filename.len() < prefix.len() + suffix.len() {
        return filename;
    }
    filename
        .get(prefix.len()..filename.len() - suffix.len())
        .unwrap_or(filename)
}

fn template_parts(format: &str) -> Option<(&str, &str)> {
    format.split_once("%s")
}

fn render_static(event: &StaticEvent, format: &str) -> String {
    match template_parts(format) {
        Some((prefix, suffix)) => format!(
            "@{}: {}",
            clock_format(event.at),
            meat(&event.filename, prefix, suffix)
        ),
        None => format!("@{}: {}", clock_format(event.at), event.filename),
    }
}

fn render_transition(event: &TransitionEvent, format: &str) -> String {
    let (from_name, to_name) = match template_parts(format) {
        Some((prefix, suffix)) => (
            meat(&event.from_filename, prefix, suffix),
            meat(&event.to_filename, prefix, suffix),
        ),
        None => (event.from_filename.as_str(), event.to_filename.as_str()),
    };
    let head = format!(
        "@{}-{}: {} .. {}",
        clock_format(event.from),
        clock_format(event.up_to),
        from_name,
        to_name
    );
    if event.kind.is_overlay() {
        head
    } else {
        format!("{} | {}", head, event.kind.as_str())
    }
}

/// Serializes to the canonical form: headers first, then all event lines in
/// lexicographic order of their rendered text. The sort is textual by
/// design, not chronological.
pub fn serialize_program(program: &Program) -> String {
    let mut lines: Vec<String> = program
        .events
        .iter()
        .map(|event| match event {
            Event::Static(s) => render_static(s, &program.format),
            Event::Transition(t) => render_transition(t, &program.format),
        })
        .collect();
    lines.sort();
    format!(
        "stw: {}\nname: {}\nformat: {}\n{}",
        program.version,
        program.name,
        program.format,
        lines.join("\n")
    )
}

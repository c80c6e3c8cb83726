//! Converts a markup program into the line-oriented text format without
//! losing any semantic information. Filenames are factored through a common
//! prefix/suffix template.

use chrono::NaiveTime;

use crate::format::markup::{MarkupEventRef, MarkupProgram};
use crate::format::text::{meat, parse_program_text};
use crate::timed::clock::clock_format;
use crate::timed::error::TimedResult;
use crate::timed::model::{FORMAT_VERSION, Program};

/// Longest prefix shared by every name, capped at the shortest name.
pub fn common_prefix(names: &[String]) -> String {
    let Some(shortest) = names.iter().min_by_key(|name| name.len()) else {
        return String::new();
    };
    if shortest.is_empty() {
        return String::new();
    }
    let mut best = "";
    for (index, ch) in shortest.char_indices() {
        let candidate = &shortest[..index + ch.len_utf8()];
        if names.iter().all(|name| name.starts_with(candidate)) {
            best = candidate;
        } else {
            break;
        }
    }
    best.to_string()
}

/// Longest suffix shared by every name, capped at the shortest name.
pub fn common_suffix(names: &[String]) -> String {
    let Some(shortest) = names.iter().min_by_key(|name| name.len()) else {
        return String::new();
    };
    if shortest.is_empty() {
        return String::new();
    }
    let mut best = "";
    for (index, _) in shortest.char_indices().rev() {
        let candidate = &shortest[index..];
        if names.iter().all(|name| name.ends_with(candidate)) {
            best = candidate;
        } else {
            break;
        }
    }
    best.to_string()
}

/// Renders the markup program as text-format source, events in their
/// declared order with start times accumulated from the program start.
pub fn markup_to_text_string(markup: &MarkupProgram) -> TimedResult<String> {
    let mut out = String::new();
    out.push_str(&format!("stw: {FORMAT_VERSION}\n"));
    out.push_str(&format!("name: {}\n", markup.name));

    let total = markup.total_events();
    let mut filenames: Vec<String> = Vec::new();
    for index in 0..total {
        match markup.get(index)? {
            MarkupEventRef::Static(s) => filenames.push(s.filename.clone()),
            MarkupEventRef::Transition(t) => {
                filenames.push(t.from_filename.clone());
                filenames.push(t.to_filename.clone());
            }
        }
    }
    let prefix = common_prefix(&filenames);
    let suffix = common_suffix(&filenames);
    out.push_str(&format!("format: {prefix}%s{suffix}\n"));

    let mut event_time: NaiveTime = markup.start_time()?;
    for index in 0..total {
        match markup.get(index)? {
            MarkupEventRef::Static(s) => {
                out.push_str(&format!(
                    "@{}: {}\n",
                    clock_format(event_time),
                    meat(&s.filename, &prefix, &suffix)
                ));
                event_time += s.duration();
            }
            MarkupEventRef::Transition(t) => {
                let up_to = event_time + t.duration();
                let from_name = meat(&t.from_filename, &prefix, &suffix);
                let to_name = meat(&t.to_filename, &prefix, &suffix);
                if t.kind.is_overlay() {
                    out.push_str(&format!(
                        "@{}-{}: {} .. {}\n",
                        clock_format(event_time),
                        clock_format(up_to),
                        from_name,
                        to_name
                    ));
                } else {
                    out.push_str(&format!(
                        "@{}-{}: {} .. {} | {}\n",
                        clock_format(event_time),
                        clock_format(up_to),
                        from_name,
                        to_name,
                        t.kind.as_str()
                    ));
                }
                event_time = up_to;
            }
        }
    }

    Ok(out.trim_end().to_string())
}

pub fn markup_to_program(markup: &MarkupProgram) -> TimedResult<Program> {
    let text = markup_to_text_string(markup)?;
    let mut program = parse_program_text(&markup.path.display().to_string(), &text)?;
    program.path = markup.path.clone();
    program.loop_wait = markup.loop_wait;
    Ok(program)
}

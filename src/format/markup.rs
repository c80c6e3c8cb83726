//! The tag-based timed wallpaper format. The tree parser collects statics
//! and transitions into two per-kind lists, which loses their interleaving;
//! a second pass over the raw source rebuilds it (see [`OrderMap`]).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveTime};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event as XmlEvent};

use crate::timed::clock::clock_format;
use crate::timed::error::{TimedError, TimedResult};
use crate::timed::model::{DEFAULT_LOOP_WAIT, TransitionKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkupStatic {
    pub seconds: f64,
    pub filename: String,
}

impl MarkupStatic {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupTransition {
    pub kind: TransitionKind,
    pub seconds: f64,
    pub from_filename: String,
    pub to_filename: String,
}

impl MarkupTransition {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds as i64)
    }
}

/// Maps static-index and transition-index to the overall declaration
/// position, rebuilt by scanning the raw source for literal tag openers.
/// Owned by its [`MarkupProgram`] and never outlives it.
#[derive(Debug, Clone, Default)]
struct OrderMap {
    static_order: Vec<usize>,
    transition_order: Vec<usize>,
}

#[derive(Debug, Clone)]
pub enum MarkupEventRef<'a> {
    Static(&'a MarkupStatic),
    Transition(&'a MarkupTransition),
}

#[derive(Debug, Clone)]
pub struct MarkupProgram {
    pub name: String,
    pub path: PathBuf,
    pub start_time: StartTime,
    pub statics: Vec<MarkupStatic>,
    pub transitions: Vec<MarkupTransition>,
    pub loop_wait: StdDuration,
    order: OrderMap,
}

pub fn load_markup(path: &Path) -> Result<MarkupProgram> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read program file {}", path.display()))?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut program = parse_markup_text(&path.display().to_string(), &content)?;
    program.name = name;
    program.path = path.to_path_buf();
    Ok(program)
}

pub fn parse_markup_text(path: &str, content: &str) -> TimedResult<MarkupProgram> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut start_time = StartTime::default();
    let mut statics = Vec::new();
    let mut transitions = Vec::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(ref e)) => match e.name().as_ref() {
                b"starttime" => start_time = parse_start_time(path, &mut reader)?,
                b"static" => statics.push(parse_static(path, &mut reader)?),
                b"transition" => {
                    transitions.push(parse_transition(path, &mut reader, e)?);
                }
                _ => {}
            },
            Ok(XmlEvent::Eof) => break,
            Err(err) => {
                return Err(TimedError::document(
                    path,
                    format!("markup error at byte {}: {err}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(MarkupProgram {
        name: String::new(),
        path: PathBuf::new(),
        start_time,
        statics,
        transitions,
        loop_wait: DEFAULT_LOOP_WAIT,
        order: find_order(content),
    })
}

fn read_text(path: &str, reader: &mut Reader<&[u8]>, element: &str) -> TimedResult<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Text(e)) => {
                text = e
                    .unescape()
                    .map_err(|err| {
                        TimedError::document(path, format!("bad text in <{element}>: {err}"))
                    })?
                    .trim()
                    .to_string();
            }
            Ok(XmlEvent::End(_)) => return Ok(text),
            Ok(XmlEvent::Eof) => {
                return Err(TimedError::document(
                    path,
                    format!("unexpected end of document inside <{element}>"),
                ));
            }
            Err(err) => {
                return Err(TimedError::document(
                    path,
                    format!("markup error at byte {}: {err}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
}

fn parse_number<T: std::str::FromStr>(path: &str, element: &str, text: &str) -> TimedResult<T> {
    text.parse().map_err(|_| {
        TimedError::document(path, format!("invalid <{element}> value: {text:?}"))
    })
}

fn parse_start_time(path: &str, reader: &mut Reader<&[u8]>) -> TimedResult<StartTime> {
    let mut start = StartTime::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(ref e)) => {
                let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let text = read_text(path, reader, &element)?;
                match element.as_str() {
                    "year" => start.year = parse_number(path, &element, &text)?,
                    "month" => start.month = parse_number(path, &element, &text)?,
                    "day" => start.day = parse_number(path, &element, &text)?,
                    "hour" => start.hour = parse_number(path, &element, &text)?,
                    "minute" => start.minute = parse_number(path, &element, &text)?,
                    "second" => start.second = parse_number(path, &element, &text)?,
                    _ => {}
                }
            }
            Ok(XmlEvent::End(ref e)) if e.name().as_ref() == b"starttime" => break,
            Ok(XmlEvent::Eof) => {
                return Err(TimedError::document(
                    path,
                    "unexpected end of document inside <starttime>",
                ));
            }
            Err(err) => {
                return Err(TimedError::document(
                    path,
                    format!("markup error at byte {}: {err}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(start)
}

fn parse_static(path: &str, reader: &mut Reader<&[u8]>) -> TimedResult<MarkupStatic> {
    let mut result = MarkupStatic::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(ref e)) => {
                let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let text = read_text(path, reader, &element)?;
                match element.as_str() {
                    "duration" => result.seconds = parse_number(path, &element, &text)?,
                    "file" => result.filename = text,
                    _ => {}
                }
            }
            Ok(XmlEvent::End(ref e)) if e.name().as_ref() == b"static" => break,
            Ok(XmlEvent::Eof) => {
                return Err(TimedError::document(
                    path,
                    "unexpected end of document inside <static>",
                ));
            }
            Err(err) => {
                return Err(TimedError::document(
                    path,
                    format!("markup error at byte {}: {err}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(result)
}

fn parse_transition(
    path: &str,
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
) -> TimedResult<MarkupTransition> {
    let mut kind = TransitionKind::Overlay;
    for attr in start.attributes() {
        let attr =
            attr.map_err(|err| TimedError::document(path, format!("bad attribute: {err}")))?;
        if attr.key.as_ref() == b"type" {
            kind = TransitionKind::parse(&String::from_utf8_lossy(&attr.value));
        }
    }

    let mut seconds = 0.0;
    let mut from_filename = String::new();
    let mut to_filename = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(ref e)) => {
                let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let text = read_text(path, reader, &element)?;
                match element.as_str() {
                    "duration" => seconds = parse_number(path, &element, &text)?,
                    "from" => from_filename = text,
                    "to" => to_filename = text,
                    _ => {}
                }
            }
            Ok(XmlEvent::End(ref e)) if e.name().as_ref() == b"transition" => break,
            Ok(XmlEvent::Eof) => {
                return Err(TimedError::document(
                    path,
                    "unexpected end of document inside <transition>",
                ));
            }
            Err(err) => {
                return Err(TimedError::document(
                    path,
                    format!("markup error at byte {}: {err}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(MarkupTransition {
        kind,
        seconds,
        from_filename,
        to_filename,
    })
}

/// Scans the raw source left to right for literal `<static` and
/// `<transition` openers, recording which overall position each per-kind
/// index landed on. The tree parser's own ordering is not relied on.
fn find_order(content: &str) -> OrderMap {
    const STATIC_TAG: &str = "<static";
    const TRANSITION_TAG: &str = "<transition";

    let mut order = OrderMap::default();
    let mut offset = 0;
    let mut position = 0;
    loop {
        let static_pos = content[offset..].find(STATIC_TAG);
        let transition_pos = content[offset..].find(TRANSITION_TAG);
        match (static_pos, transition_pos) {
            (Some(s), Some(t)) if s < t => {
                order.static_order.push(position);
                offset += s + STATIC_TAG.len();
            }
            (Some(s), None) => {
                order.static_order.push(position);
                offset += s + STATIC_TAG.len();
            }
            (_, Some(t)) => {
                order.transition_order.push(position);
                offset += t + TRANSITION_TAG.len();
            }
            (None, None) => break,
        }
        position += 1;
    }
    order
}

impl MarkupProgram {
    pub fn total_events(&self) -> usize {
        self.statics.len() + self.transitions.len()
    }

    /// Clock time the program starts at; the date part is irrelevant on the
    /// repeating 24h circle.
    pub fn start_time(&self) -> TimedResult<NaiveTime> {
        let st = &self.start_time;
        NaiveTime::from_hms_opt(st.hour, st.minute, st.second).ok_or_else(|| {
            TimedError::document(
                self.path.display().to_string(),
                format!("invalid start time {:02}:{:02}:{:02}", st.hour, st.minute, st.second),
            )
        })
    }

    /// Resolves an overall declaration position through the order map.
    pub fn get(&self, index: usize) -> TimedResult<MarkupEventRef<'_>> {
        let missing = TimedError::Index {
            index,
            total: self.total_events(),
        };
        if let Some(si) = self.order.static_order.iter().position(|&o| o == index) {
            return self.statics.get(si).map(MarkupEventRef::Static).ok_or(missing);
        }
        if let Some(ti) = self.order.transition_order.iter().position(|&o| o == index) {
            return self
                .transitions
                .get(ti)
                .map(MarkupEventRef::Transition)
                .ok_or(missing);
        }
        Err(missing)
    }

    pub fn images(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for s in &self.statics {
            if !out.contains(&s.filename.as_str()) {
                out.push(&s.filename);
            }
        }
        for t in &self.transitions {
            for name in [t.from_filename.as_str(), t.to_filename.as_str()] {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("path                  = {}\n", self.path.display()));
        if let Ok(start) = self.start_time() {
            let st = &self.start_time;
            if st.year != 0 {
                out.push_str(&format!(
                    "start time            = {:04}-{:02}-{:02} {}\n",
                    st.year,
                    st.month,
                    st.day,
                    clock_format(start)
                ));
            } else {
                out.push_str(&format!("start time            = {}\n", clock_format(start)));
            }
        }
        out.push_str(&format!("number of static tags = {}\n", self.statics.len()));
        out.push_str(&format!("number of transitions = {}\n", self.transitions.len()));
        out.push_str("uses these images:\n");
        for filename in self.images() {
            out.push_str(&format!("\t{filename}\n"));
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERLEAVED: &str = r#"<background>
  <starttime>
    <year>2009</year>
    <month>8</month>
    <day>4</day>
    <hour>6</hour>
    <minute>0</minute>
    <second>0</second>
  </starttime>
  <static>
    <duration>3600.0</duration>
    <file>/img/dawn.png</file>
  </static>
  <transition type="overlay">
    <duration>1800.0</duration>
    <from>/img/dawn.png</from>
    <to>/img/day.png</to>
  </transition>
  <static>
    <duration>7200.0</duration>
    <file>/img/day.png</file>
  </static>
</background>
"#;

    #[test]
    fn parses_start_time_and_both_tag_kinds() {
        let program = parse_markup_text("mem", INTERLEAVED).expect("valid markup");
        assert_eq!(program.start_time.year, 2009);
        assert_eq!(program.start_time.hour, 6);
        assert_eq!(program.statics.len(), 2);
        assert_eq!(program.transitions.len(), 1);
        assert_eq!(program.statics[0].filename, "/img/dawn.png");
        assert_eq!(program.transitions[0].to_filename, "/img/day.png");
        assert_eq!(program.transitions[0].kind, TransitionKind::Overlay);
        assert_eq!(program.statics[0].duration(), Duration::hours(1));
    }

    #[test]
    fn order_map_restores_the_declared_interleaving() {
        let program = parse_markup_text("mem", INTERLEAVED).expect("valid markup");
        assert_eq!(program.total_events(), 3);
        assert!(matches!(
            program.get(0).expect("first"),
            MarkupEventRef::Static(s) if s.filename == "/img/dawn.png"
        ));
        assert!(matches!(
            program.get(1).expect("second"),
            MarkupEventRef::Transition(_)
        ));
        assert!(matches!(
            program.get(2).expect("third"),
            MarkupEventRef::Static(s) if s.filename == "/img/day.png"
        ));
    }

    #[test]
    fn out_of_range_index_is_an_index_error() {
        let program = parse_markup_text("mem", INTERLEAVED).expect("valid markup");
        assert!(matches!(
            program.get(3),
            Err(TimedError::Index { index: 3, total: 3 })
        ));
    }

    #[test]
    fn zero_event_documents_are_valid() {
        let content = "<background><starttime><hour>7</hour><minute>30</minute><second>0</second></starttime></background>";
        let program = parse_markup_text("mem", content).expect("valid markup");
        assert_eq!(program.total_events(), 0);
        assert_eq!(
            program.start_time().expect("start time"),
            NaiveTime::from_hms_opt(7, 30, 0).expect("valid time")
        );
    }

    #[test]
    fn type_attribute_defaults_to_overlay_and_is_kept_otherwise() {
        let content = r#"<background>
  <transition><duration>10</duration><from>a</from><to>b</to></transition>
  <transition type="zoom"><duration>10</duration><from>b</from><to>c</to></transition>
</background>"#;
        let program = parse_markup_text("mem", content).expect("valid markup");
        assert_eq!(program.transitions[0].kind, TransitionKind::Overlay);
        assert_eq!(
            program.transitions[1].kind,
            TransitionKind::Named("zoom".to_string())
        );
    }

    #[test]
    fn truncated_documents_are_format_errors() {
        let content = "<background><static><duration>10</duration>";
        let err = parse_markup_text("mem", content).expect_err("truncated should fail");
        assert!(matches!(err, TimedError::Format { .. }));
    }

    #[test]
    fn trailing_statics_keep_their_positions() {
        let content = r#"<background>
  <transition><duration>10</duration><from>a</from><to>b</to></transition>
  <static><duration>10</duration><file>b</file></static>
  <static><duration>10</duration><file>c</file></static>
</background>"#;
        let program = parse_markup_text("mem", content).expect("valid markup");
        assert!(matches!(program.get(0).expect("get"), MarkupEventRef::Transition(_)));
        assert!(matches!(
            program.get(1).expect("get"),
            MarkupEventRef::Static(s) if s.filename == "b"
        ));
        assert!(matches!(
            program.get(2).expect("get"),
            MarkupEventRef::Static(s) if s.filename == "c"
        ));
    }

    #[test]
    fn summary_includes_the_start_date_when_present() {
        let program = parse_markup_text("mem", INTERLEAVED).expect("valid markup");
        let summary = program.summary();
        assert!(summary.contains("2009-08-04 06:00"));
        assert!(summary.contains("number of static tags = 2"));
        assert!(summary.contains("/img/day.png"));
    }

    #[test]
    fn fractional_durations_truncate_to_whole_seconds() {
        let content = "<background><static><duration>3600.9</duration><file>x</file></static></background>";
        let program = parse_markup_text("mem", content).expect("valid markup");
        assert_eq!(program.statics[0].duration(), Duration::seconds(3600));
    }
}

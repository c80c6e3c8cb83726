use std::path::PathBuf;

use thiserror::Error;

pub type TimedResult<T> = Result<T, TimedError>;

#[derive(Debug, Error)]
pub enum TimedError {
    #[error("{}", format_parse_error(.path, .line, .content, .reason))]
    Format {
        path: String,
        line: Option<usize>,
        content: Option<String>,
        reason: String,
    },

    #[error("could not find an element with index {index} (have {total} events)")]
    Index { index: usize, total: usize },

    #[error("file does not exist: {0}")]
    MissingFile(PathBuf),

    #[error("could not set wallpaper: {0}")]
    Sink(String),

    #[error("the program has no events")]
    NoEvents,
}

impl TimedError {
    pub fn document(path: impl Into<String>, reason: impl Into<String>) -> Self {
        TimedError::Format {
            path: path.into(),
            line: None,
            content: None,
            reason: reason.into(),
        }
    }

    pub fn line(
        path: impl Into<String>,
        line: usize,
        content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TimedError::Format {
            path: path.into(),
            line: Some(line),
            content: Some(content.into()),
            reason: reason.into(),
        }
    }
}

fn format_parse_error(
    path: &str,
    line: &Option<usize>,
    content: &Option<String>,
    reason: &str,
) -> String {
    match (line, content) {
        (Some(line), Some(content)) => {
            format!("could not parse {path} ({reason}), line {line}: {content:?}")
        }
        (Some(line), None) => format!("could not parse {path} ({reason}), line {line}"),
        _ => format!("could not parse {path}: {reason}"),
    }
}

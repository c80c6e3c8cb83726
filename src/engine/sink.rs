use std::path::Path;
use std::process::Command;

use crate::timed::error::{TimedError, TimedResult};

/// The one capability the desktop side has to provide: apply an image file
/// as the current wallpaper. Must be safe to call repeatedly with the same
/// path; failures are logged by the callers, never fatal to the schedule.
pub trait WallpaperSink: Send + Sync {
    fn apply(&self, path: &Path) -> TimedResult<()>;
}

/// Applies wallpapers by running a user-supplied command. A `%f` in the
/// template is replaced with the image path, otherwise the path is appended.
pub struct CommandSink {
    template: String,
}

impl CommandSink {
    pub fn new(template: impl Into<String>) -> Self {
        CommandSink {
            template: template.into(),
        }
    }

    fn command_line(&self, path: &Path) -> String {
        let path = path.display().to_string();
        if self.template.contains("%f") {
            self.template.replace("%f", &path)
        } else {
            format!("{} {}", self.template, path)
        }
    }
}

impl WallpaperSink for CommandSink {
    fn apply(&self, path: &Path) -> TimedResult<()> {
        let command_line = self.command_line(path);
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .status()
            .map_err(|err| TimedError::Sink(format!("could not run {command_line:?}: {err}")))?;
        if !status.success() {
            return Err(TimedError::Sink(format!(
                "{command_line:?} exited with {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn placeholder_is_substituted() {
        let sink = CommandSink::new("feh --bg-fill %f --no-fehbg");
        assert_eq!(
            sink.command_line(Path::new("/tmp/a.png")),
            "feh --bg-fill /tmp/a.png --no-fehbg"
        );
    }

    #[test]
    fn path_is_appended_without_placeholder() {
        let sink = CommandSink::new("feh --bg-fill");
        assert_eq!(
            sink.command_line(Path::new("/tmp/a.png")),
            "feh --bg-fill /tmp/a.png"
        );
    }

    #[test]
    fn failing_commands_become_sink_errors() {
        let sink = CommandSink::new("false");
        let err = sink
            .apply(&PathBuf::from("/tmp/a.png"))
            .expect_err("false should fail");
        assert!(matches!(err, TimedError::Sink(_)));
    }

    #[test]
    fn succeeding_commands_are_fine_repeatedly() {
        let sink = CommandSink::new("true");
        sink.apply(Path::new("/tmp/a.png")).expect("first apply");
        sink.apply(Path::new("/tmp/a.png")).expect("second apply");
    }
}

mod engine;
mod format;
mod schedule;
mod timed;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use crate::engine::Engine;
use crate::engine::sink::CommandSink;
use crate::format::{convert, markup, text};
use crate::timed::clock::duration_format;
use crate::timed::model::Program;

#[derive(Parser, Debug)]
#[command(
    name = "timedwall",
    version,
    about = "Daily-recurring timed wallpapers with crossfading transitions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the event loop for a timed wallpaper program
    Run {
        program: PathBuf,

        /// Command that applies an image as the wallpaper; %f is replaced
        /// with the image path, otherwise the path is appended
        #[arg(long = "set-command")]
        set_command: String,

        /// Seconds between event loop iterations
        #[arg(long, default_value_t = 5)]
        loop_wait: u64,

        /// Where the blended crossfade frame is written
        #[arg(long)]
        temp_image: Option<PathBuf>,

        #[arg(long, short)]
        verbose: bool,
    },

    /// Convert a markup program to the text format
    Convert {
        input: PathBuf,

        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Rewrite a program in the text format's canonical form
    Normalize {
        program: PathBuf,

        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Describe a timed wallpaper program
    Info {
        program: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn is_markup(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn load_program(path: &Path) -> Result<Program> {
    if is_markup(path) {
        let markup_program = markup::load_markup(path)?;
        let program = convert::markup_to_program(&markup_program)
            .with_context(|| format!("failed to convert {}", path.display()))?;
        Ok(program)
    } else {
        text::load_program(path)
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            program,
            set_command,
            loop_wait,
            temp_image,
            verbose,
        } => {
            if loop_wait == 0 {
                bail!("--loop-wait must be greater than zero");
            }
            let mut loaded = load_program(&program)
                .with_context(|| format!("failed to load {}", program.display()))?;
            loaded.loop_wait = StdDuration::from_secs(loop_wait);

            let sink = Arc::new(CommandSink::new(set_command));
            let mut engine = Engine::new(loaded, sink).verbose(verbose);
            if let Some(path) = temp_image {
                engine = engine.temp_image(path);
            }
            engine.run()
        }
        Command::Convert { input, output } => {
            if !is_markup(&input) {
                bail!("{} is not a markup program", input.display());
            }
            let markup_program = markup::load_markup(&input)
                .with_context(|| format!("failed to load {}", input.display()))?;
            let converted = convert::markup_to_text_string(&markup_program)
                .with_context(|| format!("failed to convert {}", input.display()))?;
            match output {
                Some(path) => fs::write(&path, format!("{converted}\n"))
                    .with_context(|| format!("unable to write {}", path.display()))?,
                None => println!("{converted}"),
            }
            Ok(())
        }
        Command::Normalize { program, output } => {
            let loaded = load_program(&program)
                .with_context(|| format!("failed to load {}", program.display()))?;
            let canonical = text::serialize_program(&loaded);
            match output {
                Some(path) => fs::write(&path, format!("{canonical}\n"))
                    .with_context(|| format!("unable to write {}", path.display()))?,
                None => println!("{canonical}"),
            }
            Ok(())
        }
        Command::Info { program, json } => {
            if !json && is_markup(&program) {
                let markup_program = markup::load_markup(&program)
                    .with_context(|| format!("failed to load {}", program.display()))?;
                println!("{}", markup_program.summary());
                return Ok(());
            }
            let loaded = load_program(&program)
                .with_context(|| format!("failed to load {}", program.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&loaded)?);
            } else {
                print_summary(&loaded);
            }
            Ok(())
        }
    }
}

fn print_summary(program: &Program) {
    println!("path                  = {}", program.path.display());
    println!("name                  = {}", program.name);
    println!("format version        = {}", program.version);
    if !program.format.is_empty() {
        println!("filename template     = {}", program.format);
    }
    println!("number of static tags = {}", program.statics().count());
    println!("number of transitions = {}", program.transitions().count());
    println!(
        "loop wait             = {}",
        duration_format(
            chrono::Duration::from_std(program.loop_wait).unwrap_or_else(|_| chrono::Duration::zero())
        )
    );
    println!("uses these images:");
    for filename in program.images() {
        println!("\t{filename}");
    }
}

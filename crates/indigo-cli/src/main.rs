//! indigo CLI - translate between the indented and canonical surface forms
//!
//! `indigo compile` translates indented-form sources to canonical form,
//! `indigo parse` checks syntax only, and `indigo build` writes translated
//! files next to their sources (or under `--dest`). Directory arguments are
//! walked recursively; only files with the indented-form suffix are
//! processed.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use walkdir::WalkDir;

use indigo_core::ast::sort_imports;
use indigo_core::parser::{self, Mode};
use indigo_core::printer::{Config, Form, Mode as PrintMode};
use indigo_core::token::FileSet;

/// Suffix of indented-form source files
const SOURCE_SUFFIX: &str = "ing";
/// Suffix of translated canonical-form files
const TARGET_SUFFIX: &str = "go";

#[derive(Parser)]
#[command(name = "indigo")]
#[command(version = indigo_core::VERSION)]
#[command(about = "Translator between the indigo surface forms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Options {
    /// Preserve comments
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    comments: bool,

    /// Output root directory
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Indent with tabs
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    tabs: bool,

    /// Tab rendering width
    #[arg(long, default_value_t = 8)]
    tabwidth: usize,

    /// Print a parser trace to stderr
    #[arg(long)]
    trace: bool,

    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate sources to canonical form on standard output
    Compile(Options),
    /// Parse sources and report errors without producing output
    Parse(Options),
    /// Translate sources and write the canonical-form files
    Build(Options),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Compile(opts) => run(&opts, Action::Compile),
        Commands::Parse(opts) => run(&opts, Action::Parse),
        Commands::Build(opts) => run(&opts, Action::Build),
    };
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(err) => {
            eprintln!("indigo: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    Compile,
    Parse,
    Build,
}

// A source file together with the directory it was discovered under, so
// output paths can be rerooted.
struct Source {
    root: PathBuf,
    path: PathBuf,
}

fn run(opts: &Options, action: Action) -> Result<bool> {
    let sources = collect_sources(&opts.paths)?;
    if sources.is_empty() {
        anyhow::bail!("no .{SOURCE_SUFFIX} files found");
    }

    let mut mode = Mode::DECLARATION_ERRORS;
    if opts.comments {
        mode = mode | Mode::PARSE_COMMENTS;
    }
    if opts.trace {
        mode = mode | Mode::TRACE;
    }

    let mut print_mode = PrintMode::NONE;
    if opts.tabs {
        print_mode = print_mode | PrintMode::TAB_INDENT;
    } else {
        print_mode = print_mode | PrintMode::USE_SPACES;
    }
    let config = Config {
        mode: print_mode,
        tabwidth: opts.tabwidth,
        form: Form::Canonical,
    };

    let fset = FileSet::new();
    let mut ok = true;
    let stdout = std::io::stdout();

    for source in &sources {
        let display = source.path.display().to_string();
        let src = fs::read_to_string(&source.path)
            .with_context(|| format!("reading {display}"))?;

        let (file, errors) = parser::parse_file(&fset, &display, &src, mode);
        if !errors.is_empty() {
            ok = false;
            for err in &errors {
                eprintln!("{err}");
            }
        }
        let Some(mut file) = file else { continue };
        if action == Action::Parse {
            continue;
        }

        sort_imports(&fset, &mut file);

        let mut out = Vec::new();
        config
            .fprint(&mut out, &fset, &file)
            .with_context(|| format!("printing {display}"))?;

        match (action, &opts.dest) {
            (Action::Compile, None) => {
                stdout
                    .lock()
                    .write_all(&out)
                    .context("writing to stdout")?;
            }
            _ => {
                let target = output_path(source, opts.dest.as_deref());
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                fs::write(&target, &out)
                    .with_context(|| format!("writing {}", target.display()))?;
            }
        }
    }

    Ok(ok)
}

fn collect_sources(paths: &[PathBuf]) -> Result<Vec<Source>> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walking {}", path.display()))?;
                if entry.file_type().is_file() && has_source_suffix(entry.path()) {
                    sources.push(Source {
                        root: path.clone(),
                        path: entry.path().to_path_buf(),
                    });
                }
            }
        } else if has_source_suffix(path) {
            let root = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
            sources.push(Source {
                root,
                path: path.clone(),
            });
        } else {
            anyhow::bail!("{}: not a .{SOURCE_SUFFIX} file", path.display());
        }
    }
    Ok(sources)
}

fn has_source_suffix(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_SUFFIX)
}

// Translation replaces the suffix; with a destination root, the path
// relative to its discovery root moves under the destination.
fn output_path(source: &Source, dest: Option<&Path>) -> PathBuf {
    let translated = source.path.with_extension(TARGET_SUFFIX);
    match dest {
        None => translated,
        Some(dest) => {
            let relative = translated
                .strip_prefix(&source.root)
                .unwrap_or(&translated);
            dest.join(relative)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_filter() {
        assert!(has_source_suffix(Path::new("a/b/c.ing")));
        assert!(!has_source_suffix(Path::new("a/b/c.go")));
        assert!(!has_source_suffix(Path::new("c.ingx")));
    }

    #[test]
    fn output_path_replaces_suffix() {
        let s = Source {
            root: PathBuf::from("src"),
            path: PathBuf::from("src/pkg/main.ing"),
        };
        assert_eq!(output_path(&s, None), PathBuf::from("src/pkg/main.go"));
        assert_eq!(
            output_path(&s, Some(Path::new("out"))),
            PathBuf::from("out/pkg/main.go")
        );
    }
}

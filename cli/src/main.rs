use std::env;
use std::sync::{Arc, Mutex};

use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use indexing::{format, reindex, search, Config, Engine};

/// Local full-text code index and search.
#[derive(Parser, Debug)]
#[command(name = "finja", version, about)]
struct Cli {
    /// Reindex the current project from scratch.
    #[arg(short = 'i', long)]
    index: bool,

    /// Reindex before searching.
    #[arg(short = 'u', long)]
    update: bool,

    /// Match any position within a file instead of requiring the same line.
    #[arg(short = 'f', long = "file-mode")]
    file_mode: bool,

    /// Lines of context per match.
    #[arg(short = 'c', long, default_value_t = 1)]
    context: u32,

    /// Machine-readable output: NUL-separated, no duplicates section.
    #[arg(short = 'r', long)]
    raw: bool,

    /// Limit the number of files processed this invocation (0 = unlimited).
    #[arg(short = 'b', long, default_value_t = 0)]
    batch: usize,

    /// Exclude paths containing this segment. May be repeated.
    #[arg(short = 'p', long = "pignore")]
    pignore: Vec<String>,

    /// Ask the store to reclaim space.
    #[arg(short = 'v', long)]
    vacuum: bool,

    /// Shrink the dictionary cache bound by 100x.
    #[arg(short = 'l', long = "less-memory")]
    less_memory: bool,

    /// Enable international interpunct separators. Only meaningful at
    /// database creation.
    #[arg(long)]
    interpunct: bool,

    /// Query tokens. A conjunctive search matches all of them.
    query: Vec<String>,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if !cli.index && !cli.update && cli.query.is_empty() {
        eprintln!("nothing to do: pass --index/-i, --update/-u, or a query");
        std::process::exit(1);
    }

    let cwd = env::current_dir().wrap_err("could not read current directory")?;
    let config = Config {
        batch: (cli.batch > 0).then_some(cli.batch),
        less_memory: cli.less_memory,
        interpunct: cli.interpunct,
    };

    let mut engine = if cli.index {
        Engine::create(&cwd, config)?
    } else {
        Engine::open(&cwd, config)?
    };

    if cli.index || cli.update {
        let spinner = spinner();
        let progress = Arc::new(Mutex::new(spinner.clone()));
        engine.set_progress_handler(move || {
            progress.lock().unwrap().tick();
            false
        });

        let outcome = reindex::run(&mut engine, &mut |path| {
            spinner.set_message(path.display().to_string());
        })?;
        spinner.finish_and_clear();
        info!(
            files_visited = outcome.files_visited,
            passes_run = outcome.passes_run,
            "reindex complete"
        );
    }

    if cli.vacuum {
        engine.vacuum()?;
    }

    if !cli.query.is_empty() {
        let mode = if cli.file_mode {
            search::Mode::File
        } else {
            search::Mode::Line
        };
        let hits = search::run(
            &engine.conn,
            &mut engine.dicts.tokens,
            &mut engine.dicts.paths,
            &cli.query,
            &cli.pignore,
            mode,
        )?;
        print_hits(&engine, hits, mode, cli.context, cli.raw)?;
    }

    Ok(())
}

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar
}

fn print_hits(
    engine: &Engine,
    hits: Vec<search::Hit>,
    mode: search::Mode,
    context: u32,
    raw: bool,
) -> eyre::Result<()> {
    let mut paths = indexing::PathDictionary::new();
    let mut decompressed: Vec<(String, search::Hit)> = hits
        .into_iter()
        .map(|hit| {
            let path = paths.decompress(&engine.conn, &hit.path)?;
            Ok::<_, indexing::Error>((path, hit))
        })
        .collect::<Result<_, _>>()?;

    match mode {
        search::Mode::File => {
            format::sort_file_hits(&mut decompressed);
            for (path, hit) in &decompressed {
                println!("{path}");
                if !raw {
                    let dups = format::duplicates_of(&engine.conn, hit.file_id)?;
                    if !dups.is_empty() {
                        println!("duplicates:");
                        for dup in dups {
                            let dup_path = paths.decompress(&engine.conn, &dup)?;
                            println!("  {dup_path}");
                        }
                    }
                }
            }
        }
        search::Mode::Line => {
            format::sort_line_hits(&mut decompressed);
            let mut last_dir: Option<String> = None;
            for (path, hit) in &decompressed {
                let line = hit.line.expect("line-mode hits always carry a line");
                if !raw {
                    let dir = path.rsplit_once('/').map(|(d, _)| d.to_owned());
                    if dir != last_dir {
                        if let Some(d) = &dir {
                            println!("{d}:");
                        }
                        last_dir = dir;
                    }
                }

                if context <= 1 || raw {
                    let block = format::read_context(&engine.root, path, line, 1);
                    let text = block.lines.first().map(String::as_str).unwrap_or_default();
                    println!("{}", format::render_single_line(path, line, text, raw));
                } else {
                    let block = format::read_context(&engine.root, path, line, context);
                    for text in &block.lines {
                        println!("{path}:{text}");
                    }
                }
            }
        }
    }

    Ok(())
}

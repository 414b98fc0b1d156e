//! Explore pprof profiles from the command line.
//!
//! # Usage
//!
//! ```bash
//! pproftui top cpu.pb.gz --sort cum
//! pproftui show cpu.pb.gz main.work
//! pproftui flame cpu.pb.gz --focus main.serve
//! pproftui diff before.pb.gz after.pb.gz --json
//! pproftui live http://localhost:6060/debug/pprof/heap --refresh 10
//! ```

use clap::{Parser, Subcommand};
use pproftui::config::{Config, DEFAULT_CONFIG_FILE};
use pproftui::diff::diff_bytes;
use pproftui::explain::Explainer;
use pproftui::live::{HttpSource, Poller, ProfileSource, fetch_url, spawn_ticker};
use pproftui::palette::Palette;
use pproftui::session::{LiveOutcome, SortOrder};
use pproftui::{Error, ProjectFilter, Session, graph, render, report};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pproftui")]
#[command(about = "Explore pprof CPU and heap profiles: call graphs, diffs and flame graphs")]
#[command(version)]
struct Cli {
    /// Module path identifying your own code, e.g. github.com/acme/app
    #[arg(long, global = true)]
    module_path: Option<String>,

    /// Config file (defaults to ./pproftui.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable ANSI colours
    #[arg(long, global = true)]
    no_color: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the views (sample types) of a profile
    Views {
        /// Profile file or http(s) URL
        profile: String,
    },

    /// Show the most expensive functions
    Top {
        /// Profile file or http(s) URL
        profile: String,

        /// View index, kind or name
        #[arg(long)]
        view: Option<String>,

        #[arg(short, long, value_enum, default_value_t = SortOrder::Flat)]
        sort: SortOrder,

        /// Number of rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Only list functions from the module path
        #[arg(short, long)]
        project_only: bool,

        /// Write NDJSON records instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Describe one function with its callers, callees and source
    Show {
        /// Profile file or http(s) URL
        profile: String,

        /// Function name as listed by `top`
        function: String,

        #[arg(long)]
        view: Option<String>,

        /// Source lines shown either side of the function start
        #[arg(long, default_value = "5")]
        context: usize,
    },

    /// Draw a flame graph
    Flame {
        /// Profile file or http(s) URL
        profile: String,

        #[arg(long)]
        view: Option<String>,

        /// Columns (defaults to the configured flame width)
        #[arg(short, long)]
        width: Option<usize>,

        /// Zoom into the first frame with this name
        #[arg(long)]
        focus: Option<String>,

        /// Only include stacks that pass through the module path
        #[arg(short, long)]
        project_only: bool,
    },

    /// Compare two profiles
    Diff {
        /// Baseline profile
        before: String,

        /// Profile to compare against the baseline
        after: String,

        #[arg(long)]
        view: Option<String>,

        #[arg(short, long, value_enum, default_value_t = SortOrder::Flat)]
        sort: SortOrder,

        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[arg(short, long)]
        project_only: bool,

        #[arg(long)]
        json: bool,
    },

    /// Poll a pprof endpoint and print each snapshot
    Live {
        /// Endpoint such as http://localhost:6060/debug/pprof/heap
        url: String,

        #[arg(long)]
        view: Option<String>,

        /// Seconds between polls
        #[arg(long)]
        refresh: Option<u64>,

        /// Stop after this many snapshots
        #[arg(long)]
        polls: Option<usize>,

        #[arg(short, long, value_enum, default_value_t = SortOrder::Flat)]
        sort: SortOrder,

        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Explain a profile type or concept
    Explain {
        /// Topic such as cpu, alloc_space or flat_vs_cum; lists topics when omitted
        topic: Option<String>,
    },
}

/// Settings shared by every subcommand after merging config and flags.
struct Context {
    config: Config,
    filter: Option<ProjectFilter>,
    palette: Palette,
}

impl Context {
    fn new(cli: &Cli) -> Self {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Config::load_optional(&path);
        if let Some(module_path) = &cli.module_path {
            config.module_path = module_path.clone();
        }
        config.no_color |= cli.no_color;

        Self {
            filter: ProjectFilter::new(&config.module_path),
            palette: Palette::new(config.no_color),
            config,
        }
    }

    fn read_input(&self, input: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        if input.starts_with("http://") || input.starts_with("https://") {
            Ok(fetch_url(input, self.config.fetch_timeout())?)
        } else {
            Ok(std::fs::read(input)?)
        }
    }

    fn open(&self, input: &str) -> Result<Session, Box<dyn std::error::Error>> {
        let bytes = self.read_input(input)?;
        let data = graph::load_bytes(&bytes, self.filter.as_ref())?;
        info!(input, views = data.views.len(), "loaded profile");
        Ok(Session::new(data, format!("File: {}", input), self.filter.clone()))
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn configure(
    session: &mut Session,
    view: Option<&str>,
    sort: SortOrder,
    project_only: bool,
) -> Result<(), Error> {
    if let Some(view) = view {
        session.select_view(view)?;
    }
    session.set_sort(sort);
    if project_only && !session.toggle_project_only() {
        eprintln!("Warning: --project-only needs --module-path; showing all functions");
    }
    Ok(())
}

/// Header line plus the top `limit` rows of the active view.
fn print_table(session: &Session, limit: usize, palette: &Palette) -> Result<(), Error> {
    let view = session.view().ok_or(Error::NoValidSampleData)?;
    let nodes = session.sorted_nodes();
    let nodes = &nodes[..nodes.len().min(limit)];

    let mut out = io::stdout().lock();
    writeln!(out, "{}", session.diagnostic_header(palette))?;
    writeln!(
        out,
        "{}  sorted by {}",
        palette.bold(&view.name),
        session.sort().label(session.is_diff())
    )?;
    if session.is_diff() {
        write!(out, "{}", render::render_diff_top(view, nodes, palette))?;
    } else {
        write!(out, "{}", render::render_top(view, nodes, palette))?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new(&cli);

    match cli.command {
        Command::Views { profile } => {
            let session = ctx.open(&profile)?;
            let data = session.data().ok_or(Error::NoValidSampleData)?;
            print!("{}", render::render_views(data));
        }

        Command::Top {
            profile,
            view,
            sort,
            limit,
            project_only,
            json,
        } => {
            let mut session = ctx.open(&profile)?;
            configure(&mut session, view.as_deref(), sort, project_only)?;
            let limit = limit.unwrap_or(ctx.config.limit);

            if json {
                let view = session.view().ok_or(Error::NoValidSampleData)?;
                let nodes = session.sorted_nodes();
                let nodes = &nodes[..nodes.len().min(limit)];
                report::write_top_ndjson(io::stdout().lock(), &profile, view, nodes)?;
            } else {
                print_table(&session, limit, &ctx.palette)?;
            }
        }

        Command::Show {
            profile,
            function,
            view,
            context,
        } => {
            let mut session = ctx.open(&profile)?;
            configure(&mut session, view.as_deref(), SortOrder::Flat, false)?;
            session.select_function(&function)?;

            let view = session.view().ok_or(Error::NoValidSampleData)?;
            let node = session
                .selected_node()
                .ok_or_else(|| Error::UnknownFunction(function.clone()))?;
            print!("{}", render::render_function(view, node, &ctx.palette, context));
            println!("\n{}", ctx.palette.dim(Explainer::new().for_view(&view.name).title));
        }

        Command::Flame {
            profile,
            view,
            width,
            focus,
            project_only,
        } => {
            let mut session = ctx.open(&profile)?;
            configure(&mut session, view.as_deref(), SortOrder::Flat, project_only)?;
            let width = width.unwrap_or(ctx.config.flame_width);

            let state = session.flame_state().ok_or(Error::NoValidSampleData)?;
            if let Some(name) = &focus {
                let node = state
                    .tree()
                    .find_by_name(name)
                    .ok_or_else(|| Error::UnknownFunction(name.clone()))?;
                state.zoom_in(node);
            }
            print!("{}", render::render_flame(state, width, &ctx.palette));
        }

        Command::Diff {
            before,
            after,
            view,
            sort,
            limit,
            project_only,
            json,
        } => {
            let before_bytes = ctx.read_input(&before)?;
            let after_bytes = ctx.read_input(&after)?;
            let data = diff_bytes(&before_bytes, &after_bytes, ctx.filter.as_ref())?;
            info!(views = data.views.len(), "diffed profiles");

            let source = format!("Diff: {} -> {}", before, after);
            let mut session = Session::new(data, source, ctx.filter.clone());
            configure(&mut session, view.as_deref(), sort, project_only)?;
            let limit = limit.unwrap_or(ctx.config.limit);

            if json {
                let view = session.view().ok_or(Error::NoValidSampleData)?;
                let nodes = session.sorted_nodes();
                let nodes = &nodes[..nodes.len().min(limit)];
                report::write_diff_ndjson(io::stdout().lock(), &before, &after, view, nodes)?;
            } else {
                print_table(&session, limit, &ctx.palette)?;
            }
        }

        Command::Live {
            url,
            view,
            refresh,
            polls,
            sort,
            limit,
        } => {
            let interval = refresh
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| ctx.config.refresh_interval());
            let limit = limit.unwrap_or(ctx.config.limit);
            let source = HttpSource::new(url, ctx.config.fetch_timeout());
            let mut session = Session::live(source.describe(), ctx.filter.clone());
            session.set_sort(sort);

            let (tx, rx) = mpsc::channel();
            let mut poller = Poller::new(source, ctx.filter.clone(), tx.clone());
            poller.dispatch();
            let _ticker = spawn_ticker(interval, tx);

            let mut snapshots = 0;
            while let Ok(event) = rx.recv() {
                match session.apply(event) {
                    LiveOutcome::Fetch => {
                        poller.dispatch();
                    }
                    LiveOutcome::Applied => {
                        if snapshots == 0 {
                            if let Some(view) = &view {
                                session.select_view(view)?;
                            }
                        }
                        snapshots += 1;
                        print_table(&session, limit, &ctx.palette)?;
                        println!();
                        if polls.is_some_and(|n| snapshots >= n) {
                            break;
                        }
                    }
                    LiveOutcome::Failed => {
                        eprintln!("{}", session.diagnostic_header(&ctx.palette));
                    }
                    LiveOutcome::Ignored => {}
                }
            }
        }

        Command::Explain { topic } => {
            let explainer = Explainer::new();
            match topic {
                Some(topic) => {
                    let explanation = explainer
                        .topic(&topic)
                        .unwrap_or_else(|| explainer.for_view(&topic));
                    println!("{}\n\n{}", ctx.palette.bold(explanation.title), explanation.body);
                }
                None => {
                    for (key, explanation) in explainer.topics() {
                        println!("{:<14} {}", key, explanation.title);
                    }
                }
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

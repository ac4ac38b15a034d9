use anyhow::Result;
use ariadne::config::{DEFAULT_STORE_FILE, WRITE_BUF_SIZE};
use ariadne::dump::DumpKind;
use ariadne::join::{IndexedJoin, JoinInputs, JoinStrategy, MemoryJoin};
use ariadne::store::RelationStore;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ariadne")]
#[command(about = "Turn raw Wikipedia SQL dumps into a shortest-path-ready link graph")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one record kind from a SQL dump into compressed TSV
    Extract(ExtractArgs),
    /// Resolve redirect target titles to ids and collapse chains
    ResolveRedirects(ResolveArgs),
    /// Drop redirect pages that resolved to nothing
    PrunePages(PruneArgs),
    /// Join raw links into src/tgt page-id edges
    JoinLinks(JoinArgs),
    /// Merge grouped outgoing and incoming edges into per-page summaries
    CombineLinks(CombineArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Pages,
    Links,
    LinkTargets,
    Redirects,
}

impl From<KindArg> for DumpKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Pages => DumpKind::Pages,
            KindArg::Links => DumpKind::Links,
            KindArg::LinkTargets => DumpKind::LinkTargets,
            KindArg::Redirects => DumpKind::Redirects,
        }
    }
}

#[derive(Args)]
struct ExtractArgs {
    /// Record kind to extract
    #[arg(short, long, value_enum)]
    kind: KindArg,

    /// Path to the SQL dump file (.sql.bz2)
    #[arg(short, long)]
    input: PathBuf,

    /// Output path for the compressed TSV (.tsv.bz2)
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct ResolveArgs {
    /// Extracted pages file (.tsv.bz2)
    #[arg(short, long)]
    pages: PathBuf,

    /// Extracted raw redirects file (.tsv.bz2)
    #[arg(short, long)]
    redirects: PathBuf,
}

#[derive(Args)]
struct PruneArgs {
    /// Extracted pages file (.tsv.bz2)
    #[arg(short, long)]
    pages: PathBuf,

    /// Resolved redirects file (.tsv.bz2)
    #[arg(short, long)]
    redirects: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// In-memory hash join
    Memory,
    /// Streaming join against the cached SQLite relation store
    Indexed,
}

#[derive(Args)]
struct JoinArgs {
    /// Pruned pages file (.tsv.bz2)
    #[arg(short, long)]
    pages: PathBuf,

    /// Extracted link-targets file (.tsv.bz2)
    #[arg(short = 't', long)]
    link_targets: PathBuf,

    /// Extracted raw links file (.tsv.bz2)
    #[arg(short, long)]
    links: PathBuf,

    /// Join strategy
    #[arg(short, long, value_enum, default_value = "memory")]
    strategy: StrategyArg,

    /// Relation store path for the indexed strategy
    #[arg(long, default_value = DEFAULT_STORE_FILE)]
    store: PathBuf,
}

#[derive(Args)]
struct CombineArgs {
    /// Grouped outgoing edges, sorted by source id (.tsv.bz2)
    #[arg(long)]
    outgoing: PathBuf,

    /// Grouped incoming edges, sorted by target id (.tsv.bz2)
    #[arg(long)]
    incoming: PathBuf,
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    let start = Instant::now();
    let stats = ariadne::dump::run_extract(args.kind.into(), &args.input, &args.output)?;
    info!(
        duration_secs = start.elapsed().as_secs_f64(),
        statements = stats.statements(),
        accepted = stats.accepted(),
        skipped = stats.skipped(),
        "Extract complete"
    );
    Ok(())
}

fn run_resolve(args: ResolveArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(WRITE_BUF_SIZE, stdout.lock());
    ariadne::redirects::resolve_redirects(&args.pages, &args.redirects, &mut out)?;
    out.flush()?;
    Ok(())
}

fn run_prune(args: PruneArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(WRITE_BUF_SIZE, stdout.lock());
    ariadne::prune::prune_pages(&args.pages, &args.redirects, &mut out)?;
    out.flush()?;
    Ok(())
}

fn run_join(args: JoinArgs) -> Result<()> {
    let inputs = JoinInputs {
        pages: args.pages,
        link_targets: args.link_targets,
        links: args.links,
    };
    let stats = ariadne::stats::JoinStats::new();

    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(WRITE_BUF_SIZE, stdout.lock());
    match args.strategy {
        StrategyArg::Memory => MemoryJoin::new().run(&inputs, &mut out, &stats)?,
        StrategyArg::Indexed => {
            let store = RelationStore::open(&args.store)?;
            IndexedJoin::new(store).run(&inputs, &mut out, &stats)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn run_combine(args: CombineArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::with_capacity(WRITE_BUF_SIZE, stdout.lock());
    ariadne::combine::combine_links(&args.outgoing, &args.incoming, &mut out)?;
    out.flush()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // Data rides stdout; everything else goes to stderr so pipelines stay
    // composable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::ResolveRedirects(args) => run_resolve(args),
        Commands::PrunePages(args) => run_prune(args),
        Commands::JoinLinks(args) => run_join(args),
        Commands::CombineLinks(args) => run_combine(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

//! Cairn Inspector
//!
//! Prints the file header, allocation maps and page headers of a database file.
//! The file is never written: files without a header are refused, and the
//! memory-mapped backend (it resizes the file on open) is not offered.

use std::path::PathBuf;

use cairn::alloc::{aim_page_id_for, gam_id_for};
use cairn::{Config, DiskBackend, Engine, PageId};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

/// Cairn file inspector
#[derive(Parser, Debug)]
#[command(name = "cairn-inspect")]
#[command(about = "Inspect the layout of a Cairn database file")]
#[command(version)]
struct Args {
    /// Database file
    path: PathBuf,

    /// Disk backend used to read the file
    #[arg(short, long, value_enum, default_value = "random-access")]
    backend: Backend,

    /// Skip checksum verification (useful on damaged files)
    #[arg(long)]
    no_verify: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// File header, allocation maps and cache counters (default)
    Info,

    /// Page header summaries
    Pages {
        /// Page ids to show; the first 16 pages when omitted
        ids: Vec<PageId>,
    },

    /// Allocation entry recorded for a page
    Aim {
        /// The page to look up
        page_id: PageId,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Backend {
    Stream,
    RandomAccess,
}

impl From<Backend> for DiskBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Stream => DiskBackend::Stream,
            Backend::RandomAccess => DiskBackend::RandomAccess,
        }
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if !args.path.exists() {
        tracing::error!("No database file at {}", args.path.display());
        std::process::exit(1);
    }

    let config = Config::builder()
        .path(&args.path)
        .disk_backend(args.backend.into())
        .verify_checksums(!args.no_verify)
        .create_if_missing(false)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open {}: {}", args.path.display(), e);
            std::process::exit(1);
        }
    };

    let result = match args.command.unwrap_or(Commands::Info) {
        Commands::Info => print_info(&engine),
        Commands::Pages { ids } => print_pages(&engine, ids),
        Commands::Aim { page_id } => print_aim(&engine, page_id),
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn print_info(engine: &Engine) -> cairn::Result<()> {
    let pages = engine.pages();
    println!("Cairn v{}", cairn::VERSION);
    println!("file:            {}", engine.config().path.display());
    println!("format version:  {}", pages.format_version());
    println!("created at:      {} (unix ms)", pages.created_at());

    println!();
    println!("allocation maps:");
    for gam in pages.gams() {
        println!("  GAM {:>8}  {:>6} ids allocated", gam.id(), gam.allocated_count());
    }

    let stats = engine.stats()?;
    println!();
    println!("pages on disk:   {}", stats.pager.disk_pages);
    println!("cached pages:    {}", stats.pager.cached_pages);
    println!("loaded AIMs:     {}", stats.pager.loaded_aims);
    println!(
        "buffer pool:     {} rented, {} available",
        stats.pool.rented, stats.pool.available
    );
    Ok(())
}

fn print_pages(engine: &Engine, ids: Vec<PageId>) -> cairn::Result<()> {
    let ids = if ids.is_empty() { (0..16).collect() } else { ids };

    println!(
        "{:>8}  {:<22} {:>8} {:>8} {:>6} {:>6}  {}",
        "page", "kind", "prev", "next", "used", "slots", "fill"
    );
    for page_id in ids {
        match engine.pages().page_summary(page_id)? {
            Some(summary) => println!(
                "{:>8}  {:<22} {:>8} {:>8} {:>6} {:>6}  {:?}",
                summary.page_id,
                format!("{:?}", summary.kind),
                summary.prev_page_id,
                summary.next_page_id,
                summary.used_bytes,
                summary.slot_count,
                summary.fill
            ),
            None => println!("{:>8}  (never written)", page_id),
        }
    }
    Ok(())
}

fn print_aim(engine: &Engine, page_id: PageId) -> cairn::Result<()> {
    let (Some(gam), Some(aim)) = (gam_id_for(page_id), aim_page_id_for(page_id)) else {
        println!("page {} is bookkeeping (header, GAM or AIM)", page_id);
        return Ok(());
    };

    println!("page {}: GAM {}, AIM {}", page_id, gam, aim);
    match engine.pages().aim_entry(page_id)? {
        Some(entry) => println!("  kind {:?}, fill {:?}", entry.kind, entry.fill),
        None => println!("  not registered"),
    }
    Ok(())
}

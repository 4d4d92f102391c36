use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use ystr_catalog::Tier;
use ystr_ingest::{load_chunked, load_delimited, ChunkedSource, DelimitedSource, IngestOptions};
use ystr_match::{MatchEngine, MatchSetIndex};
use ystr_protocol::{Match, MatchRequest, MatchResponse, Profile};
use ystr_store::ProfileStore;

#[derive(Parser)]
#[command(name = "ystr")]
#[command(about = "Y-STR profile matching over a local profile store", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile store path (falls back to YSTR_STORE, then ystr-profiles.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a delimited-text source into the store
    Load {
        /// Local file to load
        file: Option<PathBuf>,

        /// Remote source URL
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,

        /// Profiles per store batch
        #[arg(long, default_value_t = ystr_ingest::DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },

    /// Load a pre-chunked JSON collection
    LoadChunks {
        /// Base URL serving chunk_<i>.json files
        #[arg(long)]
        base_url: String,

        /// Number of chunks to fetch
        #[arg(long)]
        count: usize,
    },

    /// Rank matches for a stored profile against the whole store
    Matches {
        /// Kit number of the query profile
        #[arg(long)]
        kit: String,

        /// Marker panel: 12, 37, 67 or 111
        #[arg(long, default_value_t = 37)]
        tier: u32,

        /// Genetic-distance ceiling (default: the tier's standard ceiling)
        #[arg(long)]
        max_distance: Option<u32>,

        /// Result cap
        #[arg(long, default_value_t = 200)]
        max_matches: usize,

        /// Annotate rare shared marker values
        #[arg(long)]
        rarity: bool,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show store statistics
    Stats,

    /// Remove every stored profile
    Clear,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Log loading progress in ~10% steps instead of once per batch.
fn progress_logger() -> impl FnMut(f64) {
    let mut last_reported = f64::NEG_INFINITY;
    move |percent: f64| {
        if percent - last_reported >= 10.0 || percent >= 100.0 {
            log::info!("Loading... {percent:.0}%");
            last_reported = percent;
        }
    }
}

const DEFAULT_STORE_FILE: &str = "ystr-profiles.json";

fn store_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env::var_os("YSTR_STORE").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_FILE))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let store_path = store_path(cli.store);
    let mut store = ProfileStore::open(&store_path)
        .await
        .with_context(|| format!("opening profile store {}", store_path.display()))?;

    match cli.command {
        Commands::Load {
            file,
            url,
            batch_size,
        } => {
            let source = match (file, url) {
                (Some(path), None) => DelimitedSource::Path(path),
                (None, Some(url)) => DelimitedSource::Url(url),
                _ => bail!("give either a file or --url"),
            };
            let options = IngestOptions { batch_size };
            let (profiles, stats) =
                load_delimited(source, &mut store, options, progress_logger()).await?;
            println!(
                "Loaded {} profiles ({} rows read, {} duplicates, {} rejected). Store now holds {}.",
                stats.accepted,
                stats.rows_read,
                stats.duplicates,
                stats.rejected,
                profiles.len()
            );
        }

        Commands::LoadChunks { base_url, count } => {
            let source = ChunkedSource {
                base_url,
                chunks: count,
            };
            let (profiles, stats) =
                load_chunked(&source, &mut store, progress_logger()).await?;
            println!(
                "Loaded {} profiles from {} chunks ({} failed). Store now holds {}.",
                stats.accepted,
                count,
                stats.chunks_failed,
                profiles.len()
            );
        }

        Commands::Matches {
            kit,
            tier,
            max_distance,
            max_matches,
            rarity,
            json,
        } => {
            let tier = Tier::from_count(tier)
                .context("tier must be one of 12, 37, 67 or 111")?;
            let Some(query) = store.get(&kit).cloned() else {
                bail!("kit {kit} not found in store");
            };
            let max_distance = max_distance.unwrap_or_else(|| tier.default_max_distance());

            let matches = run_matching(query.clone(), store.profiles(), tier, max_distance, max_matches).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                print_match_table(&matches);
            }
            if rarity {
                print_rarity(&query, &matches, tier);
            }
        }

        Commands::Stats => {
            println!(
                "{} profiles in {}",
                store.len(),
                store.path().display()
            );
        }

        Commands::Clear => {
            let before = store.len();
            store.clear_profiles().await?;
            println!("Cleared {before} profiles.");
        }
    }

    Ok(())
}

async fn run_matching(
    query: Profile,
    database: Vec<Profile>,
    tier: Tier,
    max_distance: u32,
    max_matches: usize,
) -> Result<Vec<Match>> {
    let request = MatchRequest {
        query,
        database,
        tier,
        max_distance,
        max_matches,
    };
    let mut rx = MatchEngine::spawn(request);

    let mut result = None;
    while let Some(response) = rx.recv().await {
        match response {
            MatchResponse::Progress { percent } => log::info!("Matching... {percent:.0}%"),
            MatchResponse::Complete { matches } => result = Some(matches),
            // error-signal messages are shown verbatim
            MatchResponse::Error { message } => bail!("{message}"),
        }
    }
    result.context("matching worker stopped unexpectedly")
}

fn print_match_table(matches: &[Match]) {
    if matches.is_empty() {
        println!("No matches.");
        return;
    }
    println!(
        "{:<14} {:<22} {:<12} {:>4} {:>9} {:>7}",
        "Kit", "Name", "Haplogroup", "GD", "Compared", "Ident%"
    );
    for m in matches {
        println!(
            "{:<14} {:<22} {:<12} {:>4} {:>9} {:>6.1}%",
            m.profile.kit_number,
            m.profile.name.as_deref().unwrap_or("-"),
            m.profile.haplogroup.as_deref().unwrap_or("-"),
            m.result.distance,
            m.result.compared_markers,
            m.result.percent_identical
        );
    }
}

fn print_rarity(query: &Profile, matches: &[Match], tier: Tier) {
    let index = MatchSetIndex::new(matches);
    let mut any = false;
    for marker in tier.marker_ids() {
        let Some(value) = query.marker_value(marker) else {
            continue;
        };
        let rarity = index.rarity(marker, value, value);
        if let Some(band) = rarity.band {
            if !any {
                println!("Rare shared markers:");
                any = true;
            }
            println!(
                "  {:<14} {:<8} {:>5.1}%  {:?}",
                marker.name(),
                value,
                rarity.percentage,
                band
            );
        }
    }
    if !any {
        println!("No rare shared markers.");
    }
}

//! Coldspots CLI - batch scoring and ranking of cold open-source repositories

#![deny(warnings)]

// Global invariants enforced:
// - Each stage reads one file and writes one file
// - A failed stage leaves no output file behind
// - Identical input yields byte-for-byte identical output

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use coldspots_core::activity::load_activity;
use coldspots_core::cold::select_cold;
use coldspots_core::complexity::score_listings;
use coldspots_core::config::{self, ResolvedConfig};
use coldspots_core::error::RowRejection;
use coldspots_core::io;
use coldspots_core::listing::load_listings;
use coldspots_core::merge::{self, SideTables};
use coldspots_core::metric::RankedRepo;
use coldspots_core::normalize::normalize_corpus;
use coldspots_core::popularity::score_corpus;
use coldspots_core::ranking::{rank, sort_ranked, RankingConfig, RankingPolicy, ScoreBasis};
use coldspots_core::report::{render_json, render_text, RankedCorpus, ScoreDimension};
use coldspots_core::table::{atomic_write, Encoding, Table};
use coldspots_core::{run_pipeline, PipelineSummary};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "coldspots")]
#[command(about = "Score, filter and rank cold GitHub and Gitee repositories")]
#[command(version = env!("COLDSPOTS_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (default: auto-discover)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// CSV encoding for input and output (utf8 or latin1, overrides config file)
    #[arg(long, global = true)]
    encoding: Option<Encoding>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute popularity scores from raw platform metrics
    Popularity {
        /// CSV with id, repo_name, stargazers_count, forks_count
        input: PathBuf,
        /// Output CSV
        output: PathBuf,

        /// Star weight (overrides config file)
        #[arg(long)]
        star_weight: Option<f64>,

        /// Fork weight (overrides config file)
        #[arg(long)]
        fork_weight: Option<f64>,

        /// Size penalty coefficient (overrides config file)
        #[arg(long)]
        penalty: Option<f64>,

        /// Write rejected rows as JSON to this path
        #[arg(long)]
        rejects: Option<PathBuf>,
    },
    /// Select repositories below the median popularity with few stars
    Cold {
        /// Popularity CSV
        input: PathBuf,
        /// Output CSV
        output: PathBuf,

        /// Maximum star count for a cold repository (overrides config file)
        #[arg(long)]
        star_ceiling: Option<u64>,
    },
    /// Score complexity from repository directory listings
    Complexity {
        /// JSON array of repository listings
        listings: PathBuf,
        /// Output CSV
        output: PathBuf,
    },
    /// Sum recent monthly activity per repository
    Activity {
        /// JSON object mapping repo_name to a period series
        input: PathBuf,
        /// Output CSV
        output: PathBuf,

        /// Number of trailing months to sum (overrides config file)
        #[arg(long)]
        window: Option<usize>,
    },
    /// Left-join the cold set with complexity, innovation and activity scores
    Merge {
        /// Cold set CSV
        cold: PathBuf,
        /// Output CSV
        output: PathBuf,

        #[command(flatten)]
        sides: SideArgs,

        /// Drop rows with a missing or unavailable score
        #[arg(long)]
        exclude_incomplete: bool,
    },
    /// Rescale complexity, innovation and popularity to 0-100
    Normalize {
        /// Merged score CSV
        input: PathBuf,
        /// Output CSV
        output: PathBuf,
    },
    /// Rank a merged score table
    Rank {
        /// Merged or normalized score CSV
        input: PathBuf,
        /// Output CSV
        output: PathBuf,

        #[command(flatten)]
        ranking: RankingArgs,
    },
    /// Run every stage in memory from raw metrics to a ranked table
    Run {
        /// Raw metrics CSV
        metrics: PathBuf,
        /// Ranked output CSV
        output: PathBuf,

        #[command(flatten)]
        sides: SideArgs,

        /// Listings JSON, scored in place of a complexity CSV
        #[arg(long, conflicts_with = "complexity")]
        listings: Option<PathBuf>,

        /// Activity series JSON, scored in place of an activity CSV
        #[arg(long, conflicts_with = "activity")]
        activity_series: Option<PathBuf>,

        #[command(flatten)]
        ranking: RankingArgs,

        /// Drop rows with a missing or unavailable score
        #[arg(long)]
        exclude_incomplete: bool,

        /// Write the run summary as JSON to this path
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Show the top repositories of a ranked table
    Top {
        /// Ranked CSV
        ranked: PathBuf,

        /// Dimension to order by (total, complexity, innovation, popularity, activity)
        #[arg(long, default_value = "total")]
        by: ScoreDimension,

        /// Number of repositories (overrides config file)
        #[arg(short, long)]
        k: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Look up one repository in a ranked table
    Show {
        /// Ranked CSV
        ranked: PathBuf,

        /// Repository as owner/name
        repo_name: String,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the top slice of a ranked table in pages
    Pages {
        /// Ranked CSV
        ranked: PathBuf,

        /// Size of the top slice (overrides config file)
        #[arg(long)]
        top: Option<usize>,

        /// Rows per page (overrides config file)
        #[arg(long)]
        page_size: Option<usize>,

        /// Only print this 1-based page
        #[arg(long)]
        page: Option<usize>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Validate or show configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SideArgs {
    /// Complexity CSV (id or repo_name, complexity_score, success)
    #[arg(long)]
    complexity: Option<PathBuf>,

    /// Innovation CSV (id or repo_name, innovation_score)
    #[arg(long)]
    innovation: Option<PathBuf>,

    /// Activity CSV (id or repo_name, activity_score)
    #[arg(long)]
    activity: Option<PathBuf>,
}

#[derive(Args)]
struct RankingArgs {
    /// Weighting policy (overrides config file)
    #[arg(long)]
    policy: Option<PolicyName>,

    /// Popularity multiplier for direct subtraction
    #[arg(long)]
    k: Option<f64>,

    /// Rank normalized or raw values
    #[arg(long)]
    basis: Option<BasisName>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PolicyName {
    DirectSubtraction,
    ActivityPenalizing,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum BasisName {
    Normalized,
    Raw,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(err) = run(cli) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        config: config_path,
        encoding,
        ..
    } = cli;

    if let Commands::Config { action } = command {
        return handle_config(action);
    }

    let mut resolved = load_config(config_path.as_deref())?;
    if let Some(encoding) = encoding {
        resolved.encoding = encoding;
    }
    let enc = resolved.encoding;

    match command {
        Commands::Popularity {
            input,
            output,
            star_weight,
            fork_weight,
            penalty,
            rejects,
        } => {
            let mut weights = resolved.popularity;
            weights.stars = star_weight.unwrap_or(weights.stars);
            weights.forks = fork_weight.unwrap_or(weights.forks);
            weights.penalty = penalty.unwrap_or(weights.penalty);
            for (name, value) in [
                ("star weight", weights.stars),
                ("fork weight", weights.forks),
                ("penalty", weights.penalty),
            ] {
                if !value.is_finite() || value < 0.0 {
                    anyhow::bail!("{} must be a non-negative number (got {})", name, value);
                }
            }

            let loaded = io::read_metrics(&input, enc)
                .with_context(|| format!("failed to read metrics from {}", input.display()))?;
            let scoped: Vec<_> = loaded
                .rows
                .into_iter()
                .filter(|m| resolved.should_include(m.repo_name.as_str()))
                .collect();
            let scored = score_corpus(&scoped, &weights);
            io::write_popularity(&scored, &output, enc)
                .with_context(|| format!("failed to write {}", output.display()))?;
            report_rejections(&loaded.rejections, rejects.as_deref())?;
            info!("wrote {} rows to {}", scored.len(), output.display());
        }
        Commands::Cold {
            input,
            output,
            star_ceiling,
        } => {
            let loaded = io::read_popularity(&input, enc)
                .with_context(|| format!("failed to read popularity from {}", input.display()))?;
            report_rejections(&loaded.rejections, None)?;
            let cold = select_cold(&loaded.rows, star_ceiling.unwrap_or(resolved.star_ceiling));
            io::write_cold(&cold.repos, &output, enc)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        Commands::Complexity { listings, output } => {
            let listings = load_listings(&listings)
                .with_context(|| format!("failed to read listings from {}", listings.display()))?;
            let rows = score_listings(&listings);
            io::write_complexity(&rows, &output, enc)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        Commands::Activity {
            input,
            output,
            window,
        } => {
            let window = window.unwrap_or(resolved.activity_window);
            if window == 0 {
                anyhow::bail!("--window must be at least 1");
            }
            let rows = load_activity(&input, window)
                .with_context(|| format!("failed to read activity from {}", input.display()))?;
            io::write_activity(&rows, &output, enc)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        Commands::Merge {
            cold,
            output,
            sides,
            exclude_incomplete,
        } => {
            let loaded = io::read_cold(&cold, enc)
                .with_context(|| format!("failed to read cold set from {}", cold.display()))?;
            report_rejections(&loaded.rejections, None)?;
            let tables = load_side_tables(&sides, enc)?;
            let (rows, _) = merge::merge_scores(&loaded.rows, &tables);
            let rows = if exclude_incomplete || resolved.exclude_incomplete {
                merge::complete_only(&rows)
            } else {
                rows
            };
            io::write_scores(&rows, &output, enc)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        Commands::Normalize { input, output } => {
            let loaded = io::read_scores(&input, enc)
                .with_context(|| format!("failed to read scores from {}", input.display()))?;
            report_rejections(&loaded.rejections, None)?;
            let corpus = normalize_corpus(&loaded.rows);
            io::write_normalized(&corpus.rows, &output, enc)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        Commands::Rank {
            input,
            output,
            ranking,
        } => {
            let config = ranking_config(&resolved, &ranking)?;
            let loaded = io::read_scores(&input, enc)
                .with_context(|| format!("failed to read scores from {}", input.display()))?;
            report_rejections(&loaded.rejections, None)?;
            let corpus = normalize_corpus(&loaded.rows);
            let ranked = rank(&corpus.rows, &config);
            io::write_ranked(&ranked, config.policy.score_column(), &output, enc)
                .with_context(|| format!("failed to write {}", output.display()))?;
        }
        Commands::Run {
            metrics,
            output,
            sides,
            listings,
            activity_series,
            ranking,
            exclude_incomplete,
            summary,
        } => {
            resolved.ranking = ranking_config(&resolved, &ranking)?;
            resolved.exclude_incomplete |= exclude_incomplete;

            let loaded = io::read_metrics(&metrics, enc)
                .with_context(|| format!("failed to read metrics from {}", metrics.display()))?;
            let mut tables = load_side_tables(&sides, enc)?;
            if let Some(path) = listings {
                let listings = load_listings(&path)
                    .with_context(|| format!("failed to read listings from {}", path.display()))?;
                tables.complexity = Some(merge::complexity_from_rows(&score_listings(&listings)));
            }
            if let Some(path) = activity_series {
                let rows = load_activity(&path, resolved.activity_window)
                    .with_context(|| format!("failed to read activity from {}", path.display()))?;
                tables.activity = Some(merge::activity_from_rows(&rows));
            }

            let mut result = run_pipeline(&loaded.rows, &tables, &resolved);
            result.summary.rejected = loaded.rejections;
            io::write_ranked(
                result.corpus.ranked(),
                &result.corpus.score_column,
                &output,
                enc,
            )
            .with_context(|| format!("failed to write {}", output.display()))?;

            if let Some(path) = summary {
                let json = serde_summary(&result.summary)?;
                atomic_write(&path, json.as_bytes())
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
            print_summary(&result.summary);
        }
        Commands::Top {
            ranked,
            by,
            k,
            format,
        } => {
            let corpus = load_ranked(&ranked, enc)?;
            let rows = corpus.top_k_by(by, k.unwrap_or(resolved.top_n));
            print_rows(&rows, &corpus.score_column, format);
        }
        Commands::Show {
            ranked,
            repo_name,
            format,
        } => {
            let corpus = load_ranked(&ranked, enc)?;
            match corpus.find(&repo_name) {
                Some(repo) => print_rows(&[repo], &corpus.score_column, format),
                None => anyhow::bail!("repository not found: {}", repo_name),
            }
        }
        Commands::Pages {
            ranked,
            top,
            page_size,
            page,
            format,
        } => {
            let corpus = load_ranked(&ranked, enc)?;
            let top = top.unwrap_or(resolved.top_n);
            let page_size = page_size.unwrap_or(resolved.page_size);
            if page_size == 0 {
                anyhow::bail!("--page-size must be at least 1");
            }
            let pages = corpus.pages(top, page_size);
            let selected: Vec<(usize, &[RankedRepo])> = match page {
                Some(n) => {
                    let rows = corpus.page(top, page_size, n).with_context(|| {
                        format!("page {} out of range (1..={})", n, pages.len())
                    })?;
                    vec![(n, rows)]
                }
                None => pages.into_iter().enumerate().map(|(i, p)| (i + 1, p)).collect(),
            };
            for (number, rows) in selected {
                let rows: Vec<&RankedRepo> = rows.iter().collect();
                if matches!(format, OutputFormat::Text) {
                    println!("Page {}", number);
                }
                print_rows(&rows, &corpus.score_column, format);
            }
        }
        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let project_root = std::env::current_dir()?;
    config::load_and_resolve(&project_root, path).context("failed to load configuration")
}

fn handle_config(action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Validate { path } => match load_config(path.as_deref()) {
            Ok(config) => {
                if let Some(ref p) = config.config_path {
                    println!("Config valid: {}", p.display());
                } else {
                    println!("No config file found. Using defaults.");
                }
            }
            Err(e) => {
                eprintln!("Config validation failed: {:#}", e);
                std::process::exit(1);
            }
        },
        ConfigAction::Show { path } => {
            let resolved = load_config(path.as_deref())?;

            println!("Configuration:");
            if let Some(ref p) = resolved.config_path {
                println!("  Source: {}", p.display());
            } else {
                println!("  Source: defaults (no config file found)");
            }
            println!();
            println!("Popularity:");
            println!("  star_weight: {}", resolved.popularity.stars);
            println!("  fork_weight: {}", resolved.popularity.forks);
            println!("  penalty: {}", resolved.popularity.penalty);
            println!();
            println!("Cold set:");
            println!("  star_ceiling: {}", resolved.star_ceiling);
            println!();
            println!("Ranking:");
            match resolved.ranking.policy {
                RankingPolicy::ActivityPenalizing {
                    alpha,
                    beta,
                    gamma,
                    activity_scale,
                } => {
                    println!("  policy: activity_penalizing");
                    println!("  alpha: {}", alpha);
                    println!("  beta: {}", beta);
                    println!("  gamma: {}", gamma);
                    println!("  activity_scale: {}", activity_scale);
                }
                RankingPolicy::DirectSubtraction { k } => {
                    println!("  policy: direct_subtraction");
                    println!("  k: {}", k);
                }
            }
            println!(
                "  basis: {}",
                match resolved.ranking.basis {
                    ScoreBasis::Normalized => "normalized",
                    ScoreBasis::Raw => "raw",
                }
            );
            println!();
            println!("Pipeline:");
            println!("  activity_window: {}", resolved.activity_window);
            println!("  exclude_incomplete: {}", resolved.exclude_incomplete);
            println!("  top: {}", resolved.top_n);
            println!("  page_size: {}", resolved.page_size);
            println!("  encoding: {}", resolved.encoding);
            println!(
                "  include: {}",
                if resolved.include.is_some() {
                    "custom patterns"
                } else {
                    "all repositories"
                }
            );
            println!(
                "  exclude: {}",
                if resolved.exclude.is_some() {
                    "custom patterns"
                } else {
                    "none"
                }
            );
        }
    }
    Ok(())
}

/// Apply --policy/--k/--basis on top of the configured ranking
fn ranking_config(resolved: &ResolvedConfig, args: &RankingArgs) -> anyhow::Result<RankingConfig> {
    let mut policy = match args.policy {
        Some(PolicyName::DirectSubtraction) => RankingPolicy::direct_subtraction(1.0),
        Some(PolicyName::ActivityPenalizing) => RankingPolicy::activity_penalizing(),
        None => resolved.ranking.policy,
    };
    if let Some(k) = args.k {
        if !k.is_finite() {
            anyhow::bail!("--k must be a finite number (got {})", k);
        }
        match policy {
            RankingPolicy::DirectSubtraction { .. } => {
                policy = RankingPolicy::direct_subtraction(k)
            }
            RankingPolicy::ActivityPenalizing { .. } => {
                anyhow::bail!("--k only applies to the direct-subtraction policy")
            }
        }
    }
    let basis = match args.basis {
        Some(BasisName::Normalized) => ScoreBasis::Normalized,
        Some(BasisName::Raw) => ScoreBasis::Raw,
        None => resolved.ranking.basis,
    };
    Ok(RankingConfig { policy, basis })
}

fn load_side_tables(args: &SideArgs, enc: Encoding) -> anyhow::Result<SideTables> {
    let read = |path: &Path| {
        Table::read(path, enc).with_context(|| format!("failed to read {}", path.display()))
    };
    let mut tables = SideTables::default();
    if let Some(ref path) = args.complexity {
        tables.complexity = Some(merge::complexity_table(&read(path.as_path())?)?);
    }
    if let Some(ref path) = args.innovation {
        tables.innovation = Some(merge::innovation_table(&read(path.as_path())?)?);
    }
    if let Some(ref path) = args.activity {
        tables.activity = Some(merge::activity_table(&read(path.as_path())?)?);
    }
    Ok(tables)
}

fn load_ranked(path: &Path, enc: Encoding) -> anyhow::Result<RankedCorpus> {
    let (loaded, score_column) = io::read_ranked(path, enc)
        .with_context(|| format!("failed to read ranked table from {}", path.display()))?;
    report_rejections(&loaded.rejections, None)?;
    Ok(RankedCorpus::new(score_column, sort_ranked(loaded.rows)))
}

fn report_rejections(rejections: &[RowRejection], path: Option<&Path>) -> anyhow::Result<()> {
    if !rejections.is_empty() {
        warn!("{} row(s) rejected", rejections.len());
    }
    if let Some(path) = path {
        let json = serde_json::to_string_pretty(rejections)?;
        atomic_write(path, json.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

fn serde_summary(summary: &PipelineSummary) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

fn print_summary(summary: &PipelineSummary) {
    eprintln!("Input rows:     {}", summary.input_rows);
    eprintln!("Rejected rows:  {}", summary.rejected.len());
    eprintln!("Out of scope:   {}", summary.scoped_out);
    eprintln!(
        "Median score:   {}",
        summary
            .median_score
            .map(|m| format!("{:.4}", m))
            .unwrap_or_else(|| "none".to_string())
    );
    eprintln!("Cold rows:      {}", summary.cold_rows);
    eprintln!(
        "Unmatched:      complexity {}, innovation {}, activity {}",
        summary.merge.unmatched_complexity,
        summary.merge.unmatched_innovation,
        summary.merge.unmatched_activity
    );
    eprintln!("Failed fetches: {}", summary.merge.failed_listings);
    if summary.incomplete_dropped > 0 {
        eprintln!("Incomplete:     {} dropped", summary.incomplete_dropped);
    }
    for column in &summary.degenerate_columns {
        eprintln!("Degenerate:     {} (all values equal)", column.as_str());
    }
    eprintln!("Ranked rows:    {} ({})", summary.ranked_rows, summary.policy);
}

fn print_rows(rows: &[&RankedRepo], score_column: &str, format: OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", render_text(rows, score_column)),
        OutputFormat::Json => println!("{}", render_json(rows)),
    }
}

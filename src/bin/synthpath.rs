//! synthpath command-line driver
//!
//! ```text
//! synthpath gather  --settings Settings.json --thermo thermo.json
//! synthpath rank    --settings Settings.json --candidates Rxn_TD.csv
//! synthpath suggest --settings Settings.json --data Exp.json --batch 4
//! synthpath db      PairwiseRxns.csv
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use synthpath::campaign::{
    candidates_to_csv, gather_candidates, load_candidates, Campaign, RankingMode, StepOutcome,
    DEFAULT_CANDIDATE_FILE,
};
use synthpath::composition::Formula;
use synthpath::config::{CampaignConfig, CampaignFlags, CampaignSettings};
use synthpath::experiment::ExperimentalDataset;
use synthpath::pairwise::persist::DEFAULT_FILE;
use synthpath::pairwise::ReactionDatabase;
use synthpath::reactions::{Energetics, TabulatedThermo};

#[derive(Parser)]
#[command(name = "synthpath")]
#[command(about = "Pairwise reaction-pathway inference for solid-state synthesis campaigns")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate balanced precursor sets and score them by reaction energy
    Gather {
        #[command(flatten)]
        common: CommonArgs,

        /// Tabulated formation energies (JSON array)
        #[arg(long)]
        thermo: PathBuf,
    },

    /// Print the current precursor ranking
    Rank {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        ranking: RankingArgs,
    },

    /// Analyse available results and suggest the next experiment(s)
    Suggest {
        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        ranking: RankingArgs,

        /// Experimental results (JSON)
        #[arg(long, default_value = "Exp.json")]
        data: PathBuf,

        /// Keep going after a phase-pure target is obtained
        #[arg(long)]
        all: bool,

        /// Only accept pairwise reactions with negative reaction energy
        #[arg(long)]
        enforce_thermo: bool,

        /// Number of experiments to suggest at once
        #[arg(long, default_value_t = 1)]
        batch: usize,
    },

    /// Print a saved pairwise reaction database
    Db {
        /// Database file
        #[arg(default_value = DEFAULT_FILE)]
        path: PathBuf,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Campaign settings (JSON)
    #[arg(long, default_value = "Settings.json")]
    settings: PathBuf,

    /// Candidate precursor table (CSV)
    #[arg(long, default_value = DEFAULT_CANDIDATE_FILE)]
    candidates: PathBuf,
}

#[derive(Args)]
struct RankingArgs {
    /// Pairwise reaction database (CSV); loaded if present, saved on update
    #[arg(long, default_value = DEFAULT_FILE)]
    database: PathBuf,

    /// Tabulated formation energies for driving-force updates (JSON array)
    #[arg(long)]
    thermo: Option<PathBuf>,

    /// Prioritize untested interfaces over driving force
    #[arg(long)]
    explore: bool,

    /// Assume low-temperature reactions always happen first
    #[arg(long)]
    greedy: bool,

    /// Rank impure outcomes by their target yield
    #[arg(long)]
    partial_yield: bool,
}

fn load_config(path: &Path) -> Result<CampaignConfig> {
    let settings = CampaignSettings::load(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    Ok(settings.validate()?)
}

fn load_thermo(path: &Path) -> Result<TabulatedThermo> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(TabulatedThermo::from_json_str(&text)?)
}

fn build_campaign<'a>(
    config: CampaignConfig,
    flags: CampaignFlags,
    common: &CommonArgs,
    ranking: &RankingArgs,
    thermo: Option<&'a TabulatedThermo>,
) -> Result<Campaign<'a>> {
    let candidates = load_candidates(&common.candidates, RankingMode::from_explore(flags.explore))
        .with_context(|| format!("no reaction data in {}; run `synthpath gather` first", common.candidates.display()))?;
    let atmosphere = config.atmosphere;
    let mut campaign = Campaign::new(config, flags, candidates).with_database_path(&ranking.database);
    if let Some(thermo) = thermo {
        campaign = campaign.with_energetics(Energetics::new(thermo, atmosphere));
    }
    if ranking.database.exists() {
        let database = ReactionDatabase::load(&ranking.database)?;
        campaign = campaign.with_database(database)?;
    }
    Ok(campaign)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Gather { common, thermo } => {
            let config = load_config(&common.settings)?;
            let thermo = load_thermo(&thermo)?;
            let energetics = Energetics::new(&thermo, config.atmosphere);
            let candidates = gather_candidates(&config, &energetics);
            fs::write(&common.candidates, candidates_to_csv(&candidates))
                .with_context(|| format!("writing {}", common.candidates.display()))?;
            info!(count = candidates.len(), path = %common.candidates.display(), "saved precursor sets");
        }
        Commands::Rank { common, ranking } => {
            let config = load_config(&common.settings)?;
            let thermo = ranking.thermo.as_deref().map(load_thermo).transpose()?;
            let flags = CampaignFlags {
                explore: ranking.explore,
                greedy: ranking.greedy,
                reward_partial_yield: ranking.partial_yield,
                ..CampaignFlags::default()
            };
            let campaign = build_campaign(config, flags, &common, &ranking, thermo.as_ref())?;
            for (rank, candidate) in campaign.candidates().iter().enumerate() {
                let names: Vec<&str> = candidate.original_set.iter().map(Formula::as_str).collect();
                println!(
                    "{:>3}. {} (yield {:.3}, {} new interfaces, {:.1} meV/atom)",
                    rank + 1,
                    names.join(", "),
                    candidate.expected_yield,
                    candidate.num_interfaces(),
                    candidate.energy
                );
            }
        }
        Commands::Suggest {
            common,
            ranking,
            data,
            all,
            enforce_thermo,
            batch,
        } => {
            let config = load_config(&common.settings)?;
            let thermo = ranking.thermo.as_deref().map(load_thermo).transpose()?;
            let dataset = if data.exists() {
                ExperimentalDataset::load(&data)?
            } else {
                info!("no experimental data found, starting from scratch");
                ExperimentalDataset::new()
            };
            let flags = CampaignFlags {
                explore: ranking.explore,
                all,
                enforce_thermo,
                greedy: ranking.greedy,
                reward_partial_yield: ranking.partial_yield,
                batch_size: batch.max(1),
            };
            let mut campaign = build_campaign(config, flags, &common, &ranking, thermo.as_ref())?;
            match campaign.run(&dataset)? {
                StepOutcome::SuggestExperiments(suggestions) => {
                    println!("-- Suggested experiments --");
                    for (i, suggestion) in suggestions.iter().enumerate() {
                        println!("{}:\n{suggestion}", i + 1);
                    }
                }
                StepOutcome::TargetObtained { precursors, temperature } => {
                    let names: Vec<&str> = precursors.iter().map(Formula::as_str).collect();
                    println!("Phase pure target obtained. Halting campaign.");
                    println!("Successful synthesis route: {} @ {temperature} C", names.join(", "));
                }
                StepOutcome::Exhausted | StepOutcome::Continue { .. } => {
                    println!("All possible reactions sampled.");
                }
            }
        }
        Commands::Db { path } => {
            let database = ReactionDatabase::load(&path)?;
            println!("{}", database.describe());
        }
    }
    Ok(())
}

mod commands;
mod session;
mod storage;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use fusion_tracker_core::{EncounterField, GameMode, PokemonStatus, StaticCatalog, TrackerConfig};
use std::path::{Path, PathBuf};

use session::Session;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Classic,
    Remix,
    Randomized,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Classic => Self::Classic,
            ModeArg::Remix => Self::Remix,
            ModeArg::Randomized => Self::Randomized,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FieldArg {
    Head,
    Body,
}

impl From<FieldArg> for EncounterField {
    fn from(field: FieldArg) -> Self {
        match field {
            FieldArg::Head => Self::Head,
            FieldArg::Body => Self::Body,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Captured,
    Received,
    Traded,
    Missed,
    Stored,
    Deceased,
}

impl From<StatusArg> for PokemonStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Captured => Self::Captured,
            StatusArg::Received => Self::Received,
            StatusArg::Traded => Self::Traded,
            StatusArg::Missed => Self::Missed,
            StatusArg::Stored => Self::Stored,
            StatusArg::Deceased => Self::Deceased,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "fusion-tracker", version)]
#[command(about = "Inspect and maintain fusion run tracker saves")]
struct Args {
    /// Directory holding saved playthroughs
    #[arg(long, default_value = "fusion-tracker-data", global = true)]
    data_dir: PathBuf,

    /// Optional JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Optional catalog JSON replacing the bundled species and locations
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List saved playthroughs, newest first
    List,
    /// Show the active playthrough
    Show,
    /// Create and activate a playthrough
    New {
        #[arg(default_value = "")]
        name: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Classic)]
        mode: ModeArg,
    },
    /// Activate another playthrough
    Switch { id: String },
    /// Rename the active playthrough
    Rename { name: String },
    /// Change the game mode of the active playthrough
    SetMode {
        #[arg(value_enum)]
        mode: ModeArg,
    },
    /// Delete a playthrough
    Delete { id: String },
    /// Write the active playthrough as an export envelope
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import an exported playthrough and activate it
    Import { file: PathBuf },
    /// Rewrite every readable record in the current format
    Migrate,
    /// Print the merged location order
    Locations,
    /// Edit encounters of the active playthrough
    #[command(subcommand)]
    Encounter(EncounterCommand),
    /// Edit the team of the active playthrough
    #[command(subcommand)]
    Team(TeamCommand),
    /// Edit custom locations of the active playthrough
    #[command(subcommand)]
    Custom(CustomCommand),
}

#[derive(Debug, ClapArgs)]
pub struct FieldOpt {
    #[arg(long, value_enum, default_value_t = FieldArg::Head)]
    pub field: FieldArg,
}

#[derive(Debug, Subcommand)]
pub enum EncounterCommand {
    /// Place a species at a location
    Set {
        location: String,
        species: u32,
        #[command(flatten)]
        field: FieldOpt,
        /// Keep the existing partner and make the encounter a fusion
        #[arg(long)]
        fusion: bool,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        #[arg(long)]
        nickname: Option<String>,
    },
    /// Clear one half of an encounter
    Clear {
        location: String,
        #[command(flatten)]
        field: FieldOpt,
    },
    /// Remove the whole encounter
    Reset { location: String },
    Toggle { location: String },
    Flip { location: String },
    /// Move a Pokémon to another location slot, swapping if occupied
    Move {
        from: String,
        to: String,
        #[arg(long, value_enum, default_value_t = FieldArg::Head)]
        from_field: FieldArg,
        #[arg(long, value_enum, default_value_t = FieldArg::Head)]
        to_field: FieldArg,
    },
    Swap {
        first: String,
        second: String,
        #[arg(long, value_enum, default_value_t = FieldArg::Head)]
        first_field: FieldArg,
        #[arg(long, value_enum, default_value_t = FieldArg::Head)]
        second_field: FieldArg,
    },
    /// Send a Pokémon back to where it was first caught
    Home {
        location: String,
        #[command(flatten)]
        field: FieldOpt,
    },
    Status {
        location: String,
        #[arg(value_enum)]
        status: StatusArg,
        #[command(flatten)]
        field: FieldOpt,
    },
    /// Set a nickname; omit the name to clear it
    Nickname {
        location: String,
        name: Option<String>,
        #[command(flatten)]
        field: FieldOpt,
    },
}

#[derive(Debug, Subcommand)]
pub enum TeamCommand {
    /// Box every Pokémon in a slot (1-6)
    Box { position: usize },
    /// Take a boxed Pokémon back out by UID
    Restore { uid: String },
    /// Put a location's encounter into a slot (1-6)
    Place { position: usize, location: String },
    Clear { position: usize },
    Swap { first: usize, second: usize },
}

#[derive(Debug, Subcommand)]
pub enum CustomCommand {
    Add {
        name: String,
        #[arg(long)]
        after: String,
    },
    Rename { id: String, name: String },
    /// Anchor a custom location after a different location
    Move {
        id: String,
        #[arg(long)]
        after: String,
    },
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let catalog = load_catalog(args.catalog.as_deref())?;

    if args.verbose {
        announce_banner();
    }

    let mut session = Session::open(&args.data_dir, config).await?;
    let outcome = commands::run(args.command, &mut session, &catalog);
    session.close().await?;
    outcome
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn announce_banner() {
    println!("{}", "🧬 Fusion Run Tracker".bright_cyan().bold());
    println!("{}", "=====================".cyan());
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let Some(path) = path else {
        return Ok(TrackerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    TrackerConfig::from_json(&text)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn load_catalog(path: Option<&Path>) -> Result<StaticCatalog> {
    let Some(path) = path else {
        return Ok(StaticCatalog::bundled());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    StaticCatalog::from_json(&text)
        .with_context(|| format!("Failed to parse catalog {}", path.display()))
}

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use cliniq::config::{self, EncoderConfig, RecommenderConfig};
use cliniq::encoding::{select_encoder, CaseEncoder};
use cliniq::models::{CaseId, LabMeasurement, LabOutcome, PatientCase};
use cliniq::{CaseRecommender, SqliteCaseStore};

#[derive(Parser)]
#[command(name = "cliniq")]
#[command(about = "Laboratory test recommendations from similar historical cases")]
#[command(version)]
struct Cli {
    /// Case history database
    #[arg(long, env = "CLINIQ_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the reference cases with their lab results
    Seed,
    /// Save a case with its laboratory order (JSON: {"case": .., "outcome": .., "results": [..]})
    Save {
        file: PathBuf,
    },
    /// Recommend tests for a case (JSON patient case)
    Recommend {
        file: PathBuf,
    },
    /// Show a stored case
    Show {
        id: i64,
    },
    /// List the most recent cases
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },
    /// Rolling-window efficiency summary
    Dashboard {
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
    /// Frequency, efficiency and common tests per diagnosis
    Insights,
}

#[derive(Deserialize)]
struct SaveRequest {
    case: PatientCase,
    outcome: LabOutcome,
    #[serde(default)]
    results: Vec<LabMeasurement>,
}

#[derive(Serialize)]
struct SaveResponse {
    case_id: CaseId,
    results_recorded: usize,
}

fn main() {
    cliniq::init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = cli.db.unwrap_or_else(config::database_path);
    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let store = SqliteCaseStore::open(&db_path)?;
    let encoder = select_encoder(&EncoderConfig::from_env());
    let engine = CaseRecommender::new(store, encoder, RecommenderConfig::default());

    let outcome = dispatch(&engine, cli.command);
    engine.into_store().close()?;
    outcome
}

fn dispatch<E: CaseEncoder>(
    engine: &CaseRecommender<SqliteCaseStore, E>,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Seed => print_json(&engine.seed_sample_data()?),
        Commands::Save { file } => {
            let request: SaveRequest = read_json(&file)?;
            let case_id = engine.save_case(&request.case, &request.outcome)?;
            let results_recorded = if request.results.is_empty() {
                0
            } else {
                engine.record_lab_results(case_id, &request.results)?
            };
            print_json(&SaveResponse {
                case_id,
                results_recorded,
            })
        }
        Commands::Recommend { file } => {
            let case: PatientCase = read_json(&file)?;
            print_json(&engine.recommend(&case)?)
        }
        Commands::Show { id } => print_json(&engine.get_case(CaseId(id))?),
        Commands::Recent { limit } => print_json(&engine.recent_cases(limit)?),
        Commands::Dashboard { days } => print_json(&engine.get_dashboard_summary(days)?),
        Commands::Insights => print_json(&engine.diagnosis_insights()?),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

use std::path::{Path, PathBuf};

use chainflow_model::{FlowModel, Network, NetworkConfig, NetworkError, Reporter};
use chainflow_solver::{SolutionStatus, Solver};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tolerance for the post-solve invariant audit
const AUDIT_TOLERANCE: f64 = 1e-6;

#[derive(Parser)]
#[command(name = "chainflow")]
#[command(about = "Least-cost flow from plants through distribution centers to customers", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a network and print the optimal flows
    Solve {
        /// JSON network file (uses the built-in sample network when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Show binding constraints, shadow prices and reduced costs
        #[arg(short, long)]
        analysis: bool,
    },
    /// Check a network file for configuration errors
    Check {
        /// The file to check
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the built-in sample network as JSON
    Defaults,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Solve { config, format, analysis } => solve(config.as_deref(), format, analysis),
        Commands::Check { config } => check(&config),
        Commands::Defaults => match NetworkConfig::default().to_json_pretty() {
            Ok(json) => println!("{}", json),
            Err(e) => fail("Output error", &e),
        },
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> NetworkConfig {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading network");
            NetworkConfig::load(path).unwrap_or_else(|e| fail("Config error", &e))
        }
        None => {
            debug!("using built-in sample network");
            NetworkConfig::default()
        }
    }
}

fn solve(path: Option<&Path>, format: Format, analysis: bool) {
    let config = load_config(path);

    let model = FlowModel::from_config(&config).unwrap_or_else(|e| fail("Config error", &e));

    // single blocking solve
    let solver = Solver::new();
    let mut solution = model.solve(&solver).unwrap_or_else(|e| fail("Solver error", &e));

    let problems = solution.audit(&model.network, AUDIT_TOLERANCE);
    if !problems.is_empty() {
        warn!(count = problems.len(), "solution failed the invariant audit");
    }

    match format {
        Format::Text => println!("{}", Reporter::new().with_analysis(analysis).render(&solution)),
        Format::Json => {
            if !analysis {
                solution.analysis = None;
            }
            match serde_json::to_string_pretty(&solution) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Output error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    if solution.status != SolutionStatus::Optimal {
        std::process::exit(1);
    }
}

fn check(path: &Path) {
    let config = load_config(Some(path));

    match Network::from_config(&config) {
        Ok(network) => {
            println!("✓ {} is valid", path.display());
            println!("  {} plants", network.num_plants());
            println!("  {} distribution centers", network.num_distribution_centers());
            println!("  {} customers", network.num_customers());
            println!("  total capacity {}", network.total_capacity());
            println!("  total demand {}", network.total_demand());
        }
        Err(e) => {
            eprintln!("✗ {} has errors:", path.display());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn fail(context: &str, err: &NetworkError) -> ! {
    eprintln!("{}: {}", context, err);
    std::process::exit(1);
}

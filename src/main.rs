use bid_recon::cli::{self, ReturnOptions};
use bid_recon::config::EngineConfig;
use bid_recon::error::ReconResult;
use bid_recon::types::ConfigScope;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bid-recon")]
#[command(about = "Reconcile construction bid returns against the project estimate.")]
#[command(long_about = "Bid Recon - compare contractor bid returns line by line

Reads spreadsheets of unknown layout, guesses which columns hold codes,
descriptions, prices and quantities, and lines every company's offer up
against the project estimate.

COMMANDS:
  profile     - Show detected header, column scores and proposed mapping
  import      - Project estimate (computo) → new dataset
  add-return  - Attach a company's bid return to a dataset
  compare     - Per-line price comparison with statistics
  export      - Comparison → Excel (.xlsx) with live formulas

EXAMPLES:
  bid-recon profile offerta_acme.xlsx
  bid-recon import computo.xlsx tender.yaml --project \"Hospital wing\"
  bid-recon add-return tender.yaml offerta_acme.xlsx --company Acme --round 2
  bid-recon compare tender.yaml
  bid-recon export tender.yaml confronto.xlsx

LOGGING:
  -v raises log output to debug; RUST_LOG overrides both (e.g. RUST_LOG=bid_recon=trace).")]
#[command(version)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(short, long, global = true, env = "BID_RECON_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output and debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Project,
    Global,
}

impl From<ScopeArg> for ConfigScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Project => ConfigScope::Project,
            ScopeArg::Global => ConfigScope::Global,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Profile a sheet and propose a column mapping
    Profile {
        /// Workbook (.xlsx, .xls, .ods)
        input: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(long_about = "Import a project estimate into a new dataset.

The sheet is profiled and mapped automatically. A saved preset (--preset)
overrides the heuristic for the columns it names; references that no
longer exist are kept as literal keys and reported.

Rows with neither a code nor a description are skipped. Multi-column
codes are joined with '.'.")]
    /// Import a project estimate into a new dataset
    Import {
        /// Project estimate workbook
        input: PathBuf,

        /// Dataset file to create (YAML)
        output: PathBuf,

        /// Dataset name (default: input file name)
        #[arg(short, long)]
        name: Option<String>,

        /// Project the dataset belongs to
        #[arg(short, long)]
        project: Option<String>,

        /// Sheet name (default: preset sheet, then first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Saved mapping preset (YAML)
        #[arg(long)]
        preset: Option<PathBuf>,
    },

    #[command(long_about = "Attach a company's bid return to a dataset.

Offers are stored under \"Company\" or \"Company (Round N)\". Return rows
are matched to project lines by code, or by description when the return
has no code. The dataset is backed up to .yaml.bak before it is rewritten.

--save-preset writes the mapping used as a reusable preset. A
project-scoped preset (--scope project) needs a dataset with a project.")]
    /// Attach a company's bid return to a dataset
    AddReturn {
        /// Dataset file (YAML)
        dataset: PathBuf,

        /// Bid return workbook
        input: PathBuf,

        /// Company name
        #[arg(long)]
        company: String,

        /// Bidding round
        #[arg(short, long)]
        round: Option<u32>,

        /// Sheet name (default: preset sheet, then first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Saved mapping preset (YAML)
        #[arg(long)]
        preset: Option<PathBuf>,

        /// Save the mapping used as a preset
        #[arg(long)]
        save_preset: Option<PathBuf>,

        /// Name for the saved preset (default: company)
        #[arg(long)]
        preset_name: Option<String>,

        /// Scope of the saved preset
        #[arg(long, value_enum, default_value = "global")]
        scope: ScopeArg,
    },

    /// Compare offers line by line
    Compare {
        /// Dataset file (YAML)
        dataset: PathBuf,

        /// Restrict to these company-rounds (repeatable)
        #[arg(long = "company")]
        companies: Vec<String>,

        /// Print rows and summary as JSON
        #[arg(long)]
        json: bool,
    },

    #[command(long_about = "Export the comparison to Excel .xlsx.

Totals, deltas and the mean/min/max/standard deviation columns are
written as formulas over the row's own cells, so the workbook stays live
when a price is edited. Prices and totals are shaded against the project
reference, deltas are colored by sign and quantity differences are
highlighted.")]
    /// Export the comparison to Excel .xlsx
    Export {
        /// Dataset file (YAML)
        dataset: PathBuf,

        /// Output Excel file path (.xlsx)
        output: PathBuf,

        /// Restrict to these company-rounds (repeatable)
        #[arg(long = "company")]
        companies: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "bid_recon=debug" } else { "bid_recon=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> ReconResult<()> {
    let config = EngineConfig::load_or_default(cli.config.as_deref())?;
    let verbose = cli.verbose;

    match cli.command {
        Commands::Profile { input, sheet, json } => cli::profile(input, sheet, &config, json),

        Commands::Import {
            input,
            output,
            name,
            project,
            sheet,
            preset,
        } => cli::import(input, output, name, project, sheet, preset, &config, verbose),

        Commands::AddReturn {
            dataset,
            input,
            company,
            round,
            sheet,
            preset,
            save_preset,
            preset_name,
            scope,
        } => cli::add_return(
            dataset,
            input,
            ReturnOptions {
                company,
                round,
                sheet,
                preset,
                save_preset,
                preset_name,
                scope: scope.into(),
            },
            &config,
            verbose,
        ),

        Commands::Compare {
            dataset,
            companies,
            json,
        } => cli::compare(dataset, companies, json),

        Commands::Export {
            dataset,
            output,
            companies,
        } => cli::export(dataset, output, companies, &config, verbose),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "❌ Error:".bold().red(), e);
        std::process::exit(1);
    }
}

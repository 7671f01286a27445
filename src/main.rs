use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use simplelog::LevelFilter;

use fm_rs::analysis::SatAnalyzer;
use fm_rs::configuration::{complete_configuration, Configuration};
use fm_rs::counting::BddModel;
use fm_rs::diagnosis::{Assertion, DiagnosisModel, Diagnoser};
use fm_rs::solver::SolverConfig;
use fm_rs::{build_sat_model, load_model, FeatureModel};

#[derive(Parser)]
#[command(author, version, about = "Feature model analyzer (UVL, SAT and BDD)")]
struct Cli {
    /// Feature model in UVL format
    #[arg(value_name = "MODEL")]
    model: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Give up a solver call after this many conflicts
    #[arg(long, value_name = "INT")]
    conflict_limit: Option<u64>,

    /// Give up a solver call after this many seconds
    #[arg(long, value_name = "SECONDS")]
    time_limit: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Features of the configuration, comma-separated; prefix with '!' to deselect
    #[arg(value_delimiter = ',')]
    features: Vec<String>,

    /// Treat unlisted features as deselected
    #[arg(long)]
    full: bool,

    /// Complete the configuration with implied ancestors and mandatory features first
    #[arg(long)]
    complete: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show statistics about the feature model
    Info,

    /// Print the feature tree
    Tree,

    /// Check if the model has at least one product
    Valid,

    /// Count the products
    Count {
        /// Count with the BDD back end instead of enumerating with SAT
        #[arg(long)]
        bdd: bool,
    },

    /// List products, one per line
    Products {
        /// Stop after this many products
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List core features (selected in every product)
    Core,

    /// List dead features (selected in no product)
    Dead,

    /// List optional features that are selected whenever their parent is
    FalseOptional,

    /// Find one product
    Find {
        /// Search the BDD instead of calling the SAT solver
        #[arg(long)]
        bdd: bool,
    },

    /// Check if a configuration is valid
    Check {
        #[command(flatten)]
        config: ConfigArgs,

        /// Check against the BDD instead of the SAT encoding
        #[arg(long)]
        bdd: bool,
    },

    /// Explain why a configuration, or the model itself when no features are given, is invalid
    Diagnose(ConfigArgs),

    /// Draw products uniformly at random
    Sample {
        /// Number of products
        #[arg(short = 'n', long, default_value_t = 10)]
        size: usize,

        /// Allow the same product to be drawn more than once
        #[arg(long)]
        with_replacement: bool,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Number of products per number of selected features
    Distribution,

    /// Fraction of products selecting each feature
    Probabilities,

    /// Write the CNF encoding in DIMACS format
    Dimacs {
        /// Output file (stdout if omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => cli.log_level,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;

    let fm = load_model(&cli.model)?;

    let mut solver_config = SolverConfig::default();
    if let Some(limit) = cli.conflict_limit {
        solver_config = solver_config.with_conflict_limit(limit);
    }
    if let Some(seconds) = cli.time_limit {
        solver_config = solver_config.with_time_limit(time_limit(seconds)?);
    }

    let sat = build_sat_model(&fm);
    log::info!("Encoded model into {} variables and {} clauses", sat.num_vars(), sat.clauses().len());
    let analyzer = SatAnalyzer::with_config(&sat, solver_config);

    match cli.command {
        Commands::Info => {
            let mut kinds: BTreeMap<&str, usize> = BTreeMap::new();
            for rid in fm.relation_ids() {
                *kinds.entry(fm[rid].kind.as_str()).or_default() += 1;
            }
            println!("Root:        {}", fm.name(fm.root()));
            println!("Features:    {}", fm.num_features());
            println!(
                "Leaves:      {}",
                fm.features().filter(|&f| fm.is_leaf(f)).count()
            );
            println!("Relations:   {}", fm.relation_ids().count());
            for (kind, count) in kinds {
                println!("  {:<10} {}", kind, count);
            }
            println!("Constraints: {}", fm.constraints().len());
            println!("Variables:   {}", sat.num_vars());
            println!("Clauses:     {}", sat.clauses().len());
        }

        Commands::Tree => {
            print!("{}", fm.to_display_tree());
        }

        Commands::Valid => {
            if analyzer.is_valid()? {
                println!("✓ Feature model is valid (has at least one product)");
            } else {
                println!("✗ Feature model is void (no products)");
            }
        }

        Commands::Count { bdd } => {
            if bdd {
                let model = BddModel::from_feature_model(&fm);
                println!("Products: {}", model.count_products());
            } else {
                println!("Products: {}", analyzer.count_products()?);
            }
        }

        Commands::Products { limit } => {
            let products = analyzer.products().take(limit.unwrap_or(usize::MAX));
            for product in products {
                println!("{}", product?.join(", "));
            }
        }

        Commands::Core => print_features("Core", &analyzer.core_features()?),

        Commands::Dead => print_features("Dead", &analyzer.dead_features()?),

        Commands::FalseOptional => print_features("False-optional", &analyzer.false_optional_features(&fm)?),

        Commands::Find { bdd } => {
            let product = if bdd {
                BddModel::from_feature_model(&fm).find_product()
            } else {
                analyzer.find_product()?
            };
            match product {
                Some(product) => println!("{}", product.join(", ")),
                None => println!("✗ Feature model is void (no products)"),
            }
        }

        Commands::Check { config, bdd } => {
            let config = configuration(&fm, &config)?;
            log::info!("Checking configuration {}", config);
            let valid = if bdd {
                BddModel::from_feature_model(&fm).is_valid_configuration(&config)?
            } else {
                analyzer.is_valid_configuration(&config)?
            };
            if valid {
                println!("✓ Configuration is valid");
            } else {
                println!("✗ Configuration is invalid");
            }
        }

        Commands::Diagnose(args) => {
            let model = DiagnosisModel::new(&fm, &sat);
            let diagnoser = Diagnoser::with_config(&model, solver_config);
            let (conflict, diagnosis) = if args.features.is_empty() {
                (diagnoser.model_conflict()?, diagnoser.model_diagnosis()?)
            } else {
                let config = configuration(&fm, &args)?;
                (diagnoser.conflict(&config)?, diagnoser.diagnosis(&config)?)
            };
            if conflict.is_empty() {
                println!("✓ Nothing to diagnose: no conflict found");
            } else {
                print_assertions("Minimal conflict", &conflict);
                print_assertions("Minimal diagnosis", &diagnosis);
            }
        }

        Commands::Sample {
            size,
            with_replacement,
            seed,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let model = BddModel::from_feature_model(&fm);
            for product in model.sample(size, with_replacement, &mut rng) {
                println!("{}", product.join(", "));
            }
        }

        Commands::Distribution => {
            let model = BddModel::from_feature_model(&fm);
            println!("Selected features: products");
            for (k, count) in model.product_distribution().iter().enumerate() {
                println!("{:>17}: {}", k, count);
            }
        }

        Commands::Probabilities => {
            let model = BddModel::from_feature_model(&fm);
            for (name, probability) in model.feature_inclusion_probabilities() {
                println!("{:>8.4}  {}", probability, name);
            }
        }

        Commands::Dimacs { output } => match output {
            Some(path) => {
                sat.write_dimacs(BufWriter::new(File::create(&path)?))?;
                log::info!("Wrote DIMACS to {:?}", path);
            }
            None => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                sat.write_dimacs(&mut out)?;
                out.flush()?;
            }
        },
    }

    Ok(())
}

fn time_limit(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds).wrap_err_with(|| format!("invalid time limit: {} seconds", seconds))
}

fn configuration(fm: &FeatureModel, args: &ConfigArgs) -> Result<Configuration> {
    let mut config = Configuration::new();
    for entry in &args.features {
        let entry = entry.trim();
        match entry.strip_prefix('!') {
            Some(name) => config.set(name.trim(), false),
            None if !entry.is_empty() => config.set(entry, true),
            None => {}
        }
    }
    config.set_full(args.full);
    if args.complete {
        config = complete_configuration(&config, fm)?;
    }
    Ok(config)
}

fn print_features(kind: &str, features: &[String]) {
    if features.is_empty() {
        println!("No {} features", kind.to_lowercase());
    } else {
        println!("{} features ({}):", kind, features.len());
        for name in features {
            println!("  {}", name);
        }
    }
}

fn print_assertions(title: &str, assertions: &[Assertion]) {
    println!("{} ({}):", title, assertions.len());
    for assertion in assertions {
        println!("  {}", assertion);
    }
}

//! evpack - deterministic evidence-pack CLI
//!
//! The `evpack` command assembles, digests, verifies and compares evidence
//! packs for agent-lifecycle scenarios.
//!
//! ## Commands
//!
//! - `assemble`: Build a pack from a built-in scenario or a scenario file
//! - `digest`: Recompute integrity files (dry run unless `--write`)
//! - `verify`: Check a pack against its recorded integrity files
//! - `compare`: Emit a cross-substrate equivalence record
//! - `scenarios`: List built-in scenarios

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use uuid::Uuid;

use evpack_core::metrics::METRICS;
use evpack_core::{
    catalog, CommandSource, EquivalenceRecord, InteractionSource, LogicalTimestamp, PackAssembler,
    PackConfig, Scenario, DEFAULT_NAMESPACE,
};

#[derive(Parser)]
#[command(name = "evpack")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic evidence packs for agent lifecycle scenarios", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble an evidence pack and print its root hash
    Assemble {
        /// Built-in scenario name or path to a scenario JSON file
        scenario: String,

        /// Output directory for the pack
        #[arg(short, long, env = "EVPACK_OUT_DIR")]
        out: PathBuf,

        /// UUID namespace for derived identifiers
        #[arg(long, env = "EVPACK_NAMESPACE")]
        namespace: Option<String>,

        /// Logical timestamp written into every artifact (YYYY-MM-DDTHH:MM:SSZ)
        #[arg(long, env = "EVPACK_TIMESTAMP")]
        timestamp: Option<String>,

        /// Protocol version recorded in the manifest
        #[arg(long, default_value = evpack_core::config::DEFAULT_PROTOCOL_VERSION)]
        protocol_version: String,

        /// Resolve responses by running this program with the key as last argument
        #[arg(long)]
        command: Option<PathBuf>,

        /// Skip writing pack_root_hash.txt
        #[arg(long)]
        no_root_hash: bool,
    },

    /// Recompute integrity/sha256sums.txt and the pack root hash
    Digest {
        /// Pack directory
        pack: PathBuf,

        /// Rewrite integrity files instead of a dry run
        #[arg(long)]
        write: bool,
    },

    /// Verify a pack against its recorded integrity files
    Verify {
        /// Pack directory
        pack: PathBuf,
    },

    /// Compare packs of one scenario across substrates
    Compare {
        /// Scenario every pack must declare
        scenario_id: String,

        /// Pack directories
        #[arg(required = true)]
        packs: Vec<PathBuf>,

        /// Write the equivalence record to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List built-in scenarios
    Scenarios,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    evpack_core::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Assemble {
            scenario,
            out,
            namespace,
            timestamp,
            protocol_version,
            command,
            no_root_hash,
        } => {
            let config =
                build_config(namespace.as_deref(), timestamp.as_deref(), &protocol_version)?;
            cmd_assemble(&scenario, &out, config, command.as_deref(), !no_root_hash)
        }
        Commands::Digest { pack, write } => cmd_digest(&pack, write),
        Commands::Verify { pack } => cmd_verify(&pack).await,
        Commands::Compare {
            scenario_id,
            packs,
            output,
        } => cmd_compare(&scenario_id, &packs, output.as_deref()),
        Commands::Scenarios => cmd_scenarios(),
    };

    METRICS.flush();
    result
}

fn build_config(
    namespace: Option<&str>,
    timestamp: Option<&str>,
    protocol_version: &str,
) -> Result<PackConfig> {
    let namespace = match namespace {
        Some(raw) => {
            Uuid::parse_str(raw).with_context(|| format!("Invalid namespace UUID: {raw}"))?
        }
        None => DEFAULT_NAMESPACE,
    };
    let timestamp = match timestamp {
        Some(raw) => raw.parse::<LogicalTimestamp>()?,
        None => LogicalTimestamp::default(),
    };
    Ok(PackConfig::new(namespace, timestamp, protocol_version)?)
}

/// Resolve a built-in scenario name, falling back to a scenario file path.
fn load_scenario(scenario: &str) -> Result<Scenario> {
    if let Some(builtin) = catalog::get(scenario) {
        return Ok(builtin);
    }
    let path = Path::new(scenario);
    if !path.exists() {
        anyhow::bail!(
            "Unknown scenario {:?}: not a built-in ({}) and no such file",
            scenario,
            catalog::names().join(", ")
        );
    }
    Scenario::from_json_file(path).with_context(|| format!("Failed to load scenario {:?}", path))
}

fn cmd_assemble(
    scenario: &str,
    out: &Path,
    config: PackConfig,
    command: Option<&Path>,
    write_root_hash: bool,
) -> Result<()> {
    let scenario = load_scenario(scenario)?;
    let source: Box<dyn InteractionSource> = match command {
        Some(program) => Box::new(CommandSource::new(program)),
        None => Box::new(scenario.response_table()),
    };
    info!("Assembling {} into {:?} using {}", scenario.scenario_id, out, source.describe());

    let pack = PackAssembler::new(config)
        .write_root_hash(write_root_hash)
        .assemble(&scenario, source.as_ref(), out)
        .with_context(|| format!("Failed to assemble pack for {}", scenario.scenario_id))?;

    println!("{}", pack.root_hash());
    Ok(())
}

fn cmd_digest(pack: &Path, write: bool) -> Result<()> {
    let report = evpack_core::recompute(pack, write)
        .with_context(|| format!("Failed to digest pack {:?}", pack))?;

    if !write {
        print!("{}", report.record.to_sums_text());
    }
    println!("pack_root_hash: {}", report.root_hash);
    match report.matches_previous() {
        Some(true) => println!("previous root hash: match"),
        Some(false) => println!(
            "previous root hash: MISMATCH (was {})",
            report.previous.map(|d| d.to_hex()).unwrap_or_default()
        ),
        None => println!("previous root hash: none"),
    }
    if write {
        println!("Wrote integrity files for {} files", report.files);
    }
    Ok(())
}

async fn cmd_verify(pack: &Path) -> Result<()> {
    let report = evpack_core::verify_parallel(pack)
        .await
        .with_context(|| format!("Verification failed for {:?}", pack))?;
    println!(
        "OK {} ({} files, {} events)",
        report.root_hash, report.files, report.events
    );
    Ok(())
}

fn cmd_compare(scenario_id: &str, packs: &[PathBuf], output: Option<&Path>) -> Result<()> {
    let record = EquivalenceRecord::compare(scenario_id, packs)
        .with_context(|| format!("Failed to compare packs for {scenario_id}"))?;
    let rendered = evpack_core::canonical::to_canonical_string(&record)?;

    if let Some(path) = output {
        std::fs::write(path, &rendered)
            .with_context(|| format!("Failed to write equivalence record to {:?}", path))?;
        println!("verdict_match: {}", record.verdict_match);
    } else {
        print!("{rendered}");
    }
    Ok(())
}

fn cmd_scenarios() -> Result<()> {
    for name in catalog::names() {
        println!("{name}");
    }
    Ok(())
}

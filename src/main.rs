use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use epinet::graph::{ContactNetwork, InfectionNetwork, LineageNetwork};
use epinet::lineage::LineageResolver;
use epinet::log::{error, info, init_logging, LevelFilter};
use epinet::report::{write_sequence_export, CountsRow, ReportWriter};
use epinet::{run_sweep, summarize, Dataset, EpinetError, IdentityResolver, SimProperties};

/// Reconstructs an epidemic run's networks and exports from its event data.
#[derive(Parser, Debug)]
#[command(name = "epinet", version)]
struct Cli {
    /// Path to the simulation properties JSON file
    #[arg(short, long)]
    properties: PathBuf,

    /// Directory holding the run's CSV tables
    #[arg(short, long)]
    data_dir: PathBuf,

    /// Directory for the CSV and FASTA exports
    #[arg(short, long, default_value = "output")]
    output_dir: PathBuf,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,
}

fn run(cli: &Cli) -> Result<(), EpinetError> {
    let properties = SimProperties::load(&cli.properties)?;
    info!("Loaded properties for simulation {}", properties.sim_id);

    let dataset = Dataset::load(&cli.data_dir, &properties)?;
    let resolver = IdentityResolver::new(&dataset.participants);

    let summary = summarize(&dataset, &resolver, &properties);
    info!("Total number of participants: {}", summary.participants);
    info!("Total number of cases: {}", summary.cases);
    info!("Total number of deaths: {}", summary.deaths);
    info!("Total number of survivors: {}", summary.survivors);
    info!(
        "Infections with known source: {} (missing: {})",
        summary.known_source, summary.missing_source
    );

    let output = run_sweep(&dataset, &resolver, &properties)?;

    let mut counts_report = ReportWriter::create(&cli.output_dir.join("status_counts.csv"))?;
    for snapshot in &output.snapshots {
        counts_report.send(&CountsRow::new(snapshot.label.clone(), snapshot.counts))?;
    }

    let transmissions: Vec<_> = output
        .snapshots
        .iter()
        .flat_map(|snapshot| snapshot.transmissions.iter().cloned())
        .collect();
    let infection_network =
        InfectionNetwork::build(&resolver, &output.final_board, &transmissions);
    if let Some(r) = infection_network.r_effective() {
        info!(
            "R-effective: {:.3} (std dev {:.3})",
            r.mean, r.std_dev
        );
    }

    let mut contacts = epinet::contact::ContactAggregate::default();
    for snapshot in &output.snapshots {
        for (pair, minutes) in &snapshot.contacts {
            *contacts.entry(*pair).or_insert(0) += minutes;
        }
    }
    let contact_network = ContactNetwork::build(&resolver, &output.final_board, &contacts);
    info!(
        "Contact network: {} vertices, {} edges",
        contact_network.vertex_count(),
        contact_network.edges().len()
    );

    let mut lineage = LineageResolver::new(
        &dataset.reference_sequence,
        properties.pathogen_id,
        dataset.mutations.clone(),
    );
    lineage.resolve_all();
    let lineage_network = LineageNetwork::build(&lineage);
    info!(
        "Lineage network: {} nodes, {} transitions",
        lineage_network.vertex_count(),
        lineage_network.edges().len()
    );
    write_sequence_export(&cli.output_dir.join("sequences.fasta"), &lineage.fasta_lines())?;

    if output.anomalies.total() > 0 {
        info!("Skipped anomalies: {:?}", output.anomalies);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

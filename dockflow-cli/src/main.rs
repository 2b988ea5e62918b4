mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dockflow::prelude::*;
use dockflow::report::CONFIG_ERROR_EXIT_CODE;
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "dockflow",
    version,
    about = "Parallel reverse-docking pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a ligand manifest and a protein source
    Run {
        /// Ligand manifest: one `<identifier> <SMILES>` per line
        #[arg(long)]
        ligands: PathBuf,
        /// Protein source: a directory of .pdb files (custom mode) or a
        /// prebuilt receptor set (prebuilt mode)
        #[arg(long)]
        proteins: PathBuf,
        /// Pipeline mode (custom, prebuilt)
        #[arg(long, default_value = "custom")]
        mode: String,
        /// Docking box size along X, in Angstroms
        #[arg(long)]
        box_x: f64,
        /// Docking box size along Y, in Angstroms
        #[arg(long)]
        box_y: f64,
        /// Docking box size along Z, in Angstroms
        #[arg(long)]
        box_z: f64,
        /// Worker-pool size per stage (default: available cores minus two)
        #[arg(long)]
        workers: Option<usize>,
        /// Docking engine (vina, idock)
        #[arg(long, default_value = "idock")]
        dock_tool: String,
        /// Output root directory
        #[arg(long, default_value = "dockflow-out")]
        out: PathBuf,
        /// Skip items whose output artifacts already exist
        #[arg(long)]
        resume: bool,
        /// Per-item wall-clock limit in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Fail on malformed manifest lines instead of skipping them
        #[arg(long)]
        strict_manifest: bool,
        /// Model file handed to the rescorer
        #[arg(long)]
        rescore_model: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            ligands,
            proteins,
            mode,
            box_x,
            box_y,
            box_z,
            workers,
            dock_tool,
            out,
            resume,
            timeout_secs,
            strict_manifest,
            rescore_model,
        } => {
            let (mode, dock_tool) = match (mode.parse::<RunMode>(), dock_tool.parse::<DockTool>())
            {
                (Ok(mode), Ok(tool)) => (mode, tool),
                (Err(msg), _) | (_, Err(msg)) => {
                    eprintln!("error: {msg}");
                    return config_error_exit();
                }
            };

            let mut config = RunConfig::new(
                ligands,
                proteins,
                mode,
                BoxDims::new(box_x, box_y, box_z),
                out,
            );
            config.worker_count = workers;
            config.dock_tool = dock_tool;
            config.resume = resume;
            if let Some(secs) = timeout_secs {
                config.item_timeout = Duration::from_secs(secs);
            }
            if strict_manifest {
                config.malformed_line = MalformedLinePolicy::Fail;
            }
            config.tools.rescorer_model = rescore_model;

            run(config).await
        }
    }
}

async fn run(config: RunConfig) -> ExitCode {
    let coordinator = RunCoordinator::new(config);
    let report_file = coordinator.layout().report_file();

    // First interrupt stops dispatching new work; in-flight invocations
    // finish or hit their timeout, and the report is still written.
    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping dispatch");
            token.cancel("interrupt");
        }
    });

    match coordinator.run().await {
        Ok(summary) => {
            print_summary(&summary, &report_file);
            exit_code_for(summary.outcome)
        }
        Err(err) => {
            eprintln!("error: {err}");
            config_error_exit()
        }
    }
}

fn print_summary(summary: &RunSummary, report_file: &std::path::Path) {
    println!("run {} ({:?})", summary.run_id, summary.outcome);
    for report in &summary.stage_reports {
        println!(
            "  {:<17} attempted {:>4}  succeeded {:>4}  skipped {:>4}  failed {:>4}",
            report.stage.to_string(),
            report.attempted,
            report.succeeded,
            report.skipped,
            report.failed()
        );
    }
    for report in &summary.stage_reports {
        for failure in &report.failures {
            println!("  failed [{}] {}: {}", report.stage, failure.key, failure.reason);
        }
    }
    if let Some(reason) = &summary.cancelled {
        println!("  cancelled: {reason}");
    }
    println!("  report: {}", report_file.display());
}

fn exit_code_for(outcome: RunOutcome) -> ExitCode {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    ExitCode::from(outcome.exit_code() as u8)
}

fn config_error_exit() -> ExitCode {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    ExitCode::from(CONFIG_ERROR_EXIT_CODE as u8)
}

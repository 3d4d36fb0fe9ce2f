use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error, trace};

use stackalign::cli::Cli;
use stackalign::executor::LocalRunner;
use stackalign::pipeline::AlignmentPipeline;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        2 => "trace",
        _ => "trace,tokio=debug", // -vvv shows everything including dependencies
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2) // Show target module for -vv and above
        .with_thread_ids(cli.verbose >= 3) // Show thread IDs for -vvv
        .with_line_number(cli.verbose >= 3) // Show line numbers for -vvv
        .init();

    debug!("stackalign started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli).await {
        error!("Fatal error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.into_options()?;
    let dry_run = options.execution.dry_run;
    let assemble_volumes = !options.skip.volumes;
    let volume_name = options.volume_name.clone();

    let runner = Arc::new(LocalRunner::new());
    let mut pipeline = AlignmentPipeline::new(options, runner)?;
    pipeline.launch().await?;

    if dry_run {
        return Ok(());
    }
    if assemble_volumes {
        println!(
            "✅ Alignment completed: {}",
            pipeline.layout().volume_gray(&volume_name).display()
        );
        println!(
            "                       {}",
            pipeline.layout().volume_color(&volume_name).display()
        );
    } else {
        println!("✅ Alignment completed");
    }
    Ok(())
}

use profile_matcher_lib::{logger, pipeline, MatcherArgs, MatcherError};
use profile_matcher_lib::pipeline::NoProgress;

use clap::Parser;
use log::{info, error};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Finds LinkedIn profiles for a list of email addresses.",
    long_about = "Reads emails (and optional names) from a CSV, looks each one up on LinkedIn and appends \
                  the result to an output CSV. Emails already in the output are skipped, so an interrupted \
                  run picks up where it left off."
)]
struct Cli {
    #[command(flatten)]
    args: MatcherArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.args.log_file.as_deref());
    info!("Starting profile matcher...");

    match run(&cli.args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Application failed: {}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &MatcherArgs) -> Result<(), MatcherError> {
    let config = args.resolve()?;
    info!(
        "Input: {:?}, output: {:?}, provider: {}",
        config.input_path, config.output_path, config.provider
    );

    let mut provider = config
        .build_provider()
        .map_err(|e| MatcherError::Config(format!("could not create provider: {}", e)))?;

    let summary = pipeline::run_pipeline(&config.pipeline_options(), provider.as_mut(), &NoProgress)?;
    info!(
        "Run finished: {} loaded, {} already processed, {} processed now, {} failed lookups.",
        summary.loaded, summary.already_processed, summary.processed, summary.failed_lookups
    );
    Ok(())
}

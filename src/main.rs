use clap::Parser;
use console::{Style, Term};
use tracing_subscriber::EnvFilter;

use std::error::Error;

mod args;
use crate::commands::*;
use crate::errors::AppError;
use args::*;

mod reporter;

mod common_types;

mod crop_regions;

mod cropper;

mod file_systems;

mod file_tools;

mod errors;

mod commands;

mod recognizers;

mod result_writer;

pub type AppResult<T> = Result<T, AppError>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let term = Term::stdout();
    let bold_style = Style::new().bold();

    term.write_line(
        format!(
            "{} v{}",
            bold_style.clone().green().apply_to("Crop OCR"),
            bold_style.apply_to(env!("CARGO_PKG_VERSION"))
        )
        .as_str(),
    )?;

    let cli = CliArgs::parse();
    if let Err(err) = handle_args(cli, &term).await {
        term.write_line(
            format!(
                "{}: {}\nDetails: {:?}",
                bold_style.clone().red().apply_to("Error"),
                err,
                err.source()
            )
            .as_str(),
        )?;
        std::process::exit(1);
    }

    Ok(())
}

async fn handle_args(cli: CliArgs, term: &Term) -> AppResult<()> {
    let bold_style = Style::new().bold();

    match cli.command {
        CliCommand::Run {
            input,
            output,
            tmp_dir,
            input_args,
            on_error,
            recognizer_args,
        } => {
            let options = RunCommandOptions::new(
                input_args.filename_filter,
                input_args.max_size_limit,
                output.clone(),
                tmp_dir,
                input_args.regions_config,
                on_error,
            );
            let run_result =
                command_run(term, &input, options, recognizer_args.try_into()?).await?;
            term.write_line(
                format!(
                    "{} -> {}\n{} images processed.\n{} files skipped.\n{} images failed.",
                    input,
                    output.to_string_lossy(),
                    bold_style
                        .clone()
                        .green()
                        .apply_to(run_result.files_processed),
                    Style::new().yellow().apply_to(run_result.files_skipped),
                    Style::new().red().apply_to(run_result.files_failed),
                )
                .as_str(),
            )?;
        }
        CliCommand::Ls { input, input_args } => {
            let options = LsCommandOptions::new(
                input_args.filename_filter,
                input_args.max_size_limit,
                input_args.regions_config,
            );
            command_ls(term, &input, options).await?;
        }
    }

    Ok(())
}

//! docnorm: documentation export normalizer
//!
//! - `docnorm check <SOURCE>` reports link integrity without touching anything
//! - `docnorm convert <SOURCE> <TARGET>` writes a sanitized, relinked copy

use anyhow::Result;
use clap::{CommandFactory, Parser};
use docnorm::cli::{Cli, Commands};
use docnorm::config::Config;
use docnorm::output::{ErrorCode, ExitCode, JsonError, JsonOutput, OutputContext};
use docnorm::report::{render_check_report, render_conversion_summary};
use docnorm::schema::CommandSchema;
use docnorm::RunError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Set by the SIGINT handler, polled between files during conversion
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Map an error to an exit code by looking through its cause chain
fn error_to_exit_code(error: &anyhow::Error) -> ExitCode {
    for cause in error.chain() {
        if let Some(run_error) = cause.downcast_ref::<RunError>() {
            return ErrorCode::to_exit_code(ErrorCode::for_run_error(run_error));
        }
        if cause.downcast_ref::<toml::de::Error>().is_some() {
            return ExitCode::InvalidArgument;
        }
        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            return match io_error.kind() {
                std::io::ErrorKind::NotFound => ExitCode::NotFound,
                std::io::ErrorKind::PermissionDenied => ExitCode::PermissionDenied,
                _ => ExitCode::ExternalError,
            };
        }
    }
    ExitCode::GenericError
}

fn report_error(error: &anyhow::Error, command: &str, json: bool) {
    let run_error = error.chain().find_map(|cause| cause.downcast_ref::<RunError>());

    if json {
        let json_error = match run_error {
            Some(run_error) => JsonError::from_run_error(run_error, command),
            None => JsonError::new(ErrorCode::IO_ERROR, format!("{:#}", error), command),
        };
        match json_error.to_json_string() {
            Ok(text) => println!("{}", text),
            Err(_) => eprintln!("Error: {:#}", error),
        }
        return;
    }

    match run_error {
        Some(run_error) => eprint!("{}", run_error.actionable().to_error_message()),
        None => eprintln!("Error: {:#}", error),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[cfg(unix)]
fn install_interrupt_handler() {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    extern "C" fn on_sigint(_: nix::libc::c_int) {
        INTERRUPTED.store(true, Ordering::SeqCst);
    }

    // A second Ctrl-C falls back to the default action and kills the process.
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::SA_RESETHAND,
        SigSet::empty(),
    );
    // SAFETY: the handler only performs an atomic store.
    if let Err(err) = unsafe { sigaction(Signal::SIGINT, &action) } {
        warn!(error = %err, "cannot install SIGINT handler");
    }
}

#[cfg(not(unix))]
fn install_interrupt_handler() {}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command = cli.command.as_ref().map(Commands::name).unwrap_or("docnorm");
    let json = cli.command.as_ref().is_some_and(Commands::json);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            report_error(&e, command, json);
            error_to_exit_code(&e)
        }
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if cli.schema {
        let schema = CommandSchema::generate();
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(ExitCode::Success);
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::InvalidArgument);
    };

    let current_dir = std::env::current_dir()?;
    let mut config = Config::discover(cli.config.as_deref(), &current_dir)?;

    match command {
        Commands::Check {
            source,
            exclude,
            json,
        } => {
            let output_ctx = OutputContext::new(cli.quiet, json);
            config.add_excludes(&exclude);
            let source = pick_path(source, config.source.clone(), "source")?;

            let report = docnorm::check(&source, &config)?;

            if output_ctx.is_json() {
                let output = JsonOutput::new(!report.has_broken_links(), &report, "check");
                output_ctx.print_json(&output.to_json_string()?)?;
            } else {
                output_ctx.print_data(render_check_report(&report))?;
            }

            Ok(if report.has_broken_links() {
                ExitCode::ValidationFailed
            } else {
                ExitCode::Success
            })
        }

        Commands::Convert {
            source,
            target,
            exclude,
            ascii_only,
            dry_run,
            json,
        } => {
            let output_ctx = OutputContext::new(cli.quiet, json);
            config.add_excludes(&exclude);
            if ascii_only {
                config.set_ascii_only();
            }
            let source = pick_path(source, config.source.clone(), "source")?;
            let target = pick_path(target, config.target.clone(), "target")?;

            install_interrupt_handler();
            let summary = docnorm::convert(&source, &target, &config, dry_run, &INTERRUPTED)?;

            let complete = !summary.has_errors() && !summary.interrupted;
            if output_ctx.is_json() {
                let output = JsonOutput::new(complete, &summary, "convert");
                output_ctx.print_json(&output.to_json_string()?)?;
            } else {
                output_ctx.print_data(render_conversion_summary(&summary))?;
                if !summary.dry_run && !summary.interrupted {
                    output_ctx.print_info(format!("\nConverted tree written to {}", summary.target))?;
                }
                if summary.has_errors() {
                    output_ctx.print_warning(format!(
                        "{} file(s) need manual follow-up",
                        summary.errors.len()
                    ))?;
                }
            }

            Ok(if summary.interrupted {
                ExitCode::GenericError
            } else if summary.has_errors() {
                ExitCode::ValidationFailed
            } else {
                ExitCode::Success
            })
        }
    }
}

/// Command-line value first, then the config file.
fn pick_path(
    arg: Option<PathBuf>,
    configured: Option<PathBuf>,
    name: &'static str,
) -> Result<PathBuf, RunError> {
    arg.or(configured).ok_or(RunError::MissingPath(name))
}

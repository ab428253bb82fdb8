mod cli;
mod commands;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use wsh::SessionError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.global.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("wsh: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("wsh: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(commands::shell::execute(cli.shell, &cli.global));
    // The terminal input thread may still be parked in a read; don't wait for it.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

/// Print the failure (the terminal is back in cooked mode by now) and pick
/// the exit status.
fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SessionError>() {
        Some(session_err) => {
            eprintln!("wsh: {}: {}", session_err.stage(), session_err);
            ExitCode::from(u8::try_from(session_err.exit_code()).unwrap_or(1))
        }
        None => {
            eprintln!("wsh: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

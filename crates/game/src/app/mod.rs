mod bootstrap;
mod flight;
mod forest;
mod loop_runner;
mod presentation;
mod script;

use std::process::ExitCode;

use bootstrap::{build_app, init_tracing, parse_args, usage_text, CliRequest};
use tracing::error;

pub(crate) fn run(args: Vec<String>) -> ExitCode {
    let request = match parse_args(&args) {
        Ok(CliRequest::Help) => {
            println!("{}", usage_text());
            return ExitCode::SUCCESS;
        }
        Ok(request) => request,
        Err(err) => {
            eprintln!("{err}\n\n{}", usage_text());
            return ExitCode::from(2);
        }
    };

    init_tracing();
    match build_app(request) {
        Ok(app) => loop_runner::run(app),
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

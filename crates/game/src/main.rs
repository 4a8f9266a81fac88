use std::env;
use std::process::ExitCode;

mod app;

fn main() -> ExitCode {
    app::run(env::args().skip(1).collect())
}

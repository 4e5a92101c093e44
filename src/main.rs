use std::process::ExitCode;

use reshelve::output as out;

mod app;
mod cli;
mod logging;

fn main() -> ExitCode {
    let (args, passthrough) = cli::parse();
    match app::run(args, passthrough) {
        Ok(code) => code,
        Err(e) => {
            out::print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

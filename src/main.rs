use colored::Colorize;
use std::process::ExitCode;

fn main() -> ExitCode {
    match roster::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let err = anyhow::Error::new(e);
            eprintln!("{} {:#}", "error:".bright_red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

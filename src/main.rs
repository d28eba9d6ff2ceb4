use std::env;
use std::process::ExitCode;

use log::error;

use vxsort_codegen::cli::{self, Command};
use vxsort_codegen::generate_all;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let config = match cli::parse_args(env::args().skip(1)) {
        Ok(Command::Generate(config)) => config,
        Ok(Command::Help) => {
            println!("{}", cli::USAGE);
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            error!("{err}");
            eprintln!("\n{}", cli::USAGE);
            return ExitCode::from(2);
        }
    };

    match generate_all(&config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) if err.is_configuration() => {
            error!("{err}, nothing written for it");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

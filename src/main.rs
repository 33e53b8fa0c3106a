use std::process::ExitCode;

#[cfg(feature = "sqlite")]
fn main() -> ExitCode {
    use clap::Parser;
    use regimefolio::cli::{Cli, run};
    use regimefolio::logging;

    let cli = Cli::parse();
    if cli.log_json {
        logging::init_json_logging();
    } else {
        logging::init_logging();
    }
    run(cli)
}

#[cfg(not(feature = "sqlite"))]
fn main() -> ExitCode {
    eprintln!("error: regimefolio was built without the sqlite feature");
    ExitCode::from(1)
}

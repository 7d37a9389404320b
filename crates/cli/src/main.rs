use std::process::ExitCode;

fn main() -> ExitCode {
    pricelens_cli::run()
}

use std::process::ExitCode;

fn main() -> ExitCode {
    lagertool_cli::run()
}

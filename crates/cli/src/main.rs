use std::process::ExitCode;

fn main() -> ExitCode {
    puddle_cli::run()
}

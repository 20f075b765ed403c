use std::process::ExitCode;

fn main() -> ExitCode {
    sekretarz_cli::run()
}

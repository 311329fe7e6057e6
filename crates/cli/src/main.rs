use std::process::ExitCode;

fn main() -> ExitCode {
    pinbot_cli::run()
}

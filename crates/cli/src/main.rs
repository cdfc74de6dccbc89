use std::process::ExitCode;

fn main() -> ExitCode {
    askcrm_cli::run()
}

use std::process::ExitCode;

fn main() -> ExitCode {
    wadjet_cli::run()
}

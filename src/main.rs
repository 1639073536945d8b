use std::process::ExitCode;

fn main() -> ExitCode {
    match buildtree::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

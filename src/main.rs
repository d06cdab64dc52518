use std::process::ExitCode;

fn main() -> ExitCode {
    console_sweep::logging::init_tracing();
    match console_sweep::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

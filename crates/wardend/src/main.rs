use std::process::ExitCode;

#[expect(
    clippy::print_stderr,
    reason = "fatal startup errors must reach the operator before telemetry exists"
)]
fn main() -> ExitCode {
    match wardend::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ERROR: {error}");
            ExitCode::FAILURE
        }
    }
}

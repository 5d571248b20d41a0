//! Command-line entrypoint for the Warden administration tool.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    warden_admin::run(std::env::args_os(), &mut stdout, &mut stderr)
}

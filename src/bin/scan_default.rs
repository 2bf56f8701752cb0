//! Full scan of `../put-mc-world-db-here/db` using only the engine's built-in
//! codecs and allocation behaviour.

use std::process::ExitCode;

use ldb_scan_bench::scan::exit_status;
use ldb_scan_bench::ScanConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    exit_status(&ScanConfig::engine_default())
}

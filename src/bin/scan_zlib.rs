//! Full scan of `../put-mc-world-db-here/db` with Bedrock's codecs registered:
//! raw deflate as the writer, zlib kept for older blocks, and one reused
//! inflate state per codec.
//!
//! Do not interrupt a run: with log reuse enabled a killed process may leave a
//! damaged write-ahead log behind.

use std::process::ExitCode;

use ldb_scan_bench::scan::exit_status;
use ldb_scan_bench::ScanConfig;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    exit_status(&ScanConfig::zlib())
}

//! The benchmark loop: walk every entry once, checksum it, report.

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use log::{error, info};

use crate::checksum::Tally;
use crate::leveldb::LevelDbStore;
use crate::store::Store;
use crate::{Result, ScanConfig, ScanError};

/// Totals of a completed scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanSummary {
    pub entries: u32,
    pub checksum: u32,
    /// Key plus value bytes visited
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Scans `store` from its first key to its last, writing progress lines and the
/// final summary line to `out`.
///
/// Output is `<N> entries` before every `progress_interval`-th entry, starting
/// with entry 0, then `<total> total entries; crc32c: <checksum>`. If the cursor
/// stops because the store detected an error, no summary line is written and
/// [`ScanError::Iteration`] is returned.
pub fn run_scan<S, W>(store: &mut S, config: &ScanConfig, out: &mut W) -> Result<ScanSummary>
where
    S: Store + ?Sized,
    W: Write,
{
    let mut cursor = store
        .cursor(&config.read_options())
        .map_err(ScanError::Cursor)?;

    let started = Instant::now();
    let mut tally = Tally::new();

    cursor.seek_to_first();
    while cursor.valid() {
        if tally.entries().checked_rem(config.progress_interval) == Some(0) {
            writeln!(out, "{} entries", tally.entries())?;
        }
        tally.record(cursor.key(), cursor.value());
        cursor.next();
    }

    cursor.status().map_err(|source| ScanError::Iteration {
        entries: tally.entries(),
        source,
    })?;
    drop(cursor);

    writeln!(
        out,
        "{} total entries; crc32c: {}",
        tally.entries(),
        tally.checksum()
    )?;
    out.flush()?;

    let summary = ScanSummary {
        entries: tally.entries(),
        checksum: tally.checksum(),
        bytes: tally.bytes(),
        elapsed: started.elapsed(),
    };
    log_throughput(&summary);
    Ok(summary)
}

fn log_throughput(summary: &ScanSummary) {
    let secs = summary.elapsed.as_secs_f64();
    if secs > 0.0 {
        info!(
            "scanned {} entries ({} bytes) in {:.3}s: {:.0} entries/s, {:.2} MiB/s",
            summary.entries,
            summary.bytes,
            secs,
            f64::from(summary.entries) / secs,
            summary.bytes as f64 / secs / (1 << 20) as f64
        );
    } else {
        info!("scanned {} entries ({} bytes)", summary.entries, summary.bytes);
    }
}

/// Opens the database named by `config` and scans it to stdout.
///
/// The store is released when this returns, whichever way it returns.
pub fn run(config: &ScanConfig) -> Result<ScanSummary> {
    info!("benchmark config: {:?}", config);

    let mut store =
        LevelDbStore::open(&config.db_path, config).map_err(|source| ScanError::Open {
            path: config.db_path.clone(),
            source,
        })?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = run_scan(&mut store, config, &mut out)?;

    let health = store.codec_health();
    if health.blocks_decoded() > 0 {
        info!("decoded {} compressed blocks", health.blocks_decoded());
    }
    Ok(summary)
}

/// Runs a benchmark variant and turns the outcome into the process exit status.
pub fn exit_status(config: &ScanConfig) -> ExitCode {
    match run(config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

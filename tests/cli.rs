//! Runs the benchmark binaries against databases laid out the way they expect:
//! the working directory is a sibling of `put-mc-world-db-here/db`.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::Result;
use ldb_scan_bench::checksum::Tally;
use ldb_scan_bench::leveldb::LevelDbStore;
use ldb_scan_bench::ScanConfig;
use rusty_leveldb::compressor::SnappyCompressor;
use rusty_leveldb::{CompressorId, Options, DB};
use tempfile::TempDir;

struct World {
    root: TempDir,
}

impl World {
    fn new() -> Result<Self> {
        let root = TempDir::new()?;
        fs::create_dir(root.path().join("bench"))?;
        Ok(World { root })
    }

    fn db_path(&self) -> PathBuf {
        self.root.path().join("put-mc-world-db-here").join("db")
    }

    fn workdir(&self) -> PathBuf {
        self.root.path().join("bench")
    }

    fn seed(&self, config: &ScanConfig, entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        fs::create_dir_all(self.db_path())?;
        let mut store = LevelDbStore::create(self.db_path(), config)?;
        for (key, value) in entries {
            store.put(key, value)?;
        }
        store.flush()?;
        Ok(())
    }

    fn run(&self, binary: &str) -> Result<Output> {
        Ok(Command::new(binary)
            .current_dir(self.workdir())
            .env_remove("RUST_LOG")
            .output()?)
    }
}

fn entries(count: u32) -> BTreeMap<Vec<u8>, Vec<u8>> {
    (0..count)
        .map(|i| {
            let key = format!("chunk:{:04}:{:04}", i % 97, i).into_bytes();
            let value = format!("block data {} {}", i, "#".repeat((i % 50) as usize)).into_bytes();
            (key, value)
        })
        .collect()
}

fn expected_checksum(entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> u32 {
    let mut tally = Tally::new();
    for (key, value) in entries {
        tally.record(key, value);
    }
    tally.checksum()
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

const SCAN_ZLIB: &str = env!("CARGO_BIN_EXE_scan-zlib");
const SCAN_DEFAULT: &str = env!("CARGO_BIN_EXE_scan-default");

#[test]
fn test_missing_database_exits_with_one() -> Result<()> {
    let world = World::new()?;

    for binary in [SCAN_ZLIB, SCAN_DEFAULT] {
        let output = world.run(binary)?;
        assert_eq!(output.status.code(), Some(1));
        assert!(output.stdout.is_empty());
    }
    assert!(!world.root.path().join("put-mc-world-db-here").exists());
    Ok(())
}

#[test]
fn test_zlib_scan_output_and_checksum() -> Result<()> {
    let world = World::new()?;
    let data = entries(25_000);
    world.seed(&ScanConfig::zlib(), &data)?;

    let output = world.run(SCAN_ZLIB)?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout_lines(&output),
        vec![
            "0 entries".to_string(),
            "10000 entries".to_string(),
            "20000 entries".to_string(),
            format!("25000 total entries; crc32c: {}", expected_checksum(&data)),
        ]
    );
    Ok(())
}

#[test]
fn test_repeated_runs_agree() -> Result<()> {
    let world = World::new()?;
    let data = entries(3_000);
    world.seed(&ScanConfig::zlib(), &data)?;

    let first = world.run(SCAN_ZLIB)?;
    let second = world.run(SCAN_ZLIB)?;

    assert_eq!(first.status.code(), Some(0));
    assert_eq!(second.status.code(), Some(0));
    assert_eq!(first.stdout, second.stdout);
    Ok(())
}

#[test]
fn test_default_variant() -> Result<()> {
    let world = World::new()?;
    let data = entries(500);
    world.seed(&ScanConfig::engine_default(), &data)?;

    let output = world.run(SCAN_DEFAULT)?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout_lines(&output).last().map(String::as_str),
        Some(format!("500 total entries; crc32c: {}", expected_checksum(&data)).as_str())
    );
    Ok(())
}

#[test]
fn test_empty_database() -> Result<()> {
    let world = World::new()?;
    world.seed(&ScanConfig::zlib(), &BTreeMap::new())?;

    let output = world.run(SCAN_ZLIB)?;

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_lines(&output), vec!["0 total entries; crc32c: 0"]);
    Ok(())
}

#[test]
fn test_locked_database_exits_with_one() -> Result<()> {
    let world = World::new()?;
    world.seed(&ScanConfig::zlib(), &entries(10))?;

    let _held = LevelDbStore::open(world.db_path(), &ScanConfig::zlib())?;
    let output = world.run(SCAN_ZLIB)?;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn test_relative_path_is_resolved_from_working_directory() -> Result<()> {
    let world = World::new()?;
    world.seed(&ScanConfig::zlib(), &entries(5))?;

    let elsewhere = world.root.path().join("bench").join("nested");
    fs::create_dir(&elsewhere)?;
    let output = Command::new(SCAN_ZLIB).current_dir(&elsewhere).output()?;

    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

#[test]
fn test_unreadable_blocks_exit_with_three() -> Result<()> {
    let world = World::new()?;
    fs::create_dir_all(world.db_path())?;
    {
        let options = Options {
            compressor: SnappyCompressor::ID,
            ..Options::default()
        };
        let mut db = DB::open(world.db_path(), options)?;
        for (key, value) in &entries(2_000) {
            db.put(key, value)?;
        }
        db.flush()?;
    }

    let output = world.run(SCAN_ZLIB)?;

    assert_eq!(output.status.code(), Some(3));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("total entries"));

    let output = world.run(SCAN_DEFAULT)?;
    assert_eq!(output.status.code(), Some(0));
    Ok(())
}

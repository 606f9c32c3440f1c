//! Shared test helpers for cms-seed integration tests.
//!
//! All tests use temp directories and the file-backed local store; nothing
//! touches a real CMS. Environment variables that would redirect the binary
//! (`CMS_SEED_URL`, `CMS_SEED_TOKEN`, ...) are cleared for every run.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use cms_seed::model::SeedDataset;
use serde_json::Value;
use tempfile::TempDir;

/// The sample marketing-site dataset shipped in `demos/`.
pub const SAMPLE_DATASET: &str = include_str!("../../demos/seed-data.json");

/// Parsed sample dataset.
pub fn sample() -> SeedDataset {
    SeedDataset::from_json(SAMPLE_DATASET).expect("sample dataset should parse")
}

/// Parse a dataset literal.
pub fn dataset(value: &Value) -> SeedDataset {
    SeedDataset::from_json(&value.to_string()).expect("dataset literal should parse")
}

/// A scratch project directory: dataset file, store file, state file.
pub struct Project {
    dir: TempDir,
}

impl Project {
    /// Fresh project holding the sample dataset at `data/seed-data.json`.
    pub fn new() -> Self {
        let project = Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        };
        project.write("data/seed-data.json", SAMPLE_DATASET);
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Default local store file.
    pub fn store_path(&self) -> PathBuf {
        self.path().join(".cms-seed").join("store.json")
    }

    /// Write a file relative to the project root.
    pub fn write(&self, rel_path: &str, content: &str) {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
    }

    /// Replace the dataset file.
    pub fn write_dataset(&self, value: &Value) {
        self.write("data/seed-data.json", &serde_json::to_string_pretty(value).unwrap());
    }

    /// The local store file as JSON.
    pub fn store_json(&self) -> Value {
        let text = std::fs::read_to_string(self.store_path()).expect("store file should exist");
        serde_json::from_str(&text).expect("store file should be JSON")
    }

    pub fn run(&self, args: &[&str]) -> Output {
        cms_seed_in(self.path(), args)
    }

    pub fn ok(&self, args: &[&str]) -> String {
        cms_seed_ok(self.path(), args)
    }

    pub fn fails(&self, args: &[&str]) -> String {
        cms_seed_fails(self.path(), args)
    }
}

/// Run cms-seed with the given args in the given directory.
pub fn cms_seed_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cms-seed"))
        .args(args)
        .current_dir(dir)
        .env_remove("CMS_SEED_URL")
        .env_remove("CMS_SEED_TOKEN")
        .env_remove("CMS_SEED_LOG_FORMAT")
        .env("CMS_SEED_LOG", "warn")
        .output()
        .expect("failed to execute cms-seed")
}

/// Run cms-seed and assert it succeeds. Returns stdout as string.
pub fn cms_seed_ok(dir: &Path, args: &[&str]) -> String {
    let out = cms_seed_in(dir, args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        out.status.success(),
        "cms-seed {} failed:\nstdout: {stdout}\nstderr: {stderr}",
        args.join(" "),
    );
    stdout.to_string()
}

/// Run cms-seed and assert it fails. Returns stderr as string.
pub fn cms_seed_fails(dir: &Path, args: &[&str]) -> String {
    let out = cms_seed_in(dir, args);
    assert!(
        !out.status.success(),
        "Expected cms-seed {} to fail, but it succeeded.\nstdout: {}",
        args.join(" "),
        String::from_utf8_lossy(&out.stdout),
    );
    String::from_utf8_lossy(&out.stderr).to_string()
}

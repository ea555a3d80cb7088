#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// An isolated home, data dir and working directory for one test.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        for sub in ["home", "data", "config", "work"] {
            fs::create_dir_all(dir.path().join(sub))?;
        }
        Ok(Self { dir })
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    pub fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Store used by [`TestEnv::todo`].
    pub fn store(&self) -> PathBuf {
        self.dir.path().join("todos.json")
    }

    pub fn store_json(&self) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(self.store())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn write_config(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let dir = self.config_dir().join("todo");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("config.toml"), content)?;
        Ok(())
    }

    /// `todo` with no store selection: scope resolution is up to the binary.
    pub fn bare(&self) -> Command {
        self.bare_in(&self.work())
    }

    pub fn bare_in(&self, cwd: &Path) -> Command {
        let mut cmd = Command::cargo_bin("todo").expect("todo binary");
        cmd.current_dir(cwd)
            .env("HOME", self.home())
            .env("XDG_DATA_HOME", self.data_dir())
            .env("XDG_CONFIG_HOME", self.config_dir())
            .env("NO_COLOR", "1")
            .env_remove("TODO_DB_PATH")
            .env_remove("TODO_CONFIG")
            .env_remove("RUST_LOG")
            .env_remove("VISUAL")
            .env_remove("EDITOR");
        cmd
    }

    /// `todo -f <format> -p <store>`.
    pub fn formatted(&self, format: &str) -> Command {
        let mut cmd = self.bare();
        cmd.arg("-f").arg(format).arg("-p").arg(self.store());
        cmd
    }

    pub fn todo(&self) -> Command {
        self.formatted("plain")
    }

    pub fn json(&self) -> Command {
        self.formatted("json")
    }

    /// Run a command that must succeed and return its stdout.
    pub fn run(&self, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
        let output = self.todo().args(args).assert().success().get_output().clone();
        Ok(String::from_utf8(output.stdout)?)
    }

    /// Plain pending listing.
    pub fn list(&self, args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
        let mut full = vec!["list"];
        full.extend_from_slice(args);
        self.run(&full)
    }
}

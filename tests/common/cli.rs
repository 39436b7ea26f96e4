//! Helpers for running the `pgjsonl` binary in a scratch directory.

use std::fs;
use std::path::PathBuf;
use std::process::ExitStatus;

use assert_cmd::Command;
use tempfile::TempDir;

/// Connection variables cleared before every run so the host environment
/// never leaks into a test.
const PG_ENV: [&str; 5] = ["PGHOST", "PGPORT", "PGDATABASE", "PGUSER", "PGPASSWORD"];

pub struct PgWorkspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl PgWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    /// Write `{table}.jsonl` under `dir` (relative to the workspace root).
    pub fn write_jsonl(&self, dir: &str, table: &str, lines: &[&str]) -> PathBuf {
        let dir = self.root.join(dir);
        fs::create_dir_all(&dir).expect("create input dir");
        let path = dir.join(format!("{table}.jsonl"));
        let mut body = lines.join("\n");
        body.push('\n');
        fs::write(&path, body).expect("write jsonl");
        path
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

pub struct RunOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

pub fn pgjsonl_command(workspace: &PgWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("pgjsonl").expect("pgjsonl binary");
    cmd.current_dir(&workspace.root);
    for var in PG_ENV {
        cmd.env_remove(var);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn run_pgjsonl<I, S>(workspace: &PgWorkspace, args: I, label: &str) -> RunOutput
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let output = pgjsonl_command(workspace)
        .args(args)
        .output()
        .expect("run pgjsonl");
    let result = RunOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    if !result.status.success() {
        eprintln!("[{label}] stderr:\n{}", result.stderr);
    }
    result
}

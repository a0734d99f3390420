#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use std::path::Path;
use std::time::Duration;

#[allow(dead_code)]
pub const CMD_TIMEOUT: Duration = Duration::from_secs(60);

/// Tiny PNG signature followed by filler, enough for MIME sniffing.
#[allow(dead_code)]
pub const SAMPLE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nsample";

/// Credential variables that must not leak in from the developer's shell.
const CREDENTIAL_VARS: [&str; 5] = [
    "GEMINI_API_KEY",
    "GOOGLE_SEARCH_API_KEY",
    "GOOGLE_SEARCH_ENGINE_ID",
    "COLORPAGE_STORAGE_BUCKET",
    "COLORPAGE_STORAGE_TOKEN",
];

/// Create an offline `colorpage` command rooted at `root`.
///
/// Writes an empty config file and a sample asset under `root`, points every
/// directory override there and disables the page delay.
#[allow(dead_code)]
pub fn colorpage_cmd(root: &Path) -> Command {
    let config = root.join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "").expect("failed to write test config");
    }
    let assets = root.join("assets");
    std::fs::create_dir_all(&assets).expect("failed to create assets dir");
    std::fs::write(assets.join("도라에몽_test.png"), SAMPLE_PNG).expect("failed to write sample");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("colorpage"));
    cmd.timeout(CMD_TIMEOUT);
    cmd.current_dir(root);
    for var in CREDENTIAL_VARS {
        cmd.env_remove(var);
    }
    cmd.env("COLORPAGE_CONFIG", &config);
    cmd.env("COLORPAGE_ASSETS_DIR", &assets);
    cmd.env("COLORPAGE_DOWNLOAD_DIR", root.join("downloads"));
    cmd.env("COLORPAGE_PAGE_DELAY_MS", "0");
    cmd.env("NO_COLOR", "1");
    cmd
}

/// The single file in `dir` whose name starts with `prefix`.
#[allow(dead_code)]
pub fn find_file(dir: &Path, prefix: &str) -> std::path::PathBuf {
    let mut matches: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    assert_eq!(matches.len(), 1, "expected one {prefix}* in {}", dir.display());
    matches.remove(0)
}

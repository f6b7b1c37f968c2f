use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let workspace = Workspace { dir };
        workspace.write_config();
        workspace
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config_path(&self) -> PathBuf {
        self.path().join("pkgcat.toml")
    }

    fn write_config(&self) {
        let config = format!(
            r#"[daily]
bits = 0
window_days = 2

[index]
dir = "{root}/repodata"
repos = ["current", "current/aarch64"]

[store.live]
backend = "sqlite"
path = "{root}/pkgcat.db"

[store.build]
backend = "sqlite"
path = "{root}/pkgcat.db.new"
"#,
            root = self.path().display()
        );
        fs::write(self.config_path(), config).expect("failed to write config");
    }

    fn write_index(&self, repo: &str, content: serde_json::Value) {
        let dir = self.path().join("repodata").join(repo);
        fs::create_dir_all(&dir).expect("failed to create repo dir");
        fs::write(dir.join("index.json"), content.to_string()).expect("failed to write index");
    }

    fn seed(&self) {
        self.write_index(
            "current",
            serde_json::json!({
                "xbps": {"pkgver": "xbps-0.59.2_1", "build-date": "2024-02-20 10:00 UTC"},
                "zstd": {"pkgver": "zstd-1.5.5_1", "build-date": "2024-02-25 08:30 UTC"},
                "base-system": {
                    "pkgver": "base-system-0.114_1",
                    "build-date": "2024-01-01 00:00 UTC",
                    "installed_size": 0
                },
            }),
        );
        self.write_index(
            "current/aarch64",
            serde_json::json!({
                "xbps": {"pkgver": "xbps-0.59.2_1", "build-date": "2024-02-21 11:00 UTC"},
            }),
        );
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_pkgcat"))
            .current_dir(self.path())
            .env_remove("PKGCAT_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config_path())
            .args(args)
            .output()
            .expect("failed to run pkgcat")
    }

    fn stdout(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "pkgcat {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).expect("stdout is not utf-8")
    }
}

fn lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

#[test]
fn queries_fail_before_first_build() {
    let workspace = Workspace::new();
    let output = workspace.run(&["list"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("run `pkgcat build` first"), "{stderr}");
}

#[test]
fn build_then_query() {
    let workspace = Workspace::new();
    workspace.seed();

    let build = workspace.stdout(&["build", "--date", "2024-02-27"]);
    assert!(build.contains("current: 3 packages"), "{build}");
    assert!(build.contains("published 4 packages"), "{build}");
    assert!(workspace.path().join("pkgcat.db").exists());

    assert_eq!(
        lines(&workspace.stdout(&["list"])),
        vec!["base-system", "xbps", "zstd"]
    );
    assert_eq!(
        lines(&workspace.stdout(&["newest", "-n", "2"])),
        vec!["zstd", "xbps"]
    );
    assert_eq!(
        lines(&workspace.stdout(&["daily", "--date", "2024-02-28"])),
        vec!["base-system", "xbps", "zstd"]
    );
    assert!(workspace
        .stdout(&["daily", "--date", "2024-03-10"])
        .is_empty());
    assert_eq!(lines(&workspace.stdout(&["search", "std"])), vec!["zstd"]);
    assert_eq!(
        lines(&workspace.stdout(&["longest", "-n", "2"])),
        vec!["base-system"]
    );

    let show = workspace.stdout(&["show", "xbps", "--repo", "current/aarch64"]);
    assert_eq!(
        lines(&show),
        vec!["xbps xbps-0.59.2_1 [aarch64] repo=current/aarch64 built=2024-02-21 11:00 UTC"]
    );
}

#[test]
fn enrichment_is_visible_to_later_queries() {
    let workspace = Workspace::new();
    workspace.seed();
    workspace.stdout(&["build", "--date", "2024-02-27"]);

    let updated = workspace.stdout(&["set-upstream", "xbps", "0.60"]);
    assert!(updated.contains("updated 2 rows of xbps"), "{updated}");
    workspace.stdout(&["set-depends", "base-system", "12"]);

    let show = workspace.stdout(&["show", "xbps"]);
    assert!(lines(&show).iter().all(|line| line.contains("upstream=0.60")), "{show}");
    assert_eq!(
        lines(&workspace.stdout(&["metapackages"])),
        vec!["base-system"]
    );

    let missing = workspace.run(&["set-upstream", "emacs", "29"]);
    assert!(!missing.status.success());
}

#[test]
fn show_unknown_package_fails() {
    let workspace = Workspace::new();
    workspace.seed();
    workspace.stdout(&["build", "--date", "2024-02-27"]);
    let output = workspace.run(&["show", "emacs"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("package not found: emacs"));
}

#[test]
fn config_prints_effective_settings() {
    let workspace = Workspace::new();
    let config = workspace.stdout(&["config"]);
    assert!(config.contains("bits = 0"), "{config}");
    assert!(config.contains("window_days = 2"), "{config}");
}

//! Whole-run integration tests.
//!
//! These drive `MirrorRunner` against a real catalog file in a temporary
//! work directory, with a mock origin serving index archives and artifacts.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use pacyard_core::{
    config::load_config_from_str,
    download::signature_url,
    testing::{fixtures, MockDownloader},
    MirrorCatalog, MirrorRunner,
};

const MIRROR_A: &str = "https://a.example/$repo/os/$arch";
const MIRROR_B: &str = "https://b.example/archlinux/$repo/os/$arch";
const BASE_A: &str = "https://a.example/core/os/x86_64";
const BASE_B: &str = "https://b.example/archlinux/core/os/x86_64";
const TODAY: i64 = 19800;

struct TestHarness {
    work: TempDir,
    downloader: Arc<MockDownloader>,
    runner: MirrorRunner,
}

impl TestHarness {
    fn new(keep: u32, servers: &[&str]) -> Self {
        let work = TempDir::new().expect("Failed to create temp dir");
        let servers: Vec<String> = servers.iter().map(|s| format!("\"{}\"", s)).collect();
        let toml = format!(
            r#"
[options]
arch = "x86_64"
num_versions_to_keep = {}

[paths]
work_dir = "{}"

[repos.core]
servers = [{servers}]

[repos.extra]
servers = [{servers}]
"#,
            keep,
            work.path().display(),
            servers = servers.join(", ")
        );
        let config = load_config_from_str(&toml).expect("Failed to parse config");
        let downloader = Arc::new(MockDownloader::new());
        let runner =
            MirrorRunner::open(config, downloader.clone()).expect("Failed to open mirror");

        Self {
            work,
            downloader,
            runner,
        }
    }

    /// Write the core package list of one reference machine and import it.
    fn install(&self, names: &[&str]) {
        self.install_in("core", names);
    }

    fn install_in(&self, repo: &str, names: &[&str]) {
        let mut text = names.join("\n");
        text.push('\n');
        let list = format!("packages_{}_desktop.txt", repo);
        std::fs::write(self.work.path().join(list), text).unwrap();
        self.runner.import().expect("Import failed");
    }

    /// Serve the core index and all its artifacts with signatures under `base`.
    fn publish(&self, base: &str, entries: &[fixtures::IndexEntry]) {
        self.publish_repo(base, "core", entries);
    }

    fn publish_repo(&self, base: &str, repo: &str, entries: &[fixtures::IndexEntry]) {
        self.downloader.add_file(
            &format!("{}/{}.db.tar.gz", base, repo),
            fixtures::index_archive(entries).unwrap(),
        );
        for e in entries {
            let url = format!("{}/{}", base, e.filename);
            self.downloader.add_file(&url, e.filename.as_bytes().to_vec());
            self.downloader.add_file(&signature_url(&url), b"sig".to_vec());
        }
    }

    fn repo_dir(&self) -> std::path::PathBuf {
        self.work.path().join("core")
    }

    /// Catalog filenames and repo directory listing, both sorted.
    fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        let mut rows: Vec<String> = self
            .runner
            .catalog()
            .list_mirrored_files()
            .unwrap()
            .into_iter()
            .map(|f| f.filename)
            .collect();
        rows.sort();
        (rows, list_dir(&self.repo_dir()))
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_mirrors_installed_packages_with_signatures() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo", "bar"]);
    h.publish(
        BASE_A,
        &[
            fixtures::entry("foo-1.pkg", "foo", 100),
            fixtures::entry("bar-1.pkg", "bar", 100),
            fixtures::entry("baz-1.pkg", "baz", 100),
        ],
    );

    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.files.new_rows, 2);
    assert_eq!(report.files.not_installed, 1);
    assert_eq!(
        h.snapshot(),
        (
            strings(&["bar-1.pkg", "foo-1.pkg"]),
            strings(&[
                "bar-1.pkg",
                "bar-1.pkg.sig",
                "foo-1.pkg",
                "foo-1.pkg.sig"
            ])
        )
    );
    assert!(list_dir(&h.work.path().join("tmp")).is_empty());
}

#[tokio::test]
async fn test_second_run_without_remote_changes_is_a_no_op() {
    let h = TestHarness::new(2, &[MIRROR_A]);
    h.install(&["foo", "bar"]);
    h.publish(
        BASE_A,
        &[
            fixtures::entry("foo-1.pkg", "foo", 100),
            fixtures::entry("foo-2.pkg", "foo", 200),
            fixtures::entry("foo-3.pkg", "foo", 300),
            fixtures::entry("bar-1.pkg", "bar", 100),
        ],
    );
    h.downloader.set_last_modified(
        &format!("{}/core.db.tar.gz", BASE_A),
        "Mon, 01 Jan 2024 00:00:00 GMT",
    );

    h.runner.run(TODAY).await.unwrap();
    let first = h.snapshot();
    h.downloader.clear_recorded();

    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(h.snapshot(), first);
    assert_eq!(report.mirrors_unchanged, 1);
    assert_eq!(report.pruned_builds, 0);
    assert_eq!(report.orphan_files, 0);
    assert_eq!(h.downloader.download_count(), 0);
}

#[tokio::test]
async fn test_retention_keeps_newest_builds() {
    let h = TestHarness::new(2, &[MIRROR_A]);
    h.install(&["foo"]);
    h.publish(
        BASE_A,
        &[
            fixtures::entry("foo-1.pkg", "foo", 100),
            fixtures::entry("foo-2.pkg", "foo", 200),
            fixtures::entry("foo-3.pkg", "foo", 300),
        ],
    );

    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.pruned_builds, 1);
    let (rows, files) = h.snapshot();
    assert_eq!(rows, strings(&["foo-2.pkg", "foo-3.pkg"]));
    assert!(!files.contains(&"foo-1.pkg".to_string()));
    assert!(!files.contains(&"foo-1.pkg.sig".to_string()));
}

#[tokio::test]
async fn test_older_build_is_not_fetched_once_cap_is_full() {
    let h = TestHarness::new(1, &[MIRROR_A]);
    h.install(&["foo"]);
    h.publish(BASE_A, &[fixtures::entry("foo-2.pkg", "foo", 200)]);
    h.runner.run(TODAY).await.unwrap();

    // The mirror now also lists an older build.
    h.publish(
        BASE_A,
        &[
            fixtures::entry("foo-1.pkg", "foo", 100),
            fixtures::entry("foo-2.pkg", "foo", 200),
        ],
    );
    h.downloader.clear_recorded();
    let report = h.runner.run(TODAY).await.unwrap();

    // Both builds count the kept foo-2 as at least as new.
    assert_eq!(report.files.not_new_enough, 2);
    assert!(!h
        .downloader
        .downloaded_urls()
        .contains(&format!("{}/foo-1.pkg", BASE_A)));
    assert_eq!(h.snapshot().0, strings(&["foo-2.pkg"]));
}

#[tokio::test]
async fn test_orphan_file_is_deleted() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo"]);
    h.publish(BASE_A, &[fixtures::entry("foo-1.pkg", "foo", 100)]);
    std::fs::write(h.repo_dir().join("bar-1.pkg"), b"left over").unwrap();

    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.orphan_files, 1);
    assert!(!h.repo_dir().join("bar-1.pkg").exists());
    assert!(h.repo_dir().join("foo-1.pkg").exists());
}

#[tokio::test]
async fn test_row_without_file_is_dropped_before_sync() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo"]);
    h.publish(BASE_A, &[fixtures::entry("foo-1.pkg", "foo", 100)]);
    h.runner.run(TODAY).await.unwrap();

    std::fs::remove_file(h.repo_dir().join("foo-1.pkg")).unwrap();
    // A changed index brings the artifact back.
    h.publish(
        BASE_A,
        &[
            fixtures::entry("foo-1.pkg", "foo", 100),
            fixtures::entry("bar-1.pkg", "bar", 100),
        ],
    );
    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.rows_without_file, 1);
    assert_eq!(report.files.new_rows, 1);
    assert!(h.repo_dir().join("foo-1.pkg").exists());
    assert_eq!(h.snapshot().0, strings(&["foo-1.pkg"]));
}

#[tokio::test]
async fn test_index_download_failure_leaves_state_untouched() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo"]);
    h.publish(BASE_A, &[fixtures::entry("foo-1.pkg", "foo", 100)]);
    h.runner.run(TODAY).await.unwrap();
    let before = h.snapshot();
    let markers_before = h.runner.catalog().stats().unwrap();

    h.downloader.set_offline(true);
    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.mirrors_failed, 1);
    assert_eq!(h.snapshot(), before);
    assert_eq!(h.runner.catalog().stats().unwrap(), markers_before);
}

#[tokio::test]
async fn test_identical_index_from_second_mirror_is_not_parsed() {
    let h = TestHarness::new(3, &[MIRROR_A, MIRROR_B]);
    h.install(&["foo"]);
    let entries = [fixtures::entry("foo-1.pkg", "foo", 100)];
    h.publish(BASE_A, &entries);
    h.publish(BASE_B, &entries);
    h.downloader.set_last_modified(
        &format!("{}/core.db.tar.gz", BASE_B),
        "some other timestamp",
    );

    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.mirrors, 2);
    assert_eq!(report.mirrors_known_index, 1);
    assert_eq!(report.files.new_rows, 1);
    assert!(!h
        .downloader
        .downloaded_urls()
        .iter()
        .any(|url| url.starts_with(BASE_B) && url.contains(".pkg")));
}

#[tokio::test]
async fn test_failed_mirror_falls_through_to_next() {
    let h = TestHarness::new(3, &[MIRROR_A, MIRROR_B]);
    h.install(&["foo"]);
    h.publish(BASE_B, &[fixtures::entry("foo-1.pkg", "foo", 100)]);

    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.mirrors_failed, 1);
    assert_eq!(report.files.new_rows, 1);
    assert_eq!(h.snapshot().0, strings(&["foo-1.pkg"]));
}

#[tokio::test]
async fn test_uninstalled_package_is_removed_on_next_run() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo", "bar"]);
    h.publish(
        BASE_A,
        &[
            fixtures::entry("foo-1.pkg", "foo", 100),
            fixtures::entry("bar-1.pkg", "bar", 100),
        ],
    );
    h.runner.run(TODAY).await.unwrap();

    h.install(&["bar"]);
    h.runner.run(TODAY).await.unwrap();

    assert_eq!(
        h.snapshot(),
        (strings(&["bar-1.pkg"]), strings(&["bar-1.pkg", "bar-1.pkg.sig"]))
    );
}

#[tokio::test]
async fn test_build_date_order_does_not_matter() {
    // Filenames are planned in sorted order, so each assignment of build
    // dates makes the planner meet the builds in a different age order.
    let assignments: [[i64; 4]; 4] = [
        [100, 200, 300, 400],
        [400, 300, 200, 100],
        [400, 100, 300, 200],
        [200, 400, 100, 300],
    ];
    let filenames = ["foo-a.pkg", "foo-b.pkg", "foo-c.pkg", "foo-d.pkg"];

    for dates in assignments {
        let h = TestHarness::new(2, &[MIRROR_A]);
        h.install(&["foo", "bar"]);
        let mut entries: Vec<_> = filenames
            .iter()
            .zip(dates)
            .map(|(filename, date)| fixtures::entry(filename, "foo", date))
            .collect();
        entries.push(fixtures::entry("bar-1.pkg", "bar", 100));
        h.publish(BASE_A, &entries);

        h.runner.run(TODAY).await.unwrap();
        let first = h.snapshot();
        h.runner.run(TODAY).await.unwrap();
        assert_eq!(h.snapshot(), first);

        let mut newest: Vec<&str> = filenames
            .iter()
            .zip(dates)
            .filter(|(_, date)| *date >= 300)
            .map(|(filename, _)| *filename)
            .collect();
        newest.push("bar-1.pkg");
        newest.sort();
        let mut on_disk: Vec<String> = newest
            .iter()
            .flat_map(|f| [f.to_string(), format!("{}.sig", f)])
            .collect();
        on_disk.sort();

        assert_eq!(
            first,
            (strings(&newest), on_disk),
            "build dates {:?}",
            dates
        );
    }
}

#[tokio::test]
async fn test_removed_repo_is_cleared_on_next_run() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo"]);
    h.install_in("extra", &["bar"]);
    h.publish(BASE_A, &[fixtures::entry("foo-1.pkg", "foo", 100)]);
    h.publish_repo(
        "https://a.example/extra/os/x86_64",
        "extra",
        &[fixtures::entry("bar-1.pkg", "bar", 100)],
    );
    h.runner.run(TODAY).await.unwrap();
    let extra_dir = h.work.path().join("extra");
    assert_eq!(
        list_dir(&extra_dir),
        strings(&["bar-1.pkg", "bar-1.pkg.sig"])
    );

    std::fs::remove_file(h.work.path().join("packages_extra_desktop.txt")).unwrap();
    h.runner.import().unwrap();
    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.repos, 1);
    assert_eq!(report.orphan_files, 2);
    assert!(list_dir(&extra_dir).is_empty());
    assert_eq!(h.snapshot().0, strings(&["foo-1.pkg"]));
}

#[tokio::test]
async fn test_failed_artifact_is_retried_when_index_changes() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo"]);
    h.publish(BASE_A, &[fixtures::entry("foo-1.pkg", "foo", 100)]);
    h.downloader.fail_url(&format!("{}/foo-1.pkg", BASE_A));

    let report = h.runner.run(TODAY).await.unwrap();
    assert_eq!(report.files.failed, 1);
    assert_eq!(h.snapshot(), (vec![], vec![]));

    // Same index content: the known hash stops a retry.
    h.downloader.clear_failures();
    let report = h.runner.run(TODAY).await.unwrap();
    assert_eq!(report.mirrors_known_index, 1);
    assert!(h.snapshot().0.is_empty());

    h.publish(
        BASE_A,
        &[
            fixtures::entry("foo-1.pkg", "foo", 100),
            fixtures::entry("bar-1.pkg", "bar", 100),
        ],
    );
    let report = h.runner.run(TODAY).await.unwrap();

    assert_eq!(report.files.new_rows, 1);
    assert_eq!(
        h.snapshot(),
        (strings(&["foo-1.pkg"]), strings(&["foo-1.pkg", "foo-1.pkg.sig"]))
    );
}

#[tokio::test]
async fn test_old_markers_expire() {
    let h = TestHarness::new(3, &[MIRROR_A]);
    h.install(&["foo"]);
    h.publish(BASE_A, &[fixtures::entry("foo-1.pkg", "foo", 100)]);
    h.runner.run(TODAY).await.unwrap();
    assert_eq!(h.runner.catalog().stats().unwrap().index_hashes, 1);

    h.downloader.set_offline(true);
    let report = h.runner.run(TODAY + 61).await.unwrap();

    assert_eq!(report.expired_markers.index_hashes, 1);
    assert_eq!(h.runner.catalog().stats().unwrap().index_hashes, 0);
    assert_eq!(h.snapshot().0, strings(&["foo-1.pkg"]));
}

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::rewrite::rewrite_content;
use crate::runtime::{ProcessMode, RunParameters};

/// Outcome of one batch run. `skipped` counts candidates that failed to read
/// or write; the batch never aborts for them.
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    pub processed: usize,
    pub skipped: usize,
}

/// Run the batch: enumerate candidates in the source directory, rewrite each
/// one, and persist it under the same base filename in the target directory,
/// creating that directory when absent.
///
/// A missing source directory is a configuration error and aborts before any
/// file is touched. Per-file I/O failures are logged and skipped.
pub fn process_files(parameters: &RunParameters) -> Result<ProcessReport> {
    if !parameters.source_dir.is_dir() {
        bail!(
            "source directory {} does not exist",
            parameters.source_dir.display()
        );
    }
    if parameters.mode == ProcessMode::Modified && parameters.modified_window_minutes == 0 {
        bail!("process mode `modified` requires a positive time window in minutes");
    }
    // The target directory must exist before the first file is written, even
    // when the caller skipped check_dirs.
    fs::create_dir_all(&parameters.target_dir).with_context(|| {
        format!(
            "failed to create target directory {}",
            parameters.target_dir.display()
        )
    })?;

    let candidates = candidate_files(parameters)?;
    debug!(
        source = %parameters.source_dir.display(),
        mode = parameters.mode.as_str(),
        candidates = candidates.len(),
        "starting batch"
    );

    let mut report = ProcessReport::default();
    for path in candidates {
        match rewrite_file(&path, &parameters.target_dir) {
            Ok(target) => {
                debug!(source = %path.display(), target = %target.display(), "rewrote file");
                report.processed += 1;
            }
            Err(error) => {
                warn!(file = %path.display(), error = %format!("{error:#}"), "skipping file");
                report.skipped += 1;
            }
        }
    }

    debug!(
        source = %parameters.source_dir.display(),
        processed = report.processed,
        skipped = report.skipped,
        "finished batch"
    );
    Ok(report)
}

/// Direct children of the source directory only, no recursion. A candidate is
/// a regular file whose name contains a `.` (the legacy `*.*` glob);
/// directories and extensionless files fall out of that filter. Entries are
/// sorted by file name so runs are deterministic across filesystems.
fn candidate_files(parameters: &RunParameters) -> Result<Vec<PathBuf>> {
    let window = match parameters.mode {
        ProcessMode::All => None,
        ProcessMode::Modified => Some(Duration::from_secs(
            parameters.modified_window_minutes.saturating_mul(60),
        )),
    };
    let now = SystemTime::now();

    let mut candidates = Vec::new();
    for entry in WalkDir::new(&parameters.source_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(
                    source = %parameters.source_dir.display(),
                    error = %error,
                    "failed to read directory entry"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if !entry.file_name().to_string_lossy().contains('.') {
            continue;
        }
        if let Some(window) = window {
            let modified = match entry
                .path()
                .metadata()
                .and_then(|metadata| metadata.modified())
            {
                Ok(modified) => modified,
                Err(error) => {
                    warn!(file = %entry.path().display(), error = %error, "failed to read mtime");
                    continue;
                }
            };
            // Files with an mtime in the future count as just modified.
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age >= window {
                continue;
            }
        }
        candidates.push(entry.into_path());
    }
    Ok(candidates)
}

fn rewrite_file(source: &Path, target_dir: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| anyhow!("source path has no file name: {}", source.display()))?;
    let content = fs::read_to_string(source)
        .with_context(|| format!("failed to read {}", source.display()))?;
    let rewritten = rewrite_content(&content);
    let target = target_dir.join(file_name);
    fs::write(&target, rewritten)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;

    fn parameters(source: PathBuf, target: PathBuf, mode: ProcessMode) -> RunParameters {
        RunParameters {
            source_dir: source,
            target_dir: target,
            mode,
            modified_window_minutes: 60,
        }
    }

    fn backdate(path: &Path, by: Duration) {
        let file = File::options().append(true).open(path).expect("open file");
        let times = fs::FileTimes::new().set_modified(SystemTime::now() - by);
        file.set_times(times).expect("set mtime");
    }

    #[test]
    fn all_mode_processes_every_file_with_extension() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(&source).expect("create source");
        fs::create_dir_all(&target).expect("create target");

        fs::write(source.join("a.md"), "See [[Project Alpha]] here\n").expect("write a");
        fs::write(source.join("b.txt"), "and [[42]](details)\n").expect("write b");
        fs::write(source.join("c.markdown"), "no links\n").expect("write c");

        let report =
            process_files(&parameters(source, target.clone(), ProcessMode::All)).expect("process");
        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped, 0);

        assert_eq!(
            fs::read_to_string(target.join("a.md")).expect("read a"),
            "See [Project Alpha](Project Alpha.md) here\n"
        );
        assert_eq!(
            fs::read_to_string(target.join("b.txt")).expect("read b"),
            "and [42](42 details.md)\n"
        );
        assert_eq!(
            fs::read_to_string(target.join("c.markdown")).expect("read c"),
            "no links\n"
        );
    }

    #[test]
    fn subdirectories_and_extensionless_files_are_not_candidates() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(source.join("nested.dir")).expect("create nested dir");
        fs::create_dir_all(&target).expect("create target");

        fs::write(source.join("note.md"), "[[a]]\n").expect("write note");
        fs::write(source.join("README"), "[[a]]\n").expect("write extensionless");
        fs::write(source.join("nested.dir").join("deep.md"), "[[a]]\n").expect("write nested");

        let report =
            process_files(&parameters(source, target.clone(), ProcessMode::All)).expect("process");
        assert_eq!(report.processed, 1);
        assert!(target.join("note.md").exists());
        assert!(!target.join("README").exists());
        assert!(!target.join("deep.md").exists());
    }

    #[test]
    fn modified_mode_only_takes_files_inside_the_window() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(&source).expect("create source");
        fs::create_dir_all(&target).expect("create target");

        fs::write(source.join("fresh.md"), "[[a]]\n").expect("write fresh");
        fs::write(source.join("stale.md"), "[[b]]\n").expect("write stale");
        backdate(&source.join("stale.md"), Duration::from_secs(2 * 60 * 60));

        let report = process_files(&parameters(source, target.clone(), ProcessMode::Modified))
            .expect("process");
        assert_eq!(report.processed, 1);
        assert!(target.join("fresh.md").exists());
        assert!(!target.join("stale.md").exists());
    }

    #[test]
    fn missing_target_directory_is_created_before_writing() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(&source).expect("create source");

        fs::write(source.join("a.md"), "[[a]]\n").expect("write a");

        let report =
            process_files(&parameters(source, target.clone(), ProcessMode::All)).expect("process");
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(
            fs::read_to_string(target.join("a.md")).expect("read a"),
            "[a](a.md)\n"
        );
    }

    #[test]
    fn missing_source_directory_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("missing");
        let target = temp.path().join("out");
        fs::create_dir_all(&target).expect("create target");

        let error = process_files(&parameters(source, target.clone(), ProcessMode::All))
            .expect_err("missing source must fail");
        assert!(error.to_string().contains("does not exist"));
        assert_eq!(fs::read_dir(&target).expect("read target").count(), 0);
    }

    #[test]
    fn huge_window_does_not_overflow() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(&source).expect("create source");

        fs::write(source.join("a.md"), "[[a]]\n").expect("write a");

        let run = RunParameters {
            source_dir: source,
            target_dir: target,
            mode: ProcessMode::Modified,
            modified_window_minutes: u64::MAX,
        };
        let report = process_files(&run).expect("process");
        assert_eq!(report.processed, 1);
    }

    #[test]
    fn zero_window_in_modified_mode_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        fs::create_dir_all(&source).expect("create source");

        let run = RunParameters {
            source_dir: source,
            target_dir: temp.path().join("out"),
            mode: ProcessMode::Modified,
            modified_window_minutes: 0,
        };
        let error = process_files(&run).expect_err("zero window must fail");
        assert!(error.to_string().contains("positive time window"));
    }

    #[test]
    fn empty_source_directory_processes_zero_files() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(&source).expect("create source");
        fs::create_dir_all(&target).expect("create target");

        let report =
            process_files(&parameters(source, target, ProcessMode::All)).expect("process");
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn unreadable_file_is_skipped_and_batch_continues() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(&source).expect("create source");
        fs::create_dir_all(&target).expect("create target");

        fs::write(source.join("good.md"), "[[a]]\n").expect("write good");
        // Invalid UTF-8 fails the text read; the file is skipped, not fatal.
        fs::write(source.join("bad.bin"), [0xff, 0xfe, 0x00, 0x01]).expect("write bad");

        let report =
            process_files(&parameters(source, target.clone(), ProcessMode::All)).expect("process");
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert!(target.join("good.md").exists());
        assert!(!target.join("bad.bin").exists());
    }

    #[test]
    fn existing_target_file_is_overwritten() {
        let temp = tempdir().expect("tempdir");
        let source = temp.path().join("src");
        let target = temp.path().join("out");
        fs::create_dir_all(&source).expect("create source");
        fs::create_dir_all(&target).expect("create target");

        fs::write(source.join("note.md"), "[[new]]\n").expect("write source");
        fs::write(target.join("note.md"), "old contents\n").expect("write stale target");

        let report =
            process_files(&parameters(source, target.clone(), ProcessMode::All)).expect("process");
        assert_eq!(report.processed, 1);
        assert_eq!(
            fs::read_to_string(target.join("note.md")).expect("read target"),
            "[new](new.md)\n"
        );
    }
}

use super::{BenchmarkOutput, ResultsByFlow};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Make sure `out` can be written: create missing parent directories, but
/// refuse when this process cannot create files in the closest existing
/// ancestor.
pub fn prepare_output_path(out: &Path) -> anyhow::Result<()> {
    let parent = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut existing = parent.as_path();
    while !existing.exists() {
        existing = match existing.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
    }

    let meta = std::fs::metadata(existing)
        .with_context(|| format!("cannot inspect {}", existing.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("output parent {} is not a directory", existing.display());
    }
    // Mode bits say nothing about this process; create and drop a real file.
    tempfile::NamedTempFile::new_in(existing).with_context(|| {
        format!(
            "specified output file directory is not writable: {}",
            existing.display()
        )
    })?;

    if !parent.exists() {
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Results collected so far, written after every finished flow.
pub fn write_partial_results(results: &ResultsByFlow, out: &Path) -> anyhow::Result<()> {
    std::fs::write(out, serde_json::to_string_pretty(results)?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

/// Final `{ report, results }` document.
pub fn write_json(output: &BenchmarkOutput, out: &Path) -> anyhow::Result<()> {
    std::fs::write(out, serde_json::to_string_pretty(output)?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

pub fn to_json_string(output: &BenchmarkOutput) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{BenchmarkRunReport, FlowRunReport, FlowRunStatus};
    use chrono::Utc;
    use flowbench_stats::BenchmarkResults;

    #[test]
    fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/results.json");
        prepare_output_path(&out).unwrap();
        assert!(out.parent().unwrap().is_dir());
    }

    #[test]
    fn rejects_file_as_parent() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let err = prepare_output_path(&blocker.join("out.json")).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_directory_the_process_cannot_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users write through mode bits; nothing to assert then.
        let writable = tempfile::NamedTempFile::new_in(&locked).is_ok();
        let result = prepare_output_path(&locked.join("nested/out.json"));

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        if writable {
            assert!(result.is_ok());
            return;
        }
        let err = result.unwrap_err();
        assert!(err.to_string().contains("not writable"), "{err:#}");
        assert!(!locked.join("nested").exists());
    }

    #[test]
    fn writable_directory_is_left_clean() {
        let dir = tempfile::tempdir().unwrap();
        prepare_output_path(&dir.path().join("out.json")).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn writes_report_and_results() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.json");

        let mut flow = FlowRunReport::pending("tab-switching", 3, 1, 1);
        flow.status = FlowRunStatus::Success;
        let now = Utc::now();
        let mut results = ResultsByFlow::new();
        let mut r = BenchmarkResults::default();
        r.p95.insert("inp".into(), 80.0);
        results.insert("Power User: Tab Switching".into(), r);

        write_partial_results(&results, &out).unwrap();
        let partial: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(partial["Power User: Tab Switching"]["p95"]["inp"], 80.0);

        let output = BenchmarkOutput {
            report: BenchmarkRunReport::build("r1", now, now, vec![flow]),
            results,
        };
        write_json(&output, &out).unwrap();
        let full: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(full["report"]["summary"]["successfulFlows"], 1);
        assert_eq!(full["report"]["exitCode"], 0);
        assert_eq!(full["results"]["Power User: Tab Switching"]["p95"]["inp"], 80.0);
    }
}

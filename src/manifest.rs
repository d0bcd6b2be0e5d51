//! Per-file manifests and the build summary.
//!
//! Layout under the tracking directory:
//!
//! - `<stem>-tracking.json`: `{ file, timestamp, tracking: [{ type, name, elementName }] }`
//! - `tracking-summary.json`: `{ files: [manifest..], totalTracking, lastUpdated }`
//! - `transformed/<file name>`: rewritten source, only when enabled

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackingError};
use crate::model::TrackingPoint;

pub const SUMMARY_FILE: &str = "tracking-summary.json";
const TRANSFORMED_DIR: &str = "transformed";

lazy_static! {
    static ref UNSAFE_NAME_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
}

/// Forward slashes and no `file://` scheme.
pub fn normalize_path(file_path: &str) -> String {
    let s = file_path.replace('\\', "/");
    if let Some(rest) = s.strip_prefix("file:///") {
        format!("/{}", rest)
    } else if let Some(rest) = s.strip_prefix("file://") {
        rest.to_string()
    } else {
        s
    }
}

fn file_stem(file_path: &str) -> String {
    let normalized = normalize_path(file_path);
    let stem = Path::new(&normalized)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    UNSAFE_NAME_CHARS.replace_all(stem, "_").into_owned()
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub file: String,
    pub timestamp: String,
    pub tracking: Vec<TrackingPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub files: Vec<Manifest>,
    pub total_tracking: usize,
    pub last_updated: String,
}

impl Summary {
    /// Replace the entry for `manifest.file`, or append it.
    pub fn upsert(&mut self, manifest: Manifest) {
        let updated = manifest.timestamp.clone();
        match self.files.iter_mut().find(|m| m.file == manifest.file) {
            Some(existing) => *existing = manifest,
            None => self.files.push(manifest),
        }
        self.refresh(updated);
    }

    /// Drop the entry for `file`. Returns whether one existed.
    pub fn remove(&mut self, file: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|m| m.file != file);
        let removed = self.files.len() != before;
        if removed {
            self.refresh(now());
        }
        removed
    }

    fn refresh(&mut self, updated: String) {
        self.total_tracking = self.files.iter().map(|m| m.tracking.len()).sum();
        self.last_updated = updated;
    }
}

/// Writes manifests and keeps the summary in sync.
///
/// The summary is read-modify-written; the internal lock serializes that
/// for every thread sharing this emitter.
pub struct ManifestEmitter {
    dir: PathBuf,
    output_transformed: bool,
    summary_lock: Mutex<()>,
}

impl ManifestEmitter {
    pub fn new(dir: impl Into<PathBuf>, output_transformed: bool) -> Self {
        Self {
            dir: dir.into(),
            output_transformed,
            summary_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self, file_path: &str) -> PathBuf {
        self.dir.join(format!("{}-tracking.json", file_stem(file_path)))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| TrackingError::io(&self.dir, e))
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let data = serde_json::to_string_pretty(value).map_err(|e| TrackingError::json(path, e))?;
        fs::write(path, data).map_err(|e| TrackingError::io(path, e))
    }

    /// Current summary. A missing file is an empty summary; an unreadable
    /// one is logged and rebuilt from scratch.
    pub fn read_summary(&self) -> Result<Summary> {
        let path = self.summary_path();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Summary::default()),
            Err(e) => return Err(TrackingError::io(path, e)),
        };
        match serde_json::from_str(&data) {
            Ok(summary) => Ok(summary),
            Err(e) => {
                log::warn!(
                    "[tracking] discarding unreadable summary {}: {}",
                    path.display(),
                    e
                );
                Ok(Summary::default())
            }
        }
    }

    fn update_summary(&self, update: impl FnOnce(&mut Summary) -> bool) -> Result<()> {
        let _guard = self.summary_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary = self.read_summary()?;
        if update(&mut summary) {
            Self::write_json(&self.summary_path(), &summary)?;
        }
        Ok(())
    }

    /// Overwrite the manifest for `file_path` and fold it into the summary.
    pub fn emit(&self, file_path: &str, points: &[TrackingPoint]) -> Result<Manifest> {
        self.ensure_dir()?;
        let manifest = Manifest {
            file: normalize_path(file_path),
            timestamp: now(),
            tracking: points.to_vec(),
        };
        let path = self.manifest_path(file_path);
        Self::write_json(&path, &manifest)?;
        log::info!(
            "[tracking] wrote {} tracking point(s) for {} to {}",
            manifest.tracking.len(),
            manifest.file,
            path.display()
        );

        let entry = manifest.clone();
        self.update_summary(move |summary| {
            summary.upsert(entry);
            true
        })?;
        Ok(manifest)
    }

    /// Whether the manifest at `path` was written for `file`. Files sharing
    /// a stem share a manifest path, so a stale neighbour must not be taken
    /// for ours.
    fn owns_manifest(path: &Path, file: &str) -> Result<bool> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(TrackingError::io(path, e)),
        };
        match serde_json::from_str::<Manifest>(&data) {
            Ok(manifest) => Ok(manifest.file == file),
            Err(e) => {
                log::warn!(
                    "[tracking] leaving unreadable manifest {} in place: {}",
                    path.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    /// Remove what an earlier compile recorded for a file that no longer has
    /// tracking points. Returns whether anything was removed.
    pub fn retract(&self, file_path: &str) -> Result<bool> {
        let file = normalize_path(file_path);
        let path = self.manifest_path(file_path);
        let mut removed = false;
        if Self::owns_manifest(&path, &file)? {
            fs::remove_file(&path).map_err(|e| TrackingError::io(&path, e))?;
            removed = true;
        }
        if self.summary_path().exists() {
            self.update_summary(|summary| {
                let dropped = summary.remove(&file);
                removed |= dropped;
                dropped
            })?;
        }
        Ok(removed)
    }

    /// Write rewritten source next to the manifests when enabled.
    pub fn write_transformed(&self, file_path: &str, code: &str) -> Result<Option<PathBuf>> {
        if !self.output_transformed {
            return Ok(None);
        }
        let dir = self.dir.join(TRANSFORMED_DIR);
        fs::create_dir_all(&dir).map_err(|e| TrackingError::io(&dir, e))?;
        let normalized = normalize_path(file_path);
        let name = Path::new(&normalized)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        let path = dir.join(UNSAFE_NAME_CHARS.replace_all(name, "_").as_ref());
        fs::write(&path, code).map_err(|e| TrackingError::io(&path, e))?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MarkerKind;

    fn point(kind: MarkerKind, name: &str) -> TrackingPoint {
        TrackingPoint {
            kind,
            name: name.into(),
            element_name: "div".into(),
            file_path: "src/Page.tsx".into(),
            dynamic: false,
        }
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(r"C:\app\src\Page.tsx"), "C:/app/src/Page.tsx");
        assert_eq!(normalize_path("file:///app/src/Page.tsx"), "/app/src/Page.tsx");
        assert_eq!(normalize_path("file://src/Page.tsx"), "src/Page.tsx");
        assert_eq!(file_stem("src/pages/Auto Tracked[id].tsx"), "Auto_Tracked_id_");
    }

    #[test]
    fn manifest_and_summary_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ManifestEmitter::new(dir.path(), false);
        let points = vec![point(MarkerKind::Show, "ad"), point(MarkerKind::Click, "ad")];
        emitter.emit("src/Page.tsx", &points).unwrap();

        let raw = fs::read_to_string(dir.path().join("Page-tracking.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["file"], "src/Page.tsx");
        assert_eq!(
            json["tracking"],
            serde_json::json!([
                { "type": "show", "name": "ad", "elementName": "div" },
                { "type": "click", "name": "ad", "elementName": "div" }
            ])
        );
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));

        let summary = emitter.read_summary().unwrap();
        assert_eq!(summary.total_tracking, 2);
        assert_eq!(summary.files.len(), 1);
    }

    #[test]
    fn recompiling_a_file_replaces_its_summary_entry() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ManifestEmitter::new(dir.path(), false);
        emitter
            .emit("src/A.tsx", &[point(MarkerKind::Show, "a"), point(MarkerKind::Click, "a")])
            .unwrap();
        emitter.emit("src/B.tsx", &[point(MarkerKind::Show, "b")]).unwrap();
        emitter.emit("src/A.tsx", &[point(MarkerKind::Click, "a")]).unwrap();

        let summary = emitter.read_summary().unwrap();
        let files: Vec<&str> = summary.files.iter().map(|m| m.file.as_str()).collect();
        assert_eq!(files, vec!["src/A.tsx", "src/B.tsx"]);
        assert_eq!(summary.total_tracking, 2);
    }

    #[test]
    fn retract_removes_stale_records() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ManifestEmitter::new(dir.path(), false);
        emitter.emit("src/A.tsx", &[point(MarkerKind::Show, "a")]).unwrap();
        assert!(emitter.retract("src/A.tsx").unwrap());
        assert!(!emitter.manifest_path("src/A.tsx").exists());
        let summary = emitter.read_summary().unwrap();
        assert!(summary.files.is_empty());
        assert_eq!(summary.total_tracking, 0);
        assert!(!emitter.retract("src/A.tsx").unwrap());
    }

    #[test]
    fn retract_keeps_a_same_stem_manifest_of_another_file() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ManifestEmitter::new(dir.path(), false);
        emitter.emit("src/a/index.tsx", &[point(MarkerKind::Show, "a")]).unwrap();

        assert!(!emitter.retract("src/b/index.tsx").unwrap());
        let path = dir.path().join("index-tracking.json");
        let kept: Manifest = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(kept.file, "src/a/index.tsx");
        assert_eq!(emitter.read_summary().unwrap().total_tracking, 1);

        assert!(emitter.retract("src/a/index.tsx").unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn unreadable_manifest_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ManifestEmitter::new(dir.path(), false);
        let path = emitter.manifest_path("src/A.tsx");
        fs::write(&path, "{ nope").unwrap();
        assert!(!emitter.retract("src/A.tsx").unwrap());
        assert!(path.exists());
    }

    #[test]
    fn corrupt_summary_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = ManifestEmitter::new(dir.path(), false);
        fs::write(emitter.summary_path(), "{ not json").unwrap();
        emitter.emit("src/A.tsx", &[point(MarkerKind::Show, "a")]).unwrap();
        assert_eq!(emitter.read_summary().unwrap().total_tracking, 1);
    }

    #[test]
    fn transformed_output_is_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let off = ManifestEmitter::new(dir.path(), false);
        assert_eq!(off.write_transformed("src/A.tsx", "x").unwrap(), None);
        let on = ManifestEmitter::new(dir.path(), true);
        let path = on.write_transformed("src/A.tsx", "x").unwrap().unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "x");
    }

    #[test]
    fn unwritable_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let emitter = ManifestEmitter::new(blocker.join("nested"), false);
        let err = emitter.emit("src/A.tsx", &[point(MarkerKind::Show, "a")]).unwrap_err();
        assert!(matches!(err, TrackingError::Io { .. }));
    }
}

//! Session corpus I/O
//!
//! A corpus is a directory holding one JSON file per session. Loading skips files
//! that cannot be read or parsed; writing never replaces an existing file unless
//! the caller opts out of the skip-existing policy.

use crate::error::SessionError;
use crate::types::Session;
use rayon::prelude::*;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of writing one output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    SkippedExisting,
}

/// Counts from persisting a batch of sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    pub written: usize,
    pub skipped: usize,
    /// Sessions whose file could not be written
    pub failed: usize,
}

/// Session files under `dir` with the given extension, sorted by path
pub fn discover_session_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == extension)
        })
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Load one persisted session
pub fn load_session_file(path: &Path) -> Result<Session, SessionError> {
    let content = fs::read_to_string(path)?;
    let mut session: Session = serde_json::from_str(&content)?;
    session.refresh_click_flag();
    Ok(session)
}

/// Load every session of a corpus directory, skipping unreadable files
pub fn load_corpus(dir: &Path, extension: &str) -> Result<Vec<Session>, SessionError> {
    if !dir.is_dir() {
        return Err(SessionError::IoError(std::io::Error::new(
            ErrorKind::NotFound,
            format!("corpus directory not found: {}", dir.display()),
        )));
    }

    let files = discover_session_files(dir, extension);
    let sessions: Vec<Session> = files
        .par_iter()
        .filter_map(|path| match load_session_file(path) {
            Ok(session) => {
                debug!(path = %path.display(), actions = session.actions.len(), "loaded session");
                Some(session)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping session file");
                None
            }
        })
        .collect();

    info!(
        dir = %dir.display(),
        files = files.len(),
        loaded = sessions.len(),
        "corpus loaded"
    );
    Ok(sessions)
}

/// Write `contents` to `path`, creating parent directories
///
/// With `skip_existing` an existing file is left untouched.
pub fn write_output(
    path: &Path,
    contents: &[u8],
    skip_existing: bool,
) -> Result<WriteOutcome, SessionError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if skip_existing {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }

    match options.open(path) {
        Ok(mut file) => {
            file.write_all(contents)?;
            Ok(WriteOutcome::Written)
        }
        Err(e) if skip_existing && e.kind() == ErrorKind::AlreadyExists => {
            info!("Skipping writing as {:?} already exists", path);
            Ok(WriteOutcome::SkippedExisting)
        }
        Err(e) => Err(e.into()),
    }
}

/// File name of a persisted session
///
/// Path separators and `%` are percent-encoded, so distinct ids never share a file.
pub fn session_file_name(session_id: &str) -> String {
    let mut name = String::with_capacity(session_id.len() + 5);
    for c in session_id.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            c => name.push(c),
        }
    }
    name.push_str(".json");
    name
}

/// Persist sessions as `<session_id>.json` files under `dir`
///
/// A file that cannot be written is logged and counted as failed; the remaining
/// sessions are still written.
pub fn persist_sessions<'a, I>(
    sessions: I,
    dir: &Path,
    pretty: bool,
    skip_existing: bool,
) -> Result<PersistStats, SessionError>
where
    I: IntoIterator<Item = &'a Session>,
{
    let mut stats = PersistStats::default();
    for session in sessions {
        let json = if pretty {
            serde_json::to_vec_pretty(session)?
        } else {
            serde_json::to_vec(session)?
        };
        let path = dir.join(session_file_name(&session.session_id));
        match write_output(&path, &json, skip_existing) {
            Ok(WriteOutcome::Written) => stats.written += 1,
            Ok(WriteOutcome::SkippedExisting) => stats.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write session file");
                stats.failed += 1;
            }
        }
    }

    info!(
        dir = %dir.display(),
        written = stats.written,
        skipped = stats.skipped,
        failed = stats.failed,
        "sessions persisted"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, Action};
    use pretty_assertions::assert_eq;

    fn session(id: &str) -> Session {
        let mut session = Session::new(id);
        session.push_action(Action {
            action_id: 1,
            timestamp: parse_timestamp("2024-01-15 14:00:00").unwrap(),
            action_type: "SearchHit".to_string(),
            action_label: "click".to_string(),
            action_length: 0,
            params: String::new(),
            origin_action: String::new(),
        });
        session.recompute_length();
        session
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = vec![session("a"), session("b")];

        let stats = persist_sessions(&sessions, dir.path(), true, true).unwrap();
        assert_eq!(stats, PersistStats { written: 2, skipped: 0, failed: 0 });

        let loaded = load_corpus(dir.path(), "json").unwrap();
        let mut ids: Vec<_> = loaded.iter().map(|s| s.session_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(loaded.iter().all(|s| s.has_click));
    }

    #[test]
    fn test_existing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        fs::write(&path, "original").unwrap();

        let stats = persist_sessions(&[session("a")], dir.path(), false, true).unwrap();
        assert_eq!(stats, PersistStats { written: 0, skipped: 1, failed: 0 });
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_overwrite_when_policy_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, "old").unwrap();

        assert_eq!(write_output(&path, b"new", false).unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics").join("sample").join("summary.txt");
        assert_eq!(write_output(&path, b"x", true).unwrap(), WriteOutcome::Written);
        assert_eq!(write_output(&path, b"y", true).unwrap(), WriteOutcome::SkippedExisting);
        assert_eq!(fs::read_to_string(&path).unwrap(), "x");
    }

    #[test]
    fn test_load_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        persist_sessions(&[session("good")], dir.path(), true, true).unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = load_corpus(dir.path(), "json").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].session_id, "good");
    }

    #[test]
    fn test_missing_corpus_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_corpus(&dir.path().join("absent"), "json");
        assert!(matches!(result, Err(SessionError::IoError(_))));
    }

    #[test]
    fn test_unwritable_file_does_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a.json")).unwrap();

        let sessions = vec![session("a"), session("b"), session("c")];
        let stats = persist_sessions(&sessions, dir.path(), true, false).unwrap();
        assert_eq!(stats, PersistStats { written: 2, skipped: 0, failed: 1 });
        assert!(dir.path().join("b.json").is_file());
        assert!(dir.path().join("c.json").is_file());
    }

    #[test]
    fn test_session_file_name() {
        assert_eq!(session_file_name("abc"), "abc.json");
        assert_eq!(session_file_name("../x"), "..%2Fx.json");
        assert_eq!(session_file_name("a\\b"), "a%5Cb.json");
        assert_eq!(session_file_name("50%"), "50%25.json");
    }

    #[test]
    fn test_separator_ids_do_not_collide() {
        assert_ne!(session_file_name("a/b"), session_file_name("a_b"));
        assert_ne!(session_file_name("a/b"), session_file_name("a%2Fb"));

        let dir = tempfile::tempdir().unwrap();
        let stats = persist_sessions(&[session("a/b"), session("a_b")], dir.path(), true, true).unwrap();
        assert_eq!(stats.written, 2);
        let mut ids: Vec<_> = load_corpus(dir.path(), "json")
            .unwrap()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a/b".to_string(), "a_b".to_string()]);
    }
}

//! Change detection for shader source files.
//!
//! The frame loop asks every [`ChangeSource`] once per frame whether its file
//! changed. [`FileWatch`] polls the modification time; [`NotifyWatch`] drains
//! OS file events delivered by `notify`.

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::time::SystemTime;

/// Which watcher implementation to use for shader files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Compare modification times once per frame (default).
    #[default]
    Poll,
    /// Subscribe to file system events.
    Notify,
}

/// Something that can tell whether a file changed since it was last asked.
pub trait ChangeSource {
    /// The watched file.
    fn path(&self) -> &Path;

    /// Returns `true` once for every detected change.
    fn poll_changed(&mut self) -> io::Result<bool>;
}

/// Polls a file's modification timestamp.
#[derive(Debug)]
pub struct FileWatch {
    path: PathBuf,
    stamp: Option<SystemTime>,
}

impl FileWatch {
    /// Watch `path` with no recorded stamp, so the first check fires.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stamp: None,
        }
    }

    /// Watch `path`, recording its current stamp so only later edits fire.
    pub fn primed(path: impl Into<PathBuf>) -> io::Result<Self> {
        let mut watch = Self::new(path);
        watch.stamp = Some(modified(&watch.path)?);
        Ok(watch)
    }

    /// Last observed modification time.
    pub fn stamp(&self) -> Option<SystemTime> {
        self.stamp
    }

    /// Compare the file's modification time against the stored stamp and
    /// call `on_changed` if they differ.
    ///
    /// A stat failure is returned to the caller untouched.
    pub fn check(&mut self, on_changed: impl FnOnce()) -> io::Result<bool> {
        let stamp = modified(&self.path)?;
        if self.stamp == Some(stamp) {
            return Ok(false);
        }
        self.stamp = Some(stamp);
        on_changed();
        Ok(true)
    }
}

impl ChangeSource for FileWatch {
    fn path(&self) -> &Path {
        &self.path
    }

    fn poll_changed(&mut self) -> io::Result<bool> {
        self.check(|| {})
    }
}

fn modified(path: &Path) -> io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

/// Watches a file through OS notifications.
///
/// The parent directory is watched non-recursively, since editors often
/// replace files instead of writing them in place.
pub struct NotifyWatch {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    receiver: Receiver<()>,
}

impl NotifyWatch {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
            if let Ok(event) = res {
                // Removals are forwarded so the next poll reports the missing file.
                if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                    let touches_file = event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()));
                    if touches_file {
                        let _ = tx.send(());
                    }
                }
            }
        })
        .map_err(notify_to_io)?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(notify_to_io)?;

        log::debug!("Watching {:?} for changes to {:?}", dir, path);

        Ok(Self {
            path,
            _watcher: watcher,
            receiver: rx,
        })
    }
}

impl ChangeSource for NotifyWatch {
    fn path(&self) -> &Path {
        &self.path
    }

    fn poll_changed(&mut self) -> io::Result<bool> {
        let mut changed = false;
        while self.receiver.try_recv().is_ok() {
            changed = true;
        }
        if changed {
            // Same failure semantics as polling: a vanished file is an error.
            std::fs::metadata(&self.path)?;
        }
        Ok(changed)
    }
}

fn notify_to_io(e: notify::Error) -> io::Error {
    match e.kind {
        notify::ErrorKind::Io(err) => err,
        other => io::Error::new(io::ErrorKind::Other, format!("{:?}", other)),
    }
}

/// Build the change source for `path` according to `mode`.
///
/// Polling watches start primed, so the file must exist.
pub fn watch_file(path: &Path, mode: WatchMode) -> io::Result<Box<dyn ChangeSource>> {
    Ok(match mode {
        WatchMode::Poll => Box::new(FileWatch::primed(path)?),
        WatchMode::Notify => Box::new(NotifyWatch::new(path)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    fn touch(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn test_fresh_watch_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.wgsl");
        fs::write(&path, "// v1").unwrap();

        let mut watch = FileWatch::new(&path);
        let mut calls = 0;
        assert!(watch.check(|| calls += 1).unwrap());
        assert!(!watch.check(|| calls += 1).unwrap());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_unchanged_stamp_does_not_fire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.wgsl");
        fs::write(&path, "// v1").unwrap();
        touch(&path, 1_000);

        let mut watch = FileWatch::primed(&path).unwrap();
        for _ in 0..5 {
            assert!(!watch.poll_changed().unwrap());
        }

        // Rewriting identical content with the same stamp is not a change.
        fs::write(&path, "// v1").unwrap();
        touch(&path, 1_000);
        assert!(!watch.poll_changed().unwrap());
    }

    #[test]
    fn test_modification_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.wgsl");
        fs::write(&path, "// v1").unwrap();
        touch(&path, 1_000);

        let mut watch = FileWatch::primed(&path).unwrap();
        fs::write(&path, "// v2").unwrap();
        touch(&path, 2_000);

        let mut calls = 0;
        assert!(watch.check(|| calls += 1).unwrap());
        assert!(!watch.check(|| calls += 1).unwrap());
        assert_eq!(calls, 1);
        assert_eq!(
            watch.stamp(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(2_000))
        );
    }

    #[test]
    fn test_stamp_going_backwards_still_fires() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.wgsl");
        fs::write(&path, "").unwrap();
        touch(&path, 5_000);

        let mut watch = FileWatch::primed(&path).unwrap();
        touch(&path, 4_000);
        assert!(watch.poll_changed().unwrap());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.wgsl");

        let mut watch = FileWatch::new(&path);
        let err = watch.check(|| panic!("must not fire")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(FileWatch::primed(&path).is_err());
    }

    #[test]
    fn test_watch_file_poll_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.wgsl");
        fs::write(&path, "").unwrap();

        let mut source = watch_file(&path, WatchMode::Poll).unwrap();
        assert_eq!(source.path(), path.as_path());
        assert!(!source.poll_changed().unwrap());
    }

    /// Poll `source` until it reports something or `timeout` passes.
    fn poll_until(source: &mut dyn ChangeSource, timeout: Duration) -> io::Result<bool> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match source.poll_changed() {
                Ok(false) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                other => return other,
            }
        }
    }

    #[test]
    fn test_notify_watch_reports_rewrite_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.wgsl");
        fs::write(&path, "// v1").unwrap();

        let mut source = watch_file(&path, WatchMode::Notify).unwrap();
        assert_eq!(source.path(), path.as_path());
        assert!(!source.poll_changed().unwrap());

        fs::write(&path, "// v2").unwrap();
        assert!(poll_until(source.as_mut(), Duration::from_secs(5)).unwrap());

        // Late events from the same write are drained by the next poll;
        // after that nothing is pending.
        std::thread::sleep(Duration::from_millis(200));
        let _ = source.poll_changed().unwrap();
        assert!(!source.poll_changed().unwrap());
    }

    #[test]
    fn test_notify_watch_ignores_sibling_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.wgsl");
        fs::write(&path, "").unwrap();

        let mut watch = NotifyWatch::new(&path).unwrap();
        fs::write(dir.path().join("other.wgsl"), "// unrelated").unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(!watch.poll_changed().unwrap());
    }

    #[test]
    fn test_notify_watch_deleted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.wgsl");
        fs::write(&path, "").unwrap();

        let mut watch = NotifyWatch::new(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let err = poll_until(&mut watch, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

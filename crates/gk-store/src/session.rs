//! Asynchronous save/load of a live system.
//!
//! A `Session` owns the shared system handle plus at most one background
//! I/O job. Long-running persistence is start/poll/cancel shaped: callers
//! never block, progress arrives through an observer, and structural
//! mutation during a job fails with a busy code instead of corrupting the
//! file or the system.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use gk_core::wire::WireSystem;
use gk_core::{GestureCombinations, GestureError};

use crate::error::{Result, StoreError};
use crate::store::Store;

/// Finish-callback status for a job cancelled before completion. Success
/// is 0, engine failures are the usual negative codes.
pub const IO_CANCELLED: i32 = 1;

/// Progress listener for background save/load jobs. Fired from the worker
/// thread, so implementations must be reentrant-safe and non-blocking.
pub trait IoObserver: Send + Sync {
    /// Fraction of the job done so far, in [0, 1].
    fn on_update(&self, _progress: f64) {}
    /// 0 on success, a negative engine code on failure, `IO_CANCELLED`
    /// when the job was cancelled. Fired exactly once per job.
    fn on_finish(&self, _code: i32) {}
}

impl IoObserver for () {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Saving,
    Loading,
}

struct Job {
    kind: JobKind,
    cancel: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A live system plus its persistence jobs.
pub struct Session {
    system: Arc<RwLock<GestureCombinations>>,
    job: Option<Job>,
}

impl Session {
    pub fn new(system: GestureCombinations) -> Self {
        Self {
            system: Arc::new(RwLock::new(system)),
            job: None,
        }
    }

    fn read_system(&self) -> RwLockReadGuard<'_, GestureCombinations> {
        self.system
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_system(&self) -> RwLockWriteGuard<'_, GestureCombinations> {
        self.system
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reap a finished job so its slot frees up.
    fn poll_job(&mut self) {
        let finished = self
            .job
            .as_ref()
            .is_some_and(|job| job.done.load(Ordering::Acquire));
        if finished
            && let Some(job) = self.job.take()
        {
            let _ = job.handle.join();
        }
    }

    fn active_job(&mut self) -> Option<JobKind> {
        self.poll_job();
        self.job.as_ref().map(|j| j.kind)
    }

    fn ensure_idle(&mut self) -> Result<()> {
        match self.active_job() {
            Some(JobKind::Saving) => Err(StoreError::Engine(GestureError::CurrentlySaving)),
            Some(JobKind::Loading) => Err(StoreError::Engine(GestureError::CurrentlyLoading)),
            None => Ok(()),
        }
    }

    pub fn is_saving(&mut self) -> bool {
        self.active_job() == Some(JobKind::Saving)
    }

    pub fn is_loading(&mut self) -> bool {
        self.active_job() == Some(JobKind::Loading)
    }

    /// Read access to the system. Always available; background saves work
    /// from a snapshot taken at job start.
    pub fn with_system<R>(&self, f: impl FnOnce(&GestureCombinations) -> R) -> R {
        f(&self.read_system())
    }

    /// Mutating access to the system. Refused while a save or load job is
    /// in flight.
    pub fn with_system_mut<R>(
        &mut self,
        f: impl FnOnce(&mut GestureCombinations) -> R,
    ) -> Result<R> {
        self.ensure_idle()?;
        Ok(f(&mut self.write_system()))
    }

    // --- Synchronous persistence ---

    pub fn save_to_file(&mut self, path: &Path) -> Result<()> {
        self.ensure_idle()?;
        let wire = WireSystem::from_system(&self.read_system());
        save_atomically(&wire, path, None, None)?;
        Ok(())
    }

    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        self.ensure_idle()?;
        let loaded = Store::open_existing(path)?.load_system()?;
        *self.write_system() = loaded;
        Ok(())
    }

    // --- Asynchronous persistence ---

    /// Start a background save. A snapshot of the current system is taken
    /// up front; later mutations are not included. Fails with a busy code
    /// while another job runs.
    pub fn save_to_file_async(&mut self, path: &Path, observer: Arc<dyn IoObserver>) -> Result<()> {
        self.ensure_idle()?;
        let wire = WireSystem::from_system(&self.read_system());
        let path = path.to_path_buf();
        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));

        let job_cancel = cancel.clone();
        let job_done = done.clone();
        let handle = thread::spawn(move || {
            observer.on_update(0.0);
            let code = match save_atomically(&wire, &path, Some(&job_cancel), Some(observer.as_ref())) {
                Ok(true) => 0,
                Ok(false) => IO_CANCELLED,
                Err(e) => e.code(),
            };
            job_done.store(true, Ordering::Release);
            observer.on_finish(code);
        });

        self.job = Some(Job {
            kind: JobKind::Saving,
            cancel,
            done,
            handle,
        });
        Ok(())
    }

    /// Start a background load. On success the loaded system replaces the
    /// live one in a single swap; a cancelled or failed load leaves the
    /// live system untouched.
    pub fn load_from_file_async(&mut self, path: &Path, observer: Arc<dyn IoObserver>) -> Result<()> {
        self.ensure_idle()?;
        let path = path.to_path_buf();
        let system = self.system.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new(AtomicBool::new(false));

        let job_cancel = cancel.clone();
        let job_done = done.clone();
        let handle = thread::spawn(move || {
            observer.on_update(0.0);
            let code = match load_worker(&path, &system, &job_cancel, observer.as_ref()) {
                Ok(true) => 0,
                Ok(false) => IO_CANCELLED,
                Err(e) => e.code(),
            };
            job_done.store(true, Ordering::Release);
            observer.on_finish(code);
        });

        self.job = Some(Job {
            kind: JobKind::Loading,
            cancel,
            done,
            handle,
        });
        Ok(())
    }

    /// Request cooperative cancellation of a running save. A cancelled
    /// save leaves the previous file contents intact. Returns whether a
    /// save was in flight.
    pub fn cancel_saving(&mut self) -> bool {
        self.cancel_job(JobKind::Saving)
    }

    pub fn cancel_loading(&mut self) -> bool {
        self.cancel_job(JobKind::Loading)
    }

    fn cancel_job(&mut self, kind: JobKind) -> bool {
        self.poll_job();
        match &self.job {
            Some(job) if job.kind == kind => {
                job.cancel.store(true, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    /// Block until the current job (if any) finishes. Test and CLI
    /// convenience; the session API itself never blocks.
    pub fn wait_for_io(&mut self) {
        if let Some(job) = self.job.take() {
            let _ = job.handle.join();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(job) = self.job.take() {
            job.cancel.store(true, Ordering::Release);
            let _ = job.handle.join();
        }
    }
}

/// Write the wire system to a sibling temp file, then rename over the
/// target, so a cancelled or failed save never clobbers the previous file.
fn save_atomically(
    wire: &WireSystem,
    path: &Path,
    cancel: Option<&AtomicBool>,
    observer: Option<&dyn IoObserver>,
) -> Result<bool> {
    let tmp = path.with_extension("db.tmp");
    let _ = std::fs::remove_file(&tmp);

    let finished = {
        let store = Store::open(&tmp)?;
        store.save_wire_with(wire, |done, total| {
            if let Some(observer) = observer {
                observer.on_update(done as f64 / total.max(1) as f64);
            }
            cancel.is_none_or(|c| !c.load(Ordering::Acquire))
        })?
    };

    if !finished {
        let _ = std::fs::remove_file(&tmp);
        return Ok(false);
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        StoreError::InvalidData(format!("failed to move {} into place: {e}", tmp.display()))
    })?;
    tracing::debug!(path = %path.display(), "system saved");
    Ok(true)
}

fn load_worker(
    path: &Path,
    system: &RwLock<GestureCombinations>,
    cancel: &AtomicBool,
    observer: &dyn IoObserver,
) -> Result<bool> {
    let store = Store::open_existing(path)?;
    let wire = store.load_wire()?;
    observer.on_update(0.5);
    if cancel.load(Ordering::Acquire) {
        return Ok(false);
    }
    let loaded = wire.into_system()?;
    if cancel.load(Ordering::Acquire) {
        return Ok(false);
    }
    *system
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = loaded;
    observer.on_update(1.0);
    tracing::debug!(path = %path.display(), "system loaded");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_core::{Pose, Vec3};
    use std::sync::atomic::AtomicI32;

    fn make_system() -> GestureCombinations {
        let mut sys = GestureCombinations::new(1).unwrap();
        let g = sys.create_gesture(0, "wave").unwrap();
        sys.start_stroke(0, Pose::identity(), Some(g)).unwrap();
        for i in 0..10 {
            sys.continue_stroke(0, Vec3::new(i as f64, 0.0, 0.0))
                .unwrap();
        }
        sys.end_stroke(0).unwrap();
        sys
    }

    struct FinishCode(AtomicI32);

    impl IoObserver for FinishCode {
        fn on_update(&self, progress: f64) {
            assert!((0.0..=1.0).contains(&progress));
        }
        fn on_finish(&self, code: i32) {
            self.0.store(code, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_sync_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.db");

        let mut session = Session::new(make_system());
        session.save_to_file(&path).unwrap();

        let mut other = Session::new(GestureCombinations::new(1).unwrap());
        other.load_from_file(&path).unwrap();
        assert_eq!(other.with_system(|s| s.gesture_count(0).unwrap()), 1);
        assert_eq!(
            other.with_system(|s| s.sample_count(0, 0).unwrap()),
            1
        );
    }

    #[test]
    fn test_async_save_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.db");

        let observer = Arc::new(FinishCode(AtomicI32::new(i32::MIN)));
        let mut session = Session::new(make_system());
        session
            .save_to_file_async(&path, observer.clone())
            .unwrap();
        session.wait_for_io();

        assert_eq!(observer.0.load(Ordering::SeqCst), 0);
        assert!(path.exists());
        assert!(!session.is_saving());
    }

    #[test]
    fn test_async_load_swaps_system() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.db");
        Session::new(make_system()).save_to_file(&path).unwrap();

        let observer = Arc::new(FinishCode(AtomicI32::new(i32::MIN)));
        let mut session = Session::new(GestureCombinations::new(1).unwrap());
        session
            .load_from_file_async(&path, observer.clone())
            .unwrap();
        session.wait_for_io();

        assert_eq!(observer.0.load(Ordering::SeqCst), 0);
        assert_eq!(session.with_system(|s| s.gesture_count(0).unwrap()), 1);
    }

    #[test]
    fn test_async_load_missing_path_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(FinishCode(AtomicI32::new(i32::MIN)));
        let mut session = Session::new(make_system());
        session
            .load_from_file_async(&dir.path().join("missing.db"), observer.clone())
            .unwrap();
        session.wait_for_io();
        assert_eq!(
            observer.0.load(Ordering::SeqCst),
            GestureError::InvalidPath.code()
        );
    }

    #[test]
    fn test_mutation_blocked_during_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.db");
        let mut session = Session::new(make_system());
        session.save_to_file_async(&path, Arc::new(())).unwrap();

        if session.is_saving() {
            match session.with_system_mut(|s| s.create_gesture(0, "late")) {
                Err(StoreError::Engine(GestureError::CurrentlySaving)) => {}
                Ok(_) => panic!("mutation must be refused while saving"),
                Err(e) => panic!("unexpected error: {e}"),
            }
            // A second job is refused too.
            match session.save_to_file_async(&path, Arc::new(())) {
                Err(StoreError::Engine(GestureError::CurrentlySaving)) => {}
                other => panic!("expected CurrentlySaving, got {other:?}"),
            }
            // Reads stay available.
            assert_eq!(session.with_system(|s| s.part_count()), 1);
        }

        session.wait_for_io();
        // The slot frees up once the job is done.
        session
            .with_system_mut(|s| s.create_gesture(0, "late"))
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_cancel_when_idle_reports_no_job() {
        let mut session = Session::new(make_system());
        assert!(!session.cancel_saving());
        assert!(!session.cancel_loading());
    }

    #[test]
    fn test_cancelled_save_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system.db");

        let mut session = Session::new(make_system());
        session.save_to_file(&path).unwrap();
        let original_gestures =
            Session::new(Store::open_existing(&path).unwrap().load_system().unwrap())
                .with_system(|s| s.gesture_count(0).unwrap());

        // Even when the cancel lands after completion, the file stays valid.
        session.save_to_file_async(&path, Arc::new(())).unwrap();
        session.cancel_saving();
        session.wait_for_io();

        let reloaded = Store::open_existing(&path).unwrap().load_system().unwrap();
        assert_eq!(reloaded.gesture_count(0).unwrap(), original_gestures);
    }
}

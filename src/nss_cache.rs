//! Time-bounded `nsswitch.conf` cache.
//!
//! Readers always get a whole [`NssConf`] behind an [`Arc`]. When the cached
//! value is older than the TTL, the first reader to take the reload gate
//! stats the file and reparses it if its mtime changed; readers that find the
//! gate busy keep using the current value instead of waiting.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::nss::NssConf;

/// Default `nsswitch.conf` location.
pub const NSSWITCH_CONF_PATH: &str = "/etc/nsswitch.conf";

/// How long a parsed file is trusted before its mtime is checked again.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

static SYSTEM_NSS: LazyLock<NssCache> = LazyLock::new(|| NssCache::new(NSSWITCH_CONF_PATH));

/// Returns the current `/etc/nsswitch.conf`, reloading it if stale.
#[must_use]
pub fn system_nss() -> Arc<NssConf> {
    SYSTEM_NSS.get()
}

/// Replaces the process-wide cached value. See [`NssCache::set`].
pub fn set_system_nss(conf: NssConf, last_checked: Option<Instant>) {
    SYSTEM_NSS.set(conf, last_checked);
}

/// A cached, periodically refreshed `nsswitch.conf`.
pub struct NssCache {
    path: PathBuf,
    ttl: Duration,
    conf: Mutex<Arc<NssConf>>,
    /// Reload gate. Whoever holds it owns `last_checked`; `None` forces the
    /// next [`get`](Self::get) to check the file.
    gate: Mutex<Option<Instant>>,
    reloads: AtomicUsize,
}

impl NssCache {
    /// Parses `path` now and caches the result with [`DEFAULT_TTL`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let conf = NssConf::read(&path);
        Self {
            path,
            ttl: DEFAULT_TTL,
            conf: Mutex::new(Arc::new(conf)),
            gate: Mutex::new(Some(Instant::now())),
            reloads: AtomicUsize::new(0),
        }
    }

    /// Overrides the TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times the file has been reparsed since construction.
    #[must_use]
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::Relaxed)
    }

    /// Returns the cached value, refreshing it first if the TTL has expired.
    #[must_use]
    pub fn get(&self) -> Arc<NssConf> {
        self.try_update();
        Arc::clone(&self.conf.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the cached value and its last-checked time.
    ///
    /// A future `last_checked` keeps `conf` in place for that long plus the
    /// TTL; `None` makes the next [`get`](Self::get) consult the file.
    pub fn set(&self, conf: NssConf, last_checked: Option<Instant>) {
        // Holding the gate keeps an in-flight reload from overwriting `conf`.
        let mut gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        *self.conf.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(conf);
        *gate = last_checked;
    }

    fn try_update(&self) {
        let mut last_checked = match self.gate.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            // Another caller is already checking.
            Err(TryLockError::WouldBlock) => return,
        };

        let now = Instant::now();
        if last_checked.is_some_and(|t| now.saturating_duration_since(t) < self.ttl) {
            return;
        }
        *last_checked = Some(now);

        let mtime = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok();
        // No mtime (missing file, unsupported platform) always reparses.
        let cached = self.conf.lock().unwrap_or_else(PoisonError::into_inner).mtime;
        if mtime.is_some() && mtime == cached {
            return;
        }

        let conf = Arc::new(NssConf::read(&self.path));
        self.reloads.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %self.path.display(), "Reloaded nsswitch.conf");
        *self.conf.lock().unwrap_or_else(PoisonError::into_inner) = conf;
    }
}

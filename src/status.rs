//! Set-of-flags status values used by blocks, services and the router.
//!
//! A status is a *set* of [`RunnerStatus`] flags rather than a single
//! state: the mutually-exclusive lifecycle phase (created, configuring,
//! started, ...) coexists with sticky condition flags (warning, error)
//! that survive phase changes. The router reads receiver status to gate
//! delivery, so [`StatusFlags`] is a cheaply clonable shared handle.

use std::fmt;
use std::sync::{Arc, Mutex};

/// The fixed status enumeration shared by every managed unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunnerStatus {
    Created,
    Configuring,
    Configured,
    Starting,
    Started,
    Stopping,
    Stopped,
    Warning,
    Error,
}

impl RunnerStatus {
    const ALL: [RunnerStatus; 9] = [
        RunnerStatus::Created,
        RunnerStatus::Configuring,
        RunnerStatus::Configured,
        RunnerStatus::Starting,
        RunnerStatus::Started,
        RunnerStatus::Stopping,
        RunnerStatus::Stopped,
        RunnerStatus::Warning,
        RunnerStatus::Error,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Sticky flags survive [`StatusFlags::set`]; phase flags do not.
    pub fn is_sticky(self) -> bool {
        matches!(self, RunnerStatus::Warning | RunnerStatus::Error)
    }

    /// Stable lowercase name for logs and serialized status reports.
    pub fn name(self) -> &'static str {
        match self {
            RunnerStatus::Created => "created",
            RunnerStatus::Configuring => "configuring",
            RunnerStatus::Configured => "configured",
            RunnerStatus::Starting => "starting",
            RunnerStatus::Started => "started",
            RunnerStatus::Stopping => "stopping",
            RunnerStatus::Stopped => "stopped",
            RunnerStatus::Warning => "warning",
            RunnerStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable snapshot of a flag set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusSet(u16);

impl StatusSet {
    pub fn is_set(&self, flag: RunnerStatus) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The flags present, in enumeration order.
    pub fn flags(&self) -> Vec<RunnerStatus> {
        RunnerStatus::ALL
            .into_iter()
            .filter(|flag| self.is_set(*flag))
            .collect()
    }

    fn with(self, flag: RunnerStatus) -> StatusSet {
        StatusSet(self.0 | flag.bit())
    }

    fn without(self, flag: RunnerStatus) -> StatusSet {
        StatusSet(self.0 & !flag.bit())
    }
}

impl fmt::Display for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.flags().iter().map(|flag| flag.name()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Callback fired with the (old, new) snapshots whenever the effective
/// flag set changes. Callbacks must not mutate the flags they observe.
pub type StatusChangeCallback = Arc<dyn Fn(StatusSet, StatusSet) + Send + Sync>;

struct Inner {
    flags: StatusSet,
    callback: Option<StatusChangeCallback>,
}

/// A shared, thread-safe set-of-flags status value.
///
/// Cloning produces another handle to the same underlying flags, which is
/// how the router observes receiver status without owning the receiver.
#[derive(Clone)]
pub struct StatusFlags {
    inner: Arc<Mutex<Inner>>,
}

impl StatusFlags {
    pub fn new() -> Self {
        StatusFlags {
            inner: Arc::new(Mutex::new(Inner {
                flags: StatusSet::default(),
                callback: None,
            })),
        }
    }

    /// Creates a status pre-set to an initial flag, without firing any
    /// callback.
    pub fn with_initial(flag: RunnerStatus) -> Self {
        let status = StatusFlags::new();
        status.inner.lock().unwrap().flags = StatusSet::default().with(flag);
        status
    }

    /// Installs the change callback, replacing any previous one.
    pub fn set_callback(&self, callback: StatusChangeCallback) {
        self.inner.lock().unwrap().callback = Some(callback);
    }

    /// Replaces the lifecycle phase with `flag`, preserving sticky flags.
    pub fn set(&self, flag: RunnerStatus) {
        self.apply(|flags| {
            let mut next = StatusSet::default();
            for sticky in RunnerStatus::ALL {
                if sticky.is_sticky() && flags.is_set(sticky) {
                    next = next.with(sticky);
                }
            }
            next.with(flag)
        });
    }

    /// Adds a single flag without disturbing the rest of the set.
    pub fn add(&self, flag: RunnerStatus) {
        self.apply(|flags| flags.with(flag));
    }

    /// Removes a single flag without disturbing the rest of the set.
    pub fn remove(&self, flag: RunnerStatus) {
        self.apply(|flags| flags.without(flag));
    }

    pub fn is_set(&self, flag: RunnerStatus) -> bool {
        self.inner.lock().unwrap().flags.is_set(flag)
    }

    pub fn snapshot(&self) -> StatusSet {
        self.inner.lock().unwrap().flags
    }

    fn apply(&self, transition: impl FnOnce(StatusSet) -> StatusSet) {
        let (old, new, callback) = {
            let mut inner = self.inner.lock().unwrap();
            let old = inner.flags;
            let new = transition(old);
            if new == old {
                return;
            }
            inner.flags = new;
            (old, new, inner.callback.clone())
        };
        // fired outside the lock so a callback may read the flags
        if let Some(callback) = callback {
            callback(old, new);
        }
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        StatusFlags::new()
    }
}

impl PartialEq for StatusFlags {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl PartialEq<RunnerStatus> for StatusFlags {
    /// A status equals a single flag only when that flag is the whole set.
    fn eq(&self, flag: &RunnerStatus) -> bool {
        self.snapshot() == StatusSet::default().with(*flag)
    }
}

impl fmt::Debug for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusFlags({})", self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_add_remove() {
        let status = StatusFlags::new();
        assert!(!status.is_set(RunnerStatus::Started));

        status.add(RunnerStatus::Error);
        status.add(RunnerStatus::Started);
        assert!(status.is_set(RunnerStatus::Error));
        assert!(status.is_set(RunnerStatus::Started));

        status.remove(RunnerStatus::Error);
        assert!(!status.is_set(RunnerStatus::Error));
        assert!(status.is_set(RunnerStatus::Started));
    }

    #[test]
    fn test_set_replaces_phase_keeps_sticky() {
        let status = StatusFlags::with_initial(RunnerStatus::Started);
        status.add(RunnerStatus::Warning);

        status.set(RunnerStatus::Stopping);
        assert!(status.is_set(RunnerStatus::Stopping));
        assert!(!status.is_set(RunnerStatus::Started));
        assert!(status.is_set(RunnerStatus::Warning));
    }

    #[test]
    fn test_callback_fires_only_on_change() {
        let fired = Arc::new(AtomicUsize::new(0));
        let status = StatusFlags::new();
        let counter = fired.clone();
        status.set_callback(Arc::new(move |old, new| {
            assert_ne!(old, new);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        status.set(RunnerStatus::Created);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // no change, no callback
        status.set(RunnerStatus::Created);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        status.add(RunnerStatus::Created);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        status.set(RunnerStatus::Stopping);
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        status.remove(RunnerStatus::Stopping);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_equality_compares_full_set() {
        let status = StatusFlags::new();
        status.set(RunnerStatus::Started);
        assert!(status == RunnerStatus::Started);

        status.add(RunnerStatus::Warning);
        assert!(status != RunnerStatus::Started);

        let other = StatusFlags::new();
        other.set(RunnerStatus::Started);
        other.add(RunnerStatus::Warning);
        assert_eq!(status, other);
    }
}

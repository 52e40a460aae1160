use std::sync::OnceLock;

use parking_lot::Mutex;
use sysinfo::System;

/// Source of live memory readings for the cache manager.
///
/// All readings are in bytes. `None` means the reading is unavailable right
/// now; the manager skips the current tick and tries again on the next one.
pub trait MemoryProbe: Send + Sync {
    /// Memory the operating system could hand to this process.
    fn free_system_memory(&self) -> Option<u64>;

    /// Memory already reserved by the process heap but currently unused. Hosts
    /// without such a notion keep the default of zero.
    fn free_heap_memory(&self) -> Option<u64> {
        Some(0)
    }

    /// Total physical memory. Sampled once when the manager is created.
    fn total_memory(&self) -> Option<u64>;
}

/// [`MemoryProbe`] built from closures, for hosts that already track memory.
pub struct FnProbe {
    free_system: Box<dyn Fn() -> Option<u64> + Send + Sync>,
    free_heap: Box<dyn Fn() -> Option<u64> + Send + Sync>,
    total: Box<dyn Fn() -> Option<u64> + Send + Sync>,
}

impl FnProbe {
    pub fn new<F, T>(free_system: F, total: T) -> Self
    where
        F: Fn() -> Option<u64> + Send + Sync + 'static,
        T: Fn() -> Option<u64> + Send + Sync + 'static,
    {
        Self {
            free_system: Box::new(free_system),
            free_heap: Box::new(|| Some(0)),
            total: Box::new(total),
        }
    }

    pub fn with_free_heap<H>(mut self, free_heap: H) -> Self
    where
        H: Fn() -> Option<u64> + Send + Sync + 'static,
    {
        self.free_heap = Box::new(free_heap);
        self
    }
}

impl MemoryProbe for FnProbe {
    fn free_system_memory(&self) -> Option<u64> {
        (self.free_system)()
    }

    fn free_heap_memory(&self) -> Option<u64> {
        (self.free_heap)()
    }

    fn total_memory(&self) -> Option<u64> {
        (self.total)()
    }
}

impl std::fmt::Debug for FnProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProbe").finish_non_exhaustive()
    }
}

/// [`MemoryProbe`] backed by `sysinfo`'s view of system memory.
///
/// Readings are best-effort: on platforms where `sysinfo` reports no memory
/// at all, every reading is `None`.
pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn free_system_memory(&self) -> Option<u64> {
        let mut system = self.system.lock();
        system.refresh_memory();
        if system.total_memory() == 0 {
            report_unsupported();
            return None;
        }
        Some(system.available_memory())
    }

    fn total_memory(&self) -> Option<u64> {
        let mut system = self.system.lock();
        system.refresh_memory();
        match system.total_memory() {
            0 => {
                report_unsupported();
                None
            }
            total => Some(total),
        }
    }
}

impl std::fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProbe").finish_non_exhaustive()
    }
}

fn report_unsupported() {
    // Log once; the probe is polled on every tick.
    static REPORTED: OnceLock<()> = OnceLock::new();
    if REPORTED.set(()).is_ok() {
        tracing::debug!(
            target: "ballast.memory",
            "sysinfo reports no system memory on this platform"
        );
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bytes::{GB, MB};
use crate::probe::MemoryProbe;
use crate::resizer::Resizer;
use crate::stats::CacheStats;

type ResizeListener = Arc<dyn Fn(&ResizeEvent) + Send + Sync>;

/// Tuning knobs for a [`CacheManager`]. Fixed for the manager's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Share of total memory withheld from all caches (0-100).
    pub keep_free_mem_percent: u8,
    /// Absolute amount of memory withheld from all caches. The larger of the
    /// two floors wins.
    pub keep_free_mem_bytes: u64,
    /// How often the monitor ticks.
    pub monitoring_interval: Duration,
    /// Cooldown between two resize passes.
    pub min_resize_interval: Duration,
    /// Smallest change of the cache budget worth a resize pass.
    pub min_resize_threshold: u64,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            keep_free_mem_percent: 25,
            keep_free_mem_bytes: 6 * GB,
            monitoring_interval: Duration::from_secs(15),
            min_resize_interval: Duration::from_secs(10 * 60),
            min_resize_threshold: 200 * MB,
        }
    }
}

/// Emitted to subscribers after every resize pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub previous_available_for_caches: i64,
    pub available_for_caches: i64,
    /// Total capacity handed out by the pass. May exceed
    /// `available_for_caches` when floors do not fit.
    pub capacity: i64,
    /// Total size held by all caches right after the pass.
    pub size: i64,
}

/// What a single tick decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Resized {
        available_for_caches: i64,
        capacity: i64,
    },
    /// The previous resize pass is too recent.
    Cooldown,
    /// The cache budget moved less than `min_resize_threshold`.
    BelowThreshold { available_for_caches: i64 },
    /// A memory reading was unavailable; nothing changed.
    ProbeFailed,
}

impl TickOutcome {
    pub fn is_resized(&self) -> bool {
        matches!(self, TickOutcome::Resized { .. })
    }
}

/// Turns memory readings into capacity pushes over a [`Resizer`] tree.
///
/// The manager is a plain state machine: it never spawns or sleeps on its own.
/// Drive it with [`tick`](CacheManager::tick) from any timer, or hand it to
/// [`spawn_monitor`](crate::spawn_monitor).
pub struct CacheManager {
    probe: Arc<dyn MemoryProbe>,
    options: ManagerOptions,
    root: Resizer,
    total_memory: u64,
    last_resize: Option<Instant>,
    last_available_for_caches: i64,
    listeners: Vec<ResizeListener>,
}

impl CacheManager {
    pub fn new(probe: Arc<dyn MemoryProbe>, options: ManagerOptions, root: Resizer) -> Self {
        let total_memory = match probe.total_memory() {
            Some(total) => total,
            None => {
                tracing::warn!(
                    target: "ballast.memory",
                    "total memory is unavailable; only the absolute keep-free floor applies"
                );
                0
            }
        };

        Self {
            probe,
            options,
            root,
            total_memory,
            last_resize: None,
            last_available_for_caches: 0,
            listeners: Vec::new(),
        }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn root(&self) -> &Resizer {
        &self.root
    }

    /// Total memory as sampled at construction (0 if the probe failed).
    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }

    /// Memory withheld from all caches.
    pub fn keep_free_bytes(&self) -> u64 {
        let percent = u64::from(self.options.keep_free_mem_percent.min(100));
        let by_percent = (u128::from(self.total_memory) * u128::from(percent) / 100) as u64;
        self.options.keep_free_mem_bytes.max(by_percent)
    }

    /// Budget the caches may share right now, or `None` if a reading failed.
    pub fn available_for_caches(&self) -> Option<i64> {
        let free_system = self.probe.free_system_memory()?;
        let free_heap = self.probe.free_heap_memory()?;
        let available = free_system.saturating_add(free_heap);
        let for_caches = available.saturating_sub(self.keep_free_bytes());
        Some(i64::try_from(for_caches).unwrap_or(i64::MAX))
    }

    /// Budget used by the most recent resize pass.
    pub fn last_available_for_caches(&self) -> i64 {
        self.last_available_for_caches
    }

    /// Subscribe to resize passes.
    pub fn subscribe(&mut self, listener: ResizeListener) {
        self.listeners.push(listener);
    }

    /// Run one resize pass regardless of cooldown and threshold.
    pub fn start(&mut self) -> TickOutcome {
        self.start_at(Instant::now())
    }

    pub fn start_at(&mut self, now: Instant) -> TickOutcome {
        match self.available_for_caches() {
            Some(available_for_caches) => self.resize(now, available_for_caches),
            None => {
                tracing::debug!(
                    target: "ballast.memory",
                    "memory probe failed; initial resize deferred to the next tick"
                );
                TickOutcome::ProbeFailed
            }
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(Instant::now())
    }

    /// One monitoring step at `now`.
    ///
    /// Cooldown and threshold only gate ticks after the first successful
    /// pass; before that every readable tick resizes.
    pub fn tick_at(&mut self, now: Instant) -> TickOutcome {
        let Some(available_for_caches) = self.available_for_caches() else {
            tracing::debug!(target: "ballast.memory", "memory probe failed; tick skipped");
            return TickOutcome::ProbeFailed;
        };

        // Until a first pass succeeds, leaves may still sit below their floors.
        let Some(last) = self.last_resize else {
            return self.resize(now, available_for_caches);
        };

        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.options.min_resize_interval {
            tracing::trace!(
                target: "ballast.memory",
                elapsed_ms = elapsed.as_millis() as u64,
                "resize cooldown active"
            );
            return TickOutcome::Cooldown;
        }

        let delta = available_for_caches.abs_diff(self.last_available_for_caches);
        if delta < self.options.min_resize_threshold {
            tracing::debug!(
                target: "ballast.memory",
                available_for_caches,
                delta,
                "cache budget change below threshold"
            );
            return TickOutcome::BelowThreshold {
                available_for_caches,
            };
        }

        self.resize(now, available_for_caches)
    }

    fn resize(&mut self, now: Instant, available_for_caches: i64) -> TickOutcome {
        let capacity = self.root.calc_capacity_top_level(available_for_caches);
        let previous_available_for_caches = self.last_available_for_caches;
        self.last_resize = Some(now);
        self.last_available_for_caches = available_for_caches;

        if capacity > available_for_caches {
            tracing::debug!(
                target: "ballast.memory",
                capacity,
                available_for_caches,
                "cache floors exceed the available budget"
            );
        }

        let size = self.root.size();
        tracing::info!(
            target: "ballast.memory",
            previous_available_for_caches,
            available_for_caches,
            capacity,
            size,
            "resized caches"
        );

        if !self.listeners.is_empty() {
            let event = ResizeEvent {
                previous_available_for_caches,
                available_for_caches,
                capacity,
                size,
            };
            for listener in &self.listeners {
                listener(&event);
            }
        }

        TickOutcome::Resized {
            available_for_caches,
            capacity,
        }
    }

    /// Current utilization of every node of the tree.
    pub fn stats(&self) -> CacheStats {
        CacheStats::collect(&self.root)
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("options", &self.options)
            .field("total_memory", &self.total_memory)
            .field("last_resize", &self.last_resize)
            .field("last_available_for_caches", &self.last_available_for_caches)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

//! Adaptive capacity allocation for caches sharing one memory budget.
//!
//! A [`Resizer`] tree describes how the budget is split: static leaves reserve
//! fixed amounts, dynamic leaves share what is left by weight (never dropping
//! below their minimum), and composites group leaves under a weight of their
//! own. A [`CacheManager`] samples memory through a [`MemoryProbe`], derives
//! the budget, and pushes capacities down the tree with cooldown and
//! threshold hysteresis. [`spawn_monitor`] runs a manager on a tokio runtime.
//!
//! Totals are allowed to exceed the budget: floors and static reservations win
//! over strict compliance.

mod bytes;
mod error;
mod manager;
mod monitor;
mod probe;
mod resizer;
mod stats;

pub use bytes::{parse_byte_size, ParseByteSizeError, GB, KB, MB, TB};
pub use error::{ResizerError, Result};
pub use manager::{CacheManager, ManagerOptions, ResizeEvent, TickOutcome};
pub use monitor::{spawn_monitor, spawn_monitor_with_token, MonitorHandle, MonitorMessage};
pub use probe::{FnProbe, MemoryProbe, SysinfoProbe};
pub use resizer::{Resizer, ResizerUnit};
pub use stats::{utilization_percent, CacheStats, StatValue};

use std::fmt;
use std::sync::Arc;

use ballast_cache::{Allotment, DynamicCache};
use serde::{Deserialize, Serialize};

use crate::error::{ResizerError, Result};

/// Unit in which a resizer measures sizes and capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizerUnit {
    Bytes,
    Entries,
}

impl fmt::Display for ResizerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResizerUnit::Bytes => f.write_str("bytes"),
            ResizerUnit::Entries => f.write_str("entries"),
        }
    }
}

/// A node of the capacity-allocation tree.
///
/// Leaves wrap one [`Allotment`] each:
/// - a *static* leaf always receives its fixed capacity;
/// - a *dynamic* leaf receives a weighted share of what its group has left
///   after static reservations, clamped to `[min_capacity, max_capacity]`.
///
/// A *composite* groups children of one unit under a name and a weight. The
/// capacity and size it reports are the sums over its children.
///
/// Computing capacities is a pure function of the available budget and the
/// tree shape: there is no rebalancing pass, so minimums larger than their
/// proportional share make the tree allocate more than is available.
pub struct Resizer {
    name: String,
    unit: ResizerUnit,
    kind: ResizerKind,
}

enum ResizerKind {
    Static {
        capacity: i64,
        allotment: Arc<dyn Allotment>,
    },
    Dynamic {
        min_capacity: i64,
        max_capacity: i64,
        weight: u32,
        allotment: Arc<dyn Allotment>,
    },
    Composite {
        weight: u32,
        children: Vec<Resizer>,
    },
}

impl Resizer {
    /// A leaf that always receives `capacity`, whatever the budget.
    pub fn fixed(
        name: impl Into<String>,
        unit: ResizerUnit,
        capacity: i64,
        allotment: Arc<dyn Allotment>,
    ) -> Result<Self> {
        let name = name.into();
        if capacity < 0 {
            return Err(ResizerError::NegativeCapacity { name, capacity });
        }
        Ok(Self {
            name,
            unit,
            kind: ResizerKind::Static {
                capacity,
                allotment,
            },
        })
    }

    /// [`fixed`](Resizer::fixed), named after the cache it wraps.
    pub fn fixed_cache<C>(unit: ResizerUnit, capacity: i64, cache: Arc<C>) -> Result<Self>
    where
        C: DynamicCache + 'static,
    {
        let name = cache.name().to_owned();
        Self::fixed(name, unit, capacity, cache)
    }

    /// A leaf receiving a weighted share of its group's budget, never less
    /// than `min_capacity`.
    pub fn dynamic(
        name: impl Into<String>,
        unit: ResizerUnit,
        min_capacity: i64,
        weight: u32,
        allotment: Arc<dyn Allotment>,
    ) -> Result<Self> {
        Self::dynamic_bounded(name, unit, min_capacity, i64::MAX, weight, allotment)
    }

    /// [`dynamic`](Resizer::dynamic) with an upper bound on the share.
    pub fn dynamic_bounded(
        name: impl Into<String>,
        unit: ResizerUnit,
        min_capacity: i64,
        max_capacity: i64,
        weight: u32,
        allotment: Arc<dyn Allotment>,
    ) -> Result<Self> {
        let name = name.into();
        if min_capacity < 0 {
            return Err(ResizerError::NegativeMinCapacity { name, min_capacity });
        }
        if max_capacity < min_capacity {
            return Err(ResizerError::MaxBelowMin {
                name,
                min_capacity,
                max_capacity,
            });
        }
        if weight == 0 {
            return Err(ResizerError::ZeroWeight { name });
        }
        Ok(Self {
            name,
            unit,
            kind: ResizerKind::Dynamic {
                min_capacity,
                max_capacity,
                weight,
                allotment,
            },
        })
    }

    /// [`dynamic`](Resizer::dynamic), named after the cache it wraps.
    pub fn dynamic_cache<C>(
        unit: ResizerUnit,
        min_capacity: i64,
        weight: u32,
        cache: Arc<C>,
    ) -> Result<Self>
    where
        C: DynamicCache + 'static,
    {
        Self::dynamic_cache_bounded(unit, min_capacity, i64::MAX, weight, cache)
    }

    pub fn dynamic_cache_bounded<C>(
        unit: ResizerUnit,
        min_capacity: i64,
        max_capacity: i64,
        weight: u32,
        cache: Arc<C>,
    ) -> Result<Self>
    where
        C: DynamicCache + 'static,
    {
        let name = cache.name().to_owned();
        Self::dynamic_bounded(name, unit, min_capacity, max_capacity, weight, cache)
    }

    /// A named, weighted group. All children must share one unit, which
    /// becomes the group's unit.
    pub fn composite(
        name: impl Into<String>,
        weight: u32,
        children: Vec<Resizer>,
    ) -> Result<Self> {
        let name = name.into();
        let Some(unit) = children.first().map(|child| child.unit) else {
            return Err(ResizerError::EmptyComposite { name });
        };
        if let Some(mismatch) = children.iter().find(|child| child.unit != unit) {
            return Err(ResizerError::MixedUnits {
                child: mismatch.name.clone(),
                name,
                expected: unit,
                found: mismatch.unit,
            });
        }
        Ok(Self {
            name,
            unit,
            kind: ResizerKind::Composite { weight, children },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> ResizerUnit {
        self.unit
    }

    /// Weight used when sharing a group's budget; `None` for static leaves,
    /// which do not take part in sharing.
    pub fn weight(&self) -> Option<u32> {
        match &self.kind {
            ResizerKind::Static { .. } => None,
            ResizerKind::Dynamic { weight, .. } | ResizerKind::Composite { weight, .. } => {
                Some(*weight)
            }
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, ResizerKind::Static { .. })
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self.kind, ResizerKind::Composite { .. })
    }

    /// Children of a composite; empty for leaves.
    pub fn children(&self) -> &[Resizer] {
        match &self.kind {
            ResizerKind::Composite { children, .. } => children,
            _ => &[],
        }
    }

    /// Current capacity: the leaf's allotment capacity, or the sum over a
    /// composite's children.
    pub fn capacity(&self) -> i64 {
        match &self.kind {
            ResizerKind::Static { allotment, .. } | ResizerKind::Dynamic { allotment, .. } => {
                allotment.capacity()
            }
            ResizerKind::Composite { children, .. } => children
                .iter()
                .fold(0i64, |sum, child| sum.saturating_add(child.capacity())),
        }
    }

    /// Current size: what the leaf's allotment holds, or the sum over a
    /// composite's children.
    pub fn size(&self) -> i64 {
        match &self.kind {
            ResizerKind::Static { allotment, .. } | ResizerKind::Dynamic { allotment, .. } => {
                allotment.size()
            }
            ResizerKind::Composite { children, .. } => children
                .iter()
                .fold(0i64, |sum, child| sum.saturating_add(child.size())),
        }
    }

    /// Distribute `available` over the tree, push the resulting capacity into
    /// every leaf, and return the total capacity allocated.
    ///
    /// The result may exceed `available` when static reservations and
    /// minimums do not fit.
    pub fn calc_capacity_top_level(&self, available: i64) -> i64 {
        self.calc(available)
    }

    fn calc(&self, available: i64) -> i64 {
        match &self.kind {
            ResizerKind::Static {
                capacity,
                allotment,
            } => {
                self.push(allotment.as_ref(), *capacity);
                *capacity
            }
            ResizerKind::Dynamic {
                min_capacity,
                max_capacity,
                allotment,
                ..
            } => {
                let capacity = available.clamp(*min_capacity, *max_capacity);
                self.push(allotment.as_ref(), capacity);
                capacity
            }
            ResizerKind::Composite { children, .. } => {
                // Static reservations come off the top before anything is shared.
                let reserved = children
                    .iter()
                    .filter(|child| child.is_static())
                    .fold(0i64, |sum, child| sum.saturating_add(child.calc(0)));

                let remainder = available.saturating_sub(reserved);
                let total_weight: u64 = children
                    .iter()
                    .filter_map(Resizer::weight)
                    .map(u64::from)
                    .sum();

                children
                    .iter()
                    .filter(|child| !child.is_static())
                    .fold(reserved, |sum, child| {
                        let weight = child.weight().unwrap_or(0);
                        let proposed = weighted_share(remainder, weight, total_weight);
                        sum.saturating_add(child.calc(proposed))
                    })
            }
        }
    }

    fn push(&self, allotment: &dyn Allotment, capacity: i64) {
        if let Err(err) = allotment.set_capacity(capacity) {
            tracing::warn!(
                target: "ballast.memory",
                resizer = %self.name,
                capacity,
                error = %err,
                "allotment rejected capacity"
            );
        }
    }

    /// Visit every node depth-first (parents before children) together with
    /// its dotted path, e.g. `cache.stream-info.metadata`.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &Resizer),
    {
        self.walk_inner(&self.name, &mut visit);
    }

    fn walk_inner<F>(&self, path: &str, visit: &mut F)
    where
        F: FnMut(&str, &Resizer),
    {
        visit(path, self);
        for child in self.children() {
            let child_path = format!("{path}.{}", child.name);
            child.walk_inner(&child_path, visit);
        }
    }

    /// Dotted paths and nodes of every leaf, in tree order.
    pub fn leaves(&self) -> Vec<(String, &Resizer)> {
        let mut leaves = Vec::new();
        self.collect_leaves(self.name.clone(), &mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, path: String, leaves: &mut Vec<(String, &'a Resizer)>) {
        if self.is_leaf() {
            leaves.push((path, self));
            return;
        }
        for child in self.children() {
            child.collect_leaves(format!("{path}.{}", child.name), leaves);
        }
    }
}

/// `remainder * weight / total_weight`, truncated toward zero.
fn weighted_share(remainder: i64, weight: u32, total_weight: u64) -> i64 {
    if total_weight == 0 {
        return 0;
    }
    let share = i128::from(remainder) * i128::from(weight) / i128::from(total_weight);
    // |share| <= |remainder| because weight <= total_weight.
    share as i64
}

impl fmt::Debug for Resizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Resizer");
        debug.field("name", &self.name).field("unit", &self.unit);
        match &self.kind {
            ResizerKind::Static { capacity, .. } => {
                debug.field("kind", &"static").field("capacity", capacity);
            }
            ResizerKind::Dynamic {
                min_capacity,
                max_capacity,
                weight,
                ..
            } => {
                debug
                    .field("kind", &"dynamic")
                    .field("min_capacity", min_capacity)
                    .field("max_capacity", max_capacity)
                    .field("weight", weight);
            }
            ResizerKind::Composite { weight, children } => {
                debug
                    .field("kind", &"composite")
                    .field("weight", weight)
                    .field("children", children);
            }
        }
        debug.finish()
    }
}

use std::sync::Arc;

use ballast_cache::{Allotment, DynamicCache, DynamicLruCache, TrackedAllotment};
use ballast_memory::{CacheStats, Resizer, ResizerError, ResizerUnit, StatValue};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::support::allotment;

const BYTES: ResizerUnit = ResizerUnit::Bytes;

#[test]
fn static_reservation_comes_off_the_top() {
    let a = allotment();
    let b = allotment();
    let root = Resizer::composite(
        "root",
        100,
        vec![
            Resizer::fixed("a", BYTES, 1_000, a.clone()).unwrap(),
            Resizer::dynamic("b", BYTES, 1_000, 60, b.clone()).unwrap(),
        ],
    )
    .unwrap();

    let total = root.calc_capacity_top_level(10_000);

    assert_eq!(a.capacity(), 1_000);
    assert_eq!(b.capacity(), 9_000);
    assert_eq!(total, 10_000);
    assert_eq!(root.capacity(), 10_000);
}

#[test]
fn minimums_win_over_proportional_share() {
    let a = allotment();
    let b = allotment();
    let root = Resizer::composite(
        "root",
        100,
        vec![
            Resizer::dynamic("a", BYTES, 3_000, 40, a.clone()).unwrap(),
            Resizer::dynamic("b", BYTES, 1_000, 60, b.clone()).unwrap(),
        ],
    )
    .unwrap();

    let total = root.calc_capacity_top_level(5_000);

    assert_eq!(a.capacity(), 3_000);
    assert_eq!(b.capacity(), 3_000);
    // Overflow is accepted rather than rebalanced.
    assert_eq!(total, 6_000);
}

#[test]
fn reservations_larger_than_budget_leave_dynamic_leaves_at_their_floor() {
    let fixed = allotment();
    let elastic = allotment();
    let root = Resizer::composite(
        "root",
        1,
        vec![
            Resizer::fixed("fixed", BYTES, 1_000, fixed.clone()).unwrap(),
            Resizer::dynamic("elastic", BYTES, 10, 1, elastic.clone()).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(root.calc_capacity_top_level(500), 1_010);
    assert_eq!(fixed.capacity(), 1_000);
    assert_eq!(elastic.capacity(), 10);

    assert_eq!(root.calc_capacity_top_level(0), 1_010);
}

#[test]
fn top_level_dynamic_is_clamped_to_its_bounds() {
    let leaf = allotment();
    let resizer = Resizer::dynamic_bounded("solo", BYTES, 100, 1_000, 1, leaf.clone()).unwrap();

    assert_eq!(resizer.calc_capacity_top_level(50), 100);
    assert_eq!(resizer.calc_capacity_top_level(500), 500);
    assert_eq!(resizer.calc_capacity_top_level(5_000), 1_000);
    assert_eq!(leaf.capacity(), 1_000);
}

#[test]
fn nested_composite_shares_its_proposed_amount() {
    let reserved = allotment();
    let x = allotment();
    let y = allotment();
    let z = allotment();
    let group = Resizer::composite(
        "group",
        1,
        vec![
            Resizer::dynamic("x", BYTES, 0, 1, x.clone()).unwrap(),
            Resizer::dynamic("y", BYTES, 0, 3, y.clone()).unwrap(),
        ],
    )
    .unwrap();
    let root = Resizer::composite(
        "root",
        100,
        vec![
            Resizer::fixed("reserved", BYTES, 100, reserved.clone()).unwrap(),
            group,
            Resizer::dynamic("z", BYTES, 0, 1, z.clone()).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(root.calc_capacity_top_level(1_100), 1_100);
    assert_eq!(reserved.capacity(), 100);
    assert_eq!(x.capacity(), 125);
    assert_eq!(y.capacity(), 375);
    assert_eq!(z.capacity(), 500);
    assert_eq!(root.children()[1].capacity(), 500);
}

#[test]
fn shares_truncate_toward_zero() {
    let a = allotment();
    let b = allotment();
    let c = allotment();
    let root = Resizer::composite(
        "root",
        1,
        vec![
            Resizer::dynamic("a", BYTES, 0, 1, a.clone()).unwrap(),
            Resizer::dynamic("b", BYTES, 0, 1, b.clone()).unwrap(),
            Resizer::dynamic("c", BYTES, 0, 1, c.clone()).unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(root.calc_capacity_top_level(10), 9);
    assert_eq!((a.capacity(), b.capacity(), c.capacity()), (3, 3, 3));
}

#[test]
fn composite_of_only_statics_ignores_budget() {
    let a = allotment();
    let root = Resizer::composite(
        "root",
        0,
        vec![Resizer::fixed("a", BYTES, 42, a.clone()).unwrap()],
    )
    .unwrap();

    assert_eq!(root.calc_capacity_top_level(1_000_000), 42);
    assert_eq!(a.capacity(), 42);
}

#[test]
fn zero_weight_composite_child_receives_nothing_but_floors() {
    let starved = allotment();
    let fed = allotment();
    let root = Resizer::composite(
        "root",
        1,
        vec![
            Resizer::composite(
                "idle",
                0,
                vec![Resizer::dynamic("starved", BYTES, 5, 1, starved.clone()).unwrap()],
            )
            .unwrap(),
            Resizer::dynamic("fed", BYTES, 0, 1, fed.clone()).unwrap(),
        ],
    )
    .unwrap();

    root.calc_capacity_top_level(1_000);
    assert_eq!(starved.capacity(), 5);
    assert_eq!(fed.capacity(), 1_000);
}

#[test]
fn calc_is_repeatable() {
    let a = allotment();
    let b = allotment();
    let root = Resizer::composite(
        "root",
        1,
        vec![
            Resizer::dynamic("a", BYTES, 7, 2, a.clone()).unwrap(),
            Resizer::dynamic("b", BYTES, 0, 5, b.clone()).unwrap(),
        ],
    )
    .unwrap();

    let first = root.calc_capacity_top_level(12_345);
    let snapshot = (a.capacity(), b.capacity());
    let second = root.calc_capacity_top_level(12_345);

    assert_eq!(first, second);
    assert_eq!(snapshot, (a.capacity(), b.capacity()));
}

#[test]
fn capacity_push_evicts_from_cache_leaves() {
    let cache = Arc::new(DynamicLruCache::new("stream-info", 100).unwrap());
    for key in 0..10 {
        cache.put(key, key);
    }
    let resizer = Resizer::dynamic_cache(ResizerUnit::Entries, 0, 1, cache.clone()).unwrap();
    assert_eq!(resizer.name(), "stream-info");

    resizer.calc_capacity_top_level(4);

    assert_eq!(cache.len(), 4);
    assert_eq!(cache.freed_size(), 6);
    assert_eq!(resizer.size(), 4);
    assert!(cache.contains(&9));
    assert!(!cache.contains(&0));
}

#[test]
fn composite_size_sums_live_leaf_sizes() {
    let a = allotment();
    let b = allotment();
    let root = Resizer::composite(
        "root",
        1,
        vec![
            Resizer::fixed("a", BYTES, 10, a.clone()).unwrap(),
            Resizer::dynamic("b", BYTES, 0, 1, b.clone()).unwrap(),
        ],
    )
    .unwrap();

    a.set_size(3);
    b.set_size(4);
    assert_eq!(root.size(), 7);

    b.add_size(10);
    assert_eq!(root.size(), 17);
}

#[test]
fn construction_errors() {
    let leaf: Arc<dyn Allotment> = allotment();

    assert_eq!(
        Resizer::fixed("f", BYTES, -1, leaf.clone()).unwrap_err(),
        ResizerError::NegativeCapacity {
            name: "f".into(),
            capacity: -1,
        }
    );
    assert_eq!(
        Resizer::dynamic("d", BYTES, -5, 1, leaf.clone()).unwrap_err(),
        ResizerError::NegativeMinCapacity {
            name: "d".into(),
            min_capacity: -5,
        }
    );
    assert_eq!(
        Resizer::dynamic("d", BYTES, 0, 0, leaf.clone()).unwrap_err(),
        ResizerError::ZeroWeight { name: "d".into() }
    );
    assert_eq!(
        Resizer::dynamic_bounded("d", BYTES, 10, 9, 1, leaf.clone()).unwrap_err(),
        ResizerError::MaxBelowMin {
            name: "d".into(),
            min_capacity: 10,
            max_capacity: 9,
        }
    );
    assert_eq!(
        Resizer::composite("empty", 1, Vec::new()).unwrap_err(),
        ResizerError::EmptyComposite {
            name: "empty".into()
        }
    );

    let mixed = Resizer::composite(
        "mixed",
        1,
        vec![
            Resizer::fixed("bytes", ResizerUnit::Bytes, 1, leaf.clone()).unwrap(),
            Resizer::fixed("entries", ResizerUnit::Entries, 1, leaf).unwrap(),
        ],
    );
    assert_eq!(
        mixed.unwrap_err(),
        ResizerError::MixedUnits {
            name: "mixed".into(),
            child: "entries".into(),
            expected: ResizerUnit::Bytes,
            found: ResizerUnit::Entries,
        }
    );
}

#[test]
fn composite_inherits_unit_of_children() {
    let group = Resizer::composite(
        "group",
        1,
        vec![Resizer::fixed("e", ResizerUnit::Entries, 1, allotment()).unwrap()],
    )
    .unwrap();
    assert_eq!(group.unit(), ResizerUnit::Entries);

    let err = Resizer::composite(
        "root",
        1,
        vec![
            group,
            Resizer::fixed("b", ResizerUnit::Bytes, 1, allotment()).unwrap(),
        ],
    )
    .unwrap_err();
    assert!(matches!(err, ResizerError::MixedUnits { .. }));
    assert!(err.to_string().contains("sized in bytes"));
}

fn sample_tree() -> Resizer {
    Resizer::composite(
        "cache",
        100,
        vec![
            Resizer::fixed("chunks", BYTES, 100, allotment()).unwrap(),
            Resizer::composite(
                "stream-info",
                1,
                vec![
                    Resizer::dynamic("metadata", BYTES, 0, 1, allotment()).unwrap(),
                    Resizer::dynamic("index", BYTES, 0, 1, allotment()).unwrap(),
                ],
            )
            .unwrap(),
        ],
    )
    .unwrap()
}

#[test]
fn walk_visits_parents_before_children_with_dotted_paths() {
    let root = sample_tree();
    let mut paths = Vec::new();
    root.walk(|path, _| paths.push(path.to_owned()));

    assert_eq!(
        paths,
        vec![
            "cache",
            "cache.chunks",
            "cache.stream-info",
            "cache.stream-info.metadata",
            "cache.stream-info.index",
        ]
    );

    let leaves: Vec<String> = root.leaves().into_iter().map(|(path, _)| path).collect();
    assert_eq!(
        leaves,
        vec![
            "cache.chunks",
            "cache.stream-info.metadata",
            "cache.stream-info.index",
        ]
    );
}

#[test]
fn stats_report_every_node() {
    let chunks = Arc::new(TrackedAllotment::new(0).unwrap());
    let metadata = Arc::new(
        DynamicLruCache::with_sizer("metadata", 0, |_: &u32, v: &Vec<u8>| v.len() as i64).unwrap(),
    );
    let root = Resizer::composite(
        "cache",
        100,
        vec![
            Resizer::fixed("chunks", BYTES, 200, chunks.clone()).unwrap(),
            Resizer::composite(
                "stream-info",
                1,
                vec![Resizer::dynamic_cache(BYTES, 0, 1, metadata.clone()).unwrap()],
            )
            .unwrap(),
        ],
    )
    .unwrap();

    root.calc_capacity_top_level(1_000);
    chunks.set_size(50);
    metadata.put(1, vec![0; 200]);

    let stats = CacheStats::collect(&root);
    assert_eq!(stats.len(), 4 * 4);
    assert_eq!(
        stats.get("cache.chunks.utilizationPercent"),
        Some(&StatValue::F64(25.0))
    );
    assert_eq!(
        stats.get("cache.stream-info.metadata.name"),
        Some(&StatValue::Str("metadata".into()))
    );
    assert_eq!(
        stats
            .get("cache.stream-info.capacityBytes")
            .and_then(StatValue::as_i64),
        Some(800)
    );
    assert_eq!(
        stats.get("cache.sizeBytes").and_then(StatValue::as_i64),
        Some(250)
    );
    assert_eq!(
        stats.get("cache.capacityBytes").and_then(StatValue::as_i64),
        Some(1_000)
    );
}

#[test]
fn stats_before_first_resize_report_zero_utilization() {
    let stats = CacheStats::collect(&sample_tree());
    assert_eq!(
        stats
            .get("cache.stream-info.index.utilizationPercent")
            .and_then(StatValue::as_f64),
        Some(0.0)
    );
}

#[derive(Debug, Clone)]
enum Leaf {
    Fixed(i64),
    Dynamic { min: i64, weight: u32 },
}

fn leaf() -> impl Strategy<Value = Leaf> {
    prop_oneof![
        (0i64..1_000).prop_map(Leaf::Fixed),
        (0i64..1_000, 1u32..100).prop_map(|(min, weight)| Leaf::Dynamic { min, weight }),
    ]
}

proptest! {
    #[test]
    fn floors_and_sums_hold_for_any_budget(
        leaves in prop::collection::vec(leaf(), 1..8),
        available in -10_000i64..1_000_000,
    ) {
        let allotments: Vec<Arc<TrackedAllotment>> = leaves.iter().map(|_| allotment()).collect();
        let children = leaves
            .iter()
            .zip(&allotments)
            .enumerate()
            .map(|(idx, (leaf, allotment))| match leaf {
                Leaf::Fixed(capacity) => {
                    Resizer::fixed(format!("leaf{idx}"), BYTES, *capacity, allotment.clone())
                }
                Leaf::Dynamic { min, weight } => {
                    Resizer::dynamic(format!("leaf{idx}"), BYTES, *min, *weight, allotment.clone())
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        let root = Resizer::composite("root", 1, children).unwrap();

        let total = root.calc_capacity_top_level(available);

        let mut sum = 0;
        for (leaf, allotment) in leaves.iter().zip(&allotments) {
            let capacity = allotment.capacity();
            match leaf {
                Leaf::Fixed(fixed) => {
                    prop_assert_eq!(capacity, *fixed);
                }
                Leaf::Dynamic { min, .. } => {
                    prop_assert!(capacity >= *min);
                }
            }
            sum += capacity;
        }
        prop_assert_eq!(total, sum);
        prop_assert_eq!(root.capacity(), sum);

        let reserved: i64 = leaves
            .iter()
            .map(|leaf| match leaf {
                Leaf::Fixed(capacity) => *capacity,
                Leaf::Dynamic { min, .. } => *min,
            })
            .sum();
        prop_assert!(total <= available.max(0) + reserved);
    }
}

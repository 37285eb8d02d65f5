use std::collections::HashSet;

use pack_it_now::geometry::{find_overlap, is_contained, max_floor_bands};
use pack_it_now::model::{BinType, BinTypeRecord, ItemRecord, PackResult, UnitItem, UnplacedReason};
use pack_it_now::optimizer::{Objective, PackOptions, form_piles, pack, pack_records};
use pack_it_now::types::{EPSILON_GENERAL, Vec3};
use proptest::prelude::*;

fn bin(code: &str, dims: (f64, f64, f64), cost: f64) -> BinTypeRecord {
    BinTypeRecord::new(code, format!("Bin {code}"), dims, cost)
}

#[test]
fn exact_fit_fills_one_bin() {
    let result = pack_records(
        &[ItemRecord::new("A", 24.0, 10.0, 8.0)],
        &[bin("S", (24.0, 10.0, 8.0), 10.0)],
        &PackOptions::default(),
    );

    assert_eq!(result.stats.used_bins, 1);
    assert_eq!(result.bins[0].placements[0].position, Vec3::zero());
    assert!((result.bins[0].fill_rate - 1.0).abs() < EPSILON_GENERAL);
    assert!(result.is_complete());
}

#[test]
fn overflowing_volume_uses_several_bins() {
    let items = [
        ItemRecord::new("A", 50.0, 50.0, 50.0).with_quantity(5.0),
        ItemRecord::new("B", 30.0, 20.0, 25.0).with_quantity(4.0),
    ];
    let result = pack_records(
        &items,
        &[bin("V", (100.0, 50.0, 50.0), 100.0)],
        &PackOptions::default(),
    );

    assert!(result.stats.used_bins >= 2);
    assert_eq!(result.stats.unplaced_count, 0);
    let cost: f64 = result.bins.iter().map(|b| b.bin_type.cost).sum();
    assert_eq!(result.stats.total_cost, cost);
    assert_eq!(result.placed_count(), 9);
}

#[test]
fn overlong_item_commits_no_bins() {
    let items = [
        ItemRecord::new("A", 10.0, 10.0, 10.0).with_quantity(2.0),
        ItemRecord::new("LONG", 700.0, 10.0, 10.0),
    ];
    let result = pack_records(
        &items,
        &[bin("48", (576.0, 100.0, 96.0), 700.0), bin("53", (636.0, 100.0, 96.0), 800.0)],
        &PackOptions::default(),
    );

    assert_eq!(result.stats.used_bins, 0);
    assert_eq!(result.stats.unplaced_count, 3);
    assert!(result.bins.is_empty());
}

#[test]
fn overlong_item_is_left_alone_when_rotation_is_allowed() {
    let items = [
        ItemRecord::new("A", 10.0, 10.0, 10.0).with_quantity(2.0),
        ItemRecord::new("B", 20.0, 15.0, 10.0),
        ItemRecord::new("LONG", 700.0, 10.0, 10.0),
    ];
    let options = PackOptions::builder().lock_axes_fully(false).build();
    let result = pack_records(
        &items,
        &[bin("48", (576.0, 100.0, 96.0), 700.0), bin("53", (636.0, 100.0, 96.0), 800.0)],
        &options,
    );

    // Turned on its side LONG is 10 long, so the batch still packs.
    assert_eq!(result.stats.used_bins, 1);
    assert_eq!(result.bins[0].bin_type.code, "48");
    assert_eq!(result.placed_count(), 3);
    assert_eq!(result.stats.unplaced_count, 1);
    assert_eq!(result.unplaced[0].item.id, "LONG-1");
    assert_eq!(result.unplaced[0].reason, UnplacedReason::DimensionsExceedBins);
}

#[test]
fn equal_heights_form_two_piles_under_cap() {
    let items: Vec<UnitItem> = (1..=3)
        .map(|n| UnitItem::new(format!("A-{n}"), "A", Vec3::new(10.0, 5.0, 10.0)))
        .collect();
    let piles = form_piles(&items, 20.0, true);

    let heights: Vec<f64> = piles.iter().map(|p| p.height).collect();
    assert_eq!(heights, vec![20.0, 10.0]);
}

#[test]
fn no_usable_bins_leaves_everything_unplaced() {
    let result = pack_records(
        &[ItemRecord::new("A", 5.0, 5.0, 5.0).with_quantity(2.0)],
        &[bin("X", (0.0, 10.0, 10.0), 1.0)],
        &PackOptions::default(),
    );

    assert!(result.bins.is_empty());
    assert_eq!(result.stats.unplaced_count, 2);
    assert!(
        result
            .unplaced
            .iter()
            .all(|u| u.reason == UnplacedReason::DimensionsExceedBins)
    );
}

#[test]
fn partial_success_keeps_committed_bins() {
    let items = [
        ItemRecord::new("A", 10.0, 10.0, 10.0).with_quantity(2.0),
        ItemRecord::new("TALL", 5.0, 4.0, 30.0),
    ];
    let result = pack_records(&items, &[bin("S", (10.0, 10.0, 10.0), 5.0)], &PackOptions::default());

    assert_eq!(result.stats.used_bins, 2);
    assert_eq!(result.stats.unplaced_count, 1);
    assert_eq!(result.unplaced[0].item.id, "TALL-1");
    assert_eq!(result.unplaced[0].reason, UnplacedReason::DimensionsExceedBins);
}

#[test]
fn single_bin_shortcut_picks_cheapest_even_under_min_cost() {
    let items = [ItemRecord::new("A", 10.0, 10.0, 10.0).with_quantity(2.0)];
    let catalog = [
        bin("ROOMY", (40.0, 10.0, 10.0), 30.0),
        bin("SNUG", (20.0, 10.0, 10.0), 20.0),
    ];
    let options = PackOptions::builder().objective(Objective::MinCost).build();
    let result = pack_records(&items, &catalog, &options);

    assert_eq!(result.stats.used_bins, 1);
    assert_eq!(result.bins[0].bin_type.code, "SNUG");
}

fn item_strategy() -> impl Strategy<Value = Vec<UnitItem>> {
    (
        prop::collection::vec((1u8..=30, 1u8..=30, 1u8..=30), 1..10),
        any::<bool>(),
    )
        .prop_map(|(dims, uniform)| {
            let width = f64::from(dims[0].1);
            dims.into_iter()
                .enumerate()
                .map(|(n, (l, w, h))| {
                    let w = if uniform { width } else { f64::from(w) };
                    UnitItem::new(format!("P-{}", n + 1), "P", Vec3::new(f64::from(l), w, f64::from(h)))
                })
                .collect()
        })
}

fn catalog_strategy() -> impl Strategy<Value = Vec<BinType>> {
    prop::collection::vec((20u8..=60, 20u8..=60, 20u8..=60, 1u8..=100), 1..3).prop_map(|bins| {
        bins.into_iter()
            .enumerate()
            .filter_map(|(n, (l, w, h, cost))| {
                BinType::new(
                    format!("B{n}"),
                    format!("Bin {n}"),
                    Vec3::new(f64::from(l), f64::from(w), f64::from(h)),
                    f64::from(cost),
                )
            })
            .collect()
    })
}

fn options_strategy() -> impl Strategy<Value = PackOptions> {
    (
        prop_oneof![Just(0.0), Just(0.5), Just(1.0)],
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        prop::option::of(15u8..=40),
        any::<bool>(),
    )
        .prop_map(|(clearance, keep_z_base, lock, forbid_z, cap, min_cost)| {
            PackOptions::builder()
                .clearance(clearance)
                .keep_z_base(keep_z_base)
                .lock_axes_fully(lock)
                .forbid_z_rotation(forbid_z)
                .max_stack_height(cap.map(f64::from))
                .objective(if min_cost { Objective::MinCost } else { Objective::MinVans })
                .build()
        })
}

fn placed_ids(result: &PackResult) -> Vec<String> {
    result
        .bins
        .iter()
        .flat_map(|b| b.placements.iter().map(|p| p.item.id.clone()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn layouts_respect_geometry(
        items in item_strategy(),
        catalog in catalog_strategy(),
        options in options_strategy(),
    ) {
        let result = pack(items, catalog, &options);

        for committed in &result.bins {
            prop_assert!(committed.placed_count() > 0);
            prop_assert_eq!(find_overlap(&committed.placements, options.clearance), None);
            for placement in &committed.placements {
                prop_assert!(is_contained(placement, &committed.bin_type));
                prop_assert!(placement.top_z() <= options.height_cap(&committed.bin_type) + EPSILON_GENERAL);
                if options.keep_z_base {
                    prop_assert!(placement.position.z.abs() <= EPSILON_GENERAL);
                }
            }
            prop_assert!(max_floor_bands(&committed.placements) <= 2);
            prop_assert!(committed.used_volume() <= committed.bin_type.volume() + EPSILON_GENERAL);
            prop_assert!((0.0..=1.0).contains(&committed.fill_rate));
        }
    }

    #[test]
    fn every_item_is_accounted_once(
        items in item_strategy(),
        catalog in catalog_strategy(),
        options in options_strategy(),
    ) {
        let expected: HashSet<String> = items.iter().map(|i| i.id.clone()).collect();
        let result = pack(items, catalog, &options);

        let mut seen: Vec<String> = placed_ids(&result);
        seen.extend(result.unplaced.iter().map(|u| u.item.id.clone()));
        prop_assert_eq!(seen.len(), expected.len());
        prop_assert_eq!(seen.into_iter().collect::<HashSet<_>>(), expected);

        let cost: f64 = result.bins.iter().map(|b| b.bin_type.cost).sum();
        prop_assert_eq!(result.stats.total_cost, cost);
        prop_assert_eq!(result.stats.used_bins, result.bins.len());
        prop_assert_eq!(result.stats.unplaced_count, result.unplaced.len());
    }

    #[test]
    fn packing_is_deterministic(
        items in item_strategy(),
        catalog in catalog_strategy(),
        options in options_strategy(),
    ) {
        let first = pack(items.clone(), catalog.clone(), &options);
        let second = pack(items, catalog, &options);
        prop_assert_eq!(first, second);
    }
}

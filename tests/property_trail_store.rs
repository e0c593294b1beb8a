//! Property tests for the trail ledger.

use chrono::{Duration, Utc};
use mender::domain::models::{path_key, split_path_key, TrailConfig};
use mender::services::TrailStore;
use proptest::prelude::*;
use std::collections::HashSet;

fn node_name(i: usize) -> String {
    format!("n{i}")
}

proptest! {
    /// Property: greedy walks never revisit a node, whatever the edge set.
    #[test]
    fn prop_build_path_is_cycle_free(
        edges in prop::collection::vec((0usize..8, 0usize..8, 0.1f64..50.0), 0..40),
        start in 0usize..8,
        hops in 0usize..10,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let store = TrailStore::with_defaults();
            let now = Utc::now();
            for (from, to, amount) in &edges {
                let key = path_key(&node_name(*from), &node_name(*to));
                store.deposit_at(&key, *amount, now).await;
            }

            let walk = store.build_path(&node_name(start), hops, now).await;

            let mut seen = HashSet::new();
            for node in &walk {
                prop_assert!(seen.insert(node.clone()), "node {node} revisited in {walk:?}");
            }
            let start_name = node_name(start);
            prop_assert_eq!(walk.first().map(String::as_str), Some(start_name.as_str()));
            prop_assert!(walk.len() <= hops + 1);
            Ok(())
        })?;
    }

    /// Property: strength never exceeds the clamp and never goes negative,
    /// for any interleaving of deposits, penalties, and elapsed time.
    #[test]
    fn prop_strength_stays_in_bounds(
        deposits in prop::collection::vec((-20.0f64..20.0, 0i64..100_000), 1..50),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let config = TrailConfig {
                max_strength: 10.0,
                half_life_secs: 3600.0,
                prune_floor_fraction: 0.001,
            };
            let store = TrailStore::new(config);
            let key = path_key("restart", "ops");
            let base = Utc::now();

            let mut clock = base;
            for (amount, advance_secs) in &deposits {
                clock += Duration::seconds(*advance_secs);
                store.deposit_at(&key, *amount, clock).await;
                let strength = store.strength_of_at(&key, clock).await;
                prop_assert!((0.0..=10.0).contains(&strength), "strength {strength} out of bounds");
            }
            Ok(())
        })?;
    }

    /// Property: path keys round-trip through split for any node names that
    /// avoid the separator character.
    #[test]
    fn prop_path_key_round_trips(
        from in "[a-z0-9_-]{1,12}",
        to in "[a-z0-9_-]{1,12}",
    ) {
        let key = path_key(&from, &to);
        let (f, t) = split_path_key(&key).expect("separator always present");
        prop_assert_eq!(f, from.as_str());
        prop_assert_eq!(t, to.as_str());
    }
}

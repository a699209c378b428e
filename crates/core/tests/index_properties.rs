use geopin::compute::{DistanceMetric, distance};
use geopin::index::SpatialIndex;
use geopin_types::{Location, Marker};
use proptest::prelude::*;

fn offsets() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-0.5f64..0.5, -0.5f64..0.5), 1..60)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The index returns exactly the markers a brute-force scan finds.
    #[test]
    fn prop_radius_query_matches_linear_scan(
        lat in -60.0f64..60.0,
        lon in -170.0f64..170.0,
        radius in 10.0f64..50_000.0,
        points in offsets(),
        haversine in any::<bool>(),
    ) {
        let metric = if haversine { DistanceMetric::Haversine } else { DistanceMetric::Geodesic };
        let index = SpatialIndex::new(metric);
        let center = Location { lat, lon };

        let markers: Vec<Marker> = points
            .iter()
            .enumerate()
            .map(|(i, (dlat, dlon))| {
                let loc = Location { lat: lat + dlat, lon: lon + dlon };
                Marker::new(format!("m{}", i), loc, 25.0).unwrap()
            })
            .collect();

        prop_assert_eq!(index.insert_many(markers.clone()), markers.len());

        let mut expected: Vec<String> = markers
            .iter()
            .filter(|m| distance(&center, &m.location, metric) <= radius)
            .map(|m| m.id.clone())
            .collect();
        expected.sort();

        let hits = index.query_by_radius(&center, radius).unwrap();
        prop_assert!(hits.windows(2).all(|w| w[0].distance_m <= w[1].distance_m));

        let mut found: Vec<String> = hits.into_iter().map(|h| h.marker.id).collect();
        found.sort();
        prop_assert_eq!(found, expected);
    }

    /// Stats stay consistent across arbitrary insert/remove sequences.
    #[test]
    fn prop_stats_consistent(ops in prop::collection::vec((0u8..20, any::<bool>()), 0..200)) {
        let index = SpatialIndex::default();
        let mut live = std::collections::HashSet::new();

        for (id, insert) in ops {
            let key = format!("pin_{}", id);
            if insert {
                let loc = Location { lat: id as f64, lon: -(id as f64) };
                index.insert(Marker::new(key.clone(), loc, 10.0).unwrap());
                live.insert(key);
            } else {
                prop_assert_eq!(index.remove(&key), live.remove(&key));
            }
        }

        let stats = index.stats();
        prop_assert_eq!(stats.total_pins, live.len());
        prop_assert_eq!(stats.index_size, live.len());
    }
}

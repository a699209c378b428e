//! Pure geometry: coordinate validation, distances, geodesic buffers and path sampling.
//!
//! Nothing here touches shared state, so the spatial index and the enrichment
//! pipeline can rely on these functions being independently tested.

pub mod geodesic;
pub mod validation;

pub use geodesic::{
    DistanceMetric, buffer_bbox, distance, path_length, round_key, sample_path,
};

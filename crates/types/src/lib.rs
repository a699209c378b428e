//! # geopin-types
//!
//! Core data types shared by the geopin engine and its RPC surface:
//!
//! - **Location**: a validated latitude/longitude pair
//! - **Marker**: a radius-bounded pin with category, payload and provenance
//! - **BoundingBox**: a west/south/east/north rectangle in degrees
//!
//! All types are serializable with Serde and convert into the `geo` crate's
//! primitives where geometry is needed.
//!
//! ## Examples
//!
//! ```rust
//! use geopin_types::location::Location;
//! use geopin_types::marker::{Category, Marker};
//!
//! let big_ben = Location::new(51.5007, -0.1246).unwrap();
//! let pin = Marker::builder("big-ben", big_ben, 75.0)
//!     .category(Category::Landmark)
//!     .name("Big Ben")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(pin.payload.name, "Big Ben");
//! ```

pub mod bbox;
pub mod error;
pub mod location;
pub mod marker;

pub use bbox::BoundingBox;
pub use error::TypeError;
pub use location::Location;
pub use marker::{Category, Marker, MarkerBuilder, MarkerPayload, Provenance};

//! Common types shared across the raster index and sampling crates.

pub mod bbox;
pub mod error;
pub mod geocell;
pub mod geometry;
pub mod time;

pub use bbox::{BboxParseError, BoundingBox};
pub use error::{GeometryError, TimeParseError};
pub use geocell::GeocellKey;
pub use geometry::QueryGeometry;
pub use time::{mean_timestamp, parse_timestamp, TimeWindow};

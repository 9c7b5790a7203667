pub mod config;
pub mod data;
pub mod encode;
pub mod errors;
pub mod etl;
pub mod pbf;
pub mod serializer;

pub use config::{SerializerConfig, UserConfig};
pub use errors::{Error, Result};
pub use serializer::{PbfSerializer, SerializerStats, Sink};

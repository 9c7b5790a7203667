//! OSM PBF wire messages and the file framing around them.

pub mod block_output;
pub mod fileformat;
pub mod osmformat;

/// Required feature every block in this format depends on.
pub const OSM_SCHEMA_V06: &str = "OsmSchema-V0.6";
/// Required feature announced when nodes are packed densely.
pub const DENSE_NODES: &str = "DenseNodes";

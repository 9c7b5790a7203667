use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::errors::Result;
use crate::pbf::block_output::Compression;

pub const DEFAULT_BATCH_LIMIT: usize = 8000;
/// Coordinate resolution in nanodegrees.
pub const DEFAULT_GRANULARITY: i32 = 100;
/// Timestamp resolution in milliseconds.
pub const DEFAULT_DATE_GRANULARITY: i32 = 1000;
pub const DEFAULT_OUTPUT_FILE_NAME: &str = "map.osm.pbf";

/// Encoding options, fixed for the lifetime of one serializer.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SerializerConfig {
    pub use_dense_nodes: bool,
    pub omit_metadata: bool,
    pub batch_limit: usize,
    pub granularity: i32,
    pub date_granularity: i32,
    pub writing_program: Option<String>,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        SerializerConfig {
            use_dense_nodes: true,
            omit_metadata: false,
            batch_limit: DEFAULT_BATCH_LIMIT,
            granularity: DEFAULT_GRANULARITY,
            date_granularity: DEFAULT_DATE_GRANULARITY,
            writing_program: Some(env!("CARGO_PKG_NAME").to_string()),
        }
    }
}

impl SerializerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_limit == 0 {
            return Err("batch_limit must be greater than zero".into());
        }
        if self.granularity <= 0 {
            return Err(format!("granularity must be positive, got {}", self.granularity).into());
        }
        if self.date_granularity <= 0 {
            return Err(format!("date_granularity must be positive, got {}", self.date_granularity).into());
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    pub data_path: String,
    pub dest_path: String,
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub progress: bool,
    /// Rebuild the output even if it already exists.
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub serializer: SerializerConfig,
}

fn default_output_file_name() -> String {
    DEFAULT_OUTPUT_FILE_NAME.to_string()
}

impl UserConfig {
    pub fn from_reader(reader: impl std::io::Read) -> Result<UserConfig> {
        let config: UserConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<UserConfig> {
        let file = File::open(path)
            .map_err(|err| format!("Could not open config file {}: {}", path.display(), err))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn validate(&self) -> Result<()> {
        self.serializer.validate()?;
        self.compression.validate()
    }
}

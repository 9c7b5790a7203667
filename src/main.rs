use std::env;
use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_pbf_serializer::config::UserConfig;
use osm_pbf_serializer::errors::Result;
use osm_pbf_serializer::etl::write_pbf::WritePbfEtl;
use osm_pbf_serializer::etl::Etl;

const DEFAULT_CONFIG_PATH: &str = "config/default.json";

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let output_dir = PathBuf::from(&config.dest_path);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging() {
    Builder::with_level("info")
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    setup_logging();

    let config_path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!(config_path = config_path.as_str(); "Loading configuration");
    let user_config = UserConfig::load(Path::new(&config_path))?;
    let output_dir = create_output_dir(&user_config)?;

    let mut etl = WritePbfEtl::new(&user_config);
    if user_config.overwrite {
        etl.reprocess(&output_dir)?;
    } else {
        etl.process(&output_dir)?;
    }

    Ok(())
}

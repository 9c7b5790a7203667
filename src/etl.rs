pub mod parse_osm;
pub mod write_pbf;

use std::path::Path;
use std::time::Instant;
use log::{info, error};

use crate::errors::Result;

/// One extract/transform/load step whose result is materialised in `dir`.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path) -> Result<()> {
        let etl_name = self.etl_name().to_string();
        if self.is_cached(dir)? {
            info!(etl_name = etl_name.as_str(); "Using cached value");
            return Ok(());
        }
        let input = run_stage(&etl_name, "extract", || self.extract(dir))?;
        let output = run_stage(&etl_name, "transform", || self.transform(input))?;
        run_stage(&etl_name, "load", || self.load(dir, output))?;
        info!(etl_name = etl_name.as_str(); "Process finished");
        Ok(())
    }

    /// Drops any cached result before processing again.
    fn reprocess(&mut self, dir: &Path) -> Result<()> {
        self.clean(dir)?;
        self.process(dir)
    }
}

fn run_stage<T>(etl_name: &str, stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    info!(etl_name = etl_name, stage = stage; "Starting stage");
    let started = Instant::now();
    match f() {
        Ok(value) => {
            info!(etl_name = etl_name, stage = stage, elapsed_ms = started.elapsed().as_millis() as u64; "Stage finished");
            Ok(value)
        },
        Err(err) => {
            error!(etl_name = etl_name, stage = stage, err = err.message.as_str(); "Stage failed with error");
            Err(err)
        },
    }
}

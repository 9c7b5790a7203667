use log::{info, warn};

use crate::config::SerializerConfig;
use crate::data::osm::Entity;
use crate::encode::batcher::{Batched, Batcher};
use crate::encode::block::BlockEmitter;
use crate::errors::Result;
use crate::pbf::block_output::BlockOutput;

/// Consumer of a single pass entity stream.
pub trait Sink {
    fn process(&mut self, entity: Entity) -> Result<()>;

    /// Called once the stream is exhausted. Anything still buffered is
    /// written before this returns.
    fn complete(&mut self) -> Result<()>;

    /// Releases the underlying resources.
    fn release(self) where Self: Sized;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SerializerStats {
    pub entities: u64,
    pub header_blocks: u64,
    pub data_blocks: u64,
}

/// Writes an entity stream as OSM PBF blocks.
pub struct PbfSerializer<O: BlockOutput> {
    batcher: Batcher,
    emitter: BlockEmitter<O>,
}

impl<O: BlockOutput> PbfSerializer<O> {
    /// Fails if `config` does not pass [`SerializerConfig::validate`].
    pub fn new(output: O, config: SerializerConfig) -> Result<Self> {
        config.validate()?;
        Ok(PbfSerializer {
            batcher: Batcher::new(config.batch_limit),
            emitter: BlockEmitter::new(output, config),
        })
    }

    pub fn stats(&self) -> SerializerStats {
        SerializerStats {
            entities: self.batcher.total_entities(),
            header_blocks: self.emitter.header_blocks(),
            data_blocks: self.emitter.data_blocks(),
        }
    }

    pub fn into_output(self) -> O {
        self.emitter.into_output()
    }
}

impl<O: BlockOutput> Sink for PbfSerializer<O> {
    fn process(&mut self, entity: Entity) -> Result<()> {
        match self.batcher.push(entity) {
            Batched::Buffered => Ok(()),
            Batched::Header(bound) => self.emitter.emit_header(&bound),
            Batched::Flush(groups) => self.emitter.flush_batch(groups),
        }
    }

    fn complete(&mut self) -> Result<()> {
        if let Some(groups) = self.batcher.finish() {
            self.emitter.flush_batch(groups)?;
        }
        self.emitter.flush()?;
        let stats = self.stats();
        info!(
            entities = stats.entities,
            header_blocks = stats.header_blocks,
            data_blocks = stats.data_blocks;
            "Serialization complete"
        );
        Ok(())
    }

    fn release(self) {
        // Close failures are logged, never returned.
        if let Err(err) = self.emitter.into_output().close() {
            warn!(err = err.message.as_str(); "Closing block output failed");
        }
    }
}

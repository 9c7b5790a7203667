use log::{debug, info};

use crate::config::{SerializerConfig, DEFAULT_DATE_GRANULARITY, DEFAULT_GRANULARITY};
use crate::data::osm::Bound;
use crate::encode::delta::quantize_coordinate;
use crate::encode::group::PrimGroup;
use crate::encode::string_table::StringTableBuilder;
use crate::errors::Result;
use crate::pbf::block_output::{BlockOutput, BlockType, FileBlock};
use crate::pbf::osmformat::{HeaderBBox, HeaderBlock, PrimitiveBlock};
use crate::pbf::{DENSE_NODES, OSM_SCHEMA_V06};

/// The header box is always expressed in nanodegrees.
const HEADER_GRANULARITY: i32 = 1;

/// Scans, finalizes and encodes one batch of groups into a block.
pub fn build_primitive_block(groups: &[PrimGroup], config: &SerializerConfig) -> PrimitiveBlock {
    let mut builder = StringTableBuilder::new();
    for group in groups {
        group.intern_strings(&mut builder, config.omit_metadata);
    }
    let table = builder.finalize();

    let primitivegroup = groups.iter()
        .filter_map(|group| group.encode(&table, config))
        .collect();

    PrimitiveBlock {
        stringtable: table.to_message(),
        primitivegroup,
        granularity: (config.granularity != DEFAULT_GRANULARITY).then_some(config.granularity),
        date_granularity: (config.date_granularity != DEFAULT_DATE_GRANULARITY).then_some(config.date_granularity),
        ..PrimitiveBlock::default()
    }
}

pub fn build_header_block(bound: &Bound, config: &SerializerConfig) -> HeaderBlock {
    let mut required_features = vec![OSM_SCHEMA_V06.to_string()];
    if config.use_dense_nodes {
        required_features.push(DENSE_NODES.to_string());
    }
    HeaderBlock {
        bbox: Some(HeaderBBox {
            left: quantize_coordinate(bound.left, HEADER_GRANULARITY),
            right: quantize_coordinate(bound.right, HEADER_GRANULARITY),
            top: quantize_coordinate(bound.top, HEADER_GRANULARITY),
            bottom: quantize_coordinate(bound.bottom, HEADER_GRANULARITY),
        }),
        required_features,
        writingprogram: config.writing_program.clone(),
        source: bound.origin.clone(),
        ..HeaderBlock::default()
    }
}

/// Hands finished header and data blocks to the output, in call order.
pub struct BlockEmitter<O: BlockOutput> {
    output: O,
    config: SerializerConfig,
    header_blocks: u64,
    data_blocks: u64,
}

impl<O: BlockOutput> BlockEmitter<O> {
    pub fn new(output: O, config: SerializerConfig) -> Self {
        BlockEmitter {
            output,
            config,
            header_blocks: 0,
            data_blocks: 0,
        }
    }

    pub fn emit_header(&mut self, bound: &Bound) -> Result<()> {
        let header = build_header_block(bound, &self.config);
        self.output.write(FileBlock::new(BlockType::Header, &header))?;
        self.header_blocks += 1;
        info!(
            left = bound.left, bottom = bound.bottom, right = bound.right, top = bound.top,
            dense_nodes = self.config.use_dense_nodes;
            "Wrote header block"
        );
        Ok(())
    }

    /// Writes `groups` as one data block. An empty batch writes nothing.
    pub fn flush_batch(&mut self, groups: Vec<PrimGroup>) -> Result<()> {
        if groups.is_empty() {
            return Ok(());
        }
        let entities: usize = groups.iter().map(PrimGroup::len).sum();
        let block = build_primitive_block(&groups, &self.config);
        debug!(
            groups = block.primitivegroup.len(),
            entities = entities,
            strings = block.stringtable.s.len() - 1;
            "Flushing primitive block"
        );
        self.output.write(FileBlock::new(BlockType::Data, &block))?;
        self.data_blocks += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.output.flush()
    }

    pub fn header_blocks(&self) -> u64 {
        self.header_blocks
    }

    pub fn data_blocks(&self) -> u64 {
        self.data_blocks
    }

    pub fn into_output(self) -> O {
        self.output
    }
}

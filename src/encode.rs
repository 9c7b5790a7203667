//! Batching and block assembly for primitive entities.
//!
//! Entities flow through a [`batcher::Batcher`] which buffers contiguous runs
//! of one entity kind into groups. When a batch is full, every group first
//! interns its strings into a shared [`string_table::StringTableBuilder`]; the
//! frozen [`string_table::StringTable`] then drives the encode pass of each
//! group, and [`block::BlockEmitter`] packs the results into one block.

pub mod batcher;
pub mod block;
pub mod delta;
pub mod group;
pub mod metadata;
pub mod nodes;
pub mod relations;
pub mod string_table;
pub mod ways;

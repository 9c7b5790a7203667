use std::mem;

use crate::data::osm::{Bound, Entity};
use crate::encode::group::PrimGroup;

/// What the caller must do after handing an entity to the [`Batcher`].
#[derive(Debug, PartialEq)]
pub enum Batched {
    /// The entity was buffered, nothing to write yet.
    Buffered,
    /// A bounding region that must be written as a header block right away.
    Header(Bound),
    /// The batch limit was reached. The groups must be written as one block.
    Flush(Vec<PrimGroup>),
}

/// Splits the entity stream into homogeneous groups and bounded batches.
///
/// At most one group is open at a time. A change of entity type closes it,
/// as does reaching `batch_limit` entities in the current batch, in which
/// case every closed group is handed back for flushing.
#[derive(Debug)]
pub struct Batcher {
    batch_limit: usize,
    open: Option<PrimGroup>,
    pending: Vec<PrimGroup>,
    batch_size: usize,
    total_entities: u64,
}

impl Batcher {
    pub fn new(batch_limit: usize) -> Self {
        assert!(batch_limit > 0, "batch limit must be positive");
        Batcher {
            batch_limit,
            open: None,
            pending: Vec::new(),
            batch_size: 0,
            total_entities: 0,
        }
    }

    pub fn push(&mut self, entity: Entity) -> Batched {
        let entity = match entity {
            Entity::Bound(bound) => {
                self.close_open_group();
                return Batched::Header(bound);
            },
            entity => entity,
        };

        let entity_type = entity.entity_type();
        if self.open.as_ref().is_some_and(|group| group.entity_type() != entity_type) {
            self.close_open_group();
        }
        self.open
            .get_or_insert_with(|| PrimGroup::open(entity_type))
            .push(entity);

        self.total_entities += 1;
        self.batch_size += 1;
        if self.batch_size < self.batch_limit {
            return Batched::Buffered;
        }
        self.close_open_group();
        Batched::Flush(self.take_batch())
    }

    /// Closes the open group at end of stream and returns what is left to
    /// flush, if anything.
    pub fn finish(&mut self) -> Option<Vec<PrimGroup>> {
        self.close_open_group();
        if self.pending.is_empty() {
            return None;
        }
        Some(self.take_batch())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn total_entities(&self) -> u64 {
        self.total_entities
    }

    fn close_open_group(&mut self) {
        if let Some(group) = self.open.take() {
            self.pending.push(group);
        }
    }

    fn take_batch(&mut self) -> Vec<PrimGroup> {
        self.batch_size = 0;
        mem::take(&mut self.pending)
    }
}

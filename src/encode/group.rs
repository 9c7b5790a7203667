use crate::config::SerializerConfig;
use crate::data::osm::{Entity, EntityType, OsmPrimitive, Tag};
use crate::encode::nodes::NodeGroup;
use crate::encode::relations::RelationGroup;
use crate::encode::string_table::{StringTable, StringTableBuilder};
use crate::encode::ways::WayGroup;
use crate::pbf::osmformat::PrimitiveGroup;

/// A homogeneous run of entities, encoded together as one `PrimitiveGroup`.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimGroup {
    Nodes(NodeGroup),
    Ways(WayGroup),
    Relations(RelationGroup),
}

impl PrimGroup {
    /// Opens an empty group for `entity_type`. Bounds are never grouped.
    pub fn open(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Node => PrimGroup::Nodes(NodeGroup::default()),
            EntityType::Way => PrimGroup::Ways(WayGroup::default()),
            EntityType::Relation => PrimGroup::Relations(RelationGroup::default()),
            EntityType::Bound => unreachable!("bounds are written as header blocks, never grouped"),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            PrimGroup::Nodes(_) => EntityType::Node,
            PrimGroup::Ways(_) => EntityType::Way,
            PrimGroup::Relations(_) => EntityType::Relation,
        }
    }

    /// Appends `entity`. The group kind must match; a mismatch panics.
    pub fn push(&mut self, entity: Entity) {
        match (self, entity) {
            (PrimGroup::Nodes(group), Entity::Node(node)) => group.add(node),
            (PrimGroup::Ways(group), Entity::Way(way)) => group.add(way),
            (PrimGroup::Relations(group), Entity::Relation(relation)) => group.add(relation),
            (group, entity) => panic!(
                "cannot add a {:?} to a {:?} group",
                entity.entity_type(),
                group.entity_type()
            ),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimGroup::Nodes(group) => group.len(),
            PrimGroup::Ways(group) => group.len(),
            PrimGroup::Relations(group) => group.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn intern_strings(&self, table: &mut StringTableBuilder, omit_metadata: bool) {
        match self {
            PrimGroup::Nodes(group) => group.intern_strings(table, omit_metadata),
            PrimGroup::Ways(group) => group.intern_strings(table, omit_metadata),
            PrimGroup::Relations(group) => group.intern_strings(table, omit_metadata),
        }
    }

    pub fn encode(&self, table: &StringTable, config: &SerializerConfig) -> Option<PrimitiveGroup> {
        match self {
            PrimGroup::Nodes(group) => group.encode(table, config),
            PrimGroup::Ways(group) => group.encode(table, config),
            PrimGroup::Relations(group) => group.encode(table, config),
        }
    }
}

/// Interns tag keys, tag values and author names of `items`.
pub(crate) fn intern_common<'a, T, I>(items: I, table: &mut StringTableBuilder, omit_metadata: bool)
where
    T: OsmPrimitive + 'a,
    I: IntoIterator<Item = &'a T>,
{
    for item in items {
        for tag in item.tags() {
            table.increment(&tag.key);
            table.increment(&tag.value);
        }
        if omit_metadata {
            continue;
        }
        if let Some(author) = item.metadata().and_then(|metadata| metadata.author.as_ref()) {
            table.increment(&author.name);
        }
    }
}

/// Parallel key and value index lists.
pub(crate) fn tag_indices(tags: &[Tag], table: &StringTable) -> (Vec<u32>, Vec<u32>) {
    tags.iter()
        .map(|tag| (table.index(&tag.key), table.index(&tag.value)))
        .unzip()
}

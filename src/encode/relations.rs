use crate::config::SerializerConfig;
use crate::data::osm::{OsmId, MemberType, OsmPrimitive, Relation};
use crate::encode::delta::DeltaCoder;
use crate::encode::group::{intern_common, tag_indices};
use crate::encode::metadata::encode_info;
use crate::encode::string_table::{StringTable, StringTableBuilder};
use crate::pbf::osmformat::{self, relation, PrimitiveGroup};

impl From<MemberType> for relation::MemberType {
    fn from(value: MemberType) -> Self {
        match value {
            MemberType::Node => relation::MemberType::Node,
            MemberType::Way => relation::MemberType::Way,
            MemberType::Relation => relation::MemberType::Relation,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RelationGroup {
    relations: Vec<Relation>,
}

impl RelationGroup {
    pub fn add(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = OsmId> + '_ {
        self.relations.iter().map(OsmPrimitive::id)
    }

    /// Member roles are interned on top of tags and authors.
    pub fn intern_strings(&self, table: &mut StringTableBuilder, omit_metadata: bool) {
        intern_common(&self.relations, table, omit_metadata);
        for relation in &self.relations {
            for member in &relation.members {
                table.increment(&member.role);
            }
        }
    }

    pub fn encode(&self, table: &StringTable, config: &SerializerConfig) -> Option<PrimitiveGroup> {
        if self.relations.is_empty() {
            return None;
        }
        let relations = self.relations.iter()
            .map(|source| encode_relation(source, table, config))
            .collect();
        Some(PrimitiveGroup {
            relations,
            ..PrimitiveGroup::default()
        })
    }
}

fn encode_relation(source: &Relation, table: &StringTable, config: &SerializerConfig) -> osmformat::Relation {
    let (keys, vals) = tag_indices(&source.tags, table);
    let mut encoded = osmformat::Relation {
        id: source.id,
        keys,
        vals,
        info: encode_info(source.metadata(), table, config),
        ..osmformat::Relation::default()
    };

    let mut memid = DeltaCoder::new();
    for member in &source.members {
        encoded.memids.push(memid.encode(member.id));
        encoded.types.push(relation::MemberType::from(member.member_type) as i32);
        encoded.roles_sid.push(table.signed_index(&member.role));
    }
    encoded
}

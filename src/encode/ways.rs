use crate::config::SerializerConfig;
use crate::data::osm::{OsmId, OsmPrimitive, Way};
use crate::encode::delta::delta_encode;
use crate::encode::group::{intern_common, tag_indices};
use crate::encode::metadata::encode_info;
use crate::encode::string_table::{StringTable, StringTableBuilder};
use crate::pbf::osmformat::{self, PrimitiveGroup};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WayGroup {
    ways: Vec<Way>,
}

impl WayGroup {
    pub fn add(&mut self, way: Way) {
        self.ways.push(way);
    }

    pub fn len(&self) -> usize {
        self.ways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ways.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = OsmId> + '_ {
        self.ways.iter().map(OsmPrimitive::id)
    }

    pub fn intern_strings(&self, table: &mut StringTableBuilder, omit_metadata: bool) {
        intern_common(&self.ways, table, omit_metadata);
    }

    pub fn encode(&self, table: &StringTable, config: &SerializerConfig) -> Option<PrimitiveGroup> {
        if self.ways.is_empty() {
            return None;
        }
        let ways = self.ways.iter().map(|way| {
            let (keys, vals) = tag_indices(&way.tags, table);
            osmformat::Way {
                id: way.id,
                keys,
                vals,
                info: encode_info(way.metadata(), table, config),
                // Baseline restarts for every way.
                refs: delta_encode(way.refs.iter().copied()),
            }
        }).collect();
        Some(PrimitiveGroup {
            ways,
            ..PrimitiveGroup::default()
        })
    }
}

use crate::config::SerializerConfig;
use crate::data::osm::{OsmId, Node, OsmPrimitive};
use crate::encode::delta::{quantize_coordinate, DeltaCoder};
use crate::encode::group::{intern_common, tag_indices};
use crate::encode::metadata::{encode_info, DenseInfoEncoder};
use crate::encode::string_table::{StringTable, StringTableBuilder};
use crate::pbf::osmformat::{self, DenseNodes, PrimitiveGroup};

/// Delimiter closing each node's run in `DenseNodes::keys_vals`.
const KEYS_VALS_DELIMITER: i32 = 0;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeGroup {
    nodes: Vec<Node>,
}

impl NodeGroup {
    pub fn add(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = OsmId> + '_ {
        self.nodes.iter().map(OsmPrimitive::id)
    }

    pub fn intern_strings(&self, table: &mut StringTableBuilder, omit_metadata: bool) {
        intern_common(&self.nodes, table, omit_metadata);
    }

    /// Dense or explicit encoding, per `config.use_dense_nodes`. An empty
    /// group encodes to nothing.
    pub fn encode(&self, table: &StringTable, config: &SerializerConfig) -> Option<PrimitiveGroup> {
        if self.nodes.is_empty() {
            return None;
        }
        let group = if config.use_dense_nodes {
            PrimitiveGroup {
                dense: Some(self.encode_dense(table, config)),
                ..PrimitiveGroup::default()
            }
        } else {
            PrimitiveGroup {
                nodes: self.encode_sparse(table, config),
                ..PrimitiveGroup::default()
            }
        };
        Some(group)
    }

    fn encode_dense(&self, table: &StringTable, config: &SerializerConfig) -> DenseNodes {
        // Without any tag in the group the keys_vals column is left out
        // entirely, delimiters included.
        let any_tagged = self.nodes.iter().any(|node| !node.tags.is_empty());

        let mut dense = DenseNodes::default();
        let mut id = DeltaCoder::new();
        let mut lat = DeltaCoder::new();
        let mut lon = DeltaCoder::new();
        let mut info = (!config.omit_metadata)
            .then(|| DenseInfoEncoder::new(table, config.date_granularity));

        for node in &self.nodes {
            dense.id.push(id.encode(node.id));
            dense.lon.push(lon.encode(quantize_coordinate(node.lon, config.granularity)));
            dense.lat.push(lat.encode(quantize_coordinate(node.lat, config.granularity)));

            if any_tagged {
                for tag in &node.tags {
                    dense.keys_vals.push(table.signed_index(&tag.key));
                    dense.keys_vals.push(table.signed_index(&tag.value));
                }
                dense.keys_vals.push(KEYS_VALS_DELIMITER);
            }

            if let Some(info) = info.as_mut() {
                info.push(node.metadata());
            }
        }

        dense.denseinfo = info.map(DenseInfoEncoder::finish);
        dense
    }

    fn encode_sparse(&self, table: &StringTable, config: &SerializerConfig) -> Vec<osmformat::Node> {
        self.nodes.iter().map(|node| {
            let (keys, vals) = tag_indices(&node.tags, table);
            osmformat::Node {
                id: node.id,
                keys,
                vals,
                info: encode_info(node.metadata(), table, config),
                lat: quantize_coordinate(node.lat, config.granularity),
                lon: quantize_coordinate(node.lon, config.granularity),
            }
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;
    use crate::data::osm::{Author, Metadata, Tag};
    use crate::encode::delta::{prefix_sum, quantize_timestamp};
    use crate::encode::metadata::{NO_AUTHOR, UNKNOWN_VERSION};

    fn node(id: i64, lat: f64, lon: f64, tags: &[(&str, &str)]) -> Node {
        Node {
            id,
            lat,
            lon,
            tags: tags.iter().map(|(k, v)| Tag::new(*k, *v)).collect(),
            metadata: Some(Metadata {
                version: 1,
                timestamp: Utc.timestamp_opt(1_500_000_000 + id, 0).unwrap(),
                changeset: 100 + id,
                author: Some(Author { uid: id as i32, name: format!("user{}", id) }),
            }),
        }
    }

    fn group(nodes: Vec<Node>) -> NodeGroup {
        let mut group = NodeGroup::default();
        for node in nodes {
            group.add(node);
        }
        group
    }

    fn interned(group: &NodeGroup, omit_metadata: bool) -> StringTable {
        let mut builder = StringTableBuilder::new();
        group.intern_strings(&mut builder, omit_metadata);
        builder.finalize()
    }

    #[test]
    fn empty_group_encodes_to_nothing() {
        let group = NodeGroup::default();
        let table = interned(&group, false);
        assert_eq!(group.encode(&table, &SerializerConfig::default()), None);
        let sparse = SerializerConfig { use_dense_nodes: false, ..SerializerConfig::default() };
        assert_eq!(group.encode(&table, &sparse), None);
    }

    #[test]
    fn dense_ids_and_coordinates_are_delta_coded() {
        let group = group(vec![
            node(1, 51.5, -0.12, &[]),
            node(2, 51.6, -0.10, &[]),
            node(10, 51.4, -0.15, &[]),
        ]);
        let config = SerializerConfig::default();
        let table = interned(&group, false);
        let dense = group.encode(&table, &config).unwrap().dense.unwrap();

        assert_eq!(dense.id, vec![1, 1, 8]);
        assert_eq!(prefix_sum(&dense.lat), vec![515_000_000, 516_000_000, 514_000_000]);
        assert_eq!(prefix_sum(&dense.lon), vec![-1_200_000, -1_000_000, -1_500_000]);
    }

    #[test]
    fn untagged_dense_group_omits_keys_vals() {
        let group = group(vec![node(1, 0.0, 0.0, &[]), node(2, 0.0, 0.0, &[])]);
        let table = interned(&group, false);
        let dense = group.encode(&table, &SerializerConfig::default()).unwrap().dense.unwrap();
        assert!(dense.keys_vals.is_empty());
    }

    #[test]
    fn single_tag_forces_delimiters_for_every_node() {
        let group = group(vec![
            node(1, 0.0, 0.0, &[]),
            node(2, 0.0, 0.0, &[("amenity", "pub")]),
            node(3, 0.0, 0.0, &[]),
        ]);
        let table = interned(&group, false);
        let dense = group.encode(&table, &SerializerConfig::default()).unwrap().dense.unwrap();

        assert_eq!(
            dense.keys_vals,
            vec![0, table.signed_index("amenity"), table.signed_index("pub"), 0, 0]
        );
    }

    #[test]
    fn dense_metadata_is_aligned_with_nodes() {
        let mut anonymous = node(5, 0.0, 0.0, &[]);
        if let Some(metadata) = anonymous.metadata.as_mut() {
            metadata.author = None;
        }
        let group = group(vec![node(1, 0.0, 0.0, &[]), anonymous, node(7, 0.0, 0.0, &[])]);
        let table = interned(&group, false);
        let info = group.encode(&table, &SerializerConfig::default()).unwrap()
            .dense.unwrap().denseinfo.unwrap();

        assert_eq!(info.version, vec![1, 1, 1]);
        assert_eq!(prefix_sum(&info.timestamp), vec![1_500_000_001, 1_500_000_005, 1_500_000_007]);
        assert_eq!(prefix_sum(&info.changeset), vec![101, 105, 107]);
        assert_eq!(prefix_sum(&info.uid), vec![1, 0, 7]);
        assert_eq!(
            prefix_sum(&info.user_sid),
            vec![table.signed_index("user1"), 0, table.signed_index("user7")]
        );
    }

    #[test]
    fn suppressed_metadata_skips_dense_info_and_author_strings() {
        let group = group(vec![node(1, 0.0, 0.0, &[("name", "x")])]);
        let table = interned(&group, true);
        assert_eq!(table.len(), 2);

        let config = SerializerConfig { omit_metadata: true, ..SerializerConfig::default() };
        let dense = group.encode(&table, &config).unwrap().dense.unwrap();
        assert_eq!(dense.denseinfo, None);
    }

    #[test]
    fn sparse_nodes_are_explicit() {
        let group = group(vec![
            node(4, 1.0, 2.0, &[("name", "Bank"), ("railway", "station")]),
            node(3, -1.0, -2.0, &[]),
        ]);
        let table = interned(&group, false);
        let config = SerializerConfig { use_dense_nodes: false, ..SerializerConfig::default() };
        let encoded = group.encode(&table, &config).unwrap();

        assert_eq!(encoded.dense, None);
        assert_eq!(encoded.nodes.len(), 2);
        let first = &encoded.nodes[0];
        assert_eq!(first.id, 4);
        assert_eq!(first.lat, 10_000_000);
        assert_eq!(first.lon, 20_000_000);
        assert_eq!(first.keys, vec![table.index("name"), table.index("railway")]);
        assert_eq!(first.vals, vec![table.index("Bank"), table.index("station")]);
        let info = first.info.as_ref().unwrap();
        assert_eq!(info.uid, Some(4));
        assert_eq!(info.user_sid, Some(table.index("user4")));

        let second = &encoded.nodes[1];
        assert_eq!(second.id, 3);
        assert_eq!(second.lat, -10_000_000);
        assert!(second.keys.is_empty());
    }

    fn metadata_strategy() -> impl Strategy<Value = Option<Metadata>> {
        let author = proptest::option::of((1i32..100_000, "[a-z]{1,8}"));
        proptest::option::of((1i32..50, 0i64..2_000_000_000, 0i64..1_000_000_000, author).prop_map(
            |(version, secs, changeset, author)| Metadata {
                version,
                timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
                changeset,
                author: author.map(|(uid, name)| Author { uid, name }),
            },
        ))
    }

    fn node_strategy() -> impl Strategy<Value = Node> {
        (-(1i64 << 40)..(1i64 << 40), -90.0f64..90.0, -180.0f64..180.0, metadata_strategy())
            .prop_map(|(id, lat, lon, metadata)| Node { id, lat, lon, tags: vec![], metadata })
    }

    proptest! {
        #[test]
        fn dense_columns_restore_by_prefix_sum(nodes in prop::collection::vec(node_strategy(), 1..40)) {
            let group = group(nodes.clone());
            let table = interned(&group, false);
            let config = SerializerConfig::default();
            let dense = group.encode(&table, &config).unwrap().dense.unwrap();

            let ids: Vec<i64> = nodes.iter().map(|node| node.id).collect();
            let lats: Vec<i64> = nodes.iter().map(|node| quantize_coordinate(node.lat, config.granularity)).collect();
            let lons: Vec<i64> = nodes.iter().map(|node| quantize_coordinate(node.lon, config.granularity)).collect();
            prop_assert_eq!(prefix_sum(&dense.id), ids);
            prop_assert_eq!(prefix_sum(&dense.lat), lats);
            prop_assert_eq!(prefix_sum(&dense.lon), lons);
            prop_assert!(dense.keys_vals.is_empty());

            let info = dense.denseinfo.unwrap();
            let metadata: Vec<Option<&Metadata>> = nodes.iter().map(|node| node.metadata.as_ref()).collect();
            let authors: Vec<Option<&Author>> = metadata.iter()
                .map(|metadata| metadata.and_then(|metadata| metadata.author.as_ref()))
                .collect();

            let versions: Vec<i32> = metadata.iter()
                .map(|metadata| metadata.map_or(UNKNOWN_VERSION, |metadata| metadata.version))
                .collect();
            let timestamps: Vec<i64> = metadata.iter()
                .map(|metadata| metadata.map_or(0, |metadata| quantize_timestamp(&metadata.timestamp, config.date_granularity)))
                .collect();
            let changesets: Vec<i64> = metadata.iter()
                .map(|metadata| metadata.map_or(0, |metadata| metadata.changeset))
                .collect();
            let uids: Vec<i32> = authors.iter()
                .map(|author| author.map_or(NO_AUTHOR, |author| author.uid))
                .collect();
            let user_sids: Vec<i32> = authors.iter()
                .map(|author| author.map_or(NO_AUTHOR, |author| table.signed_index(&author.name)))
                .collect();

            prop_assert_eq!(info.version, versions);
            prop_assert_eq!(prefix_sum(&info.timestamp), timestamps);
            prop_assert_eq!(prefix_sum(&info.changeset), changesets);
            prop_assert_eq!(prefix_sum(&info.uid), uids);
            prop_assert_eq!(prefix_sum(&info.user_sid), user_sids);
        }
    }
}

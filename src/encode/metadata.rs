use crate::config::SerializerConfig;
use crate::data::osm::Metadata;
use crate::encode::delta::{quantize_timestamp, DeltaCoder};
use crate::encode::string_table::StringTable;
use crate::pbf::osmformat::{DenseInfo, Info};

/// Version written for a dense row whose entity carries no metadata.
pub const UNKNOWN_VERSION: i32 = -1;
/// uid and user index written for a dense row without an author.
pub const NO_AUTHOR: i32 = 0;

/// Explicit, absolute metadata of one entity. `None` when metadata is
/// suppressed or the entity has none.
pub fn encode_info(metadata: Option<&Metadata>, table: &StringTable, config: &SerializerConfig) -> Option<Info> {
    if config.omit_metadata {
        return None;
    }
    let metadata = metadata?;
    let mut info = Info {
        version: Some(metadata.version),
        timestamp: Some(quantize_timestamp(&metadata.timestamp, config.date_granularity)),
        changeset: Some(metadata.changeset),
        ..Info::default()
    };
    if let Some(author) = &metadata.author {
        info.uid = Some(author.uid);
        info.user_sid = Some(table.index(&author.name));
    }
    Some(info)
}

/// Builds the columnar metadata of a dense node group. Every pushed entity
/// adds exactly one row to each column.
pub struct DenseInfoEncoder<'a> {
    table: &'a StringTable,
    date_granularity: i32,
    timestamp: DeltaCoder<i64>,
    changeset: DeltaCoder<i64>,
    uid: DeltaCoder<i32>,
    user_sid: DeltaCoder<i32>,
    info: DenseInfo,
}

impl<'a> DenseInfoEncoder<'a> {
    pub fn new(table: &'a StringTable, date_granularity: i32) -> Self {
        DenseInfoEncoder {
            table,
            date_granularity,
            timestamp: DeltaCoder::new(),
            changeset: DeltaCoder::new(),
            uid: DeltaCoder::new(),
            user_sid: DeltaCoder::new(),
            info: DenseInfo::default(),
        }
    }

    pub fn push(&mut self, metadata: Option<&Metadata>) {
        let (version, timestamp, changeset, uid, user_sid) = match metadata {
            Some(metadata) => {
                let (uid, user_sid) = match &metadata.author {
                    Some(author) => (author.uid, self.table.signed_index(&author.name)),
                    None => (NO_AUTHOR, NO_AUTHOR),
                };
                (
                    metadata.version,
                    quantize_timestamp(&metadata.timestamp, self.date_granularity),
                    metadata.changeset,
                    uid,
                    user_sid,
                )
            },
            None => (UNKNOWN_VERSION, 0, 0, NO_AUTHOR, NO_AUTHOR),
        };

        self.info.version.push(version);
        self.info.timestamp.push(self.timestamp.encode(timestamp));
        self.info.changeset.push(self.changeset.encode(changeset));
        self.info.uid.push(self.uid.encode(uid));
        self.info.user_sid.push(self.user_sid.encode(user_sid));
    }

    pub fn finish(self) -> DenseInfo {
        self.info
    }
}

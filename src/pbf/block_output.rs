use std::io::Write;

use flate2::write::ZlibEncoder;
use log::debug;
use prost::Message;
use serde::Deserialize;
use xz::write::XzEncoder;

use crate::errors::Result;
use crate::pbf::fileformat::{Blob, BlobHeader};

pub const MAX_BLOB_HEADER_SIZE: usize = 64 * 1024;
pub const MAX_BLOB_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Header,
    Data,
}

impl BlockType {
    pub fn name(&self) -> &'static str {
        match self {
            BlockType::Header => "OSMHeader",
            BlockType::Data => "OSMData",
        }
    }
}

/// One named, encoded payload waiting to be framed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileBlock {
    pub block_type: BlockType,
    pub data: Vec<u8>,
    pub index_data: Option<Vec<u8>>,
}

impl FileBlock {
    pub fn new(block_type: BlockType, message: &impl Message) -> Self {
        FileBlock {
            block_type,
            data: message.encode_to_vec(),
            index_data: None,
        }
    }
}

/// Destination for encoded blocks. Writes happen in call order.
pub trait BlockOutput {
    fn write(&mut self, block: FileBlock) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn close(self) -> Result<()> where Self: Sized;
}

impl BlockOutput for Vec<FileBlock> {
    fn write(&mut self, block: FileBlock) -> Result<()> {
        self.push(block);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "algorithm", rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    /// `zlib_data`, the codec every PBF reader understands.
    Zlib { level: u32 },
    /// `lzma_data`, smaller but unsupported by many readers.
    Xz { level: u32 },
}

impl Compression {
    pub fn validate(&self) -> Result<()> {
        match self {
            Compression::Zlib { level } if *level > 9 => {
                Err(format!("zlib compression level must be 0-9, got {}", level).into())
            },
            Compression::Xz { level } if *level > 9 => {
                Err(format!("xz compression level must be 0-9, got {}", level).into())
            },
            _ => Ok(()),
        }
    }
}

/// Frames blocks as `[u32 header length][BlobHeader][Blob]`.
pub struct BlockWriter<W: Write> {
    writer: W,
    compression: Compression,
    blocks_written: u64,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(writer: W, compression: Compression) -> Self {
        BlockWriter {
            writer,
            compression,
            blocks_written: 0,
        }
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn make_blob(&self, data: Vec<u8>) -> Result<Blob> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(format!("Block payload of {} bytes exceeds the {} byte limit", data.len(), MAX_BLOB_SIZE).into());
        }
        let raw_size = Some(i32::try_from(data.len())?);
        let blob = match self.compression {
            Compression::None => Blob {
                raw: Some(data),
                ..Blob::default()
            },
            Compression::Zlib { level } => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
                encoder.write_all(&data)?;
                Blob {
                    raw_size,
                    zlib_data: Some(encoder.finish()?),
                    ..Blob::default()
                }
            },
            Compression::Xz { level } => {
                let mut encoder = XzEncoder::new(Vec::new(), level);
                encoder.write_all(&data)?;
                Blob {
                    raw_size,
                    lzma_data: Some(encoder.finish()?),
                    ..Blob::default()
                }
            },
        };
        Ok(blob)
    }
}

impl<W: Write> BlockOutput for BlockWriter<W> {
    fn write(&mut self, block: FileBlock) -> Result<()> {
        let blob = self.make_blob(block.data)?.encode_to_vec();
        if blob.len() > MAX_BLOB_SIZE {
            return Err(format!("Encoded blob of {} bytes exceeds the {} byte limit", blob.len(), MAX_BLOB_SIZE).into());
        }

        let header = BlobHeader {
            r#type: block.block_type.name().to_string(),
            indexdata: block.index_data,
            datasize: i32::try_from(blob.len())?,
        }.encode_to_vec();
        if header.len() > MAX_BLOB_HEADER_SIZE {
            return Err(format!("Blob header of {} bytes exceeds the {} byte limit", header.len(), MAX_BLOB_HEADER_SIZE).into());
        }

        self.writer.write_all(&u32::try_from(header.len())?.to_be_bytes())?;
        self.writer.write_all(&header)?;
        self.writer.write_all(&blob)?;
        self.blocks_written += 1;
        debug!(block_type = block.block_type.name(), blob_size = blob.len(); "Wrote block");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }

    fn close(mut self) -> Result<()> {
        self.flush()
    }
}

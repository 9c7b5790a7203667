use std::fs::{self, File};
use std::io::{BufRead, BufWriter};
use std::path::{Path, PathBuf};

use log::info;

use crate::config::UserConfig;
use crate::data::osm::Entity;
use crate::errors::Result;
use crate::etl::parse_osm::{open_osm_source, OsmXmlReader};
use crate::etl::Etl;
use crate::pbf::block_output::BlockWriter;
use crate::serializer::{PbfSerializer, SerializerStats, Sink};

pub const ETL_NAME: &str = "write_pbf";
const PARTIAL_SUFFIX: &str = ".partial";

pub struct Input {
    entities: OsmXmlReader<Box<dyn BufRead + Send>>,
    partial_path: PathBuf,
}

pub struct Output {
    partial_path: PathBuf,
    stats: SerializerStats,
}

/// Converts the configured OSM XML extract into a PBF file.
pub struct WritePbfEtl<'a> {
    config: &'a UserConfig,
}

impl WritePbfEtl<'_> {
    pub fn new(config: &UserConfig) -> WritePbfEtl {
        WritePbfEtl {
            config
        }
    }

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.config.output_file_name)
    }

    fn partial_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}{}", self.config.output_file_name, PARTIAL_SUFFIX))
    }
}

/// Feeds every entity to `sink`, stopping at the first error.
pub fn drive<S, I>(sink: &mut S, entities: I) -> Result<()>
where
    S: Sink,
    I: Iterator<Item = Result<Entity>>,
{
    for entity in entities {
        sink.process(entity?)?;
    }
    sink.complete()
}

impl Etl for WritePbfEtl<'_> {
    type Input = Input;
    type Output = Output;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(self.output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        for path in [self.output_path(dir), self.partial_path(dir)] {
            if path.try_exists()? {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let source = open_osm_source(Path::new(&self.config.data_path))?;
        Ok(Input {
            entities: OsmXmlReader::new(source),
            partial_path: self.partial_path(dir),
        })
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let file = File::create(&input.partial_path)?;
        let writer = BlockWriter::new(BufWriter::new(file), self.config.compression);
        let mut serializer = PbfSerializer::new(writer, self.config.serializer.clone())?;

        let result = if self.config.progress {
            drive(&mut serializer, tqdm::tqdm(input.entities))
        } else {
            drive(&mut serializer, input.entities)
        };
        let stats = serializer.stats();
        serializer.release();
        result?;

        Ok(Output {
            partial_path: input.partial_path,
            stats,
        })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let output_path = self.output_path(dir);
        fs::rename(&output.partial_path, &output_path)?;
        info!(
            path = output_path.display().to_string().as_str(),
            entities = output.stats.entities,
            header_blocks = output.stats.header_blocks,
            data_blocks = output.stats.data_blocks;
            "Wrote PBF file"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use prost::Message;

    use super::*;
    use crate::config::SerializerConfig;
    use crate::pbf::block_output::Compression;
    use crate::pbf::fileformat::{Blob, BlobHeader};
    use crate::pbf::osmformat::{HeaderBlock, PrimitiveBlock};

    const SAMPLE: &str = r#"<osm version="0.6">
  <bounds minlat="-5" minlon="-10" maxlat="5" maxlon="10"/>
  <node id="1" lat="1" lon="1" version="1" timestamp="2021-05-01T00:00:00Z" changeset="1" uid="3" user="ann"/>
  <node id="2" lat="2" lon="2" version="1" timestamp="2021-05-01T00:00:01Z" changeset="1" uid="3" user="ann">
    <tag k="name" v="Two"/>
  </node>
  <node id="3" lat="3" lon="3" version="1" timestamp="2021-05-01T00:00:02Z" changeset="2"/>
  <way id="10" version="1" timestamp="2021-05-01T00:00:03Z" changeset="2" uid="4" user="bo">
    <nd ref="1"/><nd ref="2"/><nd ref="3"/>
  </way>
</osm>
"#;

    fn config(dir: &Path, input: &Path) -> UserConfig {
        UserConfig {
            data_path: input.display().to_string(),
            dest_path: dir.display().to_string(),
            output_file_name: "sample.osm.pbf".to_string(),
            compression: Compression::None,
            progress: false,
            overwrite: false,
            serializer: SerializerConfig { batch_limit: 2, ..SerializerConfig::default() },
        }
    }

    fn read_blocks(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut rest = bytes;
        let mut blocks = Vec::new();
        while !rest.is_empty() {
            let len = u32::from_be_bytes(rest[..4].try_into().unwrap()) as usize;
            let header = BlobHeader::decode(&rest[4..4 + len]).unwrap();
            let blob_end = 4 + len + header.datasize as usize;
            let blob = Blob::decode(&rest[4 + len..blob_end]).unwrap();
            blocks.push((header.r#type, blob.raw.unwrap()));
            rest = &rest[blob_end..];
        }
        blocks
    }

    #[test]
    fn converts_xml_to_pbf_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sample.osm");
        File::create(&input).unwrap().write_all(SAMPLE.as_bytes()).unwrap();
        let config = config(dir.path(), &input);

        let mut etl = WritePbfEtl::new(&config);
        assert!(!etl.is_cached(dir.path()).unwrap());
        etl.process(dir.path()).unwrap();
        assert!(etl.is_cached(dir.path()).unwrap());
        assert!(!dir.path().join("sample.osm.pbf.partial").exists());

        let bytes = fs::read(dir.path().join("sample.osm.pbf")).unwrap();
        let blocks = read_blocks(&bytes);
        let types: Vec<&str> = blocks.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(types, vec!["OSMHeader", "OSMData", "OSMData"]);

        let header = HeaderBlock::decode(blocks[0].1.as_slice()).unwrap();
        assert_eq!(header.bbox.unwrap().left, -10_000_000_000);

        let first = PrimitiveBlock::decode(blocks[1].1.as_slice()).unwrap();
        assert_eq!(first.primitivegroup[0].dense.as_ref().unwrap().id, vec![1, 1]);
        let second = PrimitiveBlock::decode(blocks[2].1.as_slice()).unwrap();
        assert_eq!(second.primitivegroup.len(), 2);
        assert_eq!(second.primitivegroup[1].ways[0].refs, vec![1, 1, 1]);
    }

    #[test]
    fn failed_conversion_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.osm");
        File::create(&input).unwrap()
            .write_all(br#"<osm><node id="1" lat="0" lon="0"/><relation id="2"><member type="area" ref="1"/></relation></osm>"#)
            .unwrap();
        let config = config(dir.path(), &input);

        let mut etl = WritePbfEtl::new(&config);
        assert!(etl.process(dir.path()).is_err());
        assert!(!etl.is_cached(dir.path()).unwrap());

        etl.clean(dir.path()).unwrap();
        assert!(!dir.path().join("sample.osm.pbf.partial").exists());
    }

    #[test]
    fn reprocess_replaces_cached_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sample.osm");
        File::create(&input).unwrap().write_all(SAMPLE.as_bytes()).unwrap();
        let config = config(dir.path(), &input);
        fs::write(dir.path().join("sample.osm.pbf"), b"stale").unwrap();

        let mut etl = WritePbfEtl::new(&config);
        etl.process(dir.path()).unwrap();
        assert_eq!(fs::read(dir.path().join("sample.osm.pbf")).unwrap(), b"stale");

        etl.reprocess(dir.path()).unwrap();
        let bytes = fs::read(dir.path().join("sample.osm.pbf")).unwrap();
        assert_eq!(read_blocks(&bytes).len(), 3);
    }
}

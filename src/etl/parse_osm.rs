use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{Author, Bound, Entity, MemberType, Metadata, Node, Relation, RelationMember, Tag, Way};
use crate::errors::{Error, Result};

/// Opens an `.osm` file, transparently decompressing `.xz` input.
pub fn open_osm_source(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = fs::File::open(path)
        .map_err(|err| format!("Could not open {}: {}", path.display(), err))?;
    let file_reader = BufReader::new(file);
    if path.extension().is_some_and(|ext| ext == "xz") {
        Ok(Box::new(BufReader::new(XzDecoder::new(file_reader))))
    } else {
        Ok(Box::new(file_reader))
    }
}

/// Streams the entities of an OSM XML document in document order.
pub struct OsmXmlReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    current: Option<Entity>,
    failed: bool,
}

impl<R: BufRead> OsmXmlReader<R> {
    pub fn new(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);
        OsmXmlReader {
            reader,
            buf: Vec::new(),
            current: None,
            failed: false,
        }
    }

    pub fn next_entity(&mut self) -> Result<Option<Entity>> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Eof => {
                    if self.current.is_some() {
                        return Err("Unexpected end of file inside an element".into());
                    }
                    return Ok(None);
                },
                Event::Start(e) => match e.name().as_ref() {
                    b"node" | b"way" | b"relation" => self.current = Some(parse_primitive(&e)?),
                    b"bounds" => return Ok(Some(Entity::Bound(parse_bound(&e)?))),
                    _ => add_child(self.current.as_mut(), &e)?,
                },
                Event::Empty(e) => match e.name().as_ref() {
                    b"node" | b"way" | b"relation" => return Ok(Some(parse_primitive(&e)?)),
                    b"bounds" => return Ok(Some(Entity::Bound(parse_bound(&e)?))),
                    _ => add_child(self.current.as_mut(), &e)?,
                },
                Event::End(e) => match e.name().as_ref() {
                    b"node" | b"way" | b"relation" => {
                        if let Some(entity) = self.current.take() {
                            return Ok(Some(entity));
                        }
                    },
                    _ => (),
                },
                // Text (<note> contents), comments and declarations hold no entity data.
                _ => (),
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmXmlReader<R> {
    type Item = Result<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.next_entity().transpose();
        if matches!(next, Some(Err(_))) {
            self.failed = true;
        }
        next
    }
}

/// Attributes shared by nodes, ways and relations.
#[derive(Default)]
struct PrimitiveAttributes {
    id: Option<i64>,
    lat: Option<f64>,
    lon: Option<f64>,
    version: Option<i32>,
    timestamp: Option<DateTime<Utc>>,
    changeset: Option<i64>,
    uid: Option<i32>,
    user: Option<String>,
}

impl PrimitiveAttributes {
    fn parse(el: &BytesStart) -> Result<Self> {
        let mut attributes = PrimitiveAttributes::default();
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let value = attribute.unescape_value()?;
            match attribute.key.as_ref() {
                b"id" => attributes.id = Some(value.parse()?),
                b"lat" => attributes.lat = Some(value.parse()?),
                b"lon" => attributes.lon = Some(value.parse()?),
                b"version" => attributes.version = Some(value.parse()?),
                b"timestamp" => {
                    attributes.timestamp = Some(DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc));
                },
                b"changeset" => attributes.changeset = Some(value.parse()?),
                b"uid" => attributes.uid = Some(value.parse()?),
                b"user" => attributes.user = Some(value.into_owned()),
                _ => (),
            }
        }
        Ok(attributes)
    }

    fn metadata(&mut self) -> Option<Metadata> {
        if self.version.is_none() && self.timestamp.is_none() {
            return None;
        }
        let author = self.uid.map(|uid| Author {
            uid,
            name: self.user.take().unwrap_or_default(),
        });
        Some(Metadata {
            version: self.version.unwrap_or(1),
            timestamp: self.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            changeset: self.changeset.unwrap_or(0),
            author,
        })
    }
}

fn missing(element: &str, attribute: &str) -> Error {
    format!("<{}> is missing the '{}' attribute", element, attribute).into()
}

fn parse_primitive(el: &BytesStart) -> Result<Entity> {
    let mut attributes = PrimitiveAttributes::parse(el)?;
    let metadata = attributes.metadata();
    let entity = match el.name().as_ref() {
        b"node" => Entity::Node(Node {
            id: attributes.id.ok_or_else(|| missing("node", "id"))?,
            lat: attributes.lat.ok_or_else(|| missing("node", "lat"))?,
            lon: attributes.lon.ok_or_else(|| missing("node", "lon"))?,
            tags: Vec::new(),
            metadata,
        }),
        b"way" => Entity::Way(Way {
            id: attributes.id.ok_or_else(|| missing("way", "id"))?,
            refs: Vec::new(),
            tags: Vec::new(),
            metadata,
        }),
        _ => Entity::Relation(Relation {
            id: attributes.id.ok_or_else(|| missing("relation", "id"))?,
            members: Vec::new(),
            tags: Vec::new(),
            metadata,
        }),
    };
    Ok(entity)
}

fn parse_bound(el: &BytesStart) -> Result<Bound> {
    let (mut left, mut right, mut top, mut bottom) = (None, None, None, None);
    let mut origin = None;
    for attribute_res in el.attributes() {
        let attribute = attribute_res?;
        let value = attribute.unescape_value()?;
        match attribute.key.as_ref() {
            b"minlon" => left = Some(value.parse()?),
            b"maxlon" => right = Some(value.parse()?),
            b"maxlat" => top = Some(value.parse()?),
            b"minlat" => bottom = Some(value.parse()?),
            b"origin" => origin = Some(value.into_owned()),
            _ => (),
        }
    }
    Ok(Bound {
        left: left.ok_or_else(|| missing("bounds", "minlon"))?,
        right: right.ok_or_else(|| missing("bounds", "maxlon"))?,
        top: top.ok_or_else(|| missing("bounds", "maxlat"))?,
        bottom: bottom.ok_or_else(|| missing("bounds", "minlat"))?,
        origin,
    })
}

fn required_attribute(el: &BytesStart, element: &str, name: &str) -> Result<String> {
    optional_attribute(el, name)?.ok_or_else(|| missing(element, name))
}

fn optional_attribute(el: &BytesStart, name: &str) -> Result<Option<String>> {
    match el.try_get_attribute(name)? {
        Some(attribute) => Ok(Some(attribute.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Applies a `tag`, `nd` or `member` child to the open element, whether it
/// is written self-closing or not. Other elements (`note`, `meta`, ...) and
/// children of elements that are not entities are skipped.
fn add_child(current: Option<&mut Entity>, el: &BytesStart) -> Result<()> {
    if current.is_none() {
        return Ok(());
    }
    match el.name().as_ref() {
        b"tag" => add_tag(current, el),
        b"nd" => add_node_ref(current, el),
        b"member" => add_member(current, el),
        _ => Ok(()),
    }
}

fn tags_of(entity: &mut Entity) -> Option<&mut Vec<Tag>> {
    match entity {
        Entity::Node(node) => Some(&mut node.tags),
        Entity::Way(way) => Some(&mut way.tags),
        Entity::Relation(relation) => Some(&mut relation.tags),
        Entity::Bound(_) => None,
    }
}

fn add_tag(current: Option<&mut Entity>, el: &BytesStart) -> Result<()> {
    let tags = current.and_then(tags_of).ok_or("<tag> outside of a node, way or relation")?;
    let key = required_attribute(el, "tag", "k")?;
    let value = required_attribute(el, "tag", "v")?;
    // Keys are unique per element; a repeated key replaces the earlier value.
    match tags.iter_mut().find(|tag| tag.key == key) {
        Some(tag) => tag.value = value,
        None => tags.push(Tag { key, value }),
    }
    Ok(())
}

fn add_node_ref(current: Option<&mut Entity>, el: &BytesStart) -> Result<()> {
    let Some(Entity::Way(way)) = current else {
        return Err("<nd> outside of a way".into());
    };
    way.refs.push(required_attribute(el, "nd", "ref")?.parse()?);
    Ok(())
}

impl FromStr for MemberType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "node" => Ok(MemberType::Node),
            "way" => Ok(MemberType::Way),
            "relation" => Ok(MemberType::Relation),
            other => Err(format!("Unknown relation member type '{}'", other).into()),
        }
    }
}

fn add_member(current: Option<&mut Entity>, el: &BytesStart) -> Result<()> {
    let Some(Entity::Relation(relation)) = current else {
        return Err("<member> outside of a relation".into());
    };
    relation.members.push(RelationMember {
        id: required_attribute(el, "member", "ref")?.parse()?,
        member_type: required_attribute(el, "member", "type")?.parse()?,
        role: optional_attribute(el, "role")?.unwrap_or_default(),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="test">
  <bounds minlat="51.28" minlon="-0.51" maxlat="51.69" maxlon="0.33" origin="extract"/>
  <node id="1" lat="51.5" lon="-0.1" version="2" timestamp="2020-01-02T03:04:05Z" changeset="77" uid="12" user="mapper"/>
  <node id="2" lat="51.6" lon="-0.2" version="1" timestamp="2020-01-02T03:04:06Z" changeset="78">
    <tag k="amenity" v="pub"/>
    <tag k="name" v="The &amp; Arms"/>
    <tag k="name" v="The Crown"/>
  </node>
  <way id="5">
    <nd ref="100"/>
    <nd ref="102"/>
    <nd ref="101"/>
    <tag k="highway" v="residential"/>
  </way>
  <relation id="9" version="3">
    <member type="way" ref="3" role="outer"/>
    <member type="node" ref="4"/>
    <tag k="type" v="multipolygon"/>
  </relation>
</osm>
"#;

    fn read_all(xml: &str) -> Result<Vec<Entity>> {
        OsmXmlReader::new(xml.as_bytes()).collect()
    }

    #[test]
    fn reads_every_entity_kind_in_order() {
        let entities = read_all(SAMPLE).unwrap();
        assert_eq!(entities.len(), 5);

        assert_eq!(entities[0], Entity::Bound(Bound {
            left: -0.51,
            right: 0.33,
            top: 51.69,
            bottom: 51.28,
            origin: Some("extract".to_string()),
        }));

        let Entity::Node(first) = &entities[1] else { panic!("expected a node") };
        assert_eq!(first.id, 1);
        assert!(first.tags.is_empty());
        assert_eq!(first.metadata, Some(Metadata {
            version: 2,
            timestamp: Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap(),
            changeset: 77,
            author: Some(Author { uid: 12, name: "mapper".to_string() }),
        }));

        let Entity::Node(second) = &entities[2] else { panic!("expected a node") };
        assert_eq!(second.tags, vec![Tag::new("amenity", "pub"), Tag::new("name", "The Crown")]);
        assert_eq!(second.metadata.as_ref().unwrap().author, None);

        let Entity::Way(way) = &entities[3] else { panic!("expected a way") };
        assert_eq!(way.refs, vec![100, 102, 101]);
        assert_eq!(way.metadata, None);

        let Entity::Relation(relation) = &entities[4] else { panic!("expected a relation") };
        assert_eq!(relation.members, vec![
            RelationMember { id: 3, member_type: MemberType::Way, role: "outer".to_string() },
            RelationMember { id: 4, member_type: MemberType::Node, role: String::new() },
        ]);
        assert_eq!(relation.metadata.as_ref().unwrap().version, 3);
    }

    #[test]
    fn escaped_values_are_unescaped() {
        let entities = read_all(r#"<osm><node id="1" lat="0" lon="0"><tag k="name" v="A &amp; B"/></node></osm>"#).unwrap();
        let Entity::Node(node) = &entities[0] else { panic!("expected a node") };
        assert_eq!(node.tags[0].value, "A & B");
    }

    #[test]
    fn children_with_closing_tags_are_read() {
        let xml = r#"<osm>
  <way id="1"><nd ref="7"></nd><nd ref="9"></nd><tag k="highway" v="path"></tag></way>
  <relation id="2"><member type="way" ref="1" role="outer"></member><tag k="type" v="route"></tag></relation>
</osm>"#;
        let entities = read_all(xml).unwrap();
        assert_eq!(entities.len(), 2);

        let Entity::Way(way) = &entities[0] else { panic!("expected a way") };
        assert_eq!(way.refs, vec![7, 9]);
        assert_eq!(way.tags, vec![Tag::new("highway", "path")]);

        let Entity::Relation(relation) = &entities[1] else { panic!("expected a relation") };
        assert_eq!(relation.members, vec![
            RelationMember { id: 1, member_type: MemberType::Way, role: "outer".to_string() },
        ]);
        assert_eq!(relation.tags, vec![Tag::new("type", "route")]);
    }

    #[test]
    fn overpass_note_and_meta_are_skipped() {
        let xml = r#"<osm version="0.6" generator="Overpass API">
  <note>The data included in this document is from www.openstreetmap.org. The data is made available under ODbL.</note>
  <meta osm_base="2024-01-01T00:00:00Z"/>
  <node id="1" lat="0" lon="0"/>
</osm>"#;
        let entities = read_all(xml).unwrap();
        assert_eq!(entities.len(), 1);
        let Entity::Node(node) = &entities[0] else { panic!("expected a node") };
        assert_eq!(node.id, 1);
    }

    #[test]
    fn children_of_unknown_elements_are_skipped() {
        let xml = r#"<osm><area id="3600000001"><tag k="name" v="Somewhere"/></area><node id="1" lat="0" lon="0"/></osm>"#;
        let entities = read_all(xml).unwrap();
        assert_eq!(entities.len(), 1);
    }

    #[test]
    fn unknown_member_type_is_an_error() {
        let xml = r#"<osm><relation id="1"><member type="area" ref="1" role=""/></relation></osm>"#;
        let err = read_all(xml).unwrap_err();
        assert!(err.message.contains("area"));
    }

    #[test]
    fn node_without_coordinates_is_an_error() {
        assert!(read_all(r#"<osm><node id="1" lat="1"/></osm>"#).is_err());
    }

    #[test]
    fn reader_stops_after_first_error() {
        let xml = r#"<osm><node id="x" lat="0" lon="0"/><node id="2" lat="0" lon="0"/></osm>"#;
        let mut reader = OsmXmlReader::new(xml.as_bytes());
        assert!(matches!(reader.next(), Some(Err(_))));
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_document_is_an_error() {
        assert!(read_all(r#"<osm><way id="1"><nd ref="1"/>"#).is_err());
    }
}

use chrono::{DateTime, Utc};

pub type OsmId = i64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The user who last edited an element. Anonymous edits carry no author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub uid: i32,
    pub name: String,
}

/// Revision metadata attached to every primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub version: i32,
    pub timestamp: DateTime<Utc>,
    pub changeset: i64,
    pub author: Option<Author>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    pub tags: Vec<Tag>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: OsmId,
    /// Referenced node ids. The order defines the line geometry.
    pub refs: Vec<OsmId>,
    pub tags: Vec<Tag>,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMember {
    pub id: OsmId,
    pub member_type: MemberType,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: OsmId,
    pub members: Vec<RelationMember>,
    pub tags: Vec<Tag>,
    pub metadata: Option<Metadata>,
}

/// Bounding region of a data set, in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub origin: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(Node),
    Way(Way),
    Relation(Relation),
    Bound(Bound),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Node,
    Way,
    Relation,
    Bound,
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Node(_) => EntityType::Node,
            Entity::Way(_) => EntityType::Way,
            Entity::Relation(_) => EntityType::Relation,
            Entity::Bound(_) => EntityType::Bound,
        }
    }
}

/// Common view over the batched primitive kinds.
pub trait OsmPrimitive {
    fn id(&self) -> OsmId;
    fn tags(&self) -> &[Tag];
    fn metadata(&self) -> Option<&Metadata>;
}

macro_rules! impl_primitive {
    ($($ty:ty),*) => {
        $(
            impl OsmPrimitive for $ty {
                fn id(&self) -> OsmId {
                    self.id
                }

                fn tags(&self) -> &[Tag] {
                    &self.tags
                }

                fn metadata(&self) -> Option<&Metadata> {
                    self.metadata.as_ref()
                }
            }
        )*
    };
}

impl_primitive!(Node, Way, Relation);

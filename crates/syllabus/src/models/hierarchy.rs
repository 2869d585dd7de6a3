//! Hierarchy node model for MongoDB
//!
//! Every node stores the ids of all of its ancestors (a materialized path).
//! The deepest ancestor id is the parent reference.

use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Bson, Document as BsonDoc};
use serde::{Deserialize, Serialize};

use super::common::bson_datetime_or_now;
use crate::db::collections;

/// Level of the catalogue hierarchy, root first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Level {
    Class,
    Subject,
    Unit,
    SubUnit,
    Lesson,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Class,
        Level::Subject,
        Level::Unit,
        Level::SubUnit,
        Level::Lesson,
    ];

    /// Zero-based distance from the root
    pub fn depth(self) -> usize {
        match self {
            Level::Class => 0,
            Level::Subject => 1,
            Level::Unit => 2,
            Level::SubUnit => 3,
            Level::Lesson => 4,
        }
    }

    pub fn collection(self) -> &'static str {
        match self {
            Level::Class => collections::CLASSES,
            Level::Subject => collections::SUBJECTS,
            Level::Unit => collections::UNITS,
            Level::SubUnit => collections::SUB_UNITS,
            Level::Lesson => collections::LESSONS,
        }
    }

    /// Path segment under `/api`
    pub fn route_segment(self) -> &'static str {
        match self {
            Level::Class => "classes",
            Level::Subject => "subjects",
            Level::Unit => "units",
            Level::SubUnit => "subUnits",
            Level::Lesson => "lessons",
        }
    }

    /// Field name used when this level is referenced from below
    pub fn id_key(self) -> &'static str {
        match self {
            Level::Class => "classId",
            Level::Subject => "subjectId",
            Level::Unit => "unitId",
            Level::SubUnit => "subUnitId",
            Level::Lesson => "lessonId",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Class => "Class",
            Level::Subject => "Subject",
            Level::Unit => "Unit",
            Level::SubUnit => "SubUnit",
            Level::Lesson => "Lesson",
        }
    }

    pub fn parent(self) -> Option<Level> {
        self.depth().checked_sub(1).map(|d| Self::ALL[d])
    }

    pub fn parent_key(self) -> Option<&'static str> {
        self.parent().map(Level::id_key)
    }

    /// Levels above this one, root first
    pub fn ancestors(self) -> &'static [Level] {
        &Self::ALL[..self.depth()]
    }

    /// Levels below this one
    pub fn descendants(self) -> &'static [Level] {
        &Self::ALL[self.depth() + 1..]
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "class" | "classes" => Ok(Level::Class),
            "subject" | "subjects" => Ok(Level::Subject),
            "unit" | "units" => Ok(Level::Unit),
            "subunit" | "subunits" | "sub_unit" | "sub_units" => Ok(Level::SubUnit),
            "lesson" | "lessons" => Ok(Level::Lesson),
            _ => Err(format!("Unknown hierarchy level: {}", s)),
        }
    }
}

/// Hierarchy node document (shared shape for all five collections)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_unit_id: Option<ObjectId>,
    #[serde(default = "Utc::now", with = "bson_datetime_or_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "bson_datetime_or_now")]
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            name: name.into(),
            class_id: None,
            subject_id: None,
            unit_id: None,
            sub_unit_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Id stored for an ancestor level (None for Lesson or when absent)
    pub fn ancestor_id(&self, level: Level) -> Option<ObjectId> {
        match level {
            Level::Class => self.class_id,
            Level::Subject => self.subject_id,
            Level::Unit => self.unit_id,
            Level::SubUnit => self.sub_unit_id,
            Level::Lesson => None,
        }
    }

    pub fn set_ancestor_id(&mut self, level: Level, id: Option<ObjectId>) {
        match level {
            Level::Class => self.class_id = id,
            Level::Subject => self.subject_id = id,
            Level::Unit => self.unit_id = id,
            Level::SubUnit => self.sub_unit_id = id,
            Level::Lesson => {}
        }
    }

    /// Parent reference of a node that lives at `level`
    pub fn parent_id(&self, level: Level) -> Option<ObjectId> {
        level.parent().and_then(|p| self.ancestor_id(p))
    }

    /// Copy the ancestor path a child of this node (living at `level`) must carry.
    pub fn adopt_into(&self, level: Level, child: &mut Node) {
        for ancestor in level.ancestors() {
            child.set_ancestor_id(*ancestor, self.ancestor_id(*ancestor));
        }
        child.set_ancestor_id(level, self.id);
    }

    /// `$set` document describing this node's ancestry as seen by its
    /// descendants: every ancestor id plus this node's own id.
    pub fn lineage_update(&self, level: Level) -> BsonDoc {
        let mut set = BsonDoc::new();
        for ancestor in level.ancestors() {
            let value = self
                .ancestor_id(*ancestor)
                .map(Bson::ObjectId)
                .unwrap_or(Bson::Null);
            set.insert(ancestor.id_key(), value);
        }
        if let Some(id) = self.id {
            set.insert(level.id_key(), id);
        }
        set
    }
}

/// Node response for the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_unit_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Node> for NodeInfo {
    fn from(n: Node) -> Self {
        Self {
            id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: n.name,
            class_id: n.class_id.map(|id| id.to_hex()),
            subject_id: n.subject_id.map(|id| id.to_hex()),
            unit_id: n.unit_id.map(|id| id.to_hex()),
            sub_unit_id: n.sub_unit_id.map(|id| id.to_hex()),
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}

/// Diagnostic returned when an upload's lesson id resolves to nothing
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCheck {
    pub is_lesson: bool,
    pub is_sub_unit: bool,
    pub is_unit: bool,
    pub lessons_found: u64,
}

/// How an upload's lesson id was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolvedVia {
    Lesson,
    SubUnit,
    Unit,
}

/// Names along a lesson's ancestor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyPath {
    pub class: String,
    pub subject: String,
    pub unit: String,
    pub sub_unit: Option<String>,
    pub lesson: String,
}

impl HierarchyPath {
    /// Human-readable location recorded on uploaded content
    pub fn virtual_path(&self) -> String {
        let mut parts = vec![self.class.as_str(), self.subject.as_str(), self.unit.as_str()];
        if let Some(sub_unit) = &self.sub_unit {
            parts.push(sub_unit);
        }
        parts.push(&self.lesson);
        parts.join("/")
    }
}

/// Filter selecting every node of a level that sits under `ancestor`
pub fn under(ancestor: Level, id: ObjectId) -> BsonDoc {
    let mut filter = BsonDoc::new();
    filter.insert(ancestor.id_key(), id);
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_relationships() {
        assert_eq!(Level::Class.parent(), None);
        assert_eq!(Level::Lesson.parent(), Some(Level::SubUnit));
        assert_eq!(Level::Unit.parent_key(), Some("subjectId"));
        assert_eq!(Level::SubUnit.ancestors(), &[Level::Class, Level::Subject, Level::Unit]);
        assert_eq!(Level::SubUnit.descendants(), &[Level::Lesson]);
        assert!(Level::Lesson.descendants().is_empty());
        assert_eq!("subUnits".parse::<Level>().unwrap(), Level::SubUnit);
        assert!("chapters".parse::<Level>().is_err());
    }

    #[test]
    fn test_adopt_into_copies_lineage() {
        let mut unit = Node::new("Algebra");
        unit.id = Some(ObjectId::new());
        unit.class_id = Some(ObjectId::new());
        unit.subject_id = Some(ObjectId::new());

        let mut sub_unit = Node::new("Linear equations");
        unit.adopt_into(Level::Unit, &mut sub_unit);

        assert_eq!(sub_unit.class_id, unit.class_id);
        assert_eq!(sub_unit.subject_id, unit.subject_id);
        assert_eq!(sub_unit.unit_id, unit.id);
        assert_eq!(sub_unit.parent_id(Level::SubUnit), unit.id);
        assert_eq!(sub_unit.sub_unit_id, None);
    }

    #[test]
    fn test_lineage_update_includes_self() {
        let mut subject = Node::new("Maths");
        subject.id = Some(ObjectId::new());
        subject.class_id = Some(ObjectId::new());

        let set = subject.lineage_update(Level::Subject);
        assert_eq!(set.get_object_id("classId").ok(), subject.class_id);
        assert_eq!(set.get_object_id("subjectId").ok(), subject.id);
        assert!(set.get("unitId").is_none());
    }

    #[test]
    fn test_virtual_path() {
        let path = HierarchyPath {
            class: "Class 10".into(),
            subject: "Science".into(),
            unit: "Motion".into(),
            sub_unit: None,
            lesson: "Speed".into(),
        };
        assert_eq!(path.virtual_path(), "Class 10/Science/Motion/Speed");
    }
}

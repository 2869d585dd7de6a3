//! Hierarchy service for MongoDB
//!
//! One service covers all five levels; the level decides the collection,
//! the parent key and which descendants are affected by re-parenting and
//! cascading deletes.

use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document as BsonDoc};
use mongodb::options::{FindOneOptions, FindOptions};
use serde::Serialize;
use std::path::Path;

use super::storage::remove_file_best_effort;
use crate::db::{collections, MongoDb};
use crate::error::{CatalogError, CatalogResult};
use crate::models::hierarchy::under;
use crate::models::{parse_oid, DocumentCheck, HierarchyPath, Level, Node, ResolvedVia};

/// Outcome of a delete
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteReport {
    pub nodes: u64,
    pub contents: u64,
    pub files: u64,
}

pub struct HierarchyService {
    db: MongoDb,
}

impl HierarchyService {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    fn nodes(&self, level: Level) -> mongodb::Collection<Node> {
        self.db.collection(level.collection())
    }

    fn oldest_first() -> FindOptions {
        FindOptions::builder().sort(doc! { "createdAt": 1, "_id": 1 }).build()
    }

    fn first_created() -> FindOneOptions {
        FindOneOptions::builder()
            .sort(doc! { "createdAt": 1, "_id": 1 })
            .build()
    }

    /// List nodes of a level, optionally narrowed to descendants of ancestors
    pub async fn list(&self, level: Level, ancestors: &[(Level, ObjectId)]) -> CatalogResult<Vec<Node>> {
        let mut filter = BsonDoc::new();
        for (ancestor, id) in ancestors {
            filter.insert(ancestor.id_key(), *id);
        }
        let cursor = self.nodes(level).find(filter, Self::oldest_first()).await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn find(&self, level: Level, id: ObjectId) -> CatalogResult<Option<Node>> {
        Ok(self.nodes(level).find_one(doc! { "_id": id }, None).await?)
    }

    pub async fn get(&self, level: Level, id: &str) -> CatalogResult<Node> {
        let oid = parse_oid("id", id)?;
        self.find(level, oid)
            .await?
            .ok_or_else(|| CatalogError::NodeNotFound {
                level: level.label(),
                id: id.to_string(),
            })
    }

    /// Look up the parent a node of `level` would hang under
    async fn load_parent(&self, level: Level, parent_id: Option<&str>) -> CatalogResult<Option<Node>> {
        let Some(parent_level) = level.parent() else {
            return Ok(None);
        };
        let key = parent_level.id_key();
        let raw = parent_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CatalogError::Validation(format!("{} is required", key)))?;
        let oid = parse_oid(key, raw)?;
        let parent = self
            .find(parent_level, oid)
            .await?
            .ok_or_else(|| CatalogError::ParentNotFound {
                level: parent_level.label(),
                id: raw.to_string(),
            })?;
        Ok(Some(parent))
    }

    fn validate_name(name: &str) -> CatalogResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation("name is required".to_string()));
        }
        Ok(name.to_string())
    }

    pub async fn create(&self, level: Level, name: &str, parent_id: Option<&str>) -> CatalogResult<Node> {
        let mut node = Node::new(Self::validate_name(name)?);
        if let (Some(parent_level), Some(parent)) =
            (level.parent(), self.load_parent(level, parent_id).await?)
        {
            parent.adopt_into(parent_level, &mut node);
        }

        let result = self.nodes(level).insert_one(&node, None).await?;
        node.id = result.inserted_id.as_object_id();
        tracing::info!("Created {} {:?} ({:?})", level, node.name, node.id);
        Ok(node)
    }

    /// Rename and/or re-parent a node. Re-parenting rewrites the ancestor
    /// path of every descendant.
    pub async fn update(
        &self,
        level: Level,
        id: &str,
        name: Option<&str>,
        parent_id: Option<&str>,
    ) -> CatalogResult<Node> {
        let mut node = self.get(level, id).await?;
        let oid = node.id.ok_or_else(|| CatalogError::Internal("node without id".to_string()))?;

        let mut set_doc = doc! { "updatedAt": bson::DateTime::from_chrono(Utc::now()) };
        if let Some(name) = name {
            node.name = Self::validate_name(name)?;
            set_doc.insert("name", node.name.clone());
        }

        let mut reparented = false;
        if parent_id.is_some() {
            if let (Some(parent_level), Some(parent)) =
                (level.parent(), self.load_parent(level, parent_id).await?)
            {
                if node.parent_id(level) != parent.id {
                    parent.adopt_into(parent_level, &mut node);
                    for (key, value) in parent.lineage_update(parent_level) {
                        set_doc.insert(key, value);
                    }
                    reparented = true;
                }
            }
        }

        self.nodes(level)
            .update_one(doc! { "_id": oid }, doc! { "$set": set_doc }, None)
            .await?;

        if reparented {
            let lineage = node.lineage_update(level);
            for descendant in level.descendants() {
                let result = self
                    .db
                    .collection::<BsonDoc>(descendant.collection())
                    .update_many(
                        under(level, oid),
                        doc! { "$set": lineage.clone() },
                        None,
                    )
                    .await?;
                tracing::debug!(
                    "Re-parented {} {} under {}",
                    result.modified_count,
                    descendant,
                    oid
                );
            }
        }

        self.get(level, id).await
    }

    /// Delete a node. Without `cascade` only the node itself goes; with it,
    /// every descendant node, the content attached to affected lessons and
    /// the files backing that content are removed too.
    pub async fn delete(&self, level: Level, id: &str, cascade: bool) -> CatalogResult<DeleteReport> {
        let node = self.get(level, id).await?;
        let oid = node.id.ok_or_else(|| CatalogError::Internal("node without id".to_string()))?;
        let mut report = DeleteReport::default();

        if cascade {
            let lesson_ids: Vec<ObjectId> = if level == Level::Lesson {
                vec![oid]
            } else {
                self.list(Level::Lesson, &[(level, oid)])
                    .await?
                    .into_iter()
                    .filter_map(|lesson| lesson.id)
                    .collect()
            };

            if !lesson_ids.is_empty() {
                let contents = self.db.collection::<BsonDoc>(collections::CONTENTS);
                let filter = doc! { "lessonId": { "$in": lesson_ids.clone() } };
                let attached: Vec<BsonDoc> = contents.find(filter.clone(), None).await?.try_collect().await?;
                for content in &attached {
                    if let Ok(path) = content.get_str("filePath") {
                        if remove_file_best_effort(Path::new(path)).await {
                            report.files += 1;
                        }
                    }
                }
                report.contents = contents.delete_many(filter, None).await?.deleted_count;
            }

            for descendant in level.descendants() {
                report.nodes += self
                    .db
                    .collection::<BsonDoc>(descendant.collection())
                    .delete_many(under(level, oid), None)
                    .await?
                    .deleted_count;
            }
        }

        report.nodes += self
            .nodes(level)
            .delete_one(doc! { "_id": oid }, None)
            .await?
            .deleted_count;

        tracing::info!(
            "Deleted {} {} (cascade: {}, nodes: {}, contents: {}, files: {})",
            level,
            oid,
            cascade,
            report.nodes,
            report.contents,
            report.files
        );
        Ok(report)
    }

    /// Resolve an id that should name a lesson but may name a sub-unit or a
    /// unit instead, picking the earliest lesson beneath it.
    pub async fn resolve_lesson(&self, raw_id: &str) -> CatalogResult<(Node, ResolvedVia)> {
        let oid = parse_oid("lessonId", raw_id)?;
        let lessons = self.nodes(Level::Lesson);

        if let Some(lesson) = self.find(Level::Lesson, oid).await? {
            return Ok((lesson, ResolvedVia::Lesson));
        }

        let mut check = DocumentCheck::default();

        if self.find(Level::SubUnit, oid).await?.is_some() {
            check.is_sub_unit = true;
            let filter = under(Level::SubUnit, oid);
            check.lessons_found = lessons.count_documents(filter.clone(), None).await?;
            if let Some(lesson) = lessons.find_one(filter, Self::first_created()).await? {
                return Ok((lesson, ResolvedVia::SubUnit));
            }
        } else if self.find(Level::Unit, oid).await?.is_some() {
            check.is_unit = true;
            let first_sub_unit = self
                .nodes(Level::SubUnit)
                .find_one(doc! { "unitId": oid }, Self::first_created())
                .await?;
            if let Some(sub_unit_id) = first_sub_unit.and_then(|s| s.id) {
                if let Some(lesson) = lessons
                    .find_one(doc! { "subUnitId": sub_unit_id }, Self::first_created())
                    .await?
                {
                    return Ok((lesson, ResolvedVia::Unit));
                }
            }
            // Lessons filed directly under the unit, or under a later sub-unit
            let filter = under(Level::Unit, oid);
            check.lessons_found = lessons.count_documents(filter.clone(), None).await?;
            if let Some(lesson) = lessons.find_one(filter, Self::first_created()).await? {
                return Ok((lesson, ResolvedVia::Unit));
            }
        }

        Err(CatalogError::LessonUnresolved {
            id: raw_id.to_string(),
            check,
        })
    }

    /// Names along a lesson's ancestor chain.
    ///
    /// Uses the stored ancestor ids when they are all present and resolvable;
    /// otherwise walks parent pointers one level at a time.
    pub async fn hierarchy_path(&self, lesson: &Node) -> CatalogResult<HierarchyPath> {
        if let Some(path) = self.path_from_ancestor_ids(lesson).await? {
            return Ok(path);
        }
        tracing::debug!("Ancestor ids incomplete for lesson {:?}, walking parents", lesson.id);
        self.path_by_walking(lesson).await
    }

    async fn name_of(&self, level: Level, id: Option<ObjectId>) -> CatalogResult<Option<String>> {
        match id {
            Some(id) => Ok(self.find(level, id).await?.map(|n| n.name)),
            None => Ok(None),
        }
    }

    async fn path_from_ancestor_ids(&self, lesson: &Node) -> CatalogResult<Option<HierarchyPath>> {
        let names = [
            self.name_of(Level::Class, lesson.class_id).await?,
            self.name_of(Level::Subject, lesson.subject_id).await?,
            self.name_of(Level::Unit, lesson.unit_id).await?,
            self.name_of(Level::SubUnit, lesson.sub_unit_id).await?,
        ];
        Ok(path_from_stored_names(lesson, names))
    }

    async fn path_by_walking(&self, lesson: &Node) -> CatalogResult<HierarchyPath> {
        let mut names: [Option<String>; 4] = Default::default();
        let mut current = lesson.clone();
        let mut level = Level::Lesson;

        while let Some((parent_level, parent_id)) = parent_pointer(level, &current) {
            let Some(parent) = self.find(parent_level, parent_id).await? else {
                break;
            };
            names[parent_level.depth()] = Some(parent.name.clone());
            current = parent;
            level = parent_level;
        }

        path_from_walked_names(lesson, names)
    }
}

/// The deepest ancestor id a node stores, which is its parent pointer even
/// when the rest of the path was never filled in
fn parent_pointer(level: Level, node: &Node) -> Option<(Level, ObjectId)> {
    level
        .ancestors()
        .iter()
        .rev()
        .find_map(|l| node.ancestor_id(*l).map(|id| (*l, id)))
}

/// Path from the names behind a lesson's stored ancestor ids, ordered
/// class, subject, unit, sub-unit. None when any referenced ancestor is gone.
fn path_from_stored_names(lesson: &Node, names: [Option<String>; 4]) -> Option<HierarchyPath> {
    let [class, subject, unit, sub_unit] = names;
    if lesson.sub_unit_id.is_some() && sub_unit.is_none() {
        return None;
    }
    Some(HierarchyPath {
        class: class?,
        subject: subject?,
        unit: unit?,
        sub_unit,
        lesson: lesson.name.clone(),
    })
}

fn path_from_walked_names(lesson: &Node, names: [Option<String>; 4]) -> CatalogResult<HierarchyPath> {
    let [class, subject, unit, sub_unit] = names;
    let missing = |what: &str| {
        CatalogError::Validation(format!(
            "Lesson {} is not attached to a {}",
            lesson.id.map(|id| id.to_hex()).unwrap_or_default(),
            what
        ))
    };
    Ok(HierarchyPath {
        class: class.ok_or_else(|| missing("class"))?,
        subject: subject.ok_or_else(|| missing("subject"))?,
        unit: unit.ok_or_else(|| missing("unit"))?,
        sub_unit,
        lesson: lesson.name.clone(),
    })
}

//! Comment data core: the flat comment table, read-by records, users and
//! comment types, plus the thread ordering derived from them.
//!
//! Threads are trees: `comment_id_parent` points at the parent and
//! `comment_id_previous` at the preceding sibling. Ordering is rebuilt from
//! those links on every read.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::models::{Comment, CommentStats, CommentType, ReadBy, User, DEFAULT_COMMENT_TYPE};
use crate::error::{Error, Result};

/// On-disk shape of a comment database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentDb {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub readby: Vec<ReadBy>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(rename = "commentTypes", default)]
    pub comment_types: Vec<CommentType>,
}

/// What a removal changed, for persisting and republishing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoveOutcome {
    pub removed: Vec<String>,
    /// Comments kept as "deleted" placeholders because they have replies
    pub marked_deleted: Vec<Comment>,
    /// Siblings whose `comment_id_previous` was rewritten
    pub relinked: Vec<Comment>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    comments: HashMap<String, Comment>,
    readby: HashMap<String, BTreeSet<String>>,
    users: HashMap<String, String>,
    comment_types: Vec<CommentType>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_db(db: CommentDb) -> Self {
        let mut store = Self::new();
        for comment in db.comments {
            store.comments.insert(comment.comment_id.clone(), comment);
        }
        for entry in db.readby {
            store
                .readby
                .entry(entry.comment_id)
                .or_default()
                .extend(entry.commenter_ids);
        }
        for user in db.users {
            store.users.insert(user.id, user.name);
        }
        store.comment_types = db.comment_types;
        store
    }

    pub fn to_db(&self) -> CommentDb {
        let mut comments: Vec<Comment> = self.comments.values().cloned().collect();
        comments.sort_by(|a, b| {
            a.comment_createtime
                .cmp(&b.comment_createtime)
                .then_with(|| a.comment_id.cmp(&b.comment_id))
        });
        let mut users: Vec<User> = self
            .users
            .iter()
            .map(|(id, name)| User { id: id.clone(), name: name.clone() })
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        CommentDb {
            comments,
            readby: self.readby_entries(self.readby.keys().map(String::as_str)),
            users,
            comment_types: self.comment_types.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let db: CommentDb = serde_json::from_str(&content)?;
        Ok(Self::from_db(db))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.to_db())?;
        fs::write(path, content)?;
        Ok(())
    }

    // --- Lookups -----------------------------------------------------------

    pub fn get(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.get(comment_id)
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Every collection reference that has at least one comment, sorted.
    pub fn crefs(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.comments.values().map(|c| c.collection_ref.as_str()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    pub fn has_children(&self, comment_id: &str) -> bool {
        self.comments.values().any(|c| c.comment_id_parent == comment_id)
    }

    pub fn set_users(&mut self, users: impl IntoIterator<Item = User>) {
        for user in users {
            self.users.insert(user.id, user.name);
        }
    }

    /// Display name, falling back to the id for unknown users.
    pub fn user_name(&self, uid: &str) -> String {
        self.users.get(uid).cloned().unwrap_or_else(|| uid.to_string())
    }

    pub fn set_comment_types(&mut self, types: Vec<CommentType>) {
        self.comment_types = types;
    }

    /// The named comment type, else the built-in default.
    pub fn comment_type(&self, slug: &str) -> CommentType {
        self.comment_types
            .iter()
            .find(|t| t.slug == slug)
            .cloned()
            .unwrap_or_else(CommentType::default_type)
    }

    /// Slug new comments get: the template's first type, else the default.
    pub fn default_comment_type(&self) -> String {
        self.comment_types
            .first()
            .map(|t| t.slug.clone())
            .unwrap_or_else(|| DEFAULT_COMMENT_TYPE.to_string())
    }

    // --- Threading ---------------------------------------------------------

    /// Order siblings by their `previous` chain. Heads are siblings whose
    /// predecessor is empty or not a sibling; conflicting successors and
    /// anything left over (cycles) follow in creation order.
    fn order_siblings<'a>(siblings: Vec<&'a Comment>) -> Vec<&'a Comment> {
        let by_time = |a: &&Comment, b: &&Comment| {
            a.comment_createtime
                .cmp(&b.comment_createtime)
                .then_with(|| a.comment_id.cmp(&b.comment_id))
        };
        let ids: HashSet<&str> = siblings.iter().map(|c| c.comment_id.as_str()).collect();
        let mut next_of: HashMap<&str, Vec<&Comment>> = HashMap::new();
        let mut heads: Vec<&Comment> = Vec::new();
        for c in siblings.iter().copied() {
            let prev = c.comment_id_previous.as_str();
            if prev.is_empty() || !ids.contains(prev) {
                heads.push(c);
            } else {
                next_of.entry(prev).or_default().push(c);
            }
        }
        heads.sort_by(by_time);
        for list in next_of.values_mut() {
            list.sort_by(by_time);
        }

        let mut ordered = Vec::with_capacity(siblings.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&Comment> = heads.into_iter().rev().collect();
        while let Some(c) = stack.pop() {
            if !visited.insert(c.comment_id.as_str()) {
                continue;
            }
            ordered.push(c);
            if let Some(next) = next_of.get(c.comment_id.as_str()) {
                stack.extend(next.iter().rev());
            }
        }

        let mut rest: Vec<&Comment> = siblings
            .into_iter()
            .filter(|c| !visited.contains(c.comment_id.as_str()))
            .collect();
        rest.sort_by(by_time);
        ordered.extend(rest);
        ordered
    }

    /// Depth-first flattening of a thread: each comment is followed by its
    /// replies, one level deeper. Comments whose parent is missing from the
    /// collection, or whose parent chain loops, are treated as roots.
    pub fn threaded_comments(&self, cref: &str) -> Vec<(&Comment, u32)> {
        let in_cref: Vec<&Comment> = self.comments.values().filter(|c| c.collection_ref == cref).collect();
        let ids: HashSet<&str> = in_cref.iter().map(|c| c.comment_id.as_str()).collect();

        let mut children: HashMap<&str, Vec<&Comment>> = HashMap::new();
        for c in in_cref.iter().copied() {
            let parent = c.comment_id_parent.as_str();
            let key = if ids.contains(parent) && parent != c.comment_id { parent } else { "" };
            children.entry(key).or_default().push(c);
        }
        let children: HashMap<&str, Vec<&Comment>> = children
            .into_iter()
            .map(|(k, v)| (k, Self::order_siblings(v)))
            .collect();

        let mut out = Vec::with_capacity(in_cref.len());
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<(&Comment, u32)> = children
            .get("")
            .map(|roots| roots.iter().rev().map(|c| (*c, 0)).collect())
            .unwrap_or_default();
        while let Some((c, level)) = stack.pop() {
            if !visited.insert(c.comment_id.as_str()) {
                continue;
            }
            out.push((c, level));
            if let Some(kids) = children.get(c.comment_id.as_str()) {
                stack.extend(kids.iter().rev().map(|k| (*k, level + 1)));
            }
        }

        // Parent cycles are unreachable from the roots; keep them as roots.
        let mut stranded: Vec<&Comment> = in_cref
            .iter()
            .copied()
            .filter(|c| !visited.contains(c.comment_id.as_str()))
            .collect();
        stranded.sort_by_key(|c| (c.comment_createtime, c.comment_id.as_str()));
        for c in stranded {
            if visited.insert(c.comment_id.as_str()) {
                out.push((c, 0));
            }
        }
        out
    }

    /// Last comment (in thread order) directly under `parent` in `cref`.
    pub fn last_sibling(&self, cref: &str, parent: &str) -> Option<&Comment> {
        let siblings: Vec<&Comment> = self
            .comments
            .values()
            .filter(|c| c.collection_ref == cref && c.comment_id_parent == parent)
            .collect();
        Self::order_siblings(siblings).last().copied()
    }

    // --- Mutation ----------------------------------------------------------

    /// Create and insert an empty comment appended after the last sibling.
    pub fn create_comment(&mut self, cref: &str, parent: Option<&str>, commenter_id: &str, comment_type: &str, now: i64) -> Comment {
        let parent = parent.unwrap_or("");
        let previous = self
            .last_sibling(cref, parent)
            .map(|c| c.comment_id.clone())
            .unwrap_or_default();
        let prompt_count = self.comment_type(comment_type).prompts.len();
        let comment = Comment {
            comment_id: uuid::Uuid::new_v4().to_string(),
            collection_ref: cref.to_string(),
            comment_id_parent: parent.to_string(),
            comment_id_previous: previous,
            comment_type: comment_type.to_string(),
            commenter_id: commenter_id.to_string(),
            commenter_text: vec![String::new(); prompt_count],
            comment_createtime: now,
            comment_modifytime: None,
            comment_is_marked_deleted: false,
        };
        self.comments.insert(comment.comment_id.clone(), comment.clone());
        comment
    }

    /// Insert or replace a comment as-is.
    pub fn upsert(&mut self, comment: Comment) {
        self.comments.insert(comment.comment_id.clone(), comment);
    }

    /// Replace an existing comment's editable content.
    pub fn update(&mut self, comment: &Comment, now: i64) -> Result<Comment> {
        let existing = self
            .comments
            .get_mut(&comment.comment_id)
            .ok_or_else(|| Error::UnknownComment(comment.comment_id.clone()))?;
        existing.comment_type = comment.comment_type.clone();
        existing.commenter_text = comment.commenter_text.clone();
        existing.comment_modifytime = Some(now);
        Ok(existing.clone())
    }

    /// Drop a single comment without relinking or cascading. Used when
    /// another client already did that work.
    pub fn discard(&mut self, comment_id: &str) -> Option<Comment> {
        self.readby.remove(comment_id);
        self.comments.remove(comment_id)
    }

    /// Remove a comment. A comment with replies is kept as a deleted
    /// placeholder; otherwise it is removed, the following sibling is
    /// relinked past it, and a deleted parent left without replies is
    /// removed in turn.
    pub fn remove(&mut self, comment_id: &str) -> Result<RemoveOutcome> {
        if !self.comments.contains_key(comment_id) {
            return Err(Error::UnknownComment(comment_id.to_string()));
        }
        let mut outcome = RemoveOutcome::default();
        let mut target = Some(comment_id.to_string());

        while let Some(id) = target.take() {
            if self.has_children(&id) {
                if let Some(c) = self.comments.get_mut(&id) {
                    c.comment_is_marked_deleted = true;
                    c.commenter_text = c.commenter_text.iter().map(|_| String::new()).collect();
                    outcome.marked_deleted.push(c.clone());
                }
                break;
            }

            let Some(removed) = self.discard(&id) else { break; };
            let next_id = self
                .comments
                .values()
                .find(|c| {
                    c.collection_ref == removed.collection_ref
                        && c.comment_id_parent == removed.comment_id_parent
                        && c.comment_id_previous == removed.comment_id
                })
                .map(|c| c.comment_id.clone());
            if let Some(next_id) = next_id {
                if let Some(next) = self.comments.get_mut(&next_id) {
                    next.comment_id_previous = removed.comment_id_previous.clone();
                    outcome.relinked.push(next.clone());
                }
            }
            outcome.removed.push(removed.comment_id.clone());

            if !removed.is_root() {
                let parent_is_dead = self
                    .comments
                    .get(&removed.comment_id_parent)
                    .map(|p| p.comment_is_marked_deleted && !self.has_children(&p.comment_id))
                    .unwrap_or(false);
                if parent_is_dead {
                    target = Some(removed.comment_id_parent.clone());
                }
            }
        }

        // A placeholder that was relinked and then removed should not be persisted twice
        outcome.relinked.retain(|c| self.comments.contains_key(&c.comment_id));
        outcome.marked_deleted.retain(|c| self.comments.contains_key(&c.comment_id));
        Ok(outcome)
    }

    // --- Read tracking ------------------------------------------------------

    pub fn is_read(&self, comment_id: &str, uid: &str) -> bool {
        self.readby.get(comment_id).map(|r| r.contains(uid)).unwrap_or(false)
    }

    pub fn readers(&self, comment_id: &str) -> Vec<String> {
        self.readby
            .get(comment_id)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Add `uid` to the comment's readers. True when that changed anything.
    pub fn mark_read(&mut self, comment_id: &str, uid: &str) -> bool {
        if !self.comments.contains_key(comment_id) || uid.is_empty() {
            return false;
        }
        self.readby.entry(comment_id.to_string()).or_default().insert(uid.to_string())
    }

    /// Mark every comment in `cref` read by `uid`; returns the ids that changed.
    pub fn mark_all_read(&mut self, cref: &str, uid: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .comments
            .values()
            .filter(|c| c.collection_ref == cref)
            .map(|c| c.comment_id.clone())
            .collect();
        ids.sort();
        ids.into_iter().filter(|id| self.mark_read(id, uid)).collect()
    }

    /// Replace the reader set of a comment (remote updates).
    pub fn set_readers(&mut self, entry: ReadBy) {
        self.readby
            .insert(entry.comment_id, entry.commenter_ids.into_iter().collect());
    }

    /// Full reader lists for the given comments, the shape `DB_UPDATE` expects.
    pub fn readby_entries<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<ReadBy> {
        let mut entries: Vec<ReadBy> = ids
            .into_iter()
            .map(|id| ReadBy {
                comment_id: id.to_string(),
                commenter_ids: self.readers(id),
            })
            .collect();
        entries.sort_by(|a, b| a.comment_id.cmp(&b.comment_id));
        entries
    }

    pub fn stats(&self, cref: &str, uid: &str) -> CommentStats {
        let live: Vec<&Comment> = self
            .comments
            .values()
            .filter(|c| c.collection_ref == cref && !c.comment_is_marked_deleted)
            .collect();
        CommentStats {
            collection_ref: cref.to_string(),
            count: live.len(),
            unread: live.iter().filter(|c| !self.is_read(&c.comment_id, uid)).count(),
        }
    }
}

//! Comment view models: turns the comment store plus per-client UI state
//! (open threads, selection, the comment being edited) into the
//! COMMENTCOLLECTION and COMMENTVOBJS buckets.
//!
//! Every mutation follows the same order: change the store, persist through
//! `DB_UPDATE`, then rebuild and publish both buckets for the affected cref.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use super::models::{Comment, CommentCollection, CommentVObj};
use super::store::{CommentStore, RemoveOutcome};
use crate::app_state::AppState;
use crate::error::{Error, Result};
use crate::lock::{EditorKind, LockClient, ResourceKind};
use crate::server::{DbUpdate, Server};
use crate::settings::Settings;
use crate::template::Template;

pub struct CommentMgr<S: Server> {
    store: CommentStore,
    server: Arc<S>,
    locks: Arc<LockClient<S>>,
    time_format: String,
    open: HashSet<String>,
    selected: Option<String>,
    editing: Option<String>,
    /// Created locally, not yet persisted
    unsaved: HashSet<String>,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl<S: Server> CommentMgr<S> {
    pub fn new(server: Arc<S>, locks: Arc<LockClient<S>>, settings: &Settings) -> Self {
        Self {
            store: CommentStore::new(),
            server,
            locks,
            time_format: settings.time_format.clone(),
            open: HashSet::new(),
            selected: None,
            editing: None,
            unsaved: HashSet::new(),
        }
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    /// Replace the store wholesale (initial load).
    pub fn set_store(&mut self, store: CommentStore) {
        self.store = store;
        self.editing = None;
        self.selected = None;
        self.unsaved.clear();
    }

    pub fn set_template(&mut self, template: &Template) {
        self.store.set_comment_types(template.comment_types.clone());
    }

    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    /// Format a millisecond timestamp in local time. A bad format string
    /// falls back to RFC 3339 rather than panicking.
    pub fn format_time(&self, ms: i64) -> String {
        let Some(utc) = DateTime::<Utc>::from_timestamp_millis(ms) else {
            return String::new();
        };
        let local = utc.with_timezone(&Local);
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.time_format)).is_err() {
            tracing::warn!("invalid time format '{}'", self.time_format);
            return local.to_rfc3339();
        }
        out
    }

    // --- Derivation ----------------------------------------------------------

    /// Ordered view objects for one thread, as seen by `uid`.
    pub fn threaded_view_objects(&self, cref: &str, uid: &str) -> Vec<CommentVObj> {
        let threaded = self.store.threaded_comments(cref);
        let mut vobjs: Vec<CommentVObj> = threaded
            .iter()
            .map(|(c, level)| CommentVObj {
                comment_id: c.comment_id.clone(),
                level: *level,
                is_selected: self.selected.as_deref() == Some(c.comment_id.as_str()),
                is_being_edited: self.editing.as_deref() == Some(c.comment_id.as_str()),
                is_editable: !uid.is_empty() && c.commenter_id == uid && !c.comment_is_marked_deleted,
                is_marked_read: self.store.is_read(&c.comment_id, uid),
                allow_reply: false,
                createtime_string: self.format_time(c.comment_createtime),
                modifytime_string: c.comment_modifytime.map(|t| self.format_time(t)).unwrap_or_default(),
            })
            .collect();

        // Reply goes on the last comment of each root thread
        let mut start = 0;
        while start < threaded.len() {
            let mut end = start + 1;
            while end < threaded.len() && threaded[end].1 > 0 {
                end += 1;
            }
            let thread_busy = threaded[start..end]
                .iter()
                .any(|(c, _)| self.editing.as_deref() == Some(c.comment_id.as_str()));
            if !thread_busy && !uid.is_empty() {
                vobjs[end - 1].allow_reply = true;
            }
            start = end;
        }
        vobjs
    }

    pub fn comment_collection(&self, cref: &str, uid: &str) -> CommentCollection {
        let mut has_unread = false;
        let mut has_read = false;
        for (c, _) in self.store.threaded_comments(cref) {
            if c.comment_is_marked_deleted || self.unsaved.contains(&c.comment_id) {
                continue;
            }
            if self.store.is_read(&c.comment_id, uid) {
                has_read = true;
            } else {
                has_unread = true;
            }
        }
        CommentCollection {
            collection_ref: cref.to_string(),
            has_unread_comments: has_unread,
            has_read_comments: has_read,
            is_open: self.open.contains(cref),
        }
    }

    /// Rebuild and publish both buckets for `cref`.
    pub fn publish(&self, state: &AppState, cref: &str, uid: &str) {
        state.set_comment_collection(self.comment_collection(cref, uid));
        state.set_comment_vobjs(cref, self.threaded_view_objects(cref, uid));
    }

    pub fn publish_all(&self, state: &AppState, uid: &str) {
        let mut crefs: HashSet<String> = self.store.crefs().into_iter().collect();
        crefs.extend(self.open.iter().cloned());
        for cref in crefs {
            self.publish(state, &cref, uid);
        }
    }

    // --- UI state ----------------------------------------------------------

    pub fn open_collection(&mut self, state: &AppState, cref: &str, uid: &str) {
        self.open.insert(cref.to_string());
        self.publish(state, cref, uid);
    }

    /// Close a thread. Everything in it counts as read from now on.
    pub async fn close_collection(&mut self, state: &AppState, cref: &str, uid: &str) -> Result<()> {
        let editing_here = self
            .editing
            .as_deref()
            .and_then(|id| self.store.get(id))
            .map(|c| c.collection_ref == cref)
            .unwrap_or(false);
        if editing_here {
            self.cancel_edit(state, uid).await?;
        }
        self.open.remove(cref);
        let changed = self.store.mark_all_read(cref, uid);
        let persisted = if changed.is_empty() {
            Ok(())
        } else {
            let readby = self.store.readby_entries(changed.iter().map(String::as_str));
            self.persist(vec![DbUpdate::ReadBy { readby }]).await
        };
        self.publish(state, cref, uid);
        persisted
    }

    pub fn select_comment(&mut self, state: &AppState, comment_id: Option<&str>, uid: &str) {
        let previous = self.selected.take();
        self.selected = comment_id.map(str::to_string);
        let crefs: HashSet<String> = [previous.as_deref(), comment_id]
            .into_iter()
            .flatten()
            .filter_map(|id| self.store.get(id).map(|c| c.collection_ref.clone()))
            .collect();
        for cref in crefs {
            self.publish(state, &cref, uid);
        }
    }

    // --- Editing -----------------------------------------------------------

    /// Start a new comment (or a reply to `parent`) and open it for editing.
    pub async fn add_comment(&mut self, state: &AppState, cref: &str, parent: Option<&str>, uid: &str) -> Result<Comment> {
        if self.editing.is_some() {
            self.cancel_edit(state, uid).await?;
        }
        if let Some(parent_id) = parent {
            if self.store.get(parent_id).is_none() {
                return Err(Error::UnknownComment(parent_id.to_string()));
            }
        }
        if !self.locks.request_editor(EditorKind::Comment).await {
            return Err(Error::NotLocked { kind: ResourceKind::Comment, id: cref.to_string() });
        }

        let comment_type = self.store.default_comment_type();
        let comment = self.store.create_comment(cref, parent, uid, &comment_type, now_ms());
        if !self.locks.acquire(ResourceKind::Comment, &comment.comment_id).await {
            self.store.discard(&comment.comment_id);
            self.locks.release_editor(EditorKind::Comment).await;
            return Err(Error::NotLocked { kind: ResourceKind::Comment, id: comment.comment_id });
        }

        self.unsaved.insert(comment.comment_id.clone());
        self.editing = Some(comment.comment_id.clone());
        self.selected = Some(comment.comment_id.clone());
        self.open.insert(cref.to_string());
        self.publish(state, cref, uid);
        Ok(comment)
    }

    /// Open an existing comment for editing. False when it is not the
    /// user's own comment or the lock is refused.
    pub async fn begin_edit(&mut self, state: &AppState, comment_id: &str, uid: &str) -> Result<bool> {
        let comment = self
            .store
            .get(comment_id)
            .cloned()
            .ok_or_else(|| Error::UnknownComment(comment_id.to_string()))?;
        if comment.commenter_id != uid || comment.comment_is_marked_deleted {
            return Ok(false);
        }
        if self.editing.as_deref() == Some(comment_id) {
            return Ok(true);
        }
        if self.editing.is_some() {
            self.cancel_edit(state, uid).await?;
        }
        if !self.locks.request_editor(EditorKind::Comment).await {
            return Ok(false);
        }
        if !self.locks.acquire(ResourceKind::Comment, comment_id).await {
            self.locks.release_editor(EditorKind::Comment).await;
            return Ok(false);
        }
        self.editing = Some(comment_id.to_string());
        self.selected = Some(comment_id.to_string());
        self.publish(state, &comment.collection_ref, uid);
        Ok(true)
    }

    async fn finish_edit(&mut self, comment_id: &str) {
        if self.editing.as_deref() == Some(comment_id) {
            self.editing = None;
        }
        self.locks.release(ResourceKind::Comment, comment_id).await;
        self.locks.release_editor(EditorKind::Comment).await;
    }

    /// Abandon the current edit. A comment that was never saved disappears.
    pub async fn cancel_edit(&mut self, state: &AppState, uid: &str) -> Result<()> {
        let Some(id) = self.editing.clone() else {
            return Ok(());
        };
        let cref = self.store.get(&id).map(|c| c.collection_ref.clone());
        if self.unsaved.remove(&id) {
            self.store.discard(&id);
            if self.selected.as_deref() == Some(id.as_str()) {
                self.selected = None;
            }
        }
        self.finish_edit(&id).await;
        if let Some(cref) = cref {
            self.publish(state, &cref, uid);
        }
        Ok(())
    }

    /// Save the text and type of the comment being edited.
    pub async fn update_comment(&mut self, state: &AppState, comment: &Comment, uid: &str) -> Result<Comment> {
        let id = comment.comment_id.clone();
        let existing = self
            .store
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::UnknownComment(id.clone()))?;
        if !self.locks.holds(ResourceKind::Comment, &id) {
            return Err(Error::NotLocked { kind: ResourceKind::Comment, id });
        }

        let saved = if self.unsaved.remove(&id) {
            let mut first = existing;
            first.comment_type = comment.comment_type.clone();
            first.commenter_text = comment.commenter_text.clone();
            self.store.upsert(first.clone());
            first
        } else {
            self.store.update(comment, now_ms())?
        };
        self.store.mark_read(&id, uid);
        self.finish_edit(&id).await;

        let readby = self.store.readby_entries([id.as_str()]);
        let persisted = self
            .persist(vec![DbUpdate::Comment { comment: saved.clone() }, DbUpdate::ReadBy { readby }])
            .await;
        self.publish(state, &saved.collection_ref, uid);
        persisted.map(|_| saved)
    }

    pub async fn remove_comment(&mut self, state: &AppState, comment_id: &str, uid: &str) -> Result<RemoveOutcome> {
        let cref = self
            .store
            .get(comment_id)
            .map(|c| c.collection_ref.clone())
            .ok_or_else(|| Error::UnknownComment(comment_id.to_string()))?;
        if self.editing.as_deref() == Some(comment_id) {
            self.unsaved.remove(comment_id);
            self.finish_edit(comment_id).await;
        }
        let outcome = self.store.remove(comment_id)?;
        for id in &outcome.removed {
            if self.selected.as_deref() == Some(id.as_str()) {
                self.selected = None;
            }
        }

        let updates: Vec<DbUpdate> = outcome
            .removed
            .iter()
            .map(|id| DbUpdate::CommentRemove { comment_id: id.clone() })
            .chain(
                outcome
                    .marked_deleted
                    .iter()
                    .chain(outcome.relinked.iter())
                    .map(|c| DbUpdate::Comment { comment: c.clone() }),
            )
            .collect();
        let persisted = self.persist(updates).await;
        self.publish(state, &cref, uid);
        persisted.map(|_| outcome)
    }

    /// Mark one comment read by `uid`. Ok(false) when it already was.
    pub async fn mark_read(&mut self, state: &AppState, comment_id: &str, uid: &str) -> Result<bool> {
        let cref = self
            .store
            .get(comment_id)
            .map(|c| c.collection_ref.clone())
            .ok_or_else(|| Error::UnknownComment(comment_id.to_string()))?;
        if !self.store.mark_read(comment_id, uid) {
            return Ok(false);
        }
        let readby = self.store.readby_entries([comment_id]);
        let persisted = self.persist(vec![DbUpdate::ReadBy { readby }]).await;
        self.publish(state, &cref, uid);
        persisted.map(|_| true)
    }

    // --- Sync ----------------------------------------------------------------

    /// Apply a comment update made by another client. Returns false for
    /// updates that are not about comments.
    pub fn handle_remote_update(&mut self, state: &AppState, update: &DbUpdate, uid: &str) -> bool {
        let mut crefs: HashSet<String> = HashSet::new();
        match update {
            DbUpdate::Comment { comment } => {
                crefs.insert(comment.collection_ref.clone());
                self.store.upsert(comment.clone());
            }
            DbUpdate::CommentRemove { comment_id } => {
                if let Some(removed) = self.store.discard(comment_id) {
                    crefs.insert(removed.collection_ref);
                }
                if self.selected.as_deref() == Some(comment_id.as_str()) {
                    self.selected = None;
                }
            }
            DbUpdate::ReadBy { readby } => {
                for entry in readby {
                    if let Some(c) = self.store.get(&entry.comment_id) {
                        crefs.insert(c.collection_ref.clone());
                    }
                    self.store.set_readers(entry.clone());
                }
            }
            _ => return false,
        }
        for cref in crefs {
            self.publish(state, &cref, uid);
        }
        true
    }

    async fn persist(&self, updates: Vec<DbUpdate>) -> Result<()> {
        for update in updates {
            if let Err(e) = self.server.db_update(update, self.locks.uaddr()).await {
                tracing::warn!("comment update not persisted: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comments::models::DEFAULT_COMMENT_TYPE;
    use crate::filter::FilterDefs;
    use crate::server::LocalServer;

    struct Fixture {
        server: Arc<LocalServer>,
        state: AppState,
        mgr: CommentMgr<LocalServer>,
    }

    fn comment(id: &str, parent: &str, previous: &str, who: &str, time: i64) -> Comment {
        Comment {
            comment_id: id.to_string(),
            collection_ref: "n1".to_string(),
            comment_id_parent: parent.to_string(),
            comment_id_previous: previous.to_string(),
            comment_type: DEFAULT_COMMENT_TYPE.to_string(),
            commenter_id: who.to_string(),
            commenter_text: vec![format!("{} says hi", who)],
            comment_createtime: time,
            comment_modifytime: None,
            comment_is_marked_deleted: false,
        }
    }

    /// Two root threads in n1: r1 (BEN) with reply a (SRI); r2 (SRI).
    fn setup() -> Fixture {
        let server = Arc::new(LocalServer::new());
        let locks = Arc::new(LockClient::new(server.clone(), "UADDR_01"));
        let mut mgr = CommentMgr::new(server.clone(), locks, &Settings::default());
        let mut store = CommentStore::new();
        store.upsert(comment("r1", "", "", "BEN", 1_600_000_000_000));
        store.upsert(comment("a", "r1", "", "SRI", 1_600_000_100_000));
        store.upsert(comment("r2", "", "r1", "SRI", 1_600_000_200_000));
        mgr.set_store(store);
        Fixture { server, state: AppState::new(FilterDefs::new(0.2, 0.2, 2)), mgr }
    }

    #[test]
    fn test_view_objects_levels_and_flags() {
        let f = setup();
        let vobjs = f.mgr.threaded_view_objects("n1", "BEN");
        let shape: Vec<(&str, u32, bool, bool)> = vobjs
            .iter()
            .map(|v| (v.comment_id.as_str(), v.level, v.is_editable, v.allow_reply))
            .collect();
        assert_eq!(
            shape,
            vec![("r1", 0, true, false), ("a", 1, false, true), ("r2", 0, false, true)]
        );
        assert!(vobjs.iter().all(|v| !v.is_marked_read));
        assert!(!vobjs[0].createtime_string.is_empty());
        assert!(vobjs[0].modifytime_string.is_empty());
        // Anonymous viewers can neither edit nor reply
        assert!(f.mgr.threaded_view_objects("n1", "").iter().all(|v| !v.is_editable && !v.allow_reply));
    }

    #[test]
    fn test_collection_status() {
        let mut f = setup();
        let status = f.mgr.comment_collection("n1", "BEN");
        assert!(status.has_unread_comments && !status.has_read_comments && !status.is_open);

        f.mgr.open_collection(&f.state, "n1", "BEN");
        let published = f.state.comment_collection("n1").unwrap();
        assert!(published.is_open);
        assert_eq!(f.state.comment_vobjs("n1").len(), 3);

        let empty = f.mgr.comment_collection("n404", "BEN");
        assert!(!empty.has_unread_comments && !empty.has_read_comments);
    }

    #[tokio::test]
    async fn test_close_marks_everything_read() {
        let mut f = setup();
        f.mgr.open_collection(&f.state, "n1", "BEN");
        f.mgr.close_collection(&f.state, "n1", "BEN").await.unwrap();

        let status = f.state.comment_collection("n1").unwrap();
        assert!(!status.is_open);
        assert!(!status.has_unread_comments);
        assert!(status.has_read_comments);
        assert!(f.state.comment_vobjs("n1").iter().all(|v| v.is_marked_read));

        let updates = f.server.updates();
        assert_eq!(updates.len(), 1);
        match &updates[0].update {
            DbUpdate::ReadBy { readby } => assert_eq!(readby.len(), 3),
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_own_draft_is_not_unread() {
        let mut f = setup();
        f.mgr.close_collection(&f.state, "n1", "BEN").await.unwrap();
        f.mgr.add_comment(&f.state, "n1", None, "BEN").await.unwrap();

        let status = f.state.comment_collection("n1").unwrap();
        assert!(!status.has_unread_comments);
        assert!(status.has_read_comments);
        assert_eq!(f.state.comment_vobjs("n1").len(), 4);
    }

    #[tokio::test]
    async fn test_add_then_save_reply() {
        let mut f = setup();
        let draft = f.mgr.add_comment(&f.state, "n1", Some("r1"), "BEN").await.unwrap();
        assert_eq!(draft.comment_id_previous, "a");
        assert_eq!(f.mgr.editing(), Some(draft.comment_id.as_str()));

        let vobjs = f.state.comment_vobjs("n1");
        let ids: Vec<&str> = vobjs.iter().map(|v| v.comment_id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "a", draft.comment_id.as_str(), "r2"]);
        // Thread being edited offers no reply; the other thread still does
        assert!(!vobjs[2].allow_reply && vobjs[2].is_being_edited);
        assert!(vobjs[3].allow_reply);
        // Nothing persisted until saved
        assert!(f.server.updates().is_empty());

        let mut edit = draft.clone();
        edit.commenter_text = vec!["A reply".into()];
        let saved = f.mgr.update_comment(&f.state, &edit, "BEN").await.unwrap();
        assert_eq!(saved.commenter_text, vec!["A reply"]);
        assert!(saved.comment_modifytime.is_none());
        assert!(f.mgr.editing().is_none());
        assert!(f.mgr.store().is_read(&saved.comment_id, "BEN"));
        assert!(matches!(f.server.updates()[0].update, DbUpdate::Comment { .. }));
        assert!(f.state.comment_vobjs("n1")[2].allow_reply);
    }

    #[tokio::test]
    async fn test_cancel_discards_unsaved_comment() {
        let mut f = setup();
        let draft = f.mgr.add_comment(&f.state, "n1", None, "BEN").await.unwrap();
        assert_eq!(f.state.comment_vobjs("n1").len(), 4);
        f.mgr.cancel_edit(&f.state, "BEN").await.unwrap();

        assert!(f.mgr.store().get(&draft.comment_id).is_none());
        assert_eq!(f.state.comment_vobjs("n1").len(), 3);
        // Lock was released
        let other = LockClient::new(f.server.clone(), "UADDR_02");
        assert!(other.acquire(ResourceKind::Comment, &draft.comment_id).await);
    }

    #[tokio::test]
    async fn test_edit_existing_sets_modify_time() {
        let mut f = setup();
        assert!(!f.mgr.begin_edit(&f.state, "r2", "BEN").await.unwrap());
        assert!(f.mgr.begin_edit(&f.state, "r1", "BEN").await.unwrap());

        let mut edit = f.mgr.store().get("r1").unwrap().clone();
        edit.commenter_text = vec!["revised".into()];
        let saved = f.mgr.update_comment(&f.state, &edit, "BEN").await.unwrap();
        assert!(saved.comment_modifytime.is_some());
        assert!(!f.state.comment_vobjs("n1")[0].modifytime_string.is_empty());

        // No lock, no save
        let err = f.mgr.update_comment(&f.state, &edit, "BEN").await.unwrap_err();
        assert!(matches!(err, Error::NotLocked { .. }));
    }

    #[tokio::test]
    async fn test_edit_refused_when_locked_elsewhere() {
        let mut f = setup();
        let other = LockClient::new(f.server.clone(), "UADDR_02");
        assert!(other.acquire(ResourceKind::Comment, "r1").await);
        assert!(!f.mgr.begin_edit(&f.state, "r1", "BEN").await.unwrap());
        assert!(f.mgr.editing().is_none());
    }

    #[tokio::test]
    async fn test_remove_with_replies_marks_deleted() {
        let mut f = setup();
        let outcome = f.mgr.remove_comment(&f.state, "r1", "BEN").await.unwrap();
        assert!(outcome.removed.is_empty());
        assert_eq!(outcome.marked_deleted.len(), 1);

        let vobjs = f.state.comment_vobjs("n1");
        assert_eq!(vobjs.len(), 3);
        assert!(!vobjs[0].is_editable);
        // Deleted comments do not count toward read/unread
        f.mgr.mark_read(&f.state, "a", "BEN").await.unwrap();
        f.mgr.mark_read(&f.state, "r2", "BEN").await.unwrap();
        assert!(!f.state.comment_collection("n1").unwrap().has_unread_comments);

        let outcome = f.mgr.remove_comment(&f.state, "a", "SRI").await.unwrap();
        assert_eq!(outcome.removed, vec!["a", "r1"]);
        assert_eq!(f.state.comment_vobjs("n1").len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_persists_once() {
        let mut f = setup();
        assert!(f.mgr.mark_read(&f.state, "a", "BEN").await.unwrap());
        assert!(!f.mgr.mark_read(&f.state, "a", "BEN").await.unwrap());
        assert_eq!(f.server.updates().len(), 1);
        assert!(matches!(
            f.mgr.mark_read(&f.state, "zz", "BEN").await,
            Err(Error::UnknownComment(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_save_still_publishes() {
        let mut f = setup();
        f.mgr.mark_read(&f.state, "r1", "BEN").await.unwrap();
        f.server.set_offline(true);
        let err = f.mgr.mark_read(&f.state, "a", "BEN").await.unwrap_err();
        assert!(matches!(err, Error::Server(_)));
        assert!(f.state.comment_vobjs("n1")[1].is_marked_read);
    }

    #[test]
    fn test_remote_updates() {
        let mut f = setup();
        let incoming = comment("b", "r1", "a", "SRI", 1_600_000_300_000);
        assert!(f.mgr.handle_remote_update(&f.state, &DbUpdate::Comment { comment: incoming }, "BEN"));
        assert_eq!(f.state.comment_vobjs("n1").len(), 4);

        let readby = vec![crate::comments::ReadBy { comment_id: "b".into(), commenter_ids: vec!["BEN".into()] }];
        f.mgr.handle_remote_update(&f.state, &DbUpdate::ReadBy { readby }, "BEN");
        assert!(f.mgr.store().is_read("b", "BEN"));

        f.mgr.handle_remote_update(&f.state, &DbUpdate::CommentRemove { comment_id: "b".into() }, "BEN");
        assert_eq!(f.state.comment_vobjs("n1").len(), 3);

        assert!(!f.mgr.handle_remote_update(&f.state, &DbUpdate::NodeRemove { id: 1 }, "BEN"));
    }

    #[test]
    fn test_bad_time_format_falls_back() {
        let mut f = setup();
        f.mgr.time_format = "%Q".into();
        assert!(!f.mgr.format_time(1_600_000_000_000).is_empty());
    }
}

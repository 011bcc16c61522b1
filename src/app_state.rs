//! Typed application state shared between the engines and their consumers.
//!
//! Each state bucket is its own `watch` channel: readers borrow the latest
//! value, subscribers are woken on every publish. There is no implicit
//! reactivity; whoever changes an input is responsible for republishing the
//! derived buckets.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;

use crate::comments::{CommentCollection, CommentVObj};
use crate::db::{NcData, NodeId};
use crate::filter::FilterDefs;

pub type CommentCollections = HashMap<String, CommentCollection>;
pub type CommentVObjs = HashMap<String, Vec<CommentVObj>>;

pub struct AppState {
    ncdata: watch::Sender<Arc<NcData>>,
    filter_defs: watch::Sender<Arc<FilterDefs>>,
    filtered_ncdata: watch::Sender<Arc<NcData>>,
    comment_collections: watch::Sender<Arc<CommentCollections>>,
    comment_vobjs: watch::Sender<Arc<CommentVObjs>>,
    selected_node: watch::Sender<Option<NodeId>>,
}

impl AppState {
    pub fn new(filter_defs: FilterDefs) -> Self {
        Self {
            ncdata: watch::Sender::new(Arc::new(NcData::default())),
            filter_defs: watch::Sender::new(Arc::new(filter_defs)),
            filtered_ncdata: watch::Sender::new(Arc::new(NcData::default())),
            comment_collections: watch::Sender::new(Arc::new(HashMap::new())),
            comment_vobjs: watch::Sender::new(Arc::new(HashMap::new())),
            selected_node: watch::Sender::new(None),
        }
    }

    // --- NCDATA -------------------------------------------------------------

    pub fn ncdata(&self) -> Arc<NcData> {
        self.ncdata.borrow().clone()
    }

    pub fn set_ncdata(&self, data: NcData) {
        self.ncdata.send_replace(Arc::new(data));
    }

    /// Mutate NCDATA in place and notify subscribers.
    pub fn update_ncdata<R>(&self, f: impl FnOnce(&mut NcData) -> R) -> R {
        let mut data = NcData::clone(&self.ncdata());
        let result = f(&mut data);
        self.set_ncdata(data);
        result
    }

    pub fn subscribe_ncdata(&self) -> watch::Receiver<Arc<NcData>> {
        self.ncdata.subscribe()
    }

    // --- FILTERDEFS ---------------------------------------------------------

    pub fn filter_defs(&self) -> Arc<FilterDefs> {
        self.filter_defs.borrow().clone()
    }

    pub fn set_filter_defs(&self, defs: FilterDefs) {
        self.filter_defs.send_replace(Arc::new(defs));
    }

    pub fn subscribe_filter_defs(&self) -> watch::Receiver<Arc<FilterDefs>> {
        self.filter_defs.subscribe()
    }

    // --- FILTEREDNCDATA -----------------------------------------------------

    pub fn filtered_ncdata(&self) -> Arc<NcData> {
        self.filtered_ncdata.borrow().clone()
    }

    pub fn set_filtered_ncdata(&self, data: NcData) {
        self.filtered_ncdata.send_replace(Arc::new(data));
    }

    pub fn subscribe_filtered_ncdata(&self) -> watch::Receiver<Arc<NcData>> {
        self.filtered_ncdata.subscribe()
    }

    // --- COMMENTCOLLECTION / COMMENTVOBJS -----------------------------------

    pub fn comment_collection(&self, cref: &str) -> Option<CommentCollection> {
        self.comment_collections.borrow().get(cref).cloned()
    }

    pub fn comment_collections(&self) -> Arc<CommentCollections> {
        self.comment_collections.borrow().clone()
    }

    pub fn set_comment_collection(&self, collection: CommentCollection) {
        self.comment_collections.send_modify(|map| {
            Arc::make_mut(map).insert(collection.collection_ref.clone(), collection);
        });
    }

    pub fn subscribe_comment_collections(&self) -> watch::Receiver<Arc<CommentCollections>> {
        self.comment_collections.subscribe()
    }

    pub fn comment_vobjs(&self, cref: &str) -> Vec<CommentVObj> {
        self.comment_vobjs.borrow().get(cref).cloned().unwrap_or_default()
    }

    pub fn set_comment_vobjs(&self, cref: &str, vobjs: Vec<CommentVObj>) {
        self.comment_vobjs.send_modify(|map| {
            Arc::make_mut(map).insert(cref.to_string(), vobjs);
        });
    }

    pub fn subscribe_comment_vobjs(&self) -> watch::Receiver<Arc<CommentVObjs>> {
        self.comment_vobjs.subscribe()
    }

    // --- Selection ----------------------------------------------------------

    pub fn selected_node(&self) -> Option<NodeId> {
        *self.selected_node.borrow()
    }

    pub fn select_node(&self, id: Option<NodeId>) {
        self.selected_node.send_replace(id);
    }

    pub fn subscribe_selected_node(&self) -> watch::Receiver<Option<NodeId>> {
        self.selected_node.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Node;

    fn make_state() -> AppState {
        AppState::new(FilterDefs::new(0.2, 0.2, 2))
    }

    #[test]
    fn test_subscribers_see_publishes() {
        let state = make_state();
        let mut rx = state.subscribe_filtered_ncdata();
        assert!(!rx.has_changed().unwrap());

        state.set_filtered_ncdata(NcData::new(vec![Node::new(1, "A")], vec![]));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().nodes.len(), 1);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let state = make_state();
        state.set_ncdata(NcData::new(vec![Node::new(7, "G")], vec![]));
        assert_eq!(state.ncdata().nodes[0].id, 7);
    }

    #[test]
    fn test_update_ncdata_returns_closure_result() {
        let state = make_state();
        state.set_ncdata(NcData::new(vec![Node::new(1, "A")], vec![]));
        let held = state.ncdata();
        let replaced = state.update_ncdata(|data| data.upsert_node(Node::new(1, "Alpha")));
        assert!(replaced);
        assert_eq!(state.ncdata().nodes[0].label, "Alpha");
        // Earlier snapshots are not affected
        assert_eq!(held.nodes[0].label, "A");
    }

    #[test]
    fn test_comment_buckets_are_per_cref() {
        let state = make_state();
        state.set_comment_collection(CommentCollection {
            collection_ref: "n1".into(),
            has_unread_comments: true,
            has_read_comments: false,
            is_open: false,
        });
        assert!(state.comment_collection("n1").unwrap().has_unread_comments);
        assert!(state.comment_collection("n2").is_none());
        assert!(state.comment_vobjs("n1").is_empty());
    }

    #[test]
    fn test_selection() {
        let state = make_state();
        let mut rx = state.subscribe_selected_node();
        state.select_node(Some(4));
        assert!(rx.has_changed().unwrap());
        assert_eq!(state.selected_node(), Some(4));
    }
}

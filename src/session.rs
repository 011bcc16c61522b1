//! One connected client: its state buckets, filter and comment managers,
//! and the lock client, wired to a server.

use std::sync::Arc;

use chrono::Utc;

use crate::app_state::AppState;
use crate::comments::{Comment, CommentMgr, CommentStore, RemoveOutcome};
use crate::db::{Edge, EdgeId, NcData, Node, NodeId};
use crate::error::{Error, Result};
use crate::filter::{FilterMgr, FilterOutcome};
use crate::lock::{EditorKind, LockClient, ResourceKind};
use crate::server::{DbUpdate, Server, UpdateNotice};
use crate::settings::Settings;
use crate::template::Template;

pub struct Session<S: Server> {
    uid: String,
    state: AppState,
    server: Arc<S>,
    locks: Arc<LockClient<S>>,
    filters: FilterMgr,
    comments: CommentMgr<S>,
    template: Template,
}

impl<S: Server> Session<S> {
    pub fn new(server: Arc<S>, uaddr: &str, uid: &str, settings: &Settings) -> Self {
        let locks = Arc::new(LockClient::new(server.clone(), uaddr));
        Self {
            uid: uid.to_string(),
            state: AppState::new(settings.empty_filter_defs()),
            comments: CommentMgr::new(server.clone(), locks.clone(), settings),
            filters: FilterMgr::new(settings),
            server,
            locks,
            template: Template::default(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn uaddr(&self) -> &str {
        self.locks.uaddr()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn filters(&self) -> &FilterMgr {
        &self.filters
    }

    pub fn comments(&self) -> &CommentMgr<S> {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut CommentMgr<S> {
        &mut self.comments
    }

    pub fn locks(&self) -> &LockClient<S> {
        &self.locks
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Install graph data and template, import filters and publish
    /// FILTEREDNCDATA.
    pub fn load(&mut self, ncdata: NcData, template: Template) -> FilterOutcome {
        tracing::info!(
            "loading {} nodes, {} edges with template '{}'",
            ncdata.nodes.len(),
            ncdata.edges.len(),
            template.name
        );
        self.state.set_ncdata(ncdata);
        self.comments.set_template(&template);
        let outcome = self.filters.import_filters(&template, &self.state);
        self.template = template;
        outcome
    }

    pub fn load_comments(&mut self, store: CommentStore) {
        self.comments.set_store(store);
        self.comments.set_template(&self.template);
        self.comments.publish_all(&self.state, &self.uid);
    }

    pub fn select_node(&self, id: Option<NodeId>) {
        self.state.select_node(id);
    }

    pub fn refilter(&self) -> FilterOutcome {
        self.filters.apply(&self.state)
    }

    // --- Node / edge editing -------------------------------------------------

    async fn begin_edit(&self, kind: ResourceKind, id: u64) -> bool {
        if self.locks.holds(kind, &id.to_string()) {
            return true;
        }
        if !self.locks.request_editor(EditorKind::NodeOrEdge).await {
            return false;
        }
        if !self.locks.acquire(kind, &id.to_string()).await {
            self.locks.release_editor(EditorKind::NodeOrEdge).await;
            return false;
        }
        true
    }

    async fn end_edit(&self, kind: ResourceKind, id: u64) -> bool {
        if !self.locks.holds(kind, &id.to_string()) {
            return false;
        }
        let released = self.locks.release(kind, &id.to_string()).await;
        self.locks.release_editor(EditorKind::NodeOrEdge).await;
        released
    }

    fn require_lock(&self, kind: ResourceKind, id: u64) -> Result<()> {
        if self.locks.holds(kind, &id.to_string()) {
            Ok(())
        } else {
            Err(Error::NotLocked { kind, id: id.to_string() })
        }
    }

    /// Lock a node (existing or about to be created) for editing.
    pub async fn begin_node_edit(&self, id: NodeId) -> bool {
        self.begin_edit(ResourceKind::Node, id).await
    }

    pub async fn cancel_node_edit(&self, id: NodeId) -> bool {
        self.end_edit(ResourceKind::Node, id).await
    }

    /// Persist a node, release its lock and refilter.
    pub async fn save_node(&mut self, mut node: Node) -> Result<FilterOutcome> {
        self.require_lock(ResourceKind::Node, node.id)?;
        node.meta.updated = Utc::now().timestamp_millis();
        if node.meta.created == 0 {
            node.meta.created = node.meta.updated;
        }
        node.meta.revision += 1;
        node.filtered_transparency = None;
        node.bacon_value = None;

        self.server
            .db_update(DbUpdate::Node { node: node.clone() }, self.uaddr())
            .await?;
        let id = node.id;
        self.state.update_ncdata(|data| data.upsert_node(node));
        self.end_edit(ResourceKind::Node, id).await;
        Ok(self.refilter())
    }

    /// Delete a locked node and the edges touching it.
    pub async fn delete_node(&mut self, id: NodeId) -> Result<FilterOutcome> {
        self.require_lock(ResourceKind::Node, id)?;
        if self.state.ncdata().node(id).is_none() {
            return Err(Error::UnknownNode(id));
        }
        self.server.db_update(DbUpdate::NodeRemove { id }, self.uaddr()).await?;
        self.state.update_ncdata(|data| data.remove_node(id));
        self.end_edit(ResourceKind::Node, id).await;
        if self.state.selected_node() == Some(id) {
            self.state.select_node(None);
        }
        Ok(self.refilter())
    }

    pub async fn begin_edge_edit(&self, id: EdgeId) -> bool {
        self.begin_edit(ResourceKind::Edge, id).await
    }

    pub async fn cancel_edge_edit(&self, id: EdgeId) -> bool {
        self.end_edit(ResourceKind::Edge, id).await
    }

    /// Persist an edge whose endpoints exist, release its lock and refilter.
    pub async fn save_edge(&mut self, mut edge: Edge) -> Result<FilterOutcome> {
        self.require_lock(ResourceKind::Edge, edge.id)?;
        {
            let data = self.state.ncdata();
            for endpoint in [edge.source, edge.target] {
                if data.node(endpoint).is_none() {
                    return Err(Error::UnknownNode(endpoint));
                }
            }
        }
        edge.meta.updated = Utc::now().timestamp_millis();
        if edge.meta.created == 0 {
            edge.meta.created = edge.meta.updated;
        }
        edge.meta.revision += 1;
        edge.source_label = None;
        edge.target_label = None;
        edge.filtered_transparency = None;

        self.server
            .db_update(DbUpdate::Edge { edge: edge.clone() }, self.uaddr())
            .await?;
        let id = edge.id;
        self.state.update_ncdata(|data| data.upsert_edge(edge));
        self.end_edit(ResourceKind::Edge, id).await;
        Ok(self.refilter())
    }

    pub async fn delete_edge(&mut self, id: EdgeId) -> Result<FilterOutcome> {
        self.require_lock(ResourceKind::Edge, id)?;
        if self.state.ncdata().edge(id).is_none() {
            return Err(Error::UnknownEdge(id));
        }
        self.server.db_update(DbUpdate::EdgeRemove { id }, self.uaddr()).await?;
        self.state.update_ncdata(|data| data.remove_edge(id));
        self.end_edit(ResourceKind::Edge, id).await;
        Ok(self.refilter())
    }

    // --- Comments ---------------------------------------------------------------

    pub fn open_comments(&mut self, cref: &str) {
        self.comments.open_collection(&self.state, cref, &self.uid);
    }

    pub async fn close_comments(&mut self, cref: &str) -> Result<()> {
        self.comments.close_collection(&self.state, cref, &self.uid).await
    }

    pub async fn add_comment(&mut self, cref: &str, parent: Option<&str>) -> Result<Comment> {
        self.comments.add_comment(&self.state, cref, parent, &self.uid).await
    }

    pub async fn save_comment(&mut self, comment: &Comment) -> Result<Comment> {
        self.comments.update_comment(&self.state, comment, &self.uid).await
    }

    pub async fn remove_comment(&mut self, comment_id: &str) -> Result<RemoveOutcome> {
        self.comments.remove_comment(&self.state, comment_id, &self.uid).await
    }

    pub async fn mark_comment_read(&mut self, comment_id: &str) -> Result<bool> {
        self.comments.mark_read(&self.state, comment_id, &self.uid).await
    }

    // --- Remote updates --------------------------------------------------------

    /// Merge an update broadcast by the server. Updates this client made
    /// itself are ignored. Node and edge changes are re-read from the server
    /// rather than trusted from the notice.
    pub async fn handle_remote_update(&mut self, notice: &UpdateNotice) -> Result<bool> {
        if notice.uaddr == self.uaddr() {
            tracing::debug!("ignoring self-originated update");
            return Ok(false);
        }
        match &notice.update {
            DbUpdate::Node { node } => {
                let id = node.id;
                match self.server.get_node(id).await? {
                    Some(fresh) => {
                        self.state.update_ncdata(|data| data.upsert_node(fresh));
                    }
                    None => {
                        self.state.update_ncdata(|data| data.remove_node(id));
                    }
                }
            }
            DbUpdate::Edge { edge } => {
                let id = edge.id;
                match self.server.get_edge(id).await? {
                    Some(fresh) => {
                        self.state.update_ncdata(|data| data.upsert_edge(fresh));
                    }
                    None => {
                        self.state.update_ncdata(|data| data.remove_edge(id));
                    }
                }
            }
            DbUpdate::NodeRemove { id } => {
                self.state.update_ncdata(|data| data.remove_node(*id));
            }
            DbUpdate::EdgeRemove { id } => {
                self.state.update_ncdata(|data| data.remove_edge(*id));
            }
            update @ (DbUpdate::Comment { .. } | DbUpdate::CommentRemove { .. } | DbUpdate::ReadBy { .. }) => {
                self.comments.handle_remote_update(&self.state, update, &self.uid);
            }
        }
        self.refilter();
        Ok(true)
    }

    /// Release every lock this client holds (disconnect).
    pub async fn teardown(&mut self) -> usize {
        if let Err(e) = self.comments.cancel_edit(&self.state, &self.uid).await {
            tracing::warn!("cancelling comment edit failed: {}", e);
        }
        let released = self.locks.release_all().await;
        self.locks.release_all_editors().await;
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterAction, FilterDefinition, FilterGroupKind, FilterType, FiltersUpdate, Operator};
    use crate::server::LocalServer;

    const TEMPLATE: &str = r#"{
        "name": "session-test",
        "nodeDefs": {
            "label": {"type": "string", "displayLabel": "Label"},
            "degrees": {"type": "number", "displayLabel": "Degrees"}
        },
        "edgeDefs": {
            "type": {"type": "string", "displayLabel": "Relationship"}
        }
    }"#;

    fn graph() -> NcData {
        NcData::new(
            vec![Node::new(1, "Athens"), Node::new(2, "Boston"), Node::new(3, "Cairo")],
            vec![Edge::new(10, 1, 2)],
        )
    }

    fn session(server: &Arc<LocalServer>, uaddr: &str) -> Session<LocalServer> {
        let mut s = Session::new(server.clone(), uaddr, "BEN", &Settings::default());
        let template: Template = serde_json::from_str(TEMPLATE).unwrap();
        s.load(graph(), template);
        s
    }

    #[tokio::test]
    async fn test_load_publishes_filtered_view() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let s = session(&server, "UADDR_01");
        let filtered = s.state().filtered_ncdata();
        assert_eq!(filtered.nodes.len(), 3);
        assert_eq!(filtered.node(1).unwrap().degrees, 1);
        assert_eq!(s.state().filter_defs().nodes.filters.len(), 2);
    }

    #[tokio::test]
    async fn test_save_node_requires_lock_and_refilters() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let mut s = session(&server, "UADDR_01");

        let err = s.save_node(Node::new(4, "Delhi")).await.unwrap_err();
        assert!(matches!(err, Error::NotLocked { kind: ResourceKind::Node, .. }));

        assert!(s.begin_node_edit(4).await);
        let outcome = s.save_node(Node::new(4, "Delhi")).await.unwrap();
        assert_eq!(outcome.data.nodes.len(), 4);
        assert_eq!(s.state().ncdata().node(4).unwrap().meta.revision, 1);
        assert!(!s.locks().holds(ResourceKind::Node, "4"));
        assert_eq!(server.data().node_label(4), Some("Delhi"));
    }

    #[tokio::test]
    async fn test_locked_node_blocks_other_client() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let a = session(&server, "UADDR_01");
        let b = session(&server, "UADDR_02");
        assert!(a.begin_node_edit(1).await);
        assert!(!b.begin_node_edit(1).await);
        assert!(a.cancel_node_edit(1).await);
        assert!(b.begin_node_edit(1).await);
    }

    #[tokio::test]
    async fn test_editor_lock_outlives_first_of_two_edits() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let a = session(&server, "UADDR_01");
        let b = session(&server, "UADDR_02");
        assert!(a.begin_node_edit(1).await);
        assert!(a.begin_edge_edit(10).await);
        // Re-entering an edit already held does not open another
        assert!(a.begin_node_edit(1).await);

        assert!(a.cancel_node_edit(1).await);
        assert!(a.locks().holds(ResourceKind::Edge, "10"));
        assert!(b.locks().edit_status().await.node_or_edge_being_edited);
        assert!(!b.locks().request_editor(EditorKind::Template).await);

        assert!(a.cancel_edge_edit(10).await);
        assert!(!b.locks().edit_status().await.node_or_edge_being_edited);
        assert!(b.locks().request_editor(EditorKind::Template).await);
    }

    #[tokio::test]
    async fn test_save_edge_checks_endpoints() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let mut s = session(&server, "UADDR_01");
        assert!(s.begin_edge_edit(11).await);
        let err = s.save_edge(Edge::new(11, 1, 99)).await.unwrap_err();
        assert!(matches!(err, Error::UnknownNode(99)));

        let outcome = s.save_edge(Edge::new(11, 2, 3)).await.unwrap();
        assert_eq!(outcome.data.node(2).unwrap().degrees, 2);
        assert!(!s.locks().holds(ResourceKind::Edge, "11"));
    }

    #[tokio::test]
    async fn test_delete_node_drops_edges() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let mut s = session(&server, "UADDR_01");
        assert!(s.begin_node_edit(2).await);
        s.select_node(Some(2));
        let outcome = s.delete_node(2).await.unwrap();
        assert!(outcome.data.edges.is_empty());
        assert_eq!(s.state().selected_node(), None);

        assert!(s.begin_edge_edit(10).await);
        assert!(matches!(s.delete_edge(10).await, Err(Error::UnknownEdge(10))));
    }

    #[tokio::test]
    async fn test_remote_updates_merge_and_refilter() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let mut a = session(&server, "UADDR_01");
        let mut b = session(&server, "UADDR_02");
        b.filters()
            .update_filters(b.state(), FiltersUpdate { filter_action: Some(FilterAction::Filter), ..Default::default() });
        let mut f = FilterDefinition::new("n0", "label", FilterType::String, Operator::Contains, "on");
        f.keylabel = "Label".into();
        b.filters().define_filter(b.state(), FilterGroupKind::Nodes, f).unwrap();
        assert_eq!(b.state().filtered_ncdata().nodes.len(), 1);

        assert!(a.begin_node_edit(3).await);
        a.save_node(Node::new(3, "Canton")).await.unwrap();

        let notices = server.updates();
        let notice = notices.last().unwrap();
        // The author ignores its own echo
        assert!(!a.handle_remote_update(notice).await.unwrap());
        assert!(b.handle_remote_update(notice).await.unwrap());
        assert_eq!(b.state().ncdata().node_label(3), Some("Canton"));
        assert_eq!(b.state().filtered_ncdata().nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_remote_comment_update_reaches_comment_buckets() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let mut a = session(&server, "UADDR_01");
        let mut b = session(&server, "UADDR_02");

        let mut draft = a.add_comment("n1", None).await.unwrap();
        draft.commenter_text = vec!["Looks right".into()];
        a.save_comment(&draft).await.unwrap();
        assert!(b.state().comment_vobjs("n1").is_empty());

        for notice in server.updates() {
            b.handle_remote_update(&notice).await.unwrap();
        }
        let vobjs = b.state().comment_vobjs("n1");
        assert_eq!(vobjs.len(), 1);
        // BEN wrote it, so BEN has read it
        assert!(vobjs[0].is_marked_read);
    }

    #[tokio::test]
    async fn test_teardown_releases_locks() {
        let server = Arc::new(LocalServer::with_data(graph()));
        let mut a = session(&server, "UADDR_01");
        let b = session(&server, "UADDR_02");
        assert!(a.begin_node_edit(1).await);
        assert!(a.begin_edge_edit(10).await);
        assert_eq!(a.teardown().await, 2);
        assert!(b.begin_node_edit(1).await);
    }
}

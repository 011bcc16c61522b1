//! The external server as seen from a client.
//!
//! Everything authoritative (locks, persistence, broadcast to other clients)
//! lives behind [`Server`]. Calls are asynchronous and are the only
//! suspension points in a session. [`LocalServer`] is an in-process stand-in
//! used for offline sessions, the CLI and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::comments::{Comment, ReadBy};
use crate::db::{Edge, EdgeId, NcData, Node, NodeId};
use crate::error::{Error, Result};
use crate::lock::{EditorKind, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    pub kind: ResourceKind,
    pub id: String,
    pub uaddr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    #[serde(rename = "locked")]
    Locked,
    #[serde(rename = "unlocked")]
    Unlocked,
    #[serde(rename = "NOP")]
    Nop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockResponse {
    pub state: LockState,
    #[serde(rename = "INFO", default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl LockResponse {
    pub fn new(state: LockState) -> Self {
        Self { state, info: None }
    }

    pub fn with_info(state: LockState, info: String) -> Self {
        Self { state, info: Some(info) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditStatus {
    pub template_being_edited: bool,
    pub import_active: bool,
    pub node_or_edge_being_edited: bool,
    pub comment_being_edited: bool,
}

/// Payload of a `DB_UPDATE` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DbUpdate {
    Node { node: Node },
    Edge { edge: Edge },
    NodeRemove { id: NodeId },
    EdgeRemove { id: EdgeId },
    Comment { comment: Comment },
    CommentRemove { comment_id: String },
    ReadBy { readby: Vec<ReadBy> },
}

/// An update broadcast by the server, tagged with the originating client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNotice {
    pub uaddr: String,
    pub update: DbUpdate,
}

#[allow(async_fn_in_trait)]
pub trait Server {
    async fn lock(&self, req: &LockRequest) -> Result<LockResponse>;
    async fn unlock(&self, req: &LockRequest) -> Result<LockResponse>;
    async fn is_locked(&self, kind: ResourceKind, id: &str) -> Result<LockResponse>;

    async fn edit_status(&self) -> Result<EditStatus>;
    async fn request_edit_lock(&self, editor: EditorKind, uaddr: &str) -> Result<LockResponse>;
    async fn release_edit_lock(&self, editor: EditorKind, uaddr: &str) -> Result<LockResponse>;

    async fn db_update(&self, update: DbUpdate, uaddr: &str) -> Result<()>;
    async fn get_node(&self, id: NodeId) -> Result<Option<Node>>;
    async fn get_edge(&self, id: EdgeId) -> Result<Option<Edge>>;
}

#[derive(Default)]
struct LocalState {
    locks: HashMap<(ResourceKind, String), String>,
    /// Open edits per editor kind, counted per client.
    editors: HashMap<EditorKind, HashMap<String, usize>>,
    data: NcData,
    updates: Vec<UpdateNotice>,
    offline: bool,
}

impl LocalState {
    fn editing(&self, editor: EditorKind) -> bool {
        self.editors.get(&editor).map(|s| !s.is_empty()).unwrap_or(false)
    }

    fn status(&self) -> EditStatus {
        EditStatus {
            template_being_edited: self.editing(EditorKind::Template),
            import_active: self.editing(EditorKind::Import),
            node_or_edge_being_edited: self.editing(EditorKind::NodeOrEdge),
            comment_being_edited: self.editing(EditorKind::Comment),
        }
    }
}

/// In-process server: a lock table, editor registry and graph mirror.
#[derive(Default)]
pub struct LocalServer {
    state: Mutex<LocalState>,
}

impl LocalServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: NcData) -> Self {
        let server = Self::default();
        if let Ok(mut state) = server.state.lock() {
            state.data = data;
        }
        server
    }

    /// Simulate a network partition: every call fails while set.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    /// Updates received so far, oldest first.
    pub fn updates(&self) -> Vec<UpdateNotice> {
        self.state.lock().map(|s| s.updates.clone()).unwrap_or_default()
    }

    pub fn data(&self) -> NcData {
        self.state.lock().map(|s| s.data.clone()).unwrap_or_default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LocalState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Server("server state poisoned".to_string()))?;
        if state.offline {
            return Err(Error::Server("server unreachable".to_string()));
        }
        Ok(f(&mut state))
    }
}

impl Server for LocalServer {
    async fn lock(&self, req: &LockRequest) -> Result<LockResponse> {
        self.with_state(|s| {
            let key = (req.kind, req.id.clone());
            match s.locks.get(&key) {
                Some(owner) if owner != &req.uaddr => {
                    LockResponse::with_info(LockState::Unlocked, format!("{} {} is locked by {}", req.kind, req.id, owner))
                }
                _ => {
                    s.locks.insert(key, req.uaddr.clone());
                    LockResponse::new(LockState::Locked)
                }
            }
        })
    }

    async fn unlock(&self, req: &LockRequest) -> Result<LockResponse> {
        self.with_state(|s| {
            let key = (req.kind, req.id.clone());
            match s.locks.get(&key) {
                Some(owner) if owner == &req.uaddr => {
                    s.locks.remove(&key);
                    LockResponse::new(LockState::Unlocked)
                }
                Some(owner) => LockResponse::with_info(LockState::Nop, format!("held by {}", owner)),
                None => LockResponse::with_info(LockState::Nop, "not locked".to_string()),
            }
        })
    }

    async fn is_locked(&self, kind: ResourceKind, id: &str) -> Result<LockResponse> {
        self.with_state(|s| match s.locks.get(&(kind, id.to_string())) {
            Some(owner) => LockResponse::with_info(LockState::Locked, owner.clone()),
            None => LockResponse::new(LockState::Unlocked),
        })
    }

    async fn edit_status(&self) -> Result<EditStatus> {
        self.with_state(|s| s.status())
    }

    async fn request_edit_lock(&self, editor: EditorKind, uaddr: &str) -> Result<LockResponse> {
        self.with_state(|s| {
            let status = s.status();
            let blocked = match editor {
                EditorKind::Template => {
                    status.import_active
                        || status.node_or_edge_being_edited
                        || status.comment_being_edited
                        || s.editors
                            .get(&EditorKind::Template)
                            .map(|open| open.keys().any(|u| u != uaddr))
                            .unwrap_or(false)
                }
                _ => status.template_being_edited,
            };
            if blocked {
                return LockResponse::with_info(LockState::Unlocked, format!("{:?} editing blocked", editor));
            }
            *s.editors.entry(editor).or_default().entry(uaddr.to_string()).or_insert(0) += 1;
            LockResponse::new(LockState::Locked)
        })
    }

    async fn release_edit_lock(&self, editor: EditorKind, uaddr: &str) -> Result<LockResponse> {
        self.with_state(|s| {
            let Some(open) = s.editors.get_mut(&editor) else {
                return LockResponse::new(LockState::Nop);
            };
            match open.get_mut(uaddr) {
                Some(count) if *count > 1 => {
                    *count -= 1;
                    LockResponse::with_info(LockState::Locked, format!("{} {:?} edits still open", count, editor))
                }
                Some(_) => {
                    open.remove(uaddr);
                    LockResponse::new(LockState::Unlocked)
                }
                None => LockResponse::new(LockState::Nop),
            }
        })
    }

    async fn db_update(&self, update: DbUpdate, uaddr: &str) -> Result<()> {
        self.with_state(|s| {
            match &update {
                DbUpdate::Node { node } => {
                    s.data.upsert_node(node.clone());
                }
                DbUpdate::Edge { edge } => {
                    s.data.upsert_edge(edge.clone());
                }
                DbUpdate::NodeRemove { id } => {
                    s.data.remove_node(*id);
                }
                DbUpdate::EdgeRemove { id } => {
                    s.data.remove_edge(*id);
                }
                DbUpdate::Comment { .. } | DbUpdate::CommentRemove { .. } | DbUpdate::ReadBy { .. } => {}
            }
            s.updates.push(UpdateNotice { uaddr: uaddr.to_string(), update });
        })
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        self.with_state(|s| s.data.node(id).cloned())
    }

    async fn get_edge(&self, id: EdgeId) -> Result<Option<Edge>> {
        self.with_state(|s| s.data.edge(id).cloned())
    }
}

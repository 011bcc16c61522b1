//! One lock interface for every editable resource.
//!
//! Locks are advisory and owned by the server: the client asks, the server
//! answers with a boolean, and the client trusts the answer. There is no
//! retry, no backoff and no expiry on this side. A failed call is logged and
//! treated as "not locked", which simply leaves the editing UI disabled.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::server::{EditStatus, LockRequest, LockState, Server};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Node,
    Edge,
    Comment,
    Template,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Node => "node",
            ResourceKind::Edge => "edge",
            ResourceKind::Comment => "comment",
            ResourceKind::Template => "template",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Editors that are mutually exclusive at the project level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditorKind {
    Template,
    Import,
    NodeOrEdge,
    Comment,
}

/// Client side of the lock protocol for one connected client (`uaddr`).
pub struct LockClient<S: Server> {
    server: Arc<S>,
    uaddr: String,
    held: Mutex<HashSet<(ResourceKind, String)>>,
    editors: Mutex<HashMap<EditorKind, usize>>,
}

impl<S: Server> LockClient<S> {
    pub fn new(server: Arc<S>, uaddr: &str) -> Self {
        Self {
            server,
            uaddr: uaddr.to_string(),
            held: Mutex::new(HashSet::new()),
            editors: Mutex::new(HashMap::new()),
        }
    }

    pub fn uaddr(&self) -> &str {
        &self.uaddr
    }

    fn request(&self, kind: ResourceKind, id: &str) -> LockRequest {
        LockRequest {
            kind,
            id: id.to_string(),
            uaddr: self.uaddr.clone(),
        }
    }

    fn remember(&self, kind: ResourceKind, id: &str, held: bool) {
        if let Ok(mut set) = self.held.lock() {
            if held {
                set.insert((kind, id.to_string()));
            } else {
                set.remove(&(kind, id.to_string()));
            }
        }
    }

    /// Ask the server for the lock. True when granted.
    pub async fn acquire(&self, kind: ResourceKind, id: &str) -> bool {
        match self.server.lock(&self.request(kind, id)).await {
            Ok(resp) => {
                let granted = resp.state == LockState::Locked;
                if !granted {
                    tracing::info!(
                        "SERVER SAYS {} {} not locked: {}",
                        kind,
                        id,
                        resp.info.as_deref().unwrap_or("denied")
                    );
                }
                self.remember(kind, id, granted);
                granted
            }
            Err(e) => {
                tracing::warn!("lock request for {} {} failed: {}", kind, id, e);
                false
            }
        }
    }

    /// Release a lock. True when the server confirms the release.
    pub async fn release(&self, kind: ResourceKind, id: &str) -> bool {
        self.remember(kind, id, false);
        match self.server.unlock(&self.request(kind, id)).await {
            Ok(resp) => {
                if resp.state != LockState::Unlocked {
                    tracing::info!(
                        "SERVER SAYS {} {} unlock was a no-op: {}",
                        kind,
                        id,
                        resp.info.as_deref().unwrap_or("not held")
                    );
                }
                resp.state == LockState::Unlocked
            }
            Err(e) => {
                tracing::warn!("unlock request for {} {} failed: {}", kind, id, e);
                false
            }
        }
    }

    /// Whether anyone holds the lock. Unreachable server reads as unlocked.
    pub async fn is_locked(&self, kind: ResourceKind, id: &str) -> bool {
        match self.server.is_locked(kind, id).await {
            Ok(resp) => resp.state == LockState::Locked,
            Err(e) => {
                tracing::warn!("lock status for {} {} unavailable: {}", kind, id, e);
                false
            }
        }
    }

    pub fn holds(&self, kind: ResourceKind, id: &str) -> bool {
        self.held
            .lock()
            .map(|set| set.contains(&(kind, id.to_string())))
            .unwrap_or(false)
    }

    /// Release everything this client believes it holds (cancel / teardown).
    pub async fn release_all(&self) -> usize {
        let held: Vec<(ResourceKind, String)> = match self.held.lock() {
            Ok(set) => set.iter().cloned().collect(),
            Err(_) => Vec::new(),
        };
        let mut released = 0;
        for (kind, id) in held {
            if self.release(kind, &id).await {
                released += 1;
            }
        }
        released
    }

    // --- Project-level editor locks ---------------------------------------

    pub async fn edit_status(&self) -> EditStatus {
        self.server.edit_status().await.unwrap_or_else(|e| {
            tracing::warn!("edit status unavailable: {}", e);
            EditStatus::default()
        })
    }

    pub async fn request_editor(&self, editor: EditorKind) -> bool {
        match self.server.request_edit_lock(editor, &self.uaddr).await {
            Ok(resp) => {
                let granted = resp.state == LockState::Locked;
                if granted {
                    if let Ok(mut open) = self.editors.lock() {
                        *open.entry(editor).or_insert(0) += 1;
                    }
                } else {
                    tracing::info!(
                        "SERVER SAYS {:?} editor unavailable: {}",
                        editor,
                        resp.info.as_deref().unwrap_or("denied")
                    );
                }
                granted
            }
            Err(e) => {
                tracing::warn!("edit lock request for {:?} failed: {}", editor, e);
                false
            }
        }
    }

    /// Close one edit under `editor`. True once the last open edit of this
    /// client is released and the editor lock is dropped on the server.
    pub async fn release_editor(&self, editor: EditorKind) -> bool {
        if let Ok(mut open) = self.editors.lock() {
            match open.get_mut(&editor) {
                Some(count) if *count > 1 => *count -= 1,
                _ => {
                    open.remove(&editor);
                }
            }
        }
        match self.server.release_edit_lock(editor, &self.uaddr).await {
            Ok(resp) => resp.state == LockState::Unlocked,
            Err(e) => {
                tracing::warn!("edit lock release for {:?} failed: {}", editor, e);
                false
            }
        }
    }

    pub fn open_edits(&self, editor: EditorKind) -> usize {
        self.editors
            .lock()
            .map(|open| open.get(&editor).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Close every open edit under every editor (teardown).
    pub async fn release_all_editors(&self) {
        let open: Vec<(EditorKind, usize)> = match self.editors.lock() {
            Ok(open) => open.iter().map(|(k, n)| (*k, *n)).collect(),
            Err(_) => Vec::new(),
        };
        for (editor, count) in open {
            for _ in 0..count {
                self.release_editor(editor).await;
            }
        }
    }
}

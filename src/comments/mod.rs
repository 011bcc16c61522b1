//! Threaded comments attached to nodes, edges and the project.

mod manager;
mod models;
mod store;

pub use manager::CommentMgr;
pub use models::{
    Comment, CommentCollection, CommentPrompt, CommentStats, CommentType, CommentVObj, ReadBy, User,
    DEFAULT_COMMENT_TYPE,
};
pub use store::{CommentDb, CommentStore, RemoveOutcome};

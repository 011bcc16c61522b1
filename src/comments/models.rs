use serde::{Deserialize, Serialize};

/// Slug of the comment type used when a template defines none.
pub const DEFAULT_COMMENT_TYPE: &str = "cmt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub comment_id: String,
    pub collection_ref: String,         // cref: the node/edge/project this thread hangs off
    #[serde(default)]
    pub comment_id_parent: String,      // Empty for thread roots
    #[serde(default)]
    pub comment_id_previous: String,    // Preceding sibling, empty for the first
    #[serde(default = "default_comment_type")]
    pub comment_type: String,
    pub commenter_id: String,
    #[serde(default)]
    pub commenter_text: Vec<String>,    // One entry per prompt of the comment type
    #[serde(default)]
    pub comment_createtime: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_modifytime: Option<i64>,
    #[serde(rename = "comment_isMarkedDeleted", default)]
    pub comment_is_marked_deleted: bool,
}

fn default_comment_type() -> String {
    DEFAULT_COMMENT_TYPE.to_string()
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.comment_id_parent.is_empty()
    }
}

/// Per-render projection of a comment. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentVObj {
    #[serde(rename = "comment_id")]
    pub comment_id: String,
    pub level: u32,
    pub is_selected: bool,
    pub is_being_edited: bool,
    pub is_editable: bool,
    pub is_marked_read: bool,
    pub allow_reply: bool,
    #[serde(rename = "createtime_string")]
    pub createtime_string: String,
    #[serde(rename = "modifytime_string")]
    pub modifytime_string: String,
}

/// Aggregate status of one comment thread, shown on the comment button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCollection {
    #[serde(rename = "collection_ref")]
    pub collection_ref: String,
    pub has_unread_comments: bool,
    pub has_read_comments: bool,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadBy {
    pub comment_id: String,
    pub commenter_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPrompt {
    #[serde(default = "default_prompt_format")]
    pub format: String,                 // text, dropdown, checkbox, likert...
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub help: String,
}

fn default_prompt_format() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentType {
    pub slug: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub prompts: Vec<CommentPrompt>,
}

impl CommentType {
    pub fn default_type() -> Self {
        Self {
            slug: DEFAULT_COMMENT_TYPE.to_string(),
            label: "Comment".to_string(),
            prompts: vec![CommentPrompt {
                format: default_prompt_format(),
                prompt: "Comment".to_string(),
                options: Vec::new(),
                help: "Use this for any general comment.".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentStats {
    pub collection_ref: String,
    pub count: usize,
    pub unread: usize,
}

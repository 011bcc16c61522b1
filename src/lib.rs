//! Client-side state derivation for Net.Create graphs: filtered views,
//! focus distances, threaded comment view models and edit locks.

pub mod app_state;
pub mod comments;
pub mod db;
pub mod error;
pub mod filter;
pub mod hdate;
pub mod lock;
pub mod server;
pub mod session;
pub mod settings;
pub mod template;
pub mod utils;

pub use error::{Error, Result};

mod models;
mod store;

pub use models::{Edge, EdgeId, Meta, NcData, Node, NodeId};
pub use store::{load_ncdata, save_ncdata};

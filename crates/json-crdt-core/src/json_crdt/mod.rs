//! The document side of the protocol: nodes, the [`Model`] replica, views,
//! snapshots and history.

pub mod codec;
pub mod constants;
pub mod equal;
pub mod extensions;
pub mod log;
pub mod model;
pub mod nodes;
pub mod view;

pub use equal::{equal_schema, equal_value};
pub use extensions::{AnyExtension, Extensions};
pub use log::Log;
pub use model::{ApiError, ChangeOrigin, Model, ModelApi, ModelChange, Subscription};
pub use nodes::{CrdtNode, NodeIndex};
pub use view::JsonView;

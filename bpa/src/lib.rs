/*!
The core of a Bundle Protocol v7 DTN node.

Ties together the bundle store, the RFC 9171 §5.4 forwarding pipeline,
the convergence-layer manager, the routing seam, and the sequence-id
keeper behind a single [`Node`](node::Node) context object. Wire
transports and durable storage backends plug in through the traits in
[`cla`] and [`storage`].
*/

pub mod cla;
pub mod config;
pub mod dispatcher;
pub mod id_keeper;
pub mod node;
pub mod routing;
pub mod services;
pub mod storage;
pub mod store;

use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

// Re-export for implementors of the cla and storage traits
pub use async_trait::async_trait;
pub use tokio_util::bytes::Bytes;

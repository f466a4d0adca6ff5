//! Node context for per-node log attribution
//!
//! A simulation drives every node from the same thread, one after the other.
//! [`NodeContextGuard`] marks which node is currently acting so that spans
//! opened while it is alive can be attributed to that node.

use std::cell::RefCell;

use iql_core::NodeIdentity;
use tracing::Span;
use uuid::Uuid;

/// Node context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContextData {
    /// The node's identity in short form
    pub node_id: String,
    /// Identifies the simulation run the node belongs to
    pub run_id: Uuid,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Creating the guard makes its node current on this thread. Dropping it
/// restores whatever was current before.
///
/// # Example
///
/// ```rust
/// use iql_core::SimNodeId;
/// use iql_logging::NodeContextGuard;
///
/// let node = SimNodeId::from_char('A').unwrap();
/// let guard = NodeContextGuard::new(&node);
/// let _span = guard.span().entered();
///
/// tracing::info!("Link up");
/// assert_eq!(NodeContextGuard::current_node_id(), Some("A".to_string()));
/// ```
pub struct NodeContextGuard {
    current: NodeContextData,
    previous: Option<NodeContextData>,
}

impl NodeContextGuard {
    /// Make `identity` the current node under a fresh run id
    pub fn new<I: NodeIdentity>(identity: &I) -> Self {
        Self::with_run_id(identity, Uuid::new_v4())
    }

    /// Make `identity` the current node under an existing run id
    ///
    /// Every node of one simulation shares the run id, so log lines from a
    /// run can be grouped afterwards.
    pub fn with_run_id<I: NodeIdentity>(identity: &I, run_id: Uuid) -> Self {
        let current = NodeContextData {
            node_id: identity.short_id(),
            run_id,
        };
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(current.clone()));
        Self { current, previous }
    }

    /// A span carrying this guard's node and run as fields
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "node",
            node = %self.current.node_id,
            run = %self.current.run_id
        )
    }

    /// The context this guard installed
    pub fn data(&self) -> &NodeContextData {
        &self.current
    }

    /// Get the current node context (if any)
    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current node id (if set)
    pub fn current_node_id() -> Option<String> {
        Self::current().map(|ctx| ctx.node_id)
    }

    /// Get the current run id (if set)
    pub fn current_run_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.run_id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a node context installed and its span entered
///
/// # Example
///
/// ```rust
/// use iql_core::SimNodeId;
///
/// let node = SimNodeId::new(3);
/// let id = iql_logging::with_node_context!(&node, {
///     iql_logging::NodeContextGuard::current_node_id()
/// });
/// assert_eq!(id, Some("D".to_string()));
/// ```
#[macro_export]
macro_rules! with_node_context {
    ($identity:expr, $body:block) => {{
        let _guard = $crate::context::NodeContextGuard::new($identity);
        let _entered = _guard.span().entered();
        $body
    }};
}

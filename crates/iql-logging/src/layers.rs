//! Custom tracing layers

use tracing::{Subscriber, span};
use tracing_subscriber::{
    fmt::{self, MakeWriter},
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::config::JsonlConfig;
use crate::context::{NodeContextData, NodeContextGuard};

/// Layer that attaches the current node context to new spans
///
/// Later layers can read it back from the span's extensions as a
/// [`NodeContextExtension`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeContextLayer;

impl NodeContextLayer {
    /// Create a new node context layer
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct NodeContextExtension {
    pub data: NodeContextData,
}

impl<S> Layer<S> for NodeContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(node_ctx) = NodeContextGuard::current()
        {
            span.extensions_mut()
                .insert(NodeContextExtension { data: node_ctx });
        }
    }
}

/// Build a JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(config: &JsonlConfig, writer: W) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
        .with_writer(writer)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use iql_core::SimNodeId;
    use tracing_subscriber::{Registry, layer::SubscriberExt};

    /// Records the node id found on each new span
    struct Probe(Arc<Mutex<Vec<Option<String>>>>);

    impl<S> Layer<S> for Probe
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
            let node = ctx.span(id).and_then(|span| {
                span.extensions()
                    .get::<NodeContextExtension>()
                    .map(|ext| ext.data.node_id.clone())
            });
            self.0.lock().unwrap().push(node);
        }
    }

    #[test]
    fn test_layer_attaches_current_node() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default()
            .with(NodeContextLayer::new())
            .with(Probe(Arc::clone(&seen)));

        tracing::subscriber::with_default(subscriber, || {
            let _outside = tracing::info_span!("outside");

            let node = SimNodeId::from_char('C').unwrap();
            let guard = NodeContextGuard::new(&node);
            let _inside = guard.span();
        });

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![None, Some("C".to_string())]);
    }
}

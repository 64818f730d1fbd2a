use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use healthgraph_core::{
    AlarmProvider, BusinessService, BusinessServiceId, EdgeId, IpServiceId, ReductionKey, Result,
    Status, StatusChangeHandler, DEFAULT_SEVERITY, MIN_SEVERITY,
};

use crate::graph::{BusinessServiceGraph, GraphEdgeId, GraphVertex, VertexId};

/// How a vertex in a freshly built graph is matched against the published
/// graph when deciding whether a status change during priming is worth a
/// notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RebuildCompareKey {
    /// Match by business service id only.
    #[default]
    BusinessServiceId,
    /// When the business service id is absent from the published graph,
    /// fall back to the service that owned the same dependency edge
    /// (matched by edge id). A service renumbered across a rebuild but
    /// keeping its edges then compares against its old incarnation.
    AnyIdentity,
}

struct Inner {
    graph: BusinessServiceGraph,
    handlers: Vec<Arc<dyn StatusChangeHandler>>,
    alarm_provider: Option<Arc<dyn AlarmProvider>>,
    compare_key: RebuildCompareKey,
}

/// The status propagation engine. Holds the published graph, the change
/// handler registry and the alarm provider behind one reader/writer lock;
/// every public operation runs to completion on the caller's thread.
pub struct BusinessServiceStateMachine {
    inner: RwLock<Inner>,
}

impl BusinessServiceStateMachine {
    pub fn new() -> Self {
        Self::with_compare_key(RebuildCompareKey::default())
    }

    pub fn with_compare_key(compare_key: RebuildCompareKey) -> Self {
        Self {
            inner: RwLock::new(Inner {
                graph: BusinessServiceGraph::default(),
                handlers: Vec::new(),
                alarm_provider: None,
                compare_key,
            }),
        }
    }

    /// Replaces the published topology. The new graph is built, primed
    /// from the previous graph and the alarm provider, and only then
    /// swapped in; readers never observe a partially primed graph. On any
    /// error the previous graph stays published.
    pub fn set_business_services(&self, services: &[BusinessService]) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let mut graph = BusinessServiceGraph::new(services)?;

        // Carry forward the state of reduction keys the previous graph
        // already tracked; remember the rest for the alarm provider.
        let mut keys_to_lookup: Vec<(ReductionKey, VertexId)> = Vec::new();
        let entries: Vec<(ReductionKey, VertexId)> = graph
            .reduction_key_entries()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        for (key, vertex) in entries {
            match inner.graph.reduction_key_status(&key) {
                Some(previous) => update_and_propagate(
                    &mut graph,
                    Some(&inner.graph),
                    inner.compare_key,
                    &inner.handlers,
                    vertex,
                    previous,
                ),
                None => keys_to_lookup.push((key, vertex)),
            }
        }

        match &inner.alarm_provider {
            Some(provider) => {
                // Reflect the current alarm state of newly tracked keys
                // right away instead of waiting for the next update.
                for (key, vertex) in keys_to_lookup {
                    if let Some(status) = provider.lookup(&key)? {
                        update_and_propagate(
                            &mut graph,
                            Some(&inner.graph),
                            inner.compare_key,
                            &inner.handlers,
                            vertex,
                            status,
                        );
                    }
                }
            }
            None => {
                if !keys_to_lookup.is_empty() {
                    warn!(
                        keys = keys_to_lookup.len(),
                        "reduction keys need priming, but no alarm provider is set"
                    );
                }
            }
        }

        inner.graph = graph;
        Ok(())
    }

    /// Pushes one raw health signal into the graph. Unknown keys are not
    /// an error; an alarm for an entity outside every service is dropped.
    pub fn handle_alarm_update(&self, reduction_key: &str, status: Status) {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        match inner.graph.vertex_by_reduction_key(reduction_key) {
            Some(vertex) => update_and_propagate(
                &mut inner.graph,
                None,
                inner.compare_key,
                &inner.handlers,
                vertex,
                status,
            ),
            None => trace!(reduction_key, "alarm for untracked reduction key"),
        }
    }

    pub fn operational_status_by_service(&self, id: BusinessServiceId) -> Option<Status> {
        self.inner.read().graph.business_service_status(id)
    }

    pub fn operational_status_by_ip_service(&self, id: IpServiceId) -> Option<Status> {
        self.inner.read().graph.ip_service_status(id)
    }

    pub fn operational_status_by_reduction_key(&self, key: &str) -> Option<Status> {
        self.inner.read().graph.reduction_key_status(key)
    }

    pub fn operational_status_by_edge(&self, id: EdgeId) -> Option<Status> {
        self.inner.read().graph.edge_status(id)
    }

    /// A deep copy of the published graph, for inspection and export.
    pub fn graph_snapshot(&self) -> BusinessServiceGraph {
        self.inner.read().graph.clone()
    }

    pub fn add_handler(&self, handler: Arc<dyn StatusChangeHandler>) {
        self.inner.write().handlers.push(handler);
    }

    /// Removes a previously registered handler by identity. Returns
    /// whether it was registered.
    pub fn remove_handler(&self, handler: &Arc<dyn StatusChangeHandler>) -> bool {
        let mut inner = self.inner.write();
        match inner.handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(i) => {
                inner.handlers.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn set_alarm_provider(&self, provider: Option<Arc<dyn AlarmProvider>>) {
        self.inner.write().alarm_provider = provider;
    }
}

impl Default for BusinessServiceStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

enum WorkItem {
    /// Overwrite a vertex with a known status.
    Set(VertexId, Status),
    /// Recompute a vertex from its out-edges, then treat as `Set`.
    Reduce(VertexId),
}

/// Core propagation loop. Worklist form of the recursive
/// update/reduce pair: a popped item updates its vertex, recomputes all
/// in-edge statuses, and only then enqueues the parents whose edge
/// changed, so a parent never reduces over half-updated inputs. The
/// no-op guard on an unchanged status bounds the loop, cycles included.
///
/// `published` is the currently visible graph while `graph` is a new one
/// being primed; `None` means `graph` is the published graph itself.
fn update_and_propagate(
    graph: &mut BusinessServiceGraph,
    published: Option<&BusinessServiceGraph>,
    compare_key: RebuildCompareKey,
    handlers: &[Arc<dyn StatusChangeHandler>],
    start: VertexId,
    status: Status,
) {
    let mut work: VecDeque<WorkItem> = VecDeque::new();
    work.push_back(WorkItem::Set(start, status));

    while let Some(item) = work.pop_front() {
        let (vertex, next) = match item {
            WorkItem::Set(v, s) => (v, s),
            WorkItem::Reduce(v) => {
                let statuses = weigh_statuses(graph, graph.vertex(v).out_edges());
                let reduced = graph
                    .vertex(v)
                    .reduce_function()
                    .reduce(&statuses)
                    .unwrap_or(DEFAULT_SEVERITY);
                (v, reduced.max(MIN_SEVERITY))
            }
        };

        let previous = graph.vertex(vertex).status();
        if previous == next {
            continue;
        }
        graph.vertex_mut(vertex).set_status(next);
        debug!(?previous, new = ?next, "vertex status changed");
        notify_status_change(graph, published, compare_key, handlers, vertex, next, previous);

        let in_edges: Vec<GraphEdgeId> = graph.vertex(vertex).in_edges().to_vec();
        let mut changed_parents: Vec<VertexId> = Vec::new();
        for edge_id in in_edges {
            let mapped = graph
                .edge(edge_id)
                .map_function()
                .map(next)
                .unwrap_or(DEFAULT_SEVERITY);
            if mapped == graph.edge(edge_id).status() {
                continue;
            }
            graph.edge_mut(edge_id).set_status(mapped);
            changed_parents.push(graph.edge(edge_id).parent());
        }
        for parent in changed_parents {
            work.push_back(WorkItem::Reduce(parent));
        }
    }
}

/// Expands edge statuses by relative weight: each status repeats
/// `weight / gcd(all weights)` times, so (2,4,6) and (1,2,3) produce the
/// same multiset. Integer-ratio proportionality, no floating point.
fn weigh_statuses(graph: &BusinessServiceGraph, edges: &[GraphEdgeId]) -> Vec<Status> {
    let divisor = edges
        .iter()
        .map(|e| graph.edge(*e).weight())
        .fold(0, gcd)
        .max(1);

    let mut statuses = Vec::new();
    for &edge_id in edges {
        let edge = graph.edge(edge_id);
        for _ in 0..(edge.weight() / divisor) {
            statuses.push(edge.status());
        }
    }
    statuses
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Fan-out for one vertex status change. Only business service vertices
/// notify. While priming, a service whose published counterpart already
/// has the new status stays silent; rebuilding a topology around an
/// unchanged real-world state is not an event.
fn notify_status_change(
    graph: &BusinessServiceGraph,
    published: Option<&BusinessServiceGraph>,
    compare_key: RebuildCompareKey,
    handlers: &[Arc<dyn StatusChangeHandler>],
    vertex: VertexId,
    new_status: Status,
    previous: Status,
) {
    let vertex = graph.vertex(vertex);
    let service = match vertex.business_service() {
        Some(service) => service,
        None => return,
    };

    if let Some(published) = published {
        let counterpart = match compare_key {
            RebuildCompareKey::BusinessServiceId => published.business_service_status(service.id),
            RebuildCompareKey::AnyIdentity => published
                .business_service_status(service.id)
                .or_else(|| edge_owner_status(graph, published, vertex)),
        };
        if counterpart == Some(new_status) {
            return;
        }
    }

    for handler in handlers {
        handler.status_changed(service, new_status, previous);
    }
}

/// Status of the published service that owned any of `vertex`'s
/// dependency edges. Routing vertices remember their definition edge id
/// and have exactly one parent, which leads back to the old incarnation
/// of a renumbered service.
fn edge_owner_status(
    graph: &BusinessServiceGraph,
    published: &BusinessServiceGraph,
    vertex: &GraphVertex,
) -> Option<Status> {
    vertex.out_edges().iter().find_map(|&edge| {
        let edge_id = graph.vertex(graph.edge(edge).child()).edge_id()?;
        let routing = published.vertex_by_edge_id(edge_id)?;
        let owning_edge = *published.vertex(routing).in_edges().first()?;
        Some(published.vertex(published.edge(owning_edge).parent()).status())
    })
}

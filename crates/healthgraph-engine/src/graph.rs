use std::collections::HashMap;
use std::sync::Arc;

use healthgraph_core::{
    BusinessService, BusinessServiceId, EdgeId, EdgeTarget, HealthGraphError, IpServiceId,
    MapFunction, ReduceFunction, ReductionKey, Result, Status, DEFAULT_SEVERITY,
};

/// Arena index of a vertex. Only valid for the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(usize);

/// Arena index of a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphEdgeId(usize);

/// A node in the dependency graph. At most one identity (business service,
/// IP service, or reduction key); routing vertices created for edge
/// definitions carry none and are reachable through the edge-id index.
#[derive(Debug, Clone)]
pub struct GraphVertex {
    business_service: Option<Arc<BusinessService>>,
    ip_service_id: Option<IpServiceId>,
    reduction_key: Option<ReductionKey>,
    edge_id: Option<EdgeId>,
    reduce_function: ReduceFunction,
    status: Status,
    /// Edges where this vertex is the child (its dependents).
    in_edges: Vec<GraphEdgeId>,
    /// Edges to this vertex's dependencies.
    out_edges: Vec<GraphEdgeId>,
}

impl GraphVertex {
    fn anonymous(reduce_function: ReduceFunction) -> Self {
        Self {
            business_service: None,
            ip_service_id: None,
            reduction_key: None,
            edge_id: None,
            reduce_function,
            status: DEFAULT_SEVERITY,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
        }
    }

    pub fn business_service(&self) -> Option<&BusinessService> {
        self.business_service.as_deref()
    }

    pub fn ip_service_id(&self) -> Option<IpServiceId> {
        self.ip_service_id
    }

    pub fn reduction_key(&self) -> Option<&str> {
        self.reduction_key.as_deref()
    }

    /// The definition edge this routing vertex was created for, if any.
    pub fn edge_id(&self) -> Option<EdgeId> {
        self.edge_id
    }

    pub fn reduce_function(&self) -> ReduceFunction {
        self.reduce_function
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn in_edges(&self) -> &[GraphEdgeId] {
        &self.in_edges
    }

    pub fn out_edges(&self) -> &[GraphEdgeId] {
        &self.out_edges
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }
}

/// A directed parent → child relationship. Topology fields are fixed at
/// build time; only `status` mutates afterwards.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    parent: VertexId,
    child: VertexId,
    weight: u32,
    map_function: MapFunction,
    status: Status,
}

impl GraphEdge {
    pub fn parent(&self) -> VertexId {
        self.parent
    }

    pub fn child(&self) -> VertexId {
        self.child
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn map_function(&self) -> MapFunction {
        self.map_function
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        self.status = status;
    }
}

/// Immutable-topology, mutable-status snapshot of the dependency graph.
///
/// Built once from a list of business service definitions; afterwards no
/// vertex or edge is ever added or removed, only statuses change. A
/// topology change is a brand-new graph swapped in by the state machine.
#[derive(Debug, Clone, Default)]
pub struct BusinessServiceGraph {
    vertices: Vec<GraphVertex>,
    edges: Vec<GraphEdge>,
    by_business_service: HashMap<BusinessServiceId, VertexId>,
    by_ip_service: HashMap<IpServiceId, VertexId>,
    by_reduction_key: HashMap<ReductionKey, VertexId>,
    by_edge_id: HashMap<EdgeId, VertexId>,
}

impl BusinessServiceGraph {
    /// Materializes the graph for the given definitions. Each definition
    /// edge becomes a routing vertex between the service vertex and its
    /// target, so the edge's status is individually addressable; the
    /// parent-side graph edge carries the definition's map function and
    /// weight, everything below is identity with weight 1.
    pub fn new(services: &[BusinessService]) -> Result<Self> {
        let mut graph = Self::default();
        for service in services {
            let service_vertex = graph.service_vertex(service.id);
            {
                let vertex = &mut graph.vertices[service_vertex.0];
                if vertex.business_service.is_some() {
                    return Err(HealthGraphError::InvalidInput(format!(
                        "duplicate business service id {}",
                        service.id
                    )));
                }
                vertex.business_service = Some(Arc::new(service.clone()));
                vertex.reduce_function = service.reduce_function;
            }

            for edge in &service.edges {
                if edge.weight == 0 {
                    return Err(HealthGraphError::InvalidInput(format!(
                        "edge {} of business service {} has zero weight",
                        edge.id, service.id
                    )));
                }
                if graph.by_edge_id.contains_key(&edge.id) {
                    return Err(HealthGraphError::InvalidInput(format!(
                        "duplicate edge id {}",
                        edge.id
                    )));
                }
                let edge_vertex = graph.push_vertex(GraphVertex::anonymous(
                    ReduceFunction::HighestSeverity,
                ));
                graph.vertices[edge_vertex.0].edge_id = Some(edge.id);
                graph.by_edge_id.insert(edge.id, edge_vertex);
                graph.connect(service_vertex, edge_vertex, edge.weight, edge.map_function);

                match &edge.target {
                    EdgeTarget::ChildService(child_id) => {
                        let child = graph.service_vertex(*child_id);
                        graph.connect(edge_vertex, child, 1, MapFunction::Identity);
                    }
                    EdgeTarget::IpService { id, reduction_keys } => {
                        let ip_vertex = graph.ip_service_vertex(*id);
                        graph.connect(edge_vertex, ip_vertex, 1, MapFunction::Identity);
                        for key in reduction_keys {
                            let key_vertex = graph.reduction_key_vertex(key);
                            graph.connect(ip_vertex, key_vertex, 1, MapFunction::Identity);
                        }
                    }
                    EdgeTarget::ReductionKey(key) => {
                        let key_vertex = graph.reduction_key_vertex(key);
                        graph.connect(edge_vertex, key_vertex, 1, MapFunction::Identity);
                    }
                }
            }
        }
        Ok(graph)
    }

    fn push_vertex(&mut self, vertex: GraphVertex) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(vertex);
        id
    }

    fn connect(&mut self, parent: VertexId, child: VertexId, weight: u32, map: MapFunction) {
        let id = GraphEdgeId(self.edges.len());
        self.edges.push(GraphEdge {
            parent,
            child,
            weight,
            map_function: map,
            status: DEFAULT_SEVERITY,
        });
        self.vertices[parent.0].out_edges.push(id);
        self.vertices[child.0].in_edges.push(id);
    }

    fn service_vertex(&mut self, id: BusinessServiceId) -> VertexId {
        if let Some(v) = self.by_business_service.get(&id) {
            return *v;
        }
        let v = self.push_vertex(GraphVertex::anonymous(ReduceFunction::HighestSeverity));
        self.by_business_service.insert(id, v);
        v
    }

    fn ip_service_vertex(&mut self, id: IpServiceId) -> VertexId {
        if let Some(v) = self.by_ip_service.get(&id) {
            return *v;
        }
        let v = self.push_vertex(GraphVertex::anonymous(ReduceFunction::HighestSeverity));
        self.vertices[v.0].ip_service_id = Some(id);
        self.by_ip_service.insert(id, v);
        v
    }

    fn reduction_key_vertex(&mut self, key: &str) -> VertexId {
        if let Some(v) = self.by_reduction_key.get(key) {
            return *v;
        }
        let v = self.push_vertex(GraphVertex::anonymous(ReduceFunction::HighestSeverity));
        self.vertices[v.0].reduction_key = Some(key.to_string());
        self.by_reduction_key.insert(key.to_string(), v);
        v
    }

    pub fn vertex(&self, id: VertexId) -> &GraphVertex {
        &self.vertices[id.0]
    }

    pub(crate) fn vertex_mut(&mut self, id: VertexId) -> &mut GraphVertex {
        &mut self.vertices[id.0]
    }

    pub fn edge(&self, id: GraphEdgeId) -> &GraphEdge {
        &self.edges[id.0]
    }

    pub(crate) fn edge_mut(&mut self, id: GraphEdgeId) -> &mut GraphEdge {
        &mut self.edges[id.0]
    }

    pub fn vertices(&self) -> impl Iterator<Item = &GraphVertex> {
        self.vertices.iter()
    }

    pub fn vertex_by_business_service(&self, id: BusinessServiceId) -> Option<VertexId> {
        self.by_business_service.get(&id).copied()
    }

    pub fn vertex_by_ip_service(&self, id: IpServiceId) -> Option<VertexId> {
        self.by_ip_service.get(&id).copied()
    }

    pub fn vertex_by_reduction_key(&self, key: &str) -> Option<VertexId> {
        self.by_reduction_key.get(key).copied()
    }

    pub fn vertex_by_edge_id(&self, id: EdgeId) -> Option<VertexId> {
        self.by_edge_id.get(&id).copied()
    }

    /// All reduction keys this graph listens on, with their vertices.
    pub fn reduction_key_entries(&self) -> impl Iterator<Item = (&str, VertexId)> {
        self.by_reduction_key.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn business_service_status(&self, id: BusinessServiceId) -> Option<Status> {
        self.vertex_by_business_service(id).map(|v| self.vertex(v).status())
    }

    pub fn ip_service_status(&self, id: IpServiceId) -> Option<Status> {
        self.vertex_by_ip_service(id).map(|v| self.vertex(v).status())
    }

    pub fn reduction_key_status(&self, key: &str) -> Option<Status> {
        self.vertex_by_reduction_key(key).map(|v| self.vertex(v).status())
    }

    pub fn edge_status(&self, id: EdgeId) -> Option<Status> {
        self.vertex_by_edge_id(id).map(|v| self.vertex(v).status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthgraph_core::EdgeDefinition;

    fn service(id: BusinessServiceId, edges: Vec<EdgeDefinition>) -> BusinessService {
        BusinessService {
            id,
            name: format!("service-{}", id),
            reduce_function: ReduceFunction::HighestSeverity,
            edges,
        }
    }

    #[test]
    fn builds_indices_for_every_identity() {
        let services = vec![service(
            1,
            vec![
                EdgeDefinition::new(
                    100,
                    1,
                    MapFunction::Identity,
                    EdgeTarget::IpService {
                        id: 7,
                        reduction_keys: vec!["uei/nodeDown:7".into(), "uei/serviceDown:7".into()],
                    },
                ),
                EdgeDefinition::new(
                    101,
                    1,
                    MapFunction::Identity,
                    EdgeTarget::ReductionKey("uei/custom:1".into()),
                ),
            ],
        )];
        let graph = BusinessServiceGraph::new(&services).unwrap();

        assert!(graph.vertex_by_business_service(1).is_some());
        assert!(graph.vertex_by_ip_service(7).is_some());
        assert!(graph.vertex_by_reduction_key("uei/nodeDown:7").is_some());
        assert!(graph.vertex_by_reduction_key("uei/serviceDown:7").is_some());
        assert!(graph.vertex_by_reduction_key("uei/custom:1").is_some());
        assert!(graph.vertex_by_edge_id(100).is_some());
        assert!(graph.vertex_by_edge_id(101).is_some());
        let routing = graph.vertex_by_edge_id(100).unwrap();
        assert_eq!(graph.vertex(routing).edge_id(), Some(100));
        assert!(graph.vertex(routing).business_service().is_none());
        assert!(graph.vertex_by_business_service(2).is_none());
        assert_eq!(graph.reduction_key_entries().count(), 3);
    }

    #[test]
    fn child_service_defined_after_reference() {
        let services = vec![
            service(
                1,
                vec![EdgeDefinition::new(
                    100,
                    1,
                    MapFunction::Identity,
                    EdgeTarget::ChildService(2),
                )],
            ),
            service(
                2,
                vec![EdgeDefinition::new(
                    200,
                    1,
                    MapFunction::Identity,
                    EdgeTarget::ReductionKey("uei/x".into()),
                )],
            ),
        ];
        let graph = BusinessServiceGraph::new(&services).unwrap();
        let child = graph.vertex_by_business_service(2).unwrap();
        assert_eq!(graph.vertex(child).business_service().unwrap().id, 2);
        // The child vertex is reachable from the parent through its
        // routing vertex.
        let parent = graph.vertex_by_business_service(1).unwrap();
        let routing = graph.edge(graph.vertex(parent).out_edges()[0]).child();
        assert_eq!(graph.edge(graph.vertex(routing).out_edges()[0]).child(), child);
    }

    #[test]
    fn shared_reduction_key_gets_one_vertex() {
        let services = vec![
            service(
                1,
                vec![EdgeDefinition::new(
                    100,
                    1,
                    MapFunction::Identity,
                    EdgeTarget::ReductionKey("uei/shared".into()),
                )],
            ),
            service(
                2,
                vec![EdgeDefinition::new(
                    200,
                    1,
                    MapFunction::Identity,
                    EdgeTarget::ReductionKey("uei/shared".into()),
                )],
            ),
        ];
        let graph = BusinessServiceGraph::new(&services).unwrap();
        assert_eq!(graph.reduction_key_entries().count(), 1);
        let key_vertex = graph.vertex_by_reduction_key("uei/shared").unwrap();
        assert_eq!(graph.vertex(key_vertex).in_edges().len(), 2);
    }

    #[test]
    fn zero_weight_is_rejected() {
        let services = vec![service(
            1,
            vec![EdgeDefinition::new(
                100,
                0,
                MapFunction::Identity,
                EdgeTarget::ReductionKey("uei/x".into()),
            )],
        )];
        let err = BusinessServiceGraph::new(&services).unwrap_err();
        assert!(matches!(err, HealthGraphError::InvalidInput(_)));
    }

    #[test]
    fn duplicate_service_id_is_rejected() {
        let services = vec![service(1, vec![]), service(1, vec![])];
        let err = BusinessServiceGraph::new(&services).unwrap_err();
        assert!(matches!(err, HealthGraphError::InvalidInput(_)));
    }

    #[test]
    fn statuses_start_at_the_default() {
        let services = vec![service(
            1,
            vec![EdgeDefinition::new(
                100,
                1,
                MapFunction::Identity,
                EdgeTarget::ReductionKey("uei/x".into()),
            )],
        )];
        let graph = BusinessServiceGraph::new(&services).unwrap();
        assert!(graph.vertices().all(|v| v.status() == DEFAULT_SEVERITY));
    }
}

use serde::{Deserialize, Serialize};

use crate::functions::{MapFunction, ReduceFunction};

pub type BusinessServiceId = u64;
pub type IpServiceId = u64;
pub type EdgeId = u64;
pub type ReductionKey = String;

/// Caller-supplied definition of one business service: its identity, the
/// function reducing its dependencies, and the dependency edges themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessService {
    pub id: BusinessServiceId,
    pub name: String,
    pub reduce_function: ReduceFunction,
    pub edges: Vec<EdgeDefinition>,
}

/// One dependency of a business service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub id: EdgeId,
    /// Relative importance of this dependency in the parent's reduction.
    /// Must be positive.
    pub weight: u32,
    pub map_function: MapFunction,
    pub target: EdgeTarget,
}

/// What an edge points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EdgeTarget {
    /// Another business service.
    ChildService(BusinessServiceId),
    /// A monitored IP service; its health is the worst of its alarm
    /// reduction keys.
    IpService {
        id: IpServiceId,
        reduction_keys: Vec<ReductionKey>,
    },
    /// A single raw alarm source.
    ReductionKey(ReductionKey),
}

impl EdgeDefinition {
    pub fn new(id: EdgeId, weight: u32, map_function: MapFunction, target: EdgeTarget) -> Self {
        Self {
            id,
            weight,
            map_function,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_serialize() {
        let svc = BusinessService {
            id: 1,
            name: "web-shop".into(),
            reduce_function: ReduceFunction::HighestSeverity,
            edges: vec![EdgeDefinition::new(
                10,
                2,
                MapFunction::Identity,
                EdgeTarget::ReductionKey("uei.web-shop/down".into()),
            )],
        };
        let json = serde_json::to_string(&svc).unwrap();
        let back: BusinessService = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, 1);
        assert_eq!(back.edges.len(), 1);
        assert_eq!(back.edges[0].weight, 2);
    }
}

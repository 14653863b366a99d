//! Blur node registry: tracks one entry per `CREATE_NODE` call until its
//! matching `DESTROY_NODE`, or until the owning client disconnects.
//!
//! Mirrors `wlblurd/src/blur_node.c`: monotonically increasing non-zero
//! node ids, a per-client node count enforced against
//! `max_nodes_per_client`, and bulk cleanup on client disconnect.

use std::collections::HashMap;

use wlblur_params::BlurParams;

/// A live blur node: the per-surface state a compositor created via
/// `CREATE_NODE` and references by id in subsequent `RENDER_BLUR` calls.
#[derive(Debug, Clone)]
pub struct BlurNode {
    pub id: u32,
    pub client_id: u32,
    pub width: u32,
    pub height: u32,
    pub params: BlurParams,
}

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("client {0} has reached its node limit")]
    ClientAtCapacity(u32),
}

/// Owns all live [`BlurNode`]s, keyed by id.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<u32, BlurNode>,
    next_id: u32,
    max_nodes_per_client: u32,
}

impl NodeRegistry {
    pub fn new(max_nodes_per_client: u32) -> Self {
        NodeRegistry {
            nodes: HashMap::new(),
            next_id: 1,
            max_nodes_per_client,
        }
    }

    /// Applies a new per-client quota, e.g. after a configuration reload.
    /// Does not evict any node already over the new limit; the limit is
    /// only enforced at the next `create`.
    pub fn set_max_nodes_per_client(&mut self, max_nodes_per_client: u32) {
        self.max_nodes_per_client = max_nodes_per_client;
    }

    fn count_for_client(&self, client_id: u32) -> u32 {
        self.nodes.values().filter(|n| n.client_id == client_id).count() as u32
    }

    /// Creates a node owned by `client_id`, returning its assigned id.
    /// Ids start at 1 and increase monotonically; 0 is never assigned and
    /// is reserved as the wire "no node"/error sentinel.
    pub fn create(
        &mut self,
        client_id: u32,
        width: u32,
        height: u32,
        params: BlurParams,
    ) -> Result<u32, NodeError> {
        if self.count_for_client(client_id) >= self.max_nodes_per_client {
            return Err(NodeError::ClientAtCapacity(client_id));
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.nodes.insert(
            id,
            BlurNode {
                id,
                client_id,
                width,
                height,
                params,
            },
        );
        Ok(id)
    }

    pub fn lookup(&self, id: u32) -> Option<&BlurNode> {
        self.nodes.get(&id)
    }

    pub fn lookup_mut(&mut self, id: u32) -> Option<&mut BlurNode> {
        self.nodes.get_mut(&id)
    }

    /// Destroys a single node. Returns `true` if it existed.
    pub fn destroy(&mut self, id: u32) -> bool {
        self.nodes.remove(&id).is_some()
    }

    /// Destroys every node owned by `client_id`, e.g. on client disconnect.
    /// Returns the number of nodes removed.
    pub fn destroy_client_nodes(&mut self, client_id: u32) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|_, n| n.client_id != client_id);
        before - self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut registry = NodeRegistry::new(10);
        let a = registry.create(1, 100, 100, BlurParams::default()).unwrap();
        let b = registry.create(1, 100, 100, BlurParams::default()).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn lookup_finds_created_node_with_right_owner() {
        let mut registry = NodeRegistry::new(10);
        let id = registry.create(7, 640, 480, BlurParams::default()).unwrap();
        let node = registry.lookup(id).unwrap();
        assert_eq!(node.client_id, 7);
        assert_eq!((node.width, node.height), (640, 480));
    }

    #[test]
    fn destroy_removes_node() {
        let mut registry = NodeRegistry::new(10);
        let id = registry.create(1, 100, 100, BlurParams::default()).unwrap();
        assert!(registry.destroy(id));
        assert!(registry.lookup(id).is_none());
        assert!(!registry.destroy(id));
    }

    #[test]
    fn per_client_limit_enforced() {
        let mut registry = NodeRegistry::new(2);
        registry.create(1, 1, 1, BlurParams::default()).unwrap();
        registry.create(1, 1, 1, BlurParams::default()).unwrap();
        let err = registry.create(1, 1, 1, BlurParams::default());
        assert!(matches!(err, Err(NodeError::ClientAtCapacity(1))));
    }

    #[test]
    fn limit_is_per_client_not_global() {
        let mut registry = NodeRegistry::new(1);
        registry.create(1, 1, 1, BlurParams::default()).unwrap();
        assert!(registry.create(2, 1, 1, BlurParams::default()).is_ok());
    }

    #[test]
    fn destroy_client_nodes_clears_only_that_clients_nodes() {
        let mut registry = NodeRegistry::new(10);
        registry.create(1, 1, 1, BlurParams::default()).unwrap();
        registry.create(1, 1, 1, BlurParams::default()).unwrap();
        registry.create(2, 1, 1, BlurParams::default()).unwrap();
        let removed = registry.destroy_client_nodes(1);
        assert_eq!(removed, 2);
        assert_eq!(registry.len(), 1);
    }
}

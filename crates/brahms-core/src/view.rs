//! Views: deduplicated sets of nodes keyed by their identifier.

use std::collections::BTreeMap;
use std::fmt;

use rand::seq::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Nid, Node};

/// An unordered set of nodes, keyed by [`Nid`].
///
/// Keys are always derived from the node itself, so a view can never hold
/// an entry whose key disagrees with its node. Entries iterate in key order,
/// which keeps random picks reproducible for a seeded rng.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct View {
    nodes: BTreeMap<Nid, Node>,
}

impl View {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a view from a list of nodes. Duplicates collapse.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        nodes.into_iter().collect()
    }

    /// Insert a node. Returns true if it was not present yet.
    pub fn insert(&mut self, node: Node) -> bool {
        self.nodes.insert(node.hash(), node).is_none()
    }

    /// Remove a node by id.
    pub fn remove(&mut self, id: &Nid) -> Option<Node> {
        self.nodes.remove(id)
    }

    /// Get a node by id.
    pub fn get(&self, id: &Nid) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Check whether the view holds `id`.
    pub fn contains(&self, id: &Nid) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over `(id, node)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Nid, &Node)> {
        self.nodes.iter()
    }

    /// Iterate over the nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Consume the view into its nodes.
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes.into_values().collect()
    }

    /// Choose up to `k` nodes uniformly at random without replacement.
    ///
    /// Returns every node when the view holds fewer than `k`.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R, k: usize) -> View {
        if k >= self.len() {
            return self.clone();
        }

        self.nodes
            .iter()
            .choose_multiple(rng, k)
            .into_iter()
            .map(|(id, node)| (*id, *node))
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    /// Union of two views.
    pub fn concat(&self, other: &View) -> View {
        let mut nodes = self.nodes.clone();
        nodes.extend(other.nodes.iter().map(|(id, node)| (*id, *node)));
        nodes.into()
    }
}

impl From<BTreeMap<Nid, Node>> for View {
    fn from(nodes: BTreeMap<Nid, Node>) -> Self {
        Self { nodes }
    }
}

impl From<Vec<Node>> for View {
    fn from(nodes: Vec<Node>) -> Self {
        Self::from_nodes(nodes)
    }
}

impl From<View> for Vec<Node> {
    fn from(view: View) -> Self {
        view.into_nodes()
    }
}

impl FromIterator<Node> for View {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        let mut view = View::new();
        for node in iter {
            view.insert(node);
        }
        view
    }
}

impl IntoIterator for View {
    type Item = Node;
    type IntoIter = std::collections::btree_map::IntoValues<Nid, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.into_values()
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, node) in self.nodes().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{node}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;

    fn n(port: u16) -> Node {
        Node::new(Ipv4Addr::LOCALHOST, port)
    }

    fn keys(v: &View) -> BTreeSet<Nid> {
        v.iter().map(|(id, _)| *id).collect()
    }

    #[test]
    fn keys_are_derived() {
        let v = View::from_nodes([n(1), n(2), n(1)]);
        assert_eq!(v.len(), 2);
        for (id, node) in v.iter() {
            assert_eq!(*id, node.hash());
        }
    }

    #[test]
    fn pick_does_not_mutate() {
        let v = View::from_nodes((1..=10).map(n));
        let before = v.clone();
        let mut rng = StdRng::seed_from_u64(1);
        let picked = v.pick(&mut rng, 3);
        assert_eq!(picked.len(), 3);
        assert_eq!(v, before);
    }

    #[test]
    fn pick_more_than_available() {
        let v = View::from_nodes([n(1), n(2)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(v.pick(&mut rng, 100), v);
        assert!(v.pick(&mut rng, 0).is_empty());
    }

    #[test]
    fn copy_is_independent() {
        let mut v = View::from_nodes([n(1)]);
        let copy = v.clone();
        v.insert(n(2));
        assert_eq!(copy.len(), 1);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        assert_eq!(View::from_nodes([n(1), n(2)]), View::from_nodes([n(2), n(1)]));
    }

    #[test]
    fn json_is_node_list() {
        let v: View = serde_json::from_str(
            r#"[{"ip":"127.0.0.1","port":1},{"ip":"127.0.0.1","port":1},{"ip":"127.0.0.1","port":2}]"#,
        )
        .unwrap();
        assert_eq!(v, View::from_nodes([n(1), n(2)]));

        let encoded = serde_json::to_string(&View::from_nodes([n(8080)])).unwrap();
        assert_eq!(encoded, r#"[{"ip":"127.0.0.1","port":8080}]"#);
    }

    #[test]
    fn display_lists_nodes() {
        assert_eq!(View::from_nodes([n(1)]).to_string(), "{127.0.0.1:1}");
        assert_eq!(View::new().to_string(), "{}");
    }

    proptest! {
        #[test]
        fn pick_is_sized_subset(ports in prop::collection::btree_set(1u16..2000, 0..50), k in 0usize..60, seed in any::<u64>()) {
            let v = View::from_nodes(ports.into_iter().map(n));
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = v.pick(&mut rng, k);

            prop_assert_eq!(picked.len(), k.min(v.len()));
            for (id, node) in picked.iter() {
                prop_assert_eq!(v.get(id), Some(node));
            }
        }

        #[test]
        fn concat_is_commutative_union(
            a in prop::collection::vec(1u16..100, 0..30),
            b in prop::collection::vec(1u16..100, 0..30),
        ) {
            let va = View::from_nodes(a.iter().copied().map(n));
            let vb = View::from_nodes(b.iter().copied().map(n));

            let ab = va.concat(&vb);
            let ba = vb.concat(&va);
            prop_assert_eq!(keys(&ab), keys(&ba));

            let expected: BTreeSet<u16> = a.iter().chain(b.iter()).copied().collect();
            prop_assert_eq!(ab.len(), expected.len());
            prop_assert_eq!(ab.concat(&ab), ab.clone());
        }
    }
}

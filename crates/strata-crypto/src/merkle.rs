use serde::{Deserialize, Serialize};
use strata_types::{AlgorithmId, Digest};
use tracing::debug;

use crate::error::CryptoError;
use crate::hasher::ContentHasher;

/// Side of a sibling in a Merkle proof path.
///
/// `Right` means the sibling sits to the right, so the step hashes
/// `self ‖ sibling`; `Left` means `sibling ‖ self`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Shape of a node in the tree arena. Children are arena indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Root of a tree built from zero items.
    Empty,
    /// Leaf carrying the original item bytes.
    Leaf { data: Vec<u8> },
    /// Internal node over two distinct children.
    Branch { left: usize, right: usize },
    /// Internal node over an unpaired trailing child combined with itself.
    SelfPaired { child: usize },
}

/// A node of a [`MerkleTree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleNode {
    pub hash: Digest,
    pub kind: NodeKind,
}

impl MerkleNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Original item bytes, present only on leaves.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.kind {
            NodeKind::Leaf { data } => Some(data),
            _ => None,
        }
    }
}

/// Binary Merkle tree stored as an arena.
///
/// Every node is owned by the arena and referenced by index from exactly one
/// parent, so the structure is a strict tree. The root is the last node
/// pushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    nodes: Vec<MerkleNode>,
    root: usize,
    leaf_count: usize,
    algorithm: AlgorithmId,
}

impl MerkleTree {
    /// The root node.
    pub fn root(&self) -> &MerkleNode {
        &self.nodes[self.root]
    }

    /// The root digest.
    pub fn root_hash(&self) -> &Digest {
        &self.nodes[self.root].hash
    }

    pub fn root_index(&self) -> usize {
        self.root
    }

    pub fn node(&self, index: usize) -> Option<&MerkleNode> {
        self.nodes.get(index)
    }

    /// Number of leaves (items the tree was built from).
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Total number of nodes in the arena.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Algorithm used for every node of this tree.
    pub fn algorithm(&self) -> AlgorithmId {
        self.algorithm
    }

    /// Leaves in item order.
    pub fn leaves(&self) -> impl Iterator<Item = &MerkleNode> {
        self.nodes.iter().take(self.leaf_count)
    }

    /// Depth-first search for the leaf whose hash is `target`, pushing the
    /// sibling of each node on the way back up.
    fn find_path(&self, index: usize, target: &Digest, path: &mut Vec<(Digest, Side)>) -> bool {
        let node = &self.nodes[index];
        match &node.kind {
            NodeKind::Empty => false,
            NodeKind::Leaf { .. } => node.hash == *target,
            NodeKind::Branch { left, right } => {
                if self.find_path(*left, target, path) {
                    path.push((self.nodes[*right].hash.clone(), Side::Right));
                    true
                } else if self.find_path(*right, target, path) {
                    path.push((self.nodes[*left].hash.clone(), Side::Left));
                    true
                } else {
                    false
                }
            }
            NodeKind::SelfPaired { child } => {
                if self.find_path(*child, target, path) {
                    path.push((self.nodes[*child].hash.clone(), Side::Right));
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Builds Merkle trees over ordered item lists.
///
/// The algorithm is fixed per builder and independent of any chain
/// rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MerkleTreeBuilder {
    hasher: ContentHasher,
}

impl MerkleTreeBuilder {
    pub fn new(algorithm: AlgorithmId) -> Self {
        Self {
            hasher: ContentHasher::new(algorithm),
        }
    }

    /// Build a tree over `items`.
    ///
    /// - no items: a single `Empty` node with hash `H(b"")`
    /// - one item: the leaf itself is the root, no combination round
    /// - otherwise pairs are combined left to right as `H(left ‖ right)`;
    ///   an odd trailing node is combined with itself
    pub fn build<I, T>(&self, items: I) -> MerkleTree
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut nodes: Vec<MerkleNode> = items
            .into_iter()
            .map(|item| {
                let data = item.as_ref();
                MerkleNode {
                    hash: self.hasher.hash(data),
                    kind: NodeKind::Leaf {
                        data: data.to_vec(),
                    },
                }
            })
            .collect();
        let leaf_count = nodes.len();

        if nodes.is_empty() {
            nodes.push(MerkleNode {
                hash: self.hasher.hash(b""),
                kind: NodeKind::Empty,
            });
            return MerkleTree {
                nodes,
                root: 0,
                leaf_count,
                algorithm: self.hasher.algorithm(),
            };
        }

        let mut level: Vec<usize> = (0..leaf_count).collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                let (hash, kind) = match *pair {
                    [left, right] => (
                        self.combine(&nodes[left].hash, &nodes[right].hash),
                        NodeKind::Branch { left, right },
                    ),
                    [child] => (
                        self.combine(&nodes[child].hash, &nodes[child].hash),
                        NodeKind::SelfPaired { child },
                    ),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                };
                nodes.push(MerkleNode { hash, kind });
                next.push(nodes.len() - 1);
            }
            level = next;
        }

        let root = level[0];
        debug!(
            leaves = leaf_count,
            nodes = nodes.len(),
            root = %nodes[root].hash.short_hex(),
            "built Merkle tree"
        );
        MerkleTree {
            nodes,
            root,
            leaf_count,
            algorithm: self.hasher.algorithm(),
        }
    }

    fn combine(&self, left: &Digest, right: &Digest) -> Digest {
        self.hasher.hash_parts(&[left.as_bytes(), right.as_bytes()])
    }
}

impl Default for MerkleTreeBuilder {
    fn default() -> Self {
        Self::new(AlgorithmId::Sha256)
    }
}

/// Merkle inclusion proof.
///
/// A free-standing value: it holds no reference to the tree it came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// `(sibling_hash, sibling_side)` pairs from leaf to root.
    pub path: Vec<(Digest, Side)>,
}

impl MerkleProof {
    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Derives and checks inclusion proofs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MerkleProofService {
    hasher: ContentHasher,
}

impl MerkleProofService {
    pub fn new(algorithm: AlgorithmId) -> Self {
        Self {
            hasher: ContentHasher::new(algorithm),
        }
    }

    /// Derive the inclusion proof for `item`.
    ///
    /// The search matches leaves by `H(item)` using the tree's own algorithm.
    /// When an item occurs more than once, the leftmost occurrence is proven.
    pub fn proof_for(&self, item: &[u8], tree: &MerkleTree) -> Result<MerkleProof, CryptoError> {
        let target = ContentHasher::new(tree.algorithm()).hash(item);
        let mut path = Vec::new();
        if tree.find_path(tree.root_index(), &target, &mut path) {
            Ok(MerkleProof { path })
        } else {
            Err(CryptoError::ItemNotFound)
        }
    }

    /// Recompute the root from `H(item)` and the proof path and compare it
    /// with `expected_root`.
    pub fn verify(&self, item: &[u8], proof: &MerkleProof, expected_root: &Digest) -> bool {
        let mut current = self.hasher.hash(item);
        for (sibling, side) in &proof.path {
            current = match side {
                Side::Left => self.hasher.hash_parts(&[sibling.as_bytes(), current.as_bytes()]),
                Side::Right => self.hasher.hash_parts(&[current.as_bytes(), sibling.as_bytes()]),
            };
        }
        current == *expected_root
    }
}

impl Default for MerkleProofService {
    fn default() -> Self {
        Self::new(AlgorithmId::Sha256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("file{i}.rs")).collect()
    }

    fn sha256(data: &[u8]) -> Digest {
        ContentHasher::SHA256.hash(data)
    }

    fn pair(left: &Digest, right: &Digest) -> Digest {
        ContentHasher::SHA256.hash_parts(&[left.as_bytes(), right.as_bytes()])
    }

    #[test]
    fn empty_tree_has_canonical_hash() {
        let tree = MerkleTreeBuilder::default().build(Vec::<Vec<u8>>::new());
        assert_eq!(tree.root_hash(), &sha256(b""));
        assert_eq!(tree.root().kind, NodeKind::Empty);
        assert_eq!(tree.leaf_count(), 0);
    }

    #[test]
    fn single_leaf_is_root() {
        let tree = MerkleTreeBuilder::default().build(["x"]);
        assert_eq!(tree.root_hash(), &sha256(b"x"));
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().data(), Some(&b"x"[..]));
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn odd_node_is_paired_with_itself() {
        let tree = MerkleTreeBuilder::default().build(["a", "b", "c"]);
        let (a, b, c) = (sha256(b"a"), sha256(b"b"), sha256(b"c"));
        let expected = pair(&pair(&a, &b), &pair(&c, &c));
        assert_eq!(tree.root_hash(), &expected);
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn internal_nodes_carry_no_data() {
        let tree = MerkleTreeBuilder::default().build(items(5));
        let root = tree.root();
        assert!(root.data().is_none());
        assert_eq!(tree.leaves().count(), 5);
        assert!(tree.leaves().all(MerkleNode::is_leaf));
    }

    #[test]
    fn proof_verifies_for_all_items() {
        let service = MerkleProofService::default();
        for n in 1..=9 {
            let list = items(n);
            let tree = MerkleTreeBuilder::default().build(&list);
            for item in &list {
                let proof = service.proof_for(item.as_bytes(), &tree).unwrap();
                assert!(
                    service.verify(item.as_bytes(), &proof, tree.root_hash()),
                    "item {item} of {n} failed"
                );
            }
        }
    }

    #[test]
    fn single_item_proof_is_empty() {
        let tree = MerkleTreeBuilder::default().build(["only"]);
        let proof = MerkleProofService::default().proof_for(b"only", &tree).unwrap();
        assert!(proof.is_empty());
    }

    #[test]
    fn power_of_two_proof_length() {
        let tree = MerkleTreeBuilder::default().build(items(8));
        let proof = MerkleProofService::default()
            .proof_for(b"file3.rs", &tree)
            .unwrap();
        assert_eq!(proof.len(), 3);
    }

    #[test]
    fn self_paired_step_uses_own_hash_on_the_right() {
        let tree = MerkleTreeBuilder::default().build(["a", "b", "c"]);
        let proof = MerkleProofService::default().proof_for(b"c", &tree).unwrap();
        assert_eq!(proof.path[0], (sha256(b"c"), Side::Right));
        assert_eq!(proof.path[1].1, Side::Left);
    }

    #[test]
    fn absent_item_is_not_found() {
        let tree = MerkleTreeBuilder::default().build(items(4));
        let err = MerkleProofService::default()
            .proof_for(b"missing", &tree)
            .unwrap_err();
        assert_eq!(err, CryptoError::ItemNotFound);
    }

    #[test]
    fn empty_tree_has_no_proofs() {
        let tree = MerkleTreeBuilder::default().build(Vec::<&str>::new());
        let err = MerkleProofService::default().proof_for(b"", &tree).unwrap_err();
        assert_eq!(err, CryptoError::ItemNotFound);
    }

    #[test]
    fn wrong_item_or_root_fails_verification() {
        let list = items(6);
        let tree = MerkleTreeBuilder::default().build(&list);
        let service = MerkleProofService::default();
        let proof = service.proof_for(b"file2.rs", &tree).unwrap();
        assert!(!service.verify(b"file3.rs", &proof, tree.root_hash()));
        assert!(!service.verify(b"file2.rs", &proof, &sha256(b"other root")));
    }

    #[test]
    fn flipped_direction_fails_verification() {
        let tree = MerkleTreeBuilder::default().build(items(4));
        let service = MerkleProofService::default();
        let mut proof = service.proof_for(b"file1.rs", &tree).unwrap();
        proof.path[0].1 = match proof.path[0].1 {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        };
        assert!(!service.verify(b"file1.rs", &proof, tree.root_hash()));
    }

    #[test]
    fn tree_algorithm_is_respected() {
        let builder = MerkleTreeBuilder::new(AlgorithmId::Blake3);
        let tree = builder.build(items(3));
        assert_eq!(tree.algorithm(), AlgorithmId::Blake3);
        let service = MerkleProofService::new(AlgorithmId::Blake3);
        let proof = service.proof_for(b"file0.rs", &tree).unwrap();
        assert!(service.verify(b"file0.rs", &proof, tree.root_hash()));
        assert!(!MerkleProofService::default().verify(b"file0.rs", &proof, tree.root_hash()));
    }

    #[test]
    fn deterministic_root() {
        let a = MerkleTreeBuilder::default().build(items(10));
        let b = MerkleTreeBuilder::default().build(items(10));
        assert_eq!(a.root_hash(), b.root_hash());
        assert_ne!(a.root_hash(), MerkleTreeBuilder::default().build(items(9)).root_hash());
    }

    #[test]
    fn proof_serde_roundtrip() {
        let tree = MerkleTreeBuilder::default().build(items(5));
        let service = MerkleProofService::default();
        let proof = service.proof_for(b"file4.rs", &tree).unwrap();
        let json = serde_json::to_string(&proof).unwrap();
        let parsed: MerkleProof = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, proof);
        assert!(service.verify(b"file4.rs", &parsed, tree.root_hash()));
    }
}

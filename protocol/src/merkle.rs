//! Append-only commitment tree
//!
//! Incremental Poseidon Merkle tree of the kind a privacy pool keeps: only
//! the rightmost filled subtree per level is stored, and a short history of
//! roots is kept so proofs against a slightly stale root still verify.

use ark_bn254::Fr;
use ark_ff::PrimeField;
use light_poseidon::{Poseidon, PoseidonHasher};

use crate::crypto::fr_to_bytes_be;
use crate::error::CryptoError;
use crate::felt::Felt;

pub const MERKLE_DEPTH: usize = 20;
pub const ROOT_HISTORY_SIZE: usize = 30;

#[derive(Debug, Clone)]
pub struct CommitmentTree {
    zeros: [[u8; 32]; MERKLE_DEPTH + 1],
    filled_subtrees: [[u8; 32]; MERKLE_DEPTH],
    root: [u8; 32],
    root_history: Vec<[u8; 32]>,
    next_leaf_index: u32,
}

fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
    let mut hasher =
        Poseidon::<Fr>::new_circom(2).map_err(|e| CryptoError::Commitment(e.to_string()))?;
    let hash = hasher
        .hash(&[Fr::from_be_bytes_mod_order(left), Fr::from_be_bytes_mod_order(right)])
        .map_err(|e| CryptoError::Commitment(e.to_string()))?;
    Ok(fr_to_bytes_be(&hash))
}

impl CommitmentTree {
    pub fn new() -> Result<Self, CryptoError> {
        // zeros[i] = H(zeros[i-1], zeros[i-1]), zeros[0] = empty leaf
        let mut zeros = [[0u8; 32]; MERKLE_DEPTH + 1];
        for level in 1..=MERKLE_DEPTH {
            zeros[level] = hash_pair(&zeros[level - 1], &zeros[level - 1])?;
        }

        let mut filled_subtrees = [[0u8; 32]; MERKLE_DEPTH];
        filled_subtrees.copy_from_slice(&zeros[..MERKLE_DEPTH]);

        Ok(Self {
            zeros,
            filled_subtrees,
            root: zeros[MERKLE_DEPTH],
            root_history: Vec::with_capacity(ROOT_HISTORY_SIZE),
            next_leaf_index: 0,
        })
    }

    pub fn capacity() -> u64 {
        1u64 << MERKLE_DEPTH
    }

    pub fn next_leaf_index(&self) -> u32 {
        self.next_leaf_index
    }

    /// Current root, reduced into the ledger chain's felt range
    pub fn root(&self) -> Felt {
        Felt::from_bytes_be_masked(self.root)
    }

    /// Insert a leaf and return its index, or `None` when the tree is full
    pub fn insert(&mut self, leaf: &Felt) -> Result<Option<u32>, CryptoError> {
        if u64::from(self.next_leaf_index) >= Self::capacity() {
            return Ok(None);
        }

        let leaf_index = self.next_leaf_index;
        let mut current_index = leaf_index;
        let mut current_hash = leaf.to_bytes_be();

        for level in 0..MERKLE_DEPTH {
            if current_index % 2 == 0 {
                self.filled_subtrees[level] = current_hash;
                current_hash = hash_pair(&current_hash, &self.zeros[level])?;
            } else {
                current_hash = hash_pair(&self.filled_subtrees[level], &current_hash)?;
            }
            current_index /= 2;
        }

        if self.root_history.len() == ROOT_HISTORY_SIZE {
            self.root_history.remove(0);
        }
        self.root_history.push(self.root);
        self.root = current_hash;
        self.next_leaf_index += 1;

        Ok(Some(leaf_index))
    }

    /// Whether `root` is the current root or one of the recent ones
    pub fn is_known_root(&self, root: &Felt) -> bool {
        std::iter::once(&self.root)
            .chain(self.root_history.iter())
            .any(|r| Felt::from_bytes_be_masked(*r) == *root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree() {
        let tree = CommitmentTree::new().unwrap();
        assert_eq!(tree.next_leaf_index(), 0);
        assert!(tree.is_known_root(&tree.root()));
    }

    #[test]
    fn test_insert_advances_index_and_root() {
        let mut tree = CommitmentTree::new().unwrap();
        let empty_root = tree.root();

        assert_eq!(tree.insert(&Felt::from_u128(11)).unwrap(), Some(0));
        assert_eq!(tree.insert(&Felt::from_u128(22)).unwrap(), Some(1));
        assert_eq!(tree.next_leaf_index(), 2);
        assert_ne!(tree.root(), empty_root);
        assert!(tree.is_known_root(&empty_root));
    }

    #[test]
    fn test_root_depends_on_order() {
        let mut a = CommitmentTree::new().unwrap();
        let mut b = CommitmentTree::new().unwrap();
        a.insert(&Felt::from_u128(1)).unwrap();
        a.insert(&Felt::from_u128(2)).unwrap();
        b.insert(&Felt::from_u128(2)).unwrap();
        b.insert(&Felt::from_u128(1)).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_root_history_is_bounded() {
        let mut tree = CommitmentTree::new().unwrap();
        let first_root = tree.root();
        for i in 0..(ROOT_HISTORY_SIZE as u128 + 1) {
            tree.insert(&Felt::from_u128(i + 1)).unwrap();
        }
        assert!(!tree.is_known_root(&first_root));
    }
}

//! Random rooted binary trees and Newick output.

use anyhow::{bail, Result};
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryTree {
    /// Length of the branch above this node.
    pub distance: f64,
    pub internal: bool,
    pub left: Option<Box<BinaryTree>>,
    pub right: Option<Box<BinaryTree>>,
    pub id: String,
}

fn random_distance<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    0.00001 + rng.gen::<f64>() * 0.8
}

impl BinaryTree {
    pub fn leaf(distance: f64, id: impl Into<String>) -> Self {
        BinaryTree {
            distance,
            internal: false,
            left: None,
            right: None,
            id: id.into(),
        }
    }

    pub fn node(distance: f64, left: BinaryTree, right: BinaryTree, id: impl Into<String>) -> Self {
        BinaryTree {
            distance,
            internal: true,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            id: id.into(),
        }
    }

    /// Build a random tree with exactly `leaf_count` leaves.
    ///
    /// Starts from a single leaf and repeatedly splits a uniformly chosen
    /// leaf. Node ids are preorder indices, so leaf ids are unique.
    pub fn random<R: Rng + ?Sized>(leaf_count: usize, rng: &mut R) -> Result<Self> {
        if leaf_count == 0 {
            bail!("A random binary tree needs at least one leaf");
        }
        let mut tree = BinaryTree::leaf(random_distance(rng), "");
        for leaves in 1..leaf_count {
            let target = rng.gen_range(0..leaves);
            tree.split_leaf(target, rng);
        }
        let mut next_id = 0;
        tree.assign_preorder_ids(&mut next_id);
        Ok(tree)
    }

    /// Turn the `target`-th leaf (left to right) into a cherry.
    /// Returns the number of leaves seen when `target` is not in this subtree.
    fn split_leaf<R: Rng + ?Sized>(&mut self, target: usize, rng: &mut R) -> Option<usize> {
        if !self.internal {
            if target == 0 {
                self.internal = true;
                self.left = Some(Box::new(BinaryTree::leaf(random_distance(rng), "")));
                self.right = Some(Box::new(BinaryTree::leaf(random_distance(rng), "")));
                return None;
            }
            return Some(1);
        }
        let mut seen = 0;
        for child in [&mut self.left, &mut self.right].into_iter().flatten() {
            match child.split_leaf(target - seen, rng) {
                None => return None,
                Some(n) => seen += n,
            }
        }
        Some(seen)
    }

    fn assign_preorder_ids(&mut self, next_id: &mut usize) {
        self.id = next_id.to_string();
        *next_id += 1;
        for child in [&mut self.left, &mut self.right].into_iter().flatten() {
            child.assign_preorder_ids(next_id);
        }
    }

    fn children(&self) -> impl Iterator<Item = &BinaryTree> {
        [&self.left, &self.right]
            .into_iter()
            .flatten()
            .map(|child| &**child)
    }

    /// Leaf ids, left to right.
    pub fn leaf_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_leaf_ids(&mut ids);
        ids
    }

    fn collect_leaf_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        if self.internal {
            for child in self.children() {
                child.collect_leaf_ids(ids);
            }
        } else {
            ids.push(&self.id);
        }
    }

    pub fn leaf_count(&self) -> usize {
        if self.internal {
            self.children().map(BinaryTree::leaf_count).sum()
        } else {
            1
        }
    }

    /// Newick string; internal node ids are printed after the closing paren.
    pub fn to_newick(&self, include_distances: bool) -> String {
        let mut out = String::new();
        self.write_newick(include_distances, &mut out);
        out.push(';');
        out
    }

    fn write_newick(&self, include_distances: bool, out: &mut String) {
        if self.internal {
            out.push('(');
            for (i, child) in self.children().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                child.write_newick(include_distances, out);
            }
            out.push(')');
        }
        out.push_str(&self.id);
        if include_distances {
            out.push_str(&format!(":{:.6}", self.distance));
        }
    }
}

/// Leaf labels of a Newick string, left to right.
///
/// Only the labels are extracted; branch lengths, internal labels and
/// bracketed comments are skipped. Quoted labels are not supported.
pub fn newick_leaf_names(newick: &str) -> Result<Vec<String>> {
    let mut leaves = Vec::new();
    let mut depth = 0i64;
    let mut label = String::new();
    // A label directly after ')' belongs to an internal node.
    let mut after_close = false;
    let mut in_length = false;
    let mut in_comment = false;

    let mut flush = |label: &mut String, after_close: bool| {
        if !after_close && !label.is_empty() {
            leaves.push(label.clone());
        }
        label.clear();
    };

    for ch in newick.trim().chars() {
        if in_comment {
            in_comment = ch != ']';
            continue;
        }
        match ch {
            '[' => in_comment = true,
            '(' => {
                depth += 1;
                after_close = false;
                in_length = false;
            }
            ',' | ')' | ';' => {
                flush(&mut label, after_close);
                in_length = false;
                after_close = ch == ')';
                if ch == ')' {
                    depth -= 1;
                    if depth < 0 {
                        bail!("Unbalanced parentheses in Newick string: {newick}");
                    }
                }
                if ch == ';' {
                    break;
                }
            }
            ':' => in_length = true,
            c if c.is_whitespace() => {}
            c => {
                if !in_length {
                    label.push(c);
                }
            }
        }
    }
    if depth != 0 {
        bail!("Unbalanced parentheses in Newick string: {newick}");
    }
    flush(&mut label, after_close);
    Ok(leaves)
}

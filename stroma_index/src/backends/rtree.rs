// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic R-tree backend.
//!
//! Nodes live in an arena with a free list. Insertion descends by least
//! area enlargement; overflowing nodes are split by sorting entry centers
//! along the axis with the wider spread and dividing in half. Removal
//! prunes empty nodes and tolerates underfull ones; queries stay correct
//! either way, and a root with a single internal child is collapsed so the
//! tree stays shallow.

use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::{Point, Rect};
use smallvec::SmallVec;

use crate::backend::{rect_contains, rects_overlap, Backend};

/// Maximum entries per node before a split.
const MAX_ENTRIES: usize = 8;

#[derive(Clone, Debug)]
enum NodeKind {
    Internal { children: Vec<usize> },
    Leaf { entries: Vec<(usize, Rect)> },
}

#[derive(Clone, Debug)]
struct Node {
    mbr: Rect,
    parent: Option<usize>,
    kind: NodeKind,
}

/// Dynamic R-tree over slot AABBs.
pub struct RTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: Option<usize>,
    /// Which leaf currently holds each slot.
    slot_leaf: HashMap<usize, usize>,
}

impl Default for RTree {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            slot_leaf: HashMap::new(),
        }
    }
}

impl core::fmt::Debug for RTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("len", &self.slot_leaf.len())
            .field("nodes", &self.nodes.iter().filter(|n| n.is_some()).count())
            .finish_non_exhaustive()
    }
}

impl RTree {
    fn alloc(&mut self, node: Node) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, idx: usize) {
        self.nodes[idx] = None;
        self.free.push(idx);
    }

    fn node(&self, idx: usize) -> &Node {
        self.nodes[idx].as_ref().expect("live node index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node {
        self.nodes[idx].as_mut().expect("live node index")
    }

    /// Recomputes a node's MBR from its current contents.
    fn recompute_mbr(&mut self, idx: usize) {
        let mbr = match &self.node(idx).kind {
            NodeKind::Leaf { entries } => fold_rects(entries.iter().map(|(_, r)| *r)),
            NodeKind::Internal { children } => {
                fold_rects(children.iter().map(|&c| self.node(c).mbr))
            }
        };
        if let Some(mbr) = mbr {
            self.node_mut(idx).mbr = mbr;
        }
    }

    /// Recomputes MBRs from `idx` up to the root.
    fn adjust_upward(&mut self, mut idx: usize) {
        loop {
            self.recompute_mbr(idx);
            match self.node(idx).parent {
                Some(p) => idx = p,
                None => break,
            }
        }
    }

    /// Descends from the root to the leaf needing least enlargement.
    fn choose_leaf(&self, aabb: Rect) -> usize {
        let mut idx = self.root.expect("choose_leaf on empty tree");
        loop {
            match &self.node(idx).kind {
                NodeKind::Leaf { .. } => return idx,
                NodeKind::Internal { children } => {
                    let mut best = children[0];
                    let mut best_enlargement = f64::INFINITY;
                    let mut best_area = f64::INFINITY;
                    for &c in children {
                        let mbr = self.node(c).mbr;
                        let area = mbr.area();
                        let enlargement = mbr.union(aabb).area() - area;
                        if enlargement < best_enlargement
                            || (enlargement == best_enlargement && area < best_area)
                        {
                            best = c;
                            best_enlargement = enlargement;
                            best_area = area;
                        }
                    }
                    idx = best;
                }
            }
        }
    }

    /// Splits an overflowing node, propagating splits toward the root.
    fn split(&mut self, idx: usize) {
        let parent = self.node(idx).parent;

        let sibling_idx = if matches!(self.node(idx).kind, NodeKind::Leaf { .. }) {
            let spill = match &mut self.node_mut(idx).kind {
                NodeKind::Leaf { entries } => split_by_center(entries, |(_, r)| *r),
                NodeKind::Internal { .. } => unreachable!("kind checked above"),
            };
            let sibling_idx = self.alloc(Node {
                mbr: Rect::ZERO,
                parent,
                kind: NodeKind::Leaf {
                    entries: spill.clone(),
                },
            });
            for (slot, _) in spill {
                self.slot_leaf.insert(slot, sibling_idx);
            }
            sibling_idx
        } else {
            // Move the children out before touching the arena again so MBR
            // lookups don't alias the node being split.
            let owned = match &mut self.node_mut(idx).kind {
                NodeKind::Internal { children } => core::mem::take(children),
                NodeKind::Leaf { .. } => unreachable!("kind checked above"),
            };
            let mut pairs: Vec<(usize, Rect)> =
                owned.iter().map(|&c| (c, self.node(c).mbr)).collect();
            let spill = split_by_center(&mut pairs, |(_, r)| *r);
            let keep: Vec<usize> = pairs.into_iter().map(|(c, _)| c).collect();
            let spilled: Vec<usize> = spill.into_iter().map(|(c, _)| c).collect();
            match &mut self.node_mut(idx).kind {
                NodeKind::Internal { children } => *children = keep,
                NodeKind::Leaf { .. } => unreachable!("kind checked above"),
            }
            let sibling_idx = self.alloc(Node {
                mbr: Rect::ZERO,
                parent,
                kind: NodeKind::Internal {
                    children: spilled.clone(),
                },
            });
            for c in spilled {
                self.node_mut(c).parent = Some(sibling_idx);
            }
            sibling_idx
        };

        self.recompute_mbr(idx);
        self.recompute_mbr(sibling_idx);

        match parent {
            Some(p) => {
                match &mut self.node_mut(p).kind {
                    NodeKind::Internal { children } => children.push(sibling_idx),
                    NodeKind::Leaf { .. } => unreachable!("parents are internal"),
                }
                self.recompute_mbr(p);
                let overflow = match &self.node(p).kind {
                    NodeKind::Internal { children } => children.len() > MAX_ENTRIES,
                    NodeKind::Leaf { .. } => false,
                };
                if overflow {
                    self.split(p);
                } else {
                    self.adjust_upward(p);
                }
            }
            None => {
                let new_root = self.alloc(Node {
                    mbr: Rect::ZERO,
                    parent: None,
                    kind: NodeKind::Internal {
                        children: alloc::vec![idx, sibling_idx],
                    },
                });
                self.node_mut(idx).parent = Some(new_root);
                self.node_mut(sibling_idx).parent = Some(new_root);
                self.recompute_mbr(new_root);
                self.root = Some(new_root);
            }
        }
    }

    /// Detaches empty nodes after a removal and collapses a single-child root.
    fn condense(&mut self, mut idx: usize) {
        loop {
            let empty = match &self.node(idx).kind {
                NodeKind::Leaf { entries } => entries.is_empty(),
                NodeKind::Internal { children } => children.is_empty(),
            };
            let parent = self.node(idx).parent;
            if empty && let Some(p) = parent {
                match &mut self.node_mut(p).kind {
                    NodeKind::Internal { children } => children.retain(|&c| c != idx),
                    NodeKind::Leaf { .. } => unreachable!("parents are internal"),
                }
                self.release(idx);
                idx = p;
                continue;
            }
            self.adjust_upward(idx);
            break;
        }

        // Collapse a root that degenerated to at most one internal child.
        if let Some(root) = self.root {
            let collapse = match &self.node(root).kind {
                NodeKind::Internal { children } if children.is_empty() => Some(None),
                NodeKind::Internal { children } if children.len() == 1 => Some(Some(children[0])),
                _ => None,
            };
            match collapse {
                Some(None) => {
                    self.release(root);
                    self.root = None;
                }
                Some(Some(child)) => {
                    self.node_mut(child).parent = None;
                    self.release(root);
                    self.root = Some(child);
                }
                None => {}
            }
        }
    }
}

impl Backend for RTree {
    fn insert(&mut self, slot: usize, aabb: Rect) {
        if self.slot_leaf.contains_key(&slot) {
            self.remove(slot);
        }
        if self.root.is_none() {
            let root = self.alloc(Node {
                mbr: aabb,
                parent: None,
                kind: NodeKind::Leaf {
                    entries: alloc::vec![(slot, aabb)],
                },
            });
            self.root = Some(root);
            self.slot_leaf.insert(slot, root);
            return;
        }
        let leaf = self.choose_leaf(aabb);
        match &mut self.node_mut(leaf).kind {
            NodeKind::Leaf { entries } => entries.push((slot, aabb)),
            NodeKind::Internal { .. } => unreachable!("choose_leaf returns leaves"),
        }
        self.slot_leaf.insert(slot, leaf);
        let overflow = match &self.node(leaf).kind {
            NodeKind::Leaf { entries } => entries.len() > MAX_ENTRIES,
            NodeKind::Internal { .. } => false,
        };
        if overflow {
            self.split(leaf);
        } else {
            self.adjust_upward(leaf);
        }
    }

    fn update(&mut self, slot: usize, aabb: Rect) {
        self.remove(slot);
        self.insert(slot, aabb);
    }

    fn remove(&mut self, slot: usize) {
        let Some(leaf) = self.slot_leaf.remove(&slot) else {
            return;
        };
        match &mut self.node_mut(leaf).kind {
            NodeKind::Leaf { entries } => entries.retain(|(s, _)| *s != slot),
            NodeKind::Internal { .. } => unreachable!("slots live in leaves"),
        }
        self.condense(leaf);
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
        self.slot_leaf.clear();
    }

    fn visit_point<F: FnMut(usize)>(&self, pt: Point, mut f: F) {
        let Some(root) = self.root else { return };
        // Traversal stacks stay short; avoid per-query heap traffic.
        let mut stack: SmallVec<[usize; 16]> = SmallVec::new();
        stack.push(root);
        while let Some(idx) = stack.pop() {
            let node = self.node(idx);
            if !rect_contains(&node.mbr, pt) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf { entries } => {
                    for (slot, r) in entries {
                        if rect_contains(r, pt) {
                            f(*slot);
                        }
                    }
                }
                NodeKind::Internal { children } => stack.extend_from_slice(children),
            }
        }
    }

    fn visit_rect<F: FnMut(usize)>(&self, rect: Rect, mut f: F) {
        let Some(root) = self.root else { return };
        let mut stack: SmallVec<[usize; 16]> = SmallVec::new();
        stack.push(root);
        while let Some(idx) = stack.pop() {
            let node = self.node(idx);
            if !rects_overlap(&node.mbr, &rect) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf { entries } => {
                    for (slot, r) in entries {
                        if rects_overlap(r, &rect) {
                            f(*slot);
                        }
                    }
                }
                NodeKind::Internal { children } => stack.extend_from_slice(children),
            }
        }
    }
}

/// Splits `entries` in place along the wider center-spread axis, returning
/// the spilled second half.
fn split_by_center<T>(entries: &mut Vec<T>, rect_of: impl Fn(&T) -> Rect) -> Vec<T> {
    let axis_x = spread(entries.iter().map(|e| rect_of(e).center().x))
        >= spread(entries.iter().map(|e| rect_of(e).center().y));
    entries.sort_by(|a, b| {
        let (ca, cb) = if axis_x {
            (rect_of(a).center().x, rect_of(b).center().x)
        } else {
            (rect_of(a).center().y, rect_of(b).center().y)
        };
        ca.total_cmp(&cb)
    });
    let half = entries.len() / 2;
    entries.split_off(half)
}

fn spread(values: impl Iterator<Item = f64>) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if max >= min { max - min } else { 0.0 }
}

fn fold_rects(mut rects: impl Iterator<Item = Rect>) -> Option<Rect> {
    let first = rects.next()?;
    Some(rects.fold(first, |acc, r| acc.union(r)))
}

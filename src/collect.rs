//! Stateless collectors walking the tree to gather payloads against a view
//! frustum or a finite segment

use crate::geom::{ClipStatus, Segment};
use crate::tree::QuadTree;
use glam::Mat4;

/// Collects every payload under `start` whose cell touches the view volume of
/// `view_projection`, into `collected` (cleared first), in visit order: a node
/// before its descendants, children in quadrant order.
///
/// Subtrees classified [ClipStatus::Outside] are pruned without visiting.
/// Subtrees classified [ClipStatus::Inside] are drained without any further
/// clip tests: every descendant box lies within its ancestor's box, so the
/// classification is inherited. Only [ClipStatus::Clipped] nodes pay for the
/// per-child classification, which bounds the work by the number of nodes
/// straddling the frustum boundary plus those fully inside.
pub fn collect_by_frustum<T: Clone>(
    tree: &QuadTree<T>,
    start: usize,
    view_projection: &Mat4,
    collected: &mut Vec<T>,
) {
    collected.clear();
    recurse_by_frustum(tree, start, view_projection, collected);
}

fn recurse_by_frustum<T: Clone>(
    tree: &QuadTree<T>,
    index: usize,
    view_projection: &Mat4,
    collected: &mut Vec<T>,
) {
    let node = tree.get_node_by_index(index);

    match node.get_bbox().clip_status(view_projection) {
        // the whole subtree is beyond some clip plane
        ClipStatus::Outside => {}
        ClipStatus::Inside => recurse_collect_all(tree, index, collected),
        ClipStatus::Clipped => {
            if let Some(element) = node.get_element() {
                collected.push(element.clone());
            }
            if let Some(children) = node.children() {
                for child in children {
                    recurse_by_frustum(tree, child, view_projection, collected);
                }
            }
        }
    }
}

// unconditional drain of a subtree, used once a node is known to be fully inside
fn recurse_collect_all<T: Clone>(tree: &QuadTree<T>, index: usize, collected: &mut Vec<T>) {
    let node = tree.get_node_by_index(index);

    if let Some(element) = node.get_element() {
        collected.push(element.clone());
    }
    if let Some(children) = node.children() {
        for child in children {
            recurse_collect_all(tree, child, collected);
        }
    }
}

/// Collects every payload under `start` whose cell intersects the finite
/// segment `line`, into `collected` (cleared first), in visit order.
///
/// Each node is slab-tested; a miss prunes the subtree since a segment missing
/// a cell cannot hit anything inside it. There is no Inside-style shortcut
/// here: the slab test is cheap and a hit on a cell says nothing cheaper about
/// its descendants.
pub fn collect_by_line_intersect<T: Clone>(
    tree: &QuadTree<T>,
    start: usize,
    line: &Segment,
    collected: &mut Vec<T>,
) {
    collected.clear();
    recurse_line_intersect(tree, start, line, collected);
}

fn recurse_line_intersect<T: Clone>(
    tree: &QuadTree<T>,
    index: usize,
    line: &Segment,
    collected: &mut Vec<T>,
) {
    let node = tree.get_node_by_index(index);

    if !node.get_bbox().test_intersection(line) {
        return;
    }

    if let Some(element) = node.get_element() {
        collected.push(element.clone());
    }
    if let Some(children) = node.children() {
        for child in children {
            recurse_line_intersect(tree, child, line, collected);
        }
    }
}

//! Contains the tree struct, which owns every cell node of the fixed-depth subdivision

use crate::coords::{GridCoord, MAX_TREE_DEPTH};
use crate::geom::Aabb;
use glam::Vec3;
use log::{debug, trace};
use std::num::NonZeroU32;

/// Index of the root node in the tree's node storage.
pub const ROOT_NODE_INDEX: usize = 0;

/// One cell of the subdivision.
///
/// Child links are indices into the owning tree's node storage. A child can
/// never be the root (index 0), so `NonZeroU32` applies for slightly more
/// compact memory. The four links travel as one optional array because
/// children only ever exist as a complete set of four, never partially.
#[derive(Debug, Clone)]
pub struct Node<T> {
    pub(crate) element: Option<T>,
    children: Option<[NonZeroU32; 4]>,
    bbox: Aabb,
    coord: GridCoord,
}

impl<T> Node<T> {
    fn blank() -> Self {
        Self {
            element: None,
            children: None,
            bbox: Aabb::default(),
            coord: GridCoord::root(),
        }
    }

    /// the box of this node's cell: its grid footprint along X and Z, the full
    /// tree extent along Y.
    #[inline]
    pub fn get_bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// the (level, column, row) address of this node's cell.
    #[inline]
    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    /// Stores `element` in this node, returning the previous payload if any.
    #[inline]
    pub fn set_element(&mut self, element: T) -> Option<T> {
        self.element.replace(element)
    }

    /// Removes and returns this node's payload, leaving the slot empty.
    #[inline]
    pub fn take_element(&mut self) -> Option<T> {
        self.element.take()
    }

    #[inline]
    pub fn get_element(&self) -> Option<&T> {
        self.element.as_ref()
    }

    #[inline]
    pub fn get_element_mut(&mut self) -> Option<&mut T> {
        self.element.as_mut()
    }

    /// Storage index of the child in `quadrant` (0..3), or None on a leaf.
    #[inline]
    pub fn get_child_at(&self, quadrant: usize) -> Option<usize> {
        assert!(quadrant < 4, "Child quadrant out of bounds");
        self.children.map(|c| c[quadrant].get() as usize)
    }

    /// Storage indices of all four children, or None on a leaf.
    #[inline]
    pub fn children(&self) -> Option<[usize; 4]> {
        self.children.map(|c| c.map(|i| i.get() as usize))
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.children.is_some()
    }
}

/// Fixed-depth quadtree over a bounded 3-D region.
///
/// Every cell of every level is allocated once in [QuadTree::initialize] into
/// a single flat array addressed by index arithmetic; topology never changes
/// afterwards. Only the payload slots are mutable. Storing payloads and
/// looking nodes up goes through node indices, which stay valid until the
/// next [QuadTree::reset] or re-initialization.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    pub(crate) nodes: Vec<Node<T>>,
    root_bbox: Aabb,
    tree_depth: u8,
    base_node_size: Vec3,
}

impl<T> QuadTree<T> {
    /// creates an uninitialized tree holding no nodes.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root_bbox: Aabb::default(),
            tree_depth: 0,
            base_node_size: Vec3::ZERO,
        }
    }

    /// Builds the complete node set for `depth` levels over `bbox`.
    ///
    /// All nodes are allocated, boxed and linked before this returns; the
    /// recursion depth is bounded by `depth`, not by the node count. Calling
    /// this on an already initialized tree rebuilds it from scratch, dropping
    /// all payloads.
    ///
    /// Panics when `depth` is 0.
    pub fn initialize(&mut self, bbox: Aabb, depth: u8) {
        assert!(depth > 0, "Tree depth must be greater than 0");
        debug_assert!(depth <= MAX_TREE_DEPTH);

        self.tree_depth = depth;
        self.root_bbox = bbox;

        // footprint of a level-(depth-1) cell; all node boxes derive from this
        // one value instead of from repeated halving, so no error accumulates
        let base_dimension = (1u32 << (depth - 1)) as f32;
        let size = bbox.size();
        self.base_node_size = Vec3::new(size.x / base_dimension, size.y, size.z / base_dimension);

        let num_nodes = self.calculate_number_nodes(depth);
        self.nodes.clear();
        self.nodes.resize_with(num_nodes, Node::blank);
        self.init_node(ROOT_NODE_INDEX, GridCoord::root());

        debug!("initialized quadtree: depth {depth}, {num_nodes} nodes");
    }

    // recursive per-node setup: derive the cell box, wire children, descend
    fn init_node(&mut self, index: usize, coord: GridCoord) {
        debug_assert!(index < self.nodes.len());

        let bbox = self.cell_bbox(coord);
        let node = &mut self.nodes[index];
        node.bbox = bbox;
        node.coord = coord;

        if coord.level + 1 < self.tree_depth {
            let mut links = [NonZeroU32::MIN; 4];
            for (quadrant, link) in links.iter_mut().enumerate() {
                let child = coord.child(quadrant);
                let child_index = self.calculate_node_index(child.level, child.col, child.row);
                // children are never the root, the index is always nonzero
                *link = NonZeroU32::new(child_index as u32).unwrap();
                self.init_node(child_index, child);
            }
            self.nodes[index].children = Some(links);
        }
    }

    // box of the cell at `coord`, top-down from the root box and base cell size
    fn cell_bbox(&self, coord: GridCoord) -> Aabb {
        let level_factor = (1u32 << (self.tree_depth - 1 - coord.level)) as f32;
        let col = coord.col as f32;
        let row = coord.row as f32;
        let min = self.root_bbox.min;
        let max = self.root_bbox.max;

        Aabb::new(
            Vec3::new(
                min.x + col * level_factor * self.base_node_size.x,
                min.y,
                min.z + row * level_factor * self.base_node_size.z,
            ),
            Vec3::new(
                min.x + (col + 1.0) * level_factor * self.base_node_size.x,
                max.y,
                min.z + (row + 1.0) * level_factor * self.base_node_size.z,
            ),
        )
    }

    /// Discards all nodes and returns the tree to the uninitialized state.
    /// Node indices handed out earlier are meaningless afterwards.
    pub fn reset(&mut self) {
        trace!("quadtree reset");
        self.nodes.clear();
        self.root_bbox = Aabb::default();
        self.tree_depth = 0;
        self.base_node_size = Vec3::ZERO;
    }

    #[inline]
    pub fn get_root_bbox(&self) -> &Aabb {
        &self.root_bbox
    }

    #[inline]
    pub fn get_tree_depth(&self) -> u8 {
        self.tree_depth
    }

    /// Count of nodes on all levels before `level`, which is also the storage
    /// index at which `level`'s block begins: `(4^level - 1) / 3`.
    #[inline]
    pub fn calculate_number_nodes(&self, level: u8) -> usize {
        debug_assert!(level <= MAX_TREE_DEPTH);
        // 4^n == 1 << 2n
        ((1usize << (2 * level as usize)) - 1) / 3
    }

    /// Flat storage index of the cell at `(level, col, row)`: row-major inside
    /// the level's block, offset past all prior levels. This is the sole
    /// addressing formula; it is bit-exact with the storage sizing in
    /// [QuadTree::initialize].
    ///
    /// Panics when `col` or `row` is out of range for the level.
    #[inline]
    pub fn calculate_node_index(&self, level: u8, col: u16, row: u16) -> usize {
        assert!(
            (col as u32) < (1u32 << level),
            "Column index out of bounds for the level"
        );
        assert!(
            (row as u32) < (1u32 << level),
            "Row index out of bounds for the level"
        );

        self.calculate_number_nodes(level) + ((row as usize) << level) + col as usize
    }

    #[inline]
    pub fn get_number_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_root_node(&self) -> &Node<T> {
        assert!(!self.nodes.is_empty(), "Tree is not initialized");
        &self.nodes[ROOT_NODE_INDEX]
    }

    pub fn get_root_node_mut(&mut self) -> &mut Node<T> {
        assert!(!self.nodes.is_empty(), "Tree is not initialized");
        &mut self.nodes[ROOT_NODE_INDEX]
    }

    /// Panics when `index` is out of bounds; for indices produced by the
    /// tree's own math. Untrusted indices go through [QuadTree::get_node].
    pub fn get_node_by_index(&self, index: usize) -> &Node<T> {
        assert!(index < self.nodes.len(), "Node index out of bounds");
        &self.nodes[index]
    }

    pub fn get_node_by_index_mut(&mut self, index: usize) -> &mut Node<T> {
        assert!(index < self.nodes.len(), "Node index out of bounds");
        &mut self.nodes[index]
    }

    /// checked lookup for indices originating outside the crate's own math.
    #[inline]
    pub fn get_node(&self, index: usize) -> Option<&Node<T>> {
        self.nodes.get(index)
    }

    #[inline]
    pub fn get_node_mut(&mut self, index: usize) -> Option<&mut Node<T>> {
        self.nodes.get_mut(index)
    }

    /// Index of the smallest node anywhere in the tree whose cell fully
    /// contains `bbox`, or None when even the root does not.
    ///
    /// Panics on an uninitialized tree.
    pub fn find_containment_node(&self, bbox: &Aabb) -> Option<usize> {
        assert!(!self.nodes.is_empty(), "Tree is not initialized");
        self.find_containment_node_recursive(ROOT_NODE_INDEX, bbox)
    }

    /// Index of the smallest node under `start` (inclusive) whose cell fully
    /// contains `bbox`, or None when even `start`'s cell does not.
    ///
    /// Containment uses strict-inequality rejection, so a query box touching
    /// a cell boundary still counts as contained; sibling cells are disjoint
    /// and are probed in quadrant order 0..3, first claimant wins.
    pub fn find_containment_node_recursive(&self, start: usize, bbox: &Aabb) -> Option<usize> {
        let node = self.get_node_by_index(start);
        if !node.bbox.contains_aabb(bbox) {
            return None;
        }

        if let Some(children) = node.children() {
            for child_index in children {
                if let Some(found) = self.find_containment_node_recursive(child_index, bbox) {
                    return Some(found);
                }
            }
        }

        // not contained by any child, this node is the smallest fit
        Some(start)
    }
}

impl<T> Default for QuadTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_box() -> Aabb {
        Aabb::new(
            Vec3::new(-100.0, -50.0, -100.0),
            Vec3::new(100.0, 50.0, 100.0),
        )
    }

    fn make_tree(depth: u8) -> QuadTree<i32> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut tree = QuadTree::new();
        tree.initialize(world_box(), depth);
        tree
    }

    #[test]
    fn initialize_with_valid_parameters() {
        let tree = make_tree(2);
        assert_eq!(tree.get_tree_depth(), 2);
        assert_eq!(tree.get_number_nodes(), 5);
        assert_eq!(tree.get_root_bbox(), &world_box());
    }

    #[test]
    #[should_panic(expected = "depth must be greater")]
    fn initialize_with_zero_depth() {
        let mut tree: QuadTree<i32> = QuadTree::new();
        tree.initialize(world_box(), 0);
    }

    #[test]
    fn number_nodes_per_level() {
        let tree = make_tree(3);
        assert_eq!(tree.calculate_number_nodes(0), 0);
        assert_eq!(tree.calculate_number_nodes(1), 1);
        assert_eq!(tree.calculate_number_nodes(2), 5);
        assert_eq!(tree.calculate_number_nodes(3), 21);
        assert_eq!(tree.calculate_number_nodes(4), 85);

        // each level block holds exactly 4^level nodes
        for level in 0..8u8 {
            assert_eq!(
                tree.calculate_number_nodes(level + 1) - tree.calculate_number_nodes(level),
                1 << (2 * level as usize),
                "Level {level} block has wrong size"
            );
        }
    }

    #[test]
    fn node_index_level_one() {
        let tree = make_tree(3);
        assert_eq!(tree.calculate_node_index(0, 0, 0), 0);
        assert_eq!(tree.calculate_node_index(1, 0, 0), 1);
        assert_eq!(tree.calculate_node_index(1, 1, 0), 2);
        assert_eq!(tree.calculate_node_index(1, 0, 1), 3);
        assert_eq!(tree.calculate_node_index(1, 1, 1), 4);
    }

    #[test]
    fn node_indices_distinct_and_fill_level_blocks() {
        let tree = make_tree(4);
        for level in 0..4u8 {
            let cells = 1u16 << level;
            let mut seen: Vec<usize> = Vec::new();
            for row in 0..cells {
                for col in 0..cells {
                    seen.push(tree.calculate_node_index(level, col, row));
                }
            }
            seen.sort_unstable();
            let expected: Vec<usize> = (tree.calculate_number_nodes(level)
                ..tree.calculate_number_nodes(level + 1))
                .collect();
            assert_eq!(seen, expected, "Level {level} indices must fill the block");
        }
    }

    #[test]
    #[should_panic(expected = "Column index out of bounds")]
    fn node_index_column_out_of_bounds() {
        let tree = make_tree(2);
        tree.calculate_node_index(1, 2, 0);
    }

    #[test]
    #[should_panic(expected = "Row index out of bounds")]
    fn node_index_row_out_of_bounds() {
        let tree = make_tree(2);
        tree.calculate_node_index(1, 0, 2);
    }

    #[test]
    #[should_panic(expected = "Node index out of bounds")]
    fn node_lookup_out_of_bounds() {
        let tree = make_tree(2);
        tree.get_node_by_index(tree.get_number_nodes());
    }

    #[test]
    fn checked_node_lookup() {
        let mut tree = make_tree(2);
        assert!(tree.get_node(4).is_some());
        assert!(tree.get_node(5).is_none());
        assert!(tree.get_node_mut(100).is_none());
    }

    #[test]
    fn bbox_roundtrip_from_grid_coord() {
        let tree = make_tree(3);
        let root = world_box();

        for level in 0..3u8 {
            let cells = 1u16 << level;
            let cell_x = root.size().x / cells as f32;
            let cell_z = root.size().z / cells as f32;
            for row in 0..cells {
                for col in 0..cells {
                    let node = tree.get_node_by_index(tree.calculate_node_index(level, col, row));
                    let expected = Aabb::new(
                        Vec3::new(
                            root.min.x + col as f32 * cell_x,
                            root.min.y,
                            root.min.z + row as f32 * cell_z,
                        ),
                        Vec3::new(
                            root.min.x + (col + 1) as f32 * cell_x,
                            root.max.y,
                            root.min.z + (row + 1) as f32 * cell_z,
                        ),
                    );
                    assert_eq!(node.get_bbox(), &expected);
                    assert_eq!(node.coord(), GridCoord::new(level, col, row));
                }
            }
        }
    }

    #[test]
    fn child_linkage() {
        let tree = make_tree(3);

        let root = tree.get_root_node();
        assert!(root.has_children());
        assert_eq!(root.children(), Some([1, 2, 3, 4]));
        assert_eq!(root.get_child_at(2), Some(3));

        // children of the (level 1, col 0, row 0) node by the addressing formula
        assert_eq!(tree.get_node_by_index(1).children(), Some([5, 6, 9, 10]));

        // deepest level nodes are leaves
        let leaf = tree.get_node_by_index(tree.calculate_node_index(2, 3, 3));
        assert!(!leaf.has_children());
        assert_eq!(leaf.get_child_at(0), None);
    }

    #[test]
    fn children_all_or_nothing() {
        let tree = make_tree(4);
        for index in 0..tree.get_number_nodes() {
            let node = tree.get_node_by_index(index);
            let is_leaf = node.coord().level == tree.get_tree_depth() - 1;
            assert_eq!(
                node.has_children(),
                !is_leaf,
                "Node {index} children must match its level"
            );
            match node.children() {
                Some(c) => assert!(c.iter().all(|&i| i < tree.get_number_nodes())),
                None => assert!(is_leaf),
            }
        }
    }

    #[test]
    #[should_panic(expected = "Child quadrant out of bounds")]
    fn child_quadrant_out_of_bounds() {
        let tree = make_tree(2);
        tree.get_root_node().get_child_at(4);
    }

    #[test]
    fn containment_straddling_box_stays_at_root() {
        let tree = make_tree(2);
        let straddling = Aabb::new(Vec3::new(-10.0, -10.0, -10.0), Vec3::new(10.0, 10.0, 10.0));
        assert_eq!(
            tree.find_containment_node(&straddling),
            Some(ROOT_NODE_INDEX)
        );
    }

    #[test]
    fn containment_quadrant_box_goes_to_leaf() {
        let tree = make_tree(2);
        let in_quadrant = Aabb::new(Vec3::new(5.0, -5.0, 5.0), Vec3::new(15.0, 5.0, 15.0));
        // +X/+Z quadrant is (col 1, row 1) of level 1
        assert_eq!(
            tree.find_containment_node(&in_quadrant),
            Some(tree.calculate_node_index(1, 1, 1))
        );
    }

    #[test]
    fn containment_outside_is_none() {
        let tree = make_tree(2);
        let outside = Aabb::new(Vec3::new(190.0, 0.0, 0.0), Vec3::new(210.0, 10.0, 10.0));
        assert_eq!(tree.find_containment_node(&outside), None);
    }

    #[test]
    fn containment_boundary_touching_box() {
        let tree = make_tree(2);
        // exactly the (col 0, row 0) child cell: boundary contact still counts
        // as contained, and the child claims it before the root does
        let cell = Aabb::new(Vec3::new(-100.0, -50.0, -100.0), Vec3::new(0.0, 50.0, 0.0));
        assert_eq!(tree.find_containment_node(&cell), Some(1));
    }

    #[test]
    fn containment_search_from_inner_node() {
        let tree = make_tree(3);
        let in_quadrant = Aabb::new(Vec3::new(55.0, 0.0, 55.0), Vec3::new(95.0, 10.0, 95.0));
        let leaf = tree.calculate_node_index(2, 3, 3);
        assert_eq!(tree.find_containment_node(&in_quadrant), Some(leaf));

        // same search started below the root
        let inner = tree.calculate_node_index(1, 1, 1);
        assert_eq!(
            tree.find_containment_node_recursive(inner, &in_quadrant),
            Some(leaf)
        );
        // a subtree that cannot contain the box reports nothing
        assert_eq!(tree.find_containment_node_recursive(1, &in_quadrant), None);
    }

    #[test]
    #[should_panic(expected = "not initialized")]
    fn containment_on_uninitialized_tree() {
        let tree: QuadTree<i32> = QuadTree::new();
        tree.find_containment_node(&world_box());
    }

    #[test]
    fn element_access() {
        let mut tree = make_tree(2);

        assert_eq!(tree.get_root_node().get_element(), None);
        assert_eq!(tree.get_root_node_mut().set_element(42), None);
        assert_eq!(tree.get_root_node().get_element(), Some(&42));

        // overwrite hands back the previous payload
        assert_eq!(tree.get_root_node_mut().set_element(7), Some(42));
        assert_eq!(tree.get_root_node_mut().take_element(), Some(7));
        assert_eq!(tree.get_root_node().get_element(), None);
    }

    #[test]
    fn element_struct_payload() {
        #[derive(Debug, Clone, PartialEq)]
        struct Payload {
            value_one: i32,
            value_two: f64,
        }

        let _ = env_logger::builder().is_test(true).try_init();
        let mut tree: QuadTree<Payload> = QuadTree::new();
        tree.initialize(world_box(), 2);

        let payload = Payload {
            value_one: 1,
            value_two: 2.0,
        };
        tree.get_root_node_mut().set_element(payload.clone());
        assert_eq!(tree.get_root_node().get_element(), Some(&payload));
    }

    #[test]
    fn reset_clears_everything() {
        let mut tree = make_tree(3);
        assert_eq!(tree.get_number_nodes(), 21);

        tree.reset();
        assert_eq!(tree.get_tree_depth(), 0);
        assert_eq!(tree.get_number_nodes(), 0);
        assert_eq!(tree.get_root_bbox(), &Aabb::default());
    }

    #[test]
    fn reinitialize_overwrites_state() {
        let mut tree = make_tree(2);
        tree.get_node_by_index_mut(3).set_element(11);

        let new_box = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(64.0, 8.0, 64.0));
        tree.initialize(new_box, 3);

        assert_eq!(tree.get_tree_depth(), 3);
        assert_eq!(tree.get_number_nodes(), 21);
        assert_eq!(tree.get_root_bbox(), &new_box);
        // payloads do not survive a rebuild
        for index in 0..tree.get_number_nodes() {
            assert_eq!(tree.get_node_by_index(index).get_element(), None);
        }
    }

    #[test]
    fn single_level_tree() {
        let tree = make_tree(1);
        assert_eq!(tree.get_number_nodes(), 1);
        assert!(!tree.get_root_node().has_children());

        let small = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(tree.find_containment_node(&small), Some(ROOT_NODE_INDEX));
    }
}

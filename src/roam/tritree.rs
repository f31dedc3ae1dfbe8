// ----------------------------------------------------------------------------
// Binary triangle tree nodes and the per frame node pool.
//
// Nodes carry topology only: two children and three neighbors. Geometry is
// implicit and reconstructed during traversal from the corner coordinates of
// the root triangles.
//
//              apex
//               /\
//     left     /  \    right
//   neighbor  /    \  neighbor
//            /      \
//      left  --------  right
//           base neighbor
//
// The base neighbor shares the hypotenuse. If its base neighbor points back
// both triangles form a "diamond" and have to be split together.
//
// All nodes live in one pool indexed by NodeId. The first slots are reserved
// for the two root triangles of every patch, the remaining slots are handed
// out by a bump index which is reset every frame.
// ----------------------------------------------------------------------------
use crate::error::LandscapeError;
// ----------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
// ----------------------------------------------------------------------------
/// Pool index plus generation. Becomes invalid with the next pool reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    id: NodeId,
    generation: u32,
}
// ----------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriTreeNode {
    pub(super) left_child: NodeId,
    pub(super) right_child: NodeId,
    pub(super) base_neighbor: NodeId,
    pub(super) left_neighbor: NodeId,
    pub(super) right_neighbor: NodeId,
}
// ----------------------------------------------------------------------------
pub struct TriNodePool {
    nodes: Vec<TriTreeNode>,
    /// slots [0..reserved) are patch roots and survive resets
    reserved: usize,
    next: usize,
    generation: u32,
    exhausted: bool,
}
// ----------------------------------------------------------------------------
impl NodeId {
    // ------------------------------------------------------------------------
    pub const NONE: NodeId = NodeId(u32::MAX);
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn is_some(self) -> bool {
        self != Self::NONE
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn get(self) -> Option<NodeId> {
        if self.is_some() {
            Some(self)
        } else {
            None
        }
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl NodeRef {
    // ------------------------------------------------------------------------
    pub fn id(&self) -> NodeId {
        self.id
    }
    // ------------------------------------------------------------------------
    pub fn generation(&self) -> u32 {
        self.generation
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl TriTreeNode {
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        // all non-leaf nodes have both children, so just check for one
        self.left_child.is_none()
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn is_branch(&self) -> bool {
        self.left_child.is_some()
    }
    // ------------------------------------------------------------------------
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        if self.is_branch() {
            Some((self.left_child, self.right_child))
        } else {
            None
        }
    }
    // ------------------------------------------------------------------------
    pub fn left_child(&self) -> Option<NodeId> {
        self.left_child.get()
    }
    // ------------------------------------------------------------------------
    pub fn right_child(&self) -> Option<NodeId> {
        self.right_child.get()
    }
    // ------------------------------------------------------------------------
    pub fn base_neighbor(&self) -> Option<NodeId> {
        self.base_neighbor.get()
    }
    // ------------------------------------------------------------------------
    pub fn left_neighbor(&self) -> Option<NodeId> {
        self.left_neighbor.get()
    }
    // ------------------------------------------------------------------------
    pub fn right_neighbor(&self) -> Option<NodeId> {
        self.right_neighbor.get()
    }
    // ------------------------------------------------------------------------
    /// redirects whichever neighbor slot points to `old` to `new`. returns
    /// false if none of the slots referenced `old`.
    #[inline(always)]
    pub(super) fn replace_neighbor(&mut self, old: NodeId, new: NodeId) -> bool {
        if self.base_neighbor == old {
            self.base_neighbor = new;
        } else if self.left_neighbor == old {
            self.left_neighbor = new;
        } else if self.right_neighbor == old {
            self.right_neighbor = new;
        } else {
            return false;
        }
        true
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl TriNodePool {
    // ------------------------------------------------------------------------
    /// `reserved` root slots followed by `budget` slots for split children.
    pub fn new(reserved: usize, budget: usize) -> Result<Self, LandscapeError> {
        let total = reserved + budget;
        // u32::MAX is the NONE sentinel
        if total >= u32::MAX as usize {
            return Err(LandscapeError::NodeIndexOverflow(total));
        }
        Ok(Self {
            nodes: vec![TriTreeNode::default(); total],
            reserved,
            next: reserved,
            generation: 0,
            exhausted: false,
        })
    }
    // ------------------------------------------------------------------------
    /// slot of a reserved (root) node
    #[inline(always)]
    pub fn reserved_node(&self, slot: usize) -> NodeId {
        debug_assert!(slot < self.reserved);
        NodeId(slot as u32)
    }
    // ------------------------------------------------------------------------
    /// nodes handed out since last reset (roots excluded)
    #[inline(always)]
    pub fn allocated(&self) -> usize {
        self.next - self.reserved
    }
    // ------------------------------------------------------------------------
    /// number of nodes available for allocation per frame
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.nodes.len() - self.reserved
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn available(&self) -> usize {
        self.nodes.len() - self.next
    }
    // ------------------------------------------------------------------------
    /// true if any allocation failed since last reset
    #[inline(always)]
    pub fn run_out_of_nodes(&self) -> bool {
        self.exhausted
    }
    // ------------------------------------------------------------------------
    pub fn generation(&self) -> u32 {
        self.generation
    }
    // ------------------------------------------------------------------------
    /// If we've run out of nodes, just return None (this is handled
    /// gracefully)
    pub fn allocate(&mut self) -> Option<NodeId> {
        if self.next >= self.nodes.len() {
            self.exhausted = true;
            return None;
        }
        let id = NodeId(self.next as u32);
        self.nodes[self.next] = TriTreeNode::default();
        self.next += 1;
        Some(id)
    }
    // ------------------------------------------------------------------------
    /// allocates both children of a split or nothing
    pub fn allocate_pair(&mut self) -> Option<(NodeId, NodeId)> {
        if !self.reserve(2) {
            return None;
        }
        Some((self.allocate()?, self.allocate()?))
    }
    // ------------------------------------------------------------------------
    /// checks if count nodes are available. marks pool as exhausted if not.
    pub fn reserve(&mut self, count: usize) -> bool {
        if self.available() < count {
            self.exhausted = true;
            false
        } else {
            true
        }
    }
    // ------------------------------------------------------------------------
    /// Invalidates all allocated nodes at once. Root slots keep their content
    /// until the patches reinitialize them.
    pub fn reset_all(&mut self) {
        self.next = self.reserved;
        self.exhausted = false;
        self.generation = self.generation.wrapping_add(1);
    }
    // ------------------------------------------------------------------------
    /// Changes the per frame budget. Must only be called directly after a
    /// reset as it invalidates all allocated nodes.
    pub fn grow(&mut self, budget: usize) -> Result<(), LandscapeError> {
        let total = self.reserved + budget;
        if total >= u32::MAX as usize {
            return Err(LandscapeError::NodeIndexOverflow(total));
        }
        self.nodes.resize(total, TriTreeNode::default());
        self.reset_all();
        Ok(())
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn node(&self, id: NodeId) -> &TriTreeNode {
        &self.nodes[id.index()]
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub(super) fn node_mut(&mut self, id: NodeId) -> &mut TriTreeNode {
        &mut self.nodes[id.index()]
    }
    // ------------------------------------------------------------------------
    /// true if id is a root slot or was allocated in the current frame
    #[inline(always)]
    pub fn is_live(&self, id: NodeId) -> bool {
        id.is_some() && id.index() < self.next
    }
    // ------------------------------------------------------------------------
    /// all root slots and nodes allocated since last reset
    pub fn live_nodes(&self) -> impl Iterator<Item = (NodeId, &TriTreeNode)> + '_ {
        self.nodes[..self.next]
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u32), node))
    }
    // ------------------------------------------------------------------------
    pub fn frame_ref(&self, id: NodeId) -> NodeRef {
        NodeRef {
            id,
            generation: self.generation,
        }
    }
    // ------------------------------------------------------------------------
    /// resolves a handle taken in an earlier frame. returns None for stale
    /// handles.
    pub fn get(&self, node: NodeRef) -> Option<&TriTreeNode> {
        if node.generation == self.generation && self.is_live(node.id) {
            Some(self.node(node.id))
        } else {
            None
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl Default for TriTreeNode {
    fn default() -> Self {
        Self {
            left_child: NodeId::NONE,
            right_child: NodeId::NONE,
            base_neighbor: NodeId::NONE,
            left_neighbor: NodeId::NONE,
            right_neighbor: NodeId::NONE,
        }
    }
}
// ----------------------------------------------------------------------------

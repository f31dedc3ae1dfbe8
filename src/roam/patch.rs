// ----------------------------------------------------------------------------
use bevy::math::{uvec2, vec3, UVec2, Vec3};
use bitflags::bitflags;

use crate::config::LodSettings;
use crate::heightmap::{HeightMapRect, HeightMapView, TerrainHeightMap};

use super::tritree::{NodeId, TriNodePool};
use super::variance::{hypotenuse_center, hypotenuse_span, ShorelineRule, VarianceTree};
use super::TerrainTriangle;
// ----------------------------------------------------------------------------
bitflags! {
    pub struct PatchFlags: u8 {
        /// set externally by frustum culling
        const VISIBLE = 0b01;
        /// heightmap changed, variance is stale
        const DIRTY = 0b10;
    }
}
// ----------------------------------------------------------------------------
/// Square tile of the heightmap with two root triangles:
///
/// ```text
///      (0,0)       (S,0)
///        +-----------+
///        |         / |
///        |  base  /  |
///        |  left /   |
///        |      /    |
///        |     /     |
///        |    / base |
///        |   / right |
///        |  /        |
///        +-----------+
///      (0,S)       (S,S)
/// ```
///
/// Both roots share the diagonal as hypotenuse and form a diamond.
pub struct Patch {
    grid_pos: UVec2,
    /// origin in heightmap cells
    origin: UVec2,
    size: u32,
    base_left: NodeId,
    base_right: NodeId,
    variance_left: VarianceTree,
    variance_right: VarianceTree,
    flags: PatchFlags,
    min_height: f32,
    max_height: f32,
}
// ----------------------------------------------------------------------------
/// Map adjacent patches. None at map edges.
#[derive(Default, Clone, Copy)]
pub struct PatchNeighbors<'a> {
    pub left: Option<&'a Patch>,
    pub right: Option<&'a Patch>,
    pub top: Option<&'a Patch>,
    pub bottom: Option<&'a Patch>,
}
// ----------------------------------------------------------------------------
/// Splits a leaf triangle while keeping the diamond rule intact:
///
/// - the base neighbor is force split first if it is coarser
/// - both halves of the diamond are split together
///
/// Returns false if the triangle stays a leaf because the node pool is
/// exhausted. In that case no link was modified so the mesh is still crack
/// free.
pub fn split(pool: &mut TriNodePool, tri: NodeId) -> bool {
    if pool.node(tri).is_branch() {
        return true;
    }

    let mut base = pool.node(tri).base_neighbor;
    if base.is_some() && pool.node(base).base_neighbor != tri {
        split(pool, base);
        // a successful split of the base relinked this triangle to one of its
        // children
        base = pool.node(tri).base_neighbor;
        if base.is_some() && pool.node(base).base_neighbor != tri {
            return false;
        }
    }

    // both halves of the diamond or nothing at all
    let required = if base.is_some() && pool.node(base).is_leaf() {
        4
    } else {
        2
    };
    if !pool.reserve(required) {
        return false;
    }
    let (left_child, right_child) = match pool.allocate_pair() {
        Some(children) => children,
        None => return false,
    };

    let TriTreeLinks {
        left_neighbor,
        right_neighbor,
    } = TriTreeLinks::of(pool, tri);

    {
        let node = pool.node_mut(tri);
        node.left_child = left_child;
        node.right_child = right_child;
    }
    {
        let lc = pool.node_mut(left_child);
        lc.base_neighbor = left_neighbor;
        lc.left_neighbor = right_child;
    }
    {
        let rc = pool.node_mut(right_child);
        rc.base_neighbor = right_neighbor;
        rc.right_neighbor = left_child;
    }

    // coarser neighbors do not reference tri so there's nothing to relink
    if left_neighbor.is_some() {
        pool.node_mut(left_neighbor)
            .replace_neighbor(tri, left_child);
    }
    if right_neighbor.is_some() {
        pool.node_mut(right_neighbor)
            .replace_neighbor(tri, right_child);
    }

    if base.is_some() {
        if let Some((base_left, base_right)) = pool.node(base).children() {
            // other half of the diamond is already split: cross link children
            pool.node_mut(base_left).right_neighbor = right_child;
            pool.node_mut(base_right).left_neighbor = left_child;
            pool.node_mut(left_child).right_neighbor = base_right;
            pool.node_mut(right_child).left_neighbor = base_left;
        } else {
            // nodes are reserved -> cannot fail
            split(pool, base);
        }
    }
    true
}
// ----------------------------------------------------------------------------
struct TriTreeLinks {
    left_neighbor: NodeId,
    right_neighbor: NodeId,
}
// ----------------------------------------------------------------------------
impl TriTreeLinks {
    #[inline(always)]
    fn of(pool: &TriNodePool, tri: NodeId) -> Self {
        let node = pool.node(tri);
        Self {
            left_neighbor: node.left_neighbor,
            right_neighbor: node.right_neighbor,
        }
    }
}
// ----------------------------------------------------------------------------
impl Patch {
    // ------------------------------------------------------------------------
    /// Places the patch. Variance is not computed, the patch starts dirty.
    /// Patch size must be a power of two >= 4 (validated by the landscape).
    pub(super) fn new(
        grid_pos: UVec2,
        world_x: u32,
        world_z: u32,
        patch_size: u32,
        roots: (NodeId, NodeId),
    ) -> Self {
        Self {
            grid_pos,
            origin: uvec2(world_x, world_z),
            size: patch_size,
            base_left: roots.0,
            base_right: roots.1,
            variance_left: VarianceTree::new(patch_size),
            variance_right: VarianceTree::new(patch_size),
            flags: PatchFlags::VISIBLE | PatchFlags::DIRTY,
            min_height: 0.0,
            max_height: 0.0,
        }
    }
    // ------------------------------------------------------------------------
    pub fn view<'heightmap>(&self, heightmap: &'heightmap TerrainHeightMap) -> HeightMapView<'heightmap> {
        HeightMapView::new(self.origin, heightmap)
    }
    // ------------------------------------------------------------------------
    /// Recomputes both variance trees and the height range from the current
    /// heightmap. Clears the dirty flag.
    pub fn compute_variance(&mut self, view: &HeightMapView, shoreline: ShorelineRule) {
        let variance = PatchVariance::compute(view, self.size, shoreline);
        self.apply_variance(variance);
    }
    // ------------------------------------------------------------------------
    pub(super) fn apply_variance(&mut self, variance: PatchVariance) {
        self.variance_left = variance.left;
        self.variance_right = variance.right;
        self.min_height = variance.min_height;
        self.max_height = variance.max_height;

        self.flags.remove(PatchFlags::DIRTY);
    }
    // ------------------------------------------------------------------------
    /// Collapses both trees to the unsplit roots and links them to each other
    /// and to the roots of the adjacent patches. Must be called after the
    /// node pool was reset.
    pub fn reset(&self, pool: &mut TriNodePool, neighbors: PatchNeighbors) {
        let base_left = pool.node_mut(self.base_left);
        *base_left = Default::default();
        base_left.base_neighbor = self.base_right;
        base_left.left_neighbor = neighbors.left.map_or(NodeId::NONE, |p| p.base_right);
        base_left.right_neighbor = neighbors.top.map_or(NodeId::NONE, |p| p.base_right);

        let base_right = pool.node_mut(self.base_right);
        *base_right = Default::default();
        base_right.base_neighbor = self.base_left;
        base_right.left_neighbor = neighbors.right.map_or(NodeId::NONE, |p| p.base_left);
        base_right.right_neighbor = neighbors.bottom.map_or(NodeId::NONE, |p| p.base_left);
    }
    // ------------------------------------------------------------------------
    /// Refines both trees for the given camera position. Returns false if the
    /// node pool ran out of nodes.
    pub fn tessellate(
        &self,
        pool: &mut TriNodePool,
        camera: Vec3,
        view_radius: f32,
        lod: &LodSettings,
    ) -> bool {
        let distance = (self.center(lod.square_size).distance(camera) * lod.distance_scale
            / view_radius.max(f32::EPSILON))
        .max(1.0);

        let mut tessellator = Tessellator {
            pool,
            variance: &self.variance_left,
            variance_limit: view_radius * lod.variance_limit_factor,
            detail: self.size as f32 / distance,
        };

        let (left, right, apex) = base_left_corners(self.size);
        tessellator.recurse(self.base_left, left, right, apex, 1);

        tessellator.variance = &self.variance_right;
        let (left, right, apex) = base_right_corners(self.size);
        tessellator.recurse(self.base_right, left, right, apex, 1);

        !tessellator.pool.run_out_of_nodes()
    }
    // ------------------------------------------------------------------------
    /// Emits one world space triangle per leaf (or node at max_depth) in
    /// pre-order. Heights are sampled from the heightmap on the fly. Returns
    /// number of emitted triangles.
    pub fn render<F: FnMut(TerrainTriangle)>(
        &self,
        pool: &TriNodePool,
        view: &HeightMapView,
        square_size: f32,
        max_depth: u8,
        emit: &mut F,
    ) -> usize {
        let mut count = 0;
        self.for_each_leaf(pool, max_depth, |_, apex, left, right| {
            emit(TerrainTriangle {
                apex: view.world_position(apex, square_size),
                left: view.world_position(left, square_size),
                right: view.world_position(right, square_size),
            });
            count += 1;
        });
        count
    }
    // ------------------------------------------------------------------------
    /// Pre-order walk of both trees calling `f(node, apex, left, right)` with
    /// patch local corners for every leaf. Nodes at max_depth are treated as
    /// leaves.
    pub fn for_each_leaf<F: FnMut(NodeId, UVec2, UVec2, UVec2)>(
        &self,
        pool: &TriNodePool,
        max_depth: u8,
        mut f: F,
    ) {
        let (left, right, apex) = base_left_corners(self.size);
        visit_leaves(pool, self.base_left, left, right, apex, 0, max_depth, &mut f);

        let (left, right, apex) = base_right_corners(self.size);
        visit_leaves(pool, self.base_right, left, right, apex, 0, max_depth, &mut f);
    }
    // ------------------------------------------------------------------------
    /// number of leaf triangles
    pub fn triangle_count(&self, pool: &TriNodePool) -> usize {
        let mut count = 0;
        self.for_each_leaf(pool, u8::MAX, |_, _, _, _| count += 1);
        count
    }
    // ------------------------------------------------------------------------
    /// depth of the deepest leaf (unsplit roots have depth 0)
    pub fn max_depth(&self, pool: &TriNodePool) -> u8 {
        tree_depth(pool, self.base_left).max(tree_depth(pool, self.base_right))
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
// queries
// ----------------------------------------------------------------------------
impl Patch {
    // ------------------------------------------------------------------------
    pub fn grid_pos(&self) -> UVec2 {
        self.grid_pos
    }
    // ------------------------------------------------------------------------
    /// origin in heightmap cells
    pub fn world_origin(&self) -> UVec2 {
        self.origin
    }
    // ------------------------------------------------------------------------
    pub fn size(&self) -> u32 {
        self.size
    }
    // ------------------------------------------------------------------------
    /// covered heightmap corners (shared edges included)
    pub fn rect(&self) -> HeightMapRect {
        let end = self.origin + uvec2(self.size, self.size);
        HeightMapRect::new(self.origin.x, self.origin.y, end.x, end.y)
    }
    // ------------------------------------------------------------------------
    pub fn base_left(&self) -> NodeId {
        self.base_left
    }
    // ------------------------------------------------------------------------
    pub fn base_right(&self) -> NodeId {
        self.base_right
    }
    // ------------------------------------------------------------------------
    pub fn variance_left(&self) -> &VarianceTree {
        &self.variance_left
    }
    // ------------------------------------------------------------------------
    pub fn variance_right(&self) -> &VarianceTree {
        &self.variance_right
    }
    // ------------------------------------------------------------------------
    pub fn min_height(&self) -> f32 {
        self.min_height
    }
    // ------------------------------------------------------------------------
    pub fn max_height(&self) -> f32 {
        self.max_height
    }
    // ------------------------------------------------------------------------
    /// world space center: horizontal center of the patch at mid height
    pub fn center(&self, square_size: f32) -> Vec3 {
        let half = self.size as f32 * 0.5;
        vec3(
            (self.origin.x as f32 + half) * square_size,
            (self.min_height + self.max_height) * 0.5,
            (self.origin.y as f32 + half) * square_size,
        )
    }
    // ------------------------------------------------------------------------
    /// world space bounding box (min, max)
    pub fn bounds(&self, square_size: f32) -> (Vec3, Vec3) {
        let end = self.origin + uvec2(self.size, self.size);
        (
            vec3(
                self.origin.x as f32 * square_size,
                self.min_height,
                self.origin.y as f32 * square_size,
            ),
            vec3(
                end.x as f32 * square_size,
                self.max_height,
                end.y as f32 * square_size,
            ),
        )
    }
    // ------------------------------------------------------------------------
    pub fn flags(&self) -> PatchFlags {
        self.flags
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn is_visible(&self) -> bool {
        self.flags.contains(PatchFlags::VISIBLE)
    }
    // ------------------------------------------------------------------------
    /// returns true if visibility changed
    pub fn set_visible(&mut self, visible: bool) -> bool {
        let changed = self.is_visible() != visible;
        self.flags.set(PatchFlags::VISIBLE, visible);
        changed
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(PatchFlags::DIRTY)
    }
    // ------------------------------------------------------------------------
    pub fn mark_dirty(&mut self) {
        self.flags.insert(PatchFlags::DIRTY);
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
/// Variance trees and height range of a patch computed independently from the
/// patch itself so it can be generated on a task pool.
pub(super) struct PatchVariance {
    left: VarianceTree,
    right: VarianceTree,
    min_height: f32,
    max_height: f32,
}
// ----------------------------------------------------------------------------
impl PatchVariance {
    // ------------------------------------------------------------------------
    pub(super) fn compute(view: &HeightMapView, patch_size: u32, shoreline: ShorelineRule) -> Self {
        let mut left = VarianceTree::new(patch_size);
        let (l, r, a) = base_left_corners(patch_size);
        left.compute(view, shoreline, l, r, a);

        let mut right = VarianceTree::new(patch_size);
        let (l, r, a) = base_right_corners(patch_size);
        right.compute(view, shoreline, l, r, a);

        let (min_height, max_height) = view.min_max(patch_size);
        Self {
            left,
            right,
            min_height,
            max_height,
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
// internal helper
// ----------------------------------------------------------------------------
/// patch local corners of the base left root as (left, right, apex)
#[inline(always)]
fn base_left_corners(size: u32) -> (UVec2, UVec2, UVec2) {
    (uvec2(0, size), uvec2(size, 0), uvec2(0, 0))
}
// ----------------------------------------------------------------------------
#[inline(always)]
fn base_right_corners(size: u32) -> (UVec2, UVec2, UVec2) {
    (uvec2(size, 0), uvec2(0, size), uvec2(size, size))
}
// ----------------------------------------------------------------------------
struct Tessellator<'a> {
    pool: &'a mut TriNodePool,
    variance: &'a VarianceTree,
    variance_limit: f32,
    /// patch size / distance
    detail: f32,
}
// ----------------------------------------------------------------------------
impl<'a> Tessellator<'a> {
    // ------------------------------------------------------------------------
    fn recurse(&mut self, tri: NodeId, left: UVec2, right: UVec2, apex: UVec2, node: usize) {
        // minimum granularity: the center would not be a heightmap corner
        if hypotenuse_span(left, right) < 2 {
            return;
        }

        let refine = match self.variance.get(node) {
            Some(variance) => variance.min(self.variance_limit) * self.detail > 1.0,
            // below variance granularity: only reached because the parent was
            // rough enough so go down to full resolution
            None => true,
        };

        if refine {
            split(self.pool, tri);

            // split may have failed
            if let Some((left_child, right_child)) = self.pool.node(tri).children() {
                let center = hypotenuse_center(left, right);
                self.recurse(left_child, apex, left, center, node << 1);
                self.recurse(right_child, right, apex, center, (node << 1) | 1);
            }
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
#[allow(clippy::too_many_arguments)]
fn visit_leaves<F: FnMut(NodeId, UVec2, UVec2, UVec2)>(
    pool: &TriNodePool,
    tri: NodeId,
    left: UVec2,
    right: UVec2,
    apex: UVec2,
    depth: u8,
    max_depth: u8,
    f: &mut F,
) {
    match pool.node(tri).children() {
        Some((left_child, right_child)) if depth < max_depth => {
            let center = hypotenuse_center(left, right);
            visit_leaves(pool, left_child, apex, left, center, depth + 1, max_depth, f);
            visit_leaves(pool, right_child, right, apex, center, depth + 1, max_depth, f);
        }
        _ => f(tri, apex, left, right),
    }
}
// ----------------------------------------------------------------------------
fn tree_depth(pool: &TriNodePool, tri: NodeId) -> u8 {
    match pool.node(tri).children() {
        Some((left, right)) => 1 + tree_depth(pool, left).max(tree_depth(pool, right)),
        None => 0,
    }
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LandscapeConfig;

    const SHORELINE: ShorelineRule = ShorelineRule {
        scale: 1.5,
        floor: 20.0,
    };

    fn single_patch(size: u32, budget: usize) -> (TriNodePool, Patch) {
        let pool = TriNodePool::new(2, budget).unwrap();
        let roots = (pool.reserved_node(0), pool.reserved_node(1));
        let patch = Patch::new(UVec2::ZERO, 0, 0, size, roots);
        (pool, patch)
    }

    fn assert_diamonds(pool: &TriNodePool) {
        for (id, node) in pool.live_nodes() {
            if let Some(base) = node.base_neighbor() {
                assert_eq!(
                    node.is_branch(),
                    pool.node(base).is_branch(),
                    "{:?} split state differs from base {:?}",
                    id,
                    base
                );
            }
        }
    }

    #[test]
    fn reset_links_roots_as_diamond() {
        let (mut pool, patch) = single_patch(16, 64);
        patch.reset(&mut pool, PatchNeighbors::default());

        let left = pool.node(patch.base_left());
        let right = pool.node(patch.base_right());
        assert_eq!(left.base_neighbor(), Some(patch.base_right()));
        assert_eq!(right.base_neighbor(), Some(patch.base_left()));
        assert_eq!(left.left_neighbor(), None);
        assert_eq!(right.right_neighbor(), None);
        assert!(left.is_leaf() && right.is_leaf());
    }

    #[test]
    fn split_takes_diamond_partner_along() {
        let (mut pool, patch) = single_patch(16, 64);
        patch.reset(&mut pool, PatchNeighbors::default());

        assert!(split(&mut pool, patch.base_left()));
        assert!(pool.node(patch.base_right()).is_branch());
        assert_eq!(pool.allocated(), 4);
        assert_eq!(patch.triangle_count(&pool), 4);
        assert_diamonds(&pool);

        // left child of base left lies on the map edge
        let (lc, rc) = pool.node(patch.base_left()).children().unwrap();
        assert_eq!(pool.node(lc).base_neighbor(), None);
        assert_eq!(pool.node(rc).base_neighbor(), None);
    }

    #[test]
    fn forced_split_of_coarser_base() {
        let (mut pool, patch) = single_patch(16, 64);
        patch.reset(&mut pool, PatchNeighbors::default());
        split(&mut pool, patch.base_left());

        // grandchild whose base is the (unsplit) right child of base right
        let (_, rc) = pool.node(patch.base_left()).children().unwrap();
        let (rc_lc, _) = {
            split(&mut pool, rc);
            pool.node(rc).children().unwrap()
        };
        assert!(split(&mut pool, rc_lc));
        assert_diamonds(&pool);
        assert!(patch.max_depth(&pool) >= 3);
    }

    #[test]
    fn exhausted_pool_keeps_mesh_consistent() {
        // roots + 4 nodes: first diamond split only
        let (mut pool, patch) = single_patch(16, 5);
        patch.reset(&mut pool, PatchNeighbors::default());

        assert!(split(&mut pool, patch.base_left()));
        let (lc, _) = pool.node(patch.base_left()).children().unwrap();
        assert!(!split(&mut pool, lc));
        assert!(pool.run_out_of_nodes());
        assert!(pool.node(lc).is_leaf());
        assert_eq!(pool.allocated(), 4);
        assert_diamonds(&pool);
    }

    #[test]
    fn flat_patch_is_not_refined() {
        let map = TerrainHeightMap::flat(16, 16, 50.0);
        let (mut pool, mut patch) = single_patch(16, 1024);
        patch.compute_variance(&patch.view(&map), SHORELINE);
        patch.reset(&mut pool, PatchNeighbors::default());

        let lod = LandscapeConfig::small_maps().lod_settings();
        assert!(patch.tessellate(&mut pool, vec3(64.0, 60.0, 64.0), 100.0, &lod));
        assert_eq!(patch.triangle_count(&pool), 2);
        assert!(!patch.is_dirty());
        assert_eq!((patch.min_height(), patch.max_height()), (50.0, 50.0));
    }

    #[test]
    fn rough_patch_reaches_full_resolution_near_camera() {
        // strictly convex: no hypotenuse center is ever interpolated exactly
        let map = TerrainHeightMap::from_fn(8, 8, |x, z| (x * x + z * z) as f32);
        let (mut pool, mut patch) = single_patch(8, 1024);
        patch.compute_variance(&patch.view(&map), SHORELINE);
        patch.reset(&mut pool, PatchNeighbors::default());

        let lod = LandscapeConfig::small_maps().lod_settings();
        let camera = patch.center(lod.square_size);
        assert!(patch.tessellate(&mut pool, camera, 1000.0, &lod));

        // 8x8 cells, 2 triangles per cell at full resolution
        assert_eq!(patch.triangle_count(&pool), 128);
        assert_diamonds(&pool);
    }

    #[test]
    fn render_emits_world_space_leaves_in_fixed_order() {
        let map = TerrainHeightMap::from_fn(4, 4, |x, _| x as f32);
        let (mut pool, patch) = single_patch(4, 64);
        patch.reset(&mut pool, PatchNeighbors::default());

        let view = patch.view(&map);
        let mut triangles = Vec::new();
        let count = patch.render(&pool, &view, 2.0, 32, &mut |t| triangles.push(t));

        assert_eq!(count, 2);
        assert_eq!(triangles[0].apex, vec3(0.0, 0.0, 0.0));
        assert_eq!(triangles[0].left, vec3(0.0, 0.0, 8.0));
        assert_eq!(triangles[0].right, vec3(8.0, 4.0, 0.0));
        assert_eq!(triangles[1].apex, vec3(8.0, 4.0, 8.0));
    }

    #[test]
    fn render_depth_is_bounded() {
        let (mut pool, patch) = single_patch(16, 64);
        patch.reset(&mut pool, PatchNeighbors::default());
        split(&mut pool, patch.base_left());
        let (lc, _) = pool.node(patch.base_left()).children().unwrap();
        split(&mut pool, lc);

        let map = TerrainHeightMap::flat(16, 16, 0.0);
        let view = patch.view(&map);
        let full = patch.render(&pool, &view, 1.0, 32, &mut |_| {});
        let capped = patch.render(&pool, &view, 1.0, 1, &mut |_| {});
        assert!(full > capped);
        assert_eq!(capped, 4);
    }

    #[test]
    fn visibility_and_dirty_flags() {
        let (_, mut patch) = single_patch(16, 0);
        assert!(patch.is_visible());
        assert!(patch.is_dirty());

        assert!(patch.set_visible(false));
        assert!(!patch.set_visible(false));
        assert_eq!(patch.flags(), PatchFlags::DIRTY);
    }
}
// ----------------------------------------------------------------------------

// ----------------------------------------------------------------------------
use bevy::math::UVec2;

use crate::heightmap::HeightMapView;
// ----------------------------------------------------------------------------
/// Precomputed roughness of all triangles of one root tri tree down to a
/// granularity of 4 cells.
///
/// Nodes are stored by their path label (root = 1, children = 2n and 2n + 1)
/// so the tree is a plain array:
///
/// ```text
///      idx:         1 | 2   3 | 4   5   6   7 | 8 ...
///      depth:       0 |   1   |       2       | 3 ...
/// ```
///
/// idx 0 is unused.
#[derive(Clone)]
pub struct VarianceTree {
    values: Vec<f32>,
}
// ----------------------------------------------------------------------------
/// Amplification of variance for triangles crossing the waterline (height 0).
/// Ensures coastlines are tessellated more finely than their pure geometric
/// error would demand.
#[derive(Debug, Clone, Copy)]
pub struct ShorelineRule {
    pub scale: f32,
    pub floor: f32,
}
// ----------------------------------------------------------------------------
impl VarianceTree {
    // ------------------------------------------------------------------------
    /// depth of the tree for a patch of `patch_size` cells. patch_size must be
    /// a power of two >= 4.
    ///
    /// root hypotenuse spans patch_size (diagonal), every second level halves
    /// the span. recursion stops for spans < 4, so the last stored level has
    /// a (diagonal) span of 2: 2 * log2(patch_size) - 1 levels.
    #[inline(always)]
    pub fn depth(patch_size: u32) -> u32 {
        2 * patch_size.trailing_zeros() - 1
    }
    // ------------------------------------------------------------------------
    pub fn new(patch_size: u32) -> Self {
        Self {
            values: vec![0.0; 1 << Self::depth(patch_size)],
        }
    }
    // ------------------------------------------------------------------------
    /// number of slots (including the unused slot 0)
    pub fn len(&self) -> usize {
        self.values.len()
    }
    // ------------------------------------------------------------------------
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    // ------------------------------------------------------------------------
    /// variance of node or None if the node lies beyond the tree
    #[inline(always)]
    pub fn get(&self, node: usize) -> Option<f32> {
        if node > 0 && node < self.values.len() {
            Some(self.values[node])
        } else {
            None
        }
    }
    // ------------------------------------------------------------------------
    /// variance of the root triangle which is the max of the whole tree
    pub fn max_variance(&self) -> f32 {
        self.values.get(1).copied().unwrap_or_default()
    }
    // ------------------------------------------------------------------------
    pub(super) fn compute(
        &mut self,
        view: &HeightMapView,
        shoreline: ShorelineRule,
        left: UVec2,
        right: UVec2,
        apex: UVec2,
    ) {
        let mut builder = VarianceBuilder {
            view,
            shoreline,
            values: &mut self.values,
        };
        builder.recurse(left, right, apex, 1);
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
/// Half of the hypotenuse span in cells along the longer axis. Triangles are
/// either axis aligned (span on one axis) or diagonal (equal spans).
#[inline(always)]
pub(super) fn hypotenuse_span(left: UVec2, right: UVec2) -> u32 {
    let span = left.max(right) - left.min(right);
    span.x.max(span.y)
}
// ----------------------------------------------------------------------------
#[inline(always)]
pub(super) fn hypotenuse_center(left: UVec2, right: UVec2) -> UVec2 {
    (left + right) / 2
}
// ----------------------------------------------------------------------------
struct VarianceBuilder<'a, 'heightmap> {
    view: &'a HeightMapView<'heightmap>,
    shoreline: ShorelineRule,
    values: &'a mut [f32],
}
// ----------------------------------------------------------------------------
impl<'a, 'heightmap> VarianceBuilder<'a, 'heightmap> {
    // ------------------------------------------------------------------------
    //
    //        apex
    //         /|\
    //        / | \
    //       /  |  \
    //      /   |   \
    //  left ---c--- right     c: center of hypotenuse
    //
    // variance = |h(c) - (h(left) + h(right)) / 2|, max'ed with all children
    //
    fn recurse(&mut self, left: UVec2, right: UVec2, apex: UVec2, node: usize) -> f32 {
        let center = hypotenuse_center(left, right);

        let left_h = self.view.sample(left);
        let right_h = self.view.sample(right);
        let center_h = self.view.sample(center);

        let mut variance = (center_h - (left_h + right_h) * 0.5).abs();

        // any pair on different sides of the waterline
        if left_h * right_h < 0.0 || left_h * center_h < 0.0 || right_h * center_h < 0.0 {
            variance = (variance * self.shoreline.scale).max(self.shoreline.floor);
        }

        if hypotenuse_span(left, right) >= 4 {
            variance = variance.max(self.recurse(apex, left, center, node << 1));
            variance = variance.max(self.recurse(right, apex, center, (node << 1) | 1));
        }

        if node < self.values.len() {
            self.values[node] = variance;
        }
        variance
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------

// ----------------------------------------------------------------------------
// Vertical skirt along the map edges. Closes the gap between the outermost
// terrain triangles and the void below the map.
// ----------------------------------------------------------------------------
use bevy::math::{vec3, UVec2, Vec3};

use crate::heightmap::{HeightMapRect, TerrainHeightMap};

use super::{Landscape, Patch, TerrainTriangle};
// ----------------------------------------------------------------------------
impl Landscape {
    // ------------------------------------------------------------------------
    /// Emits two triangles for every leaf edge of a visible patch which lies on
    /// the map boundary. The skirt spans from the terrain surface down to the
    /// configured border height. Returns number of emitted triangles.
    pub fn render_border<F: FnMut(TerrainTriangle)>(
        &self,
        heightmap: &TerrainHeightMap,
        emit: &mut F,
    ) -> usize {
        let square_size = self.config.square_size();
        let border_height = self.config.border_height();

        let mut count = 0;
        self.for_each_border_edge(heightmap, |patch, a, b| {
            let view = patch.view(heightmap);
            let top_a = view.world_position(a, square_size);
            let top_b = view.world_position(b, square_size);
            let bottom_a = skirt_bottom(top_a, border_height);
            let bottom_b = skirt_bottom(top_b, border_height);

            emit(TerrainTriangle {
                apex: top_a,
                left: top_b,
                right: bottom_a,
            });
            emit(TerrainTriangle {
                apex: top_b,
                left: bottom_b,
                right: bottom_a,
            });
            count += 2;
        });
        count
    }
    // ------------------------------------------------------------------------
    /// number of triangles render_border would emit for the current mesh
    pub(super) fn border_triangle_count(&self, heightmap: &TerrainHeightMap) -> usize {
        let mut edges = 0;
        self.for_each_border_edge(heightmap, |_, _, _| edges += 1);
        2 * edges
    }
    // ------------------------------------------------------------------------
    /// visits patch local corners of all leaf edges on the map boundary
    fn for_each_border_edge<F: FnMut(&Patch, UVec2, UVec2)>(
        &self,
        heightmap: &TerrainHeightMap,
        mut f: F,
    ) {
        let map_size = UVec2::new(heightmap.width(), heightmap.height());
        let max_depth = self.config.max_render_depth();

        for patch in self
            .patches
            .iter()
            .filter(|p| p.is_visible() && is_edge_patch(&p.rect(), map_size))
        {
            let origin = patch.world_origin();
            patch.for_each_leaf(&self.pool, max_depth, |_, apex, left, right| {
                for (a, b) in [(apex, left), (left, right), (right, apex)] {
                    if on_same_boundary(origin + a, origin + b, map_size) {
                        f(patch, a, b);
                    }
                }
            });
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
#[inline(always)]
fn is_edge_patch(rect: &HeightMapRect, map_size: UVec2) -> bool {
    rect.x1 == 0 || rect.z1 == 0 || rect.x2 == map_size.x || rect.z2 == map_size.y
}
// ----------------------------------------------------------------------------
/// true if both (global) corners lie on the same map edge
#[inline(always)]
fn on_same_boundary(a: UVec2, b: UVec2, map_size: UVec2) -> bool {
    (a.x == 0 && b.x == 0)
        || (a.y == 0 && b.y == 0)
        || (a.x == map_size.x && b.x == map_size.x)
        || (a.y == map_size.y && b.y == map_size.y)
}
// ----------------------------------------------------------------------------
#[inline(always)]
fn skirt_bottom(top: Vec3, border_height: f32) -> Vec3 {
    vec3(top.x, border_height, top.z)
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LandscapeConfig;
    use bevy::math::uvec2;

    #[test]
    fn boundary_detection() {
        let size = uvec2(32, 16);
        assert!(on_same_boundary(uvec2(0, 3), uvec2(0, 9), size));
        assert!(on_same_boundary(uvec2(32, 16), uvec2(24, 16), size));
        // corner to corner diagonal touches two edges but lies on none
        assert!(!on_same_boundary(uvec2(0, 16), uvec2(32, 0), size));
        assert!(!on_same_boundary(uvec2(5, 5), uvec2(5, 9), size));
    }

    #[test]
    fn skirt_covers_map_outline_once() {
        let map = TerrainHeightMap::flat(32, 32, 10.0);
        let landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();

        let mut triangles = Vec::new();
        let count = landscape.render_border(&map, &mut |t| triangles.push(t));

        // 2x2 patches, unsplit: 2 boundary edges per patch, 2 triangles per edge
        assert_eq!(count, 16);
        assert_eq!(triangles.len(), 16);

        let border_height = LandscapeConfig::default().border_height();
        for t in &triangles {
            let heights = [t.apex.y, t.left.y, t.right.y];
            assert!(heights.contains(&10.0));
            assert!(heights.contains(&border_height));
        }
    }

    #[test]
    fn invisible_patches_have_no_skirt() {
        let map = TerrainHeightMap::flat(32, 32, 10.0);
        let mut landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();
        landscape.set_all_visible(false);
        landscape.set_patch_visible(1, 1, true);

        assert_eq!(landscape.render_border(&map, &mut |_| {}), 4);
        assert_eq!(landscape.border_triangle_count(&map), 4);
    }
}
// ----------------------------------------------------------------------------

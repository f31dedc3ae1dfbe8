// ----------------------------------------------------------------------------
pub const DEFAULT_PATCH_SIZE: u32 = 128;
// ----------------------------------------------------------------------------
/// config for the adaptive landscape mesh
#[derive(Clone)]
pub struct LandscapeConfig {
    /// edge length of a patch in heightfield cells (power of two)
    patch_size: u32,
    /// world units per heightfield cell
    square_size: f32,
    /// tri tree nodes available per frame (patch roots not included)
    node_budget: usize,
    /// upper limit the node budget may grow to after the pool ran out of nodes
    max_node_budget: usize,
    /// falloff rate of detail with camera distance. increase to reduce detail
    /// in distance
    distance_scale: f32,
    /// variances are clamped to view_radius * factor. regulates how strong
    /// rough areas are tessellated in distance
    variance_limit_factor: f32,
    /// amplification of variance for triangles crossing the waterline
    shoreline_scale: f32,
    /// minimum variance for triangles crossing the waterline
    shoreline_floor: f32,
    /// camera movement in world units which triggers a retessellation
    retessellate_distance: f32,
    /// absolute height of the lower edge of the map border skirt
    border_height: f32,
    /// safety bound for render traversal (raised to the full tessellation
    /// depth of a patch)
    max_render_depth: u8,
}
// ----------------------------------------------------------------------------
/// Subset of the config required for tessellation of a single patch.
#[derive(Debug, Clone, Copy)]
pub struct LodSettings {
    pub square_size: f32,
    pub distance_scale: f32,
    pub variance_limit_factor: f32,
}
// ----------------------------------------------------------------------------
impl LandscapeConfig {
    // ------------------------------------------------------------------------
    pub fn patch_size(&self) -> u32 {
        self.patch_size
    }
    // ------------------------------------------------------------------------
    /// world units per heightfield cell
    pub fn square_size(&self) -> f32 {
        self.square_size
    }
    // ------------------------------------------------------------------------
    pub fn node_budget(&self) -> usize {
        self.node_budget
    }
    // ------------------------------------------------------------------------
    pub fn max_node_budget(&self) -> usize {
        self.max_node_budget
    }
    // ------------------------------------------------------------------------
    pub fn distance_scale(&self) -> f32 {
        self.distance_scale
    }
    // ------------------------------------------------------------------------
    pub fn variance_limit_factor(&self) -> f32 {
        self.variance_limit_factor
    }
    // ------------------------------------------------------------------------
    pub fn shoreline_scale(&self) -> f32 {
        self.shoreline_scale
    }
    // ------------------------------------------------------------------------
    pub fn shoreline_floor(&self) -> f32 {
        self.shoreline_floor
    }
    // ------------------------------------------------------------------------
    pub fn retessellate_distance(&self) -> f32 {
        self.retessellate_distance
    }
    // ------------------------------------------------------------------------
    pub fn border_height(&self) -> f32 {
        self.border_height
    }
    // ------------------------------------------------------------------------
    /// Never below the depth of a fully refined patch: stopping render above
    /// the tessellated depth would emit triangles next to finer neighbors and
    /// break crack freedom.
    pub fn max_render_depth(&self) -> u8 {
        let full_depth = 2 * self.patch_size.trailing_zeros() as u8;
        self.max_render_depth.max(full_depth)
    }
    // ------------------------------------------------------------------------
    pub fn lod_settings(&self) -> LodSettings {
        LodSettings {
            square_size: self.square_size,
            distance_scale: self.distance_scale,
            variance_limit_factor: self.variance_limit_factor,
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
// setter
// ----------------------------------------------------------------------------
impl LandscapeConfig {
    // ------------------------------------------------------------------------
    /// Note: validity (power of two) is checked on landscape creation
    pub fn set_patch_size(&mut self, size: u32) -> &mut Self {
        self.patch_size = size;
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_square_size(&mut self, size: f32) -> &mut Self {
        self.square_size = size.clamp(0.01, 1024.0);
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_node_budget(&mut self, budget: usize) -> &mut Self {
        self.node_budget = budget;
        self.max_node_budget = self.max_node_budget.max(budget);
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_max_node_budget(&mut self, budget: usize) -> &mut Self {
        self.max_node_budget = budget.max(self.node_budget);
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_distance_scale(&mut self, scale: f32) -> &mut Self {
        self.distance_scale = scale.clamp(0.001, 100_000.0);
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_variance_limit_factor(&mut self, factor: f32) -> &mut Self {
        self.variance_limit_factor = factor.max(0.0);
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_shoreline(&mut self, scale: f32, floor: f32) -> &mut Self {
        self.shoreline_scale = scale.max(1.0);
        self.shoreline_floor = floor.max(0.0);
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_retessellate_distance(&mut self, distance: f32) -> &mut Self {
        self.retessellate_distance = distance.max(0.0);
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_border_height(&mut self, height: f32) -> &mut Self {
        self.border_height = height;
        self
    }
    // ------------------------------------------------------------------------
    pub fn set_max_render_depth(&mut self, depth: u8) -> &mut Self {
        self.max_render_depth = depth.max(1);
        self
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
// presets
// ----------------------------------------------------------------------------
impl LandscapeConfig {
    // ------------------------------------------------------------------------
    /// smaller patches and node budget, e.g. for tiny maps or tests
    pub fn small_maps() -> Self {
        Self {
            patch_size: 16,
            node_budget: 1 << 14,
            max_node_budget: 1 << 16,
            ..Default::default()
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
// defaults
// ----------------------------------------------------------------------------
impl Default for LandscapeConfig {
    // ------------------------------------------------------------------------
    fn default() -> Self {
        Self {
            patch_size: DEFAULT_PATCH_SIZE,
            square_size: 8.0,
            node_budget: 1 << 18,
            max_node_budget: 1 << 20,
            distance_scale: 300.0,
            variance_limit_factor: 0.35,
            shoreline_scale: 1.5,
            shoreline_floor: 20.0,
            retessellate_distance: 500.0,
            border_height: -400.0,
            max_render_depth: 32,
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
// fmt
// ----------------------------------------------------------------------------
use std::fmt;

impl fmt::Debug for LandscapeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LandscapeConfig: patch {} cells, {} nodes (max {})",
            self.patch_size, self.node_budget, self.max_node_budget
        )
    }
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_budget_keeps_max_budget_consistent() {
        let mut config = LandscapeConfig::default();
        config.set_node_budget(1 << 21);
        assert_eq!(config.max_node_budget(), 1 << 21);

        config.set_max_node_budget(16);
        assert_eq!(config.max_node_budget(), 1 << 21);
    }

    #[test]
    fn setters_clamp_values() {
        let mut config = LandscapeConfig::small_maps();
        config
            .set_square_size(0.0)
            .set_shoreline(0.5, -3.0)
            .set_max_render_depth(0);

        assert_eq!(config.square_size(), 0.01);
        assert_eq!(config.shoreline_scale(), 1.0);
        assert_eq!(config.shoreline_floor(), 0.0);
        assert_eq!(config.patch_size(), 16);
        // 16 cells: 2 * log2(16) levels down to single cell triangles
        assert_eq!(config.max_render_depth(), 8);

        config.set_max_render_depth(40);
        assert_eq!(config.max_render_depth(), 40);
        config.set_patch_size(DEFAULT_PATCH_SIZE).set_max_render_depth(4);
        assert_eq!(config.max_render_depth(), 14);
    }
}
// ----------------------------------------------------------------------------

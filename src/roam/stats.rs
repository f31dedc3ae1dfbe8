// ----------------------------------------------------------------------------
use std::fmt;
// ----------------------------------------------------------------------------
#[derive(Default, Clone)]
pub struct LandscapeStats {
    pub patches: usize,
    pub visible_patches: usize,
    pub variance_updates: usize,
    pub triangles: usize,
    /// skirt triangles along the map boundary
    pub border_triangles: usize,
    pub nodes_allocated: usize,
    pub node_capacity: usize,
    pub pool_exhausted: bool,
    pub retessellations: u64,
    pub last_tessellation: instant::Duration,
}
// ----------------------------------------------------------------------------
impl LandscapeStats {
    // ------------------------------------------------------------------------
    /// fraction of the node budget used in the last tessellation
    pub fn pool_usage(&self) -> f32 {
        if self.node_capacity > 0 {
            self.nodes_allocated as f32 / self.node_capacity as f32
        } else {
            0.0
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl fmt::Debug for LandscapeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "patches {}/{} visible, {} triangles (+{} border), nodes {}/{}{}, tessellation #{} took {:?}",
            self.visible_patches,
            self.patches,
            self.triangles,
            self.border_triangles,
            self.nodes_allocated,
            self.node_capacity,
            if self.pool_exhausted { " (exhausted)" } else { "" },
            self.retessellations,
            self.last_tessellation
        )
    }
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_usage_of_empty_pool() {
        let mut stats = LandscapeStats::default();
        assert_eq!(stats.pool_usage(), 0.0);

        stats.node_capacity = 200;
        stats.nodes_allocated = 50;
        assert_eq!(stats.pool_usage(), 0.25);
    }
}
// ----------------------------------------------------------------------------

// ----------------------------------------------------------------------------
// Adaptive terrain mesh based on ROAM (realtime optimally adapting meshes).
//
// The map is tiled into patches of equal size. Every patch holds two binary
// triangle trees which are refined every frame depending on camera distance
// and precomputed terrain roughness (variance). Trees of adjacent patches are
// linked so splits propagate over patch borders and the mesh stays crack free.
//
// per frame pipeline: reset -> tessellate -> render
// ----------------------------------------------------------------------------
use bevy::{
    math::{uvec2, Vec3},
    prelude::*,
    tasks::TaskPool,
};
use bytemuck::{Pod, Zeroable};

use crate::config::LandscapeConfig;
use crate::error::LandscapeError;
use crate::heightmap::{HeightMapRect, TerrainHeightMap};

use self::patch::PatchVariance;

pub use self::patch::{split, Patch, PatchFlags, PatchNeighbors};
pub use self::plugin::{RoamLodAnchor, RoamLodSettings, RoamSystemLabel, RoamTerrainPlugin};
pub use self::stats::LandscapeStats;
pub use self::tritree::{NodeId, NodeRef, TriNodePool, TriTreeNode};
pub use self::variance::{ShorelineRule, VarianceTree};
// ----------------------------------------------------------------------------
mod border;
mod patch;
mod plugin;
mod stats;
mod tritree;
mod variance;
// ----------------------------------------------------------------------------
/// Heightmap edits may change the variance of triangles in adjacent patches
/// as they share edge samples.
const DIRTY_BORDER_MARGIN: u32 = 2;
// ----------------------------------------------------------------------------
/// World space triangle as emitted by render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainTriangle {
    pub apex: Vec3,
    pub left: Vec3,
    pub right: Vec3,
}
// ----------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Pod, Zeroable, PartialEq)]
#[repr(C)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}
// ----------------------------------------------------------------------------
/// Non indexed triangle list of the current frame: terrain triangles
/// followed by the border skirt.
#[derive(Default)]
pub struct TerrainMeshBuffer {
    vertices: Vec<TerrainVertex>,
    terrain_triangles: usize,
    border_triangles: usize,
}
// ----------------------------------------------------------------------------
pub struct Landscape {
    config: LandscapeConfig,
    patches: Vec<Patch>,
    patches_x: u32,
    patches_z: u32,
    pool: TriNodePool,
    node_budget: usize,
    tracker: RetessellationTracker,
    stats: LandscapeStats,
}
// ----------------------------------------------------------------------------
/// Decides if the mesh of the last frame can be reused.
struct RetessellationTracker {
    forced_update: bool,
    entered_visibility: bool,
    last_camera: Vec3,
    last_view_radius: f32,
}
// ----------------------------------------------------------------------------
impl Landscape {
    // ------------------------------------------------------------------------
    /// Tiles the heightmap into patches, computes their variance and links
    /// all root triangles.
    pub fn new(config: LandscapeConfig, heightmap: &TerrainHeightMap) -> Result<Self, LandscapeError> {
        let patch_size = config.patch_size();
        if !patch_size.is_power_of_two() || patch_size < 4 {
            return Err(LandscapeError::InvalidPatchSize(patch_size));
        }

        let (width, height) = (heightmap.width(), heightmap.height());
        if width == 0 || height == 0 || width % patch_size != 0 || height % patch_size != 0 {
            return Err(LandscapeError::InvalidMapSize {
                width,
                height,
                patch_size,
            });
        }

        let patches_x = width / patch_size;
        let patches_z = height / patch_size;
        let patch_count = (patches_x * patches_z) as usize;

        // two reserved root slots per patch
        let pool = TriNodePool::new(2 * patch_count, config.node_budget())?;

        let mut patches = Vec::with_capacity(patch_count);
        for z in 0..patches_z {
            for x in 0..patches_x {
                let slot = 2 * patches.len();
                patches.push(Patch::new(
                    uvec2(x, z),
                    x * patch_size,
                    z * patch_size,
                    patch_size,
                    (pool.reserved_node(slot), pool.reserved_node(slot + 1)),
                ));
            }
        }

        info!(
            "creating landscape: {}x{} patches of {} cells, {:?}",
            patches_x, patches_z, patch_size, config
        );

        let mut landscape = Self {
            node_budget: config.node_budget(),
            config,
            patches,
            patches_x,
            patches_z,
            pool,
            tracker: RetessellationTracker::default(),
            stats: LandscapeStats {
                patches: patch_count,
                ..Default::default()
            },
        };
        landscape.compute_variance(heightmap);
        landscape.reset();

        Ok(landscape)
    }
    // ------------------------------------------------------------------------
    /// Collapses all patches to their two root triangles. Invalidates all
    /// nodes of the previous frame. If the previous frame ran out of nodes the
    /// pool grows (up to the configured max budget).
    pub fn reset(&mut self) {
        if self.pool.run_out_of_nodes() {
            self.grow_pool();
        }
        self.pool.reset_all();

        let Self {
            patches,
            pool,
            patches_x,
            patches_z,
            ..
        } = self;

        for patch in patches.iter() {
            let neighbors = neighbors_of(patches, *patches_x, *patches_z, patch.grid_pos());
            patch.reset(pool, neighbors);
        }
    }
    // ------------------------------------------------------------------------
    /// Refines all visible patches. Dirty visible patches get their variance
    /// recomputed first. Returns false if the node pool ran out of nodes.
    pub fn tessellate(&mut self, heightmap: &TerrainHeightMap, camera: Vec3, view_radius: f32) -> bool {
        let start = instant::Instant::now();

        let mut updated = 0;
        let shoreline = self.shoreline();
        for patch in self
            .patches
            .iter_mut()
            .filter(|p| p.is_visible() && p.is_dirty())
        {
            let view = patch.view(heightmap);
            patch.compute_variance(&view, shoreline);
            updated += 1;
        }
        if updated > 0 {
            debug!("recomputed variance of {} dirty patches", updated);
        }

        let lod = self.config.lod_settings();
        let mut visible = 0;
        for patch in self.patches.iter().filter(|p| p.is_visible()) {
            patch.tessellate(&mut self.pool, camera, view_radius, &lod);
            visible += 1;
        }

        let exhausted = self.pool.run_out_of_nodes();
        if exhausted {
            warn!(
                "node pool ran out of nodes: {} nodes allocated",
                self.pool.allocated()
            );
        }

        self.stats.variance_updates = updated;
        self.stats.visible_patches = visible;
        self.stats.triangles = self
            .patches
            .iter()
            .filter(|p| p.is_visible())
            .map(|p| p.triangle_count(&self.pool))
            .sum();
        self.stats.border_triangles = self.border_triangle_count(heightmap);
        self.stats.nodes_allocated = self.pool.allocated();
        self.stats.node_capacity = self.pool.capacity();
        self.stats.pool_exhausted = exhausted;
        self.stats.last_tessellation = start.elapsed();

        !exhausted
    }
    // ------------------------------------------------------------------------
    /// Emits the triangles of all visible patches in row major patch order.
    /// Returns number of emitted triangles.
    pub fn render<F: FnMut(TerrainTriangle)>(&self, heightmap: &TerrainHeightMap, emit: &mut F) -> usize {
        let square_size = self.config.square_size();
        let max_depth = self.config.max_render_depth();

        self.patches
            .iter()
            .filter(|p| p.is_visible())
            .map(|patch| {
                let view = patch.view(heightmap);
                patch.render(&self.pool, &view, square_size, max_depth, emit)
            })
            .sum()
    }
    // ------------------------------------------------------------------------
    /// Renders terrain and border skirt into the vertex buffer.
    pub fn render_mesh(&self, heightmap: &TerrainHeightMap, buffer: &mut TerrainMeshBuffer) {
        buffer.clear();
        let vertices = &mut buffer.vertices;
        let terrain = self.render(heightmap, &mut |t| vertices.extend(t.vertices()));
        let border = self.render_border(heightmap, &mut |t| vertices.extend(t.vertices()));

        buffer.terrain_triangles = terrain;
        buffer.border_triangles = border;
    }
    // ------------------------------------------------------------------------
    /// Frame driver: retessellates only if required, i.e. camera moved far
    /// enough, view radius or visibility changed, heightmap of visible patches
    /// changed or a retessellation was forced. Returns true if the mesh
    /// changed.
    pub fn update(&mut self, heightmap: &TerrainHeightMap, camera: Vec3, view_radius: f32) -> bool {
        let dirty = self.patches.iter().any(|p| p.is_visible() && p.is_dirty());
        // retry with a bigger pool
        let starved = self.pool.run_out_of_nodes() && self.node_budget < self.config.max_node_budget();

        let retessellate = self.tracker.lazy_update(
            camera,
            view_radius,
            self.config.retessellate_distance(),
        ) || dirty
            || starved;

        if retessellate {
            debug!(
                "retessellating landscape (dirty: {}, starved: {})",
                dirty, starved
            );
            self.reset();
            self.tessellate(heightmap, camera, view_radius);
            self.stats.retessellations += 1;
        }
        retessellate
    }
    // ------------------------------------------------------------------------
    /// Next call to update will retessellate regardless of camera movement.
    pub fn force_retessellation(&mut self) {
        self.tracker.forced_update = true;
    }
    // ------------------------------------------------------------------------
    /// Flags all patches overlapping the (inclusive) heightmap rectangle as
    /// dirty. Their variance is recomputed before the next tessellation (or on
    /// an explicit compute_variance).
    pub fn mark_dirty(&mut self, rect: HeightMapRect) {
        let rect = rect.grown(DIRTY_BORDER_MARGIN);
        let mut marked = 0;
        for patch in self
            .patches
            .iter_mut()
            .filter(|p| p.rect().overlaps(&rect))
        {
            patch.mark_dirty();
            marked += 1;
        }
        debug!("marked {} patches dirty", marked);
    }
    // ------------------------------------------------------------------------
    /// Recomputes variance of all dirty patches. Returns number of updated
    /// patches.
    pub fn compute_variance(&mut self, heightmap: &TerrainHeightMap) -> usize {
        let shoreline = self.shoreline();
        let mut updated = 0;
        for patch in self.patches.iter_mut().filter(|p| p.is_dirty()) {
            let view = patch.view(heightmap);
            patch.compute_variance(&view, shoreline);
            updated += 1;
        }
        updated
    }
    // ------------------------------------------------------------------------
    /// Same as compute_variance but distributes the patches on the task pool.
    pub fn compute_variance_parallel(&mut self, heightmap: &TerrainHeightMap, thread_pool: &TaskPool) -> usize {
        let shoreline = self.shoreline();

        // heightmap doesn't have static lifetime -> scoped, blocking threadpool
        let mut generated = thread_pool.scope(|s| {
            for (i, patch) in self.patches.iter().enumerate().filter(|(_, p)| p.is_dirty()) {
                let view = patch.view(heightmap);
                let size = patch.size();
                s.spawn(async move { (i, PatchVariance::compute(&view, size, shoreline)) });
            }
        });

        let updated = generated.len();
        for (i, variance) in generated.drain(..) {
            self.patches[i].apply_variance(variance);
        }
        if updated > 0 {
            debug!("recomputed variance of {} patches in parallel", updated);
        }
        updated
    }
    // ------------------------------------------------------------------------
    /// returns true if visibility changed
    pub fn set_patch_visible(&mut self, x: u32, z: u32, visible: bool) -> bool {
        match self.patch_index(x, z) {
            Some(i) => self.set_visible(i, visible),
            None => false,
        }
    }
    // ------------------------------------------------------------------------
    pub fn set_all_visible(&mut self, visible: bool) {
        for i in 0..self.patches.len() {
            self.set_visible(i, visible);
        }
    }
    // ------------------------------------------------------------------------
    /// Sets visibility of every patch to the result of the provided culling
    /// test.
    pub fn update_visibility<F: FnMut(&Patch) -> bool>(&mut self, mut is_visible: F) {
        for i in 0..self.patches.len() {
            let visible = is_visible(&self.patches[i]);
            self.set_visible(i, visible);
        }
    }
    // ------------------------------------------------------------------------
    fn set_visible(&mut self, i: usize, visible: bool) -> bool {
        let changed = self.patches[i].set_visible(visible);
        if changed && visible {
            self.tracker.entered_visibility = true;
        }
        changed
    }
    // ------------------------------------------------------------------------
    fn grow_pool(&mut self) {
        let max_budget = self.config.max_node_budget();
        if self.node_budget >= max_budget {
            return;
        }
        let new_budget = self.node_budget.saturating_mul(2).min(max_budget);
        match self.pool.grow(new_budget) {
            Ok(()) => {
                warn!(
                    "growing node pool from {} to {} nodes",
                    self.node_budget, new_budget
                );
                self.node_budget = new_budget;
            }
            Err(e) => warn!("failed to grow node pool: {}", e),
        }
    }
    // ------------------------------------------------------------------------
    fn shoreline(&self) -> ShorelineRule {
        ShorelineRule {
            scale: self.config.shoreline_scale(),
            floor: self.config.shoreline_floor(),
        }
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    fn patch_index(&self, x: u32, z: u32) -> Option<usize> {
        if x < self.patches_x && z < self.patches_z {
            Some((z * self.patches_x + x) as usize)
        } else {
            None
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
// queries
// ----------------------------------------------------------------------------
impl Landscape {
    // ------------------------------------------------------------------------
    pub fn config(&self) -> &LandscapeConfig {
        &self.config
    }
    // ------------------------------------------------------------------------
    /// all patches in row major order
    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }
    // ------------------------------------------------------------------------
    pub fn patch(&self, x: u32, z: u32) -> Option<&Patch> {
        self.patch_index(x, z).map(|i| &self.patches[i])
    }
    // ------------------------------------------------------------------------
    pub fn patch_count(&self) -> usize {
        self.patches.len()
    }
    // ------------------------------------------------------------------------
    pub fn patches_x(&self) -> u32 {
        self.patches_x
    }
    // ------------------------------------------------------------------------
    pub fn patches_z(&self) -> u32 {
        self.patches_z
    }
    // ------------------------------------------------------------------------
    pub fn pool(&self) -> &TriNodePool {
        &self.pool
    }
    // ------------------------------------------------------------------------
    /// current per frame node budget (may have grown since creation)
    pub fn node_budget(&self) -> usize {
        self.node_budget
    }
    // ------------------------------------------------------------------------
    pub fn stats(&self) -> &LandscapeStats {
        &self.stats
    }
    // ------------------------------------------------------------------------
    /// handles to the root triangles of a patch valid until the next reset
    pub fn root_refs(&self, x: u32, z: u32) -> Option<(NodeRef, NodeRef)> {
        self.patch(x, z).map(|patch| {
            (
                self.pool.frame_ref(patch.base_left()),
                self.pool.frame_ref(patch.base_right()),
            )
        })
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
fn neighbors_of(patches: &[Patch], patches_x: u32, patches_z: u32, pos: UVec2) -> PatchNeighbors {
    let get = |x: u32, z: u32| &patches[(z * patches_x + x) as usize];
    PatchNeighbors {
        left: (pos.x > 0).then(|| get(pos.x - 1, pos.y)),
        right: (pos.x + 1 < patches_x).then(|| get(pos.x + 1, pos.y)),
        top: (pos.y > 0).then(|| get(pos.x, pos.y - 1)),
        bottom: (pos.y + 1 < patches_z).then(|| get(pos.x, pos.y + 1)),
    }
}
// ----------------------------------------------------------------------------
// tracker
// ----------------------------------------------------------------------------
impl RetessellationTracker {
    // ------------------------------------------------------------------------
    /// skips update if camera did not move significantly and nothing else
    /// changed since last run
    fn lazy_update(&mut self, camera: Vec3, view_radius: f32, max_distance: f32) -> bool {
        if self.forced_update
            || self.entered_visibility
            || self.last_view_radius != view_radius
            || self.last_camera.distance(camera) > max_distance
        {
            self.forced_update = false;
            self.entered_visibility = false;
            self.last_camera = camera;
            self.last_view_radius = view_radius;
            true
        } else {
            false
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl Default for RetessellationTracker {
    fn default() -> Self {
        Self {
            // very first update always tessellates
            forced_update: true,
            entered_visibility: false,
            last_camera: Vec3::ZERO,
            last_view_radius: 0.0,
        }
    }
}
// ----------------------------------------------------------------------------
// mesh buffer
// ----------------------------------------------------------------------------
impl TerrainTriangle {
    // ------------------------------------------------------------------------
    /// face normal (pointing up for unflipped terrain)
    pub fn normal(&self) -> Vec3 {
        (self.left - self.apex)
            .cross(self.right - self.apex)
            .normalize_or_zero()
    }
    // ------------------------------------------------------------------------
    pub fn vertices(&self) -> [TerrainVertex; 3] {
        let normal = self.normal().to_array();
        [self.apex, self.left, self.right].map(|p| TerrainVertex {
            position: p.to_array(),
            normal,
        })
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl TerrainMeshBuffer {
    // ------------------------------------------------------------------------
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.terrain_triangles = 0;
        self.border_triangles = 0;
    }
    // ------------------------------------------------------------------------
    pub fn vertices(&self) -> &[TerrainVertex] {
        &self.vertices
    }
    // ------------------------------------------------------------------------
    /// raw vertex data for buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
    // ------------------------------------------------------------------------
    pub fn terrain_triangles(&self) -> usize {
        self.terrain_triangles
    }
    // ------------------------------------------------------------------------
    pub fn border_triangles(&self) -> usize {
        self.border_triangles
    }
    // ------------------------------------------------------------------------
    pub fn triangle_count(&self) -> usize {
        self.terrain_triangles + self.border_triangles
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::vec3;

    fn hill(size: u32) -> TerrainHeightMap {
        let c = size as f32 * 0.5;
        TerrainHeightMap::from_fn(size, size, |x, z| {
            let d = (x as f32 - c).powi(2) + (z as f32 - c).powi(2);
            200.0 - d * 0.5
        })
    }

    #[test]
    fn rejects_invalid_layouts() {
        let map = TerrainHeightMap::flat(48, 32, 0.0);

        let mut config = LandscapeConfig::small_maps();
        for size in [0, 2, 12] {
            config.set_patch_size(size);
            assert_eq!(
                Landscape::new(config.clone(), &map).err(),
                Some(LandscapeError::InvalidPatchSize(size))
            );
        }

        config.set_patch_size(32);
        assert_eq!(
            Landscape::new(config, &map).err(),
            Some(LandscapeError::InvalidMapSize {
                width: 48,
                height: 32,
                patch_size: 32
            })
        );
    }

    #[test]
    fn patches_are_laid_out_row_major() {
        let map = TerrainHeightMap::flat(64, 32, 0.0);
        let landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();

        assert_eq!((landscape.patches_x(), landscape.patches_z()), (4, 2));
        assert_eq!(landscape.patch_count(), 8);
        let patch = landscape.patch(3, 1).unwrap();
        assert_eq!(patch.world_origin(), uvec2(48, 16));
        assert!(landscape.patch(4, 0).is_none());
    }

    #[test]
    fn reset_links_neighboring_patches() {
        let map = TerrainHeightMap::flat(32, 32, 0.0);
        let landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();
        let pool = landscape.pool();

        let top_left = landscape.patch(0, 0).unwrap();
        let top_right = landscape.patch(1, 0).unwrap();
        let bottom_left = landscape.patch(0, 1).unwrap();

        let bl = pool.node(top_left.base_left());
        assert_eq!(bl.left_neighbor(), None);
        assert_eq!(bl.right_neighbor(), None);

        let br = pool.node(top_left.base_right());
        assert_eq!(br.left_neighbor(), Some(top_right.base_left()));
        assert_eq!(br.right_neighbor(), Some(bottom_left.base_left()));
        assert_eq!(
            pool.node(top_right.base_left()).left_neighbor(),
            Some(top_left.base_right())
        );
    }

    #[test]
    fn mark_dirty_includes_border_margin() {
        let map = TerrainHeightMap::flat(64, 64, 0.0);
        let mut landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();
        assert!(landscape.patches().iter().all(|p| !p.is_dirty()));

        // 2 cells left of the patch border at x = 32
        landscape.mark_dirty(HeightMapRect::point(30, 40));
        let dirty = landscape
            .patches()
            .iter()
            .filter(|p| p.is_dirty())
            .map(|p| p.grid_pos())
            .collect::<Vec<_>>();
        assert_eq!(dirty, vec![uvec2(1, 2), uvec2(2, 2)]);
        // edit lies outside patch (2, 2) but within the margin of its shared edge
        let neighbor = landscape.patch(2, 2).unwrap().rect();
        assert!(!neighbor.contains(30, 40));
        assert!(neighbor.grown(DIRTY_BORDER_MARGIN).contains(30, 40));

        assert_eq!(landscape.compute_variance(&map), 2);
        assert_eq!(landscape.compute_variance(&map), 0);
    }

    #[test]
    fn frame_driver_skips_unchanged_frames() {
        let map = hill(64);
        let mut landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();
        let camera = vec3(256.0, 300.0, 256.0);

        assert!(landscape.update(&map, camera, 500.0));
        assert!(!landscape.update(&map, camera + Vec3::X, 500.0));
        // view radius change
        assert!(landscape.update(&map, camera, 600.0));
        // far camera movement
        assert!(landscape.update(&map, camera + Vec3::X * 600.0, 600.0));
        assert!(!landscape.update(&map, camera + Vec3::X * 600.0, 600.0));

        landscape.force_retessellation();
        assert!(landscape.update(&map, camera, 600.0));
        assert_eq!(landscape.stats().retessellations, 4);
    }

    #[test]
    fn frame_driver_reacts_on_visibility_and_edits() {
        let mut map = hill(64);
        let mut landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();
        let camera = vec3(256.0, 300.0, 256.0);
        landscape.update(&map, camera, 500.0);

        // leaving visibility doesn't require refinement
        assert!(landscape.set_patch_visible(0, 0, false));
        assert!(!landscape.update(&map, camera, 500.0));

        assert!(landscape.set_patch_visible(0, 0, true));
        assert!(landscape.update(&map, camera, 500.0));

        let changed = map.set_height(10, 10, 500.0);
        landscape.mark_dirty(changed);
        assert!(landscape.update(&map, camera, 500.0));
        assert!(landscape.patches().iter().all(|p| !p.is_dirty()));
    }

    #[test]
    fn invisible_patches_are_only_refined_by_forced_splits() {
        let map = hill(64);
        let mut landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();
        landscape.update_visibility(|patch| patch.grid_pos().x == 0);

        landscape.reset();
        landscape.tessellate(&map, vec3(256.0, 250.0, 256.0), 1000.0);

        let triangles = |x: u32, z: u32| {
            landscape
                .patch(x, z)
                .map(|p| p.triangle_count(landscape.pool()))
                .unwrap_or_default()
        };
        // splits along the shared edge propagate into the invisible neighbor
        assert!(Iterator::any(&mut (0..4), |z| triangles(1, z) > 2));
        // no visible patch nearby -> fully collapsed
        for z in 0..4 {
            assert_eq!(triangles(3, z), 2);
        }

        let mut emitted = 0;
        let rendered = landscape.render(&map, &mut |_| emitted += 1);
        assert_eq!(rendered, emitted);
        assert_eq!(rendered, landscape.stats().triangles);
        assert_eq!(
            rendered,
            (0..4).map(|z| triangles(0, z)).sum::<usize>()
        );
        assert_eq!(landscape.stats().visible_patches, 4);
    }

    #[test]
    fn parallel_variance_matches_serial() {
        let map = hill(64);
        let config = LandscapeConfig::small_maps();
        let serial = Landscape::new(config.clone(), &map).unwrap();

        let mut parallel = Landscape::new(config, &map).unwrap();
        parallel.mark_dirty(map.bounds());
        let pool = TaskPool::new();
        assert_eq!(parallel.compute_variance_parallel(&map, &pool), 16);

        for (a, b) in serial.patches().iter().zip(parallel.patches()) {
            let tree_a = a.variance_left();
            let tree_b = b.variance_left();
            assert!((1..tree_a.len()).all(|n| tree_a.get(n) == tree_b.get(n)));
            assert_eq!(a.max_height(), b.max_height());
            assert!(!b.is_dirty());
        }
    }

    #[test]
    fn pool_grows_after_exhaustion() {
        let map = hill(64);
        let mut config = LandscapeConfig::small_maps();
        config.set_node_budget(64).set_max_node_budget(256);
        let mut landscape = Landscape::new(config, &map).unwrap();
        let camera = vec3(256.0, 250.0, 256.0);

        landscape.reset();
        assert!(!landscape.tessellate(&map, camera, 1000.0));
        assert!(landscape.stats().pool_exhausted);

        landscape.reset();
        assert_eq!(landscape.node_budget(), 128);
        assert_eq!(landscape.pool().capacity(), 128);
        assert!(!landscape.pool().run_out_of_nodes());

        landscape.tessellate(&map, camera, 1000.0);
        landscape.reset();
        landscape.tessellate(&map, camera, 1000.0);
        landscape.reset();
        // capped at max budget
        assert_eq!(landscape.node_budget(), 256);
    }

    #[test]
    fn mesh_buffer_holds_terrain_and_border() {
        let map = TerrainHeightMap::flat(32, 32, 5.0);
        let mut landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();
        assert!(landscape.update(&map, vec3(128.0, 50.0, 128.0), 1000.0));

        let mut buffer = TerrainMeshBuffer::default();
        landscape.render_mesh(&map, &mut buffer);

        assert_eq!(buffer.terrain_triangles(), 8);
        assert_eq!(buffer.border_triangles(), 16);
        assert_eq!(landscape.stats().triangles, buffer.terrain_triangles());
        assert_eq!(landscape.stats().border_triangles, buffer.border_triangles());
        assert_eq!(buffer.vertices().len(), 3 * 24);
        assert_eq!(
            buffer.as_bytes().len(),
            buffer.vertices().len() * std::mem::size_of::<TerrainVertex>()
        );
        // flat terrain normals point up
        assert_eq!(buffer.vertices()[0].normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn stale_root_refs_are_rejected() {
        let map = TerrainHeightMap::flat(32, 32, 0.0);
        let mut landscape = Landscape::new(LandscapeConfig::small_maps(), &map).unwrap();

        let (left, _) = landscape.root_refs(0, 0).unwrap();
        assert!(landscape.pool().get(left).is_some());

        landscape.reset();
        assert!(landscape.pool().get(left).is_none());
        let (left, _) = landscape.root_refs(0, 0).unwrap();
        assert!(landscape.pool().get(left).unwrap().is_leaf());
    }
}
// ----------------------------------------------------------------------------

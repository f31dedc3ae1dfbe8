// ----------------------------------------------------------------------------
use bevy::prelude::*;

use crate::heightmap::TerrainHeightMap;

use super::{Landscape, TerrainMeshBuffer};
// ----------------------------------------------------------------------------
/// Keeps the `Landscape` resource tessellated for the `RoamLodAnchor` and the
/// `TerrainMeshBuffer` resource in sync with it. Both `Landscape` and
/// `TerrainHeightMap` have to be inserted by the app. Heightmap edits must be
/// forwarded with `Landscape::mark_dirty`.
pub struct RoamTerrainPlugin;
// ----------------------------------------------------------------------------
/// Marks the entity (usually the camera) the mesh detail is adapted to.
#[derive(Component)]
pub struct RoamLodAnchor;
// ----------------------------------------------------------------------------
#[derive(Debug, Clone, Hash, Eq, PartialEq, SystemLabel)]
pub enum RoamSystemLabel {
    Tessellation,
}
// ----------------------------------------------------------------------------
pub struct RoamLodSettings {
    /// deactivates tessellation: current mesh is frozen if anchor moves
    pub ignore_anchor: bool,
    /// scales detail: larger radius keeps more detail in distance. default
    /// 1000.0
    view_radius: f32,
}
// ----------------------------------------------------------------------------
impl Plugin for RoamTerrainPlugin {
    // ------------------------------------------------------------------------
    fn build(&self, app: &mut App) {
        app.init_resource::<RoamLodSettings>()
            .init_resource::<TerrainMeshBuffer>()
            .add_system(update_landscape.label(RoamSystemLabel::Tessellation));
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl RoamLodSettings {
    // ------------------------------------------------------------------------
    pub fn view_radius(&self) -> f32 {
        self.view_radius
    }
    // ------------------------------------------------------------------------
    pub fn set_view_radius(&mut self, radius: f32) {
        self.view_radius = radius.clamp(1.0, 1_000_000.0);
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl Default for RoamLodSettings {
    fn default() -> Self {
        Self {
            ignore_anchor: false,
            view_radius: 1000.0,
        }
    }
}
// ----------------------------------------------------------------------------
// systems
// ----------------------------------------------------------------------------
fn update_landscape(
    settings: Res<RoamLodSettings>,
    heightmap: Option<Res<TerrainHeightMap>>,
    landscape: Option<ResMut<Landscape>>,
    lod_anchor: Query<&Transform, With<RoamLodAnchor>>,
    mut mesh: ResMut<TerrainMeshBuffer>,
) {
    if settings.ignore_anchor {
        return;
    }
    if let (Some(heightmap), Some(mut landscape)) = (heightmap, landscape) {
        if let Ok(lod_anchor) = lod_anchor.get_single() {
            let retessellated =
                landscape.update(&heightmap, lod_anchor.translation, settings.view_radius());

            // heights are sampled on render so edits show up without
            // retessellation
            if retessellated || heightmap.is_changed() {
                landscape.render_mesh(&heightmap, &mut mesh);
                debug!("{:?}", landscape.stats());
            }
        }
    }
}
// ----------------------------------------------------------------------------

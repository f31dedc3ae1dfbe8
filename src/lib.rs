// ----------------------------------------------------------------------------
//! View dependent terrain mesh generation for heightmap based maps.
//!
//! A `Landscape` tiles the heightmap into patches and refines them every
//! frame with binary triangle trees (ROAM). The resulting mesh is crack free
//! across patch borders and its complexity depends on camera distance and
//! terrain roughness instead of map size.
// ----------------------------------------------------------------------------
pub mod config;
pub mod error;
pub mod heightmap;
pub mod roam;
// ----------------------------------------------------------------------------
pub use config::{LandscapeConfig, LodSettings};
pub use error::LandscapeError;
pub use heightmap::{HeightMapRect, HeightMapView, TerrainHeightMap};
pub use roam::{
    Landscape, LandscapeStats, Patch, RoamLodAnchor, RoamLodSettings, RoamSystemLabel,
    RoamTerrainPlugin, TerrainMeshBuffer, TerrainTriangle, TerrainVertex,
};
// ----------------------------------------------------------------------------

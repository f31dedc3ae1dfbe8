// ----------------------------------------------------------------------------
use bevy::math::{uvec2, vec3, UVec2, Vec3};

use crate::error::LandscapeError;
// ----------------------------------------------------------------------------
/// Dense row major height samples at cell corners: (width + 1) * (height + 1)
/// values for a map of width * height cells. Owned by the surrounding engine,
/// the landscape only borrows it per call.
#[derive(Default, Clone)]
pub struct TerrainHeightMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}
// ----------------------------------------------------------------------------
/// Inclusive rectangle of heightfield corner coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightMapRect {
    pub x1: u32,
    pub z1: u32,
    pub x2: u32,
    pub z2: u32,
}
// ----------------------------------------------------------------------------
/// Reduced view on the heightmap with patch local coordinates.
pub struct HeightMapView<'heightmap> {
    offset: UVec2,
    heightmap: &'heightmap TerrainHeightMap,
}
// ----------------------------------------------------------------------------
impl TerrainHeightMap {
    // ------------------------------------------------------------------------
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, LandscapeError> {
        let expected = Self::sample_count(width, height);
        if data.len() != expected {
            return Err(LandscapeError::HeightMapMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
    // ------------------------------------------------------------------------
    pub fn flat(width: u32, height: u32, level: f32) -> Self {
        Self {
            width,
            height,
            data: vec![level; Self::sample_count(width, height)],
        }
    }
    // ------------------------------------------------------------------------
    /// generates samples by calling `f(x, z)` for every corner in row major
    /// order
    pub fn from_fn<F: FnMut(u32, u32) -> f32>(width: u32, height: u32, mut f: F) -> Self {
        let mut data = Vec::with_capacity(Self::sample_count(width, height));
        for z in 0..=height {
            for x in 0..=width {
                data.push(f(x, z));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }
    // ------------------------------------------------------------------------
    /// map width in cells
    pub fn width(&self) -> u32 {
        self.width
    }
    // ------------------------------------------------------------------------
    /// map height in cells
    pub fn height(&self) -> u32 {
        self.height
    }
    // ------------------------------------------------------------------------
    pub fn samples(&self) -> &[f32] {
        &self.data
    }
    // ------------------------------------------------------------------------
    pub fn bounds(&self) -> HeightMapRect {
        HeightMapRect::new(0, 0, self.width, self.height)
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn height_at(&self, x: u32, z: u32) -> f32 {
        self.data[self.coordinates_to_offset(uvec2(x, z))]
    }
    // ------------------------------------------------------------------------
    /// Sets a single sample. Returns the changed area which has to be
    /// forwarded to the landscape as dirty region.
    pub fn set_height(&mut self, x: u32, z: u32, value: f32) -> HeightMapRect {
        let offset = self.coordinates_to_offset(uvec2(x, z));
        self.data[offset] = value;
        HeightMapRect::point(x.min(self.width), z.min(self.height))
    }
    // ------------------------------------------------------------------------
    /// Replaces all samples within rect (clamped to the map) with
    /// `f(x, z, previous)`. Returns the changed area.
    pub fn modify_rect<F: FnMut(u32, u32, f32) -> f32>(
        &mut self,
        rect: HeightMapRect,
        mut f: F,
    ) -> HeightMapRect {
        let rect = rect.clamped(self.width, self.height);
        for z in rect.z1..=rect.z2 {
            for x in rect.x1..=rect.x2 {
                let offset = self.coordinates_to_offset(uvec2(x, z));
                self.data[offset] = f(x, z, self.data[offset]);
            }
        }
        rect
    }
    // ------------------------------------------------------------------------
    /// min and max height within rect (clamped to the map)
    pub fn min_max(&self, rect: HeightMapRect) -> (f32, f32) {
        let rect = rect.clamped(self.width, self.height);
        let mut result = (f32::MAX, f32::MIN);
        for z in rect.z1..=rect.z2 {
            let start = self.coordinates_to_offset(uvec2(rect.x1, z));
            let end = self.coordinates_to_offset(uvec2(rect.x2, z));
            result = self.data[start..=end]
                .iter()
                .fold(result, |(min, max), h| (min.min(*h), max.max(*h)));
        }
        result
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    fn sample_count(width: u32, height: u32) -> usize {
        (width as usize + 1) * (height as usize + 1)
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    fn coordinates_to_offset(&self, p: UVec2) -> usize {
        // ensure that coordinates are within map by repeating last col & row
        (self.width + 1) as usize * p.y.min(self.height) as usize + p.x.min(self.width) as usize
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl HeightMapRect {
    // ------------------------------------------------------------------------
    pub fn new(x1: u32, z1: u32, x2: u32, z2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            z1: z1.min(z2),
            x2: x1.max(x2),
            z2: z1.max(z2),
        }
    }
    // ------------------------------------------------------------------------
    pub fn point(x: u32, z: u32) -> Self {
        Self::new(x, z, x, z)
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn contains(&self, x: u32, z: u32) -> bool {
        x >= self.x1 && x <= self.x2 && z >= self.z1 && z <= self.z2
    }
    // ------------------------------------------------------------------------
    pub fn overlaps(&self, other: &HeightMapRect) -> bool {
        self.x1 <= other.x2 && other.x1 <= self.x2 && self.z1 <= other.z2 && other.z1 <= self.z2
    }
    // ------------------------------------------------------------------------
    /// grows rect by margin on all sides (saturating at 0)
    pub fn grown(&self, margin: u32) -> Self {
        Self {
            x1: self.x1.saturating_sub(margin),
            z1: self.z1.saturating_sub(margin),
            x2: self.x2.saturating_add(margin),
            z2: self.z2.saturating_add(margin),
        }
    }
    // ------------------------------------------------------------------------
    pub fn clamped(&self, max_x: u32, max_z: u32) -> Self {
        Self {
            x1: self.x1.min(max_x),
            z1: self.z1.min(max_z),
            x2: self.x2.min(max_x),
            z2: self.z2.min(max_z),
        }
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
impl<'heightmap> HeightMapView<'heightmap> {
    // ------------------------------------------------------------------------
    pub fn new(offset: UVec2, heightmap: &'heightmap TerrainHeightMap) -> Self {
        Self { offset, heightmap }
    }
    // ------------------------------------------------------------------------
    #[inline(always)]
    pub fn sample(&self, pos: UVec2) -> f32 {
        let p = self.offset + pos;
        self.heightmap.height_at(p.x, p.y)
    }
    // ------------------------------------------------------------------------
    /// world space position of patch local corner with live sampled height
    #[inline(always)]
    pub fn world_position(&self, pos: UVec2, square_size: f32) -> Vec3 {
        let p = self.offset + pos;
        vec3(
            p.x as f32 * square_size,
            self.heightmap.height_at(p.x, p.y),
            p.y as f32 * square_size,
        )
    }
    // ------------------------------------------------------------------------
    pub fn min_max(&self, size: u32) -> (f32, f32) {
        let end = self.offset + uvec2(size, size);
        self.heightmap
            .min_max(HeightMapRect::new(self.offset.x, self.offset.y, end.x, end.y))
    }
    // ------------------------------------------------------------------------
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_sample_count() {
        let result = TerrainHeightMap::new(4, 4, vec![0.0; 16]);
        assert_eq!(
            result.err(),
            Some(LandscapeError::HeightMapMismatch {
                expected: 25,
                actual: 16
            })
        );
    }

    #[test]
    fn samples_are_row_major_and_clamped() {
        let map = TerrainHeightMap::from_fn(4, 2, |x, z| (x + 10 * z) as f32);

        assert_eq!(map.samples().len(), 15);
        assert_eq!(map.height_at(3, 1), 13.0);
        assert_eq!(map.height_at(4, 2), 24.0);
        // outside -> last col/row repeated
        assert_eq!(map.height_at(9, 9), 24.0);
    }

    #[test]
    fn modify_rect_is_clamped_to_map() {
        let mut map = TerrainHeightMap::flat(4, 4, 1.0);
        let changed = map.modify_rect(HeightMapRect::new(3, 3, 10, 10), |_, _, h| h + 1.0);

        assert_eq!(changed, HeightMapRect::new(3, 3, 4, 4));
        assert_eq!(map.height_at(4, 4), 2.0);
        assert_eq!(map.height_at(2, 2), 1.0);
        assert_eq!(map.min_max(map.bounds()), (1.0, 2.0));
    }

    #[test]
    fn view_uses_patch_local_coordinates() {
        let map = TerrainHeightMap::from_fn(8, 8, |x, z| (x * z) as f32);
        let view = HeightMapView::new(uvec2(4, 4), &map);

        assert_eq!(view.sample(uvec2(1, 2)), 30.0);
        assert_eq!(view.world_position(uvec2(1, 2), 2.0), vec3(10.0, 30.0, 12.0));
        assert_eq!(view.min_max(4), (16.0, 64.0));
    }

    #[test]
    fn rect_overlap_and_growth() {
        let a = HeightMapRect::new(5, 5, 1, 1);
        assert_eq!(a, HeightMapRect::new(1, 1, 5, 5));
        assert!(a.overlaps(&HeightMapRect::point(5, 3)));
        assert!(!a.overlaps(&HeightMapRect::point(6, 3)));
        assert_eq!(a.grown(2), HeightMapRect::new(0, 0, 7, 7));
        assert!(a.contains(5, 1));
        assert!(!a.contains(0, 3));
        assert!(a.grown(1).contains(0, 3));
    }
}
// ----------------------------------------------------------------------------

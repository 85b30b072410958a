//! Decoded object model handed to consumers.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_derive::Serialize;
use serde_with::serde_as;
use strum::{Display, FromRepr};

use crate::format::FourCC;

pub type Rgba = [f32; 4];

pub const DEFAULT_ALPHA_CHANNEL_NAME: &str = "zALPHA";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum FormatVersion {
    /// LightWave 6 and later
    Lwo2,
    /// Pre-6 object
    Lwob,
    /// Pre-6 layered object
    Lwlo,
}

impl FormatVersion {
    pub fn from_four_cc(id: FourCC) -> Option<Self> {
        match &id.0 {
            b"LWO2" => Some(Self::Lwo2),
            b"LWOB" => Some(Self::Lwob),
            b"LWLO" => Some(Self::Lwlo),
            _ => None,
        }
    }

    #[inline]
    pub fn is_legacy(self) -> bool { self != Self::Lwo2 }
}

#[derive(Clone, Debug, Serialize)]
pub struct Scene {
    pub format: FormatVersion,
    pub layers: Vec<Layer>,
    /// Surfaces by name, in declaration order.
    pub surfaces: IndexMap<String, Surface>,
    pub clips: IndexMap<u32, Clip>,
    pub tags: Vec<String>,
    /// Name of the synthetic color map holding the alpha channel of RGBA maps.
    pub alpha_channel_name: String,
}

impl Scene {
    pub fn new(format: FormatVersion, alpha_channel_name: impl Into<String>) -> Self {
        Self {
            format,
            layers: vec![],
            surfaces: IndexMap::new(),
            clips: IndexMap::new(),
            tags: vec![],
            alpha_channel_name: alpha_channel_name.into(),
        }
    }

    /// Resolves a surface tag index through the tag table.
    pub fn surface_for_tag(&self, tag: u16) -> Option<&Surface> {
        self.tags.get(tag as usize).and_then(|name| self.surfaces.get(name))
    }

    pub fn layer_by_index(&self, index: u16) -> Option<&Layer> {
        self.layers.iter().find(|l| l.index == index)
    }

    pub fn layer_parent(&self, layer: &Layer) -> Option<&Layer> {
        layer.parent.and_then(|p| self.layer_by_index(p))
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, Serialize)]
pub struct Layer {
    pub name: String,
    pub index: u16,
    pub parent: Option<u16>,
    pub pivot: [f32; 3],
    /// Pivot-relative positions.
    pub points: Vec<[f32; 3]>,
    /// Point indices per polygon, in consumer winding order.
    pub polygons: Vec<Vec<u32>>,
    /// Point indices per skelegon.
    pub bones: Vec<Vec<u32>>,
    pub bone_names: BTreeMap<u32, String>,
    pub bone_rolls: BTreeMap<u32, String>,
    pub vertex_normals: BTreeMap<u32, [f32; 3]>,
    /// Per polygon, the normals of its corners.
    pub split_normals: BTreeMap<u32, Vec<(u32, [f32; 3])>>,
    pub weight_maps: IndexMap<String, Vec<(u32, f32)>>,
    pub color_maps: IndexMap<String, ColorMap>,
    pub uv_maps: IndexMap<String, Vec<(u32, [f32; 2])>>,
    pub discontinuous_uv_maps: IndexMap<String, Vec<DiscontinuousUv>>,
    pub morphs: IndexMap<String, Vec<(u32, [f32; 3])>>,
    /// Crease weights keyed by directed edge `(next point, point)`.
    #[serde_as(as = "Vec<(_, _)>")]
    pub edge_weights: BTreeMap<(u32, u32), f32>,
    /// Polygon indices per surface tag.
    pub surface_tags: IndexMap<u16, Vec<u32>>,
    pub has_subds: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ColorMap {
    pub point_map: BTreeMap<u32, Rgba>,
    /// Polygon, then point.
    pub face_map: BTreeMap<u32, BTreeMap<u32, Rgba>>,
}

impl ColorMap {
    /// Merges `other` into `self`; values for the same point (and polygon) are overwritten.
    pub fn merge(&mut self, other: ColorMap) {
        self.point_map.extend(other.point_map);
        for (polygon, corners) in other.face_map {
            self.face_map.entry(polygon).or_default().extend(corners);
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct DiscontinuousUv {
    pub point: u32,
    pub polygon: u32,
    pub uv: [f32; 2],
}

/// Inserts `value` under `name`, or folds it into the existing entry with `combine`.
pub fn upsert<V, F>(maps: &mut IndexMap<String, V>, name: &str, value: V, combine: F)
where F: FnOnce(&mut V, V) {
    match maps.get_mut(name) {
        Some(existing) => combine(existing, value),
        None => {
            maps.insert(name.to_owned(), value);
        }
    }
}

/// `combine` for [`upsert`] that keeps only the newest value.
#[inline]
pub fn replace<V>(existing: &mut V, value: V) { *existing = value; }

#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Skelegon this bone was flattened from.
    pub skelegon: usize,
    pub head: [f32; 3],
    pub tail: [f32; 3],
    pub roll: Option<[f32; 3]>,
    pub parent: Option<usize>,
}

impl Layer {
    pub fn new(index: u16, name: impl Into<String>) -> Self {
        Self { index, name: name.into(), ..Default::default() }
    }

    /// Crease weight of the edge between `a` and `b`, in either direction.
    pub fn edge_weight(&self, a: u32, b: u32) -> Option<f32> {
        self.edge_weights.get(&(a, b)).or_else(|| self.edge_weights.get(&(b, a))).copied()
    }

    /// Expands a color map into per-polygon corner colors. Corners default to white, then take the
    /// point map value, then the face map value.
    pub fn corner_colors(&self, name: &str) -> Option<Vec<Vec<Rgba>>> {
        let map = self.color_maps.get(name)?;
        let colors = self
            .polygons
            .iter()
            .enumerate()
            .map(|(poly, corners)| {
                let face = map.face_map.get(&(poly as u32));
                corners
                    .iter()
                    .map(|point| {
                        face.and_then(|f| f.get(point))
                            .or_else(|| map.point_map.get(point))
                            .copied()
                            .unwrap_or([1.0; 4])
                    })
                    .collect()
            })
            .collect();
        Some(colors)
    }

    /// Flattens the skelegons into bones, one per consecutive point pair. A bone's parent is the
    /// first earlier bone whose tail sits on its head.
    pub fn skeleton(&self) -> Vec<Bone> {
        let mut bones: Vec<Bone> = vec![];
        for (skelegon, points) in self.bones.iter().enumerate() {
            let key = skelegon as u32;
            let name = self.bone_names.get(&key).map(String::as_str).unwrap_or("Bone");
            let roll = self.bone_rolls.get(&key).and_then(|r| parse_roll(r));
            for (segment, pair) in points.windows(2).enumerate() {
                let (Some(head), Some(tail)) =
                    (self.points.get(pair[0] as usize), self.points.get(pair[1] as usize))
                else {
                    continue;
                };
                let parent = bones.iter().position(|b| b.tail == *head);
                bones.push(Bone {
                    name: if segment == 0 {
                        name.to_owned()
                    } else {
                        format!("{name}.{segment:03}")
                    },
                    skelegon,
                    head: *head,
                    tail: *tail,
                    roll,
                    parent,
                });
            }
        }
        bones
    }

    /// Drops the per-layer maps a consumer no longer needs once the mesh is built.
    pub fn clear_scratch(&mut self) {
        self.bone_names.clear();
        self.bone_rolls.clear();
        self.weight_maps.clear();
        self.color_maps.clear();
        self.uv_maps.clear();
        self.discontinuous_uv_maps.clear();
        self.morphs.clear();
        self.surface_tags.clear();
    }
}

fn parse_roll(text: &str) -> Option<[f32; 3]> {
    let mut parts = text.split_whitespace().map(str::parse::<f32>);
    let roll = [parts.next()?.ok()?, parts.next()?.ok()?, parts.next()?.ok()?];
    Some(roll)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Surface {
    pub name: String,
    pub source_name: String,
    pub color: [f32; 3],
    pub diffuse: f32,
    pub luminosity: f32,
    pub specular: f32,
    pub reflection: f32,
    pub reflection_blur: f32,
    pub transparency: f32,
    pub refraction_index: f32,
    pub refraction_blur: f32,
    pub translucency: f32,
    pub glossiness: f32,
    pub sharpness: f32,
    pub smooth: bool,
    pub reflection_mode: u16,
    pub reflection_image: u16,
    /// 1 = single sided, 3 = double sided
    pub sidedness: u16,
    /// Image layers of the color channel, highest ordinal first.
    pub textures: Vec<Texture>,
    pub legacy_textures: Vec<LegacyTexture>,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            name: "Default".to_owned(),
            source_name: String::new(),
            color: [1.0, 1.0, 1.0],
            diffuse: 1.0,
            luminosity: 0.0,
            specular: 0.0,
            reflection: 0.0,
            reflection_blur: 0.0,
            transparency: 0.0,
            refraction_index: 1.0,
            refraction_blur: 0.0,
            translucency: 0.0,
            glossiness: 0.4,
            sharpness: 0.0,
            smooth: false,
            reflection_mode: 1,
            reflection_image: 0,
            sidedness: 1,
            textures: vec![],
            legacy_textures: vec![],
        }
    }
}

impl Surface {
    #[inline]
    pub fn double_sided(&self) -> bool { self.sidedness & 2 != 0 }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Texture {
    pub clip_id: u32,
    pub opacity: f32,
    pub opacity_mode: u16,
    pub enabled: bool,
    pub projection: u16,
    pub uv_map: String,
    pub axis: u16,
    pub wrap_width: u16,
    pub wrap_height: u16,
    pub wrap_width_amount: f32,
    pub wrap_height_amount: f32,
    /// Raw ordinal bytes; only used for ordering.
    pub ordinal: Vec<u8>,
    /// Shared by textures with equal ordinals.
    pub ord_seq_ix: usize,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            clip_id: 1,
            opacity: 1.0,
            opacity_mode: OpacityMode::Additive as u16,
            enabled: true,
            projection: ProjectionMode::Uv as u16,
            uv_map: "UVMap".to_owned(),
            axis: 0,
            wrap_width: WrapMode::Repeat as u16,
            wrap_height: WrapMode::Repeat as u16,
            wrap_width_amount: 1.0,
            wrap_height_amount: 1.0,
            ordinal: vec![],
            ord_seq_ix: 0,
        }
    }
}

impl Texture {
    #[inline]
    pub fn projection_mode(&self) -> Option<ProjectionMode> {
        ProjectionMode::from_repr(self.projection)
    }

    #[inline]
    pub fn opacity_kind(&self) -> Option<OpacityMode> { OpacityMode::from_repr(self.opacity_mode) }

    #[inline]
    pub fn wrap_modes(&self) -> (Option<WrapMode>, Option<WrapMode>) {
        (WrapMode::from_repr(self.wrap_width), WrapMode::from_repr(self.wrap_height))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromRepr, Display, Serialize)]
#[repr(u16)]
pub enum ProjectionMode {
    Planar = 0,
    Cylindrical = 1,
    Spherical = 2,
    Cubic = 3,
    FrontProjection = 4,
    Uv = 5,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromRepr, Display, Serialize)]
#[repr(u16)]
pub enum WrapMode {
    Reset = 0,
    Repeat = 1,
    Mirror = 2,
    Edge = 3,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, FromRepr, Display, Serialize)]
#[repr(u16)]
pub enum OpacityMode {
    Normal = 0,
    Subtractive = 1,
    Difference = 2,
    Multiply = 3,
    Divide = 4,
    Alpha = 5,
    TextureDisplacement = 6,
    Additive = 7,
}

/// Texture channel of a pre-6 surface.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Display, Serialize)]
pub enum TextureSlot {
    Color,
    Diffuse,
    Specular,
    Reflection,
    Transparency,
    Bump,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LegacyTexture {
    pub slot: Option<TextureSlot>,
    pub path: String,
    pub lock_x: bool,
    pub lock_y: bool,
    pub lock_z: bool,
}

/// Image reference with two candidate paths, to be tried in order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Clip {
    pub id: u32,
    pub path: String,
    pub relative_path: String,
}

impl Clip {
    #[inline]
    pub fn candidates(&self) -> [&str; 2] { [&self.path, &self.relative_path] }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_with_points(points: &[[f32; 3]]) -> Layer {
        Layer { points: points.to_vec(), ..Layer::new(0, "Layer 1") }
    }

    #[test]
    fn upsert_replace_and_merge() {
        let mut weights: IndexMap<String, Vec<(u32, f32)>> = IndexMap::new();
        upsert(&mut weights, "w", vec![(0, 1.0)], replace);
        upsert(&mut weights, "w", vec![(1, 0.5)], replace);
        assert_eq!(weights["w"], vec![(1, 0.5)]);

        let mut colors: IndexMap<String, ColorMap> = IndexMap::new();
        let first = ColorMap {
            point_map: BTreeMap::from([(0, [1.0; 4]), (1, [0.0; 4])]),
            ..Default::default()
        };
        let second = ColorMap { point_map: BTreeMap::from([(1, [0.5; 4])]), ..Default::default() };
        upsert(&mut colors, "c", first, ColorMap::merge);
        upsert(&mut colors, "c", second, ColorMap::merge);
        assert_eq!(colors["c"].point_map[&0], [1.0; 4]);
        assert_eq!(colors["c"].point_map[&1], [0.5; 4]);
    }

    #[test]
    fn color_map_merges_face_corners() {
        let mut map = ColorMap::default();
        map.face_map.entry(3).or_default().insert(1, [0.1; 4]);
        let mut other = ColorMap::default();
        other.face_map.entry(3).or_default().insert(2, [0.2; 4]);
        map.merge(other);
        assert_eq!(map.face_map[&3].len(), 2);
    }

    #[test]
    fn edge_weight_either_direction() {
        let mut layer = Layer::default();
        layer.edge_weights.insert((7, 6), 0.25);
        assert_eq!(layer.edge_weight(7, 6), Some(0.25));
        assert_eq!(layer.edge_weight(6, 7), Some(0.25));
        assert_eq!(layer.edge_weight(5, 6), None);
    }

    #[test]
    fn corner_colors_layering() {
        let mut layer = layer_with_points(&[[0.0; 3]; 3]);
        layer.polygons.push(vec![0, 1, 2]);
        let mut map = ColorMap::default();
        map.point_map.insert(1, [0.5, 0.5, 0.5, 1.0]);
        map.point_map.insert(2, [0.2, 0.2, 0.2, 1.0]);
        map.face_map.entry(0).or_default().insert(2, [0.0, 0.0, 1.0, 1.0]);
        layer.color_maps.insert("Col".to_owned(), map);

        let colors = layer.corner_colors("Col").unwrap();
        assert_eq!(colors, vec![vec![[1.0; 4], [0.5, 0.5, 0.5, 1.0], [0.0, 0.0, 1.0, 1.0]]]);
        assert!(layer.corner_colors("Missing").is_none());
    }

    #[test]
    fn skeleton_parents_and_names() {
        let mut layer = layer_with_points(&[
            [0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 3.0, 0.0],
        ]);
        layer.bones = vec![vec![0, 1], vec![1, 2, 3]];
        layer.bone_names.insert(0, "Hip".to_owned());
        layer.bone_rolls.insert(1, "0 1 0".to_owned());

        let bones = layer.skeleton();
        assert_eq!(bones.len(), 3);
        assert_eq!(bones[0].name, "Hip");
        assert_eq!(bones[0].parent, None);
        assert_eq!(bones[1].name, "Bone");
        assert_eq!(bones[1].parent, Some(0));
        assert_eq!(bones[1].roll, Some([0.0, 1.0, 0.0]));
        assert_eq!(bones[2].name, "Bone.001");
        assert_eq!(bones[2].parent, Some(1));
        assert_eq!(bones[2].skelegon, 1);
    }

    #[test]
    fn clear_scratch_keeps_geometry() {
        let mut layer = layer_with_points(&[[0.0; 3]]);
        layer.polygons.push(vec![0]);
        layer.weight_maps.insert("w".to_owned(), vec![(0, 1.0)]);
        layer.surface_tags.insert(0, vec![0]);
        layer.clear_scratch();
        assert!(layer.weight_maps.is_empty());
        assert!(layer.surface_tags.is_empty());
        assert_eq!(layer.points.len(), 1);
        assert_eq!(layer.polygons.len(), 1);
    }

    #[test]
    fn texture_codes() {
        let texture =
            Texture { projection: 2, wrap_width: 2, wrap_height: 9, ..Default::default() };
        assert_eq!(texture.projection_mode(), Some(ProjectionMode::Spherical));
        assert_eq!(texture.wrap_modes(), (Some(WrapMode::Mirror), None));
        assert_eq!(texture.opacity_kind(), Some(OpacityMode::Additive));
        assert_eq!(ProjectionMode::Uv.to_string(), "Uv");
    }

    #[test]
    fn surface_lookup_through_tags() {
        let mut scene = Scene::new(FormatVersion::Lwo2, DEFAULT_ALPHA_CHANNEL_NAME);
        scene.tags = vec!["Skin".to_owned(), "Cloth".to_owned()];
        let cloth = Surface { name: "Cloth".to_owned(), ..Default::default() };
        scene.surfaces.insert("Cloth".to_owned(), cloth);
        assert_eq!(scene.surface_for_tag(1).map(|s| s.name.as_str()), Some("Cloth"));
        assert!(scene.surface_for_tag(0).is_none());
        assert!(scene.surface_for_tag(5).is_none());
    }

    #[test]
    fn layer_hierarchy() {
        let mut scene = Scene::new(FormatVersion::Lwo2, DEFAULT_ALPHA_CHANNEL_NAME);
        scene.layers.push(Layer::new(3, "Root"));
        scene.layers.push(Layer { parent: Some(3), ..Layer::new(5, "Child") });
        let child = scene.layer_by_index(5).unwrap();
        assert_eq!(scene.layer_parent(child).map(|l| l.name.as_str()), Some("Root"));
        assert!(scene.layer_parent(&scene.layers[0]).is_none());
    }
}

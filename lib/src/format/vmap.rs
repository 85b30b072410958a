use std::{collections::BTreeMap, io::Cursor};

use zerocopy::BigEndian;

use crate::{
    error::{check_index, ReferenceKind, Result},
    format::{swap_yz, FourCC},
    scene::{replace, upsert, ColorMap, DiscontinuousUv, Layer, Rgba},
    util::read::{
        collect_records, read_f32, read_f32_array, read_four_cc, read_string, read_u16, read_vx,
    },
};

// Per-point vertex map
pub const K_CHUNK_VMAP: FourCC = FourCC(*b"VMAP");
// Per-polygon-corner vertex map
pub const K_CHUNK_VMAD: FourCC = FourCC(*b"VMAD");
// Polygon tag assignments
pub const K_CHUNK_PTAG: FourCC = FourCC(*b"PTAG");

pub const K_VMAP_WGHT: FourCC = FourCC(*b"WGHT");
pub const K_VMAP_MORF: FourCC = FourCC(*b"MORF");
pub const K_VMAP_SPOT: FourCC = FourCC(*b"SPOT");
pub const K_VMAP_TXUV: FourCC = FourCC(*b"TXUV");
pub const K_VMAP_RGB: FourCC = FourCC(*b"RGB ");
pub const K_VMAP_RGBA: FourCC = FourCC(*b"RGBA");
pub const K_VMAP_NORM: FourCC = FourCC(*b"NORM");

pub const K_PTAG_SURF: FourCC = FourCC(*b"SURF");
pub const K_PTAG_BONE: FourCC = FourCC(*b"BONE");
pub const K_PTAG_BNUP: FourCC = FourCC(*b"BNUP");

/// Only this discontinuous weight map is read, as subdivision edge creases.
pub const EDGE_WEIGHT_MAP_NAME: &str = "Edge Weight";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapKind {
    Weight,
    /// Relative morph target
    Morph,
    /// Absolute morph target
    Spot,
    Uv,
    Rgb,
    Rgba,
    Normal,
    Unknown(FourCC),
}

impl MapKind {
    pub fn from_four_cc(id: FourCC) -> Self {
        match id {
            K_VMAP_WGHT => Self::Weight,
            K_VMAP_MORF => Self::Morph,
            K_VMAP_SPOT => Self::Spot,
            K_VMAP_TXUV => Self::Uv,
            K_VMAP_RGB => Self::Rgb,
            K_VMAP_RGBA => Self::Rgba,
            K_VMAP_NORM => Self::Normal,
            id => Self::Unknown(id),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TagKind {
    Surface,
    BoneName,
    BoneRoll,
    Unknown(FourCC),
}

impl TagKind {
    pub fn from_four_cc(id: FourCC) -> Self {
        match id {
            K_PTAG_SURF => Self::Surface,
            K_PTAG_BONE => Self::BoneName,
            K_PTAG_BNUP => Self::BoneRoll,
            id => Self::Unknown(id),
        }
    }
}

/// Leading fields shared by VMAP and VMAD payloads.
#[derive(Clone, Debug)]
pub struct MapHeader {
    pub kind: MapKind,
    pub dimension: u16,
    pub name: String,
}

pub fn read_map_header(reader: &mut Cursor<&[u8]>) -> Result<MapHeader> {
    let kind = MapKind::from_four_cc(read_four_cc(reader)?);
    let dimension = read_u16::<BigEndian, _>(reader)?;
    let name = read_string(reader)?;
    Ok(MapHeader { kind, dimension, name })
}

/// Reads one `(point, value)` VMAP record. The point index is checked once the whole record has
/// been consumed, so a rejected record leaves the reader at the next one.
fn read_point_record<T, F>(
    reader: &mut Cursor<&[u8]>,
    layer: &Layer,
    read_value: F,
) -> Result<(u32, T)>
where
    F: FnOnce(&mut Cursor<&[u8]>) -> Result<T>,
{
    let point = read_vx(reader)?;
    let value = read_value(reader)?;
    check_index(ReferenceKind::Point, point, layer.points.len())?;
    Ok((point, value))
}

fn read_vector(reader: &mut Cursor<&[u8]>) -> Result<[f32; 3]> {
    Ok(swap_yz(read_f32_array::<BigEndian, _, 3>(reader)?))
}

fn read_uv(reader: &mut Cursor<&[u8]>) -> Result<[f32; 2]> {
    Ok(read_f32_array::<BigEndian, _, 2>(reader)?)
}

fn read_weight(reader: &mut Cursor<&[u8]>) -> Result<f32> { Ok(read_f32::<BigEndian, _>(reader)?) }

fn read_color(reader: &mut Cursor<&[u8]>, dimension: u16) -> Result<Rgba> {
    Ok(if dimension == 3 {
        let [r, g, b] = read_f32_array::<BigEndian, _, 3>(reader)?;
        [r, g, b, 1.0]
    } else {
        read_f32_array::<BigEndian, _, 4>(reader)?
    })
}

#[inline]
fn alpha_of(color: &Rgba) -> Rgba { [color[3], color[3], color[3], 1.0] }

fn color_dimension_supported(header: &MapHeader) -> bool {
    if matches!(header.dimension, 3 | 4) {
        true
    } else {
        log::warn!(
            "Skipping color map {:?} with unsupported dimension {}",
            header.name,
            header.dimension
        );
        false
    }
}

/// Decodes a VMAP chunk into the layer's named per-point maps. Records decoded before a
/// truncation are kept.
pub fn read_vmap(data: &[u8], layer: &mut Layer, alpha_channel_name: &str) -> Result<()> {
    let mut reader = Cursor::new(data);
    let header = read_map_header(&mut reader)?;
    log::debug!("Reading {:?} map {:?}", header.kind, header.name);
    match header.kind {
        MapKind::Weight => {
            let mut weights = vec![];
            let result = collect_records(&mut reader, &mut weights, |r| {
                read_point_record(r, layer, read_weight)
            });
            upsert(&mut layer.weight_maps, &header.name, weights, replace);
            result
        }
        MapKind::Morph | MapKind::Spot => {
            let relative = header.kind == MapKind::Morph;
            let mut deltas = vec![];
            let result = collect_records(&mut reader, &mut deltas, |r| {
                let (point, mut value) = read_point_record(r, layer, read_vector)?;
                if relative {
                    let base = layer.points[point as usize];
                    value = [base[0] + value[0], base[1] + value[1], base[2] + value[2]];
                }
                Ok((point, value))
            });
            upsert(&mut layer.morphs, &header.name, deltas, replace);
            result
        }
        MapKind::Uv => {
            let mut uvs = vec![];
            let result =
                collect_records(&mut reader, &mut uvs, |r| read_point_record(r, layer, read_uv));
            upsert(&mut layer.uv_maps, &header.name, uvs, replace);
            result
        }
        MapKind::Rgb | MapKind::Rgba => {
            if !color_dimension_supported(&header) {
                return Ok(());
            }
            let mut colors = vec![];
            let result = collect_records(&mut reader, &mut colors, |r| {
                read_point_record(r, layer, |r| read_color(r, header.dimension))
            });
            if header.dimension == 4 {
                let alpha = ColorMap {
                    point_map: colors.iter().map(|(p, c)| (*p, alpha_of(c))).collect(),
                    ..Default::default()
                };
                upsert(&mut layer.color_maps, alpha_channel_name, alpha, ColorMap::merge);
            }
            let map = ColorMap { point_map: colors.into_iter().collect(), ..Default::default() };
            upsert(&mut layer.color_maps, &header.name, map, ColorMap::merge);
            result
        }
        MapKind::Normal => {
            let mut normals = vec![];
            let result = collect_records(&mut reader, &mut normals, |r| {
                read_point_record(r, layer, read_vector)
            });
            layer.vertex_normals = normals.into_iter().collect();
            result
        }
        MapKind::Unknown(id) => {
            log::debug!("Skipping VMAP type {id}");
            Ok(())
        }
    }
}

/// Reads one `(point, polygon, value)` VMAD record. `polygon_base` is added to the stored polygon
/// index, which is relative to the most recent polygon chunk. Indices are checked after the value.
fn read_corner_record<T, F>(
    reader: &mut Cursor<&[u8]>,
    layer: &Layer,
    polygon_base: usize,
    read_value: F,
) -> Result<(u32, u32, T)>
where
    F: FnOnce(&mut Cursor<&[u8]>) -> Result<T>,
{
    let point = read_vx(reader)?;
    let polygon = read_vx(reader)? as usize + polygon_base;
    let value = read_value(reader)?;
    check_index(ReferenceKind::Point, point, layer.points.len())?;
    let polygon = u32::try_from(polygon).unwrap_or(u32::MAX);
    check_index(ReferenceKind::Polygon, polygon, layer.polygons.len())?;
    Ok((point, polygon, value))
}

/// Offset turning a VMAD or PTAG polygon index into a layer-wide index.
#[inline]
pub fn polygon_base(layer: &Layer, last_polygon_count: usize) -> usize {
    layer.polygons.len().saturating_sub(last_polygon_count)
}

/// Decodes a VMAD chunk into the layer's per-polygon-corner maps.
pub fn read_vmad(
    data: &[u8],
    layer: &mut Layer,
    polygon_base: usize,
    alpha_channel_name: &str,
) -> Result<()> {
    let mut reader = Cursor::new(data);
    let header = read_map_header(&mut reader)?;
    log::debug!("Reading discontinuous {:?} map {:?}", header.kind, header.name);
    match header.kind {
        MapKind::Uv => {
            let mut uvs = vec![];
            let result = collect_records(&mut reader, &mut uvs, |r| {
                let (point, polygon, uv) = read_corner_record(r, layer, polygon_base, read_uv)?;
                Ok(DiscontinuousUv { point, polygon, uv })
            });
            upsert(&mut layer.discontinuous_uv_maps, &header.name, uvs, replace);
            result
        }
        MapKind::Rgb | MapKind::Rgba => {
            if !color_dimension_supported(&header) {
                return Ok(());
            }
            let mut colors = vec![];
            let result = collect_records(&mut reader, &mut colors, |r| {
                let read_value = |r: &mut Cursor<&[u8]>| read_color(r, header.dimension);
                let (point, polygon, color) =
                    read_corner_record(r, layer, polygon_base, read_value)?;
                Ok((polygon, point, color))
            });
            if header.dimension == 4 {
                let mut alpha = ColorMap::default();
                for (polygon, point, color) in &colors {
                    alpha.face_map.entry(*polygon).or_default().insert(*point, alpha_of(color));
                }
                upsert(&mut layer.color_maps, alpha_channel_name, alpha, ColorMap::merge);
            }
            let mut map = ColorMap::default();
            for (polygon, point, color) in colors {
                map.face_map.entry(polygon).or_default().insert(point, color);
            }
            upsert(&mut layer.color_maps, &header.name, map, ColorMap::merge);
            result
        }
        MapKind::Weight if header.name == EDGE_WEIGHT_MAP_NAME => {
            let mut weights = vec![];
            let result = collect_records(&mut reader, &mut weights, |r| {
                read_corner_record(r, layer, polygon_base, read_weight)
            });
            for (point, polygon, weight) in weights {
                let corners = &layer.polygons[polygon as usize];
                let Some(at) = corners.iter().position(|&p| p == point) else {
                    continue;
                };
                let next = corners[(at + 1) % corners.len()];
                layer.edge_weights.insert((next, point), weight);
            }
            result
        }
        MapKind::Normal => {
            let mut normals = vec![];
            let result = collect_records(&mut reader, &mut normals, |r| {
                let (point, polygon, normal) =
                    read_corner_record(r, layer, polygon_base, read_vector)?;
                Ok((polygon, point, normal))
            });
            let mut split: BTreeMap<u32, Vec<(u32, [f32; 3])>> = BTreeMap::new();
            for (polygon, point, normal) in normals {
                split.entry(polygon).or_default().push((point, normal));
            }
            layer.split_normals = split;
            result
        }
        kind => {
            log::debug!("Skipping VMAD {kind:?} map {:?}", header.name);
            Ok(())
        }
    }
}

/// Decodes PTAG `SURF` records, grouping polygons by surface tag index.
pub fn read_surface_tags(
    data: &[u8],
    layer: &mut Layer,
    polygon_base: usize,
    tag_count: usize,
) -> Result<()> {
    log::debug!("Reading layer ({}) surface assignments", layer.name);
    let mut reader = Cursor::new(data);
    let mut assignments = vec![];
    let result = collect_records(&mut reader, &mut assignments, |r| {
        let polygon = read_vx(r)? as usize + polygon_base;
        let tag = read_u16::<BigEndian, _>(r)?;
        let polygon = u32::try_from(polygon).unwrap_or(u32::MAX);
        check_index(ReferenceKind::Polygon, polygon, layer.polygons.len())?;
        check_index(ReferenceKind::Tag, tag as u32, tag_count)?;
        Ok((tag, polygon))
    });
    for (tag, polygon) in assignments {
        layer.surface_tags.entry(tag).or_default().push(polygon);
    }
    result
}

/// Decodes PTAG `BONE`/`BNUP` records, resolving tag indices into skelegon names or roll vectors.
pub fn read_bone_tags(
    data: &[u8],
    layer: &mut Layer,
    kind: TagKind,
    tags: &[String],
) -> Result<()> {
    if !matches!(kind, TagKind::BoneName | TagKind::BoneRoll) {
        return Ok(());
    }
    let mut reader = Cursor::new(data);
    let mut assignments = vec![];
    let result = collect_records(&mut reader, &mut assignments, |r| {
        let bone = read_vx(r)?;
        let tag = read_u16::<BigEndian, _>(r)?;
        check_index(ReferenceKind::Bone, bone, layer.bones.len())?;
        let tag = check_index(ReferenceKind::Tag, tag as u32, tags.len())?;
        Ok((bone, tags[tag].clone()))
    });
    let target =
        if kind == TagKind::BoneName { &mut layer.bone_names } else { &mut layer.bone_rolls };
    target.extend(assignments);
    result
}

use std::io::Cursor;

use binrw::{binrw, BinReaderExt};
use zerocopy::BigEndian;

use crate::{
    error::{check_index, skip_inconsistent, LwoError, ReferenceKind, Result},
    format::{swap_yz, FourCC},
    scene::Layer,
    util::read::{
        at_end, collect_records, read_f32_array, read_i16, read_string, read_u16, read_vx,
        remaining,
    },
};

// Layer header
pub const K_CHUNK_LAYR: FourCC = FourCC(*b"LAYR");
// Point positions
pub const K_CHUNK_PNTS: FourCC = FourCC(*b"PNTS");
// Polygons, typed in LWO2
pub const K_CHUNK_POLS: FourCC = FourCC(*b"POLS");
// Pre-6 subdivision patches
pub const K_CHUNK_PCHS: FourCC = FourCC(*b"PCHS");
// Tag strings
pub const K_CHUNK_TAGS: FourCC = FourCC(*b"TAGS");
// Pre-6 surface names
pub const K_CHUNK_SRFS: FourCC = FourCC(*b"SRFS");

pub const K_POLS_FACE: FourCC = FourCC(*b"FACE");
pub const K_POLS_PTCH: FourCC = FourCC(*b"PTCH");
pub const K_POLS_SUBD: FourCC = FourCC(*b"SUBD");
pub const K_POLS_BONE: FourCC = FourCC(*b"BONE");

/// Corner counts carry flags in their top 6 bits.
const POLYGON_COUNT_MASK: u16 = 0x03FF;

#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct SLayerHeader {
    pub index: u16,
    pub flags: u16,
    pub pivot: [f32; 3],
}

#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct SLegacyLayerHeader {
    pub index: u16,
    pub flags: u16,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PolygonKind {
    Face,
    /// Subdivision patch
    Patch,
    /// Catmull-Clark cage
    Subdivision,
    /// Skelegon chain
    Bone,
    Unknown(FourCC),
}

impl PolygonKind {
    pub fn from_four_cc(id: FourCC) -> Self {
        match id {
            K_POLS_FACE => Self::Face,
            K_POLS_PTCH => Self::Patch,
            K_POLS_SUBD => Self::Subdivision,
            K_POLS_BONE => Self::Bone,
            id => Self::Unknown(id),
        }
    }

    #[inline]
    pub fn is_subdivision(self) -> bool { matches!(self, Self::Patch | Self::Subdivision) }
}

/// Decodes an LWO2 layer header. Returns the new layer and its flags; non-zero flags mark a hidden
/// layer.
pub fn read_layer(data: &[u8]) -> Result<(Layer, u16)> {
    let mut reader = Cursor::new(data);
    let header: SLayerHeader = reader.read_be()?;
    let name = read_string(&mut reader)?;
    let parent = if remaining(&reader).len() == 2 {
        let parent = read_i16::<BigEndian, _>(&mut reader)?;
        u16::try_from(parent).ok()
    } else {
        None
    };
    let name = if name.is_empty() { format!("Layer {}", header.index as u32 + 1) } else { name };
    let layer = Layer {
        parent,
        pivot: swap_yz(header.pivot),
        ..Layer::new(header.index, name)
    };
    Ok((layer, header.flags))
}

/// Decodes a pre-6 layer header. Placeholder names fall back to `Layer {index}`.
pub fn read_legacy_layer(data: &[u8]) -> Result<Layer> {
    let mut reader = Cursor::new(data);
    let header: SLegacyLayerHeader = reader.read_be()?;
    let start = reader.position();
    let name = read_string(&mut reader)?;
    let name_len = reader.position() - start;
    let name =
        if name_len > 2 && name != "noname" { name } else { format!("Layer {}", header.index) };
    Ok(Layer::new(header.index, name))
}

/// Appends consecutive strings to the tag table.
pub fn read_tags(data: &[u8], tags: &mut Vec<String>) -> Result<()> {
    let mut reader = Cursor::new(data);
    while !at_end(&reader) {
        tags.push(read_string(&mut reader)?);
    }
    Ok(())
}

/// Appends points to `layer`, swapping Y/Z and subtracting the layer pivot.
pub fn read_points(data: &[u8], layer: &mut Layer) -> Result<()> {
    log::debug!("Reading layer ({}) points", layer.name);
    let pivot = layer.pivot;
    let mut reader = Cursor::new(data);
    collect_records(&mut reader, &mut layer.points, |r| {
        let p = swap_yz(read_f32_array::<BigEndian, _, 3>(r)?);
        Ok([p[0] - pivot[0], p[1] - pivot[1], p[2] - pivot[2]])
    })
}

fn read_point_list(reader: &mut Cursor<&[u8]>, count: u16, point_count: usize) -> Result<Vec<u32>> {
    let mut points = Vec::with_capacity(count as usize);
    for _ in 0..count {
        points.push(read_vx(reader)?);
    }
    for &point in &points {
        check_index(ReferenceKind::Point, point, point_count)?;
    }
    Ok(points)
}

/// Appends `FACE`/`PTCH`/`SUBD` polygons with reversed winding. Returns the number of polygons
/// added.
pub fn read_polygons(data: &[u8], layer: &mut Layer, kind: PolygonKind) -> Result<usize> {
    log::debug!("Reading layer ({}) polygons", layer.name);
    if kind.is_subdivision() {
        layer.has_subds = true;
    }
    let point_count = layer.points.len();
    let before = layer.polygons.len();
    let mut reader = Cursor::new(data);
    collect_records(&mut reader, &mut layer.polygons, |r| {
        let count = read_u16::<BigEndian, _>(r)? & POLYGON_COUNT_MASK;
        let mut corners = read_point_list(r, count, point_count)?;
        corners.reverse();
        Ok(corners)
    })?;
    Ok(layer.polygons.len() - before)
}

/// Appends skelegons, each an ordered list of points.
pub fn read_bones(data: &[u8], layer: &mut Layer) -> Result<()> {
    log::debug!("Reading layer ({}) bones", layer.name);
    let point_count = layer.points.len();
    let mut reader = Cursor::new(data);
    collect_records(&mut reader, &mut layer.bones, |r| {
        let count = read_u16::<BigEndian, _>(r)?;
        read_point_list(r, count, point_count)
    })
}

/// Appends pre-6 polygons, which use fixed 16-bit point indices and carry a trailing 1-based
/// surface index. The surface assignment is grouped into the layer's surface tags right away; a
/// polygon whose surface index is 0 or out of range is kept without an assignment.
/// Returns the number of polygons added.
pub fn read_legacy_polygons(data: &[u8], layer: &mut Layer, tag_count: usize) -> Result<usize> {
    log::debug!("Reading layer ({}) polygons", layer.name);
    let point_count = layer.points.len();
    let mut reader = Cursor::new(data);
    let mut records = vec![];
    let result = collect_records(&mut reader, &mut records, |r| {
        let count = read_u16::<BigEndian, _>(r)?;
        let mut corners = Vec::with_capacity(count as usize);
        for _ in 0..count {
            corners.push(read_u16::<BigEndian, _>(r)? as u32);
        }
        let surface = read_i16::<BigEndian, _>(r)?;
        for &point in &corners {
            check_index(ReferenceKind::Point, point, point_count)?;
        }
        let tag = match surface {
            0 => Err(LwoError::InconsistentReference {
                kind: ReferenceKind::Surface,
                index: 0,
                count: tag_count,
            }),
            id => check_index(ReferenceKind::Surface, id.unsigned_abs() as u32 - 1, tag_count)
                .map(|tag| tag as u16),
        };
        corners.reverse();
        Ok((corners, skip_inconsistent(tag)?))
    });
    let added = records.len();
    for (corners, tag) in records {
        let polygon = layer.polygons.len() as u32;
        layer.polygons.push(corners);
        if let Some(tag) = tag {
            layer.surface_tags.entry(tag).or_default().push(polygon);
        }
    }
    result.map(|_| added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32s(values: &[f32]) -> Vec<u8> { values.iter().flat_map(|v| v.to_be_bytes()).collect() }

    #[test]
    fn layer_header_with_parent() {
        let mut data = vec![0, 2, 0, 0];
        data.extend(f32s(&[1.0, 2.0, 3.0]));
        data.extend(b"Body\0\0");
        data.extend(0i16.to_be_bytes());
        let (layer, flags) = read_layer(&data).unwrap();
        assert_eq!(flags, 0);
        assert_eq!(layer.index, 2);
        assert_eq!(layer.name, "Body");
        assert_eq!(layer.pivot, [1.0, 3.0, 2.0]);
        assert_eq!(layer.parent, Some(0));
    }

    #[test]
    fn layer_header_defaults() {
        let mut data = vec![0, 4, 0, 1];
        data.extend(f32s(&[0.0; 3]));
        data.extend(b"\0\0");
        data.extend((-1i16).to_be_bytes());
        let (layer, flags) = read_layer(&data).unwrap();
        assert_eq!(flags, 1);
        assert_eq!(layer.name, "Layer 5");
        assert_eq!(layer.parent, None);
    }

    #[test]
    fn legacy_layer_names() {
        let layer = read_legacy_layer(b"\0\x03\0\0Arm\0").unwrap();
        assert_eq!(layer.name, "Arm");
        let layer = read_legacy_layer(b"\0\x03\0\0noname\0\0").unwrap();
        assert_eq!(layer.name, "Layer 3");
        let layer = read_legacy_layer(b"\0\x07\0\0A\0").unwrap();
        assert_eq!(layer.name, "Layer 7");
    }

    #[test]
    fn tags_in_order() {
        let mut tags = vec![];
        read_tags(b"Default\0Skin\0\0", &mut tags).unwrap();
        assert_eq!(tags, ["Default", "Skin"]);
    }

    #[test]
    fn points_swapped_and_pivot_relative() {
        let mut layer = Layer::new(0, "Layer 1");
        read_points(&f32s(&[1.0, 2.0, 3.0]), &mut layer).unwrap();
        assert_eq!(layer.points, vec![[1.0, 3.0, 2.0]]);

        let mut layer = Layer { pivot: [1.0, 1.0, 1.0], ..Layer::new(0, "Layer 1") };
        read_points(&f32s(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), &mut layer).unwrap();
        assert_eq!(layer.points, vec![[0.0, 2.0, 1.0], [3.0, 5.0, 4.0]]);
    }

    #[test]
    fn truncated_points_keep_decoded() {
        let mut layer = Layer::default();
        let mut data = f32s(&[1.0, 2.0, 3.0]);
        data.extend(f32s(&[4.0]));
        assert!(read_points(&data, &mut layer).unwrap_err().is_truncated());
        assert_eq!(layer.points.len(), 1);
    }

    fn layer_with_points(count: usize) -> Layer {
        Layer { points: vec![[0.0; 3]; count], ..Layer::new(0, "Layer 1") }
    }

    #[test]
    fn polygons_reversed() {
        let mut layer = layer_with_points(3);
        let data = [0, 3, 0, 2, 0, 1, 0, 0];
        let added = read_polygons(&data, &mut layer, PolygonKind::Face).unwrap();
        assert_eq!(added, 1);
        assert_eq!(layer.polygons, vec![vec![0, 1, 2]]);
        assert!(!layer.has_subds);
    }

    #[test]
    fn polygon_count_flags_masked() {
        let mut layer = layer_with_points(3);
        // 0xFC03: flag bits set, three corners; one long-form VX index
        let data = [0xFC, 0x03, 0xFF, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00];
        read_polygons(&data, &mut layer, PolygonKind::Patch).unwrap();
        assert_eq!(layer.polygons, vec![vec![0, 2, 1]]);
        assert!(layer.has_subds);
    }

    #[test]
    fn polygon_with_bad_point_skipped() {
        let mut layer = layer_with_points(3);
        let data = [0, 2, 0, 0, 0, 9, 0, 2, 0, 1, 0, 2];
        let added = read_polygons(&data, &mut layer, PolygonKind::Face).unwrap();
        assert_eq!(added, 1);
        assert_eq!(layer.polygons, vec![vec![2, 1]]);
    }

    #[test]
    fn bones_keep_order() {
        let mut layer = layer_with_points(3);
        read_bones(&[0, 2, 0, 0, 0, 1, 0, 3, 0, 0, 0, 1, 0, 2], &mut layer).unwrap();
        assert_eq!(layer.bones, vec![vec![0, 1], vec![0, 1, 2]]);
    }

    #[test]
    fn legacy_polygons_group_surfaces() {
        let mut layer = layer_with_points(4);
        layer.polygons.push(vec![0, 1, 2]);
        let mut data = vec![];
        data.extend([0, 3, 0, 2, 0, 1, 0, 0, 0, 1]);
        data.extend([0, 3, 0, 1, 0, 2, 0, 3]);
        data.extend((-2i16).to_be_bytes());
        let added = read_legacy_polygons(&data, &mut layer, 2).unwrap();
        assert_eq!(added, 2);
        assert_eq!(layer.polygons[1], vec![0, 1, 2]);
        assert_eq!(layer.polygons[2], vec![3, 2, 1]);
        assert_eq!(layer.surface_tags[&0], vec![1]);
        assert_eq!(layer.surface_tags[&1], vec![2]);
    }

    #[test]
    fn legacy_bad_surface_keeps_polygon() {
        let mut layer = layer_with_points(3);
        let mut data = vec![];
        // Surface 0
        data.extend([0, 1, 0, 0, 0, 0]);
        // Surface 3 of 1
        data.extend([0, 1, 0, 2, 0, 3]);
        data.extend([0, 1, 0, 1, 0, 1]);
        let added = read_legacy_polygons(&data, &mut layer, 1).unwrap();
        assert_eq!(added, 3);
        assert_eq!(layer.polygons, vec![vec![0], vec![2], vec![1]]);
        assert_eq!(layer.surface_tags.len(), 1);
        assert_eq!(layer.surface_tags[&0], vec![2]);
    }

    #[test]
    fn polygon_kinds() {
        assert_eq!(PolygonKind::from_four_cc(FourCC(*b"SUBD")), PolygonKind::Subdivision);
        assert_eq!(
            PolygonKind::from_four_cc(FourCC(*b"MBAL")),
            PolygonKind::Unknown(FourCC(*b"MBAL"))
        );
    }
}

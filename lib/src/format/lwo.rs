use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::Context;
use binrw::{binrw, BinReaderExt};
use serde_derive::Serialize;

use crate::{
    error::{LwoError, Result},
    format::{
        chunk::{chunks, sub_chunks, Chunk},
        clip::{read_clip, K_CHUNK_CLIP},
        layr::{
            read_bones, read_layer, read_legacy_layer, read_legacy_polygons, read_points,
            read_polygons, read_tags, PolygonKind, K_CHUNK_LAYR, K_CHUNK_PCHS, K_CHUNK_PNTS,
            K_CHUNK_POLS, K_CHUNK_SRFS, K_CHUNK_TAGS,
        },
        peek_four_cc,
        surf::{read_legacy_surface, read_surface, K_CHUNK_SURF, K_SURF_BLOK},
        vmap::{
            polygon_base, read_bone_tags, read_surface_tags, read_vmad, read_vmap, TagKind,
            K_CHUNK_PTAG, K_CHUNK_VMAD, K_CHUNK_VMAP,
        },
        FourCC,
    },
    scene::{FormatVersion, Layer, Scene, DEFAULT_ALPHA_CHANNEL_NAME},
    util::{
        file::{map_file, source_dir},
        read::decode_string_bytes,
    },
};

// IFF container
pub const K_FORM_FORM: FourCC = FourCC(*b"FORM");

/// Name given to a layer created for geometry that precedes any `LAYR` chunk.
pub const DEFAULT_LAYER_NAME: &str = "Layer 1";

#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct SFileHeader {
    pub magic: FourCC,
    pub size: u32,
    pub format: FourCC,
}

pub const FILE_HEADER_SIZE: usize = 12;

#[derive(Clone, Debug)]
pub struct ImportOptions {
    /// Decode layers flagged as hidden instead of skipping them.
    pub load_hidden: bool,
    /// Decode skelegon name and roll tags.
    pub import_skelegons: bool,
    /// Color map receiving the alpha channel of RGBA maps.
    pub alpha_channel_name: String,
    /// Consumer policy: share one image per path across surfaces.
    pub single_image_instance: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            load_hidden: false,
            import_skelegons: true,
            alpha_channel_name: DEFAULT_ALPHA_CHANNEL_NAME.to_owned(),
            single_image_instance: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Lwo2Chunk {
    Tags,
    Layer,
    Points,
    VertexMap,
    DiscontinuousMap,
    Polygons,
    PolygonTags,
    Surface,
    Clip,
    Unknown(FourCC),
}

impl Lwo2Chunk {
    pub fn from_four_cc(id: FourCC) -> Self {
        match id {
            K_CHUNK_TAGS => Self::Tags,
            K_CHUNK_LAYR => Self::Layer,
            K_CHUNK_PNTS => Self::Points,
            K_CHUNK_VMAP => Self::VertexMap,
            K_CHUNK_VMAD => Self::DiscontinuousMap,
            K_CHUNK_POLS => Self::Polygons,
            K_CHUNK_PTAG => Self::PolygonTags,
            K_CHUNK_SURF => Self::Surface,
            K_CHUNK_CLIP => Self::Clip,
            id => Self::Unknown(id),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LegacyChunk {
    SurfaceNames,
    Layer,
    Points,
    Polygons,
    Patches,
    PolygonTags,
    Surface,
    Unknown(FourCC),
}

impl LegacyChunk {
    pub fn from_four_cc(id: FourCC) -> Self {
        match id {
            K_CHUNK_SRFS => Self::SurfaceNames,
            K_CHUNK_LAYR => Self::Layer,
            K_CHUNK_PNTS => Self::Points,
            K_CHUNK_POLS => Self::Polygons,
            K_CHUNK_PCHS => Self::Patches,
            K_CHUNK_PTAG => Self::PolygonTags,
            K_CHUNK_SURF => Self::Surface,
            id => Self::Unknown(id),
        }
    }
}

/// Reads and validates the 12-byte file header.
pub fn read_header(data: &[u8]) -> Result<(SFileHeader, FormatVersion)> {
    if data.len() < FILE_HEADER_SIZE {
        return Err(LwoError::truncated(format!(
            "file header needs {FILE_HEADER_SIZE} bytes, {} available",
            data.len()
        )));
    }
    let header: SFileHeader = Cursor::new(data).read_be()?;
    let format = FormatVersion::from_four_cc(header.format)
        .ok_or(LwoError::UnsupportedFormat(header.format))?;
    Ok((header, format))
}

/// Splits the leading type tag off a typed chunk payload (`POLS`, `PTAG`).
fn split_type(data: &[u8]) -> Result<(FourCC, &[u8])> {
    let kind = peek_four_cc(data).ok_or_else(|| LwoError::truncated("chunk type tag"))?;
    Ok((kind, &data[4..]))
}

fn current_layer(layers: &mut Vec<Layer>) -> &mut Layer {
    if layers.is_empty() {
        log::info!("Creating implicit layer for geometry without LAYR");
        layers.push(Layer::new(0, DEFAULT_LAYER_NAME));
    }
    let last = layers.len() - 1;
    &mut layers[last]
}

struct Parser<'a> {
    scene: Scene,
    options: &'a ImportOptions,
    source_dir: String,
    /// False while the chunks of a skipped hidden layer are being read.
    handle_layer: bool,
    /// Polygons added by the most recent polygon chunk of the current layer.
    last_polygon_count: usize,
    /// Set when the most recent `POLS` chunk held skelegons.
    just_read_bones: bool,
}

impl<'a> Parser<'a> {
    fn new(format: FormatVersion, source_dir: &Path, options: &'a ImportOptions) -> Self {
        Self {
            scene: Scene::new(format, options.alpha_channel_name.clone()),
            options,
            source_dir: source_dir.to_string_lossy().into_owned(),
            handle_layer: true,
            last_polygon_count: 0,
            just_read_bones: false,
        }
    }

    fn begin_layer(&mut self) {
        self.last_polygon_count = 0;
        self.just_read_bones = false;
    }

    fn read_lwo2_chunk(&mut self, chunk: Chunk) -> Result<()> {
        let kind = Lwo2Chunk::from_four_cc(chunk.id);
        match kind {
            Lwo2Chunk::Tags => read_tags(chunk.data, &mut self.scene.tags)?,
            Lwo2Chunk::Layer => {
                self.begin_layer();
                self.handle_layer = false;
                let (layer, flags) = read_layer(chunk.data)?;
                if flags != 0 && !self.options.load_hidden {
                    log::info!("Skipping hidden layer {:?}", layer.name);
                    return Ok(());
                }
                log::info!("Reading layer {:?}", layer.name);
                self.handle_layer = true;
                self.scene.layers.push(layer);
            }
            Lwo2Chunk::Surface => read_surface(chunk.data, &mut self.scene.surfaces)?,
            Lwo2Chunk::Clip => {
                let clip = read_clip(chunk.data, &self.source_dir)?;
                self.scene.clips.insert(clip.id, clip);
            }
            Lwo2Chunk::Unknown(id) => log::debug!("Skipping chunk {id}"),
            _ if !self.handle_layer => log::debug!("Skipping {} chunk of hidden layer", chunk.id),
            Lwo2Chunk::Points => read_points(chunk.data, current_layer(&mut self.scene.layers))?,
            Lwo2Chunk::VertexMap => read_vmap(
                chunk.data,
                current_layer(&mut self.scene.layers),
                &self.options.alpha_channel_name,
            )?,
            Lwo2Chunk::DiscontinuousMap => {
                let layer = current_layer(&mut self.scene.layers);
                let base = polygon_base(layer, self.last_polygon_count);
                read_vmad(chunk.data, layer, base, &self.options.alpha_channel_name)?
            }
            Lwo2Chunk::Polygons => {
                let (kind, data) = split_type(chunk.data)?;
                self.just_read_bones = false;
                let layer = current_layer(&mut self.scene.layers);
                match PolygonKind::from_four_cc(kind) {
                    PolygonKind::Bone => {
                        self.just_read_bones = true;
                        read_bones(data, layer)?;
                    }
                    PolygonKind::Unknown(id) => log::debug!("Skipping POLS type {id}"),
                    kind => {
                        let before = layer.polygons.len();
                        let result = read_polygons(data, layer, kind);
                        self.last_polygon_count = layer.polygons.len() - before;
                        result?;
                    }
                }
            }
            Lwo2Chunk::PolygonTags => {
                let (kind, data) = split_type(chunk.data)?;
                let layer = current_layer(&mut self.scene.layers);
                match TagKind::from_four_cc(kind) {
                    TagKind::Surface if self.just_read_bones => {
                        log::debug!("Ignoring surface tags of skelegons")
                    }
                    TagKind::Surface => {
                        let base = polygon_base(layer, self.last_polygon_count);
                        read_surface_tags(data, layer, base, self.scene.tags.len())?
                    }
                    kind @ (TagKind::BoneName | TagKind::BoneRoll) => {
                        if self.options.import_skelegons {
                            read_bone_tags(data, layer, kind, &self.scene.tags)?
                        }
                    }
                    TagKind::Unknown(id) => log::debug!("Skipping PTAG type {id}"),
                }
            }
        }
        Ok(())
    }

    fn read_legacy_chunk(&mut self, chunk: Chunk) -> Result<()> {
        match LegacyChunk::from_four_cc(chunk.id) {
            LegacyChunk::SurfaceNames => read_tags(chunk.data, &mut self.scene.tags)?,
            LegacyChunk::Layer => {
                self.begin_layer();
                let layer = read_legacy_layer(chunk.data)?;
                log::info!("Reading layer {:?}", layer.name);
                self.scene.layers.push(layer);
            }
            LegacyChunk::Points => read_points(chunk.data, current_layer(&mut self.scene.layers))?,
            LegacyChunk::Polygons | LegacyChunk::Patches => {
                let layer = current_layer(&mut self.scene.layers);
                if chunk.id == K_CHUNK_PCHS {
                    layer.has_subds = true;
                }
                let before = layer.polygons.len();
                let result = read_legacy_polygons(chunk.data, layer, self.scene.tags.len());
                self.last_polygon_count = layer.polygons.len() - before;
                result?;
            }
            LegacyChunk::PolygonTags => {
                let (kind, data) = split_type(chunk.data)?;
                if TagKind::from_four_cc(kind) == TagKind::Surface {
                    let layer = current_layer(&mut self.scene.layers);
                    let base = polygon_base(layer, self.last_polygon_count);
                    read_surface_tags(data, layer, base, self.scene.tags.len())?;
                } else {
                    log::debug!("Skipping PTAG type {kind}");
                }
            }
            LegacyChunk::Surface => {
                read_legacy_surface(chunk.data, &mut self.scene.surfaces, &self.source_dir)?
            }
            LegacyChunk::Unknown(id) => log::debug!("Skipping chunk {id}"),
        }
        Ok(())
    }

    fn run(mut self, body: &[u8]) -> Scene {
        let legacy = self.scene.format.is_legacy();
        for chunk in chunks(body) {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    log::warn!("Stopping at truncated chunk: {e}");
                    break;
                }
            };
            let result =
                if legacy { self.read_legacy_chunk(chunk) } else { self.read_lwo2_chunk(chunk) };
            if let Err(e) = result {
                log::warn!("Failed to read {} chunk: {e}", chunk.id);
            }
        }
        self.scene
    }
}

impl Scene {
    /// Decodes a complete LWO file image. `source_dir` is the directory image paths are resolved
    /// against.
    pub fn parse(data: &[u8], source_dir: &Path, options: &ImportOptions) -> Result<Scene> {
        let (header, format) = read_header(data)?;
        log::info!("Importing {} object ({:?})", header.format, format);
        let scene = Parser::new(format, source_dir, options).run(&data[FILE_HEADER_SIZE..]);
        log::info!(
            "Read {} layer(s), {} surface(s), {} clip(s)",
            scene.layers.len(),
            scene.surfaces.len(),
            scene.clips.len()
        );
        Ok(scene)
    }
}

/// Memory maps and decodes the object at `path`.
pub fn load<P: AsRef<Path>>(path: P, options: &ImportOptions) -> anyhow::Result<Scene> {
    let path = path.as_ref();
    let data = map_file(path)?;
    let dir: PathBuf = source_dir(path);
    let scene = Scene::parse(&data, &dir, options)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(scene)
}

#[derive(Clone, Debug, Serialize)]
pub struct ChunkNode {
    pub id: FourCC,
    pub size: usize,
    pub children: Vec<ChunkNode>,
}

/// Chunk layout of a file, for inspection.
#[derive(Clone, Debug, Serialize)]
pub struct ChunkTree {
    pub format: FourCC,
    pub chunks: Vec<ChunkNode>,
}

fn sub_chunk_nodes(data: &[u8], descend: bool) -> Vec<ChunkNode> {
    let mut out = vec![];
    for chunk in sub_chunks(data) {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("Stopping sub-chunk walk: {e}");
                break;
            }
        };
        let children = if descend && chunk.id == K_SURF_BLOK {
            sub_chunk_nodes(chunk.data, false)
        } else {
            vec![]
        };
        out.push(ChunkNode { id: chunk.id, size: chunk.data.len(), children });
    }
    out
}

/// Skips the leading strings of a surface payload.
fn skip_strings(mut data: &[u8], count: usize) -> &[u8] {
    for _ in 0..count {
        match decode_string_bytes(data) {
            Ok((_, len)) => data = data.get(len..).unwrap_or_default(),
            Err(_) => return &[],
        }
    }
    data
}

/// Walks the top-level chunks, descending into `SURF` and `BLOK` sub-chunks.
pub fn dump_chunks(data: &[u8]) -> Result<ChunkTree> {
    let (header, format) = read_header(data)?;
    let names = if format.is_legacy() { 1 } else { 2 };
    let mut nodes = vec![];
    for chunk in chunks(&data[FILE_HEADER_SIZE..]) {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                log::warn!("Stopping at truncated chunk: {e}");
                break;
            }
        };
        let children = if chunk.id == K_CHUNK_SURF {
            sub_chunk_nodes(skip_strings(chunk.data, names), true)
        } else {
            vec![]
        };
        nodes.push(ChunkNode { id: chunk.id, size: chunk.data.len(), children });
    }
    Ok(ChunkTree { format: header.format, chunks: nodes })
}

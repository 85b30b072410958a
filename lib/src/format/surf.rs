use std::io::Cursor;

use indexmap::IndexMap;
use zerocopy::BigEndian;

use crate::{
    error::{LwoError, Result},
    format::{
        chunk::{sub_chunks, Chunk},
        clip::join_source_dir,
        peek_four_cc, FourCC,
    },
    scene::{LegacyTexture, Surface, Texture, TextureSlot},
    util::read::{
        decode_string_bytes, read_f32, read_f32_array, read_four_cc, read_i16, read_string,
        read_u16, read_u8, read_vx, remaining,
    },
};

// Surface definition
pub const K_CHUNK_SURF: FourCC = FourCC(*b"SURF");

pub const K_SURF_COLR: FourCC = FourCC(*b"COLR");
pub const K_SURF_DIFF: FourCC = FourCC(*b"DIFF");
pub const K_SURF_LUMI: FourCC = FourCC(*b"LUMI");
pub const K_SURF_SPEC: FourCC = FourCC(*b"SPEC");
pub const K_SURF_REFL: FourCC = FourCC(*b"REFL");
pub const K_SURF_RBLR: FourCC = FourCC(*b"RBLR");
pub const K_SURF_TRAN: FourCC = FourCC(*b"TRAN");
pub const K_SURF_RIND: FourCC = FourCC(*b"RIND");
pub const K_SURF_TBLR: FourCC = FourCC(*b"TBLR");
pub const K_SURF_TRNL: FourCC = FourCC(*b"TRNL");
pub const K_SURF_GLOS: FourCC = FourCC(*b"GLOS");
pub const K_SURF_SHRP: FourCC = FourCC(*b"SHRP");
pub const K_SURF_SMAN: FourCC = FourCC(*b"SMAN");
pub const K_SURF_RFOP: FourCC = FourCC(*b"RFOP");
pub const K_SURF_RIMG: FourCC = FourCC(*b"RIMG");
pub const K_SURF_SIDE: FourCC = FourCC(*b"SIDE");
pub const K_SURF_BLOK: FourCC = FourCC(*b"BLOK");

// Texture block header kinds
pub const K_BLOK_IMAP: FourCC = FourCC(*b"IMAP");

pub const K_BLOK_CHAN: FourCC = FourCC(*b"CHAN");
pub const K_BLOK_OPAC: FourCC = FourCC(*b"OPAC");
pub const K_BLOK_ENAB: FourCC = FourCC(*b"ENAB");
pub const K_BLOK_IMAG: FourCC = FourCC(*b"IMAG");
pub const K_BLOK_PROJ: FourCC = FourCC(*b"PROJ");
pub const K_BLOK_VMAP: FourCC = FourCC(*b"VMAP");
pub const K_BLOK_AXIS: FourCC = FourCC(*b"AXIS");
pub const K_BLOK_WRAP: FourCC = FourCC(*b"WRAP");
pub const K_BLOK_WRPW: FourCC = FourCC(*b"WRPW");
pub const K_BLOK_WRPH: FourCC = FourCC(*b"WRPH");

// Pre-6 texture slots
pub const K_SURF_CTEX: FourCC = FourCC(*b"CTEX");
pub const K_SURF_DTEX: FourCC = FourCC(*b"DTEX");
pub const K_SURF_STEX: FourCC = FourCC(*b"STEX");
pub const K_SURF_RTEX: FourCC = FourCC(*b"RTEX");
pub const K_SURF_TTEX: FourCC = FourCC(*b"TTEX");
pub const K_SURF_BTEX: FourCC = FourCC(*b"BTEX");
// Pre-6 texture image and flags
pub const K_SURF_TIMG: FourCC = FourCC(*b"TIMG");
pub const K_SURF_TFLG: FourCC = FourCC(*b"TFLG");

/// Placeholder path of a pre-6 texture slot without an image.
const NO_IMAGE: &str = "(none)";

/// Pre-6 scalars are fixed point with this divisor, and 8-bit colors use 255.
const LEGACY_SCALAR_DIVISOR: f32 = 256.0;
const LEGACY_COLOR_DIVISOR: f32 = 255.0;

impl TextureSlot {
    pub fn from_four_cc(id: FourCC) -> Option<Self> {
        Some(match id {
            K_SURF_CTEX => Self::Color,
            K_SURF_DTEX => Self::Diffuse,
            K_SURF_STEX => Self::Specular,
            K_SURF_RTEX => Self::Reflection,
            K_SURF_TTEX => Self::Transparency,
            K_SURF_BTEX => Self::Bump,
            _ => return None,
        })
    }
}

fn read_scalar(chunk: &Chunk) -> Result<f32> { Ok(read_f32::<BigEndian, _>(&mut chunk.reader())?) }

fn read_code(chunk: &Chunk) -> Result<u16> { Ok(read_u16::<BigEndian, _>(&mut chunk.reader())?) }

/// Decodes an LWO2 surface and stores it under its name, replacing an earlier surface of the same
/// name in place. A surface cut short by truncation is still stored with the fields read so far.
pub fn read_surface(data: &[u8], surfaces: &mut IndexMap<String, Surface>) -> Result<()> {
    if surfaces.is_empty() {
        log::info!("Reading object surfaces");
    }
    let mut reader = Cursor::new(data);
    let mut surface = Surface::default();
    let name = read_string(&mut reader)?;
    if !name.is_empty() {
        surface.name = name;
    }
    let result = read_string(&mut reader).and_then(|source_name| {
        surface.source_name = source_name;
        read_surface_fields(remaining(&reader), &mut surface)
    });
    sort_textures(&mut surface.textures);
    log::debug!("Surface {:?}: {} texture layer(s)", surface.name, surface.textures.len());
    surfaces.insert(surface.name.clone(), surface);
    result
}

fn read_surface_fields(data: &[u8], surface: &mut Surface) -> Result<()> {
    for chunk in sub_chunks(data) {
        let chunk = chunk?;
        match chunk.id {
            K_SURF_COLR => surface.color = read_f32_array::<BigEndian, _, 3>(&mut chunk.reader())?,
            K_SURF_DIFF => surface.diffuse = read_scalar(&chunk)?,
            K_SURF_LUMI => surface.luminosity = read_scalar(&chunk)?,
            K_SURF_SPEC => surface.specular = read_scalar(&chunk)?,
            K_SURF_REFL => surface.reflection = read_scalar(&chunk)?,
            K_SURF_RBLR => surface.reflection_blur = read_scalar(&chunk)?,
            K_SURF_TRAN => surface.transparency = read_scalar(&chunk)?,
            K_SURF_RIND => surface.refraction_index = read_scalar(&chunk)?,
            K_SURF_TBLR => surface.refraction_blur = read_scalar(&chunk)?,
            K_SURF_TRNL => surface.translucency = read_scalar(&chunk)?,
            K_SURF_GLOS => surface.glossiness = read_scalar(&chunk)?,
            K_SURF_SHRP => surface.sharpness = read_scalar(&chunk)?,
            K_SURF_SMAN => surface.smooth = read_scalar(&chunk)? > 0.0,
            K_SURF_RFOP => surface.reflection_mode = read_code(&chunk)?,
            K_SURF_RIMG => surface.reflection_image = read_code(&chunk)?,
            K_SURF_SIDE => surface.sidedness = read_code(&chunk)?,
            K_SURF_BLOK => {
                if let Some(texture) = read_block(chunk.data)? {
                    surface.textures.push(texture);
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Decodes a `BLOK` sub-chunk. Only image map layers on the color channel produce a texture.
///
/// The block header's ordinal string sits at offset 6. Everything after it, the header's own
/// sub-chunks followed by the block's attribute sub-chunks, is walked as one flat sequence.
pub fn read_block(data: &[u8]) -> Result<Option<Texture>> {
    if peek_four_cc(data) != Some(K_BLOK_IMAP) {
        return Ok(None);
    }
    let header = data.get(6..).ok_or_else(|| LwoError::truncated("texture block header"))?;
    let (ordinal, ordinal_len) = decode_string_bytes(header)?;
    let mut texture = Texture { ordinal: ordinal.to_vec(), ..Default::default() };
    let body = header.get(ordinal_len..).unwrap_or_default();
    for chunk in sub_chunks(body) {
        let chunk = chunk?;
        let mut reader = chunk.reader();
        match chunk.id {
            K_BLOK_CHAN => {
                let channel = read_four_cc(&mut reader)?;
                if channel != K_SURF_COLR {
                    log::debug!("Skipping texture layer on channel {channel}");
                    return Ok(None);
                }
            }
            K_BLOK_OPAC => {
                texture.opacity_mode = read_u16::<BigEndian, _>(&mut reader)?;
                texture.opacity = read_f32::<BigEndian, _>(&mut reader)?;
            }
            K_BLOK_ENAB => texture.enabled = read_u16::<BigEndian, _>(&mut reader)? != 0,
            K_BLOK_IMAG => texture.clip_id = read_vx(&mut reader)?,
            K_BLOK_PROJ => texture.projection = read_u16::<BigEndian, _>(&mut reader)?,
            K_BLOK_VMAP => texture.uv_map = read_string(&mut reader)?,
            K_BLOK_AXIS => texture.axis = read_u16::<BigEndian, _>(&mut reader)?,
            K_BLOK_WRAP => {
                texture.wrap_width = read_u16::<BigEndian, _>(&mut reader)?;
                texture.wrap_height = read_u16::<BigEndian, _>(&mut reader)?;
            }
            K_BLOK_WRPW => texture.wrap_width_amount = read_f32::<BigEndian, _>(&mut reader)?,
            K_BLOK_WRPH => texture.wrap_height_amount = read_f32::<BigEndian, _>(&mut reader)?,
            _ => {}
        }
    }
    Ok(Some(texture))
}

/// Orders textures by ordinal bytes, highest first, keeping file order among equal ordinals, and
/// numbers each distinct ordinal.
pub fn sort_textures(textures: &mut [Texture]) {
    textures.sort_by(|a, b| b.ordinal.cmp(&a.ordinal));
    let mut seq = 0;
    for i in 0..textures.len() {
        if i > 0 && textures[i].ordinal != textures[i - 1].ordinal {
            seq += 1;
        }
        textures[i].ord_seq_ix = seq;
    }
}

fn read_legacy_scalar(chunk: &Chunk) -> Result<f32> {
    Ok(read_i16::<BigEndian, _>(&mut chunk.reader())? as f32 / LEGACY_SCALAR_DIVISOR)
}

/// Decodes a pre-6 surface. Scalars are converted to the LWO2 scale, and texture image paths are
/// joined to `source_dir`.
pub fn read_legacy_surface(
    data: &[u8],
    surfaces: &mut IndexMap<String, Surface>,
    source_dir: &str,
) -> Result<()> {
    if surfaces.is_empty() {
        log::info!("Reading object surfaces");
    }
    let mut reader = Cursor::new(data);
    let mut surface = Surface::default();
    let name = read_string(&mut reader)?;
    if !name.is_empty() {
        surface.name = name;
    }
    let result = read_legacy_surface_fields(remaining(&reader), &mut surface, source_dir);
    surfaces.insert(surface.name.clone(), surface);
    result
}

fn read_legacy_surface_fields(data: &[u8], surface: &mut Surface, source_dir: &str) -> Result<()> {
    let mut slot = None;
    // Index into `legacy_textures` that TFLG applies to
    let mut current = None;
    for chunk in sub_chunks(data) {
        let chunk = chunk?;
        match chunk.id {
            K_SURF_COLR => {
                let mut reader = chunk.reader();
                let mut color = [0f32; 3];
                for c in &mut color {
                    *c = read_u8(&mut reader)? as f32 / LEGACY_COLOR_DIVISOR;
                }
                surface.color = color;
            }
            K_SURF_DIFF => surface.diffuse = read_legacy_scalar(&chunk)?,
            K_SURF_LUMI => surface.luminosity = read_legacy_scalar(&chunk)?,
            K_SURF_SPEC => surface.specular = read_legacy_scalar(&chunk)?,
            K_SURF_REFL => surface.reflection = read_legacy_scalar(&chunk)?,
            K_SURF_TRAN => surface.transparency = read_legacy_scalar(&chunk)?,
            K_SURF_GLOS => surface.glossiness = read_legacy_scalar(&chunk)?,
            K_SURF_RIND => surface.refraction_index = read_scalar(&chunk)?,
            K_SURF_SMAN => surface.smooth = read_scalar(&chunk)? > 0.0,
            K_SURF_TIMG => {
                let path = read_string(&mut chunk.reader())?;
                if path == NO_IMAGE {
                    continue;
                }
                current = Some(surface.legacy_textures.len());
                surface.legacy_textures.push(LegacyTexture {
                    slot,
                    path: join_source_dir(source_dir, &path.replace("//", "")),
                    ..Default::default()
                });
            }
            K_SURF_TFLG => {
                let Some(texture) = current.and_then(|i| surface.legacy_textures.get_mut(i)) else {
                    continue;
                };
                let flags = read_i16::<BigEndian, _>(&mut chunk.reader())?;
                if flags & 1 != 0 {
                    texture.lock_x = true;
                } else if flags & 2 != 0 {
                    texture.lock_y = true;
                } else if flags & 4 != 0 {
                    texture.lock_z = true;
                }
            }
            id => {
                if let Some(kind) = TextureSlot::from_four_cc(id) {
                    slot = Some(kind);
                    current = None;
                }
            }
        }
    }
    Ok(())
}

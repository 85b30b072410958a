use std::io::Cursor;

use binrw::{binrw, BinReaderExt};

use crate::{
    error::Result,
    format::FourCC,
    scene::Clip,
    util::read::read_string,
};

// Image clip
pub const K_CHUNK_CLIP: FourCC = FourCC(*b"CLIP");

/// Clip index followed by the header of its first sub-chunk, normally `STIL`.
#[binrw]
#[brw(big)]
#[derive(Clone, Debug)]
pub struct SClipHeader {
    pub id: u32,
    pub kind: FourCC,
    pub size: u16,
}

/// Joins an image path to the object's directory the way LightWave content paths are resolved.
pub fn join_source_dir(source_dir: &str, path: &str) -> String {
    if source_dir.is_empty() {
        path.to_owned()
    } else {
        format!("{source_dir}/{path}")
    }
}

/// Rewrites drive-letter paths (`C:images`, `C:\images`, `C:/images`) to the `C:/images` form.
pub fn normalize_drive(path: &str) -> String {
    path.replace(":/", ":").replace(":\\", ":").replace(':', ":/")
}

pub fn read_clip(data: &[u8], source_dir: &str) -> Result<Clip> {
    let mut reader = Cursor::new(data);
    let header: SClipHeader = reader.read_be()?;
    log::trace!("Clip {} ({} sub-chunk)", header.id, header.kind);
    let path = normalize_drive(&read_string(&mut reader)?);
    let relative_path = join_source_dir(&source_dir.replace('\\', "/"), &path.replace("//", ""));
    Ok(Clip { id: header.id, path, relative_path })
}

//! Builds synthetic LWO byte streams for tests.

#![allow(dead_code)]

pub fn string(text: &str) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.push(0);
    if out.len() % 2 == 1 {
        out.push(0);
    }
    out
}

pub fn vx(index: u32) -> Vec<u8> {
    if index < 0xFF00 {
        (index as u16).to_be_bytes().to_vec()
    } else {
        let b = index.to_be_bytes();
        vec![0xFF, b[1], b[2], b[3]]
    }
}

pub fn f32s(values: &[f32]) -> Vec<u8> { values.iter().flat_map(|v| v.to_be_bytes()).collect() }

/// Sub-chunk with a 16-bit length.
pub fn sub(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend((payload.len() as u16).to_be_bytes());
    out.extend(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// `BLOK` payload for a color-channel image map.
pub fn image_block(ordinal: &[u8], clip: u32, uv_map: &str) -> Vec<u8> {
    let mut header = ordinal.to_vec();
    header.push(0);
    if header.len() % 2 == 1 {
        header.push(0);
    }
    header.extend(sub(b"CHAN", b"COLR"));
    let mut block = sub(b"IMAP", &header);
    block.extend(sub(b"PROJ", &[0, 5]));
    block.extend(sub(b"IMAG", &vx(clip)));
    block.extend(sub(b"VMAP", &string(uv_map)));
    block
}

pub struct LwoBuilder {
    format: [u8; 4],
    body: Vec<u8>,
}

impl LwoBuilder {
    pub fn new(format: &[u8; 4]) -> Self { Self { format: *format, body: vec![] } }

    pub fn lwo2() -> Self { Self::new(b"LWO2") }

    pub fn chunk(mut self, id: &[u8; 4], payload: &[u8]) -> Self {
        self.body.extend(id);
        self.body.extend((payload.len() as u32).to_be_bytes());
        self.body.extend(payload);
        if payload.len() % 2 == 1 {
            self.body.push(0);
        }
        self
    }

    pub fn tags(self, tags: &[&str]) -> Self {
        let payload = tags.iter().flat_map(|t| string(t)).collect::<Vec<_>>();
        let id = if &self.format == b"LWO2" { b"TAGS" } else { b"SRFS" };
        self.chunk(id, &payload)
    }

    pub fn layer(
        self,
        index: u16,
        flags: u16,
        pivot: [f32; 3],
        name: &str,
        parent: Option<i16>,
    ) -> Self {
        let mut payload = index.to_be_bytes().to_vec();
        payload.extend(flags.to_be_bytes());
        payload.extend(f32s(&pivot));
        payload.extend(string(name));
        if let Some(parent) = parent {
            payload.extend(parent.to_be_bytes());
        }
        self.chunk(b"LAYR", &payload)
    }

    pub fn legacy_layer(self, index: u16, name: &str) -> Self {
        let mut payload = index.to_be_bytes().to_vec();
        payload.extend([0, 0]);
        payload.extend(string(name));
        self.chunk(b"LAYR", &payload)
    }

    pub fn points(self, points: &[[f32; 3]]) -> Self {
        let payload = points.iter().flat_map(|p| f32s(p)).collect::<Vec<_>>();
        self.chunk(b"PNTS", &payload)
    }

    pub fn polygons(self, kind: &[u8; 4], polygons: &[&[u32]]) -> Self {
        let mut payload = kind.to_vec();
        for polygon in polygons {
            payload.extend((polygon.len() as u16).to_be_bytes());
            for &point in *polygon {
                payload.extend(vx(point));
            }
        }
        self.chunk(b"POLS", &payload)
    }

    /// Pre-6 polygons with their 1-based surface index.
    pub fn legacy_polygons(self, polygons: &[(&[u16], i16)]) -> Self {
        let mut payload = vec![];
        for (points, surface) in polygons {
            payload.extend((points.len() as u16).to_be_bytes());
            for point in *points {
                payload.extend(point.to_be_bytes());
            }
            payload.extend(surface.to_be_bytes());
        }
        self.chunk(b"POLS", &payload)
    }

    pub fn polygon_tags(self, kind: &[u8; 4], records: &[(u32, u16)]) -> Self {
        let mut payload = kind.to_vec();
        for &(index, tag) in records {
            payload.extend(vx(index));
            payload.extend(tag.to_be_bytes());
        }
        self.chunk(b"PTAG", &payload)
    }

    /// VMAP with `(point, values)` records.
    pub fn vmap(self, kind: &[u8; 4], name: &str, records: &[(u32, &[f32])]) -> Self {
        let dimension = records.first().map(|(_, v)| v.len()).unwrap_or(0) as u16;
        let mut payload = kind.to_vec();
        payload.extend(dimension.to_be_bytes());
        payload.extend(string(name));
        for (point, values) in records {
            payload.extend(vx(*point));
            payload.extend(f32s(values));
        }
        self.chunk(b"VMAP", &payload)
    }

    /// VMAD with `(point, polygon, values)` records.
    pub fn vmad(self, kind: &[u8; 4], name: &str, records: &[(u32, u32, &[f32])]) -> Self {
        let dimension = records.first().map(|(_, _, v)| v.len()).unwrap_or(0) as u16;
        let mut payload = kind.to_vec();
        payload.extend(dimension.to_be_bytes());
        payload.extend(string(name));
        for (point, polygon, values) in records {
            payload.extend(vx(*point));
            payload.extend(vx(*polygon));
            payload.extend(f32s(values));
        }
        self.chunk(b"VMAD", &payload)
    }

    pub fn surface(self, name: &str, sub_chunks: &[Vec<u8>]) -> Self {
        let mut payload = string(name);
        if &self.format == b"LWO2" {
            payload.extend(string(""));
        }
        for chunk in sub_chunks {
            payload.extend(chunk);
        }
        self.chunk(b"SURF", &payload)
    }

    pub fn clip(self, id: u32, path: &str) -> Self {
        let mut payload = id.to_be_bytes().to_vec();
        let name = string(path);
        payload.extend(b"STIL");
        payload.extend((name.len() as u16).to_be_bytes());
        payload.extend(name);
        self.chunk(b"CLIP", &payload)
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = b"FORM".to_vec();
        out.extend((self.body.len() as u32 + 4).to_be_bytes());
        out.extend(self.format);
        out.extend(self.body);
        out
    }
}

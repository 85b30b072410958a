use std::{io::Cursor, marker::PhantomData, mem::size_of};

use zerocopy::{AsBytes, BigEndian, ByteOrder, FromBytes, FromZeroes, Unaligned, U16, U32};

use crate::{
    error::{LwoError, Result},
    format::FourCC,
};

/// Top-level chunk header: tag followed by a 32-bit payload length.
#[derive(Clone, Debug, FromBytes, FromZeroes, AsBytes, Unaligned)]
#[repr(C, packed)]
pub struct ChunkDescriptor<O: ByteOrder> {
    pub id: FourCC,
    pub size: U32<O>,
}

/// Sub-chunk header used inside SURF, BLOK and CLIP payloads: tag followed by a 16-bit payload
/// length.
#[derive(Clone, Debug, FromBytes, FromZeroes, AsBytes, Unaligned)]
#[repr(C, packed)]
pub struct SubChunkDescriptor<O: ByteOrder> {
    pub id: FourCC,
    pub size: U16<O>,
}

pub trait ChunkHeader: FromBytes + FromZeroes + Unaligned + Sized {
    fn tag(&self) -> FourCC;
    fn payload_size(&self) -> usize;
}

impl<O: ByteOrder> ChunkHeader for ChunkDescriptor<O> {
    #[inline]
    fn tag(&self) -> FourCC { self.id }

    #[inline]
    fn payload_size(&self) -> usize { self.size.get() as usize }
}

impl<O: ByteOrder> ChunkHeader for SubChunkDescriptor<O> {
    #[inline]
    fn tag(&self) -> FourCC { self.id }

    #[inline]
    fn payload_size(&self) -> usize { self.size.get() as usize }
}

/// Splits one chunk off the front of `data`, returning its header, payload and the data following
/// it. Odd-sized payloads are followed by a pad byte, which is skipped when present.
pub fn slice_chunk<H: ChunkHeader>(data: &[u8]) -> Result<(&H, &[u8], &[u8])> {
    let header = H::ref_from_prefix(data).ok_or_else(|| {
        LwoError::truncated(format!(
            "chunk header needs {} bytes, {} remain",
            size_of::<H>(),
            data.len()
        ))
    })?;
    let start = size_of::<H>();
    let size = header.payload_size();
    let available = data.len() - start;
    if size > available {
        return Err(LwoError::truncated(format!(
            "chunk {:?} declares {} bytes, {} remain",
            header.tag(),
            size,
            available
        )));
    }
    let end = start + size;
    let next = (end + (size & 1)).min(data.len());
    Ok((header, &data[start..end], &data[next..]))
}

impl<O: ByteOrder> ChunkDescriptor<O> {
    #[inline]
    pub fn slice(data: &[u8]) -> Result<(&Self, &[u8], &[u8])> { slice_chunk(data) }
}

impl<O: ByteOrder> SubChunkDescriptor<O> {
    #[inline]
    pub fn slice(data: &[u8]) -> Result<(&Self, &[u8], &[u8])> { slice_chunk(data) }
}

/// A chunk's tag and its bounded payload.
#[derive(Copy, Clone, Debug)]
pub struct Chunk<'a> {
    pub id: FourCC,
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    #[inline]
    pub fn reader(&self) -> Cursor<&'a [u8]> { Cursor::new(self.data) }
}

/// Walks consecutive chunks in a buffer. Payload bytes a caller leaves unread are skipped, since
/// each payload is handed out as its own slice. After the first error the iterator is exhausted.
pub struct ChunkIter<'a, H> {
    data: &'a [u8],
    _marker: PhantomData<H>,
}

impl<'a, H: ChunkHeader + 'a> ChunkIter<'a, H> {
    #[inline]
    pub fn new(data: &'a [u8]) -> Self { Self { data, _marker: PhantomData } }

    /// Bytes not yet walked.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] { self.data }
}

impl<'a, H: ChunkHeader + 'a> Iterator for ChunkIter<'a, H> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }
        match slice_chunk::<H>(self.data) {
            Ok((header, data, remain)) => {
                self.data = remain;
                Some(Ok(Chunk { id: header.tag(), data }))
            }
            Err(e) => {
                self.data = &[];
                Some(Err(e))
            }
        }
    }
}

pub type Chunks<'a> = ChunkIter<'a, ChunkDescriptor<BigEndian>>;
pub type SubChunks<'a> = ChunkIter<'a, SubChunkDescriptor<BigEndian>>;

#[inline]
pub fn chunks(data: &[u8]) -> Chunks { ChunkIter::new(data) }

#[inline]
pub fn sub_chunks(data: &[u8]) -> SubChunks { ChunkIter::new(data) }

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let header =
            ChunkDescriptor::<BigEndian> { id: FourCC(*id), size: U32::new(payload.len() as u32) };
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn encode_sub(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let size = U16::new(payload.len() as u16);
        let header = SubChunkDescriptor::<BigEndian> { id: FourCC(*id), size };
        let mut out = header.as_bytes().to_vec();
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    #[test]
    fn round_trip_with_padding() {
        let mut data = encode(b"TAGS", b"abc");
        data.extend(encode(b"PNTS", &[1, 2, 3, 4]));
        assert_eq!(data.len(), 8 + 4 + 8 + 4);

        let walked = chunks(&data).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(walked.len(), 2);
        assert_eq!(walked[0].id, *b"TAGS");
        assert_eq!(walked[0].data, b"abc");
        assert_eq!(walked[1].id, *b"PNTS");
        assert_eq!(walked[1].data, &[1, 2, 3, 4]);
    }

    #[test]
    fn clean_end_of_stream() {
        assert!(chunks(&[]).next().is_none());
        let data = encode(b"LAYR", &[]);
        let mut iter = chunks(&data);
        assert!(matches!(iter.next(), Some(Ok(chunk)) if chunk.data.is_empty()));
        assert!(iter.next().is_none());
    }

    #[test]
    fn missing_final_pad_tolerated() {
        let mut data = encode(b"TAGS", b"a");
        data.pop();
        let walked = chunks(&data).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(walked[0].data, b"a");
    }

    #[test]
    fn overlong_length_is_truncated() {
        let mut data = encode(b"PNTS", &[0; 8]);
        data.truncate(12);
        let mut iter = chunks(&data);
        assert!(iter.next().unwrap().unwrap_err().is_truncated());
        assert!(iter.next().is_none());
    }

    #[test]
    fn short_header_is_truncated() {
        let err = chunks(&[b'P', b'N', b'T']).next().unwrap().unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn sub_chunks_use_short_lengths() {
        let mut data = encode_sub(b"COLR", &[0; 12]);
        data.extend(encode_sub(b"SIDE", &[0, 3]));
        data.extend(encode_sub(b"VMAP", b"uv\0"));
        let walked = sub_chunks(&data).collect::<Result<Vec<_>>>().unwrap();
        let ids = walked.iter().map(|c| c.id).collect::<Vec<_>>();
        assert_eq!(ids, [FourCC(*b"COLR"), FourCC(*b"SIDE"), FourCC(*b"VMAP")]);
        assert_eq!(walked[1].data, &[0, 3]);
        assert_eq!(walked[2].data, b"uv\0");
    }
}

pub mod chunk;
pub mod clip;
pub mod layr;
pub mod lwo;
pub mod surf;
pub mod vmap;

use std::fmt::{Debug, Display, Formatter, Write};

use binrw::binrw;
use serde::{Serialize, Serializer};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

#[binrw]
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Default,
    FromBytes,
    FromZeroes,
    AsBytes,
    Unaligned,
)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for c in self.0 {
            f.write_char(c as char)?;
        }
        Ok(())
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_char('"')?;
        for c in self.0 {
            f.write_char(c as char)?;
        }
        f.write_char('"')?;
        Ok(())
    }
}

impl PartialEq<[u8; 4]> for FourCC {
    fn eq(&self, other: &[u8; 4]) -> bool { &self.0 == other }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reads the tag at the start of `data` without consuming it.
#[inline]
pub fn peek_four_cc(data: &[u8]) -> Option<FourCC> {
    data.get(..4).and_then(|b| b.try_into().ok()).map(FourCC)
}

/// Stores a wire-order `(x, y, z)` vector as `(x, z, y)`, the axis order consumers expect.
#[inline]
pub fn swap_yz(v: [f32; 3]) -> [f32; 3] { [v[0], v[2], v[1]] }

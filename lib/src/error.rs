use std::{fmt, io};

use crate::format::FourCC;

#[derive(Debug, thiserror::Error)]
pub enum LwoError {
    /// The header's format tag is neither LWO2 nor LWOB/LWLO
    #[error("unsupported file format {0}")]
    UnsupportedFormat(FourCC),

    /// A length-prefixed field or record claims more bytes than remain
    #[error("truncated data: {0}")]
    TruncatedData(String),

    /// A decoded index points outside of its referent
    #[error("{kind} index {index} out of range (count {count})")]
    InconsistentReference { kind: ReferenceKind, index: u32, count: usize },

    #[error(transparent)]
    Io(io::Error),
}

pub type Result<T, E = LwoError> = std::result::Result<T, E>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReferenceKind {
    Point,
    Polygon,
    Bone,
    Tag,
    Surface,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::Point => "point",
            ReferenceKind::Polygon => "polygon",
            ReferenceKind::Bone => "bone",
            ReferenceKind::Tag => "tag",
            ReferenceKind::Surface => "surface",
        })
    }
}

impl LwoError {
    #[inline]
    pub fn truncated(what: impl fmt::Display) -> Self { LwoError::TruncatedData(what.to_string()) }

    #[inline]
    pub fn is_truncated(&self) -> bool { matches!(self, LwoError::TruncatedData(_)) }
}

/// Checks `index` against `count`, producing an [`LwoError::InconsistentReference`] when out of
/// range.
#[inline]
pub fn check_index(kind: ReferenceKind, index: u32, count: usize) -> Result<usize> {
    if (index as usize) < count {
        Ok(index as usize)
    } else {
        Err(LwoError::InconsistentReference { kind, index, count })
    }
}

/// Logs and drops a record that failed with [`LwoError::InconsistentReference`]. Every other error
/// is passed through.
pub fn skip_inconsistent<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e @ LwoError::InconsistentReference { .. }) => {
            log::warn!("Skipping record: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl From<io::Error> for LwoError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            LwoError::TruncatedData(e.to_string())
        } else {
            LwoError::Io(e)
        }
    }
}

impl From<binrw::Error> for LwoError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::Io(e) => e.into(),
            e => LwoError::TruncatedData(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_checks() {
        assert_eq!(check_index(ReferenceKind::Point, 2, 3).unwrap(), 2);
        let err = check_index(ReferenceKind::Polygon, 3, 3).unwrap_err();
        assert_eq!(err.to_string(), "polygon index 3 out of range (count 3)");
    }

    #[test]
    fn inconsistent_records_are_skipped() {
        let checked = check_index(ReferenceKind::Bone, 9, 1).map(|i| i as u32);
        let skipped = skip_inconsistent(checked);
        assert!(matches!(skipped, Ok(None)));
        assert!(matches!(skip_inconsistent(Ok(4)), Ok(Some(4))));
        let err = skip_inconsistent::<()>(Err(LwoError::truncated("x"))).unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn eof_maps_to_truncated() {
        let err: LwoError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(err.is_truncated());
        let err: LwoError = io::Error::new(io::ErrorKind::Other, "other").into();
        assert!(matches!(err, LwoError::Io(_)));
    }
}

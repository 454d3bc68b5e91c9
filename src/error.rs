use crate::BlobId;

pub type ExternalError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of geometry, region algebra and session operations.
///
/// All of them are local to the operation that produced them: the blob or the
/// store the operation was called on is left exactly as it was.
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("Region has no foreground pixels")]
    EmptyRegion,

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Regions are not connected")]
    Disjoint,

    #[error("Regions do not intersect")]
    NoIntersection,

    #[error("Curve does not separate the region")]
    CutDidNotSeparate,

    #[error("Region of {area} pixels is below the minimum of {min_area}")]
    RegionTooSmall { area: u64, min_area: u64 },

    #[error("{0}")]
    ExternalRefinerFailure(ExternalError),

    #[error("{0}")]
    ExternalSegmenterFailure(ExternalError),

    #[error("Blob {0} already exists")]
    DuplicateId(BlobId),

    #[error("Unknown blob {0}")]
    UnknownBlob(BlobId),

    #[error("Operation requires {expected} selected blobs, got {actual}")]
    InvalidSelection {
        expected: &'static str,
        actual: usize,
    },
}

impl RegionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidGeometry(message.into())
    }
}

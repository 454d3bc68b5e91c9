pub mod algebra;
pub mod blob;
pub mod config;
pub mod error;
pub mod extreme;
pub mod geometry;
pub mod history;
pub mod image_utils;
pub mod mask;
pub mod session;
pub mod storage;
pub mod store;
pub mod watershed;

pub use blob::{Blob, BlobId, Region, EMPTY_CLASS};
pub use config::Config;
pub use error::RegionError;
pub use geometry::{BoundingBox, Polygon};
pub use history::{UndoLog, UndoTransaction};
pub use mask::Mask;
pub use session::{Operation, Selection, Session};
pub use store::{AnnotationStore, Group, GroupId};

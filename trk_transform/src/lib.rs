//! Coordinate frame transforms for tracked imaging.
//!
//! - [`Transform3D`]: 4x4 homogeneous matrix, row-major API, column vector convention.
//! - [`TransformName`]: the `(from, to)` pair naming a transform, displayed as `FromToTo`.
//! - [`TransformRepository`]: graph of frames that resolves transforms between any two
//!   connected frames and propagates the validity of every edge used.
pub mod error;
pub mod name;
pub mod repository;
pub mod transform;

pub use error::{TransformError, TransformResult};
pub use name::{FrameId, TransformName};
pub use repository::{
    CoordinateDefinition, NamedTransform, NamedTransforms, PathHop, TransformRepository,
};
pub use transform::Transform3D;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("No path found from frame '{from}' to frame '{to}'")]
    NoPathFound { from: String, to: String },

    #[error("Transform '{0}' not found")]
    TransformNotFound(String),

    #[error("Adding transform '{0}' would create a cycle in the transform graph")]
    CyclicTransformGraph(String),

    #[error("Transform '{0}' is persistent and cannot be overwritten by a non-persistent update")]
    PersistentTransformOverwrite(String),

    #[error("Invalid transform name '{0}'")]
    InvalidTransformName(String),

    #[error("Transform '{0}' is singular and cannot be inverted")]
    SingularMatrix(String),
}

pub type TransformResult<T> = Result<T, TransformError>;

use crate::error::{TransformError, TransformResult};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Coordinate frame identifier strings
pub type FrameId = CompactString;

const SEPARATOR: &str = "To";

/// Ordered pair of coordinate frames naming the transform mapping `from` coordinates into `to`
/// coordinates, for example `ProbeToTracker`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransformName {
    from: FrameId,
    to: FrameId,
}

impl TransformName {
    pub fn new(from: impl Into<FrameId>, to: impl Into<FrameId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn from_frame(&self) -> &str {
        &self.from
    }

    pub fn to_frame(&self) -> &str {
        &self.to
    }

    /// The name of the algebraically inverse transform.
    pub fn inverse(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Both frames must be named.
    pub fn is_valid(&self) -> bool {
        !self.from.is_empty() && !self.to.is_empty()
    }
}

impl Display for TransformName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.from, SEPARATOR, self.to)
    }
}

impl FromStr for TransformName {
    type Err = TransformError;

    /// Splits `FromToTo` at the only `To` that sits between two frame names starting with an
    /// uppercase letter.
    fn from_str(s: &str) -> TransformResult<Self> {
        let bytes = s.as_bytes();
        let candidates: Vec<usize> = s
            .match_indices(SEPARATOR)
            .map(|(index, _)| index)
            .filter(|&index| {
                index > 0
                    && bytes
                        .get(index + SEPARATOR.len())
                        .is_some_and(|c| c.is_ascii_uppercase())
            })
            .collect();

        match candidates.as_slice() {
            [index] if bytes[0].is_ascii_uppercase() => Ok(TransformName::new(
                &s[..*index],
                &s[*index + SEPARATOR.len()..],
            )),
            _ => Err(TransformError::InvalidTransformName(s.to_string())),
        }
    }
}

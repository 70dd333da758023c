use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Mul;

/// Below this absolute determinant a matrix is treated as singular.
const SINGULAR_DETERMINANT: f64 = 1e-12;

/// Transform3D is a 4x4 homogeneous transform.
///
/// The public API is row-major: `rows[i][j]` is the element at row `i`, column `j`, and points are
/// column vectors (`p_to = M * p_from`), so the translation lives in the last column
/// (`rows[0..3][3]`). Internally the matrix is kept as a glam `DMat4`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    mat: DMat4,
}

impl Transform3D {
    pub const IDENTITY: Self = Self {
        mat: DMat4::IDENTITY,
    };

    /// Create a transform from a row-major 4x4 matrix
    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self {
            mat: DMat4::from_cols_array_2d(&rows).transpose(),
        }
    }

    /// Get the transform as a row-major 4x4 matrix
    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        self.mat.transpose().to_cols_array_2d()
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            mat: DMat4::from_translation(DVec3::new(x, y, z)),
        }
    }

    pub fn from_rotation_translation(rotation: DQuat, translation: DVec3) -> Self {
        Self {
            mat: DMat4::from_rotation_translation(rotation, translation),
        }
    }

    pub fn as_mat4(&self) -> &DMat4 {
        &self.mat
    }

    /// Element at `row`, `col`.
    pub fn element(&self, row: usize, col: usize) -> f64 {
        self.mat.col(col)[row]
    }

    pub fn translation(&self) -> DVec3 {
        self.mat.w_axis.truncate()
    }

    /// Rotation part, ignoring any scale.
    pub fn rotation(&self) -> DQuat {
        let (_, rotation, _) = self.mat.to_scale_rotation_translation();
        rotation
    }

    pub fn determinant(&self) -> f64 {
        self.mat.determinant()
    }

    /// General inverse, `None` when the matrix is singular.
    pub fn try_inverse(&self) -> Option<Self> {
        let det = self.mat.determinant();
        if !det.is_finite() || det.abs() < SINGULAR_DETERMINANT {
            return None;
        }
        Some(Self {
            mat: self.mat.inverse(),
        })
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.mat.transform_point3(point)
    }

    /// Interpolates toward `other`: translation and scale linearly, rotation with slerp.
    /// `ratio` 0 gives `self`, 1 gives `other`.
    pub fn interpolate(&self, other: &Self, ratio: f64) -> Self {
        let (scale_a, rotation_a, translation_a) = self.mat.to_scale_rotation_translation();
        let (scale_b, rotation_b, translation_b) = other.mat.to_scale_rotation_translation();
        Self {
            mat: DMat4::from_scale_rotation_translation(
                scale_a.lerp(scale_b, ratio),
                rotation_a.normalize().slerp(rotation_b.normalize(), ratio),
                translation_a.lerp(translation_b, ratio),
            ),
        }
    }

    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f64) -> bool {
        self.mat.abs_diff_eq(other.mat, max_abs_diff)
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<DMat4> for Transform3D {
    fn from(mat: DMat4) -> Self {
        Self { mat }
    }
}

/// `a * b` applies `b` first.
impl Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            mat: self.mat * rhs.mat,
        }
    }
}

impl Serialize for Transform3D {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_rows().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Transform3D {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rows: [[f64; 4]; 4] = Deserialize::deserialize(deserializer)?;
        Ok(Self::from_rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_row_major_layout() {
        let tf = Transform3D::from_rows([
            [1.0, 0.0, 0.0, -292.088],
            [0.0, 1.0, 0.0, 60.4261],
            [0.0, 0.0, 1.0, -1762.41],
            [0.0, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(tf.element(0, 3), -292.088);
        assert_eq!(tf.element(1, 3), 60.4261);
        assert_eq!(tf.element(2, 3), -1762.41);
        assert_eq!(tf.translation(), DVec3::new(-292.088, 60.4261, -1762.41));
        assert_eq!(tf.to_rows()[2][3], -1762.41);
    }

    #[test]
    fn test_composition_order() {
        let rotate = Transform3D::from_rotation_translation(
            DQuat::from_rotation_z(FRAC_PI_2),
            DVec3::ZERO,
        );
        let shift = Transform3D::from_translation(1.0, 0.0, 0.0);

        // shift first, then rotate
        let p = (rotate * shift).transform_point(DVec3::ZERO);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse() {
        let tf = Transform3D::from_rotation_translation(
            DQuat::from_rotation_y(0.3),
            DVec3::new(2.0, 3.0, 4.0),
        );
        let inverse = tf.try_inverse().unwrap();
        assert!((tf * inverse).abs_diff_eq(&Transform3D::IDENTITY, 1e-12));
        assert!((inverse * tf).abs_diff_eq(&Transform3D::IDENTITY, 1e-12));
    }

    #[test]
    fn test_singular_inverse() {
        let mut rows = Transform3D::IDENTITY.to_rows();
        rows[1][1] = 0.0;
        assert!(Transform3D::from_rows(rows).try_inverse().is_none());
    }

    #[test]
    fn test_interpolate() {
        let a = Transform3D::from_translation(0.0, 0.0, 0.0);
        let b = Transform3D::from_rotation_translation(
            DQuat::from_rotation_z(FRAC_PI_2),
            DVec3::new(10.0, 0.0, 0.0),
        );
        let mid = a.interpolate(&b, 0.5);
        assert_relative_eq!(mid.translation().x, 5.0, epsilon = 1e-12);
        let expected = DQuat::from_rotation_z(FRAC_PI_2 / 2.0);
        assert!(
            mid.rotation().abs_diff_eq(expected, 1e-9)
                || mid.rotation().abs_diff_eq(-expected, 1e-9)
        );

        assert!(a.interpolate(&b, 0.0).abs_diff_eq(&a, 1e-12));
        assert!(a.interpolate(&b, 1.0).abs_diff_eq(&b, 1e-12));
    }

    #[test]
    fn test_serde_rows() {
        let tf = Transform3D::from_translation(1.0, 2.0, 3.0);
        let text = ron::to_string(&tf).unwrap();
        let back: Transform3D = ron::from_str(&text).unwrap();
        assert_eq!(back, tf);
        let rows: [[f64; 4]; 4] = ron::from_str(&text).unwrap();
        assert_eq!(rows[0][3], 1.0);
    }
}

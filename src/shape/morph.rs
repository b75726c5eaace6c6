//! Pointwise linear interpolation between point sequences.

use super::{Point, ShapeError};

/// Lerp each point pair by factor `t`
///
/// `t = 0` returns a copy of `from`, `t = 1` returns `to`. Sequences of
/// different length are rejected rather than truncated or padded.
pub fn morph_points(from: &[Point], to: &[Point], t: f32) -> Result<Vec<Point>, ShapeError> {
    if from.len() != to.len() {
        return Err(ShapeError::LengthMismatch {
            from: from.len(),
            to: to.len(),
        });
    }

    Ok(from
        .iter()
        .zip(to)
        .map(|(&a, &b)| a + (b - a) * t)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_a() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, -4.0),
            Point::new(-3.5, 8.0),
        ]
    }

    fn sample_b() -> Vec<Point> {
        vec![
            Point::new(2.0, 6.0),
            Point::new(-10.0, 4.0),
            Point::new(1.5, 0.0),
        ]
    }

    #[test]
    fn test_morph_endpoints() {
        let (a, b) = (sample_a(), sample_b());
        assert_eq!(morph_points(&a, &b, 0.0).unwrap(), a);
        assert_eq!(morph_points(&a, &b, 1.0).unwrap(), b);
    }

    #[test]
    fn test_morph_identity_when_endpoints_equal() {
        let a = sample_a();
        for t in [0.0, 0.3, 0.5, 0.9, 1.0] {
            assert_eq!(morph_points(&a, &a, t).unwrap(), a);
        }
    }

    #[test]
    fn test_morph_half_is_midpoint() {
        let (a, b) = (sample_a(), sample_b());
        let mid = morph_points(&a, &b, 0.5).unwrap();
        for i in 0..a.len() {
            assert_eq!(mid[i], (a[i] + b[i]) / 2.0);
        }
    }

    #[test]
    fn test_morph_length_mismatch() {
        let a = sample_a();
        let mut b = sample_b();
        b.push(Point::ZERO);

        assert_eq!(
            morph_points(&a, &b, 0.5),
            Err(ShapeError::LengthMismatch { from: 3, to: 4 })
        );
    }
}

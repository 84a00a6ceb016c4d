//! Axis reorientation to a named anatomical ordering.

use burn::tensor::backend::Backend;
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::image::Image;
use crate::spatial::{Direction3, Point3, Vector3};

/// Reorient a volume so its axes point along the given anatomical code.
///
/// The code is three letters from {L, R, P, A, S, I}, one per image axis
/// in (x, y, z) order, naming the physical direction that axis should
/// point toward in LPS space (L=+x, P=+y, S=+z). "PIR" therefore asks for
/// x toward posterior, y toward inferior, z toward right.
///
/// Each output axis takes the input axis whose direction cosine is
/// dominant along the requested anatomical direction, flipped when the
/// sign disagrees. Geometry (spacing, direction, origin) follows the
/// permutation so physical positions are unchanged.
pub fn reorient_to<B: Backend>(image: &Image<B, 3>, code: &str) -> Result<Image<B, 3>> {
    let targets = parse_code(code)?;

    // source_axis[o] = (input axis, flipped) feeding output axis o.
    let mut source_axis = [(0usize, false); 3];
    let mut used = [false; 3];

    for (o, &(axis, positive)) in targets.iter().enumerate() {
        let mut best = 0;
        let mut best_dot = 0.0f64;
        for a in 0..3 {
            let dot = image.direction()[(axis, a)];
            if dot.abs() > best_dot.abs() {
                best_dot = dot;
                best = a;
            }
        }
        if used[best] {
            return Err(CoreError::DegenerateInput(format!(
                "orientation code {code} is ambiguous for this direction matrix"
            )));
        }
        used[best] = true;
        let flipped = (best_dot > 0.0) != positive;
        source_axis[o] = (best, flipped);
    }

    let [nz, ny, nx] = image.shape();
    let in_dims = [nx, ny, nz];
    let input = image.to_vec();

    let out_dims = [
        in_dims[source_axis[0].0],
        in_dims[source_axis[1].0],
        in_dims[source_axis[2].0],
    ];
    let mut output = vec![0.0f32; input.len()];

    for k in 0..out_dims[2] {
        for j in 0..out_dims[1] {
            for i in 0..out_dims[0] {
                let out_index = [i, j, k];
                let mut in_index = [0usize; 3];
                for o in 0..3 {
                    let (a, flipped) = source_axis[o];
                    in_index[a] = if flipped {
                        in_dims[a] - 1 - out_index[o]
                    } else {
                        out_index[o]
                    };
                }
                let src = (in_index[2] * ny + in_index[1]) * nx + in_index[0];
                let dst = (k * out_dims[1] + j) * out_dims[0] + i;
                output[dst] = input[src];
            }
        }
    }

    // Output axis o inherits input axis a's column, negated on flip.
    let mut columns = [Vector3::zeros(); 3];
    let mut spacing = [0.0f64; 3];
    for o in 0..3 {
        let (a, flipped) = source_axis[o];
        let sign = if flipped { -1.0 } else { 1.0 };
        for r in 0..3 {
            columns[o][r] = sign * image.direction()[(r, a)];
        }
        spacing[o] = image.spacing()[a];
    }
    let direction = Direction3::from_columns(&columns);

    // New origin = physical position of the input corner that lands at
    // output index (0, 0, 0).
    let mut corner = Point3::origin();
    for o in 0..3 {
        let (a, flipped) = source_axis[o];
        corner[a] = if flipped { (in_dims[a] - 1) as f64 } else { 0.0 };
    }
    let origin = image.index_to_point(&corner);

    debug!(code, ?source_axis, "reoriented volume");

    Ok(Image::from_raw(
        output,
        [out_dims[2], out_dims[1], out_dims[0]],
        origin,
        crate::spatial::Spacing::new(spacing),
        direction,
        &image.data().device(),
    ))
}

/// Map a code letter to (physical axis, positive direction) in LPS.
fn parse_code(code: &str) -> Result<[(usize, bool); 3]> {
    let letters: Vec<char> = code.chars().collect();
    if letters.len() != 3 {
        return Err(CoreError::DegenerateInput(format!(
            "orientation code must have 3 letters, got {code:?}"
        )));
    }
    let mut out = [(0usize, false); 3];
    for (i, c) in letters.iter().enumerate() {
        out[i] = match c.to_ascii_uppercase() {
            'L' => (0, true),
            'R' => (0, false),
            'P' => (1, true),
            'A' => (1, false),
            'S' => (2, true),
            'I' => (2, false),
            other => {
                return Err(CoreError::DegenerateInput(format!(
                    "invalid orientation letter {other:?}"
                )))
            }
        };
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing3;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn lps_volume() -> Image<B, 3> {
        // [Z=2, Y=3, X=4], values encode their own (x, y, z) index.
        let mut values = vec![0.0f32; 24];
        for z in 0..2 {
            for y in 0..3 {
                for x in 0..4 {
                    values[(z * 3 + y) * 4 + x] = (x + 10 * y + 100 * z) as f32;
                }
            }
        }
        Image::from_raw(
            values,
            [2, 3, 4],
            Point3::origin(),
            Spacing3::new([1.0, 2.0, 3.0]),
            Direction3::identity(),
            &Default::default(),
        )
    }

    #[test]
    fn test_identity_code() {
        let image = lps_volume();
        let out = reorient_to(&image, "LPS").unwrap();
        assert_eq!(out.shape(), image.shape());
        assert_eq!(out.to_vec(), image.to_vec());
        assert_eq!(out.origin().to_array(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_single_axis_flip() {
        let image = lps_volume();
        let out = reorient_to(&image, "RPS").unwrap();
        assert_eq!(out.shape(), [2, 3, 4]);
        // X runs backwards: value at new x=0 is old x=3.
        assert_eq!(out.to_vec()[0], 3.0);
        // Origin moves to the old far-X corner.
        assert_eq!(out.origin().to_array(), [3.0, 0.0, 0.0]);
        // The flipped column is negated.
        assert_eq!(out.direction()[(0, 0)], -1.0);
    }

    #[test]
    fn test_axis_permutation() {
        let image = lps_volume();
        let out = reorient_to(&image, "PLS").unwrap();
        // X and Y swap: new dims (ny, nx, nz) = (3, 4, 2).
        assert_eq!(out.shape(), [2, 4, 3]);
        assert_eq!(out.spacing().to_array(), [2.0, 1.0, 3.0]);
        // Value at new (x'=2, y'=1, z'=0) is old (x=1, y=2, z=0).
        let v = out.to_vec()[(0 * 4 + 1) * 3 + 2];
        assert_eq!(v, 21.0);
    }

    #[test]
    fn test_bad_code() {
        let image = lps_volume();
        assert!(reorient_to(&image, "XYZ").is_err());
        assert!(reorient_to(&image, "LP").is_err());
    }

    #[test]
    fn test_physical_positions_preserved() {
        let image = lps_volume();
        let out = reorient_to(&image, "RAS").unwrap();
        // The value stored at a physical location must not change.
        // Old index (1, 2, 1) has value 121; find it in the new volume.
        let old_point = image.index_to_point(&Point3::new([1.0, 2.0, 1.0]));
        let new_index = out.point_to_index(&old_point);
        let [_, h, w] = out.shape();
        let idx = (new_index[2].round() as usize * h + new_index[1].round() as usize) * w
            + new_index[0].round() as usize;
        assert_eq!(out.to_vec()[idx], 121.0);
    }
}

//! Median filtering for impulse-noise removal.

use burn::tensor::backend::Backend;

use crate::image::Image;

/// Median filter over a cubic neighborhood.
///
/// Radius 1 means a 3x3x3 window. The window is cropped at the volume
/// boundary, so edge voxels take the median of the voxels that exist.
/// Runs on the host; volumes in this pipeline are small enough that the
/// device round-trip is not worth avoiding.
pub struct MedianFilter {
    radius: usize,
}

impl MedianFilter {
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    pub fn apply<B: Backend>(&self, image: &Image<B, 3>) -> Image<B, 3> {
        if self.radius == 0 {
            return image.clone();
        }

        let [d, h, w] = image.shape();
        let input = image.to_vec();
        let mut output = vec![0.0f32; input.len()];
        let r = self.radius as isize;

        let mut window = Vec::with_capacity((2 * self.radius + 1).pow(3));
        for z in 0..d as isize {
            for y in 0..h as isize {
                for x in 0..w as isize {
                    window.clear();
                    for dz in -r..=r {
                        let zz = z + dz;
                        if zz < 0 || zz >= d as isize {
                            continue;
                        }
                        for dy in -r..=r {
                            let yy = y + dy;
                            if yy < 0 || yy >= h as isize {
                                continue;
                            }
                            for dx in -r..=r {
                                let xx = x + dx;
                                if xx < 0 || xx >= w as isize {
                                    continue;
                                }
                                window.push(
                                    input[(zz as usize * h + yy as usize) * w + xx as usize],
                                );
                            }
                        }
                    }
                    window.sort_by(|a, b| a.total_cmp(b));
                    let mid = window.len() / 2;
                    let median = if window.len() % 2 == 1 {
                        window[mid]
                    } else {
                        0.5 * (window[mid - 1] + window[mid])
                    };
                    output[(z as usize * h + y as usize) * w + x as usize] = median;
                }
            }
        }

        Image::from_raw(
            output,
            [d, h, w],
            *image.origin(),
            *image.spacing(),
            *image.direction(),
            &image.data().device(),
        )
    }
}

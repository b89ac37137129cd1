use crate::arrays::RgbImage;
use crate::atomic_arrays::AtomicArray2D;
use crate::cluster::Cluster;
use crate::common::Config;
use crate::slic::Clusters;
use assume::assume;
use multiversion::multiversion;
use rayon::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Word sentinel of the assignment image before any cluster claimed a pixel.
pub const UNASSIGNED: u32 = 0xFFFF_FFFF;
/// Label of pixels no cluster window ever covered (only possible when the
/// search region is too small for the cluster layout).
pub const LABEL_SENTINEL: u32 = 0xFFFF;
pub(crate) const LABEL_MASK: u32 = 0x0000_FFFF;

#[inline]
fn spread_bits(value: u32) -> u32 {
    let mut x = value & 0xFFFF;
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}

/// 32-bit Z-order key of a search-region cell.
#[inline]
pub(crate) fn morton_code(cell_y: u16, cell_x: u16) -> u32 {
    (spread_bits(cell_y as u32) << 1) | spread_bits(cell_x as u32)
}

/// This function implements the assignment step.
///
/// Every word of the assignment image starts at [`UNASSIGNED`]; each cluster
/// task then folds its packed `(score << 16) | number` candidates in with an
/// atomic `min`. Ties in score resolve to the smaller cluster number because
/// the number occupies the low half of the word, so the final labels are
/// identical under any task interleaving and any worker count. Once all
/// clusters ran, the score half is masked off and only labels remain.
///
/// Clusters are traversed in Morton order of their `(y / S, x / S)` cell so
/// that tasks running at the same time tend to touch disjoint regions of the
/// assignment image instead of bouncing its cache lines between cores.
pub fn assign(
    image: &RgbImage,
    config: &Config,
    clusters: &Clusters,
    spatial_lut: &[u16],
    search_region_size: u16,
) {
    let assignments = &clusters.assignments;
    debug_assert_eq!(assignments.width, image.width);
    debug_assert_eq!(assignments.height, image.height);

    (0..assignments.height).into_par_iter().for_each(|row| {
        for word in assignments.get_row(row) {
            word.store(UNASSIGNED, Ordering::Relaxed);
        }
    });

    let cell = search_region_size.max(1);
    let mut sorted: Vec<&Cluster> = clusters.clusters.iter().collect();
    sorted.sort_unstable_by_key(|c| (morton_code(c.y / cell, c.x / cell), c.number));

    sorted.into_par_iter().for_each(|cluster| {
        assign_cluster(
            image,
            cluster,
            spatial_lut,
            search_region_size,
            assignments,
            config.quantize_level,
        )
    });

    (0..assignments.height).into_par_iter().for_each(|row| {
        for word in assignments.get_row(row) {
            word.fetch_and(LABEL_MASK, Ordering::Relaxed);
        }
    });
}

/// Scan one cluster's search window and fold its candidate words into the
/// assignment image.
#[multiversion(targets = "simd")]
fn assign_cluster(
    image: &RgbImage,
    cluster: &Cluster,
    spatial_lut: &[u16],
    search_region_size: u16,
    assignments: &AtomicArray2D<AtomicU32>,
    quantize_level: u8,
) {
    let y_lo = cluster.top(search_region_size);
    let y_hi = cluster.bottom(image, search_region_size);
    let x_lo = cluster.left(search_region_size);
    let x_hi = cluster.right(image, search_region_size);
    let cy = cluster.y as usize;
    let cx = cluster.x as usize;
    let number = cluster.number as u32;

    for i in y_lo..y_hi {
        let row_manhattan = i.abs_diff(cy);
        let image_row = image.get_row_part(i, x_lo, x_hi);
        let assign_row = &assignments.get_row(i)[x_lo..x_hi];

        for ((j, pixel), slot) in (x_lo..).zip(image_row.chunks_exact(3)).zip(assign_row) {
            let manhattan = row_manhattan + j.abs_diff(cx);
            // Window rows/columns are clipped to [c - S, c + S], so the
            // Manhattan distance never exceeds 2 * S = spatial_lut.len() - 1.
            assume!(
                unsafe: manhattan < spatial_lut.len(),
                "manhattan {manhattan} >= LUT size {}",
                spatial_lut.len()
            );
            let spatial_dist = spatial_lut[manhattan];
            let color_l1 = pixel[0].abs_diff(cluster.r) as u32
                + pixel[1].abs_diff(cluster.g) as u32
                + pixel[2].abs_diff(cluster.b) as u32;
            let color_dist = (color_l1 << quantize_level).min(LABEL_MASK) as u16;
            let score = color_dist.saturating_add(spatial_dist);
            let candidate = ((score as u32) << 16) | number;
            slot.fetch_min(candidate, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{assign, morton_code, LABEL_SENTINEL};
    use crate::arrays::RgbImage;
    use crate::atomic_arrays::AtomicArray2D;
    use crate::cluster::Cluster;
    use crate::common::Config;
    use crate::slic::{compute_spatial_lut, Clusters};
    use std::sync::atomic::Ordering;

    fn labels(clusters: &Clusters) -> Vec<u32> {
        clusters
            .assignments
            .data
            .iter()
            .map(|w| w.load(Ordering::Relaxed))
            .collect()
    }

    #[test]
    fn morton_code_interleaves_bits() {
        assert_eq!(morton_code(0, 0), 0);
        assert_eq!(morton_code(0, 1), 1);
        assert_eq!(morton_code(1, 0), 2);
        assert_eq!(morton_code(1, 1), 3);
        assert_eq!(morton_code(2, 0), 8);
        assert_eq!(morton_code(2, 3), 13);
        assert_eq!(morton_code(0xFFFF, 0xFFFF), 0xFFFF_FFFF);
    }

    #[test]
    fn two_color_split_assigns_halves() {
        // Left half red, right half blue; seeds sit inside their half.
        let width = 8;
        let height = 8;
        let rgb: Vec<u8> = (0..height)
            .flat_map(|_| {
                (0..width).flat_map(|x| if x < 4 { [255, 0, 0] } else { [0, 0, 255] })
            })
            .collect();
        let image = RgbImage::from_raw_slice(&rgb, width, height);
        let config = Config {
            num_of_clusters: 2,
            compactness: 10.0,
            quantize_level: 5,
            ..Config::default()
        };
        let clusters = Clusters {
            assignments: AtomicArray2D::from_fill(0u32, width, height),
            clusters: vec![
                Cluster {
                    y: 4,
                    x: 2,
                    r: 255,
                    g: 0,
                    b: 0,
                    number: 0,
                    ..Cluster::default()
                },
                Cluster {
                    y: 4,
                    x: 6,
                    r: 0,
                    g: 0,
                    b: 255,
                    number: 1,
                    ..Cluster::default()
                },
            ],
        };
        let search_region_size = config.search_region_size(&image);
        assert_eq!(search_region_size, 5);
        let lut = compute_spatial_lut(&config, search_region_size);
        assign(&image, &config, &clusters, &lut, search_region_size);

        for (i, label) in labels(&clusters).into_iter().enumerate() {
            let expected = if i % width < 4 { 0 } else { 1 };
            assert_eq!(label, expected, "pixel {i}");
        }
    }

    #[test]
    fn uncovered_pixels_keep_sentinel() {
        let width = 9;
        let height = 9;
        let image = RgbImage::from_iter(std::iter::repeat(128u8).take(width * height * 3), width, height);
        let config = Config {
            num_of_clusters: 1,
            ..Config::default()
        };
        let clusters = Clusters {
            assignments: AtomicArray2D::from_fill(0u32, width, height),
            clusters: vec![Cluster {
                y: 0,
                x: 0,
                r: 128,
                g: 128,
                b: 128,
                number: 0,
                ..Cluster::default()
            }],
        };
        let search_region_size = 2;
        let lut = compute_spatial_lut(&config, search_region_size);
        assign(&image, &config, &clusters, &lut, search_region_size);

        let words = labels(&clusters);
        assert_eq!(words[0], 0);
        assert_eq!(words[2 * width + 2], 0);
        assert_eq!(words[3 * width + 3], LABEL_SENTINEL);
        assert_eq!(words[8 * width + 8], LABEL_SENTINEL);
    }

    #[test]
    fn saturated_scores_still_assign() {
        // Maximum color L1 shifted by the maximum quantize level must clamp
        // to the 16-bit ceiling instead of wrapping into the label half.
        let width = 4;
        let height = 4;
        let image = RgbImage::from_iter(
            std::iter::repeat(255u8).take(width * height * 3),
            width,
            height,
        );
        let config = Config {
            num_of_clusters: 1,
            quantize_level: 7,
            ..Config::default()
        };
        let clusters = Clusters {
            assignments: AtomicArray2D::from_fill(0u32, width, height),
            clusters: vec![Cluster {
                y: 1,
                x: 1,
                r: 0,
                g: 0,
                b: 0,
                number: 0,
                ..Cluster::default()
            }],
        };
        let search_region_size = 4;
        let lut = compute_spatial_lut(&config, search_region_size);
        assign(&image, &config, &clusters, &lut, search_region_size);

        for label in labels(&clusters) {
            assert_eq!(label, 0);
        }
    }
}

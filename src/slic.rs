use crate::arrays::RgbImage;
use crate::assign::{assign, LABEL_SENTINEL, UNASSIGNED};
use crate::atomic_arrays::AtomicArray2D;
use crate::cluster::Cluster;
use crate::common::{split_length_to_ranges, Config};
use crate::connectivity::enforce_connectivity;
use crate::error::SlicError;
use log::debug;
use multiversion::multiversion;
use rayon::current_num_threads;
use std::array;
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

/// Convenient struct for passing values around.
pub struct Clusters {
    /// Per-pixel assignment words. During the assignment step a word packs
    /// `(score << 16) | cluster_number`; afterwards only the label in the low
    /// 16 bits remains (see `Cluster::number`).
    pub assignments: AtomicArray2D<AtomicU32>,
    pub clusters: Vec<Cluster>,
}

impl Clusters {
    /// Default cluster initializer: seeds are laid out on a roughly regular
    /// grid, the remainder spread over alternate rows, and each seed samples
    /// its color from the image pixel under it.
    ///
    /// For custom implementations the fields to fill in a new cluster are
    /// `x`, `y`, `r`, `g`, `b` and a unique `number` equal to its index.
    pub fn initialize_clusters(image: &RgbImage, config: &Config) -> Clusters {
        assert!(config.num_of_clusters >= 1);
        let mut clusters = Clusters {
            assignments: AtomicArray2D::from_fill(UNASSIGNED, image.width, image.height),
            clusters: Vec::with_capacity(config.num_of_clusters as usize),
        };
        let n_y = ((config.num_of_clusters as f32).sqrt() as u16).max(1);
        let mut n_xs: Vec<u16> = vec![config.num_of_clusters / n_y; n_y as usize];
        let mut remainder = config.num_of_clusters % n_y;
        let mut row = 0;
        while remainder > 0 {
            n_xs[row] += 1;
            row += 2;
            if row >= n_y as usize {
                row = 1;
            }
            remainder -= 1;
        }
        let h = image.height.div_ceil(n_y as usize);
        let mut acc_k: usize = 0;
        for i in (0..image.height).step_by(h) {
            let w = image
                .width
                .div_ceil(n_xs[std::cmp::min(i / h, (n_y - 1) as usize)] as usize);
            for j in (0..image.width).step_by(w) {
                if acc_k >= config.num_of_clusters as usize {
                    break;
                }
                let center_y = (i + h / 2).clamp(0, image.height - 1) as u16;
                let center_x = (j + w / 2).clamp(0, image.width - 1) as u16;
                let p = image.get_pixel(center_x as usize, center_y as usize);
                clusters.clusters.push(Cluster {
                    x: center_x,
                    y: center_y,
                    r: p[0],
                    g: p[1],
                    b: p[2],
                    number: acc_k as u16,
                    ..Cluster::default()
                });
                acc_k += 1;
            }
        }
        while acc_k < config.num_of_clusters as usize {
            let center_y = image.height as u16 / 2;
            let center_x = image.width as u16 / 2;
            let p = image.get_pixel(center_x as usize, center_y as usize);
            clusters.clusters.push(Cluster {
                x: center_x,
                y: center_y,
                r: p[0],
                g: p[1],
                b: p[2],
                number: acc_k as u16,
                ..Cluster::default()
            });
            acc_k += 1;
        }
        debug_assert_eq!(clusters.clusters.len(), config.num_of_clusters as usize);
        clusters
    }
}

/// This function is the main loop.
///
/// The steps are:
/// - input validation (fail fast, nothing is mutated on error)
/// - `max_iterations` rounds of assign then update
/// - connectivity enforcement, which absorbs orphan components and recounts
///   cluster members
///
/// There is no convergence check; the iteration count is fixed by the caller.
pub fn iterate(
    image: &RgbImage,
    config: &Config,
    clusters: &mut Clusters,
) -> Result<(), SlicError> {
    config.validate(image)?;
    debug_assert_eq!(clusters.clusters.len(), config.num_of_clusters as usize);
    debug_assert_eq!(clusters.assignments.width, image.width);
    debug_assert_eq!(clusters.assignments.height, image.height);

    let search_region_size = config.search_region_size(image);
    let spatial_lut = compute_spatial_lut(config, search_region_size);
    debug!(
        "iterate: {}x{} image, {} clusters, search region {}, {} iterations",
        image.width, image.height, config.num_of_clusters, search_region_size, config.max_iterations
    );
    for _ in 0..config.max_iterations {
        assign(image, config, clusters, &spatial_lut, search_region_size);
        update(clusters, image, config);
    }
    enforce_connectivity(clusters, config, search_region_size);
    Ok(())
}

/// Computes the LUT of quantized spatial costs, indexed by the Manhattan
/// distance of a pixel from the cluster center.
///
/// Entry `m` holds `compactness * m * 2^quantize_level / S` rounded to the
/// nearest integer and saturated to 16 bits, so that it shares a scale with
/// the shifted color distances without ever wrapping.
pub fn compute_spatial_lut(config: &Config, search_region_size: u16) -> Vec<u16> {
    let s = search_region_size.max(1);
    let coef = config.compactness / s as f32 * (1u32 << config.quantize_level) as f32;
    (0..=2 * s as u32)
        .map(|m| (coef * m as f32).round().min(u16::MAX as f32) as u16)
        .collect()
}

/// This function does the update step.
///
/// Instead of the median, the average is used for the performance. All sums
/// are integer, so the result does not depend on the number of workers or on
/// merge order. Clusters that lost every member keep their previous centroid
/// and get `num_members = 0`.
#[multiversion(targets = "simd")]
pub fn update(clusters: &mut Clusters, image: &RgbImage, config: &Config) {
    let k = config.num_of_clusters as usize;
    debug_assert_eq!(clusters.clusters.len(), k);
    let num_cluster_members: Vec<AtomicU32> = (0..k).map(|_| AtomicU32::new(0)).collect();
    let cluster_acc_vec: Vec<[AtomicU32; 5]> =
        (0..k).map(|_| array::from_fn(|_| AtomicU32::new(0))).collect();

    fn accumulate_rows(
        rows: Range<usize>,
        image: &RgbImage,
        assignments: &AtomicArray2D<AtomicU32>,
        num_cluster_members: &[AtomicU32],
        cluster_acc_vec: &[[AtomicU32; 5]],
    ) {
        let k = num_cluster_members.len();
        let mut num_cluster_members_local: Vec<u32> = vec![0; k];
        let mut cluster_acc_local: Vec<[u32; 5]> = vec![[0, 0, 0, 0, 0]; k];
        for row in rows {
            let image_row = image.get_row(row);
            let assignments_row = assignments.get_row(row);
            for (column, (pixel, assignment)) in
                image_row.chunks_exact(3).zip(assignments_row).enumerate()
            {
                let label = assignment.load(Ordering::Relaxed);
                if label == LABEL_SENTINEL {
                    continue;
                }
                let label = label as usize;
                num_cluster_members_local[label] += 1;
                cluster_acc_local[label][0] += row as u32;
                cluster_acc_local[label][1] += column as u32;
                cluster_acc_local[label][2] += pixel[0] as u32;
                cluster_acc_local[label][3] += pixel[1] as u32;
                cluster_acc_local[label][4] += pixel[2] as u32;
            }
        }
        for (label, num_members) in num_cluster_members_local
            .into_iter()
            .enumerate()
            .filter(|(_, x)| *x != 0)
        {
            num_cluster_members[label].fetch_add(num_members, Ordering::Relaxed);
            for dim in 0..5 {
                cluster_acc_vec[label][dim].fetch_add(cluster_acc_local[label][dim], Ordering::Relaxed);
            }
        }
    }

    let ranges = split_length_to_ranges(image.height, current_num_threads());
    rayon::scope(|s| {
        let assignments = &clusters.assignments;
        let num_cluster_members = &num_cluster_members;
        let cluster_acc_vec = &cluster_acc_vec;
        for rows in ranges {
            s.spawn(move |_| {
                accumulate_rows(rows, image, assignments, num_cluster_members, cluster_acc_vec)
            })
        }
    });

    for cluster in clusters.clusters.iter_mut() {
        let cluster_num = cluster.number as usize;
        let cluster_members = num_cluster_members[cluster_num].load(Ordering::Relaxed);
        cluster.num_members = cluster_members;
        if cluster_members == 0 {
            continue;
        }
        let cluster_members_half = cluster_members / 2;
        let mean = |dim: usize| {
            (cluster_acc_vec[cluster_num][dim].load(Ordering::Relaxed) + cluster_members_half)
                / cluster_members
        };
        let next_y = mean(0) as u16;
        let next_x = mean(1) as u16;
        debug_assert!(
            (next_x as usize) < image.width,
            "{:?} trying to update x which is out of bounds - x={next_x}",
            cluster
        );
        debug_assert!(
            (next_y as usize) < image.height,
            "{:?} trying to update y which is out of bounds - y={next_y}",
            cluster
        );
        cluster.y = next_y;
        cluster.x = next_x;
        cluster.r = mean(2) as u8;
        cluster.g = mean(3) as u8;
        cluster.b = mean(4) as u8;
    }
}

use crate::slic::Clusters;
use std::sync::atomic::Ordering;

/// Aggregates a per-pixel mask into per-cluster densities.
///
/// For every cluster the mask values of its member pixels are summed and
/// divided by the member count (at least one, to keep empty clusters at
/// zero), capped at 255. Pixels with an out-of-range or sentinel label do
/// not contribute.
pub fn get_mask_density(clusters: &Clusters, mask: &[u8]) -> Vec<u8> {
    let assignments = &clusters.assignments;
    assert_eq!(mask.len(), assignments.width * assignments.height);
    let k = clusters.clusters.len();

    let mut sums = vec![0u64; k];
    for (word, mask_value) in assignments.data.iter().zip(mask) {
        let label = word.load(Ordering::Relaxed) as usize;
        if label < k {
            sums[label] += *mask_value as u64;
        }
    }

    clusters
        .clusters
        .iter()
        .map(|cluster| {
            let density = sums[cluster.number as usize] / cluster.num_members.max(1) as u64;
            density.min(255) as u8
        })
        .collect()
}

/// Broadcasts per-cluster densities back to a per-pixel image. Pixels with
/// an out-of-range or sentinel label map to zero.
pub fn cluster_density_to_mask(clusters: &Clusters, densities: &[u8]) -> Vec<u8> {
    let assignments = &clusters.assignments;
    assert_eq!(densities.len(), clusters.clusters.len());

    assignments
        .data
        .iter()
        .map(|word| {
            let label = word.load(Ordering::Relaxed) as usize;
            if label < densities.len() {
                densities[label]
            } else {
                0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{cluster_density_to_mask, get_mask_density};
    use crate::arrays::RgbImage;
    use crate::common::Config;
    use crate::slic::{iterate, Clusters};

    fn segmented_gradient(width: usize, height: usize, k: u16) -> (Config, Clusters) {
        let image = RgbImage::from_iter(
            (0..width * height).flat_map(|i| {
                let v = (i * 255 / (width * height)) as u8;
                [v, v / 2, 255 - v]
            }),
            width,
            height,
        );
        let config = Config {
            num_of_clusters: k,
            max_iterations: 3,
            ..Config::default()
        };
        let mut clusters = Clusters::initialize_clusters(&image, &config);
        iterate(&image, &config, &mut clusters).unwrap();
        (config, clusters)
    }

    #[test]
    fn full_mask_saturates_every_density() {
        let (_, clusters) = segmented_gradient(24, 18, 9);
        let mask = vec![255u8; 24 * 18];
        let densities = get_mask_density(&clusters, &mask);
        for (cluster, density) in clusters.clusters.iter().zip(&densities) {
            if cluster.num_members > 0 {
                assert_eq!(*density, 255);
            } else {
                assert_eq!(*density, 0);
            }
        }
    }

    #[test]
    fn constant_mask_round_trips() {
        let (_, clusters) = segmented_gradient(20, 20, 4);
        for value in [0u8, 17, 255] {
            let mask = vec![value; 20 * 20];
            let densities = get_mask_density(&clusters, &mask);
            let restored = cluster_density_to_mask(&clusters, &densities);
            for (restored_value, word) in restored.iter().zip(clusters.assignments.data.iter()) {
                let label = word.load(std::sync::atomic::Ordering::Relaxed);
                if label != crate::assign::LABEL_SENTINEL {
                    assert_eq!(*restored_value, value);
                }
            }
        }
    }

    #[test]
    fn sentinel_pixels_map_to_zero() {
        let (_, mut clusters) = segmented_gradient(12, 12, 4);
        clusters.assignments.data[0].store(0xFFFF, std::sync::atomic::Ordering::Relaxed);
        let densities = vec![9u8; clusters.clusters.len()];
        let restored = cluster_density_to_mask(&clusters, &densities);
        assert_eq!(restored[0], 0);
        assert_eq!(restored[1], 9);
    }
}

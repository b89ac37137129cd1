use crate::assign::LABEL_SENTINEL;
use crate::atomic_arrays::AtomicArray2D;
use crate::cluster::Cluster;
use crate::common::Config;
use crate::slic::Clusters;
use log::debug;
use rayon::prelude::*;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Hard cap on the neighbor list length of [`get_connectivity`]. Bounds
/// memory and keeps downstream graph algorithms simple; neighbors past the
/// cap are silently dropped.
pub const MAX_NEIGHBORS: usize = 12;

/// Cluster adjacency graph. `neighbors[k]` holds the cluster ids adjacent to
/// cluster `k`; all nested storage is owned and released on drop.
#[derive(Debug, Clone)]
pub struct Connectivity {
    pub num_nodes: usize,
    pub neighbors: Vec<Vec<u32>>,
}

impl Connectivity {
    pub fn num_neighbors(&self, node: usize) -> usize {
        self.neighbors[node].len()
    }
}

/// Order-independent hash of an unordered label pair.
#[inline]
fn symmetric_pair_hash(x: u32, y: u32) -> u32 {
    (x.wrapping_mul(0x1f1f1f1f) ^ y).wrapping_add(y.wrapping_mul(0x1f1f1f1f) ^ x)
}

/// Builds the pixel-based cluster adjacency graph from a final label image.
///
/// Two clusters are adjacent iff some pixel of one has a pixel of the other
/// immediately to its right, below, or diagonally below-right. The forward
/// scan reaches every 4-adjacency and the main diagonal of the 8-adjacency;
/// an anti-diagonal-only contact is not recorded.
///
/// Duplicate edges are filtered through a `K * 32`-bit hash set keyed by a
/// symmetric hash of the label pair; a hash hit is confirmed by scanning both
/// neighbor lists, so collisions cannot drop real edges. Each list is capped
/// at [`MAX_NEIGHBORS`]. Edges touching the sentinel label are ignored.
pub fn get_connectivity(
    assignments: &AtomicArray2D<AtomicU32>,
    num_of_clusters: u16,
) -> Connectivity {
    let k = num_of_clusters as u32;
    let width = assignments.width;
    let height = assignments.height;
    let mut conn = Connectivity {
        num_nodes: k as usize,
        neighbors: (0..k).map(|_| Vec::with_capacity(MAX_NEIGHBORS)).collect(),
    };
    let mut edge_bitmap = vec![0u32; k as usize];
    let label_at =
        |index: usize| -> u32 { assignments.data[index].load(Ordering::Relaxed) };

    for i in 0..height.saturating_sub(1) {
        for j in 0..width.saturating_sub(1) {
            let base_index = width * i + j;
            let source = label_at(base_index);
            if source >= k {
                continue;
            }
            for target_index in [base_index + 1, base_index + width, base_index + width + 1] {
                let target = label_at(target_index);
                if target >= k || source == target {
                    continue;
                }
                if conn.neighbors[source as usize].len() >= MAX_NEIGHBORS
                    || conn.neighbors[target as usize].len() >= MAX_NEIGHBORS
                {
                    continue;
                }
                let hash_idx =
                    (symmetric_pair_hash(source, target) % (k * 32)) as usize;
                let (word, bit) = (hash_idx / 32, 1u32 << (hash_idx % 32));
                if edge_bitmap[word] & bit != 0
                    && (conn.neighbors[source as usize].contains(&target)
                        || conn.neighbors[target as usize].contains(&source))
                {
                    continue;
                }
                conn.neighbors[source as usize].push(target);
                conn.neighbors[target as usize].push(source);
                edge_bitmap[word] |= bit;
            }
        }
    }
    conn
}

/// Builds the centroid k-nearest-neighbor graph.
///
/// Centroids are filed into a grid of cell size `S = max(sqrt(H * W / K), 1)`
/// and each query scans the 7x7 block of cells around its own cell with a
/// bounded max-heap of size `num_neighbors` keyed by L1 centroid distance.
/// After SLIC convergence centroids are spread at spacing around `S`, so the
/// fixed window yields at least `num_neighbors` candidates for the usual
/// `num_neighbors <= 24`; degenerate layouts that concentrate more than
/// seven cells' worth of centroids outside the window can return fewer.
/// Neighbor lists come back unordered.
pub fn knn_connectivity(
    width: usize,
    height: usize,
    clusters: &[Cluster],
    num_neighbors: usize,
) -> Connectivity {
    let k = clusters.len();
    let s = (((width * height) as f32 / k as f32).sqrt() as usize).max(1);
    let cells_y = height.div_ceil(s);
    let cells_x = width.div_ceil(s);

    let mut cells: Vec<Vec<u16>> = vec![Vec::new(); cells_y * cells_x];
    for (index, cluster) in clusters.iter().enumerate() {
        let cell = (cluster.y as usize / s) * cells_x + cluster.x as usize / s;
        cells[cell].push(index as u16);
    }

    let neighbors: Vec<Vec<u32>> = clusters
        .par_iter()
        .map(|cluster| {
            let cell_y = cluster.y as usize / s;
            let cell_x = cluster.x as usize / s;
            let mut heap: BinaryHeap<(u32, u16)> = BinaryHeap::with_capacity(num_neighbors + 1);
            for cy in cell_y.saturating_sub(3)..(cell_y + 4).min(cells_y) {
                for cx in cell_x.saturating_sub(3)..(cell_x + 4).min(cells_x) {
                    for &other_index in &cells[cy * cells_x + cx] {
                        let other = &clusters[other_index as usize];
                        if other.number == cluster.number {
                            continue;
                        }
                        let distance = other.x.abs_diff(cluster.x) as u32
                            + other.y.abs_diff(cluster.y) as u32;
                        if heap.len() < num_neighbors {
                            heap.push((distance, other.number));
                        } else if let Some(&(worst, _)) = heap.peek() {
                            if distance < worst {
                                heap.pop();
                                heap.push((distance, other.number));
                            }
                        }
                    }
                }
            }
            heap.into_iter().map(|(_, number)| number as u32).collect()
        })
        .collect();

    Connectivity {
        num_nodes: k,
        neighbors,
    }
}

/// This function implements the connectivity enforcement step.
///
/// 4-connected components of equal label are gathered with a union-find over
/// pixel indices whose root is always the component's topmost-leftmost pixel.
/// Components below `round(S * S * min_size_factor)` pixels are relabeled to
/// the final label of the pixel left of (or, on the left edge, above) their
/// leader; larger components and sentinel components keep their label, so
/// the label-to-cluster correspondence survives. Member counts are recounted
/// afterwards.
pub fn enforce_connectivity(
    clusters: &mut Clusters,
    config: &Config,
    search_region_size: u16,
) {
    let assignments = &clusters.assignments;
    let width = assignments.width;
    let height = assignments.height;
    let num_pixels = width * height;
    let min_threshold = ((search_region_size as u32 * search_region_size as u32) as f32
        * config.min_size_factor)
        .round() as u32;

    let label_at = |index: usize| -> u32 { assignments.data[index].load(Ordering::Relaxed) };

    // Path-halving find; roots stay the smallest index of their component.
    fn find(parents: &mut [u32], mut node: u32) -> u32 {
        while parents[node as usize] != node {
            let parent = parents[node as usize];
            parents[node as usize] = parents[parent as usize];
            node = parent;
        }
        node
    }

    fn union(parents: &mut [u32], a: u32, b: u32) {
        let root_a = find(parents, a);
        let root_b = find(parents, b);
        if root_a < root_b {
            parents[root_b as usize] = root_a;
        } else if root_b < root_a {
            parents[root_a as usize] = root_b;
        }
    }

    let mut parents: Vec<u32> = (0..num_pixels as u32).collect();

    for i in 0..height {
        for j in 0..width {
            let index = width * i + j;
            let label = label_at(index);
            if j > 0 && label == label_at(index - 1) {
                union(&mut parents, (index - 1) as u32, index as u32);
            }
            if i > 0 && label == label_at(index - width) {
                union(&mut parents, (index - width) as u32, index as u32);
            }
        }
    }

    let mut roots: Vec<u32> = vec![0; num_pixels];
    let mut sizes: Vec<u32> = vec![0; num_pixels];
    for index in 0..num_pixels {
        let root = find(&mut parents, index as u32);
        roots[index] = root;
        sizes[root as usize] += 1;
    }

    // Decide each component's final label at its leader; earlier pixels are
    // already final, so a small component inherits a settled neighbor label.
    let mut substitute: Vec<u32> = vec![0; num_pixels];
    let mut absorbed: u32 = 0;
    for index in 0..num_pixels {
        let root = roots[index] as usize;
        if root != index {
            continue;
        }
        let label = label_at(index);
        substitute[root] = label;
        if label == LABEL_SENTINEL || sizes[root] >= min_threshold || index == 0 {
            continue;
        }
        let neighbor_index = if index % width > 0 { index - 1 } else { index - width };
        substitute[root] = substitute[roots[neighbor_index] as usize];
        absorbed += 1;
    }

    for (index, word) in assignments.data.iter().enumerate() {
        word.store(substitute[roots[index] as usize], Ordering::Relaxed);
    }

    let mut counts = vec![0u32; clusters.clusters.len()];
    for word in assignments.data.iter() {
        let label = word.load(Ordering::Relaxed);
        if label != LABEL_SENTINEL {
            counts[label as usize] += 1;
        }
    }
    for cluster in clusters.clusters.iter_mut() {
        cluster.num_members = counts[cluster.number as usize];
    }
    debug!("enforce_connectivity: absorbed {absorbed} components below {min_threshold} pixels");
}

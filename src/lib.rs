//! Fast SLIC superpixel segmentation for packed RGB24 images.
//!
//! Given an image and a target cluster count K, the engine partitions every
//! pixel into one of K spatially-local color clusters by iterated local
//! assignment and centroid update, then lets you derive cluster adjacency
//! graphs from the result.
//!
//! The assignment step packs the quantized distance and the cluster number
//! into a single 32-bit word per pixel, so concurrent cluster tasks combine
//! their candidates with a plain atomic `min` and the outcome is identical
//! for any number of worker threads. Distances use the L1 norm on raw RGB
//! and a precomputed fixed-point spatial cost table; centroid updates use
//! integer means. See the module docs for the details of each step.
//!
//! ```rust
//! use superpix::arrays::RgbImage;
//! use superpix::common::Config;
//! use superpix::connectivity::get_connectivity;
//! use superpix::slic::{iterate, Clusters};
//!
//! // A small synthetic image; any packed RGB24 buffer works, e.g. the
//! // output of the image crate's `to_rgb8().into_raw()`.
//! let (width, height) = (64usize, 48usize);
//! let rgb: Vec<u8> = (0..width * height)
//!     .flat_map(|i| {
//!         let v = (i % 255) as u8;
//!         [v, 255 - v, 128]
//!     })
//!     .collect();
//! let image = RgbImage::from_raw_slice(&rgb, width, height);
//!
//! let config = Config {
//!     num_of_clusters: 12,
//!     max_iterations: 4,
//!     ..Config::default()
//! };
//! // Initialize clusters (a custom initializer can be used instead, e.g.
//! // to seed a region of interest).
//! let mut clusters = Clusters::initialize_clusters(&image, &config);
//! // Make the computation.
//! iterate(&image, &config, &mut clusters).unwrap();
//!
//! // Labels now live in `clusters.assignments`; derive the adjacency graph.
//! let graph = get_connectivity(&clusters.assignments, config.num_of_clusters);
//! assert_eq!(graph.num_nodes, 12);
//! ```
//!
//! This crate uses `rayon` for all parallel sections; run it inside a
//! configured thread pool to bound the worker count. It is strongly
//! recommended to use this in release builds.

pub mod arrays;
pub mod assign;
pub mod atomic_arrays;
pub mod cluster;
pub mod common;
pub mod connectivity;
pub mod error;
pub mod masking;
pub mod slic;

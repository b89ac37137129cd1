use crate::arrays::RgbImage;
use crate::error::SlicError;
use std::ops::Range;

/// Left shift applied to color distances larger than this overflows the
/// shared 16-bit score scale (maximum color L1 is 3 * 255 = 765).
pub const MAX_QUANTIZE_LEVEL: u8 = 7;

/// Main config for the processing.
///
/// The defaults are tuned for photographic images around 1-4 Mpix; for good
/// performance the search region size _S = sqrt((width * height) / K)_ should
/// end up somewhere between 20 (more clusters) and 50 (fewer clusters).
#[derive(Clone)]
pub struct Config {
    /// Number of clusters. This directly influences the search region size
    /// (_S_), computed as _S = sqrt((image width * height) / num_of_clusters)_.
    pub num_of_clusters: u16,
    /// How many assign/update rounds are done before connectivity
    /// enforcement. There is no preemptive exit.
    pub max_iterations: u16,
    /// Weight of spatial proximity against color proximity. Higher values
    /// make superpixels rounder; this is about trading color accuracy for
    /// locality. Does not affect performance.
    pub compactness: f32,
    /// Connected components smaller than _S * S * min_size_factor_ pixels are
    /// merged into a surrounding cluster by the enforcement pass.
    pub min_size_factor: f32,
    /// Left shift that promotes integer color distances onto the 16-bit
    /// score scale shared with the spatial LUT. Typical values are 5 to 7;
    /// values above [`MAX_QUANTIZE_LEVEL`] are rejected.
    pub quantize_level: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_of_clusters: 2000,
            max_iterations: 10,
            compactness: 10f32,
            min_size_factor: 0.25,
            quantize_level: 6,
        }
    }
}

impl Config {
    /// Fail-fast entry validation. Kernel code relies on these bounds.
    pub(crate) fn validate(&self, image: &RgbImage) -> Result<(), SlicError> {
        if self.num_of_clusters == 0 {
            return Err(SlicError::ZeroClusters);
        }
        let pixels = image.width * image.height;
        if self.num_of_clusters as usize > pixels {
            return Err(SlicError::TooManyClusters {
                clusters: self.num_of_clusters as u32,
                pixels,
            });
        }
        if self.quantize_level > MAX_QUANTIZE_LEVEL {
            return Err(SlicError::QuantizeLevelTooLarge(self.quantize_level));
        }
        if self.max_iterations == 0 {
            return Err(SlicError::ZeroIterations);
        }
        Ok(())
    }

    /// Nominal superpixel side, used both as the neighborhood radius of the
    /// assignment window and as the spatial normalization constant.
    pub fn search_region_size(&self, image: &RgbImage) -> u16 {
        ((image.width * image.height) as f32 / self.num_of_clusters as f32).sqrt() as u16
    }
}

pub(crate) fn split_length_to_ranges(length: usize, splits: usize) -> Vec<Range<usize>> {
    let chunk_size = length / splits;
    let rem = length % splits;
    (0..splits)
        .scan((rem, 0usize), |(r, acc), _split| {
            let mut size = chunk_size;
            if *r > 0 {
                *r -= 1;
                size += 1;
            }
            let out = (*acc, *acc + size);
            *acc += size;
            Some(out.0..out.1)
        })
        .filter(|r| !r.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::split_length_to_ranges;

    #[test]
    fn ranges_cover_length() {
        for (length, splits) in [(1080usize, 8usize), (7, 8), (16, 4), (1, 1)] {
            let ranges = split_length_to_ranges(length, splits);
            assert_eq!(ranges.first().unwrap().start, 0);
            assert_eq!(ranges.last().unwrap().end, length);
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
    }
}

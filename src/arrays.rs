use aligned_vec::{AVec, ConstAlign};
use std::ops::Index;

const ALIGN: usize = 64;

/// Packed RGB24 image. Pixel `(x, y)` occupies bytes
/// `[3 * (width * y + x), 3 * (width * y + x) + 3)` of a contiguous,
/// cache-line-aligned buffer.
pub struct RgbImage {
    pub rgb_data: AVec<u8, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
}

impl RgbImage {
    pub fn from_raw_slice(rgb_data: &[u8], width: usize, height: usize) -> Self {
        assert!(width > 0);
        assert!(height > 0);
        assert_eq!(rgb_data.len(), width * height * 3);

        Self {
            width,
            height,
            rgb_data: AVec::from_slice(ALIGN, rgb_data),
        }
    }

    pub fn from_iter<I>(rgb_iter: I, width: usize, height: usize) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        assert!(width > 0);
        assert!(height > 0);

        let rgb_data = AVec::from_iter(ALIGN, rgb_iter);
        assert_eq!(rgb_data.len(), width * height * 3);

        Self {
            width,
            height,
            rgb_data,
        }
    }

    #[inline(always)]
    pub fn get_row(&self, row: usize) -> &[u8] {
        debug_assert!(row < self.height);
        &self.rgb_data[(self.width * 3 * row)..(self.width * 3 * (row + 1))]
    }

    /// Bytes of the pixel span `[left, right)` of a row.
    #[inline(always)]
    pub fn get_row_part(&self, row: usize, left: usize, right: usize) -> &[u8] {
        debug_assert!(row < self.height);
        debug_assert!(left < right);
        debug_assert!(right <= self.width);
        let base = self.width * 3 * row;
        &self.rgb_data[(base + 3 * left)..(base + 3 * right)]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(self.width > x);
        debug_assert!(self.height > y);
        (self.width * y + x) * 3
    }

    #[inline(always)]
    pub fn get_pixel(&self, x: usize, y: usize) -> &[u8] {
        let idx = self.get_index(x, y);
        &self.rgb_data[idx..idx + 3]
    }
}

impl Index<(usize, usize)> for RgbImage {
    type Output = [u8];
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        let idx = self.get_index(x, y);
        &self.rgb_data[idx..idx + 3]
    }
}

#[cfg(test)]
mod tests {
    use super::RgbImage;

    #[test]
    fn rgb_image_indexing() {
        let width = 5;
        let height = 4;
        let data: Vec<u8> = (0..(width * height * 3) as u16).map(|i| i as u8).collect();
        let image = RgbImage::from_raw_slice(&data, width, height);
        assert_eq!(image.get_row(0).len(), width * 3);
        assert_eq!(image.get_row_part(1, 1, 4).len(), 3 * 3);
        assert_eq!(image.get_pixel(2, 3), &data[(width * 3 + 2) * 3..][..3]);
        assert_eq!(&image[(0, 1)], &data[width * 3..width * 3 + 3]);
    }

    #[test]
    fn rgb_image_from_iter() {
        let width = 8;
        let height = 2;
        let image = RgbImage::from_iter((0..width * height * 3).map(|i| (i % 256) as u8), width, height);
        assert_eq!(image.rgb_data.len(), width * height * 3);
        assert_eq!(image.get_pixel(0, 0), &[0, 1, 2]);
    }
}

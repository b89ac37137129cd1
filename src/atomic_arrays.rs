use aligned_vec::{AVec, ConstAlign};
use std::fmt;
use std::ops::Index;

const ALIGN: usize = 64;

/// Row-major 2-D array of atomics, shared between worker threads.
///
/// The assignment kernel writes candidate words through `fetch_min` from many
/// tasks at once; `min` on unsigned integers is commutative and associative,
/// so any interleaving produces the same final content.
pub struct AtomicArray2D<T: Sync + Send> {
    pub data: AVec<T, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
}

impl<T: Sync + Send> AtomicArray2D<T> {
    pub fn from_fill<U: Copy + Into<T>>(value: U, width: usize, height: usize) -> Self {
        let data: AVec<T, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..width * height).map(|_| value.into()));
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_slice<U: Copy + Into<T>>(source: &[U], width: usize, height: usize) -> Self {
        assert_eq!(width * height, source.len());
        let data: AVec<T, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, source.iter().map(|y| (*y).into()));
        Self {
            width,
            height,
            data,
        }
    }

    pub fn fill<U: Copy + Into<T>>(&mut self, value: U) {
        self.data.fill_with(|| value.into())
    }

    #[inline(always)]
    pub fn get_row(&self, row: usize) -> &[T] {
        &self.data[self.width * row..self.width * (row + 1)]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(
            self.width > x,
            "Index ({x}, {y}) is out of bounds ({}, {})",
            self.width,
            self.height
        );
        debug_assert!(
            self.height > y,
            "Index ({x}, {y}) is out of bounds ({}, {})",
            self.width,
            self.height
        );
        self.width * y + x
    }

    pub fn get_x_y_index(&self, ind: usize) -> (usize, usize) {
        debug_assert!(ind < self.data.len());
        let y = ind / self.width;
        let x = ind % self.width;
        (x, y)
    }
}

impl<T: Sync + Send> fmt::Debug for AtomicArray2D<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("AtomicArray2D")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data", &"Omitted...")
            .finish()
    }
}

impl<T: Sync + Send> Index<(usize, usize)> for AtomicArray2D<T> {
    type Output = T;
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[self.get_index(x, y)]
    }
}

#[cfg(test)]
mod tests {
    use super::AtomicArray2D;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<AtomicArray2D<AtomicU32>>();
        assert_sync::<AtomicArray2D<AtomicU32>>();
    }

    #[test]
    fn atomic_array_test() {
        let mut data: AtomicArray2D<AtomicU32> = AtomicArray2D::from_fill(0u32, 1920, 1080);
        data.fill(0xFFFF_FFFFu32);
        data.fill(0u32);
        assert_eq!((155, 560), data.get_x_y_index(data.get_index(155, 560)));

        let d: AtomicArray2D<AtomicU32> = AtomicArray2D::from_slice(&[0u32, 1, 2, 3, 4, 5], 3, 2);
        rayon::scope(|s| {
            s.spawn(|_| {
                d[(1, 1)].store(54, Ordering::Relaxed);
            });
            s.spawn(|_| {
                d[(0, 0)].fetch_min(0, Ordering::Relaxed);
            });
        });
        assert_eq!(
            d.data
                .iter()
                .map(|v| v.load(Ordering::Relaxed))
                .collect::<Vec<u32>>(),
            [0, 1, 2, 3, 54, 5]
        );
    }

    #[test]
    fn fetch_min_keeps_smaller_word() {
        let d: AtomicArray2D<AtomicU32> = AtomicArray2D::from_fill(0xFFFF_FFFFu32, 4, 1);
        d[(2, 0)].fetch_min(0x0010_0003, Ordering::Relaxed);
        d[(2, 0)].fetch_min(0x0010_0001, Ordering::Relaxed);
        d[(2, 0)].fetch_min(0x0010_0002, Ordering::Relaxed);
        assert_eq!(d[(2, 0)].load(Ordering::Relaxed), 0x0010_0001);
    }
}

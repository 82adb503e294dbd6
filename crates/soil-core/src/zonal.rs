//! Grouped sum reduction: sum of a weight band grouped by territory code
//! within class code, over a pixel window.
//!
//! Rows are reduced independently (in parallel with the `threading`
//! feature) and their partial sums merged in row order, so the result does
//! not depend on scheduling.

use std::collections::BTreeMap;

#[cfg(feature = "threading")]
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, SoilError};
use crate::grid::Window;

/// Class code → territory code → summed weight.
pub type GroupedSums = BTreeMap<u32, BTreeMap<u64, f64>>;

/// Three co-registered bands, row-major over a `width`-wide grid.
pub struct ZonalBands<'a> {
    pub weight: &'a [f64],
    pub class: &'a [Option<u32>],
    pub territory: &'a [Option<u64>],
    pub width: usize,
}

/// Reduction parameters.
#[derive(Debug, Clone, Copy)]
pub struct Reduction {
    pub window: Window,
    /// Visit every `stride`-th row and column; each sample stands for
    /// `stride × stride` cells.
    pub stride: usize,
    pub max_pixels: u64,
}

type RowSums = BTreeMap<(u32, u64), f64>;

fn reduce_row(bands: &ZonalBands<'_>, row: usize, red: &Reduction, scale: f64) -> RowSums {
    let mut sums = RowSums::new();
    let start = row * bands.width;
    for col in (red.window.col0..red.window.col0 + red.window.cols).step_by(red.stride) {
        let i = start + col;
        let (Some(class), Some(territory)) = (bands.class[i], bands.territory[i]) else {
            continue;
        };
        let w = bands.weight[i];
        if !w.is_finite() {
            continue;
        }
        *sums.entry((class, territory)).or_insert(0.0) += w * scale;
    }
    sums
}

/// Sum `bands.weight` per (class, territory) over the window.
///
/// Only combinations with at least one contributing pixel appear in the
/// result. A pixel contributes when both codes are present and its weight
/// is finite.
pub fn grouped_sum(bands: &ZonalBands<'_>, red: &Reduction) -> Result<GroupedSums> {
    let red = Reduction {
        stride: red.stride.max(1),
        ..*red
    };
    if red.window.is_empty() {
        return Err(SoilError::EmptyRegion);
    }
    let pixels = red.window.sampled_pixels(red.stride);
    if pixels > red.max_pixels {
        return Err(SoilError::TooManyPixels {
            pixels,
            max_pixels: red.max_pixels,
        });
    }

    let scale = (red.stride * red.stride) as f64;
    let rows: Vec<usize> = (red.window.row0..red.window.row0 + red.window.rows)
        .step_by(red.stride)
        .collect();

    #[cfg(feature = "threading")]
    let partials: Vec<RowSums> = rows
        .par_iter()
        .map(|&row| reduce_row(bands, row, &red, scale))
        .collect();
    #[cfg(not(feature = "threading"))]
    let partials: Vec<RowSums> = rows
        .iter()
        .map(|&row| reduce_row(bands, row, &red, scale))
        .collect();

    let mut out = GroupedSums::new();
    for partial in partials {
        for ((class, territory), sum) in partial {
            *out.entry(class).or_default().entry(territory).or_insert(0.0) += sum;
        }
    }

    debug!(
        pixels,
        classes = out.len(),
        groups = out.values().map(BTreeMap::len).sum::<usize>(),
        "grouped sum"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn full(width: usize, height: usize) -> Reduction {
        Reduction {
            window: Window::full(width, height),
            stride: 1,
            max_pixels: 1_000_000,
        }
    }

    #[test]
    fn sums_per_class_and_territory() {
        let weight = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let class = vec![Some(10), Some(10), Some(20), Some(10), None, Some(20)];
        let territory = vec![Some(1), Some(2), Some(1), Some(1), Some(1), None];
        let bands = ZonalBands {
            weight: &weight,
            class: &class,
            territory: &territory,
            width: 3,
        };
        let sums = grouped_sum(&bands, &full(3, 2)).unwrap();

        assert_eq!(sums.len(), 2);
        assert_relative_eq!(sums[&10][&1], 5.0);
        assert_relative_eq!(sums[&10][&2], 2.0);
        assert_relative_eq!(sums[&20][&1], 3.0);
        assert_eq!(sums[&20].len(), 1);
    }

    #[test]
    fn non_finite_weights_do_not_create_groups() {
        let weight = vec![f64::NAN, 1.0];
        let class = vec![Some(7), Some(8)];
        let territory = vec![Some(1), Some(1)];
        let bands = ZonalBands {
            weight: &weight,
            class: &class,
            territory: &territory,
            width: 2,
        };
        let sums = grouped_sum(&bands, &full(2, 1)).unwrap();
        assert!(!sums.contains_key(&7));
        assert!(sums.contains_key(&8));
    }

    #[test]
    fn zero_weights_still_create_groups() {
        let weight = vec![0.0];
        let class = vec![Some(7)];
        let territory = vec![Some(1)];
        let bands = ZonalBands {
            weight: &weight,
            class: &class,
            territory: &territory,
            width: 1,
        };
        let sums = grouped_sum(&bands, &full(1, 1)).unwrap();
        assert_eq!(sums[&7][&1], 0.0);
    }

    #[test]
    fn window_restricts_pixels() {
        let weight = vec![1.0; 16];
        let class = vec![Some(1); 16];
        let territory = vec![Some(1); 16];
        let bands = ZonalBands {
            weight: &weight,
            class: &class,
            territory: &territory,
            width: 4,
        };
        let red = Reduction {
            window: Window { col0: 1, row0: 1, cols: 2, rows: 3 },
            stride: 1,
            max_pixels: 100,
        };
        let sums = grouped_sum(&bands, &red).unwrap();
        assert_relative_eq!(sums[&1][&1], 6.0);
    }

    #[test]
    fn stride_scales_weights() {
        let weight = vec![1.0; 16];
        let class = vec![Some(1); 16];
        let territory = vec![Some(1); 16];
        let bands = ZonalBands {
            weight: &weight,
            class: &class,
            territory: &territory,
            width: 4,
        };
        let red = Reduction {
            stride: 2,
            ..full(4, 4)
        };
        let sums = grouped_sum(&bands, &red).unwrap();
        // 4 samples × 4 cells each.
        assert_relative_eq!(sums[&1][&1], 16.0);
    }

    #[test]
    fn pixel_ceiling_is_enforced() {
        let weight = vec![1.0; 4];
        let class = vec![Some(1); 4];
        let territory = vec![Some(1); 4];
        let bands = ZonalBands {
            weight: &weight,
            class: &class,
            territory: &territory,
            width: 2,
        };
        let red = Reduction {
            max_pixels: 3,
            ..full(2, 2)
        };
        assert!(matches!(
            grouped_sum(&bands, &red),
            Err(SoilError::TooManyPixels { pixels: 4, max_pixels: 3 })
        ));
    }

    #[test]
    fn empty_window_is_an_error() {
        let bands = ZonalBands {
            weight: &[],
            class: &[],
            territory: &[],
            width: 0,
        };
        assert!(matches!(grouped_sum(&bands, &full(0, 0)), Err(SoilError::EmptyRegion)));
    }

    #[test]
    fn sums_are_order_independent() {
        // Same multiset of pixels, rows permuted.
        let w_a = vec![0.1, 0.2, 0.3, 0.7, 0.11, 0.13];
        let w_b = vec![0.7, 0.11, 0.13, 0.1, 0.2, 0.3];
        let class = vec![Some(1); 6];
        let territory = vec![Some(3); 6];
        let a = grouped_sum(
            &ZonalBands { weight: &w_a, class: &class, territory: &territory, width: 3 },
            &full(3, 2),
        )
        .unwrap();
        let b = grouped_sum(
            &ZonalBands { weight: &w_b, class: &class, territory: &territory, width: 3 },
            &full(3, 2),
        )
        .unwrap();
        assert_relative_eq!(a[&1][&3], b[&1][&3], epsilon = 1e-12);
    }

    struct Scene {
        weight: Vec<f64>,
        class: Vec<Option<u32>>,
        territory: Vec<Option<u64>>,
        width: usize,
    }

    impl Scene {
        fn new(width: usize, height: usize) -> Self {
            let n = width * height;
            Self {
                weight: (0..n)
                    .map(|i| if i % 13 == 0 { f64::NAN } else { ((i * 37) % 11) as f64 * 0.1 + 0.01 })
                    .collect(),
                class: (0..n).map(|i| (i % 7 != 0).then_some((i % 3) as u32 * 10)).collect(),
                territory: (0..n).map(|i| (i % 5 != 0).then_some((i % 2) as u64)).collect(),
                width,
            }
        }

        fn bands(&self) -> ZonalBands<'_> {
            ZonalBands {
                weight: &self.weight,
                class: &self.class,
                territory: &self.territory,
                width: self.width,
            }
        }

        /// Pixel-by-pixel fold on one thread.
        fn fold(&self, red: &Reduction) -> GroupedSums {
            let mut out = GroupedSums::new();
            let scale = (red.stride * red.stride) as f64;
            for row in (red.window.row0..red.window.row0 + red.window.rows).step_by(red.stride) {
                for col in (red.window.col0..red.window.col0 + red.window.cols).step_by(red.stride) {
                    let i = row * self.width + col;
                    if let (Some(c), Some(t)) = (self.class[i], self.territory[i]) {
                        if self.weight[i].is_finite() {
                            *out.entry(c).or_default().entry(t).or_insert(0.0) += self.weight[i] * scale;
                        }
                    }
                }
            }
            out
        }
    }

    #[test]
    fn matches_serial_pixel_fold() {
        let scene = Scene::new(7, 9);
        for red in [
            full(7, 9),
            Reduction {
                window: Window { col0: 1, row0: 2, cols: 5, rows: 6 },
                stride: 2,
                max_pixels: 1_000,
            },
        ] {
            let sums = grouped_sum(&scene.bands(), &red).unwrap();
            let expected = scene.fold(&red);
            assert_eq!(
                sums.keys().collect::<Vec<_>>(),
                expected.keys().collect::<Vec<_>>()
            );
            for (class, by_territory) in &expected {
                assert_eq!(sums[class].len(), by_territory.len());
                for (territory, &v) in by_territory {
                    assert_relative_eq!(sums[class][territory], v, epsilon = 1e-9);
                }
            }
        }
    }

    #[cfg(feature = "threading")]
    #[test]
    fn thread_count_does_not_change_sums() {
        let scene = Scene::new(31, 47);
        let red = full(31, 47);
        let run = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| grouped_sum(&scene.bands(), &red).unwrap())
        };
        let single = run(1);
        assert_eq!(single, run(4));
        assert_eq!(single, run(8));
    }
}

//! Soil organic carbon stock bins (10 t/ha wide, top bin open-ended).

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoilError};

/// Width of one bin in t/ha.
pub const BIN_WIDTH_T_HA: f32 = 10.0;
/// Highest bin; collects every stock ≥ 80 t/ha.
pub const MAX_BIN: u8 = 8;

const LABELS: [&str; 9] = [
    "1. 0 até 10 ton/ha",
    "2. 10 até 20 ton/ha",
    "3. 20 até 30 ton/ha",
    "4. 30 até 40 ton/ha",
    "5. 40 até 50 ton/ha",
    "6. 50 até 60 ton/ha",
    "7. 60 até 70 ton/ha",
    "8. 70 até 80 ton/ha",
    "9. mais de 80 ton/ha",
];

/// Ordinal carbon-stock bin in `0..=MAX_BIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32")]
pub struct CarbonBin(u8);

impl CarbonBin {
    pub fn new(bin: u32) -> Result<Self> {
        if bin > MAX_BIN as u32 {
            return Err(SoilError::CarbonBinOutOfRange(bin));
        }
        Ok(Self(bin as u8))
    }

    /// Bin a stock value in t/ha: `floor(stock / 10)` clamped to `[0, 8]`.
    pub fn from_stock(stock_t_ha: f32) -> Self {
        let bin = (stock_t_ha / BIN_WIDTH_T_HA).floor();
        Self(bin.clamp(0.0, MAX_BIN as f32) as u8)
    }

    #[inline]
    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        LABELS[self.0 as usize]
    }

    pub fn lower_bound(self) -> f32 {
        self.0 as f32 * BIN_WIDTH_T_HA
    }

    /// Exclusive upper bound in t/ha; `None` for the open-ended top bin.
    pub fn upper_bound(self) -> Option<f32> {
        (self.0 < MAX_BIN).then(|| (self.0 + 1) as f32 * BIN_WIDTH_T_HA)
    }
}

impl TryFrom<u32> for CarbonBin {
    type Error = SoilError;

    fn try_from(bin: u32) -> Result<Self> {
        Self::new(bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_at_edges() {
        assert_eq!(CarbonBin::from_stock(0.0).value(), 0);
        assert_eq!(CarbonBin::from_stock(9.99).value(), 0);
        assert_eq!(CarbonBin::from_stock(10.0).value(), 1);
        assert_eq!(CarbonBin::from_stock(79.9).value(), 7);
        assert_eq!(CarbonBin::from_stock(80.0).value(), 8);
        assert_eq!(CarbonBin::from_stock(150.0).value(), 8);
    }

    #[test]
    fn negative_stock_clamps_to_first_bin() {
        assert_eq!(CarbonBin::from_stock(-15.0).value(), 0);
    }

    #[test]
    fn binning_is_monotonic() {
        let mut prev = 0;
        for i in 0..2000 {
            let bin = CarbonBin::from_stock(i as f32 * 0.1).value();
            assert!(bin >= prev);
            prev = bin;
        }
        assert_eq!(prev, MAX_BIN);
    }

    #[test]
    fn labels_and_bounds() {
        let b = CarbonBin::new(5).unwrap();
        assert_eq!(b.label(), "6. 50 até 60 ton/ha");
        assert_eq!(b.lower_bound(), 50.0);
        assert_eq!(b.upper_bound(), Some(60.0));

        let top = CarbonBin::new(8).unwrap();
        assert_eq!(top.label(), "9. mais de 80 ton/ha");
        assert_eq!(top.upper_bound(), None);

        assert!(CarbonBin::new(9).is_err());
    }

    #[test]
    fn deserialized_bins_are_range_checked() {
        let bin: CarbonBin = serde_json::from_str("8").unwrap();
        assert_eq!(bin.label(), "9. mais de 80 ton/ha");
        assert!(serde_json::from_str::<CarbonBin>("200").is_err());
    }
}

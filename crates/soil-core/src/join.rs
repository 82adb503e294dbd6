//! Decoding of reduction tables and the area/mass inner join.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::codes::{ClassKey, TerritoryKey};
use crate::error::Result;
use crate::zonal::GroupedSums;

/// Exact key of one exported row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JoinKey {
    pub class: ClassKey,
    pub territory: TerritoryKey,
    pub year: u16,
}

/// One row of a joined yearly table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JoinedRow {
    pub key: JoinKey,
    pub area_ha: f64,
    pub mass_t: f64,
}

/// Result of an inner join, with the counts of rows that found no partner.
#[derive(Debug, Clone, Default)]
pub struct JoinOutcome {
    pub rows: Vec<JoinedRow>,
    pub area_only: usize,
    pub mass_only: usize,
}

/// Decode a grouped reduction into keyed values.
pub fn flatten(sums: &GroupedSums, year: u16) -> Result<BTreeMap<JoinKey, f64>> {
    let mut out = BTreeMap::new();
    for (&class_code, by_territory) in sums {
        let class = ClassKey::decode(class_code)?;
        for (&territory_code, &value) in by_territory {
            let key = JoinKey {
                class,
                territory: TerritoryKey::decode(territory_code)?,
                year,
            };
            out.insert(key, value);
        }
    }
    Ok(out)
}

/// Inner join on the exact key. Keys present on one side only are dropped,
/// never emitted with a zero for the missing side. Rows come out in key order.
pub fn inner_join(area: &BTreeMap<JoinKey, f64>, mass: &BTreeMap<JoinKey, f64>) -> JoinOutcome {
    let rows: Vec<JoinedRow> = area
        .iter()
        .filter_map(|(key, &area_ha)| {
            mass.get(key).map(|&mass_t| JoinedRow {
                key: *key,
                area_ha,
                mass_t,
            })
        })
        .collect();

    let area_only = area.len() - rows.len();
    let mass_only = mass.len() - rows.len();
    if area_only > 0 || mass_only > 0 {
        debug!(area_only, mass_only, "unmatched keys dropped by inner join");
    }
    JoinOutcome {
        rows,
        area_only,
        mass_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbon::CarbonBin;
    use crate::texture::TextureClass;

    fn key(landcover: u32, bin: u32, admin: u64) -> JoinKey {
        JoinKey {
            class: ClassKey::new(landcover, TextureClass::Clayey, CarbonBin::new(bin).unwrap()).unwrap(),
            territory: TerritoryKey::new(4, admin).unwrap(),
            year: 2023,
        }
    }

    #[test]
    fn flatten_decodes_both_levels() {
        let sums: GroupedSums =
            BTreeMap::from([(2035, BTreeMap::from([(4_100_064, 12.5), (4_100_134, 3.0)]))]);
        let flat = flatten(&sums, 2023).unwrap();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[&key(3, 5, 410006)], 12.5);
        assert_eq!(flat[&key(3, 5, 410013)], 3.0);
    }

    #[test]
    fn flatten_rejects_foreign_class_codes() {
        let sums: GroupedSums = BTreeMap::from([(9, BTreeMap::from([(1, 1.0)]))]);
        assert!(flatten(&sums, 2023).is_err());
    }

    #[test]
    fn area_only_row_is_dropped_not_zero_filled() {
        let both = key(3, 5, 41);
        let area_only = key(15, 2, 41);
        let mass_only = key(21, 1, 41);

        let area = BTreeMap::from([(both, 100.0), (area_only, 10.0)]);
        let mass = BTreeMap::from([(both, 4200.0), (mass_only, 7.0)]);

        let out = inner_join(&area, &mass);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].key, both);
        assert_eq!(out.rows[0].area_ha, 100.0);
        assert_eq!(out.rows[0].mass_t, 4200.0);
        assert!(out.rows.iter().all(|r| r.key != area_only));
        assert_eq!(out.area_only, 1);
        assert_eq!(out.mass_only, 1);
    }

    #[test]
    fn years_do_not_join_across() {
        let a = key(3, 5, 41);
        let b = JoinKey { year: 2022, ..a };
        let out = inner_join(&BTreeMap::from([(a, 1.0)]), &BTreeMap::from([(b, 1.0)]));
        assert!(out.rows.is_empty());
    }
}

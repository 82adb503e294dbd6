//! Human-readable labels for exported tables.
//!
//! The land-cover hierarchy follows the MapBiomas collection 8 legend. Each
//! class has labels at levels 0, 1, 1_1, 2, 3 and 4; levels deeper than a
//! class's own depth repeat its most specific name. Both the land-cover
//! table and the administrative-unit names can be replaced from JSON.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoilError};

/// Label used for codes missing from a table.
pub const NOT_OBSERVED: &str = "Não observado";

/// Labels of one land-cover class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandCoverLevels {
    pub n0: String,
    pub n1: String,
    pub n1_1: String,
    pub n2: String,
    pub n3: String,
    pub n4: String,
}

impl LandCoverLevels {
    fn not_observed() -> Self {
        let s = NOT_OBSERVED.to_string();
        Self {
            n0: s.clone(),
            n1: s.clone(),
            n1_1: format!("6. {s}"),
            n2: s.clone(),
            n3: s.clone(),
            n4: s,
        }
    }
}

const N0_NATURAL: &str = "Natural";
const N0_ANTHROPIC: &str = "Antrópico";

const FOREST: (u8, &str) = (1, "Floresta");
const NON_FOREST: (u8, &str) = (2, "Formação Natural não Florestal");
const FARMING: (u8, &str) = (3, "Agropecuária");
const NON_VEGETATED: (u8, &str) = (4, "Área não Vegetada");
const WATER: (u8, &str) = (5, "Corpo D'água");
const UNOBSERVED: (u8, &str) = (6, NOT_OBSERVED);

/// (code, level 0, level 1, path below level 1)
const LAND_COVER: &[(u8, &str, (u8, &str), &[&str])] = &[
    (1, N0_NATURAL, FOREST, &[]),
    (3, N0_NATURAL, FOREST, &["Formação Florestal"]),
    (4, N0_NATURAL, FOREST, &["Formação Savânica"]),
    (5, N0_NATURAL, FOREST, &["Mangue"]),
    (6, N0_NATURAL, FOREST, &["Floresta Alagável"]),
    (49, N0_NATURAL, FOREST, &["Restinga Arbórea"]),
    (10, N0_NATURAL, NON_FOREST, &[]),
    (11, N0_NATURAL, NON_FOREST, &["Campo Alagado e Área Pantanosa"]),
    (12, N0_NATURAL, NON_FOREST, &["Formação Campestre"]),
    (32, N0_NATURAL, NON_FOREST, &["Apicum"]),
    (29, N0_NATURAL, NON_FOREST, &["Afloramento Rochoso"]),
    (50, N0_NATURAL, NON_FOREST, &["Restinga Herbácea"]),
    (13, N0_NATURAL, NON_FOREST, &["Outras Formações não Florestais"]),
    (14, N0_ANTHROPIC, FARMING, &[]),
    (15, N0_ANTHROPIC, FARMING, &["Pastagem"]),
    (18, N0_ANTHROPIC, FARMING, &["Agricultura"]),
    (19, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Temporária"]),
    (39, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Temporária", "Soja"]),
    (20, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Temporária", "Cana"]),
    (40, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Temporária", "Arroz"]),
    (62, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Temporária", "Algodão"]),
    (41, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Temporária", "Outras Lavouras Temporárias"]),
    (36, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Perene"]),
    (46, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Perene", "Café"]),
    (47, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Perene", "Citrus"]),
    (35, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Perene", "Dendê"]),
    (48, N0_ANTHROPIC, FARMING, &["Agricultura", "Lavoura Perene", "Outras Lavouras Perenes"]),
    (9, N0_ANTHROPIC, FARMING, &["Silvicultura"]),
    (21, N0_ANTHROPIC, FARMING, &["Mosaico de Usos"]),
    (22, N0_ANTHROPIC, NON_VEGETATED, &[]),
    (23, N0_NATURAL, NON_VEGETATED, &["Praia, Duna e Areal"]),
    (24, N0_ANTHROPIC, NON_VEGETATED, &["Área Urbanizada"]),
    (30, N0_ANTHROPIC, NON_VEGETATED, &["Mineração"]),
    (25, N0_ANTHROPIC, NON_VEGETATED, &["Outras Áreas não Vegetadas"]),
    (26, N0_NATURAL, WATER, &[]),
    (33, N0_NATURAL, WATER, &["Rio, Lago e Oceano"]),
    (31, N0_ANTHROPIC, WATER, &["Aquicultura"]),
    (27, NOT_OBSERVED, UNOBSERVED, &[]),
];

const BIOMAS: &[(u8, &str)] = &[
    (1, "Amazônia"),
    (2, "Caatinga"),
    (3, "Cerrado"),
    (4, "Mata Atlântica"),
    (5, "Pampa"),
    (6, "Pantanal"),
];

/// Western Paraná regions used as administrative units.
const REGIONS: &[(u32, &str)] = &[
    (0, NOT_OBSERVED),
    (410006, "Cascavel"),
    (410007, "Foz do Iguaçu"),
    (410008, "Toledo"),
    (410013, "Marechal Cândido Rondon"),
];

/// State (UF) codes; they never overlap the six-digit region codes.
const STATES: &[(u32, &str)] = &[
    (11, "Rondônia"),
    (12, "Acre"),
    (13, "Amazonas"),
    (14, "Roraima"),
    (15, "Pará"),
    (16, "Amapá"),
    (17, "Tocantins"),
    (21, "Maranhão"),
    (22, "Piauí"),
    (23, "Ceará"),
    (24, "Rio Grande do Norte"),
    (25, "Paraíba"),
    (26, "Pernambuco"),
    (27, "Alagoas"),
    (28, "Sergipe"),
    (29, "Bahia"),
    (31, "Minas Gerais"),
    (32, "Espírito Santo"),
    (33, "Rio de Janeiro"),
    (35, "São Paulo"),
    (41, "Paraná"),
    (42, "Santa Catarina"),
    (43, "Rio Grande do Sul"),
    (50, "Mato Grosso do Sul"),
    (51, "Mato Grosso"),
    (52, "Goiás"),
    (53, "Distrito Federal"),
];

fn levels_from_path(n0: &str, (n1_num, n1): (u8, &str), path: &[&str]) -> LandCoverLevels {
    let at = |depth: usize| -> String {
        path.get(depth)
            .or_else(|| path.last())
            .copied()
            .unwrap_or(n1)
            .to_string()
    };
    LandCoverLevels {
        n0: n0.to_string(),
        n1: n1.to_string(),
        n1_1: format!("{n1_num}. {n1}"),
        n2: at(0),
        n3: at(1),
        n4: at(2),
    }
}

/// Label tables for one export run.
#[derive(Debug, Clone)]
pub struct Legend {
    land_cover: BTreeMap<u8, LandCoverLevels>,
    admin_names: BTreeMap<u32, String>,
    bioma_names: BTreeMap<u8, String>,
}

impl Default for Legend {
    fn default() -> Self {
        let land_cover = LAND_COVER
            .iter()
            .map(|&(code, n0, n1, path)| (code, levels_from_path(n0, n1, path)))
            .collect();
        Self {
            land_cover,
            admin_names: REGIONS
                .iter()
                .chain(STATES)
                .map(|&(k, v)| (k, v.to_string()))
                .collect(),
            bioma_names: BIOMAS.iter().map(|&(k, v)| (k, v.to_string())).collect(),
        }
    }
}

impl Legend {
    /// Replace the land-cover table with one read from a JSON object
    /// mapping code → levels.
    pub fn load_land_cover(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| SoilError::io(path, e))?;
        let table: BTreeMap<u8, LandCoverLevels> =
            serde_json::from_str(&text).map_err(|source| SoilError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        self.land_cover = table;
        Ok(())
    }

    pub fn set_admin_names(&mut self, names: BTreeMap<u32, String>) {
        self.admin_names = names;
    }

    /// Land-cover labels; unknown codes map to "Não observado".
    pub fn land_cover(&self, code: u8) -> LandCoverLevels {
        self.land_cover
            .get(&code)
            .cloned()
            .unwrap_or_else(LandCoverLevels::not_observed)
    }

    /// Administrative-unit name; unknown codes fall back to the code itself
    /// and 0 reads as "Não observado".
    pub fn admin_name(&self, code: u32) -> String {
        match self.admin_names.get(&code) {
            Some(name) => name.clone(),
            None if code == 0 => NOT_OBSERVED.to_string(),
            None => code.to_string(),
        }
    }

    pub fn bioma_name(&self, code: u8) -> &str {
        self.bioma_names
            .get(&code)
            .map_or(NOT_OBSERVED, String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_class_has_full_path() {
        let legend = Legend::default();
        let soy = legend.land_cover(39);
        assert_eq!(soy.n0, "Antrópico");
        assert_eq!(soy.n1, "Agropecuária");
        assert_eq!(soy.n1_1, "3. Agropecuária");
        assert_eq!(soy.n2, "Agricultura");
        assert_eq!(soy.n3, "Lavoura Temporária");
        assert_eq!(soy.n4, "Soja");
    }

    #[test]
    fn shallow_class_repeats_last_level() {
        let legend = Legend::default();
        let pasture = legend.land_cover(15);
        assert_eq!(pasture.n2, "Pastagem");
        assert_eq!(pasture.n3, "Pastagem");
        assert_eq!(pasture.n4, "Pastagem");

        let forest = legend.land_cover(1);
        assert_eq!(forest.n2, "Floresta");
        assert_eq!(forest.n4, "Floresta");
    }

    #[test]
    fn unknown_codes_fall_back() {
        let legend = Legend::default();
        assert_eq!(legend.land_cover(68).n0, NOT_OBSERVED);
        assert_eq!(legend.admin_name(41), "Paraná");
        assert_eq!(legend.admin_name(0), NOT_OBSERVED);
        assert_eq!(legend.admin_name(410006), "Cascavel");
        assert_eq!(legend.admin_name(410013), "Marechal Cândido Rondon");
        assert_eq!(legend.admin_name(410099), "410099");
        assert_eq!(legend.bioma_name(4), "Mata Atlântica");
        assert_eq!(legend.bioma_name(0), NOT_OBSERVED);
    }

    #[test]
    fn admin_names_can_be_replaced() {
        let mut legend = Legend::default();
        legend.set_admin_names(BTreeMap::from([(410006, "Oeste".to_string())]));
        assert_eq!(legend.admin_name(410006), "Oeste");
        assert_eq!(legend.admin_name(41), "41");
    }

    #[test]
    fn land_cover_table_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legend.json");
        fs::write(
            &path,
            r#"{"3": {"n0": "N", "n1": "F", "n1_1": "1. F", "n2": "FF", "n3": "FF", "n4": "FF"}}"#,
        )
        .unwrap();
        let mut legend = Legend::default();
        legend.load_land_cover(&path).unwrap();
        assert_eq!(legend.land_cover(3).n2, "FF");
        assert_eq!(legend.land_cover(15).n0, NOT_OBSERVED);
    }
}

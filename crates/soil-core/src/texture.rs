//! Soil texture classification from particle-size fractions.
//!
//! Five classes derived from sand/silt/clay percentages. The rules form a
//! priority cascade: they are evaluated top to bottom and the first one that
//! applies decides the class, so later rules only ever see pixels that every
//! earlier rule rejected.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoilError};

/// Texture class of a soil pixel. Discriminants are the exported integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureClass {
    VeryClayey = 1,
    Clayey = 2,
    Silty = 3,
    Sandy = 4,
    Medium = 5,
}

impl TextureClass {
    pub const ALL: [TextureClass; 5] = [
        TextureClass::VeryClayey,
        TextureClass::Clayey,
        TextureClass::Silty,
        TextureClass::Sandy,
        TextureClass::Medium,
    ];

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(TextureClass::VeryClayey),
            2 => Ok(TextureClass::Clayey),
            3 => Ok(TextureClass::Silty),
            4 => Ok(TextureClass::Sandy),
            5 => Ok(TextureClass::Medium),
            other => Err(SoilError::TextureOutOfRange(other)),
        }
    }

    /// Legend label used in exported tables.
    pub fn label(self) -> &'static str {
        match self {
            TextureClass::VeryClayey => "Muito argilosa",
            TextureClass::Clayey => "Argilosa",
            TextureClass::Silty => "Siltosa",
            TextureClass::Sandy => "Arenosa",
            TextureClass::Medium => "Média",
        }
    }
}

/// Particle-size fractions of one pixel, in percent (0–100).
///
/// Values are not validated: out-of-range or non-summing fractions are
/// classified as given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fractions {
    pub sand: f32,
    pub silt: f32,
    pub clay: f32,
}

impl Fractions {
    pub fn new(sand: f32, silt: f32, clay: f32) -> Self {
        Self { sand, silt, clay }
    }

    pub fn is_finite(&self) -> bool {
        self.sand.is_finite() && self.silt.is_finite() && self.clay.is_finite()
    }
}

struct Rule {
    class: TextureClass,
    applies: fn(&Fractions) -> bool,
}

/// Ordered rule table. Medium is the fallback when no rule applies.
const RULES: [Rule; 4] = [
    Rule {
        class: TextureClass::VeryClayey,
        applies: |f| f.clay >= 60.0,
    },
    Rule {
        class: TextureClass::Clayey,
        applies: |f| f.clay >= 35.0 && f.clay < 60.0,
    },
    Rule {
        class: TextureClass::Silty,
        applies: |f| f.silt >= 50.0 && f.sand < 15.0 && f.clay < 35.0,
    },
    Rule {
        class: TextureClass::Sandy,
        applies: |f| f.sand >= 70.0 && f.sand < 70.0 + (35.0 - f.clay) && f.clay < 35.0,
    },
];

/// Classify one pixel. First matching rule wins.
pub fn classify(f: Fractions) -> TextureClass {
    RULES
        .iter()
        .find(|rule| (rule.applies)(&f))
        .map_or(TextureClass::Medium, |rule| rule.class)
}

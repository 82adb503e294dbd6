//! Composite keys packed into integer codes for grouped reductions.
//!
//! Class code:     `(landcover + texture * 100) * 10 + carbon_bin`
//! Territory code: `bioma + admin * 10`
//!
//! Each key validates its components on construction, so `encode` can never
//! collide two distinct keys and `decode` rejects codes no key produces.

use serde::{Deserialize, Serialize};

use crate::carbon::CarbonBin;
use crate::error::{Result, SoilError};
use crate::texture::TextureClass;

/// Highest land-cover code accepted. Must stay below 100 so the land-cover
/// digits never reach the texture digit.
pub const LANDCOVER_MAX: u32 = 69;
/// Highest bioma code; bioma occupies a single decimal digit.
pub const BIOMA_MAX: u64 = 9;

/// (land cover, texture, carbon bin) key of the class band. Serialized as
/// its class code; deserialization goes through [`ClassKey::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub struct ClassKey {
    texture: TextureClass,
    landcover: u8,
    carbon: CarbonBin,
}

impl ClassKey {
    pub fn new(landcover: u32, texture: TextureClass, carbon: CarbonBin) -> Result<Self> {
        if landcover > LANDCOVER_MAX {
            return Err(SoilError::LandCoverOutOfRange(landcover.into()));
        }
        Ok(Self {
            texture,
            landcover: landcover as u8,
            carbon,
        })
    }

    pub fn landcover(&self) -> u8 {
        self.landcover
    }

    pub fn texture(&self) -> TextureClass {
        self.texture
    }

    pub fn carbon(&self) -> CarbonBin {
        self.carbon
    }

    pub fn encode(&self) -> u32 {
        (self.landcover as u32 + self.texture.code() as u32 * 100) * 10 + self.carbon.value() as u32
    }

    pub fn decode(code: u32) -> Result<Self> {
        let carbon = CarbonBin::new(code % 10)?;
        let rest = code / 10;
        let texture = TextureClass::from_code(rest / 100)?;
        Self::new(rest % 100, texture, carbon)
    }
}

impl From<ClassKey> for u32 {
    fn from(key: ClassKey) -> Self {
        key.encode()
    }
}

impl TryFrom<u32> for ClassKey {
    type Error = SoilError;

    fn try_from(code: u32) -> Result<Self> {
        Self::decode(code)
    }
}

/// (bioma, administrative unit) key of the territory band, serialized as its
/// territory code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u64", try_from = "u64")]
pub struct TerritoryKey {
    admin: u32,
    bioma: u8,
}

impl TerritoryKey {
    pub fn new(bioma: u64, admin: u64) -> Result<Self> {
        if bioma > BIOMA_MAX {
            return Err(SoilError::BiomaOutOfRange(bioma));
        }
        let admin = u32::try_from(admin).map_err(|_| SoilError::AdminOutOfRange(admin))?;
        Ok(Self {
            admin,
            bioma: bioma as u8,
        })
    }

    pub fn bioma(&self) -> u8 {
        self.bioma
    }

    pub fn admin(&self) -> u32 {
        self.admin
    }

    pub fn encode(&self) -> u64 {
        self.bioma as u64 + self.admin as u64 * 10
    }

    pub fn decode(code: u64) -> Result<Self> {
        Self::new(code % 10, code / 10)
    }
}

impl From<TerritoryKey> for u64 {
    fn from(key: TerritoryKey) -> Self {
        key.encode()
    }
}

impl TryFrom<u64> for TerritoryKey {
    type Error = SoilError;

    fn try_from(code: u64) -> Result<Self> {
        Self::decode(code)
    }
}

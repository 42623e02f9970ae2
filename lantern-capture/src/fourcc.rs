//! Four-character pixel format codes.

use crate::source::CaptureError;
use std::fmt;
use std::str::FromStr;

/// A four-character code such as `MJPG` or `YUYV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const MJPG: FourCC = FourCC(*b"MJPG");
    pub const YUYV: FourCC = FourCC(*b"YUYV");

    /// Unpack a code stored little-endian in an integer property.
    pub fn from_u32(value: u32) -> Self {
        Self(value.to_le_bytes())
    }

    /// Pack the code into an integer, first character in the low byte.
    pub fn to_u32(self) -> u32 {
        u32::from_le_bytes(self.0)
    }

    /// Interpret a numeric property value, as reported by [`crate::Property::FourCC`].
    pub fn from_property(value: f64) -> Option<Self> {
        if !value.is_finite() || value <= 0.0 || value > u32::MAX as f64 {
            return None;
        }
        Some(Self::from_u32(value as u32))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for FourCC {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii()) {
            return Err(CaptureError::UnsupportedFormat(format!(
                "FOURCC must be exactly four ASCII characters, got {s:?}"
            )));
        }
        let mut code = [0u8; 4];
        code.copy_from_slice(bytes);
        Ok(Self(code))
    }
}

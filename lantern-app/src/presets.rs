//! Camera resolution presets and `WxH` parsing.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A camera resolution request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Resolutions offered for local cameras.
pub const PRESETS: [Resolution; 6] = [
    Resolution::new(320, 240),
    Resolution::new(640, 480),
    Resolution::new(800, 600),
    Resolution::new(1024, 576),
    Resolution::new(1280, 720),
    Resolution::new(1920, 1080),
];

impl Default for Resolution {
    fn default() -> Self {
        PRESETS[1]
    }
}

impl Resolution {
    pub fn is_preset(self) -> bool {
        PRESETS.contains(&self)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Expected WIDTHxHEIGHT, got {0:?}")]
    Malformed(String),

    #[error("Resolution must be non-zero, got {0:?}")]
    Zero(String),
}

impl FromStr for Resolution {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ResolutionError::Malformed(s.to_string());
        let (width, height) = s
            .trim()
            .split_once(['x', 'X', '×'])
            .ok_or_else(malformed)?;
        let width: u32 = width.trim().parse().map_err(|_| malformed())?;
        let height: u32 = height.trim().parse().map_err(|_| malformed())?;
        if width == 0 || height == 0 {
            return Err(ResolutionError::Zero(s.to_string()));
        }
        Ok(Self::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("1280x720".parse(), Ok(Resolution::new(1280, 720)));
        assert_eq!(" 800 X 600 ".parse(), Ok(Resolution::new(800, 600)));
        assert!(matches!(
            "1280".parse::<Resolution>(),
            Err(ResolutionError::Malformed(_))
        ));
        assert!(matches!(
            "0x480".parse::<Resolution>(),
            Err(ResolutionError::Zero(_))
        ));
    }

    #[test]
    fn test_default_is_vga() {
        assert_eq!(Resolution::default().to_string(), "640x480");
        assert!(Resolution::new(1024, 576).is_preset());
        assert!(!Resolution::new(1000, 500).is_preset());
    }
}

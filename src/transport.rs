//! Intrastat mode of transport codes

use crate::error::{IntrastatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeOfTransport {
    Sea,
    Rail,
    Road,
    Air,
}

impl ModeOfTransport {
    /// Code reported on the declaration
    pub fn code(&self) -> u8 {
        match self {
            ModeOfTransport::Sea => 1,
            ModeOfTransport::Rail => 2,
            ModeOfTransport::Road => 3,
            ModeOfTransport::Air => 4,
        }
    }
}

impl FromStr for ModeOfTransport {
    type Err = IntrastatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sea" => Ok(ModeOfTransport::Sea),
            "rail" => Ok(ModeOfTransport::Rail),
            "road" => Ok(ModeOfTransport::Road),
            "air" => Ok(ModeOfTransport::Air),
            _ => Err(IntrastatError::InvalidData(format!(
                "Invalid mode of transport: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for ModeOfTransport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ModeOfTransport::Sea => "Sea",
            ModeOfTransport::Rail => "Rail",
            ModeOfTransport::Road => "Road",
            ModeOfTransport::Air => "Air",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!("Sea".parse::<ModeOfTransport>().unwrap().code(), 1);
        assert_eq!("rail".parse::<ModeOfTransport>().unwrap().code(), 2);
        assert_eq!(" Road ".parse::<ModeOfTransport>().unwrap().code(), 3);
        assert_eq!("AIR".parse::<ModeOfTransport>().unwrap().code(), 4);
    }

    #[test]
    fn test_unknown_mode() {
        assert!(matches!(
            "Pipeline".parse::<ModeOfTransport>(),
            Err(IntrastatError::InvalidData(_))
        ));
    }
}

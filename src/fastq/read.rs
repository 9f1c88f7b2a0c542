use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Mate of a paired-end read file
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadDirection {
    R1,
    R2,
}

impl fmt::Display for ReadDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadDirection::R1 => write!(f, "R1"),
            ReadDirection::R2 => write!(f, "R2"),
        }
    }
}

impl FromStr for ReadDirection {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "R1" => Ok(ReadDirection::R1),
            "R2" => Ok(ReadDirection::R2),
            _ => Err(Error::InvalidReadIdentifier(token.to_string())),
        }
    }
}

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum DestinationParseError {
    #[error("upstream destination must not be empty")]
    Empty,
    #[error("invalid upstream port '{0}'")]
    InvalidPort(String),
}

/// Where upstream records go, as given on the command line: a port number
/// selects a socket, `0` disables the socket, anything else is a log file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Disabled,
    Port(u16),
    LogFile(PathBuf),
}

impl FromStr for Destination {
    type Err = DestinationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DestinationParseError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(Destination::LogFile(PathBuf::from(s)));
        }
        match s.parse::<u16>() {
            Ok(0) => Ok(Destination::Disabled),
            Ok(port) => Ok(Destination::Port(port)),
            Err(_) => Err(DestinationParseError::InvalidPort(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("8089", Destination::Port(8089))]
    #[case(" 9000 ", Destination::Port(9000))]
    #[case("0", Destination::Disabled)]
    #[case("events.log", Destination::LogFile(PathBuf::from("events.log")))]
    #[case("/tmp/8089", Destination::LogFile(PathBuf::from("/tmp/8089")))]
    fn test_parse(#[case] input: &str, #[case] expected: Destination) {
        assert_eq!(input.parse::<Destination>(), Ok(expected));
    }

    #[test]
    fn test_port_out_of_range() {
        assert_eq!(
            "70000".parse::<Destination>(),
            Err(DestinationParseError::InvalidPort("70000".into()))
        );
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!("  ".parse::<Destination>(), Err(DestinationParseError::Empty));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a registered formatter.
///
/// The list is closed: adding a formatter means adding a variant here and a registration in
/// `fmtchain-domain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterId {
    Black,
    PyUpgrade,
}

impl FormatterId {
    pub const ALL: &'static [FormatterId] = &[FormatterId::PyUpgrade, FormatterId::Black];

    /// Options scope and user-facing name.
    pub fn name(self) -> &'static str {
        match self {
            FormatterId::Black => "black",
            FormatterId::PyUpgrade => "pyupgrade",
        }
    }
}

impl fmt::Display for FormatterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown formatter `{0}`")]
pub struct UnknownFormatter(pub String);

impl FromStr for FormatterId {
    type Err = UnknownFormatter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatterId::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownFormatter(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for id in FormatterId::ALL {
            assert_eq!(id.name().parse::<FormatterId>().unwrap(), *id);
        }
        assert_eq!("Black".parse::<FormatterId>().unwrap(), FormatterId::Black);
        assert!("gofmt".parse::<FormatterId>().is_err());
    }

    #[test]
    fn serde_matches_display() {
        let json = serde_json::to_string(&FormatterId::PyUpgrade).unwrap();
        assert_eq!(json, "\"pyupgrade\"");
    }
}

use crate::error::TrainError;
use std::fmt;
use std::str::FromStr;

/// Domain-adaptation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Source-only baseline: DANN with the gradient reversal switched off.
    Source,
    Dann,
    Cdan,
    /// CDAN with entropy-conditioned sample weights.
    CdanE,
    Wdgrl,
    Dan,
    Jan,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Source,
        Method::Dann,
        Method::Cdan,
        Method::CdanE,
        Method::Wdgrl,
        Method::Dan,
        Method::Jan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::Source => "Source",
            Method::Dann => "DANN",
            Method::Cdan => "CDAN",
            Method::CdanE => "CDAN-E",
            Method::Wdgrl => "WDGRL",
            Method::Dan => "DAN",
            Method::Jan => "JAN",
        }
    }

    pub fn is_mmd_method(self) -> bool {
        matches!(self, Method::Dan | Method::Jan)
    }

    pub fn is_dann_method(self) -> bool {
        matches!(self, Method::Source | Method::Dann)
    }

    pub fn is_cdan_method(self) -> bool {
        matches!(self, Method::Cdan | Method::CdanE)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Method::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TrainError::UnknownMethod(s.to_string()))
    }
}

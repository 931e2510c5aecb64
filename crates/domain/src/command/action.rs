//! Dotted actions: `<domain>.<verb>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::DeviceClass;
use crate::error::HubError;

/// First action token: selects the router dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Light,
    Switch,
    Ac,
    Vacuum,
    Tv,
    Purifier,
}

impl Domain {
    /// The configured device class this domain dispatches to.
    #[must_use]
    pub fn device_class(self) -> DeviceClass {
        match self {
            Self::Light => DeviceClass::Light,
            Self::Switch => DeviceClass::Switch,
            Self::Ac | Self::Tv => DeviceClass::Ir,
            Self::Vacuum => DeviceClass::Vacuum,
            Self::Purifier => DeviceClass::Purifier,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Ac => "ac",
            Self::Vacuum => "vacuum",
            Self::Tv => "tv",
            Self::Purifier => "purifier",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "switch" => Ok(Self::Switch),
            "ac" => Ok(Self::Ac),
            "vacuum" => Ok(Self::Vacuum),
            "tv" => Ok(Self::Tv),
            "purifier" => Ok(Self::Purifier),
            other => Err(HubError::UnknownDeviceType(other.to_string())),
        }
    }
}

/// A parsed action: domain plus verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub domain: Domain,
    pub verb: String,
}

impl Action {
    /// Split `raw` on `.` into exactly two non-empty tokens.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::InvalidAction`] unless there are exactly two
    /// non-empty tokens, and [`HubError::UnknownDeviceType`] when the first
    /// token names no domain.
    pub fn parse(raw: &str) -> Result<Self, HubError> {
        let mut tokens = raw.split('.');
        let (Some(domain), Some(verb), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(HubError::InvalidAction(raw.to_string()));
        };
        if domain.is_empty() || verb.is_empty() {
            return Err(HubError::InvalidAction(raw.to_string()));
        }
        Ok(Self {
            domain: domain.parse()?,
            verb: verb.to_string(),
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.verb)
    }
}

//! User preference fields interpolated into the prompt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much investment risk the user is comfortable with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

/// Self-reported familiarity with financial topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertiseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl RiskTolerance {
    pub const ALL: [RiskTolerance; 3] = [
        RiskTolerance::Conservative,
        RiskTolerance::Moderate,
        RiskTolerance::Aggressive,
    ];

    /// Form/query value.
    pub fn key(&self) -> &'static str {
        match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        }
    }

    /// Label shown in the UI and written into the prompt.
    pub fn label(&self) -> &'static str {
        match self {
            RiskTolerance::Conservative => "Conservative",
            RiskTolerance::Moderate => "Moderate",
            RiskTolerance::Aggressive => "Aggressive",
        }
    }
}

impl ExpertiseLevel {
    pub const ALL: [ExpertiseLevel; 3] = [
        ExpertiseLevel::Beginner,
        ExpertiseLevel::Intermediate,
        ExpertiseLevel::Advanced,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ExpertiseLevel::Beginner => "beginner",
            ExpertiseLevel::Intermediate => "intermediate",
            ExpertiseLevel::Advanced => "advanced",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExpertiseLevel::Beginner => "Beginner",
            ExpertiseLevel::Intermediate => "Intermediate",
            ExpertiseLevel::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for ExpertiseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RiskTolerance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskTolerance::ALL
            .into_iter()
            .find(|r| r.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown risk tolerance: {}", s))
    }
}

impl FromStr for ExpertiseLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExpertiseLevel::ALL
            .into_iter()
            .find(|e| e.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown expertise level: {}", s))
    }
}

/// Optional profile fields chosen in the sidebar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tolerance: Option<RiskTolerance>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expertise_level: Option<ExpertiseLevel>,
}

impl Preferences {
    /// Parse raw form values. An empty string means "not specified".
    pub fn parse(risk_tolerance: &str, expertise_level: &str) -> Result<Self, String> {
        Ok(Self {
            risk_tolerance: parse_optional(risk_tolerance)?,
            expertise_level: parse_optional(expertise_level)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.risk_tolerance.is_none() && self.expertise_level.is_none()
    }
}

fn parse_optional<T: FromStr<Err = String>>(value: &str) -> Result<Option<T>, String> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

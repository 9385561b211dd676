//! Rating model

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::utils::errors::EncontroError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingType {
    Host,
    Participant,
    Restaurant,
}

impl RatingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingType::Host => "host",
            RatingType::Participant => "participant",
            RatingType::Restaurant => "restaurant",
        }
    }
}

impl fmt::Display for RatingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RatingType {
    type Err = EncontroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(RatingType::Host),
            "participant" => Ok(RatingType::Participant),
            "restaurant" => Ok(RatingType::Restaurant),
            other => Err(EncontroError::InvalidInput(format!("Unknown rating type: {}", other))),
        }
    }
}

/// A 1-5 evaluation, unique per (event, rater, rated, type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub event_id: i64,
    pub rater_id: i64,
    pub rated_id: i64,
    pub rating_type: RatingType,
    pub score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRating {
    pub event_id: i64,
    pub rater_id: i64,
    pub rated_id: i64,
    pub rating_type: RatingType,
    pub score: i32,
}

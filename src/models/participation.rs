//! Participation model

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::utils::errors::EncontroError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipationStatus {
    Pendente,
    Aprovado,
    Rejeitado,
    Cancelado,
}

impl ParticipationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipationStatus::Pendente => "pendente",
            ParticipationStatus::Aprovado => "aprovado",
            ParticipationStatus::Rejeitado => "rejeitado",
            ParticipationStatus::Cancelado => "cancelado",
        }
    }

    /// A pending or approved candidacy blocks a new application
    pub fn is_active(&self) -> bool {
        matches!(self, ParticipationStatus::Pendente | ParticipationStatus::Aprovado)
    }
}

impl fmt::Display for ParticipationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipationStatus {
    type Err = EncontroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendente" => Ok(ParticipationStatus::Pendente),
            "aprovado" => Ok(ParticipationStatus::Aprovado),
            "rejeitado" => Ok(ParticipationStatus::Rejeitado),
            "cancelado" => Ok(ParticipationStatus::Cancelado),
            other => Err(EncontroError::InvalidInput(format!("Unknown participation status: {}", other))),
        }
    }
}

/// One user's relationship to one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participation {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub status: ParticipationStatus,
    /// Attendance confirmed by the participant
    pub presenca_confirmada: bool,
    /// Every required post-event rating was submitted
    pub avaliacao_feita: bool,
    /// Entered the event with the entry password
    pub com_acesso: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Participation {
    pub fn is_approved(&self) -> bool {
        self.status == ParticipationStatus::Aprovado
    }

    /// Approved and confirmed attendance
    pub fn is_present(&self) -> bool {
        self.is_approved() && self.presenca_confirmada
    }

    /// Confirmed attendance but never entered
    pub fn is_no_show(&self) -> bool {
        self.is_present() && !self.com_acesso
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewParticipation {
    pub event_id: i64,
    pub user_id: i64,
    pub status: ParticipationStatus,
}

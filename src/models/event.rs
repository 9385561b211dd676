//! Event model

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::utils::errors::EncontroError;

/// Lifecycle status of an event
///
/// Ordered along Aberto → Confirmado → Em Andamento → Finalizado → Concluído;
/// Cancelado branches off any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    Aberto,
    Confirmado,
    EmAndamento,
    Finalizado,
    Concluido,
    Cancelado,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Aberto => "Aberto",
            EventStatus::Confirmado => "Confirmado",
            EventStatus::EmAndamento => "Em Andamento",
            EventStatus::Finalizado => "Finalizado",
            EventStatus::Concluido => "Concluído",
            EventStatus::Cancelado => "Cancelado",
        }
    }

    /// Cancelado and Concluído never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Cancelado | EventStatus::Concluido)
    }

    /// Whether new candidacies may be accepted in this status
    pub fn accepts_applications(&self) -> bool {
        matches!(self, EventStatus::Aberto | EventStatus::Confirmado)
    }

    /// Position along the forward path; Cancelado has none
    pub fn rank(&self) -> Option<u8> {
        match self {
            EventStatus::Aberto => Some(0),
            EventStatus::Confirmado => Some(1),
            EventStatus::EmAndamento => Some(2),
            EventStatus::Finalizado => Some(3),
            EventStatus::Concluido => Some(4),
            EventStatus::Cancelado => None,
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = EncontroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Aberto" => Ok(EventStatus::Aberto),
            "Confirmado" => Ok(EventStatus::Confirmado),
            "Em Andamento" => Ok(EventStatus::EmAndamento),
            "Finalizado" => Ok(EventStatus::Finalizado),
            "Concluído" => Ok(EventStatus::Concluido),
            "Cancelado" => Ok(EventStatus::Cancelado),
            other => Err(EncontroError::InvalidInput(format!("Unknown event status: {}", other))),
        }
    }
}

/// Kind of event, which changes how candidacies are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Direct enrollment: applications are approved immediately
    Institucional,
    Privado,
    Publico,
    Padrao,
    Particular,
    /// One-to-one invitation to a single user
    Crusher,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Institucional => "institucional",
            EventType::Privado => "privado",
            EventType::Publico => "publico",
            EventType::Padrao => "padrao",
            EventType::Particular => "particular",
            EventType::Crusher => "crusher",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EncontroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "institucional" => Ok(EventType::Institucional),
            "privado" => Ok(EventType::Privado),
            "publico" => Ok(EventType::Publico),
            "padrao" => Ok(EventType::Padrao),
            "particular" => Ok(EventType::Particular),
            "crusher" => Ok(EventType::Crusher),
            other => Err(EncontroError::InvalidInput(format!("Unknown event type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub creator_id: i64,
    pub event_type: EventType,
    pub status: EventStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Remaining open slots
    pub vagas: i32,
    pub max_vagas: i32,
    pub venue_id: Option<i64>,
    pub crusher_invited_user_id: Option<i64>,
    pub entry_password: Option<String>,
    pub entry_locked: bool,
    pub entry_opened_at: Option<DateTime<Utc>>,
    pub entry_locked_at: Option<DateTime<Utc>>,
    pub cancelamento_motivo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_creator(&self, user_id: i64) -> bool {
        self.creator_id == user_id
    }

    pub fn has_vacancy(&self) -> bool {
        self.vagas > 0
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub creator_id: i64,
    pub event_type: EventType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub max_vagas: i32,
    pub venue_id: Option<i64>,
    pub crusher_invited_user_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            EventStatus::Aberto,
            EventStatus::Confirmado,
            EventStatus::EmAndamento,
            EventStatus::Finalizado,
            EventStatus::Concluido,
            EventStatus::Cancelado,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>().unwrap(), status);
        }
        assert!("Encerrado".parse::<EventStatus>().is_err());
    }

    #[test]
    fn test_status_rank_is_forward_path() {
        assert!(EventStatus::Aberto.rank() < EventStatus::Confirmado.rank());
        assert!(EventStatus::Finalizado.rank() < EventStatus::Concluido.rank());
        assert_eq!(EventStatus::Cancelado.rank(), None);
        assert!(EventStatus::Cancelado.is_terminal());
        assert!(!EventStatus::Finalizado.is_terminal());
    }

    #[test]
    fn test_event_type_parsing() {
        assert_eq!("institucional".parse::<EventType>().unwrap(), EventType::Institucional);
        assert_eq!(EventType::Crusher.to_string(), "crusher");
    }
}

//! Test data helpers for creating test objects

use chrono::{DateTime, Duration, Utc};
use Encontro::models::*;

pub const EVENT_LENGTH_HOURS: i64 = 3;

/// Helper function to create an event request starting at `start_time`
pub fn new_event_request(creator_id: i64, event_type: EventType, start_time: DateTime<Utc>, max_vagas: i32) -> NewEvent {
    NewEvent {
        title: format!("Encontro do organizador {}", creator_id),
        creator_id,
        event_type,
        start_time,
        end_time: start_time + Duration::hours(EVENT_LENGTH_HOURS),
        max_vagas,
        venue_id: None,
        crusher_invited_user_id: None,
    }
}

/// Helper function to create a stored event in an arbitrary state
pub fn create_test_event(id: i64, creator_id: i64, status: EventStatus, start_time: DateTime<Utc>, max_vagas: i32, vagas: i32) -> Event {
    Event {
        id,
        title: format!("Evento {}", id),
        creator_id,
        event_type: EventType::Publico,
        status,
        start_time,
        end_time: start_time + Duration::hours(EVENT_LENGTH_HOURS),
        vagas,
        max_vagas,
        venue_id: None,
        crusher_invited_user_id: None,
        entry_password: None,
        entry_locked: false,
        entry_opened_at: None,
        entry_locked_at: None,
        cancelamento_motivo: None,
        created_at: start_time - Duration::days(3),
        updated_at: start_time - Duration::days(3),
    }
}

/// Helper function to create a participation with explicit flags
pub fn create_test_participation(
    id: i64,
    event_id: i64,
    user_id: i64,
    status: ParticipationStatus,
    presenca_confirmada: bool,
    com_acesso: bool,
    avaliacao_feita: bool,
) -> Participation {
    let now = Utc::now();
    Participation {
        id,
        event_id,
        user_id,
        status,
        presenca_confirmada,
        avaliacao_feita,
        com_acesso,
        created_at: now,
        updated_at: now,
    }
}

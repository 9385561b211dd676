//! Error handling for Encontro
//!
//! This module defines the two error layers used throughout the application:
//! `EncontroError` for infrastructure failures that abort an operation, and
//! `Rejection` for business-rule refusals that are returned to the caller as
//! ordinary values carrying a reason ready for display.

use thiserror::Error;

/// Main error type for Encontro infrastructure failures
#[derive(Error, Debug)]
pub enum EncontroError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store unavailable: {0}")]
    Store(String),

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Participation not found: {participation_id}")]
    ParticipationNotFound { participation_id: i64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for Encontro operations
pub type Result<T> = std::result::Result<T, EncontroError>;

/// Outcome of a rule-engine operation: the value, or the reason it was refused
pub type Outcome<T> = std::result::Result<T, Rejection>;

impl EncontroError {
    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            EncontroError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Tls(_)
            ),
            EncontroError::Http(e) => e.is_timeout() || e.is_connect() || e.status().map_or(false, |s| s.is_server_error()),
            EncontroError::Store(_) => true,
            EncontroError::Io(_) => true,
            EncontroError::ServiceUnavailable(_) => true,
            EncontroError::Migration(_) => false,
            EncontroError::Config(_) => false,
            EncontroError::EventNotFound { .. } => false,
            EncontroError::ParticipationNotFound { .. } => false,
            EncontroError::Serialization(_) => false,
            EncontroError::InvalidInput(_) => false,
            EncontroError::Duplicate(_) => false,
        }
    }

    /// A concurrent writer already inserted the same unique row
    pub fn is_unique_violation(&self) -> bool {
        match self {
            EncontroError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            EncontroError::Duplicate(_) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EncontroError::Migration(_) => ErrorSeverity::Critical,
            EncontroError::Config(_) => ErrorSeverity::Critical,
            EncontroError::EventNotFound { .. } => ErrorSeverity::Info,
            EncontroError::ParticipationNotFound { .. } => ErrorSeverity::Info,
            EncontroError::InvalidInput(_) => ErrorSeverity::Info,
            EncontroError::Duplicate(_) => ErrorSeverity::Info,
            EncontroError::Store(_) | EncontroError::ServiceUnavailable(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Business-rule refusal
///
/// The `Display` text is shown to users as is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("Evento não encontrado")]
    EventNotFound,

    #[error("Participação não encontrada")]
    ParticipationNotFound,

    #[error("Evento não está aceitando candidaturas")]
    NotAcceptingApplications,

    #[error("Evento sem vagas disponíveis")]
    NoVacancies,

    #[error("Candidaturas encerradas: o evento começa em menos de {minutes} minutos")]
    ApplicationsClosed { minutes: i64 },

    #[error("Você já se candidatou a este evento")]
    AlreadyApplied,

    #[error("Você já participa de outro evento neste horário")]
    ScheduleConflict { conflicting_event_id: i64 },

    #[error("Sua conta está suspensa por faltas. Regularize para voltar a participar")]
    UserBanned,

    #[error("Não é possível aprovar: o evento começa em menos de 1 minuto")]
    ApprovalClosed,

    #[error("Esta candidatura não está pendente")]
    NotPending,

    #[error("Esta participação não pode ser cancelada")]
    NotCancellable,

    #[error("O evento já foi encerrado")]
    EventClosed,

    #[error("Você não tem permissão para esta ação")]
    NotOwner,

    #[error("Apenas o organizador pode realizar esta ação")]
    NotCreator,

    #[error("Este convite não é para você")]
    NotInvitedUser,

    #[error("Esta participação não é um convite Crusher")]
    NotCrusherInvite,

    #[error("O evento já começou")]
    EventAlreadyStarted,

    #[error("Cancelamento não permitido: faltam {hours_remaining:.1}h para o início e são necessárias {hours_required}h de antecedência")]
    CancellationTooLate { hours_remaining: f64, hours_required: i64 },

    #[error("Não é possível excluir um evento com participantes aprovados")]
    HasApprovedParticipants,

    #[error("Não é possível excluir um evento finalizado")]
    EventFinished,

    #[error("Apenas eventos abertos podem ser confirmados")]
    NotConfirmable,

    #[error("Você já criou um evento hoje")]
    DailyLimitReached,

    #[error("Você já possui um evento em aberto")]
    ActiveEventExists,

    #[error("Dados do evento inválidos: {0}")]
    InvalidEvent(String),

    #[error("O evento ainda possui vagas; candidate-se diretamente")]
    EventNotFull,

    #[error("Você não está na lista de espera deste evento")]
    NotOnWaitingList,

    #[error("A entrada ainda não está liberada")]
    EntryNotOpen,

    #[error("A entrada para este evento já foi encerrada")]
    EntryClosed,

    #[error("O evento não está em andamento")]
    EntryWrongState,

    #[error("A entrada foi bloqueada pelo organizador")]
    EntryLocked,

    #[error("A senha de entrada ainda não foi gerada")]
    PasswordNotSet,

    #[error("A senha deve ter 4 dígitos")]
    InvalidPasswordFormat,

    #[error("Senha incorreta")]
    WrongPassword,

    #[error("Muitas tentativas. Aguarde um minuto e tente novamente")]
    TooManyAttempts,

    #[error("Você não é um participante aprovado deste evento")]
    NotApprovedParticipant,

    #[error("Confirmação de presença indisponível para este evento")]
    PresenceUnavailable,

    #[error("A nota deve ser entre 1 e 5")]
    InvalidScore,

    #[error("As avaliações deste evento não estão abertas")]
    RatingsClosed,

    #[error("Apenas participantes presentes podem avaliar")]
    NotAttendee,

    #[error("Alvo de avaliação inválido")]
    InvalidRatingTarget,

    #[error("Pagamento inválido")]
    InvalidPayment,
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

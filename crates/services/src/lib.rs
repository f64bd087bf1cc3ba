#![forbid(unsafe_code)]

pub mod analytics;
pub mod chat_service;
pub mod client;
pub mod context;
pub mod error;
pub mod flow;
pub mod profile_service;
pub mod quiz_service;

pub use quiz_core::Clock;

pub use analytics::{summarize, HistorySummary, SubjectBreakdown};
pub use chat_service::{ChatMessage, ChatRole, ChatService};
pub use client::GraphqlClient;
pub use context::AppContext;
pub use error::{ApiError, ContextError, FlowError};
pub use flow::{
    FlowEvent, LeaveDecision, SessionFlow, SessionRunner, SubmissionState, SubmitStatus,
};
pub use profile_service::{Profile, ProfileService};
pub use quiz_service::{
    HistoryEntry, LeaderboardRow, QuizBackend, QuizService, StartedAttempt, Subject, SubmitOutcome,
};

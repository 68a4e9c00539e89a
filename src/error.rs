use chrono::NaiveDate;
use thiserror::Error;

// Loading and reshaping errors are fatal to the whole batch: a silently
// dropped or half-parsed row corrupts every downstream rolling value.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("missing column `{column}` in {origin}")]
    MissingColumn { column: String, origin: String },

    #[error("missing {stat} for {home_team} vs {away_team} on {date}")]
    MissingStat {
        stat: &'static str,
        home_team: String,
        away_team: String,
        date: NaiveDate,
    },

    #[error("non-finite {stat} for {team} on {date}")]
    NonFiniteStat {
        stat: &'static str,
        team: String,
        date: NaiveDate,
    },

    #[error("invalid value `{value}` for {column}")]
    InvalidValue { column: String, value: String },

    #[error("dates for {team} run backwards in season {season}: {prev} then {next}")]
    NonMonotonicDates {
        team: String,
        season: String,
        prev: NaiveDate,
        next: NaiveDate,
    },

    #[error("season labels for {team} are not separable: {season} reappears after {interleaved}")]
    SeasonsNotSeparable {
        team: String,
        season: String,
        interleaved: String,
    },

    #[error("empty partition for {team} in season {season}")]
    EmptyPartition { team: String, season: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("normal equations are singular")]
    SingularSystem,

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

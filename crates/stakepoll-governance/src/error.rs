use stakepoll_types::{Amount, PollId, TypesError};
use thiserror::Error;

/// Errors that can occur in governance operations.
///
/// Every rejected operation leaves balances, tallies and participation sets
/// exactly as they were before the call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Balance overflow")]
    BalanceOverflow,

    #[error("Poll needs at least 2 options, got {0}")]
    TooFewOptions(usize),

    #[error("Vote limit exceeded: {attempted} > {limit}")]
    VoteLimitExceeded { attempted: Amount, limit: Amount },

    #[error("Poll {0} is already active")]
    AlreadyActive(PollId),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Already voted on poll {0}")]
    AlreadyVoted(PollId),

    #[error("Poll {0} is not open")]
    PollNotOpen(PollId),

    #[error("Poll {0} is not active")]
    PollNotActive(PollId),

    #[error("Option {option} out of range: poll has {options} options")]
    OptionOutOfRange { option: usize, options: usize },

    #[error("No voting power: deposit shares before voting")]
    NoVotingPower,

    #[error("Poll not found: {0}")]
    PollNotFound(PollId),

    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error("Custody transfer failed: {0}")]
    CustodyFailed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Types(#[from] TypesError),
}

pub type Result<T> = std::result::Result<T, GovernanceError>;

use thiserror::Error;

use eon_backend::BackendError;
use eon_types::models::{Account, ItemRef, SparkId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Content cannot be empty")]
    Empty,

    #[error("Content cannot exceed {max} characters")]
    TooLong { max: usize },
}

#[derive(Error, Debug)]
pub enum SignInError {
    /// The backend rejected the credentials. Callers send the visitor to
    /// sign-up with the email pre-filled.
    #[error("No account found for these credentials")]
    AccountNotFound,

    #[error("{0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum SignUpError {
    #[error("User already registered")]
    AlreadyRegistered,

    /// The account exists but its initial selections row could not be written.
    #[error("Account created but selections were not saved")]
    SelectionsNotSaved {
        account: Account,
        #[source]
        source: BackendError,
    },

    #[error("{0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Unknown spark {0}")]
    UnknownSpark(SparkId),

    #[error("You can only select up to {max} sparks")]
    LimitReached { max: usize },

    #[error("Failed to save selections on this device")]
    Storage(#[from] anyhow::Error),

    #[error("Failed to update selections")]
    Backend(#[from] BackendError),
}

#[derive(Error, Debug)]
pub enum BoardError {
    #[error(transparent)]
    Validation(#[from] ContentError),

    #[error("Sign in to take part in the community")]
    SignInRequired,

    #[error("Only the author can change this {}", .0.noun())]
    NotAuthor(ItemRef),

    #[error("No such {}", .0.noun())]
    UnknownItem(ItemRef),

    /// A caught backend failure, carrying the message shown to the user.
    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: BackendError,
    },
}

#[derive(Error, Debug)]
pub enum HandoffError {
    #[error("Could not retrieve previous selections. Please try again.")]
    Storage(#[source] anyhow::Error),

    #[error(transparent)]
    SignUp(#[from] SignUpError),
}

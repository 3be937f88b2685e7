use thiserror::Error;

use crate::competitor::Category;
use crate::session::SessionError;
use crate::store::StoreError;

/// Everything the vote controller reports back to the view.
///
/// The `Display` text of each variant is the one-line notice shown to the participant.
#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Could not sign in anonymously: {0}")]
    SessionEstablishmentFailed(#[from] SessionError),

    #[error("Could not load competitors: {0}")]
    FetchFailed(#[source] StoreError),

    #[error("You can only select {limit} {category} votes!")]
    SelectionLimitExceeded { category: Category, limit: usize },

    #[error(
        "You must select exactly 2 Flavor votes and 2 Looks votes before submitting! \
         (selected {flavor} Flavor, {looks} Looks)"
    )]
    IncompleteSelection { flavor: usize, looks: usize },

    #[error("You have already submitted your votes. Thank you!")]
    AlreadySubmitted,

    #[error("Competitor {0} is no longer listed, refresh and select again")]
    UnknownCompetitor(String),

    #[error("Failed to submit votes ({failed} of {attempted} updates failed). Please try again.")]
    SubmissionFailed {
        failed: usize,
        attempted: usize,
        #[source]
        source: StoreError,
    },

    #[error("Device storage failed: {0}")]
    FlagStorage(#[source] StoreError),
}

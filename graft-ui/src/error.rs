use thiserror::Error;

/// Errors raised by the graph root lifecycle.
///
/// Reconciliation itself never fails: unknown kinds, missing parents and
/// operations on removed objects are absorbed and logged instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("graph root is already mounted")]
    AlreadyMounted,

    #[error("graph root is not mounted")]
    NotMounted,

    #[error("graph root was unmounted and cannot be mounted again")]
    Finished,

    #[error("invalid graph options: {0}")]
    Options(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

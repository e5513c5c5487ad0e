/// Recoverable lookup failures surfaced by a [`Repository`](crate::Repository).
///
/// Both variants are user-visible: route handlers translate them into an
/// HTTP status and echo the `Display` text as the response body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The requested identifier is not part of the dataset.
    #[error("no breakfast with ID {id}")]
    NotFound { id: u64 },
    /// A random pick was requested from an empty dataset.
    #[error("no breakfasts available")]
    Unavailable,
}

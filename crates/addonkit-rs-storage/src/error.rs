use thiserror::Error;

/// Errors surfaced by the storage client.
///
/// `Conflict` is the one kind callers are expected to catch and act on:
/// re-read the record, reapply the change, and retry the conditional write
/// with the fresh etag. Everything else is non-retriable from the client's
/// perspective.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(
        "Storage objects cannot be stored at the root of the hierarchy. Supply a sub-path or scope the client with a prefix."
    )]
    RootWriteForbidden,

    #[error(
        "Recursive delete at the root of the hierarchy would remove every record under this subscription; pass force_recursive to confirm."
    )]
    RecursiveRootDeleteForbidden,

    /// The stored etag no longer matches the one supplied with a
    /// conditional write.
    #[error("Conflict")]
    Conflict,

    #[error("storage service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid storage URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("token acquisition failed: {0}")]
    Token(String),
}

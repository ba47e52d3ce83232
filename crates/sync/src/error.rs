/// Failure talking to the remote API.
///
/// Every variant is non-fatal to the caller: the record stays queued (or the
/// view degrades) and the next drain cycle tries again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never got an HTTP answer (connection refused, DNS, timeout).
    #[error("network failure calling {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    /// The server answered with a non-success status.
    #[error("{endpoint} answered HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The server answered 2xx but the body was not the expected JSON.
    #[error("could not decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },
}

/// Failure materializing a form into a record. Nothing is stored or sent
/// when capture fails.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("could not read file for field '{field}' ({path}): {source}")]
    FileRead {
        field: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding task for a file field failed: {0}")]
    Encode(String),
}

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a pipeline invocation.
///
/// A backoff veto means "not sent, by policy" and must never be confused with
/// a failed network call, so it is its own variant.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{0}")]
    Backoff(String),

    #[error("{0}")]
    Transport(#[source] BoxError),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DispatchError>,
    },
}

impl DispatchError {
    pub fn backoff(msg: impl Into<String>) -> Self {
        DispatchError::Backoff(msg.into())
    }

    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DispatchError::Transport(Box::new(err))
    }

    /// Wrap with additional context, keeping the original kind detectable.
    pub fn context(self, context: impl Into<String>) -> Self {
        DispatchError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context layers.
    pub fn root(&self) -> &DispatchError {
        match self {
            DispatchError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_backoff(&self) -> bool {
        matches!(self.root(), DispatchError::Backoff(_))
    }

    /// Downcast the transport cause, if any, to a concrete error type.
    pub fn transport_cause<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self.root() {
            DispatchError::Transport(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn backoff_survives_context() {
        let err = DispatchError::backoff("won't send").context("sending batch");
        assert!(err.is_backoff());
        assert_eq!(err.to_string(), "sending batch: won't send");
    }

    #[test]
    fn transport_is_not_backoff_and_downcasts() {
        let err = DispatchError::transport(Refused).context("outer");
        assert!(!err.is_backoff());
        assert!(err.transport_cause::<Refused>().is_some());
        assert!(err.transport_cause::<std::io::Error>().is_none());
    }
}

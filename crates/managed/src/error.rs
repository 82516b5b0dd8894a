//! Error type shared by the reconciler and every external client.

use thiserror::Error;

/// Boxed error carried as the source of a wrapped failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned from managed-resource reconciliation.
#[derive(Error, Debug)]
pub enum Error {
    /// A call failed and was wrapped with a static description of the
    /// operation, e.g. `cannot describe EKS node group: <cause>`.
    #[error("{context}: {source}")]
    External {
        context: &'static str,
        #[source]
        source: BoxError,
    },

    /// A failure with no underlying cause.
    #[error("{0}")]
    Message(&'static str),

    #[error("cannot update managed resource: {0}")]
    UpdateManaged(#[source] kube::Error),

    #[error("cannot update managed resource after create: {0}")]
    UpdateManagedAfterCreate(#[source] kube::Error),

    #[error("cannot update managed resource status: {0}")]
    UpdateStatus(#[source] kube::Error),

    #[error("cannot remove managed resource finalizer: {0}")]
    RemoveFinalizer(#[source] kube::Error),

    #[error("managed resource has no name")]
    MissingObjectKey,
}

impl Error {
    /// Wrap `err` with a static description of the failed operation.
    pub fn wrap<E>(context: &'static str, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::External {
            context,
            source: err.into(),
        }
    }

    /// The static description this error was created with, if any.
    #[must_use]
    pub fn context(&self) -> Option<&'static str> {
        match self {
            Self::External { context, .. } => Some(*context),
            Self::Message(message) => Some(*message),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

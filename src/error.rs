use {
    crate::{lock::LockMode, model::OntologyId},
    std::{io, time::Duration},
    thiserror::Error,
};

/// Errors produced by guarded ontologies, their locks and the reference delegates.
///
/// The first group is raised by the guarding layer itself. The second group is raised by
/// delegates and passes through [`GuardedOntology`](crate::GuardedOntology) unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// A guarded ontology was built without one of its two required parts.
    #[error("guarded ontology cannot be built without a {missing}")]
    NullConfiguration {
        /// Either `"delegate"` or `"lock"`.
        missing: &'static str,
    },

    /// A write operation was invoked on a delegate that was wrapped read-only.
    #[error("`{operation}` requires a mutable delegate")]
    CapabilityUnsupported {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// The lock could not be acquired before the policy's timeout expired.
    #[error("timed out after {waited:?} waiting for the {mode} document lock")]
    Timeout {
        /// Mode that was requested.
        mode: LockMode,
        /// Time spent waiting.
        waited: Duration,
    },

    /// The policy's cancel token fired while waiting for the lock.
    #[error("cancelled while waiting for the {mode} document lock")]
    Cancelled {
        /// Mode that was requested.
        mode: LockMode,
    },

    /// The current thread requested the lock while already holding it exclusively.
    #[error("{mode} document lock requested by the thread that holds it exclusively")]
    Reentrant {
        /// Mode that was requested.
        mode: LockMode,
    },

    /// `save` was called on an ontology that has no document location.
    #[error("ontology {0} has no document location to save to")]
    NoDocumentTarget(OntologyId),

    /// Writing the ontology document failed.
    #[error("failed to save ontology to {target}")]
    Storage {
        /// Human readable description of the target.
        target: String,
        /// Underlying i/o error.
        #[source]
        source: io::Error,
    },

    /// A manager already holds an ontology with this id.
    #[error("ontology {0} is already managed")]
    AlreadyManaged(OntologyId),
}

/// Result alias used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

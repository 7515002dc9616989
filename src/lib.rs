//! This crate provides [`GuardedOntology`], a proxy that serializes writes to a shared
//! ontology document with a [`DocumentLock`] that many proxies can share.
//!
//! # Motivation
//!
//! An ontology document is typically shared by many parts of a program: a reasoner reads
//! it, an editor changes it, an import resolver hands it out to other documents. Each
//! of them holds its own handle to the document.
//!
//! Wrapping the document in a `RwLock` works as long as there is exactly one owner of
//! the lock. As soon as handles are created independently, for example by a registry
//! that hands out a fresh handle per request, every handle must agree on the same lock,
//! and nothing in the type of an `Arc<RwLock<Document>>` helps with that.
//!
//! This crate separates the two:
//!
//! 1. The [`DocumentLock`] is created once per document by the party that owns the
//!    document, usually an [`OntologyManager`]. Cloning it yields another handle to the
//!    same primitive.
//! 2. A [`GuardedOntology`] binds a document to such a handle. It is cheap to create and
//!    to discard, and it never holds the lock between calls.
//!
//! Writes through any proxy bound to the same lock never overlap. Reads are forwarded
//! without taking the lock. The document itself is responsible for answering a read
//! consistently while a write is in progress, which [`MemoryOntology`] does. Callers
//! that need several reads to observe the same state use [`GuardedOntology::snapshot`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use concurrent_ontology::{
//!     Axiom, ChangeApplied, Delegate, DocumentLock, Entity, MemoryOntology,
//!     MutableOntology, OntologyId,
//! };
//!
//! let document = Arc::new(MemoryOntology::new(OntologyId::named("http://example.org/zoo")));
//! let lock = DocumentLock::default();
//!
//! // Two independent proxies for the same document and the same lock.
//! let editor = lock.wrap(Delegate::mutable(document.clone()));
//! let importer = lock.wrap(Delegate::mutable(document));
//!
//! let cat = Axiom::declaration(Entity::class("http://example.org/zoo#Cat"));
//! assert_eq!(editor.add_axiom(cat.clone())?, ChangeApplied::Applied);
//! assert_eq!(importer.add_axiom(cat)?, ChangeApplied::NoOperation);
//! # Ok::<(), concurrent_ontology::Error>(())
//! ```
//!
//! A document that does not support mutation can be wrapped as well. Its write
//! operations then fail with [`Error::CapabilityUnsupported`] without touching the lock.
//!
//! The lock is not re-entrant. A proxy write issued by a thread that already holds the
//! exclusive mode fails with [`Error::Reentrant`] instead of deadlocking.

pub use {
    error::{Error, Result},
    guarded::{Delegate, GuardedOntology, GuardedOntologyBuilder},
    lock::{DocumentLock, LockMode, ReadGuard, WriteGuard},
    manager::{ManagerId, OntologyManager},
    memory::{MemoryOntology, MemoryOntologyBuilder},
    model::{
        Annotation, Axiom, AxiomAnnotations, AxiomCategory, AxiomKind, Change, ChangeApplied,
        ChangeList, Entity, EntityKind, ImportDeclaration, Imports, Iri, Navigation, OntologyId,
        Term,
    },
    ontology::{ImportResolver, MutableOntology, Ontology},
    policy::AcquirePolicy,
    tokio_util::sync::CancellationToken,
};

mod error;
mod execution_unit;
mod guarded;
mod lock;
mod manager;
mod memory;
mod model;
mod ontology;
mod policy;

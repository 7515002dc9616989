use {
    crate::{
        error::{Error, Result},
        guarded::{Delegate, GuardedOntology},
        lock::DocumentLock,
        memory::MemoryOntology,
        model::{Iri, OntologyId},
        ontology::{ImportResolver, Ontology},
        policy::AcquirePolicy,
    },
    debug_fn::debug_fn,
    parking_lot::RwLock,
    static_assertions::assert_impl_all,
    std::{
        fmt::{self, Debug, Display, Formatter},
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
    },
};


/// Identity of an [`OntologyManager`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManagerId(u64);

impl ManagerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for ManagerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "manager-{}", self.0)
    }
}

/// A registry of ontology documents.
///
/// The manager owns one [`DocumentLock`] per document. Every [`GuardedOntology`] it
/// hands out for a document is bound to that lock, so writes through any of them are
/// serialized. Proxies use the manager's [`AcquirePolicy`].
///
/// Documents created by the manager resolve their imports against the other documents
/// of the same manager.
///
/// Cloning a manager yields another handle to the same registry.
///
/// # Example
///
/// ```
/// use concurrent_ontology::{
///     Axiom, ChangeApplied, Entity, MutableOntology, Ontology, OntologyId, OntologyManager,
/// };
///
/// let manager = OntologyManager::new();
/// let id = OntologyId::named("http://example.org/zoo");
/// manager.create_ontology(id.clone())?;
///
/// let first = manager.ontology(&id).unwrap();
/// let second = manager.ontology(&id).unwrap();
/// assert_eq!(first.lock(), second.lock());
///
/// let cat = Axiom::declaration(Entity::class("http://example.org/zoo#Cat"));
/// assert_eq!(first.add_axiom(cat.clone())?, ChangeApplied::Applied);
/// assert_eq!(second.add_axiom(cat)?, ChangeApplied::NoOperation);
/// assert_eq!(second.manager(), Some(manager.id()));
/// # Ok::<(), concurrent_ontology::Error>(())
/// ```
#[derive(Clone, Default)]
pub struct OntologyManager {
    inner: Arc<Inner>,
}

assert_impl_all!(OntologyManager: Send, Sync, Clone);

struct Inner {
    id: ManagerId,
    policy: AcquirePolicy,
    entries: RwLock<Vec<Entry>>,
}

#[derive(Clone)]
struct Entry {
    delegate: Delegate,
    lock: DocumentLock,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            id: ManagerId::next(),
            policy: AcquirePolicy::default(),
            entries: Default::default(),
        }
    }
}

impl Inner {
    fn proxy(&self, entry: &Entry) -> GuardedOntology {
        entry
            .lock
            .wrap(entry.delegate.clone())
            .with_policy(self.policy.clone())
    }

    fn find(&self, matches: impl Fn(&OntologyId) -> bool) -> Option<Entry> {
        self.entries
            .read()
            .iter()
            .find(|entry| matches(&entry.delegate.ontology().id()))
            .cloned()
    }
}

impl ImportResolver for Inner {
    fn resolve_import(&self, document: &Iri) -> Option<Arc<dyn Ontology>> {
        let entry = self.find(|id| id.matches_document(document))?;
        Some(Arc::new(self.proxy(&entry)))
    }

    fn contains_ontology(&self, id: &OntologyId) -> bool {
        self.find(|candidate| candidate == id).is_some()
    }
}

impl OntologyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose proxies acquire document locks with `policy`.
    pub fn with_policy(policy: AcquirePolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                policy,
                ..Default::default()
            }),
        }
    }

    pub fn id(&self) -> ManagerId {
        self.inner.id
    }

    pub fn policy(&self) -> &AcquirePolicy {
        &self.inner.policy
    }

    /// Creates an empty in-memory document and registers it.
    pub fn create_ontology(&self, id: OntologyId) -> Result<GuardedOntology> {
        let resolver = Arc::downgrade(&self.inner);
        let ontology = MemoryOntology::builder().id(id).resolver(resolver).build();
        self.register(Delegate::mutable(Arc::new(ontology)))
    }

    /// Registers an existing document and binds it to this manager.
    ///
    /// The document gets a new [`DocumentLock`]. Fails with [`Error::AlreadyManaged`] if
    /// a document with the same id is already registered.
    pub fn register(&self, delegate: Delegate) -> Result<GuardedOntology> {
        let id = delegate.ontology().id();
        let mut entries = self.inner.entries.write();
        if entries
            .iter()
            .any(|entry| entry.delegate.ontology().id() == id)
        {
            return Err(Error::AlreadyManaged(id));
        }
        let entry = Entry {
            delegate,
            lock: DocumentLock::new(),
        };
        let proxy = self.inner.proxy(&entry);
        proxy.set_manager(Some(self.id()))?;
        entries.push(entry);
        tracing::debug!(manager = %self.id(), ontology = %id, "registered ontology");
        Ok(proxy)
    }

    /// Returns a new proxy for a registered document.
    pub fn ontology(&self, id: &OntologyId) -> Option<GuardedOntology> {
        let entry = self.inner.find(|candidate| candidate == id)?;
        Some(self.inner.proxy(&entry))
    }

    /// Returns a proxy for the document an import of `iri` refers to.
    pub fn ontology_for_document(&self, iri: &Iri) -> Option<GuardedOntology> {
        let entry = self.inner.find(|id| id.matches_document(iri))?;
        Some(self.inner.proxy(&entry))
    }

    pub fn contains(&self, id: &OntologyId) -> bool {
        self.inner.contains_ontology(id)
    }

    pub fn ontology_ids(&self) -> Vec<OntologyId> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|entry| entry.delegate.ontology().id())
            .collect()
    }

    /// The lock shared by all proxies of a document.
    pub fn lock_for(&self, id: &OntologyId) -> Option<DocumentLock> {
        self.inner
            .find(|candidate| candidate == id)
            .map(|entry| entry.lock)
    }

    /// Unbinds a document from this manager and forgets it.
    ///
    /// The binding is cleared under the document's exclusive lock. If the lock cannot
    /// be acquired, the document stays registered.
    pub fn remove_ontology(&self, id: &OntologyId) -> Result<Option<GuardedOntology>> {
        let Some(entry) = self.inner.find(|candidate| candidate == id) else {
            return Ok(None);
        };
        let proxy = self.inner.proxy(&entry);
        proxy.set_manager(None)?;
        self.inner
            .entries
            .write()
            .retain(|candidate| !candidate.delegate.ptr_eq(&entry.delegate));
        tracing::debug!(manager = %self.id(), ontology = %id, "removed ontology");
        Ok(Some(proxy))
    }
}

impl ImportResolver for OntologyManager {
    fn resolve_import(&self, document: &Iri) -> Option<Arc<dyn Ontology>> {
        self.inner.resolve_import(document)
    }

    fn contains_ontology(&self, id: &OntologyId) -> bool {
        self.inner.contains_ontology(id)
    }
}

impl Debug for OntologyManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OntologyManager")
            .field("id", &self.id())
            .field(
                "ontologies",
                &debug_fn(|fmt| {
                    fmt.debug_list()
                        .entries(self.ontology_ids().iter().map(|id| id.to_string()))
                        .finish()
                }),
            )
            .finish_non_exhaustive()
    }
}

use {
    crate::{
        error::{Error, Result},
        lock::DocumentLock,
        manager::ManagerId,
        model::{
            Annotation, Axiom, AxiomAnnotations, AxiomCategory, AxiomKind, Change, ChangeApplied,
            ChangeList, Entity, EntityKind, ImportDeclaration, Imports, Iri, Navigation,
            OntologyId,
        },
        ontology::{MutableOntology, Ontology},
        policy::AcquirePolicy,
    },
    debug_fn::debug_fn,
    run_on_drop::on_drop,
    static_assertions::assert_impl_all,
    std::{
        cmp::Ordering,
        collections::BTreeSet,
        fmt::{self, Debug, Display, Formatter},
        hash::{Hash, Hasher},
        io::Write,
        path::Path,
        sync::Arc,
    },
};


/// The document a [`GuardedOntology`] forwards to.
///
/// Whether the document can be mutated is decided once, when the delegate is created,
/// and never re-checked.
#[derive(Clone)]
pub enum Delegate {
    ReadOnly(Arc<dyn Ontology>),
    Mutable(Arc<dyn MutableOntology>),
}

impl Delegate {
    pub fn read_only(ontology: Arc<dyn Ontology>) -> Self {
        Self::ReadOnly(ontology)
    }

    pub fn mutable(ontology: Arc<dyn MutableOntology>) -> Self {
        Self::Mutable(ontology)
    }

    /// The read capability. Every delegate has it.
    pub fn ontology(&self) -> &dyn Ontology {
        match self {
            Self::ReadOnly(ontology) => &**ontology,
            Self::Mutable(ontology) => &**ontology,
        }
    }

    /// The write capability, if the delegate was created with it.
    pub fn mutable_ontology(&self) -> Option<&dyn MutableOntology> {
        match self {
            Self::ReadOnly(_) => None,
            Self::Mutable(ontology) => Some(&**ontology),
        }
    }

    /// Returns whether both delegates refer to the same document object.
    pub fn ptr_eq(&self, other: &Delegate) -> bool {
        let this: *const dyn Ontology = self.ontology();
        let other: *const dyn Ontology = other.ontology();
        this.cast::<u8>() == other.cast::<u8>()
    }
}

impl Debug for Delegate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (name, ontology) = match self {
            Self::ReadOnly(_) => ("ReadOnly", self.ontology()),
            Self::Mutable(_) => ("Mutable", self.ontology()),
        };
        f.debug_tuple(name).field(&ontology).finish()
    }
}

/// An ontology whose writes are serialized by a shared [`DocumentLock`].
///
/// A [`GuardedOntology`] forwards every operation to its [`Delegate`]. Operations that
/// mutate the document first acquire the exclusive mode of the lock and release it
/// before returning, whether the delegate returned a value, returned an error or
/// panicked. Any number of guarded ontologies may be bound to the same delegate and
/// clones of the same lock. The lock, not the proxy, is what serializes writes.
///
/// Reads are forwarded without touching the lock and therefore never wait for a
/// writer. Each read observes whatever the delegate exposes at that instant. Use
/// [`snapshot`](Self::snapshot) to run several reads that must not interleave with a
/// write.
///
/// Writes against a read-only delegate fail with [`Error::CapabilityUnsupported`]
/// without acquiring the lock.
///
/// Objects of this type are cheap to create and to discard. They can be created with
/// [`DocumentLock::wrap`], [`GuardedOntology::new`] or [`GuardedOntology::builder`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use concurrent_ontology::{
///     Axiom, ChangeApplied, Delegate, DocumentLock, Entity, MemoryOntology,
///     MutableOntology, Ontology, OntologyId,
/// };
///
/// let document = Arc::new(MemoryOntology::new(OntologyId::named("http://example.org/zoo")));
/// let lock = DocumentLock::default();
///
/// let animal = Entity::class("http://example.org/zoo#Animal");
/// let cat = Entity::class("http://example.org/zoo#Cat");
/// let dog = Entity::class("http://example.org/zoo#Dog");
///
/// thread::scope(|scope| {
///     for class in [cat, dog] {
///         let proxy = lock.wrap(Delegate::mutable(document.clone()));
///         let animal = animal.clone();
///         scope.spawn(move || {
///             let result = proxy.add_axiom(Axiom::sub_class_of(class, animal));
///             assert_eq!(result.unwrap(), ChangeApplied::Applied);
///         });
///     }
/// });
///
/// assert_eq!(document.axiom_count(Default::default()), 2);
/// assert!(!lock.is_locked());
/// ```
#[derive(Clone)]
pub struct GuardedOntology {
    delegate: Delegate,
    lock: DocumentLock,
    policy: AcquirePolicy,
}

assert_impl_all!(GuardedOntology: Send, Sync, Clone);
assert_impl_all!(Delegate: Send, Sync, Clone);

/// Collects the parts of a [`GuardedOntology`].
///
/// Both the delegate and the lock are required. [`build`](Self::build) reports the
/// first missing part.
#[derive(Clone, Debug, Default)]
pub struct GuardedOntologyBuilder {
    delegate: Option<Delegate>,
    lock: Option<DocumentLock>,
    policy: AcquirePolicy,
}

impl GuardedOntologyBuilder {
    pub fn delegate(mut self, delegate: Delegate) -> Self {
        self.delegate = Some(delegate);
        self
    }

    pub fn lock(mut self, lock: DocumentLock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn policy(mut self, policy: AcquirePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the guarded ontology.
    ///
    /// # Example
    ///
    /// ```
    /// use concurrent_ontology::{DocumentLock, Error, GuardedOntology};
    ///
    /// let result = GuardedOntology::builder().lock(DocumentLock::default()).build();
    /// assert!(matches!(result, Err(Error::NullConfiguration { missing: "delegate" })));
    /// ```
    pub fn build(self) -> Result<GuardedOntology> {
        let delegate = self.delegate.ok_or(Error::NullConfiguration {
            missing: "delegate",
        })?;
        let lock = self
            .lock
            .ok_or(Error::NullConfiguration { missing: "lock" })?;
        Ok(GuardedOntology {
            delegate,
            lock,
            policy: self.policy,
        })
    }
}

impl DocumentLock {
    /// Binds a delegate to this lock.
    ///
    /// This function clones the [`DocumentLock`] which makes it about as expensive as
    /// cloning an [`Arc`].
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use concurrent_ontology::{Delegate, DocumentLock, MemoryOntology, OntologyId};
    ///
    /// let lock = DocumentLock::default();
    /// let document = Arc::new(MemoryOntology::new(OntologyId::anonymous()));
    /// let proxy = lock.wrap(Delegate::mutable(document));
    /// assert_eq!(proxy.lock(), &lock);
    /// ```
    #[inline]
    pub fn wrap(&self, delegate: Delegate) -> GuardedOntology {
        GuardedOntology::new(delegate, self.clone())
    }
}

impl GuardedOntology {
    /// Creates a guarded ontology with the default [`AcquirePolicy`].
    pub fn new(delegate: Delegate, lock: DocumentLock) -> Self {
        Self {
            delegate,
            lock,
            policy: AcquirePolicy::default(),
        }
    }

    pub fn builder() -> GuardedOntologyBuilder {
        GuardedOntologyBuilder::default()
    }

    /// Replaces the policy used to acquire the lock.
    pub fn with_policy(mut self, policy: AcquirePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &AcquirePolicy {
        &self.policy
    }

    pub fn lock(&self) -> &DocumentLock {
        &self.lock
    }

    pub fn delegate(&self) -> &Delegate {
        &self.delegate
    }

    /// Returns whether write operations are supported.
    pub fn is_mutable(&self) -> bool {
        self.delegate.mutable_ontology().is_some()
    }

    /// Runs `f` against the delegate while holding the shared mode.
    ///
    /// No write through any proxy bound to the same lock can run while `f` runs. `f`
    /// must not write through such a proxy itself, but it may take nested snapshots,
    /// even while a writer is waiting.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use concurrent_ontology::{
    ///     Axiom, Delegate, DocumentLock, Entity, Imports, MemoryOntology, MutableOntology,
    ///     Ontology, OntologyId,
    /// };
    ///
    /// let document = Arc::new(MemoryOntology::new(OntologyId::anonymous()));
    /// let proxy = DocumentLock::default().wrap(Delegate::mutable(document));
    /// proxy.add_axiom(Axiom::declaration(Entity::class("http://example.org/A"))).unwrap();
    ///
    /// let (count, signature) = proxy
    ///     .snapshot(|ontology| {
    ///         (ontology.axiom_count(Imports::Excluded), ontology.signature(Imports::Excluded))
    ///     })
    ///     .unwrap();
    /// assert_eq!(count, signature.len());
    /// ```
    pub fn snapshot<R>(&self, f: impl FnOnce(&dyn Ontology) -> R) -> Result<R> {
        let guard = self.lock.read_with(&self.policy)?;
        let result = f(self.delegate.ontology());
        if self.policy.fair_unlock() {
            guard.unlock_fair();
        } else {
            drop(guard);
        }
        Ok(result)
    }

    fn exclusive<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Delegate) -> Result<R>,
    ) -> Result<R> {
        let guard = self.lock.write_with(&self.policy)?;
        tracing::trace!(lock = ?self.lock.addr(), operation, "acquired exclusive document lock");
        let fair = self.policy.fair_unlock();
        let mut guard = Some(guard);
        let _release = on_drop(move || {
            if let Some(guard) = guard.take() {
                if fair {
                    guard.unlock_fair();
                } else {
                    drop(guard);
                }
            }
            tracing::trace!(operation, "released exclusive document lock");
        });
        f(&self.delegate)
    }

    fn mutate<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&dyn MutableOntology) -> Result<R>,
    ) -> Result<R> {
        if !self.is_mutable() {
            tracing::debug!(
                operation,
                ontology = %self.delegate.ontology().id(),
                "rejected write on read-only delegate"
            );
            return Err(Error::CapabilityUnsupported { operation });
        }
        self.exclusive(operation, |delegate| match delegate.mutable_ontology() {
            Some(ontology) => f(ontology),
            None => Err(Error::CapabilityUnsupported { operation }),
        })
    }
}

macro_rules! forward {
    ($($name:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(
            #[inline]
            fn $name(&self, $($arg: $ty),*) -> $ret {
                self.delegate.ontology().$name($($arg),*)
            }
        )*
    };
}

impl Ontology for GuardedOntology {
    forward! {
        id() -> OntologyId;
        is_anonymous() -> bool;
        annotations() -> BTreeSet<Annotation>;
        manager() -> Option<ManagerId>;
        import_declarations() -> BTreeSet<ImportDeclaration>;
        direct_imports_documents() -> BTreeSet<Iri>;
        direct_imports() -> Vec<Arc<dyn Ontology>>;
        imports_closure() -> Vec<Arc<dyn Ontology>>;
        is_empty() -> bool;
        axioms(imports: Imports) -> BTreeSet<Axiom>;
        axiom_count(imports: Imports) -> usize;
        logical_axioms(imports: Imports) -> BTreeSet<Axiom>;
        logical_axiom_count(imports: Imports) -> usize;
        axioms_of_kind(kind: AxiomKind, imports: Imports) -> BTreeSet<Axiom>;
        axiom_count_of_kind(kind: AxiomKind, imports: Imports) -> usize;
        axioms_in_category(category: AxiomCategory, imports: Imports) -> BTreeSet<Axiom>;
        contains_axiom(axiom: &Axiom, imports: Imports, annotations: AxiomAnnotations) -> bool;
        axioms_ignore_annotations(axiom: &Axiom, imports: Imports) -> BTreeSet<Axiom>;
        referencing_axioms(entity: &Entity, imports: Imports) -> BTreeSet<Axiom>;
        axioms_for_subject(entity: &Entity, imports: Imports) -> BTreeSet<Axiom>;
        axioms_for_object(entity: &Entity, imports: Imports) -> BTreeSet<Axiom>;
        axioms_in_position(
            entity: &Entity,
            navigation: Navigation,
            imports: Imports
        ) -> BTreeSet<Axiom>;
        axioms_with_predicate(property: &Entity, imports: Imports) -> BTreeSet<Axiom>;
        signature(imports: Imports) -> BTreeSet<Entity>;
        entities_in_signature(iri: &Iri, imports: Imports) -> BTreeSet<Entity>;
        contains_entity_in_signature(entity: &Entity, imports: Imports) -> bool;
        contains_iri_in_signature(iri: &Iri, kind: Option<EntityKind>, imports: Imports) -> bool;
        is_declared(entity: &Entity, imports: Imports) -> bool;
        punned_iris(imports: Imports) -> BTreeSet<Iri>;
        save() -> Result<()>;
        save_to(target: &mut dyn Write) -> Result<()>;
        save_as(path: &Path) -> Result<()>;
    }

    fn set_manager(&self, manager: Option<ManagerId>) -> Result<()> {
        self.exclusive("set_manager", |delegate| {
            delegate.ontology().set_manager(manager)
        })
    }

    fn trim_to_size(&self) -> Result<()> {
        self.exclusive("trim_to_size", |delegate| delegate.ontology().trim_to_size())
    }
}

impl MutableOntology for GuardedOntology {
    fn apply_change(&self, change: Change) -> Result<ChangeApplied> {
        self.mutate("apply_change", |ontology| ontology.apply_change(change))
    }

    fn apply_changes(&self, changes: ChangeList) -> Result<ChangeApplied> {
        self.mutate("apply_changes", |ontology| ontology.apply_changes(changes))
    }

    fn add_axiom(&self, axiom: Axiom) -> Result<ChangeApplied> {
        self.mutate("add_axiom", |ontology| ontology.add_axiom(axiom))
    }

    fn add_axioms(&self, axioms: BTreeSet<Axiom>) -> Result<ChangeApplied> {
        self.mutate("add_axioms", |ontology| ontology.add_axioms(axioms))
    }

    fn remove_axiom(&self, axiom: Axiom) -> Result<ChangeApplied> {
        self.mutate("remove_axiom", |ontology| ontology.remove_axiom(axiom))
    }

    fn remove_axioms(&self, axioms: BTreeSet<Axiom>) -> Result<ChangeApplied> {
        self.mutate("remove_axioms", |ontology| ontology.remove_axioms(axioms))
    }
}

impl Debug for GuardedOntology {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedOntology")
            .field("id", &debug_fn(|fmt| Display::fmt(&self.id(), fmt)))
            .field("mutable", &self.is_mutable())
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

impl Display for GuardedOntology {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self.delegate.ontology(), f)
    }
}

impl PartialEq for GuardedOntology {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for GuardedOntology {}

impl PartialOrd for GuardedOntology {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GuardedOntology {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(&other.id())
    }
}

impl Hash for GuardedOntology {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

use {
    crate::{
        error::{Error, Result},
        manager::ManagerId,
        model::{
            Annotation, Axiom, AxiomAnnotations, Change, ChangeApplied, ChangeList, Entity,
            ImportDeclaration, Imports, Navigation, OntologyId,
        },
        ontology::{ImportResolver, MutableOntology, Ontology},
    },
    parking_lot::RwLock,
    std::{
        collections::{BTreeSet, HashMap},
        fmt::{self, Display, Formatter},
        io::Write,
        path::{Path, PathBuf},
        sync::{Arc, Weak},
    },
};


/// An ontology document held in memory.
///
/// Every call observes the document either before or after any single mutation call,
/// so a [`MemoryOntology`] can be read through a
/// [`GuardedOntology`](crate::GuardedOntology) while another thread writes to it.
///
/// Mutations reject these requests with [`ChangeApplied::Unsuccessful`]:
///
/// - adding an axiom whose operands do not fit its kind,
/// - importing the document itself,
/// - renaming the document to an id its resolver reports as taken.
///
/// [`apply_changes`](MutableOntology::apply_changes) applies either every change of the
/// batch or none of them.
///
/// # Example
///
/// ```
/// use concurrent_ontology::{
///     Axiom, ChangeApplied, Entity, Imports, MemoryOntology, MutableOntology, Ontology,
///     OntologyId,
/// };
///
/// let ontology = MemoryOntology::new(OntologyId::named("http://example.org/zoo"));
/// let cat = Entity::class("http://example.org/zoo#Cat");
/// assert_eq!(ontology.add_axiom(Axiom::declaration(cat.clone()))?, ChangeApplied::Applied);
/// assert!(ontology.is_declared(&cat, Imports::Excluded));
/// # Ok::<(), concurrent_ontology::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryOntology {
    state: RwLock<State>,
    document: Option<PathBuf>,
    resolver: Option<Weak<dyn ImportResolver>>,
}

#[derive(Debug)]
struct State {
    id: OntologyId,
    axioms: BTreeSet<Axiom>,
    // Every entity of the signature maps to the non-empty set of axioms that mention it.
    references: HashMap<Entity, BTreeSet<Axiom>>,
    imports: BTreeSet<ImportDeclaration>,
    annotations: BTreeSet<Annotation>,
    manager: Option<ManagerId>,
}

#[derive(Debug, Default)]
pub struct MemoryOntologyBuilder {
    id: Option<OntologyId>,
    document: Option<PathBuf>,
    resolver: Option<Weak<dyn ImportResolver>>,
}

impl MemoryOntologyBuilder {
    /// Defaults to a fresh anonymous id.
    pub fn id(mut self, id: OntologyId) -> Self {
        self.id = Some(id);
        self
    }

    /// The file [`save`](Ontology::save) writes to.
    pub fn document(mut self, path: impl Into<PathBuf>) -> Self {
        self.document = Some(path.into());
        self
    }

    /// Resolves import declarations. Only a weak reference is kept.
    pub fn resolver(mut self, resolver: Weak<dyn ImportResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn build(self) -> MemoryOntology {
        MemoryOntology {
            state: RwLock::new(State::new(self.id.unwrap_or_else(OntologyId::anonymous))),
            document: self.document,
            resolver: self.resolver,
        }
    }
}

impl MemoryOntology {
    pub fn new(id: OntologyId) -> Self {
        Self::builder().id(id).build()
    }

    pub fn builder() -> MemoryOntologyBuilder {
        MemoryOntologyBuilder::default()
    }

    pub fn document(&self) -> Option<&Path> {
        self.document.as_deref()
    }

    fn with<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        let guard = self.state.read();
        f(&guard)
    }

    fn with_mut<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = self.state.write();
        f(&mut guard)
    }

    /// The ids `changes` would rename this document to that another document already
    /// uses.
    ///
    /// The resolver may call back into this document, so this runs outside the state lock.
    fn taken_ids<'a>(
        &self,
        changes: impl IntoIterator<Item = &'a Change>,
    ) -> BTreeSet<OntologyId> {
        let Some(resolver) = self.resolver.as_ref().and_then(Weak::upgrade) else {
            return BTreeSet::new();
        };
        let own = self.id();
        changes
            .into_iter()
            .filter_map(|change| match change {
                Change::SetOntologyId(id) if *id != own => Some(id),
                _ => None,
            })
            .filter(|id| resolver.contains_ontology(id))
            .cloned()
            .collect()
    }

    /// Combines a query over this document with the same query over its imports closure.
    ///
    /// The state lock is released before any imported document is consulted.
    fn collect<T: Ord>(
        &self,
        imports: Imports,
        own: impl FnOnce(&State) -> BTreeSet<T>,
        imported: impl Fn(&dyn Ontology) -> BTreeSet<T>,
    ) -> BTreeSet<T> {
        let mut result = self.with(own);
        if imports == Imports::Included {
            for ontology in self.imports_closure() {
                result.extend(imported(&*ontology));
            }
        }
        result
    }
}

impl State {
    fn new(id: OntologyId) -> Self {
        Self {
            id,
            axioms: Default::default(),
            references: Default::default(),
            imports: Default::default(),
            annotations: Default::default(),
            manager: None,
        }
    }

    fn apply(&mut self, change: &Change, taken: &BTreeSet<OntologyId>) -> ChangeApplied {
        let changed = match change {
            Change::AddAxiom(axiom) => {
                if !axiom.is_well_formed() {
                    return ChangeApplied::Unsuccessful;
                }
                self.insert_axiom(axiom)
            }
            Change::RemoveAxiom(axiom) => self.remove_axiom(axiom),
            Change::AddImport(import) => {
                if self.id.matches_document(import.iri()) {
                    return ChangeApplied::Unsuccessful;
                }
                self.imports.insert(import.clone())
            }
            Change::RemoveImport(import) => self.imports.remove(import),
            Change::AddAnnotation(annotation) => self.annotations.insert(annotation.clone()),
            Change::RemoveAnnotation(annotation) => self.annotations.remove(annotation),
            Change::SetOntologyId(id) => {
                if self.imports.iter().any(|import| id.matches_document(import.iri())) {
                    return ChangeApplied::Unsuccessful;
                }
                if *id == self.id {
                    false
                } else if taken.contains(id) {
                    return ChangeApplied::Unsuccessful;
                } else {
                    self.id = id.clone();
                    true
                }
            }
        };
        if changed {
            ChangeApplied::Applied
        } else {
            ChangeApplied::NoOperation
        }
    }

    /// The change that reverts `change` if it is applied to the current state.
    fn inverse(&self, change: &Change) -> Change {
        match change {
            Change::AddAxiom(axiom) => Change::RemoveAxiom(axiom.clone()),
            Change::RemoveAxiom(axiom) => Change::AddAxiom(axiom.clone()),
            Change::AddImport(import) => Change::RemoveImport(import.clone()),
            Change::RemoveImport(import) => Change::AddImport(import.clone()),
            Change::AddAnnotation(annotation) => Change::RemoveAnnotation(annotation.clone()),
            Change::RemoveAnnotation(annotation) => Change::AddAnnotation(annotation.clone()),
            Change::SetOntologyId(_) => Change::SetOntologyId(self.id.clone()),
        }
    }

    fn insert_axiom(&mut self, axiom: &Axiom) -> bool {
        if !self.axioms.insert(axiom.clone()) {
            return false;
        }
        for entity in axiom.signature() {
            self.references
                .entry(entity.clone())
                .or_default()
                .insert(axiom.clone());
        }
        true
    }

    fn remove_axiom(&mut self, axiom: &Axiom) -> bool {
        if !self.axioms.remove(axiom) {
            return false;
        }
        for entity in axiom.signature() {
            if let Some(axioms) = self.references.get_mut(entity) {
                axioms.remove(axiom);
                if axioms.is_empty() {
                    self.references.remove(entity);
                }
            }
        }
        true
    }

    fn referencing(&self, entity: &Entity) -> BTreeSet<Axiom> {
        self.references.get(entity).cloned().unwrap_or_default()
    }

}

/// The functional-style document written by [`Ontology::save_to`].
impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.id {
            OntologyId::Anonymous(_) => writeln!(f, "Ontology(")?,
            id => writeln!(f, "Ontology({id}")?,
        }
        for import in &self.imports {
            writeln!(f, "{import}")?;
        }
        for annotation in &self.annotations {
            writeln!(f, "{annotation}")?;
        }
        for axiom in &self.axioms {
            writeln!(f, "{axiom}")?;
        }
        writeln!(f, ")")
    }
}

impl Display for MemoryOntology {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (id, axioms, logical) = self.with(|state| {
            let logical = state.axioms.iter().filter(|a| a.is_logical()).count();
            (state.id.clone(), state.axioms.len(), logical)
        });
        write!(f, "Ontology({id}) [Axioms: {axioms} Logical Axioms: {logical}]")
    }
}

impl Ontology for MemoryOntology {
    fn id(&self) -> OntologyId {
        self.with(|state| state.id.clone())
    }

    fn annotations(&self) -> BTreeSet<Annotation> {
        self.with(|state| state.annotations.clone())
    }

    fn manager(&self) -> Option<ManagerId> {
        self.with(|state| state.manager)
    }

    fn set_manager(&self, manager: Option<ManagerId>) -> Result<()> {
        self.with_mut(|state| state.manager = manager);
        Ok(())
    }

    fn trim_to_size(&self) -> Result<()> {
        self.with_mut(|state| state.references.shrink_to_fit());
        Ok(())
    }

    fn import_declarations(&self) -> BTreeSet<ImportDeclaration> {
        self.with(|state| state.imports.clone())
    }

    fn direct_imports(&self) -> Vec<Arc<dyn Ontology>> {
        let Some(resolver) = self.resolver.as_ref().and_then(Weak::upgrade) else {
            return Vec::new();
        };
        let (id, imports) = self.with(|state| (state.id.clone(), state.imports.clone()));
        imports
            .iter()
            .filter_map(|import| resolver.resolve_import(import.iri()))
            .filter(|ontology| ontology.id() != id)
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.with(|state| state.axioms.is_empty() && state.annotations.is_empty())
    }

    fn axioms(&self, imports: Imports) -> BTreeSet<Axiom> {
        self.collect(
            imports,
            |state| state.axioms.clone(),
            |ontology| ontology.axioms(Imports::Excluded),
        )
    }

    fn axiom_count(&self, imports: Imports) -> usize {
        match imports {
            Imports::Excluded => self.with(|state| state.axioms.len()),
            Imports::Included => self.axioms(imports).len(),
        }
    }

    fn contains_axiom(
        &self,
        axiom: &Axiom,
        imports: Imports,
        annotations: AxiomAnnotations,
    ) -> bool {
        let own = self.with(|state| match annotations {
            AxiomAnnotations::Consider => state.axioms.contains(axiom),
            AxiomAnnotations::Ignore => axiom.signature().next().map_or_else(
                || state.axioms.iter().any(|a| a.equals_ignoring_annotations(axiom)),
                |entity| {
                    state
                        .references
                        .get(entity)
                        .is_some_and(|axioms| {
                            axioms.iter().any(|a| a.equals_ignoring_annotations(axiom))
                        })
                },
            ),
        });
        own || (imports == Imports::Included
            && self
                .imports_closure()
                .iter()
                .any(|ontology| ontology.contains_axiom(axiom, Imports::Excluded, annotations)))
    }

    fn referencing_axioms(&self, entity: &Entity, imports: Imports) -> BTreeSet<Axiom> {
        self.collect(
            imports,
            |state| state.referencing(entity),
            |ontology| ontology.referencing_axioms(entity, Imports::Excluded),
        )
    }

    fn axioms_in_position(
        &self,
        entity: &Entity,
        navigation: Navigation,
        imports: Imports,
    ) -> BTreeSet<Axiom> {
        self.collect(
            imports,
            |state| {
                let mut axioms = state.referencing(entity);
                axioms.retain(|axiom| axiom.in_position(navigation) == Some(entity));
                axioms
            },
            |ontology| ontology.axioms_in_position(entity, navigation, Imports::Excluded),
        )
    }

    fn signature(&self, imports: Imports) -> BTreeSet<Entity> {
        self.collect(
            imports,
            |state| state.references.keys().cloned().collect(),
            |ontology| ontology.signature(Imports::Excluded),
        )
    }

    fn contains_entity_in_signature(&self, entity: &Entity, imports: Imports) -> bool {
        self.with(|state| state.references.contains_key(entity))
            || (imports == Imports::Included
                && self
                    .imports_closure()
                    .iter()
                    .any(|ontology| {
                        ontology.contains_entity_in_signature(entity, Imports::Excluded)
                    }))
    }

    fn save(&self) -> Result<()> {
        match &self.document {
            Some(path) => self.save_as(path),
            None => Err(Error::NoDocumentTarget(self.id())),
        }
    }

    fn save_to(&self, target: &mut dyn Write) -> Result<()> {
        let rendered = self.with(|state| state.to_string());
        target
            .write_all(rendered.as_bytes())
            .map_err(|source| Error::Storage {
                target: "stream".to_string(),
                source,
            })
    }
}

impl MutableOntology for MemoryOntology {
    fn apply_change(&self, change: Change) -> Result<ChangeApplied> {
        let taken = self.taken_ids([&change]);
        let result = self.with_mut(|state| state.apply(&change, &taken));
        if result == ChangeApplied::Unsuccessful {
            tracing::debug!(%change, "change rejected");
        }
        Ok(result)
    }

    fn apply_changes(&self, changes: ChangeList) -> Result<ChangeApplied> {
        let taken = self.taken_ids(&changes);
        let result = self.with_mut(|state| {
            let mut undo = Vec::new();
            let mut result = ChangeApplied::NoOperation;
            for change in &changes {
                let inverse = state.inverse(change);
                match state.apply(change, &taken) {
                    ChangeApplied::Applied => {
                        undo.push(inverse);
                        result = result.merge(ChangeApplied::Applied);
                    }
                    ChangeApplied::NoOperation => {}
                    ChangeApplied::Unsuccessful => {
                        tracing::debug!(%change, "change rejected, reverting batch");
                        for inverse in undo.iter().rev() {
                            state.apply(inverse, &BTreeSet::new());
                        }
                        return ChangeApplied::Unsuccessful;
                    }
                }
            }
            result
        });
        Ok(result)
    }
}

//! The capability traits a document implements.
//!
//! [`Ontology`] is the read capability. [`MutableOntology`] adds the write path. A
//! delegate that only implements [`Ontology`] can still be wrapped in a
//! [`GuardedOntology`](crate::GuardedOntology), but its write operations then fail with
//! [`Error::CapabilityUnsupported`](crate::Error::CapabilityUnsupported).

use {
    crate::{
        error::{Error, Result},
        manager::ManagerId,
        model::{
            Annotation, Axiom, AxiomAnnotations, AxiomCategory, AxiomKind, Change, ChangeApplied,
            ChangeList, Entity, EntityKind, ImportDeclaration, Imports, Iri, Navigation,
            OntologyId,
        },
    },
    std::{
        collections::{BTreeMap, BTreeSet, VecDeque},
        fmt::{Debug, Display},
        fs::File,
        io::{self, BufWriter, Write},
        path::Path,
        sync::Arc,
    },
};

/// Read access to an ontology document.
///
/// Implementations must be safe to call from many threads at once, including while a
/// write to the same document is in progress on another thread. Every call should
/// observe the document either before or after any single write call.
///
/// Most queries have a provided implementation in terms of [`axioms`](Self::axioms).
/// Implementations with indexes should override them.
///
/// `Display` renders a short human readable summary. Equality of documents is a matter
/// of their [`OntologyId`].
pub trait Ontology: Send + Sync + Debug + Display {
    fn id(&self) -> OntologyId;

    fn is_anonymous(&self) -> bool {
        self.id().is_anonymous()
    }

    /// Annotations on the ontology itself.
    fn annotations(&self) -> BTreeSet<Annotation>;

    /// The manager this document is bound to.
    fn manager(&self) -> Option<ManagerId>;

    /// Rebinds this document to another manager.
    fn set_manager(&self, manager: Option<ManagerId>) -> Result<()>;

    /// Compacts internal storage. Does nothing by default.
    fn trim_to_size(&self) -> Result<()> {
        Ok(())
    }

    fn import_declarations(&self) -> BTreeSet<ImportDeclaration>;

    fn direct_imports_documents(&self) -> BTreeSet<Iri> {
        self.import_declarations()
            .into_iter()
            .map(|import| import.0)
            .collect()
    }

    /// The documents this ontology imports directly and that could be resolved.
    fn direct_imports(&self) -> Vec<Arc<dyn Ontology>>;

    /// All documents reachable through imports, excluding this one.
    ///
    /// Each document appears once, even if the import graph has cycles.
    fn imports_closure(&self) -> Vec<Arc<dyn Ontology>> {
        let mut seen = BTreeSet::from([self.id()]);
        let mut queue: VecDeque<_> = self.direct_imports().into();
        let mut closure = Vec::new();
        while let Some(ontology) = queue.pop_front() {
            if seen.insert(ontology.id()) {
                queue.extend(ontology.direct_imports());
                closure.push(ontology);
            }
        }
        closure
    }

    /// Returns whether the document has neither axioms nor annotations.
    fn is_empty(&self) -> bool {
        self.axioms(Imports::Excluded).is_empty() && self.annotations().is_empty()
    }

    fn axioms(&self, imports: Imports) -> BTreeSet<Axiom>;

    fn axiom_count(&self, imports: Imports) -> usize {
        self.axioms(imports).len()
    }

    fn logical_axioms(&self, imports: Imports) -> BTreeSet<Axiom> {
        filtered(self.axioms(imports), Axiom::is_logical)
    }

    fn logical_axiom_count(&self, imports: Imports) -> usize {
        self.logical_axioms(imports).len()
    }

    fn axioms_of_kind(&self, kind: AxiomKind, imports: Imports) -> BTreeSet<Axiom> {
        filtered(self.axioms(imports), |axiom| axiom.kind() == kind)
    }

    fn axiom_count_of_kind(&self, kind: AxiomKind, imports: Imports) -> usize {
        self.axioms_of_kind(kind, imports).len()
    }

    /// TBox, RBox, ABox or non-logical axioms.
    fn axioms_in_category(&self, category: AxiomCategory, imports: Imports) -> BTreeSet<Axiom> {
        filtered(self.axioms(imports), |axiom| axiom.category() == category)
    }

    fn contains_axiom(
        &self,
        axiom: &Axiom,
        imports: Imports,
        annotations: AxiomAnnotations,
    ) -> bool {
        match annotations {
            AxiomAnnotations::Consider => self.axioms(imports).contains(axiom),
            AxiomAnnotations::Ignore => !self.axioms_ignore_annotations(axiom, imports).is_empty(),
        }
    }

    /// All axioms that equal `axiom` once annotations are ignored.
    fn axioms_ignore_annotations(&self, axiom: &Axiom, imports: Imports) -> BTreeSet<Axiom> {
        filtered(self.axioms(imports), |candidate| {
            candidate.equals_ignoring_annotations(axiom)
        })
    }

    /// All axioms that mention `entity` anywhere.
    fn referencing_axioms(&self, entity: &Entity, imports: Imports) -> BTreeSet<Axiom> {
        filtered(self.axioms(imports), |axiom| axiom.references(entity))
    }

    /// All axioms whose subject is `entity`.
    fn axioms_for_subject(&self, entity: &Entity, imports: Imports) -> BTreeSet<Axiom> {
        self.axioms_in_position(entity, Navigation::InSubPosition, imports)
    }

    /// All axioms whose [object](Axiom::object) is `entity`, such as the `SubClassOf`
    /// axioms naming it as the superclass.
    fn axioms_for_object(&self, entity: &Entity, imports: Imports) -> BTreeSet<Axiom> {
        self.axioms_in_position(entity, Navigation::InSuperPosition, imports)
    }

    /// All axioms that have `entity` at the end `navigation` selects.
    fn axioms_in_position(
        &self,
        entity: &Entity,
        navigation: Navigation,
        imports: Imports,
    ) -> BTreeSet<Axiom> {
        filtered(self.axioms(imports), |axiom| {
            axiom.in_position(navigation) == Some(entity)
        })
    }

    /// All assertions of `property`.
    fn axioms_with_predicate(&self, property: &Entity, imports: Imports) -> BTreeSet<Axiom> {
        filtered(self.axioms(imports), |axiom| {
            axiom.predicate() == Some(property)
        })
    }

    fn signature(&self, imports: Imports) -> BTreeSet<Entity> {
        self.axioms(imports)
            .iter()
            .flat_map(|axiom| axiom.signature())
            .cloned()
            .collect()
    }

    /// Entities of any kind named by `iri`.
    fn entities_in_signature(&self, iri: &Iri, imports: Imports) -> BTreeSet<Entity> {
        self.signature(imports)
            .into_iter()
            .filter(|entity| &entity.iri == iri)
            .collect()
    }

    fn contains_entity_in_signature(&self, entity: &Entity, imports: Imports) -> bool {
        self.signature(imports).contains(entity)
    }

    /// Returns whether `iri` names an entity of the signature, optionally restricted to
    /// one kind.
    fn contains_iri_in_signature(
        &self,
        iri: &Iri,
        kind: Option<EntityKind>,
        imports: Imports,
    ) -> bool {
        self.entities_in_signature(iri, imports)
            .iter()
            .any(|entity| kind.is_none_or(|kind| entity.kind == kind))
    }

    fn is_declared(&self, entity: &Entity, imports: Imports) -> bool {
        self.contains_axiom(
            &Axiom::declaration(entity.clone()),
            imports,
            AxiomAnnotations::Ignore,
        )
    }

    /// IRIs that name entities of more than one kind.
    fn punned_iris(&self, imports: Imports) -> BTreeSet<Iri> {
        let mut kinds = BTreeMap::<Iri, usize>::new();
        for entity in self.signature(imports) {
            *kinds.entry(entity.iri).or_default() += 1;
        }
        kinds
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(iri, _)| iri)
            .collect()
    }

    /// Saves the document to the location it was loaded from.
    fn save(&self) -> Result<()>;

    /// Renders the document into `target`.
    fn save_to(&self, target: &mut dyn Write) -> Result<()>;

    /// Renders the document into a new file at `path`.
    fn save_as(&self, path: &Path) -> Result<()> {
        let storage = |source: io::Error| Error::Storage {
            target: path.display().to_string(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(storage)?);
        self.save_to(&mut writer)?;
        writer.flush().map_err(storage)
    }
}

/// Write access to an ontology document.
///
/// A rejected request is reported as [`ChangeApplied::Unsuccessful`]. `Err` is reserved
/// for failures that prevented the request from being evaluated at all.
pub trait MutableOntology: Ontology {
    fn apply_change(&self, change: Change) -> Result<ChangeApplied>;

    fn apply_changes(&self, changes: ChangeList) -> Result<ChangeApplied>;

    fn add_axiom(&self, axiom: Axiom) -> Result<ChangeApplied> {
        self.apply_change(Change::AddAxiom(axiom))
    }

    fn add_axioms(&self, axioms: BTreeSet<Axiom>) -> Result<ChangeApplied> {
        self.apply_changes(axioms.into_iter().map(Change::AddAxiom).collect())
    }

    fn remove_axiom(&self, axiom: Axiom) -> Result<ChangeApplied> {
        self.apply_change(Change::RemoveAxiom(axiom))
    }

    fn remove_axioms(&self, axioms: BTreeSet<Axiom>) -> Result<ChangeApplied> {
        self.apply_changes(axioms.into_iter().map(Change::RemoveAxiom).collect())
    }
}

/// Looks up the documents that live next to this one, usually in the same manager.
pub trait ImportResolver: Send + Sync {
    /// The document an import declaration refers to.
    fn resolve_import(&self, document: &Iri) -> Option<Arc<dyn Ontology>>;

    /// Returns whether some document already uses `id`.
    ///
    /// A document refuses to be renamed to such an id. Defaults to `false`.
    fn contains_ontology(&self, _id: &OntologyId) -> bool {
        false
    }
}

fn filtered(axioms: BTreeSet<Axiom>, mut keep: impl FnMut(&Axiom) -> bool) -> BTreeSet<Axiom> {
    axioms.into_iter().filter(|axiom| keep(axiom)).collect()
}

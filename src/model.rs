//! The statement model exchanged between guarded ontologies and their delegates.
//!
//! Nothing in here knows about locking. The types are plain values: cheap to clone,
//! totally ordered, and hashable so that delegates can keep them in sets and indexes.

use std::{
    collections::BTreeSet,
    fmt::{self, Debug, Display, Formatter},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

#[cfg(test)]
mod tests;

/// An internationalized resource identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Iri(Arc<str>);

impl Iri {
    pub fn new(iri: impl Into<Arc<str>>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Iri {
    fn from(iri: &str) -> Self {
        Self::new(iri)
    }
}

impl From<String> for Iri {
    fn from(iri: String) -> Self {
        Self::new(iri)
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl Debug for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Identity of an ontology document.
///
/// Anonymous ids are unique per process; two calls to [`OntologyId::anonymous`] never
/// return equal ids.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OntologyId {
    Anonymous(u64),
    Named { name: Iri, version: Option<Iri> },
}

impl OntologyId {
    pub fn anonymous() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self::Anonymous(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn named(name: impl Into<Iri>) -> Self {
        Self::Named {
            name: name.into(),
            version: None,
        }
    }

    pub fn versioned(name: impl Into<Iri>, version: impl Into<Iri>) -> Self {
        Self::Named {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous(_))
    }

    pub fn name(&self) -> Option<&Iri> {
        match self {
            Self::Anonymous(_) => None,
            Self::Named { name, .. } => Some(name),
        }
    }

    pub fn version(&self) -> Option<&Iri> {
        match self {
            Self::Anonymous(_) => None,
            Self::Named { version, .. } => version.as_ref(),
        }
    }

    /// The IRI an import declaration uses to refer to this ontology: the version IRI if
    /// there is one, otherwise the name.
    pub fn document_iri(&self) -> Option<&Iri> {
        self.version().or_else(|| self.name())
    }

    /// Returns whether an import of `iri` refers to this ontology.
    pub fn matches_document(&self, iri: &Iri) -> bool {
        self.name() == Some(iri) || self.version() == Some(iri)
    }
}

impl Display for OntologyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous(n) => write!(f, "Anonymous-{n}"),
            Self::Named {
                name,
                version: None,
            } => Display::fmt(name, f),
            Self::Named {
                name,
                version: Some(version),
            } => write!(f, "{name} {version}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Class,
    ObjectProperty,
    DataProperty,
    AnnotationProperty,
    NamedIndividual,
    Datatype,
}

impl EntityKind {
    fn keyword(self) -> &'static str {
        match self {
            Self::Class => "Class",
            Self::ObjectProperty => "ObjectProperty",
            Self::DataProperty => "DataProperty",
            Self::AnnotationProperty => "AnnotationProperty",
            Self::NamedIndividual => "NamedIndividual",
            Self::Datatype => "Datatype",
        }
    }
}

/// A named entity of a signature.
///
/// The same IRI may name entities of several kinds ("punning").
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    pub kind: EntityKind,
    pub iri: Iri,
}

impl Entity {
    pub fn new(kind: EntityKind, iri: impl Into<Iri>) -> Self {
        Self {
            kind,
            iri: iri.into(),
        }
    }

    pub fn class(iri: impl Into<Iri>) -> Self {
        Self::new(EntityKind::Class, iri)
    }

    pub fn object_property(iri: impl Into<Iri>) -> Self {
        Self::new(EntityKind::ObjectProperty, iri)
    }

    pub fn data_property(iri: impl Into<Iri>) -> Self {
        Self::new(EntityKind::DataProperty, iri)
    }

    pub fn annotation_property(iri: impl Into<Iri>) -> Self {
        Self::new(EntityKind::AnnotationProperty, iri)
    }

    pub fn individual(iri: impl Into<Iri>) -> Self {
        Self::new(EntityKind::NamedIndividual, iri)
    }

    pub fn datatype(iri: impl Into<Iri>) -> Self {
        Self::new(EntityKind::Datatype, iri)
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.keyword(), self.iri)
    }
}

/// An operand of an axiom.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Entity(Entity),
    Literal(String),
}

impl Term {
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            Self::Literal(_) => None,
        }
    }
}

impl From<Entity> for Term {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(entity) => Display::fmt(&entity.iri, f),
            Self::Literal(literal) => write!(f, "{literal:?}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Annotation {
    pub property: Iri,
    pub value: String,
}

impl Annotation {
    pub fn new(property: impl Into<Iri>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl Display for Annotation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Annotation({} {:?})", self.property, self.value)
    }
}

/// A reference from one ontology document to another.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportDeclaration(pub Iri);

impl ImportDeclaration {
    pub fn new(iri: impl Into<Iri>) -> Self {
        Self(iri.into())
    }

    pub fn iri(&self) -> &Iri {
        &self.0
    }
}

impl Display for ImportDeclaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Import({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AxiomCategory {
    /// Axioms about classes.
    TBox,
    /// Axioms about properties.
    RBox,
    /// Axioms about individuals.
    ABox,
    /// Declarations and annotation assertions.
    NonLogical,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AxiomKind {
    Declaration,
    SubClassOf,
    EquivalentClasses,
    DisjointClasses,
    SubObjectPropertyOf,
    ObjectPropertyDomain,
    ObjectPropertyRange,
    SubDataPropertyOf,
    DataPropertyDomain,
    DataPropertyRange,
    ClassAssertion,
    ObjectPropertyAssertion,
    DataPropertyAssertion,
    SameIndividual,
    DifferentIndividuals,
    AnnotationAssertion,
}

impl AxiomKind {
    pub const ALL: [AxiomKind; 16] = [
        Self::Declaration,
        Self::SubClassOf,
        Self::EquivalentClasses,
        Self::DisjointClasses,
        Self::SubObjectPropertyOf,
        Self::ObjectPropertyDomain,
        Self::ObjectPropertyRange,
        Self::SubDataPropertyOf,
        Self::DataPropertyDomain,
        Self::DataPropertyRange,
        Self::ClassAssertion,
        Self::ObjectPropertyAssertion,
        Self::DataPropertyAssertion,
        Self::SameIndividual,
        Self::DifferentIndividuals,
        Self::AnnotationAssertion,
    ];

    pub fn category(self) -> AxiomCategory {
        match self {
            Self::SubClassOf | Self::EquivalentClasses | Self::DisjointClasses => {
                AxiomCategory::TBox
            }
            Self::SubObjectPropertyOf
            | Self::ObjectPropertyDomain
            | Self::ObjectPropertyRange
            | Self::SubDataPropertyOf
            | Self::DataPropertyDomain
            | Self::DataPropertyRange => AxiomCategory::RBox,
            Self::ClassAssertion
            | Self::ObjectPropertyAssertion
            | Self::DataPropertyAssertion
            | Self::SameIndividual
            | Self::DifferentIndividuals => AxiomCategory::ABox,
            Self::Declaration | Self::AnnotationAssertion => AxiomCategory::NonLogical,
        }
    }

    pub fn is_logical(self) -> bool {
        self.category() != AxiomCategory::NonLogical
    }

    /// Minimum and maximum number of operands.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Declaration => (1, Some(1)),
            Self::EquivalentClasses
            | Self::DisjointClasses
            | Self::SameIndividual
            | Self::DifferentIndividuals => (2, None),
            Self::ObjectPropertyAssertion
            | Self::DataPropertyAssertion
            | Self::AnnotationAssertion => (3, Some(3)),
            _ => (2, Some(2)),
        }
    }

    /// Whether the last operand may (and must) be a literal.
    fn ends_in_literal(self) -> bool {
        matches!(self, Self::DataPropertyAssertion | Self::AnnotationAssertion)
    }

    /// Whether the second operand names the asserted property.
    fn has_predicate(self) -> bool {
        matches!(
            self,
            Self::ObjectPropertyAssertion | Self::DataPropertyAssertion | Self::AnnotationAssertion
        )
    }
}

impl Display for AxiomKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A single statement of an ontology.
///
/// Two axioms are equal if their kinds, operands and annotations are equal.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Axiom {
    kind: AxiomKind,
    operands: Vec<Term>,
    annotations: BTreeSet<Annotation>,
}

impl Axiom {
    pub fn new(kind: AxiomKind, operands: impl IntoIterator<Item = Term>) -> Self {
        Self {
            kind,
            operands: operands.into_iter().collect(),
            annotations: BTreeSet::new(),
        }
    }

    pub fn declaration(entity: Entity) -> Self {
        Self::new(AxiomKind::Declaration, [entity.into()])
    }

    pub fn sub_class_of(sub: Entity, sup: Entity) -> Self {
        Self::new(AxiomKind::SubClassOf, [sub.into(), sup.into()])
    }

    pub fn class_assertion(individual: Entity, class: Entity) -> Self {
        Self::new(AxiomKind::ClassAssertion, [individual.into(), class.into()])
    }

    pub fn object_property_assertion(subject: Entity, property: Entity, object: Entity) -> Self {
        Self::new(
            AxiomKind::ObjectPropertyAssertion,
            [subject.into(), property.into(), object.into()],
        )
    }

    pub fn data_property_assertion(
        subject: Entity,
        property: Entity,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            AxiomKind::DataPropertyAssertion,
            [subject.into(), property.into(), Term::Literal(value.into())],
        )
    }

    pub fn annotation_assertion(
        subject: Entity,
        property: Entity,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            AxiomKind::AnnotationAssertion,
            [subject.into(), property.into(), Term::Literal(value.into())],
        )
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.insert(annotation);
        self
    }

    pub fn kind(&self) -> AxiomKind {
        self.kind
    }

    pub fn category(&self) -> AxiomCategory {
        self.kind.category()
    }

    pub fn is_logical(&self) -> bool {
        self.kind.is_logical()
    }

    pub fn operands(&self) -> &[Term] {
        &self.operands
    }

    pub fn annotations(&self) -> &BTreeSet<Annotation> {
        &self.annotations
    }

    /// The entity this axiom is about: its first operand.
    pub fn subject(&self) -> Option<&Entity> {
        self.operands.first().and_then(Term::as_entity)
    }

    /// The asserted property of a property or annotation assertion.
    pub fn predicate(&self) -> Option<&Entity> {
        if self.kind.has_predicate() {
            self.operands.get(1).and_then(Term::as_entity)
        } else {
            None
        }
    }

    /// The entity at the far end of a binary or ternary axiom: the superclass of a
    /// `SubClassOf`, the class of a `ClassAssertion`, the target of an object property
    /// assertion.
    ///
    /// Declarations, axioms over a set of operands and assertions ending in a literal
    /// have no object.
    pub fn object(&self) -> Option<&Entity> {
        match self.kind.arity() {
            (_, Some(max)) if max >= 2 => self.operands.last().and_then(Term::as_entity),
            _ => None,
        }
    }

    /// The entity at the end `navigation` selects.
    pub fn in_position(&self, navigation: Navigation) -> Option<&Entity> {
        match navigation {
            Navigation::InSubPosition => self.subject(),
            Navigation::InSuperPosition => self.object(),
        }
    }

    /// The entities this axiom mentions, in operand order.
    pub fn signature(&self) -> impl Iterator<Item = &Entity> {
        self.operands.iter().filter_map(Term::as_entity)
    }

    pub fn references(&self, entity: &Entity) -> bool {
        self.signature().any(|e| e == entity)
    }

    /// Returns this axiom with its annotations stripped.
    pub fn without_annotations(&self) -> Axiom {
        Axiom {
            kind: self.kind,
            operands: self.operands.clone(),
            annotations: BTreeSet::new(),
        }
    }

    /// Returns whether both axioms are equal once annotations are ignored.
    pub fn equals_ignoring_annotations(&self, other: &Axiom) -> bool {
        self.kind == other.kind && self.operands == other.operands
    }

    /// Checks the operand count and literal positions for this axiom's kind.
    pub fn is_well_formed(&self) -> bool {
        let (min, max) = self.kind.arity();
        let len = self.operands.len();
        if len < min || max.is_some_and(|max| len > max) {
            return false;
        }
        let last = len - 1;
        self.operands.iter().enumerate().all(|(i, term)| {
            let literal = matches!(term, Term::Literal(_));
            if i == last && self.kind.ends_in_literal() {
                literal
            } else {
                !literal
            }
        })
    }
}

impl Display for Axiom {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind)?;
        for annotation in &self.annotations {
            write!(f, "{annotation} ")?;
        }
        if self.kind == AxiomKind::Declaration {
            if let Some(entity) = self.subject() {
                Display::fmt(entity, f)?;
            }
        } else {
            for (i, operand) in self.operands.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                Display::fmt(operand, f)?;
            }
        }
        f.write_str(")")
    }
}

/// Whether a query covers only the ontology itself or its imports closure as well.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Imports {
    Included,
    #[default]
    Excluded,
}

/// Whether containment checks compare axiom annotations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AxiomAnnotations {
    #[default]
    Consider,
    Ignore,
}

/// Which end of an axiom a positional query matches.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Navigation {
    /// The [subject](Axiom::subject), e.g. the subclass of a `SubClassOf`.
    InSubPosition,
    /// The [object](Axiom::object), e.g. the superclass of a `SubClassOf`.
    InSuperPosition,
}

/// A single edit request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Change {
    AddAxiom(Axiom),
    RemoveAxiom(Axiom),
    AddImport(ImportDeclaration),
    RemoveImport(ImportDeclaration),
    AddAnnotation(Annotation),
    RemoveAnnotation(Annotation),
    SetOntologyId(OntologyId),
}

impl Change {
    pub fn is_axiom_change(&self) -> bool {
        matches!(self, Self::AddAxiom(_) | Self::RemoveAxiom(_))
    }

    pub fn axiom(&self) -> Option<&Axiom> {
        match self {
            Self::AddAxiom(axiom) | Self::RemoveAxiom(axiom) => Some(axiom),
            _ => None,
        }
    }
}

impl Display for Change {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddAxiom(axiom) => write!(f, "AddAxiom({axiom})"),
            Self::RemoveAxiom(axiom) => write!(f, "RemoveAxiom({axiom})"),
            Self::AddImport(import) => write!(f, "AddImport({import})"),
            Self::RemoveImport(import) => write!(f, "RemoveImport({import})"),
            Self::AddAnnotation(annotation) => write!(f, "AddOntologyAnnotation({annotation})"),
            Self::RemoveAnnotation(annotation) => {
                write!(f, "RemoveOntologyAnnotation({annotation})")
            }
            Self::SetOntologyId(id) => write!(f, "SetOntologyID({id})"),
        }
    }
}

/// An ordered batch of changes submitted together.
pub type ChangeList = Vec<Change>;

/// Outcome of a mutation request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeApplied {
    /// The document changed.
    Applied,
    /// The document was already in the requested state.
    NoOperation,
    /// The delegate rejected the request.
    Unsuccessful,
}

impl ChangeApplied {
    /// Combines the outcomes of two parts of one batch.
    ///
    /// `Unsuccessful` dominates, then `Applied`.
    pub fn merge(self, other: ChangeApplied) -> ChangeApplied {
        use ChangeApplied::*;
        match (self, other) {
            (Unsuccessful, _) | (_, Unsuccessful) => Unsuccessful,
            (Applied, _) | (_, Applied) => Applied,
            (NoOperation, NoOperation) => NoOperation,
        }
    }
}

use crate::{
    Annotation, Axiom, AxiomCategory, AxiomKind, Change, ChangeApplied, Entity, Iri,
    Navigation, OntologyId, Term,
};

const PETS: &str = "http://example.org/pets";

fn cat() -> Entity {
    Entity::class("http://example.org/pets#Cat")
}

fn animal() -> Entity {
    Entity::class("http://example.org/pets#Animal")
}

fn tom() -> Entity {
    Entity::individual("http://example.org/pets#Tom")
}

#[test]
fn anonymous_ids_are_unique() {
    let a = OntologyId::anonymous();
    let b = OntologyId::anonymous();
    assert_ne!(a, b);
    assert!(a.is_anonymous());
    assert_eq!(a.name(), None);
    assert_eq!(a.document_iri(), None);
}

#[test]
fn document_iri_prefers_version() {
    let plain = OntologyId::named(PETS);
    assert_eq!(plain.document_iri(), Some(&Iri::from(PETS)));
    let versioned = OntologyId::versioned(PETS, "http://example.org/pets/2.0");
    assert_eq!(
        versioned.document_iri().map(Iri::as_str),
        Some("http://example.org/pets/2.0"),
    );
    assert!(versioned.matches_document(&Iri::from(PETS)));
    assert!(!versioned.matches_document(&Iri::from("http://example.org/other")));
    assert_eq!(
        versioned.to_string(),
        "<http://example.org/pets> <http://example.org/pets/2.0>"
    );
}

#[test]
fn categories() {
    assert_eq!(AxiomKind::SubClassOf.category(), AxiomCategory::TBox);
    assert_eq!(AxiomKind::ObjectPropertyRange.category(), AxiomCategory::RBox);
    assert_eq!(AxiomKind::ClassAssertion.category(), AxiomCategory::ABox);
    assert!(!AxiomKind::Declaration.is_logical());
    assert!(!AxiomKind::AnnotationAssertion.is_logical());
    let logical = AxiomKind::ALL.iter().filter(|k| k.is_logical()).count();
    assert_eq!(logical, AxiomKind::ALL.len() - 2);
}

#[test]
fn subject_and_predicate() {
    let name = Entity::data_property("http://example.org/pets#name");
    let axiom = Axiom::data_property_assertion(tom(), name.clone(), "Tom");
    assert_eq!(axiom.subject(), Some(&tom()));
    assert_eq!(axiom.predicate(), Some(&name));
    assert_eq!(axiom.signature().count(), 2);

    let sub = Axiom::sub_class_of(cat(), animal());
    assert_eq!(sub.subject(), Some(&cat()));
    assert_eq!(sub.predicate(), None);
    assert!(sub.references(&animal()));
    assert!(!sub.references(&tom()));
}

#[test]
fn object_position() {
    let sub = Axiom::sub_class_of(cat(), animal());
    assert_eq!(sub.object(), Some(&animal()));
    assert_eq!(sub.in_position(Navigation::InSubPosition), Some(&cat()));
    assert_eq!(sub.in_position(Navigation::InSuperPosition), Some(&animal()));

    let owner = Entity::object_property("http://example.org/pets#owner");
    let jerry = Entity::individual("http://example.org/pets#Jerry");
    let assertion = Axiom::object_property_assertion(tom(), owner, jerry.clone());
    assert_eq!(assertion.object(), Some(&jerry));
    assert_eq!(Axiom::class_assertion(tom(), cat()).object(), Some(&cat()));

    assert_eq!(Axiom::declaration(cat()).object(), None);
    assert_eq!(
        Axiom::data_property_assertion(tom(), Entity::data_property("p"), "Tom").object(),
        None
    );
    let equivalent = Axiom::new(AxiomKind::EquivalentClasses, [cat().into(), animal().into()]);
    assert_eq!(equivalent.object(), None);
    assert_eq!(equivalent.in_position(Navigation::InSubPosition), Some(&cat()));
}

#[test]
fn well_formed() {
    assert!(Axiom::declaration(cat()).is_well_formed());
    assert!(Axiom::sub_class_of(cat(), animal()).is_well_formed());
    assert!(
        Axiom::data_property_assertion(tom(), Entity::data_property("p"), "x").is_well_formed()
    );
    assert!(!Axiom::new(AxiomKind::SubClassOf, [cat().into()]).is_well_formed());
    assert!(!Axiom::new(AxiomKind::Declaration, []).is_well_formed());
    assert!(
        !Axiom::new(
            AxiomKind::SubClassOf,
            [cat().into(), Term::Literal("Animal".into())]
        )
        .is_well_formed()
    );
    // Data assertions must end in a literal.
    assert!(
        !Axiom::new(
            AxiomKind::DataPropertyAssertion,
            [tom().into(), Entity::data_property("p").into(), tom().into()],
        )
        .is_well_formed()
    );
    assert!(
        Axiom::new(
            AxiomKind::EquivalentClasses,
            [cat().into(), animal().into(), Entity::class("c").into()]
        )
        .is_well_formed()
    );
}

#[test]
fn annotations_and_equality() {
    let plain = Axiom::sub_class_of(cat(), animal());
    let annotated = plain
        .clone()
        .with_annotation(Annotation::new("http://www.w3.org/2000/01/rdf-schema#comment", "x"));
    assert_ne!(plain, annotated);
    assert!(plain.equals_ignoring_annotations(&annotated));
    assert_eq!(annotated.without_annotations(), plain);
}

#[test]
fn display() {
    assert_eq!(
        Axiom::declaration(cat()).to_string(),
        "Declaration(Class(<http://example.org/pets#Cat>))"
    );
    assert_eq!(
        Change::AddAxiom(Axiom::sub_class_of(cat(), animal())).to_string(),
        "AddAxiom(SubClassOf(<http://example.org/pets#Cat> <http://example.org/pets#Animal>))"
    );
}

#[test]
fn merge() {
    use ChangeApplied::*;
    assert_eq!(NoOperation.merge(NoOperation), NoOperation);
    assert_eq!(NoOperation.merge(Applied), Applied);
    assert_eq!(Applied.merge(NoOperation), Applied);
    assert_eq!(Applied.merge(Unsuccessful), Unsuccessful);
    assert_eq!(Unsuccessful.merge(NoOperation), Unsuccessful);
}

//! End-to-end tests of the composition surface through the SDK facade.

use std::sync::Arc;

use ensemble_sdk::{ArgMap, ClassBuilder, Composer, EnsembleError, ParamRule, TypeTag, Value};

/// Person with a required name; Family eagerly contains a mother and
/// delays a youngest child.
fn family_composer() -> Composer {
    let mut composer = Composer::new();
    ClassBuilder::new("Person")
        .param("name", ParamRule::required().of_type(TypeTag::String))
        .param(
            "hair",
            ParamRule::optional().with_default(serde_json::json!("brown")),
        )
        .register(&mut composer)
        .expect("declare Person");
    ClassBuilder::new("Family")
        .param("surname", ParamRule::required())
        .contains("mother", "Person")
        .delayed("youngest", "Person")
        .register(&mut composer)
        .expect("declare Family");
    composer
}

fn overridable_composer() -> Composer {
    let mut composer = Composer::new();
    ClassBuilder::new("Child")
        .param("bar", ParamRule::required())
        .register(&mut composer)
        .expect("declare Child");
    ClassBuilder::new("OtherChild")
        .param("baz", ParamRule::required())
        .register(&mut composer)
        .expect("declare OtherChild");
    ClassBuilder::new("Top")
        .param("foo", ParamRule::required())
        .contains("child", "Child")
        .register(&mut composer)
        .expect("declare Top");
    composer
}

#[test]
fn flat_bag_routes_arguments_across_the_graph() {
    let composer = family_composer();
    let mut args = ArgMap::new();
    let _ = args.insert("surname".into(), Value::string("Simpson"));
    let _ = args.insert("name".into(), Value::string("Marge"));
    let _ = args.insert("hair".into(), Value::string("blue"));

    let family = composer.construct("Family", args).expect("construct");
    assert_eq!(family.field("surname"), Some(&Value::string("Simpson")));

    let mother = family
        .field("mother")
        .and_then(Value::as_instance)
        .expect("mother");
    assert_eq!(mother.class().as_str(), "Person");
    assert_eq!(mother.field("name"), Some(&Value::string("Marge")));
    assert_eq!(mother.field("hair"), Some(&Value::string("blue")));
}

#[test]
fn missing_contained_requirement_is_attributed_to_the_contained_class() {
    let composer = family_composer();
    let mut args = ArgMap::new();
    let _ = args.insert("surname".into(), Value::string("Simpson"));

    let err = composer.construct("Family", args).unwrap_err();
    match err {
        EnsembleError::Validation { class, param, .. } => {
            assert_eq!(class, "Person");
            assert_eq!(param, "name");
        }
        other => panic!("expected validation error, got: {other}"),
    }
}

#[test]
fn class_override_changes_target_and_accepted_parameters() {
    let composer = overridable_composer();

    let mut args = ArgMap::new();
    let _ = args.insert("foo".into(), Value::string("F"));
    let _ = args.insert("child_class".into(), Value::string("OtherChild"));
    let _ = args.insert("baz".into(), Value::string("Z"));
    let top = composer.construct("Top", args).expect("construct");
    assert_eq!(
        composer
            .contained_class(&top, "child")
            .expect("slot")
            .as_str(),
        "OtherChild"
    );

    let mut probe = ArgMap::new();
    let _ = probe.insert("child_class".into(), Value::string("OtherChild"));
    let allowed = composer
        .allowed_params("Top", Some(&probe))
        .expect("allowed");
    assert!(allowed.contains_key("baz"));
    assert!(allowed.contains_key("child_class"));
    assert!(!allowed.contains_key("bar"));
}

#[test]
fn delayed_slot_is_not_an_eager_field_and_rejects_injection() {
    let composer = family_composer();
    let mut args = ArgMap::new();
    let _ = args.insert("surname".into(), Value::string("Simpson"));
    let _ = args.insert("name".into(), Value::string("Marge"));
    let family = composer.construct("Family", args).expect("construct");

    assert!(family.field("youngest").is_none());
    assert_eq!(
        composer
            .delayed_object_class(&family, "youngest")
            .expect("slot")
            .as_str(),
        "Person"
    );

    // Supplying a pre-built object for a delayed slot is structural
    // misuse.
    let mut bad = ArgMap::new();
    let _ = bad.insert("surname".into(), Value::string("Simpson"));
    let _ = bad.insert("name".into(), Value::string("Marge"));
    let _ = bad.insert("youngest".into(), Value::string("anything"));
    let err = composer.construct("Family", bad).unwrap_err();
    assert!(matches!(err, EnsembleError::Composition { .. }), "got: {err}");
}

#[test]
fn repeated_delayed_creation_yields_independent_objects() {
    let composer = family_composer();
    let mut args = ArgMap::new();
    let _ = args.insert("surname".into(), Value::string("Simpson"));
    let _ = args.insert("name".into(), Value::string("Marge"));
    let family = composer.construct("Family", args).expect("construct");

    let mut name = ArgMap::new();
    let _ = name.insert("name".into(), Value::string("Maggie"));
    let first = composer
        .create_delayed_object(&family, "youngest", Some(name.clone()))
        .expect("first");
    let second = composer
        .create_delayed_object(&family, "youngest", Some(name))
        .expect("second");

    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.id(), second.id());
    // Each sibling carries its own back-reference payload, both pointing
    // at the same parent.
    let first_parent = first.container().expect("parent");
    let second_parent = second.container().expect("parent");
    assert!(Arc::ptr_eq(&first_parent, &family));
    assert!(Arc::ptr_eq(&second_parent, &family));
}

#[test]
fn back_reference_is_non_owning() {
    let composer = family_composer();
    let mut args = ArgMap::new();
    let _ = args.insert("surname".into(), Value::string("Simpson"));
    let _ = args.insert("name".into(), Value::string("Marge"));
    let family = composer.construct("Family", args).expect("construct");

    let mut name = ArgMap::new();
    let _ = name.insert("name".into(), Value::string("Maggie"));
    let child = composer
        .create_delayed_object(&family, "youngest", Some(name))
        .expect("child");

    assert!(child.container().is_some());
    drop(family);
    assert!(child.container().is_none());
}

#[test]
fn delayed_args_round_trip_through_patch() {
    let composer = family_composer();
    let mut args = ArgMap::new();
    let _ = args.insert("surname".into(), Value::string("Simpson"));
    let _ = args.insert("name".into(), Value::string("Marge"));
    let family = composer.construct("Family", args).expect("construct");

    let mut patch = ArgMap::new();
    let _ = patch.insert("name".into(), Value::string("Lisa"));
    let _ = patch.insert("hair".into(), Value::string("red"));
    let stored = composer
        .delayed_object_params(&family, "youngest", Some(patch))
        .expect("patch");
    assert_eq!(stored.get("hair"), Some(&Value::string("red")));

    let youngest = composer
        .create_delayed_object(&family, "youngest", None)
        .expect("create");
    assert_eq!(youngest.field("hair"), Some(&Value::string("red")));
    assert_eq!(youngest.field("name"), Some(&Value::string("Lisa")));
}

#[test]
fn recursive_delayed_containment_constructs_and_materializes() {
    let mut composer = Composer::new();
    ClassBuilder::new("Person")
        .param("name", ParamRule::required().of_type(TypeTag::String))
        .delayed("daughter", "Person")
        .register(&mut composer)
        .expect("declare Person");

    let allowed = composer.allowed_params("Person", None).expect("allowed");
    assert!(allowed.contains_key("name"));

    let mut args = ArgMap::new();
    let _ = args.insert("name".into(), Value::string("Marge"));
    let marge = composer.construct("Person", args).expect("construct parent");
    assert_eq!(
        composer
            .delayed_object_class(&marge, "daughter")
            .expect("slot")
            .as_str(),
        "Person"
    );

    // Each generation carries the same delayed slot, so the chain can be
    // materialized indefinitely.
    let mut name = ArgMap::new();
    let _ = name.insert("name".into(), Value::string("Lisa"));
    let lisa = composer
        .create_delayed_object(&marge, "daughter", Some(name))
        .expect("construct child");
    assert_eq!(lisa.field("name"), Some(&Value::string("Lisa")));
    assert!(Arc::ptr_eq(&lisa.container().expect("parent"), &marge));

    let mut grandchild = ArgMap::new();
    let _ = grandchild.insert("name".into(), Value::string("Zia"));
    let zia = composer
        .create_delayed_object(&lisa, "daughter", Some(grandchild))
        .expect("construct grandchild");
    assert_eq!(zia.field("name"), Some(&Value::string("Zia")));
}

#[test]
fn subclass_containment_override_wins() {
    let mut composer = Composer::new();
    ClassBuilder::new("Engine")
        .register(&mut composer)
        .expect("declare Engine");
    ClassBuilder::new("TurboEngine")
        .extends("Engine")
        .register(&mut composer)
        .expect("declare TurboEngine");
    ClassBuilder::new("Vehicle")
        .contains("engine", "Engine")
        .register(&mut composer)
        .expect("declare Vehicle");
    ClassBuilder::new("SportsCar")
        .extends("Vehicle")
        .contains("engine", "TurboEngine")
        .register(&mut composer)
        .expect("declare SportsCar");

    let car = composer
        .construct("SportsCar", ArgMap::new())
        .expect("construct");
    assert_eq!(
        composer
            .contained_class(&car, "engine")
            .expect("slot")
            .as_str(),
        "TurboEngine"
    );

    let base = composer.construct("Vehicle", ArgMap::new()).expect("construct");
    assert_eq!(
        composer
            .contained_class(&base, "engine")
            .expect("slot")
            .as_str(),
        "Engine"
    );
}

#[test]
fn redeclaration_is_visible_on_the_next_call() {
    let mut composer = family_composer();
    let before = composer.allowed_params("Family", None).expect("before");
    assert!(before.contains_key("hair"));

    composer
        .declare_params(
            "Person",
            ensemble_sdk::Declaration::Set(
                [("name".to_string(), ParamRule::required())]
                    .into_iter()
                    .collect(),
            ),
        )
        .expect("redeclare Person");

    let after = composer.allowed_params("Family", None).expect("after");
    assert!(!after.contains_key("hair"));
    assert!(after.contains_key("name"));
}

#[test]
fn show_containers_renders_declared_and_actual_trees() {
    let composer = family_composer();
    let declared = composer
        .show_containers_class("Family")
        .expect("class tree");
    assert!(declared.starts_with("Family\n"));
    assert!(declared.contains("  mother -> Person"));
    assert!(declared.contains("  youngest -> Person (delayed)"));

    let mut args = ArgMap::new();
    let _ = args.insert("surname".into(), Value::string("Simpson"));
    let _ = args.insert("name".into(), Value::string("Marge"));
    let family = composer.construct("Family", args).expect("construct");
    let actual = composer.show_containers(&family);
    assert!(actual.starts_with("Family\n"));
    assert!(actual.contains("  mother -> Person"));
    assert!(actual.contains("  youngest -> Person (delayed)"));
}

#[test]
fn all_specs_reflects_every_declaration() {
    let composer = family_composer();
    let dump = composer.all_specs();
    assert_eq!(dump["Person"]["valid_params"]["name"]["required"], true);
    assert_eq!(dump["Person"]["valid_params"]["hair"]["default"], "brown");
    assert_eq!(
        dump["Family"]["contained_objects"]["youngest"]["delayed"],
        true
    );
}

//! Schema evolution: a Person model that went through three shapes.
//!
//! v1 `{ full_name }`, v2 `{ full_name, initials }` with initials derived
//! from the name, v3 `{ name, initials }` renaming the first field.

use std::sync::Arc;

use shapewire::codec::Writer;
use shapewire::error::Operation;
use shapewire::{
    DataError, ModelDef, ObjectValue, Registry, SchemaError, SerializeError, Serializer,
    SerializerOptions, TypeInfoEmission, TypeRef, Value,
};

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect()
}

fn person_v1() -> ModelDef {
    ModelDef::builder("PersonV1")
        .historical_of("Person", 1)
        .field(0, "full_name", TypeRef::text())
        .build()
        .unwrap()
}

fn person_v2(version: u32) -> ModelDef {
    ModelDef::builder("PersonV2")
        .historical_of("Person", version)
        .field(0, "full_name", TypeRef::text())
        .field(1, "initials", TypeRef::text())
        .migrate_from_previous(|mut old: ObjectValue| {
            let full_name = old.take(0);
            let derived = initials(full_name.as_str().unwrap_or_default());
            Ok(ObjectValue::new("PersonV2", vec![full_name, derived.into()]))
        })
        .build()
        .unwrap()
}

fn person_v3() -> ModelDef {
    ModelDef::builder("Person")
        .sealed()
        .version(3)
        .history(["PersonV1", "PersonV2"])
        .field(0, "name", TypeRef::text())
        .field(1, "initials", TypeRef::text())
        .migrate_from_previous(|mut old: ObjectValue| {
            Ok(ObjectValue::new("Person", vec![old.take(0), old.take(1)]))
        })
        .build()
        .unwrap()
}

fn serializer_with(defs: Vec<ModelDef>) -> Serializer {
    let registry = Registry::new();
    registry.register_all(defs).unwrap();
    Serializer::new(Arc::new(registry))
}

fn serializer() -> Serializer {
    serializer_with(vec![person_v1(), person_v2(2), person_v3()])
}

fn person(name: &str, initials: &str) -> Value {
    Value::Object(ObjectValue::new("Person", vec![name.into(), initials.into()]))
}

fn header(writer: &mut Writer, version: i32) {
    writer.write_byte(3);
    writer.write_string("Person");
    writer.write_zigzag32(version);
}

#[test]
fn test_v1_data_migrates_to_current() {
    let serializer = serializer();
    let ty = TypeRef::named("Person");
    let old = Value::Object(ObjectValue::new("PersonV1", vec!["Ada Lovelace".into()]));

    let bytes = serializer.to_bytes(&old, &ty).unwrap();
    // Historical shapes are written under the logical name with their version.
    assert_eq!(bytes[..9], [3, 6, b'P', b'e', b'r', b's', b'o', b'n', 2]);

    assert_eq!(serializer.from_bytes(&bytes, &ty).unwrap(), person("Ada Lovelace", "AL"));
}

#[test]
fn test_v2_data_keeps_stored_fields() {
    let serializer = serializer();
    let mut writer = Writer::new();
    header(&mut writer, 2);
    writer.write_byte(2);
    writer.write_byte(2);
    writer.write_string("Grace Hopper");
    writer.write_byte(2);
    writer.write_string("RADM");

    let decoded = serializer
        .from_bytes(writer.as_bytes(), &TypeRef::named("Person"))
        .unwrap();
    assert_eq!(decoded, person("Grace Hopper", "RADM"));
}

#[test]
fn test_current_version_roundtrips_without_migration() {
    let serializer = serializer();
    let ty = TypeRef::named("Person");
    let current = person("Alan Turing", "AT");

    let bytes = serializer.to_bytes(&current, &ty).unwrap();
    assert_eq!(bytes[0], 2, "sealed exact match carries no header");
    assert_eq!(serializer.from_bytes(&bytes, &ty).unwrap(), current);

    let always = serializer
        .clone()
        .with_options(SerializerOptions::default().with_type_info(TypeInfoEmission::Always));
    let bytes = always.to_bytes(&current, &ty).unwrap();
    assert_eq!(bytes[..9], [3, 6, b'P', b'e', b'r', b's', b'o', b'n', 6]);
    assert_eq!(always.from_bytes(&bytes, &TypeRef::Any).unwrap(), current);
}

#[test]
fn test_unversioned_header_reads_current_shape() {
    let serializer = serializer();
    let mut writer = Writer::new();
    header(&mut writer, 0);
    writer.write_byte(2);
    writer.write_byte(2);
    writer.write_string("Edsger Dijkstra");
    writer.write_byte(1);

    let decoded = serializer.from_bytes(writer.as_bytes(), &TypeRef::Any).unwrap();
    assert_eq!(decoded, person("Edsger Dijkstra", ""));
}

#[test]
fn test_newer_version_rejected() {
    let serializer = serializer();
    let mut writer = Writer::new();
    header(&mut writer, 9);
    writer.write_byte(2);

    let err = serializer
        .from_bytes(writer.as_bytes(), &TypeRef::named("Person"))
        .unwrap_err();
    assert!(matches!(
        err,
        SerializeError::Data(DataError::UnsupportedVersion { version: 9, current: 3, .. })
    ));
    assert_eq!(err.code().code(), "D002");
}

#[test]
fn test_duplicate_historical_version_names_required_version() {
    let serializer = serializer_with(vec![person_v1(), person_v2(1), person_v3()]);
    let ty = TypeRef::named("Person");

    for _ in 0..2 {
        let err = serializer.to_bytes(&person("x", "x"), &ty).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::Schema(SchemaError::VersionNotConsecutive { expected: 2, found: 1, .. })
        ));
        assert!(err.to_string().contains("required version is 2"), "{err}");
        assert_eq!(err.code().code(), "S001");
    }
}

#[test]
fn test_missing_migration_rejected() {
    let v2 = ModelDef::builder("PersonV2")
        .historical_of("Person", 2)
        .field(0, "full_name", TypeRef::text())
        .field(1, "initials", TypeRef::text())
        .build()
        .unwrap();
    let serializer = serializer_with(vec![person_v1(), v2, person_v3()]);
    assert!(matches!(
        serializer.to_bytes(&person("x", "x"), &TypeRef::named("Person")),
        Err(SerializeError::Schema(SchemaError::MissingMigration { .. }))
    ));
}

#[test]
fn test_failing_migration_is_wrapped() {
    let v2 = ModelDef::builder("PersonV2")
        .historical_of("Person", 2)
        .field(0, "full_name", TypeRef::text())
        .field(1, "initials", TypeRef::text())
        .migrate_from_previous(|_old: ObjectValue| Err("name is not parseable".into()))
        .build()
        .unwrap();
    let serializer = serializer_with(vec![person_v1(), v2, person_v3()]);
    let ty = TypeRef::named("Person");
    let old = Value::Object(ObjectValue::new("PersonV1", vec!["?".into()]));
    let bytes = serializer.to_bytes(&old, &ty).unwrap();

    match serializer.from_bytes(&bytes, &ty) {
        Err(SerializeError::Failed {
            operation,
            type_name,
            source,
        }) => {
            assert_eq!(operation, Operation::Deserialize);
            assert_eq!(type_name, "PersonV2");
            assert_eq!(source.to_string(), "name is not parseable");
        }
        other => panic!("expected a wrapped failure, got {other:?}"),
    }
}

#[test]
fn test_historical_shape_rejected_in_unrelated_slot() {
    let serializer = serializer_with(vec![
        person_v1(),
        person_v2(2),
        person_v3(),
        ModelDef::builder("Company").sealed().build().unwrap(),
    ]);
    let old = Value::Object(ObjectValue::new("PersonV1", vec!["Ada".into()]));
    assert!(matches!(
        serializer.to_bytes(&old, &TypeRef::named("Company")),
        Err(SerializeError::Data(DataError::TypeMismatch { .. }))
    ));
}

#[test]
fn test_historical_shape_needs_header() {
    let never = serializer()
        .with_options(SerializerOptions::default().with_type_info(TypeInfoEmission::Never));
    let ty = TypeRef::named("Person");
    let old = Value::Object(ObjectValue::new("PersonV1", vec!["Ada".into()]));
    let err = never.to_bytes(&old, &ty).unwrap_err();
    assert!(matches!(
        err,
        SerializeError::Data(DataError::HeaderRequired { ref found, .. }) if found == "PersonV1"
    ));

    let current = person("Ada", "A");
    let bytes = never.to_bytes(&current, &ty).unwrap();
    assert_eq!(never.from_bytes(&bytes, &ty).unwrap(), current);
}

//! Writes contacts in an old shape and reads them back as the current model.
//!
//! Pass a file path to decode a stored contact instead.

use std::fs;

use shapewire::{
    DataError, FromValue, Model, ModelDef, ObjectValue, Registry, SchemaError, Serializer, ToValue,
    TypeDef, TypeRef, Value,
};

#[derive(Debug)]
struct Contact {
    name: String,
    emails: Vec<String>,
}

impl ToValue for Contact {
    fn type_ref() -> TypeRef {
        TypeRef::named("Contact")
    }

    fn to_value(&self) -> Value {
        Value::Object(ObjectValue::new(
            "Contact",
            vec![self.name.to_value(), self.emails.to_value()],
        ))
    }
}

impl FromValue for Contact {
    fn from_value(value: Value) -> Result<Self, DataError> {
        let mut object = value
            .into_object()
            .ok_or(DataError::ValueOutOfRange { context: "Contact" })?;
        Ok(Contact {
            name: String::from_value(object.take(0))?,
            emails: Vec::from_value(object.take(1))?,
        })
    }
}

impl Model for Contact {
    fn definition() -> Result<TypeDef, SchemaError> {
        Ok(ModelDef::builder("Contact")
            .sealed()
            .version(2)
            .history(["ContactV1"])
            .field(0, "name", TypeRef::text())
            .field(1, "emails", TypeRef::list(TypeRef::text()))
            .migrate_from_previous(|mut old: ObjectValue| {
                let email = old.take(1);
                let emails = match email {
                    Value::Text(address) if !address.is_empty() => vec![address],
                    _ => Vec::new(),
                };
                Ok(ObjectValue::new("Contact", vec![old.take(0), emails.to_value()]))
            })
            .build()?
            .into())
    }
}

fn format_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Text(s) => format!("{:?}", s),
        Value::Object(o) => {
            let fields: Vec<String> = o.fields.iter().map(format_value).collect();
            format!("{} {{ {} }}", o.type_name, fields.join(", "))
        }
        Value::Collection(c) => {
            let items: Vec<String> = c.items.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        other => format!("{:?}", other),
    }
}

fn main() {
    let registry = Registry::global();
    registry
        .register(
            ModelDef::builder("ContactV1")
                .historical_of("Contact", 1)
                .field(0, "name", TypeRef::text())
                .field(1, "email", TypeRef::text())
                .build()
                .expect("Invalid ContactV1"),
        )
        .expect("Failed to register ContactV1");
    registry
        .register_model::<Contact>()
        .expect("Failed to register Contact");

    let serializer = Serializer::global();

    let data = match std::env::args().nth(1) {
        Some(path) => {
            println!("Reading: {}", path);
            fs::read(&path).expect("Failed to read file")
        }
        None => {
            let old = Value::Object(ObjectValue::new(
                "ContactV1",
                vec!["Ann".into(), "ann@example.com".into()],
            ));
            serializer
                .to_bytes(&old, &Contact::type_ref())
                .expect("Failed to encode")
        }
    };
    println!("Payload: {} bytes", data.len());

    let raw = serializer
        .from_bytes(&data, &TypeRef::Any)
        .expect("Failed to decode");
    println!("\n=== Decoded ===");
    println!("{}", format_value(&raw));

    let contact: Contact = serializer.deserialize(&data).expect("Failed to decode contact");
    println!("\n=== Contact ===");
    println!("Name: {}", contact.name);
    for email in &contact.emails {
        println!("  - {}", email);
    }

    let current = serializer.serialize(&contact).expect("Failed to encode");
    println!("\nRe-encoded as current version: {} bytes", current.len());
}

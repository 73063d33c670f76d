//! Per-device-type register catalogs.
//!
//! A catalog is an ordered table of [`RegisterDescriptor`]s. Order matters:
//! it is the order of the question sent to the controller, the order of the
//! fields in its answer, and a ratio formula may only refer to a register
//! declared before it.

mod builtin;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::formula::Formula;

/// Width of one raw answer field, in hex characters.
pub const FIELD_WIDTH: usize = 8;

/// Catalog errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Unknown device type '{0}'")]
    UnknownDeviceType(String),

    #[error("Invalid register id '{0}': expected 4 + 2 hex digits, e.g. 3007.01")]
    InvalidId(String),

    #[error("Register {0} is declared more than once")]
    DuplicateId(String),

    #[error("Register {register} refers to {reference}, which is not declared before it")]
    ForwardReference { register: String, reference: String },

    #[error("Register {0} has no fields")]
    EmptyComposite(String),
}

/// How a register's 32-bit raw field is narrowed before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// Bits 31..16.
    HiU16,
    /// Bits 15..0.
    LoU16,
    /// The whole field.
    UInt32,
}

impl Encoding {
    /// Extract this encoding's value from a raw field.
    pub fn extract(self, raw: u32) -> u64 {
        match self {
            Encoding::HiU16 => u64::from(raw >> 16),
            Encoding::LoU16 => u64::from(raw & 0xFFFF),
            Encoding::UInt32 => u64::from(raw),
        }
    }
}

/// One named value decoded from a register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub unit: String,
    pub encoding: Encoding,
    pub calc: Formula,
}

impl FieldDescriptor {
    pub fn new(name: &str, unit: &str, encoding: Encoding, calc: Formula) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            encoding,
            calc,
        }
    }
}

/// A register and the values decoded from its raw field.
///
/// A register with more than one field is a composite: every field is
/// decoded from the same raw answer field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DescriptorDef")]
pub struct RegisterDescriptor {
    /// Canonical id, `HHHH.SS`.
    pub id: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RegisterDescriptor {
    /// A register with a single field.
    pub fn single(id: &str, name: &str, unit: &str, encoding: Encoding, calc: Formula) -> Self {
        Self {
            id: id.to_string(),
            fields: vec![FieldDescriptor::new(name, unit, encoding, calc)],
        }
    }

    /// A register decoded into several fields.
    pub fn composite(id: &str, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            id: id.to_string(),
            fields,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }
}

/// Accepted config shapes: `{id, name, unit, encoding, calc}` or `{id, fields: [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorDef {
    Composite {
        id: String,
        fields: Vec<FieldDescriptor>,
    },
    Single {
        id: String,
        #[serde(flatten)]
        field: FieldDescriptor,
    },
}

impl TryFrom<DescriptorDef> for RegisterDescriptor {
    type Error = CatalogError;

    fn try_from(def: DescriptorDef) -> Result<Self, Self::Error> {
        let (id, fields) = match def {
            DescriptorDef::Composite { id, fields } => (id, fields),
            DescriptorDef::Single { id, field } => (id, vec![field]),
        };
        Ok(Self {
            id: normalize_id(&id)?,
            fields,
        })
    }
}

/// Normalize a register id to `HHHH.SS`.
///
/// `"300705"`, `"3007 05"` and `"3007.05"` are the same register.
///
/// # Example
/// ```
/// use mqtt_bridge_mkv::catalog::normalize_id;
///
/// assert_eq!(normalize_id("30070b").unwrap(), "3007.0B");
/// assert!(normalize_id("3007.1").is_err());
/// ```
pub fn normalize_id(id: &str) -> Result<String, CatalogError> {
    let digits: String = id
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '_' | '-'))
        .collect::<String>()
        .to_ascii_uppercase();

    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CatalogError::InvalidId(id.to_string()));
    }

    Ok(format!("{}.{}", &digits[..4], &digits[4..]))
}

/// Check a catalog's internal consistency.
pub fn validate(descriptors: &[RegisterDescriptor]) -> Result<(), CatalogError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(descriptors.len());

    for descriptor in descriptors {
        if normalize_id(&descriptor.id)? != descriptor.id {
            return Err(CatalogError::InvalidId(descriptor.id.clone()));
        }
        if descriptor.fields.is_empty() {
            return Err(CatalogError::EmptyComposite(descriptor.id.clone()));
        }
        for field in &descriptor.fields {
            if let Some(reference) = field.calc.reference() {
                if !seen.contains(reference) {
                    return Err(CatalogError::ForwardReference {
                        register: descriptor.id.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
        if !seen.insert(&descriptor.id) {
            return Err(CatalogError::DuplicateId(descriptor.id.clone()));
        }
    }

    Ok(())
}

/// Device type name to register table.
///
/// Type names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: BTreeMap<String, Vec<RegisterDescriptor>>,
}

impl Catalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog with every built-in controller variant.
    pub fn with_builtin() -> Self {
        let mut types = BTreeMap::new();
        types.insert("GA15VS23A".to_string(), builtin::ga15vs23a());
        types.insert("GA15VP13".to_string(), builtin::ga15vp13());
        Self { types }
    }

    /// Add a device type, replacing any existing table of the same name.
    pub fn insert(
        &mut self,
        device_type: &str,
        descriptors: Vec<RegisterDescriptor>,
    ) -> Result<(), CatalogError> {
        validate(&descriptors)?;
        self.types.insert(type_key(device_type), descriptors);
        Ok(())
    }

    /// Add several device types.
    pub fn extend<I>(&mut self, custom: I) -> Result<(), CatalogError>
    where
        I: IntoIterator<Item = (String, Vec<RegisterDescriptor>)>,
    {
        for (device_type, descriptors) in custom {
            self.insert(&device_type, descriptors)?;
        }
        Ok(())
    }

    /// Ordered register table of a device type.
    pub fn lookup(&self, device_type: &str) -> Result<&[RegisterDescriptor], CatalogError> {
        self.types
            .get(&type_key(device_type))
            .map(Vec::as_slice)
            .ok_or_else(|| CatalogError::UnknownDeviceType(device_type.to_string()))
    }

    /// Register ids of a device type, in question order.
    pub fn question_ids(&self, device_type: &str) -> Result<Vec<&str>, CatalogError> {
        Ok(self
            .lookup(device_type)?
            .iter()
            .map(|d| d.id.as_str())
            .collect())
    }

    /// Known device type names (uppercased).
    pub fn device_types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

fn type_key(device_type: &str) -> String {
    device_type.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("3007.05").unwrap(), "3007.05");
        assert_eq!(normalize_id("300705").unwrap(), "3007.05");
        assert_eq!(normalize_id("3007 05").unwrap(), "3007.05");
        assert_eq!(normalize_id("3002.2a").unwrap(), "3002.2A");
        assert!(normalize_id("3007.0G").is_err());
        assert!(normalize_id("").is_err());
    }

    #[test]
    fn test_encoding_extract() {
        assert_eq!(Encoding::HiU16.extract(0x0001_0002), 1);
        assert_eq!(Encoding::LoU16.extract(0x0001_0002), 2);
        assert_eq!(Encoding::UInt32.extract(0xFFFF_FFFF), 4_294_967_295);
    }

    #[test]
    fn test_builtin_catalogs_are_valid() {
        let catalog = Catalog::with_builtin();
        let types: Vec<&str> = catalog.device_types().collect();
        assert_eq!(types, vec!["GA15VP13", "GA15VS23A"]);

        for device_type in types {
            validate(catalog.lookup(device_type).unwrap()).unwrap();
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = Catalog::with_builtin();
        let table = catalog.lookup("ga15vs23a").unwrap();
        assert_eq!(table[0].id, "3002.01");
        assert_eq!(table[0].fields[0].name, "Controller Temperature");

        assert_eq!(
            catalog.lookup("GA30").unwrap_err(),
            CatalogError::UnknownDeviceType("GA30".to_string())
        );
    }

    #[test]
    fn test_question_ids_keep_declaration_order() {
        let catalog = Catalog::with_builtin();
        let ids = catalog.question_ids("GA15VP13").unwrap();
        assert_eq!(&ids[..4], &["3002.01", "3002.03", "3002.05", "3002.08"]);
        assert_eq!(ids.last(), Some(&"3113.54"));
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let table = vec![
            RegisterDescriptor::single(
                "3007.05",
                "VSD 1-20",
                "%",
                Encoding::UInt32,
                Formula::ratio("3007.01", 100.0),
            ),
            RegisterDescriptor::single("3007.01", "Running Hours", "h", Encoding::UInt32, Formula::Divide(3600.0)),
        ];

        assert_eq!(
            validate(&table),
            Err(CatalogError::ForwardReference {
                register: "3007.05".to_string(),
                reference: "3007.01".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        let hours = RegisterDescriptor::single("3007.01", "Running Hours", "h", Encoding::UInt32, Formula::Identity);
        assert_eq!(
            validate(&[hours.clone(), hours]),
            Err(CatalogError::DuplicateId("3007.01".to_string()))
        );

        let empty = RegisterDescriptor::composite("3021.01", Vec::new());
        assert_eq!(
            validate(&[empty]),
            Err(CatalogError::EmptyComposite("3021.01".to_string()))
        );
    }

    #[test]
    fn test_custom_type_from_json() {
        let json = r#"[
            { "id": "300201", "name": "Outlet", "unit": "bar", "encoding": "HiU16", "calc": "value / 1000" },
            { "id": "3021.01", "fields": [
                { "name": "Requested", "unit": "rpm", "encoding": "LoU16", "calc": "LoU16" },
                { "name": "Actual", "unit": "rpm", "encoding": "HiU16", "calc": "value" }
            ] }
        ]"#;
        let table: Vec<RegisterDescriptor> = serde_json::from_str(json).unwrap();

        assert_eq!(table[0].id, "3002.01");
        assert_eq!(table[0].fields[0].calc, Formula::Divide(1000.0));
        assert!(table[1].is_composite());

        let mut catalog = Catalog::with_builtin();
        catalog.extend([("ga11".to_string(), table)]).unwrap();
        assert_eq!(catalog.lookup("GA11").unwrap().len(), 2);
    }

    #[test]
    fn test_custom_type_overrides_builtin() {
        let mut catalog = Catalog::with_builtin();
        let table = vec![RegisterDescriptor::single(
            "3002.01",
            "Outlet",
            "bar",
            Encoding::HiU16,
            Formula::Divide(1000.0),
        )];
        catalog.insert("ga15vp13", table).unwrap();
        assert_eq!(catalog.lookup("GA15VP13").unwrap().len(), 1);
    }
}

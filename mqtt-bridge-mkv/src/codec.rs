//! Decoding of controller answers.
//!
//! An answer is the concatenation of one 8-digit hex field per register of
//! the question, in question order and without delimiters.

use std::collections::HashMap;

use hubbridge_common::Reading;

use crate::catalog::{FIELD_WIDTH, RegisterDescriptor};

/// Decode errors. A failed decode never yields partial readings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed answer: {0}")]
    MalformedAnswer(String),

    #[error("Register {register} needs the raw value of {reference}, which is not decoded yet")]
    UnresolvedReference { register: String, reference: String },
}

/// Decode an answer against the register table it was asked for.
///
/// Surrounding whitespace is ignored. Readings come out in table order, one
/// per field of every register.
pub fn decode(answer: &str, descriptors: &[RegisterDescriptor]) -> Result<Vec<Reading>, DecodeError> {
    let answer = answer.trim();
    let expected = descriptors.len() * FIELD_WIDTH;

    if answer.len() != expected {
        return Err(DecodeError::MalformedAnswer(format!(
            "expected {} characters for {} registers, got {}",
            expected,
            descriptors.len(),
            answer.len()
        )));
    }

    // Raw fields of the registers decoded so far, for ratio formulas.
    let mut raw_values: HashMap<&str, u32> = HashMap::with_capacity(descriptors.len());
    let mut readings = Vec::with_capacity(descriptors.iter().map(|d| d.fields.len()).sum());

    for (index, descriptor) in descriptors.iter().enumerate() {
        let offset = index * FIELD_WIDTH;
        let field = answer.get(offset..offset + FIELD_WIDTH).unwrap_or_default();
        let raw = parse_field(field).ok_or_else(|| {
            DecodeError::MalformedAnswer(format!(
                "field {} ({}) is not {}-digit hex: {:?}",
                index, descriptor.id, FIELD_WIDTH, field
            ))
        })?;

        raw_values.insert(&descriptor.id, raw);

        for field in &descriptor.fields {
            let reference = match field.calc.reference() {
                Some(reference) => match raw_values.get(reference) {
                    Some(&value) => Some(u64::from(value)),
                    None => {
                        return Err(DecodeError::UnresolvedReference {
                            register: descriptor.id.clone(),
                            reference: reference.to_string(),
                        });
                    }
                },
                None => None,
            };

            let value = field.calc.apply(field.encoding.extract(raw), reference);
            readings.push(Reading::new(&descriptor.id, &field.name, value, &field.unit));
        }
    }

    Ok(readings)
}

fn parse_field(field: &str) -> Option<u32> {
    if field.len() != FIELD_WIDTH || !field.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(field, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Encoding, FieldDescriptor};
    use crate::formula::Formula;
    use hubbridge_common::ReadingValue;

    fn table() -> Vec<RegisterDescriptor> {
        vec![
            RegisterDescriptor::single("3002.01", "Compressor Outlet", "bar", Encoding::HiU16, Formula::Divide(1000.0)),
            RegisterDescriptor::composite(
                "3021.01",
                vec![
                    FieldDescriptor::new("Motor requested rpm", "rpm", Encoding::LoU16, Formula::Identity),
                    FieldDescriptor::new("Motor actual rpm", "rpm", Encoding::HiU16, Formula::Identity),
                ],
            ),
            RegisterDescriptor::single("3007.01", "Running Hours", "h", Encoding::UInt32, Formula::Divide(3600.0)),
            RegisterDescriptor::single("3007.05", "VSD 1-20", "%", Encoding::UInt32, Formula::ratio("3007.01", 100.0)),
        ]
    }

    // 7.1 bar | 1500 actual, 1450 requested | 200 s | 50 s
    const ANSWER: &str = "1bbc000005dc05aa000000c800000032";

    #[test]
    fn test_decode() {
        let readings = decode(ANSWER, &table()).unwrap();

        let names: Vec<&str> = readings.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Compressor Outlet", "Motor requested rpm", "Motor actual rpm", "Running Hours", "VSD 1-20"]
        );

        assert_eq!(readings[0].value, ReadingValue::Scaled(7.1));
        assert_eq!(readings[1].value, ReadingValue::Integer(1450));
        assert_eq!(readings[2].value, ReadingValue::Integer(1500));
        assert_eq!(readings[1].register, "3021.01");
        assert_eq!(readings[4].value, ReadingValue::Scaled(25.0));
        assert_eq!(readings[4].unit, "%");
    }

    #[test]
    fn test_decode_is_deterministic() {
        let table = table();
        assert_eq!(decode(ANSWER, &table), decode(ANSWER, &table));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let answer = format!("  {}\r\n", ANSWER.to_uppercase());
        assert_eq!(decode(&answer, &table()).unwrap().len(), 5);
    }

    #[test]
    fn test_hi_lo_extraction() {
        let table = vec![RegisterDescriptor::composite(
            "3021.01",
            vec![
                FieldDescriptor::new("hi", "", Encoding::HiU16, Formula::Identity),
                FieldDescriptor::new("lo", "", Encoding::LoU16, Formula::Identity),
            ],
        )];

        let readings = decode("00010002", &table).unwrap();
        assert_eq!(readings[0].value, ReadingValue::Integer(1));
        assert_eq!(readings[1].value, ReadingValue::Integer(2));
    }

    #[test]
    fn test_zero_divisor_reports_zero() {
        let answer = "1bbc000005dc05aa0000000000000032";
        let readings = decode(answer, &table()).unwrap();
        assert_eq!(readings[4].value, ReadingValue::Scaled(0.0));
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let short = &ANSWER[..ANSWER.len() - 1];
        assert!(matches!(decode(short, &table()), Err(DecodeError::MalformedAnswer(_))));

        let long = format!("{}00000000", ANSWER);
        assert!(matches!(decode(&long, &table()), Err(DecodeError::MalformedAnswer(_))));
    }

    #[test]
    fn test_non_hex_field_is_malformed() {
        let answer = "1bbc0000zzzz05aa000000c800000032";
        let err = decode(answer, &table()).unwrap_err();
        assert!(err.to_string().contains("field 1 (3021.01)"));

        // Same byte length, but a multi-byte character straddles a field boundary.
        let answer = "1bbc000é05dc05aa000000c80000003";
        assert!(matches!(decode(answer, &table()), Err(DecodeError::MalformedAnswer(_))));
    }

    #[test]
    fn test_unresolved_reference() {
        let table = vec![RegisterDescriptor::single(
            "3007.05",
            "VSD 1-20",
            "%",
            Encoding::UInt32,
            Formula::ratio("3007.01", 100.0),
        )];

        assert_eq!(
            decode("00000032", &table),
            Err(DecodeError::UnresolvedReference {
                register: "3007.05".to_string(),
                reference: "3007.01".to_string(),
            })
        );
    }

    #[test]
    fn test_builtin_catalog_decodes_one_reading_per_field() {
        let catalog = Catalog::with_builtin();
        let table = catalog.lookup("GA15VS23A").unwrap();
        let answer = "00010001".repeat(table.len());

        let readings = decode(&answer, table).unwrap();
        let fields: usize = table.iter().map(|d| d.fields.len()).sum();
        assert_eq!(readings.len(), fields);
        assert_eq!(readings.len(), table.len() + 2);
    }
}

//! Facets: typed key/value metadata attached to an edge
//!
//! Facet values arrive as untyped strings and are inferred into a
//! [`FacetValue`] variant. Inference is a pure function of the input text.
//!
//! Inference order:
//! 1. `"..."`: JSON-quoted string (malformed quoting is an error)
//! 2. integer (`i64`); an all-digit literal that overflows is an error
//! 3. finite float; a float literal that overflows is an error
//! 4. `true` / `false`
//! 5. RFC 3339, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD` (UTC)
//! 6. `{...}`: GeoJSON object with `type` and `coordinates`
//! 7. anything else is a bare string
//!
//! [`build_facets`] always returns facets sorted by key, so two mutations
//! built from the same pairs encode to identical bytes regardless of the
//! caller's map iteration order.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::ValueType;

/// Typed facet value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FacetValue {
    /// 64-bit signed integer
    Int(i64),
    /// Finite 64-bit float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// UTF-8 string
    String(String),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// GeoJSON geometry, canonical JSON bytes
    Geo(Vec<u8>),
}

impl FacetValue {
    /// Infer a typed value from raw facet text
    ///
    /// Returns the reason on failure; [`Facet::parse`] wraps it into
    /// [`Error::InvalidFacetValue`].
    pub fn infer(raw: &str) -> std::result::Result<FacetValue, String> {
        if raw.starts_with('"') {
            return serde_json::from_str::<String>(raw)
                .map(FacetValue::String)
                .map_err(|e| format!("malformed quoted string: {}", e));
        }

        if is_integer_literal(raw) {
            return raw
                .parse::<i64>()
                .map(FacetValue::Int)
                .map_err(|_| "integer out of range".to_string());
        }

        if is_float_literal(raw) {
            if let Ok(f) = raw.parse::<f64>() {
                if f.is_finite() {
                    return Ok(FacetValue::Float(f));
                }
                return Err("float out of range".to_string());
            }
        }

        match raw {
            "true" => return Ok(FacetValue::Bool(true)),
            "false" => return Ok(FacetValue::Bool(false)),
            _ => {}
        }

        if let Some(ts) = parse_datetime(raw) {
            return Ok(FacetValue::DateTime(ts));
        }

        if raw.starts_with('{') {
            return parse_geo(raw).map(FacetValue::Geo);
        }

        Ok(FacetValue::String(raw.to_string()))
    }

    /// The value type this facet value maps to
    pub fn value_type(&self) -> ValueType {
        match self {
            FacetValue::Int(_) => ValueType::Int,
            FacetValue::Float(_) => ValueType::Float,
            FacetValue::Bool(_) => ValueType::Bool,
            FacetValue::String(_) => ValueType::String,
            FacetValue::DateTime(_) => ValueType::DateTime,
            FacetValue::Geo(_) => ValueType::Geo,
        }
    }
}

impl fmt::Display for FacetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetValue::Int(v) => write!(f, "{}", v),
            FacetValue::Float(v) => write!(f, "{}", v),
            FacetValue::Bool(v) => write!(f, "{}", v),
            FacetValue::String(v) => write!(f, "{:?}", v),
            FacetValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            FacetValue::Geo(v) => write!(f, "{}", String::from_utf8_lossy(v)),
        }
    }
}

/// One facet on an edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facet {
    /// Facet key, unique per edge
    pub key: String,
    /// Typed value
    pub value: FacetValue,
}

impl Facet {
    /// Parse a facet from a key and raw value text
    pub fn parse(key: &str, raw: &str) -> Result<Facet> {
        if key.is_empty() {
            return Err(Error::InvalidFacetKey);
        }
        let value = FacetValue::infer(raw).map_err(|reason| Error::invalid_facet(key, raw, reason))?;
        Ok(Facet {
            key: key.to_string(),
            value,
        })
    }
}

/// Build an ordered facet sequence from string key/value pairs
///
/// Accepts any iterable of pairs (`&HashMap<String, String>`,
/// `BTreeMap`, arrays of `(&str, &str)`, ...). Output is sorted by key.
///
/// # Errors
///
/// - [`Error::InvalidFacetKey`] for an empty key
/// - [`Error::DuplicateFacetKey`] if a key repeats
/// - [`Error::InvalidFacetValue`] if a value cannot be inferred
///
/// # Example
///
/// ```
/// use quiver_core::facet::{build_facets, FacetValue};
///
/// let facets = build_facets([("since", "2006-01-02"), ("close", "true")]).unwrap();
/// assert_eq!(facets[0].key, "close");
/// assert_eq!(facets[0].value, FacetValue::Bool(true));
/// assert_eq!(facets[1].key, "since");
/// ```
pub fn build_facets<I, K, V>(pairs: I) -> Result<Vec<Facet>>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: BTreeMap<String, String> = BTreeMap::new();
    for (k, v) in pairs {
        let key = k.as_ref();
        if key.is_empty() {
            return Err(Error::InvalidFacetKey);
        }
        if sorted
            .insert(key.to_string(), v.as_ref().to_string())
            .is_some()
        {
            return Err(Error::DuplicateFacetKey(key.to_string()));
        }
    }

    sorted
        .iter()
        .map(|(k, v)| Facet::parse(k, v))
        .collect()
}

/// Deterministic binary encoding of a facet sequence
pub fn encode_facets(facets: &[Facet]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(facets)?)
}

/// Decode facets produced by [`encode_facets`]
pub fn decode_facets(bytes: &[u8]) -> Result<Vec<Facet>> {
    Ok(bincode::deserialize(bytes)?)
}

fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_float_literal(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_digit())
        && s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_geo(s: &str) -> std::result::Result<Vec<u8>, String> {
    let v: serde_json::Value =
        serde_json::from_str(s).map_err(|e| format!("malformed geometry: {}", e))?;
    let obj = v
        .as_object()
        .ok_or_else(|| "geometry must be a JSON object".to_string())?;
    if !obj.get("type").map_or(false, |t| t.is_string()) || !obj.contains_key("coordinates") {
        return Err("geometry requires 'type' and 'coordinates'".to_string());
    }
    serde_json::to_vec(&v).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn test_infer_scalars() {
        assert_eq!(FacetValue::infer("42").unwrap(), FacetValue::Int(42));
        assert_eq!(FacetValue::infer("-7").unwrap(), FacetValue::Int(-7));
        assert_eq!(FacetValue::infer("2.5").unwrap(), FacetValue::Float(2.5));
        assert_eq!(FacetValue::infer("1e3").unwrap(), FacetValue::Float(1000.0));
        assert_eq!(FacetValue::infer("true").unwrap(), FacetValue::Bool(true));
        assert_eq!(FacetValue::infer("false").unwrap(), FacetValue::Bool(false));
        assert_eq!(
            FacetValue::infer("hello world").unwrap(),
            FacetValue::String("hello world".into())
        );
    }

    #[test]
    fn test_infer_quoted_string_keeps_type() {
        assert_eq!(
            FacetValue::infer("\"42\"").unwrap(),
            FacetValue::String("42".into())
        );
        assert_eq!(
            FacetValue::infer(r#""a \"b\"""#).unwrap(),
            FacetValue::String("a \"b\"".into())
        );
        assert!(FacetValue::infer("\"unterminated").is_err());
    }

    #[test]
    fn test_infer_out_of_range_numbers() {
        assert!(FacetValue::infer("99999999999999999999999").is_err());
        assert!(FacetValue::infer("1e999").is_err());
    }

    #[test]
    fn test_infer_nan_is_string() {
        assert_eq!(
            FacetValue::infer("NaN").unwrap(),
            FacetValue::String("NaN".into())
        );
    }

    #[test]
    fn test_infer_datetime_formats() {
        let full = FacetValue::infer("2006-01-02T15:04:05Z").unwrap();
        let naive = FacetValue::infer("2006-01-02T15:04:05").unwrap();
        assert_eq!(full, naive);

        match FacetValue::infer("2006-01-02").unwrap() {
            FacetValue::DateTime(dt) => {
                assert_eq!(dt.year(), 2006);
                assert_eq!(dt.month(), 1);
                assert_eq!(dt.day(), 2);
            }
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn test_infer_geo() {
        let raw = r#"{"type":"Point","coordinates":[1.5,2.5]}"#;
        match FacetValue::infer(raw).unwrap() {
            FacetValue::Geo(bytes) => {
                let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(v["type"], "Point");
            }
            other => panic!("expected geo, got {:?}", other),
        }
        assert!(FacetValue::infer(r#"{"type":"Point"}"#).is_err());
        assert!(FacetValue::infer("{not json").is_err());
    }

    #[test]
    fn test_build_facets_sorted() {
        let facets = build_facets([("b", "2"), ("a", "1")]).unwrap();
        let keys: Vec<_> = facets.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_build_facets_order_independent() {
        let first = build_facets([("b", "2"), ("a", "1")]).unwrap();
        let second = build_facets([("a", "1"), ("b", "2")]).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            encode_facets(&first).unwrap(),
            encode_facets(&second).unwrap()
        );
    }

    #[test]
    fn test_build_facets_from_hashmap() {
        let mut map = HashMap::new();
        map.insert("weight".to_string(), "0.5".to_string());
        map.insert("origin".to_string(), "import".to_string());
        let facets = build_facets(&map).unwrap();
        assert_eq!(facets.len(), 2);
        assert_eq!(facets[0].key, "origin");
        assert_eq!(facets[1].value, FacetValue::Float(0.5));
    }

    #[test]
    fn test_build_facets_empty() {
        let facets = build_facets(Vec::<(String, String)>::new()).unwrap();
        assert!(facets.is_empty());
    }

    #[test]
    fn test_build_facets_rejects_duplicates() {
        let err = build_facets([("k", "1"), ("k", "2")]).unwrap_err();
        assert!(matches!(err, Error::DuplicateFacetKey(k) if k == "k"));
    }

    #[test]
    fn test_build_facets_rejects_empty_key() {
        assert!(matches!(
            build_facets([("", "1")]),
            Err(Error::InvalidFacetKey)
        ));
    }

    #[test]
    fn test_build_facets_invalid_value() {
        let err = build_facets([("ok", "1"), ("bad", "1e999")]).unwrap_err();
        assert!(matches!(err, Error::InvalidFacetValue { ref key, .. } if key == "bad"));
    }

    #[test]
    fn test_encode_decode() {
        let facets = build_facets([("n", "3"), ("s", "x")]).unwrap();
        let bytes = encode_facets(&facets).unwrap();
        assert_eq!(decode_facets(&bytes).unwrap(), facets);
    }

    proptest! {
        #[test]
        fn prop_facet_order_is_input_order_independent(
            map in proptest::collection::btree_map("[a-z]{1,8}", "[a-d0-9]{0,8}", 0..12)
        ) {
            let forward: Vec<(String, String)> = map.clone().into_iter().collect();
            let mut backward = forward.clone();
            backward.reverse();

            let a = build_facets(forward).unwrap();
            let b = build_facets(backward).unwrap();
            prop_assert_eq!(encode_facets(&a).unwrap(), encode_facets(&b).unwrap());
            prop_assert!(a.windows(2).all(|w| w[0].key < w[1].key));
        }
    }
}

//! Versioned persisted filter state.
//!
//! [`FilterState`] is the transfer format between a live filter and
//! storage. It captures parameters, count, and raw slice bytes (for a
//! leaf filter) or child states oldest-to-newest (for a scaling chain),
//! so rehydration reconstructs bit arrays byte-for-byte with no
//! rehashing.
//!
//! # Wire format
//!
//! A JSON document, camelCase keys, `apiVersion` currently `"v1"`:
//!
//! ```json
//! {
//!   "apiVersion": "v1",
//!   "parameters": { "id": "...", "dimensions": { ... }, "scaling": { ... }, "hashAlgorithm": "murmur3" },
//!   "count": 42,
//!   "bits": ["<base64>", "..."],
//!   "children": [ ... ]
//! }
//! ```
//!
//! `bits` holds one base64-encoded blob per hash slice,
//! order-significant; `children` holds nested states for scaling
//! generations, order-significant. A node never carries both, and empty
//! optional fields are omitted entirely. The same document also encodes
//! to a compact binary form via [`FilterState::to_bytes`], where the
//! blobs stay raw bytes and every field is always present — binary
//! formats read fields positionally and cannot tolerate omissions.
//!
//! Parameter *consistency* (decoded vs. configured) is deliberately not
//! checked here — that happens at build time under the configured
//! [`StateValidationBehavior`](crate::builder::StateValidationBehavior),
//! where the caller's parameters are known. This module checks only
//! structural validity.

use crate::core::FilterParameters;
use crate::error::{BloomGateError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Version tag written into every state document.
pub const API_VERSION: &str = "v1";

/// Snapshot of a filter's persistent state.
///
/// Produced by the filters' `state()` methods; consumed once by the
/// builder during rehydration. Pure data, no lifecycle of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    /// Format version, [`API_VERSION`] for documents written by this crate.
    pub api_version: String,

    /// Parameters the bits were computed under.
    pub parameters: Option<FilterParameters>,

    /// Number of distinct keys added.
    pub count: u64,

    /// One blob per hash slice (leaf filters only), base64 on the wire.
    pub bit_arrays: Vec<Vec<u8>>,

    /// Generation states oldest→newest (scaling chains only).
    pub children: Vec<FilterState>,
}

impl FilterState {
    /// A fresh state carrying only parameters: no bits, no children,
    /// zero count. Building from it produces an empty filter.
    #[must_use]
    pub fn new(parameters: FilterParameters) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            parameters: Some(parameters),
            count: 0,
            bit_arrays: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Encode as a JSON document.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidSerializedState`] if encoding fails.
    pub fn serialize(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            BloomGateError::invalid_serialized_state(format!("could not serialize state: {}", e))
        })
    }

    /// Decode from a JSON document and check structural validity.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidSerializedState`] on malformed JSON or a
    /// structurally invalid document.
    pub fn deserialize(serialized: &str) -> Result<Self> {
        let state: FilterState = serde_json::from_str(serialized).map_err(|e| {
            BloomGateError::invalid_serialized_state(format!("could not deserialize state: {}", e))
        })?;
        state.validate()?;
        Ok(state)
    }

    /// Encode as compact binary.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidSerializedState`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            BloomGateError::invalid_serialized_state(format!("could not serialize state: {}", e))
        })
    }

    /// Decode from compact binary and check structural validity.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidSerializedState`] on malformed input or
    /// a structurally invalid document.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let state: FilterState = bincode::deserialize(bytes).map_err(|e| {
            BloomGateError::invalid_serialized_state(format!("could not deserialize state: {}", e))
        })?;
        state.validate()?;
        Ok(state)
    }

    /// Check structural invariants, recursively.
    ///
    /// A node may carry slice bits or child states, never both; a state
    /// claiming a nonzero count must carry one of them; the version tag
    /// must be known.
    ///
    /// # Errors
    ///
    /// [`BloomGateError::InvalidSerializedState`] describing the defect.
    pub fn validate(&self) -> Result<()> {
        if self.api_version != API_VERSION {
            return Err(BloomGateError::invalid_serialized_state(format!(
                "unknown apiVersion '{}', expected '{}'",
                self.api_version, API_VERSION
            )));
        }

        if !self.bit_arrays.is_empty() && !self.children.is_empty() {
            return Err(BloomGateError::invalid_serialized_state(
                "state carries both bit arrays and children; a node is either a leaf filter \
                 or a scaling chain",
            ));
        }

        if self.count > 0 && self.bit_arrays.is_empty() && self.children.is_empty() {
            return Err(BloomGateError::invalid_serialized_state(format!(
                "state claims count {} but carries neither bit arrays nor children",
                self.count
            )));
        }

        for child in &self.children {
            child.validate()?;
        }

        Ok(())
    }
}

/// Human-readable wire shape: optional fields omitted, blobs base64.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HumanRepr<'a> {
    api_version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a FilterParameters>,
    count: u64,
    #[serde(rename = "bits", skip_serializing_if = "Vec::is_empty")]
    bit_arrays: Vec<String>,
    #[serde(skip_serializing_if = "slice_is_empty")]
    children: &'a [FilterState],
}

fn slice_is_empty(children: &&[FilterState]) -> bool {
    children.is_empty()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HumanReprOwned {
    api_version: String,
    #[serde(default)]
    parameters: Option<FilterParameters>,
    count: u64,
    #[serde(rename = "bits", default)]
    bit_arrays: Vec<String>,
    #[serde(default)]
    children: Vec<FilterState>,
}

/// Binary wire shape: every field present, blobs raw.
#[derive(Serialize)]
struct BinaryRepr<'a> {
    api_version: &'a str,
    parameters: &'a Option<FilterParameters>,
    count: u64,
    bit_arrays: &'a [Vec<u8>],
    children: &'a [FilterState],
}

#[derive(Deserialize)]
struct BinaryReprOwned {
    api_version: String,
    parameters: Option<FilterParameters>,
    count: u64,
    bit_arrays: Vec<Vec<u8>>,
    children: Vec<FilterState>,
}

impl Serialize for FilterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            HumanRepr {
                api_version: &self.api_version,
                parameters: self.parameters.as_ref(),
                count: self.count,
                bit_arrays: self.bit_arrays.iter().map(|b| BASE64.encode(b)).collect(),
                children: &self.children,
            }
            .serialize(serializer)
        } else {
            BinaryRepr {
                api_version: &self.api_version,
                parameters: &self.parameters,
                count: self.count,
                bit_arrays: &self.bit_arrays,
                children: &self.children,
            }
            .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for FilterState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let repr = HumanReprOwned::deserialize(deserializer)?;
            let bit_arrays = repr
                .bit_arrays
                .iter()
                .map(|encoded| {
                    BASE64.decode(encoded).map_err(|e| {
                        D::Error::custom(format!("invalid base64 bit array: {}", e))
                    })
                })
                .collect::<std::result::Result<_, _>>()?;

            Ok(Self {
                api_version: repr.api_version,
                parameters: repr.parameters,
                count: repr.count,
                bit_arrays,
                children: repr.children,
            })
        } else {
            let repr = BinaryReprOwned::deserialize(deserializer)?;
            Ok(Self {
                api_version: repr.api_version,
                parameters: repr.parameters,
                count: repr.count,
                bit_arrays: repr.bit_arrays,
                children: repr.children,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FilterDimensions, ScalingPolicy};

    fn params(id: &str) -> FilterParameters {
        FilterParameters::new(
            id,
            FilterDimensions::for_capacity_and_fpp(100, 0.01).unwrap(),
            ScalingPolicy::default(),
            "murmur3",
        )
    }

    fn leaf_state(id: &str) -> FilterState {
        FilterState {
            api_version: API_VERSION.to_string(),
            parameters: Some(params(id)),
            count: 2,
            bit_arrays: vec![vec![0xAB, 0x00, 0x01], vec![0xFF, 0x10, 0x80]],
            children: Vec::new(),
        }
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let state = leaf_state("leaf");
        let json = state.serialize().unwrap();
        let back = FilterState::deserialize(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn test_bits_are_base64_on_the_wire() {
        let state = leaf_state("leaf");
        let json = state.serialize().unwrap();
        assert!(json.contains("\"bits\":[\"qwAB\""));
        assert!(json.contains("\"apiVersion\":\"v1\""));
        assert!(!json.contains("bitArrays"));
    }

    #[test]
    fn test_empty_optionals_are_omitted_in_json() {
        let state = FilterState::new(params("fresh"));
        let json = state.serialize().unwrap();
        assert!(!json.contains("\"bits\""));
        assert!(!json.contains("\"children\""));
    }

    #[test]
    fn test_binary_round_trip_with_empty_optionals() {
        // Binary encoding keeps every field, so empty vectors and a
        // missing parameters block must survive unchanged.
        let mut state = FilterState::new(params("fresh"));
        state.parameters = None;
        let back = FilterState::from_bytes(&state.to_bytes().unwrap()).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn test_binary_round_trip_nested() {
        let mut chain = FilterState::new(params("chain"));
        chain.count = 2;
        chain.children = vec![leaf_state("chain[0]")];

        let bytes = chain.to_bytes().unwrap();
        let back = FilterState::from_bytes(&bytes).unwrap();
        assert_eq!(chain, back);
    }

    #[test]
    fn test_deserialize_rejects_malformed_json() {
        let result = FilterState::deserialize("{not json");
        assert!(matches!(
            result,
            Err(BloomGateError::InvalidSerializedState { .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_bad_base64() {
        let json = r#"{"apiVersion":"v1","count":1,"bits":["@@not-base64@@"]}"#;
        let result = FilterState::deserialize(json);
        assert!(matches!(
            result,
            Err(BloomGateError::InvalidSerializedState { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_version() {
        let mut state = leaf_state("leaf");
        state.api_version = "v2".to_string();
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bits_and_children_together() {
        let mut state = leaf_state("both");
        state.children = vec![leaf_state("child")];
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_counted_state_with_no_storage() {
        let mut state = FilterState::new(params("empty"));
        state.count = 5;
        assert!(state.validate().is_err());

        state.count = 0;
        state.validate().unwrap();
    }

    #[test]
    fn test_validate_recurses_into_children() {
        let mut chain = FilterState::new(params("chain"));
        let mut bad_child = leaf_state("chain[0]");
        bad_child.api_version = "v0".to_string();
        chain.children = vec![bad_child];

        assert!(chain.validate().is_err());
    }

    #[test]
    fn test_deserialize_tolerates_missing_parameters() {
        let json = r#"{"apiVersion":"v1","count":0}"#;
        let state = FilterState::deserialize(json).unwrap();
        assert!(state.parameters.is_none());
        assert_eq!(state.count, 0);
    }
}

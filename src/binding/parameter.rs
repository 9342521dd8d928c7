//! Handler signatures and the per-parameter descriptors extracted from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SignatureError;

// ── Declared types ──────────────────────────────────────────────────

/// Semantic type of a handler parameter.
///
/// Only used to decide which roles a parameter can play. The binder never
/// checks that a value actually fits the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    /// Any business object.
    Value,
    /// String-keyed mapping of arbitrary values.
    Map,
    /// String-keyed record of string values.
    Properties,
    /// The message envelope itself.
    Message,
}

impl ParameterType {
    /// Whether a parameter of this type can receive the whole header set.
    pub fn is_bulk_capable(&self) -> bool {
        matches!(self, Self::Map | Self::Properties)
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Value => "value",
            Self::Map => "map",
            Self::Properties => "properties",
            Self::Message => "message",
        };
        write!(f, "{s}")
    }
}

// ── Markers ─────────────────────────────────────────────────────────

/// Structural marker attached to a parameter by whoever describes the handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "marker", rename_all = "snake_case")]
pub enum Marker {
    /// Bind one header. Without a name the parameter's declared name is used.
    Header {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default = "default_required")]
        required: bool,
    },
    /// Bind the whole header set.
    Headers,
    /// Bind the message itself.
    Envelope,
}

fn default_required() -> bool {
    true
}

// ── Signature description ───────────────────────────────────────────

/// One formal parameter as supplied at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub declared_type: ParameterType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<Marker>,
}

impl ParameterSpec {
    /// A parameter whose name could not be recovered.
    pub fn unnamed(declared_type: ParameterType) -> Self {
        Self {
            name: None,
            declared_type,
            markers: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>, declared_type: ParameterType) -> Self {
        Self {
            name: Some(name.into()),
            declared_type,
            markers: Vec::new(),
        }
    }

    pub fn value(name: impl Into<String>) -> Self {
        Self::named(name, ParameterType::Value)
    }

    pub fn map(name: impl Into<String>) -> Self {
        Self::named(name, ParameterType::Map)
    }

    pub fn properties(name: impl Into<String>) -> Self {
        Self::named(name, ParameterType::Properties)
    }

    pub fn message(name: impl Into<String>) -> Self {
        Self::named(name, ParameterType::Message)
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.markers.push(marker);
        self
    }

    /// Bind the required header `key`.
    pub fn header(self, key: impl Into<String>) -> Self {
        self.with_marker(Marker::Header {
            name: Some(key.into()),
            required: true,
        })
    }

    /// Bind the header `key`, leaving the argument absent when it is missing.
    pub fn optional_header(self, key: impl Into<String>) -> Self {
        self.with_marker(Marker::Header {
            name: Some(key.into()),
            required: false,
        })
    }

    /// Bind the required header named after the parameter.
    pub fn header_by_name(self) -> Self {
        self.with_marker(Marker::Header {
            name: None,
            required: true,
        })
    }

    pub fn headers(self) -> Self {
        self.with_marker(Marker::Headers)
    }

    pub fn envelope(self) -> Self {
        self.with_marker(Marker::Envelope)
    }
}

/// Ordered parameter list of one handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSignature {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl HandlerSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter.
    pub fn param(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }
}

// ── Descriptors ─────────────────────────────────────────────────────

/// A header key resolved at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBinding {
    pub key: String,
    pub required: bool,
}

/// Immutable classification of one parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    index: usize,
    declared_type: ParameterType,
    declared_name: Option<String>,
    header: Option<HeaderBinding>,
    bulk_metadata: bool,
    envelope: bool,
}

impl ParameterDescriptor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn declared_type(&self) -> ParameterType {
        self.declared_type
    }

    pub fn declared_name(&self) -> Option<&str> {
        self.declared_name.as_deref()
    }

    pub fn header(&self) -> Option<&HeaderBinding> {
        self.header.as_ref()
    }

    /// Resolved header key, for named header parameters.
    pub fn metadata_key(&self) -> Option<&str> {
        self.header.as_ref().map(|h| h.key.as_str())
    }

    pub fn is_required(&self) -> bool {
        self.header.as_ref().is_some_and(|h| h.required)
    }

    /// Explicitly marked for the whole header set.
    pub fn is_bulk_metadata(&self) -> bool {
        self.bulk_metadata
    }

    pub fn is_envelope(&self) -> bool {
        self.envelope
    }

    /// Unmarked and not envelope-shaped.
    pub fn is_payload_candidate(&self) -> bool {
        self.header.is_none() && !self.bulk_metadata && !self.envelope
    }

    /// Short label used in diagnostics, e.g. `#1 order: value`.
    pub fn label(&self) -> String {
        match &self.declared_name {
            Some(name) => format!("#{} {}: {}", self.index, name, self.declared_type),
            None => format!("#{}: {}", self.index, self.declared_type),
        }
    }

    /// Classify a single parameter.
    pub fn extract(
        handler: &str,
        index: usize,
        spec: &ParameterSpec,
    ) -> Result<Self, SignatureError> {
        let conflicting = || SignatureError::ConflictingMarkers {
            handler: handler.to_string(),
            index,
        };

        // Repeating the same marker is harmless; two different ones are not.
        if let Some((first, rest)) = spec.markers.split_first()
            && rest.iter().any(|m| m != first)
        {
            return Err(conflicting());
        }

        let declared_name = spec
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let mut descriptor = Self {
            index,
            declared_type: spec.declared_type,
            declared_name,
            header: None,
            bulk_metadata: false,
            envelope: false,
        };

        match spec.markers.first() {
            Some(Marker::Header { name, required }) => {
                let key = name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .or_else(|| descriptor.declared_name.clone())
                    .ok_or_else(|| SignatureError::UnnamedHeader {
                        handler: handler.to_string(),
                        index,
                    })?;
                descriptor.header = Some(HeaderBinding {
                    key,
                    required: *required,
                });
            }
            Some(Marker::Headers) => {
                if !spec.declared_type.is_bulk_capable() {
                    return Err(SignatureError::BulkHeadersType {
                        handler: handler.to_string(),
                        index,
                        found: spec.declared_type,
                    });
                }
                descriptor.bulk_metadata = true;
            }
            Some(Marker::Envelope) => descriptor.envelope = true,
            None => descriptor.envelope = spec.declared_type == ParameterType::Message,
        }

        Ok(descriptor)
    }

    /// Classify every parameter of a signature, in order.
    pub fn extract_all(signature: &HandlerSignature) -> Result<Vec<Self>, SignatureError> {
        signature
            .parameters
            .iter()
            .enumerate()
            .map(|(index, spec)| Self::extract(&signature.name, index, spec))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(spec: ParameterSpec) -> Result<ParameterDescriptor, SignatureError> {
        ParameterDescriptor::extract("handler", 0, &spec)
    }

    #[test]
    fn unmarked_value_is_payload_candidate() {
        let d = extract(ParameterSpec::value("order")).unwrap();
        assert!(d.is_payload_candidate());
        assert!(!d.is_envelope());
        assert_eq!(d.metadata_key(), None);
    }

    #[test]
    fn header_uses_explicit_name() {
        let d = extract(ParameterSpec::value("ignored").header("id")).unwrap();
        assert_eq!(d.metadata_key(), Some("id"));
        assert!(d.is_required());
        assert!(!d.is_payload_candidate());
    }

    #[test]
    fn header_falls_back_to_declared_name() {
        let d = extract(ParameterSpec::value("correlation").header_by_name()).unwrap();
        assert_eq!(d.metadata_key(), Some("correlation"));
    }

    #[test]
    fn blank_header_name_falls_back_to_declared_name() {
        let d = extract(ParameterSpec::value("priority").optional_header("  ")).unwrap();
        assert_eq!(d.metadata_key(), Some("priority"));
        assert!(!d.is_required());
    }

    #[test]
    fn unnamed_header_without_declared_name_fails() {
        let spec = ParameterSpec::unnamed(ParameterType::Value).header_by_name();
        let err = extract(spec).unwrap_err();
        assert!(matches!(err, SignatureError::UnnamedHeader { index: 0, .. }));
    }

    #[test]
    fn bulk_marker_requires_mapping_type() {
        assert!(extract(ParameterSpec::map("h").headers()).unwrap().is_bulk_metadata());
        assert!(extract(ParameterSpec::properties("h").headers()).unwrap().is_bulk_metadata());

        let err = extract(ParameterSpec::value("h").headers()).unwrap_err();
        assert!(matches!(
            err,
            SignatureError::BulkHeadersType {
                found: ParameterType::Value,
                ..
            }
        ));
        assert!(extract(ParameterSpec::message("m").headers()).is_err());
    }

    #[test]
    fn message_type_is_envelope_candidate() {
        let d = extract(ParameterSpec::message("msg")).unwrap();
        assert!(d.is_envelope());
        assert!(!d.is_payload_candidate());
    }

    #[test]
    fn envelope_marker_sets_capability() {
        let d = extract(ParameterSpec::value("raw").envelope()).unwrap();
        assert!(d.is_envelope());
    }

    #[test]
    fn header_marker_on_message_type_is_not_envelope() {
        let d = extract(ParameterSpec::message("previous").header("previous")).unwrap();
        assert!(!d.is_envelope());
        assert_eq!(d.metadata_key(), Some("previous"));
    }

    #[test]
    fn multiple_markers_conflict() {
        let spec = ParameterSpec::map("h").header("x").headers();
        assert!(matches!(
            extract(spec),
            Err(SignatureError::ConflictingMarkers { .. })
        ));

        let spec = ParameterSpec::value("id").header("id").envelope();
        assert!(matches!(
            extract(spec),
            Err(SignatureError::ConflictingMarkers { .. })
        ));
    }

    #[test]
    fn repeated_identical_marker_is_accepted() {
        let d = extract(ParameterSpec::value("id").header("id").header("id")).unwrap();
        assert_eq!(d.metadata_key(), Some("id"));
        assert!(d.is_required());

        let d = extract(ParameterSpec::map("all").headers().headers()).unwrap();
        assert!(d.is_bulk_metadata());
    }

    #[test]
    fn header_markers_naming_different_keys_conflict() {
        let spec = ParameterSpec::value("id").header("a").header("b");
        assert!(matches!(
            extract(spec),
            Err(SignatureError::ConflictingMarkers { .. })
        ));
    }

    #[test]
    fn signature_deserializes_with_defaults() {
        let json = serde_json::json!({
            "name": "dealWith",
            "parameters": [
                {"name": "payload", "declared_type": "value"},
                {"name": "id", "declared_type": "value", "markers": [{"marker": "header"}]},
                {"declared_type": "properties", "markers": [{"marker": "headers"}]}
            ]
        });
        let signature: HandlerSignature = serde_json::from_value(json).unwrap();
        let descriptors = ParameterDescriptor::extract_all(&signature).unwrap();
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[1].metadata_key(), Some("id"));
        assert!(descriptors[1].is_required());
        assert!(descriptors[2].is_bulk_metadata());
    }

    #[test]
    fn labels_include_name_and_type() {
        let d = ParameterDescriptor::extract("h", 2, &ParameterSpec::map("headers")).unwrap();
        assert_eq!(d.label(), "#2 headers: map");
        let d = ParameterDescriptor::extract("h", 0, &ParameterSpec::unnamed(ParameterType::Value))
            .unwrap();
        assert_eq!(d.label(), "#0: value");
    }
}

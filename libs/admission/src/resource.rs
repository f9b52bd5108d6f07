use crate::error::{Error, Result};

use std::fmt;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tfo_terraform::crd::{Terraform, TerraformObject};

/// Type information found in a raw object, whatever shape the rest of it has.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedKind {
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

impl DetectedKind {
    fn sniff(raw: &[u8]) -> Self {
        serde_json::from_slice(raw).unwrap_or_default()
    }
}

impl fmt::Display for DetectedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, Kind={}",
            self.api_version.as_deref().unwrap_or_default(),
            self.kind.as_deref().unwrap_or_default()
        )
    }
}

/// Decode a raw object into `K`, ignoring the kind it declares.
pub fn decode_resource<K: DeserializeOwned>(raw: &[u8]) -> Result<(K, DetectedKind)> {
    let kind = DetectedKind::sniff(raw);
    match serde_json::from_slice::<K>(raw) {
        Ok(resource) => Ok((resource, kind)),
        Err(source) => Err(Error::ResourceDecode { kind, source }),
    }
}

/// Decode a raw Terraform object. Absent or `null` `metadata` and `spec` are taken as empty.
pub fn decode_terraform(raw: &[u8]) -> Result<(Terraform, DetectedKind)> {
    let (object, kind) = decode_resource::<TerraformObject>(raw)?;
    Ok((object.into(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tfo_terraform::crd::TerraformSpec;

    #[test]
    fn test_decode_terraform() {
        let raw = br#"{"apiVersion":"tf.galleybytes.com/v1alpha2","kind":"Terraform","metadata":{"name":"tf1"},"spec":{"outputsSecret":"old"}}"#;
        let (tf, kind) = decode_resource::<Terraform>(raw).unwrap();

        assert_eq!(tf.metadata.name.as_deref(), Some("tf1"));
        assert_eq!(tf.spec.outputs_secret.as_deref(), Some("old"));
        assert_eq!(kind.kind.as_deref(), Some("Terraform"));
        assert_eq!(
            kind.to_string(),
            "tf.galleybytes.com/v1alpha2, Kind=Terraform"
        );
    }

    #[test]
    fn test_decode_ignores_declared_kind() {
        let raw = br#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"cm"},"spec":{}}"#;
        let (tf, kind) = decode_resource::<Terraform>(raw).unwrap();

        assert_eq!(tf.metadata.name.as_deref(), Some("cm"));
        assert_eq!(kind.kind.as_deref(), Some("ConfigMap"));
    }

    #[test]
    fn test_decode_failure_keeps_detected_kind() {
        let raw = br#"{"apiVersion":"v1","kind":"Pod","metadata":{"name":"p"},"spec":"not an object"}"#;
        match decode_resource::<Terraform>(raw) {
            Err(Error::ResourceDecode { kind, source }) => {
                assert_eq!(kind.api_version.as_deref(), Some("v1"));
                assert_eq!(kind.kind.as_deref(), Some("Pod"));
                assert!(!source.to_string().is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_terraform_without_spec() {
        let raw = br#"{"apiVersion":"tf.galleybytes.com/v1alpha2","kind":"Terraform","metadata":{"name":"tf1","annotations":{}}}"#;
        let (tf, kind) = decode_terraform(raw).unwrap();

        assert_eq!(tf.metadata.name.as_deref(), Some("tf1"));
        assert_eq!(tf.spec, TerraformSpec::default());
        assert_eq!(kind.kind.as_deref(), Some("Terraform"));
    }

    #[test]
    fn test_decode_terraform_without_metadata() {
        let (tf, kind) = decode_terraform(br#"{"spec":{"backend":"local"}}"#).unwrap();

        assert!(tf.metadata.annotations.is_none());
        assert_eq!(tf.spec.backend.as_deref(), Some("local"));
        assert_eq!(kind, DetectedKind::default());
    }

    #[test]
    fn test_decode_failure_without_kind() {
        let err = decode_resource::<Terraform>(b"[1, 2, 3]").unwrap_err();
        match err {
            Error::ResourceDecode { kind, .. } => assert_eq!(kind, DetectedKind::default()),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

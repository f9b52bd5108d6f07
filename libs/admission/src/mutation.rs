use crate::error::{Error, Result};

use kube::ResourceExt;
use tfo_terraform::crd::Terraform;
use tracing::info;
use uuid::Uuid;

/// Annotation recording which service mutated the resource.
pub const MUTATED_BY_ANNOTATION: &str = "mutation.galleybytes.com/mutated-by";

pub const OUTPUT_SECRET_SUFFIX: &str = "-output-secret";

#[inline]
pub fn output_secret_name(id: &Uuid) -> String {
    format!("{id}{OUTPUT_SECRET_SUFFIX}")
}

/// Return a mutated copy of `tf` with a freshly generated outputs secret name and the
/// mutated-by annotation set to `service_name`.
pub fn mutate(tf: &Terraform, service_name: &str) -> Result<Terraform> {
    mutate_with_id(tf, service_name, Uuid::new_v4())
}

pub fn mutate_with_id(tf: &Terraform, service_name: &str, id: Uuid) -> Result<Terraform> {
    let mut mutated = tf.clone();
    info!(name = %tf.name_any(), "Mutating Terraform");

    let annotations = mutated
        .metadata
        .annotations
        .as_mut()
        .ok_or_else(|| Error::MissingAnnotations(format!("Terraform {}", tf.name_any())))?;
    annotations.insert(MUTATED_BY_ANNOTATION.to_string(), service_name.to_string());

    mutated.spec.outputs_secret = Some(output_secret_name(&id));
    Ok(mutated)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use tfo_terraform::crd::TerraformSpec;

    fn terraform(annotations: Option<BTreeMap<String, String>>) -> Terraform {
        Terraform {
            metadata: ObjectMeta {
                name: Some("tf1".to_string()),
                annotations,
                ..ObjectMeta::default()
            },
            spec: TerraformSpec::default(),
            status: None,
        }
    }

    #[test]
    fn test_mutate_sets_secret_and_annotation() {
        let id = Uuid::parse_str("6f2a1c44-0c0e-4a8e-9df9-5c2f1a7b0b3d").unwrap();
        let mutated = mutate_with_id(&terraform(Some(BTreeMap::new())), "tfo-webhook", id).unwrap();

        assert_eq!(
            mutated.spec.outputs_secret.as_deref(),
            Some("6f2a1c44-0c0e-4a8e-9df9-5c2f1a7b0b3d-output-secret")
        );
        assert_eq!(
            mutated.annotations().get(MUTATED_BY_ANNOTATION),
            Some(&"tfo-webhook".to_string())
        );
    }

    #[test]
    fn test_mutate_overwrites_existing_values() {
        let mut tf = terraform(Some(BTreeMap::from([
            (MUTATED_BY_ANNOTATION.to_string(), "someone-else".to_string()),
            ("keep".to_string(), "me".to_string()),
        ])));
        tf.spec.outputs_secret = Some("user-chosen".to_string());

        let mutated = mutate(&tf, "tfo-webhook").unwrap();

        assert_ne!(mutated.spec.outputs_secret.as_deref(), Some("user-chosen"));
        assert_eq!(
            mutated.annotations().get(MUTATED_BY_ANNOTATION),
            Some(&"tfo-webhook".to_string())
        );
        assert_eq!(mutated.annotations().get("keep"), Some(&"me".to_string()));
    }

    #[test]
    fn test_mutate_leaves_input_untouched() {
        let tf = terraform(Some(BTreeMap::new()));
        let before = tf.clone();
        let _ = mutate(&tf, "tfo-webhook").unwrap();
        assert_eq!(tf, before);
    }

    #[test]
    fn test_mutate_generates_unique_names() {
        let tf = terraform(Some(BTreeMap::new()));
        let first = mutate(&tf, "tfo-webhook").unwrap();
        let second = mutate(&tf, "tfo-webhook").unwrap();

        assert_ne!(first.spec.outputs_secret, second.spec.outputs_secret);
        for name in [first.spec.outputs_secret, second.spec.outputs_secret] {
            let name = name.unwrap();
            let id = name.strip_suffix(OUTPUT_SECRET_SUFFIX).unwrap();
            assert!(Uuid::parse_str(id).is_ok());
        }
    }

    #[test]
    fn test_mutate_without_annotations_fails() {
        let err = mutate(&terraform(None), "tfo-webhook").unwrap_err();
        assert!(matches!(err, Error::MissingAnnotations(_)));
        assert_eq!(err.to_string(), "Terraform tf1 has no annotations");
    }
}

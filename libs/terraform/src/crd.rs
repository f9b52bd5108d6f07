use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::CustomResource;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A Terraform resource describes a Terraform module run managed by the Terraform Operator.
///
/// The operator owns the full schema of this resource. Only the fields the admission webhook
/// reads or writes are typed here; every other field is carried verbatim so that decoding and
/// re-encoding an object never loses user data.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[kube(
    group = "tf.galleybytes.com",
    version = "v1alpha2",
    kind = "Terraform",
    plural = "terraforms",
    singular = "terraform",
    shortname = "tf",
    namespaced,
    status = "TerraformStatus",
    schema = "disabled",
    derive = "Default",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct TerraformSpec {
    /// Version of the Terraform binary used by the runner images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,

    /// Name of the secret where the operator writes the Terraform outputs.
    ///
    /// Always overwritten on admission with a generated, unique name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs_secret: Option<String>,

    /// Output names to write into the outputs secret. All outputs are written when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs_to_include: Option<Vec<String>>,

    /// Output names never written into the outputs secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs_to_omit: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_outputs_to_status: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_delete: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_latest_pods_only: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_approval: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,

    /// Backend configuration, as an HCL string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,

    /// Remaining spec fields (module, setup, task options, credentials, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Status is written by the operator, never by the webhook. It is kept opaque.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TerraformStatus {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// A `Terraform` object as found in admission requests.
///
/// Objects sent by the API server may omit `metadata` or `spec`, or set them to `null`. Both
/// decode to their empty value here instead of failing, and are written back in full by the
/// mutated `Terraform`.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TerraformObject {
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: ObjectMeta,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: TerraformSpec,
    #[serde(default)]
    pub status: Option<TerraformStatus>,
}

impl From<TerraformObject> for Terraform {
    fn from(object: TerraformObject) -> Self {
        Self {
            metadata: object.metadata,
            spec: object.spec,
            status: object.status,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

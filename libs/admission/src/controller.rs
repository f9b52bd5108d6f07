use crate::error::{Error, Result};
use crate::mutation::mutate;
use crate::patch::{diff_resource, encode_patch};
use crate::resource::decode_terraform;
use crate::review::{AdmissionRequest, AdmissionResponse, decode_review, encode_review};
use crate::scheme::Scheme;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

/// What to do with requests whose resource is not the target resource.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnmatchedPolicy {
    /// Produce no admission response. The webhook registration is expected to route only
    /// target resources here.
    #[default]
    Skip,
    /// Answer `allowed=true` without a patch.
    Allow,
}

/// Result of handling one encoded admission review.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Encoded admission review to send back.
    Respond(Vec<u8>),
    /// The request was not for us; nothing is sent back.
    Skipped,
}

#[derive(Clone, Debug)]
pub struct AdmissionController {
    scheme: Arc<Scheme>,
    service_name: String,
    unmatched: UnmatchedPolicy,
}

impl AdmissionController {
    pub fn new(scheme: Arc<Scheme>, service_name: impl Into<String>) -> Self {
        Self {
            scheme,
            service_name: service_name.into(),
            unmatched: UnmatchedPolicy::default(),
        }
    }

    pub fn with_unmatched_policy(mut self, unmatched: UnmatchedPolicy) -> Self {
        self.unmatched = unmatched;
        self
    }

    /// Handle an encoded admission review end to end.
    ///
    /// Errors are envelope-level only: the body could not be decoded, or the response could
    /// not be encoded. Every other failure is reported inside the admission response.
    pub fn review(&self, body: &[u8]) -> Result<Outcome> {
        let (request, types) = decode_review(&self.scheme, body)?;

        match self.admit(&request) {
            Some(response) => Ok(Outcome::Respond(encode_review(types, response)?)),
            None => Ok(Outcome::Skipped),
        }
    }

    /// Build the admission response for a decoded request, or `None` when the request is
    /// skipped.
    pub fn admit(&self, request: &AdmissionRequest) -> Option<AdmissionResponse> {
        let target = self.scheme.target();
        if &request.resource != target {
            warn!(
                uid = %request.uid,
                resource = %request.resource,
                "expect resource to be {target}"
            );
            return match self.unmatched {
                UnmatchedPolicy::Skip => None,
                UnmatchedPolicy::Allow => Some(AdmissionResponse::allow(&request.uid)),
            };
        }

        let response = match self.mutate_request(request) {
            Ok(patch) => AdmissionResponse::allow(&request.uid).with_json_patch(patch),
            Err(err) => {
                if let Error::ResourceDecode { kind, .. } = &err {
                    error!(uid = %request.uid, %kind, "failed to decode object: {err}");
                } else {
                    error!(uid = %request.uid, "failed to mutate object: {err}");
                }
                AdmissionResponse::deny(&request.uid, err.to_string())
            }
        };
        Some(response)
    }

    fn mutate_request(&self, request: &AdmissionRequest) -> Result<Vec<u8>> {
        let raw = request.raw_object().ok_or(Error::MissingObject)?;
        let (tf, _) = decode_terraform(raw)?;
        let mutated = mutate(&tf, &self.service_name)?;
        let patch = diff_resource(raw, &mutated)?;

        for op in &patch.0 {
            debug!(uid = %request.uid, ?op, "patch operation");
        }
        info!(
            uid = %request.uid,
            operations = patch.0.len(),
            "admitted Terraform with patch"
        );
        encode_patch(&patch)
    }
}

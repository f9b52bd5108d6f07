use crate::review::GroupVersionResource;

use kube::core::TypeMeta;
use tfo_terraform::crd::Terraform;

pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
pub const ADMISSION_KIND: &str = "AdmissionReview";

/// Immutable type registry shared by every request.
///
/// It knows exactly one envelope schema and exactly one target resource.
#[derive(Clone, Debug, PartialEq)]
pub struct Scheme {
    review: TypeMeta,
    target: GroupVersionResource,
}

impl Scheme {
    pub fn new(target: GroupVersionResource) -> Self {
        Self {
            review: TypeMeta {
                api_version: ADMISSION_API_VERSION.to_string(),
                kind: ADMISSION_KIND.to_string(),
            },
            target,
        }
    }

    /// Scheme targeting `terraforms.tf.galleybytes.com/v1alpha2`.
    pub fn terraform() -> Self {
        Self::new(GroupVersionResource::of::<Terraform>())
    }

    pub fn review(&self) -> &TypeMeta {
        &self.review
    }

    pub fn target(&self) -> &GroupVersionResource {
        &self.target
    }

    #[inline]
    pub fn recognizes(&self, api_version: &str, kind: &str) -> bool {
        self.review.api_version == api_version && self.review.kind == kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terraform_scheme() {
        let scheme = Scheme::terraform();
        assert_eq!(
            scheme.target(),
            &GroupVersionResource {
                group: "tf.galleybytes.com".to_string(),
                version: "v1alpha2".to_string(),
                resource: "terraforms".to_string(),
            }
        );
        assert_eq!(scheme.review().api_version, "admission.k8s.io/v1");
        assert_eq!(scheme.review().kind, "AdmissionReview");
    }

    #[test]
    fn test_recognizes_only_v1_review() {
        let scheme = Scheme::terraform();
        assert!(scheme.recognizes("admission.k8s.io/v1", "AdmissionReview"));
        assert!(!scheme.recognizes("admission.k8s.io/v1beta1", "AdmissionReview"));
        assert!(!scheme.recognizes("admission.k8s.io/v1", "ConversionReview"));
    }
}

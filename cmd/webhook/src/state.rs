use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tfo_admission::AdmissionController;

#[derive(Clone)]
pub struct WebhookState {
    pub controller: Arc<AdmissionController>,
    /// Cleared once graceful shutdown starts so `/readyz` fails.
    pub ready: Arc<AtomicBool>,
}

impl WebhookState {
    pub fn new(controller: AdmissionController) -> Self {
        Self {
            controller: Arc::new(controller),
            ready: Arc::new(AtomicBool::new(true)),
        }
    }
}

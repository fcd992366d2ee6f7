//! Job submission.

use std::sync::Arc;

use tracing::{info, warn};

use crate::converter::{ConversionParams, ConverterKind, EndpointDescriptor};
use crate::file::{JobId, ManagedFile};
use crate::metrics;
use crate::service::{ConversionService, SubmitError, UploadRequest};

/// Sends one file plus its parameters to the service and returns the job id.
pub struct JobSubmitter<S: ?Sized> {
    service: Arc<S>,
    kind: ConverterKind,
    endpoint: EndpointDescriptor,
}

impl<S: ?Sized> Clone for JobSubmitter<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            kind: self.kind,
            endpoint: self.endpoint,
        }
    }
}

impl<S> JobSubmitter<S>
where
    S: ConversionService + ?Sized,
{
    pub fn new(service: Arc<S>, kind: ConverterKind) -> Self {
        Self {
            service,
            kind,
            endpoint: kind.endpoint(),
        }
    }

    pub fn kind(&self) -> ConverterKind {
        self.kind
    }

    /// Submit `file`. Makes exactly one network call, or none if a required
    /// parameter is missing.
    pub async fn submit(
        &self,
        file: &ManagedFile,
        params: &ConversionParams,
    ) -> Result<JobId, SubmitError> {
        let kind = self.kind.as_str();

        if let Err(e) = params.check_required(self.kind.required_params()) {
            let err = SubmitError::from(e);
            warn!(kind, file_id = %file.id(), error = %err, "Refusing to submit file");
            metrics::SUBMISSIONS_TOTAL
                .with_label_values(&[kind, err.code()])
                .inc();
            return Err(err);
        }

        let upload = UploadRequest {
            file_name: file.name().to_string(),
            payload: file.payload().clone(),
            fields: params.form_fields(),
        };

        match self.service.submit(&self.endpoint, upload).await {
            Ok(job_id) => {
                info!(
                    kind,
                    file_id = %file.id(),
                    job_id = %job_id,
                    size = file.size_bytes(),
                    "Submitted conversion job"
                );
                metrics::SUBMISSIONS_TOTAL
                    .with_label_values(&[kind, "ok"])
                    .inc();
                Ok(job_id)
            }
            Err(err) => {
                warn!(
                    kind,
                    file_id = %file.id(),
                    error = %err,
                    "Submission failed"
                );
                metrics::SUBMISSIONS_TOTAL
                    .with_label_values(&[kind, err.code()])
                    .inc();
                Err(err)
            }
        }
    }
}

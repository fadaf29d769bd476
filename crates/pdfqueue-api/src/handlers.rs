//! Handlers the standalone server registers for the well-known functions.
//!
//! Rendering and mail delivery live in the host application; this process
//! only records that the call was due.

use async_trait::async_trait;
use tracing::info;

use pdfqueue_core::domain::TaskExecutionError;
use pdfqueue_core::typed::{CleanupPdfs, CreatePdf, Handler, SendNotification};

pub struct LogOnly;

#[async_trait]
impl Handler<CreatePdf> for LogOnly {
    async fn handle(&self, call: CreatePdf) -> Result<(), TaskExecutionError> {
        info!(entry_id = call.entry_id, pdf_id = %call.pdf_id, "create_pdf");
        Ok(())
    }
}

#[async_trait]
impl Handler<SendNotification> for LogOnly {
    async fn handle(&self, call: SendNotification) -> Result<(), TaskExecutionError> {
        info!(
            form_id = call.form_id,
            entry_id = call.entry_id,
            notification = %call.notification.name,
            "send_notification"
        );
        Ok(())
    }
}

#[async_trait]
impl Handler<CleanupPdfs> for LogOnly {
    async fn handle(&self, call: CleanupPdfs) -> Result<(), TaskExecutionError> {
        info!(form_id = call.form_id, entry_id = call.entry_id, "cleanup_pdfs");
        Ok(())
    }
}

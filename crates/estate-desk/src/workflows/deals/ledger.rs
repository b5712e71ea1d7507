//! Records hanging off a deal: notes, document metadata, and the audit trail.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use super::service::DealEngine;
use crate::workflows::domain::{
    Actor, AuditAction, Deal, DealAuditEntry, DealDocument, DealDocumentId, DealDocumentType,
    DealId, DealNote, NewAuditEntry, NewDealDocument, NewDealNote,
};
use crate::workflows::error::{ConflictReason, PipelineError};
use crate::workflows::notifications::{Notification, NotificationPublisher};
use crate::workflows::repository::{PipelineStore, PipelineTransaction};
use crate::workflows::validation::{required_text, DEAL_NOTE_MAX_CHARS};

const FILENAME_MAX_CHARS: usize = 255;
const URL_MAX_CHARS: usize = 2048;

#[derive(Debug, Clone, Deserialize)]
pub struct AddDealNoteRequest {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddDealDocumentRequest {
    #[serde(default)]
    pub doc_type: Option<DealDocumentType>,
    pub filename: String,
    pub url: String,
}

impl<S, N> DealEngine<S, N>
where
    S: PipelineStore,
    N: NotificationPublisher,
{
    fn visible_deal(&self, actor: &Actor, id: DealId) -> Result<Deal, PipelineError> {
        self.store
            .fetch_deal(id)?
            .filter(|deal| deal.involves(actor))
            .ok_or(PipelineError::NotFound("deal"))
    }

    pub fn list_notes(&self, actor: &Actor, id: DealId) -> Result<Vec<DealNote>, PipelineError> {
        let deal = self.visible_deal(actor, id)?;
        Ok(self.store.deal_notes(deal.id)?)
    }

    pub fn add_note(
        &self,
        actor: &Actor,
        id: DealId,
        request: AddDealNoteRequest,
    ) -> Result<DealNote, PipelineError> {
        let content = required_text("content", &request.content, DEAL_NOTE_MAX_CHARS)?;

        let mut tx = self.store.begin()?;
        let deal = tx
            .lock_deal(id)?
            .filter(|deal| deal.involves(actor))
            .ok_or(PipelineError::NotFound("deal"))?;
        if deal.status.is_terminal() && !actor.is_admin() {
            return Err(ConflictReason::DealNotesLocked.into());
        }

        let note = self.store.insert_deal_note(NewDealNote {
            deal_id: deal.id,
            author_id: actor.id,
            content,
            created_at: self.clock.now(),
        })?;
        tx.commit()?;

        tracing::info!(deal_id = %deal.id, note_id = %note.id, "deal note added");
        Ok(note)
    }

    pub fn list_documents(
        &self,
        actor: &Actor,
        id: DealId,
    ) -> Result<Vec<DealDocument>, PipelineError> {
        let deal = self.visible_deal(actor, id)?;
        Ok(self.store.deal_documents(deal.id)?)
    }

    /// Register uploaded file metadata. Storage of the bytes happens upstream.
    pub fn add_document(
        &self,
        actor: &Actor,
        id: DealId,
        request: AddDealDocumentRequest,
    ) -> Result<DealDocument, PipelineError> {
        let filename = required_text("filename", &request.filename, FILENAME_MAX_CHARS)?;
        let url = required_text("url", &request.url, URL_MAX_CHARS)?;

        let mut tx = self.store.begin()?;
        let deal = tx
            .lock_deal(id)?
            .filter(|deal| deal.involves(actor))
            .ok_or(PipelineError::NotFound("deal"))?;
        if !deal.status.allows_document_changes() {
            return Err(ConflictReason::DocumentsLocked.into());
        }

        let document = self.store.insert_document(NewDealDocument {
            deal_id: deal.id,
            uploaded_by: actor.id,
            doc_type: request.doc_type,
            filename,
            url,
            created_at: self.clock.now(),
        })?;
        tx.commit()?;

        tracing::info!(deal_id = %deal.id, document_id = %document.id, "deal document added");
        Ok(document)
    }

    /// Only the uploader or an admin removes a document.
    pub fn delete_document(
        &self,
        actor: &Actor,
        id: DealId,
        document_id: DealDocumentId,
    ) -> Result<(), PipelineError> {
        let mut tx = self.store.begin()?;
        let deal = tx
            .lock_deal(id)?
            .filter(|deal| deal.involves(actor))
            .ok_or(PipelineError::NotFound("deal"))?;
        if !deal.status.allows_document_changes() {
            return Err(ConflictReason::DocumentsLocked.into());
        }
        let document = self
            .store
            .fetch_document(deal.id, document_id)?
            .ok_or(PipelineError::NotFound("document"))?;
        if document.uploaded_by != actor.id && !actor.is_admin() {
            return Err(PipelineError::Forbidden);
        }

        self.store.delete_document(deal.id, document.id)?;
        tx.commit()?;

        tracing::info!(deal_id = %deal.id, document_id = %document.id, "deal document deleted");
        Ok(())
    }

    pub fn audit_trail(
        &self,
        actor: &Actor,
        id: DealId,
    ) -> Result<Vec<DealAuditEntry>, PipelineError> {
        let deal = self.visible_deal(actor, id)?;
        Ok(self.store.audit_trail(deal.id)?)
    }

    /// Best-effort audit write; failures are logged, never surfaced.
    pub(super) fn record_audit(
        &self,
        deal_id: DealId,
        actor: &Actor,
        action: AuditAction,
        metadata: Value,
    ) {
        let entry = NewAuditEntry {
            deal_id,
            actor_id: Some(actor.id),
            action,
            metadata,
            created_at: self.clock.now(),
        };
        if let Err(err) = self.store.append_audit(entry) {
            tracing::warn!(
                deal_id = %deal_id,
                action = action.label(),
                error = %err,
                "deal audit write failed"
            );
        }
    }

    /// Best-effort fan-out to every party on the deal.
    pub(super) fn notify_parties(&self, template: &str, deal: &Deal, details: BTreeMap<String, String>) {
        let recipients = [Some(deal.buyer_id), deal.seller_id, deal.agent_id];
        for recipient in recipients.into_iter().flatten() {
            let notification = Notification {
                template: template.to_string(),
                recipient,
                details: details.clone(),
            };
            if let Err(err) = self.notifications.publish(notification) {
                tracing::warn!(
                    deal_id = %deal.id,
                    recipient = %recipient,
                    template,
                    error = %err,
                    "notification dispatch failed"
                );
            }
        }
    }
}

//! Session and sequence tracking.
//!
//! Every client/server round-trip of the JavaScript refinement loop carries
//! the session id and the sequence number back as query evidence. This
//! element assigns a session id to new sessions and increments the sequence,
//! which the JSON builder uses to cap the number of round-trips.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::constants::{EVIDENCE_SEQUENCE, EVIDENCE_SESSIONID, SEQUENCE_ELEMENT_KEY};
use crate::evidence::{EvidenceKeyFilter, EvidenceKeyFilterWhitelist};
use crate::pipeline::{FlowData, FlowElement, PipelineError};
use crate::Result;

pub struct SequenceElement {
    filter: Arc<EvidenceKeyFilterWhitelist>,
}

impl SequenceElement {
    pub fn new() -> Self {
        Self {
            filter: Arc::new(EvidenceKeyFilterWhitelist::new([
                EVIDENCE_SESSIONID,
                EVIDENCE_SEQUENCE,
            ])),
        }
    }
}

impl Default for SequenceElement {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the sequence number from evidence.
pub fn sequence_number(data: &FlowData) -> std::result::Result<Option<u32>, PipelineError> {
    match data.get_evidence(EVIDENCE_SEQUENCE) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|e| PipelineError::InvalidEvidence {
                key: EVIDENCE_SEQUENCE.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[async_trait::async_trait]
impl FlowElement for SequenceElement {
    fn element_data_key(&self) -> &str {
        SEQUENCE_ELEMENT_KEY
    }

    fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
        self.filter.clone()
    }

    async fn process(&self, data: &FlowData) -> Result<()> {
        if data.get_evidence(EVIDENCE_SESSIONID).is_none() {
            let session_id = Uuid::new_v4().to_string();
            debug!(session_id = %session_id, "new session");
            data.add_evidence(EVIDENCE_SESSIONID, session_id);
        }

        let next = match sequence_number(data)? {
            Some(current) => current.saturating_add(1),
            None => 1,
        };
        data.add_evidence(EVIDENCE_SEQUENCE, next.to_string());
        Ok(())
    }
}

//! Built-in transmits and response injectors.

use crate::domain::{RequestEnvelope, ResponseEnvelope, HIDDEN_KEY_APP_ID, HIDDEN_KEY_CALL_ID};
use crate::invoker::Exporter;
use crate::ports::{ResponseInjector, Transmit};

/// Copies the caller's application id from the session into `.appId`,
/// unless the request already carries one.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppIdTransmit;

impl Transmit for AppIdTransmit {
    fn restore(&self, request: &mut RequestEnvelope) {
        if request.context.attachment(HIDDEN_KEY_APP_ID).is_some() {
            return;
        }
        let app_id = request
            .session
            .as_ref()
            .and_then(|session| session.remote_app_id());
        if let Some(app_id) = app_id {
            request.context.set_attachment(HIDDEN_KEY_APP_ID, app_id);
        }
    }
}

/// Echoes the call id in every response
#[derive(Debug, Default, Clone, Copy)]
pub struct CallIdInjection;

impl ResponseInjector for CallIdInjection {
    fn inject(
        &self,
        request: &RequestEnvelope,
        response: &mut ResponseEnvelope,
        _exporter: Option<&Exporter>,
    ) {
        response
            .attachments
            .insert(HIDDEN_KEY_CALL_ID.to_string(), request.context.call_id.to_string());
    }
}

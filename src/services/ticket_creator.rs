use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::{TdxConfig, WebClientConfig};
use crate::models::{Feedback, TicketId, TicketPayload};
use crate::providers::StructuredLogger;
use crate::services::tdx_client::{TdxApi, TdxClient};
use crate::utils::error::{AppError, Result};
use crate::utils::json::{lookup_path, JsonMap};

pub const TITLE_MESSAGE_CHARS: usize = 80;
pub const CONTEXT_SEPARATOR: &str = "\n--- Context ---\n";

/// Why no ticket was created
#[derive(Debug)]
pub enum TicketFailure {
    /// Ticket creation is switched off; the expected path, not an error
    Disabled,
    Request(AppError),
}

impl fmt::Display for TicketFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketFailure::Disabled => f.write_str("Ticket creation disabled"),
            TicketFailure::Request(error) => write!(f, "{}", error),
        }
    }
}

/// Outcome of one ticket-creation attempt
#[derive(Debug)]
pub enum TicketResult {
    Created {
        ticket_id: Option<TicketId>,
        response: JsonMap,
    },
    Failed {
        error: TicketFailure,
    },
}

impl TicketResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TicketResult::Created { .. })
    }

    pub fn ticket_id(&self) -> Option<&TicketId> {
        match self {
            TicketResult::Created { ticket_id, .. } => ticket_id.as_ref(),
            TicketResult::Failed { .. } => None,
        }
    }

    pub fn response(&self) -> Option<&JsonMap> {
        match self {
            TicketResult::Created { response, .. } => Some(response),
            TicketResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&TicketFailure> {
        match self {
            TicketResult::Created { .. } => None,
            TicketResult::Failed { error } => Some(error),
        }
    }
}

/// Prefers a top-level `ID`, then `data.ID`
pub fn extract_ticket_id(response: &JsonMap) -> Option<TicketId> {
    lookup_path(response, &["ID"])
        .and_then(TicketId::from_value)
        .or_else(|| lookup_path(response, &["data", "ID"]).and_then(TicketId::from_value))
}

/// Turns feedback submissions into TDX tickets.
///
/// [`TicketCreator::call`] never returns an error: every failure, including a
/// disabled configuration, comes back as [`TicketResult::Failed`] so the
/// caller can accept the feedback regardless.
#[derive(Clone)]
pub struct TicketCreator {
    config: TdxConfig,
    client: Arc<dyn TdxApi>,
}

impl TicketCreator {
    pub fn new(config: TdxConfig, client: Arc<dyn TdxApi>) -> Self {
        Self { config, client }
    }

    pub fn from_config(config: TdxConfig, webclient: &WebClientConfig) -> Result<Self> {
        let client = TdxClient::new(&config, webclient)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &TdxConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enable_ticket_creation
    }

    pub async fn call(&self, feedback: &Feedback, requestor_email: Option<&str>) -> TicketResult {
        self.call_with_attributes(feedback, requestor_email, Vec::<(String, Value)>::new())
            .await
    }

    /// Like [`call`](Self::call), merging `extra_attributes` into the payload
    /// last so they override computed fields.
    pub async fn call_with_attributes<K, V, I>(
        &self,
        feedback: &Feedback,
        requestor_email: Option<&str>,
        extra_attributes: I,
    ) -> TicketResult
    where
        K: fmt::Display,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        if !self.is_enabled() {
            return TicketResult::Failed {
                error: TicketFailure::Disabled,
            };
        }

        let payload = self.build_payload(feedback, requestor_email, extra_attributes);

        match self.submit(payload).await {
            Ok(response) => {
                let ticket_id = extract_ticket_id(&response);
                StructuredLogger::log_info(
                    "TDX ticket created",
                    None,
                    Some(json!({ "ticket_id": ticket_id.as_ref().map(|id| id.to_string()) })),
                );
                TicketResult::Created {
                    ticket_id,
                    response,
                }
            }
            Err(error) => {
                StructuredLogger::log_warning(
                    &format!("TDX ticket creation failed: {}", error),
                    None,
                    Some(json!({ "status": error.status(), "body": error.body() })),
                );
                TicketResult::Failed {
                    error: TicketFailure::Request(error),
                }
            }
        }
    }

    async fn submit(&self, payload: TicketPayload) -> Result<JsonMap> {
        let app_id = self.app_id()?;
        self.client.create_ticket(&app_id, payload, Vec::new()).await
    }

    /// Adds a comment to an existing ticket through its feed
    pub async fn post_comment(&self, ticket_id: &TicketId, comments: &str) -> Result<JsonMap> {
        if !self.is_enabled() {
            return Err(AppError::configuration("Ticket creation disabled"));
        }

        let app_id = self.app_id()?;
        let payload = json!({
            "Comments": comments,
            "IsPrivate": false,
            "IsRichHtml": false,
        });

        self.client
            .post_feed(&app_id, &ticket_id.to_string(), payload)
            .await
    }

    fn app_id(&self) -> Result<String> {
        self.config
            .app_id
            .map(|id| id.to_string())
            .ok_or_else(|| AppError::configuration("app_id is missing"))
    }

    pub fn build_payload<K, V, I>(
        &self,
        feedback: &Feedback,
        requestor_email: Option<&str>,
        extra_attributes: I,
    ) -> TicketPayload
    where
        K: fmt::Display,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let config = &self.config;
        let mut payload = TicketPayload::new();

        payload
            .insert("TypeID", config.type_id)
            .insert_opt("FormID", config.form_id)
            .insert_opt("ServiceOfferingID", config.service_offering_id)
            .insert("StatusID", config.status_id)
            .insert("SourceID", config.source_id)
            .insert("ServiceID", config.service_id)
            .insert("ResponsibleGroupID", config.responsible_group_id)
            .insert_opt("AccountID", config.account_id)
            .insert("Title", self.build_title(&feedback.message))
            .insert("Description", build_description(feedback))
            .insert("IsRichHtml", false);

        let requestor_email = requestor_email
            .map(str::to_string)
            .or_else(|| config.default_requestor_email.clone());
        payload.insert_opt("RequestorEmail", requestor_email);

        payload.merge(extra_attributes);
        payload
    }

    /// Prefix plus the first 80 characters of the message on a single line.
    ///
    /// Truncation counts Unicode scalar values, so multi-byte text is never
    /// split mid-character.
    pub fn build_title(&self, message: &str) -> String {
        let excerpt: String = message
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .take(TITLE_MESSAGE_CHARS)
            .collect();

        match self
            .config
            .title_prefix
            .as_deref()
            .filter(|prefix| !prefix.trim().is_empty())
        {
            Some(prefix) => format!("{} {}", prefix, excerpt),
            None => excerpt,
        }
    }
}

pub fn build_description(feedback: &Feedback) -> String {
    match feedback.present_context() {
        Some(context) => format!("{}{}{}", feedback.message, CONTEXT_SEPARATOR, context),
        None => feedback.message.clone(),
    }
}

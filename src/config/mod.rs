use std::collections::HashMap;
use std::path::PathBuf;

use config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

pub const DEFAULT_OAUTH_SCOPE: &str = "tdxticket";
pub const DEFAULT_TITLE_PREFIX: &str = "[Feedback]";

const PRODUCTION_BASE_URL: &str = "https://gw.api.it.umich.edu/um/it";
const PRODUCTION_TOKEN_URL: &str = "https://gw.api.it.umich.edu/um/oauth2/token";
const TEST_BASE_URL: &str = "https://gw-test.api.it.umich.edu/um/it";
const TEST_TOKEN_URL: &str = "https://gw-test.api.it.umich.edu/um/oauth2/token";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub webclient: WebClientConfig,
    pub tdx: TdxConfig,
    pub feedback: FeedbackConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_host: String,
    pub listen_port: u16,
    pub feedback_path: String,
    pub request_timeout: u64,
    pub max_body_bytes: usize,
}

/// Timeouts in seconds for calls to the TDX gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebClientConfig {
    pub connect_timeout: u64,
    pub timeout: u64,
}

impl Default for WebClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 5,
            timeout: 15,
        }
    }
}

/// TeamDynamix gateway credentials and ticket defaults.
///
/// IDs map one-to-one onto the TDX CreateTicket schema. `form_id`,
/// `service_offering_id` and `account_id` are only sent when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TdxConfig {
    pub enable_ticket_creation: bool,
    pub base_url: Option<String>,
    pub oauth_token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub oauth_scope: String,
    pub app_id: Option<i64>,
    pub type_id: Option<i64>,
    pub form_id: Option<i64>,
    pub service_offering_id: Option<i64>,
    pub status_id: Option<i64>,
    pub source_id: Option<i64>,
    pub service_id: Option<i64>,
    pub responsible_group_id: Option<i64>,
    pub account_id: Option<i64>,
    pub title_prefix: Option<String>,
    pub default_requestor_email: Option<String>,
}

impl Default for TdxConfig {
    fn default() -> Self {
        Self {
            enable_ticket_creation: false,
            base_url: None,
            oauth_token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            oauth_scope: DEFAULT_OAUTH_SCOPE.to_string(),
            app_id: None,
            type_id: None,
            form_id: None,
            service_offering_id: None,
            status_id: None,
            source_id: None,
            service_id: None,
            responsible_group_id: None,
            account_id: None,
            title_prefix: Some(DEFAULT_TITLE_PREFIX.to_string()),
            default_requestor_email: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub require_authentication: bool,
    /// Header carrying the authenticated user's email, set by the fronting proxy
    pub requestor_email_header: String,
    pub max_context_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub level: String,
    pub dir: String,
    pub file_name: String,
    pub max_backups: usize,
    pub local_time: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        ConfigLoader::from_env().load()
    }

    /// Non-fatal configuration problems, meant to be logged at startup
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let tdx = &self.tdx;

        if tdx.enable_ticket_creation {
            let ids = [
                ("app_id", tdx.app_id),
                ("type_id", tdx.type_id),
                ("form_id", tdx.form_id),
                ("service_offering_id", tdx.service_offering_id),
                ("status_id", tdx.status_id),
                ("source_id", tdx.source_id),
                ("service_id", tdx.service_id),
                ("responsible_group_id", tdx.responsible_group_id),
            ];
            let missing: Vec<&str> = ids
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();
            if !missing.is_empty() {
                warnings.push(format!(
                    "Ticket creation enabled but required IDs are missing: {}",
                    missing.join(", ")
                ));
            }

            let blank_base_url = tdx.base_url.as_deref().map_or(true, |u| u.trim().is_empty());
            if blank_base_url || tdx.oauth_token_url.trim().is_empty() {
                warnings.push("Ticket creation enabled but TDX base URL or token URL is empty".to_string());
            }
            if tdx.client_id.trim().is_empty() || tdx.client_secret.trim().is_empty() {
                warnings.push("Ticket creation enabled but TDX client credentials are empty".to_string());
            }
        }

        warnings
    }
}

/// Resolves [`AppConfig`] from layered sources.
///
/// Lowest to highest precedence: built-in defaults for the environment,
/// `TDX_*` variables, `config.yaml`, `config.<environment>.yaml`, and finally
/// `APP__SECTION__KEY` variables.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    dir: PathBuf,
    environment: String,
    vars: HashMap<String, String>,
}

impl ConfigLoader {
    pub fn new(dir: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            environment: environment.into(),
            vars: HashMap::new(),
        }
    }

    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let environment = vars
            .get("APP_ENV")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "development".to_string());

        Self {
            dir: PathBuf::from("."),
            environment,
            vars,
        }
    }

    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn load(&self) -> Result<AppConfig> {
        let (base_url, token_url) = if self.is_production() {
            (PRODUCTION_BASE_URL, PRODUCTION_TOKEN_URL)
        } else {
            (TEST_BASE_URL, TEST_TOKEN_URL)
        };

        let enable_ticket_creation = self
            .var("TDX_ENABLE_TICKET_CREATION")
            .map(truthy)
            .unwrap_or(false);

        let app_vars: config::Map<String, String> = self
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let settings = config::Config::builder()
            .set_default("server.listen_host", "0.0.0.0")?
            .set_default("server.listen_port", 8080_i64)?
            .set_default("server.feedback_path", "/feedbacks")?
            .set_default("server.request_timeout", 30_i64)?
            .set_default("server.max_body_bytes", 64_i64 * 1024)?
            .set_default("webclient.connect_timeout", 5_i64)?
            .set_default("webclient.timeout", 15_i64)?
            .set_default("tdx.base_url", self.var("TDX_BASE_URL").unwrap_or(base_url))?
            .set_default(
                "tdx.oauth_token_url",
                self.var("TDX_OAUTH_TOKEN_URL").unwrap_or(token_url),
            )?
            .set_default("tdx.client_id", self.var("TDX_CLIENT_ID").unwrap_or_default())?
            .set_default(
                "tdx.client_secret",
                self.var("TDX_CLIENT_SECRET").unwrap_or_default(),
            )?
            .set_default("tdx.enable_ticket_creation", enable_ticket_creation)?
            .set_default("feedback.require_authentication", false)?
            .set_default("feedback.requestor_email_header", "x-user-email")?
            .set_default("feedback.max_context_length", 10_000_i64)?
            .set_default("logger.level", "info")?
            .set_default("logger.dir", "log")?
            .set_default("logger.file_name", "tdx-feedback")?
            .set_default("logger.max_backups", 7_i64)?
            .set_default("logger.local_time", false)?
            .add_source(
                File::from(self.dir.join("config.yaml"))
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::from(self.dir.join(format!("config.{}.yaml", self.environment)))
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .source(Some(app_vars)),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

/// Only `true` enables a flag, case-insensitively; `1`, `yes` and the like do not
pub fn truthy(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

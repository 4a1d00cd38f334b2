use std::path::PathBuf;

use clap::Parser;
use url::Url;

use actionctl::action::{ActionRequest, Confirmation, FormPayload, TargetScope, TriggerElement};
use actionctl::config::AppConfig;
use actionctl::error::{ActionError, Result};
use actionctl::presentation::TerminalPresenterOptions;

/// actionctl: run an admin action and follow its live log
#[derive(Parser, Debug, Clone)]
#[command(name = "actionctl")]
#[command(version)]
#[command(about = "Run admin actions and stream their logs", long_about = None)]
pub struct Cli {
    /// Name of the action to run
    pub action: String,

    /// Admin page the action belongs to. The log stream endpoint is derived
    /// from it; defaults to the action URL.
    #[arg(long, env = "ACTIONCTL_PAGE_URL")]
    pub page_url: Option<String>,

    /// Collection action endpoint
    #[arg(long, env = "ACTIONCTL_ACTION_URL")]
    pub action_url: Option<String>,

    /// Row action endpoint; defaults to the action URL
    #[arg(long, env = "ACTIONCTL_ROW_ACTION_URL")]
    pub row_action_url: Option<String>,

    /// Run as a row action against the first --pk
    #[arg(long, default_value_t = false)]
    pub row: bool,

    /// Selected primary key (repeatable)
    #[arg(long = "pk", value_name = "PK")]
    pub pks: Vec<String>,

    /// The action answers with its own response (a download, a redirect)
    #[arg(long, default_value_t = false)]
    pub custom_response: bool,

    /// Form field sent with the action (repeatable)
    #[arg(long = "form", value_name = "KEY=VALUE", value_parser = parse_form_field)]
    pub form: Vec<(String, String)>,

    /// Ask for confirmation with this message before running
    #[arg(long, value_name = "MESSAGE")]
    pub confirm: Option<String>,

    /// Write a custom response body here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Identifier reported back with the result
    #[arg(long, default_value = "cli")]
    pub trigger: String,

    /// Close the log as soon as it is complete
    #[arg(long, default_value_t = false)]
    pub no_wait: bool,

    /// Copy the finished log to the clipboard
    #[arg(long, default_value_t = false)]
    pub copy_log: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

fn parse_form_field(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Endpoints after merging flags over the config file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub page_url: Url,
    pub action_url: Url,
    pub row_action_url: Url,
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ActionError::invalid_url(raw, e))
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn log_level(&self, config: &AppConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    pub fn endpoints(&self, config: &AppConfig) -> Result<Endpoints> {
        let admin = &config.admin;
        let action_raw = self
            .action_url
            .as_deref()
            .or(admin.action_url.as_deref())
            .ok_or(ActionError::MissingSetting("action_url"))?;
        let action_url = parse_url(action_raw)?;

        let row_action_url = match self.row_action_url.as_deref().or(admin.row_action_url.as_deref()) {
            Some(raw) => parse_url(raw)?,
            None => action_url.clone(),
        };
        let page_url = match self.page_url.as_deref().or(admin.page_url.as_deref()) {
            Some(raw) => parse_url(raw)?,
            None => action_url.clone(),
        };

        Ok(Endpoints {
            page_url,
            action_url,
            row_action_url,
        })
    }

    pub fn presenter_options(&self, config: &AppConfig) -> TerminalPresenterOptions {
        TerminalPresenterOptions {
            auto_dismiss: self.no_wait || config.presentation.auto_dismiss,
            copy_log_on_finalize: self.copy_log || config.presentation.copy_log_on_finalize,
        }
    }

    pub fn request(&self) -> ActionRequest {
        let scope = if self.row {
            TargetScope::Row
        } else {
            TargetScope::Collection
        };
        let mut request = ActionRequest::new(&self.action, TriggerElement::new(&self.trigger))
            .with_scope(scope)
            .with_custom_response(self.custom_response);
        if !self.form.is_empty() && self.confirm.is_none() {
            request = request.with_form(self.form_payload());
        }
        request
    }

    /// Fields submitted with the confirmation dialog
    pub fn form_payload(&self) -> FormPayload {
        self.form.iter().cloned().collect()
    }

    pub fn confirmation(&self) -> Option<Confirmation> {
        self.confirm.as_deref().map(Confirmation::new)
    }
}

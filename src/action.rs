//! Action data model: requests, correlation tokens and outcomes

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which endpoint an action is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetScope {
    /// Bulk action over the current selection
    #[default]
    Collection,
    /// Action bound to one row
    Row,
}

impl fmt::Display for TargetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetScope::Collection => write!(f, "collection"),
            TargetScope::Row => write!(f, "row"),
        }
    }
}

/// Opaque handle for whatever triggered the action.
///
/// The controller never inspects it; it is handed to the parameter appender
/// and back to the result callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TriggerElement(String);

impl TriggerElement {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TriggerElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Form fields submitted with an action, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormPayload {
    fields: Vec<(String, String)>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a multipart body, the same shape a browser sends for a form submit
    pub fn to_multipart(&self) -> reqwest::multipart::Form {
        self.fields
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, (k, v)| {
                form.text(k.clone(), v.clone())
            })
    }
}

impl FromIterator<(String, String)> for FormPayload {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A single action invocation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    name: String,
    scope: TargetScope,
    form: Option<FormPayload>,
    trigger: TriggerElement,
    custom_response: bool,
}

impl ActionRequest {
    pub fn new(name: impl Into<String>, trigger: TriggerElement) -> Self {
        Self {
            name: name.into(),
            scope: TargetScope::Collection,
            form: None,
            trigger,
            custom_response: false,
        }
    }

    pub fn with_scope(mut self, scope: TargetScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_form(mut self, form: FormPayload) -> Self {
        self.form = Some(form);
        self
    }

    pub fn with_custom_response(mut self, custom_response: bool) -> Self {
        self.custom_response = custom_response;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> TargetScope {
        self.scope
    }

    pub fn form(&self) -> Option<&FormPayload> {
        self.form.as_ref()
    }

    pub fn trigger(&self) -> &TriggerElement {
        &self.trigger
    }

    pub fn custom_response(&self) -> bool {
        self.custom_response
    }
}

/// What the host shows before a confirmation-gated action is submitted
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Confirmation {
    pub message: String,
    pub submit_label: String,
    pub submit_style: String,
}

impl Confirmation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            submit_label: "Yes, Proceed".to_string(),
            submit_style: "btn-primary".to_string(),
        }
    }
}

/// One-time identifier linking an invocation to its log stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Normalized result of an in-place action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action_name: String,
    pub trigger: TriggerElement,
    pub message: String,
    pub is_error: bool,
}

impl ActionOutcome {
    pub fn success(request: &ActionRequest, message: impl Into<String>) -> Self {
        Self {
            action_name: request.name().to_string(),
            trigger: request.trigger().clone(),
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(request: &ActionRequest, message: impl Into<String>) -> Self {
        Self {
            action_name: request.name().to_string(),
            trigger: request.trigger().clone(),
            message: message.into(),
            is_error: true,
        }
    }
}

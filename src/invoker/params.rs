//! Query parameter hooks
//!
//! The host decides which extra parameters an action carries (usually the
//! current selection); the invoker only asks for them right before building
//! the request URL.

use crate::action::{ActionRequest, TargetScope};

pub trait ParamAppender: Send + Sync {
    fn append(&self, request: &ActionRequest, params: &mut Vec<(String, String)>);
}

/// Appends nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoParams;

impl ParamAppender for NoParams {
    fn append(&self, _request: &ActionRequest, _params: &mut Vec<(String, String)>) {}
}

/// Appends one `pks` parameter per selected row.
///
/// Row-scoped actions send only the first id as `pk`, which is what the
/// row action endpoint reads.
#[derive(Debug, Default, Clone)]
pub struct SelectedRows {
    pks: Vec<String>,
}

impl SelectedRows {
    pub fn new(pks: Vec<String>) -> Self {
        Self { pks }
    }
}

impl ParamAppender for SelectedRows {
    fn append(&self, request: &ActionRequest, params: &mut Vec<(String, String)>) {
        match request.scope() {
            TargetScope::Collection => {
                params.extend(self.pks.iter().map(|pk| ("pks".to_string(), pk.clone())));
            }
            TargetScope::Row => {
                if let Some(pk) = self.pks.first() {
                    params.push(("pk".to_string(), pk.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::TriggerElement;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_selected_rows_collection() {
        let rows = SelectedRows::new(vec!["1".into(), "2".into()]);
        let req = ActionRequest::new("delete", TriggerElement::default());
        let mut params = Vec::new();
        rows.append(&req, &mut params);
        assert_eq!(
            params,
            vec![
                ("pks".to_string(), "1".to_string()),
                ("pks".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_selected_rows_row_scope_uses_first() {
        let rows = SelectedRows::new(vec!["9".into(), "10".into()]);
        let req = ActionRequest::new("approve", TriggerElement::default())
            .with_scope(TargetScope::Row);
        let mut params = Vec::new();
        rows.append(&req, &mut params);
        assert_eq!(params, vec![("pk".to_string(), "9".to_string())]);
    }

    #[test]
    fn test_no_params() {
        let mut params = Vec::new();
        NoParams.append(&ActionRequest::new("x", TriggerElement::default()), &mut params);
        assert!(params.is_empty());
    }
}

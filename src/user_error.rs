#[derive(Debug)]
pub struct UserError {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for UserError {}

impl UserError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn patch_not_found(patch_id: &str) -> anyhow::Error {
        anyhow::Error::new(
            Self::new("E_PATCH_NOT_FOUND", format!("patch not found: {patch_id}")).with_details(
                serde_json::json!({
                    "patch_id": patch_id,
                    "hint": "run `patchstack list` to see the known patch ids",
                }),
            ),
        )
    }

    pub fn patch_exists(patch_id: &str) -> anyhow::Error {
        anyhow::Error::new(
            Self::new("E_PATCH_EXISTS", format!("patch already exists: {patch_id}")).with_details(
                serde_json::json!({
                    "patch_id": patch_id,
                    "hint": "pick another --id, or `patchstack remove` the existing patch first",
                }),
            ),
        )
    }

    pub fn rebase_not_found(from_version: &str) -> anyhow::Error {
        anyhow::Error::new(
            Self::new(
                "E_REBASE_NOT_FOUND",
                format!("no rebase recorded from version {from_version}"),
            )
            .with_details(serde_json::json!({
                "rebase_id": from_version,
                "hint": "start one with `patchstack rebase <from> <to>`",
            })),
        )
    }

    pub fn rebase_finished(from_version: &str, status: &str) -> anyhow::Error {
        anyhow::Error::new(
            Self::new(
                "E_REBASE_FINISHED",
                format!("rebase from {from_version} is already {status}"),
            )
            .with_details(serde_json::json!({
                "rebase_id": from_version,
                "status": status,
                "hint": "start a new rebase with `patchstack rebase <from> <to>`",
            })),
        )
    }

    pub fn config_invalid(message: impl Into<String>, details: serde_json::Value) -> anyhow::Error {
        anyhow::Error::new(Self::new("E_CONFIG_INVALID", message).with_details(details))
    }
}

pub(crate) fn find_user_error(err: &anyhow::Error) -> Option<&UserError> {
    err.chain().find_map(|e| e.downcast_ref::<UserError>())
}

pub(crate) fn anyhow_error_parts_for_envelope(
    err: &anyhow::Error,
) -> (
    &'_ str,
    std::borrow::Cow<'_, str>,
    Option<serde_json::Value>,
) {
    let user_err = find_user_error(err);
    match user_err {
        Some(user_err) => (
            user_err.code.as_str(),
            std::borrow::Cow::Borrowed(user_err.message.as_str()),
            user_err.details.clone(),
        ),
        None => (
            "E_UNEXPECTED",
            std::borrow::Cow::Owned(err.to_string()),
            None,
        ),
    }
}

/// Returns the stable code of the first `UserError` in the chain.
pub fn error_code(err: &anyhow::Error) -> Option<&str> {
    find_user_error(err).map(|e| e.code.as_str())
}

use crate::user_error::find_user_error;

/// Prints a `UserError` for humans on stderr. Returns false when `err` carries none.
pub(crate) fn print_user_error_human(err: &anyhow::Error) -> bool {
    let Some(user_err) = find_user_error(err) else {
        return false;
    };

    eprintln!("error[{}]: {}", user_err.code, user_err.message);

    let Some(details) = user_err.details.as_ref() else {
        return true;
    };

    if let Some(error) = details.get("error").and_then(|v| v.as_str()) {
        eprintln!("  cause: {error}");
    }

    if let Some(conflicts) = details.get("conflicts").and_then(|v| v.as_array()) {
        for conflict in conflicts {
            print_conflict_value(conflict);
        }
    }

    if let Some(hint) = details.get("hint").and_then(|v| v.as_str()) {
        eprintln!("hint: {hint}");
    }

    true
}

fn print_conflict_value(conflict: &serde_json::Value) {
    let str_field = |name: &str| conflict.get(name).and_then(|v| v.as_str());

    let patch = str_field("patchId").unwrap_or("-");
    let kind = str_field("kind").unwrap_or("conflict");
    let line = conflict
        .get("line")
        .and_then(|v| v.as_u64())
        .unwrap_or_default();
    let resolution = str_field("resolution")
        .map(|r| format!(" [{r}]"))
        .unwrap_or_default();

    eprintln!("  {patch} line {line}: {kind}{resolution}");
    eprintln!(
        "    expected: {:?}",
        str_field("expected").unwrap_or_default()
    );
    eprintln!("    actual:   {:?}", str_field("actual").unwrap_or_default());
}

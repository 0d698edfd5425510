mod common;

use common::{BUTTON_V1, TestEnv, button_with_default_size};

fn button_v2() -> String {
    format!("{BUTTON_V1}\nexport default Button;\n")
}

fn history(env: &TestEnv) -> Vec<serde_json::Value> {
    let (out, v) = env.run_json(&["history"]);
    assert!(out.status.success());
    v["data"]["rebases"].as_array().cloned().expect("rebases")
}

#[test]
fn clean_rebase_applies_and_bumps_upstream_version() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);

    // upstream moves on, away from the patched lines
    env.write_component("button.tsx", &button_v2());

    let (out, v) = env.run_json(&["rebase", "1.0.0", "2.0.0", "--apply"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));
    assert_eq!(v["data"]["success"], true);
    assert_eq!(v["data"]["applied"], 1);
    assert_eq!(
        env.read_component("button.tsx"),
        format!("{}\nexport default Button;\n", button_with_default_size())
    );

    let (_, v) = env.run_json(&["show", "button-size"]);
    assert_eq!(v["data"]["metadata"]["upstreamVersion"], "2.0.0");

    let records = history(&env);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["fromVersion"], "1.0.0");
    assert_eq!(records[0]["toVersion"], "2.0.0");
    assert_eq!(records[0]["status"], "completed");
}

#[test]
fn rebase_without_apply_leaves_sources_alone() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);

    let (out, v) = env.run_json(&["rebase", "1.0.0", "1.1.0"]);
    assert!(out.status.success());
    assert_eq!(v["data"]["status"], "in-progress");
    assert_eq!(env.read_component("button.tsx"), BUTTON_V1);

    let (out, v) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert!(out.status.success());
    assert_eq!(v["command"], "rebase-apply");
    assert_eq!(v["data"]["applied"], 1);
    assert_eq!(env.read_component("button.tsx"), button_with_default_size());
}

#[test]
fn conflicting_rebase_is_pending_until_resolved() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);

    let upstream = BUTTON_V1.replace("props.size", "props.variant");
    env.write_component("button.tsx", &upstream);

    let (out, v) = env.run_json(&["rebase", "1.0.0", "2.0.0", "--apply"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(v["errors"][0]["code"], "E_REBASE_CONFLICTS");
    assert_eq!(v["errors"][0]["details"]["status"], "pending");
    assert_eq!(
        v["errors"][0]["details"]["conflicts"][0]["patchId"],
        "button-size"
    );
    // --apply does nothing while conflicts are open
    assert_eq!(env.read_component("button.tsx"), upstream);
    assert_eq!(history(&env)[0]["status"], "pending");

    let (out, v) = env.run_json(&["resolve", "1.0.0", "other", "keep"]);
    assert!(!out.status.success());
    assert_eq!(v["errors"][0]["code"], "E_CONFLICT_NOT_FOUND");

    let (out, v) = env.run_json(&["resolve", "1.0.0", "button-size", "keep"]);
    assert!(out.status.success());
    assert_eq!(v["data"]["status"], "in-progress");
    assert_eq!(v["data"]["conflicts"][0]["resolution"], "keep");

    let (out, v) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert!(out.status.success());
    assert_eq!(v["data"]["skipped"], 1);
    assert_eq!(v["data"]["applied"], 0);
    assert_eq!(env.read_component("button.tsx"), upstream);
    assert_eq!(history(&env)[0]["status"], "completed");

    let (out, v) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert!(!out.status.success());
    assert_eq!(v["errors"][0]["code"], "E_REBASE_FINISHED");
}

#[test]
fn forced_apply_of_a_conflicting_patch_fails_the_rebase() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);
    let upstream = BUTTON_V1.replace("props.size", "props.variant");
    env.write_component("button.tsx", &upstream);

    let (out, _) = env.run_json(&["rebase", "1.0.0", "2.0.0"]);
    assert!(!out.status.success());
    let (out, _) = env.run_json(&["resolve", "1.0.0", "button-size", "apply"]);
    assert!(out.status.success());

    let (out, v) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(v["errors"][0]["code"], "E_REBASE_CONFLICTS");
    assert_eq!(v["errors"][0]["details"]["failed"], 1);
    assert_eq!(env.read_component("button.tsx"), upstream);
    assert_eq!(history(&env)[0]["status"], "failed");
}

#[test]
fn dependent_patch_is_skipped_when_its_dependency_fails() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.write_component("theme.css", ".btn {\n  color: red;\n}\n");
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);
    env.create_patch(
        "theme-size",
        "theme.css",
        ".btn {\n  color: red;\n  font-size: 14px;\n}\n",
        &["--depends-on", "button-size"],
    );

    env.write_component("button.tsx", &BUTTON_V1.replace("props.size", "props.variant"));
    let (out, _) = env.run_json(&["rebase", "1.0.0", "2.0.0"]);
    assert!(!out.status.success());
    let (out, _) = env.run_json(&["resolve", "1.0.0", "button-size", "manual"]);
    assert!(out.status.success());

    let (out, v) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert!(!out.status.success());
    let details = &v["errors"][0]["details"];
    assert_eq!(details["failed"], 1);
    assert_eq!(details["skipped"], 1);
    let kinds: Vec<&str> = details["conflicts"]
        .as_array()
        .expect("conflicts")
        .iter()
        .filter_map(|c| c["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"unmet_dependency"), "{kinds:?}");
    // the dependent file is untouched
    assert_eq!(env.read_component("theme.css"), ".btn {\n  color: red;\n}\n");
}

#[test]
fn dependency_cycle_skips_every_member_and_fails_the_rebase() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.write_component("theme.css", ".btn {\n  color: red;\n}\n");
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);
    env.create_patch(
        "theme-size",
        "theme.css",
        ".btn {\n  color: red;\n  font-size: 14px;\n}\n",
        &["--depends-on", "button-size"],
    );
    // close the loop by hand; create refuses unknown dependencies
    env.edit_patch_document("button-size", |doc| {
        doc["metadata"]["dependencies"] = serde_json::json!(["theme-size"]);
    });

    let (out, v) = env.run_json(&["rebase", "1.0.0", "2.0.0"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));
    assert_eq!(v["data"]["status"], "in-progress");

    let (out, v) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(v["errors"][0]["code"], "E_REBASE_CONFLICTS");
    let details = &v["errors"][0]["details"];
    assert_eq!(details["applied"], 0);
    assert_eq!(details["failed"], 0);
    assert_eq!(details["skipped"], 2);

    let conflicts = details["conflicts"].as_array().expect("conflicts");
    assert_eq!(conflicts.len(), 2);
    assert!(
        conflicts.iter().all(|c| c["kind"] == "dependency_cycle"),
        "{conflicts:?}"
    );
    let mut members: Vec<&str> = conflicts
        .iter()
        .filter_map(|c| c["patchId"].as_str())
        .collect();
    members.sort_unstable();
    assert_eq!(members, vec!["button-size", "theme-size"]);

    assert_eq!(history(&env)[0]["status"], "failed");
    assert_eq!(env.read_component("button.tsx"), BUTTON_V1);
    assert_eq!(env.read_component("theme.css"), ".btn {\n  color: red;\n}\n");
}

#[test]
fn unreadable_patch_document_is_reported_as_a_conflict() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);
    std::fs::write(env.patch_document_path("broken"), "{oops").expect("write broken patch");

    let (out, v) = env.run_json(&["list"]);
    assert!(out.status.success());
    assert_eq!(v["data"]["count"], 1);
    assert_eq!(v["data"]["unreadable"][0]["id"], "broken");
    assert_eq!(v["warnings"].as_array().map(Vec::len), Some(1));

    let (out, v) = env.run_json(&["rebase", "1.0.0", "2.0.0"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(v["errors"][0]["code"], "E_REBASE_CONFLICTS");
    let details = &v["errors"][0]["details"];
    assert_eq!(details["status"], "pending");
    assert_eq!(details["conflicts"][0]["kind"], "invalid_patch");
    assert_eq!(details["conflicts"][0]["patchId"], "broken");
    assert_eq!(history(&env).len(), 1);

    let out = env.run(&["report"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("## Unreadable patches"));

    let (out, _) = env.run_json(&["resolve", "1.0.0", "broken", "keep"]);
    assert!(out.status.success());
    let (out, v) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stdout));
    assert_eq!(v["data"]["applied"], 1);
    assert_eq!(v["data"]["skipped"], 1);
    assert_eq!(env.read_component("button.tsx"), button_with_default_size());
}

#[test]
fn history_is_append_only() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.create_patch("button-size", "button.tsx", &button_with_default_size(), &[]);

    assert!(env.run_json(&["rebase", "1.0.0", "1.1.0"]).0.status.success());
    assert!(env.run_json(&["rebase", "1.1.0", "1.2.0"]).0.status.success());
    assert!(env.run_json(&["rebase", "1.0.0", "1.3.0"]).0.status.success());

    let records = history(&env);
    let pairs: Vec<(&str, &str)> = records
        .iter()
        .map(|r| {
            (
                r["fromVersion"].as_str().unwrap_or_default(),
                r["toVersion"].as_str().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![("1.0.0", "1.1.0"), ("1.1.0", "1.2.0"), ("1.0.0", "1.3.0")]
    );

    // the newest record for a from-version is the one acted on
    let (out, _) = env.run_json(&["rebase-apply", "1.0.0"]);
    assert!(out.status.success());
    let records = history(&env);
    assert_eq!(records[0]["status"], "in-progress");
    assert_eq!(records[2]["status"], "completed");

    let (out, v) = env.run_json(&["rebase-apply", "9.9.9"]);
    assert!(!out.status.success());
    assert_eq!(v["errors"][0]["code"], "E_REBASE_NOT_FOUND");
}

#[test]
fn report_summarizes_patches_and_rebases() {
    let env = TestEnv::new();
    env.init();
    env.write_component("button.tsx", BUTTON_V1);
    env.create_patch(
        "button-size",
        "button.tsx",
        &button_with_default_size(),
        &["--description", "default button size"],
    );
    assert!(env.run_json(&["rebase", "1.0.0", "1.1.0"]).0.status.success());

    let out = env.run(&["report"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("button-size"), "{stdout}");
    assert!(stdout.contains("default button size"), "{stdout}");
    assert!(stdout.contains("1.0.0 -> 1.1.0"), "{stdout}");
}

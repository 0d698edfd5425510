#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use assert_cmd::prelude::*;

pub const BUTTON_V1: &str = "import React from 'react';\n\nexport function Button(props) {\n  const size = props.size;\n  return (\n    <button className=\"btn\">\n      {props.children}\n    </button>\n  );\n}\n";

pub struct TestEnv {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    scratch: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");

        let root = tmp.path().join("workspace");
        std::fs::create_dir_all(&root).expect("create workspace");

        let scratch = tmp.path().join("scratch");
        std::fs::create_dir_all(&scratch).expect("create scratch");

        Self {
            _tmp: tmp,
            root,
            scratch,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patchstack(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_patchstack"));
        cmd.current_dir(&self.root)
            .env_remove("PATCHSTACK_ROOT")
            .env("PATCHSTACK_AUTHOR", "tester")
            .env("PATCHSTACK_LOG", "off");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.patchstack().args(args).output().expect("run patchstack")
    }

    /// Runs with `--json` and parses stdout.
    pub fn run_json(&self, args: &[&str]) -> (Output, serde_json::Value) {
        let mut all = vec!["--json"];
        all.extend_from_slice(args);
        let out = self.run(&all);
        let v = parse_stdout_json(&out);
        (out, v)
    }

    pub fn init(&self) {
        self.patchstack().args(["--json", "init"]).assert().success();
    }

    pub fn component_path(&self, rel: &str) -> PathBuf {
        self.root.join("components").join(rel)
    }

    pub fn write_component(&self, rel: &str, content: &str) {
        let path = self.component_path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create component dir");
        }
        std::fs::write(path, content).expect("write component file");
    }

    pub fn patch_document_path(&self, id: &str) -> PathBuf {
        self.root
            .join(".patchstack")
            .join("patches")
            .join(format!("{id}.json"))
    }

    /// Rewrites a stored patch document in place, bypassing `create`'s checks.
    pub fn edit_patch_document(&self, id: &str, edit: impl FnOnce(&mut serde_json::Value)) {
        let path = self.patch_document_path(id);
        let raw = std::fs::read_to_string(&path).expect("read patch document");
        let mut doc: serde_json::Value = serde_json::from_str(&raw).expect("patch document json");
        edit(&mut doc);
        let out = serde_json::to_string_pretty(&doc).expect("serialize patch document");
        std::fs::write(&path, out).expect("write patch document");
    }

    pub fn read_component(&self, rel: &str) -> String {
        std::fs::read_to_string(self.component_path(rel)).expect("read component file")
    }

    /// Writes `content` outside the workspace and returns its path.
    pub fn scratch_file(&self, name: &str, content: &str) -> String {
        let path = self.scratch.join(name);
        std::fs::write(&path, content).expect("write scratch file");
        path.to_string_lossy().into_owned()
    }

    /// Records a patch turning the current component file into `modified`.
    pub fn create_patch(&self, id: &str, target: &str, modified: &str, extra: &[&str]) {
        let to = self.scratch_file(&format!("{id}.modified"), modified);
        let mut args = vec![
            "create",
            "Button",
            target,
            "--to",
            to.as_str(),
            "--id",
            id,
            "--upstream-version",
            "1.0.0",
        ];
        args.extend_from_slice(extra);
        let out = self.run(&args);
        assert!(
            out.status.success(),
            "create {id} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
    }
}

pub fn parse_stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("stdout is valid json")
}

/// `BUTTON_V1` with the size default applied.
pub fn button_with_default_size() -> String {
    BUTTON_V1.replace(
        "  const size = props.size;\n",
        "  const size = props.size ?? 'md';\n",
    )
}

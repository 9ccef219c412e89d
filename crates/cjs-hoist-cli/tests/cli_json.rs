//! Integration tests for the `cjs-hoist` binary.
//!
//! These tests verify:
//! - `--json` output is always valid JSON with `ok`, `files`, `touched`, `failed`
//! - results land under `--out-dir` mirroring the input tree
//! - per-file failures are reported and make the process exit non-zero

use std::process::Command;
use tempfile::tempdir;

fn cjs_hoist() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cjs-hoist"))
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("stdout should be valid JSON")
}

#[test]
fn test_single_file_to_stdout() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.js"), "exports.a = 1;").unwrap();

    let output = cjs_hoist()
        .arg("--cwd")
        .arg(dir.path())
        .arg("a.js")
        .output()
        .expect("Failed to run cjs-hoist");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "let _exports_ = {};\n_exports_.a = 1;\nmodule.exports = _exports_;"
    );
}

#[test]
fn test_out_dir_json_summary() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(src.join("lib")).unwrap();
    std::fs::create_dir_all(src.join("node_modules/dep")).unwrap();
    std::fs::write(src.join("index.js"), "const lib = require('./lib/util');").unwrap();
    std::fs::write(src.join("lib/util.cjs"), "module.exports = 1;").unwrap();
    std::fs::write(src.join("node_modules/dep/index.js"), "exports.x = 1;").unwrap();

    let output = cjs_hoist()
        .args(["--json", "--sourcemap", "--out-dir", "out", "--cwd"])
        .arg(dir.path())
        .arg("src")
        .output()
        .expect("Failed to run cjs-hoist");

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["touched"], 1);
    assert_eq!(json["failed"], 0);
    assert!(json["duration_ms"].is_u64());
    let files = json["files"].as_array().expect("files should be array");
    assert_eq!(files.len(), 2, "node_modules should be skipped");

    let out = dir.path().join("out");
    assert_eq!(
        std::fs::read_to_string(out.join("index.js")).unwrap(),
        "const _require__$lib$util_ = require('./lib/util');\nconst lib = _require__$lib$util_;"
    );
    assert_eq!(
        std::fs::read_to_string(out.join("lib/util.cjs")).unwrap(),
        "module.exports = 1;"
    );

    let map: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("index.js.map")).unwrap()).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "index.js");
    assert!(!out.join("node_modules").exists());
}

#[test]
fn test_dynamic_require_flag() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.js"),
        "const p = Promise.resolve(require('x'));",
    )
    .unwrap();

    let skipped = cjs_hoist()
        .args(["--json", "--cwd"])
        .arg(dir.path())
        .arg("a.js")
        .output()
        .expect("Failed to run cjs-hoist");
    assert_eq!(json_stdout(&skipped)["files"][0]["touched"], false);

    let rewritten = cjs_hoist()
        .args(["--json", "--transform-dynamic-require", "--cwd"])
        .arg(dir.path())
        .arg("a.js")
        .output()
        .expect("Failed to run cjs-hoist");
    let json = json_stdout(&rewritten);
    assert_eq!(json["files"][0]["touched"], true);
    assert_eq!(
        json["files"][0]["code"],
        "const _require_x_ = require('x');\nconst p = Promise.resolve(_require_x_);"
    );
}

#[test]
fn test_config_file_options() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.js"), "Promise.resolve(require('x'));").unwrap();
    std::fs::write(
        dir.path().join("cjs-hoist.json"),
        r#"{"ignoreDynamicRequire": false}"#,
    )
    .unwrap();

    let output = cjs_hoist()
        .args(["--json", "--config", "cjs-hoist.json", "--cwd"])
        .arg(dir.path())
        .arg("a.js")
        .output()
        .expect("Failed to run cjs-hoist");
    assert_eq!(json_stdout(&output)["files"][0]["touched"], true);
}

#[test]
fn test_parse_failure_exits_non_zero() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("good.js"), "exports.a = 1;").unwrap();
    std::fs::write(dir.path().join("bad.js"), "exports.a = (;").unwrap();

    let output = cjs_hoist()
        .args(["--json", "-o", "out", "--cwd"])
        .arg(dir.path())
        .arg(".")
        .output()
        .expect("Failed to run cjs-hoist");

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["touched"], 1);

    let bad = json["files"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["path"].as_str().unwrap().ends_with("bad.js"))
        .expect("bad.js should be reported");
    let code = bad["error"]["code"].as_str().unwrap();
    assert_eq!(code, "PARSE_ERROR");
    assert!(
        code.chars().all(|c| c.is_ascii_uppercase() || c == '_'),
        "error codes should be SCREAMING_SNAKE_CASE"
    );
    assert!(dir.path().join("out/good.js").exists());
}

#[test]
fn test_stdout_needs_single_file() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.js"), "").unwrap();
    std::fs::write(dir.path().join("b.js"), "").unwrap();

    let output = cjs_hoist()
        .arg("--cwd")
        .arg(dir.path())
        .args(["a.js", "b.js"])
        .output()
        .expect("Failed to run cjs-hoist");
    assert!(!output.status.success());
}

#[test]
fn test_sourcemap_requires_out_dir() {
    let output = cjs_hoist()
        .args(["--sourcemap", "a.js"])
        .output()
        .expect("Failed to run cjs-hoist");
    assert!(!output.status.success());
}

#[test]
fn test_config_source_map_requires_out_dir() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.js"), "exports.a = 1;").unwrap();
    std::fs::write(dir.path().join("cjs-hoist.json"), r#"{"sourceMap": true}"#).unwrap();

    let output = cjs_hoist()
        .args(["--config", "cjs-hoist.json", "--cwd"])
        .arg(dir.path())
        .arg("a.js")
        .output()
        .expect("Failed to run cjs-hoist");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_colliding_outputs_are_rejected() {
    let dir = tempdir().unwrap();
    for sub in ["a", "b"] {
        std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        std::fs::write(dir.path().join(sub).join("x.js"), "exports.a = 1;").unwrap();
    }

    let output = cjs_hoist()
        .args(["-o", "out", "--cwd"])
        .arg(dir.path())
        .args(["a/x.js", "b/x.js"])
        .output()
        .expect("Failed to run cjs-hoist");
    assert!(!output.status.success());
    assert!(!dir.path().join("out/x.js").exists());
}

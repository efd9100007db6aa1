#![allow(deprecated)]
#![cfg(unix)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

/// A scratch project with a fake `gemini` that logs each call and echoes its
/// arguments, one per line.
struct Project {
    dir: TempDir,
    script: PathBuf,
    log: PathBuf,
}

impl Project {
    fn new() -> Self {
        Self::with_script("printf '%s\\n' \"$@\"")
    }

    fn with_script(body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join(".bin");
        std::fs::create_dir(&bin).unwrap();
        let log = bin.join("calls.log");
        let script = bin.join("gemini");
        std::fs::write(
            &script,
            format!("#!/bin/sh\necho call >> '{}'\n{body}\n", log.display()),
        )
        .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        Self { dir, script, log }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("gemini-mcp").unwrap();
        cmd.current_dir(self.dir.path())
            .env_remove("GOOGLE_API_KEY")
            .env_remove("GEMINI_MCP_CONFIG")
            .env_remove("GEMINI_FLASH_MODEL")
            .env_remove("GEMINI_PRO_MODEL")
            .env_remove("GEMINI_API_BASE_URL")
            .env_remove("RUST_LOG")
            .env("GEMINI_CLI_PATH", &self.script);
        cmd
    }

    fn calls(&self) -> usize {
        std::fs::read_to_string(&self.log)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}

fn responses(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn by_id(responses: &[Value], id: i64) -> &Value {
    responses
        .iter()
        .find(|r| r["id"] == serde_json::json!(id))
        .unwrap_or_else(|| panic!("no response with id {id}"))
}

// ---------------------------------------------------------------------------
// MCP server
// ---------------------------------------------------------------------------

#[test]
fn mcp_initialize_and_list_tools() {
    let p = Project::new();
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"0"}}}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        "\n",
    );
    let out = p.cmd().arg("mcp").write_stdin(input).assert().success();
    let resps = responses(&out.get_output().stdout);

    // The notification gets no reply.
    assert_eq!(resps.len(), 2);
    assert_eq!(by_id(&resps, 1)["result"]["serverInfo"]["name"], "gemini-mcp");
    let tools = by_id(&resps, 2)["result"]["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 3);
}

#[test]
fn mcp_is_the_default_command() {
    let p = Project::new();
    let out = p
        .cmd()
        .write_stdin("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n")
        .assert()
        .success();
    let resps = responses(&out.get_output().stdout);
    assert_eq!(resps[0]["result"], serde_json::json!({}));
}

#[test]
fn mcp_parse_error() {
    let p = Project::new();
    let out = p.cmd().arg("mcp").write_stdin("{oops\n").assert().success();
    let resps = responses(&out.get_output().stdout);
    assert_eq!(resps[0]["error"]["code"], -32700);
    assert!(resps[0]["id"].is_null());
}

#[test]
fn mcp_refuses_oversized_code_without_calling_gemini() {
    let p = Project::new();
    let code = "x = 1\n".repeat(900);
    let req = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 7,
        "method": "tools/call",
        "params": {"name": "gemini_analyze_code", "arguments": {"code_content": code}}
    });
    let out = p
        .cmd()
        .arg("mcp")
        .write_stdin(format!("{req}\n"))
        .assert()
        .success();
    let resps = responses(&out.get_output().stdout);
    let result = &by_id(&resps, 7)["result"];
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("too many lines"));
    assert_eq!(p.calls(), 0);
}

#[test]
fn mcp_rejects_traversal() {
    let p = Project::new();
    let req = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "tools/call",
        "params": {
            "name": "gemini_codebase_analysis",
            "arguments": {"directory_path": "../../../etc/passwd"}
        }
    });
    let out = p
        .cmd()
        .arg("mcp")
        .write_stdin(format!("{req}\n"))
        .assert()
        .success();
    let resps = responses(&out.get_output().stdout);
    let result = &by_id(&resps, 3)["result"];
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("outside allowed directory"));
    assert_eq!(p.calls(), 0);
}

#[test]
fn mcp_answers_concurrent_calls_by_id() {
    let p = Project::new();
    let call = |id: i64, q: &str| {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": "gemini_quick_query", "arguments": {"query": q}}
        })
        .to_string()
    };
    let input = format!("{}\n{}\n", call(10, "first"), call(11, "second"));
    let out = p.cmd().arg("mcp").write_stdin(input).assert().success();
    let resps = responses(&out.get_output().stdout);
    assert_eq!(resps.len(), 2);
    let text = |id| by_id(&resps, id)["result"]["content"][0]["text"].as_str().unwrap().to_string();
    assert!(text(10).contains("Question: first"));
    assert!(text(11).contains("Question: second"));
    assert_eq!(p.calls(), 2);
}

// ---------------------------------------------------------------------------
// Direct commands
// ---------------------------------------------------------------------------

#[test]
fn query_streams_the_answer() {
    let p = Project::new();
    p.cmd()
        .args(["query", "test; rm -rf /"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Query: test; rm -rf /"))
        .stdout(predicate::str::contains("gemini-2.5-flash"))
        .stdout(predicate::str::contains("Question: test; rm -rf /"));
    assert_eq!(p.calls(), 1);
}

#[test]
fn query_json_prints_the_result() {
    let p = Project::new();
    let out = p
        .cmd()
        .args(["--json", "query", "hello"])
        .assert()
        .success();
    let v: Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(v["status"], "success");
    assert_eq!(v["backend"], "cli");
    assert!(v["output"].as_str().unwrap().contains("Question: hello"));
}

#[test]
fn backend_failure_exits_non_zero() {
    let p = Project::with_script("echo 'quota exceeded' >&2; exit 3");
    p.cmd()
        .args(["query", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("exited with code 3"))
        .stderr(predicate::str::contains("quota exceeded"));
}

#[test]
fn analyze_uses_the_pro_model() {
    let p = Project::new();
    p.write("src/lib.rs", "pub fn add(a: i32, b: i32) -> i32 { a + b }\n");
    p.cmd()
        .args(["analyze", "src/lib.rs", "security"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Type: security"))
        .stdout(predicate::str::contains("gemini-2.5-pro"));
}

#[test]
fn analyze_truncates_long_files() {
    let p = Project::new();
    p.write("big.py", &"print(1)\n".repeat(900));
    p.cmd()
        .args(["analyze", "big.py"])
        .assert()
        .success()
        .stderr(predicate::str::contains("truncating to 800 lines"))
        .stdout(predicate::str::contains("Lines: 800"));
}

#[test]
fn analyze_rejects_unsupported_extension() {
    let p = Project::new();
    p.write("deploy.sh", "echo hi\n");
    p.cmd()
        .args(["analyze", "deploy.sh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file type"));
    assert_eq!(p.calls(), 0);
}

#[test]
fn codebase_rejects_paths_outside_the_project() {
    let p = Project::new();
    p.cmd()
        .args(["codebase", "/etc/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("outside allowed directory"));
    assert_eq!(p.calls(), 0);
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[test]
fn hook_without_valid_files_succeeds_quietly() {
    let p = Project::new();
    p.write("README.md", "# readme\n");
    p.cmd()
        .args(["hook", "pre-edit", "README.md missing.rs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No valid files to analyze"))
        .stderr(predicate::str::contains("File type not supported"))
        .stderr(predicate::str::contains("File not found"));
    assert_eq!(p.calls(), 0);
}

#[test]
fn hook_backend_failure_still_exits_zero() {
    let p = Project::with_script("echo 'boom' >&2; exit 1");
    p.write("src/main.rs", "fn main() {}\n");
    p.cmd()
        .args(["hook", "pre-commit", "src/main.rs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Using gemini-2.5-pro for pre-commit"))
        .stderr(predicate::str::contains("Analysis failed:"));
    assert_eq!(p.calls(), 1);
}

#[test]
fn hook_prompt_lists_relative_paths() {
    let p = Project::new();
    p.write("src/app.ts", "export const x = 1;\n");
    p.cmd()
        .args(["hook", "pre-edit", "src/app.ts"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pre-edit analysis of these files: src/app.ts"));
}

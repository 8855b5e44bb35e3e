//! Integration tests for the sieve CLI.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const MANIFEST: &str = r#"
name = "c-test"
version = "0.1.0"
description = "arithmetic helpers"

[functions.c_add]
command = ["sh", "-c", "echo $(($2 + $3))", "c_add"]
args = ["integer", "integer"]

[functions.c_sub]
command = ["sh", "-c", "echo $(($2 - $3))", "c_sub"]
args = ["integer", "integer"]
"#;

/// A workspace with its own config file and an extension directory.
struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let ext = tmp.path().join("ext");
        fs::create_dir_all(&ext).unwrap();
        fs::write(ext.join("c-test.toml"), MANIFEST).unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            format!("extension_dirs = [{:?}]\n", ext.display().to_string()),
        )
        .unwrap();
        fs::create_dir_all(tmp.path().join("files")).unwrap();
        Self { tmp }
    }

    fn files(&self) -> PathBuf {
        self.tmp.path().join("files")
    }

    fn sparse(&self, name: &str, len: u64) {
        let path = self.files().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::File::create(&path).unwrap().set_len(len).unwrap();
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sieve"));
        cmd.current_dir(self.files())
            .env("SIEVE_CONFIG", self.tmp.path().join("config.toml"))
            .env_remove("SIEVE_LOG")
            .args(args);
        cmd
    }

    /// Run sieve from inside the `files` directory.
    fn sieve(&self, args: &[&str]) -> Output {
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .expect("failed to run sieve")
    }

    /// Run sieve with `input` on stdin.
    fn sieve_with_input(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to run sieve");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        child.wait_with_output().expect("failed to wait for sieve")
    }
}

fn lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

fn assert_failed(output: &Output) {
    assert_eq!(output.status.code(), Some(1), "{:?}", output);
    assert!(output.stdout.is_empty(), "unexpected stdout: {:?}", output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_union_query() {
    let fx = Fixture::new();
    fx.sparse("file5M.0", 5 << 20);
    fx.sparse("file1G.0", 1 << 30);
    fx.sparse("file1G.1", 1 << 30);
    fx.sparse("file2G.1", 2 << 30);
    fx.sparse("small.1", 10);

    let output = fx.sieve(&[".", "size=5M or (size>=1G and name=\"*.1\")"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["./file1G.1", "./file2G.1", "./file5M.0"]);
}

#[test]
fn test_size_range() {
    let fx = Fixture::new();
    fx.sparse("a", 1024);
    fx.sparse("b", 5120);
    fx.sparse("c", 6144);

    let output = fx.sieve(&[".", "type = file and size >= 1k and size <= 5 kilobytes"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["./a", "./b"]);
}

#[test]
fn test_expression_flag_and_dir_flag() {
    let fx = Fixture::new();
    fx.sparse("one/x.txt", 1);
    fx.sparse("two/y.txt", 1);
    fx.sparse("three/z.txt", 1);

    let output = fx.sieve(&["-d", "one", "-d", "two", "-e", "name = \"*.txt\""]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["one/x.txt", "two/y.txt"]);
}

#[test]
fn test_max_depth() {
    let fx = Fixture::new();
    fx.sparse("top.txt", 1);
    fx.sparse("sub/nested.txt", 1);

    let output = fx.sieve(&[".", "type = file", "--max-depth", "1"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["./top.txt"]);
}

#[test]
fn test_skip_and_limit() {
    let fx = Fixture::new();
    for name in ["a", "b", "c", "d"] {
        fx.sparse(name, 1);
    }

    let output = fx.sieve(&[".", "type = file", "--skip", "1", "--limit", "2"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["./b", "./c"]);
}

#[test]
fn test_regex_flavors() {
    let fx = Fixture::new();
    fx.sparse("test-data/file2G.1", 1);
    fx.sparse("test-data/file2G.3", 1);
    let pattern = r#"regex = "^\./test\-dat[a|b|c].*2+G\.[0-2]$""#;

    let extended = fx.sieve(&[".", pattern, "--regex-type", "emacs"]);
    assert!(extended.status.success(), "{:?}", extended);
    assert_eq!(lines(&extended), vec!["./test-data/file2G.1"]);

    let basic = fx.sieve(&[".", pattern, "--regex-type", "posix-minimal-basic"]);
    assert!(basic.status.success(), "{:?}", basic);
    assert!(lines(&basic).is_empty());
}

#[test]
fn test_invalid_regex_type() {
    let fx = Fixture::new();
    fx.sparse("a", 1);
    let output = fx.sieve(&[".", "regex = \".*\"", "--regex-type", "perl"]);
    assert_failed(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("perl"));
    assert!(stderr.contains("posix-extended"), "{}", stderr);
}

#[test]
fn test_extension_call() {
    let fx = Fixture::new();
    fx.sparse("a", 23);
    fx.sparse("b", 24);

    let output = fx.sieve(&[".", "type = file and size = c_add(19, 4)"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["./a"]);
}

#[test]
fn test_arity_mismatch_aborts() {
    let fx = Fixture::new();
    fx.sparse("a", 1);

    let output = fx.sieve(&[".", "c_add(1, 2, 3) > c_sub(4, 3)"]);
    assert_failed(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("arity mismatch"));

    // short-circuiting does not hide the mismatch
    let output = fx.sieve(&[".", "type = file or c_add(1, 2, 3) > 0"]);
    assert_failed(&output);
}

#[test]
fn test_unknown_function() {
    let fx = Fixture::new();
    let output = fx.sieve(&[".", "c_mul(2, 3) = 6"]);
    assert_failed(&output);
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown function"));
}

#[test]
fn test_syntax_errors() {
    let fx = Fixture::new();
    assert_failed(&fx.sieve(&[".", "size >"]));
    assert_failed(&fx.sieve(&[".", "colour = 5"]));
    assert_failed(&fx.sieve(&[".", "size > 5 parsecs"]));
    assert_failed(&fx.sieve(&["."]));
}

#[test]
fn test_expression_from_stdin() {
    let fx = Fixture::new();
    fx.sparse("a", 1);
    fx.sparse("big", 4096);

    let output = fx.sieve_with_input(&["."], "type = file and size > 1k\n");
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["./big"]);

    // only the first line is read
    let output = fx.sieve_with_input(&[], "type = file and size = 1\nsize > 1k\n");
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["./a"]);

    assert_failed(&fx.sieve_with_input(&["."], ""));
}

#[test]
fn test_missing_directory() {
    let fx = Fixture::new();
    assert_failed(&fx.sieve(&["does-not-exist", "type = file"]));
}

#[test]
fn test_print_expression() {
    let fx = Fixture::new();
    let output = fx.sieve(&["--print", "-e", "size>1kb and not readable"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(lines(&output), vec!["(size > 1024b and not readable)"]);
}

#[test]
fn test_print0() {
    let fx = Fixture::new();
    fx.sparse("a", 1);
    fx.sparse("b", 1);

    let output = fx.sieve(&[".", "type = file", "-0"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(output.stdout, b"./a\0./b\0");
}

#[test]
fn test_list_extensions() {
    let fx = Fixture::new();
    let output = fx.sieve(&["--list-extensions"]);
    assert!(output.status.success(), "{:?}", output);
    assert_eq!(
        lines(&output),
        vec![
            "c-test\tc_add(integer, integer) -> integer",
            "c-test\tc_sub(integer, integer) -> integer",
        ]
    );
}

#[test]
fn test_config_regex_type() {
    let fx = Fixture::new();
    fx.sparse("ab", 1);
    let config = fx.tmp.path().join("config.toml");
    let mut contents = fs::read_to_string(&config).unwrap();
    contents.push_str("regex_type = \"grep\"\n");
    fs::write(&config, contents).unwrap();

    // `+` is a literal in basic syntax
    let output = fx.sieve(&[".", "regex = \"./a+b\""]);
    assert!(output.status.success(), "{:?}", output);
    assert!(lines(&output).is_empty());

    let output = fx.sieve(&[".", "regex = \"./a+b\"", "--regex-type", "posix-extended"]);
    assert_eq!(lines(&output), vec!["./ab"]);
}

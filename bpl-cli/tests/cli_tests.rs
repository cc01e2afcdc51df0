//! Integration tests for the BPL CLI.
//!
//! These tests invoke the `bpl` binary as a subprocess and check
//! exit codes, stdout, and stderr.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[allow(deprecated)]
fn bpl() -> Command {
    Command::cargo_bin("bpl").unwrap()
}

/// Return the workspace root (parent of bpl-cli/).
fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

/// Return the absolute path to a test program file.
fn test_program(name: &str) -> PathBuf {
    workspace_root().join("tests/programs").join(name)
}

/// Helper: write a program into a temp dir, returning its path.
fn write_program(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("test.bpl");
    fs::write(&path, text).unwrap();
    path
}

// ---- No-args / help ----

#[test]
fn no_args_prints_usage_and_exits_2() {
    bpl()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage: bpl"));
}

#[test]
fn help_flag_exits_0() {
    bpl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commands:"));
}

#[test]
fn unknown_command_exits_2() {
    bpl().arg("frobnicate").assert().failure().code(2);
}

// ---- Run ----

#[test]
fn run_hello() {
    bpl()
        .arg("run")
        .arg(test_program("hello.bpl"))
        .assert()
        .success()
        .stdout("hi\n");
}

#[test]
fn run_factorial() {
    bpl()
        .arg("run")
        .arg(test_program("factorial.bpl"))
        .assert()
        .success()
        .stdout("3628800\n");
}

#[test]
fn run_count() {
    bpl()
        .arg("run")
        .arg(test_program("count.bpl"))
        .assert()
        .success()
        .stdout("1 2 3 4 5 ");
}

#[test]
fn run_reads_stdin() {
    bpl()
        .arg("run")
        .arg(test_program("echo_sum.bpl"))
        .write_stdin("19 23\n")
        .assert()
        .success()
        .stdout("42");
}

#[test]
fn run_terminate_code_becomes_exit_code() {
    bpl()
        .arg("run")
        .arg(test_program("exit_code.bpl"))
        .assert()
        .failure()
        .code(7)
        .stdout("A");
}

#[test]
fn run_terminate_zero_is_success() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "literal:char:z\nprintChar\nterminate:0\n");
    bpl().arg("run").arg(&path).assert().success().stdout("z");
}

#[test]
fn run_runtime_error_exits_3() {
    bpl()
        .arg("run")
        .arg(test_program("div_zero.bpl"))
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("runtime error: division by zero"));
}

#[test]
fn run_assembly_error_exits_1() {
    bpl()
        .arg("run")
        .arg(test_program("bad_opcode.bpl"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("line 3: unknown opcode 'addd'"));
}

#[test]
fn run_missing_file_exits_1() {
    bpl()
        .args(["run", "/nonexistent/missing.bpl"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("cannot read"));
}

// ---- Stack growth ----

#[test]
fn small_stack_without_growth_fails() {
    bpl()
        .arg("run")
        .arg(test_program("growth.bpl"))
        .args(["--stack-size", "64"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("growth is not allowed"));
}

#[test]
fn small_stack_with_growth_succeeds() {
    bpl()
        .arg("run")
        .arg(test_program("growth.bpl"))
        .args(["--stack-size", "64", "--allow-stack-growth"])
        .assert()
        .success()
        .stdout("k");
}

#[test]
fn default_stack_fits_program() {
    bpl()
        .arg("run")
        .arg(test_program("growth.bpl"))
        .assert()
        .success()
        .stdout("k");
}

// ---- Validation levels ----

#[test]
fn basic_validation_skips_type_checks() {
    bpl()
        .arg("run")
        .arg(test_program("set_double.bpl"))
        .assert()
        .success()
        .stdout("k");
}

#[test]
fn light_validation_rejects_mismatched_assignment() {
    bpl()
        .arg("run")
        .arg(test_program("set_double.bpl"))
        .args(["--validation", "light"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("cannot assign double to int64"));
}

#[test]
fn full_validation_runs_sample() {
    bpl()
        .arg("run")
        .arg(test_program("factorial.bpl"))
        .args(["--validation", "full"])
        .assert()
        .success()
        .stdout("3628800\n");
}

#[test]
fn unknown_validation_level_is_usage_error() {
    bpl()
        .arg("run")
        .arg(test_program("hello.bpl"))
        .args(["--validation", "paranoid"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown validation level 'paranoid'"));
}

// ---- Check ----

#[test]
fn check_valid_program() {
    bpl()
        .arg("check")
        .arg(test_program("factorial.bpl"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("OK: "));
}

#[test]
fn check_does_not_execute() {
    bpl()
        .arg("check")
        .arg(test_program("div_zero.bpl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("(4 instructions)"));
}

#[test]
fn check_reports_line() {
    bpl()
        .arg("check")
        .arg(test_program("bad_opcode.bpl"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn check_temp_program_with_unclosed_block() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "block\n  instructions\n    add\n");
    bpl()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("expected endInstructions"));
}

#[test]
fn check_rejects_oversized_type() {
    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, "declare:array<int64, 4611686018427387904>\n");
    bpl()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "line 1: type array<int64, 4611686018427387904> is too large",
        ));
}

// ---- Disassemble ----

#[test]
fn disassemble_strips_comments() {
    bpl()
        .arg("disassemble")
        .arg(test_program("count.bpl"))
        .assert()
        .success()
        .stdout(predicate::str::starts_with("declare:int64\nwhile\n  instructions\n"))
        .stdout(predicate::str::contains(";").not());
}

#[test]
fn disassembly_runs_like_the_source() {
    let out = bpl()
        .arg("disassemble")
        .arg(test_program("factorial.bpl"))
        .output()
        .unwrap();
    assert!(out.status.success());

    let dir = TempDir::new().unwrap();
    let path = write_program(&dir, &String::from_utf8(out.stdout).unwrap());
    bpl()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout("3628800\n");
}

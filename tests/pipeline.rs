use std::process::{Command, Output};

fn run_script(script: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_msh"))
        .arg("-c")
        .arg(script)
        .output()
        .expect("run msh")
}

fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).to_string()
}

#[test]
fn single_command_writes_to_the_shell_stdout() {
    let out = run_script("echo hello");
    assert!(out.status.success());
    assert_eq!(out.stdout, b"hello\n");
}

#[test]
fn two_stage_pipe_carries_every_byte() {
    let out = run_script("printf 'a\\nb\\nc\\n' | wc -l");
    assert!(out.status.success());
    assert_eq!(stdout_of(&out).trim(), "3");
}

#[test]
fn three_stage_pipeline_chains_left_to_right() {
    let out = run_script("printf 'b\\na\\nc\\n' | sort | head -n 1");
    assert!(out.status.success());
    assert_eq!(out.stdout, b"a\n");
}

#[test]
fn quoting_keeps_words_together() {
    let out = run_script("echo 'one two'");
    assert_eq!(out.stdout, b"one two\n");
}

#[test]
fn missing_program_exits_nonzero() {
    let out = run_script("msh-test-no-such-program");
    assert_eq!(out.status.code(), Some(127));
}

#[test]
fn failing_stage_does_not_stall_the_pipeline() {
    // the failing stage exits on its own; the last stage still owns the
    // observable status
    let out = run_script("msh-test-no-such-program | cat");
    assert!(out.status.success());
}

#[test]
fn empty_stage_is_a_parse_error() {
    let out = run_script("echo hi | | cat");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("syntax error"));
}

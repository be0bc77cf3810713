use anyhow::{bail, Context, Result};
use std::process::{Command, ExitStatus};

/// Human-friendly error messages for failed programs
pub fn status_to_pretty_err<E>(
    res: std::result::Result<ExitStatus, E>,
    command: &str,
    args: &[&str],
) -> Result<()>
where
    E: Send + 'static,
    E: Sync,
    E: std::error::Error,
{
    let status = res.with_context(|| format!("failed to start this command: {command}"))?;
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => bail!(
            "command {command} failed ({command} {}) with exit code: {code}",
            args.join(" ")
        ),
        None => bail!(
            "command {command} ({command} {}) was terminated by a signal",
            args.join(" ")
        ),
    }
}

/// Echo and run `program`, waiting for it to exit.
pub fn run(program: &str, args: &[&str]) -> Result<()> {
    println!("$ {program} {}", args.join(" "));
    let status = Command::new(program).args(args).status();
    status_to_pretty_err(status, program, args)
}

#[test]
fn test_run_reports_exit_code() {
    assert!(run("true", &[]).is_ok());

    let err = run("false", &["--ignored"]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "command false failed (false --ignored) with exit code: 1"
    );
}

#[test]
fn test_run_missing_program() {
    let err = run("keymgr-does-not-exist", &[]).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("failed to start this command: keymgr-does-not-exist"));
}

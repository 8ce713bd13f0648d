//! The `cd` builtin. Runs synchronously in the shell's own process and
//! owns the single-slot previous-directory memory behind `cd -`.

use std::env;
use std::path::PathBuf;

use crate::command::Pipeline;
use crate::error::ShellError;

/// Change directory per the first command of `pipeline`. On success the
/// previous-directory slot receives the directory that was current
/// immediately before the change; a failed change mutates nothing.
pub fn run(pipeline: &Pipeline, prev_dir: &mut Option<PathBuf>) -> Result<(), ShellError> {
    let commands = pipeline.commands();
    if commands.len() > 1 {
        return Err(ShellError::Config("cd: cannot be used in a pipeline".into()));
    }
    if pipeline.detached() {
        return Err(ShellError::Config("cd: cannot run in the background".into()));
    }

    let cmd = &commands[0];
    let (target, from_dash) = match cmd.argv.get(1).map(String::as_str) {
        None => {
            let home = env::var_os("HOME")
                .ok_or_else(|| ShellError::Config("cd: HOME not set".into()))?;
            (PathBuf::from(home), false)
        }
        Some("-") => {
            let prev = prev_dir
                .clone()
                .ok_or_else(|| ShellError::Config("cd: no previous directory".into()))?;
            (prev, true)
        }
        Some(path) => (PathBuf::from(path), false),
    };

    let here = env::current_dir().map_err(|e| ShellError::ChangeDir {
        target: target.clone(),
        source: e,
    })?;
    env::set_current_dir(&target).map_err(|e| ShellError::ChangeDir {
        target: target.clone(),
        source: e,
    })?;
    *prev_dir = Some(here);

    if from_dash {
        // only the `cd -` form echoes where it landed
        println!("{}", target.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn cd(line: &str, prev: &mut Option<PathBuf>) -> Result<(), ShellError> {
        let pipeline = parse::parse_line(line).unwrap().unwrap();
        run(&pipeline, prev)
    }

    // The working directory is process-global, so every scenario lives
    // in one test function.
    #[test]
    fn cd_scenarios() {
        let original = env::current_dir().unwrap();
        let tmp_a = tempfile::tempdir().unwrap();
        let tmp_b = tempfile::tempdir().unwrap();
        let a = tmp_a.path().canonicalize().unwrap();
        let b = tmp_b.path().canonicalize().unwrap();
        let mut prev: Option<PathBuf> = None;

        // `cd -` before any successful change is rejected, state untouched
        assert!(matches!(cd("cd -", &mut prev), Err(ShellError::Config(_))));
        assert!(prev.is_none());

        cd(&format!("cd {}", a.display()), &mut prev).unwrap();
        assert_eq!(env::current_dir().unwrap(), a);
        assert_eq!(prev.as_deref(), Some(original.as_path()));

        // a failed cd leaves both the cwd and the slot alone
        assert!(cd("cd /msh-test-no-such-dir", &mut prev).is_err());
        assert_eq!(env::current_dir().unwrap(), a);
        assert_eq!(prev.as_deref(), Some(original.as_path()));

        cd(&format!("cd {}", b.display()), &mut prev).unwrap();
        assert_eq!(prev.as_deref(), Some(a.as_path()));

        // `cd -` returns to the directory active before the last change
        cd("cd -", &mut prev).unwrap();
        assert_eq!(env::current_dir().unwrap(), a);
        assert_eq!(prev.as_deref(), Some(b.as_path()));

        // bare cd resolves through HOME
        env::set_var("HOME", b.as_os_str());
        cd("cd", &mut prev).unwrap();
        assert_eq!(env::current_dir().unwrap(), b);
        assert_eq!(prev.as_deref(), Some(a.as_path()));

        // cd cannot ride a pipeline or run detached
        assert!(matches!(
            cd("cd / | cat", &mut prev),
            Err(ShellError::Config(_))
        ));
        assert!(matches!(cd("cd / &", &mut prev), Err(ShellError::Config(_))));
        assert_eq!(env::current_dir().unwrap(), b);

        env::set_current_dir(&original).unwrap();
    }
}

use std::io::{self, BufRead, Write};
use std::process;

use anyhow::{bail, Result};

use msh::exec::Outcome;
use msh::Session;

const RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[1;32m";
const YELLOW: &str = "\x1b[1;33m";
const NC: &str = "\x1b[0m";

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("msh: {e}");
            process::exit(2);
        }
    }
}

fn run() -> Result<i32> {
    let mut args = std::env::args().skip(1);
    let mut script: Option<String> = None;
    while let Some(a) = args.next() {
        match a.as_str() {
            "-c" => {
                script = Some(
                    args.next()
                        .ok_or_else(|| anyhow::anyhow!("missing script after -c"))?,
                )
            }
            other => bail!("unknown argument: {other}"),
        }
    }

    let mut session = Session::new();
    if let Some(line) = script {
        let line = line.trim();
        if line == "exit" {
            return Ok(0);
        }
        return Ok(dispatch(&mut session, line));
    }

    let interactive = atty::is(atty::Stream::Stdin);
    let stdin = io::stdin();
    let mut code = 0;
    loop {
        // report background completions on their own lines, then prompt
        for report in session.poll_jobs() {
            eprintln!("{GREEN}{report}{NC}");
        }
        if interactive {
            print_prompt();
        }
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line == "exit" {
            break;
        }
        code = dispatch(&mut session, line);
    }
    if interactive {
        println!("{RED}Now exiting shell...{NC}");
        println!("{RED}Goodbye{NC}");
    }
    Ok(code)
}

fn dispatch(session: &mut Session, line: &str) -> i32 {
    match session.execute(line) {
        Ok(Outcome::Exited(code)) => {
            // status 1 is an ordinary miss (grep, test); only higher
            // statuses get flagged
            if code > 1 {
                eprintln!("msh: command failed with status {code}");
            }
            code
        }
        Ok(Outcome::Signaled(sig)) => {
            eprintln!("msh: terminated by {}", sig.as_str());
            128 + sig as i32
        }
        Ok(Outcome::Background { id, pids }) => {
            let pids: Vec<String> = pids.iter().map(|p| p.to_string()).collect();
            eprintln!("[{id}] {}", pids.join(" "));
            0
        }
        Ok(Outcome::Empty) | Ok(Outcome::Builtin) => 0,
        Err(e) => {
            eprintln!("msh: {e}");
            1
        }
    }
}

fn print_prompt() {
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".into());
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "?".into());
    print!("{GREEN}{user}:{cwd}{NC}{YELLOW}$ {NC}");
    let _ = io::stdout().flush();
}

extern crate time;

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    fs::write(out_dir.join("git-commit"), git_rev()).unwrap();
    fs::write(out_dir.join("compile-date"), compile_date()).unwrap();

    println!("cargo:rerun-if-changed=.git/HEAD");
}

/// Short hash of HEAD, prefixed with "WIP " when the tree is dirty.
fn git_rev() -> String {
    let run = |args: &[&str]| {
        Command::new("git").args(args).output().ok()
            .filter(|out| out.status.success())
            .map(|out| out.stdout)
    };

    let hash = run(&["rev-parse", "--short", "HEAD"]);
    let status = run(&["status", "--porcelain"]);

    match (hash, status) {
        (Some(hash), Some(status)) => {
            let hash = String::from_utf8_lossy(&hash).trim().to_string();
            if status.is_empty() { hash } else { format!("WIP {}", hash) }
        }
        _ => "unknown commit".to_string(),
    }
}

fn compile_date() -> String {
    let now = time::now_utc();
    time::strftime("%Y-%m-%d", &now).unwrap()
}

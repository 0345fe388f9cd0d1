use std::io;
use std::path::Path;
use std::process::exit;

use gix_push_gate::config::{Collaborators, GateOptions};
use gix_push_gate::engine::{self, Verdict};
use gix_push_gate::policy::{BranchTip, PolicyContext};
use gix_push_gate::signature::Gpg;
use gix_push_gate::Error;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [<repository>]", args[0]);
        exit(1);
    }
    let repo_path = args.get(1).map(String::as_str).unwrap_or(".");

    let code = match run(Path::new(repo_path)) {
        Ok(verdict) => verdict.exit_code(),
        Err(err) => {
            println!("*** {err}");
            1
        }
    };
    exit(code);
}

fn run(repo_path: &Path) -> Result<Verdict, Error> {
    let repo = gix::discover(repo_path).map_err(|e| {
        Error::Config(format!(
            "failed to open repository at '{}': {e}",
            repo_path.display()
        ))
    })?;

    let snapshot = repo.config_snapshot();
    let options = GateOptions::from_config(snapshot.plumbing())?;
    let collaborators = Collaborators::load(repo.git_dir())?;
    let branch_tips = branch_tips(&repo)?;
    let odb = gix_odb::at(repo.git_dir().join("objects"))
        .map_err(|e| Error::Odb(format!("failed to open object database: {e}")))?;
    let backend = Gpg::new();

    let ctx = PolicyContext {
        odb: &odb,
        backend: &backend,
        options,
        collaborators,
        branch_tips,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    engine::run(&ctx, stdin.lock(), &mut stdout.lock())
}

/// All existing `refs/heads/*` heads; they bound the walk when a new ref is
/// created. Symbolic refs have no tip of their own and are skipped.
fn branch_tips(repo: &gix::Repository) -> Result<Vec<BranchTip>, Error> {
    let platform = repo
        .references()
        .map_err(|e| Error::Odb(format!("failed to open reference store: {e}")))?;
    let references = platform
        .all()
        .map_err(|e| Error::Odb(format!("failed to iterate references: {e}")))?;

    let mut tips = Vec::new();
    for reference in references {
        let reference = match reference {
            Ok(reference) => reference,
            Err(_) => continue,
        };
        let name = reference.name().as_bstr().to_string();
        if !name.starts_with("refs/heads/") {
            continue;
        }
        if let gix::refs::TargetRef::Object(oid) = reference.target() {
            tips.push(BranchTip {
                name,
                id: oid.to_owned(),
            });
        }
    }
    Ok(tips)
}

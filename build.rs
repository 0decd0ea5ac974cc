extern crate git2;

use git2::Repository;
use git2::Status;

fn is_index_status(status: &Status) -> bool {
    status.intersects(
        Status::INDEX_DELETED
            | Status::INDEX_MODIFIED
            | Status::INDEX_NEW
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE,
    )
}

fn is_workdir_status(status: &Status) -> bool {
    status.intersects(
        Status::WT_DELETED
            | Status::WT_MODIFIED
            | Status::WT_NEW
            | Status::WT_RENAMED
            | Status::WT_TYPECHANGE,
    )
}

fn main() {
    // Builds from source archives have no repository to inspect.
    let (hash, taint) = match Repository::discover(".") {
        Ok(repo) => (git_hash(&repo), git_taint(&repo)),
        Err(_) => (String::from("unknown"), String::from("unknown")),
    };
    println!("cargo:rustc-env=GIT_BUILD_HASH={}", hash);
    println!("cargo:rustc-env=GIT_BUILD_TAINT={}", taint);
}

fn git_hash(repo: &Repository) -> String {
    match repo.revparse_single("HEAD") {
        Ok(checkout) => format!("{}", checkout.id()),
        Err(_) => String::from("unknown"),
    }
}

fn git_taint(repo: &Repository) -> String {
    let mut index_changed = false;
    let mut workdir_changed = false;

    let statuses = match repo.statuses(None) {
        Ok(statuses) => statuses,
        Err(_) => return String::from("unknown"),
    };
    for entry in statuses.iter() {
        let status = entry.status();
        if is_index_status(&status) {
            index_changed = true;
        }
        if is_workdir_status(&status) {
            workdir_changed = true;
        }
    }

    match (index_changed, workdir_changed) {
        (true, true) => String::from("index and working directory tainted"),
        (true, false) => String::from("index tainted"),
        (false, true) => String::from("working directory tainted"),
        (false, false) => String::from("not tainted"),
    }
}

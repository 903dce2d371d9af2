//! List the characters in save packages without loading them.
//!
//! ```text
//! savinfo [--json] <save.zip>...
//! ```
//!
//! Set `RUST_LOG=debug` to trace every member and tag that is read.

use std::error;
use tagsave::save::{browse_path, SaveSummary};

fn describe(summary: &SaveSummary) -> String {
    let header = &summary.header;
    let status = if summary.is_loadable() {
        "loadable"
    } else if summary.version.is_future() {
        "from a newer build"
    } else {
        "too old to load"
    };

    format!(
        "{}, level {} {} {} ({}, version {}, {})",
        header.name,
        header.experience_level,
        header.species_name,
        header.job_name,
        if header.map.is_empty() {
            "dungeon"
        } else {
            header.map.as_str()
        },
        summary.version,
        status
    )
}

#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct Entry<'a> {
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<SaveSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<(), Box<dyn error::Error>> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let json = args.iter().skip(1).any(|x| x == "--json");
    let paths: Vec<&String> = args.iter().skip(1).filter(|x| *x != "--json").collect();

    if paths.is_empty() {
        eprintln!("Usage: {} [--json] <save.zip>...", args[0]);
        std::process::exit(1);
    }

    if json {
        #[cfg(feature = "json")]
        {
            let entries: Vec<Entry> = paths
                .iter()
                .map(|path| match browse_path(path) {
                    Ok(summary) => Entry {
                        path,
                        summary: Some(summary),
                        error: None,
                    },
                    Err(e) => Entry {
                        path,
                        summary: None,
                        error: Some(e.to_string()),
                    },
                })
                .collect();
            let stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(stdout, &entries)?;
            println!();
            return Ok(());
        }

        #[cfg(not(feature = "json"))]
        {
            eprintln!("savinfo was built without the json feature");
            std::process::exit(1);
        }
    }

    let mut failures = 0;
    for path in paths {
        match browse_path(path) {
            Ok(summary) => println!("{}: {}", path, describe(&summary)),
            Err(e) if e.is_version_mismatch() => {
                failures += 1;
                eprintln!("{}: unsupported save: {}", path, e);
            }
            Err(e) => {
                failures += 1;
                log::debug!("{}: {:?}", path, e);
                eprintln!("{}: not a readable save: {}", path, e);
            }
        }
    }

    if failures > 0 {
        std::process::exit(2);
    }

    Ok(())
}

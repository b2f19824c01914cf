use crate::config::Config;
use anyhow::Result;
use iothub_core::{NodeFilter, RedbStorage, Storage};

#[derive(Debug)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
    fix_hint: Option<String>,
}

pub async fn run(config: Config, _server: &str) -> Result<()> {
    println!();
    println!("IoT Hub Health Check");
    println!("{}", "─".repeat(50));

    let mut results = Vec::new();
    let db_path = config.db_path();

    results.push(if db_path.exists() {
        CheckResult {
            name: "Database file accessible".into(),
            status: CheckStatus::Ok,
            detail: db_path.display().to_string(),
            fix_hint: None,
        }
    } else {
        CheckResult {
            name: "Database file accessible".into(),
            status: CheckStatus::Error,
            detail: format!("{} not found", db_path.display()),
            fix_hint: Some("Run `iothub serve` once to create a new database".into()),
        }
    });

    let storage = if db_path.exists() {
        match RedbStorage::open(&db_path) {
            Ok(s) => {
                results.push(CheckResult {
                    name: "Schema version".into(),
                    status: CheckStatus::Ok,
                    detail: format!("v{} (current)", iothub_core::CURRENT_SCHEMA_VERSION),
                    fix_hint: None,
                });
                Some(s)
            }
            Err(e) => {
                results.push(CheckResult {
                    name: "Schema version".into(),
                    status: CheckStatus::Error,
                    detail: e.to_string(),
                    fix_hint: None,
                });
                None
            }
        }
    } else {
        None
    };

    if let Some(ref storage) = storage {
        let all_nodes = storage.list_nodes(&NodeFilter::new())?;
        let node_ids: std::collections::HashSet<_> = all_nodes.iter().map(|n| n.id.clone()).collect();

        let mut orphaned = 0;
        for node in &all_nodes {
            for edge in storage.edges_down(&node.id)? {
                if !node_ids.contains(&edge.downstream) {
                    orphaned += 1;
                }
            }
        }

        results.push(if orphaned == 0 {
            CheckResult {
                name: "Orphaned edges".into(),
                status: CheckStatus::Ok,
                detail: "None found".into(),
                fix_hint: None,
            }
        } else {
            CheckResult {
                name: "Orphaned edges".into(),
                status: CheckStatus::Error,
                detail: format!("{orphaned} edges reference non-existent nodes"),
                fix_hint: Some("No automated repair tool is provided; inspect the tree with `iothub node get`".into()),
            }
        });

        let root_present = storage.root_id()?.is_some();
        results.push(if root_present {
            CheckResult {
                name: "Root node registered".into(),
                status: CheckStatus::Ok,
                detail: "present in metadata".into(),
                fix_hint: None,
            }
        } else {
            CheckResult {
                name: "Root node registered".into(),
                status: CheckStatus::Warning,
                detail: "no root id recorded".into(),
                fix_hint: Some("The daemon records the root id on first boot; start `iothub serve` once".into()),
            }
        });
    }

    let mut has_errors = false;
    for r in &results {
        let symbol = match r.status {
            CheckStatus::Ok => "[OK]",
            CheckStatus::Warning => "[!!]",
            CheckStatus::Error => {
                has_errors = true;
                "[XX]"
            }
        };
        println!("{} {}: {}", symbol, r.name, r.detail);
        if let Some(hint) = &r.fix_hint {
            println!("    -> {}", hint);
        }
    }
    println!("{}", "─".repeat(50));

    if has_errors {
        std::process::exit(1);
    }
    Ok(())
}

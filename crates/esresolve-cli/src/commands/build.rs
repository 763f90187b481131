//! `esresolve build` command implementation.
//!
//! Walks the module graph of a project from its entries and reports every
//! module, external and failure.

use std::path::PathBuf;
use std::time::Instant;

use esresolve_core::{BuildReport, ScanToolchain};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use super::ErrorJson;
use crate::project::Project;

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    pub project: PathBuf,
    /// Entries to use instead of the manifest's.
    pub entries: Vec<String>,
    pub http: bool,
    /// Include transformed code in JSON output.
    pub emit_code: bool,
}

#[derive(Serialize)]
struct BuildResultJson {
    ok: bool,
    entries: Vec<String>,
    duration_ms: u64,
    #[serde(flatten)]
    report: Option<BuildReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

pub async fn run(action: BuildAction, json: bool) -> Result<()> {
    let start = Instant::now();

    let setup = Project::load(&action.project).and_then(|p| p.into_driver(action.http));
    let (driver, manifest_entries) = match setup {
        Ok(ready) => ready,
        Err(err) => {
            if json {
                let out = BuildResultJson {
                    ok: false,
                    entries: action.entries.clone(),
                    duration_ms: elapsed_ms(start),
                    report: None,
                    error: Some(ErrorJson::from_error(&err)),
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
            } else {
                eprintln!("error[{}]: {err}", err.code());
            }
            std::process::exit(1);
        }
    };

    let entries = if action.entries.is_empty() {
        manifest_entries
    } else {
        action.entries.clone()
    };
    let entry_refs: Vec<&str> = entries.iter().map(String::as_str).collect();
    let mut report = driver.build(&entry_refs, &ScanToolchain).await;
    let ok = report.ok();

    if json {
        if !action.emit_code {
            for module in &mut report.modules {
                module.code = None;
            }
        }
        let out = BuildResultJson {
            ok,
            entries,
            duration_ms: elapsed_ms(start),
            report: Some(report),
            error: None,
        };
        println!("{}", serde_json::to_string(&out).into_diagnostic()?);
    } else {
        print_human(&report, elapsed_ms(start));
    }

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn print_human(report: &BuildReport, duration_ms: u64) {
    for module in &report.modules {
        println!("  {} [{}, {}]", module.path, module.namespace, module.loader);
        for dep in &module.dependencies {
            println!("    -> {dep}");
        }
    }
    for external in &report.externals {
        println!("  {external} (external)");
    }
    for warning in &report.warnings {
        eprintln!("  warning: {warning}");
    }
    for failure in &report.failures {
        eprintln!("error[{}]: {}", failure.code, failure.message);
        if let Some(plugin) = &failure.plugin {
            eprintln!("  in plugin {plugin}");
        }
    }
    let status = if report.aborted { "aborted" } else { "done" };
    println!(
        "{status}: {} modules, {} externals, {} errors ({duration_ms}ms)",
        report.modules.len(),
        report.externals.len(),
        report.failures.len()
    );
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

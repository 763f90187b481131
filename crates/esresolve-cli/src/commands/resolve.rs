//! `esresolve resolve` command implementation.
//!
//! Resolves one specifier against a project and prints where it lands.

use std::path::PathBuf;

use esresolve_core::{Error, ResolvedModule};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use super::ErrorJson;
use crate::project::Project;

/// Resolve command action.
#[derive(Debug, Clone)]
pub struct ResolveAction {
    pub specifier: String,
    /// Importing module; `None` resolves as an entry point.
    pub from: Option<String>,
    pub project: PathBuf,
    pub http: bool,
}

#[derive(Serialize)]
struct ResolveResultJson {
    ok: bool,
    specifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    importer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<ResolvedModule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

pub async fn run(action: ResolveAction, json: bool) -> Result<()> {
    let result = resolve(&action).await;

    if json {
        let (resolved, error) = match &result {
            Ok(module) => (Some(module.clone()), None),
            Err(err) => (None, Some(ErrorJson::from_error(err))),
        };
        let out = ResolveResultJson {
            ok: result.is_ok(),
            specifier: action.specifier.clone(),
            importer: action.from.clone(),
            resolved,
            error,
        };
        println!("{}", serde_json::to_string(&out).into_diagnostic()?);
    } else {
        match &result {
            Ok(module) if module.external => println!("{} (external)", module.path),
            Ok(module) => println!("{} [{}]", module.path, module.namespace),
            Err(err) => eprintln!("error[{}]: {err}", err.code()),
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

async fn resolve(action: &ResolveAction) -> Result<ResolvedModule, Error> {
    let project = Project::load(&action.project)?;
    let (driver, _) = project.into_driver(action.http)?;
    driver
        .resolve_specifier(&action.specifier, action.from.as_deref())
        .await
}

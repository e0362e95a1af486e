//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use super::document::{load_script, PatchDocument};
use crate::config::EditorConfig;
use crate::error::{PatchError, Result};
use crate::patch::{ModuleCatalog, ModuleGraph};

fn catalog() -> Arc<ModuleCatalog> {
    Arc::new(ModuleCatalog::with_builtins())
}

/// Load the editor configuration, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            EditorConfig::from_file(path)
        }
        None => Ok(EditorConfig::default()),
    }
}

/// Create an empty patch document.
pub fn new_patch(path: &Path, force: bool) -> Result<()> {
    info!("Creating new patch at: {}", path.display());

    if path.exists() && !force {
        return Err(PatchError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists (use --force to overwrite)", path.display()),
        )));
    }

    PatchDocument::empty(&catalog())?.save(path)?;
    println!("Patch created: {}", path.display());

    Ok(())
}

/// Run an edit script against a patch document.
///
/// Every step is one undoable edit. The script stops at the first failing
/// step; the steps before it are kept.
pub fn apply_script(
    path: &Path,
    script: &Path,
    output: Option<&Path>,
    config: EditorConfig,
) -> Result<()> {
    info!("Applying {} to {}", script.display(), path.display());

    let catalog = catalog();
    let mut document = PatchDocument::load(path)?;
    let ops = load_script(script)?;
    let mut editor = document.open(&catalog, config)?;

    let mut failure = None;
    for (index, op) in ops.iter().enumerate() {
        match op.apply(&mut editor) {
            Ok(summary) => println!("{:>3}: {}", index + 1, summary),
            Err(e) => {
                warn!("Step {} failed [{}]: {}", index + 1, e.error_code(), e);
                if let Some(suggestion) = e.recovery_suggestion() {
                    println!("Suggestion: {}", suggestion);
                }
                failure = Some(e);
                break;
            }
        }
    }

    document.update_from(&editor)?;
    let target = output.unwrap_or(path);
    document.save(target)?;
    println!(
        "Saved {} ({} undo levels, {} failed connections)",
        target.display(),
        editor.history().undo_count(),
        editor.stats().failed_connections
    );

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Auto-layout a patch document in place.
pub fn layout(path: &Path, config: EditorConfig) -> Result<()> {
    info!("Laying out: {}", path.display());

    let catalog = catalog();
    let mut document = PatchDocument::load(path)?;
    let mut editor = document.open(&catalog, config)?;
    let plan = editor.auto_layout()?;

    document.update_from(&editor)?;
    document.save(path)?;
    println!(
        "Placed {} modules in {} columns",
        plan.positions.len(),
        plan.order.len()
    );

    Ok(())
}

/// Print modules, links and layout of a patch document.
pub fn inspect(path: &Path, as_json: bool, config: EditorConfig) -> Result<()> {
    info!("Inspecting: {}", path.display());

    let catalog = catalog();
    let document = PatchDocument::load(path)?;
    let editor = document.open(&catalog, config)?;
    let graph = editor.graph();

    if as_json {
        let modules: Vec<_> = graph
            .module_ids()
            .into_iter()
            .map(|id| {
                json!({
                    "id": id,
                    "type": graph.module_type(id),
                    "position": editor.position(id),
                    "muted": editor.is_muted(id),
                })
            })
            .collect();
        let links: Vec<_> = editor
            .registry()
            .iter()
            .filter_map(|(link, endpoints)| {
                endpoints
                    .connection()
                    .map(|c| json!({ "link": link.to_string(), "connection": c }))
            })
            .collect();
        let summary = json!({
            "modules": modules,
            "links": links,
            "stats": editor.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Patch: {}", path.display());
    println!("Modified: {}", document.modified_at);
    println!("{:-<60}", "");

    println!("Modules:");
    for id in graph.module_ids() {
        let type_tag = graph.module_type(id).unwrap_or_default();
        let position = editor
            .position(id)
            .map(|p| format!("({:.0}, {:.0})", p.x, p.y))
            .unwrap_or_else(|| "unplaced".to_string());
        let muted = if editor.is_muted(id) { " [muted]" } else { "" };
        println!("  {:>4}  {:<20} {}{}", id, type_tag, position, muted);
    }

    println!("Links:");
    if editor.registry().is_empty() {
        println!("  (none)");
    }
    for (link, endpoints) in editor.registry().iter() {
        if let Some(connection) = endpoints.connection() {
            println!("  {}  {}", link, connection);
        }
    }

    println!("{:-<60}", "");
    println!(
        "{} modules | {} links",
        graph.module_ids().len(),
        editor.registry().len()
    );

    Ok(())
}

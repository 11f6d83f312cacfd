//! Puts children into the order the CI server's schema expects.
//!
//! Every step is a stable "move all children with this tag to the end", so
//! anything the pass does not know about keeps its place in front. Running the
//! pass twice gives the same result as running it once.

use std::cmp::Ordering;

use generational_arena::Index;
use tracing::{debug, instrument};

use crate::domain::arena::Document;
use crate::domain::error::DomainResult;
use crate::domain::navigator::PossiblyMissing;

const ROOT_ORDER: &[&str] = &["pipelines", "templates", "environments", "agents"];
const PIPELINE_ORDER: &[&str] = &["params", "timer", "environmentvariables", "materials", "stage"];
const STAGE_ORDER: &[&str] = &["environmentvariables", "jobs"];
const JOB_ORDER: &[&str] = &["environmentvariables", "tasks", "tabs", "resources", "artifacts"];

/// Reorder the whole document in place. Returns true if anything moved.
#[instrument(level = "debug", skip(document))]
pub fn reorder_document(document: &mut Document) -> DomainResult<bool> {
    let before = document.revision();
    let root = document.root();
    move_to_end_in_order(document, root, ROOT_ORDER);

    for group in children_named(document, root, "pipelines") {
        for pipeline in children_named(document, group, "pipeline") {
            reorder_pipeline(document, pipeline)?;
        }
    }
    for templates in children_named(document, root, "templates") {
        for template in children_named(document, templates, "pipeline") {
            reorder_pipeline(document, template)?;
        }
    }

    let changed = document.revision() != before;
    debug!("reorder_document: changed={}", changed);
    Ok(changed)
}

fn reorder_pipeline(document: &mut Document, pipeline: Index) -> DomainResult<()> {
    for materials in children_named(document, pipeline, "materials") {
        sort_materials(document, materials)?;
    }
    move_to_end_in_order(document, pipeline, PIPELINE_ORDER);
    for stage in children_named(document, pipeline, "stage") {
        move_to_end_in_order(document, stage, STAGE_ORDER);
        for jobs in children_named(document, stage, "jobs") {
            for job in children_named(document, jobs, "job") {
                move_to_end_in_order(document, job, JOB_ORDER);
            }
        }
    }
    Ok(())
}

/// Git materials first, ordered by url; everything else after them, ordered
/// by canonical rendering so insertion order never shows in the output.
pub fn sort_materials(document: &mut Document, materials: Index) -> DomainResult<()> {
    let mut order: Vec<Index> = document.children(materials).to_vec();
    order.sort_by(|&a, &b| match (git_url(document, a), git_url(document, b)) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => document.canonical_xml(a).cmp(&document.canonical_xml(b)),
    });
    document.reorder_children(materials, order)
}

fn git_url(document: &Document, material: Index) -> Option<&str> {
    document
        .get(material)
        .filter(|e| e.tag() == "git")
        .map(|e| e.attribute("url").unwrap_or_default())
}

fn move_to_end_in_order(document: &mut Document, node: Index, order: &[&str]) {
    for tag in order {
        document.move_all_to_end(node, tag);
    }
}

fn children_named(document: &Document, node: Index, tag: &str) -> Vec<Index> {
    PossiblyMissing::new(document, node).find_all(tag)
}

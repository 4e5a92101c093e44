//! Reorganization plans: the validated form of a classifier's category mapping.
//!
//! A label may name a nested directory (`"Work/Reports"`); each `/`-separated
//! segment becomes one directory level under the root. File names are base
//! names only, and a name may belong to at most one category.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::errors::PlanError;

/// Separator for nested category labels.
pub const CATEGORY_SEPARATOR: char = '/';

/// Unvalidated classifier output: `(label, file names)` in classifier order.
pub type RawMapping = Vec<(String, Vec<String>)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    label: String,
    segments: Vec<String>,
    files: Vec<String>,
}

impl Category {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Destination directory for this category under `root`.
    pub fn dir_under(&self, root: &Path) -> PathBuf {
        let mut p = root.to_path_buf();
        p.extend(&self.segments);
        p
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorganizationPlan {
    categories: Vec<Category>,
}

impl ReorganizationPlan {
    /// Validate a raw mapping. Nothing on disk is consulted.
    pub fn validate(raw: RawMapping) -> Result<Self, PlanError> {
        let mut categories: Vec<Category> = Vec::new();
        let mut owner: HashMap<String, String> = HashMap::new();

        for (raw_label, names) in raw {
            let segments = split_label(&raw_label)?;
            let label = segments.join(&CATEGORY_SEPARATOR.to_string());

            for name in &names {
                if !is_plain_name(name) {
                    return Err(PlanError::InvalidFileName {
                        name: name.clone(),
                        category: label.clone(),
                    });
                }
                match owner.get(name) {
                    Some(first) if *first != label => {
                        return Err(PlanError::DuplicateAssignment {
                            name: name.clone(),
                            first: first.clone(),
                            second: label,
                        });
                    }
                    Some(_) => {}
                    None => {
                        owner.insert(name.clone(), label.clone());
                    }
                }
            }

            // Same label listed twice: fold into the first occurrence.
            if let Some(existing) = categories.iter_mut().find(|c| c.label == label) {
                existing.files.extend(names);
            } else {
                categories.push(Category { label, segments, files: names });
            }
        }

        let plan = Self { categories };
        debug!(categories = plan.categories.len(), files = plan.file_count(), "plan validated");
        Ok(plan)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Total listed names, repeats included.
    pub fn file_count(&self) -> usize {
        self.categories.iter().map(|c| c.files.len()).sum()
    }

    /// Label → names as an ordered JSON object.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for c in &self.categories {
            map.insert(
                c.label.clone(),
                Value::Array(c.files.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }
}

fn split_label(raw: &str) -> Result<Vec<String>, PlanError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PlanError::InvalidCategory(raw.to_string()));
    }
    trimmed
        .split(CATEGORY_SEPARATOR)
        .map(|seg| {
            let seg = seg.trim();
            if is_plain_name(seg) {
                Ok(seg.to_string())
            } else {
                Err(PlanError::InvalidCategory(raw.to_string()))
            }
        })
        .collect()
}

/// Exactly one normal path component: not empty, `.`, `..`, a root or a prefix.
fn is_plain_name(s: &str) -> bool {
    if s.is_empty() || s.contains('/') || s.contains('\\') {
        return false;
    }
    let mut comps = Path::new(s).components();
    matches!((comps.next(), comps.next()), (Some(Component::Normal(_)), None))
}

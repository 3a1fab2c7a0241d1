use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alias::alias_for;
use crate::PrepError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasedEntry {
    pub name: String,
    pub alias: String,
}

// One sample folder of a group, and where its release artifacts go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplePlan {
    pub name: String,
    pub alias: String,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupPlan {
    pub group: String,
    pub samples: Vec<SamplePlan>,
}

impl GroupPlan {
    pub fn alias_map(&self) -> BTreeMap<String, String> {
        self.samples
            .iter()
            .map(|s| (s.name.clone(), s.alias.clone()))
            .collect()
    }
}

// Names of the immediate children of `dir`, in lexicographic order.
pub fn sorted_children<AP>(dir: AP) -> Result<Vec<String>, PrepError>
where
    AP: AsRef<Path>,
{
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| PrepError::NonUtf8Name(entry.path()))?;
        names.push(name);
    }
    names.sort();
    Ok(names)
}

// Pair every name with the alias of its 1-based position.
//
// Positions restart at 1 on every call, so callers alias one folder at a time.
// Fails as a whole when the list is longer than the alias domain.
pub fn assign_aliases<S>(names: &[S]) -> Result<Vec<AliasedEntry>, PrepError>
where
    S: AsRef<str>,
{
    names
        .iter()
        .enumerate()
        .map(|(i, name)| -> Result<AliasedEntry, PrepError> {
            Ok(AliasedEntry {
                name: name.as_ref().to_string(),
                alias: alias_for(i as i64 + 1)?,
            })
        })
        .collect()
}

pub fn plan_group<AP1, AP2>(
    input_root: AP1,
    group: &str,
    output_root: AP2,
) -> Result<GroupPlan, PrepError>
where
    AP1: AsRef<Path>,
    AP2: AsRef<Path>,
{
    let group_dir = input_root.as_ref().join(group);
    if !group_dir.is_dir() {
        return Err(PrepError::MissingInput(group_dir));
    }
    let names = sorted_children(&group_dir)?;
    let samples = assign_aliases(&names)?
        .into_iter()
        .map(|AliasedEntry { name, alias }| SamplePlan {
            source_dir: group_dir.join(&name),
            output_dir: output_root.as_ref().join(group).join(&alias),
            name,
            alias,
        })
        .collect();
    Ok(GroupPlan {
        group: group.to_string(),
        samples,
    })
}

// group -> (sample name -> alias), stable key order so manifests diff cleanly
pub fn write_manifest<AP>(plans: &[GroupPlan], path: AP) -> Result<(), PrepError>
where
    AP: AsRef<Path>,
{
    let manifest: BTreeMap<&str, BTreeMap<String, String>> = plans
        .iter()
        .map(|p| (p.group.as_str(), p.alias_map()))
        .collect();
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, &manifest)?;
    Ok(())
}

use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, Result};

/// Named groups of atoms, as read from a GROMACS index (`.ndx`) file.
///
/// Atom numbers in the file start at one. Here, they are stored as zero-based indices into the
/// positions of a frame.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Index {
    groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Group {
    name: String,
    atoms: Vec<usize>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::IndexFile {
            path: path.to_path_buf(),
            source,
        })?;
        let index: Self = contents.parse()?;
        debug!(path = %path.display(), ngroups = index.len(), "read index file");
        Ok(index)
    }

    /// Adds a group of zero-based atom indices.
    ///
    /// If a group with the same name already exists, lookups keep resolving to the first one.
    pub fn insert(&mut self, name: impl Into<String>, atoms: Vec<usize>) {
        self.groups.push(Group {
            name: name.into(),
            atoms,
        });
    }

    /// Returns the atom indices of `name`.
    pub fn group(&self, name: &str) -> Result<&[usize]> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.atoms.as_slice())
            .ok_or_else(|| Error::UnknownGroup(name.to_string()))
    }

    pub fn group_size(&self, name: &str) -> Result<usize> {
        Ok(self.group(name)?.len())
    }

    /// Returns the atom index of the `n`th member of the group `name`.
    pub fn location(&self, name: &str, n: usize) -> Result<usize> {
        let atoms = self.group(name)?;
        atoms.get(n).copied().ok_or(Error::AtomOutOfRange {
            atom: n,
            natoms: atoms.len(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(|group| group.name.as_str())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> + '_ {
        self.groups
            .iter()
            .map(|group| (group.name.as_str(), group.atoms.as_slice()))
    }

    /// The number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromStr for Index {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut index = Index::new();
        let mut current: Option<Group> = None;

        for (n, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| Error::IndexParse {
                        line: n + 1,
                        reason: format!("invalid group header '{line}'"),
                    })?;
                if let Some(group) = current.take() {
                    index.groups.push(group);
                }
                current = Some(Group {
                    name: name.to_string(),
                    atoms: Vec::new(),
                });
                continue;
            }

            let group = current.as_mut().ok_or_else(|| Error::IndexParse {
                line: n + 1,
                reason: "atom numbers before the first group header".to_string(),
            })?;
            for token in line.split_whitespace() {
                let number: usize = token.parse().map_err(|_| Error::IndexParse {
                    line: n + 1,
                    reason: format!("'{token}' is not an atom number"),
                })?;
                let atom = number.checked_sub(1).ok_or_else(|| Error::IndexParse {
                    line: n + 1,
                    reason: "atom numbers start at 1".to_string(),
                })?;
                group.atoms.push(atom);
            }
        }

        if let Some(group) = current {
            index.groups.push(group);
        }
        Ok(index)
    }
}

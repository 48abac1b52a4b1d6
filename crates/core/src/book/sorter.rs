//! Ordering the notes of a part.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use mlua::Function;
use serde::Serialize;

use super::BookSpecError;
use crate::index::{Note, NoteId, VaultIndex};
use crate::scripting::{LuaPlugin, PluginLoader, ScriptingError, parse_binding};
use crate::vault::frontmatter::Frontmatter;

/// Formats accepted for a `created` frontmatter field, besides RFC 3339.
const CREATED_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
];

/// What a Lua sorter sees for each note.
#[derive(Debug, Serialize)]
pub struct SortEntry<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub path: String,
    /// RFC 3339.
    pub modified: String,
    pub frontmatter: Option<&'a Frontmatter>,
}

impl<'a> SortEntry<'a> {
    pub fn new(note: &'a Note) -> Self {
        Self {
            id: note.id.as_str(),
            title: &note.title,
            path: crate::vault::walker::to_slash(&note.path),
            modified: note.modified.to_rfc3339(),
            frontmatter: note.frontmatter.as_ref(),
        }
    }
}

pub struct LuaSorter {
    binding: String,
    symbol: String,
    plugin: Arc<LuaPlugin>,
    function: Function,
}

/// A part's sort function: built-in (`$alphabetical`, `$modified`,
/// `$created`) or `path/to/sorter.lua:symbol`.
pub enum Sorter {
    Alphabetical,
    Modified,
    Created,
    Lua(LuaSorter),
}

impl fmt::Debug for Sorter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sorter({})", self.name())
    }
}

impl Sorter {
    /// Parse and load a sorter. Plugins are loaded here so a bad binding is
    /// a configuration error.
    pub fn from_identifier(identifier: &str, loader: &mut PluginLoader) -> Result<Self, BookSpecError> {
        let identifier = identifier.trim();
        if let Some(name) = identifier.strip_prefix('$') {
            return match name {
                "alphabetical" => Ok(Sorter::Alphabetical),
                "modified" => Ok(Sorter::Modified),
                "created" => Ok(Sorter::Created),
                _ => Err(BookSpecError::UnknownSorter(identifier.to_string())),
            };
        }

        let (path, symbol) = parse_binding(identifier)
            .ok_or_else(|| BookSpecError::UnknownSorter(identifier.to_string()))?;
        let plugin_error =
            |source| BookSpecError::SorterPlugin { binding: identifier.to_string(), source };
        let plugin = loader.load(path).map_err(plugin_error)?;
        let function = plugin.function(symbol).map_err(plugin_error)?;

        Ok(Sorter::Lua(LuaSorter {
            binding: identifier.to_string(),
            symbol: symbol.to_string(),
            plugin,
            function,
        }))
    }

    pub fn name(&self) -> &str {
        match self {
            Sorter::Alphabetical => "$alphabetical",
            Sorter::Modified => "$modified",
            Sorter::Created => "$created",
            Sorter::Lua(lua) => &lua.binding,
        }
    }

    /// Return `ids` in sorted order. Built-ins always return a permutation;
    /// the assembler checks that Lua sorters do too.
    pub fn sort(&self, ids: &[NoteId], index: &VaultIndex) -> Result<Vec<NoteId>, ScriptingError> {
        let mut sorted = ids.to_vec();
        match self {
            Sorter::Alphabetical => sorted.sort_by_cached_key(|id| {
                let title = index.get(id).map(|n| n.title.to_lowercase()).unwrap_or_default();
                (title, id.clone())
            }),
            Sorter::Modified => {
                sorted.sort_by_cached_key(|id| (index.get(id).map(|n| n.modified), id.clone()));
            }
            Sorter::Created => sorted.sort_by_cached_key(|id| {
                (index.get(id).map(|n| created_at(n).unwrap_or(n.modified)), id.clone())
            }),
            Sorter::Lua(lua) => {
                let names: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
                let entries: Vec<(String, SortEntry<'_>)> = ids
                    .iter()
                    .filter_map(|id| index.get(id))
                    .map(|note| (note.id.as_str().to_string(), SortEntry::new(note)))
                    .collect();
                let returned = lua.plugin.call_sort(&lua.function, &lua.symbol, &names, &entries)?;
                sorted = returned.iter().map(|id| NoteId::normalize(id)).collect();
            }
        }
        Ok(sorted)
    }
}

/// Creation time from the `created` frontmatter field.
pub fn created_at(note: &Note) -> Option<DateTime<Utc>> {
    let raw = note.frontmatter.as_ref()?.get_str("created")?;
    parse_timestamp(raw.trim())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in CREATED_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

//! Build platform instances from configuration entries
//!
//! Configuration keeps sources and destinations as raw tables so one malformed
//! entry does not prevent the others from being used. Entries are validated
//! only when requested, and errors name the offending entry.

use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::convert::{Html2MdConverter, MarkdownConverter};
use crate::error::{ConfigError, CrossblogError, Result};
use crate::platforms::local_markdown::LocalMarkdown;
use crate::platforms::remote_blog::RemoteBlog;
use crate::platforms::{Destination, PlatformInstance, Source};
use crate::types::PlatformKind;

const SOURCE_ROLE: &str = "source";
const DESTINATION_ROLE: &str = "destination";

/// Factory for configured platforms
#[derive(Clone)]
pub struct Registry {
    http: Client,
    converter: Arc<dyn MarkdownConverter>,
    api_base: String,
}

impl Registry {
    pub fn new(config: &Config) -> Self {
        Self {
            http: Client::new(),
            converter: Arc::new(Html2MdConverter),
            api_base: config.remote_blog.api_base.clone(),
        }
    }

    /// Build a source from one `[[sources]]` entry
    pub fn create_source(&self, entry: &toml::Value) -> Result<Box<dyn Source>> {
        Ok(self.create(entry, SOURCE_ROLE)?.into_source())
    }

    /// Build a destination from one `[[destinations]]` entry
    pub fn create_destination(&self, entry: &toml::Value) -> Result<Box<dyn Destination>> {
        Ok(self.create(entry, DESTINATION_ROLE)?.into_destination())
    }

    /// Build the named sources and destinations, in the order requested
    ///
    /// Entries that were not asked for are never constructed, so they may be
    /// malformed without affecting the run.
    pub fn load(
        &self,
        sources: &[toml::Value],
        destinations: &[toml::Value],
        source_names: &[String],
        destination_names: &[String],
    ) -> Result<(Vec<Box<dyn Source>>, Vec<Box<dyn Destination>>)> {
        let sources = select(SOURCE_ROLE, sources, source_names)?
            .into_iter()
            .map(|entry| self.create_source(entry))
            .collect::<Result<Vec<_>>>()?;

        let destinations = select(DESTINATION_ROLE, destinations, destination_names)?
            .into_iter()
            .map(|entry| self.create_destination(entry))
            .collect::<Result<Vec<_>>>()?;

        Ok((sources, destinations))
    }

    fn create(&self, entry: &toml::Value, role: &'static str) -> Result<PlatformInstance> {
        if !entry.is_table() {
            return Err(ConfigError::InvalidField {
                field: format!("{} entry", role),
                reason: format!("expected a table, found {}", entry.type_str()),
            }
            .into());
        }

        let name = entry_name(entry).ok_or_else(|| {
            ConfigError::MissingField(format!("name (in a {} entry)", role))
        })?;

        let kind_str = required_str(entry, "type", role, name)?;
        let kind: PlatformKind = kind_str.parse().map_err(|_| {
            ConfigError::UnknownPlatform(format!("{} (in {} '{}')", kind_str, role, name))
        })?;

        let instance = match kind {
            PlatformKind::RemoteBlog => {
                let blog_url = required_str(entry, "blog_url", role, name)?;
                PlatformInstance::RemoteBlog(RemoteBlog::new(
                    name,
                    blog_url,
                    self.api_base.clone(),
                    self.http.clone(),
                    Arc::clone(&self.converter),
                ))
            }
            PlatformKind::LocalMarkdown => {
                let content_dir = required_str(entry, "content_dir", role, name)?;
                let overwrite = optional_bool(entry, "overwrite", role, name)?.unwrap_or(false);
                let content_dir = shellexpand::tilde(content_dir).into_owned();
                PlatformInstance::LocalMarkdown(LocalMarkdown::new(name, content_dir, overwrite))
            }
        };

        debug!(role, name, kind = %instance.kind(), "Created platform");
        Ok(instance)
    }
}

fn entry_name(entry: &toml::Value) -> Option<&str> {
    entry
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

fn required_str<'a>(
    entry: &'a toml::Value,
    field: &str,
    role: &str,
    name: &str,
) -> Result<&'a str> {
    match entry.get(field) {
        None => Err(ConfigError::MissingField(format!("{} (in {} '{}')", field, role, name)).into()),
        Some(value) => value
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::InvalidField {
                    field: format!("{} (in {} '{}')", field, role, name),
                    reason: "expected a non-empty string".to_string(),
                }
                .into()
            }),
    }
}

fn optional_bool(entry: &toml::Value, field: &str, role: &str, name: &str) -> Result<Option<bool>> {
    match entry.get(field) {
        None => Ok(None),
        Some(value) => value.as_bool().map(Some).ok_or_else(|| {
            ConfigError::InvalidField {
                field: format!("{} (in {} '{}')", field, role, name),
                reason: "expected true or false".to_string(),
            }
            .into()
        }),
    }
}

/// Pick the entries for `wanted`, preserving the requested order
fn select<'a>(
    role: &'static str,
    entries: &'a [toml::Value],
    wanted: &[String],
) -> Result<Vec<&'a toml::Value>> {
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_table() {
            debug!(role, index, kind = entry.type_str(), "Ignoring entry that is not a table");
        } else if entry_name(entry).is_none() {
            debug!(role, index, "Ignoring entry without a name");
        }
    }

    wanted
        .iter()
        .map(|name| {
            let mut matches = entries
                .iter()
                .filter(|entry| entry_name(entry) == Some(name.as_str()));

            match (matches.next(), matches.next()) {
                (Some(entry), None) => Ok(entry),
                (Some(_), Some(_)) => Err(ConfigError::DuplicateName {
                    role,
                    name: name.clone(),
                }
                .into()),
                (None, _) => Err(CrossblogError::NotFound(format!(
                    "{} '{}' is not defined in the configuration",
                    role, name
                ))),
            }
        })
        .collect()
}

//! Catalog metadata reader.
//!
//! Turns raw catalog rows into the three maps the export plan is built from:
//! schemas, schema grants, and credentials. All filtering decisions live
//! here (reserved schemas, operator exclusions, grants to dropped schemas,
//! principals without grants) so that every [`CatalogSource`] behaves the same.

use super::{CatalogSource, CredentialLayout, CredentialRow};
use crate::credential::classify;
use crate::error::ExportError;
use crate::models::{AuthScheme, Credential, Principal, Schema, is_reserved_schema};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::collections::btree_map::Entry;

/// Reads export metadata from a catalog source.
pub struct MetadataReader<'a> {
    source: &'a dyn CatalogSource,
}

impl<'a> MetadataReader<'a> {
    /// Creates a reader over the given catalog capability.
    pub fn new(source: &'a dyn CatalogSource) -> Self {
        Self { source }
    }

    /// Discovers exportable schemas.
    ///
    /// Reserved server schemas are dropped unconditionally, then every name
    /// in `excluded` is dropped. Returned schemas have no principals yet.
    ///
    /// # Errors
    /// Returns `MetadataUnavailable` if the catalog query fails.
    pub async fn read_schemas(&self, excluded: &BTreeSet<String>) -> Result<BTreeMap<String, Schema>> {
        let rows = self.source.schemata().await?;
        let mut schemas = BTreeMap::new();

        for row in rows {
            if is_reserved_schema(&row.name) {
                tracing::trace!("Skipping reserved schema {}", row.name);
                continue;
            }
            if excluded.contains(&row.name) {
                tracing::debug!("Excluding schema {} on operator request", row.name);
                continue;
            }
            schemas.insert(
                row.name.clone(),
                Schema::new(row.name, row.charset, row.collation),
            );
        }

        tracing::debug!("Discovered {} exportable schemas", schemas.len());
        Ok(schemas)
    }

    /// Associates grant rows with the discovered schemas.
    ///
    /// Every discovered schema gets an entry, possibly empty. Rows for
    /// schemas that did not survive discovery are dropped without error.
    ///
    /// # Errors
    /// Returns `MetadataUnavailable` if the catalog query fails.
    pub async fn read_principal_grants(
        &self,
        schemas: &BTreeMap<String, Schema>,
    ) -> Result<BTreeMap<String, BTreeSet<Principal>>> {
        let rows = self.source.schema_grants().await?;
        let mut grants: BTreeMap<String, BTreeSet<Principal>> = schemas
            .keys()
            .map(|name| (name.clone(), BTreeSet::new()))
            .collect();

        let mut dropped = 0usize;
        for row in rows {
            match grants.get_mut(&row.schema) {
                Some(principals) => {
                    principals.insert(Principal::new(row.username, row.host));
                }
                None => dropped = dropped.saturating_add(1),
            }
        }

        if dropped > 0 {
            tracing::debug!("Ignored {} grant rows on schemas outside the export", dropped);
        }
        Ok(grants)
    }

    /// Resolves credentials for the given principals.
    ///
    /// Probes the credential column layout once, then resolves every row
    /// belonging to an active principal. Rows for other principals are
    /// ignored; for duplicate rows the first one wins.
    ///
    /// # Errors
    /// Returns `MetadataUnavailable` if the catalog is unreachable or has
    /// an unusable layout, and `UnknownCredentialFormat` if a legacy secret
    /// cannot be classified.
    pub async fn read_credentials(
        &self,
        active: &BTreeSet<Principal>,
    ) -> Result<BTreeMap<Principal, Credential>> {
        let columns = self.source.credential_columns().await?;
        let layout = CredentialLayout::detect(&columns)?;
        match layout {
            CredentialLayout::LegacyCredentialColumn => {
                tracing::debug!("Using legacy Password column for credentials");
            }
            CredentialLayout::PluginCredentialColumns { legacy_fallback } => {
                tracing::debug!(
                    "Using plugin/authentication_string columns for credentials (legacy fallback: {})",
                    legacy_fallback
                );
            }
        }

        let rows = self.source.credential_rows(layout).await?;
        let mut credentials = BTreeMap::new();

        for row in rows {
            let principal = Principal::new(row.username.clone(), row.host.clone());
            if !active.contains(&principal) {
                continue;
            }
            match credentials.entry(principal) {
                Entry::Occupied(entry) => {
                    tracing::debug!("Ignoring duplicate credential row for {}", entry.key());
                }
                Entry::Vacant(entry) => {
                    let credential = resolve_credential(layout, row)
                        .map_err(|source| ExportError::UnknownCredentialFormat {
                            principal: entry.key().clone(),
                            source,
                        })?;
                    entry.insert(credential);
                }
            }
        }

        tracing::debug!(
            "Resolved credentials for {} of {} granted principals",
            credentials.len(),
            active.len()
        );
        Ok(credentials)
    }
}

/// Resolves one credential row according to the detected layout.
///
/// With plugin columns the catalog's plugin name is authoritative. On a
/// mixed layout the secret comes from `Password` when `authentication_string`
/// is empty, as MySQL 5.6 stores native hashes there. A row whose plugin is
/// empty is resolved by classifying its legacy secret instead.
fn resolve_credential(
    layout: CredentialLayout,
    row: CredentialRow,
) -> std::result::Result<Credential, crate::credential::ClassificationError> {
    match layout {
        CredentialLayout::LegacyCredentialColumn => {
            let secret = row.password.unwrap_or_default();
            let scheme = classify(&secret)?;
            Ok(Credential::new(secret, scheme))
        }
        CredentialLayout::PluginCredentialColumns { legacy_fallback } => {
            let plugin = row.plugin.unwrap_or_default();
            let token = row.authentication_string.unwrap_or_default();
            let secret = row
                .password
                .filter(|password| {
                    legacy_fallback
                        && !password.is_empty()
                        && (plugin.is_empty() || token.is_empty())
                })
                .unwrap_or(token);

            if !plugin.is_empty() {
                return Ok(Credential::new(secret, AuthScheme::from_plugin_name(&plugin)));
            }
            let scheme = classify(&secret)?;
            Ok(Credential::new(secret, scheme))
        }
    }
}

//! Export plan: the reconciled view of schemas, grants and credentials.
//!
//! The plan is built once per run, after all metadata has been read and
//! before any file is written. Building it is the only place the
//! grant/credential invariant is checked: every principal authorized on an
//! exported schema must have exactly one resolved credential.

use crate::Result;
use crate::error::ExportError;
use crate::models::{Credential, Principal, Schema};
use std::collections::{BTreeMap, BTreeSet};

/// The reconciled, read-only export plan.
///
/// Schemas are ordered by name and principals by (username, host) so that
/// rendered artifacts are reproducible. Nothing depends on that order.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    schemas: BTreeMap<String, Schema>,
    credentials: BTreeMap<Principal, Credential>,
}

impl ExportPlan {
    /// Joins discovered schemas, grants and credentials.
    ///
    /// Grants keyed by a schema that is not in `schemas` are ignored.
    /// Credentials of principals holding no grant on an exported schema are
    /// dropped. Attribute values pass through unchecked.
    ///
    /// # Errors
    /// Returns `DanglingGrant` for the first grant whose principal has no
    /// credential.
    pub fn build(
        mut schemas: BTreeMap<String, Schema>,
        grants: BTreeMap<String, BTreeSet<Principal>>,
        mut credentials: BTreeMap<Principal, Credential>,
    ) -> Result<Self> {
        let mut granted = BTreeSet::new();

        for (schema_name, principals) in grants {
            let Some(schema) = schemas.get_mut(&schema_name) else {
                continue;
            };
            for principal in principals {
                if !credentials.contains_key(&principal) {
                    return Err(ExportError::DanglingGrant {
                        principal,
                        schema: schema_name,
                    });
                }
                granted.insert(principal.clone());
                schema.authorized.insert(principal);
            }
        }

        // Principals already on a schema (built by hand) count as granted too
        for schema in schemas.values() {
            for principal in &schema.authorized {
                if !credentials.contains_key(principal) {
                    return Err(ExportError::DanglingGrant {
                        principal: principal.clone(),
                        schema: schema.name.clone(),
                    });
                }
                granted.insert(principal.clone());
            }
        }

        credentials.retain(|principal, _| granted.contains(principal));

        Ok(Self {
            schemas,
            credentials,
        })
    }

    /// Schemas to export, ordered by name.
    pub fn schemas(&self) -> impl Iterator<Item = &Schema> {
        self.schemas.values()
    }

    /// Looks up a schema by name.
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Principals to recreate, with their credentials.
    pub fn credentials(&self) -> impl Iterator<Item = (&Principal, &Credential)> {
        self.credentials.iter()
    }

    /// Number of schemas in the plan.
    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    /// Number of principals in the plan.
    pub fn principal_count(&self) -> usize {
        self.credentials.len()
    }
}

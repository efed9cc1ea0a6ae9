//! # Reconciler
//!
//! Classifies every contract endpoint and every inventoried artifact:
//!
//! | endpoint | artifact | fingerprints | result  |
//! |----------|----------|--------------|---------|
//! | present  | none     | -            | Created |
//! | present  | present  | differ       | Updated |
//! | present  | present  | equal        | Skipped |
//! | absent   | present  | -            | Deleted |
//!
//! `force` turns every Skipped into Updated. So do a changed generation-options
//! digest, damaged markers (the writer then reports the conflict) and an
//! obsolete annotation on an endpoint that is back in the contract.
//!
//! An endpoint without a record whose file name belongs to an unreadable file
//! is Blocked: that file may be its artifact, so no replacement is created.
//! The pass is pure; its output is sorted by endpoint identity.

use crate::contract::{EndpointId, EndpointSpec};
use crate::fingerprint::{short_digest, Fingerprint};
use crate::generator::file_stem;
use crate::inventory::{ArtifactRecord, Inventory};
use crate::strategies::TestStrategy;
use std::collections::BTreeSet;

/// An endpoint paired with its fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintedEndpoint {
    /// Parsed endpoint.
    pub spec: EndpointSpec,
    /// Its fingerprint.
    pub fingerprint: Fingerprint,
    /// Digest of the generation options it would be rendered with.
    pub options: String,
}

/// The synchronization decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No artifact yet.
    Created,
    /// Artifact out of date.
    Updated,
    /// Artifact up to date.
    Skipped,
    /// Endpoint gone from the contract.
    Deleted,
    /// Possible artifact exists but cannot be read.
    Blocked,
}

/// One unit of work produced by the reconciler.
#[derive(Debug, Clone)]
pub enum WorkItem<'a> {
    /// Write a new file.
    Create {
        /// Endpoint to generate.
        endpoint: &'a FingerprintedEndpoint,
        /// Assigned file name, unique in the target directory.
        file_name: String,
    },
    /// Replace the generated region of an existing file.
    Update {
        /// Endpoint to generate.
        endpoint: &'a FingerprintedEndpoint,
        /// Artifact to merge into.
        artifact: &'a ArtifactRecord,
    },
    /// Leave the artifact untouched.
    Skip {
        /// Endpoint (unchanged).
        endpoint: &'a FingerprintedEndpoint,
        /// Up-to-date artifact.
        artifact: &'a ArtifactRecord,
    },
    /// Flag or prune an artifact whose endpoint disappeared.
    Delete {
        /// Orphaned artifact.
        artifact: &'a ArtifactRecord,
    },
    /// Report a failure instead of creating a file next to an unreadable one.
    Blocked {
        /// Endpoint without a readable artifact.
        endpoint: &'a FingerprintedEndpoint,
        /// The unreadable file.
        file_name: String,
        /// Why it could not be read.
        reason: &'a str,
    },
}

impl WorkItem<'_> {
    /// Endpoint identity the item concerns.
    pub fn id(&self) -> &EndpointId {
        match self {
            Self::Create { endpoint, .. }
            | Self::Update { endpoint, .. }
            | Self::Skip { endpoint, .. }
            | Self::Blocked { endpoint, .. } => &endpoint.spec.id,
            Self::Delete { artifact } => &artifact.endpoint,
        }
    }

    /// The decision.
    pub fn classification(&self) -> Classification {
        match self {
            Self::Create { .. } => Classification::Created,
            Self::Update { .. } => Classification::Updated,
            Self::Skip { .. } => Classification::Skipped,
            Self::Delete { .. } => Classification::Deleted,
            Self::Blocked { .. } => Classification::Blocked,
        }
    }

    /// File the item reads or writes.
    pub fn file_name(&self) -> &str {
        match self {
            Self::Create { file_name, .. } | Self::Blocked { file_name, .. } => file_name,
            Self::Update { artifact, .. }
            | Self::Skip { artifact, .. }
            | Self::Delete { artifact } => &artifact.file_name,
        }
    }
}

/// Runs the classification pass.
pub fn reconcile<'a>(
    endpoints: &'a [FingerprintedEndpoint],
    inventory: &'a Inventory,
    strategy: &dyn TestStrategy,
    force: bool,
) -> Vec<WorkItem<'a>> {
    let mut ordered: Vec<&FingerprintedEndpoint> = endpoints.iter().collect();
    ordered.sort_by(|a, b| a.spec.id.cmp(&b.spec.id));

    let mut names = NameAllocator::new(inventory);
    let mut items = Vec::with_capacity(ordered.len() + inventory.records.len());

    for endpoint in ordered {
        let item = match inventory.get(&endpoint.spec.id) {
            None => match unreadable_candidate(inventory, strategy, &endpoint.spec) {
                Some((file_name, reason)) => WorkItem::Blocked {
                    endpoint,
                    file_name,
                    reason,
                },
                None => WorkItem::Create {
                    endpoint,
                    file_name: names.assign(strategy, &endpoint.spec),
                },
            },
            Some(artifact)
                if force
                    || artifact.obsolete
                    || artifact.region.is_none()
                    || artifact.fingerprint != endpoint.fingerprint
                    || artifact.options.as_deref() != Some(endpoint.options.as_str()) =>
            {
                WorkItem::Update { endpoint, artifact }
            }
            Some(artifact) => WorkItem::Skip { endpoint, artifact },
        };
        items.push(item);
    }

    let live: BTreeSet<&EndpointId> = endpoints.iter().map(|e| &e.spec.id).collect();
    items.extend(
        inventory
            .records
            .values()
            .filter(|r| !live.contains(&r.endpoint))
            .map(|artifact| WorkItem::Delete { artifact }),
    );

    items.sort_by(|a, b| a.id().cmp(b.id()));
    items
}

/// An unreadable file under a name the allocator could have given this endpoint.
fn unreadable_candidate<'a>(
    inventory: &'a Inventory,
    strategy: &dyn TestStrategy,
    spec: &EndpointSpec,
) -> Option<(String, &'a str)> {
    if inventory.unreadable.is_empty() {
        return None;
    }
    let stem = file_stem(spec);
    let hashed = format!("{}_{}", stem, short_digest(&spec.id.to_string()));
    [strategy.file_name(&stem), strategy.file_name(&hashed)]
        .into_iter()
        .find_map(|name| {
            let reason = inventory.unreadable_reason(&name)?;
            Some((name, reason))
        })
}

struct NameAllocator<'a> {
    inventory: &'a Inventory,
    planned: BTreeSet<String>,
}

impl<'a> NameAllocator<'a> {
    fn new(inventory: &'a Inventory) -> Self {
        Self {
            inventory,
            planned: BTreeSet::new(),
        }
    }

    fn is_free(&self, name: &str) -> bool {
        !self.inventory.is_taken(name) && !self.planned.contains(name)
    }

    /// Strategy name for the stem; on collision, the stem suffixed with an
    /// identity digest, then a counter.
    fn assign(&mut self, strategy: &dyn TestStrategy, spec: &EndpointSpec) -> String {
        let stem = file_stem(spec);
        let mut name = strategy.file_name(&stem);
        if !self.is_free(&name) {
            let hashed = format!("{}_{}", stem, short_digest(&spec.id.to_string()));
            name = strategy.file_name(&hashed);
            let mut n = 2;
            while !self.is_free(&name) {
                name = strategy.file_name(&format!("{}_{}", hashed, n));
                n += 1;
            }
        }
        self.planned.insert(name.clone());
        name
    }
}

//! Tag-to-inventory resolution.
//!
//! Every object attached to a tag is expanded down to the leaf objects it
//! contains (VMs, datastores, switches, port groups). Containers never
//! appear in the resulting [`TagIndex`].

use crate::error::{CoreError, Result};
use crate::model::{Children, ObjectKind, ObjectRef};
use crate::session::{timed, Session};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Tags attached to one leaf object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedObject {
    pub kind: ObjectKind,
    pub tags: BTreeSet<String>,
}

/// A branch that could not be expanded
#[derive(Debug)]
pub struct BranchFailure {
    pub tag: String,
    pub object: ObjectRef,
    pub error: CoreError,
}

/// Object id to tag set, safe for concurrent writers
#[derive(Debug, Default)]
pub struct TagIndex {
    entries: Mutex<HashMap<String, TaggedObject>>,
    failures: Mutex<Vec<BranchFailure>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `tag` with `object`. Adding a pair twice is a no-op.
    pub fn add(&self, object: &ObjectRef, tag: &str) {
        let mut entries = self.entries.lock();
        let entry = entries
            .entry(object.id.clone())
            .or_insert_with(|| TaggedObject {
                kind: object.kind.clone(),
                tags: BTreeSet::new(),
            });
        entry.kind = object.kind.clone();
        entry.tags.insert(tag.to_string());
    }

    /// True when object `id` carries any of `tags`
    pub fn check<S: AsRef<str>>(&self, id: &str, tags: &[S]) -> bool {
        self.entries
            .lock()
            .get(id)
            .map(|entry| tags.iter().any(|t| entry.tags.contains(t.as_ref())))
            .unwrap_or(false)
    }

    pub fn get(&self, id: &str) -> Option<TaggedObject> {
        self.entries.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the index
    pub fn snapshot(&self) -> BTreeMap<String, TaggedObject> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    fn record_failure(&self, failure: BranchFailure) {
        self.failures.lock().push(failure);
    }

    /// Branches that failed during resolution, as `(tag, object, message)`
    pub fn failures(&self) -> Vec<(String, ObjectRef, String)> {
        self.failures
            .lock()
            .iter()
            .map(|f| (f.tag.clone(), f.object.clone(), f.error.to_string()))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.lock().is_empty()
    }
}

/// Resolver tuning
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Deadline for each individual inventory call
    pub call_timeout: Duration,
    /// Maximum container nesting followed below a tagged object
    pub max_depth: usize,
    /// Branches expanded in parallel
    pub concurrency: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            max_depth: 32,
            concurrency: 8,
        }
    }
}

/// Resolves tag names to the leaf objects they cover
pub struct TagResolver {
    session: Arc<dyn Session>,
    options: ResolverOptions,
}

impl TagResolver {
    pub fn new(session: Arc<dyn Session>, options: ResolverOptions) -> Self {
        Self { session, options }
    }

    /// Build a fresh index for `tags`.
    ///
    /// Fails only when the tagging service itself cannot be queried. Branch
    /// failures are logged and kept in [`TagIndex::failures`]; the index
    /// holds everything that did resolve.
    pub async fn resolve<S: AsRef<str>>(&self, tags: &[S]) -> Result<Arc<TagIndex>> {
        let index = Arc::new(TagIndex::new());
        let wanted: BTreeSet<&str> = tags.iter().map(AsRef::as_ref).collect();

        let mut roots = Vec::new();
        for tag in wanted {
            let attached = match timed(
                &format!("objects tagged {}", tag),
                self.options.call_timeout,
                self.session.list_tagged_objects(tag),
            )
            .await
            {
                Ok(objects) => objects,
                Err(CoreError::NotFound(_)) => {
                    tracing::debug!("tag {} is unknown to the tagging service", tag);
                    Vec::new()
                }
                Err(e) => {
                    return Err(CoreError::query(format!(
                        "listing objects tagged {}: {}",
                        tag, e
                    )))
                }
            };
            tracing::debug!("tag {} has {} direct attachments", tag, attached.len());
            roots.extend(attached.into_iter().map(|object| (tag.to_string(), object)));
        }

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = Vec::with_capacity(roots.len());

        for (tag, root) in roots {
            let session = Arc::clone(&self.session);
            let index = Arc::clone(&index);
            let semaphore = Arc::clone(&semaphore);
            let options = self.options.clone();

            tasks.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                let expansion = expand(session.as_ref(), root, &options).await;
                for leaf in &expansion.leaves {
                    index.add(leaf, &tag);
                }
                for (object, error) in expansion.failures {
                    index.record_failure(BranchFailure {
                        tag: tag.clone(),
                        object,
                        error,
                    });
                }
            }));
        }

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!("tag expansion task failed: {}", e);
            }
        }

        tracing::info!(
            "resolved {} tagged objects ({} failed branches)",
            index.len(),
            index.failures.lock().len()
        );
        Ok(index)
    }
}

#[derive(Debug, Default)]
struct Expansion {
    leaves: Vec<ObjectRef>,
    failures: Vec<(ObjectRef, CoreError)>,
}

/// Walk everything below `root`, collecting leaves. A container that fails
/// to expand is recorded and its siblings carry on.
async fn expand(session: &dyn Session, root: ObjectRef, options: &ResolverOptions) -> Expansion {
    let mut out = Expansion::default();
    let mut seen = HashSet::new();
    let mut pending = vec![(root, 0_usize)];

    while let Some((object, depth)) = pending.pop() {
        if !seen.insert(object.clone()) {
            continue;
        }
        if object.kind.is_leaf() {
            out.leaves.push(object);
            continue;
        }
        if !object.kind.is_container() {
            tracing::warn!("skipping {}: unrecognized kind {}", object.id, object.kind);
            let error = CoreError::unrecognized_kind(object.kind.to_string());
            out.failures.push((object, error));
            continue;
        }
        if depth >= options.max_depth {
            tracing::warn!("not expanding {}: depth {} reached", object, depth);
            let error = CoreError::DepthExceeded {
                object: object.to_string(),
                depth,
            };
            out.failures.push((object, error));
            continue;
        }

        match timed(
            &format!("children of {}", object),
            options.call_timeout,
            session.children(&object),
        )
        .await
        {
            Ok(children) => {
                for child in child_refs(&object.kind, children) {
                    pending.push((child, depth + 1));
                }
            }
            Err(e) => {
                if e.is_skippable() {
                    tracing::warn!("skipping branch {}: {}", object, e);
                } else {
                    tracing::error!("failed to expand {}: {}", object, e);
                }
                out.failures.push((object, e));
            }
        }
    }

    out
}

/// The child lists followed for each container kind
fn child_refs(kind: &ObjectKind, children: Children) -> Vec<ObjectRef> {
    match kind {
        ObjectKind::HostSystem | ObjectKind::VirtualApp => {
            [children.vms, children.networks, children.datastores].concat()
        }
        ObjectKind::ClusterComputeResource => {
            [children.networks, children.hosts, children.datastores].concat()
        }
        ObjectKind::Datacenter => [
            children.host_folder,
            children.datastore_folder,
            children.network_folder,
        ]
        .into_iter()
        .flatten()
        .map(|folder| ObjectRef::new(ObjectKind::Folder, folder.id))
        .collect(),
        ObjectKind::Folder => children.entities,
        _ => Vec::new(),
    }
}

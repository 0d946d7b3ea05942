//! Multi-version schema manager.
//!
//! Owns the registry of API surfaces and their version entries, drives
//! load → resolve → slug → emit for each entry, tracks which files each
//! root input read, and answers incremental-rebuild queries.
//!
//! ## Concurrency
//!
//! A full pass runs every surface and every version concurrently and
//! collects all outcomes; one failure never cancels its siblings. Each
//! entry carries a generation counter: a newer request for the same input
//! supersedes an in-flight one, and the stale request never commits its
//! result. Commits for one entry are serialized so the store write and the
//! bookkeeping update never interleave with another commit of that entry.

pub mod config;
pub mod dependency;

use futures::future::join_all;
use futures::lock::Mutex;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::canonical::canonical_hash_hex;
use crate::emitter::{emit, load_module, EmitError, GeneratedModule, LoadedModule};
use crate::loader::{DocumentLoader, InputSource, LoadError};
use crate::resolver::{resolve_with_stats, ResolveError};
use crate::slug::{slugify, SlugError, SlugGenerator, SlugInputs};
use crate::store::ModuleStore;
use crate::types::{EntryState, ModuleRecord, ProcessedSchema, ResolvedDocument, Value};

pub use config::{ConfigError, ManagerConfig, SurfaceConfig, VersionConfig};
pub use dependency::DependencyGraph;

/// Version label used when neither config nor document names one.
pub const DEFAULT_VERSION_LABEL: &str = "latest";

/// Error type for manager operations.
///
/// Everything except [`ManagerError::Registration`] is scoped to a single
/// version entry and reported through [`ProcessReport`] during a full pass.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Configuration or lookup names something that is not registered.
    #[error("registration error: {0}")]
    Registration(String),
    /// The loader failed.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Pointer resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Slug generation rejected a collision.
    #[error(transparent)]
    Slug(#[from] SlugError),
    /// Module emission failed.
    #[error(transparent)]
    Emit(#[from] EmitError),
    /// The module store failed.
    #[error("module store error: {0}")]
    Store(String),
    /// A newer request for the same input started before this one committed.
    #[error("processing of {input} was superseded by a newer request")]
    Superseded {
        /// Input key.
        input: String,
    },
}

impl ManagerError {
    /// Wrap a store error.
    pub fn from_store<E: std::error::Error>(error: E) -> Self {
        Self::Store(error.to_string())
    }

    /// Whether the error aborts the whole operation rather than one entry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Registration(_))
    }
}

/// One failed entry of a full pass.
#[derive(Debug)]
pub struct EntryFailure {
    /// Surface id.
    pub surface: String,
    /// Input key.
    pub input: String,
    /// What went wrong.
    pub error: ManagerError,
}

/// Outcome of [`SchemaManager::process_all`].
#[derive(Debug, Default)]
pub struct ProcessReport {
    /// Input keys processed successfully, in configuration order.
    pub processed: Vec<String>,
    /// Failed entries, in configuration order.
    pub failures: Vec<EntryFailure>,
    /// Wall-clock duration of the pass.
    pub duration_ms: u64,
}

impl ProcessReport {
    /// Whether every entry succeeded.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The failure for `input`, if it failed.
    pub fn failure_for(&self, input: &str) -> Option<&EntryFailure> {
        self.failures.iter().find(|f| f.input == input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryRef {
    surface: usize,
    index: usize,
}

#[derive(Debug)]
struct VersionEntry {
    config: VersionConfig,
    input_key: String,
    navigation_path: String,
    module_name: String,
    state: EntryState,
    schema: Option<ProcessedSchema>,
    generation: u64,
}

#[derive(Debug)]
struct SurfaceState {
    id: String,
    label: Option<String>,
    entries: Vec<VersionEntry>,
}

#[derive(Debug, Default)]
struct ManagerState {
    surfaces: Vec<SurfaceState>,
    by_input: BTreeMap<String, EntryRef>,
    dependencies: DependencyGraph,
    modules: BTreeMap<String, ModuleRecord>,
    /// Last timestamp handed out per input. Survives full passes so load
    /// specifiers never repeat within a session.
    stamps: BTreeMap<String, i64>,
}

impl ManagerState {
    fn entry(&self, at: EntryRef) -> &VersionEntry {
        &self.surfaces[at.surface].entries[at.index]
    }

    fn entry_mut(&mut self, at: EntryRef) -> &mut VersionEntry {
        &mut self.surfaces[at.surface].entries[at.index]
    }

    /// Drop every processed result and supersede in-flight requests.
    /// Timestamps are kept.
    fn reset(&mut self) {
        self.dependencies.clear();
        self.modules.clear();
        for surface in &mut self.surfaces {
            for entry in &mut surface.entries {
                entry.schema = None;
                entry.state = EntryState::Unprocessed;
                entry.generation += 1;
            }
        }
    }

    fn next_timestamp(&mut self, input: &str) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let stamp = match self.stamps.get(input) {
            Some(&last) if last >= now => last + 1,
            _ => now,
        };
        self.stamps.insert(input.to_string(), stamp);
        stamp
    }
}

/// Everything a processing request needs, snapshotted when it starts.
#[derive(Debug, Clone)]
struct Job {
    surface_id: String,
    surface_label: Option<String>,
    input: InputSource,
    input_key: String,
    version: Option<String>,
    navigation_path: String,
    module_name: String,
}

struct Built {
    processed: ProcessedSchema,
    module: GeneratedModule,
    files: Vec<String>,
}

/// Multi-version schema manager.
pub struct SchemaManager<L: DocumentLoader + ?Sized, S: ModuleStore> {
    loader: Arc<L>,
    store: Arc<S>,
    slugs: SlugGenerator,
    config_fingerprint: String,
    state: RwLock<ManagerState>,
    /// One commit lock per entry, indexed like `ManagerState::surfaces`.
    commit_locks: Vec<Vec<Mutex<()>>>,
}

impl<L: DocumentLoader + ?Sized, S: ModuleStore> SchemaManager<L, S> {
    /// Register every surface and version in `config`.
    ///
    /// Fails with [`ManagerError::Registration`] on an empty surface id, a
    /// duplicate surface, a surface without versions, an input registered
    /// twice, or two inputs sharing a navigation path.
    pub fn new(config: ManagerConfig, loader: Arc<L>, store: Arc<S>) -> Result<Self, ManagerError> {
        let config_fingerprint = canonical_hash_hex(&config)
            .map_err(|e| ManagerError::Registration(format!("config is not serializable: {e}")))?;
        let mut state = ManagerState::default();
        let mut surface_ids = BTreeSet::new();
        let mut module_names = BTreeSet::new();
        let mut navigation_paths = BTreeSet::new();

        for (s, surface) in config.surfaces.into_iter().enumerate() {
            if surface.id.trim_matches('/').is_empty() {
                return Err(ManagerError::Registration(
                    "surface id must not be empty".to_string(),
                ));
            }
            if !surface_ids.insert(surface.id.clone()) {
                return Err(ManagerError::Registration(format!(
                    "surface {} is configured twice",
                    surface.id
                )));
            }
            if surface.versions.is_empty() {
                return Err(ManagerError::Registration(format!(
                    "surface {} has no configured input",
                    surface.id
                )));
            }

            let mut entries = Vec::with_capacity(surface.versions.len());
            for (index, version) in surface.versions.into_iter().enumerate() {
                let input_key = version.input.key();
                let at = EntryRef { surface: s, index };
                if state.by_input.insert(input_key.clone(), at).is_some() {
                    return Err(ManagerError::Registration(format!(
                        "input {input_key} is registered more than once"
                    )));
                }
                let navigation_path = version.navigation_path(&surface.id, index);
                if !navigation_paths.insert(navigation_path.clone()) {
                    return Err(ManagerError::Registration(format!(
                        "navigation path {navigation_path} is used by more than one input"
                    )));
                }
                let module_name = unique_module_name(&surface.id, &version.input, &mut module_names);
                entries.push(VersionEntry {
                    config: version,
                    input_key,
                    navigation_path,
                    module_name,
                    state: EntryState::Unprocessed,
                    schema: None,
                    generation: 0,
                });
            }

            state.surfaces.push(SurfaceState {
                id: surface.id,
                label: surface.label,
                entries,
            });
        }

        let commit_locks = state
            .surfaces
            .iter()
            .map(|surface| surface.entries.iter().map(|_| Mutex::new(())).collect())
            .collect();

        info!(
            surfaces = state.surfaces.len(),
            inputs = state.by_input.len(),
            config_fingerprint = %config_fingerprint,
            "Schema manager registered"
        );

        Ok(Self {
            loader,
            store,
            slugs: SlugGenerator::new(config.collision_policy),
            config_fingerprint,
            state: RwLock::new(state),
            commit_locks,
        })
    }

    /// xxh64 of the canonical configuration this manager was built from.
    pub fn config_fingerprint(&self) -> &str {
        &self.config_fingerprint
    }

    /// The module store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Clear all state and rebuild every version of every surface.
    ///
    /// Per-entry failures are collected in the report; only store-level
    /// failures while clearing abort the pass. Requests already in flight
    /// are superseded.
    pub async fn process_all(&self) -> Result<ProcessReport, ManagerError> {
        let started = Instant::now();
        let layout: Vec<Vec<EntryRef>> = {
            let mut state = self.state.write();
            state.reset();
            state
                .surfaces
                .iter()
                .enumerate()
                .map(|(s, surface)| {
                    (0..surface.entries.len())
                        .map(|index| EntryRef { surface: s, index })
                        .collect()
                })
                .collect()
        };
        self.store.clear().await.map_err(ManagerError::from_store)?;
        // Anything committed while the store was clearing may describe a
        // module that no longer exists.
        self.state.write().reset();

        let surfaces = layout.into_iter().map(|entries| async move {
            join_all(
                entries
                    .into_iter()
                    .map(|at| async move { (at, self.process_entry(at).await) }),
            )
            .await
        });
        let outcomes = join_all(surfaces).await;

        let mut report = ProcessReport::default();
        {
            let state = self.state.read();
            for (at, outcome) in outcomes.into_iter().flatten() {
                let input = state.entry(at).input_key.clone();
                match outcome {
                    Ok(_) => report.processed.push(input),
                    Err(error) => report.failures.push(EntryFailure {
                        surface: state.surfaces[at.surface].id.clone(),
                        input,
                        error,
                    }),
                }
            }
        }
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            processed = report.processed.len(),
            failed = report.failures.len(),
            tracked_files = self.state.read().dependencies.len(),
            duration_ms = report.duration_ms,
            "Full schema pass complete"
        );
        Ok(report)
    }

    /// Reprocess the single entry registered for `input`.
    ///
    /// Other entries, their modules, and their positions are untouched. On
    /// failure the entry keeps serving its last successful schema.
    pub async fn process_one(&self, input: &str) -> Result<ProcessedSchema, ManagerError> {
        let at = self
            .state
            .read()
            .by_input
            .get(input)
            .copied()
            .ok_or_else(|| ManagerError::Registration(format!("input {input} is not registered")))?;
        self.process_entry(at).await
    }

    /// Root inputs to rebuild after `changed` was modified.
    ///
    /// Every root whose last bundle read `changed`, plus `changed` itself
    /// when it is a registered input, sorted. A root that failed before
    /// recording its own files is still returned.
    pub fn files_to_reprocess(&self, changed: &str) -> Vec<String> {
        let state = self.state.read();
        let mut files: BTreeSet<String> = state.dependencies.dependents(changed).into_iter().collect();
        if state.by_input.contains_key(changed) {
            files.insert(changed.to_string());
        }
        files.into_iter().collect()
    }

    /// Every file worth watching: files read by any bundle plus every
    /// registered file input.
    pub fn tracked_files(&self) -> Vec<String> {
        let state = self.state.read();
        let mut files: BTreeSet<String> = state.dependencies.files().map(str::to_string).collect();
        for surface in &state.surfaces {
            for entry in &surface.entries {
                if matches!(entry.config.input, InputSource::File { .. }) {
                    files.insert(entry.input_key.clone());
                }
            }
        }
        files.into_iter().collect()
    }

    /// The latest version of a surface: its first configured entry.
    pub fn latest_schema(&self, surface_id: &str) -> Option<ProcessedSchema> {
        let state = self.state.read();
        let surface = find_surface(&state, surface_id)?;
        surface.entries.first()?.schema.clone()
    }

    /// Processed versions of a surface, in configuration order.
    pub fn versions(&self, surface_id: &str) -> Vec<ProcessedSchema> {
        let state = self.state.read();
        find_surface(&state, surface_id)
            .map(|surface| {
                surface
                    .entries
                    .iter()
                    .filter_map(|entry| entry.schema.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The processed version served at `path`.
    pub fn schema_for_navigation_path(&self, path: &str) -> Option<ProcessedSchema> {
        let path = path.trim_matches('/');
        let state = self.state.read();
        state
            .surfaces
            .iter()
            .flat_map(|surface| surface.entries.iter())
            .find(|entry| entry.navigation_path == path)
            .and_then(|entry| entry.schema.clone())
    }

    /// The processed schema for an input key.
    pub fn schema_for_input(&self, input: &str) -> Option<ProcessedSchema> {
        let state = self.state.read();
        let at = state.by_input.get(input)?;
        state.entry(*at).schema.clone()
    }

    /// Where the generated module for `input` lives.
    pub fn module_for_input(&self, input: &str) -> Option<ModuleRecord> {
        self.state.read().modules.get(input).cloned()
    }

    /// Lifecycle state of the entry for `input`.
    pub fn entry_state(&self, input: &str) -> Option<EntryState> {
        let state = self.state.read();
        let at = state.by_input.get(input)?;
        Some(state.entry(*at).state.clone())
    }

    /// Registered surface ids, in configuration order.
    pub fn surface_ids(&self) -> Vec<String> {
        self.state.read().surfaces.iter().map(|s| s.id.clone()).collect()
    }

    /// Read the generated module for `input` back from the store.
    pub async fn load_generated(&self, input: &str) -> Result<Option<LoadedModule>, ManagerError> {
        let Some(record) = self.module_for_input(input) else {
            return Ok(None);
        };
        let text = self
            .store
            .read_module(&record.name)
            .await
            .map_err(ManagerError::from_store)?;
        match text {
            Some(text) => Ok(Some(load_module(&text)?)),
            None => Ok(None),
        }
    }

    async fn process_entry(&self, at: EntryRef) -> Result<ProcessedSchema, ManagerError> {
        let started = Instant::now();
        let (generation, job) = self.begin(at);

        let outcome = match self.build(&job).await {
            Ok(built) => self.commit(at, generation, &job, built).await,
            Err(error) => Err(error),
        };

        match outcome {
            Ok(processed) => {
                info!(
                    surface = %job.surface_id,
                    input = %job.input_key,
                    version = %processed.version,
                    path = %processed.navigation_path,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Processed schema version"
                );
                Ok(processed)
            }
            Err(error) => {
                self.fail(at, generation, &error);
                warn!(
                    surface = %job.surface_id,
                    input = %job.input_key,
                    error = %error,
                    "Failed to process schema version"
                );
                Err(error)
            }
        }
    }

    /// Bump the entry's generation and snapshot what the request needs.
    fn begin(&self, at: EntryRef) -> (u64, Job) {
        let mut state = self.state.write();
        let surface = &state.surfaces[at.surface];
        let (surface_id, surface_label) = (surface.id.clone(), surface.label.clone());

        let entry = state.entry_mut(at);
        entry.generation += 1;
        entry.state = EntryState::Processing;
        let job = Job {
            surface_id,
            surface_label,
            input: entry.config.input.clone(),
            input_key: entry.input_key.clone(),
            version: entry.config.version.clone(),
            navigation_path: entry.navigation_path.clone(),
            module_name: entry.module_name.clone(),
        };
        (entry.generation, job)
    }

    async fn build(&self, job: &Job) -> Result<Built, ManagerError> {
        let loaded = self.loader.load(&job.input).await?;
        let (document, stats) = resolve_with_stats(&loaded.document, &job.input_key)?;
        let slugs = self.slugs.generate(&SlugInputs::from_document(&document))?;
        let module = emit(&document, &slugs.table)?;

        debug!(
            input = %job.input_key,
            pointers = stats.pointers,
            shared_targets = stats.shared_targets,
            nodes = stats.nodes,
            slots = module.slot_count,
            slug_collisions = slugs.collisions.len(),
            "Resolved and emitted schema"
        );

        let version = job
            .version
            .clone()
            .or_else(|| info_field(&document, "version"))
            .unwrap_or_else(|| DEFAULT_VERSION_LABEL.to_string());
        let label = job
            .surface_label
            .clone()
            .or_else(|| info_field(&document, "title"))
            .unwrap_or_else(|| job.surface_id.clone());
        let download_url = match &job.input {
            InputSource::Url { url } => Some(url.clone()),
            InputSource::File { .. } => job
                .input
                .file_name()
                .map(|name| format!("/{}/{}", job.navigation_path, name)),
            InputSource::Inline { .. } => None,
        };

        let mut files = loaded.files;
        if matches!(job.input, InputSource::File { .. }) && !files.contains(&job.input_key) {
            files.insert(0, job.input_key.clone());
        }

        Ok(Built {
            processed: ProcessedSchema {
                schema: Arc::new(document),
                slugs: Arc::new(slugs.table),
                version,
                navigation_path: job.navigation_path.clone(),
                input_file_path: job.input_key.clone(),
                download_url,
                label,
            },
            module,
            files,
        })
    }

    async fn commit(
        &self,
        at: EntryRef,
        generation: u64,
        job: &Job,
        built: Built,
    ) -> Result<ProcessedSchema, ManagerError> {
        let _commit = self.commit_locks[at.surface][at.index].lock().await;
        let superseded = || ManagerError::Superseded {
            input: job.input_key.clone(),
        };

        let previous = {
            let state = self.state.read();
            if state.entry(at).generation != generation {
                return Err(superseded());
            }
            state.modules.get(&job.input_key).cloned()
        };

        let unchanged = previous
            .as_ref()
            .filter(|record| record.fingerprint == built.module.fingerprint);
        let location = match unchanged {
            Some(record) => {
                debug!(input = %job.input_key, module = %record.name, "Module unchanged, skipping write");
                None
            }
            None => Some(
                self.store
                    .write_module(&job.module_name, &built.module.text)
                    .await
                    .map_err(ManagerError::from_store)?,
            ),
        };

        let mut state = self.state.write();
        if let Some(location) = location {
            // The store now holds this text, so the record must describe it
            // even if a newer request took over while writing.
            let timestamp = state.next_timestamp(&job.input_key);
            state.modules.insert(
                job.input_key.clone(),
                ModuleRecord {
                    name: job.module_name.clone(),
                    location,
                    timestamp,
                    fingerprint: built.module.fingerprint.clone(),
                },
            );
        }
        if state.entry(at).generation != generation {
            return Err(superseded());
        }

        state.dependencies.replace_root(&job.input_key, &built.files);
        let entry = state.entry_mut(at);
        entry.state = EntryState::Processed;
        entry.schema = Some(built.processed.clone());
        Ok(built.processed)
    }

    fn fail(&self, at: EntryRef, generation: u64, error: &ManagerError) {
        if matches!(error, ManagerError::Superseded { .. }) {
            return;
        }
        let mut state = self.state.write();
        let entry = state.entry_mut(at);
        if entry.generation == generation {
            entry.state = EntryState::Failed {
                error: error.to_string(),
            };
        }
    }
}

fn find_surface<'a>(state: &'a ManagerState, surface_id: &str) -> Option<&'a SurfaceState> {
    let wanted = surface_id.trim_matches('/');
    state
        .surfaces
        .iter()
        .find(|surface| surface.id.trim_matches('/') == wanted)
}

fn info_field(doc: &ResolvedDocument, field: &str) -> Option<String> {
    let info = doc.get(doc.root(), "info")?;
    match doc.get(info, field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `{slug(surface)}-{slug(stem)}.json`, suffixed `-2`, `-3`, … on clashes.
fn unique_module_name(surface_id: &str, input: &InputSource, taken: &mut BTreeSet<String>) -> String {
    let base = [slugify(surface_id), slugify(&input.stem())]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let base = if base.is_empty() { "schema".to_string() } else { base };

    let mut candidate = format!("{base}.json");
    let mut n = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{base}-{n}.json");
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::InMemoryLoader;
    use crate::store::InMemoryModuleStore;
    use serde_json::json;

    fn petstore(version: &str) -> serde_json::Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Petstore", "version": version},
            "tags": [{"name": "Pets"}],
            "paths": {
                "/pets": {"get": {"tags": ["Pets"], "responses": {"200": {
                    "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
                }}}}
            },
            "components": {"schemas": {"Pet": {"type": "object"}}}
        })
    }

    fn manager(
        config: ManagerConfig,
    ) -> (
        SchemaManager<InMemoryLoader, InMemoryModuleStore>,
        Arc<InMemoryLoader>,
        Arc<InMemoryModuleStore>,
    ) {
        let loader = Arc::new(InMemoryLoader::new());
        let store = Arc::new(InMemoryModuleStore::new());
        let manager = SchemaManager::new(config, loader.clone(), store.clone()).unwrap();
        (manager, loader, store)
    }

    fn single(path: &str) -> ManagerConfig {
        ManagerConfig::default().surface(
            SurfaceConfig::new("api/pets").version(VersionConfig::new(InputSource::file(path))),
        )
    }

    #[test]
    fn test_module_names_are_unique() {
        let mut taken = BTreeSet::new();
        let a = unique_module_name("api/pets", &InputSource::file("v1/openapi.json"), &mut taken);
        let b = unique_module_name("api/pets", &InputSource::file("v2/openapi.json"), &mut taken);
        assert_eq!(a, "api-pets-openapi.json");
        assert_eq!(b, "api-pets-openapi-2.json");
    }

    #[test]
    fn test_registration_errors() {
        let loader = Arc::new(InMemoryLoader::new());
        let store = Arc::new(InMemoryModuleStore::new());

        let empty = ManagerConfig::default().surface(SurfaceConfig::new("api/empty"));
        assert!(matches!(
            SchemaManager::new(empty, loader.clone(), store.clone()),
            Err(ManagerError::Registration(_))
        ));

        let duplicate = ManagerConfig::default()
            .surface(SurfaceConfig::new("a").version(VersionConfig::new(InputSource::file("x.json"))))
            .surface(SurfaceConfig::new("b").version(VersionConfig::new(InputSource::file("x.json"))));
        let err = SchemaManager::new(duplicate, loader, store).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_navigation_paths_must_be_unique() {
        let loader = Arc::new(InMemoryLoader::new());
        let store = Arc::new(InMemoryModuleStore::new());

        let case_clash = ManagerConfig::default().surface(
            SurfaceConfig::new("api/pets")
                .version(VersionConfig::new(InputSource::file("latest.json")))
                .version(VersionConfig::new(InputSource::file("a.json")).labeled("v1"))
                .version(VersionConfig::new(InputSource::file("b.json")).labeled("V1")),
        );
        let err = SchemaManager::new(case_clash, loader.clone(), store.clone()).err().unwrap();
        assert!(matches!(&err, ManagerError::Registration(msg) if msg.contains("api/pets/v1")));

        let explicit_clash = ManagerConfig::default()
            .surface(SurfaceConfig::new("api/pets").version(VersionConfig::new(InputSource::file("pets.json"))))
            .surface(
                SurfaceConfig::new("api/other")
                    .version(VersionConfig::new(InputSource::file("other.json")).at_path("/api/pets/")),
            );
        assert!(matches!(
            SchemaManager::new(explicit_clash, loader.clone(), store.clone()),
            Err(ManagerError::Registration(_))
        ));

        let distinct = ManagerConfig::default().surface(
            SurfaceConfig::new("api/pets")
                .version(VersionConfig::new(InputSource::file("latest.json")))
                .version(VersionConfig::new(InputSource::file("a.json")).labeled("v1"))
                .version(VersionConfig::new(InputSource::file("b.json")).labeled("v2")),
        );
        assert!(SchemaManager::new(distinct, loader, store).is_ok());
    }

    #[test]
    fn test_config_fingerprint_tracks_config() {
        let (a, _, _) = manager(single("pets.json"));
        let (b, _, _) = manager(single("pets.json"));
        let (c, _, _) = manager(single("other.json"));
        assert_eq!(a.config_fingerprint(), b.config_fingerprint());
        assert_ne!(a.config_fingerprint(), c.config_fingerprint());
        assert_eq!(a.surface_ids(), vec!["api/pets"]);
    }

    #[tokio::test]
    async fn test_process_one_unknown_input() {
        let (manager, _, _) = manager(single("pets.json"));
        let err = manager.process_one("nope.json").await.unwrap_err();
        assert!(matches!(err, ManagerError::Registration(_)));
    }

    #[tokio::test]
    async fn test_processed_metadata_defaults() {
        let (manager, loader, _) = manager(single("schemas/pets.json"));
        loader.insert("schemas/pets.json", petstore("1.2.0"));

        let processed = manager.process_one("schemas/pets.json").await.unwrap();
        assert_eq!(processed.version, "1.2.0");
        assert_eq!(processed.label, "Petstore");
        assert_eq!(processed.navigation_path, "api/pets");
        assert_eq!(processed.download_url.as_deref(), Some("/api/pets/pets.json"));
        assert_eq!(processed.slugs.tag("Pets"), Some("pets"));
        assert_eq!(manager.entry_state("schemas/pets.json"), Some(EntryState::Processed));
    }

    #[tokio::test]
    async fn test_unchanged_module_skips_write() {
        let (manager, loader, store) = manager(single("pets.json"));
        loader.insert("pets.json", petstore("1"));

        manager.process_one("pets.json").await.unwrap();
        let first = manager.module_for_input("pets.json").unwrap();
        manager.process_one("pets.json").await.unwrap();
        let second = manager.module_for_input("pets.json").unwrap();

        assert_eq!(store.write_count(&first.name), 1);
        assert_eq!(first, second);

        loader.insert("pets.json", petstore("2"));
        manager.process_one("pets.json").await.unwrap();
        let third = manager.module_for_input("pets.json").unwrap();
        assert_eq!(store.write_count(&first.name), 2);
        assert!(third.timestamp > first.timestamp);
        assert_ne!(third.fingerprint, first.fingerprint);
    }

    #[tokio::test]
    async fn test_store_failure_is_scoped() {
        let (manager, loader, store) = manager(single("pets.json"));
        loader.insert("pets.json", petstore("1"));
        store.fail_writes(true);

        let err = manager.process_one("pets.json").await.unwrap_err();
        assert!(matches!(err, ManagerError::Store(_)));
        assert!(manager.entry_state("pets.json").unwrap().is_failed());
        assert!(manager.module_for_input("pets.json").is_none());
    }
}

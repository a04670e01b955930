//! Upload entry points used by the admin layer.
//!
//! Every upload follows the same path: resolve the entity/kind context,
//! transcode each configured size (failures skip the size), write the
//! variants under fresh names, then upsert the file record and delete
//! whatever files the new names superseded.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sea_orm::DatabaseConnection;

use crate::error::MediaError;
use crate::models::names::{merge_names, Profile, SizeNames, VariantNames};
use crate::models::record::{FileRecord, Owner};
use crate::models::settings::OutputSettings;
use crate::services::context::{ConfigProvider, ContextResolver, MediaContext, MediaSizeSpec};
use crate::services::records::FileRecordStore;
use crate::services::storage::{delete_all, BlobStore, DiskRegistry};
use crate::utils::image_processor::Transcoder;
use crate::utils::naming::NameGenerator;

fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if bytes as f64 >= MB {
        format!("{:.2}MiB", bytes as f64 / MB)
    } else if bytes as f64 >= KB {
        format!("{:.2}kb", bytes as f64 / KB)
    } else {
        format!("{}b", bytes)
    }
}

/// Uploaded bytes, either already in memory or in a temporary file.
#[derive(Debug, Clone)]
pub enum MediaSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl MediaSource {
    pub async fn read(self) -> Result<Vec<u8>, MediaError> {
        let data = match self {
            MediaSource::Bytes(data) => data,
            MediaSource::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| MediaError::UnreadableSource(format!("{}: {}", path.display(), e)))?,
        };

        if data.is_empty() {
            return Err(MediaError::UnreadableSource("uploaded file is empty".to_string()));
        }
        Ok(data)
    }
}

impl From<Vec<u8>> for MediaSource {
    fn from(data: Vec<u8>) -> Self {
        MediaSource::Bytes(data)
    }
}

impl From<PathBuf> for MediaSource {
    fn from(path: PathBuf) -> Self {
        MediaSource::File(path)
    }
}

#[derive(Debug, Default)]
pub struct ResponsiveSources {
    pub mobile: Option<MediaSource>,
    pub desktop: Option<MediaSource>,
}

impl ResponsiveSources {
    fn into_profiles(self) -> Vec<(Profile, MediaSource)> {
        [(Profile::Mobile, self.mobile), (Profile::Desktop, self.desktop)]
            .into_iter()
            .filter_map(|(profile, source)| source.map(|s| (profile, s)))
            .collect()
    }
}

/// A fallback source plus per-size overrides.
#[derive(Debug, Default)]
pub struct DefaultSources {
    pub default: Option<MediaSource>,
    pub sizes: BTreeMap<String, MediaSource>,
}

/// What `replace_existing = false` does when a record already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingRecordPolicy {
    /// Return the existing record untouched; nothing is transcoded or written.
    #[default]
    Keep,
    /// Merge the new names into the existing record.
    Merge,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub subtype: Option<String>,
    pub only_sizes: Option<BTreeSet<String>>,
    pub replace_existing: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            subtype: None,
            only_sizes: None,
            replace_existing: true,
        }
    }
}

impl UploadOptions {
    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn only_sizes<I, S>(mut self, sizes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_sizes = Some(sizes.into_iter().map(Into::into).collect());
        self
    }

    pub fn keep_existing(mut self) -> Self {
        self.replace_existing = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconcile {
    Replace,
    Merge,
}

type Variants = Vec<(String, Vec<u8>)>;

#[derive(Clone)]
pub struct MediaService {
    records: FileRecordStore,
    resolver: ContextResolver,
    disks: DiskRegistry,
    names: NameGenerator,
    transcoder: Transcoder,
    existing_policy: ExistingRecordPolicy,
}

impl MediaService {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<dyn ConfigProvider>,
        disks: DiskRegistry,
        output: OutputSettings,
    ) -> Self {
        Self {
            records: FileRecordStore::new(db),
            resolver: ContextResolver::new(config),
            disks,
            names: NameGenerator::new(output.format.extension()),
            transcoder: Transcoder::new(output),
            existing_policy: ExistingRecordPolicy::default(),
        }
    }

    pub fn with_name_generator(mut self, names: NameGenerator) -> Self {
        self.names = names;
        self
    }

    pub fn with_existing_policy(mut self, policy: ExistingRecordPolicy) -> Self {
        self.existing_policy = policy;
        self
    }

    pub fn records(&self) -> &FileRecordStore {
        &self.records
    }

    pub fn resolver(&self) -> &ContextResolver {
        &self.resolver
    }

    pub fn disks(&self) -> &DiskRegistry {
        &self.disks
    }

    /// One source, every configured size.
    pub async fn upload_model_image(
        &self,
        owner: Owner,
        source: MediaSource,
        kind: &str,
        options: UploadOptions,
    ) -> Result<FileRecord, MediaError> {
        let ctx = self.resolver.resolve(owner.entity, kind)?;
        let sizes = self.sizes_for(&ctx, &options)?;

        let existing = self
            .records
            .find_active(owner, kind, options.subtype.as_deref())
            .await?;
        if let Some(record) = self.kept_record(existing.as_ref(), &options) {
            return Ok(record);
        }

        let data = Arc::new(source.read().await?);
        let variants = self.transcode_sizes(&data, &sizes).await;
        if variants.is_empty() {
            return Err(MediaError::NoVariantsGenerated);
        }

        let store = self.disks.get(&ctx.disk)?;
        let prefix = name_prefix(&ctx, options.subtype.as_deref(), None);
        let names = self.write_variants(store.as_ref(), &prefix, variants).await?;

        self.reconcile(
            store.as_ref(),
            owner,
            kind,
            options.subtype.as_deref(),
            existing,
            VariantNames::Flat(names),
            self.mode_for(&options, false),
        )
        .await
    }

    /// Separate mobile and desktop sources, each run through the full table.
    pub async fn upload_model_responsive_images(
        &self,
        owner: Owner,
        sources: ResponsiveSources,
        kind: &str,
        options: UploadOptions,
    ) -> Result<FileRecord, MediaError> {
        let ctx = self.resolver.resolve(owner.entity, kind)?;
        let sizes = self.sizes_for(&ctx, &options)?;

        let existing = self
            .records
            .find_active(owner, kind, options.subtype.as_deref())
            .await?;
        if let Some(record) = self.kept_record(existing.as_ref(), &options) {
            return Ok(record);
        }

        let mut transcoded: Vec<(Profile, Variants)> = Vec::new();
        for (profile, source) in sources.into_profiles() {
            let data = Arc::new(source.read().await?);
            let variants = self.transcode_sizes(&data, &sizes).await;
            if variants.is_empty() {
                tracing::warn!(profile = profile.as_str(), kind, "no variant produced for profile");
                continue;
            }
            transcoded.push((profile, variants));
        }
        if transcoded.is_empty() {
            return Err(MediaError::NoVariantsGenerated);
        }

        let store = self.disks.get(&ctx.disk)?;
        let mut profiles = BTreeMap::new();
        for (profile, variants) in transcoded {
            let prefix = name_prefix(&ctx, options.subtype.as_deref(), Some(profile));
            match self.write_variants(store.as_ref(), &prefix, variants).await {
                Ok(names) => {
                    profiles.insert(profile, names);
                }
                Err(e) => {
                    delete_all(store.as_ref(), &VariantNames::Profiled(profiles).leaves()).await;
                    return Err(e);
                }
            }
        }

        self.reconcile(
            store.as_ref(),
            owner,
            kind,
            options.subtype.as_deref(),
            existing,
            VariantNames::Profiled(profiles),
            self.mode_for(&options, false),
        )
        .await
    }

    /// Per size, the override source if one was given, else the default
    /// source, else the size is left alone. Existing names for sizes not
    /// uploaded this time are kept.
    pub async fn upload_model_image_with_defaults(
        &self,
        owner: Owner,
        sources: DefaultSources,
        kind: &str,
        options: UploadOptions,
    ) -> Result<FileRecord, MediaError> {
        let ctx = self.resolver.resolve(owner.entity, kind)?;
        let sizes = self.sizes_for(&ctx, &options)?;

        let existing = self
            .records
            .find_active(owner, kind, options.subtype.as_deref())
            .await?;
        if let Some(record) = self.kept_record(existing.as_ref(), &options) {
            return Ok(record);
        }

        let DefaultSources {
            default,
            sizes: mut overrides,
        } = sources;
        let default_data = match default {
            Some(source) => Some(Arc::new(source.read().await?)),
            None => None,
        };

        let mut variants = Vec::new();
        for spec in &sizes {
            let data = match overrides.remove(&spec.key) {
                Some(source) => Arc::new(source.read().await?),
                None => match &default_data {
                    Some(data) => Arc::clone(data),
                    None => {
                        tracing::debug!(size = %spec.key, kind, "no source for size, leaving it as is");
                        continue;
                    }
                },
            };
            variants.extend(self.transcode_sizes(&data, std::slice::from_ref(spec)).await);
        }
        if variants.is_empty() {
            return Err(MediaError::NoVariantsGenerated);
        }

        let store = self.disks.get(&ctx.disk)?;
        let prefix = name_prefix(&ctx, options.subtype.as_deref(), None);
        let names = self.write_variants(store.as_ref(), &prefix, variants).await?;

        self.reconcile(
            store.as_ref(),
            owner,
            kind,
            options.subtype.as_deref(),
            existing,
            VariantNames::Flat(names),
            self.mode_for(&options, true),
        )
        .await
    }

    /// Applies a size-key patch to a stored record (`None` removes the key)
    /// and deletes the files the patch dropped or replaced. New values must
    /// name files the record already references. `profile`
    /// selects the bucket of a responsive record and must be `None` for a
    /// flat one.
    pub async fn patch_names(
        &self,
        owner: Owner,
        kind: &str,
        subtype: Option<&str>,
        profile: Option<Profile>,
        patch: BTreeMap<String, Option<String>>,
    ) -> Result<FileRecord, MediaError> {
        let ctx = self.resolver.resolve(owner.entity, kind)?;
        let record = self
            .records
            .find_active(owner, kind, subtype)
            .await?
            .ok_or(MediaError::RecordNotFound)?;

        // A patch may only drop sizes or point them at files this record
        // already owns. Anything else would reference a missing file or
        // share one with another record.
        let owned: BTreeSet<&str> = record.names.leaves().into_iter().collect();
        if let Some(foreign) = patch
            .values()
            .flatten()
            .find(|name| !owned.contains(name.as_str()))
        {
            return Err(MediaError::InvalidRequest(format!(
                "'{}' is not a file of this record",
                foreign
            )));
        }

        let next = match (&record.names, profile) {
            (VariantNames::Flat(names), None) => VariantNames::Flat(merge_names(names, &patch)),
            (VariantNames::Profiled(profiles), Some(profile)) => {
                let mut profiles = profiles.clone();
                let base = profiles.remove(&profile).unwrap_or_default();
                let merged = merge_names(&base, &patch);
                if !merged.is_empty() {
                    profiles.insert(profile, merged);
                }
                VariantNames::Profiled(profiles)
            }
            (names, _) => {
                return Err(MediaError::NamesShapeMismatch {
                    expected: if profile.is_some() { "profiled" } else { "flat" },
                    found: names.shape(),
                })
            }
        };

        let store = self.disks.get(&ctx.disk)?;
        let saved = self.records.update_names(&record, &next).await?;
        let superseded = record.names.superseded_by(&saved.names);
        delete_all(store.as_ref(), &superseded).await;
        Ok(saved)
    }

    /// Deletes every file `names` refers to. Missing files are fine, so
    /// calling this twice is harmless.
    pub async fn delete_physical_files(
        &self,
        names: &VariantNames,
        disk: &str,
    ) -> Result<usize, MediaError> {
        let store = self.disks.get(disk)?;
        Ok(delete_all(store.as_ref(), &names.leaves()).await)
    }

    pub async fn records_for(&self, owner: Owner) -> Result<Vec<FileRecord>, MediaError> {
        self.records.list_active(owner).await
    }

    pub fn url_for(
        &self,
        record: &FileRecord,
        size: &str,
        profile: Option<Profile>,
    ) -> Result<Option<String>, MediaError> {
        let disk = self.resolver.disk_for(record.owner.entity)?;
        let store = self.disks.get(&disk)?;
        Ok(record.names.get(size, profile).map(|name| store.url(name)))
    }

    /// Same shape as `record.names`, with every file name turned into its URL.
    pub fn variant_urls(&self, record: &FileRecord) -> Result<VariantNames, MediaError> {
        let disk = self.resolver.disk_for(record.owner.entity)?;
        let store = self.disks.get(&disk)?;
        let to_urls = |names: &SizeNames| -> SizeNames {
            names
                .iter()
                .map(|(size, name)| (size.clone(), store.url(name)))
                .collect()
        };

        Ok(match &record.names {
            VariantNames::Flat(names) => VariantNames::Flat(to_urls(names)),
            VariantNames::Profiled(profiles) => VariantNames::Profiled(
                profiles
                    .iter()
                    .map(|(profile, names)| (*profile, to_urls(names)))
                    .collect(),
            ),
        })
    }

    /// URL of the kind's configured `display` size, if both exist.
    pub fn display_url(
        &self,
        record: &FileRecord,
        profile: Option<Profile>,
    ) -> Result<Option<String>, MediaError> {
        let ctx = self.resolver.resolve(record.owner.entity, &record.kind)?;
        match ctx.display {
            Some(display) => self.url_for(record, &display, profile),
            None => Ok(None),
        }
    }

    fn sizes_for(
        &self,
        ctx: &MediaContext,
        options: &UploadOptions,
    ) -> Result<Vec<MediaSizeSpec>, MediaError> {
        let sizes: Vec<MediaSizeSpec> = ctx
            .generated_sizes(options.only_sizes.as_ref())
            .into_iter()
            .cloned()
            .collect();

        if sizes.is_empty() {
            return Err(MediaError::NoSizesConfigured {
                entity: ctx.entity.to_string(),
                kind: ctx.kind.clone(),
            });
        }
        Ok(sizes)
    }

    fn kept_record(
        &self,
        existing: Option<&FileRecord>,
        options: &UploadOptions,
    ) -> Option<FileRecord> {
        let record = existing?;
        if options.replace_existing || self.existing_policy != ExistingRecordPolicy::Keep {
            return None;
        }
        tracing::info!(record = %record.id, kind = %record.kind, "record exists and replace is off, keeping it");
        Some(record.clone())
    }

    fn mode_for(&self, options: &UploadOptions, incremental: bool) -> Reconcile {
        if options.replace_existing && !incremental {
            Reconcile::Replace
        } else {
            Reconcile::Merge
        }
    }

    /// Transcodes on the blocking pool, one size at a time. Failed sizes are
    /// logged and left out of the result.
    async fn transcode_sizes(&self, data: &Arc<Vec<u8>>, sizes: &[MediaSizeSpec]) -> Variants {
        let mut variants = Vec::with_capacity(sizes.len());

        for spec in sizes {
            let started = Instant::now();
            let source_len = data.len();
            let data = Arc::clone(data);
            let transcoder = self.transcoder;
            let (width, height, fit) = (spec.width, spec.height, spec.fit);

            let result = tokio::task::spawn_blocking(move || {
                transcoder.resize(&data, width, height, fit)
            })
            .await;

            match result {
                Ok(Ok(bytes)) => {
                    tracing::debug!(
                        size = %spec.key,
                        took = ?started.elapsed(),
                        "{} -> {}",
                        format_size(source_len),
                        format_size(bytes.len()),
                    );
                    variants.push((spec.key.clone(), bytes));
                }
                Ok(Err(e)) => {
                    tracing::warn!(size = %spec.key, error = %e, "skipping size");
                }
                Err(e) => {
                    tracing::warn!(size = %spec.key, error = %e, "transcode task failed, skipping size");
                }
            }
        }

        variants
    }

    /// Stores each variant under a fresh name. On a failed write the files
    /// already written by this call are removed again.
    async fn write_variants(
        &self,
        store: &dyn BlobStore,
        prefix: &[String],
        variants: Variants,
    ) -> Result<SizeNames, MediaError> {
        let content_type = self.transcoder.output().format.mime_type();
        let mut names = SizeNames::new();

        for (size, bytes) in variants {
            let mut parts = prefix.to_vec();
            parts.push(size.clone());
            let name = self.names.generate(&parts);

            if let Err(e) = store.put(&name, bytes, content_type).await {
                let written: Vec<&String> = names.values().collect();
                delete_all(store, &written).await;
                return Err(e.into());
            }
            names.insert(size, name);
        }

        Ok(names)
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile(
        &self,
        store: &dyn BlobStore,
        owner: Owner,
        kind: &str,
        subtype: Option<&str>,
        existing: Option<FileRecord>,
        incoming: VariantNames,
        mode: Reconcile,
    ) -> Result<FileRecord, MediaError> {
        let saved = match &existing {
            None => self.records.insert(owner, kind, subtype, &incoming).await,
            Some(record) => {
                let next = match mode {
                    Reconcile::Replace => incoming.clone(),
                    Reconcile::Merge => record.names.merge(&incoming),
                };
                self.records.update_names(record, &next).await
            }
        };

        let saved = match saved {
            Ok(saved) => saved,
            Err(e) => {
                delete_all(store, &incoming.leaves()).await;
                return Err(e);
            }
        };

        match existing {
            Some(previous) => {
                let superseded = previous.names.superseded_by(&saved.names);
                let removed = delete_all(store, &superseded).await;
                tracing::info!(
                    record = %saved.id,
                    owner = %owner.id,
                    entity = %owner.entity,
                    kind,
                    mode = ?mode,
                    removed,
                    "file record updated"
                );
            }
            None => {
                tracing::info!(
                    record = %saved.id,
                    owner = %owner.id,
                    entity = %owner.entity,
                    kind,
                    "file record created"
                );
            }
        }

        Ok(saved)
    }
}

fn name_prefix(ctx: &MediaContext, subtype: Option<&str>, profile: Option<Profile>) -> Vec<String> {
    let mut parts = vec![ctx.entity.to_string(), ctx.kind.clone()];
    parts.extend(subtype.map(str::to_string));
    parts.extend(profile.map(|p| p.as_str().to_string()));
    parts
}

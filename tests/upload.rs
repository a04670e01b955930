mod common;

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use uuid::Uuid;

use cms_media::error::MediaError;
use cms_media::models::names::{Profile, VariantNames};
use cms_media::models::record::Owner;
use cms_media::services::local::LocalDisk;
use cms_media::services::media::{
    DefaultSources, ExistingRecordPolicy, MediaSource, ResponsiveSources, UploadOptions,
};

use common::{dimensions, harness, harness_on, harness_with, png, FlakyDisk};

#[tokio::test]
async fn first_upload_creates_record_with_every_size() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let record = h
        .media
        .upload_model_image(owner, png(400, 300).into(), "avatar", UploadOptions::default())
        .await
        .unwrap();

    let VariantNames::Flat(names) = &record.names else {
        panic!("expected flat names, got {:?}", record.names);
    };
    assert_eq!(names.keys().collect::<Vec<_>>(), vec!["large", "thumb"]);
    for name in names.values() {
        assert!(name.starts_with("content-avatar-"), "{name}");
        assert!(name.ends_with(".png"), "{name}");
        assert!(h.file_exists(name).await);
    }

    let root = h.disk.root();
    assert_eq!(dimensions(&root.join(&names["large"])), (192, 108));
    assert_eq!(dimensions(&root.join(&names["thumb"])), (16, 16));
    assert_eq!(h.stored_files().await.len(), 2);
}

#[tokio::test]
async fn failed_sizes_are_skipped_and_the_rest_are_kept() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let record = h
        .media
        .upload_model_image(owner, png(64, 48).into(), "banner", UploadOptions::default())
        .await
        .unwrap();

    let VariantNames::Flat(names) = &record.names else {
        panic!("expected flat names, got {:?}", record.names);
    };
    assert_eq!(names.keys().collect::<Vec<_>>(), vec!["square", "wide"]);

    let mut expected: Vec<String> = names.values().cloned().collect();
    expected.sort();
    assert_eq!(h.stored_files().await, expected);
}

#[tokio::test]
async fn only_sizes_restricts_generation() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let record = h
        .media
        .upload_model_image(
            owner,
            png(100, 100).into(),
            "avatar",
            UploadOptions::default().only_sizes(["thumb", "not-configured"]),
        )
        .await
        .unwrap();

    assert!(record.names.get("thumb", None).is_some());
    assert!(record.names.get("large", None).is_none());
    assert_eq!(h.stored_files().await.len(), 1);
}

#[tokio::test]
async fn only_sizes_without_match_is_no_sizes_configured() {
    let h = harness().await;

    let err = h
        .media
        .upload_model_image(
            Owner::content(Uuid::new_v4()),
            png(10, 10).into(),
            "avatar",
            UploadOptions::default().only_sizes(["original"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::NoSizesConfigured { .. }));
    assert!(h.stored_files().await.is_empty());
}

#[tokio::test]
async fn invalid_bytes_produce_nothing() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let err = h
        .media
        .upload_model_image(
            owner,
            b"definitely not an image".to_vec().into(),
            "avatar",
            UploadOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::NoVariantsGenerated));
    assert!(h.media.records_for(owner).await.unwrap().is_empty());
    assert!(h.stored_files().await.is_empty());
}

#[tokio::test]
async fn empty_upload_is_unreadable() {
    let h = harness().await;

    let err = h
        .media
        .upload_model_image(
            Owner::content(Uuid::new_v4()),
            Vec::new().into(),
            "avatar",
            UploadOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::UnreadableSource(_)));
}

#[tokio::test]
async fn unknown_kind_is_configuration_error() {
    let h = harness().await;

    let err = h
        .media
        .upload_model_image(
            Owner::category(Uuid::new_v4()),
            png(10, 10).into(),
            "avatar",
            UploadOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::Configuration(_)));
}

#[tokio::test]
async fn file_source_is_read_from_disk() {
    let h = harness().await;
    let path = h.dir.path().join("upload.png");
    tokio::fs::write(&path, png(50, 50)).await.unwrap();

    let record = h
        .media
        .upload_model_image(
            Owner::category(Uuid::new_v4()),
            MediaSource::File(path),
            "icon",
            UploadOptions::default(),
        )
        .await
        .unwrap();

    assert!(record.names.get("small", None).unwrap().starts_with("category-icon-"));
}

#[tokio::test]
async fn replace_keeps_one_record_and_removes_old_files() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let first = h
        .media
        .upload_model_image(owner, png(300, 200).into(), "avatar", UploadOptions::default())
        .await
        .unwrap();
    let second = h
        .media
        .upload_model_image(owner, png(200, 300).into(), "avatar", UploadOptions::default())
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.media.records_for(owner).await.unwrap().len(), 1);

    for name in first.names.leaves() {
        assert!(!h.file_exists(name).await, "{name} should be gone");
    }
    for name in second.names.leaves() {
        assert!(h.file_exists(name).await, "{name} should exist");
    }
    assert_eq!(h.stored_files().await.len(), 2);
}

#[tokio::test]
async fn replace_with_only_sizes_drops_unlisted_sizes() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let first = h
        .media
        .upload_model_image(owner, png(300, 200).into(), "avatar", UploadOptions::default())
        .await
        .unwrap();
    let second = h
        .media
        .upload_model_image(
            owner,
            png(300, 200).into(),
            "avatar",
            UploadOptions::default().only_sizes(["thumb"]),
        )
        .await
        .unwrap();

    assert!(second.names.get("large", None).is_none());
    assert!(!h.file_exists(first.names.get("large", None).unwrap()).await);
}

#[tokio::test]
async fn subtypes_are_separate_records() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let a = h
        .media
        .upload_model_image(
            owner,
            png(40, 40).into(),
            "avatar",
            UploadOptions::default().subtype("first"),
        )
        .await
        .unwrap();
    let b = h
        .media
        .upload_model_image(
            owner,
            png(40, 40).into(),
            "avatar",
            UploadOptions::default().subtype("second"),
        )
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(b.subtype.as_deref(), Some("second"));
    assert!(b.names.get("large", None).unwrap().starts_with("content-avatar-second-large-"));
    assert_eq!(h.media.records_for(owner).await.unwrap().len(), 2);
    assert_eq!(h.stored_files().await.len(), 4);
}

#[tokio::test]
async fn keep_policy_returns_existing_record_untouched() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let first = h
        .media
        .upload_model_image(owner, png(60, 60).into(), "avatar", UploadOptions::default())
        .await
        .unwrap();
    let again = h
        .media
        .upload_model_image(
            owner,
            png(60, 60).into(),
            "avatar",
            UploadOptions::default().keep_existing(),
        )
        .await
        .unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(first.names, again.names);
    assert_eq!(h.stored_files().await.len(), 2);
}

#[tokio::test]
async fn merge_policy_layers_new_sizes_over_existing() {
    let h = harness_with(ExistingRecordPolicy::Merge).await;
    let owner = Owner::content(Uuid::new_v4());

    let first = h
        .media
        .upload_model_image(
            owner,
            png(60, 60).into(),
            "avatar",
            UploadOptions::default().only_sizes(["large"]),
        )
        .await
        .unwrap();
    let merged = h
        .media
        .upload_model_image(
            owner,
            png(60, 60).into(),
            "avatar",
            UploadOptions::default().only_sizes(["thumb"]).keep_existing(),
        )
        .await
        .unwrap();

    assert_eq!(
        merged.names.get("large", None),
        first.names.get("large", None)
    );
    assert!(merged.names.get("thumb", None).is_some());
    assert_eq!(h.stored_files().await.len(), 2);
}

#[tokio::test]
async fn responsive_upload_nests_names_by_profile() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let record = h
        .media
        .upload_model_responsive_images(
            owner,
            ResponsiveSources {
                mobile: Some(png(90, 160).into()),
                desktop: Some(png(160, 90).into()),
            },
            "hero",
            UploadOptions::default(),
        )
        .await
        .unwrap();

    let VariantNames::Profiled(profiles) = &record.names else {
        panic!("expected profiled names, got {:?}", record.names);
    };
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[&Profile::Mobile].len(), 3);
    assert!(profiles[&Profile::Mobile]["large"].starts_with("content-hero-mobile-large-"));
    assert!(profiles[&Profile::Desktop]["small"].starts_with("content-hero-desktop-small-"));

    let tiny = h.disk.root().join(&profiles[&Profile::Desktop]["tiny"]);
    assert_eq!(dimensions(&tiny), (8, 5));
    assert_eq!(h.stored_files().await.len(), 6);
}

#[tokio::test]
async fn responsive_upload_survives_one_bad_profile() {
    let h = harness().await;

    let record = h
        .media
        .upload_model_responsive_images(
            Owner::content(Uuid::new_v4()),
            ResponsiveSources {
                mobile: Some(b"garbage".to_vec().into()),
                desktop: Some(png(100, 100).into()),
            },
            "hero",
            UploadOptions::default(),
        )
        .await
        .unwrap();

    let VariantNames::Profiled(profiles) = &record.names else {
        panic!("expected profiled names");
    };
    assert!(!profiles.contains_key(&Profile::Mobile));
    assert_eq!(profiles[&Profile::Desktop].len(), 3);
}

#[tokio::test]
async fn responsive_upload_without_sources_fails() {
    let h = harness().await;

    let err = h
        .media
        .upload_model_responsive_images(
            Owner::content(Uuid::new_v4()),
            ResponsiveSources::default(),
            "hero",
            UploadOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::NoVariantsGenerated));
}

#[tokio::test]
async fn defaults_upload_prefers_override_and_skips_missing() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let mut sources = DefaultSources::default();
    sources.sizes.insert("small".to_string(), png(10, 10).into());

    let record = h
        .media
        .upload_model_image_with_defaults(owner, sources, "hero", UploadOptions::default())
        .await
        .unwrap();

    let VariantNames::Flat(names) = &record.names else {
        panic!("expected flat names");
    };
    assert_eq!(names.keys().collect::<Vec<_>>(), vec!["small"]);
    // 10x10 contained in 24x24 keeps the canvas size.
    assert_eq!(dimensions(&h.disk.root().join(&names["small"])), (24, 24));
}

#[tokio::test]
async fn defaults_upload_is_incremental() {
    let h = harness().await;
    let owner = Owner::content(Uuid::new_v4());

    let first = h
        .media
        .upload_model_image_with_defaults(
            owner,
            DefaultSources {
                default: Some(png(80, 40).into()),
                ..Default::default()
            },
            "hero",
            UploadOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(first.names.leaves().len(), 3);

    let mut sources = DefaultSources::default();
    sources.sizes.insert("large".to_string(), png(200, 100).into());
    let second = h
        .media
        .upload_model_image_with_defaults(owner, sources, "hero", UploadOptions::default())
        .await
        .unwrap();

    assert_ne!(second.names.get("large", None), first.names.get("large", None));
    assert_eq!(second.names.get("small", None), first.names.get("small", None));
    assert_eq!(second.names.get("tiny", None), first.names.get("tiny", None));
    assert!(!h.file_exists(first.names.get("large", None).unwrap()).await);
    assert_eq!(h.stored_files().await.len(), 3);
}

#[tokio::test]
async fn failed_write_removes_partial_variants() {
    let dir = tempfile::TempDir::new().unwrap();
    let disk = Arc::new(LocalDisk::new(dir.path().join("public"), "/storage").await.unwrap());
    let flaky = Arc::new(FlakyDisk {
        inner: disk.clone(),
        allowed: 1,
        puts: AtomicUsize::new(0),
    });
    let h = harness_on(flaky, disk, dir, ExistingRecordPolicy::Keep).await;
    let owner = Owner::content(Uuid::new_v4());

    let err = h
        .media
        .upload_model_image(owner, png(50, 50).into(), "avatar", UploadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, MediaError::Storage(_)));
    assert!(h.stored_files().await.is_empty());
    assert!(h.media.records_for(owner).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_physical_files_is_idempotent() {
    let h = harness().await;
    let record = h
        .media
        .upload_model_responsive_images(
            Owner::content(Uuid::new_v4()),
            ResponsiveSources {
                mobile: Some(png(30, 30).into()),
                desktop: None,
            },
            "hero",
            UploadOptions::default(),
        )
        .await
        .unwrap();

    let first = h.media.delete_physical_files(&record.names, "public").await.unwrap();
    assert_eq!(first, 3);
    assert!(h.stored_files().await.is_empty());

    let second = h.media.delete_physical_files(&record.names, "public").await.unwrap();
    assert_eq!(second, 3);
}

#[tokio::test]
async fn urls_follow_the_disk() {
    let h = harness().await;
    let record = h
        .media
        .upload_model_image(
            Owner::content(Uuid::new_v4()),
            png(30, 30).into(),
            "avatar",
            UploadOptions::default(),
        )
        .await
        .unwrap();

    let large = record.names.get("large", None).unwrap();
    assert_eq!(
        h.media.display_url(&record, None).unwrap(),
        Some(format!("/storage/{}", large))
    );
    assert_eq!(h.media.url_for(&record, "missing", None).unwrap(), None);
}

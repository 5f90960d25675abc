//! End-to-end staging against a temp storage root.

use auditflow_intake::{BatchCatalog, BatchStager, StageError, StagingLimits, UploadFile};
use auditflow_protocol::FileKind;
use auditflow_test_utils::StorageFixture;
use std::io::Cursor;

fn entries(path: &std::path::Path) -> usize {
    std::fs::read_dir(path).map(|dir| dir.count()).unwrap_or(0)
}

#[tokio::test]
async fn classifies_mixed_upload() {
    let fixture = StorageFixture::new();
    let stager = BatchStager::new(fixture.storage().clone());

    let staged = stager
        .stage(vec![
            UploadFile::from_bytes("a.pdf", b"%PDF-1.7".to_vec()),
            UploadFile::from_bytes("roster.csv", b"case manager\nJane R\n".to_vec()),
            UploadFile::from_bytes("notes.txt", b"remember".to_vec()),
        ])
        .await
        .unwrap();

    let kinds: Vec<FileKind> = staged.manifest.files.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![FileKind::Document, FileKind::TabularData, FileKind::Other]
    );
    assert_eq!(staged.manifest.files[0].relative_path, "documents/a.pdf");
    assert_eq!(staged.manifest.files[1].relative_path, "tabular-data/roster.csv");
    assert_eq!(staged.manifest.files[2].relative_path, "other/notes.txt");
    assert_eq!(staged.manifest.total_bytes, 8 + 20 + 8);

    for file in &staged.manifest.files {
        assert!(staged.path_of(file).is_file());
        assert!(!file.relative_path.contains(".."));
    }
    for dir in ["documents", "tabular-data", "other"] {
        assert!(staged.root.join(dir).is_dir());
    }

    // batch.json round-trips through the catalog
    let catalog = BatchCatalog::new(fixture.storage().clone());
    let loaded = catalog.load(staged.batch_id.as_str()).unwrap();
    assert_eq!(loaded.manifest, staged.manifest);
}

#[tokio::test]
async fn duplicate_names_are_disambiguated() {
    let fixture = StorageFixture::new();
    let stager = BatchStager::new(fixture.storage().clone());

    let staged = stager
        .stage(vec![
            UploadFile::from_bytes("Report (1).pdf", b"first".to_vec()),
            UploadFile::from_bytes("Report (1).pdf", b"second".to_vec()),
        ])
        .await
        .unwrap();

    let names: Vec<&str> = staged
        .manifest
        .files
        .iter()
        .map(|f| f.saved_name.as_str())
        .collect();
    assert_eq!(names, vec!["Report (1).pdf", "Report (1)__1.pdf"]);
    assert_eq!(staged.manifest.files[1].original_name, "Report (1).pdf");
    let second = std::fs::read(staged.path_of(&staged.manifest.files[1])).unwrap();
    assert_eq!(second, b"second");
}

#[tokio::test]
async fn hostile_names_are_sanitized() {
    let fixture = StorageFixture::new();
    let stager = BatchStager::new(fixture.storage().clone());

    let staged = stager
        .stage(vec![UploadFile::from_bytes(
            "../../etc/Case  Load?.csv",
            b"cm\nA\n".to_vec(),
        )])
        .await
        .unwrap();

    let file = &staged.manifest.files[0];
    assert_eq!(file.saved_name, "Case Load_.csv");
    assert_eq!(file.kind, FileKind::TabularData);
    assert_eq!(file.original_name, "../../etc/Case  Load?.csv");
}

#[tokio::test]
async fn limits_reject_whole_batch() {
    let fixture = StorageFixture::new();
    let stager = BatchStager::new(fixture.storage().clone()).with_limits(StagingLimits {
        max_files: 2,
        max_file_bytes: 8,
        max_total_bytes: 12,
    });

    let too_many = (0..3)
        .map(|i| UploadFile::from_bytes(format!("{}.txt", i), b"x".to_vec()))
        .collect();
    assert!(matches!(
        stager.stage(too_many).await,
        Err(StageError::TooManyFiles { count: 3, max: 2 })
    ));

    assert!(matches!(
        stager
            .stage(vec![UploadFile::from_bytes("big.pdf", vec![1; 9])])
            .await,
        Err(StageError::FileTooLarge { .. })
    ));

    assert!(matches!(
        stager
            .stage(vec![
                UploadFile::from_bytes("a.pdf", vec![1; 8]),
                UploadFile::from_bytes("b.pdf", vec![1; 8]),
            ])
            .await,
        Err(StageError::TotalTooLarge { total: 16, max: 12 })
    ));

    assert!(matches!(
        stager
            .stage(vec![UploadFile::from_bytes("empty.csv", Vec::new())])
            .await,
        Err(StageError::EmptyFile { .. })
    ));

    assert_eq!(entries(&fixture.storage().uploads_dir()), 0);
}

#[tokio::test]
async fn short_stream_rolls_back_batch() {
    let fixture = StorageFixture::new();
    let stager = BatchStager::new(fixture.storage().clone());

    let lying = UploadFile::new("b.csv", 100, Box::new(Cursor::new(b"only a few".to_vec())));
    let err = stager
        .stage(vec![UploadFile::from_bytes("a.pdf", b"%PDF".to_vec()), lying])
        .await
        .unwrap_err();

    assert!(matches!(err, StageError::SizeMismatch { declared: 100, actual: 10, .. }));
    assert_eq!(entries(&fixture.storage().uploads_dir()), 0);
}

#[tokio::test]
async fn stages_from_local_paths() {
    let fixture = StorageFixture::new();
    let source = fixture.tmp_path().join("Caseload Export.xlsx");
    std::fs::write(&source, b"PK\x03\x04").unwrap();

    let upload = UploadFile::from_path(&source).await.unwrap();
    assert_eq!(upload.size, 4);

    let staged = BatchStager::new(fixture.storage().clone())
        .stage(vec![upload])
        .await
        .unwrap();
    assert_eq!(staged.manifest.files[0].kind, FileKind::TabularData);
    let mut digest = auditflow_security::StreamingDigest::new();
    digest.update(b"PK\x03\x04");
    assert_eq!(staged.manifest.files[0].sha256, digest.finish());
}

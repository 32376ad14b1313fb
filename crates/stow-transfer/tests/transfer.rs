mod common;

use std::time::Duration;

use common::{FlakyStore, write_file};
use stow_transfer::{
    CancellationToken, CleanupPolicy, DownloadVerifier, Manifest, ManifestReader, NameHint,
    Pipeline, TransferConfig, TransferError, UploadEngine, UploadPrefix, VerifyOutcome,
    VerifyRequest,
};

fn engine(chunk_size: usize) -> UploadEngine {
    UploadEngine::new(TransferConfig::default().with_chunk_size(chunk_size)).unwrap()
}

#[tokio::test]
async fn ten_thousand_bytes_in_three_chunks() {
    let src = tempfile::tempdir().unwrap();
    let debug = tempfile::tempdir().unwrap();
    let path = write_file(src.path(), "db/000000001.txt", &[b'A'; 10_000]);
    let store = FlakyStore::new();
    let prefix = UploadPrefix::new("influx");
    let hint = NameHint::parse("db/000000001.txt").unwrap();

    let mut reader = ManifestReader::new(Manifest::from_files([path]));
    let report = engine(4096)
        .upload(&store, &prefix, &mut reader, &hint, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.committed,
        vec![
            "influx/db/000000001txt/0.txt",
            "influx/db/000000001txt/1.txt",
            "influx/db/000000001txt/2.txt",
        ]
    );
    assert_eq!(reader.cursor().total, 10_000);

    let request = VerifyRequest::new(hint)
        .with_last_object(report.last_object().unwrap())
        .with_expected_bytes(10_000);
    let verified = DownloadVerifier::new(Default::default(), debug.path())
        .verify(&store, &prefix, &request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(verified.bytes, 10_000);
    assert_eq!(
        std::fs::read(debug.path().join("db/000000001.txt")).unwrap(),
        vec![b'A'; 10_000]
    );
}

#[tokio::test]
async fn write_succeeding_on_fifth_attempt_succeeds() {
    let src = tempfile::tempdir().unwrap();
    let path = write_file(src.path(), "a.txt", b"payload");
    let store = FlakyStore::failing(0, 4);

    let mut reader = ManifestReader::new(Manifest::from_files([path]));
    let report = engine(1024)
        .upload(
            &store,
            &UploadPrefix::new("p"),
            &mut reader,
            &NameHint::parse("a.txt").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.committed, vec!["p/atxt/0.txt"]);
    assert_eq!(store.attempts(), 5);
}

#[tokio::test]
async fn persistent_failure_is_fatal_and_stops_the_transfer() {
    let src = tempfile::tempdir().unwrap();
    let path = write_file(src.path(), "a.txt", &[b'x'; 30]);
    // first chunk commits, the second fails on every attempt
    let store = FlakyStore::failing(1, 6);

    let mut reader = ManifestReader::new(Manifest::from_files([path]));
    let failure = engine(10)
        .upload(
            &store,
            &UploadPrefix::new("p"),
            &mut reader,
            &NameHint::parse("a.txt").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        failure.error,
        TransferError::RetriesExhausted { attempts: 5, .. }
    ));
    assert_eq!(failure.committed, vec!["p/atxt/0.txt"]);
    assert!(failure.removed.is_empty());
    // one successful write plus five failed attempts, nothing for the third chunk
    assert_eq!(store.attempts(), 6);
    assert_eq!(store.keys("p/").await, vec!["p/atxt/0.txt"]);
}

#[tokio::test]
async fn cleanup_policy_deletes_committed_objects() {
    let src = tempfile::tempdir().unwrap();
    let path = write_file(src.path(), "a.txt", &[b'x'; 30]);
    let store = FlakyStore::failing(2, 10);
    let config = TransferConfig::default()
        .with_chunk_size(10)
        .with_cleanup(CleanupPolicy::DeleteCommitted);

    let mut reader = ManifestReader::new(Manifest::from_files([path]));
    let failure = UploadEngine::new(config)
        .unwrap()
        .upload(
            &store,
            &UploadPrefix::new("p"),
            &mut reader,
            &NameHint::parse("a.txt").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(failure.committed.is_empty());
    assert_eq!(failure.removed, vec!["p/atxt/0.txt", "p/atxt/1.txt"]);
    assert!(store.keys("p/").await.is_empty());
}

#[tokio::test]
async fn prefix_without_separator_gets_exactly_one() {
    let src = tempfile::tempdir().unwrap();
    let path = write_file(src.path(), "a.txt", b"abc");

    for raw in ["backups", "backups/", "/backups//"] {
        let store = FlakyStore::new();
        let mut reader = ManifestReader::new(Manifest::from_files([path.clone()]));
        let report = engine(2)
            .upload(
                &store,
                &UploadPrefix::new(raw),
                &mut reader,
                &NameHint::parse("a.txt").unwrap(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.committed, vec!["backups/atxt/0.txt", "backups/atxt/1.txt"]);
        assert!(report.committed.iter().all(|key| !key.contains("//")));
    }
}

#[tokio::test]
async fn manifest_files_are_concatenated_in_order() {
    let src = tempfile::tempdir().unwrap();
    let debug = tempfile::tempdir().unwrap();
    write_file(src.path(), "1.tsm", b"first-");
    write_file(src.path(), "2.tsm", b"second-");
    write_file(src.path(), "3.tsm", b"third");
    let manifest = Manifest::from_dir(src.path()).unwrap();
    let expected = manifest.total_size().await.unwrap();
    let store = FlakyStore::new();
    let prefix = UploadPrefix::new("p");
    let hint = NameHint::parse("db/all.tsm").unwrap();

    let mut reader = ManifestReader::new(manifest);
    let report = engine(4)
        .upload(&store, &prefix, &mut reader, &hint, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.bytes, expected);

    let verified = DownloadVerifier::new(Default::default(), debug.path())
        .verify(
            &store,
            &prefix,
            &VerifyRequest::new(hint).with_expected_bytes(expected),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        std::fs::read(verified.local_path).unwrap(),
        b"first-second-third"
    );
}

#[tokio::test]
async fn cancellation_between_chunks_keeps_committed_names() {
    let src = tempfile::tempdir().unwrap();
    let path = write_file(src.path(), "a.txt", &[b'x'; 30]);
    let cancel = CancellationToken::new();
    let store = FlakyStore::new().cancel_after(1, cancel.clone());

    let mut reader = ManifestReader::new(Manifest::from_files([path]));
    let failure = engine(10)
        .upload(
            &store,
            &UploadPrefix::new("p"),
            &mut reader,
            &NameHint::parse("a.txt").unwrap(),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(failure.error.is_cancelled());
    assert_eq!(failure.committed, vec!["p/atxt/0.txt"]);
    assert_eq!(store.attempts(), 1);
}

#[tokio::test]
async fn retry_delay_is_honored_between_attempts() {
    let src = tempfile::tempdir().unwrap();
    let path = write_file(src.path(), "a.txt", b"x");
    let store = FlakyStore::failing(0, 2);
    let config = TransferConfig::default().with_retry(3, Duration::from_millis(20));

    let started = std::time::Instant::now();
    let mut reader = ManifestReader::new(Manifest::from_files([path]));
    UploadEngine::new(config)
        .unwrap()
        .upload(
            &store,
            &UploadPrefix::new("p"),
            &mut reader,
            &NameHint::parse("a.txt").unwrap(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(store.attempts(), 3);
}

#[tokio::test]
async fn pipeline_uploads_verifies_and_deletes_each_file() {
    let src = tempfile::tempdir().unwrap();
    let debug = tempfile::tempdir().unwrap();
    let a = write_file(src.path(), "000000001.txt", &[b'a'; 5000]);
    let b = write_file(src.path(), "000000002.txt", &[b'b'; 100]);
    let manifest = Manifest::from_dir(src.path()).unwrap();
    let store = FlakyStore::new();
    let config = TransferConfig::default()
        .with_chunk_size(4096)
        .with_delete_sources(true)
        .with_verify(debug.path());

    let report = Pipeline::new(config)
        .unwrap()
        .run(
            &store,
            &UploadPrefix::new("influx"),
            &manifest,
            "db",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        report.committed(),
        vec![
            "influx/db/000000001txt/0.txt",
            "influx/db/000000001txt/1.txt",
            "influx/db/000000002txt/0.txt",
        ]
    );
    assert_eq!(report.total_bytes(), 5100);
    assert!(!report.has_verification_failures());
    for file in &report.files {
        assert!(matches!(file.verification, Some(VerifyOutcome::Verified(_))));
    }
    assert!(!a.exists());
    assert!(!b.exists());
    assert_eq!(
        std::fs::read(debug.path().join("db/000000001.txt")).unwrap(),
        vec![b'a'; 5000]
    );
}

#[tokio::test]
async fn pipeline_failure_reports_names_from_earlier_files() {
    let src = tempfile::tempdir().unwrap();
    let a = write_file(src.path(), "1.txt", b"aaaa");
    write_file(src.path(), "2.txt", b"bbbb");
    let manifest = Manifest::from_dir(src.path()).unwrap();
    // the first file's single chunk commits, the second file never does
    let store = FlakyStore::failing(1, 100);
    let config = TransferConfig::default().with_delete_sources(true);

    let failure = Pipeline::new(config)
        .unwrap()
        .run(
            &store,
            &UploadPrefix::new("p"),
            &manifest,
            "db",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.committed, vec!["p/db/1txt/0.txt"]);
    assert!(matches!(failure.error, TransferError::RetriesExhausted { .. }));
    // the first file completed before the failure and was removed
    assert!(!a.exists());
    assert!(src.path().join("2.txt").exists());
}

#[tokio::test]
async fn pipeline_keeps_same_named_files_in_subdirectories_apart() {
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "x/a.txt", &[b'X'; 10]);
    write_file(src.path(), "y/a.txt", &[b'Y'; 4]);
    let manifest = Manifest::from_dir(src.path()).unwrap();
    let store = FlakyStore::new();
    let config = TransferConfig::default().with_chunk_size(4);

    let report = Pipeline::new(config)
        .unwrap()
        .run(
            &store,
            &UploadPrefix::new("p"),
            &manifest,
            "db",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        report.committed(),
        vec![
            "p/db/x/atxt/0.txt",
            "p/db/x/atxt/1.txt",
            "p/db/x/atxt/2.txt",
            "p/db/y/atxt/0.txt",
        ]
    );
    assert_eq!(store.keys("p/").await.len(), 4);
    assert_eq!(
        store.inner.get("p/db/x/atxt/0.txt").await.unwrap().data,
        &b"XXXX"[..]
    );
}

#[tokio::test]
async fn pipeline_rejects_colliding_groups_before_uploading() {
    let src = tempfile::tempdir().unwrap();
    write_file(src.path(), "a.b.c.d", b"one");
    write_file(src.path(), "a.b.c.e", b"two");
    let manifest = Manifest::from_dir(src.path()).unwrap();
    let store = FlakyStore::new();

    let failure = Pipeline::new(TransferConfig::default())
        .unwrap()
        .run(
            &store,
            &UploadPrefix::new("p"),
            &manifest,
            "",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(failure.error, TransferError::DuplicateGroup { .. }));
    assert!(failure.committed.is_empty());
    assert_eq!(store.attempts(), 0);
}

#[tokio::test]
async fn concurrent_uploads_to_one_group_do_not_interleave() {
    let src = tempfile::tempdir().unwrap();
    let first = write_file(src.path(), "one/a.txt", &[b'1'; 12]);
    let second = write_file(src.path(), "two/a.txt", &[b'2'; 12]);
    let store = FlakyStore::new().with_write_delay(Duration::from_millis(5));
    let engine = engine(4);
    let prefix = UploadPrefix::new("p");
    let hint = NameHint::parse("db/a.txt").unwrap();
    let cancel = CancellationToken::new();

    let mut first_reader = ManifestReader::new(Manifest::from_files([first]));
    let mut second_reader = ManifestReader::new(Manifest::from_files([second]));
    let (a, b) = tokio::join!(
        engine.upload(&store, &prefix, &mut first_reader, &hint, &cancel),
        engine.upload(&store, &prefix, &mut second_reader, &hint, &cancel),
    );
    a.unwrap();
    b.unwrap();

    let log = store.log();
    assert_eq!(log.len(), 6);
    for run in log.chunks(3) {
        let indices: Vec<&str> = run.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            indices,
            vec!["p/db/atxt/0.txt", "p/db/atxt/1.txt", "p/db/atxt/2.txt"]
        );
        assert!(run.iter().all(|(_, byte)| *byte == run[0].1));
    }
    assert_ne!(log[0].1, log[3].1);
}

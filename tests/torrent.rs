mod common;

use common::{set_of, write_file};
use hashpass::algorithm::AlgorithmId::{self, *};
use hashpass::engine::{DigestContext, DigestEngine};
use hashpass::torrent::{backup_path, torrent_path, TorrentError};
use hashpass::{CancelToken, Config, EmbedOptions, FileTask, HashpassError, MultiEngine};
use hashpass::{RunStatus, Runner};
use hashpass::{TorrentAccumulator, TorrentSettings};
use sha1::{Digest, Sha1};
use std::fs;
use std::path::PathBuf;

fn settings(batch: Option<PathBuf>) -> TorrentSettings {
    TorrentSettings {
        announces: vec!["http://one/announce".into(), "http://two/announce".into()],
        private: true,
        program_name: "hashpass test".into(),
        batch_file: batch,
        ..TorrentSettings::default()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[test]
fn per_file_torrent_matches_btih() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "data.bin", &[5u8; 1000]);
    let config = Config {
        torrent: Some(settings(None)),
        json: true,
        ..Config::default()
    };
    let mut runner = Runner::new(MultiEngine, config, CancelToken::new(), Vec::new());
    let status = runner
        .run(vec![FileTask::from_path(&file, set_of(&[Crc32]))])
        .unwrap();
    assert_eq!(status, RunStatus::Completed);

    let content = fs::read(torrent_path(&file)).unwrap();
    assert!(content.starts_with(b"d8:announce19:http://one/announce13:announce-listl"));
    assert!(find(&content, b"10:created by13:hashpass test").is_some());
    assert!(find(&content, b"4:name8:data.bin").is_some());
    assert!(find(&content, b"7:privatei1e").is_some());

    // info is the last key of the root dictionary
    let at = find(&content, b"4:info").unwrap() + 6;
    let info = &content[at..content.len() - 1];
    let expected: [u8; 20] = Sha1::digest(info).into();
    let digests = runner.results()[0].digests.clone().unwrap();
    assert_eq!(digests.get(AlgorithmId::Btih).unwrap(), &expected);
}

#[test]
fn existing_torrent_is_backed_up() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "x.iso", b"payload");
    let target = torrent_path(&file);
    fs::write(&target, b"old torrent").unwrap();

    let config = Config {
        torrent: Some(settings(None)),
        ..Config::default()
    };
    let mut runner = Runner::new(MultiEngine, config, CancelToken::new(), Vec::new());
    runner
        .run(vec![FileTask::from_path(&file, set_of(&[Crc32]))])
        .unwrap();
    assert_eq!(fs::read(backup_path(&target)).unwrap(), b"old torrent");
    assert!(fs::read(&target).unwrap().starts_with(b"d8:announce"));
}

#[test]
fn batch_writes_one_multi_file_torrent() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"first");
    let b = write_file(dir.path(), "b.txt", b"second");
    let batch = dir.path().join("all.torrent");
    let config = Config {
        torrent: Some(settings(Some(batch.clone()))),
        ..Config::default()
    };
    let mut runner = Runner::new(MultiEngine, config, CancelToken::new(), Vec::new());
    let tasks = vec![
        FileTask::from_path(&a, set_of(&[Crc32])),
        FileTask::from_path(&b, set_of(&[Crc32])),
    ];
    assert_eq!(runner.run(tasks).unwrap(), RunStatus::Completed);
    assert_eq!(runner.session().stats().inits, 1);
    assert_eq!(runner.session().stats().continues, 1);

    let content = fs::read(&batch).unwrap();
    assert!(find(&content, b"5:filesl").is_some());
    assert!(find(&content, b"4:name3:all").is_some());
    assert!(find(&content, b"6:lengthi5e").is_some());
    assert!(find(&content, b"6:lengthi6e").is_some());
    assert!(find(&content, b"4:pathl5:a.txte").is_some());
    assert!(find(&content, b"4:pathl5:b.txte").is_some());
    let parent = dir.path().file_name().unwrap().to_str().unwrap();
    assert!(find(&content, parent.as_bytes()).is_none());
    // 11 bytes total fit in one piece
    assert!(find(&content, b"6:pieces20:").is_some());
    assert!(!torrent_path(&a).exists());
    assert!(runner.into_output().is_empty());
}

#[test]
fn piece_length_policy() {
    let engine = MultiEngine;
    let ids = set_of(&[Btih]).to_identifier_list(64).unwrap();

    let mut batch = TorrentAccumulator::new(settings(Some(PathBuf::from("b.torrent"))));
    batch.set_batch_size(5 * 1024 * 1024 * 1024);
    let mut ctx = engine.init_multi(&ids).unwrap();
    batch.register(&mut ctx, "big", 1, true).unwrap();
    assert_eq!(ctx.torrent().unwrap().piece_length(), 8 * 1024 * 1024);

    let mut fixed = TorrentAccumulator::new(TorrentSettings {
        piece_length: Some(65536),
        ..settings(Some(PathBuf::from("b.torrent")))
    });
    fixed.set_batch_size(5 * 1024 * 1024 * 1024);
    let mut ctx = engine.init_multi(&ids).unwrap();
    fixed.register(&mut ctx, "big", 1, true).unwrap();
    assert_eq!(ctx.torrent().unwrap().piece_length(), 65536);

    let mut single = TorrentAccumulator::new(settings(None));
    single.set_batch_size(5 * 1024 * 1024 * 1024);
    let mut ctx = engine.init_multi(&ids).unwrap();
    single.register(&mut ctx, "small", 100, true).unwrap();
    assert_eq!(ctx.torrent().unwrap().piece_length(), 16 * 1024);
}

#[test]
fn context_without_btih_has_no_torrent_state() {
    let mut acc = TorrentAccumulator::new(settings(None));
    let mut ctx = MultiEngine.init_multi(&[AlgorithmId::Sha1]).unwrap();
    assert!(acc.register(&mut ctx, "f", 1, true).is_err());
}

#[test]
fn save_into_a_directory_names_the_destination() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("blocked.torrent");
    fs::create_dir(&target).unwrap();

    let mut acc = TorrentAccumulator::new(settings(None));
    let ids = set_of(&[Btih]).to_identifier_list(64).unwrap();
    let mut ctx = MultiEngine.init_multi(&ids).unwrap();
    acc.register(&mut ctx, "blocked", 3, true).unwrap();
    ctx.update(b"abc");
    ctx.finalize();

    match acc.save(&target, &mut ctx) {
        Err(TorrentError::Save { path, .. }) => assert_eq!(path, target),
        other => panic!("expected a save error, got {other:?}"),
    }
    assert!(target.is_dir());
}

#[test]
fn failed_save_only_fails_that_input() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.bin", b"first");
    let b = write_file(dir.path(), "b.bin", b"second");
    fs::create_dir(torrent_path(&a)).unwrap();

    let config = Config {
        torrent: Some(settings(None)),
        json: true,
        ..Config::default()
    };
    let mut runner = Runner::new(MultiEngine, config, CancelToken::new(), Vec::new());
    let tasks = vec![
        FileTask::from_path(&a, set_of(&[Crc32])),
        FileTask::from_path(&b, set_of(&[Crc32])),
    ];
    assert_eq!(runner.run(tasks).unwrap(), RunStatus::Completed);

    let stats = runner.stats();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.ok, 1);
    let error = runner.results()[0].error.clone().unwrap();
    assert!(error.contains(&torrent_path(&a).display().to_string()));
    assert!(runner.results()[1].error.is_none());
    assert!(fs::read(torrent_path(&b)).unwrap().starts_with(b"d8:announce"));
}

#[test]
fn batch_torrent_refuses_crc_embedding() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_file(dir.path(), "a.txt", b"first");
    let batch = dir.path().join("all.torrent");
    let config = Config {
        embed: Some(EmbedOptions::default()),
        torrent: Some(settings(Some(batch.clone()))),
        ..Config::default()
    };
    let mut runner = Runner::new(MultiEngine, config, CancelToken::new(), Vec::new());
    let err = runner
        .run(vec![FileTask::from_path(&a, set_of(&[Crc32]))])
        .unwrap_err();
    assert!(matches!(err, HashpassError::Config(_)));
    assert!(a.exists());
    assert!(!batch.exists());
    assert_eq!(runner.stats().processed, 0);
}

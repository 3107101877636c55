mod common;

use common::{set_of, write_file, StubEngine};
use hashpass::algorithm::AlgorithmId::*;
use hashpass::engine::DigestContext;
use hashpass::pipeline::{self, FileTask, Outcome, PipelineOptions};
use hashpass::{CancelToken, DigestSession, SessionMode};

#[test]
fn batch_files_report_their_own_size() {
    let dir = tempfile::tempdir().unwrap();
    let engine = StubEngine::new();
    let mut session = DigestSession::new(engine.clone(), SessionMode::Batch);
    let cancel = CancelToken::new();
    let opts = PipelineOptions {
        defer_finalize: true,
        ..PipelineOptions::default()
    };
    let set = set_of(&[Crc32, Sha1]);

    let mut reported = Vec::new();
    let mut offsets = Vec::new();
    for (i, size) in [100usize, 250, 400].into_iter().enumerate() {
        let path = write_file(dir.path(), &format!("f{i}"), &vec![i as u8; size]);
        let mut task = FileTask::from_path(&path, set);
        let outcome =
            pipeline::process(&mut task, &mut session, None, &opts, &cancel, None).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert!(task.digests.is_none());
        reported.push(task.processed);
        offsets.push(task.msg_offset);
    }

    assert_eq!(reported, vec![100, 250, 400]);
    assert_eq!(offsets, vec![0, 100, 350]);
    assert_eq!(session.context().unwrap().msg_size(), 750);
    assert_eq!(engine.inits(), 1);
}

#[test]
fn per_file_mode_counts_from_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = DigestSession::new(StubEngine::new(), SessionMode::PerFile);
    let cancel = CancelToken::new();
    let opts = PipelineOptions::default();
    for size in [10usize, 20] {
        let path = write_file(dir.path(), &format!("s{size}"), &vec![7; size]);
        let mut task = FileTask::from_path(&path, set_of(&[Md5]));
        pipeline::process(&mut task, &mut session, None, &opts, &cancel, None).unwrap();
        assert_eq!(task.msg_offset, 0);
        assert_eq!(task.processed, size as u64);
        assert!(task.digests.is_some());
    }
}

#[test]
fn max_size_caps_the_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "big", &[1u8; 5000]);
    let mut session = DigestSession::new(StubEngine::new(), SessionMode::PerFile);
    let opts = PipelineOptions {
        max_size: 1234,
        ..PipelineOptions::default()
    };
    let mut task = FileTask::from_path(&path, set_of(&[Crc32]));
    pipeline::process(&mut task, &mut session, None, &opts, &CancelToken::new(), None).unwrap();
    assert_eq!(task.size, 5000);
    assert_eq!(task.processed, 1234);
}

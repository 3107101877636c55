use std::fs;
use std::process::Command;

fn hashpass() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hashpass"))
}

#[test]
fn unreadable_file_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.bin");
    let good = dir.path().join("good.bin");
    fs::write(&good, b"123456789").unwrap();

    let output = hashpass()
        .args([missing.to_str().unwrap(), good.to_str().unwrap()])
        .output()
        .expect("run failed");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("can't open"));
    assert!(stderr.contains("missing.bin"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CBF43926"));
}

#[test]
fn unknown_algorithm_is_fatal() {
    let output = hashpass()
        .args(["-a", "whirlpool", "--message", "x"])
        .output()
        .expect("run failed");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown algorithm 'whirlpool'"));
    assert!(stderr.contains("--list-hashes"));
}

#[test]
fn no_input_is_an_error() {
    let output = hashpass().output().expect("run failed");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no input files"));
}

#[test]
fn rename_conflict_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.bin");
    fs::write(&input, b"123456789").unwrap();
    fs::write(dir.path().join("a[CBF43926].bin"), b"other").unwrap();

    let output = hashpass()
        .args(["--embed-crc", input.to_str().unwrap()])
        .output()
        .expect("run failed");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("can't move"));
    assert!(input.exists());
}

#[test]
fn directory_in_check_mode_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = hashpass()
        .args(["--check-embedded", dir.path().to_str().unwrap()])
        .output()
        .expect("run failed");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("is a directory"));
}

#[test]
fn embedding_into_a_batch_torrent_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.txt");
    fs::write(&input, b"first").unwrap();
    let batch = dir.path().join("all.torrent");

    let output = hashpass()
        .args(["--embed-crc", "--bt-batch", batch.to_str().unwrap(), input.to_str().unwrap()])
        .output()
        .expect("run failed");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("batch torrent"));
    assert!(input.exists());
    assert!(!batch.exists());
}

#[test]
fn oversized_benchmark_workload_is_rejected() {
    let output = Command::new(env!("CARGO_BIN_EXE_hash_bench"))
        .args(["--size-mib", &u64::MAX.to_string()])
        .output()
        .expect("run failed");
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--size-mib"));
}

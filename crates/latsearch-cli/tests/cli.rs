// End-to-end runs of the lattice-search binary on text archives.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

const LATTICES: &str = "\
utt1
0 1 1 0.5,0.5,3_3
0 1 2 1,1,4
1

utt2
0 1 0 0,0.5
1 2 2 0.5,0
2 0,0.25

";

const QUERIES: &str = "\
cat
0 1 1 1
1

dog
0 1 2 2
1

";

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path.to_string_lossy().into_owned()
}

fn lattice_search(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lattice-search"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

#[test]
fn scores_archive_against_query_table() {
    let dir = tempfile::tempdir().unwrap();
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", LATTICES));
    let queries = format!("ark:{}", write(dir.path(), "q.ark", QUERIES));

    let output = lattice_search(&["--use-log=false", &lats, &queries]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "utt1 cat 0\nutt1 dog -1\nutt2 cat -inf\nutt2 dog 0\n"
    );
}

#[test]
fn log_semiring_is_the_default() {
    let dir = tempfile::tempdir().unwrap();
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", LATTICES));
    let query = write(dir.path(), "cat.fst", "0 1 1 1\n1\n");

    let output = lattice_search(&[&lats, &query]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "utt1 -0.313262\nutt2 -inf\n");
}

#[test]
fn beam_prunes_unlikely_paths() {
    let dir = tempfile::tempdir().unwrap();
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", LATTICES));
    let queries = format!("ark:{}", write(dir.path(), "q.ark", QUERIES));

    let output = lattice_search(&["--beam=0.5", &lats, &queries]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "utt1 cat 0\nutt1 dog -inf\nutt2 cat -inf\nutt2 dog 0\n"
    );
}

#[test]
fn scales_and_penalty() {
    let dir = tempfile::tempdir().unwrap();
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", LATTICES));
    let query = write(dir.path(), "dog.fst", "0 1 2 2\n1\n");

    // utt1: cat 0.5*0.5 + 0.5*2 + 1 = 2.25, dog 1*0.5 + 1*2 + 1 = 3.5.
    let output = lattice_search(&[
        "--use-log=false",
        "--graph-scale=0.5",
        "--acoustic-scale=2",
        "--insertion-penalty=1",
        &lats,
        &query,
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).lines().next(), Some("utt1 -1.25"));
}

#[test]
fn lattices_from_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let queries = format!("ark:{}", write(dir.path(), "q.ark", QUERIES));

    let mut child = Command::new(env!("CARGO_BIN_EXE_lattice-search"))
        .args(["--use-log=false", "ark:-", queries.as_str()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(LATTICES.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(stdout(&output).lines().count(), 4);
}

#[test]
fn script_table_of_lattices() {
    let dir = tempfile::tempdir().unwrap();
    let one = write(dir.path(), "one.lat", "0 1 1 1,0\n0 1 2 2,0\n1\n");
    let scp = format!("scp:{}", write(dir.path(), "lat.scp", &format!("first {one}\n")));
    let queries = format!("ark:{}", write(dir.path(), "q.ark", QUERIES));

    let output = lattice_search(&["--use-log=false", &scp, &queries]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "first cat 0\nfirst dog -1\n");
}

#[test]
fn lockstep_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", LATTICES));
    let queries = format!("ark:{}", write(dir.path(), "q.ark", QUERIES));

    let output = lattice_search(&["--use-log=false", "--lockstep", "--json", &lats, &queries]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "{\"lattice\":\"utt1\",\"query\":\"cat\",\"score\":0.0}\n\
         {\"lattice\":\"utt2\",\"query\":\"dog\",\"score\":0.0}\n"
    );
}

#[test]
fn malformed_lattice_sets_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!("broken\n0 1 1 zz\n1\n\n{LATTICES}");
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", &text));
    let query = write(dir.path(), "cat.fst", "0 1 1 1\n1\n");

    let output = lattice_search(&["--use-log=false", &lats, &query]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output), "utt1 0\nutt2 -inf\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("broken"));
}

#[test]
fn bad_beam_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", LATTICES));
    let query = write(dir.path(), "cat.fst", "0 1 1 1\n1\n");

    let output = lattice_search(&["--beam=0", &lats, &query]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("beam"));
}

#[test]
fn missing_query_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let lats = format!("ark:{}", write(dir.path(), "lat.ark", LATTICES));
    let missing = dir.path().join("nope.fst");

    let output = lattice_search(&[&lats, &missing.to_string_lossy()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error: "));
}

#[test]
fn binary_archive_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lat.ark");
    fs::write(&path, b"utt1 \0B\x04\x00\x00\x00\x00").unwrap();
    let lats = format!("ark:{}", path.display());
    let query = write(dir.path(), "cat.fst", "0 1 1 1\n1\n");

    let output = lattice_search(&[&lats, &query]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("binary"));
}

use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::Path;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

// Reference files are binary and have no newlines, so they are compared as they are.

fn compress_test(base_name: &str) -> STDRESULT {
    let mut cmd = Command::cargo_bin("rncpack")?;
    let temp_dir = tempfile::tempdir()?;
    let in_path = Path::new("tests").join([base_name,".txt"].concat());
    let cmp_path = Path::new("tests").join([base_name,".rnc"].concat());
    let out_path = temp_dir.path().join([base_name,".rnc"].concat());
    cmd.arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(cmp_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

fn expand_test(base_name: &str) -> STDRESULT {
    let mut cmd = Command::cargo_bin("rncpack")?;
    let temp_dir = tempfile::tempdir()?;
    let in_path = Path::new("tests").join([base_name,".rnc"].concat());
    let cmp_path = Path::new("tests").join([base_name,".txt"].concat());
    let out_path = temp_dir.path().join([base_name,".txt"].concat());
    cmd.arg("expand")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success();
    match (std::fs::read(cmp_path),std::fs::read(out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

#[test]
fn compression() -> STDRESULT {
    compress_test("hello")?;
    compress_test("abc")
}

#[test]
fn expansion() -> STDRESULT {
    expand_test("hello")?;
    expand_test("abc")
}

#[test]
fn expand_from_archive() -> STDRESULT {
    let mut cmd = Command::cargo_bin("rncpack")?;
    let temp_dir = tempfile::tempdir()?;
    let out_path = temp_dir.path().join("hello.txt");
    cmd.arg("expand")
        .arg("-i").arg(Path::new("tests").join("archive.bin"))
        .arg("-o").arg(&out_path)
        .arg("--offset").arg("6")
        .assert()
        .success()
        .stderr(predicate::str::contains("expanded 31 into 5"));
    assert_eq!(std::fs::read(out_path)?,b"hello");
    Ok(())
}

#[test]
fn show_header() -> STDRESULT {
    let mut cmd = Command::cargo_bin("rncpack")?;
    cmd.arg("info")
        .arg("-i").arg(Path::new("tests").join("archive.bin"))
        .arg("--offset").arg("6")
        .assert()
        .success()
        .stdout(predicate::str::contains("unpacked size: 5")
            .and(predicate::str::contains("packed size: 13"))
            .and(predicate::str::contains("unpacked CRC: 34D2"))
            .and(predicate::str::contains("blocks: 1")));
    Ok(())
}

#[test]
fn crc_mismatch() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let out_path = temp_dir.path().join("strict.txt");
    Command::cargo_bin("rncpack")?
        .arg("expand")
        .arg("-i").arg(Path::new("tests").join("bad_crc.rnc"))
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnpackedCrcMismatch"));
    let out_path = temp_dir.path().join("lenient.txt");
    Command::cargo_bin("rncpack")?
        .arg("expand")
        .arg("-i").arg(Path::new("tests").join("bad_crc.rnc"))
        .arg("-o").arg(&out_path)
        .arg("--lenient")
        .assert()
        .success();
    assert_eq!(std::fs::read(out_path)?,b"hello");
    Ok(())
}

#[test]
fn not_packed() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    Command::cargo_bin("rncpack")?
        .arg("expand")
        .arg("-i").arg(Path::new("tests").join("hello.txt"))
        .arg("-o").arg(temp_dir.path().join("out.bin"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidMagic"));
    Ok(())
}

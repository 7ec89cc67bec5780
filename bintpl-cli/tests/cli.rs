//! Smoke test: run the built binary against a small fixture template and
//! target buffer, and check the annotation lines it prints.

use std::io::Write;
use std::process::Command;

#[test]
fn prints_annotations_for_a_simple_template() {
    let dir = std::env::temp_dir().join(format!("bintpl-cli-smoke-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let template_path = dir.join("t.bt");
    std::fs::File::create(&template_path)
        .unwrap()
        .write_all(b"int x;\n")
        .unwrap();

    let target_path = dir.join("target.bin");
    std::fs::File::create(&target_path)
        .unwrap()
        .write_all(&[1, 0, 0, 0])
        .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bintpl"))
        .arg(&template_path)
        .arg(&target_path)
        .output()
        .expect("failed to run bintpl binary");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("s32le"));
    assert!(stdout.contains("x"));
}

#[test]
fn reports_a_parse_error_with_nonzero_exit() {
    let dir = std::env::temp_dir().join(format!("bintpl-cli-smoke-err-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let template_path = dir.join("bad.bt");
    std::fs::File::create(&template_path)
        .unwrap()
        .write_all(b"int ;\n")
        .unwrap();

    let target_path = dir.join("target.bin");
    std::fs::File::create(&target_path).unwrap().write_all(&[0u8; 4]).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bintpl"))
        .arg(&template_path)
        .arg(&target_path)
        .output()
        .expect("failed to run bintpl binary");

    assert!(!output.status.success());
}

use std::fmt::Write as _;
use std::path::Path;
use std::process::Command;

fn alcorpix() -> Command {
    Command::new(env!("CARGO_BIN_EXE_alcorpix"))
}

// Periodic pulses on channel 1 and a delayed copy on channel 2.
fn write_pulse_table(path: &Path) {
    let mut text = String::from("type,counter,column,pixel,tdc,rollover,coarse,fine\n");
    for _ in 0..2 {
        text.push_str("7,0,0,0,0,0,0,0\n");
        for k in 0..50 {
            let coarse = 320 * k + 10;
            writeln!(text, "1,{k},0,1,{},0,{coarse},32", k % 4).unwrap();
            writeln!(text, "1,{k},0,2,0,0,{},0", coarse + 5).unwrap();
        }
        text.push_str("15,0,0,0,0,0,0,0\n");
    }
    std::fs::write(path, text).unwrap();
}

#[test]
fn test_info_counts_spills_and_channels() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run.csv");
    write_pulse_table(&input);

    let output = alcorpix().arg("info").arg(&input).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Entries: 204"));
    assert!(stdout.contains("Completed spills: 2"));
    assert!(stdout.contains("channel   1: 100 hits"));
}

#[test]
fn test_calibrate_writes_parameter_store() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run.csv");
    let store = dir.path().join("calib.json");
    write_pulse_table(&input);

    let status = alcorpix()
        .args(["calibrate", "--channel", "1", "--max-iterations", "500", "-o"])
        .arg(&store)
        .arg(&input)
        .status()
        .unwrap();
    assert!(status.success());

    let text = std::fs::read_to_string(&store).unwrap();
    for name in ["off_0", "iif_3", "period"] {
        assert!(text.contains(name), "{name} missing from store");
    }
}

#[test]
fn test_correlate_with_missing_calibration_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run.csv");
    let output = dir.path().join("corr.csv");
    write_pulse_table(&input);

    let status = alcorpix()
        .args(["correlate", "--reference", "1", "--target", "2"])
        .arg("--target-calibration")
        .arg(dir.path().join("absent.json"))
        .arg("-o")
        .arg(&output)
        .arg(&input)
        .status()
        .unwrap();
    assert!(!status.success());
    assert!(!output.exists());
}

#[test]
fn test_correlate_and_deltat_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run.csv");
    let corr = dir.path().join("corr.json");
    let deltat = dir.path().join("deltat.csv");
    write_pulse_table(&input);

    let output = alcorpix()
        .args(["correlate", "--reference", "1", "--target", "2", "--afterpulse-suppression"])
        .arg("-o")
        .arg(&corr)
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Triggers: 100"));
    let json = std::fs::read_to_string(&corr).unwrap();
    assert!(json.contains("\"hDelta_corr\""));

    let status = alcorpix()
        .args(["deltat", "--channel", "1", "--bins", "100", "-o"])
        .arg(&deltat)
        .arg(&input)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(std::fs::read_to_string(&deltat).unwrap().starts_with("histogram,bin"));
}

#[test]
fn test_unknown_record_types_do_not_abort_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run.csv");
    let deltat = dir.path().join("deltat.json");

    let mut text = String::from("type,counter,column,pixel,tdc,rollover,coarse,fine\n");
    text.push_str("7,0,0,0,0,0,0,0\n");
    text.push_str("3,0,0,0,0,0,0,0\n");
    for k in 0..20 {
        writeln!(text, "1,{k},0,1,0,0,{},0", 320 * k).unwrap();
    }
    // bad TDC on a channel nobody reads
    text.push_str("1,0,2,2,9,0,5,0\n");
    text.push_str("15,0,0,0,0,0,0,0\n");
    std::fs::write(&input, text).unwrap();

    let output = alcorpix()
        .args(["deltat", "--channel", "1", "-o"])
        .arg(&deltat)
        .arg(&input)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Intervals: 19"));

    let output = alcorpix().arg("info").arg(&input).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unknown (3): 1"));
    assert!(stdout.contains("Completed spills: 1"));
    assert!(stdout.contains("channel  10: 1 hits"));

    let status = alcorpix()
        .args(["deltat", "--channel", "10", "-o"])
        .arg(dir.path().join("bad.json"))
        .arg(&input)
        .status()
        .unwrap();
    assert!(!status.success());
}

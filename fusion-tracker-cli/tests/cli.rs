use std::path::Path;
use std::process::{Command, Output};

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "fusion-tracker-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

fn tracker(data_dir: &Path, args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_fusion-tracker");
    Command::new(exe)
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("run cli")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_creates_and_lists_playthroughs() {
    let data_dir = temp_path("list");
    let output = tracker(&data_dir, &["new", "Alpha Run", "--mode", "remix"]);
    assert!(output.status.success());

    let output = tracker(&data_dir, &["list"]);
    assert!(output.status.success());
    let listing = stdout(&output);
    assert!(listing.contains("Alpha Run"));
    assert!(listing.contains("remix"));
    // the first launch also synthesised a default record
    assert!(listing.contains("Nuzlocke Run"));
    assert!(data_dir.join("pointer.json").exists());
}

#[test]
fn cli_encounter_joins_team_and_survives_restart() {
    let data_dir = temp_path("encounter");
    let output = tracker(
        &data_dir,
        &["encounter", "set", "route-1", "16", "--status", "captured"],
    );
    assert!(output.status.success());
    assert!(stdout(&output).contains("joined the team in slot 1"));

    let output = tracker(&data_dir, &["show"]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("1. Pidgey"));
    assert!(shown.contains("Route 1"));

    let output = tracker(&data_dir, &["team", "box", "1"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("1. -"));
}

#[test]
fn cli_rejects_unknown_species_and_locations() {
    let data_dir = temp_path("reject");
    let output = tracker(&data_dir, &["encounter", "set", "route-1", "9999"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown species"));

    let output = tracker(&data_dir, &["encounter", "set", "nowhere", "16"]);
    assert!(!output.status.success());

    let output = tracker(&data_dir, &["switch", "missing-id"]);
    assert!(!output.status.success());

    let output = tracker(&data_dir, &["encounter", "toggle", "nowhere"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown location"));
    assert!(!stdout(&tracker(&data_dir, &["show"])).contains("nowhere"));
}

#[test]
fn cli_export_import_and_delete() {
    let data_dir = temp_path("export");
    let export_path = temp_path("export-file");
    assert!(tracker(&data_dir, &["encounter", "set", "route-2", "25"]).status.success());

    let output = tracker(
        &data_dir,
        &["export", "--output", export_path.to_str().expect("utf8 path")],
    );
    assert!(output.status.success());
    let envelope = std::fs::read_to_string(&export_path).expect("read export");
    assert!(envelope.contains("\"playthrough\""));
    assert!(envelope.contains("Pikachu"));

    let output = tracker(
        &data_dir,
        &["import", export_path.to_str().expect("utf8 path")],
    );
    assert!(output.status.success());
    let imported = stdout(&output);
    let new_id = imported
        .split_whitespace()
        .last()
        .expect("imported id")
        .to_string();

    let listing = stdout(&tracker(&data_dir, &["list"]));
    assert_eq!(listing.lines().count(), 2);

    let output = tracker(&data_dir, &["delete", new_id.as_str()]);
    assert!(output.status.success());
    let listing = stdout(&tracker(&data_dir, &["list"]));
    assert_eq!(listing.lines().count(), 1);
    assert!(!listing.contains(&new_id));
}

#[test]
fn cli_custom_locations_show_up_in_order() {
    let data_dir = temp_path("custom");
    let output = tracker(
        &data_dir,
        &["custom", "add", "Secret Garden", "--after", "route-1"],
    );
    assert!(output.status.success());

    let listing = stdout(&tracker(&data_dir, &["locations"]));
    let route_one = listing.find("Route 1").expect("route 1 listed");
    let garden = listing.find("Secret Garden").expect("custom listed");
    let viridian = listing.find("Viridian City").expect("viridian listed");
    assert!(route_one < garden && garden < viridian);
}

#[test]
fn cli_removing_custom_anchor_reattaches_dependents() {
    let data_dir = temp_path("custom-remove");
    let output = tracker(
        &data_dir,
        &["custom", "add", "Secret Garden", "--after", "route-1"],
    );
    assert!(output.status.success());
    let garden = stdout(&output)
        .split_whitespace()
        .last()
        .expect("garden id")
        .to_string();
    let output = tracker(
        &data_dir,
        &["custom", "add", "Hidden Pond", "--after", garden.as_str()],
    );
    assert!(output.status.success());

    let output = tracker(&data_dir, &["custom", "remove", garden.as_str()]);
    assert!(output.status.success());
    let removed = stdout(&output);
    assert!(removed.contains("removed Secret Garden"));
    assert!(removed.contains("dependent locations now follow its anchor"));

    let listing = stdout(&tracker(&data_dir, &["locations"]));
    let route_one = listing.find("Route 1").expect("route 1 listed");
    let pond = listing.find("Hidden Pond").expect("dependent still listed");
    assert!(route_one < pond);
    assert!(!listing.contains("Secret Garden"));

    let output = tracker(&data_dir, &["custom", "remove", garden.as_str()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("no custom location"));
}

// Drives the compiled binary with piped stdin. Each test gets its own HOME
// so history and config never touch the real user directories.

use assert_cmd::Command;
use tempfile::TempDir;

fn nuguessr(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nuguessr").unwrap();
    cmd.env("HOME", home.path())
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "{output:?}");
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn empty_history_and_leaderboard() {
    let home = TempDir::new().unwrap();
    let text = stdout_of(nuguessr(&home).arg("--history"));
    assert!(text.contains("No games played yet"));

    let text = stdout_of(nuguessr(&home).arg("--leaderboard"));
    assert!(text.contains("No players found"));
}

#[test]
fn replayed_link_is_scored_and_recorded() {
    let home = TempDir::new().unwrap();

    // Place 1 is guessed exactly, place 2 from the far side of the world
    let text = stdout_of(
        nuguessr(&home)
            .args(["--link", "1-2", "--player", "husky"])
            .write_stdin("42.3398,-71.0892\n-42.3381,108.9120\n"),
    );
    assert!(text.contains("Your total score was 5000 points"));
    assert!(text.contains("Replay this game with --link /play/1-2"));
    assert!(text.contains("husky has played 1 games"));

    let text = stdout_of(nuguessr(&home).arg("--history"));
    assert!(text.contains("husky"));
    assert!(text.contains("1-2"));

    let csv_path = home.path().join("rounds.csv");
    stdout_of(nuguessr(&home).arg("--export").arg(&csv_path));
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 3);
}

#[test]
fn quitting_saves_nothing() {
    let home = TempDir::new().unwrap();
    let text = stdout_of(
        nuguessr(&home)
            .args(["--link", "3-4"])
            .write_stdin("q\n"),
    );
    assert!(text.contains("Stopped after 0 rounds"));

    let text = stdout_of(nuguessr(&home).arg("--history"));
    assert!(text.contains("No games played yet"));
}

#[test]
fn unknown_place_in_link_fails() {
    let home = TempDir::new().unwrap();
    nuguessr(&home)
        .args(["--link", "1-999"])
        .write_stdin("")
        .assert()
        .failure();
}

#[test]
fn profile_shows_totals_and_clear_history_wipes_them() {
    let home = TempDir::new().unwrap();

    let text = stdout_of(nuguessr(&home).args(["--profile", "--player", "husky"]));
    assert!(text.contains("husky has not played yet"));

    stdout_of(
        nuguessr(&home)
            .args(["--link", "5", "--player", "husky"])
            .write_stdin("42.3393,-71.0887\n"),
    );

    let text = stdout_of(nuguessr(&home).args(["--profile", "--player", "husky"]));
    assert!(text.contains("games played: 1"));
    assert!(text.contains("total score:  5000"));
    assert!(text.contains("/5000"));

    let text = stdout_of(nuguessr(&home).arg("--clear-history"));
    assert!(text.contains("History cleared"));

    let text = stdout_of(nuguessr(&home).args(["--profile", "--player", "husky"]));
    assert!(text.contains("husky has not played yet"));
    let text = stdout_of(nuguessr(&home).arg("--history"));
    assert!(text.contains("No games played yet"));
}

use folio_core::Database;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("folio/folio.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("folio");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(assert_cmd::cargo::cargo_bin!("folio-analytics"))
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", &self.xdg_data)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .env_remove("FOLIO_DB")
            .output()
            .unwrap_or_else(|e| panic!("failed to execute folio-analytics: {e}"))
    }

    /// Run and require success
    fn ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "folio-analytics {} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn json(&self, args: &[&str]) -> Value {
        let mut full = vec!["--format", "json"];
        full.extend_from_slice(args);
        let stdout = self.ok(&full);
        serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("invalid JSON from {:?}: {e}\n{stdout}", args))
    }

    fn add_book(&self, title: &str, genre: &str) -> String {
        let book = self.json(&["add-book", title, "--author", "A. Writer", "--genre", genre]);
        book["id"].as_str().expect("book id").to_string()
    }
}

#[test]
fn view_dedup_and_stats_round_trip() {
    let env = CliTestEnv::new();
    let book = env.add_book("The Hollow", "Mystery");

    let first = env.json(&["view", &book, "--user", "alice"]);
    assert_eq!(first["outcome"], "recorded");
    let repeat = env.json(&["view", &book, "--user", "alice"]);
    assert_eq!(repeat["outcome"], "suppressed");
    env.json(&["view", &book]);

    let stats = env.json(&["stats", &book]);
    assert_eq!(stats["total_views"], 2);
    assert_eq!(stats["unique_viewers"], 1);
    assert_eq!(stats["daily_views"].as_array().unwrap().len(), 1);

    assert!(env.db_path().exists(), "database should live under XDG_DATA_HOME");
    let db = Database::open(&env.db_path()).expect("failed to open db");
    assert_eq!(db.get_book(&book).unwrap().unwrap().view_count, 2);

    let text = env.ok(&["stats", &book]);
    assert!(text.contains("Book: The Hollow"));
    assert!(text.contains("Peak hours (UTC):"));
}

#[test]
fn stats_for_unknown_book_fails() {
    let env = CliTestEnv::new();
    let output = env.run(&["stats", "no-such-book"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("book not found"));
}

#[test]
fn out_of_range_arguments_are_rejected() {
    let env = CliTestEnv::new();
    for args in [
        &["popular", "--top", "0"][..],
        &["popular", "--top", "51"][..],
        &["trending", "--top", "21"][..],
        &["recommend", "alice", "--count", "21"][..],
    ] {
        let output = env.run(args);
        assert!(!output.status.success(), "{:?} should fail", args);
    }
    env.ok(&["popular", "--top", "50"]);
    env.ok(&["trending", "--top", "20"]);
}

#[test]
fn ratings_drive_popularity_and_recommendations() {
    let env = CliTestEnv::new();
    let read = env.add_book("Already Read", "Mystery");
    let pick = env.add_book("Top Pick", "Mystery");
    let other = env.add_book("Elsewhere", "Romance");

    env.ok(&["view", &read, "--user", "alice"]);
    env.ok(&["rate", &pick, "5", "--user", "bob"]);
    env.ok(&["rate", &other, "2", "--user", "bob"]);
    let anonymous = env.json(&["rate", &pick, "3", "--anonymous-name", "reader7"]);
    assert_eq!(anonymous["is_anonymous"], true);

    let duplicate = env.run(&["rate", &pick, "1", "--user", "bob"]);
    assert!(!duplicate.status.success());

    let popular = env.json(&["popular", "--top", "1"]);
    assert_eq!(popular[0]["book_id"], pick.as_str());
    assert_eq!(popular[0]["average_rating"], 4.0);

    let picks = env.json(&["recommend", "alice"]);
    let ids: Vec<&str> = picks
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![pick.as_str()]);

    let cold = env.ok(&["recommend", "newcomer"]);
    assert!(cold.contains("No recommendations for newcomer"));

    env.ok(&["unrate", &anonymous["id"].to_string()]);
    let recomputed = env.json(&["recompute", &pick]);
    assert_eq!(recomputed[0]["rating_count"], 1);
    assert_eq!(recomputed[0]["average_rating"], 5.0);
}

#[test]
fn engagement_trending_and_platform_reports() {
    let env = CliTestEnv::new();
    let book = env.add_book("Night Garden", "Fantasy");

    env.ok(&["view", &book, "--user", "carol"]);
    env.ok(&["rate", &book, "4", "--user", "carol", "--review", "lovely"]);
    env.ok(&["comment", &book, "More please", "--user", "carol"]);

    let engagement = env.json(&["engagement", "carol"]);
    assert_eq!(engagement["score"], 1 + 3 + 5);
    assert_eq!(engagement["level"], "Low");

    let trending = env.ok(&["trending"]);
    assert!(trending.contains("Fantasy"));
    assert!(trending.contains("+100.0%"));

    let platform = env.json(&["platform"]);
    assert_eq!(platform["total_books"], 1);
    assert_eq!(platform["total_users"], 1);
    assert_eq!(platform["total_comments"], 1);
    assert_eq!(platform["top_genres"][0]["genre"], "Fantasy");

    let text = env.ok(&["platform"]);
    assert!(text.contains("Active (30d): 1"));
}

#[test]
fn platform_active_label_follows_configured_window() {
    let env = CliTestEnv::new();
    env.write_config("[analytics]\nengagement_window_days = 7\n");
    let book = env.add_book("Night Garden", "Fantasy");
    env.ok(&["view", &book, "--user", "carol"]);

    let text = env.ok(&["platform"]);
    assert!(text.contains("Active (7d): 1"), "{text}");
    assert!(!text.contains("30d"));
}

#[test]
fn db_flag_and_config_file_are_honored() {
    let env = CliTestEnv::new();
    env.write_config("[analytics]\ndedup_window_minutes = 1\n");

    let custom = env.home.join("custom.db");
    let custom_arg = custom.to_string_lossy().into_owned();
    let book = env.json(&[
        "--db", &custom_arg, "add-book", "Dune", "--author", "Herbert", "--genre", "SciFi",
    ]);
    assert!(custom.exists());
    assert!(!env.db_path().exists());

    let book_id = book["id"].as_str().unwrap();
    let first = env.json(&["--db", &custom_arg, "view", book_id, "--user", "dave"]);
    assert_eq!(first["outcome"], "recorded");

    env.write_config("[analytics]\ndedup_window_minutes = 0\n");
    let invalid = env.run(&["--db", &custom_arg, "platform"]);
    assert!(!invalid.status.success());
}

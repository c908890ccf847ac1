use lastivka::memory_cli::{handle_command, MemoryCommands};
use lastivka_memory::{MemoryConfig, MemoryStore};
use tempfile::TempDir;

fn run(store: &MemoryStore, cmd: MemoryCommands) -> String {
    let mut out = Vec::new();
    handle_command(cmd, store, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn remember(key: &str, text: &str, tags: &[&str]) -> MemoryCommands {
    MemoryCommands::Remember {
        key: key.into(),
        text: text.into(),
        tone: None,
        tags: tags.iter().map(|tag| tag.to_string()).collect(),
        rel: None,
    }
}

fn search(query: &str) -> MemoryCommands {
    MemoryCommands::Search {
        query: query.into(),
        limit: None,
        debug: false,
        best: false,
        no_fresh: false,
        fresh_weight: None,
        weights: None,
    }
}

#[test]
fn remember_recall_forget() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::open(dir.path().join("memory.json"), MemoryConfig::default()).unwrap();

    assert!(run(&store, remember("кава", "чорна", &["напій"])).starts_with("Added"));
    assert!(run(&store, remember("кава", "чорна", &[])).starts_with("Duplicate"));

    let recalled = run(&store, MemoryCommands::Recall { key: "Кава".into() });
    assert!(recalled.contains("| нейтральний | чорна"));

    let listed = run(&store, MemoryCommands::List);
    assert!(listed.starts_with("кав (1)"));

    assert!(run(&store, MemoryCommands::Forget { key: "борщ".into() }).contains("No memory found"));
    assert!(run(&store, MemoryCommands::Forget { key: "кава".into() }).contains("Forgot memory"));
    assert!(run(&store, MemoryCommands::Keys).is_empty());
}

#[test]
fn search_and_ask_print_ranked_lines() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::open(dir.path().join("memory.json"), MemoryConfig::default()).unwrap();
    run(&store, remember("кава", "чорна", &["напій"]));
    run(&store, remember("сир", "твердий сир", &["покупка"]));

    let found = run(&store, search("купити кави"));
    let first = found.lines().next().unwrap();
    assert!(first.contains("] кав |"), "{found}");
    assert!(first.ends_with("| чорна"));

    let debug = run(
        &store,
        MemoryCommands::Search {
            query: "кава".into(),
            limit: Some(1),
            debug: true,
            best: false,
            no_fresh: true,
            fresh_weight: None,
            weights: Some(r#"{"exact": 500}"#.into()),
        },
    );
    assert_eq!(debug.lines().count(), 2);
    assert!(debug.contains("key_similarity=500.00"));

    let answer = run(&store, MemoryCommands::Ask { question: "що купити?".into() });
    assert!(answer.contains("| твердий сир (shopping)"), "{answer}");
    assert_eq!(
        run(&store, MemoryCommands::Ask { question: "розкажи казку".into() }),
        "No answer.\n"
    );
}

#[test]
fn maintenance_commands_report() {
    let dir = TempDir::new().unwrap();
    let store = MemoryStore::open(dir.path().join("memory.json"), MemoryConfig::default()).unwrap();
    run(&store, MemoryCommands::Insert {
        text: "купити хліб".into(),
        key: "manual/notes".into(),
        tone: None,
        tags: vec!["покупка".into()],
    });

    assert!(run(&store, MemoryCommands::Rebuild).contains("source=primary, keys=1, entries=1"));
    assert!(run(&store, MemoryCommands::Verify).contains("probe=OK"));
    assert!(run(&store, MemoryCommands::Compact).contains("nothing to compact"));
    assert!(run(&store, MemoryCommands::Stats).contains("Records:  1"));
    assert!(run(&store, MemoryCommands::Tags { tag: "Покупка".into(), limit: 50 }).contains("купити хліб"));

    let export = dir.path().join("out").join("export.json");
    run(&store, MemoryCommands::Export { path: export.clone() });
    assert!(export.exists());

    assert_eq!(run(&store, MemoryCommands::Clear), "Memory cleared\n");
    assert!(run(&store, MemoryCommands::Find { query: "manual".into() }).contains("Nothing found"));
}

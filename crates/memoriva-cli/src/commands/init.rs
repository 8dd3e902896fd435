//! The `memoriva init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("memoriva.toml").exists() {
        println!("memoriva.toml already exists, skipping.");
    } else {
        std::fs::write("memoriva.toml", SAMPLE_CONFIG)?;
        println!("Created memoriva.toml");
    }

    std::fs::create_dir_all("fixtures")?;
    let example_path = std::path::Path::new("fixtures/example.toml");
    if example_path.exists() {
        println!("fixtures/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_FIXTURE)?;
        println!("Created fixtures/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Export DEEPSEEK_API_KEY or OPENAI_API_KEY (or run with --offline)");
    println!("  2. Run: memoriva validate --fixture fixtures/example.toml");
    println!("  3. Run: memoriva run --fixture fixtures/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# memoriva configuration

default_provider = "deepseek"
workers = 3
queue_capacity = 100

[selection]
prompt_card_limit = 50
max_tokens = 1000
temperature = 0.3

[providers.deepseek]
type = "deepseek"
api_key = "${DEEPSEEK_API_KEY}"
model = "deepseek-chat"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"
model = "gpt-3.5-turbo"
"#;

const EXAMPLE_FIXTURE: &str = r#"# Example decks, review history, and pending study sessions.

[[decks]]
id = "spanish-verbs"
name = "Spanish verbs"

[[decks.cards]]
id = "ser"
front = "ser"
back = "to be (essential)"

[[decks.cards]]
id = "estar"
front = "estar"
back = "to be (state, location)"

[[decks.cards]]
id = "ir"
front = "ir"
back = "to go"

[[decks.cards]]
id = "tener"
front = "tener"
back = "to have"

[[decks.cards]]
id = "hacer"
front = "hacer"
back = "to do, to make"

[[decks.cards]]
id = "poder"
front = "poder"
back = "to be able to"

[[decks]]
id = "capitals"
name = "European capitals"

[[decks.cards]]
id = "fr"
front = "France"
back = "Paris"

[[decks.cards]]
id = "pt"
front = "Portugal"
back = "Lisbon"

[[reviews]]
user_id = "alice"
card_id = "ser"
easy = 1
hard = 1
again = 4

[[reviews]]
user_id = "alice"
card_id = "estar"
easy = 2
hard = 2
again = 0

[[reviews]]
user_id = "alice"
card_id = "ir"
easy = 6
hard = 0
again = 0

[[sessions]]
id = "alice-verbs"
user_id = "alice"
deck_id = "spanish-verbs"
prompt = "irregular verbs I keep forgetting"
max_cards = 6

[[sessions]]
id = "bob-capitals"
user_id = "bob"
deck_id = "capitals"
prompt = "capitals"
max_cards = 5
"#;

//! The `examkit init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("examkit.toml").exists() {
        println!("examkit.toml already exists, skipping.");
    } else {
        std::fs::write("examkit.toml", SAMPLE_CONFIG)?;
        println!("Created examkit.toml");
    }

    std::fs::create_dir_all("banks")?;
    let example_path = std::path::Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Add question banks under banks/");
    println!("  2. Run: examkit validate --bank banks");
    println!("  3. Run: examkit take --subject general-knowledge --test-type quick");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examkit configuration

[content]
type = "file"
dir = "./banks"
# type = "http"
# base_url = "https://exams.example.com/api"
# api_token = "${EXAMKIT_API_TOKEN}"

[results]
type = "json"
dir = "./examkit-results"

[persistence]
max_retries = 3
retry_delay_ms = 500

[test_types.quick]
question_count = 20
duration_secs = 900

[test_types.subject]
question_count = 40
duration_secs = 2400

[test_types.mock]
question_count = 40
duration_secs = 3600
"#;

const EXAMPLE_BANK: &str = r#"[bank]
subject = "general-knowledge"
name = "General Knowledge"
description = "A small example bank to get started"

[[questions]]
id = "gk-001"
topic = "geography"
prompt = "What is the capital of Australia?"
answer = "C"
explanation = "Canberra was chosen as a compromise between Sydney and Melbourne."
options = [
    { label = "A", text = "Sydney" },
    { label = "B", text = "Melbourne" },
    { label = "C", text = "Canberra" },
    { label = "D", text = "Perth" },
]

[[questions]]
id = "gk-002"
topic = "science"
prompt = "Which gas do plants absorb during photosynthesis?"
answer = "B"
explanation = "Plants take in carbon dioxide and release oxygen."
options = [
    { label = "A", text = "Oxygen" },
    { label = "B", text = "Carbon dioxide" },
    { label = "C", text = "Nitrogen" },
    { label = "D", text = "Hydrogen" },
]

[[questions]]
id = "gk-003"
topic = "science"
prompt = "How many planets are in the Solar System?"
answer = "A"
explanation = "Pluto was reclassified as a dwarf planet in 2006, leaving eight."
options = [
    { label = "A", text = "8" },
    { label = "B", text = "9" },
    { label = "C", text = "10" },
    { label = "D", text = "7" },
]
"#;

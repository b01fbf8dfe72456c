//! The `dailyprep init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("dailyprep.toml").exists() {
        println!("dailyprep.toml already exists, skipping.");
    } else {
        std::fs::write("dailyprep.toml", SAMPLE_CONFIG)?;
        println!("Created dailyprep.toml");
    }

    std::fs::create_dir_all("datasets")?;
    let sample_path = Path::new("datasets/prelims-sample.json");
    if sample_path.exists() {
        println!("datasets/prelims-sample.json already exists, skipping.");
    } else {
        std::fs::write(sample_path, SAMPLE_DATASET)?;
        println!("Created datasets/prelims-sample.json");
    }

    println!("\nNext steps:");
    println!("  1. Set SUPABASE_URL, SUPABASE_SERVICE_KEY and GEMINI_API_KEY");
    println!("  2. Run: dailyprep validate-questions --file datasets/prelims-sample.json");
    println!("  3. Run: dailyprep upload-questions --file datasets/prelims-sample.json");
    println!("  4. Schedule: dailyprep assign && dailyprep push");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# dailyprep configuration

# Calendar used for "today" (minutes east of UTC). 330 = IST.
utc_offset_minutes = 330
upload_batch_size = 500

[supabase]
url = "${SUPABASE_URL}"
service_key = "${SUPABASE_SERVICE_KEY}"

[expo]
# access_token = "${EXPO_ACCESS_TOKEN}"

[gemini]
api_key = "${GEMINI_API_KEY}"
model = "gemini-1.5-flash"

[cloudinary]
cloud_name = "${CLOUDINARY_CLOUD_NAME}"
upload_preset = "answer-copies"
folder = "answers"

[points]
prelims_correct = 4
prelims_attempt = 1
mains_submission = 10

[push]
max_failures = 3
batch_size = 100
parallelism = 4
"#;

const SAMPLE_DATASET: &str = r#"[
  {
    "id": "polity-001",
    "question": "Which Article of the Constitution of India deals with the Right to Constitutional Remedies?",
    "options": ["Article 14", "Article 21", "Article 32", "Article 226"],
    "answer": "C",
    "explanation": "Article 32 lets citizens move the Supreme Court to enforce Fundamental Rights.",
    "subject": "Polity"
  },
  {
    "id": "geo-001",
    "question": "The Tropic of Cancer does NOT pass through which of these states?",
    "options": ["Rajasthan", "Odisha", "Tripura", "Chhattisgarh"],
    "answer": 1,
    "subject": "Geography"
  },
  {
    "id": "eco-001",
    "question": "Who sets the policy repo rate in India?",
    "options": ["Ministry of Finance", "Monetary Policy Committee", "NITI Aayog", "SEBI"],
    "answer": "Monetary Policy Committee",
    "subject": "Economy"
  }
]
"#;

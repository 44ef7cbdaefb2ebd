//! Runs one analysis against the configured environment with verbose
//! logging, and reports which Gemini model was selected.
//!
//! Usage: debug_analysis [text...]

use anyhow::Result;
use std::time::Instant;

use sentiment_feed::config::Settings;
use sentiment_feed::SentimentAnalyzer;

const SAMPLE_TEXT: &str = "模擬授業がとても面白くて、先輩も優しかったです。ぜひ入学したいと思いました！";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut settings = Settings::from_env();
    settings.debug_mode = true;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let text = if args.is_empty() {
        SAMPLE_TEXT.to_string()
    } else {
        args.join(" ")
    };

    println!("🔍 Profile: {:?}", settings.profile);

    let analyzer = SentimentAnalyzer::connect(&settings).await;
    match analyzer.models() {
        Some(models) => println!("✅ Using {} (rate-limit fallback {})", models.primary, models.secondary),
        None => println!("🔑 No Gemini model available, keyword analysis only"),
    }

    let started = Instant::now();
    let result = analyzer.analyze(&text).await;

    println!("\n📝 Text: {}", text);
    println!("⏱️ {:.2?}", started.elapsed());
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}

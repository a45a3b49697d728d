use anyhow::Result;
use chrono::Local;

use sugartrack_core::insight;
use sugartrack_core::service::SugarService;

use crate::gemini::GeminiClient;

/// Ask the model for a short trend analysis of the latest readings.
/// Any failure on the way comes back as one of the fixed messages, never an error.
async fn analyze(svc: &SugarService, client: &GeminiClient) -> String {
    match svc.insight_prompt(&Local) {
        Ok(prompt) => insight::resolve(client.generate_async(&prompt).await),
        Err(fallback) => fallback.to_string(),
    }
}

pub(crate) async fn cmd_insight(
    svc: &SugarService,
    client: &GeminiClient,
    json: bool,
) -> Result<()> {
    eprintln!("Analyzing your recent readings...");
    let analysis = analyze(svc, client).await;

    if json {
        println!("{}", serde_json::json!({ "analysis": analysis }));
    } else {
        println!("\n{analysis}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sugartrack_core::models::{Category, NewRecord, Unit};

    fn add(svc: &mut SugarService, n: usize) {
        for i in 0..n {
            svc.add_record(NewRecord {
                timestamp: 1_709_798_700_000 + i64::try_from(i).unwrap() * 3_600_000,
                category: Category::Other,
                value: 100.0,
                unit: Unit::MgDl,
                notes: String::new(),
            })
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_not_enough_data_skips_request() {
        let mut svc = SugarService::new_in_memory().unwrap();
        add(&mut svc, 2);
        let client = GeminiClient::new(None).unwrap();
        assert_eq!(analyze(&svc, &client).await, insight::NOT_ENOUGH_DATA);
    }

    #[tokio::test]
    async fn test_missing_key_reports_unavailable() {
        let mut svc = SugarService::new_in_memory().unwrap();
        add(&mut svc, 3);
        let client = GeminiClient::new(None).unwrap();
        assert_eq!(analyze(&svc, &client).await, insight::UNAVAILABLE);
    }
}

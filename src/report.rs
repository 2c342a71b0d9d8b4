//! Exporting the end-of-test summary.
//!
//! With `--summary-export NAME` the complete [`RunResult`] is written to `NAME` as
//! pretty printed JSON once the load test finishes: every request, check and
//! iteration aggregate, the stage history and the outcome of every threshold.

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::threshold::RunResult;
use crate::LoadTestError;

/// Write `result` to `path` as JSON.
pub async fn write_summary(path: &str, result: &RunResult) -> Result<(), LoadTestError> {
    let json = serde_json::to_string_pretty(result)?;

    let mut summary_file = File::create(path).await?;
    summary_file.write_all(json.as_bytes()).await?;
    summary_file.flush().await?;

    info!("wrote summary to: {}", path);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metrics::LoadTestMetrics;
    use crate::threshold;

    #[tokio::test]
    async fn summary_is_json() {
        let path = "test-summary-export.json";
        let thresholds = vec!["http_reqs:count==0".parse().unwrap()];
        let result = threshold::evaluate(&LoadTestMetrics::default(), &thresholds);

        write_summary(path, &result).await.unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        std::fs::remove_file(path).unwrap();

        let summary: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(summary["passed"], true);
        assert_eq!(summary["thresholds"][0]["threshold"]["metric"], "http_reqs");
        assert_eq!(summary["thresholds"][0]["observed"], 0.0);
        assert_eq!(summary["metrics"]["max_users"], 0);
    }

    #[tokio::test]
    async fn unwritable_path() {
        let result = threshold::evaluate(&LoadTestMetrics::default(), &[]);
        let error = write_summary("/nonexistent-directory/summary.json", &result)
            .await
            .unwrap_err();
        assert!(matches!(error, LoadTestError::Io(_)));
    }
}

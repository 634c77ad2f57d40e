//! Result sink writing one JSON document per experiment, overwriting any
//! previous run's document for the same id.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;
use uplift_clients::ResultStorage;
use uplift_core::results::ExperimentResult;
use uplift_core::UpliftResult;

pub struct JsonResultStore {
    out_dir: PathBuf,
}

impl JsonResultStore {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

#[async_trait]
impl ResultStorage for JsonResultStore {
    async fn upsert(&self, environment_id: &str, result: &ExperimentResult) -> UpliftResult<()> {
        let dir = self.out_dir.join(environment_id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", result.id));
        std::fs::write(&path, serde_json::to_vec_pretty(result)?)?;
        info!(path = %path.display(), "experiment result written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_overwrites_document() {
        let dir = std::env::temp_dir().join(format!("uplift-store-{}", std::process::id()));
        let store = JsonResultStore::new(dir.clone());

        let mut result = ExperimentResult::new("eid", 100);
        store.upsert("env0", &result).await.unwrap();
        result.updated_at = 200;
        store.upsert("env0", &result).await.unwrap();

        let raw = std::fs::read_to_string(dir.join("env0").join("eid.json")).unwrap();
        let back: ExperimentResult = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.updated_at, 200);

        std::fs::remove_dir_all(dir).unwrap();
    }
}

// file: src/pipeline/service.rs
// description: async façade running stage operators against the shared pipeline store
// reference: per-record lock held across clone, blocking compute and merge

use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::report::ResultsReport;
use crate::stages::{
    self, CleanReport, CleanRequest, IngestReport, ScaleReport, ScaleRequest, SplitReport,
    SplitRequest, StageOutput, TrainReport,
};
use crate::store::{PipelineId, PipelineRecord, PipelineStore, PipelineSummary};
use crate::utils::OperationTimer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SLOW_STAGE: Duration = Duration::from_secs(30);

/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct PipelineService {
    store: Arc<PipelineStore>,
    config: Arc<Config>,
}

impl PipelineService {
    pub fn new(config: Config) -> Self {
        Self::with_store(Arc::new(PipelineStore::new()), config)
    }

    pub fn with_store(store: Arc<PipelineStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<PipelineStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn ingest(&self, bytes: Vec<u8>, filename: &str) -> Result<IngestReport> {
        let timer = OperationTimer::new(&format!("ingest {}", filename));
        let ingest_config = self.config.ingest.clone();
        let name = filename.to_string();

        let output = tokio::task::spawn_blocking(move || {
            stages::ingest::run(&bytes, &name, &ingest_config)
        })
        .await??;

        let mut record = PipelineRecord::new(PipelineId::new());
        output.update.apply(&mut record);
        let id = self.store.insert(record).await;
        let rows = output.report.rows;

        timer.finish_with_count(rows);
        info!("Pipeline {} created from {}", id, filename);
        Ok(IngestReport::new(id, output.report))
    }

    pub async fn clean(&self, id: &PipelineId, request: CleanRequest) -> Result<CleanReport> {
        self.run_stage(id, "clean", working_dataset, move |dataset| {
            stages::clean::run(&dataset, &request)
        })
        .await
    }

    pub async fn scale(&self, id: &PipelineId, request: ScaleRequest) -> Result<ScaleReport> {
        self.run_stage(id, "scale", working_dataset, move |dataset| {
            stages::scale::run(&dataset, &request)
        })
        .await
    }

    pub async fn split(&self, id: &PipelineId, request: SplitRequest) -> Result<SplitReport> {
        let split_config = self.config.split.clone();
        self.run_stage(id, "split", working_dataset, move |dataset| {
            stages::split::run(&dataset, &request, &split_config)
        })
        .await
    }

    /// Replaces any earlier model, metrics and predictions of this pipeline.
    pub async fn train(&self, id: &PipelineId, model_type: &str) -> Result<TrainReport> {
        let training_config = self.config.training.clone();
        let tag = model_type.to_string();
        let pipeline_id = *id;

        self.run_stage(
            id,
            "train",
            |record| Ok(record.split.clone()),
            move |split| stages::train::run(&pipeline_id, split.as_ref(), &tag, &training_config),
        )
        .await
    }

    pub async fn results(&self, id: &PipelineId, include_charts: bool) -> Result<ResultsReport> {
        let snapshot = self.store.read(id).await?;
        let report = ResultsReport::from_record(&snapshot);
        if include_charts {
            return Ok(report.with_charts(&snapshot, &self.config.reporting));
        }
        Ok(report)
    }

    pub async fn list_pipelines(&self) -> Vec<PipelineSummary> {
        self.store.list().await
    }

    pub async fn remove(&self, id: &PipelineId) -> Result<()> {
        self.store.remove(id).await?;
        info!("Pipeline {} removed", id);
        Ok(())
    }

    /// Holds the record lock from input capture until the delta is merged, so
    /// calls on one pipeline serialize and never lose each other's updates.
    async fn run_stage<T, R, P, C>(
        &self,
        id: &PipelineId,
        stage: &str,
        prepare: P,
        compute: C,
    ) -> Result<R>
    where
        P: FnOnce(&PipelineRecord) -> Result<T>,
        C: FnOnce(T) -> Result<StageOutput<R>> + Send + 'static,
        T: Send + 'static,
        R: Send + 'static,
    {
        let timer = OperationTimer::new(&format!("{} {}", stage, id));
        let mut record = self.store.lock(id).await?;
        let input = prepare(&record)?;

        let output = tokio::task::spawn_blocking(move || compute(input)).await??;
        timer.warn_if_slow(SLOW_STAGE, stage);

        self.store.apply(&mut record, output.update).await;
        drop(record);
        debug!("Merged {} result into pipeline {}", stage, id);

        timer.finish();
        Ok(output.report)
    }
}

fn working_dataset(record: &PipelineRecord) -> Result<Dataset> {
    record
        .dataset
        .clone()
        .ok_or_else(|| PipelineError::NotFound(record.id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Cell;
    use crate::metrics::ModelMetrics;
    use crate::models::ModelType;
    use pretty_assertions::assert_eq;

    fn service() -> PipelineService {
        let mut config = Config::default_config();
        config.training.n_estimators = 20;
        PipelineService::new(config)
    }

    fn classification_csv(rows: usize) -> Vec<u8> {
        let mut csv = String::from("f1,f2,name,label\n");
        for i in 0..rows {
            let class = i % 3;
            let f1 = class as f64 * 5.0 + (i % 7) as f64 * 0.2;
            let f2 = if i % 11 == 0 {
                String::new()
            } else {
                ((i * 13) % 17).to_string()
            };
            csv.push_str(&format!("{},{},n{},{}\n", f1, f2, i, ["a", "b", "c"][class]));
        }
        csv.into_bytes()
    }

    fn regression_csv(rows: usize) -> Vec<u8> {
        let mut csv = String::from("x,noise,y\n");
        for i in 0..rows {
            csv.push_str(&format!("{},{},{}\n", i, i % 5, 3 * i + 2));
        }
        csv.into_bytes()
    }

    #[tokio::test]
    async fn test_full_classification_pipeline() {
        let service = service();
        let ingest = service
            .ingest(classification_csv(200), "flowers.csv")
            .await
            .unwrap();
        assert_eq!(ingest.dataset_info.rows, 200);
        let id = ingest.pipeline_id;

        let clean = service
            .clean(
                &id,
                CleanRequest {
                    strategy: "mean".to_string(),
                    ..CleanRequest::default()
                },
            )
            .await
            .unwrap();
        assert!(clean.info.missing_after.values().all(|v| *v == 0));

        service
            .scale(
                &id,
                ScaleRequest {
                    scaler: "standardize".to_string(),
                    columns: vec![],
                },
            )
            .await
            .unwrap();

        let split = service
            .split(&id, SplitRequest::new("label", 0.8))
            .await
            .unwrap();
        assert_eq!(split.train_size, 160);
        assert_eq!(split.test_size, 40);
        assert_eq!(split.features, vec!["f1", "f2"]);

        let train = service.train(&id, "random_forest").await.unwrap();
        match &train.metrics {
            ModelMetrics::Classification(m) => {
                assert!((0.0..=1.0).contains(&m.test_accuracy));
                assert!((0.0..=1.0).contains(&m.f1_score));
                assert_eq!(m.confusion_matrix.len(), m.labels.len());
            }
            other => panic!("unexpected metrics {other:?}"),
        }

        let results = service.results(&id, true).await.unwrap();
        assert!(results.preprocessing.is_some());
        assert_eq!(results.split_info.as_ref().map(|s| s.train_size), Some(160));
        let charts = results.charts.unwrap();
        assert!(charts.confusion_matrix.is_some());
        assert!(charts.feature_importance.is_some());
    }

    #[tokio::test]
    async fn test_retrain_replaces_model() {
        let service = service();
        let id = service
            .ingest(regression_csv(50), "line.csv")
            .await
            .unwrap()
            .pipeline_id;
        service
            .split(&id, SplitRequest::new("y", 0.8))
            .await
            .unwrap();

        service.train(&id, "decision_tree_regressor").await.unwrap();
        let second = service.train(&id, "linear_regression").await.unwrap();

        let results = service.results(&id, false).await.unwrap();
        let model = results.model_info.unwrap();
        assert_eq!(model.model_type, ModelType::LinearRegression);
        assert_eq!(model.metrics, second.metrics);
        assert!(model.feature_importances.is_none());
        assert!(results.charts.is_none());
    }

    #[tokio::test]
    async fn test_train_before_split() {
        let service = service();
        let id = service
            .ingest(regression_csv(10), "line.csv")
            .await
            .unwrap()
            .pipeline_id;
        let err = service.train(&id, "ridge").await.unwrap_err();
        assert!(matches!(err, PipelineError::NoSplitYet(_)));
    }

    #[tokio::test]
    async fn test_results_after_ingest_only() {
        let service = service();
        let id = service
            .ingest(regression_csv(10), "line.csv")
            .await
            .unwrap()
            .pipeline_id;
        let results = service.results(&id, true).await.unwrap();
        assert!(results.dataset_info.is_some());
        assert!(results.preprocessing.is_none());
        assert!(results.model_info.is_none());
        assert!(results.charts.map(|c| c.is_empty()).unwrap_or(true));
    }

    #[tokio::test]
    async fn test_unknown_pipeline() {
        let service = service();
        let ghost = PipelineId::new();
        assert!(service.results(&ghost, false).await.unwrap_err().is_not_found());
        assert!(service.train(&ghost, "ridge").await.unwrap_err().is_not_found());
        assert!(service
            .clean(&ghost, CleanRequest::default())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_failed_stage_leaves_record_untouched() {
        let service = service();
        let id = service
            .ingest(b"x,y\n1,2\n,4\n".to_vec(), "gap.csv")
            .await
            .unwrap()
            .pipeline_id;

        let err = service
            .clean(
                &id,
                CleanRequest {
                    strategy: "mean".to_string(),
                    columns: vec!["ghost".to_string()],
                    fill_value: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownColumn { .. }));

        let record = service.store().read(&id).await.unwrap();
        assert!(record.cleaning.is_none());
        assert_eq!(
            record.dataset.unwrap().column("x").unwrap().cells[1],
            Cell::Missing
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cleans_on_one_pipeline_serialize() {
        let service = service();
        let id = service
            .ingest(b"a,b\n1,\n,2\n3,4\n5,\n".to_vec(), "gaps.csv")
            .await
            .unwrap()
            .pipeline_id;

        let a = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .clean(
                        &id,
                        CleanRequest {
                            strategy: "median".to_string(),
                            columns: vec!["a".to_string()],
                            fill_value: None,
                        },
                    )
                    .await
            })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .clean(
                        &id,
                        CleanRequest {
                            strategy: "constant".to_string(),
                            columns: vec!["b".to_string()],
                            fill_value: Some("9".to_string()),
                        },
                    )
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Both fills survive whichever order the calls ran in.
        let dataset = service.store().read(&id).await.unwrap().dataset.unwrap();
        assert_eq!(dataset.total_missing(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_independent_pipelines_run_in_parallel() {
        let service = service();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                let id = service
                    .ingest(regression_csv(40), "line.csv")
                    .await?
                    .pipeline_id;
                service.split(&id, SplitRequest::new("y", 0.75)).await?;
                service.train(&id, "ridge").await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(service.list_pipelines().await.len(), 4);
    }

    #[tokio::test]
    async fn test_remove_pipeline() {
        let service = service();
        let id = service
            .ingest(regression_csv(10), "line.csv")
            .await
            .unwrap()
            .pipeline_id;
        service.remove(&id).await.unwrap();
        assert!(service.list_pipelines().await.is_empty());
        assert!(service.remove(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_results_serialize_after_training() {
        let service = service();
        let id = service
            .ingest(regression_csv(30), "line.csv")
            .await
            .unwrap()
            .pipeline_id;
        service
            .split(&id, SplitRequest::new("y", 0.8))
            .await
            .unwrap();
        service.train(&id, "ridge").await.unwrap();

        let results = service.results(&id, true).await.unwrap();
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["pipeline_id"], id.to_string());
        assert!(json["created_at"].is_string());
        assert!(json["model_info"]["trained_at"].is_string());
        assert_eq!(json["model_info"]["model_type"], "ridge");
        assert!(json["model_info"]["metrics"]["test_r2"].is_number());

        let listed = serde_json::to_value(service.list_pipelines().await).unwrap();
        assert!(listed[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_ingested_pipeline_is_listed_complete() {
        let service = service();
        let id = service
            .ingest(regression_csv(10), "line.csv")
            .await
            .unwrap()
            .pipeline_id;

        let listed = service.list_pipelines().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pipeline_id, id);
        assert_eq!(listed[0].filename.as_deref(), Some("line.csv"));
        assert!(!listed[0].busy);
    }

    #[tokio::test]
    async fn test_split_is_listed_after_stage() {
        let service = service();
        let id = service
            .ingest(regression_csv(20), "line.csv")
            .await
            .unwrap()
            .pipeline_id;
        service
            .split(&id, SplitRequest::new("y", 0.8))
            .await
            .unwrap();

        // Lock the record so the listing falls back to the published summary.
        let _guard = service.store().lock(&id).await.unwrap();
        let listed = service.list_pipelines().await;
        assert!(listed[0].busy);
        assert!(listed[0].has_split);
        assert_eq!(listed[0].filename.as_deref(), Some("line.csv"));
    }
}

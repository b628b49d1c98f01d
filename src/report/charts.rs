// file: src/report/charts.rs
// description: chart data derived from a record snapshot; a failing chart is dropped with a warning
// reference: bar and heatmap series ready for a frontend renderer

use crate::config::ReportingConfig;
use crate::metrics::ModelMetrics;
use crate::store::PipelineRecord;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarChart {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl BarChart {
    fn new(title: impl Into<String>, points: Vec<(String, f64)>) -> Result<Self, String> {
        if let Some((label, _)) = points.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("value for '{}' is not finite", label));
        }
        let (labels, values) = points.into_iter().unzip();
        Ok(Self {
            title: title.into(),
            labels,
            values,
        })
    }
}

/// Rows are actual classes, columns predicted classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub title: String,
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    pub values: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Charts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BarChart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confusion_matrix: Option<Heatmap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_vs_test: Option<BarChart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<BarChart>,
}

impl Charts {
    pub fn is_empty(&self) -> bool {
        self.metrics.is_none()
            && self.confusion_matrix.is_none()
            && self.train_vs_test.is_none()
            && self.feature_importance.is_none()
    }
}

pub struct ChartBuilder<'a> {
    config: &'a ReportingConfig,
}

impl<'a> ChartBuilder<'a> {
    pub fn new(config: &'a ReportingConfig) -> Self {
        Self { config }
    }

    /// Reads the snapshot only. Each chart is independent of the others.
    pub fn build(&self, record: &PipelineRecord) -> Charts {
        Charts {
            metrics: keep("metrics", self.metrics_chart(record)),
            confusion_matrix: keep("confusion_matrix", self.confusion_chart(record)),
            train_vs_test: keep("train_vs_test", self.train_vs_test_chart(record)),
            feature_importance: keep("feature_importance", self.importance_chart(record)),
        }
    }

    fn metrics_chart(&self, record: &PipelineRecord) -> Result<Option<BarChart>, String> {
        let Some(training) = &record.training else {
            return Ok(None);
        };
        let points = training
            .metrics
            .scalars()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        BarChart::new(format!("{} metrics", training.model_type), points).map(Some)
    }

    fn confusion_chart(&self, record: &PipelineRecord) -> Result<Option<Heatmap>, String> {
        let Some(ModelMetrics::Classification(metrics)) =
            record.training.as_ref().map(|t| &t.metrics)
        else {
            return Ok(None);
        };

        let size = metrics.labels.len();
        if metrics.confusion_matrix.len() != size
            || metrics.confusion_matrix.iter().any(|row| row.len() != size)
        {
            return Err(format!(
                "matrix shape does not match {} label(s)",
                metrics.labels.len()
            ));
        }

        Ok(Some(Heatmap {
            title: "Confusion matrix (test set)".to_string(),
            x_labels: metrics.labels.clone(),
            y_labels: metrics.labels.clone(),
            values: metrics.confusion_matrix.clone(),
        }))
    }

    fn train_vs_test_chart(&self, record: &PipelineRecord) -> Result<Option<BarChart>, String> {
        let Some(training) = &record.training else {
            return Ok(None);
        };
        let metrics = &training.metrics;
        BarChart::new(
            format!("Train vs test {}", metrics.score_name()),
            vec![
                ("train".to_string(), metrics.train_score()),
                ("test".to_string(), metrics.test_score()),
            ],
        )
        .map(Some)
    }

    fn importance_chart(&self, record: &PipelineRecord) -> Result<Option<BarChart>, String> {
        let Some(ranked) = record
            .training
            .as_ref()
            .and_then(|t| t.feature_importances.as_ref())
        else {
            return Ok(None);
        };
        let points = ranked
            .iter()
            .take(self.config.top_features)
            .map(|f| (f.feature.clone(), f.importance))
            .collect();
        BarChart::new("Feature importance", points).map(Some)
    }
}

fn keep<T>(name: &str, chart: Result<Option<T>, String>) -> Option<T> {
    chart.unwrap_or_else(|message| {
        warn!("Skipping {} chart: {}", name, message);
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dataset::Cell;
    use crate::stages::split::SplitData;
    use crate::stages::train;
    use crate::store::PipelineId;

    fn trained(model: &str, target: impl Fn(usize) -> Cell) -> PipelineRecord {
        let rows = 40;
        let features: Vec<Vec<f64>> = (0..rows).map(|i| vec![i as f64, (i % 4) as f64]).collect();
        let split = SplitData {
            x_train: features[..30].to_vec(),
            x_test: features[30..].to_vec(),
            y_train: (0..30).map(&target).collect(),
            y_test: (30..rows).map(&target).collect(),
            feature_columns: vec!["x".to_string(), "q".to_string()],
            target_column: "y".to_string(),
            ratio: 0.75,
        };
        let mut config = Config::default_config().training;
        config.n_estimators = 5;

        let mut record = PipelineRecord::new(PipelineId::new());
        let output = train::run(&record.id, Some(&split), model, &config).unwrap();
        output.update.apply(&mut record);
        record.split = Some(split);
        record
    }

    #[test]
    fn test_classifier_charts() {
        let record = trained("random_forest", |i| Cell::Number((i % 2) as f64));
        let config = Config::default_config().reporting;
        let charts = ChartBuilder::new(&config).build(&record);

        assert_eq!(charts.metrics.as_ref().map(|c| c.values.len()), Some(5));
        assert!(charts.confusion_matrix.is_some());
        assert_eq!(
            charts.train_vs_test.as_ref().map(|c| c.labels.clone()),
            Some(vec!["train".to_string(), "test".to_string()])
        );
        assert_eq!(
            charts.feature_importance.as_ref().map(|c| c.labels.len()),
            Some(2)
        );
    }

    #[test]
    fn test_regressor_has_no_heatmap_or_importance() {
        let record = trained("ridge", |i| Cell::Number(i as f64));
        let config = Config::default_config().reporting;
        let charts = ChartBuilder::new(&config).build(&record);
        assert!(charts.metrics.is_some());
        assert!(charts.confusion_matrix.is_none());
        assert!(charts.feature_importance.is_none());
    }

    #[test]
    fn test_top_features_limit() {
        let record = trained("decision_tree_regressor", |i| Cell::Number(i as f64));
        let mut config = Config::default_config().reporting;
        config.top_features = 1;
        let charts = ChartBuilder::new(&config).build(&record);
        assert_eq!(
            charts.feature_importance.map(|c| c.values.len()),
            Some(1)
        );
    }

    #[test]
    fn test_untrained_record_has_no_charts() {
        let record = PipelineRecord::new(PipelineId::new());
        let config = Config::default_config().reporting;
        assert!(ChartBuilder::new(&config).build(&record).is_empty());
    }

    #[test]
    fn test_non_finite_value_drops_chart() {
        let chart = BarChart::new("broken", vec![("a".to_string(), f64::NAN)]);
        assert!(chart.is_err());
        assert_eq!(keep("broken", chart.map(Some)), None);
    }
}

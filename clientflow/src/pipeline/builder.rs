//! Pipeline builder with validation.

use super::RequestPipeline;
use crate::errors::PipelineValidationError;
use crate::stages::RequestStage;
use std::sync::Arc;

/// Builder for creating validated request pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Arc<dyn RequestStage>>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name was already added.
    pub fn stage(mut self, stage: Arc<dyn RequestStage>) -> Result<Self, PipelineValidationError> {
        self.add_stage(stage)?;
        Ok(self)
    }

    /// Appends a stage in place.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage with the same name was already added.
    pub fn add_stage(&mut self, stage: Arc<dyn RequestStage>) -> Result<(), PipelineValidationError> {
        if self.contains(stage.name()) {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' already has a stage named '{}'",
                self.name,
                stage.name()
            ))
            .with_stages(vec![stage.name().to_string()]));
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Returns true if a stage with `name` was added.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name() == name)
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no stage was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline has no stages.
    pub fn build(self) -> Result<RequestPipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(format!(
                "Pipeline '{}' has no stages",
                self.name
            )));
        }
        Ok(RequestPipeline::new(self.name, self.stages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingStage;

    #[test]
    fn test_empty_pipeline_is_rejected() {
        let err = PipelineBuilder::new("empty").build().unwrap_err();
        assert!(err.message.contains("no stages"));
    }

    #[test]
    fn test_duplicate_stage_is_rejected() {
        let err = PipelineBuilder::new("dup")
            .stage(Arc::new(RecordingStage::new("a")))
            .unwrap()
            .stage(Arc::new(RecordingStage::new("a")))
            .unwrap_err();

        assert_eq!(err.stages, vec!["a".to_string()]);
    }

    #[test]
    fn test_stage_order_is_kept() {
        let pipeline = PipelineBuilder::new("ordered")
            .stage(Arc::new(RecordingStage::new("first")))
            .unwrap()
            .stage(Arc::new(RecordingStage::new("second")))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(pipeline.stage_names(), vec!["first", "second"]);
    }
}

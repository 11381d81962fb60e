pub mod observation_writer;

pub use observation_writer::ObservationWriter;

/// Per-dimension hints passed along with an observation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionProperty {
    Unspecified = 0,
    None = 1,
    TranslationalEquivariance = 2,
    VariableSize = 4,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ObservationType {
    #[default]
    Default = 0,
    GoalSignal = 1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSpec {
    shape: Vec<usize>,
    dimension_properties: Vec<DimensionProperty>,
    observation_type: ObservationType,
}

impl ObservationSpec {
    /// Returns `None` when shape and dimension properties disagree in rank.
    pub fn new(
        shape: Vec<usize>,
        dimension_properties: Vec<DimensionProperty>,
        observation_type: ObservationType,
    ) -> Option<Self> {
        if shape.len() != dimension_properties.len() {
            tracing::error!(
                "Observation shape rank {} does not match {} dimension properties",
                shape.len(),
                dimension_properties.len()
            );
            return None;
        }
        Some(ObservationSpec {
            shape,
            dimension_properties,
            observation_type,
        })
    }

    pub fn vector(length: usize) -> Self {
        ObservationSpec {
            shape: vec![length],
            dimension_properties: vec![DimensionProperty::None],
            observation_type: ObservationType::Default,
        }
    }

    pub fn variable_length(obs_size: usize, max_num_obs: usize) -> Self {
        ObservationSpec {
            shape: vec![obs_size, max_num_obs],
            dimension_properties: vec![DimensionProperty::VariableSize, DimensionProperty::None],
            observation_type: ObservationType::Default,
        }
    }

    pub fn visual(channels: usize, height: usize, width: usize) -> Self {
        ObservationSpec {
            shape: vec![channels, height, width],
            dimension_properties: vec![
                DimensionProperty::None,
                DimensionProperty::TranslationalEquivariance,
                DimensionProperty::TranslationalEquivariance,
            ],
            observation_type: ObservationType::Default,
        }
    }

    pub fn with_observation_type(mut self, observation_type: ObservationType) -> Self {
        self.observation_type = observation_type;
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dimension_properties(&self) -> &[DimensionProperty] {
        &self.dimension_properties
    }

    pub fn observation_type(&self) -> ObservationType {
        self.observation_type
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of floats a full observation occupies.
    pub fn num_values(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Produces one observation per step for an agent.
pub trait Sensor {
    fn observation_spec(&self) -> ObservationSpec;

    /// Writes the observation and returns the number of values written.
    fn write(&mut self, writer: &mut ObservationWriter) -> usize;

    fn update(&mut self) {}

    fn reset(&mut self) {}

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visual_spec_properties() {
        let spec = ObservationSpec::visual(3, 8, 8);

        assert_eq!(spec.rank(), 3);
        assert_eq!(spec.num_values(), 192);
        assert_eq!(spec.dimension_properties()[1], DimensionProperty::TranslationalEquivariance);
    }

    #[test]
    fn test_rank_mismatch_is_rejected() {
        let spec = ObservationSpec::new(vec![2, 2], vec![DimensionProperty::None], ObservationType::Default);

        assert!(spec.is_none());
    }
}

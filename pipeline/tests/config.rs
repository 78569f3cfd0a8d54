use fibre_pipeline::{OverflowKind, Pipeline, PipelineConfig, PushError};

#[test]
fn deserializes_from_yaml() {
  let config: PipelineConfig = serde_yaml::from_str("capacity: 2\noverflow: drop_oldest\n").unwrap();
  assert_eq!(config, PipelineConfig::new(2, OverflowKind::DropOldest));

  let pipeline = Pipeline::from_config(&config).unwrap();
  for i in 0..5 {
    pipeline.push(i).unwrap();
  }
  assert_eq!(pipeline.pull(), Some(3));
  assert_eq!(pipeline.pull(), Some(4));
}

#[test]
fn overflow_defaults_to_block() {
  let config: PipelineConfig = serde_yaml::from_str("capacity: 8").unwrap();
  assert_eq!(config.overflow, OverflowKind::Block);
}

#[test]
fn fail_policy_from_config() {
  let config: PipelineConfig = serde_yaml::from_str("capacity: 1\noverflow: fail").unwrap();
  let pipeline = Pipeline::from_config(&config).unwrap();
  pipeline.push('x').unwrap();
  assert_eq!(pipeline.push('y'), Err(PushError::Full('y')));
}

#[test]
fn rejects_unknown_fields_and_zero_capacity() {
  assert!(serde_yaml::from_str::<PipelineConfig>("capacity: 1\nsize: 4").is_err());
  let zero: PipelineConfig = serde_yaml::from_str("capacity: 0").unwrap();
  assert!(zero.validate().is_err());
  assert!(Pipeline::<u8>::from_config(&zero).is_err());
}

#[test]
fn round_trips_kind_names() {
  let rendered = serde_yaml::to_string(&PipelineConfig::new(4, OverflowKind::Fail)).unwrap();
  assert!(rendered.contains("overflow: fail"));
}

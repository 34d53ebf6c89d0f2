//! Workout export file on the home machine
//!
//! The export is either a bare array of workouts or an object with a
//! `workouts` array. Each workout may carry `date`, `name`, `completed` and
//! `durationMinutes`.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::adapters::{Configurable, LiveReadable, SnapshotCapturable};
use crate::error::AdapterError;
use crate::types::{services, FitnessConfig};

pub const KEY_WORKOUTS: &str = "fitness.workouts";
pub const KEY_SUMMARY: &str = "fitness.summary";

pub struct FitnessExport {
    path: Option<PathBuf>,
}

impl FitnessExport {
    pub fn new(config: &FitnessConfig) -> Self {
        Self {
            path: config
                .export_path
                .as_deref()
                .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned())),
        }
    }

    pub async fn workouts(&self) -> Result<Value, AdapterError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| AdapterError::NotConfigured(services::FITNESS.to_string()))?;

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AdapterError::Unreachable(format!("fitness: export not found at {}", path.display()))
            }
            _ => AdapterError::Unknown(format!("fitness: {}", e)),
        })?;

        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| AdapterError::Unknown(format!("fitness: invalid export: {}", e)))?;

        match parsed {
            Value::Array(_) => Ok(parsed),
            Value::Object(mut map) => match map.remove("workouts") {
                Some(workouts @ Value::Array(_)) => Ok(workouts),
                _ => Err(AdapterError::Unknown("fitness: export has no workouts array".to_string())),
            },
            _ => Err(AdapterError::Unknown("fitness: unexpected export shape".to_string())),
        }
    }

    pub async fn summary(&self) -> Result<Value, AdapterError> {
        Ok(summarize(&self.workouts().await?))
    }
}

impl Configurable for FitnessExport {
    fn service_name(&self) -> &str {
        services::FITNESS
    }

    fn is_configured(&self) -> bool {
        self.path.is_some()
    }
}

#[async_trait]
impl LiveReadable for FitnessExport {
    fn keys(&self) -> Vec<String> {
        vec![KEY_WORKOUTS.to_string(), KEY_SUMMARY.to_string()]
    }

    async fn read_live(&self, key: &str) -> Result<Value, AdapterError> {
        match key {
            KEY_WORKOUTS => self.workouts().await,
            KEY_SUMMARY => self.summary().await,
            other => Err(AdapterError::NoData(format!("fitness has no key {}", other))),
        }
    }
}

#[async_trait]
impl SnapshotCapturable for FitnessExport {
    async fn capture_live(&self) -> Result<Vec<(String, Value)>, AdapterError> {
        let workouts = self.workouts().await?;
        let summary = summarize(&workouts);
        Ok(vec![(KEY_WORKOUTS.to_string(), workouts), (KEY_SUMMARY.to_string(), summary)])
    }
}

/// Consistency figures over a workout list
pub fn summarize(workouts: &Value) -> Value {
    let items = workouts.as_array().map(Vec::as_slice).unwrap_or_default();
    let completed: Vec<&Value> = items
        .iter()
        .filter(|w| w.get("completed").and_then(Value::as_bool).unwrap_or(false))
        .collect();

    let minutes: u64 = completed
        .iter()
        .filter_map(|w| w.get("durationMinutes").and_then(Value::as_u64))
        .sum();
    let last_completed = completed
        .iter()
        .filter_map(|w| w.get("date").and_then(Value::as_str))
        .max();
    let rate = if items.is_empty() {
        0.0
    } else {
        completed.len() as f64 / items.len() as f64
    };

    json!({
        "totalWorkouts": items.len(),
        "completed": completed.len(),
        "completionRate": rate,
        "totalMinutes": minutes,
        "lastCompleted": last_completed,
    })
}

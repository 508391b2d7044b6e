// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};

use regex::Regex;

use crate::config::model::{ActionConfig, ConfigFile, RawConfigFile, TaskConfig};
use crate::dag::resolver::resolve_waves;
use crate::errors::{Result, WavebuildError};
use crate::types::parse_duration;
use crate::watch::patterns::InputProfile;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = WavebuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_unique_names(cfg)?;
    for task in &cfg.task {
        validate_task(task)?;
    }
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(WavebuildError::ConfigError(
            "config must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.jobs == 0 {
        return Err(WavebuildError::ConfigError(
            "[config].jobs must be >= 1 (got 0)".to_string(),
        ));
    }

    if let Some(ref timeout) = cfg.config.task_timeout {
        parse_duration(timeout).map_err(|e| {
            WavebuildError::ConfigError(format!("[config].task_timeout: {e}"))
        })?;
    }

    Ok(())
}

fn validate_unique_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();
    for task in &cfg.task {
        if task.name.trim().is_empty() {
            return Err(WavebuildError::ConfigError(
                "every [[task]] needs a non-empty `name`".to_string(),
            ));
        }
        if !seen.insert(task.name.as_str()) {
            return Err(WavebuildError::DuplicateTask(task.name.clone()));
        }
    }
    Ok(())
}

fn validate_task(task: &TaskConfig) -> Result<()> {
    let name = &task.name;

    if task.cmd.is_some() && task.action.is_some() {
        return Err(WavebuildError::ConfigError(format!(
            "task '{name}' sets both `cmd` and `action`; pick one"
        )));
    }

    if task.long_lived && !matches!(task.effective_action(), ActionConfig::Shell { .. }) {
        return Err(WavebuildError::ConfigError(format!(
            "task '{name}' is long_lived but has no shell command"
        )));
    }

    if !task.long_lived && (task.ready_on_stdout.is_some() || task.ready_after.is_some()) {
        return Err(WavebuildError::ConfigError(format!(
            "task '{name}' sets ready_on_stdout/ready_after without long_lived = true"
        )));
    }

    if let Some(ref pattern) = task.ready_on_stdout {
        Regex::new(pattern).map_err(|e| {
            WavebuildError::ConfigError(format!(
                "task '{name}' has an invalid ready_on_stdout regex: {e}"
            ))
        })?;
    }

    for (field, value) in [("timeout", &task.timeout), ("ready_after", &task.ready_after)] {
        if let Some(dur) = value {
            parse_duration(dur).map_err(|e| {
                WavebuildError::ConfigError(format!("task '{name}' {field}: {e}"))
            })?;
        }
    }

    InputProfile::new(name.clone(), &task.inputs).map_err(|e| {
        WavebuildError::ConfigError(format!("task '{name}' inputs: {e:#}"))
    })?;

    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let names: HashSet<&str> = cfg.task.iter().map(|t| t.name.as_str()).collect();

    for task in &cfg.task {
        for dep in &task.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(WavebuildError::UnknownTask {
                    name: dep.clone(),
                    required_by: Some(task.name.clone()),
                });
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    let deps: BTreeMap<String, BTreeSet<String>> = cfg
        .task
        .iter()
        .map(|t| (t.name.clone(), t.depends_on.iter().cloned().collect()))
        .collect();

    // Fails with CycleDetected (including self-dependencies).
    resolve_waves(&deps)?;
    Ok(())
}

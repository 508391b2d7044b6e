#![allow(dead_code)]

use wavebuild::config::{ActionConfig, ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use wavebuild::errors::Result;
use wavebuild::types::{FingerprintStorage, TriggerWhileRunningBehaviour};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskConfig) -> Self {
        self.config.task.push(task);
        self
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.config.config.default_task = name.to_string();
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.config.jobs = jobs;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn task_timeout(mut self, timeout: &str) -> Self {
        self.config.config.task_timeout = Some(timeout.to_string());
        self
    }

    pub fn behaviour(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.config.config.triggered_while_running_behaviour = behaviour;
        self
    }

    pub fn fingerprint_storage(mut self, storage: FingerprintStorage) -> Self {
        self.config.config.fingerprint_storage = storage;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: TaskConfig {
                name: name.to_string(),
                depends_on: vec![],
                inputs: vec![],
                outputs: vec![],
                parallel: true,
                cmd: None,
                action: None,
                timeout: None,
                report_size: false,
                long_lived: false,
                ready_on_stdout: None,
                ready_after: None,
            },
        }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.task.cmd = Some(cmd.to_string());
        self
    }

    pub fn action(mut self, action: ActionConfig) -> Self {
        self.task.action = Some(action);
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.task.depends_on.push(dep.to_string());
        self
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.push(pattern.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.outputs.push(path.to_string());
        self
    }

    pub fn parallel(mut self, val: bool) -> Self {
        self.task.parallel = val;
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.task.timeout = Some(duration.to_string());
        self
    }

    pub fn report_size(mut self, val: bool) -> Self {
        self.task.report_size = val;
        self
    }

    pub fn long_lived(mut self, val: bool) -> Self {
        self.task.long_lived = val;
        self
    }

    pub fn ready_on_stdout(mut self, pattern: &str) -> Self {
        self.task.ready_on_stdout = Some(pattern.to_string());
        self
    }

    pub fn ready_after(mut self, duration: &str) -> Self {
        self.task.ready_after = Some(duration.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

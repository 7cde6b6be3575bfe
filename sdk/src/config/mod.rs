//! Configuration for the in-process engine
//!
//! Workflow and task execution each have presets for common cases. The
//! [`EngineConfig`] bundles them together with update behaviour.

use std::time::Duration;

/// Configuration for workflow task dispatch
#[derive(Debug, Clone)]
pub struct WorkflowExecutorConfig {
    /// Maximum number of workflow tasks executing concurrently
    pub max_concurrent: usize,
    /// Capacity of the dispatcher's ready queue
    pub queue_size: usize,
}

impl Default for WorkflowExecutorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl WorkflowExecutorConfig {
    pub const DEFAULT: Self = Self {
        max_concurrent: 10,
        queue_size: 100,
    };

    /// Many short workflows
    pub const HIGH_THROUGHPUT: Self = Self {
        max_concurrent: 50,
        queue_size: 500,
    };

    /// Tests and small hosts
    pub const LOW_RESOURCE: Self = Self {
        max_concurrent: 2,
        queue_size: 20,
    };

    /// Validated constructor
    pub fn new(max_concurrent: usize, queue_size: usize) -> Result<Self, ConfigError> {
        let config = Self {
            max_concurrent,
            queue_size,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require(self.max_concurrent > 0, "max_concurrent must be positive")?;
        require(self.queue_size > 0, "queue_size must be positive")
    }
}

/// Configuration for task execution
#[derive(Debug, Clone)]
pub struct TaskExecutorConfig {
    /// Maximum number of tasks executing concurrently
    pub max_concurrent: usize,
    /// Timeout for a single task attempt
    pub default_timeout: Duration,
    /// Maximum number of attempts when a task has no retry config of its own
    pub max_retries: u32,
    /// Backoff before the first retry
    pub initial_backoff: Duration,
}

impl Default for TaskExecutorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TaskExecutorConfig {
    pub const DEFAULT: Self = Self {
        max_concurrent: 20,
        default_timeout: Duration::from_secs(600),
        max_retries: 3,
        initial_backoff: Duration::from_secs(1),
    };

    pub const HIGH_THROUGHPUT: Self = Self {
        max_concurrent: 100,
        default_timeout: Duration::from_secs(300),
        max_retries: 2,
        initial_backoff: Duration::from_millis(500),
    };

    pub const LOW_RESOURCE: Self = Self {
        max_concurrent: 5,
        default_timeout: Duration::from_secs(600),
        max_retries: 3,
        initial_backoff: Duration::from_secs(2),
    };

    /// Validated constructor. A zero `initial_backoff` retries immediately.
    pub fn new(
        max_concurrent: usize,
        default_timeout: Duration,
        max_retries: u32,
        initial_backoff: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            max_concurrent,
            default_timeout,
            max_retries,
            initial_backoff,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require(self.max_concurrent > 0, "max_concurrent must be positive")?;
        require(!self.default_timeout.is_zero(), "default_timeout must be positive")?;
        require(self.max_retries > 0, "max_retries must be at least 1")
    }
}

/// Complete configuration for the workflow engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Configuration for workflow task dispatch
    pub workflow_config: WorkflowExecutorConfig,
    /// Configuration for task execution
    pub task_config: TaskExecutorConfig,
    /// How long `execute_update` waits for an outcome
    pub update_timeout: Duration,
    /// Check replayed calls against history and fail on mismatch
    pub enable_determinism_validation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_config: WorkflowExecutorConfig::DEFAULT,
            task_config: TaskExecutorConfig::DEFAULT,
            update_timeout: Duration::from_secs(30),
            enable_determinism_validation: true,
        }
    }
}

impl EngineConfig {
    /// High-throughput configuration for production workloads
    pub fn high_throughput() -> Self {
        Self {
            workflow_config: WorkflowExecutorConfig::HIGH_THROUGHPUT,
            task_config: TaskExecutorConfig::HIGH_THROUGHPUT,
            ..Self::default()
        }
    }

    /// Low-resource configuration for development or constrained environments
    pub fn low_resource() -> Self {
        Self {
            workflow_config: WorkflowExecutorConfig::LOW_RESOURCE,
            task_config: TaskExecutorConfig::LOW_RESOURCE,
            ..Self::default()
        }
    }

    pub fn with_workflow_config(mut self, config: WorkflowExecutorConfig) -> Self {
        self.workflow_config = config;
        self
    }

    pub fn with_task_config(mut self, config: TaskExecutorConfig) -> Self {
        self.task_config = config;
        self
    }

    /// Set the update wait timeout
    pub fn with_update_timeout(mut self, timeout: Duration) -> Self {
        self.update_timeout = timeout;
        self
    }

    /// Enable or disable replay validation
    pub fn with_determinism_validation(mut self, enabled: bool) -> Self {
        self.enable_determinism_validation = enabled;
        self
    }

    /// Check every nested value
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.workflow_config.validate()?;
        self.task_config.validate()?;
        require(!self.update_timeout.is_zero(), "update_timeout must be positive")
    }
}

fn require(ok: bool, message: &str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(message.to_string()))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<ConfigError> for crate::error::CairnError {
    fn from(err: ConfigError) -> Self {
        crate::error::CairnError::InvalidConfiguration(err.to_string())
    }
}

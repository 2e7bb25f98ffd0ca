use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MdResult<T> = Result<T, MdError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MdErrorCategory {
    Environment,
    Config,
    TopologyGeneration,
    Compile,
    Simulation,
    TrajectoryExtraction,
    Extraction,
    Format,
    IoSystem,
    Internal,
}

impl MdErrorCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Environment => "EnvironmentError",
            Self::Config => "ConfigError",
            Self::TopologyGeneration => "TopologyGenerationError",
            Self::Compile => "CompileError",
            Self::Simulation => "SimulationError",
            Self::TrajectoryExtraction => "TrajectoryExtractionError",
            Self::Extraction => "ExtractionError",
            Self::Format => "FormatError",
            Self::IoSystem => "IoSystemError",
            Self::Internal => "InternalError",
        }
    }

    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Config | Self::Format => 2,
            Self::Environment | Self::IoSystem => 3,
            Self::TopologyGeneration
            | Self::Compile
            | Self::Simulation
            | Self::TrajectoryExtraction
            | Self::Extraction => 4,
            Self::Internal => 5,
        }
    }

    pub const fn is_stage_failure(self) -> bool {
        matches!(
            self,
            Self::TopologyGeneration
                | Self::Compile
                | Self::Simulation
                | Self::TrajectoryExtraction
                | Self::Extraction
        )
    }
}

/// Pipeline error carrying a stable placeholder code and, for external-tool
/// failures, the tool's captured combined stdout/stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdError {
    category: MdErrorCategory,
    placeholder: &'static str,
    message: String,
    diagnostic: Option<String>,
}

impl MdError {
    pub fn new(
        category: MdErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn environment(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MdErrorCategory::Environment, placeholder, message)
    }

    pub fn config(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MdErrorCategory::Config, placeholder, message)
    }

    pub fn format(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MdErrorCategory::Format, placeholder, message)
    }

    pub fn io_system(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MdErrorCategory::IoSystem, placeholder, message)
    }

    pub fn internal(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(MdErrorCategory::Internal, placeholder, message)
    }

    /// Stage-level failure with the external tool's combined output attached.
    pub fn stage(
        category: MdErrorCategory,
        placeholder: &'static str,
        message: impl Into<String>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self {
            category,
            placeholder,
            message: message.into(),
            diagnostic: Some(diagnostic.into()),
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub const fn category(&self) -> MdErrorCategory {
        self.category
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for MdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.category.label(),
            self.placeholder,
            self.message
        )?;
        if let Some(diagnostic) = &self.diagnostic {
            if !diagnostic.is_empty() {
                write!(f, "\n--- tool output ---\n{}", diagnostic)?;
            }
        }
        Ok(())
    }
}

impl Error for MdError {}

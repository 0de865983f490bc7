//! Test configuration passed explicitly to generators and drivers.

use crate::error::ConfigError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Selects the test length of the current run.
pub const TEST_LENGTH_ENV: &str = "SON_TRACE_TEST_LENGTH";

/// In-memory kyoto tycoon database used when nothing else is configured.
pub const DEFAULT_DATABASE_CONF: &str = r#"<st_kv_database_conf type="kyoto_tycoon"><kyoto_tycoon in_memory="1" port="1978" snapshot="0"/></st_kv_database_conf>"#;

/// Job execution backend handed to the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchSystem {
    #[default]
    SingleMachine,
    Parasol,
    GridEngine,
}

impl BatchSystem {
    pub fn name(self) -> &'static str {
        match self {
            BatchSystem::SingleMachine => "singleMachine",
            BatchSystem::Parasol => "parasol",
            BatchSystem::GridEngine => "gridEngine",
        }
    }
}

impl FromStr for BatchSystem {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "singleMachine" => Ok(BatchSystem::SingleMachine),
            "parasol" => Ok(BatchSystem::Parasol),
            "gridEngine" => Ok(BatchSystem::GridEngine),
            other => Err(ConfigError::UnknownBatchSystem(other.to_string())),
        }
    }
}

impl fmt::Display for BatchSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A well-formed XML fragment describing the workflow's key-value database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConf(String);

impl DatabaseConf {
    /// Parse and validate `xml`: it must hold exactly one root element.
    pub fn parse(xml: &str) -> Result<Self, ConfigError> {
        let malformed = |msg: String| ConfigError::MalformedDatabaseConf(msg);
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut depth = 0usize;
        let mut roots = 0usize;
        loop {
            match reader.read_event() {
                Ok(Event::Start(_)) => {
                    if depth == 0 {
                        roots += 1;
                    }
                    depth += 1;
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Empty(_)) => {
                    if depth == 0 {
                        roots += 1;
                    }
                }
                Ok(Event::Text(_)) if depth == 0 => {
                    return Err(malformed("text outside the root element".to_string()))
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed(e.to_string())),
            }
        }
        if depth != 0 {
            return Err(malformed("unclosed element".to_string()));
        }
        if roots != 1 {
            return Err(malformed(format!("expected one root element, found {roots}")));
        }
        Ok(DatabaseConf(xml.trim().to_string()))
    }

    pub fn as_xml(&self) -> &str {
        &self.0
    }
}

impl Default for DatabaseConf {
    fn default() -> Self {
        DatabaseConf(DEFAULT_DATABASE_CONF.to_string())
    }
}

/// Test length classification, ordered from shortest to longest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TestSize {
    #[default]
    Short,
    Medium,
    Long,
    VeryLong,
}

impl TestSize {
    pub const ALL: [TestSize; 4] = [
        TestSize::Short,
        TestSize::Medium,
        TestSize::Long,
        TestSize::VeryLong,
    ];

    /// Read [`TEST_LENGTH_ENV`]; unset means [`TestSize::Short`].
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(TEST_LENGTH_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(TestSize::Short),
        }
    }
}

impl FromStr for TestSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "SHORT" => Ok(TestSize::Short),
            "MEDIUM" => Ok(TestSize::Medium),
            "LONG" => Ok(TestSize::Long),
            "VERY_LONG" | "VERYLONG" => Ok(TestSize::VeryLong),
            _ => Err(ConfigError::UnknownTestSize(s.to_string())),
        }
    }
}

/// Everything a test run shares across fixtures and workflow invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfig {
    pub batch_system: BatchSystem,
    /// `None` leaves the database choice to the workflow's own config.
    pub database_conf: Option<DatabaseConf>,
    pub test_size: TestSize,
}

impl Default for TestConfig {
    fn default() -> Self {
        TestConfig {
            batch_system: BatchSystem::default(),
            database_conf: Some(DatabaseConf::default()),
            test_size: TestSize::default(),
        }
    }
}

impl TestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(TestConfig {
            test_size: TestSize::from_env()?,
            ..TestConfig::default()
        })
    }

    /// Replace the batch system by name. Unknown names are rejected and
    /// leave the config untouched.
    pub fn with_batch_system(mut self, name: &str) -> Result<Self, ConfigError> {
        self.batch_system = name.parse()?;
        Ok(self)
    }

    pub fn with_database_conf(mut self, xml: Option<&str>) -> Result<Self, ConfigError> {
        self.database_conf = xml.map(DatabaseConf::parse).transpose()?;
        Ok(self)
    }
}

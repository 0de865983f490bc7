//! Experiment descriptor handed to the workflow engine.

use crate::config::{DatabaseConf, TestConfig};
use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs;
use std::path::{Path, PathBuf};

pub const HAL_FILE_NAME: &str = "test.hal";
pub const FASTA_FILE_NAME: &str = "test.fa";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentDescriptor {
    pub sequences: Vec<PathBuf>,
    pub species_tree: String,
    pub output_dir: PathBuf,
    pub database_conf: Option<DatabaseConf>,
    /// Workflow config file; the engine's default config when `None`.
    pub config_file: Option<PathBuf>,
    pub hal_file: PathBuf,
    pub fasta_file: PathBuf,
    pub constraints: Option<PathBuf>,
    pub progressive: bool,
}

impl ExperimentDescriptor {
    /// Descriptor for a test run writing its HAL and FASTA output into
    /// `output_dir`, using the database conf of `config` if it has one.
    pub fn for_test(
        sequences: &[PathBuf],
        species_tree: &str,
        output_dir: &Path,
        config: &TestConfig,
        config_file: Option<&Path>,
        constraints: Option<&Path>,
        progressive: bool,
    ) -> Self {
        ExperimentDescriptor {
            sequences: sequences.to_vec(),
            species_tree: species_tree.trim().to_string(),
            output_dir: output_dir.to_path_buf(),
            database_conf: config.database_conf.clone(),
            config_file: config_file.map(Path::to_path_buf),
            hal_file: output_dir.join(HAL_FILE_NAME),
            fasta_file: output_dir.join(FASTA_FILE_NAME),
            constraints: constraints.map(Path::to_path_buf),
            progressive,
        }
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        let sequences = self
            .sequences
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let config = self
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "default".to_string());

        let mut root = BytesStart::new("cactus_workflow_experiment");
        root.push_attribute(("sequences", sequences.as_str()));
        root.push_attribute(("species_tree", self.species_tree.as_str()));
        root.push_attribute(("config", config.as_str()));
        root.push_attribute(("progressive", if self.progressive { "1" } else { "0" }));
        if let Some(constraints) = &self.constraints {
            root.push_attribute(("constraints", constraints.display().to_string().as_str()));
        }
        writer.write_event(Event::Start(root))?;

        if let Some(conf) = &self.database_conf {
            writer.write_event(Event::Start(BytesStart::new("cactus_disk")))?;
            // already validated XML, embedded verbatim
            writer.write_event(Event::Text(BytesText::from_escaped(conf.as_xml())))?;
            writer.write_event(Event::End(BytesEnd::new("cactus_disk")))?;
        }

        let mut output = BytesStart::new("output");
        output.push_attribute(("dir", self.output_dir.display().to_string().as_str()));
        output.push_attribute(("halPath", self.hal_file.display().to_string().as_str()));
        output.push_attribute(("fastaPath", self.fasta_file.display().to_string().as_str()));
        writer.write_event(Event::Empty(output))?;

        writer.write_event(Event::End(BytesEnd::new("cactus_workflow_experiment")))?;

        let mut xml = String::from_utf8(writer.into_inner())
            .context("Experiment XML is not valid UTF-8")?;
        xml.push('\n');
        Ok(xml)
    }

    pub fn write_xml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_xml()?)
            .with_context(|| format!("Failed to write experiment file: {}", path.display()))
    }
}

use crate::config::CompilerConfiguration;
use serde_valid::Validate;
use serde_valid::validation::{Error, Errors};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Failed to read configuration: {0}")]
    Error(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] Errors<Error>),
}

pub fn read_configuration(reader: impl Read) -> Result<CompilerConfiguration, ReadError> {
    let configuration = serde_yaml::from_reader::<_, CompilerConfiguration>(reader)?;

    configuration
        .validate()
        .map(|()| configuration)
        .map_err(ReadError::InvalidConfiguration)
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Failed to write configuration: {0}")]
    Error(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] Errors<Error>),
}

pub fn write_configuration(
    config: &CompilerConfiguration,
    writer: impl Write,
) -> Result<(), WriteError> {
    config
        .validate()
        .map_err(WriteError::InvalidConfiguration)?;

    serde_yaml::to_writer(writer, config)?;
    Ok(())
}

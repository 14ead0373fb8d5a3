use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("Unable to open key file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed key file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Key file contains no keys")]
    Empty,
}

/// Lookup keys read from the first column of a CSV file with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySource {
    keys: Vec<String>,
}

impl KeySource {
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, KeySourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| KeySourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let source = Self::from_reader(file)?;
        debug!("Read {} keys from {}", source.len(), path.display());
        Ok(source)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, KeySourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut keys = Vec::new();
        for record in reader.records() {
            let record = record?;
            match record.get(0) {
                Some(key) if !key.is_empty() => keys.push(key.to_string()),
                _ => {}
            }
        }

        if keys.is_empty() {
            return Err(KeySourceError::Empty);
        }

        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }
}

impl From<Vec<String>> for KeySource {
    fn from(keys: Vec<String>) -> Self {
        Self { keys }
    }
}

use anyhow::Result;
use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

/// Output layout chosen from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
    Tsv,
}

impl OutputFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(OutputFormat::Json),
            Some("csv") => Ok(OutputFormat::Csv),
            Some("tsv") => Ok(OutputFormat::Tsv),
            _ => anyhow::bail!(
                "Output file must have a .json, .csv or .tsv extension: {}",
                path.as_ref().display()
            ),
        }
    }
}

pub fn validate_tsv_or_csv_file(path: &str) -> Result<()> {
    let pb = PathBuf::from(path);

    let ext = pb
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") => {}
        _ => anyhow::bail!("File must have a .tsv or .csv extension: {}", path),
    }

    if !pb.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }

    Ok(())
}

pub fn validate_directory(path: &str) -> Result<()> {
    if path.is_empty() || !Path::new(path).is_dir() {
        anyhow::bail!("Directory does not exist: {}", path);
    }
    Ok(())
}

pub fn write_bytes_to_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path.as_ref())?;
    file.write_all(bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_follows_extension() {
        assert_eq!(OutputFormat::from_path("out.JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_path("out.tsv").unwrap(), OutputFormat::Tsv);
        assert!(OutputFormat::from_path("out.xlsx").is_err());
    }

    #[test]
    fn rejects_wrong_extension_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("soil.txt");
        std::fs::write(&txt, "").unwrap();
        assert!(validate_tsv_or_csv_file(txt.to_str().unwrap()).is_err());

        let missing = dir.path().join("soil.csv");
        let err = validate_tsv_or_csv_file(missing.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}

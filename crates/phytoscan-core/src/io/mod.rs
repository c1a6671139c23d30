//! Soil CSV/TSV reader and a directory-backed image source.
use std::path::{Path, PathBuf};

use csv::StringRecord;
use image::DynamicImage;

use crate::data_handling::ImageSource;
use crate::descriptor::load_image;
use crate::error::{PhytoError, Result};
use crate::soil::{default_image_key, SoilFeature, SoilTable, TARGET_CLASS};

/// Column holding the image key of each record.
pub const IMAGE_COLUMN: &str = "image";

/// File extensions treated as images when expanding directories.
pub const IMAGE_EXTENSIONS: [&str; 8] =
    ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Read a soil table. Tab delimited for `.tsv`/`.txt`, comma otherwise.
///
/// Every soil column must be present; unknown columns are ignored. Without
/// an `image` column, row `i` is keyed by [`default_image_key`]. The label
/// column is optional here so that unlabelled tables can still be read.
pub fn read_soil_csv<P: AsRef<Path>>(path: P) -> Result<SoilTable> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;

    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();

    let mut feature_idx = Vec::with_capacity(SoilFeature::ALL.len());
    for feature in SoilFeature::ALL {
        let idx = find_column(&headers, feature.name()).ok_or_else(|| {
            PhytoError::Configuration(format!(
                "{}: missing soil column '{}'",
                path.display(),
                feature.name()
            ))
        })?;
        feature_idx.push(idx);
    }
    let image_idx = find_column(&headers, IMAGE_COLUMN);
    let label_idx = find_column(&headers, TARGET_CLASS);

    let mut keys = Vec::new();
    let mut columns: Vec<Vec<f32>> = vec![Vec::new(); feature_idx.len()];
    let mut labels = label_idx.map(|_| Vec::new());

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| csv_error(path, e))?;

        let key = match image_idx.and_then(|idx| record.get(idx)) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => default_image_key(row_idx),
        };
        keys.push(key);

        let targets = feature_idx.iter().zip(SoilFeature::ALL);
        for (column, (&idx, feature)) in columns.iter_mut().zip(targets) {
            let raw = record.get(idx).unwrap_or_default();
            let value = raw.parse::<f32>().map_err(|_| {
                PhytoError::Configuration(format!(
                    "{}: invalid value '{}' for column '{}' at row {}",
                    path.display(),
                    raw,
                    feature.name(),
                    row_idx + 1
                ))
            })?;
            column.push(value);
        }

        if let (Some(labels), Some(idx)) = (labels.as_mut(), label_idx) {
            labels.push(record.get(idx).unwrap_or_default().to_string());
        }
    }

    log::debug!("Read {} soil records from {}", keys.len(), path.display());

    let columns = SoilFeature::ALL
        .iter()
        .map(|f| f.name().to_string())
        .zip(columns)
        .collect();
    SoilTable::new(keys, columns, labels)
}

fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") || ext.eq_ignore_ascii_case("txt") => b'\t',
        _ => b',',
    }
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}

fn csv_error(path: &Path, e: csv::Error) -> PhytoError {
    if e.is_io_error() {
        PhytoError::Io(format!("{}: {}", path.display(), e))
    } else {
        PhytoError::Configuration(format!("{}: {}", path.display(), e))
    }
}

/// Images stored as files under one directory, looked up by record key.
#[derive(Debug, Clone)]
pub struct ImageDir {
    root: PathBuf,
}

impl ImageDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PhytoError::Configuration(format!(
                "image directory {} does not exist",
                root.display()
            )));
        }
        Ok(ImageDir { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageSource for ImageDir {
    fn load(&self, key: &str) -> Option<Result<DynamicImage>> {
        let path = self.root.join(key);
        if !path.is_file() {
            return None;
        }
        Some(load_image(path))
    }
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Expand a mix of image files and directories into image files. Directory
/// entries are sorted by path; explicit files are kept as given.
pub fn collect_image_paths<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_path(p))
                .collect();
            found.sort();
            log::debug!("{} images found in {}", found.len(), input.display());
            paths.extend(found);
        } else {
            paths.push(input.to_path_buf());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn header() -> String {
        SoilFeature::names().join(",")
    }

    #[test]
    fn reads_keys_from_image_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soil.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "image,{},disease_type", header()).unwrap();
        writeln!(f, "leaf_a.png,1,2,3,4,5,6,7,8,9,0.1,1.2,Rust").unwrap();
        writeln!(f, "leaf_b.png,1,2,3,4,5,6,7,8,9,0.2,1.3,Healthy").unwrap();
        drop(f);

        let records = read_soil_csv(&path).unwrap().records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "leaf_a.png");
        assert_eq!(records[1].disease_type, "Healthy");
        assert_eq!(records[0].values.get(SoilFeature::SoilPh), 2.0);
    }

    #[test]
    fn default_keys_and_tab_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soil.tsv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{}\tdisease_type", SoilFeature::names().join("\t")).unwrap();
        writeln!(f, "1\t2\t3\t4\t5\t6\t7\t8\t9\t0.1\t1.2\tRust").unwrap();
        drop(f);

        let records = read_soil_csv(&path).unwrap().records().unwrap();
        assert_eq!(records[0].key, "img_0001.png");
    }

    #[test]
    fn missing_column_is_named() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soil.csv");
        let cols: Vec<String> = SoilFeature::names()
            .into_iter()
            .filter(|n| n != "nitrogen")
            .collect();
        std::fs::write(&path, format!("{},disease_type\n", cols.join(","))).unwrap();

        let err = read_soil_csv(&path).unwrap_err();
        assert!(matches!(err, PhytoError::Configuration(_)));
        assert!(err.to_string().contains("nitrogen"), "{}", err);
    }

    #[test]
    fn bad_number_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soil.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "{},disease_type", header()).unwrap();
        writeln!(f, "1,wet,3,4,5,6,7,8,9,0.1,1.2,Rust").unwrap();
        drop(f);

        let err = read_soil_csv(&path).unwrap_err();
        assert!(err.to_string().contains("soil_pH"), "{}", err);
    }

    #[test]
    fn image_dir_distinguishes_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let source = ImageDir::new(dir.path()).unwrap();
        assert!(source.load("absent.png").is_none());
        assert!(matches!(source.load("broken.png"), Some(Err(PhytoError::Input(_)))));
    }

    #[test]
    fn directories_expand_to_sorted_images() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let paths = collect_image_paths(&[dir.path()]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
    }
}

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use image::{Rgb, RgbImage};
use predicates::prelude::*;

fn phytoscan() -> Command {
    Command::cargo_bin("phytoscan").unwrap()
}

fn write_leaf(path: &Path, seed: u32, spotted: bool) {
    let img = RgbImage::from_fn(48, 48, |x, y| {
        if spotted && ((x / 6 + y / 6 + seed) % 3) == 0 {
            Rgb([115, 62, 22])
        } else {
            let shade = ((x + y + seed) % 13) as u8;
            Rgb([30 + shade, 165 + shade, 35])
        }
    });
    img.save(path).unwrap();
}

/// Six healthy and six spotted leaves plus a soil CSV keyed by file name.
fn write_dataset(root: &Path) {
    let images = root.join("images");
    fs::create_dir_all(&images).unwrap();
    let mut csv = String::from(
        "image,soil_moisture,soil_pH,soil_temperature,nitrogen,phosphorus,potassium,\
         mean_green_intensity,color_variance,texture_entropy,spot_area_ratio,\
         disease_color_index,disease_type\n",
    );
    for i in 0..6u32 {
        for (label, spotted) in [("Healthy", false), ("Blight", true)] {
            let name = format!("{}_{}.png", label.to_lowercase(), i);
            write_leaf(&images.join(&name), i, spotted);
            let (spot, dci) = if spotted { (0.33, 1.8) } else { (0.45, 0.2) };
            csv.push_str(&format!(
                "{},{},6.5,21,40,18,150,170,900,5.5,{},{},{}\n",
                name,
                30 + i,
                spot,
                dci,
                label
            ));
        }
    }
    fs::write(root.join("soil.csv"), csv).unwrap();
    fs::write(
        root.join("train.json"),
        r#"{
            "trainer": {
                "classifier": {
                    "num_boost_round": 10,
                    "max_depth": 3,
                    "min_leaf_size": 1,
                    "data_sample_ratio": 1.0
                },
                "regressor": {"num_boost_round": 10, "max_depth": 2, "min_leaf_size": 1}
            }
        }"#,
    )
    .unwrap();
}

#[test]
fn train_without_config_prints_template() {
    phytoscan()
        .arg("train")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"soil_data\""))
        .stderr(predicate::str::contains("No config file provided"));
}

#[test]
fn extract_prints_descriptor_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leaf.png");
    write_leaf(&path, 0, true);

    phytoscan()
        .arg("extract")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("mean_green_intensity"))
        .stdout(predicate::str::contains("\"descriptor\""));
}

#[test]
fn extract_rejects_corrupt_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("leaf.png");
    fs::write(&path, b"definitely not a png").unwrap();

    phytoscan().arg("extract").arg(&path).assert().failure();
}

#[test]
fn predict_without_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("leaf.png");
    write_leaf(&image, 1, false);

    phytoscan()
        .args(["predict", "-m"])
        .arg(dir.path().join("no_model"))
        .arg("-i")
        .arg(&image)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Model not loaded"));
}

#[test]
fn train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_dataset(root);
    let model = root.join("model");

    phytoscan()
        .arg("train")
        .arg(root.join("train.json"))
        .arg("-d")
        .arg(root.join("soil.csv"))
        .arg("-i")
        .arg(root.join("images"))
        .arg("-o")
        .arg(&model)
        .arg("--report")
        .arg(root.join("report.html"))
        .assert()
        .success();

    assert!(model.join("manifest.json").is_file());
    assert!(root.join("report.html").is_file());

    fs::write(root.join("images").join("broken.png"), b"garbage").unwrap();
    let output = root.join("predictions.tsv");
    phytoscan()
        .arg("predict")
        .arg("-m")
        .arg(&model)
        .arg("-i")
        .arg(root.join("images"))
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1 + 13, "{}", text);
    assert!(lines[0].starts_with("image\tdisease_type\tconfidence"));
    let broken = lines.iter().find(|l| l.contains("broken.png")).unwrap();
    assert!(broken.contains("InputError"), "{}", broken);

    phytoscan()
        .arg("predict")
        .arg("-m")
        .arg(&model)
        .arg("-i")
        .arg(root.join("images").join("healthy_0.png"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"health_score\""));
}

//! Combined classifier input: scaled image descriptor followed by the scaled
//! tabular row. Training and inference both build rows through [`combine`]
//! so the column order cannot drift between them.
use crate::descriptor::DESCRIPTOR_LEN;
use crate::error::{PhytoError, Result};
use crate::math::Array2;
use crate::soil::NUM_SOIL_FEATURES;

pub const COMBINED_LEN: usize = DESCRIPTOR_LEN + NUM_SOIL_FEATURES;

/// Column names of the image scaler: `img_000` .. `img_134`.
pub fn image_column_names() -> Vec<String> {
    (0..DESCRIPTOR_LEN).map(|i| format!("img_{:03}", i)).collect()
}

/// `[image (135) | tabular (11)]`.
pub fn combine(image_scaled: &[f32], tabular_scaled: &[f32]) -> Result<Vec<f32>> {
    if image_scaled.len() != DESCRIPTOR_LEN || tabular_scaled.len() != NUM_SOIL_FEATURES {
        return Err(PhytoError::Configuration(format!(
            "combined features expect {} image + {} tabular values, got {} + {}",
            DESCRIPTOR_LEN,
            NUM_SOIL_FEATURES,
            image_scaled.len(),
            tabular_scaled.len()
        )));
    }
    let mut row = Vec::with_capacity(COMBINED_LEN);
    row.extend_from_slice(image_scaled);
    row.extend_from_slice(tabular_scaled);
    Ok(row)
}

/// Row-wise [`combine`] over two aligned matrices.
pub fn combine_matrix(
    image_scaled: &Array2<f32>,
    tabular_scaled: &Array2<f32>,
) -> Result<Array2<f32>> {
    if image_scaled.ncols() != DESCRIPTOR_LEN || tabular_scaled.ncols() != NUM_SOIL_FEATURES {
        return Err(PhytoError::Configuration(format!(
            "combined features expect {} image + {} tabular columns, got {} + {}",
            DESCRIPTOR_LEN,
            NUM_SOIL_FEATURES,
            image_scaled.ncols(),
            tabular_scaled.ncols()
        )));
    }
    image_scaled
        .hstack(tabular_scaled)
        .map_err(|e| PhytoError::Configuration(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_block_comes_first() {
        let img: Vec<f32> = (0..DESCRIPTOR_LEN).map(|i| i as f32).collect();
        let tab = vec![-1.0f32; NUM_SOIL_FEATURES];
        let row = combine(&img, &tab).unwrap();
        assert_eq!(row.len(), 146);
        assert_eq!(row[134], 134.0);
        assert_eq!(row[135], -1.0);
    }

    #[test]
    fn wrong_widths_are_rejected() {
        assert!(combine(&[0.0; 3], &[0.0; NUM_SOIL_FEATURES]).is_err());
        let img = Array2::from_shape_vec((1, 2), vec![0.0f32, 0.0]).unwrap();
        let tab =
            Array2::from_shape_vec((1, NUM_SOIL_FEATURES), vec![0.0f32; NUM_SOIL_FEATURES])
                .unwrap();
        assert!(combine_matrix(&img, &tab).is_err());
    }

    #[test]
    fn column_names_are_zero_padded() {
        let names = image_column_names();
        assert_eq!(names.len(), DESCRIPTOR_LEN);
        assert_eq!(names[0], "img_000");
        assert_eq!(names[134], "img_134");
    }
}

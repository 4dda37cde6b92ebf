//! # Label Encoders

use crate::error::Error;

/// One-hot encode integer class labels.
///
/// # Arguments
///
/// - `labels`: class indices, each in ``[0, num_classes)``.
/// - `num_classes`: the width of each encoded row.
///
/// # Returns
///
/// A row-major ``[labels.len(), num_classes]`` buffer.
pub fn one_hot(
    labels: &[u8],
    num_classes: usize,
) -> Result<Vec<f32>, Error> {
    let mut encoded = vec![0.0; labels.len() * num_classes];
    for (row, &label) in labels.iter().enumerate() {
        let label = label as usize;
        if label >= num_classes {
            return Err(Error::LabelOutOfRange { label, num_classes });
        }
        encoded[row * num_classes + label] = 1.0;
    }
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_hot() {
        let encoded = one_hot(&[2, 0, 1], 3).unwrap();
        assert_eq!(
            encoded,
            vec![
                0.0, 0.0, 1.0, //
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0,
            ]
        );
    }

    #[test]
    fn test_one_hot_out_of_range() {
        let err = one_hot(&[0, 10], 10).unwrap_err();
        assert!(matches!(
            err,
            Error::LabelOutOfRange {
                label: 10,
                num_classes: 10
            }
        ));
    }
}

use burn::tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor};

/// Build a [rows, seq_length] token tensor, padding short rows with `pad_token` and cutting
/// long ones
pub fn pad_to<B: Backend>(
    pad_token: usize,
    tokens_list: Vec<Vec<usize>>,
    seq_length: usize,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let batch_size = tokens_list.len();
    let pad: B::IntElem = (pad_token as i64).elem();
    let mut values: Vec<B::IntElem> = Vec::with_capacity(batch_size * seq_length);

    for tokens in tokens_list {
        let kept = tokens.len().min(seq_length);

        values.extend(
            tokens
                .into_iter()
                .take(kept)
                .map(|t| (t as i64).elem::<B::IntElem>()),
        );
        values.extend((kept..seq_length).map(|_| pad));
    }

    Tensor::from_data(
        Data::<B::IntElem, 2>::new(values, Shape::new([batch_size, seq_length])),
        device,
    )
}

/// Build a [rows] tensor of class ids
pub fn class_ids<B: Backend>(ids: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    Tensor::from_data(
        Data::<B::IntElem, 1>::new(
            ids.iter().map(|&id| (id as i64).elem::<B::IntElem>()).collect(),
            Shape::new([ids.len()]),
        ),
        device,
    )
}

/// Read an integer tensor back into plain indices
pub fn to_indices<B: Backend, const D: usize>(tensor: Tensor<B, D, Int>) -> Vec<usize> {
    tensor
        .into_data()
        .convert::<i64>()
        .value
        .into_iter()
        .map(|value| value as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_pad_to_pads_and_truncates() {
        let tensor = pad_to::<TestBackend>(
            0,
            vec![vec![4, 5], vec![1, 2, 3, 4, 5]],
            3,
            &Default::default(),
        );

        assert_eq!(tensor.dims(), [2, 3]);
        assert_eq!(to_indices(tensor), vec![4, 5, 0, 1, 2, 3]);
    }

    #[test]
    fn test_class_ids() {
        let tensor = class_ids::<TestBackend>(&[2, 0, 1], &Default::default());

        assert_eq!(to_indices(tensor), vec![2, 0, 1]);
    }
}

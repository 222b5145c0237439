use derive_new::new;

/// A fixed-length token id sequence with its class index
#[derive(Clone, Debug, PartialEq, Eq, new)]
pub struct Example {
    /// Token ids, padded to the corpus sequence length
    pub tokens: Vec<usize>,

    /// Class index in `0..n_classes`
    pub label: usize,
}

impl Example {
    /// The label as a one-hot vector of length `n_classes`
    pub fn one_hot(&self, n_classes: usize) -> Vec<f32> {
        let mut vector = vec![0.0; n_classes];

        if let Some(value) = vector.get_mut(self.label) {
            *value = 1.0;
        }

        vector
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_one_hot() {
        let example = Example::new(vec![2, 3], 1);

        assert_eq!(example.one_hot(3), vec![0.0, 1.0, 0.0]);
    }
}

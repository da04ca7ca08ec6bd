use ndarray::{ArrayView1, ArrayView2, Axis};

fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_at, best), (i, &v)| {
            if v > best { (i, v) } else { (best_at, best) }
        })
        .0
}

/// Counts the rows whose highest prediction matches the hot label.
pub fn count_correct(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> usize {
    y_pred
        .axis_iter(Axis(0))
        .zip(y.axis_iter(Axis(0)))
        .filter(|(pred, label)| argmax(*pred) == argmax(*label))
        .count()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn counts_matching_argmax() {
        let y_pred = array![[0.1, 0.7, 0.2], [0.9, 0.05, 0.05], [0.2, 0.3, 0.5]];
        let y = array![[0., 1., 0.], [0., 0., 1.], [0., 0., 1.]];

        assert_eq!(count_correct(y_pred.view(), y.view()), 2);
    }
}

use inclearn_core::tensor::Error;
use log::warn;

/// Accuracy over a whole evaluation set and over consecutive windows of
/// `task_size` classes.
#[derive(Debug, Clone, PartialEq)]
pub struct Accuracy {
    pub total: f64,
    /// `("{start:02}-{end:02}", accuracy)` in increasing class order.
    pub per_task: Vec<(String, f64)>,
}

impl Accuracy {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.per_task
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, acc)| *acc)
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// Fraction of `ypred` equal to `ytrue`, overall and per window of
/// `task_size` classes starting at class 0. Windows cover every class up to
/// and including the largest label. All values are rounded to 3 decimals.
///
/// When the largest label starts a window, that window is reported too:
/// labels `[0, 10]` with `task_size = 10` give both `00-09` and `10-19`,
/// whereas a half-open `range(0, max, task_size)` would stop at `00-09`.
///
/// ```rust
/// # use inclearn::utils::compute_accuracy;
/// let acc = compute_accuracy(&[1, 1, 2, 2], &[1, 1, 2, 3], 2).unwrap();
/// assert_eq!(acc.total, 0.75);
/// assert_eq!(acc.get("00-01"), Some(1.0));
/// assert_eq!(acc.get("02-03"), Some(0.5));
/// ```
pub fn compute_accuracy(ypred: &[usize], ytrue: &[usize], task_size: usize) -> Result<Accuracy, Error> {
    if task_size == 0 {
        return Err(Error::InvalidConfig("task_size must be at least 1".into()));
    }
    if ypred.len() != ytrue.len() {
        return Err(Error::WrongNumElements {
            expected: ytrue.len(),
            found: ypred.len(),
        });
    }
    let max = *ytrue.iter().max().ok_or(Error::EmptyInput("compute_accuracy"))?;

    let correct = |keep: &dyn Fn(usize) -> bool| {
        ypred
            .iter()
            .zip(ytrue.iter())
            .filter(|(_, t)| keep(**t))
            .fold((0usize, 0usize), |(hits, n), (p, t)| (hits + usize::from(p == t), n + 1))
    };

    let (hits, n) = correct(&|_| true);
    let total = round3(hits as f64 / n as f64);

    let per_task = (0..=max)
        .step_by(task_size)
        .map(|start| {
            let end = start + task_size;
            let label = format!("{start:02}-{:02}", end - 1);
            let (hits, n) = correct(&|t| start <= t && t < end);
            let acc = if n == 0 {
                warn!("No samples with a label in {label}, reporting 0 accuracy");
                0.0
            } else {
                round3(hits as f64 / n as f64)
            };
            (label, acc)
        })
        .collect();

    Ok(Accuracy { total, per_task })
}

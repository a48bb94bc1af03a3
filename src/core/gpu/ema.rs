use std::collections::HashMap;

/// Exponential moving average: `smoothed = previous * (1 - alpha) + raw * alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    /// Unprimed: the first sample is taken as-is.
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn with_initial(alpha: f64, initial: f64) -> Self {
        Self {
            alpha,
            value: Some(initial),
        }
    }

    pub fn update(&mut self, raw: f64) -> f64 {
        let next = match self.value {
            Some(previous) => previous * (1.0 - self.alpha) + raw * self.alpha,
            None => raw,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// One EMA state per adapter key.
#[derive(Debug, Clone)]
pub struct EmaBank {
    alpha: f64,
    states: HashMap<String, Ema>,
}

impl EmaBank {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            states: HashMap::new(),
        }
    }

    pub fn update(&mut self, key: &str, raw: f64) -> f64 {
        let alpha = self.alpha;
        self.states
            .entry(key.to_string())
            .or_insert_with(|| Ema::new(alpha))
            .update(raw)
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.states.get(key).and_then(Ema::value)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

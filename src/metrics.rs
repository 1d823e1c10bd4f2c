use serde::{Deserialize, Serialize};

/// Append-only record of per-episode cumulative rewards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistory {
    scores: Vec<f32>,
}

impl ScoreHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, score: f32) {
        self.scores.push(score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.scores
    }

    /// The last `window` scores, or all of them when fewer were recorded.
    pub fn trailing(&self, window: usize) -> &[f32] {
        let start = self.scores.len().saturating_sub(window);
        &self.scores[start..]
    }

    /// Mean of the last `window` scores; `None` before the first episode.
    pub fn trailing_average(&self, window: usize) -> Option<f32> {
        let tail = self.trailing(window);
        if tail.is_empty() {
            return None;
        }
        Some(tail.iter().sum::<f32>() / tail.len() as f32)
    }

    /// Mean, population standard deviation and range of the last `window` scores.
    pub fn summary(&self, window: usize) -> Option<WindowSummary> {
        let mean = self.trailing_average(window)?;
        let tail = self.trailing(window);
        let (min, max, squares) = tail.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0),
            |(min, max, squares), &score| {
                (min.min(score), max.max(score), squares + (score - mean).powi(2))
            },
        );
        Some(WindowSummary {
            episodes: tail.len(),
            mean,
            std: (squares / tail.len() as f32).sqrt(),
            min,
            max,
        })
    }
}

impl From<Vec<f32>> for ScoreHistory {
    fn from(scores: Vec<f32>) -> Self {
        ScoreHistory { scores }
    }
}

/// Spread of the scores in a trailing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    pub episodes: usize,
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub max: f32,
}

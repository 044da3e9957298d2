//! Activity rotation.
//!
//! Two modes share one rotator:
//! - [`RotationMode::Smoothing`]: every candidate, the live line included,
//!   is shown for two consecutive ticks before moving on.
//! - [`RotationMode::Alternate`]: the live line and the other candidates
//!   strictly alternate, one tick each.

use crate::config::{InstrumentConfig, InstrumentKind};

/// One entry in the rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Live,
    MarketCap,
    Circulating,
    Volume,
    Open,
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationMode {
    Smoothing,
    Alternate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotatorState {
    /// Nothing to rotate; the live line is always shown.
    Idle,
    Cycling,
}

#[derive(Debug, Clone)]
pub struct ActivityRotator {
    mode: RotationMode,
    candidates: Vec<Candidate>,
    index: usize,
    parity: usize,
}

impl ActivityRotator {
    /// `rotating` lists the candidates shown besides the live line.
    pub fn new(mode: RotationMode, rotating: Vec<Candidate>) -> Self {
        let candidates = match mode {
            RotationMode::Smoothing => std::iter::once(Candidate::Live)
                .chain(rotating)
                .flat_map(|c| [c.clone(), c])
                .collect(),
            RotationMode::Alternate => rotating,
        };

        Self {
            mode,
            candidates,
            index: 0,
            parity: 0,
        }
    }

    pub fn idle() -> Self {
        Self::new(RotationMode::Alternate, Vec::new())
    }

    /// Equities smooth, crypto and tokens alternate. Extended fields rotate
    /// for equities only. Without nickname mode the activity line carries
    /// the price and never rotates.
    pub fn for_config(config: &InstrumentConfig) -> Self {
        if !config.nickname {
            return Self::idle();
        }

        let mut rotating = Vec::new();
        if config.extended_activity && config.kind == InstrumentKind::Equity {
            rotating.extend([
                Candidate::MarketCap,
                Candidate::Circulating,
                Candidate::Volume,
                Candidate::Open,
            ]);
        }
        rotating.extend(config.activity.iter().cloned().map(Candidate::Custom));

        let mode = match config.kind {
            InstrumentKind::Equity => RotationMode::Smoothing,
            InstrumentKind::Crypto | InstrumentKind::Token => RotationMode::Alternate,
        };

        Self::new(mode, rotating)
    }

    pub fn mode(&self) -> RotationMode {
        self.mode
    }

    pub fn state(&self) -> RotatorState {
        if self.candidates.iter().all(|c| *c == Candidate::Live) {
            RotatorState::Idle
        } else {
            RotatorState::Cycling
        }
    }

    /// Position of the next candidate in the rotation.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate to publish this tick.
    pub fn next(&mut self) -> Candidate {
        if self.candidates.is_empty() {
            return Candidate::Live;
        }

        match self.mode {
            RotationMode::Smoothing => {
                let candidate = self.candidates[self.index].clone();
                self.index = (self.index + 1) % self.candidates.len();
                candidate
            }
            RotationMode::Alternate => {
                let show_live = self.parity % 2 == 0;
                self.parity += 1;
                if show_live {
                    return Candidate::Live;
                }

                let candidate = self.candidates[self.index].clone();
                self.index += 1;
                if self.index == self.candidates.len() {
                    self.index = 0;
                    self.parity = 0;
                }
                candidate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(messages: &[&str]) -> Vec<Candidate> {
        messages
            .iter()
            .map(|m| Candidate::Custom(m.to_string()))
            .collect()
    }

    #[test]
    fn idle_always_shows_live() {
        let mut rotator = ActivityRotator::idle();
        assert_eq!(rotator.state(), RotatorState::Idle);
        for _ in 0..5 {
            assert_eq!(rotator.next(), Candidate::Live);
        }

        let mut smoothing = ActivityRotator::new(RotationMode::Smoothing, Vec::new());
        assert_eq!(smoothing.state(), RotatorState::Idle);
        for _ in 0..5 {
            assert_eq!(smoothing.next(), Candidate::Live);
        }
    }

    #[test]
    fn smoothing_shows_each_candidate_twice_and_wraps() {
        let mut rotator = ActivityRotator::new(RotationMode::Smoothing, custom(&["a", "b"]));
        assert_eq!(rotator.state(), RotatorState::Cycling);
        assert_eq!(rotator.len(), 6);

        let a = Candidate::Custom("a".into());
        let b = Candidate::Custom("b".into());
        let expected = [
            Candidate::Live,
            Candidate::Live,
            a.clone(),
            a,
            b.clone(),
            b,
        ];

        let first: Vec<_> = (0..6).map(|_| rotator.next()).collect();
        assert_eq!(first, expected);

        let second: Vec<_> = (0..6).map(|_| rotator.next()).collect();
        assert_eq!(second, expected);
    }

    #[test]
    fn smoothing_index_stays_in_range() {
        let mut rotator = ActivityRotator::new(
            RotationMode::Smoothing,
            vec![Candidate::MarketCap, Candidate::Custom("x".into())],
        );
        let n = rotator.len();
        for _ in 0..(n * 3 + 1) {
            rotator.next();
            assert!(rotator.index() < n);
        }
    }

    #[test]
    fn alternate_interleaves_live_and_custom() {
        let mut rotator = ActivityRotator::new(RotationMode::Alternate, custom(&["a", "b", "c"]));

        let cycle: Vec<_> = (0..6).map(|_| rotator.next()).collect();
        assert_eq!(
            cycle,
            vec![
                Candidate::Live,
                Candidate::Custom("a".into()),
                Candidate::Live,
                Candidate::Custom("b".into()),
                Candidate::Live,
                Candidate::Custom("c".into()),
            ]
        );

        let live = cycle.iter().filter(|c| **c == Candidate::Live).count();
        assert_eq!(live, 3);

        // Back at the initial state after 2K ticks.
        assert_eq!(rotator.index(), 0);
        assert_eq!(rotator.next(), Candidate::Live);
        assert_eq!(rotator.next(), Candidate::Custom("a".into()));
    }

    #[test]
    fn for_config_picks_mode_by_kind() {
        let mut equity = InstrumentConfig::new(InstrumentKind::Equity, "AAPL", 60);
        equity.nickname = true;
        equity.extended_activity = true;
        equity.activity = vec!["hello".into()];

        let rotator = ActivityRotator::for_config(&equity);
        assert_eq!(rotator.mode(), RotationMode::Smoothing);
        // live + 4 extended + 1 custom, each doubled
        assert_eq!(rotator.len(), 12);

        let mut crypto = InstrumentConfig::new(InstrumentKind::Crypto, "bitcoin", 60);
        crypto.nickname = true;
        crypto.extended_activity = true;
        crypto.activity = vec!["one".into(), "two".into()];
        let mut rotator = ActivityRotator::for_config(&crypto);
        assert_eq!(rotator.mode(), RotationMode::Alternate);
        // extended fields are ignored outside equities
        assert_eq!(rotator.len(), 2);
        let shown: Vec<_> = (0..4).map(|_| rotator.next()).collect();
        assert!(!shown.contains(&Candidate::MarketCap));

        crypto.nickname = false;
        assert_eq!(ActivityRotator::for_config(&crypto).state(), RotatorState::Idle);
    }
}

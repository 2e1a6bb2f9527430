// ===============================
// src/demo.rs
// ===============================
//
// Demo mode: manufacture an artificial spread by scaling one venue's book.
// Runs on the quote before it reaches the evaluator; the evaluator itself
// never knows about demo mode except through `Quote::synthetic`.
//
use crate::domain::{Quote, Venue};

pub trait QuoteAdjuster: Send + Sync {
    fn adjust(&self, quote: Quote) -> Quote;
}

/// Pass-through for live evaluation.
pub struct Passthrough;

impl QuoteAdjuster for Passthrough {
    fn adjust(&self, quote: Quote) -> Quote { quote }
}

/// Multiply ask and bid of `venue` by `factor` (e.g. 0.93 = a 7% flash dip).
#[derive(Debug, Clone)]
pub struct SpreadInjector {
    pub venue: Venue,
    pub factor: f64,
}

impl SpreadInjector {
    pub const DEFAULT_FACTOR: f64 = 0.93;

    pub fn new(venue: Venue, factor: f64) -> Option<Self> {
        (factor.is_finite() && factor > 0.0).then_some(Self { venue, factor })
    }
}

impl QuoteAdjuster for SpreadInjector {
    fn adjust(&self, quote: Quote) -> Quote {
        if quote.venue != self.venue {
            return quote;
        }
        // same factor on both sides keeps the venue's own bid/ask relation
        Quote {
            ask: quote.ask * self.factor,
            bid: quote.bid * self.factor,
            last: quote.last.map(|l| l * self.factor),
            synthetic: true,
            ..quote
        }
    }
}

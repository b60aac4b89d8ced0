use models::FxQuote;
use serde::Serialize;

/// Conversion context handed to the aggregation engine.
///
/// Amounts in the ledger are in `base`. With no quote, or when `target` is the
/// base currency, conversion is the identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionState {
    pub base: String,
    pub target: String,
    pub quote: Option<FxQuote>,
}

impl ConversionState {
    pub fn identity(base: &str) -> Self {
        Self {
            base: base.to_uppercase(),
            target: base.to_uppercase(),
            quote: None,
        }
    }

    pub fn new(base: &str, target: &str, quote: Option<FxQuote>) -> Self {
        Self {
            base: base.to_uppercase(),
            target: target.to_uppercase(),
            quote,
        }
    }

    /// Converts into the configured target currency.
    pub fn convert(&self, amount: f64) -> f64 {
        self.convert_to(amount, &self.target)
    }

    /// Converts a base-currency amount into `target`. Never fails: anything the
    /// cached quote cannot answer is returned unchanged.
    pub fn convert_to(&self, amount: f64, target: &str) -> f64 {
        match self.rate_for(target) {
            Some(rate) => amount * rate,
            None => amount,
        }
    }

    /// Currency the converted figures are actually expressed in.
    pub fn display_currency(&self) -> &str {
        if self.rate_for(&self.target).is_some() {
            &self.target
        } else {
            &self.base
        }
    }

    fn rate_for(&self, target: &str) -> Option<f64> {
        if target.eq_ignore_ascii_case(&self.base) {
            return None;
        }
        let q = self.quote.as_ref()?;
        if !q.rate.is_finite() || q.rate <= 0.0 {
            return None;
        }
        if q.base.eq_ignore_ascii_case(&self.base) && q.target.eq_ignore_ascii_case(target) {
            Some(q.rate)
        } else if q.target.eq_ignore_ascii_case(&self.base) && q.base.eq_ignore_ascii_case(target) {
            Some(1.0 / q.rate)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quote(base: &str, target: &str, rate: f64) -> FxQuote {
        FxQuote {
            base: base.into(),
            target: target.into(),
            rate,
            as_of: Utc::now(),
            provider: "test".into(),
        }
    }

    #[test]
    fn identity_without_quote_or_same_currency() {
        let s = ConversionState::new("USD", "EUR", None);
        assert_eq!(s.convert(10.0), 10.0);
        assert_eq!(s.display_currency(), "USD");

        let s = ConversionState::new("USD", "usd", Some(quote("USD", "EUR", 0.9)));
        assert_eq!(s.convert(10.0), 10.0);
    }

    #[test]
    fn applies_cached_rate() {
        let s = ConversionState::new("USD", "EUR", Some(quote("USD", "EUR", 0.9)));
        assert!((s.convert(10.0) - 9.0).abs() < 1e-12);
        assert_eq!(s.display_currency(), "EUR");
        assert_eq!(s.convert_to(10.0, "GBP"), 10.0);
    }

    #[test]
    fn inverse_quote_is_usable() {
        let s = ConversionState::new("USD", "EUR", Some(quote("EUR", "USD", 1.25)));
        assert!((s.convert(10.0) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn broken_rate_is_ignored() {
        let s = ConversionState::new("USD", "EUR", Some(quote("USD", "EUR", 0.0)));
        assert_eq!(s.convert(10.0), 10.0);
    }
}

use serde::Deserialize;
use serde::Serialize;

use crate::markets::Market;
use crate::markets::MarketsRecoveryMatch;
use crate::markets::Selection;

/// Denominator used before gcd reduction of fractional odds
const FRACTIONAL_DENOMINATOR: i64 = 100;

/// Which alternate odds formats are derived on ingestion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsFormats {
    /// Derive American (moneyline) odds
    #[serde(default)]
    pub american: bool,

    /// Derive fractional odds rendered as "num/denom"
    #[serde(default)]
    pub fractional: bool,
}

impl OddsFormats {
    pub fn new(american: bool, fractional: bool) -> Self {
        Self { american, fractional }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.american || self.fractional
    }
}

/// The four derived price fields of a selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedOdds {
    pub american: Option<i64>,
    pub american_with_overround: Option<i64>,
    pub fractional: Option<String>,
    pub fractional_with_overround: Option<String>,
}

/// Converts decimal prices into American and fractional representations.
///
/// Stateless apart from the enabled formats. Every call recomputes all derived
/// fields from the decimal inputs, so a selection never carries a derived value
/// that belongs to an earlier decimal price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OddsConverter {
    formats: OddsFormats,
}

impl OddsConverter {
    pub fn new(formats: OddsFormats) -> Self {
        Self { formats }
    }

    /// Converter that never derives anything
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn formats(&self) -> OddsFormats {
        self.formats
    }

    /// Derive every enabled format for the plain and overround decimal prices
    pub fn convert(&self, decimal: Option<f64>, decimal_with_overround: Option<f64>) -> DerivedOdds {
        let mut derived = DerivedOdds::default();

        if self.formats.american {
            derived.american = decimal.and_then(to_american);
            derived.american_with_overround = decimal_with_overround.and_then(to_american);
        }

        if self.formats.fractional {
            derived.fractional = decimal.and_then(to_fractional);
            derived.fractional_with_overround = decimal_with_overround.and_then(to_fractional);
        }

        derived
    }

    /// Overwrite the derived fields of a selection from its current decimal prices
    pub fn apply(&self, selection: &mut Selection) {
        let derived = self.convert(selection.odds_decimal, selection.odds_decimal_with_overround);
        selection.odds_american = derived.american;
        selection.odds_american_with_overround = derived.american_with_overround;
        selection.odds_fractional = derived.fractional;
        selection.odds_fractional_with_overround = derived.fractional_with_overround;
    }

    pub fn apply_markets(&self, markets: &mut [Market]) {
        for market in markets {
            for selection in &mut market.selections {
                self.apply(selection);
            }
        }
    }

    /// Convert markets attached directly to a recovered match and to each of its games
    pub fn apply_recovered_match(&self, recovered: &mut MarketsRecoveryMatch) {
        self.apply_markets(&mut recovered.markets);
        for game in &mut recovered.games {
            self.apply_markets(&mut game.markets);
        }
    }
}

/// American odds for a decimal price strictly greater than 1.0
///
/// Prices of 2.0 and above map to a positive line, shorter prices to a negative one.
pub fn to_american(decimal: f64) -> Option<i64> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return None;
    }

    let profit = decimal - 1.0;
    let american = if decimal >= 2.0 { (profit * 100.0).round() } else { (-100.0 / profit).round() };
    Some(american as i64)
}

/// Fractional odds for a decimal price, reduced from a denominator of 100
pub fn to_fractional(decimal: f64) -> Option<String> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return None;
    }

    let numerator = ((decimal - 1.0) * FRACTIONAL_DENOMINATOR as f64).round() as i64;
    let divisor = gcd(numerator.abs(), FRACTIONAL_DENOMINATOR);
    Some(format!("{}/{}", numerator / divisor, FRACTIONAL_DENOMINATOR / divisor))
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

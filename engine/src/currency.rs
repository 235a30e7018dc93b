//! Currencies and conversion to the home currency (THB).

use serde::{Deserialize, Serialize};

/// Supported expense currencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Thai baht, the home currency
    #[default]
    Thb,
    /// US dollar
    Usd,
    /// Japanese yen
    Jpy,
}

impl Currency {
    /// Parse a currency code, case-insensitively. Anything unknown
    /// falls back to THB, the documented default.
    pub fn parse_lenient(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "USD" => Currency::Usd,
            "JPY" => Currency::Jpy,
            _ => Currency::Thb,
        }
    }

    /// The wire code for this currency.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Thb => "THB",
            Currency::Usd => "USD",
            Currency::Jpy => "JPY",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Exchange rates into THB (THB per unit of foreign currency).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Rates {
    /// USD -> THB
    pub usd: f64,
    /// JPY -> THB
    pub jpy: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            usd: 32.33,
            jpy: 0.21,
        }
    }
}

impl Rates {
    /// Convert an amount in the given currency to THB.
    ///
    /// A rate that is missing, zero, or negative falls back to the
    /// built-in default for that currency.
    pub fn to_thb(&self, amount: f64, currency: Currency) -> f64 {
        let defaults = Rates::default();
        match currency {
            Currency::Thb => amount,
            Currency::Usd => {
                let rate = if self.usd > 0.0 { self.usd } else { defaults.usd };
                amount * rate
            }
            Currency::Jpy => {
                let rate = if self.jpy > 0.0 { self.jpy } else { defaults.jpy };
                amount * rate
            }
        }
    }
}

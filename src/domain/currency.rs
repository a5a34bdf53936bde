//! Supported currencies and the fiat conversion table

use crate::shared::error::{AppError, AppResult};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Fractional digits kept for crypto amounts
pub const CRYPTO_PRECISION: i32 = 8;

/// USDT mint on Solana, used in Solana Pay links
const USDT_SPL_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// Currencies accepted at checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[serde(alias = "sol")]
    Sol,
    #[serde(alias = "usdt")]
    Usdt,
}

impl Currency {
    pub const ALL: [Currency; 2] = [Currency::Sol, Currency::Usdt];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Sol => "SOL",
            Currency::Usdt => "USDT",
        }
    }

    /// SPL token mint for token currencies, `None` for native SOL
    pub fn spl_token_mint(&self) -> Option<&'static str> {
        match self {
            Currency::Sol => None,
            Currency::Usdt => Some(USDT_SPL_MINT),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SOL" => Ok(Currency::Sol),
            "USDT" => Ok(Currency::Usdt),
            _ => Err(AppError::UnsupportedCurrency { code: s.to_string() }),
        }
    }
}

/// A crypto amount rounded to [`CRYPTO_PRECISION`] digits
///
/// Displays without trailing zeros: `100`, `0.5`, `0.00012345`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct CryptoAmount(f64);

impl CryptoAmount {
    pub fn new(value: f64) -> Self {
        let scale = 10f64.powi(CRYPTO_PRECISION);
        Self((value * scale).round() / scale)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Whether `other` is the same amount within one unit of the last digit
    pub fn approx_eq(&self, other: f64) -> bool {
        (self.0 - other).abs() <= 10f64.powi(-CRYPTO_PRECISION)
    }
}

impl fmt::Display for CryptoAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fixed = format!("{:.*}", CRYPTO_PRECISION as usize, self.0);
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        f.write_str(trimmed)
    }
}

impl Serialize for CryptoAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Fixed mapping of currency to fiat units per coin
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionTable {
    rates: HashMap<Currency, f64>,
}

impl Default for ConversionTable {
    fn default() -> Self {
        Self {
            rates: HashMap::from([(Currency::Usdt, 16_000.0), (Currency::Sol, 3_200_000.0)]),
        }
    }
}

impl ConversionTable {
    /// Build a table; every rate must be finite and positive
    pub fn new(rates: HashMap<Currency, f64>) -> AppResult<Self> {
        if let Some((currency, rate)) = rates.iter().find(|(_, r)| !r.is_finite() || **r <= 0.0) {
            return Err(AppError::Validation(format!(
                "rate for {} must be positive, got {}",
                currency, rate
            )));
        }
        Ok(Self { rates })
    }

    pub fn rate_of(&self, currency: Currency) -> AppResult<f64> {
        self.rates
            .get(&currency)
            .copied()
            .ok_or_else(|| AppError::UnsupportedCurrency {
                code: currency.code().to_string(),
            })
    }

    pub fn to_crypto(&self, amount_fiat: f64, currency: Currency) -> AppResult<CryptoAmount> {
        Ok(CryptoAmount::new(amount_fiat / self.rate_of(currency)?))
    }

    pub fn to_fiat(&self, amount_crypto: CryptoAmount, currency: Currency) -> AppResult<f64> {
        Ok(amount_crypto.value() * self.rate_of(currency)?)
    }

    /// Human readable rate line, e.g. `1 SOL = Rp 3,200,000`
    pub fn describe_rate(&self, currency: Currency) -> AppResult<String> {
        let rate = self.rate_of(currency)?;
        Ok(format!("1 {} = Rp {}", currency, group_thousands(rate)))
    }

    pub fn entries(&self) -> impl Iterator<Item = (Currency, f64)> + '_ {
        self.rates.iter().map(|(c, r)| (*c, *r))
    }
}

fn group_thousands(value: f64) -> String {
    let whole = value.trunc() as u64;
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let cents = ((value - value.trunc()) * 100.0).round() as u64;
    if cents > 0 {
        grouped.push_str(&format!(".{:02}", cents));
    }
    grouped
}

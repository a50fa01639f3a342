// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Core type definitions for quorum transactions.
//!
//! The lifecycle is a closed enum. Every place that branches on status
//! matches exhaustively, so adding a state is a compile error until each
//! caller has decided what it means.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a transaction.
///
/// Forward-only: `Pending -> Approved -> Executed`, with a side exit to
/// `Rejected` from either of the first two. Nothing ever moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Collecting signatures.
    Pending,
    /// Quorum reached; waiting for someone to execute.
    Approved,
    /// Settled. Terminal.
    Executed,
    /// Explicitly rejected. Terminal.
    Rejected,
}

impl TransactionStatus {
    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Approved, Self::Executed)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Rejected)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Executed => "executed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Currency denominations the ledger knows how to display.
///
/// Anything else goes through [`Currency::Custom`] with an ISO-style code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// United States Dollar (cent, 10^-2).
    USD,
    /// Euro (cent, 10^-2).
    EUR,
    /// Pound Sterling (penny, 10^-2).
    GBP,
    /// Indian Rupee (paisa, 10^-2).
    INR,
    /// Brazilian Real (centavo, 10^-2).
    BRL,
    /// Japanese Yen (no minor unit).
    JPY,
    /// Any other currency code.
    Custom(String),
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Currency {
    /// The currency code, e.g. `"USD"`.
    pub fn code(&self) -> &str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::INR => "INR",
            Self::BRL => "BRL",
            Self::JPY => "JPY",
            Self::Custom(code) => code,
        }
    }

    /// Parse a currency code, case-insensitively. Unknown codes become
    /// [`Currency::Custom`] in upper case.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        match code.as_str() {
            "USD" => Self::USD,
            "EUR" => Self::EUR,
            "GBP" => Self::GBP,
            "INR" => Self::INR,
            "BRL" => Self::BRL,
            "JPY" => Self::JPY,
            _ => Self::Custom(code),
        }
    }

    /// Decimal places for display. The ledger itself only ever stores
    /// integer minor units.
    pub fn decimals(&self) -> u8 {
        match self {
            Self::JPY => 0,
            Self::USD | Self::EUR | Self::GBP | Self::INR | Self::BRL => 2,
            Self::Custom(_) => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A monetary amount in the smallest indivisible unit of a currency.
///
/// No floating point anywhere near money: `Amount::new(1050, Currency::USD)`
/// is ten dollars fifty.
///
/// ```
/// use quorum_protocol::transaction::{Amount, Currency};
///
/// let wire = Amount::new(25_000_000, Currency::EUR);
/// assert_eq!(wire.display_decimal(), "250000.00 EUR");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Value in minor units.
    pub value: u64,
    pub currency: Currency,
}

impl Amount {
    pub fn new(value: u64, currency: Currency) -> Self {
        Self { value, currency }
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Human-readable form with the currency's decimal places.
    pub fn display_decimal(&self) -> String {
        let decimals = self.currency.decimals() as u32;
        if decimals == 0 {
            return format!("{} {}", self.value, self.currency);
        }
        let divisor = 10u64.pow(decimals);
        format!(
            "{}.{:0>width$} {}",
            self.value / divisor,
            self.value % divisor,
            self.currency,
            width = decimals as usize
        )
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

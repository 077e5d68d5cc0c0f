//! Typed views over the string columns stored in the database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

string_enum!(
    Exchange, "exchange" {
        Binance => "binance",
        Bybit => "bybit",
        Okx => "okx",
    }
);

string_enum!(
    TransactionType, "transaction type" {
        P2pBuy => "p2p_buy",
        P2pSell => "p2p_sell",
        SpotBuy => "spot_buy",
        SpotSell => "spot_sell",
        Deposit => "deposit",
        Withdrawal => "withdrawal",
    }
);

string_enum!(
    /// Lifecycle of the counterparty enrichment step.
    EnrichmentStatus, "enrichment status" {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
);

string_enum!(
    TradeSide, "trade side" {
        Buy => "buy",
        Sell => "sell",
    }
);

string_enum!(
    /// How hard the bot competes for the top of the ad list.
    BotProfile, "bot profile" {
        Aggressive => "aggressive",
        Moderate => "moderate",
        Conservative => "conservative",
    }
);

string_enum!(
    BotActionType, "bot action type" {
        UpdatePrice => "update_price",
        Hold => "hold",
    }
);

string_enum!(
    BotActionStatus, "bot action status" {
        PendingApproval => "pending_approval",
        Approved => "approved",
        Rejected => "rejected",
    }
);

impl TransactionType {
    pub fn is_p2p(&self) -> bool {
        matches!(self, TransactionType::P2pBuy | TransactionType::P2pSell)
    }

    pub fn p2p(side: TradeSide) -> Self {
        match side {
            TradeSide::Buy => TransactionType::P2pBuy,
            TradeSide::Sell => TransactionType::P2pSell,
        }
    }

    pub fn side(&self) -> Option<TradeSide> {
        match self {
            TransactionType::P2pBuy | TransactionType::SpotBuy => Some(TradeSide::Buy),
            TransactionType::P2pSell | TransactionType::SpotSell => Some(TradeSide::Sell),
            TransactionType::Deposit | TransactionType::Withdrawal => None,
        }
    }
}

impl TradeSide {
    pub fn opposite(&self) -> Self {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("BINANCE".parse::<Exchange>().unwrap(), Exchange::Binance);
        assert_eq!(" p2p_sell ".parse::<TransactionType>().unwrap(), TransactionType::P2pSell);
    }

    #[test]
    fn test_parse_rejects_unknown_value() {
        let err = "kraken".parse::<Exchange>().unwrap_err();
        assert_eq!(err.to_string(), "invalid exchange: kraken");
    }

    #[test]
    fn test_transaction_type_side() {
        assert!(TransactionType::P2pBuy.is_p2p());
        assert!(!TransactionType::Deposit.is_p2p());
        assert_eq!(TransactionType::Withdrawal.side(), None);
        assert_eq!(TransactionType::p2p(TradeSide::Sell), TransactionType::P2pSell);
    }
}

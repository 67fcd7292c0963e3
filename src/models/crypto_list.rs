//! Cryptocurrency List Model
//!
//! The default catalogue of monitored assets and helpers for parsing
//! comma-separated symbol and currency lists from the environment.

/// A monitored asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoSymbol {
    pub symbol: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

const fn sym(symbol: &'static str, name: &'static str, category: &'static str) -> CryptoSymbol {
    CryptoSymbol { symbol, name, category }
}

/// Top assets monitored when `CRYPTO_SYMBOLS` is not set
pub const DEFAULT_CRYPTO_SYMBOLS: &[CryptoSymbol] = &[
    sym("BTC", "Bitcoin", "Layer 1"),
    sym("ETH", "Ethereum", "Layer 1"),
    sym("BNB", "BNB", "Exchange"),
    sym("SOL", "Solana", "Layer 1"),
    sym("XRP", "Ripple", "Payment"),
    sym("ADA", "Cardano", "Layer 1"),
    sym("AVAX", "Avalanche", "Layer 1"),
    sym("DOGE", "Dogecoin", "Meme"),
    sym("DOT", "Polkadot", "Layer 0"),
    sym("MATIC", "Polygon", "Layer 2"),
    sym("LINK", "Chainlink", "Oracle"),
    sym("UNI", "Uniswap", "DeFi"),
    sym("ATOM", "Cosmos", "Layer 0"),
    sym("LTC", "Litecoin", "Payment"),
    sym("ETC", "Ethereum Classic", "Layer 1"),
    sym("XLM", "Stellar", "Payment"),
    sym("ALGO", "Algorand", "Layer 1"),
    sym("VET", "VeChain", "Supply Chain"),
    sym("FIL", "Filecoin", "Storage"),
    sym("HBAR", "Hedera", "Enterprise"),
];

/// Fiat currencies used when `FIAT_CURRENCIES` is not set
pub const DEFAULT_FIAT_CURRENCIES: &[&str] = &["BRL"];

/// Default symbols as owned strings
pub fn default_symbols() -> Vec<String> {
    DEFAULT_CRYPTO_SYMBOLS
        .iter()
        .map(|c| c.symbol.to_string())
        .collect()
}

/// Look up catalogue metadata for a symbol (case-sensitive)
pub fn lookup_symbol(symbol: &str) -> Option<&'static CryptoSymbol> {
    DEFAULT_CRYPTO_SYMBOLS.iter().find(|c| c.symbol == symbol)
}

/// Split a comma-separated list, trimming entries and dropping empties and
/// repeats (first occurrence wins).
pub fn parse_list(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if !part.is_empty() && !out.iter().any(|p| p == part) {
            out.push(part.to_string());
        }
    }
    out
}

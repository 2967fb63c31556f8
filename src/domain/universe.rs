//! Universe handling: code-list parsing and tradability filtering.

use crate::domain::stock::Stock;
use std::collections::HashSet;

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

/// Parse a comma-separated code list. Tokens are trimmed and uppercased;
/// empty tokens and duplicates are rejected.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if seen.contains(&code) {
            return Err(UniverseError::DuplicateCode(code));
        }
        seen.insert(code.clone());
        codes.push(code);
    }

    Ok(codes)
}

/// Board prefixes considered scannable: SZ main board, ChiNext, SH main
/// board, STAR market.
const TRADABLE_PREFIXES: [&str; 4] = ["00", "30", "60", "68"];

/// Keep only stocks worth scanning: drops ST / delisting-marked names and
/// anything off the main listing boards.
pub fn filter_tradable(stocks: Vec<Stock>) -> Vec<Stock> {
    stocks
        .into_iter()
        .filter(|stock| !risk_marked(&stock.name) && on_tradable_board(&stock.code))
        .collect()
}

/// Special-treatment and delisting marks are name prefixes (`ST`, `*ST`)
/// or the 退 character anywhere in the name.
fn risk_marked(name: &str) -> bool {
    let name = name.trim_start();
    name.starts_with("ST") || name.starts_with("*ST") || name.contains('退')
}

fn on_tradable_board(code: &str) -> bool {
    TRADABLE_PREFIXES
        .iter()
        .any(|prefix| code.starts_with(prefix))
}

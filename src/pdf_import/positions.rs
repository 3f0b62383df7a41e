//! Holding reconstruction for securities statements
//!
//! Positions span several lines: an ISIN, one or more lines of security
//! name, and a line ending in the quantity. The reconstructor is a two-state
//! machine fed one trimmed line at a time. While `Open`, each line is
//! classified with a fixed priority:
//!
//! 1. a line containing an ISIN closes the open holding and opens a new one
//! 2. a line ending in a number sets the quantity (first one wins)
//! 3. anything else is appended to the name

use super::trade_republic::Holding;
use super::{extract_isin, ParseWarning, WarningSeverity};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_TRAILING_QUANTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[\.,]\d+)?)$").unwrap());

/// What a single line means to the reconstructor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Identifier(&'a str),
    Quantity(&'a str),
    Text,
}

/// Classify a line, identifier first, then trailing quantity, then text
pub fn classify_line(line: &str) -> LineKind<'_> {
    if let Some(isin) = extract_isin(line) {
        return LineKind::Identifier(isin);
    }
    if let Some(caps) = RE_TRAILING_QUANTITY.captures(line) {
        if let Some(m) = caps.get(1) {
            return LineKind::Quantity(m.as_str());
        }
    }
    LineKind::Text
}

/// Holding whose ISIN has been seen but which has not been emitted yet
#[derive(Debug, Clone, PartialEq)]
struct OpenHolding {
    identifier: String,
    name: String,
    quantity: Option<f64>,
}

impl OpenHolding {
    fn new(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            name: String::new(),
            quantity: None,
        }
    }

    fn append_name(&mut self, line: &str) {
        self.name.push(' ');
        self.name.push_str(line);
    }

    fn close(self, warnings: &mut Vec<ParseWarning>) -> Holding {
        let name = self.name.trim().to_string();

        if name.is_empty() {
            warnings.push(ParseWarning::new(
                WarningSeverity::Warning,
                "name",
                format!("No name found for {}", self.identifier),
                self.identifier.as_str(),
            ));
        }
        if self.quantity.is_none() {
            warnings.push(ParseWarning::new(
                WarningSeverity::Warning,
                "quantity",
                format!("No quantity found for {}, using 0", self.identifier),
                self.identifier.as_str(),
            ));
        }

        log::debug!(
            "PDF Import: Holding {} '{}' x {:?}",
            self.identifier,
            name,
            self.quantity
        );

        Holding {
            identifier: self.identifier,
            name,
            quantity: self.quantity.unwrap_or(0.0),
            market_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
enum State {
    /// Header lines before the first ISIN
    #[default]
    Idle,
    Open(OpenHolding),
}

/// Line-driven reconstruction of holdings
#[derive(Debug, Default)]
pub struct PositionReconstructor {
    state: State,
    holdings: Vec<Holding>,
    warnings: Vec<ParseWarning>,
}

impl PositionReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a holding is currently being accumulated
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Advance the state machine by one trimmed, non-empty line
    pub fn feed(&mut self, line: &str) {
        let state = std::mem::take(&mut self.state);
        self.state = self.transition(state, line);
    }

    fn transition(&mut self, state: State, line: &str) -> State {
        match (state, classify_line(line)) {
            (State::Idle, LineKind::Identifier(isin)) => State::Open(OpenHolding::new(isin)),
            (State::Idle, _) => State::Idle,
            (State::Open(current), LineKind::Identifier(isin)) => {
                let holding = current.close(&mut self.warnings);
                self.holdings.push(holding);
                State::Open(OpenHolding::new(isin))
            }
            (State::Open(mut current), LineKind::Quantity(raw)) => {
                if current.quantity.is_some() {
                    log::debug!(
                        "PDF Import: Ignoring extra quantity '{}' for {}",
                        raw,
                        current.identifier
                    );
                    return State::Open(current);
                }
                match raw.replace(',', ".").parse::<f64>() {
                    Ok(quantity) => current.quantity = Some(quantity),
                    Err(_) => {
                        self.warnings.push(ParseWarning::new(
                            WarningSeverity::Info,
                            "quantity",
                            format!("Unreadable quantity for {}", current.identifier),
                            raw,
                        ));
                        current.append_name(line);
                    }
                }
                State::Open(current)
            }
            (State::Open(mut current), LineKind::Text) => {
                current.append_name(line);
                State::Open(current)
            }
        }
    }

    /// Flush the open holding, if any, and return everything collected
    pub fn finish(mut self) -> (Vec<Holding>, Vec<ParseWarning>) {
        if let State::Open(current) = std::mem::take(&mut self.state) {
            let holding = current.close(&mut self.warnings);
            self.holdings.push(holding);
        }
        (self.holdings, self.warnings)
    }
}

/// Reconstruct holdings from already filtered lines
pub fn reconstruct_holdings<'a, I>(lines: I) -> (Vec<Holding>, Vec<ParseWarning>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut reconstructor = PositionReconstructor::new();
    for line in lines {
        reconstructor.feed(line);
    }
    reconstructor.finish()
}

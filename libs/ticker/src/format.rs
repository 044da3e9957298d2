//! Turns a quote into the strings a watcher publishes. No I/O.

use crate::{
    config::{InstrumentConfig, InstrumentKind, TokenBackend},
    quote::{Extended, Formatted, Quote},
    rotate::Candidate,
};

pub const UP_ARROW: &str = "⬈";
pub const DOWN_ARROW: &str = "⬊";

/// Everything derived from one quote.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySet {
    /// Displayed price after FX conversion; compared against on the next
    /// token tick.
    pub value: f64,
    pub price: String,
    pub change: String,
    pub increase: bool,
    pub decorator: String,
    /// Present only in nickname mode.
    pub nickname: Option<String>,
    /// The live activity line.
    pub status: String,
    pub extended: Option<Extended>,
}

impl DisplaySet {
    /// Activity text for a rotation candidate. Extended candidates fall back
    /// to the live line when the quote carried no such figure.
    pub fn activity(&self, candidate: &Candidate) -> String {
        let extended = self.extended.as_ref();
        match candidate {
            Candidate::Live => self.status.clone(),
            Candidate::MarketCap => {
                self.extended_line("Market Cap", extended.map(|e| e.market_cap.as_str()))
            }
            Candidate::Circulating => {
                self.extended_line("Circulating", extended.map(|e| e.circulating_supply.as_str()))
            }
            Candidate::Volume => self.extended_line("Volume", extended.map(|e| e.volume_24h.as_str())),
            Candidate::Open => self.extended_line("Open", extended.map(|e| e.open.as_str())),
            Candidate::Custom(message) => message.clone(),
        }
    }

    fn extended_line(&self, label: &str, value: Option<&str>) -> String {
        match value {
            Some(v) if !v.is_empty() => format!("{label}: {v}"),
            _ => self.status.clone(),
        }
    }
}

/// `true` unless the signed change string starts with a minus sign.
pub fn is_increase(change: &str) -> bool {
    !change.starts_with('-')
}

/// Crypto USD price rendering.
///
/// Under one cent the value is shown in cents: 8 decimals below $0.00001,
/// 6 decimals otherwise. Under a dollar 3 decimals, above 2.
pub fn format_usd(price: f64) -> String {
    if price < 0.01 {
        let cents = price * 100.0;
        if price < 0.00001 {
            format!("{cents:.8}¢")
        } else {
            format!("{cents:.6}¢")
        }
    } else if price < 1.0 {
        format!("${price:.3}")
    } else {
        format!("${price:.2}")
    }
}

pub struct DisplayFormatter {
    config: InstrumentConfig,
    fx_rate: f64,
}

impl DisplayFormatter {
    /// `fx_rate` of zero means no conversion.
    pub fn new(config: InstrumentConfig, fx_rate: f64) -> Self {
        Self { config, fx_rate }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn compute(&self, quote: &Quote, previous: Option<f64>) -> DisplaySet {
        match self.config.kind {
            InstrumentKind::Equity => self.equity(quote),
            InstrumentKind::Crypto => self.crypto(quote),
            InstrumentKind::Token => self.token(quote, previous),
        }
    }

    fn convert(&self, value: f64) -> f64 {
        if self.fx_rate != 0.0 {
            value * self.fx_rate
        } else {
            value
        }
    }

    fn decorator(&self, increase: bool) -> String {
        if !self.config.auto_decorator() {
            return self.config.decorator.clone();
        }

        let arrow = if increase { UP_ARROW } else { DOWN_ARROW };
        arrow.to_string()
    }

    fn extended(&self, quote: &Quote) -> Option<Extended> {
        quote.extended.clone().filter(|_| self.config.extended_activity)
    }

    fn equity(&self, quote: &Quote) -> DisplaySet {
        let formatted = quote.formatted.clone().unwrap_or_else(|| Formatted {
            price: format!("{:.2}", quote.price),
            change: format!("{:.2}", quote.change),
            change_percent: format!("{:.2}%", quote.change_percent),
        });

        let value = self.convert(quote.price);
        let (price, change) = if self.fx_rate != 0.0 {
            (format!("{value:.2}"), format!("{:.2}", self.convert(quote.change)))
        } else {
            (formatted.price, formatted.change)
        };
        let percent = formatted.change_percent;

        let increase = is_increase(&change);
        let decorator = self.decorator(increase);

        let name = self
            .config
            .display_name()
            .unwrap_or(&self.config.symbol)
            .to_uppercase();

        let (nickname, status) = if self.config.nickname {
            (
                Some(format!("{name} {decorator} ${price}")),
                format!("${change} ({percent})"),
            )
        } else {
            (None, format!("{price} {decorator} {percent}"))
        };

        DisplaySet {
            value,
            price,
            change,
            increase,
            decorator,
            nickname,
            status,
            extended: self.extended(quote),
        }
    }

    fn crypto(&self, quote: &Quote) -> DisplaySet {
        let percent = format!("{:.2}", quote.change_percent);

        let (value, price, change, header) = match quote.pair.filter(|_| self.config.bitcoin) {
            Some(pair) => (
                pair.price,
                format!("₿{:.6}", pair.price),
                format!("{:.2}", pair.change),
                "₿",
            ),
            None => {
                let usd = self.convert(quote.price);
                (
                    usd,
                    format_usd(usd),
                    format!("{:.2}", self.convert(quote.change)),
                    "$",
                )
            }
        };

        let increase = is_increase(&change);
        let decorator = self.decorator(increase);

        let name = match (self.config.display_name(), &quote.symbol) {
            (Some(name), _) => name.to_string(),
            (None, Some(symbol)) => symbol.to_uppercase(),
            (None, None) => self.config.symbol.to_uppercase(),
        };

        let (nickname, status) = if self.config.nickname {
            (
                Some(format!("{name} {decorator} {price}")),
                format!("{header}{change} ({percent}%)"),
            )
        } else {
            (None, format!("{price} {decorator} {percent}%"))
        };

        DisplaySet {
            value,
            price,
            change,
            increase,
            decorator,
            nickname,
            status,
            extended: self.extended(quote),
        }
    }

    fn token(&self, quote: &Quote, previous: Option<f64>) -> DisplaySet {
        let value = self.convert(quote.price);
        let increase = previous.is_none_or(|prev| value >= prev);
        let decorator = self.decorator(increase);

        let precision = self.config.token_precision();
        let price = format!("${value:.precision$}");
        let name = self.config.display_name().unwrap_or(&self.config.symbol);
        let line = format!("{name} {decorator} {price}");

        let (nickname, status) = if self.config.nickname {
            let backend = self.config.token.as_ref().map(|t| t.source).unwrap_or_default();
            let status = match backend {
                TokenBackend::OneInch => "Using USDC on 1inch",
                TokenBackend::PancakeSwap => "Priced in BNB on PancakeSwap",
            };
            (Some(line), status.to_string())
        } else {
            (None, line)
        };

        DisplaySet {
            value,
            price,
            change: String::new(),
            increase,
            decorator,
            nickname,
            status,
            extended: None,
        }
    }
}

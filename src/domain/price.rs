//! Adjusted-close price history for a single symbol.

use crate::domain::error::QuantError;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Date-ordered adjusted closes for one symbol. Dates are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, rejecting duplicate or out-of-order dates and unusable prices.
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, QuantError> {
        let symbol = symbol.into();
        check_prices(&symbol, &points)?;
        if let Some(pair) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(QuantError::InvalidPriceSeries {
                symbol,
                reason: format!("date {} does not follow {}", pair[1].date, pair[0].date),
            });
        }
        Ok(Self { symbol, points })
    }

    /// Build a series from unordered points, sorting by date. Later duplicates win.
    pub fn from_unsorted(
        symbol: impl Into<String>,
        mut points: Vec<PricePoint>,
    ) -> Result<Self, QuantError> {
        let symbol = symbol.into();
        check_prices(&symbol, &points)?;
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Ok(Self {
            symbol,
            points: deduped,
        })
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            points: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Prices dated on or before `as_of`.
    pub fn truncated(&self, as_of: NaiveDate) -> PriceSeries {
        let end = self.points.partition_point(|p| p.date <= as_of);
        PriceSeries {
            symbol: self.symbol.clone(),
            points: self.points[..end].to_vec(),
        }
    }

    /// Most recent price dated on or before `date`.
    pub fn price_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let end = self.points.partition_point(|p| p.date <= date);
        if end == 0 {
            None
        } else {
            Some(self.points[end - 1].price)
        }
    }
}

/// Adjusted closes must be finite and strictly positive.
fn check_prices(symbol: &str, points: &[PricePoint]) -> Result<(), QuantError> {
    match points.iter().find(|p| !p.price.is_finite() || p.price <= 0.0) {
        Some(bad) => Err(QuantError::InvalidPriceSeries {
            symbol: symbol.to_string(),
            reason: format!("price {} on {} is not a positive number", bad.price, bad.date),
        }),
        None => Ok(()),
    }
}

//! SQLite storage adapter for prices, the ticker registry and portfolio snapshots.

use std::path::Path;

use crate::domain::error::QuantError;
use crate::domain::portfolio::{AssetClass, TargetPortfolio, TargetPosition};
use crate::domain::price::{PricePoint, PriceSeries};
use crate::domain::settings::Settings;
use crate::domain::universe::{TickerInfo, TickerType, Universe};
use crate::ports::price_port::PricePort;
use crate::ports::snapshot_port::SnapshotPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_error(e: rusqlite::Error) -> QuantError {
    QuantError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, QuantError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e: chrono::ParseError| {
        QuantError::Database {
            reason: format!("bad stored date '{text}': {e}"),
        }
    })
}

impl SqliteAdapter {
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, QuantError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e: r2d2::Error| QuantError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, QuantError> {
        if let Some(parent) = settings.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::open(&settings.database_path, settings.pool_size)
    }

    pub fn in_memory() -> Result<Self, QuantError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| QuantError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, QuantError> {
        self.pool.get().map_err(|e: r2d2::Error| QuantError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), QuantError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS tickers (
                symbol TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                asset_type TEXT NOT NULL,
                universe TEXT NOT NULL,
                currency TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS prices_daily (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                adj_close REAL NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_prices_daily_date ON prices_daily(date);
            CREATE TABLE IF NOT EXISTS portfolio_snapshots (
                as_of_date TEXT PRIMARY KEY,
                universe_name TEXT NOT NULL,
                equity_exposure REAL NOT NULL,
                defensive_exposure REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS snapshot_positions (
                as_of_date TEXT NOT NULL,
                ordinal INTEGER NOT NULL,
                ticker TEXT NOT NULL,
                weight REAL NOT NULL,
                asset_class TEXT NOT NULL,
                PRIMARY KEY (as_of_date, ordinal)
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    pub fn upsert_tickers(&self, tickers: &[TickerInfo]) -> Result<usize, QuantError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for info in tickers {
            tx.execute(
                "INSERT OR REPLACE INTO tickers (symbol, name, asset_type, universe, currency)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    info.symbol,
                    info.name,
                    info.asset_type.as_str(),
                    info.universe.name(),
                    info.currency
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(tickers.len())
    }

    /// Insert or overwrite every point of `series`. Returns the number of rows written.
    pub fn upsert_prices(&self, series: &PriceSeries) -> Result<usize, QuantError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for point in series.points() {
            tx.execute(
                "INSERT OR REPLACE INTO prices_daily (symbol, date, adj_close)
                 VALUES (?1, ?2, ?3)",
                params![
                    series.symbol(),
                    point.date.format(DATE_FORMAT).to_string(),
                    point.price
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(series.len())
    }

    pub fn latest_price_date(&self, symbol: &str) -> Result<Option<NaiveDate>, QuantError> {
        let conn = self.conn()?;
        let latest: Option<String> = conn
            .query_row(
                "SELECT MAX(date) FROM prices_daily WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .map_err(query_error)?;
        latest.as_deref().map(parse_date).transpose()
    }

    pub fn snapshot_dates(&self) -> Result<Vec<NaiveDate>, QuantError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT as_of_date FROM portfolio_snapshots ORDER BY as_of_date ASC")
            .map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(query_error)?;

        let mut dates = Vec::new();
        for row in rows {
            dates.push(parse_date(&row.map_err(query_error)?)?);
        }
        Ok(dates)
    }

    fn load_positions(conn: &Connection, as_of: &str) -> Result<Vec<TargetPosition>, QuantError> {
        let mut stmt = conn
            .prepare(
                "SELECT ticker, weight, asset_class FROM snapshot_positions
                 WHERE as_of_date = ?1 ORDER BY ordinal ASC",
            )
            .map_err(query_error)?;
        let rows = stmt
            .query_map(params![as_of], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(query_error)?;

        let mut positions = Vec::new();
        for row in rows {
            let (ticker, weight, asset_class) = row.map_err(query_error)?;
            let asset_class = asset_class
                .parse::<AssetClass>()
                .map_err(|reason| QuantError::Database { reason })?;
            positions.push(TargetPosition {
                ticker,
                weight,
                asset_class,
            });
        }
        Ok(positions)
    }

    fn load_snapshots(
        conn: &Connection,
        query: &str,
    ) -> Result<Vec<TargetPortfolio>, QuantError> {
        let mut stmt = conn.prepare(query).map_err(query_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })
            .map_err(query_error)?;

        let mut headers = Vec::new();
        for row in rows {
            headers.push(row.map_err(query_error)?);
        }

        let mut snapshots = Vec::with_capacity(headers.len());
        for (as_of, universe_name, equity_exposure, defensive_exposure) in headers {
            snapshots.push(TargetPortfolio {
                as_of_date: parse_date(&as_of)?,
                positions: Self::load_positions(conn, &as_of)?,
                universe_name,
                equity_exposure,
                defensive_exposure,
            });
        }
        Ok(snapshots)
    }
}

impl PricePort for SqliteAdapter {
    fn load_price_series(&self, symbol: &str, as_of: NaiveDate) -> Result<PriceSeries, QuantError> {
        let conn = self.conn()?;
        let as_of_str = as_of.format(DATE_FORMAT).to_string();

        let mut stmt = conn
            .prepare(
                "SELECT date, adj_close FROM prices_daily
                 WHERE symbol = ?1 AND date <= ?2
                 ORDER BY date ASC",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![symbol, as_of_str], |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        date_str.len(),
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(PricePoint {
                    date,
                    price: row.get(1)?,
                })
            })
            .map_err(query_error)?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row.map_err(query_error)?);
        }

        PriceSeries::new(symbol, points)
    }

    fn load_universe_symbols(&self, universe: Universe) -> Result<Vec<String>, QuantError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol FROM tickers
                 WHERE universe = ?1 AND asset_type = ?2
                 ORDER BY symbol",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![universe.name(), TickerType::Equity.as_str()], |row| {
                row.get(0)
            })
            .map_err(query_error)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_error)?);
        }

        Ok(symbols)
    }

    fn price_on_or_before(&self, symbol: &str, date: NaiveDate) -> Result<Option<f64>, QuantError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT adj_close FROM prices_daily
             WHERE symbol = ?1 AND date <= ?2
             ORDER BY date DESC LIMIT 1",
            params![symbol, date.format(DATE_FORMAT).to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_error)
    }
}

impl SnapshotPort for SqliteAdapter {
    fn load_latest_snapshot(&self) -> Result<Option<TargetPortfolio>, QuantError> {
        let conn = self.conn()?;
        let mut latest = Self::load_snapshots(
            &conn,
            "SELECT as_of_date, universe_name, equity_exposure, defensive_exposure
             FROM portfolio_snapshots ORDER BY as_of_date DESC LIMIT 1",
        )?;
        Ok(latest.pop())
    }

    fn load_all_snapshots_ordered(&self) -> Result<Vec<TargetPortfolio>, QuantError> {
        let conn = self.conn()?;
        Self::load_snapshots(
            &conn,
            "SELECT as_of_date, universe_name, equity_exposure, defensive_exposure
             FROM portfolio_snapshots ORDER BY as_of_date ASC",
        )
    }

    fn save_snapshot(&self, portfolio: &TargetPortfolio) -> Result<(), QuantError> {
        let mut conn = self.conn()?;
        let as_of = portfolio.as_of_date.format(DATE_FORMAT).to_string();
        let tx = conn.transaction().map_err(query_error)?;

        tx.execute(
            "DELETE FROM snapshot_positions WHERE as_of_date = ?1",
            params![as_of],
        )
        .map_err(query_error)?;
        tx.execute(
            "DELETE FROM portfolio_snapshots WHERE as_of_date = ?1",
            params![as_of],
        )
        .map_err(query_error)?;

        tx.execute(
            "INSERT INTO portfolio_snapshots
                 (as_of_date, universe_name, equity_exposure, defensive_exposure)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                as_of,
                portfolio.universe_name,
                portfolio.equity_exposure,
                portfolio.defensive_exposure
            ],
        )
        .map_err(query_error)?;

        for (ordinal, position) in portfolio.positions.iter().enumerate() {
            tx.execute(
                "INSERT INTO snapshot_positions (as_of_date, ordinal, ticker, weight, asset_class)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    as_of,
                    ordinal as i64,
                    position.ticker,
                    position.weight,
                    position.asset_class.as_str()
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::universe::REGISTRY;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn series(symbol: &str, points: &[(NaiveDate, f64)]) -> PriceSeries {
        PriceSeries::new(
            symbol,
            points
                .iter()
                .map(|&(date, price)| PricePoint { date, price })
                .collect(),
        )
        .unwrap()
    }

    fn portfolio(as_of: NaiveDate, equity: f64) -> TargetPortfolio {
        let defensive = 1.0 - equity;
        TargetPortfolio {
            as_of_date: as_of,
            positions: vec![
                TargetPosition {
                    ticker: "MSFT".to_string(),
                    weight: equity,
                    asset_class: AssetClass::Equity,
                },
                TargetPosition {
                    ticker: "GLD".to_string(),
                    weight: defensive * 0.4,
                    asset_class: AssetClass::Gold,
                },
                TargetPosition {
                    ticker: "BIL".to_string(),
                    weight: defensive * 0.6,
                    asset_class: AssetClass::Cash,
                },
            ],
            universe_name: "NASDAQ100".to_string(),
            equity_exposure: equity,
            defensive_exposure: defensive,
        }
    }

    #[test]
    fn schema_initialization_is_repeatable() {
        let adapter = adapter();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn load_price_series_respects_as_of() {
        let adapter = adapter();
        adapter
            .upsert_prices(&series(
                "SPY",
                &[(d(2024, 1, 2), 470.0), (d(2024, 1, 3), 468.5), (d(2024, 1, 4), 467.0)],
            ))
            .unwrap();

        let loaded = adapter.load_price_series("SPY", d(2024, 1, 3)).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.last().unwrap().price, 468.5);

        let unknown = adapter.load_price_series("NOPE", d(2024, 1, 3)).unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn upsert_prices_overwrites_existing_dates() {
        let adapter = adapter();
        adapter
            .upsert_prices(&series("GLD", &[(d(2024, 1, 2), 190.0)]))
            .unwrap();
        adapter
            .upsert_prices(&series("GLD", &[(d(2024, 1, 2), 191.0), (d(2024, 1, 3), 192.0)]))
            .unwrap();

        let loaded = adapter.load_price_series("GLD", d(2024, 12, 31)).unwrap();
        assert_eq!(loaded.prices(), vec![191.0, 192.0]);
        assert_eq!(adapter.latest_price_date("GLD").unwrap(), Some(d(2024, 1, 3)));
        assert_eq!(adapter.latest_price_date("BIL").unwrap(), None);
    }

    #[test]
    fn price_on_or_before_uses_last_available_close() {
        let adapter = adapter();
        adapter
            .upsert_prices(&series("BIL", &[(d(2024, 1, 2), 91.0), (d(2024, 1, 5), 91.2)]))
            .unwrap();

        assert_eq!(adapter.price_on_or_before("BIL", d(2024, 1, 4)).unwrap(), Some(91.0));
        assert_eq!(adapter.price_on_or_before("BIL", d(2024, 1, 5)).unwrap(), Some(91.2));
        assert_eq!(adapter.price_on_or_before("BIL", d(2024, 1, 1)).unwrap(), None);
    }

    #[test]
    fn universe_symbols_come_from_registry_equities() {
        let adapter = adapter();
        adapter.upsert_tickers(REGISTRY).unwrap();
        assert_eq!(
            adapter.load_universe_symbols(Universe::Nasdaq100).unwrap(),
            vec!["AAPL", "MSFT"]
        );
        assert!(adapter.load_universe_symbols(Universe::Benchmark).unwrap().is_empty());
    }

    #[test]
    fn snapshots_round_trip_in_date_order() {
        let adapter = adapter();
        assert!(adapter.load_latest_snapshot().unwrap().is_none());

        adapter.save_snapshot(&portfolio(d(2024, 2, 29), 0.7)).unwrap();
        adapter.save_snapshot(&portfolio(d(2024, 1, 31), 0.8)).unwrap();

        let all = adapter.load_all_snapshots_ordered().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], portfolio(d(2024, 1, 31), 0.8));
        assert_eq!(all[1].as_of_date, d(2024, 2, 29));

        let latest = adapter.load_latest_snapshot().unwrap().unwrap();
        assert_eq!(latest.as_of_date, d(2024, 2, 29));
        assert_eq!(latest.positions[0].ticker, "MSFT");
        assert_eq!(adapter.snapshot_dates().unwrap(), vec![d(2024, 1, 31), d(2024, 2, 29)]);
    }

    #[test]
    fn saving_same_date_replaces_snapshot() {
        let adapter = adapter();
        adapter.save_snapshot(&portfolio(d(2024, 1, 31), 0.8)).unwrap();

        let mut replacement = portfolio(d(2024, 1, 31), 0.5);
        replacement.positions.truncate(2);
        replacement.positions[1].weight = 0.5;
        adapter.save_snapshot(&replacement).unwrap();

        let all = adapter.load_all_snapshots_ordered().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], replacement);
    }

    #[test]
    fn file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quant.db");
        let settings = Settings {
            database_path: path.clone(),
            ..Settings::default()
        };

        {
            let adapter = SqliteAdapter::from_settings(&settings).unwrap();
            adapter.initialize_schema().unwrap();
            adapter.save_snapshot(&portfolio(d(2024, 1, 31), 0.8)).unwrap();
        }

        let reopened = SqliteAdapter::open(&path, 1).unwrap();
        assert_eq!(reopened.snapshot_dates().unwrap(), vec![d(2024, 1, 31)]);
    }
}

//! SQLite store for candles and run output.
//!
//! Candles accumulate: they are upserted by timestamp. The run output tables
//! (indicators, signals, orders, equity curve, performance) hold the latest
//! run only. Each write clears the tables it owns and inserts the new rows in
//! one transaction, so persisting the same run twice leaves the database
//! unchanged and nothing from an earlier run survives.

use crate::domain::error::PerptraderError;
use crate::domain::metrics::BacktestResult;
use crate::domain::ohlcv::Bar;
use crate::domain::position::OrderRecord;
use crate::domain::run_state::EquityPoint;
use crate::domain::signal::SignalRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::result_port::ResultPort;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

/// Fixed-width UTC text so lexical order matches time order.
fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn ts_from_sql(raw: &str) -> Result<DateTime<Utc>, PerptraderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PerptraderError::Database {
            reason: format!("invalid stored timestamp '{raw}': {e}"),
        })
}

fn query_err(e: rusqlite::Error) -> PerptraderError {
    PerptraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PerptraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PerptraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        Self::open(&db_path, pool_size)
    }

    pub fn open(db_path: &str, pool_size: u32) -> Result<Self, PerptraderError> {
        let manager = SqliteConnectionManager::file(db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| PerptraderError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, PerptraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| PerptraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PerptraderError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PerptraderError::Database {
                reason: e.to_string(),
            })
    }

    pub fn initialize_schema(&self) -> Result<(), PerptraderError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candles (
                ts TEXT PRIMARY KEY,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS indicators (
                ts TEXT PRIMARY KEY,
                close REAL NOT NULL,
                rsi_fast REAL,
                rsi_slow REAL,
                bb_mid REAL,
                bb_upper REAL,
                bb_lower REAL,
                env_mid REAL,
                env_upper REAL,
                env_lower REAL,
                sma REAL
            );
            CREATE TABLE IF NOT EXISTS signals (
                ts TEXT NOT NULL,
                signal_name TEXT NOT NULL,
                PRIMARY KEY (ts, signal_name)
            );
            CREATE TABLE IF NOT EXISTS orders (
                seq INTEGER PRIMARY KEY,
                ts TEXT NOT NULL,
                side TEXT NOT NULL,
                price REAL NOT NULL,
                qty REAL NOT NULL,
                pos_after REAL NOT NULL,
                balance_after REAL NOT NULL,
                realized_pnl REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS equity_curve (
                ts TEXT PRIMARY KEY,
                equity REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS trading_performance (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                start_balance REAL NOT NULL,
                end_balance REAL NOT NULL,
                total_return REAL NOT NULL,
                total_trades INTEGER NOT NULL,
                long_trades INTEGER NOT NULL,
                short_trades INTEGER NOT NULL,
                winning_trades INTEGER NOT NULL,
                losing_trades INTEGER NOT NULL,
                winrate REAL NOT NULL,
                max_drawdown REAL NOT NULL,
                sharpe REAL,
                funding_paid_total REAL NOT NULL
            );",
        )
        .map_err(query_err)?;

        Ok(())
    }

    pub fn upsert_bars(&self, bars: &[Bar]) -> Result<(), PerptraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT INTO candles (ts, open, high, low, close)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(ts) DO UPDATE SET
                    open = excluded.open, high = excluded.high,
                    low = excluded.low, close = excluded.close",
                params![ts_to_sql(&bar.timestamp), bar.open, bar.high, bar.low, bar.close],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    /// Stored performance row, if a run has been persisted.
    pub fn load_result(&self) -> Result<Option<BacktestResult>, PerptraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT start_balance, end_balance, total_return, total_trades, long_trades,
                        short_trades, winning_trades, losing_trades, winrate, max_drawdown,
                        sharpe, funding_paid_total
                 FROM trading_performance WHERE id = 1",
            )
            .map_err(query_err)?;

        let mut rows = stmt
            .query_map([], |row| {
                Ok(BacktestResult {
                    start_balance: row.get(0)?,
                    end_balance: row.get(1)?,
                    total_return: row.get(2)?,
                    total_trades: row.get::<_, i64>(3)? as usize,
                    long_trades: row.get::<_, i64>(4)? as usize,
                    short_trades: row.get::<_, i64>(5)? as usize,
                    winning_trades: row.get::<_, i64>(6)? as usize,
                    losing_trades: row.get::<_, i64>(7)? as usize,
                    win_rate: row.get(8)?,
                    max_drawdown: row.get(9)?,
                    sharpe: row.get(10)?,
                    funding_paid_total: row.get(11)?,
                })
            })
            .map_err(query_err)?;

        rows.next().transpose().map_err(query_err)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>, PerptraderError> {
        let conn = self.conn()?;
        let start_str = start.as_ref().map(ts_to_sql);
        let end_str = end.as_ref().map(ts_to_sql);

        let mut stmt = conn
            .prepare(
                "SELECT ts, open, high, low, close
                 FROM candles
                 WHERE (?1 IS NULL OR ts >= ?1) AND (?2 IS NULL OR ts <= ?2)
                 ORDER BY ts ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![start_str, end_str], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })
            .map_err(query_err)?;

        let mut bars = Vec::new();
        for row in rows {
            let (ts, open, high, low, close) = row.map_err(query_err)?;
            bars.push(Bar::new(ts_from_sql(&ts)?, open, high, low, close));
        }
        Ok(bars)
    }

    fn get_data_range(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, PerptraderError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row("SELECT MIN(ts), MAX(ts), COUNT(*) FROM candles", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(query_err)?;

        match result {
            (Some(min), Some(max), count) if count > 0 => {
                Ok(Some((ts_from_sql(&min)?, ts_from_sql(&max)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl ResultPort for SqliteAdapter {
    fn write_result(&self, result: &BacktestResult) -> Result<(), PerptraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute(
            "INSERT INTO trading_performance (
                id, start_balance, end_balance, total_return, total_trades, long_trades,
                short_trades, winning_trades, losing_trades, winrate, max_drawdown, sharpe,
                funding_paid_total)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                start_balance = excluded.start_balance,
                end_balance = excluded.end_balance,
                total_return = excluded.total_return,
                total_trades = excluded.total_trades,
                long_trades = excluded.long_trades,
                short_trades = excluded.short_trades,
                winning_trades = excluded.winning_trades,
                losing_trades = excluded.losing_trades,
                winrate = excluded.winrate,
                max_drawdown = excluded.max_drawdown,
                sharpe = excluded.sharpe,
                funding_paid_total = excluded.funding_paid_total",
            params![
                result.start_balance,
                result.end_balance,
                result.total_return,
                result.total_trades as i64,
                result.long_trades as i64,
                result.short_trades as i64,
                result.winning_trades as i64,
                result.losing_trades as i64,
                result.win_rate,
                result.max_drawdown,
                result.sharpe,
                result.funding_paid_total,
            ],
        )
        .map_err(query_err)?;
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn write_equity_curve(&self, curve: &[EquityPoint]) -> Result<(), PerptraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM equity_curve", []).map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO equity_curve (ts, equity) VALUES (?1, ?2)
                     ON CONFLICT(ts) DO UPDATE SET equity = excluded.equity",
                )
                .map_err(query_err)?;
            for point in curve {
                stmt.execute(params![ts_to_sql(&point.timestamp), point.equity])
                    .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn write_orders(&self, orders: &[OrderRecord]) -> Result<(), PerptraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute("DELETE FROM orders", []).map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO orders (
                        seq, ts, side, price, qty, pos_after, balance_after, realized_pnl)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(seq) DO UPDATE SET
                        ts = excluded.ts, side = excluded.side, price = excluded.price,
                        qty = excluded.qty, pos_after = excluded.pos_after,
                        balance_after = excluded.balance_after,
                        realized_pnl = excluded.realized_pnl",
                )
                .map_err(query_err)?;
            for (seq, order) in orders.iter().enumerate() {
                stmt.execute(params![
                    seq as i64,
                    ts_to_sql(&order.timestamp),
                    order.side.as_str(),
                    order.fill_price,
                    order.quantity,
                    order.position_after,
                    order.balance_after,
                    order.realized_pnl,
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }

    fn write_signals(&self, signals: &[SignalRecord]) -> Result<(), PerptraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute_batch("DELETE FROM indicators; DELETE FROM signals;")
            .map_err(query_err)?;
        {
            let mut indicators = tx
                .prepare(
                    "INSERT INTO indicators (
                        ts, close, rsi_fast, rsi_slow, bb_mid, bb_upper, bb_lower,
                        env_mid, env_upper, env_lower, sma)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(ts) DO UPDATE SET
                        close = excluded.close,
                        rsi_fast = excluded.rsi_fast, rsi_slow = excluded.rsi_slow,
                        bb_mid = excluded.bb_mid, bb_upper = excluded.bb_upper,
                        bb_lower = excluded.bb_lower, env_mid = excluded.env_mid,
                        env_upper = excluded.env_upper, env_lower = excluded.env_lower,
                        sma = excluded.sma",
                )
                .map_err(query_err)?;
            let mut named = tx
                .prepare(
                    "INSERT INTO signals (ts, signal_name) VALUES (?1, ?2)
                     ON CONFLICT(ts, signal_name) DO NOTHING",
                )
                .map_err(query_err)?;

            for record in signals {
                let ts = ts_to_sql(&record.timestamp);
                indicators
                    .execute(params![
                        ts,
                        record.close,
                        record.rsi_fast,
                        record.rsi_slow,
                        record.bb_mid,
                        record.bb_upper,
                        record.bb_lower,
                        record.env_mid,
                        record.env_upper,
                        record.env_lower,
                        record.sma,
                    ])
                    .map_err(query_err)?;
                for name in record.fired_flags() {
                    named.execute(params![ts, name]).map_err(query_err)?;
                }
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestConfig, run_backtest};
    use crate::domain::indicator::IndicatorRow;
    use crate::domain::signal::SignalFlags;
    use chrono::TimeZone;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    fn count(adapter: &SqliteAdapter, table: &str) -> i64 {
        let conn = adapter.conn().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    fn minute_bars(prices: &[f64]) -> Vec<Bar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                let ts = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
                Bar::new(ts, p, p + 0.5, p - 0.5, p)
            })
            .collect()
    }

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 2.0 + (i as f64 * 0.07).cos())
            .collect()
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(PerptraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn in_memory_initialization_is_repeatable() {
        let adapter = adapter();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn upsert_and_fetch_bars() {
        let adapter = adapter();
        let bars = minute_bars(&[100.0, 101.0, 102.0]);
        adapter.upsert_bars(&bars).unwrap();
        adapter.upsert_bars(&bars).unwrap();

        let fetched = adapter.fetch_bars(None, None).unwrap();
        assert_eq!(fetched, bars);
    }

    #[test]
    fn upsert_overwrites_existing_candle() {
        let adapter = adapter();
        let mut bars = minute_bars(&[100.0]);
        adapter.upsert_bars(&bars).unwrap();
        bars[0].close = 99.0;
        adapter.upsert_bars(&bars).unwrap();
        let fetched = adapter.fetch_bars(None, None).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].close, 99.0);
    }

    #[test]
    fn fetch_bars_with_range() {
        let adapter = adapter();
        let bars = minute_bars(&[1.0, 2.0, 3.0, 4.0]);
        adapter.upsert_bars(&bars).unwrap();
        let fetched = adapter
            .fetch_bars(Some(bars[1].timestamp), Some(bars[2].timestamp))
            .unwrap();
        assert_eq!(fetched, bars[1..3].to_vec());
    }

    #[test]
    fn data_range() {
        let adapter = adapter();
        assert_eq!(adapter.get_data_range().unwrap(), None);

        let bars = minute_bars(&[1.0, 2.0, 3.0]);
        adapter.upsert_bars(&bars).unwrap();
        let (min, max, count) = adapter.get_data_range().unwrap().unwrap();
        assert_eq!(min, bars[0].timestamp);
        assert_eq!(max, bars[2].timestamp);
        assert_eq!(count, 3);
    }

    #[test]
    fn write_output_is_idempotent() {
        let adapter = adapter();
        let bars = minute_bars(&wave(200));
        let output = run_backtest(&bars, &BacktestConfig::default()).unwrap();

        adapter.write_output(&output).unwrap();
        let first = (
            count(&adapter, "indicators"),
            count(&adapter, "signals"),
            count(&adapter, "orders"),
            count(&adapter, "equity_curve"),
        );
        adapter.write_output(&output).unwrap();
        let second = (
            count(&adapter, "indicators"),
            count(&adapter, "signals"),
            count(&adapter, "orders"),
            count(&adapter, "equity_curve"),
        );

        assert_eq!(first, second);
        assert_eq!(first.0, 200);
        assert_eq!(first.2, output.orders.len() as i64);
        assert_eq!(first.3, 200);
        assert_eq!(count(&adapter, "trading_performance"), 1);
        assert_eq!(adapter.load_result().unwrap(), Some(output.result));
    }

    #[test]
    fn shorter_order_log_replaces_longer_one() {
        let adapter = adapter();
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let order = OrderRecord {
            timestamp: ts,
            side: crate::domain::position::Side::Buy,
            fill_price: 100.0,
            quantity: 1.0,
            position_after: 1.0,
            balance_after: 10_000.0,
            realized_pnl: 0.0,
        };
        adapter.write_orders(&[order.clone(), order.clone(), order.clone()]).unwrap();
        adapter.write_orders(&[order]).unwrap();
        assert_eq!(count(&adapter, "orders"), 1);
    }

    fn signal_record(minute: i64, flags: SignalFlags) -> SignalRecord {
        let row = IndicatorRow {
            timestamp: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            close: 100.0,
            rsi_fast: None,
            rsi_slow: None,
            bollinger: None,
            envelope: None,
            sma: None,
        };
        SignalRecord::new(&row, &flags)
    }

    fn stored_signal_names(adapter: &SqliteAdapter) -> Vec<String> {
        let conn = adapter.conn().unwrap();
        let mut stmt = conn
            .prepare("SELECT signal_name FROM signals ORDER BY ts, signal_name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<String>, _>>()
            .unwrap();
        names
    }

    #[test]
    fn every_true_flag_is_stored() {
        let adapter = adapter();
        let both = SignalFlags {
            long_imm_entry: true,
            short_entry: true,
            ..SignalFlags::default()
        };
        let none = SignalFlags::default();
        adapter
            .write_signals(&[signal_record(0, both), signal_record(1, none)])
            .unwrap();

        assert_eq!(count(&adapter, "indicators"), 2);
        assert_eq!(
            stored_signal_names(&adapter),
            vec!["long_imm_entry".to_string(), "short_entry".to_string()]
        );
    }

    #[test]
    fn rewrite_drops_rows_from_earlier_run() {
        let adapter = adapter();
        let long_run = run_backtest(&minute_bars(&wave(200)), &BacktestConfig::default()).unwrap();
        adapter.write_output(&long_run).unwrap();

        // Later bars only, so neither timestamp range contains the other.
        let later: Vec<Bar> = minute_bars(&wave(300)).split_off(250);
        let short_run = run_backtest(&later, &BacktestConfig::default()).unwrap();
        adapter.write_output(&short_run).unwrap();

        assert_eq!(count(&adapter, "equity_curve"), 50);
        assert_eq!(count(&adapter, "indicators"), 50);
        assert_eq!(count(&adapter, "orders"), short_run.orders.len() as i64);

        let conn = adapter.conn().unwrap();
        let earliest: String = conn
            .query_row("SELECT MIN(ts) FROM equity_curve", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ts_from_sql(&earliest).unwrap(), later[0].timestamp);
        let stale_signals: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM signals WHERE ts < ?1",
                params![ts_to_sql(&later[0].timestamp)],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stale_signals, 0);
    }

    #[test]
    fn load_result_empty() {
        assert_eq!(adapter().load_result().unwrap(), None);
    }

    #[test]
    fn undefined_sharpe_stored_as_null() {
        let adapter = adapter();
        let bars = minute_bars(&[100.0; 30]);
        let output = run_backtest(&bars, &BacktestConfig::default()).unwrap();
        adapter.write_result(&output.result).unwrap();
        let stored = adapter.load_result().unwrap().unwrap();
        assert_eq!(stored.sharpe, None);
    }
}

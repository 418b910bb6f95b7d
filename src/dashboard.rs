use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::aggregate::{aggregate, clean, daily_totals, monthly_totals};
use crate::db::Store;
use crate::export::{self, ExportError};
use crate::ingest::{self, ColumnMapping, IngestError};
use crate::models::{
    Analysis, AnalysisKind, CleanedTable, RawSale, ReportRecord, ReportSchedule,
};
use crate::session::{AuthError, Session};

/// Result of an interaction that may have hit a non-fatal persistence
/// problem along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    fn ok(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    fn degraded(value: T, warning: String) -> Self {
        warn!("{warning}");
        Self {
            value,
            warnings: vec![warning],
        }
    }
}

pub fn load(path: &Path, mapping: &ColumnMapping) -> Result<Vec<RawSale>, IngestError> {
    let rows = ingest::read_csv(path)?.map_columns(mapping)?;
    info!(rows = rows.len(), "loaded sales rows");
    Ok(rows)
}

pub fn analyze(rows: &[RawSale]) -> (CleanedTable, Analysis) {
    let table = clean(rows);
    info!(
        kept = table.records.len(),
        dropped = table.dropped,
        "cleaned sales table"
    );

    let analysis = Analysis {
        aggregation: aggregate(rows),
        daily: daily_totals(&table.records),
        monthly: monthly_totals(&table.records),
        rows_read: rows.len(),
        rows_dropped: table.dropped,
    };
    (table, analysis)
}

pub struct Dashboard {
    store: Store,
}

impl Dashboard {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn prepare(&self) -> Outcome<()> {
        match self.store.init().await {
            Ok(()) => Outcome::ok(()),
            Err(err) => Outcome::degraded(
                (),
                format!("sales database unavailable, nothing will be saved: {err}"),
            ),
        }
    }

    /// Log in against the store. If the store itself fails, the user keeps
    /// working in an offline session; bad credentials are still an error.
    pub async fn open_session(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Outcome<Session>, AuthError> {
        match Session::login(&self.store, username, password).await {
            Ok(session) => Ok(Outcome::ok(session)),
            Err(AuthError::Store(err)) => Ok(Outcome::degraded(
                Session::offline(username)?,
                format!("could not reach the account store, working offline: {err}"),
            )),
            Err(err) => Err(err),
        }
    }

    pub async fn default_view(&self, session: &Session) -> Outcome<AnalysisKind> {
        if session.is_offline() {
            return Outcome::ok(AnalysisKind::default());
        }
        match self.store.get_preference(session.username()).await {
            Ok(preference) => match preference.analysis_kind.parse() {
                Ok(kind) => Outcome::ok(kind),
                Err(err) => Outcome::degraded(AnalysisKind::default(), err),
            },
            Err(err) => Outcome::degraded(
                AnalysisKind::default(),
                format!("could not load saved preferences: {err}"),
            ),
        }
    }

    pub async fn preferences(&self, session: &Session) -> Outcome<Option<(String, String)>> {
        if session.is_offline() {
            return Outcome::degraded(None, "working offline, preferences unavailable".to_string());
        }
        match self.store.get_preference(session.username()).await {
            Ok(preference) => Outcome::ok(Some((
                preference.analysis_kind,
                preference.report_schedule,
            ))),
            Err(err) => Outcome::degraded(None, format!("could not load saved preferences: {err}")),
        }
    }

    pub async fn save_preferences(
        &self,
        session: &Session,
        kind: AnalysisKind,
        schedule: ReportSchedule,
    ) -> Outcome<bool> {
        if session.is_offline() {
            return Outcome::degraded(false, "working offline, preferences not saved".to_string());
        }
        match self
            .store
            .upsert_preference(session.username(), kind.as_str(), schedule.as_str())
            .await
        {
            Ok(()) => Outcome::ok(true),
            Err(err) => Outcome::degraded(false, format!("could not save preferences: {err}")),
        }
    }

    // Only the workbook is required; history and totals failures are warnings.
    pub async fn export(
        &self,
        session: &Session,
        table: &CleanedTable,
        analysis: &Analysis,
        out: &Path,
        totals_csv: Option<&Path>,
        generated_at: NaiveDateTime,
    ) -> Result<Outcome<PathBuf>, ExportError> {
        let bytes = export::to_xlsx(&table.records, &analysis.aggregation, generated_at)?;
        std::fs::write(out, &bytes)?;
        info!(path = %out.display(), bytes = bytes.len(), "wrote sales workbook");

        let mut outcome = if session.is_offline() {
            Outcome::degraded(
                out.to_path_buf(),
                "working offline, report not recorded in history".to_string(),
            )
        } else {
            let reference = out.display().to_string();
            match self
                .store
                .append_report_record(session.username(), &reference)
                .await
            {
                Ok(_) => Outcome::ok(out.to_path_buf()),
                Err(err) => Outcome::degraded(
                    out.to_path_buf(),
                    format!("report written but not recorded in history: {err}"),
                ),
            }
        };

        if let Some(path) = totals_csv {
            match write_totals(path, analysis) {
                Ok(()) => info!(path = %path.display(), "wrote product totals"),
                Err(err) => {
                    let warning = format!("could not write totals to {}: {err}", path.display());
                    warn!("{warning}");
                    outcome.warnings.push(warning);
                }
            }
        }

        Ok(outcome)
    }

    pub async fn history(&self, session: &Session) -> Outcome<Vec<ReportRecord>> {
        if session.is_offline() {
            return Outcome::degraded(Vec::new(), "working offline, history unavailable".to_string());
        }
        match self.store.list_reports(session.username()).await {
            Ok(reports) => Outcome::ok(reports),
            Err(err) => Outcome::degraded(Vec::new(), format!("could not load report history: {err}")),
        }
    }
}

fn write_totals(path: &Path, analysis: &Analysis) -> Result<(), ExportError> {
    std::fs::write(path, export::totals_to_csv(&analysis.aggregation)?)?;
    Ok(())
}

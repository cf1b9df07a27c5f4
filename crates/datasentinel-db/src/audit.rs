use datasentinel_core::models::{
    sort_history, AuditRecord, ConversionRecord, DashboardStats, HistoryEntry,
    NormalizationRecord, PredictionRecord, ProfileRecord, ValidationRecord,
};
use datasentinel_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres};

/// Table binding for an audit record type
pub trait AuditTable: AuditRecord + for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
    const COLUMNS: &'static str;
}

impl AuditTable for ValidationRecord {
    const TABLE: &'static str = "validation_results";
    const COLUMNS: &'static str = "id, email, input_file, status, result_path, created_at";
}

impl AuditTable for NormalizationRecord {
    const TABLE: &'static str = "normalized_files";
    const COLUMNS: &'static str = "id, email, input_file, normalized_file, created_at";
}

impl AuditTable for ConversionRecord {
    const TABLE: &'static str = "converted_files";
    const COLUMNS: &'static str = "id, email, original_file, converted_path, format, created_at";
}

impl AuditTable for ProfileRecord {
    const TABLE: &'static str = "profile_results";
    const COLUMNS: &'static str = "id, email, input_file, profile_url, drift_url, created_at";
}

impl AuditTable for PredictionRecord {
    const TABLE: &'static str = "prediction_results";
    const COLUMNS: &'static str =
        "id, email, input_file, status, target_column, result_path, created_at";
}

/// Repository for engine run records
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "validation_results", db.operation = "insert"))]
    pub async fn record_validation(
        &self,
        email: &str,
        input_file: &str,
        status: &str,
        result_path: Option<&str>,
    ) -> Result<ValidationRecord, AppError> {
        let sql = format!(
            "INSERT INTO validation_results (email, input_file, status, result_path) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ValidationRecord::COLUMNS
        );
        let record = sqlx::query_as::<Postgres, ValidationRecord>(&sql)
            .bind(email)
            .bind(input_file)
            .bind(status)
            .bind(result_path)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "normalized_files", db.operation = "insert"))]
    pub async fn record_normalization(
        &self,
        email: &str,
        input_file: &str,
        normalized_file: &str,
    ) -> Result<NormalizationRecord, AppError> {
        let sql = format!(
            "INSERT INTO normalized_files (email, input_file, normalized_file) \
             VALUES ($1, $2, $3) RETURNING {}",
            NormalizationRecord::COLUMNS
        );
        let record = sqlx::query_as::<Postgres, NormalizationRecord>(&sql)
            .bind(email)
            .bind(input_file)
            .bind(normalized_file)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "converted_files", db.operation = "insert"))]
    pub async fn record_conversion(
        &self,
        email: &str,
        original_file: &str,
        converted_path: &str,
        format: &str,
    ) -> Result<ConversionRecord, AppError> {
        let sql = format!(
            "INSERT INTO converted_files (email, original_file, converted_path, format) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ConversionRecord::COLUMNS
        );
        let record = sqlx::query_as::<Postgres, ConversionRecord>(&sql)
            .bind(email)
            .bind(original_file)
            .bind(converted_path)
            .bind(format)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "profile_results", db.operation = "insert"))]
    pub async fn record_profile(
        &self,
        email: &str,
        input_file: &str,
        profile_url: &str,
        drift_url: Option<&str>,
    ) -> Result<ProfileRecord, AppError> {
        let sql = format!(
            "INSERT INTO profile_results (email, input_file, profile_url, drift_url) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            ProfileRecord::COLUMNS
        );
        let record = sqlx::query_as::<Postgres, ProfileRecord>(&sql)
            .bind(email)
            .bind(input_file)
            .bind(profile_url)
            .bind(drift_url)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    #[tracing::instrument(skip(self), fields(db.table = "prediction_results", db.operation = "insert"))]
    pub async fn record_prediction(
        &self,
        email: &str,
        input_file: &str,
        status: &str,
        target_column: &str,
        result_path: Option<&str>,
    ) -> Result<PredictionRecord, AppError> {
        let sql = format!(
            "INSERT INTO prediction_results (email, input_file, status, target_column, result_path) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            PredictionRecord::COLUMNS
        );
        let record = sqlx::query_as::<Postgres, PredictionRecord>(&sql)
            .bind(email)
            .bind(input_file)
            .bind(status)
            .bind(target_column)
            .bind(result_path)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    /// A user's records of one kind, newest first.
    #[tracing::instrument(skip(self), fields(db.table = T::TABLE, db.operation = "select"))]
    pub async fn list<T: AuditTable>(&self, email: &str) -> Result<Vec<T>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE email = $1 ORDER BY created_at DESC, id DESC",
            T::COLUMNS,
            T::TABLE
        );
        let records = sqlx::query_as::<Postgres, T>(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// One record, only when it belongs to `email`.
    #[tracing::instrument(skip(self), fields(db.table = T::TABLE, db.operation = "select", db.record_id = id))]
    pub async fn get<T: AuditTable>(&self, email: &str, id: i64) -> Result<Option<T>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE email = $1 AND id = $2",
            T::COLUMNS,
            T::TABLE
        );
        let record = sqlx::query_as::<Postgres, T>(&sql)
            .bind(email)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn entries<T: AuditTable>(
        &self,
        email: &str,
        base_path: &str,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        Ok(self
            .list::<T>(email)
            .await?
            .iter()
            .map(|record| record.history_entry(base_path))
            .collect())
    }

    /// Every record the user owns, across all engines, newest first.
    pub async fn history(
        &self,
        email: &str,
        base_path: &str,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let mut entries = Vec::new();
        entries.extend(self.entries::<ValidationRecord>(email, base_path).await?);
        entries.extend(self.entries::<NormalizationRecord>(email, base_path).await?);
        entries.extend(self.entries::<ConversionRecord>(email, base_path).await?);
        entries.extend(self.entries::<ProfileRecord>(email, base_path).await?);
        entries.extend(self.entries::<PredictionRecord>(email, base_path).await?);
        sort_history(&mut entries);
        Ok(entries)
    }

    #[tracing::instrument(skip(self), fields(db.operation = "count"))]
    pub async fn stats(&self, email: &str) -> Result<DashboardStats, AppError> {
        let (validation, normalization, conversion, profiling, prediction) =
            sqlx::query_as::<Postgres, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM validation_results WHERE email = $1),
                    (SELECT COUNT(*) FROM normalized_files WHERE email = $1),
                    (SELECT COUNT(*) FROM converted_files WHERE email = $1),
                    (SELECT COUNT(*) FROM profile_results WHERE email = $1),
                    (SELECT COUNT(*) FROM prediction_results WHERE email = $1)
                "#,
            )
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            validation,
            normalization,
            conversion,
            profiling,
            prediction,
        })
    }
}

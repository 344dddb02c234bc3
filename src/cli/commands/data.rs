use std::path::Path;

use anyhow::Context;
use serde_json::json;

use crate::cli::utils::{connect, output_error, output_success};
use crate::cli::OutputFormat;
use crate::database::models::{TourInput, TourRecord};
use crate::database::DatabaseManager;
use crate::services::TourService;

/// Parse and validate every tour before anything is written
pub fn parse_tours(content: &str) -> anyhow::Result<Vec<TourRecord>> {
    let inputs: Vec<TourInput> = serde_json::from_str(content).context("Expected a JSON array of tours")?;

    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            let name = input.name.clone().unwrap_or_else(|| format!("#{}", index));
            input.validate().with_context(|| format!("Tour {} is invalid", name))
        })
        .collect()
}

pub async fn import(file: &Path, output_format: OutputFormat) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("Cannot read {}", file.display()))?;
    let records = parse_tours(&content)?;

    let pool = connect().await?;
    let service = TourService::new(pool.clone());

    let mut imported = 0usize;
    for record in &records {
        match service.insert(record).await {
            Ok(_) => imported += 1,
            Err(e) => output_error(output_format, &format!("Skipped {}: {}", record.name, e))?,
        }
    }
    DatabaseManager::close(&pool).await;

    tracing::info!(imported, total = records.len(), "Import finished");
    output_success(
        output_format,
        &format!("Imported {} of {} tours", imported, records.len()),
        Some(json!({ "imported": imported, "total": records.len() })),
    )
}

pub async fn delete(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = connect().await?;
    let deleted = TourService::new(pool.clone()).delete_all().await?;
    DatabaseManager::close(&pool).await;

    output_success(
        output_format,
        &format!("Deleted {} tours", deleted),
        Some(json!({ "deleted": deleted })),
    )
}

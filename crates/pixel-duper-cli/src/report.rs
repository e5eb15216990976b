use colored::*;
use pixel_duper_core::entity::FingerprintEntity;
use pixel_duper_core::CompareResult;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    kind: &'a str,
    path: &'a str,
    size: u64,
    width: u32,
    height: u32,
    format: &'a str,
    other_path: Option<&'a str>,
    other_size: Option<u64>,
    other_width: Option<u32>,
    other_height: Option<u32>,
    transform: Option<String>,
    difference: Option<f64>,
    defect: Option<&'a str>,
}

impl<'a> ResultRecord<'a> {
    fn from_result(result: &'a CompareResult) -> Self {
        match result {
            CompareResult::Duplicate {
                first,
                second,
                transform,
                difference,
            } => ResultRecord {
                other_path: Some(second.path().as_str()),
                other_size: Some(second.identity.size),
                other_width: Some(second.width),
                other_height: Some(second.height),
                transform: Some(transform.to_string()),
                difference: Some(*difference),
                ..ResultRecord::single(result.kind(), first)
            },
            CompareResult::Defect { entity, defect } => ResultRecord {
                defect: Some(defect.name()),
                ..ResultRecord::single(result.kind(), entity)
            },
        }
    }

    fn single(kind: &'a str, entity: &'a FingerprintEntity) -> Self {
        ResultRecord {
            kind,
            path: entity.path().as_str(),
            size: entity.identity.size,
            width: entity.width,
            height: entity.height,
            format: entity.format.name(),
            other_path: None,
            other_size: None,
            other_width: None,
            other_height: None,
            transform: None,
            difference: None,
            defect: None,
        }
    }
}

pub fn print_results(results: &[CompareResult]) {
    for result in results {
        match result {
            CompareResult::Duplicate {
                first,
                second,
                transform,
                difference,
            } => {
                println!(
                    "{} {:>6} {} {}x{} <-> {} {}x{} [{}]",
                    "DUPLICATE".red(),
                    format!("{:.2}%", difference).yellow(),
                    first.path(),
                    first.width,
                    first.height,
                    second.path(),
                    second.width,
                    second.height,
                    transform.to_string().cyan(),
                );
            }
            CompareResult::Defect { entity, defect } => {
                println!(
                    "{} {} {}",
                    "DEFECT".magenta(),
                    defect.name().yellow(),
                    entity.path(),
                );
            }
        }
    }
}

pub fn write_csv(file: &Path, results: &[CompareResult]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(file)?;
    for result in results {
        writer.serialize(ResultRecord::from_result(result))?;
    }
    writer.flush()?;
    Ok(results.len())
}

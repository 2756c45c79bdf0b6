//! JSON import and export of cache dumps and sweep results.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::analysis::AnalysisResult;
use crate::cache::CacheDump;
use crate::error::{EvalError, Result};

/// Render a cache dump as pretty-printed JSON.
///
/// Entities become object keys; timestamps are epoch milliseconds.
pub fn cache_dump_to_json(dump: &CacheDump) -> Result<String> {
    Ok(serde_json::to_string_pretty(dump)?)
}

/// Parse a cache dump from JSON.
///
/// # Errors
///
/// Returns an error if the JSON cannot be parsed or a detection is filed
/// under an entity other than its own.
///
/// # Example
///
/// ```
/// use detection_eval::export::cache_dump_from_json;
///
/// let json = r#"{
///     "7": {
///         "annotations": {
///             "timestamp": 1500000000000,
///             "results": [{"id": 3, "relationType": "presynaptic_to"}]
///         }
///     }
/// }"#;
/// let dump = cache_dump_from_json(json).unwrap();
/// assert_eq!(dump[&7].annotations.as_ref().unwrap().results.len(), 1);
/// ```
pub fn cache_dump_from_json(json_str: &str) -> Result<CacheDump> {
    let dump: CacheDump = serde_json::from_str(json_str)?;
    validate_dump(&dump)?;
    Ok(dump)
}

/// Write a cache dump to a JSON file.
pub fn save_cache_dump<P: AsRef<Path>>(dump: &CacheDump, path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, dump)?;
    writer.flush()?;
    Ok(())
}

/// Read a cache dump from a JSON file.
///
/// ```no_run
/// use detection_eval::export::load_cache_dump;
///
/// let dump = load_cache_dump("cache.json").unwrap();
/// println!("Loaded {} entities", dump.len());
/// ```
pub fn load_cache_dump<P: AsRef<Path>>(path: P) -> Result<CacheDump> {
    let reader = BufReader::new(File::open(path)?);
    let dump: CacheDump = serde_json::from_reader(reader)?;
    validate_dump(&dump)?;
    Ok(dump)
}

/// Render sweep results, in generation order, as a JSON array.
///
/// Open constraint bounds and undefined F-scores become `null`.
pub fn sweep_to_json(results: &[AnalysisResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// Parse sweep results from a JSON array.
pub fn sweep_from_json(json_str: &str) -> Result<Vec<AnalysisResult>> {
    Ok(serde_json::from_str(json_str)?)
}

/// Write sweep results to a JSON file.
pub fn save_sweep<P: AsRef<Path>>(results: &[AnalysisResult], path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.flush()?;
    Ok(())
}

/// Read sweep results from a JSON file.
pub fn load_sweep<P: AsRef<Path>>(path: P) -> Result<Vec<AnalysisResult>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn validate_dump(dump: &CacheDump) -> Result<()> {
    for (&entity, entry) in dump {
        let Some(detections) = &entry.detections else {
            continue;
        };
        if let Some(stray) = detections.results.iter().find(|d| d.entity_id != entity) {
            return Err(EvalError::InvalidDump(format!(
                "detection {} of entity {} is filed under entity {}",
                stray.id, stray.entity_id, entity
            )));
        }
    }
    Ok(())
}

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::pipeline::Envelope;

/// Serialize the envelope as pretty JSON into any writer
pub fn write_envelope<W: Write>(envelope: &Envelope, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, envelope).context("Failed to write JSON")?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write to a JSON file, or to stdout when no path is given
pub fn write_envelope_to(envelope: &Envelope, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create file: {:?}", path))?;
            write_envelope(envelope, std::io::BufWriter::new(file))
        }
        None => write_envelope(envelope, std::io::stdout().lock()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use serde_json::Value;

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        let envelope = Envelope::from_error(&PipelineError::validation("text", "too short"));

        write_envelope_to(&envelope, Some(&path)).unwrap();

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["success"], Value::Bool(false));
        assert_eq!(written["error"]["code"], "validation_error");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("result.json");
        let envelope = Envelope::from_error(&PipelineError::Internal("boom".to_string()));

        let err = write_envelope_to(&envelope, Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Failed to create file"));
    }

    #[test]
    fn test_write_pretty_json_ends_with_newline() {
        let envelope = Envelope::from_error(&PipelineError::Internal("boom".to_string()));
        let mut buffer = Vec::new();

        write_envelope(&envelope, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n  \"success\": false"));
    }
}

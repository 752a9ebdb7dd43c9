//! JSON output formatting.

use serde::Serialize;
use std::io::{self, Write};

/// Write any serializable value as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::other)?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ScanJob;

    #[test]
    fn test_write_job_json() {
        let job = ScanJob::pending("10.0.0.1", "22", 1);
        let mut buf = Vec::new();
        write_json(&mut buf, &job).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["status"], "PENDING");
        assert_eq!(value["port_range"], "22");
    }
}

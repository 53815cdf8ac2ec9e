use crate::pipeline::ExportError;

/// Extracts the requested point references from the raw point file.
///
/// The file is comma-delimited text with a header row; `column` names the
/// column holding the refs. Rows with a blank cell are dropped; everything
/// else must be numeric and is rendered as an integer-valued string
/// (`4077.0` becomes `4077`). Row order is preserved and duplicates pass
/// through unchanged.
pub fn extract_point_refs(raw: &[u8], column: &str) -> Result<Vec<String>, ExportError> {
    let mut rdr = csv::Reader::from_reader(raw);
    let headers = rdr
        .headers()
        .map_err(|e| ExportError::MalformedInput(format!("failed to read header row: {e}")))?;
    let col_idx = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| ExportError::MalformedInput(format!("missing column '{column}'")))?;

    let mut points = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| ExportError::MalformedInput(format!("failed to read record: {e}")))?;
        let Some(cell) = record.get(col_idx) else {
            continue;
        };
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let value: f64 = cell.parse().map_err(|_| {
            ExportError::MalformedInput(format!("point reference '{cell}' is not numeric"))
        })?;
        points.push(format!("{value:.0}"));
    }

    if points.is_empty() {
        return Err(ExportError::EmptyInput);
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMN: &str = "FromMwAnalogPointRef";

    #[test]
    fn extracts_refs_in_row_order() {
        let raw = b"Name,FromMwAnalogPointRef\nL1,101\nL2,102\nL3,103\n";
        let points = extract_point_refs(raw, COLUMN).unwrap();
        assert_eq!(points, ["101", "102", "103"]);
    }

    #[test]
    fn float_looking_refs_become_integer_strings() {
        let raw = b"FromMwAnalogPointRef\n4077.0\n4078.00\n";
        let points = extract_point_refs(raw, COLUMN).unwrap();
        assert_eq!(points, ["4077", "4078"]);
    }

    #[test]
    fn blank_cells_are_dropped() {
        let raw = b"Name,FromMwAnalogPointRef\nL1,101\nL2,\nL3,103\n";
        let points = extract_point_refs(raw, COLUMN).unwrap();
        assert_eq!(points, ["101", "103"]);
    }

    #[test]
    fn duplicates_pass_through_unchanged() {
        let raw = b"FromMwAnalogPointRef\n101\n101\n102\n";
        let points = extract_point_refs(raw, COLUMN).unwrap();
        assert_eq!(points, ["101", "101", "102"]);
    }

    #[test]
    fn missing_column_is_malformed_input() {
        let raw = b"Name,SomethingElse\nL1,101\n";
        assert!(matches!(
            extract_point_refs(raw, COLUMN),
            Err(ExportError::MalformedInput(_))
        ));
    }

    #[test]
    fn non_numeric_ref_is_malformed_input() {
        let raw = b"FromMwAnalogPointRef\nnot-a-number\n";
        assert!(matches!(
            extract_point_refs(raw, COLUMN),
            Err(ExportError::MalformedInput(_))
        ));
    }

    #[test]
    fn no_usable_refs_is_empty_input() {
        let raw = b"Name,FromMwAnalogPointRef\nL1,\nL2,\n";
        assert!(matches!(
            extract_point_refs(raw, COLUMN),
            Err(ExportError::EmptyInput)
        ));
    }
}

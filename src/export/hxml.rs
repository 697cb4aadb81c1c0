use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use super::{ExportBundle, ExportCurve, NO_REMARKS};

// ---------------------------------------------------------------------------
// HXML interchange document
// ---------------------------------------------------------------------------

const DATA_VERSION: &str = "0.0.0.1";

/// Escape text content and attribute values.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// `[v1 v2 …]` with two decimals.
fn format_values(values: &[f64]) -> String {
    let joined = values
        .iter()
        .map(|v| format!("{v:.2}"))
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{joined}]")
}

fn curve_element(out: &mut String, name: &str, unit: &str, text: &str) {
    // writing to a String cannot fail
    let _ = writeln!(
        out,
        "\t\t\t\t<curve name=\"{}\" unit=\"{}\">{}</curve>",
        escape(name),
        escape(unit),
        escape(text)
    );
}

fn curvedata(out: &mut String, curve: &ExportCurve, remark: &str) {
    let _ = writeln!(
        out,
        "\t\t\t<curvedata CurveDataName=\"{}\">",
        escape(&curve.plot_title)
    );
    out.push_str("\t\t\t\t<longDataSetDesc/>\n");
    out.push_str("\t\t\t\t<shortDataSetDesc/>\n");
    curve_element(out, "f", &curve.x_unit, &format_values(&curve.x));
    curve_element(out, &curve.y_label, &curve.y_unit, &format_values(&curve.y));
    curve_element(out, "remarks", "", remark);
    out.push_str("\t\t\t</curvedata>\n");
}

/// Render a bundle as an HXML document.
pub fn render(bundle: &ExportBundle) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<hxml>\n");
    out.push_str("\t<head>\n\t\t<Document>\n");
    let _ = writeln!(
        out,
        "\t\t\t<DataVersion XsdVersion=\"{DATA_VERSION}\">{DATA_VERSION}</DataVersion>"
    );
    out.push_str("\t\t\t<DataType>hiCurve</DataType>\n");
    out.push_str("\t\t\t<LDocNode>//hxml/data</LDocNode>\n");
    out.push_str("\t\t\t<PlatformVersion>n.a.</PlatformVersion>\n");
    out.push_str("\t\t</Document>\n\t</head>\n");

    out.push_str("\t<data>\n\t\t<dataset>\n");
    out.push_str("\t\t\t<longDataSetDesc/>\n");
    out.push_str("\t\t\t<shortDataSetDesc/>\n");
    out.push_str("\t\t\t<acpEarhookType/>\n");
    if bundle.is_empty() {
        out.push_str("\t\t\t<v-curvedata/>\n");
    } else {
        out.push_str("\t\t\t<v-curvedata>\n");
        for (i, curve) in bundle.curves.iter().enumerate() {
            let mut block = String::new();
            curvedata(&mut block, curve, bundle.remark(i).unwrap_or(NO_REMARKS));
            // one level deeper than the dataset children
            for line in block.lines() {
                out.push('\t');
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str("\t\t\t</v-curvedata>\n");
    }
    out.push_str("\t\t</dataset>\n\t</data>\n");
    out.push_str("\t<environment/>\n");
    out.push_str("</hxml>\n");
    out
}

/// Write a bundle to an `.hxml` file.
pub fn write_hxml(path: &Path, bundle: &ExportBundle) -> Result<()> {
    std::fs::write(path, render(bundle))
        .with_context(|| format!("writing HXML file {}", path.display()))?;
    log::info!("wrote {} curve(s) to {}", bundle.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(title: &str) -> ExportCurve {
        ExportCurve {
            plot_title: title.into(),
            x_label: "Frequency".into(),
            x_unit: "Hz".into(),
            x: vec![100.0, 200.5],
            y_label: "Velocity".into(),
            y_unit: "m/s".into(),
            y: vec![1.0, f64::NEG_INFINITY],
            x_min: 100.0,
        }
    }

    #[test]
    fn test_document_structure() {
        let mut bundle = ExportBundle::new();
        bundle.curves.push(curve("A <top>, Vib"));
        let xml = render(&bundle);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<hxml>"));
        assert!(xml.contains("<DataVersion XsdVersion=\"0.0.0.1\">0.0.0.1</DataVersion>"));
        assert!(xml.contains("<DataType>hiCurve</DataType>"));
        assert!(xml.contains("<curvedata CurveDataName=\"A &lt;top&gt;, Vib\">"));
        assert!(xml.contains("<curve name=\"f\" unit=\"Hz\">[100.00 200.50]</curve>"));
        assert!(xml.contains("<curve name=\"Velocity\" unit=\"m/s\">[1.00 -inf]</curve>"));
        assert!(xml.contains("<curve name=\"remarks\" unit=\"\">No remarks</curve>"));
        assert!(xml.trim_end().ends_with("<environment/>\n</hxml>"));
    }

    #[test]
    fn test_remarks_are_written_in_order() {
        let mut bundle = ExportBundle::with_remarks();
        bundle.push_with_remark(curve("one"), "Anomalous point(s) excluded: 2");
        bundle.push_with_remark(curve("two"), "No anomalous points.");
        let xml = render(&bundle);
        let first = xml.find("excluded: 2").unwrap();
        let second = xml.find("No anomalous points.").unwrap();
        assert!(first < second);
        assert_eq!(xml.matches("<curvedata ").count(), 2);
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.hxml");
        let mut bundle = ExportBundle::new();
        bundle.curves.push(curve("c"));
        write_hxml(&path, &bundle).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, render(&bundle));
    }
}

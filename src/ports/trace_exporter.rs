//! Trace Catalogue CSV Exporter
//!
//! One row per deduplicated fingerprint. The header is generated dynamically:
//! the parameter columns run to the maximum formal position observed anywhere
//! in the run, while each row only spans its own positions, so rows are ragged
//! relative to the header.

use std::fmt::Write as _;

use crate::domain::catalogue::FingerprintCatalogue;
use crate::domain::fingerprint::RETURN_SLOT;
use crate::domain::shape::ValueShape;
use crate::ports::TraceExporter;

/// Placeholder triple for a position a fingerprint never observed.
const ABSENT_SLOT: &str = "???,{},{}";

pub struct CsvTraceExporter;

impl CsvTraceExporter {
    /// Render the whole catalogue, entries in first-seen order.
    pub fn to_csv(catalogue: &FingerprintCatalogue, package_being_analyzed: &str) -> String {
        let max_position = catalogue.max_parameter_position();
        let mut out = String::new();

        out.push_str("package_being_analyzed,package,fun_name,fun_id,");
        out.push_str("trace_hash,type_hash,dispatch,has_dots,count,");
        out.push_str("arg_t_r,arg_c_r,arg_a_r");
        for position in 0..=max_position {
            let _ = write!(
                out,
                ",arg_t{pos},arg_c{pos},arg_a{pos}",
                pos = position
            );
        }
        out.push('\n');

        for entry in catalogue.sorted_entries() {
            let fp = &entry.fingerprint;
            // Only the function id is quoted among the identity columns.
            let _ = write!(
                out,
                "{},{},{},\"{}\",{},{},{},{},{}",
                package_being_analyzed,
                fp.package(),
                fp.function_name(),
                fp.function_id(),
                fp.combined_hash(),
                fp.slots_hash(),
                fp.dispatch(),
                if fp.has_dots() { 1 } else { 0 },
                entry.count,
            );

            Self::push_slot(&mut out, fp.slot(RETURN_SLOT));
            // Ragged: this row only runs to its own highest position.
            let row_max = fp.max_position().unwrap_or(-1);
            for position in 0..=row_max {
                Self::push_slot(&mut out, fp.slot(position));
            }
            out.push('\n');
        }
        out
    }

    fn push_slot(out: &mut String, shape: Option<&ValueShape>) {
        match shape {
            Some(shape) => {
                let _ = write!(
                    out,
                    ",\"{}\",\"{{{}}}\",\"{{{}}}\"",
                    Self::render_kind(shape),
                    shape.classes().join("-"),
                    shape.attr_names().join("-"),
                );
            }
            None => {
                out.push(',');
                out.push_str(ABSENT_SLOT);
            }
        }
    }

    /// Kind with its tag annotations re-attached as `@` suffixes.
    fn render_kind(shape: &ValueShape) -> String {
        let mut rendered = shape.kind().to_string();
        for tag in shape.tags() {
            rendered.push('@');
            rendered.push_str(tag);
        }
        rendered
    }
}

impl TraceExporter for CsvTraceExporter {
    fn export(
        &self,
        catalogue: &FingerprintCatalogue,
        package_being_analyzed: &str,
        path: &str,
    ) -> std::io::Result<()> {
        let content = Self::to_csv(catalogue, package_being_analyzed);
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fingerprint::{CallFingerprint, Dispatch, FunctionId};

    fn fingerprint(name: &str, seq: u64) -> CallFingerprint {
        CallFingerprint::new(
            "base",
            name,
            FunctionId::from_definition("base", name),
            Dispatch::None,
            seq,
        )
    }

    #[test]
    fn header_spans_the_global_max_position() {
        let mut catalogue = FingerprintCatalogue::new();
        let mut narrow = fingerprint("f", 0);
        narrow.set_slot(0, ValueShape::of_kind("double"));
        catalogue.record(narrow);
        let mut wide = fingerprint("g", 1);
        wide.set_slot(2, ValueShape::of_kind("list"));
        catalogue.record(wide);

        let csv = CsvTraceExporter::to_csv(&catalogue, "testpkg");
        let header = csv.lines().next().unwrap();
        assert!(header.ends_with("arg_t0,arg_c0,arg_a0,arg_t1,arg_c1,arg_a1,arg_t2,arg_c2,arg_a2"));
    }

    #[test]
    fn rows_are_ragged_and_absent_slots_are_placeholders() {
        let mut catalogue = FingerprintCatalogue::new();
        let mut fp = fingerprint("f", 0);
        fp.set_slot(RETURN_SLOT, ValueShape::of_kind("double"));
        fp.set_slot(1, ValueShape::of_kind("character"));
        catalogue.record(fp);

        let csv = CsvTraceExporter::to_csv(&catalogue, "testpkg");
        let row = csv.lines().nth(1).unwrap();
        // Position 0 was never observed by this fingerprint; position 1 was.
        assert!(row.contains("???,{},{},\"character\""));
        // The row stops at its own max position.
        assert!(row.ends_with("\"{}\",\"{}\""));
    }

    #[test]
    fn classes_and_attributes_join_with_dashes() {
        let mut catalogue = FingerprintCatalogue::new();
        let mut fp = fingerprint("f", 0);
        fp.set_slot(
            0,
            ValueShape::new(
                "double@shared",
                vec![],
                vec!["data.frame".to_string(), "tbl".to_string()],
                vec!["names".to_string(), "class".to_string()],
            ),
        );
        catalogue.record(fp);

        let csv = CsvTraceExporter::to_csv(&catalogue, "testpkg");
        assert!(csv.contains("\"double@shared\",\"{data.frame-tbl}\",\"{names-class}\""));
    }

    #[test]
    fn identity_columns_render_in_order() {
        let mut catalogue = FingerprintCatalogue::new();
        let mut fp = fingerprint("paste", 3);
        fp.set_has_dots(true);
        let hash = catalogue.record(fp);

        let csv = CsvTraceExporter::to_csv(&catalogue, "testpkg");
        let row = csv.lines().nth(1).unwrap();
        // Identity columns are bare except the function id.
        let fun_id = FunctionId::from_definition("base", "paste");
        assert!(row.starts_with(&format!("testpkg,base,paste,\"{}\",", fun_id)));
        assert!(row.contains(&format!(",{},", hash)));
        assert!(row.contains(",None,1,1,"));
    }
}

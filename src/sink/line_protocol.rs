//! InfluxDB line protocol encoding.
//!
//! `measurement,tag=v,tag=v field=1i,field=2i 1700000000`

use std::fmt::Write as FmtWrite;

use crate::record::OutputRecord;

/// Escapes `specials` and backslashes. Line breaks cannot be escaped in
/// line protocol and become spaces.
fn escape(s: &str, specials: &[char], out: &mut String) {
    for c in s.chars() {
        let c = if matches!(c, '\n' | '\r') { ' ' } else { c };
        if c == '\\' || specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

fn escape_measurement(s: &str, out: &mut String) {
    escape(s, &[',', ' '], out);
}

fn escape_key(s: &str, out: &mut String) {
    escape(s, &[',', '=', ' '], out);
}

/// Encodes one record with a second-precision timestamp.
///
/// Tags with empty values are omitted. Returns `None` for a record without
/// fields, which the line protocol cannot express.
pub fn encode_record(record: &OutputRecord) -> Option<String> {
    if record.fields.is_empty() {
        return None;
    }

    let mut line = String::with_capacity(128);
    escape_measurement(&record.measurement, &mut line);

    for (key, value) in record.tags.iter().filter(|(_, v)| !v.is_empty()) {
        line.push(',');
        escape_key(key, &mut line);
        line.push('=');
        escape_key(value, &mut line);
    }

    for (idx, (key, value)) in record.fields.iter().enumerate() {
        line.push(if idx == 0 { ' ' } else { ',' });
        escape_key(key, &mut line);
        let _ = write!(line, "={}i", value);
    }

    let _ = write!(line, " {}", record.timestamp.timestamp());
    Some(line)
}

/// Encodes a batch, one line per record, newline-terminated.
pub fn encode_batch(records: &[OutputRecord]) -> String {
    let mut body = String::with_capacity(records.len() * 128);
    for line in records.iter().filter_map(encode_record) {
        body.push_str(&line);
        body.push('\n');
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn record(measurement: &str, tags: &[(&str, &str)], fields: &[(&str, i64)]) -> OutputRecord {
        OutputRecord {
            measurement: measurement.into(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_encode_simple() {
        let r = record(
            "virtualmachine",
            &[("name", "web01"), ("host", "vc01")],
            &[("cpu_usage_average", 512), ("mem_usage_average", -1)],
        );
        assert_eq!(
            encode_record(&r).unwrap(),
            "virtualmachine,host=vc01,name=web01 cpu_usage_average=512i,mem_usage_average=-1i 1704067200"
        );
    }

    #[test]
    fn test_encode_escapes() {
        let r = record("my disk", &[("datastore", "nfs a,b=c")], &[("a b", 1)]);
        assert_eq!(
            encode_record(&r).unwrap(),
            r"my\ disk,datastore=nfs\ a\,b\=c a\ b=1i 1704067200"
        );
    }

    #[test]
    fn test_encode_line_breaks_and_backslashes() {
        let r = record("vm", &[("name", "web\n01"), ("esx", "esx01\\")], &[("f", 1)]);
        let line = encode_record(&r).unwrap();
        assert_eq!(line.lines().count(), 1);
        assert_eq!(line, r"vm,esx=esx01\\,name=web\ 01 f=1i 1704067200");
        assert_eq!(encode_batch(&[r]).lines().count(), 1);
    }

    #[test]
    fn test_empty_tags_and_fields() {
        let r = record("vm", &[("cluster", ""), ("name", "x")], &[("f", 1)]);
        assert_eq!(encode_record(&r).unwrap(), "vm,name=x f=1i 1704067200");

        let empty = record("vm", &[("name", "x")], &[]);
        assert!(encode_record(&empty).is_none());
        assert_eq!(encode_batch(&[empty, r]), "vm,name=x f=1i 1704067200\n");
    }
}

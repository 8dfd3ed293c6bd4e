use tracequery_model::{KeyValue, TagValue, Trace};

use super::{Adjuster, AdjusterError};

/// Tag keys carrying IPv4 addresses that some clients report as packed
/// integers.
const IP_TAG_KEYS: [&str; 2] = ["ip", "peer.ipv4"];

/// Normalizes numeric IPv4 tag values to dotted-quad strings.
///
/// Applies to span tags and process tags. String values are left
/// untouched, which also makes the pass idempotent.
pub struct IpTag;

fn dotted_quad(packed: u32) -> String {
    let octets = packed.to_be_bytes();
    format!(
        "{}.{}.{}.{}",
        octets[0], octets[1], octets[2], octets[3]
    )
}

fn normalize(tags: &mut [KeyValue]) {
    for kv in tags {
        if !IP_TAG_KEYS.contains(&kv.key.as_str()) {
            continue;
        }
        match kv.value {
            TagValue::I64(packed) => {
                kv.value = TagValue::String(dotted_quad(packed as u32));
            }
            TagValue::F64(packed) => {
                kv.value = TagValue::String(dotted_quad(packed as u32));
            }
            _ => {}
        }
    }
}

impl Adjuster for IpTag {
    fn name(&self) -> &'static str {
        "ip-tag"
    }

    fn adjust(&self, trace: &mut Trace) -> Result<(), AdjusterError> {
        for span in &mut trace.spans {
            normalize(&mut span.tags);
            normalize(&mut span.process.tags);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracequery_model::{Process, Span};

    #[test]
    fn packed_ip_values_become_dotted_quads() {
        let mut trace = Trace::new(vec![Span {
            tags: vec![
                KeyValue::i64("ip", 0x0a00_0001),
                KeyValue::i64("port", 8080),
            ],
            process: Process::new(
                "api",
                vec![KeyValue::f64("ip", f64::from(0x7f00_0001u32))],
            ),
            ..Default::default()
        }]);
        IpTag.adjust(&mut trace).unwrap();

        assert_eq!(trace.spans[0].tags[0], KeyValue::string("ip", "10.0.0.1"));
        // Non-IP keys keep their numeric values.
        assert_eq!(trace.spans[0].tags[1], KeyValue::i64("port", 8080));
        assert_eq!(
            trace.spans[0].process.tags[0],
            KeyValue::string("ip", "127.0.0.1")
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let mut trace = Trace::new(vec![Span {
            tags: vec![KeyValue::i64("peer.ipv4", 0x0a00_0001)],
            ..Default::default()
        }]);
        IpTag.adjust(&mut trace).unwrap();
        let once = trace.clone();
        IpTag.adjust(&mut trace).unwrap();
        assert_eq!(trace, once);
    }
}

//! A toy [`XmlRenderer`] that emits flat, not-quite-XML tags per stream.
use crate::record::PackageRecord;
use crate::rendered::XmlChunks;
use crate::worker::XmlRenderer;

/// Writes one line per package to each of the three streams. Not RPM-MD, not
/// any real repository format — just enough structure to show each stream
/// receiving distinct content for the same record.
pub struct FlatTextRenderer;

impl XmlRenderer for FlatTextRenderer {
    fn render(&self, record: &PackageRecord) -> std::io::Result<XmlChunks> {
        let primary = format!(
            "<package name=\"{}\" checksum=\"{}:{}\" size=\"{}\" href=\"{}{}\"/>\n",
            record.name,
            record.checksum_type_name,
            record.pkg_id,
            record.size_package,
            record.location_base,
            record.location_href,
        );

        let filelists = format!(
            "<package name=\"{}\" pkgid=\"{}\"/>\n",
            record.name, record.pkg_id,
        );

        let other = if record.changelog.is_empty() {
            format!("<package name=\"{}\" pkgid=\"{}\"/>\n", record.name, record.pkg_id)
        } else {
            let entries: String = record
                .changelog
                .iter()
                .map(|c| format!("  <entry author=\"{}\" time=\"{}\">{}</entry>\n", c.author, c.timestamp, c.text))
                .collect();
            format!(
                "<package name=\"{}\" pkgid=\"{}\">\n{}</package>\n",
                record.name, record.pkg_id, entries,
            )
        };

        Ok(XmlChunks { primary, filelists, other })
    }
}

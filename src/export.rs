use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::configuration::Settings;
use crate::domain::WorkingSet;
use crate::error::ExportError;

const COLUMNS: [&str; 7] = [
    "Business",
    "Address",
    "Social Page",
    "Ad Copy",
    "Media URL",
    "Headline",
    "Destination URL",
];

/// Flattens the surviving working set into a CSV file, one row per creative.
pub struct ResultExporter {
    directory: PathBuf,
}

#[derive(Debug)]
pub struct ExportReport {
    pub path: PathBuf,
    pub rows: usize,
}

impl ResultExporter {
    pub fn new(settings: &Settings) -> Self {
        ResultExporter {
            directory: PathBuf::from(&settings.export.directory),
        }
    }

    pub fn export(
        &self,
        listings: &WorkingSet,
        query_label: &str,
    ) -> Result<ExportReport, ExportError> {
        fs::create_dir_all(&self.directory)?;
        let path = next_free_path(&self.directory, &slugify(query_label));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);

        write_record(&mut writer, &COLUMNS)?;
        let mut rows = 0;
        for listing in listings.iter() {
            let address = listing.address.as_deref().unwrap_or_default();
            let social_link = listing.social_link.as_deref().unwrap_or_default();
            for ad in listing.ads.iter().flatten() {
                write_record(
                    &mut writer,
                    &[
                        listing.name.as_str(),
                        address,
                        social_link,
                        ad.copy_text.as_str(),
                        ad.media_url.as_str(),
                        ad.headline.as_str(),
                        ad.destination_url.as_str(),
                    ],
                )?;
                rows += 1;
            }
        }
        writer.flush()?;

        Ok(ExportReport { path, rows })
    }
}

pub fn slugify(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Appends an incrementing numeric suffix until the name is free, so a rerun
/// never overwrites an earlier export.
fn next_free_path(directory: &Path, slug: &str) -> PathBuf {
    let mut path = directory.join(format!("{}.csv", slug));
    let mut suffix = 1;
    while path.exists() {
        path = directory.join(format!("{}_{}.csv", slug, suffix));
        suffix += 1;
    }
    path
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_record<W: Write>(writer: &mut W, fields: &[&str]) -> std::io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        if needs_quotes(field) {
            write!(writer, "\"{}\"", field.replace('"', "\"\""))?;
        } else {
            write!(writer, "{}", field)?;
        }
    }
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::tempdir;

    use crate::domain::{AdCreative, Listing, WorkingSet};

    use super::{slugify, ResultExporter};

    fn exporter(directory: PathBuf) -> ResultExporter {
        ResultExporter { directory }
    }

    fn creative(copy: &str) -> AdCreative {
        AdCreative {
            copy_text: copy.to_string(),
            media_url: "https://cdn.example.com/a.jpg".to_string(),
            headline: "Shop now".to_string(),
            destination_url: "https://example.com".to_string(),
        }
    }

    fn enriched(name: &str, ads: Vec<AdCreative>) -> Listing {
        let mut listing = Listing::new(
            name.to_string(),
            format!("https://{}.com", name),
            Some("123 Main St".to_string()),
            1.0,
        );
        listing.social_link = Some(format!("https://facebook.com/{}", name));
        listing.page_id = Some("123".to_string());
        listing.ads = Some(ads);
        listing
    }

    #[test]
    fn slugify_lowercases_and_joins() {
        assert_eq!(slugify("Coffee Shops in Austin"), "coffee_shops_in_austin");
        assert_eq!(slugify("  spaced   out  "), "spaced_out");
    }

    #[test]
    fn row_count_matches_the_sum_of_ads() {
        let dir = tempdir().unwrap();
        let mut listings = WorkingSet::new();
        listings.insert(enriched("acme", vec![creative("one"), creative("two")]));
        listings.insert(enriched("bravo", vec![creative("three")]));

        let report = exporter(dir.path().to_path_buf())
            .export(&listings, "coffee shops")
            .unwrap();
        assert_eq!(report.rows, 3);

        let contents = fs::read_to_string(&report.path).unwrap();
        // Header plus one line per ad.
        assert_eq!(contents.lines().count(), 4);
    }

    #[test]
    fn rerun_with_the_same_label_never_clobbers() {
        let dir = tempdir().unwrap();
        let exporter = exporter(dir.path().to_path_buf());
        let listings = WorkingSet::new();

        let first = exporter.export(&listings, "coffee shops").unwrap();
        let second = exporter.export(&listings, "coffee shops").unwrap();
        let third = exporter.export(&listings, "coffee shops").unwrap();

        assert_eq!(first.path.file_name().unwrap(), "coffee_shops.csv");
        assert_eq!(second.path.file_name().unwrap(), "coffee_shops_1.csv");
        assert_eq!(third.path.file_name().unwrap(), "coffee_shops_2.csv");
        assert!(first.path.exists() && second.path.exists() && third.path.exists());
    }

    #[test]
    fn empty_set_exports_a_header_only_file() {
        let dir = tempdir().unwrap();
        let report = exporter(dir.path().to_path_buf())
            .export(&WorkingSet::new(), "empty niche")
            .unwrap();

        assert_eq!(report.rows, 0);
        let contents = fs::read_to_string(&report.path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.starts_with("Business,Address,"));
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        let dir = tempdir().unwrap();
        let mut listings = WorkingSet::new();
        listings.insert(enriched(
            "acme",
            vec![creative("Buy one, get one \"free\"\ntoday")],
        ));

        let report = exporter(dir.path().to_path_buf())
            .export(&listings, "quoting")
            .unwrap();
        let contents = fs::read_to_string(&report.path).unwrap();
        assert!(contents.contains("\"Buy one, get one \"\"free\"\"\ntoday\""));
    }
}
